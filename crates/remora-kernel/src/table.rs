//! Descriptor table and allocator.
//!
//! The table maps integer descriptors to [`OpenFile`] state. Entries are held
//! behind `Arc` so that a lookup releases the map shard before any I/O runs;
//! each regular-file handle carries its own async mutex, which serializes
//! read/write/lseek on one descriptor without touching any other.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::fs::File;
use tokio::sync::Mutex;

/// Descriptor value handed to clients.
pub type Fd = i32;

/// Descriptors are allocated strictly above this value, clear of the
/// conventional standard-stream numbers.
pub const DESCRIPTOR_BASE: Fd = 1000;

/// Access granted when the descriptor was opened. Never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Server-held state for one open descriptor.
#[derive(Debug)]
pub struct OpenFile {
    path: PathBuf,
    access: AccessMode,
    handle: Option<Mutex<File>>,
}

impl OpenFile {
    /// State for a directory opened read-only. Directories carry no handle.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            access: AccessMode::ReadOnly,
            handle: None,
        }
    }

    /// State for a regular file with its own handle and cursor.
    pub fn file(path: impl Into<PathBuf>, access: AccessMode, file: File) -> Self {
        Self {
            path: path.into(),
            access,
            handle: Some(Mutex::new(file)),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.handle.is_none()
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file handle, if this is not a directory.
    pub fn handle(&self) -> Option<&Mutex<File>> {
        self.handle.as_ref()
    }
}

/// Process-wide descriptor table with a monotonic allocator.
///
/// Descriptor values are never reused: closing one does not return its
/// number to the allocator.
#[derive(Debug)]
pub struct DescriptorTable {
    entries: DashMap<Fd, Arc<OpenFile>>,
    last: AtomicI32,
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::starting_after(DESCRIPTOR_BASE)
    }

    /// Table whose first allocated descriptor is `last + 1`.
    pub fn starting_after(last: Fd) -> Self {
        Self {
            entries: DashMap::new(),
            last: AtomicI32::new(last),
        }
    }

    /// Allocate a fresh descriptor, strictly greater than every earlier one.
    ///
    /// Returns `None` once the counter reaches `Fd::MAX`.
    pub fn allocate(&self) -> Option<Fd> {
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1))
            .ok()
            .map(|prev| prev + 1)
    }

    /// Allocate a descriptor and store `file` under it.
    pub fn open(&self, file: OpenFile) -> Option<Fd> {
        let fd = self.allocate()?;
        self.insert(fd, file);
        Some(fd)
    }

    pub fn insert(&self, fd: Fd, file: OpenFile) {
        let old = self.entries.insert(fd, Arc::new(file));
        debug_assert!(old.is_none(), "descriptor {fd} allocated twice");
    }

    /// Look up a live descriptor. The returned `Arc` keeps the state usable
    /// even if the descriptor is closed concurrently.
    pub fn lookup(&self, fd: Fd) -> Option<Arc<OpenFile>> {
        self.entries.get(&fd).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a descriptor. The handle is released once no in-flight
    /// operation still holds it.
    pub fn remove(&self, fd: Fd) -> Option<Arc<OpenFile>> {
        self.entries.remove(&fd).map(|(_, file)| file)
    }

    pub fn contains(&self, fd: Fd) -> bool {
        self.entries.contains_key(&fd)
    }

    /// Number of live descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
