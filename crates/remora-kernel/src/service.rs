//! POSIX-style file operations over the descriptor table.
//!
//! [`FileService`] validates every request against the descriptor table and
//! the local filesystem, performs the I/O, and classifies failures into the
//! [`FsError`] taxonomy. It holds no per-client state; see [`crate::Session`]
//! for the per-connection view that folds results into result codes.

use std::io::{self, SeekFrom};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use remora_types::{DirEntry, DirTree, FileAttr, FileType, OpenMode, Whence};

use crate::config::ServiceConfig;
use crate::error::{FsError, FsResult};
use crate::path::PathResolver;
use crate::session::Session;
use crate::table::{AccessMode, DescriptorTable, Fd, OpenFile};

/// One page of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Record bytes the entries occupy; 0 at the end of the directory.
    pub bytes: u64,
    /// Base to pass to the next call.
    pub next_base: u64,
    pub entries: Vec<DirEntry>,
}

/// The file service: one per process, shared by every session.
#[derive(Debug)]
pub struct FileService {
    config: ServiceConfig,
    resolver: PathResolver,
    table: DescriptorTable,
    next_session_id: AtomicU64,
}

impl FileService {
    pub fn new(config: ServiceConfig) -> Self {
        let resolver = PathResolver::new(config.root.as_deref());
        match resolver.root() {
            Some(root) => tracing::info!(root = %root.display(), "paths confined to root"),
            None => tracing::info!("paths passed through unchanged"),
        }
        Self {
            config,
            resolver,
            table: DescriptorTable::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    /// Create the per-client handler for a new connection.
    pub fn new_session(self: &Arc<Self>) -> Session {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        Session::new(id, Arc::clone(self))
    }

    // ========================================================================
    // Path operations
    // ========================================================================

    /// Open `path` and return a fresh descriptor.
    ///
    /// Nothing is allocated or stored unless the open succeeds.
    pub async fn open(&self, path: Option<&str>, mode: OpenMode) -> FsResult<Fd> {
        let path = path.ok_or_else(|| FsError::invalid_argument("null path"))?;
        let full = self.resolver.resolve(path).await?;

        // `metadata` follows symlinks; a dangling link counts as absent.
        let meta = fs::metadata(&full).await.ok();
        let exists = meta.is_some();
        let is_dir = meta.as_ref().is_some_and(|m| m.is_dir());

        if !mode.creates() && !exists {
            return Err(FsError::not_found(path));
        }

        let state = match mode {
            OpenMode::Read => {
                if is_dir {
                    OpenFile::directory(&full)
                } else {
                    let file = File::open(&full).await.map_err(|e| open_error(path, e))?;
                    OpenFile::file(&full, AccessMode::ReadOnly, file)
                }
            }
            OpenMode::Write => {
                if is_dir {
                    return Err(FsError::is_a_directory(path));
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&full)
                    .await
                    .map_err(|e| open_error(path, e))?;
                OpenFile::file(&full, AccessMode::ReadWrite, file)
            }
            OpenMode::CreateNew => {
                if exists {
                    return Err(FsError::already_exists(path));
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create_new(true)
                    .open(&full)
                    .await
                    .map_err(|e| match e.kind() {
                        io::ErrorKind::AlreadyExists => FsError::already_exists(path),
                        _ => FsError::Io(e),
                    })?;
                OpenFile::file(&full, AccessMode::ReadWrite, file)
            }
            OpenMode::Create => {
                if is_dir {
                    return Err(FsError::is_a_directory(path));
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(&full)
                    .await
                    .map_err(FsError::Io)?;
                OpenFile::file(&full, AccessMode::ReadWrite, file)
            }
        };

        self.table.open(state).ok_or(FsError::DescriptorsExhausted)
    }

    /// Remove a regular file, or a symlink itself. Independent of the
    /// descriptor table: open descriptors on the path keep their handles.
    pub async fn unlink(&self, path: Option<&str>) -> FsResult<()> {
        let path = path.ok_or_else(|| FsError::not_found("null path"))?;
        let full = self.resolver.resolve_entry(path).await?;

        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(|_| FsError::not_found(path))?;
        if meta.is_dir() {
            return Err(FsError::is_a_directory(path));
        }

        fs::remove_file(&full).await.map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => FsError::NotPermitted(path.to_string()),
            _ => FsError::Io(e),
        })
    }

    /// Attributes of `path`, without following a final symlink.
    pub async fn stat(&self, path: Option<&str>) -> FsResult<FileAttr> {
        let path = path.ok_or_else(|| FsError::not_found("null path"))?;
        let full = self.resolver.resolve_entry(path).await?;

        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(|e| lookup_error(path, e))?;
        Ok(metadata_to_attr(&meta))
    }

    /// The directory hierarchy beneath `path`, named as requested.
    ///
    /// Only directories appear; symlinks are not followed. A subdirectory
    /// that cannot be read is kept as a node without children.
    pub async fn get_dir_tree(&self, path: Option<&str>) -> FsResult<DirTree> {
        let path = path.ok_or_else(|| FsError::not_found("null path"))?;
        let full = self.resolver.resolve(path).await?;

        let meta = fs::metadata(&full).await.map_err(|e| lookup_error(path, e))?;
        if !meta.is_dir() {
            return Err(FsError::not_a_directory(path));
        }

        let subdirs = walk_subdirs(full).await.map_err(|e| lookup_error(path, e))?;
        Ok(DirTree {
            name: path.to_string(),
            subdirs,
        })
    }

    // ========================================================================
    // Descriptor operations
    // ========================================================================

    /// Close a descriptor. A second close of the same value fails.
    pub fn close(&self, fd: Fd) -> FsResult<PathBuf> {
        self.table
            .remove(fd)
            .map(|file| file.path().to_path_buf())
            .ok_or(FsError::BadDescriptor(fd))
    }

    /// Write all of `data` at the cursor and advance it.
    pub async fn write(&self, fd: Fd, data: &[u8]) -> FsResult<usize> {
        let entry = self.lookup(fd)?;
        let handle = regular_file(&entry)?;
        if entry.access() == AccessMode::ReadOnly {
            return Err(FsError::BadDescriptor(fd));
        }

        let mut file = handle.lock().await;
        file.write_all(data).await.map_err(FsError::Busy)?;
        file.flush().await.map_err(FsError::Busy)?;
        Ok(data.len())
    }

    /// Read up to `capacity` bytes from the cursor and advance it.
    ///
    /// An empty result means end-of-file. `None` stands for a missing
    /// destination buffer.
    pub async fn read(&self, fd: Fd, capacity: Option<u64>) -> FsResult<Vec<u8>> {
        let entry = self.lookup(fd)?;
        let handle = regular_file(&entry)?;
        let capacity = capacity.ok_or(FsError::BadAddress)?;

        let len = usize::try_from(capacity)
            .unwrap_or(usize::MAX)
            .min(self.config.max_transfer);
        let mut buf = vec![0u8; len];

        let mut file = handle.lock().await;
        let n = file.read(&mut buf).await.map_err(FsError::Busy)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Move the cursor and return the new absolute position.
    ///
    /// Positions past end-of-file are accepted. A position before the start
    /// is refused by the underlying handle and reported as busy, leaving the
    /// cursor where it was.
    pub async fn lseek(&self, fd: Fd, offset: i64, whence: Whence) -> FsResult<u64> {
        let entry = self.lookup(fd)?;
        let handle = regular_file(&entry)?;

        let mut file = handle.lock().await;
        let base = match whence {
            Whence::FromStart => 0,
            Whence::FromCurrent => file.stream_position().await.map_err(FsError::Busy)?,
            Whence::FromEnd => file.metadata().await.map_err(FsError::Busy)?.len(),
        };

        let target = i64::try_from(base)
            .ok()
            .and_then(|base| base.checked_add(offset))
            .ok_or_else(|| FsError::invalid_argument("seek position overflows"))?;
        let pos = u64::try_from(target).map_err(|_| {
            FsError::Busy(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("negative seek position {target}"),
            ))
        })?;

        file.seek(SeekFrom::Start(pos)).await.map_err(FsError::Busy)
    }

    /// List a directory descriptor, starting `base` entries in.
    ///
    /// Entries come in name order after `.` and `..`, as many as fit in
    /// `nbytes` of `dirent64` records (capped at the maximum transfer size).
    /// The directory is re-read on every call, so `base` counts entries.
    pub async fn get_dir_entries(&self, fd: Fd, nbytes: u64, base: u64) -> FsResult<DirListing> {
        let entry = self.lookup(fd)?;
        if !entry.is_dir() {
            return Err(FsError::not_a_directory(entry.path().display().to_string()));
        }

        let budget = nbytes.min(u64::try_from(self.config.max_transfer).unwrap_or(u64::MAX));
        let all = list_dir(entry.path()).await?;
        let remaining = usize::try_from(base)
            .ok()
            .and_then(|skip| all.get(skip..))
            .unwrap_or_default();

        let mut listing = DirListing {
            bytes: 0,
            next_base: base,
            entries: Vec::new(),
        };
        for dirent in remaining {
            let len = dirent.record_len();
            if listing.bytes + len > budget {
                break;
            }
            listing.bytes += len;
            listing.next_base += 1;
            listing.entries.push(dirent.clone());
        }

        if listing.entries.is_empty() && !remaining.is_empty() {
            return Err(FsError::invalid_argument(format!(
                "{nbytes} bytes cannot hold the next entry"
            )));
        }
        Ok(listing)
    }

    fn lookup(&self, fd: Fd) -> FsResult<Arc<OpenFile>> {
        self.table.lookup(fd).ok_or(FsError::BadDescriptor(fd))
    }
}

/// The handle of a regular file, or IsADirectory.
fn regular_file(entry: &OpenFile) -> FsResult<&tokio::sync::Mutex<File>> {
    entry
        .handle()
        .ok_or_else(|| FsError::is_a_directory(entry.path().display().to_string()))
}

/// A failure opening an existing path for Read or Write. Whatever the
/// cause, the client sees the path as unavailable.
fn open_error(path: &str, e: io::Error) -> FsError {
    tracing::debug!(path, "open failed: {e}");
    FsError::not_found(path)
}

/// Classify a failure looking up a path for stat or a directory listing.
fn lookup_error(path: &str, e: io::Error) -> FsError {
    match e.kind() {
        io::ErrorKind::NotFound => FsError::not_found(path),
        io::ErrorKind::NotADirectory => FsError::not_a_directory(path),
        io::ErrorKind::PermissionDenied => FsError::permission_denied(path),
        _ => FsError::Io(e),
    }
}

fn file_type_of(file_type: std::fs::FileType) -> FileType {
    if file_type.is_dir() {
        FileType::Directory
    } else if file_type.is_symlink() {
        FileType::Symlink
    } else {
        FileType::File
    }
}

/// Entries of `dir`: `.` and `..`, then the rest sorted by name.
async fn list_dir(dir: &Path) -> FsResult<Vec<DirEntry>> {
    let shown = dir.display().to_string();
    let mut reader = fs::read_dir(dir).await.map_err(|e| lookup_error(&shown, e))?;

    let mut named = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(FsError::Io)? {
        let kind = entry.file_type().await.map_err(FsError::Io)?;
        named.push(DirEntry::new(
            entry.file_name().to_string_lossy(),
            file_type_of(kind),
        ));
    }
    named.sort_by(|a, b| a.name.cmp(&b.name));

    let mut entries = vec![
        DirEntry::new(".", FileType::Directory),
        DirEntry::new("..", FileType::Directory),
    ];
    entries.extend(named);
    Ok(entries)
}

/// Subdirectory nodes beneath `dir`, sorted by name.
fn walk_subdirs(dir: PathBuf) -> BoxFuture<'static, io::Result<Vec<DirTree>>> {
    async move {
        let mut reader = fs::read_dir(&dir).await?;
        let mut subdirs = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let child = entry.path();
            let children = match walk_subdirs(child.clone()).await {
                Ok(children) => children,
                Err(e) => {
                    tracing::debug!(path = %child.display(), "unreadable directory: {e}");
                    Vec::new()
                }
            };
            subdirs.push(DirTree {
                name: entry.file_name().to_string_lossy().into_owned(),
                subdirs: children,
            });
        }
        subdirs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subdirs)
    }
    .boxed()
}

fn metadata_to_attr(meta: &std::fs::Metadata) -> FileAttr {
    let kind = file_type_of(meta.file_type());

    FileAttr {
        size: meta.len(),
        kind,
        perm: meta.permissions().mode(),
        mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        nlink: u32::try_from(meta.nlink()).unwrap_or(u32::MAX),
    }
}
