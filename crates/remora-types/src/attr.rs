//! File attributes and directory listings.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permission bits (e.g., 0o644).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Number of hard links.
    pub nlink: u32,
}

impl FileAttr {
    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Header bytes of one `dirent64` record: inode, offset, length and type.
const DIRENT_HEADER: usize = 19;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type. Symlinks are reported as links, not followed.
    pub kind: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Bytes this entry occupies in a `getdirentries` buffer: the record
    /// header, the name and its NUL, padded to 8 bytes.
    pub fn record_len(&self) -> u64 {
        let len = DIRENT_HEADER + self.name.len() + 1;
        len.next_multiple_of(8) as u64
    }
}

/// A directory hierarchy: a node per directory, files omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTree {
    /// The path as requested for the top node; the entry name below it.
    pub name: String,
    /// Subdirectories, sorted by name.
    pub subdirs: Vec<DirTree>,
}

impl DirTree {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subdirs: Vec::new(),
        }
    }

    /// Number of directories in the tree, this one included.
    pub fn dir_count(&self) -> usize {
        1 + self.subdirs.iter().map(DirTree::dir_count).sum::<usize>()
    }

    /// Direct subdirectory named `name`.
    pub fn child(&self, name: &str) -> Option<&DirTree> {
        self.subdirs.iter().find(|d| d.name == name)
    }
}
