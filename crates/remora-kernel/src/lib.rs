//! # remora-kernel
//!
//! Server-side core of the remora remote file service.
//!
//! - [`DescriptorTable`] - process-wide descriptor → open-file map with a
//!   monotonic allocator
//! - [`FileService`] - open/close/read/write/lseek/unlink/stat and directory
//!   listings over local storage, with failures classified as [`FsError`]
//! - [`Session`] - per-client handler that turns outcomes into POSIX-style
//!   signed result codes
//!
//! ## Design Decisions
//!
//! - **Server-held cursors**: every open creates an independent handle whose
//!   cursor only that descriptor moves.
//! - **Never-reused descriptors**: values start above 1000 and only grow.
//! - **Per-descriptor locking**: operations on one descriptor serialize;
//!   operations on different descriptors never wait on each other.

mod config;
mod error;
mod path;
mod service;
mod session;
mod table;

pub use config::{DEFAULT_MAX_TRANSFER, ServiceConfig};
pub use error::{FsError, FsResult};
pub use path::PathResolver;
pub use service::{DirListing, FileService};
pub use session::Session;
pub use table::{AccessMode, DESCRIPTOR_BASE, DescriptorTable, Fd, OpenFile};
