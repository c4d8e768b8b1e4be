//! # remora-types
//!
//! Types shared by the remora server and client: open modes and seek origins,
//! POSIX error numbers, file attributes, directory listings, and the
//! request/response protocol.

mod attr;
mod errno;
mod ops;
pub mod protocol;

pub use attr::{DirEntry, DirTree, FileAttr, FileType};
pub use errno::Errno;
pub use ops::{OpenMode, UnknownEnumerant, Whence};
pub use protocol::{ProtocolError, Request, Response};
