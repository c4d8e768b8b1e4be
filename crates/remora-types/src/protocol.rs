//! Request/response messages exchanged between client and server.
//!
//! Each message is one postcard-encoded frame body; framing (a 4-byte
//! big-endian length prefix) is the transport's concern.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attr::{DirEntry, DirTree, FileAttr};
use crate::errno::Errno;

/// A client request. One request produces exactly one [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// `open(path, mode)`; `mode` is a raw [`crate::OpenMode`] enumerant.
    Open { path: Option<String>, mode: u32 },
    /// `close(fd)`.
    Close { fd: i32 },
    /// `write(fd, data)`.
    Write { fd: i32, data: Vec<u8> },
    /// `read(fd, capacity)`; an absent capacity means no destination buffer.
    Read { fd: i32, capacity: Option<u64> },
    /// `lseek(fd, offset, whence)`; `whence` is a raw [`crate::Whence`] enumerant.
    Lseek { fd: i32, offset: i64, whence: u32 },
    /// `unlink(path)`.
    Unlink { path: Option<String> },
    /// `stat(path)`.
    Stat { path: Option<String> },
    /// `getdirentries(fd, nbytes, basep)` on a directory descriptor.
    GetDirEntries { fd: i32, nbytes: u64, base: u64 },
    /// `getdirtree(path)`.
    GetDirTree { path: Option<String> },
}

impl Request {
    /// Operation name, for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            Request::Open { .. } => "open",
            Request::Close { .. } => "close",
            Request::Write { .. } => "write",
            Request::Read { .. } => "read",
            Request::Lseek { .. } => "lseek",
            Request::Unlink { .. } => "unlink",
            Request::Stat { .. } => "stat",
            Request::GetDirEntries { .. } => "getdirentries",
            Request::GetDirTree { .. } => "getdirtree",
        }
    }

    /// A failure response shaped the way this request's caller expects.
    pub fn failure(&self, errno: Errno) -> Response {
        let result = i64::from(errno.as_neg());
        match self {
            Request::Read { .. } => Response::Data {
                result,
                bytes: Vec::new(),
            },
            Request::Stat { .. } => Response::Attr { result, attr: None },
            Request::GetDirEntries { base, .. } => Response::Entries {
                result,
                base: *base,
                entries: Vec::new(),
            },
            Request::GetDirTree { .. } => Response::Tree { result, tree: None },
            _ => Response::Status(result),
        }
    }
}

/// A server response. `result` values are non-negative on success and a
/// negated errno on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Result of open, close, write, lseek and unlink.
    Status(i64),
    /// Result of read: byte count (0 at end-of-file) and the bytes.
    Data { result: i64, bytes: Vec<u8> },
    /// Result of stat.
    Attr { result: i64, attr: Option<FileAttr> },
    /// Result of getdirentries: bytes consumed (0 at the end), the base to
    /// pass next time, and the entries.
    Entries {
        result: i64,
        base: u64,
        entries: Vec<DirEntry>,
    },
    /// Result of getdirtree.
    Tree { result: i64, tree: Option<DirTree> },
}

impl Response {
    /// The signed result code carried by any response variant.
    pub fn result(&self) -> i64 {
        match self {
            Response::Status(result) => *result,
            Response::Data { result, .. } => *result,
            Response::Attr { result, .. } => *result,
            Response::Entries { result, .. } => *result,
            Response::Tree { result, .. } => *result,
        }
    }
}

/// Codec failure.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("encode failed: {0}")]
    Encode(#[source] postcard::Error),

    #[error("decode failed: {0}")]
    Decode(#[source] postcard::Error),
}

/// Encode a message into a frame body.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    postcard::to_stdvec(msg).map_err(ProtocolError::Encode)
}

/// Decode a frame body.
pub fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ProtocolError> {
    postcard::from_bytes(body).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_request_survives_the_codec() {
        let req = Request::Write { fd: 1001, data: b"payload".to_vec() };
        let body = encode(&req).unwrap();
        let back: Request = decode(&body).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn absent_path_is_distinct_from_empty() {
        let absent = encode(&Request::Unlink { path: None }).unwrap();
        let empty = encode(&Request::Unlink { path: Some(String::new()) }).unwrap();
        assert_ne!(absent, empty);
    }

    #[test]
    fn truncated_body_is_a_decode_error() {
        let body = encode(&Request::Lseek { fd: 1001, offset: -4, whence: 2 }).unwrap();
        let err = decode::<Request>(&body[..body.len() - 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn result_reads_every_variant() {
        assert_eq!(Response::Status(-9).result(), -9);
        assert_eq!(Response::Data { result: 3, bytes: b"abc".to_vec() }.result(), 3);
        assert_eq!(Response::Attr { result: -2, attr: None }.result(), -2);
        assert_eq!(Response::Tree { result: -20, tree: None }.result(), -20);
    }

    #[test]
    fn failure_matches_the_expected_variant() {
        let read = Request::Read { fd: 1001, capacity: Some(8) };
        assert_eq!(
            read.failure(Errno::EBADF),
            Response::Data { result: -9, bytes: Vec::new() }
        );

        let list = Request::GetDirEntries { fd: 1001, nbytes: 512, base: 7 };
        assert_eq!(
            list.failure(Errno::EIO),
            Response::Entries { result: -5, base: 7, entries: Vec::new() }
        );

        let tree = Request::GetDirTree { path: None };
        assert_eq!(tree.failure(Errno::ENOENT), Response::Tree { result: -2, tree: None });
        assert_eq!(Request::Close { fd: 1 }.failure(Errno::EINVAL), Response::Status(-22));
    }
}
