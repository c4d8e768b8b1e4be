//! # remora-client
//!
//! Async client for the remora remote file service.
//!
//! Each method sends one request and waits for its response. Operation
//! outcomes are returned exactly as the server reports them: non-negative on
//! success, a negated errno on failure (see [`remora_types::Errno`]). Only
//! transport failures surface as [`ClientError`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), remora_client::ClientError> {
//! use remora_client::RemoteFiles;
//! use remora_types::{OpenMode, Whence};
//!
//! let mut files = RemoteFiles::connect("127.0.0.1:15440").await?;
//! let fd = files.open(Some("/tmp/greeting"), OpenMode::Create).await?;
//! files.write(fd, b"hello").await?;
//! files.lseek(fd, 0, Whence::FromStart).await?;
//! let (n, data) = files.read(fd, 5).await?;
//! assert_eq!((n, data.as_slice()), (5, &b"hello"[..]));
//! files.close(fd).await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use remora_types::{
    DirEntry, DirTree, Errno, FileAttr, OpenMode, ProtocolError, Request, Response, Whence,
    protocol,
};

/// Largest response frame the client accepts by default.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Transport-level client failure.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server closed the connection")]
    Disconnected,

    #[error("unexpected response to {op}: {response:?}")]
    UnexpectedResponse { op: &'static str, response: Response },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A connection to a remora server.
pub struct RemoteFiles {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl RemoteFiles {
    pub async fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        Self::connect_with_limit(addr, DEFAULT_MAX_FRAME_LENGTH).await
    }

    pub async fn connect_with_limit(
        addr: impl ToSocketAddrs,
        max_frame_length: usize,
    ) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let codec = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .max_frame_length(max_frame_length)
            .new_codec();
        Ok(Self {
            framed: Framed::new(stream, codec),
        })
    }

    /// Send a raw request and wait for its response.
    pub async fn call(&mut self, request: &Request) -> ClientResult<Response> {
        let body = protocol::encode(request)?;
        self.framed.send(Bytes::from(body)).await?;

        let frame = self.framed.next().await.ok_or(ClientError::Disconnected)??;
        let response: Response = protocol::decode(&frame)?;
        tracing::trace!(op = request.op_name(), ?response, "response");
        if let Some(errno) = Errno::from_result(response.result()) {
            tracing::debug!(op = request.op_name(), %errno, "remote call failed");
        }
        Ok(response)
    }

    async fn status(&mut self, request: Request) -> ClientResult<i64> {
        match self.call(&request).await? {
            Response::Status(result) => Ok(result),
            response => Err(ClientError::UnexpectedResponse {
                op: request.op_name(),
                response,
            }),
        }
    }

    /// Open `path`; returns a descriptor or a negative errno.
    pub async fn open(&mut self, path: Option<&str>, mode: OpenMode) -> ClientResult<i32> {
        self.open_raw(path, mode.to_raw()).await
    }

    /// Open with a raw mode enumerant.
    pub async fn open_raw(&mut self, path: Option<&str>, mode: u32) -> ClientResult<i32> {
        let result = self
            .status(Request::Open {
                path: path.map(str::to_owned),
                mode,
            })
            .await?;
        Ok(result as i32)
    }

    /// Close `fd`; returns 0 or a negative errno.
    pub async fn close(&mut self, fd: i32) -> ClientResult<i32> {
        Ok(self.status(Request::Close { fd }).await? as i32)
    }

    /// Write `data` at the cursor; returns bytes written or a negative errno.
    pub async fn write(&mut self, fd: i32, data: &[u8]) -> ClientResult<i64> {
        self.status(Request::Write {
            fd,
            data: data.to_vec(),
        })
        .await
    }

    /// Read up to `capacity` bytes; returns the count (0 at end-of-file) and
    /// the data, or a negative errno and no data.
    pub async fn read(&mut self, fd: i32, capacity: u64) -> ClientResult<(i64, Vec<u8>)> {
        self.read_into(fd, Some(capacity)).await
    }

    /// Read with an optional destination; `None` models a missing buffer.
    pub async fn read_into(
        &mut self,
        fd: i32,
        capacity: Option<u64>,
    ) -> ClientResult<(i64, Vec<u8>)> {
        let request = Request::Read { fd, capacity };
        match self.call(&request).await? {
            Response::Data { result, bytes } => Ok((result, bytes)),
            response => Err(ClientError::UnexpectedResponse { op: "read", response }),
        }
    }

    /// Move the cursor; returns the new position or a negative errno.
    pub async fn lseek(&mut self, fd: i32, offset: i64, whence: Whence) -> ClientResult<i64> {
        self.lseek_raw(fd, offset, whence.to_raw()).await
    }

    /// Seek with a raw whence enumerant.
    pub async fn lseek_raw(&mut self, fd: i32, offset: i64, whence: u32) -> ClientResult<i64> {
        self.status(Request::Lseek { fd, offset, whence }).await
    }

    /// Remove `path`; returns 0 or a negative errno.
    pub async fn unlink(&mut self, path: Option<&str>) -> ClientResult<i32> {
        let result = self
            .status(Request::Unlink {
                path: path.map(str::to_owned),
            })
            .await?;
        Ok(result as i32)
    }

    /// Attributes of `path`; returns 0 and the attributes, or a negative errno.
    pub async fn stat(&mut self, path: Option<&str>) -> ClientResult<(i32, Option<FileAttr>)> {
        let request = Request::Stat {
            path: path.map(str::to_owned),
        };
        match self.call(&request).await? {
            Response::Attr { result, attr } => Ok((result as i32, attr)),
            response => Err(ClientError::UnexpectedResponse { op: "stat", response }),
        }
    }

    /// List a directory descriptor from `base`, at most `nbytes` of records.
    /// Returns the record bytes (0 at the end), the next base and the
    /// entries; or a negative errno, `base` unchanged and no entries.
    pub async fn get_dir_entries(
        &mut self,
        fd: i32,
        nbytes: u64,
        base: u64,
    ) -> ClientResult<(i64, u64, Vec<DirEntry>)> {
        let request = Request::GetDirEntries { fd, nbytes, base };
        match self.call(&request).await? {
            Response::Entries {
                result,
                base,
                entries,
            } => Ok((result, base, entries)),
            response => Err(ClientError::UnexpectedResponse {
                op: "getdirentries",
                response,
            }),
        }
    }

    /// The directory hierarchy under `path`; 0 and the tree, or a negative
    /// errno.
    pub async fn get_dir_tree(
        &mut self,
        path: Option<&str>,
    ) -> ClientResult<(i32, Option<DirTree>)> {
        let request = Request::GetDirTree {
            path: path.map(str::to_owned),
        };
        match self.call(&request).await? {
            Response::Tree { result, tree } => Ok((result as i32, tree)),
            response => Err(ClientError::UnexpectedResponse {
                op: "getdirtree",
                response,
            }),
        }
    }
}
