//! Per-connection handler.
//!
//! Frames are a 4-byte big-endian length followed by a postcard body. Requests
//! are served strictly in order; each produces exactly one response frame. A
//! result too large for one frame is replaced by an `EIO` failure.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use remora_kernel::Session;
use remora_types::{Errno, ProtocolError, Request, Response, protocol};

use crate::dispatch::dispatch;

/// Build the length-delimited frame codec.
pub fn frame_codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(max_frame_length)
        .new_codec()
}

/// Handler for a single client connection.
pub struct ConnectionHandler {
    peer: SocketAddr,
    session: Session,
    max_frame_length: usize,
}

impl ConnectionHandler {
    pub fn new(peer: SocketAddr, session: Session, max_frame_length: usize) -> Self {
        Self {
            peer,
            session,
            max_frame_length,
        }
    }

    /// Serve requests until the client disconnects or the stream fails, then
    /// notify the session that the client is done.
    pub async fn run(self, stream: TcpStream) {
        let mut framed = Framed::new(stream, frame_codec(self.max_frame_length));

        while let Some(frame) = framed.next().await {
            let body = match frame {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(peer = %self.peer, "frame error: {e}");
                    break;
                }
            };

            let (response, fallback) = match protocol::decode::<Request>(&body) {
                Ok(request) => {
                    tracing::trace!(peer = %self.peer, op = request.op_name(), "request");
                    let fallback = request.failure(Errno::EIO);
                    (dispatch(&self.session, request).await, fallback)
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer, "undecodable request: {e}");
                    let invalid = Response::Status(Errno::EINVAL.as_neg().into());
                    (invalid.clone(), invalid)
                }
            };

            let out = match self.encode_reply(&response, &fallback) {
                Ok(out) => out,
                Err(e) => {
                    tracing::error!(peer = %self.peer, "failed to encode response: {e}");
                    break;
                }
            };

            if let Err(e) = framed.send(Bytes::from(out)).await {
                tracing::warn!(peer = %self.peer, "send failed: {e}");
                break;
            }
        }

        tracing::info!(
            peer = %self.peer,
            session = self.session.id(),
            held = ?self.session.open_descriptors(),
            "connection closed"
        );
        self.session.client_done().await;
    }

    /// Encode `response`, or `fallback` when it would not fit in one frame.
    fn encode_reply(
        &self,
        response: &Response,
        fallback: &Response,
    ) -> Result<Vec<u8>, ProtocolError> {
        let out = protocol::encode(response)?;
        if out.len() <= self.max_frame_length {
            return Ok(out);
        }
        tracing::warn!(
            peer = %self.peer,
            len = out.len(),
            limit = self.max_frame_length,
            "response exceeds frame limit"
        );
        protocol::encode(fallback)
    }
}
