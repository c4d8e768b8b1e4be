//! TCP listener and connection factory.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use remora_kernel::FileService;

use crate::config::ServerConfig;
use crate::connection::ConnectionHandler;

/// Remote file server.
///
/// Owns the single [`FileService`] for the process; every accepted
/// connection gets its own [`ConnectionHandler`] and session, served on its
/// own task.
pub struct FileServer {
    listener: TcpListener,
    service: Arc<FileService>,
    max_frame_length: usize,
}

impl FileServer {
    /// Bind the listening socket.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        config.validate().map_err(io::Error::other)?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        Ok(Self {
            listener,
            service: Arc::new(FileService::new(config.service)),
            max_frame_length: config.max_frame_length,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> &Arc<FileService> {
        &self.service
    }

    /// Accept connections forever.
    pub async fn run(self) -> io::Result<()> {
        tracing::info!("remora server listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    // Per-connection failures (e.g. fd exhaustion) must not
                    // take down the listener.
                    tracing::warn!("accept failed: {e}");
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(%peer, "set_nodelay failed: {e}");
            }

            let handler = self.new_client(peer);
            tokio::spawn(handler.run(stream));
        }
    }

    /// Create the handler for a newly accepted client.
    fn new_client(&self, peer: SocketAddr) -> ConnectionHandler {
        let session = self.service.new_session();
        tracing::info!(%peer, session = session.id(), "new connection");
        ConnectionHandler::new(peer, session, self.max_frame_length)
    }
}
