//! remora server library
//!
//! TCP transport for the remora file service: accepts client connections,
//! decodes framed requests, and runs them against a per-connection session.

pub mod config;
pub mod connection;
pub mod constants;
pub mod dispatch;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use connection::{ConnectionHandler, frame_codec};
pub use dispatch::dispatch;
pub use server::FileServer;
