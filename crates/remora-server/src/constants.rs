//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default TCP port for the remora server.
pub const DEFAULT_PORT: u16 = 15440;

/// Default bind address (localhost only for security).
pub const DEFAULT_BIND_ADDRESS: [u8; 4] = [127, 0, 0, 1];

/// Environment variable consulted for the port when none is given on the
/// command line.
pub const PORT_ENV: &str = "REMORA_PORT";

/// Largest frame accepted or sent. Must exceed the service's maximum read
/// transfer plus encoding overhead.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;
