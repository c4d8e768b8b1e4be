//! Server configuration, loadable from TOML.
//!
//! ```toml
//! bind_addr = "0.0.0.0:15440"
//! max_frame_length = 8388608
//!
//! [service]
//! root = "/srv/remora"
//! max_transfer = 1048576
//! close_on_session_end = false
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use remora_kernel::ServiceConfig;

use crate::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_MAX_FRAME_LENGTH, DEFAULT_PORT};

/// Configuration load failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("max_frame_length ({frame}) must exceed service.max_transfer ({transfer})")]
    FrameTooSmall { frame: usize, transfer: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_frame_length: usize,
    pub service: ServiceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((DEFAULT_BIND_ADDRESS, DEFAULT_PORT)),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            service: ServiceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Localhost on an OS-assigned port (for testing).
    pub fn ephemeral() -> Self {
        Self {
            bind_addr: SocketAddr::from((DEFAULT_BIND_ADDRESS, 0)),
            ..Self::default()
        }
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads must fit in a response frame.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_length <= self.service.max_transfer {
            return Err(ConfigError::FrameTooSmall {
                frame: self.max_frame_length,
                transfer: self.service.max_transfer,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(!config.service.close_on_session_end);
        assert!(config.service.root.is_none());
    }

    #[test]
    fn service_table_overrides() {
        let config = ServerConfig::from_toml(
            r#"
            bind_addr = "0.0.0.0:9000"

            [service]
            root = "/srv/remora"
            close_on_session_end = true
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.service.root.as_deref(), Some(Path::new("/srv/remora")));
        assert!(config.service.close_on_session_end);
        assert_eq!(config.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
    }

    #[test]
    fn frame_must_hold_a_full_read() {
        let err = ServerConfig::from_toml(
            r#"
            max_frame_length = 1024

            [service]
            max_transfer = 4096
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FrameTooSmall { frame: 1024, transfer: 4096 }));
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(matches!(
            ServerConfig::from_toml("max_frame_length = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ServerConfig::load(Path::new("/nonexistent/remora.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/remora.toml"));
    }
}
