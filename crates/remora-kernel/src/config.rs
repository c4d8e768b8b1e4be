//! File service configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default cap on bytes returned by a single read.
pub const DEFAULT_MAX_TRANSFER: usize = 1024 * 1024;

/// Settings for a [`crate::FileService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory client paths are confined to. `None` uses paths as given.
    pub root: Option<PathBuf>,

    /// Largest read served in one call; larger capacities are clamped.
    pub max_transfer: usize,

    /// Close every descriptor a session still holds when it ends.
    ///
    /// Off by default: descriptors are process-wide and outlive the
    /// connection that opened them.
    pub close_on_session_end: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_transfer: DEFAULT_MAX_TRANSFER,
            close_on_session_end: false,
        }
    }
}

impl ServiceConfig {
    /// Config confined to `root`, otherwise default.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }
}
