//! Operation enumerants: open modes and seek origins.
//!
//! Both travel on the wire as raw `u32` values so that an unrecognised
//! enumerant reaches the service and can be rejected with `EINVAL`.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// How a path is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenMode {
    /// Read-only. Directories may be opened this way.
    Read,
    /// Read-write on an existing regular file.
    Write,
    /// Read-write, creating the file if it is absent.
    Create,
    /// Read-write, failing if the path already exists.
    CreateNew,
}

impl OpenMode {
    /// Wire value of this mode.
    pub fn to_raw(self) -> u32 {
        match self {
            OpenMode::Read => 0,
            OpenMode::Write => 1,
            OpenMode::Create => 2,
            OpenMode::CreateNew => 3,
        }
    }

    /// True for the modes that may create the file.
    pub fn creates(self) -> bool {
        matches!(self, OpenMode::Create | OpenMode::CreateNew)
    }
}

impl TryFrom<u32> for OpenMode {
    type Error = UnknownEnumerant;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(OpenMode::Read),
            1 => Ok(OpenMode::Write),
            2 => Ok(OpenMode::Create),
            3 => Ok(OpenMode::CreateNew),
            other => Err(UnknownEnumerant { kind: "open mode", raw: other }),
        }
    }
}

/// Reference point for a seek offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Whence {
    /// Offset is absolute.
    FromStart,
    /// Offset is relative to the current cursor.
    FromCurrent,
    /// Offset is relative to the file length.
    FromEnd,
}

impl Whence {
    /// Wire value, matching `SEEK_SET`/`SEEK_CUR`/`SEEK_END`.
    pub fn to_raw(self) -> u32 {
        match self {
            Whence::FromStart => 0,
            Whence::FromCurrent => 1,
            Whence::FromEnd => 2,
        }
    }
}

impl TryFrom<u32> for Whence {
    type Error = UnknownEnumerant;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Whence::FromStart),
            1 => Ok(Whence::FromCurrent),
            2 => Ok(Whence::FromEnd),
            other => Err(UnknownEnumerant { kind: "whence", raw: other }),
        }
    }
}

/// A raw enumerant that maps to no known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {kind}: {raw}")]
pub struct UnknownEnumerant {
    pub kind: &'static str,
    pub raw: u32,
}
