//! POSIX error numbers as carried on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// POSIX error number.
///
/// A transparent wrapper around the positive errno value. Results travel to
/// clients as the negated value (see [`Errno::as_neg`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(transparent)]
pub struct Errno(u8);

impl Errno {
    /// Operation not permitted.
    pub const EPERM: Self = Self(1);
    /// No such file or directory.
    pub const ENOENT: Self = Self(2);
    /// I/O error.
    pub const EIO: Self = Self(5);
    /// Bad file number.
    pub const EBADF: Self = Self(9);
    /// Permission denied.
    pub const EACCES: Self = Self(13);
    /// Bad address.
    pub const EFAULT: Self = Self(14);
    /// Device or resource busy.
    pub const EBUSY: Self = Self(16);
    /// File exists.
    pub const EEXIST: Self = Self(17);
    /// Not a directory.
    pub const ENOTDIR: Self = Self(20);
    /// Is a directory.
    pub const EISDIR: Self = Self(21);
    /// Invalid argument.
    pub const EINVAL: Self = Self(22);

    const KNOWN: [Self; 11] = [
        Self::EPERM,
        Self::ENOENT,
        Self::EIO,
        Self::EBADF,
        Self::EACCES,
        Self::EFAULT,
        Self::EBUSY,
        Self::EEXIST,
        Self::ENOTDIR,
        Self::EISDIR,
        Self::EINVAL,
    ];

    /// Provide the negative integer representation of the error.
    ///
    /// ```
    /// # use remora_types::Errno;
    /// assert_eq!(-9, Errno::EBADF.as_neg());
    /// ```
    pub fn as_neg(self) -> i32 {
        -i32::from(self.0)
    }

    /// Interpret a negative result code as an errno, if it names one we know.
    pub fn from_result(code: i64) -> Option<Self> {
        let value = u8::try_from(code.checked_neg()?).ok()?;
        Self::KNOWN.into_iter().find(|e| e.0 == value)
    }

    /// Symbolic name and description.
    pub fn as_str(self) -> &'static str {
        match self.0 {
            1 => "EPERM: Operation not permitted",
            2 => "ENOENT: No such file or directory",
            5 => "EIO: I/O error",
            9 => "EBADF: Bad file number",
            13 => "EACCES: Permission denied",
            14 => "EFAULT: Bad address",
            16 => "EBUSY: Device or resource busy",
            17 => "EEXIST: File exists",
            20 => "ENOTDIR: Not a directory",
            21 => "EISDIR: Is a directory",
            22 => "EINVAL: Invalid argument",
            _ => "unknown error",
        }
    }
}

impl From<Errno> for i32 {
    fn from(e: Errno) -> Self {
        e.0.into()
    }
}

impl std::fmt::Display for Errno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Errno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Errno({} = {})", self.0, self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_codes_match_posix() {
        assert_eq!(Errno::EPERM.as_neg(), -1);
        assert_eq!(Errno::ENOENT.as_neg(), -2);
        assert_eq!(Errno::EIO.as_neg(), -5);
        assert_eq!(Errno::EBADF.as_neg(), -9);
        assert_eq!(Errno::EFAULT.as_neg(), -14);
        assert_eq!(Errno::EBUSY.as_neg(), -16);
        assert_eq!(Errno::EEXIST.as_neg(), -17);
        assert_eq!(Errno::ENOTDIR.as_neg(), -20);
        assert_eq!(Errno::EISDIR.as_neg(), -21);
        assert_eq!(Errno::EINVAL.as_neg(), -22);
    }

    #[test]
    fn from_result_recognises_known_codes() {
        assert_eq!(Errno::from_result(-21), Some(Errno::EISDIR));
        assert_eq!(Errno::from_result(-13), Some(Errno::EACCES));
        assert_eq!(Errno::from_result(0), None);
        assert_eq!(Errno::from_result(1001), None);
        assert_eq!(Errno::from_result(-99), None);
        assert_eq!(Errno::from_result(i64::MIN), None);
    }

    #[test]
    fn display_names_the_error() {
        assert!(Errno::EBADF.to_string().starts_with("EBADF"));
        assert!(format!("{:?}", Errno::EEXIST).contains("17"));
    }
}
