//! Client-visible error codes
//!
//! Operation-table entry points report failures the way a kernel does: as a
//! positive errno value that the client sees negated.

use thiserror::Error;

/// Kernel error number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("errno {0}")]
pub struct Errno(i32);

impl Errno {
    /// No such file or directory
    pub const ENOENT: Errno = Errno(2);
    /// Bad address
    pub const EFAULT: Errno = Errno(14);
    /// Device or resource busy
    pub const EBUSY: Errno = Errno(16);
    /// No such device
    pub const ENODEV: Errno = Errno(19);
    /// Invalid argument
    pub const EINVAL: Errno = Errno(22);

    /// Positive errno value
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Result code as returned to the client (`-14` for `EFAULT`)
    pub const fn as_negative(self) -> isize {
        -(self.0 as isize)
    }
}

impl From<crate::HostError> for Errno {
    fn from(err: crate::HostError) -> Self {
        use crate::HostError;

        match err {
            HostError::BadAddress => Errno::EFAULT,
            HostError::InvalidPath { .. } => Errno::ENOENT,
            HostError::RegionUnavailable { .. } | HostError::RegistrationFailed { .. } => {
                Errno::EBUSY
            }
            HostError::ClassCreation { .. }
            | HostError::NodeCreation { .. }
            | HostError::BindFailed { .. } => Errno::ENODEV,
        }
    }
}
