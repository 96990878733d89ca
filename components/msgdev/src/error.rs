//! Error types for device initialization and transfers

use host_platform::{Errno, HostError, HostStep};
use thiserror::Error;

/// Resource-creation step of device initialization
pub type InitStep = HostStep;

/// A resource-creation step failed during initialization
///
/// Resources created before `step` have already been released when this
/// error is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Device initialization failed at step {} ({step})", .step.ordinal())]
pub struct InitError {
    pub step: InitStep,
    pub source: HostError,
}

impl InitError {
    /// Adapter for `map_err` at a given step
    pub(crate) fn at(step: InitStep) -> impl FnOnce(HostError) -> InitError {
        move |source| InitError { step, source }
    }
}

/// Read failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Copy to the client failed; the message is still buffered
    #[error("Bad address: failed to send message to the client")]
    BadAddress,
}

/// Write failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("Message too large ({requested} bytes, capacity {capacity})")]
    TooLarge { requested: usize, capacity: usize },

    /// Copy from the client failed; the buffer is unchanged
    #[error("Bad address: failed to receive message from the client")]
    BadAddress,
}

impl From<ReadError> for Errno {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::BadAddress => Errno::EFAULT,
        }
    }
}

impl From<WriteError> for Errno {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::TooLarge { .. } => Errno::EINVAL,
            WriteError::BadAddress => Errno::EFAULT,
        }
    }
}
