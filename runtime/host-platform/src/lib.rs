//! # Host Platform Abstraction Layer
//!
//! The msgdev core never talks to a kernel directly. Everything it consumes
//! from the host is expressed here as a trait:
//! - **Device registration**: device-number regions, device classes, device
//!   nodes and character-device bindings ([`DeviceHost`])
//! - **User copy**: moving bytes across the client/kernel boundary
//!   ([`UserSliceReader`], [`UserSliceWriter`])
//! - **Dispatch**: the operation table the host calls into ([`FileOperations`])
//!
//! The mock backend traces through the `log` facade; a real host decides
//! where its own diagnostics land.
//!
//! ## Build Modes
//!
//! ```bash
//! # Mock (default - in-memory host kernel for tests)
//! cargo build -p host-platform
//!
//! # Interfaces only (bring your own host)
//! cargo build -p host-platform --no-default-features
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod device;
pub mod errno;
pub mod uaccess;

#[cfg(feature = "mock")]
pub mod mock;

pub use device::{
    Binding, ClassHandle, DeviceHost, DeviceNumber, FileOperations, HostStep, NodeHandle,
    MAX_MAJOR, MINOR_BITS,
};
pub use errno::Errno;
pub use uaccess::{UserSliceReader, UserSliceWriter};

use alloc::string::String;
use thiserror::Error;

/// Failures reported by the host kernel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Device number region unavailable: {name}")]
    RegionUnavailable { name: String },

    #[error("Failed to create device class: {name}")]
    ClassCreation { name: String },

    #[error("Failed to create device node: {name}")]
    NodeCreation { name: String },

    #[error("Failed to bind character device {number}")]
    BindFailed { number: DeviceNumber },

    #[error("Failed to register character device {number}")]
    RegistrationFailed { number: DeviceNumber },

    #[error("Bad address in client buffer")]
    BadAddress,

    #[error("Invalid device path: {path}")]
    InvalidPath { path: String },
}

pub type Result<T> = core::result::Result<T, HostError>;

/// Platform configuration and detection
pub mod config {
    /// Which host backend is compiled in
    pub fn platform_mode() -> &'static str {
        if is_mock() {
            "mock"
        } else {
            "external"
        }
    }

    /// Check if the in-memory mock host is available
    pub const fn is_mock() -> bool {
        cfg!(feature = "mock")
    }
}
