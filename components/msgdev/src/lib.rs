//! msgdev - Single-slot message character device
//!
//! # Purpose
//! Exposes one in-memory message buffer through an open/read/write/release
//! character-device interface. A write stores a message of up to
//! [`MESSAGE_CAPACITY`] bytes, the next read hands it out and empties the
//! buffer.
//!
//! # Integration Points
//! - Depends on: a host kernel implementing [`host_platform::DeviceHost`]
//! - Provides to: the host's dispatcher, as a [`host_platform::FileOperations`] table
//! - Registers: one device-number region, one class, one node
//!   (`/dev/hubert_dev` by default)
//!
//! # Architecture
//! - [`registrar`]: ordered acquisition of the kernel-visible resources and
//!   reverse-order teardown of whatever was acquired
//! - [`session`]: the operation table over a lock-guarded [`MessageBuffer`]
//!   and an atomic open counter
//! - [`MessageDevice`]: owns both for the lifetime of the loaded device;
//!   dropping it unregisters the device
//!
//! # Testing Strategy
//! - Unit tests: buffer contract, session operations, teardown ordering
//! - Integration tests: full device lifecycle against `host_platform::mock`
//! - Benchmarks: write/read round trip (criterion)
//!
//! # Example
//! ```ignore
//! let host = MockHost::new();
//! let device = MessageDevice::load(&host, DeviceConfig::default())?;
//!
//! let mut file = host.open("/dev/hubert_dev")?;
//! file.write(b"hello")?;
//! assert_eq!(file.read(256)?, b"hello");
//!
//! device.unload();
//! ```

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;

pub mod buffer;
pub mod config;
pub mod error;
pub mod registrar;
pub mod session;

pub use buffer::{MessageBuffer, MESSAGE_CAPACITY};
pub use config::{DeviceConfig, DEFAULT_PREFIX};
pub use error::{InitError, InitStep, ReadError, WriteError};
pub use registrar::{DeviceRegistration, Resources};
pub use session::SessionManager;

use host_platform::{DeviceHost, DeviceNumber};

/// Diagnostic snapshot of a loaded device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    /// Opens counted since load
    pub opens: usize,

    /// Length of the buffered message
    pub message_len: usize,

    /// Host dispatches to the device
    pub live: bool,
}

/// A loaded message device
///
/// Created by [`MessageDevice::load`] (module init), taken down by
/// [`MessageDevice::unload`] or on drop (module exit).
pub struct MessageDevice<H: DeviceHost> {
    host: H,
    config: DeviceConfig,
    sessions: Arc<SessionManager>,
    registration: DeviceRegistration,
}

impl<H: DeviceHost> MessageDevice<H> {
    /// Register a fresh device with `host`
    ///
    /// # Errors
    /// Returns the first failing registration step. Nothing is left
    /// registered with the host in that case.
    pub fn load(host: H, config: DeviceConfig) -> Result<Self, InitError> {
        log::info!("msgdev: initializing {}", config.node_name);

        let sessions = Arc::new(SessionManager::new());
        let registration = DeviceRegistration::initialize(&host, &config, sessions.clone())?;

        Ok(Self {
            host,
            config,
            sessions,
            registration,
        })
    }

    /// Unregister the device and release all host resources
    pub fn unload(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.registration.resources().is_empty() {
            return;
        }
        self.registration.teardown(&self.host, true);
        log::info!("msgdev: {} unloaded", self.config.node_name);
    }

    pub fn number(&self) -> DeviceNumber {
        self.registration.number()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Path clients open
    pub fn node_path(&self) -> String {
        self.config.node_path()
    }

    /// Operation table the host dispatches to
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn resources(&self) -> Resources {
        self.registration.resources()
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            opens: self.sessions.open_count(),
            message_len: self.sessions.message_len(),
            live: self.registration.is_live(),
        }
    }
}

impl<H: DeviceHost> Drop for MessageDevice<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
