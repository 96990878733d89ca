//! Device naming configuration
//!
//! The three kernel-visible names share a prefix: `<prefix>_proc` for the
//! device-number region, `<prefix>_sys` for the class and `<prefix>_dev` for
//! the node clients open.

use alloc::format;
use alloc::string::String;

/// Prefix used by [`DeviceConfig::default`]
pub const DEFAULT_PREFIX: &str = "hubert";

/// Names under which the device registers with the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device-number region name
    pub region_name: String,

    /// Device class name
    pub class_name: String,

    /// Device node name, reachable as `/dev/<node_name>`
    pub node_name: String,
}

impl DeviceConfig {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            region_name: format!("{prefix}_proc"),
            class_name: format!("{prefix}_sys"),
            node_name: format!("{prefix}_dev"),
        }
    }

    /// Path clients open
    pub fn node_path(&self) -> String {
        format!("/dev/{}", self.node_name)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }
}
