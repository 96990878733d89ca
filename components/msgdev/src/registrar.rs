//! Device Registrar
//!
//! Brings the device's kernel-visible identity into existence in five host
//! steps and takes it down again. Every acquired resource is recorded in
//! [`Resources`] as soon as the host hands it out, so one teardown routine
//! serves both a full unload and the cleanup of a partially initialized
//! device: it releases exactly what the set says exists, in reverse order.

use alloc::sync::Arc;

use bitflags::bitflags;
use host_platform::{Binding, ClassHandle, DeviceHost, DeviceNumber, FileOperations, HostStep, NodeHandle};

use crate::config::DeviceConfig;
use crate::error::InitError;

bitflags! {
    /// Resources a registration currently holds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Resources: u8 {
        /// Device-number region reserved
        const REGION = 1 << 0;
        /// Device class created
        const CLASS = 1 << 1;
        /// Device node created
        const NODE = 1 << 2;
        /// Operation table bound
        const BINDING = 1 << 3;
        /// Binding registered, host dispatches to it
        const LIVE = 1 << 4;
    }
}

impl Resources {
    /// Resource created by `step`
    pub const fn created_by(step: HostStep) -> Resources {
        match step {
            HostStep::ReserveRegion => Resources::REGION,
            HostStep::CreateClass => Resources::CLASS,
            HostStep::CreateNode => Resources::NODE,
            HostStep::BindCharDevice => Resources::BINDING,
            HostStep::RegisterBinding => Resources::LIVE,
        }
    }

    /// Resources created by the steps before `step`
    pub fn before(step: HostStep) -> Resources {
        HostStep::ALL
            .iter()
            .take_while(|earlier| **earlier < step)
            .fold(Resources::empty(), |acc, earlier| {
                acc | Resources::created_by(*earlier)
            })
    }
}

/// Kernel-visible identity of the device
#[derive(Debug)]
pub struct DeviceRegistration {
    number: DeviceNumber,
    class: Option<ClassHandle>,
    node: Option<NodeHandle>,
    binding: Option<Binding>,
    resources: Resources,
}

impl DeviceRegistration {
    /// Register the device with `host`, dispatching to `ops`
    ///
    /// Steps run in order: reserve region, create class, create node, bind
    /// `ops`, register the binding. The first failing step stops the
    /// sequence; everything acquired before it is released before the error
    /// is returned. No step is retried.
    pub fn initialize<H>(
        host: &H,
        config: &DeviceConfig,
        ops: Arc<dyn FileOperations>,
    ) -> Result<Self, InitError>
    where
        H: DeviceHost + ?Sized,
    {
        let number = host
            .reserve_region(&config.region_name)
            .map_err(InitError::at(HostStep::ReserveRegion))
            .inspect_err(|err| log::warn!("msgdev: {}, nothing to clean up", err))?;

        let mut registration = Self {
            number,
            class: None,
            node: None,
            binding: None,
            resources: Resources::REGION,
        };

        match registration.acquire(host, config, ops) {
            Ok(()) => {
                log::info!("msgdev: registered {} as {}", config.node_name, number);
                Ok(registration)
            }
            Err(err) => {
                log::warn!("msgdev: {}, something went wrong, cleaning up", err);
                registration.teardown(host, false);
                Err(err)
            }
        }
    }

    /// Steps after the region reservation
    fn acquire<H>(
        &mut self,
        host: &H,
        config: &DeviceConfig,
        ops: Arc<dyn FileOperations>,
    ) -> Result<(), InitError>
    where
        H: DeviceHost + ?Sized,
    {
        let class = host
            .create_class(&config.class_name)
            .map_err(InitError::at(HostStep::CreateClass))?;
        let class = self.class.insert(class);
        self.resources.insert(Resources::CLASS);

        let node = host
            .create_node(class, self.number, &config.node_name)
            .map_err(InitError::at(HostStep::CreateNode))?;
        self.node = Some(node);
        self.resources.insert(Resources::NODE);

        let binding = host
            .bind_char_device(self.number, ops)
            .map_err(InitError::at(HostStep::BindCharDevice))?;
        let binding = self.binding.insert(binding);
        self.resources.insert(Resources::BINDING);

        host.register_binding(binding)
            .map_err(InitError::at(HostStep::RegisterBinding))?;
        self.resources.insert(Resources::LIVE);

        Ok(())
    }

    /// Release every held resource, newest first
    ///
    /// `fully_initialized` is what the caller believes: `true` on unload,
    /// `false` when cleaning up after a failed initialization. The recorded
    /// resource set decides what is actually released; a mismatch is only
    /// logged. Returns the set that was released. Calling it again releases
    /// nothing.
    pub fn teardown<H>(&mut self, host: &H, fully_initialized: bool) -> Resources
    where
        H: DeviceHost + ?Sized,
    {
        let held = self.resources;
        if !held.is_empty() && held.is_all() != fully_initialized {
            log::warn!(
                "msgdev: teardown expected {} registration, holding {:?}",
                if fully_initialized { "a full" } else { "a partial" },
                held
            );
        }

        if let Some(binding) = self.binding.take() {
            if self.resources.contains(Resources::LIVE) {
                host.unregister_binding(&binding);
                self.resources.remove(Resources::LIVE);
            }
            host.remove_binding(binding);
            self.resources.remove(Resources::BINDING);
        }

        if self.node.take().is_some() {
            // A node only exists under a class
            if let Some(class) = self.class.as_ref() {
                host.destroy_node(class, self.number);
            }
            self.resources.remove(Resources::NODE);
        }

        if let Some(class) = self.class.take() {
            host.destroy_class(class);
            self.resources.remove(Resources::CLASS);
        }

        if self.resources.contains(Resources::REGION) {
            host.release_region(self.number);
            self.resources.remove(Resources::REGION);
        }

        if !held.is_empty() {
            log::debug!("msgdev: released {:?}", held);
        }
        held
    }

    /// Device number handed out by the region reservation
    pub fn number(&self) -> DeviceNumber {
        self.number
    }

    pub fn resources(&self) -> Resources {
        self.resources
    }

    /// True once the host dispatches to the device
    pub fn is_live(&self) -> bool {
        self.resources.contains(Resources::LIVE)
    }
}
