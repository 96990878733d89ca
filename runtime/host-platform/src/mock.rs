//! In-memory host kernel for development and testing
//!
//! # WARNING: This is NOT a kernel!
//!
//! [`MockHost`] keeps a device table in memory and behaves like a host
//! kernel from the device's point of view:
//! - dynamic majors are handed out from 240 up to [`MAX_MAJOR`]
//! - class and node names must be unique
//! - only registered bindings receive dispatch
//!
//! Every registration call is journaled as a [`HostCall`] so tests can check
//! creation and teardown order. [`MockHost::fail_at`] makes one creation
//! step fail. [`MockHost::open`] plays the user-space client: it resolves a
//! `/dev/<node>` path and returns a [`MockFile`] that forwards read, write
//! and close into the bound operation table.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::device::{
    Binding, ClassHandle, DeviceHost, DeviceNumber, FileOperations, HostStep, NodeHandle, MAX_MAJOR,
};
use crate::uaccess::{UserSliceReader, UserSliceWriter};
use crate::{Errno, HostError, Result};

/// First major handed out for dynamic regions
pub const FIRST_DYNAMIC_MAJOR: u32 = 240;

/// Path prefix under which device nodes appear
pub const DEV_ROOT: &str = "/dev/";

/// One journaled host call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    ReserveRegion { name: String, ok: bool },
    CreateClass { name: String, ok: bool },
    CreateNode { name: String, number: DeviceNumber, ok: bool },
    BindCharDevice { number: DeviceNumber, ok: bool },
    RegisterBinding { number: DeviceNumber, ok: bool },
    UnregisterBinding { number: DeviceNumber },
    RemoveBinding { number: DeviceNumber },
    DestroyNode { number: DeviceNumber },
    DestroyClass { name: String },
    ReleaseRegion { number: DeviceNumber },
}

impl HostCall {
    /// Creation step this call performs, if it is a creation call
    pub fn creation_step(&self) -> Option<HostStep> {
        match self {
            HostCall::ReserveRegion { .. } => Some(HostStep::ReserveRegion),
            HostCall::CreateClass { .. } => Some(HostStep::CreateClass),
            HostCall::CreateNode { .. } => Some(HostStep::CreateNode),
            HostCall::BindCharDevice { .. } => Some(HostStep::BindCharDevice),
            HostCall::RegisterBinding { .. } => Some(HostStep::RegisterBinding),
            _ => None,
        }
    }

    /// Creation step this call undoes, if it is a teardown call
    pub fn undoes(&self) -> Option<HostStep> {
        match self {
            HostCall::UnregisterBinding { .. } => Some(HostStep::RegisterBinding),
            HostCall::RemoveBinding { .. } => Some(HostStep::BindCharDevice),
            HostCall::DestroyNode { .. } => Some(HostStep::CreateNode),
            HostCall::DestroyClass { .. } => Some(HostStep::CreateClass),
            HostCall::ReleaseRegion { .. } => Some(HostStep::ReserveRegion),
            _ => None,
        }
    }
}

struct NodeEntry {
    class_id: u32,
    number: DeviceNumber,
    name: String,
}

struct BindingEntry {
    number: DeviceNumber,
    ops: Arc<dyn FileOperations>,
    live: bool,
}

struct MockState {
    next_major: u32,
    next_id: u32,
    regions: BTreeMap<DeviceNumber, String>,
    classes: BTreeMap<u32, String>,
    nodes: Vec<NodeEntry>,
    bindings: BTreeMap<u32, BindingEntry>,
    journal: Vec<HostCall>,
    fail_at: Option<HostStep>,
}

impl MockState {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Consume the injected failure if it targets `step`
    fn should_fail(&mut self, step: HostStep) -> bool {
        if self.fail_at == Some(step) {
            self.fail_at = None;
            true
        } else {
            false
        }
    }
}

/// In-memory host kernel
pub struct MockHost {
    state: Mutex<MockState>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_major: FIRST_DYNAMIC_MAJOR,
                next_id: 1,
                regions: BTreeMap::new(),
                classes: BTreeMap::new(),
                nodes: Vec::new(),
                bindings: BTreeMap::new(),
                journal: Vec::new(),
                fail_at: None,
            }),
        }
    }

    /// Make the next attempt of `step` fail
    pub fn fail_at(&self, step: HostStep) {
        self.state.lock().fail_at = Some(step);
    }

    /// Journal of all registration calls so far
    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().journal.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().journal.clear();
    }

    /// Names of device nodes that currently exist
    pub fn live_nodes(&self) -> Vec<String> {
        self.state
            .lock()
            .nodes
            .iter()
            .map(|node| node.name.clone())
            .collect()
    }

    /// True when no region, class, node or binding is left behind
    pub fn is_clean(&self) -> bool {
        let state = self.state.lock();
        state.regions.is_empty()
            && state.classes.is_empty()
            && state.nodes.is_empty()
            && state.bindings.is_empty()
    }

    /// Operation table live for `number`, if any
    pub fn dispatch(&self, number: DeviceNumber) -> Option<Arc<dyn FileOperations>> {
        self.state
            .lock()
            .bindings
            .values()
            .find(|binding| binding.live && binding.number == number)
            .map(|binding| Arc::clone(&binding.ops))
    }

    /// Open a device node by path, as a client program would
    ///
    /// # Errors
    /// - `ENOENT` if no node has that path
    /// - `ENODEV` if the node exists but nothing is registered behind it
    /// - whatever the device's `open` reports
    pub fn open(&self, path: &str) -> core::result::Result<MockFile, Errno> {
        let name = path
            .strip_prefix(DEV_ROOT)
            .ok_or_else(|| Errno::from(HostError::InvalidPath { path: path.to_string() }))?;

        let number = self
            .state
            .lock()
            .nodes
            .iter()
            .find(|node| node.name == name)
            .map(|node| node.number)
            .ok_or(Errno::ENOENT)
            .inspect_err(|_| log::debug!("mock host: no node at {}", path))?;

        // Lock released before calling into the device
        let ops = self.dispatch(number).ok_or(Errno::ENODEV)?;
        ops.open()?;

        Ok(MockFile { ops, open: true })
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceHost for MockHost {
    fn reserve_region(&self, name: &str) -> Result<DeviceNumber> {
        let mut state = self.state.lock();
        let failed =
            state.should_fail(HostStep::ReserveRegion) || state.next_major > MAX_MAJOR;
        state.journal.push(HostCall::ReserveRegion {
            name: name.to_string(),
            ok: !failed,
        });
        if failed {
            return Err(HostError::RegionUnavailable { name: name.to_string() });
        }

        let number = DeviceNumber::new(state.next_major, 0);
        state.next_major += 1;
        state.regions.insert(number, name.to_string());
        log::debug!("mock host: region {} reserved as {}", name, number);
        Ok(number)
    }

    fn release_region(&self, number: DeviceNumber) {
        let mut state = self.state.lock();
        state.journal.push(HostCall::ReleaseRegion { number });
        state.regions.remove(&number);
    }

    fn create_class(&self, name: &str) -> Result<ClassHandle> {
        let mut state = self.state.lock();
        let failed = state.should_fail(HostStep::CreateClass)
            || state.classes.values().any(|existing| existing == name);
        state.journal.push(HostCall::CreateClass {
            name: name.to_string(),
            ok: !failed,
        });
        if failed {
            return Err(HostError::ClassCreation { name: name.to_string() });
        }

        let id = state.next_id();
        state.classes.insert(id, name.to_string());
        Ok(ClassHandle::from_id(id))
    }

    fn destroy_class(&self, class: ClassHandle) {
        let mut state = self.state.lock();
        let name = state.classes.remove(&class.id()).unwrap_or_default();
        state.journal.push(HostCall::DestroyClass { name });
    }

    fn create_node(
        &self,
        class: &ClassHandle,
        number: DeviceNumber,
        name: &str,
    ) -> Result<NodeHandle> {
        let mut state = self.state.lock();
        let failed = state.should_fail(HostStep::CreateNode)
            || !state.classes.contains_key(&class.id())
            || state.nodes.iter().any(|node| node.name == name);
        state.journal.push(HostCall::CreateNode {
            name: name.to_string(),
            number,
            ok: !failed,
        });
        if failed {
            return Err(HostError::NodeCreation { name: name.to_string() });
        }

        let id = state.next_id();
        state.nodes.push(NodeEntry {
            class_id: class.id(),
            number,
            name: name.to_string(),
        });
        Ok(NodeHandle::from_id(id))
    }

    fn destroy_node(&self, class: &ClassHandle, number: DeviceNumber) {
        let mut state = self.state.lock();
        state.journal.push(HostCall::DestroyNode { number });
        state
            .nodes
            .retain(|node| !(node.class_id == class.id() && node.number == number));
    }

    fn bind_char_device(
        &self,
        number: DeviceNumber,
        ops: Arc<dyn FileOperations>,
    ) -> Result<Binding> {
        let mut state = self.state.lock();
        let failed = state.should_fail(HostStep::BindCharDevice);
        state.journal.push(HostCall::BindCharDevice { number, ok: !failed });
        if failed {
            return Err(HostError::BindFailed { number });
        }

        let id = state.next_id();
        state.bindings.insert(
            id,
            BindingEntry {
                number,
                ops,
                live: false,
            },
        );
        Ok(Binding::new(id, number))
    }

    fn remove_binding(&self, binding: Binding) {
        let mut state = self.state.lock();
        state.journal.push(HostCall::RemoveBinding {
            number: binding.number(),
        });
        state.bindings.remove(&binding.id());
    }

    fn register_binding(&self, binding: &Binding) -> Result<()> {
        let mut state = self.state.lock();
        let number = binding.number();
        let failed = state.should_fail(HostStep::RegisterBinding)
            || state
                .bindings
                .values()
                .any(|other| other.live && other.number == number);
        state.journal.push(HostCall::RegisterBinding { number, ok: !failed });
        if failed {
            return Err(HostError::RegistrationFailed { number });
        }

        match state.bindings.get_mut(&binding.id()) {
            Some(entry) => {
                entry.live = true;
                log::debug!("mock host: dispatching {} to bound operations", number);
                Ok(())
            }
            None => Err(HostError::RegistrationFailed { number }),
        }
    }

    fn unregister_binding(&self, binding: &Binding) {
        let mut state = self.state.lock();
        state.journal.push(HostCall::UnregisterBinding {
            number: binding.number(),
        });
        if let Some(entry) = state.bindings.get_mut(&binding.id()) {
            entry.live = false;
        }
    }
}

/// Client-owned memory used as the source or destination of a transfer
#[derive(Debug, Clone, Default)]
pub struct UserBuffer {
    data: Vec<u8>,
    capacity: usize,
    faulting: bool,
}

impl UserBuffer {
    /// Empty destination able to take `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            faulting: false,
        }
    }

    /// Source holding `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            capacity: bytes.len(),
            faulting: false,
        }
    }

    /// Every copy touching this buffer fails, as for an unmapped address
    pub fn faulting(mut self) -> Self {
        self.faulting = true;
        self
    }

    /// Bytes currently held
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl UserSliceWriter for UserBuffer {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn copy_to_client(&mut self, src: &[u8]) -> Result<()> {
        if self.faulting || src.len() > self.capacity {
            return Err(HostError::BadAddress);
        }
        self.data.clear();
        self.data.extend_from_slice(src);
        Ok(())
    }
}

impl UserSliceReader for UserBuffer {
    fn available(&self) -> usize {
        self.data.len()
    }

    fn copy_from_client(&self, dst: &mut [u8]) -> Result<()> {
        if self.faulting || dst.len() > self.data.len() {
            return Err(HostError::BadAddress);
        }
        dst.copy_from_slice(&self.data[..dst.len()]);
        Ok(())
    }
}

/// Open handle on a device node, as seen by a client program
///
/// Calls are ordered per handle: `close` consumes the handle, dropping an
/// open handle releases it.
pub struct MockFile {
    ops: Arc<dyn FileOperations>,
    open: bool,
}

impl MockFile {
    /// Read with a `len`-byte client buffer
    pub fn read(&mut self, len: usize) -> core::result::Result<Vec<u8>, Errno> {
        let mut buf = UserBuffer::with_capacity(len);
        let sent = self.read_into(&mut buf, len)?;
        let mut bytes = buf.data;
        bytes.truncate(sent);
        Ok(bytes)
    }

    /// Read into caller-prepared client memory
    pub fn read_into(
        &mut self,
        buf: &mut UserBuffer,
        len: usize,
    ) -> core::result::Result<usize, Errno> {
        self.ops.read(buf, len)
    }

    pub fn write(&mut self, bytes: &[u8]) -> core::result::Result<usize, Errno> {
        self.write_claiming(bytes, bytes.len())
    }

    /// Write `bytes` while telling the device the buffer is `len` long
    pub fn write_claiming(&mut self, bytes: &[u8], len: usize) -> core::result::Result<usize, Errno> {
        self.write_from(&UserBuffer::from_bytes(bytes), len)
    }

    /// Write from caller-prepared client memory
    pub fn write_from(&mut self, buf: &UserBuffer, len: usize) -> core::result::Result<usize, Errno> {
        self.ops.write(buf, len)
    }

    pub fn close(mut self) -> core::result::Result<(), Errno> {
        self.open = false;
        self.ops.release()
    }
}

impl Drop for MockFile {
    fn drop(&mut self) {
        if self.open {
            let _ = self.ops.release();
        }
    }
}
