//! Device registration interfaces
//!
//! A character device becomes reachable in five host steps: reserve a
//! device-number region, create a class, create a node under the class, bind
//! an operation table to the number, and register that binding. Each step
//! has a matching undo call on [`DeviceHost`].

use alloc::sync::Arc;
use core::fmt;

use crate::uaccess::{UserSliceReader, UserSliceWriter};
use crate::{Errno, Result};

/// Number of bits used by the minor part of a [`DeviceNumber`]
pub const MINOR_BITS: u32 = 20;

const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Largest major a [`DeviceNumber`] can hold
pub const MAX_MAJOR: u32 = u32::MAX >> MINOR_BITS;

/// Packed major/minor device number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceNumber(u32);

static_assertions::assert_eq_size!(DeviceNumber, u32);

impl DeviceNumber {
    /// Pack `major` and `minor`
    ///
    /// Bits of `major` above [`MAX_MAJOR`] and of `minor` above
    /// [`MINOR_BITS`] are dropped; hosts must not hand out larger values.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self((major << MINOR_BITS) | (minor & MINOR_MASK))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn major(self) -> u32 {
        self.0 >> MINOR_BITS
    }

    pub const fn minor(self) -> u32 {
        self.0 & MINOR_MASK
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Device class created by the host
#[derive(Debug, PartialEq, Eq)]
pub struct ClassHandle {
    id: u32,
}

impl ClassHandle {
    /// Wrap a host-assigned class id
    pub const fn from_id(id: u32) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> u32 {
        self.id
    }
}

/// Device node created under a class
#[derive(Debug, PartialEq, Eq)]
pub struct NodeHandle {
    id: u32,
}

impl NodeHandle {
    pub const fn from_id(id: u32) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> u32 {
        self.id
    }
}

/// Character-device structure bound to an operation table
#[derive(Debug, PartialEq, Eq)]
pub struct Binding {
    id: u32,
    number: DeviceNumber,
}

impl Binding {
    pub const fn new(id: u32, number: DeviceNumber) -> Self {
        Self { id, number }
    }

    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Device number the binding serves
    pub const fn number(&self) -> DeviceNumber {
        self.number
    }
}

/// Resource-creation steps, in the order a device performs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HostStep {
    ReserveRegion,
    CreateClass,
    CreateNode,
    BindCharDevice,
    RegisterBinding,
}

impl HostStep {
    /// All steps in creation order
    pub const ALL: [HostStep; 5] = [
        HostStep::ReserveRegion,
        HostStep::CreateClass,
        HostStep::CreateNode,
        HostStep::BindCharDevice,
        HostStep::RegisterBinding,
    ];

    /// 1-based position in the creation sequence
    pub const fn ordinal(self) -> usize {
        match self {
            HostStep::ReserveRegion => 1,
            HostStep::CreateClass => 2,
            HostStep::CreateNode => 3,
            HostStep::BindCharDevice => 4,
            HostStep::RegisterBinding => 5,
        }
    }
}

impl fmt::Display for HostStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostStep::ReserveRegion => "reserve device-number region",
            HostStep::CreateClass => "create device class",
            HostStep::CreateNode => "create device node",
            HostStep::BindCharDevice => "bind character device",
            HostStep::RegisterBinding => "register character device",
        };
        f.write_str(name)
    }
}

/// Operation table the host dispatches client calls into
///
/// Entry points are synchronous and must not block. Errors are reported as
/// errno values, the host hands them to the client negated.
pub trait FileOperations: Send + Sync {
    /// A client opened the device node
    fn open(&self) -> core::result::Result<(), Errno>;

    /// Copy device data to the client, returning the number of bytes sent
    fn read(
        &self,
        dest: &mut dyn UserSliceWriter,
        len: usize,
    ) -> core::result::Result<usize, Errno>;

    /// Accept `len` bytes from the client, returning the number accepted
    fn write(&self, src: &dyn UserSliceReader, len: usize) -> core::result::Result<usize, Errno>;

    /// The client closed its handle
    fn release(&self) -> core::result::Result<(), Errno>;
}

/// Host kernel device-registration services
///
/// Methods take `&self`: a host kernel is shared, implementations keep
/// their own locking. Undo calls cannot fail.
pub trait DeviceHost {
    /// Reserve a single-minor device-number region under `name`
    fn reserve_region(&self, name: &str) -> Result<DeviceNumber>;

    fn release_region(&self, number: DeviceNumber);

    /// Create a device class
    fn create_class(&self, name: &str) -> Result<ClassHandle>;

    fn destroy_class(&self, class: ClassHandle);

    /// Create a device node `name` for `number` under `class`
    fn create_node(&self, class: &ClassHandle, number: DeviceNumber, name: &str)
        -> Result<NodeHandle>;

    fn destroy_node(&self, class: &ClassHandle, number: DeviceNumber);

    /// Bind an operation table to `number`; the binding is not yet live
    fn bind_char_device(&self, number: DeviceNumber, ops: Arc<dyn FileOperations>)
        -> Result<Binding>;

    fn remove_binding(&self, binding: Binding);

    /// Make a binding live: the host starts dispatching to it
    fn register_binding(&self, binding: &Binding) -> Result<()>;

    fn unregister_binding(&self, binding: &Binding);
}

macro_rules! forward_device_host {
    ($($ty:ty),*) => {$(
        impl<T: DeviceHost + ?Sized> DeviceHost for $ty {
            fn reserve_region(&self, name: &str) -> Result<DeviceNumber> {
                (**self).reserve_region(name)
            }

            fn release_region(&self, number: DeviceNumber) {
                (**self).release_region(number)
            }

            fn create_class(&self, name: &str) -> Result<ClassHandle> {
                (**self).create_class(name)
            }

            fn destroy_class(&self, class: ClassHandle) {
                (**self).destroy_class(class)
            }

            fn create_node(
                &self,
                class: &ClassHandle,
                number: DeviceNumber,
                name: &str,
            ) -> Result<NodeHandle> {
                (**self).create_node(class, number, name)
            }

            fn destroy_node(&self, class: &ClassHandle, number: DeviceNumber) {
                (**self).destroy_node(class, number)
            }

            fn bind_char_device(
                &self,
                number: DeviceNumber,
                ops: Arc<dyn FileOperations>,
            ) -> Result<Binding> {
                (**self).bind_char_device(number, ops)
            }

            fn remove_binding(&self, binding: Binding) {
                (**self).remove_binding(binding)
            }

            fn register_binding(&self, binding: &Binding) -> Result<()> {
                (**self).register_binding(binding)
            }

            fn unregister_binding(&self, binding: &Binding) {
                (**self).unregister_binding(binding)
            }
        }
    )*};
}

forward_device_host!(&T, Arc<T>);
