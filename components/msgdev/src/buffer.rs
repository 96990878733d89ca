//! Single-slot message buffer
//!
//! Holds at most one message of up to [`MESSAGE_CAPACITY`] bytes. A store
//! replaces the message, a drain hands it out once and empties the slot.
//! All access goes through one spin lock, held only for a bounded copy.

use alloc::vec::Vec;

use spin::Mutex;
use static_assertions::const_assert;

use crate::error::WriteError;

/// Bytes the buffer can hold
pub const MESSAGE_CAPACITY: usize = 256;

const_assert!(MESSAGE_CAPACITY > 0);
// Transfer counts are reported to clients as `isize`
const_assert!(MESSAGE_CAPACITY <= isize::MAX as usize);

struct Slot {
    bytes: [u8; MESSAGE_CAPACITY],
    /// Leading bytes of `bytes` that form the message, never above capacity
    length: usize,
}

/// Message buffer shared by every session of a device
pub struct MessageBuffer {
    slot: Mutex<Slot>,
}

impl MessageBuffer {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                bytes: [0; MESSAGE_CAPACITY],
                length: 0,
            }),
        }
    }

    pub const fn capacity(&self) -> usize {
        MESSAGE_CAPACITY
    }

    /// Length of the buffered message
    pub fn len(&self) -> usize {
        self.slot.lock().length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered message, leaving it in place
    pub fn contents(&self) -> Vec<u8> {
        let slot = self.slot.lock();
        slot.bytes[..slot.length].to_vec()
    }

    /// Replace the buffered message
    ///
    /// # Errors
    /// `WriteError::TooLarge` if `message` exceeds the capacity; the buffer
    /// is left untouched
    pub fn store(&self, message: &[u8]) -> Result<usize, WriteError> {
        if message.len() > MESSAGE_CAPACITY {
            return Err(WriteError::TooLarge {
                requested: message.len(),
                capacity: MESSAGE_CAPACITY,
            });
        }

        let mut slot = self.slot.lock();
        slot.bytes[..message.len()].copy_from_slice(message);
        slot.length = message.len();
        Ok(message.len())
    }

    /// Hand the buffered message to `send` and empty the slot if it succeeds
    ///
    /// The lock is held across `send`, so no store can interleave with a
    /// drain. On error the message stays buffered.
    pub fn drain_with<F, E>(&self, send: F) -> Result<usize, E>
    where
        F: FnOnce(&[u8]) -> Result<(), E>,
    {
        let mut slot = self.slot.lock();
        let length = slot.length;
        send(&slot.bytes[..length])?;
        slot.length = 0;
        Ok(length)
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
