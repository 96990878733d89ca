//! Session/Buffer manager
//!
//! Implements the four operation-table entry points against one shared
//! [`MessageBuffer`]. Sessions carry no state of their own: every open
//! handle sees the same message, and a read by any of them drains it.
//!
//! # Transfer contract
//! - `write(n)`: rejected with `TooLarge` when `n` exceeds the capacity,
//!   before client memory is touched. Otherwise the message becomes the `n`
//!   client bytes and `n` is returned.
//! - `read(_)`: sends the whole buffered message regardless of the length the
//!   client asked for, then empties the buffer and returns the count sent.
//!   A read with nothing buffered returns 0.

use core::convert::Infallible;
use core::sync::atomic::{AtomicUsize, Ordering};

use host_platform::{Errno, FileOperations, UserSliceReader, UserSliceWriter};

use crate::buffer::{MessageBuffer, MESSAGE_CAPACITY};
use crate::error::{ReadError, WriteError};

/// Shared state behind the device's operation table
pub struct SessionManager {
    buffer: MessageBuffer,

    /// Number of opens so far, diagnostic only
    opens: AtomicUsize,
}

impl SessionManager {
    pub const fn new() -> Self {
        Self {
            buffer: MessageBuffer::new(),
            opens: AtomicUsize::new(0),
        }
    }

    /// A client opened the device
    pub fn open(&self) -> Result<(), Infallible> {
        let opens = self.opens.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("msgdev: device has been opened {} time(s)", opens);
        Ok(())
    }

    /// Send the buffered message to `dest`
    ///
    /// # Errors
    /// `ReadError::BadAddress` if the copy to the client fails; the message
    /// stays buffered
    pub fn read(
        &self,
        dest: &mut dyn UserSliceWriter,
        requested_len: usize,
    ) -> Result<usize, ReadError> {
        let mut pending = 0;
        let result = self.buffer.drain_with(|message| {
            pending = message.len();
            dest.copy_to_client(message)
        });

        match result {
            Ok(sent) => {
                log::info!("msgdev: sent {} characters to the user", sent);
                log::debug!(
                    "msgdev: read requested {} bytes into {} available",
                    requested_len,
                    dest.capacity()
                );
                Ok(sent)
            }
            Err(err) => {
                log::warn!(
                    "msgdev: failed to send {} characters to the user ({} available): {}",
                    pending,
                    dest.capacity(),
                    err
                );
                Err(ReadError::BadAddress)
            }
        }
    }

    /// Replace the buffered message with `requested_len` bytes from `src`
    ///
    /// # Errors
    /// - `WriteError::TooLarge` if `requested_len` exceeds the capacity
    /// - `WriteError::BadAddress` if the copy from the client fails
    ///
    /// The buffer is unchanged on either error.
    pub fn write(
        &self,
        src: &dyn UserSliceReader,
        requested_len: usize,
    ) -> Result<usize, WriteError> {
        if requested_len > MESSAGE_CAPACITY {
            log::warn!(
                "msgdev: rejected {} characters from the user (capacity {})",
                requested_len,
                MESSAGE_CAPACITY
            );
            return Err(WriteError::TooLarge {
                requested: requested_len,
                capacity: MESSAGE_CAPACITY,
            });
        }

        // Stage outside the lock so a faulting client cannot clobber the message
        let mut staging = [0u8; MESSAGE_CAPACITY];
        let staged = &mut staging[..requested_len];
        src.copy_from_client(staged).map_err(|err| {
            log::warn!(
                "msgdev: failed to receive {} characters from the user ({} provided): {}",
                requested_len,
                src.available(),
                err
            );
            WriteError::BadAddress
        })?;

        let accepted = self.buffer.store(staged)?;
        log::info!("msgdev: received {} characters from the user", accepted);
        Ok(accepted)
    }

    /// A client closed its handle
    pub fn release(&self) -> Result<(), Infallible> {
        log::info!("msgdev: device successfully closed");
        Ok(())
    }

    /// Opens counted so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// Length of the buffered message
    pub fn message_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileOperations for SessionManager {
    fn open(&self) -> Result<(), Errno> {
        SessionManager::open(self).map_err(|never| match never {})
    }

    fn read(&self, dest: &mut dyn UserSliceWriter, len: usize) -> Result<usize, Errno> {
        SessionManager::read(self, dest, len).map_err(Errno::from)
    }

    fn write(&self, src: &dyn UserSliceReader, len: usize) -> Result<usize, Errno> {
        SessionManager::write(self, src, len).map_err(Errno::from)
    }

    fn release(&self) -> Result<(), Errno> {
        SessionManager::release(self).map_err(|never| match never {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_platform::mock::UserBuffer;

    fn write_bytes(manager: &SessionManager, bytes: &[u8]) -> Result<usize, WriteError> {
        manager.write(&UserBuffer::from_bytes(bytes), bytes.len())
    }

    fn read_bytes(manager: &SessionManager, len: usize) -> Result<std::vec::Vec<u8>, ReadError> {
        let mut dest = UserBuffer::with_capacity(len);
        let sent = manager.read(&mut dest, len)?;
        assert_eq!(sent, dest.as_bytes().len());
        Ok(dest.as_bytes().to_vec())
    }

    #[test]
    fn test_open_counts_every_call() {
        let manager = SessionManager::new();
        for expected in 1..=5 {
            manager.open().unwrap();
            assert_eq!(manager.open_count(), expected);
        }
    }

    #[test]
    fn test_release_touches_nothing() {
        let manager = SessionManager::new();
        manager.open().unwrap();
        write_bytes(&manager, b"kept").unwrap();

        manager.release().unwrap();
        assert_eq!(manager.open_count(), 1);
        assert_eq!(manager.buffer().contents(), b"kept");
    }

    #[test]
    fn test_read_drains() {
        let manager = SessionManager::new();
        assert_eq!(write_bytes(&manager, b"hello").unwrap(), 5);

        assert_eq!(read_bytes(&manager, 64).unwrap(), b"hello");
        assert_eq!(manager.message_len(), 0);
        assert!(read_bytes(&manager, 64).unwrap().is_empty());
    }

    #[test]
    fn test_read_ignores_requested_length() {
        let manager = SessionManager::new();
        write_bytes(&manager, b"abc").unwrap();

        // Client buffer is larger than requested; the whole message is sent
        let mut dest = UserBuffer::with_capacity(16);
        assert_eq!(manager.read(&mut dest, 1).unwrap(), 3);
        assert_eq!(dest.as_bytes(), b"abc");
    }

    #[test]
    fn test_read_into_short_buffer_fails() {
        let manager = SessionManager::new();
        write_bytes(&manager, b"hello").unwrap();

        let mut dest = UserBuffer::with_capacity(2);
        assert_eq!(manager.read(&mut dest, 2), Err(ReadError::BadAddress));
        assert_eq!(manager.message_len(), 5);
    }

    #[test]
    fn test_failed_read_keeps_message() {
        let manager = SessionManager::new();
        write_bytes(&manager, b"hello").unwrap();

        let mut dest = UserBuffer::with_capacity(64).faulting();
        assert_eq!(manager.read(&mut dest, 64), Err(ReadError::BadAddress));
        assert_eq!(manager.message_len(), 5);

        assert_eq!(read_bytes(&manager, 64).unwrap(), b"hello");
    }

    #[test]
    fn test_write_too_large() {
        let manager = SessionManager::new();
        write_bytes(&manager, b"previous").unwrap();

        let oversized = b"toolong".repeat(40);
        assert_eq!(oversized.len(), 280);
        assert_eq!(
            write_bytes(&manager, &oversized),
            Err(WriteError::TooLarge {
                requested: 280,
                capacity: 256
            })
        );
        assert_eq!(manager.buffer().contents(), b"previous");
    }

    #[test]
    fn test_write_rejects_before_touching_client_memory() {
        let manager = SessionManager::new();

        // A faulting source would report BadAddress if it were read
        let src = UserBuffer::from_bytes(&[0u8; 300]).faulting();
        assert!(matches!(
            manager.write(&src, 300),
            Err(WriteError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_write_fault_keeps_buffer() {
        let manager = SessionManager::new();
        write_bytes(&manager, b"previous").unwrap();

        let src = UserBuffer::from_bytes(b"next").faulting();
        assert_eq!(manager.write(&src, 4), Err(WriteError::BadAddress));
        assert_eq!(manager.buffer().contents(), b"previous");
    }

    #[test]
    fn test_write_claiming_more_than_provided() {
        let manager = SessionManager::new();
        let src = UserBuffer::from_bytes(b"abc");
        assert_eq!(manager.write(&src, 10), Err(WriteError::BadAddress));
        assert!(manager.buffer().is_empty());
    }

    #[test]
    fn test_write_full_capacity_round_trip() {
        let manager = SessionManager::new();
        let message: std::vec::Vec<u8> = (0..MESSAGE_CAPACITY).map(|i| i as u8).collect();

        assert_eq!(write_bytes(&manager, &message).unwrap(), MESSAGE_CAPACITY);
        assert_eq!(read_bytes(&manager, MESSAGE_CAPACITY).unwrap(), message);
    }

    #[test]
    fn test_operation_table_reports_errno() {
        let manager = SessionManager::new();
        let ops: &dyn FileOperations = &manager;

        let src = UserBuffer::from_bytes(&[0u8; 257]);
        assert_eq!(ops.write(&src, 257), Err(Errno::EINVAL));

        let src = UserBuffer::from_bytes(b"hi");
        assert_eq!(ops.write(&src, 2), Ok(2));

        let mut dest = UserBuffer::with_capacity(8).faulting();
        let err = ops.read(&mut dest, 8).unwrap_err();
        assert_eq!(err.as_negative(), -14);

        assert_eq!(ops.open(), Ok(()));
        assert_eq!(ops.release(), Ok(()));
        assert_eq!(manager.open_count(), 1);
    }
}
