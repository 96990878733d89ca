//! Copy primitives across the client/kernel boundary
//!
//! Client memory is never handed to the device as a slice. The device asks
//! the host to copy into or out of it, and the host may refuse (unmapped
//! page, buffer shorter than claimed).

use crate::Result;

/// Client-owned destination of a read
pub trait UserSliceWriter {
    /// Bytes the client made available
    fn capacity(&self) -> usize;

    /// Copy all of `src` into client memory
    ///
    /// # Errors
    /// `HostError::BadAddress` if the client memory cannot take `src`
    fn copy_to_client(&mut self, src: &[u8]) -> Result<()>;
}

/// Client-owned source of a write
pub trait UserSliceReader {
    /// Bytes the client actually provided
    fn available(&self) -> usize;

    /// Fill all of `dst` from client memory
    ///
    /// # Errors
    /// `HostError::BadAddress` if the client memory holds fewer than
    /// `dst.len()` readable bytes
    fn copy_from_client(&self, dst: &mut [u8]) -> Result<()>;
}
