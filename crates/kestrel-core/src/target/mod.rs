//! # Target
//!
//! The seam between the inspection engine and the debuggee transport.
//!
//! Everything the engine needs from a live target is four operations. A serial
//! or network transport implements them by exchanging packets. The in-memory
//! implementation in [`memory`] backs offline sessions and tests.
//!
//! ## Implementation Notes
//!
//! - `read_memory` may return fewer bytes than requested when the range runs
//!   into unmapped memory. [`read_exact`] turns that into an error.
//! - Reads may block for as long as the transport needs; callers must not hold
//!   profiler locks across them.

pub mod memory;

pub use memory::{InMemoryTarget, MemorySegment};

use crate::error::{KestrelError, KestrelResult};
use crate::registers::RegisterSnapshot;
use crate::types::Address;

/// Operations the debuggee transport provides.
pub trait Target
{
    /// Read up to `size` bytes at `address`.
    ///
    /// `virtual_address` selects virtual (true) or physical (false) addressing.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Transport`] if the target cannot be reached.
    fn read_memory(&self, virtual_address: bool, address: Address, size: usize) -> KestrelResult<Vec<u8>>;

    /// Write `bytes` at `address`, returning the number of bytes written.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Transport`] if the target cannot be reached.
    fn write_memory(&mut self, virtual_address: bool, address: Address, bytes: &[u8]) -> KestrelResult<u32>;

    /// Register state of the current frame.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Transport`] if the target cannot be reached.
    fn registers(&self) -> KestrelResult<RegisterSnapshot>;

    /// Replace the register state of the current frame.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Transport`] if the target cannot be reached.
    fn set_registers(&mut self, registers: &RegisterSnapshot) -> KestrelResult<()>;
}

/// Read exactly `size` bytes of virtual memory.
///
/// ## Errors
///
/// Returns [`KestrelError::ShortRead`] when the target returns fewer bytes.
pub fn read_exact(target: &dyn Target, address: Address, size: usize) -> KestrelResult<Vec<u8>>
{
    let bytes = target.read_memory(true, address, size)?;
    if bytes.len() < size {
        return Err(KestrelError::ShortRead {
            address: address.value(),
            expected: size,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}
