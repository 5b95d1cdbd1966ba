//! Target backed by a sparse memory image.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Target;
use crate::error::{KestrelError, KestrelResult};
use crate::registers::RegisterSnapshot;
use crate::types::Address;

/// A contiguous run of target memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySegment
{
    pub address: u64,
    pub bytes: Vec<u8>,
}

/// A stopped target whose memory and registers live in this process.
///
/// Every `read_memory` call is counted so tests can assert how many transport
/// round trips an operation needed.
#[derive(Debug)]
pub struct InMemoryTarget
{
    segments: BTreeMap<u64, Vec<u8>>,
    registers: RegisterSnapshot,
    reads: Arc<AtomicUsize>,
}

impl InMemoryTarget
{
    #[must_use]
    pub fn new(registers: RegisterSnapshot) -> Self
    {
        Self {
            segments: BTreeMap::new(),
            registers,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Map `bytes` at `address`. Later segments shadow earlier overlapping ones.
    pub fn map(&mut self, address: u64, bytes: Vec<u8>)
    {
        self.segments.insert(address, bytes);
    }

    #[must_use]
    pub fn with_segment(mut self, address: u64, bytes: Vec<u8>) -> Self
    {
        self.map(address, bytes);
        self
    }

    /// Number of `read_memory` calls served so far.
    #[must_use]
    pub fn read_count(&self) -> usize
    {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn reset_read_count(&self)
    {
        self.reads.store(0, Ordering::Relaxed);
    }

    /// Shared handle to the read counter, usable after the target has been
    /// boxed into a context.
    #[must_use]
    pub fn read_counter(&self) -> Arc<AtomicUsize>
    {
        Arc::clone(&self.reads)
    }

    fn byte_at(&self, address: u64) -> Option<u8>
    {
        let (start, bytes) = self.segments.range(..=address).next_back()?;
        let offset = usize::try_from(address - start).ok()?;
        bytes.get(offset).copied()
    }

    fn byte_at_mut(&mut self, address: u64) -> Option<&mut u8>
    {
        let (start, bytes) = self.segments.range_mut(..=address).next_back()?;
        let offset = usize::try_from(address - *start).ok()?;
        bytes.get_mut(offset)
    }
}

impl Target for InMemoryTarget
{
    fn read_memory(&self, virtual_address: bool, address: Address, size: usize) -> KestrelResult<Vec<u8>>
    {
        if !virtual_address {
            return Err(KestrelError::Transport("physical memory is not available offline".to_string()));
        }

        self.reads.fetch_add(1, Ordering::Relaxed);
        let mut bytes = Vec::with_capacity(size);
        for offset in 0..size as u64 {
            match self.byte_at(address.value().wrapping_add(offset)) {
                Some(byte) => bytes.push(byte),
                None => break,
            }
        }

        tracing::trace!(%address, size, returned = bytes.len(), "memory read");
        Ok(bytes)
    }

    fn write_memory(&mut self, virtual_address: bool, address: Address, bytes: &[u8]) -> KestrelResult<u32>
    {
        if !virtual_address {
            return Err(KestrelError::Transport("physical memory is not available offline".to_string()));
        }

        let mut written = 0u32;
        for (offset, value) in (0u64..).zip(bytes) {
            match self.byte_at_mut(address.value().wrapping_add(offset)) {
                Some(slot) => *slot = *value,
                None => break,
            }
            written += 1;
        }
        Ok(written)
    }

    fn registers(&self) -> KestrelResult<RegisterSnapshot>
    {
        Ok(self.registers)
    }

    fn set_registers(&mut self, registers: &RegisterSnapshot) -> KestrelResult<()>
    {
        self.registers = *registers;
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::target::read_exact;
    use crate::types::Architecture;

    fn target() -> InMemoryTarget
    {
        InMemoryTarget::new(RegisterSnapshot::empty(Architecture::X86))
            .with_segment(0x1000, vec![1, 2, 3, 4])
            .with_segment(0x1004, vec![5, 6])
    }

    #[test]
    fn test_read_spans_adjacent_segments()
    {
        let target = target();
        let bytes = target.read_memory(true, Address::new(0x1002), 4).unwrap();
        assert_eq!(bytes, vec![3, 4, 5, 6]);
        assert_eq!(target.read_count(), 1);
    }

    #[test]
    fn test_short_read_is_reported()
    {
        let target = target();
        let bytes = target.read_memory(true, Address::new(0x1004), 8).unwrap();
        assert_eq!(bytes.len(), 2);
        assert!(matches!(
            read_exact(&target, Address::new(0x1004), 8),
            Err(KestrelError::ShortRead { expected: 8, actual: 2, .. })
        ));
    }

    #[test]
    fn test_write_stops_at_unmapped()
    {
        let mut target = target();
        let written = target.write_memory(true, Address::new(0x1005), &[9, 9, 9]).unwrap();
        assert_eq!(written, 1);
        assert_eq!(target.read_memory(true, Address::new(0x1005), 1).unwrap(), vec![9]);
    }
}
