//! Record reassembly across notification packets.
//!
//! The target streams thread events without regard for packet boundaries, so
//! one record may start in one packet and finish in the next. [`ByteStream`]
//! presents a queue of packets as a single byte stream: a record is only
//! consumed once all of its bytes have arrived.

use std::collections::VecDeque;

use super::ProfilerDataEntry;

/// A byte stream over queued profiler packets.
#[derive(Debug, Default)]
pub struct ByteStream
{
    entries: VecDeque<ProfilerDataEntry>,
}

impl ByteStream
{
    #[must_use]
    pub fn new(entries: VecDeque<ProfilerDataEntry>) -> Self
    {
        let mut stream = Self { entries };
        stream.discard_exhausted();
        stream
    }

    fn discard_exhausted(&mut self)
    {
        while self.entries.front().is_some_and(|entry| entry.remaining().is_empty()) {
            self.entries.pop_front();
        }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn available(&self) -> usize
    {
        self.entries.iter().map(|entry| entry.remaining().len()).sum()
    }

    /// Processor that sent the next unread byte.
    #[must_use]
    pub fn front_processor(&self) -> Option<u32>
    {
        self.entries.front().map(|entry| entry.processor)
    }

    /// Copy the next `size` bytes without consuming them.
    ///
    /// Returns `None` if fewer than `size` bytes are queued.
    #[must_use]
    pub fn peek(&self, size: usize) -> Option<Vec<u8>>
    {
        if self.available() < size {
            return None;
        }

        let mut bytes = Vec::with_capacity(size);
        for entry in &self.entries {
            let wanted = size - bytes.len();
            let remaining = entry.remaining();
            bytes.extend_from_slice(&remaining[..wanted.min(remaining.len())]);
            if bytes.len() == size {
                break;
            }
        }
        Some(bytes)
    }

    /// Remove and return the next `size` bytes.
    ///
    /// Nothing is consumed when fewer than `size` bytes are queued. Packets
    /// are released as soon as their last byte is consumed.
    pub fn consume(&mut self, size: usize) -> Option<Vec<u8>>
    {
        let bytes = self.peek(size)?;
        self.skip(size);
        Some(bytes)
    }

    /// Drop the next `size` bytes, or every queued byte if fewer are queued.
    ///
    /// Returns the number of bytes dropped.
    pub fn skip(&mut self, size: usize) -> usize
    {
        let mut left = size;
        while left > 0 {
            let Some(entry) = self.entries.front_mut() else {
                break;
            };
            let step = left.min(entry.remaining().len());
            entry.offset += step;
            left -= step;
            self.discard_exhausted();
        }
        size - left
    }

    /// Unconsumed packets, cursors preserved.
    #[must_use]
    pub fn into_entries(self) -> VecDeque<ProfilerDataEntry>
    {
        self.entries
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn stream(packets: &[&[u8]]) -> ByteStream
    {
        ByteStream::new(
            packets
                .iter()
                .map(|data| ProfilerDataEntry::new(0, data.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn test_record_split_across_packets()
    {
        let mut stream = stream(&[&[1, 2, 3], &[4, 5], &[6]]);
        assert_eq!(stream.consume(4), Some(vec![1, 2, 3, 4]));
        assert_eq!(stream.available(), 2);
        assert_eq!(stream.consume(2), Some(vec![5, 6]));
        assert!(stream.into_entries().is_empty());
    }

    #[test]
    fn test_short_read_does_not_advance()
    {
        let mut stream = stream(&[&[1, 2], &[3]]);
        assert_eq!(stream.consume(4), None);
        assert_eq!(stream.peek(3), Some(vec![1, 2, 3]));
        assert_eq!(stream.available(), 3);
    }

    #[test]
    fn test_partial_packet_keeps_cursor()
    {
        let mut stream = stream(&[&[1, 2, 3, 4]]);
        assert_eq!(stream.consume(1), Some(vec![1]));
        let entries = stream.into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offset, 1);
        assert_eq!(entries[0].remaining(), &[2, 3, 4]);
    }

    #[test]
    fn test_skip_crosses_packets_and_stops_at_end()
    {
        let mut stream = stream(&[&[1, 2], &[3, 4]]);
        assert_eq!(stream.skip(3), 3);
        assert_eq!(stream.peek(1), Some(vec![4]));
        assert_eq!(stream.skip(5), 1);
        assert_eq!(stream.available(), 0);
        assert!(stream.into_entries().is_empty());
    }
}
