//! # Thread Profiler
//!
//! Context-swap and thread-lifetime events, and the reports built from them.
//!
//! Events arrive as a byte stream split arbitrarily across packets. The first
//! byte of each record is its type: scheduler events (`1..=5`) are fixed-size
//! context swaps, while `0x80..=0x82` introduce processes, threads, and the
//! time-counter reference. Records are decoded only once they are complete;
//! a partial record stays queued until the rest of it arrives.

use std::collections::VecDeque;

use scroll::{Pread, Pwrite, SizeWith, LE};

use super::fifo::ByteStream;
use super::pointer_array::PointerArray;
use super::units::duration;
use super::{ProfilerDataEntry, ShutdownFlag};
use crate::error::KestrelResult;

pub const CONTEXT_SWAP_SIZE: usize = 32;
/// Header shared by new-process and new-thread records, name excluded.
pub const NAMED_HEADER_SIZE: usize = 24;
pub const TIME_COUNTER_SIZE: usize = 32;

/// Largest process or thread record accepted.
pub const MAX_STRUCTURE_SIZE: u32 = 0x1000;

pub const EVENT_NEW_PROCESS: u8 = 0x80;
pub const EVENT_NEW_THREAD: u8 = 0x81;
pub const EVENT_TIME_COUNTER: u8 = 0x82;

/// Why a thread was switched out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapReason
{
    Preempted = 1,
    Blocked = 2,
    Yielded = 3,
    Suspended = 4,
    Exited = 5,
}

impl SwapReason
{
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self>
    {
        match code {
            1 => Some(Self::Preempted),
            2 => Some(Self::Blocked),
            3 => Some(Self::Yielded),
            4 => Some(Self::Suspended),
            5 => Some(Self::Exited),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str
    {
        match self {
            Self::Preempted => "preempted",
            Self::Blocked => "blocked",
            Self::Yielded => "yielded",
            Self::Suspended => "suspended",
            Self::Exited => "exited",
        }
    }
}

/// Context swap as sent by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pread, Pwrite, SizeWith)]
pub struct ContextSwapRecord
{
    /// [`SwapReason`] code.
    pub reason: u8,
    pub reserved: [u8; 3],
    pub process: u32,
    pub thread: u32,
    pub reserved2: u32,
    pub time: u64,
    pub blocking_queue: u64,
}

/// New-process or new-thread header. A NUL-terminated name follows it, and
/// `structure_size` covers both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pread, Pwrite, SizeWith)]
pub struct NamedRecordHeader
{
    pub event_type: u8,
    pub reserved: [u8; 3],
    pub structure_size: u32,
    pub process: u32,
    /// Zero in a new-process record.
    pub thread: u32,
    pub time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pread, Pwrite, SizeWith)]
pub struct TimeCounterRecord
{
    pub event_type: u8,
    pub reserved: [u8; 7],
    pub time: u64,
    pub system_time: u64,
    pub frequency: u64,
}

/// A thread being switched out on a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSwap
{
    pub processor: u32,
    pub reason: SwapReason,
    pub process: u32,
    pub thread: u32,
    pub time: u64,
    /// Queue the thread blocked on, or zero.
    pub blocking_queue: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord
{
    pub process: u32,
    pub time: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord
{
    pub process: u32,
    pub thread: u32,
    pub time: u64,
    pub name: String,
}

/// Reference point relating the time counter to wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeReference
{
    pub time: u64,
    pub system_time: u64,
    /// Time-counter ticks per second.
    pub frequency: u64,
}

/// Decoded thread-profiling state.
#[derive(Debug, Default)]
pub struct ThreadProfile
{
    context_swaps: PointerArray<ContextSwap>,
    processes: PointerArray<ProcessRecord>,
    threads: PointerArray<ThreadRecord>,
    reference: TimeReference,
    processor_count: u32,
    process_name_width: usize,
    thread_name_width: usize,
}

fn record_name(bytes: &[u8]) -> String
{
    let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

enum Decoded
{
    Done,
    Incomplete,
}

enum Named
{
    Record(NamedRecordHeader, String),
    Skipped,
    Incomplete,
}

impl ThreadProfile
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn context_swap_events(&self) -> &[ContextSwap]
    {
        &self.context_swaps
    }

    #[must_use]
    pub fn processes(&self) -> &[ProcessRecord]
    {
        &self.processes
    }

    #[must_use]
    pub fn threads(&self) -> &[ThreadRecord]
    {
        &self.threads
    }

    #[must_use]
    pub fn reference(&self) -> TimeReference
    {
        self.reference
    }

    /// Forget every processed context swap.
    pub fn clear(&mut self)
    {
        self.context_swaps.clear();
    }

    /// Decode as many complete records as `entries` holds.
    ///
    /// Returns the packets still holding unread bytes, cursors preserved, so the
    /// caller can queue them ahead of newer data.
    pub fn process(&mut self, entries: VecDeque<ProfilerDataEntry>, shutdown: &ShutdownFlag) -> VecDeque<ProfilerDataEntry>
    {
        if let Some(highest) = entries.iter().map(|entry| entry.processor).max() {
            self.processor_count = self.processor_count.max(highest.saturating_add(1));
        }

        let mut stream = ByteStream::new(entries);
        while !shutdown.is_requested() {
            let Some(peeked) = stream.peek(1) else {
                break;
            };

            let event_type = peeked[0];
            let outcome = match event_type {
                EVENT_NEW_PROCESS => self.decode_process(&mut stream),
                EVENT_NEW_THREAD => self.decode_thread(&mut stream),
                EVENT_TIME_COUNTER => self.decode_time_counter(&mut stream),
                code => match SwapReason::from_code(code) {
                    Some(reason) => self.decode_context_swap(&mut stream, reason),
                    None => {
                        tracing::warn!(event_type, "unrecognized thread profiling event");
                        // The type byte was just peeked.
                        stream.skip(1);
                        Ok(Decoded::Done)
                    }
                },
            };

            match outcome {
                Ok(Decoded::Done) => {}
                Ok(Decoded::Incomplete) => break,
                Err(e) => {
                    tracing::warn!(error = %e, event_type, "dropping malformed thread profiling record");
                }
            }
        }

        stream.into_entries()
    }

    fn decode_context_swap(&mut self, stream: &mut ByteStream, reason: SwapReason) -> KestrelResult<Decoded>
    {
        let processor = stream.front_processor().unwrap_or(0);
        let Some(bytes) = stream.consume(CONTEXT_SWAP_SIZE) else {
            return Ok(Decoded::Incomplete);
        };

        let record: ContextSwapRecord = bytes.as_slice().pread_with(0, LE)?;
        self.context_swaps.push(ContextSwap {
            processor,
            reason,
            process: record.process,
            thread: record.thread,
            time: record.time,
            blocking_queue: record.blocking_queue,
        });
        Ok(Decoded::Done)
    }

    /// Read a new-process or new-thread record, returning its header and name.
    fn named_record(stream: &mut ByteStream) -> KestrelResult<Named>
    {
        let Some(bytes) = stream.peek(NAMED_HEADER_SIZE) else {
            return Ok(Named::Incomplete);
        };

        let header: NamedRecordHeader = bytes.as_slice().pread_with(0, LE)?;
        let structure_size = header.structure_size;
        if structure_size > MAX_STRUCTURE_SIZE || (structure_size as usize) < NAMED_HEADER_SIZE {
            tracing::warn!(structure_size, "skipping thread profiling record with bad size");
            // The header was just peeked.
            stream.skip(NAMED_HEADER_SIZE);
            return Ok(Named::Skipped);
        }

        let Some(record) = stream.consume(structure_size as usize) else {
            return Ok(Named::Incomplete);
        };
        let name = record_name(&record[NAMED_HEADER_SIZE..]);
        Ok(Named::Record(header, name))
    }

    fn decode_process(&mut self, stream: &mut ByteStream) -> KestrelResult<Decoded>
    {
        let (header, name) = match Self::named_record(stream)? {
            Named::Record(header, name) => (header, name),
            Named::Skipped => return Ok(Decoded::Done),
            Named::Incomplete => return Ok(Decoded::Incomplete),
        };

        self.process_name_width = self.process_name_width.max(name.len());
        self.processes.push(ProcessRecord {
            process: header.process,
            time: header.time,
            name,
        });
        Ok(Decoded::Done)
    }

    fn decode_thread(&mut self, stream: &mut ByteStream) -> KestrelResult<Decoded>
    {
        let (header, name) = match Self::named_record(stream)? {
            Named::Record(header, name) => (header, name),
            Named::Skipped => return Ok(Decoded::Done),
            Named::Incomplete => return Ok(Decoded::Incomplete),
        };

        self.thread_name_width = self.thread_name_width.max(name.len());
        self.threads.push(ThreadRecord {
            process: header.process,
            thread: header.thread,
            time: header.time,
            name,
        });
        Ok(Decoded::Done)
    }

    fn decode_time_counter(&mut self, stream: &mut ByteStream) -> KestrelResult<Decoded>
    {
        let Some(bytes) = stream.consume(TIME_COUNTER_SIZE) else {
            return Ok(Decoded::Incomplete);
        };

        let record: TimeCounterRecord = bytes.as_slice().pread_with(0, LE)?;
        self.reference = TimeReference {
            time: record.time,
            system_time: record.system_time,
            frequency: record.frequency,
        };
        Ok(Decoded::Done)
    }

    fn process_name(&self, process: u32) -> String
    {
        self.processes
            .iter()
            .find(|record| record.process == process && !record.name.is_empty())
            .map_or_else(|| process.to_string(), |record| record.name.clone())
    }

    fn thread_name(&self, thread: u32) -> String
    {
        self.threads
            .iter()
            .find(|record| record.thread == thread && !record.name.is_empty())
            .map_or_else(|| thread.to_string(), |record| record.name.clone())
    }

    fn sort_context_swaps(&mut self)
    {
        self.context_swaps
            .sort_by_key(|event| (event.time, event.processor));
    }

    /// Chronological list of context swaps, optionally limited to `filter` threads.
    ///
    /// Each line shows the processor, process, thread, how long the processor
    /// ran since its previous swap, and why the thread left the processor.
    pub fn render_context_swaps(&mut self, filter: &[u32]) -> String
    {
        if self.context_swaps.is_empty() {
            return "No context swap data.\n".to_string();
        }

        self.sort_context_swaps();
        let frequency = self.reference.frequency;
        let mut previous = vec![0u64; self.processor_count as usize];
        let mut out = String::new();
        for event in self.context_swaps.iter() {
            let slot = event.processor as usize;
            if previous.len() <= slot {
                previous.resize(slot + 1, 0);
            }

            let ticks = if previous[slot] == 0 {
                0
            } else {
                event.time.wrapping_sub(previous[slot])
            };
            previous[slot] = event.time;

            if !filter.is_empty() && !filter.contains(&event.thread) {
                continue;
            }

            let elapsed = duration(ticks, frequency);
            let process = self.process_name(event.process);
            let thread = self.thread_name(event.thread);
            let (pw, tw) = (self.process_name_width, self.thread_name_width);
            if elapsed.times_ten {
                out.push_str(&format!(
                    "{:>3} {process:>pw$} {thread:>tw$} {:>3}.{}{:<2} {:>9}",
                    event.processor,
                    elapsed.whole(),
                    elapsed.tenths(),
                    elapsed.unit,
                    event.reason.as_str()
                ));
            } else {
                out.push_str(&format!(
                    "{:>3} {process:>pw$} {thread:>tw$} {:>5}{:<2} {:>9}",
                    event.processor,
                    elapsed.value,
                    elapsed.unit,
                    event.reason.as_str()
                ));
            }

            if event.blocking_queue != 0 {
                out.push_str(&format!(" {:x}\n", event.blocking_queue));
            } else {
                out.push('\n');
            }
        }
        out
    }

    /// Every process and, beneath it, the threads it owns.
    #[must_use]
    pub fn render_list(&self) -> String
    {
        if self.processes.is_empty() && self.threads.is_empty() {
            return "No data received.\n".to_string();
        }

        let mut out = String::from("Process Legend: StartTime ProcessId Name\nThread Legend: StartTime ProcessId ThreadId Name\n");
        for process in self.processes.iter() {
            out.push_str(&format!("Process {:16x} {} {}\n", process.time, process.process, process.name));
            for thread in self.threads.iter().filter(|thread| thread.process == process.process) {
                out.push_str(&format!(
                    "    Thread  {:16x} {} {} {}\n",
                    thread.time, thread.process, thread.thread, thread.name
                ));
            }
        }
        out
    }

    /// Wait queues threads blocked on, with average blocking time per queue
    /// and per thread.
    ///
    /// A block lasts from the blocking swap until the thread is next seen
    /// running: its next swap marks when it left the processor again, and the
    /// latest earlier event on that processor marks when it was switched in.
    pub fn render_blocking_queues(&mut self, filter: &[u32]) -> String
    {
        if self.context_swaps.is_empty() {
            return "No context swap data.\n".to_string();
        }

        self.sort_context_swaps();
        let frequency = self.reference.frequency;
        let events: &[ContextSwap] = &self.context_swaps;
        let mut queues: PointerArray<BlockingQueue> = PointerArray::new();
        let mut out = String::new();

        for (index, event) in events.iter().enumerate() {
            if !filter.is_empty() && !filter.contains(&event.thread) {
                continue;
            }
            if event.blocking_queue == 0 {
                continue;
            }

            let queue_index = match queues.iter().position(|queue| queue.queue == event.blocking_queue) {
                Some(found) => found,
                None => {
                    queues.push(BlockingQueue::new(event.blocking_queue));
                    queues.len() - 1
                }
            };
            let queue = &mut queues[queue_index];
            let thread_index = match queue.threads.iter().position(|thread| thread.thread == event.thread) {
                Some(found) => found,
                None => {
                    queue.threads.push(BlockedThread {
                        process: event.process,
                        thread: event.thread,
                        wait_count: 0,
                        wait_ticks: 0,
                    });
                    queue.threads.len() - 1
                }
            };

            let Some(wake) = events[index + 1..]
                .iter()
                .position(|candidate| candidate.thread == event.thread)
                .map(|offset| index + 1 + offset)
            else {
                continue;
            };

            let Some(resume) = events[index + 1..wake]
                .iter()
                .rev()
                .find(|candidate| candidate.processor == events[wake].processor)
            else {
                continue;
            };

            if resume.time < event.time {
                tracing::warn!(from = event.time, to = resume.time, "time counter moved backwards");
                out.push_str(&format!(
                    "TimeCounter appeared to move backwards from {:x} to {:x}.\n",
                    event.time, resume.time
                ));
                continue;
            }

            let ticks = resume.time - event.time;
            let thread = &mut queue.threads[thread_index];
            thread.wait_count += 1;
            thread.wait_ticks += ticks;
            queue.wait_count += 1;
            queue.wait_ticks += ticks;
        }

        queues.sort_by_key(|queue| queue.queue);

        out.push_str("Queue Legend: Queue BlockCount AverageBlockingDuration\n");
        out.push_str("Thread Legend: Process Thread BlockCount AverageBlockingDuration\n");
        let (pw, tw) = (self.process_name_width, self.thread_name_width);
        for queue in queues.iter() {
            let average = duration(queue.wait_ticks.checked_div(queue.wait_count).unwrap_or(0), frequency);
            if average.times_ten {
                out.push_str(&format!(
                    "{:08x} {:>6} {}.{}{:<2}\n",
                    queue.queue,
                    queue.wait_count,
                    average.whole(),
                    average.tenths(),
                    average.unit
                ));
            } else {
                out.push_str(&format!(
                    "{:08x} {:>6} {}{:<2}\n",
                    queue.queue, queue.wait_count, average.value, average.unit
                ));
            }

            for thread in queue.threads.iter().filter(|thread| thread.wait_count != 0) {
                let process = self.process_name(thread.process);
                let name = self.thread_name(thread.thread);
                let average = duration(thread.wait_ticks / thread.wait_count, frequency);
                if average.times_ten {
                    out.push_str(&format!(
                        "    {process:>pw$} {name:>tw$} {:>6} {}.{}{:<2}\n",
                        thread.wait_count,
                        average.whole(),
                        average.tenths(),
                        average.unit
                    ));
                } else {
                    out.push_str(&format!(
                        "    {process:>pw$} {name:>tw$} {:>6} {}{:<2}\n",
                        thread.wait_count, average.value, average.unit
                    ));
                }
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug)]
struct BlockedThread
{
    process: u32,
    thread: u32,
    wait_count: u64,
    wait_ticks: u64,
}

#[derive(Debug)]
struct BlockingQueue
{
    queue: u64,
    wait_count: u64,
    wait_ticks: u64,
    threads: PointerArray<BlockedThread>,
}

impl BlockingQueue
{
    fn new(queue: u64) -> Self
    {
        Self {
            queue,
            wait_count: 0,
            wait_ticks: 0,
            threads: PointerArray::new(),
        }
    }
}

#[cfg(test)]
fn encode<T>(record: T, size: usize) -> Vec<u8>
where
    T: scroll::ctx::TryIntoCtx<scroll::Endian, Error = scroll::Error>,
{
    let mut data = vec![0u8; size];
    data.as_mut_slice().pwrite_with(record, 0, LE).unwrap();
    data
}

/// Encode a context swap in the target's wire layout.
#[cfg(test)]
pub(crate) fn encode_context_swap(reason: SwapReason, process: u32, thread: u32, time: u64, blocking_queue: u64) -> Vec<u8>
{
    let record = ContextSwapRecord {
        reason: reason as u8,
        process,
        thread,
        time,
        blocking_queue,
        ..ContextSwapRecord::default()
    };
    encode(record, CONTEXT_SWAP_SIZE)
}

#[cfg(test)]
fn encode_named(event_type: u8, process: u32, thread: u32, time: u64, name: &str) -> Vec<u8>
{
    let header = NamedRecordHeader {
        event_type,
        structure_size: u32::try_from(NAMED_HEADER_SIZE + name.len() + 1).unwrap(),
        process,
        thread,
        time,
        ..NamedRecordHeader::default()
    };
    let mut data = encode(header, NAMED_HEADER_SIZE);
    data.extend_from_slice(name.as_bytes());
    data.push(0);
    data
}

#[cfg(test)]
pub(crate) fn encode_new_process(process: u32, time: u64, name: &str) -> Vec<u8>
{
    encode_named(EVENT_NEW_PROCESS, process, 0, time, name)
}

#[cfg(test)]
pub(crate) fn encode_new_thread(process: u32, thread: u32, time: u64, name: &str) -> Vec<u8>
{
    encode_named(EVENT_NEW_THREAD, process, thread, time, name)
}

#[cfg(test)]
pub(crate) fn encode_time_counter(time: u64, system_time: u64, frequency: u64) -> Vec<u8>
{
    let record = TimeCounterRecord {
        event_type: EVENT_TIME_COUNTER,
        time,
        system_time,
        frequency,
        ..TimeCounterRecord::default()
    };
    encode(record, TIME_COUNTER_SIZE)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use scroll::ctx::SizeWith;

    fn entries(packets: Vec<(u32, Vec<u8>)>) -> VecDeque<ProfilerDataEntry>
    {
        packets
            .into_iter()
            .map(|(processor, data)| ProfilerDataEntry::new(processor, data))
            .collect()
    }

    #[test]
    fn test_record_split_across_packets_waits_for_rest()
    {
        let record = encode_new_thread(1, 7, 0x100, "worker");
        let (head, tail) = record.split_at(10);
        let mut profile = ThreadProfile::new();
        let shutdown = ShutdownFlag::new();

        let leftover = profile.process(entries(vec![(0, head.to_vec())]), &shutdown);
        assert!(profile.threads().is_empty());
        assert_eq!(leftover.len(), 1);

        let mut queued = leftover;
        queued.push_back(ProfilerDataEntry::new(0, tail.to_vec()));
        let leftover = profile.process(queued, &shutdown);
        assert!(leftover.is_empty());
        assert_eq!(profile.threads()[0].name, "worker");
        assert_eq!(profile.threads()[0].thread, 7);
    }

    #[test]
    fn test_wire_sizes()
    {
        assert_eq!(ContextSwapRecord::size_with(&LE), CONTEXT_SWAP_SIZE);
        assert_eq!(NamedRecordHeader::size_with(&LE), NAMED_HEADER_SIZE);
        assert_eq!(TimeCounterRecord::size_with(&LE), TIME_COUNTER_SIZE);
    }

    #[test]
    fn test_bad_structure_size_skips_header()
    {
        let mut data = encode_new_thread(1, 7, 0x100, "worker");
        data[4..8].copy_from_slice(&0x2000u32.to_le_bytes());
        data.extend(encode_time_counter(5, 6, 1000));
        let mut profile = ThreadProfile::new();
        let leftover = profile.process(entries(vec![(0, data)]), &ShutdownFlag::new());

        // The name bytes after the skipped header are dropped as unknown events.
        assert!(profile.threads().is_empty());
        assert!(leftover.is_empty());
        assert_eq!(profile.reference().frequency, 1000);
    }

    #[test]
    fn test_unknown_event_type_consumes_one_byte()
    {
        let mut data = vec![0x42];
        data.extend(encode_time_counter(5, 6, 1000));
        let mut profile = ThreadProfile::new();
        let leftover = profile.process(entries(vec![(0, data)]), &ShutdownFlag::new());
        assert!(leftover.is_empty());
        assert_eq!(profile.reference().frequency, 1000);
    }

    #[test]
    fn test_context_swap_takes_processor_from_packet()
    {
        let mut profile = ThreadProfile::new();
        let data = encode_context_swap(SwapReason::Yielded, 1, 2, 10, 0);
        profile.process(entries(vec![(3, data)]), &ShutdownFlag::new());
        assert_eq!(profile.context_swap_events()[0].processor, 3);
        assert_eq!(profile.context_swap_events()[0].reason, SwapReason::Yielded);
    }

    #[test]
    fn test_list_groups_threads_under_processes()
    {
        let mut data = encode_new_process(1, 0x10, "init");
        data.extend(encode_new_thread(1, 5, 0x20, "main"));
        data.extend(encode_new_thread(2, 6, 0x30, "other"));
        let mut profile = ThreadProfile::new();
        profile.process(entries(vec![(0, data)]), &ShutdownFlag::new());

        let expected = format!(
            "Process Legend: StartTime ProcessId Name\nThread Legend: StartTime ProcessId ThreadId Name\n\
             Process {:>16} 1 init\n    Thread  {:>16} 1 5 main\n",
            "10", "20"
        );
        assert_eq!(profile.render_list(), expected);
    }

    #[test]
    fn test_blocking_queue_duration_runs_until_resume()
    {
        let mut data = encode_time_counter(0, 0, 1_000_000_000);
        data.extend(encode_context_swap(SwapReason::Blocked, 1, 5, 100, 0xabc));
        data.extend(encode_context_swap(SwapReason::Preempted, 1, 6, 600, 0));
        data.extend(encode_context_swap(SwapReason::Yielded, 1, 5, 900, 0));
        let mut profile = ThreadProfile::new();
        profile.process(entries(vec![(0, data)]), &ShutdownFlag::new());

        let report = profile.render_blocking_queues(&[]);
        let queue_line = report.lines().find(|line| line.starts_with("00000abc")).unwrap();
        assert_eq!(queue_line.split_whitespace().collect::<Vec<_>>(), vec!["00000abc", "1", "500ns"]);
        assert!(report.contains("     1 500ns\n\n"), "{report}");
    }

    #[test]
    fn test_context_swap_durations_per_processor()
    {
        let mut data = encode_time_counter(0, 0, 1_000_000_000);
        data.extend(encode_context_swap(SwapReason::Preempted, 1, 5, 100, 0));
        data.extend(encode_context_swap(SwapReason::Blocked, 1, 6, 400, 0x10));
        let mut profile = ThreadProfile::new();
        profile.process(entries(vec![(0, data)]), &ShutdownFlag::new());

        let report = profile.render_context_swaps(&[]);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split_whitespace().collect::<Vec<_>>(), vec!["0", "1", "5", "0ns", "preempted"]);
        assert_eq!(
            lines[1].split_whitespace().collect::<Vec<_>>(),
            vec!["0", "1", "6", "300ns", "blocked", "10"]
        );

        let filtered = profile.render_context_swaps(&[6]);
        assert_eq!(filtered.lines().count(), 1);
    }

    #[test]
    fn test_empty_reports()
    {
        let mut profile = ThreadProfile::new();
        assert_eq!(profile.render_context_swaps(&[]), "No context swap data.\n");
        assert_eq!(profile.render_blocking_queues(&[]), "No context swap data.\n");
        assert_eq!(profile.render_list(), "No data received.\n");
    }
}
