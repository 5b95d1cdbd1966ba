//! # Profiler Aggregator
//!
//! Collects profiler notifications streamed by the target and turns them into
//! reports.
//!
//! The transport thread owns a [`ProfilerSink`] clone and only appends packets.
//! The command thread owns [`ProfilerState`] and drains the sink on demand:
//! stack samples merge into a [`CallTree`], memory snapshots decode into pool
//! statistics, and thread events feed a [`ThreadProfile`]. No sink lock is held
//! while decoding or symbolizing.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_core::profiler::{ProfilerSink, ProfilerState, ShutdownFlag};
//! use kestrel_core::profiler::stack::sentinel;
//!
//! let sink = ProfilerSink::new();
//! let mut state = ProfilerState::new(sink.clone(), ShutdownFlag::new());
//!
//! // One sample, [sentinel, leaf, root], in 32-bit words.
//! let words = [sentinel(12) as u32, 0x2000, 0x1000];
//! let data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
//! sink.push(0, 0, data);
//!
//! let report = state.stack_report(0, 4, &|address| format!("{address:#x}"))?;
//! assert!(report.starts_with(" +Root: 100%, 1"));
//! # Ok::<(), kestrel_core::KestrelError>(())
//! ```

pub mod fifo;
pub mod memory;
pub mod pointer_array;
pub mod stack;
pub mod thread;
pub mod units;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

pub use self::memory::MemoryPool;
pub use self::stack::{CallTree, StackSample};
pub use self::thread::ThreadProfile;
use crate::error::{KestrelError, KestrelResult};

/// Flag set on the last memory packet of a collection round.
pub const PROFILER_DATA_FLAGS_MEMORY_SENTINEL: u32 = 0x1;

pub const PROFILER_USAGE: &str = "Usage: profiler <type> [options...]\n\
Valid Types:\n  \
stack  - Samples the execution call stack at a regular interval.\n  \
memory - Displays kernel memory pool data.\n  \
thread - Displays kernel thread information.\n  \
help   - Display this help.\n\
Try 'profiler <type> help' for help with a specific profiling type.\n\
Note that profiling must be activated on the target for data to be \n\
received.\n\n";

pub const STACK_PROFILER_USAGE: &str = "Usage: profiler stack <command> [options...]\n\
This command works with periodic stack trace data sent from the target.\n\
Valid commands are:\n  \
start - Begin displaying stack profiling data in the UI. Note that \n          \
stack-based profiling must be activated in the target.\n  \
stop  - Stop displaying stack profiling data in the UI. If profiling \n          \
is still activated in the target then data collection will \n          \
continue to occur.\n  \
clear - Delete all historical data stored in the debugger.\n  \
dump  - Write the stack profiling data out to the debugger command \n          \
console.\n  \
threshold <percentage> - Set the threshold as a percentage of total \n          \
hits that a stack entry must achieve to be printed out in \n          \
the dump. This is useful for limiting results to only those \n          \
that dominate the sampling.\n  \
help  - Display this help.\n\n";

pub const MEMORY_PROFILER_USAGE: &str = "Usage: profiler memory <command> [options...]\n\
This command works with memory statistics sent periodically from the \n\
target. Valid commands are:\n  \
start - Begin displaying memory profiling data in the UI. Note that \n          \
memory profiling must be activated in the target as well.\n  \
delta - Begin displaying memory profiling data in the UI as a\n          \
difference from the current snap of memory information. \n          \
Values that are not different from the current snap will \n          \
not be displayed.\n  \
stop  - Stop displaying memory profiling data in the UI. Data may \n          \
still be collected if activated in the target.\n  \
clear - Delete all historical data stored in the debugger.\n  \
dump  - Write the memory profiling data out to the debugger command \n          \
console.\n  \
threshold <activecount> - Set the minimum threshold of active\n          \
allocations that must be reached for an allocation to be\n          \
displayed. This is useful for weeding out unimportant data.\n";

pub const THREAD_PROFILER_USAGE: &str = "Usage: profiler thread <command> [options...]\n\
This command works with context swap and thread lifetime information \n\
sent from the target. Valid commands are:\n  \
clear - Delete all historical data stored in the debugger.\n  \
contextswaps [threadID...] - Write the thread context swap events \n          \
out to the debugger command console. A list of thread IDs \n          \
can be optionally specified to only print events related to \n          \
those threads. If not specified, data for all threads will \n          \
be printed.\n  \
list  - Write a summary of all processes and threads contained in \n          \
the data.\n  \
blockingqueues [threadID...] - Dump a list of blocking wait queues \n          \
threads are waiting on, sorted in descending order by the \n          \
number of times that queue has been blocked on. The list \n          \
can be optionally restricted to queues waited on by the \n          \
given list of thread IDs.\n  \
help  - Display this help.\n\n";

/// Kind of data carried by a profiler notification.
///
/// Notification tags past the last variant mark the end of a collection round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfilerDataType
{
    Stack = 0,
    Memory = 1,
    Thread = 2,
}

impl ProfilerDataType
{
    #[must_use]
    pub fn from_tag(tag: u32) -> Option<Self>
    {
        match tag {
            0 => Some(Self::Stack),
            1 => Some(Self::Memory),
            2 => Some(Self::Thread),
            _ => None,
        }
    }
}

impl fmt::Display for ProfilerDataType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Stack => write!(f, "stack"),
            Self::Memory => write!(f, "memory"),
            Self::Thread => write!(f, "thread"),
        }
    }
}

/// One notification payload queued for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerDataEntry
{
    pub processor: u32,
    pub flags: u32,
    /// Bytes already consumed from the front of `data`.
    pub offset: usize,
    pub data: Vec<u8>,
}

impl ProfilerDataEntry
{
    #[must_use]
    pub fn new(processor: u32, data: Vec<u8>) -> Self
    {
        Self {
            processor,
            flags: 0,
            offset: 0,
            data,
        }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &[u8]
    {
        self.data.get(self.offset..).unwrap_or_default()
    }

    #[must_use]
    pub fn is_memory_sentinel(&self) -> bool
    {
        self.flags & PROFILER_DATA_FLAGS_MEMORY_SENTINEL != 0
    }
}

/// Cooperative cancellation for long drains, set from the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn request(&self)
    {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool
    {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self)
    {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct MemoryQueue
{
    entries: VecDeque<ProfilerDataEntry>,
    collection_active: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T>
{
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock-protected packet queues shared with the transport thread.
#[derive(Debug, Clone, Default)]
pub struct ProfilerSink
{
    stack: Arc<Mutex<VecDeque<ProfilerDataEntry>>>,
    memory: Arc<Mutex<MemoryQueue>>,
    thread: Arc<Mutex<VecDeque<ProfilerDataEntry>>>,
}

impl ProfilerSink
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Queue one notification.
    ///
    /// Tags 0, 1, and 2 carry stack, memory, and thread data. Any other tag
    /// closes the current memory collection round by marking its newest packet
    /// as a sentinel.
    pub fn push(&self, processor: u32, tag: u32, data: Vec<u8>)
    {
        trace!(processor, tag, size = data.len(), "profiler packet");
        match ProfilerDataType::from_tag(tag) {
            Some(ProfilerDataType::Stack) => lock(&self.stack).push_back(ProfilerDataEntry::new(processor, data)),
            Some(ProfilerDataType::Memory) => {
                let mut memory = lock(&self.memory);
                memory.collection_active = true;
                memory.entries.push_back(ProfilerDataEntry::new(processor, data));
            }
            Some(ProfilerDataType::Thread) => lock(&self.thread).push_back(ProfilerDataEntry::new(processor, data)),
            None => {
                let mut memory = lock(&self.memory);
                if memory.collection_active {
                    if let Some(newest) = memory.entries.back_mut() {
                        newest.flags |= PROFILER_DATA_FLAGS_MEMORY_SENTINEL;
                    }
                    memory.collection_active = false;
                }
            }
        }
    }

    #[must_use]
    pub fn pending_stack(&self) -> usize
    {
        lock(&self.stack).len()
    }

    #[must_use]
    pub fn pending_memory(&self) -> usize
    {
        lock(&self.memory).entries.len()
    }

    #[must_use]
    pub fn pending_thread(&self) -> usize
    {
        lock(&self.thread).len()
    }

    /// True once a complete memory round is queued.
    #[must_use]
    pub fn has_memory_snapshot(&self) -> bool
    {
        lock(&self.memory).entries.iter().any(ProfilerDataEntry::is_memory_sentinel)
    }

    /// Take every queued stack packet.
    #[must_use]
    pub fn take_stack(&self) -> VecDeque<ProfilerDataEntry>
    {
        std::mem::take(&mut *lock(&self.stack))
    }

    /// Put unprocessed stack packets back ahead of anything queued since.
    pub fn requeue_stack(&self, mut entries: VecDeque<ProfilerDataEntry>)
    {
        let mut queue = lock(&self.stack);
        entries.append(&mut queue);
        *queue = entries;
    }

    /// Take the newest complete memory round, concatenated.
    ///
    /// Packets after the newest sentinel belong to a round still in progress
    /// and stay queued. Rounds older than the newest one are discarded.
    /// Returns `None` when no round has completed.
    #[must_use]
    pub fn take_memory_snapshot(&self) -> Option<Vec<u8>>
    {
        let mut memory = lock(&self.memory);
        let newest = memory.entries.iter().rposition(ProfilerDataEntry::is_memory_sentinel)?;
        let mut round: Vec<ProfilerDataEntry> = memory.entries.drain(..=newest).collect();
        drop(memory);

        let start = round[..round.len() - 1]
            .iter()
            .rposition(ProfilerDataEntry::is_memory_sentinel)
            .map_or(0, |previous| previous + 1);
        if start > 0 {
            debug!(discarded = start, "discarding stale memory rounds");
        }
        let snapshot = round
            .drain(start..)
            .flat_map(|entry| entry.data.into_iter().skip(entry.offset))
            .collect();
        Some(snapshot)
    }

    #[must_use]
    pub fn take_thread(&self) -> VecDeque<ProfilerDataEntry>
    {
        std::mem::take(&mut *lock(&self.thread))
    }

    /// Put partially consumed thread packets back ahead of newer ones.
    pub fn requeue_thread(&self, mut entries: VecDeque<ProfilerDataEntry>)
    {
        let mut queue = lock(&self.thread);
        entries.append(&mut queue);
        *queue = entries;
    }

    pub fn clear_thread(&self)
    {
        lock(&self.thread).clear();
    }
}

/// Command-thread view of everything the profiler has collected.
#[derive(Debug)]
pub struct ProfilerState
{
    sink: ProfilerSink,
    shutdown: ShutdownFlag,
    stack_tree: CallTree,
    stack_live: bool,
    memory_latest: Option<Vec<MemoryPool>>,
    memory_baseline: Option<Vec<MemoryPool>>,
    memory_live: bool,
    threads: ThreadProfile,
}

impl ProfilerState
{
    #[must_use]
    pub fn new(sink: ProfilerSink, shutdown: ShutdownFlag) -> Self
    {
        Self {
            sink,
            shutdown,
            stack_tree: CallTree::new(),
            stack_live: false,
            memory_latest: None,
            memory_baseline: None,
            memory_live: false,
            threads: ThreadProfile::new(),
        }
    }

    #[must_use]
    pub fn sink(&self) -> &ProfilerSink
    {
        &self.sink
    }

    #[must_use]
    pub fn shutdown(&self) -> &ShutdownFlag
    {
        &self.shutdown
    }

    #[must_use]
    pub fn stack_tree(&self) -> &CallTree
    {
        &self.stack_tree
    }

    #[must_use]
    pub fn threads(&self) -> &ThreadProfile
    {
        &self.threads
    }

    #[must_use]
    pub fn is_delta_mode(&self) -> bool
    {
        self.memory_baseline.is_some()
    }

    /// Merge queued stack samples into the call tree.
    ///
    /// Packets are parsed and merged one at a time. A packet is validated as
    /// a whole before any of its samples are merged. Packets not reached
    /// before a shutdown request stay queued.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Invalid`] for a malformed packet. Packets merged
    /// before it stay in the tree. It and the packets after it are dropped.
    pub fn drain_stack(&mut self, pointer_size: usize, symbolize: &dyn Fn(u64) -> String) -> KestrelResult<()>
    {
        let mut entries = self.sink.take_stack();
        let mut merged = 0usize;
        while let Some(entry) = entries.pop_front() {
            if self.shutdown.is_requested() {
                entries.push_front(entry);
                debug!(remaining = entries.len(), "stack drain interrupted");
                self.sink.requeue_stack(entries);
                break;
            }

            let samples = match stack::parse_payload(entry.remaining(), pointer_size) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(error = %e, dropped = entries.len() + 1, merged, "dropping stack packets");
                    return Err(e);
                }
            };
            for sample in &samples {
                self.stack_tree.merge(sample, symbolize);
            }
            merged += samples.len();
        }

        debug!(samples = merged, "merged stack samples");
        Ok(())
    }

    /// Drain and render the call tree, hiding nodes below `threshold` percent.
    ///
    /// ## Errors
    ///
    /// Propagates [`ProfilerState::drain_stack`] failures.
    pub fn stack_report(
        &mut self,
        threshold: u32,
        pointer_size: usize,
        symbolize: &dyn Fn(u64) -> String,
    ) -> KestrelResult<String>
    {
        self.drain_stack(pointer_size, symbolize)?;
        Ok(self.stack_tree.render(threshold))
    }

    pub fn start_stack(&mut self)
    {
        self.stack_live = true;
    }

    pub fn stop_stack(&mut self)
    {
        self.stack_live = false;
    }

    pub fn clear_stack(&mut self)
    {
        self.stack_tree.clear();
    }

    /// Decode the newest complete memory round, if one arrived.
    ///
    /// Returns whether new data was decoded. The previous snapshot is kept
    /// when none did.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Invalid`] for malformed pool data.
    pub fn refresh_memory(&mut self) -> KestrelResult<bool>
    {
        let Some(snapshot) = self.sink.take_memory_snapshot() else {
            return Ok(false);
        };
        let pools = memory::decode_pools(&snapshot)?;
        debug!(pools = pools.len(), "decoded memory snapshot");
        self.memory_latest = Some(pools);
        Ok(true)
    }

    /// Render the newest memory snapshot, as a delta when a baseline is set.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Invalid`] when no snapshot has ever arrived or
    /// the newest one is malformed.
    pub fn memory_report(&mut self, threshold: i32) -> KestrelResult<String>
    {
        self.refresh_memory()?;
        let Some(latest) = &self.memory_latest else {
            return Err(KestrelError::invalid("There is no valid memory data to display."));
        };

        Ok(match &self.memory_baseline {
            Some(baseline) => memory::render_pools(&memory::delta(latest, baseline), true, threshold),
            None => memory::render_pools(latest, false, threshold),
        })
    }

    pub fn start_memory(&mut self)
    {
        self.memory_live = true;
    }

    pub fn stop_memory(&mut self)
    {
        self.memory_live = false;
    }

    /// Use the newest snapshot as the baseline for later reports.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::Invalid`] if a freshly fetched snapshot is
    /// malformed.
    pub fn start_memory_delta(&mut self) -> KestrelResult<String>
    {
        self.memory_baseline = None;
        if self.memory_latest.is_none() {
            self.refresh_memory()?;
        }

        match &self.memory_latest {
            Some(latest) => {
                self.memory_baseline = Some(latest.clone());
                Ok("Memory profiler delta mode enabled.\n".to_string())
            }
            None => Ok("There is no memory data available to establish a baseline for delta mode.\n".to_string()),
        }
    }

    pub fn stop_memory_delta(&mut self) -> String
    {
        self.memory_baseline = None;
        "Memory profiler delta mode disabled.\n".to_string()
    }

    /// Decode queued thread events, keeping partial records queued.
    pub fn process_threads(&mut self)
    {
        let entries = self.sink.take_thread();
        if entries.is_empty() {
            return;
        }
        let leftover = self.threads.process(entries, &self.shutdown);
        if !leftover.is_empty() {
            trace!(packets = leftover.len(), "requeueing partial thread records");
            self.sink.requeue_thread(leftover);
        }
    }

    /// Drop processed context swaps and any queued thread packets.
    pub fn clear_threads(&mut self)
    {
        self.threads.clear();
        self.sink.clear_thread();
    }

    pub fn context_swaps(&mut self, filter: &[u32]) -> String
    {
        self.process_threads();
        self.threads.render_context_swaps(filter)
    }

    pub fn thread_list(&mut self) -> String
    {
        self.process_threads();
        self.threads.render_list()
    }

    pub fn blocking_queues(&mut self, filter: &[u32]) -> String
    {
        self.process_threads();
        self.threads.render_blocking_queues(filter)
    }

    /// Reports for live displays that have new data waiting.
    ///
    /// Called by the command loop before each prompt.
    ///
    /// ## Errors
    ///
    /// Propagates drain and decode failures.
    pub fn live_reports(
        &mut self,
        stack_threshold: u32,
        memory_threshold: i32,
        pointer_size: usize,
        symbolize: &dyn Fn(u64) -> String,
    ) -> KestrelResult<String>
    {
        let mut out = String::new();
        if self.stack_live && self.sink.pending_stack() > 0 {
            out.push_str(&self.stack_report(stack_threshold, pointer_size, symbolize)?);
        }
        if self.memory_live && self.sink.has_memory_snapshot() {
            out.push_str(&self.memory_report(memory_threshold)?);
        }
        if self.shutdown.is_requested() {
            warn!("live profiler display interrupted");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests
{
    use super::memory::{encode_pools, TagStatistic};
    use super::*;

    fn pool(active_count: u32) -> MemoryPool
    {
        MemoryPool {
            memory_type: 1,
            total_pool_size: 0x1000,
            free_list_size: 0x800,
            allocation_calls: 10,
            free_calls: 4,
            failed_allocations: 0,
            tags: vec![TagStatistic {
                tag: u32::from_le_bytes(*b"Test"),
                largest_allocation: 0x40,
                active_size: 0x100,
                largest_active_size: 0x200,
                lifetime_allocation_size: 0x400,
                active_count,
                largest_active_count: 8,
            }],
        }
    }

    #[test]
    fn test_data_type_tags()
    {
        assert_eq!(ProfilerDataType::from_tag(1), Some(ProfilerDataType::Memory));
        assert_eq!(ProfilerDataType::from_tag(3), None);
        assert_eq!(ProfilerDataType::Thread.to_string(), "thread");
    }

    #[test]
    fn test_end_of_round_marks_newest_memory_packet()
    {
        let sink = ProfilerSink::new();
        sink.push(0, 1, vec![1]);
        sink.push(0, 1, vec![2]);
        assert!(!sink.has_memory_snapshot());
        sink.push(0, 3, Vec::new());
        assert!(sink.has_memory_snapshot());

        // A second end-of-round tag without new data changes nothing.
        sink.push(0, 3, Vec::new());
        assert_eq!(sink.take_memory_snapshot(), Some(vec![1, 2]));
    }

    #[test]
    fn test_memory_snapshot_uses_newest_round_and_keeps_partial()
    {
        let sink = ProfilerSink::new();
        sink.push(0, 1, vec![1]);
        sink.push(0, 3, Vec::new());
        sink.push(0, 1, vec![2]);
        sink.push(0, 1, vec![3]);
        sink.push(0, 3, Vec::new());
        sink.push(0, 1, vec![4]);

        assert_eq!(sink.take_memory_snapshot(), Some(vec![2, 3]));
        assert_eq!(sink.pending_memory(), 1);
        assert_eq!(sink.take_memory_snapshot(), None);
    }

    #[test]
    fn test_bad_stack_packet_keeps_earlier_samples()
    {
        let sink = ProfilerSink::new();
        let mut state = ProfilerState::new(sink.clone(), ShutdownFlag::new());
        let good: Vec<u8> = [stack::sentinel(8) as u32, 0x10].iter().flat_map(|w| w.to_le_bytes()).collect();
        sink.push(0, 0, good.clone());
        state.drain_stack(4, &|a| format!("{a:x}")).unwrap();
        assert_eq!(state.stack_tree().total(), 1);

        // The good packet ahead of the bad one is kept, the one behind it dropped.
        sink.push(0, 0, good.clone());
        sink.push(0, 0, vec![0; 6]);
        sink.push(0, 0, good);
        let err = state.drain_stack(4, &|a| format!("{a:x}")).unwrap_err();
        assert_eq!(err.to_string(), "Bad profiler data size 6.");
        assert_eq!(state.stack_tree().total(), 2);
        assert_eq!(sink.pending_stack(), 0);
    }

    #[test]
    fn test_shutdown_keeps_stack_packets_queued()
    {
        let sink = ProfilerSink::new();
        let shutdown = ShutdownFlag::new();
        let mut state = ProfilerState::new(sink.clone(), shutdown.clone());
        sink.push(0, 0, vec![0; 8]);
        shutdown.request();
        state.drain_stack(4, &|a| format!("{a:x}")).unwrap();
        assert_eq!(sink.pending_stack(), 1);
        shutdown.reset();
        assert!(!shutdown.is_requested());
    }

    #[test]
    fn test_memory_delta_lifecycle()
    {
        let sink = ProfilerSink::new();
        let mut state = ProfilerState::new(sink.clone(), ShutdownFlag::new());
        assert!(state.memory_report(0).is_err());
        assert_eq!(
            state.start_memory_delta().unwrap(),
            "There is no memory data available to establish a baseline for delta mode.\n"
        );

        sink.push(0, 1, encode_pools(&[pool(4)]));
        sink.push(0, 3, Vec::new());
        assert_eq!(state.start_memory_delta().unwrap(), "Memory profiler delta mode enabled.\n");
        assert!(state.is_delta_mode());

        // Same snapshot again: the delta hides every tag.
        let report = state.memory_report(0).unwrap();
        assert!(!report.contains("Test"), "{report}");

        assert_eq!(state.stop_memory_delta(), "Memory profiler delta mode disabled.\n");
        let report = state.memory_report(0).unwrap();
        assert!(report.contains("Test"), "{report}");
    }

    #[test]
    fn test_thread_clear_drops_queued_packets()
    {
        let sink = ProfilerSink::new();
        let mut state = ProfilerState::new(sink.clone(), ShutdownFlag::new());
        sink.push(0, 2, thread::encode_context_swap(thread::SwapReason::Preempted, 1, 2, 3, 0));
        state.process_threads();
        sink.push(0, 2, vec![1, 2]);
        state.clear_threads();
        assert_eq!(sink.pending_thread(), 0);
        assert_eq!(state.context_swaps(&[]), "No context swap data.\n");
    }

    #[test]
    fn test_live_reports_only_when_enabled_and_pending()
    {
        let sink = ProfilerSink::new();
        let mut state = ProfilerState::new(sink.clone(), ShutdownFlag::new());
        let sample: Vec<u8> = [stack::sentinel(8) as u32, 0x10].iter().flat_map(|w| w.to_le_bytes()).collect();
        sink.push(0, 0, sample.clone());
        let symbolize = |a: u64| format!("{a:x}");
        assert_eq!(state.live_reports(0, 0, 4, &symbolize).unwrap(), "");

        state.start_stack();
        assert!(state.live_reports(0, 0, 4, &symbolize).unwrap().starts_with(" +Root: 100%, 1"));
        assert_eq!(state.live_reports(0, 0, 4, &symbolize).unwrap(), "");

        state.stop_stack();
        sink.push(0, 0, sample);
        assert_eq!(state.live_reports(0, 0, 4, &symbolize).unwrap(), "");
    }
}
