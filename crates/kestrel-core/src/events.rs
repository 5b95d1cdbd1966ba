//! Target event types and helpers.
//!
//! The transport publishes these whenever the debuggee breaks in, loads or
//! unloads an image, or sends a profiler notification. The command thread
//! applies them to its [`crate::context::DebuggerContext`] with
//! `handle_event`.

use std::sync::mpsc;

use crate::modules::{Module, ModuleId};
use crate::profiler::ProfilerDataType;
use crate::registers::RegisterSnapshot;
use crate::types::Address;

/// Event emitted by a target transport.
#[derive(Debug, Clone)]
pub enum TargetEvent
{
    /// The target stopped and captured its registers.
    Break
    {
        registers: RegisterSnapshot,
        /// Address of the instruction that caused the break.
        address: Address,
    },
    /// A new image was loaded.
    ModuleLoaded(Module),
    /// A previously loaded image went away.
    ModuleUnloaded(ModuleId),
    /// A profiler notification packet. Tags past the known data types mark
    /// the end of a collection round.
    Profiler
    {
        processor: u32,
        tag: u32,
        data: Vec<u8>,
    },
}

impl TargetEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::Break { address, registers } => {
                format!("Break at {address} ({})", registers.architecture())
            }
            Self::ModuleLoaded(module) => {
                format!("Loaded {} at {}", module.name(), module.actual_base())
            }
            Self::ModuleUnloaded(id) => format!("Unloaded module {}", id.0),
            Self::Profiler { processor, tag, data } => match ProfilerDataType::from_tag(*tag) {
                Some(kind) => format!("Profiler {kind} data from processor {processor} ({} bytes)", data.len()),
                None => format!("Profiler round complete on processor {processor}"),
            },
        }
    }
}

/// Sender side of the target event channel.
pub type TargetEventSender = mpsc::Sender<TargetEvent>;
/// Receiver side of the target event channel.
pub type TargetEventReceiver = mpsc::Receiver<TargetEvent>;

/// Create a new target event channel.
#[must_use]
pub fn event_channel() -> (TargetEventSender, TargetEventReceiver)
{
    mpsc::channel()
}

#[cfg(test)]
mod tests
{
    use std::thread;

    use super::*;

    #[test]
    fn test_events_cross_threads()
    {
        let (sender, receiver) = event_channel();
        let transport = thread::spawn(move || {
            sender
                .send(TargetEvent::Profiler {
                    processor: 1,
                    tag: 0,
                    data: vec![0; 8],
                })
                .unwrap();
            sender
                .send(TargetEvent::Profiler {
                    processor: 1,
                    tag: 3,
                    data: Vec::new(),
                })
                .unwrap();
        });
        transport.join().unwrap();

        let descriptions: Vec<String> = receiver.iter().map(|event| event.describe()).collect();
        assert_eq!(
            descriptions,
            vec![
                "Profiler stack data from processor 1 (8 bytes)".to_string(),
                "Profiler round complete on processor 1".to_string(),
            ]
        );
    }

    #[test]
    fn test_describe_module_events()
    {
        assert_eq!(TargetEvent::ModuleUnloaded(ModuleId(7)).describe(), "Unloaded module 7");
    }
}
