//! # Offline Sessions
//!
//! A session file is a JSON snapshot of a stopped target: registers, loaded
//! modules with their symbol tables, memory contents, and profiler packets
//! captured from the transport. Loading one gives a [`DebuggerContext`] that
//! behaves like a live connection.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_core::session::Session;
//!
//! let session = Session::from_json(r#"{
//!     "registers": { "arch": "x86", "registers": { "eax": 16 } },
//!     "memory": [ { "address": 4096, "bytes": [1, 2, 3, 4] } ]
//! }"#)?;
//!
//! let context = session.context()?;
//! assert_eq!(context.evaluate("@eax+1")?, 0x11);
//! # Ok::<(), kestrel_core::KestrelError>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::DebuggerContext;
use crate::error::KestrelResult;
use crate::modules::{Module, ModuleId, ModuleList};
use crate::profiler::{ProfilerSink, ShutdownFlag};
use crate::registers::RegisterSnapshot;
use crate::symbols::table::SymbolTableData;
use crate::symbols::InMemorySymbolTable;
use crate::target::{InMemoryTarget, MemorySegment};
use crate::types::{Address, ProcessId};

/// A loaded image as recorded in a session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord
{
    pub id: ModuleId,
    pub path: String,
    #[serde(default)]
    pub preferred_base: Address,
    pub actual_base: Address,
    pub size: u64,
    #[serde(default)]
    pub process: ProcessId,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub symbols: Option<SymbolTableData>,
}

impl ModuleRecord
{
    fn to_module(&self) -> Module
    {
        let module = Module::new(self.id, &self.path, self.preferred_base, self.actual_base, self.size)
            .with_process(self.process)
            .with_timestamp(self.timestamp);
        match &self.symbols {
            Some(symbols) => module.with_symbols(Arc::new(InMemorySymbolTable::from_data(symbols.clone()))),
            None => module,
        }
    }
}

/// One profiler notification as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerPacket
{
    #[serde(default)]
    pub processor: u32,
    pub tag: u32,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// Contents of a session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session
{
    pub registers: RegisterSnapshot,
    #[serde(default)]
    pub current_process: ProcessId,
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
    #[serde(default)]
    pub memory: Vec<MemorySegment>,
    #[serde(default)]
    pub profiler: Vec<ProfilerPacket>,
}

impl Session
{
    /// Read a session file.
    ///
    /// ## Errors
    ///
    /// - [`crate::KestrelError::Io`] if the file cannot be read
    /// - [`crate::KestrelError::Session`] if it is not a valid session document
    pub fn load(path: impl AsRef<Path>) -> KestrelResult<Self>
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let session = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            modules = session.modules.len(),
            segments = session.memory.len(),
            packets = session.profiler.len(),
            "loaded session"
        );
        Ok(session)
    }

    /// Parse a session document.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::KestrelError::Session`] for malformed JSON.
    pub fn from_json(text: &str) -> KestrelResult<Self>
    {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize back to pretty-printed JSON.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::KestrelError::Session`] if serialization fails.
    pub fn to_json(&self) -> KestrelResult<String>
    {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Module list with a symbol table per module that carries one.
    #[must_use]
    pub fn module_list(&self) -> ModuleList
    {
        let mut modules = ModuleList::new();
        modules.set_current_process(self.current_process);
        for record in &self.modules {
            modules.insert(record.to_module());
        }
        modules
    }

    /// Target serving the recorded registers and memory.
    #[must_use]
    pub fn target(&self) -> InMemoryTarget
    {
        let mut target = InMemoryTarget::new(self.registers);
        for segment in &self.memory {
            target.map(segment.address, segment.bytes.clone());
        }
        target
    }

    /// A context over [`Session::target`] and [`Session::module_list`].
    ///
    /// Profiler packets are not queued; see [`Session::replay`].
    ///
    /// ## Errors
    ///
    /// Returns errors from reading the target's registers.
    pub fn context(&self) -> KestrelResult<DebuggerContext>
    {
        Ok(DebuggerContext::new(Box::new(self.target()))?.with_modules(self.module_list()))
    }

    /// Push the recorded profiler packets into `sink`, stopping early if a
    /// shutdown is requested. Returns the number of packets pushed.
    pub fn replay(&self, sink: &ProfilerSink, shutdown: &ShutdownFlag) -> usize
    {
        let mut pushed = 0;
        for packet in &self.profiler {
            if shutdown.is_requested() {
                debug!(pushed, total = self.profiler.len(), "profiler replay interrupted");
                break;
            }
            sink.push(packet.processor, packet.tag, packet.data.clone());
            pushed += 1;
        }
        pushed
    }
}
