//! # Debugger Context
//!
//! Everything the command thread knows about the stopped target.
//!
//! The context owns the current register snapshot, the module list, the
//! transport, display options, and the profiler state. Commands borrow it;
//! transport events are applied to it with [`DebuggerContext::handle_event`].
//!
//! The module list sits behind an `Arc`. Updates go through
//! [`Arc::make_mut`], so a snapshot taken with
//! [`DebuggerContext::modules_snapshot`] never changes underneath its holder.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::data::DEFAULT_DUMP_DEPTH;
use crate::error::{KestrelError, KestrelResult};
use crate::eval::{evaluate_str, Environment};
use crate::events::TargetEvent;
use crate::modules::ModuleList;
use crate::profiler::{ProfilerSink, ProfilerState, ShutdownFlag};
use crate::registers::RegisterSnapshot;
use crate::symbolize::symbolize;
use crate::symbols::{find_symbol, DataLocation, Frame, SearchResult};
use crate::target::Target;
use crate::types::Address;

/// Presentation settings that outlive a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions
{
    /// Append ` [file:line]` to symbolized addresses.
    pub print_line_numbers: bool,
    /// Nesting levels expanded by `dump` and the locals view.
    pub dump_depth: u32,
    /// Call-tree nodes below this percentage are hidden.
    pub stack_threshold: u32,
    /// Memory rows whose active size changed by less than this are hidden.
    pub memory_threshold: i32,
}

impl Default for DisplayOptions
{
    fn default() -> Self
    {
        Self {
            print_line_numbers: true,
            dump_depth: DEFAULT_DUMP_DEPTH,
            stack_threshold: 0,
            memory_threshold: 0,
        }
    }
}

/// State of a debugging session, owned by the command thread.
pub struct DebuggerContext
{
    registers: RegisterSnapshot,
    modules: Arc<ModuleList>,
    target: Box<dyn Target>,
    options: DisplayOptions,
    profiler: ProfilerState,
}

impl DebuggerContext
{
    /// Create a context for a stopped target, capturing its registers.
    ///
    /// ## Errors
    ///
    /// Returns transport errors from reading the registers.
    pub fn new(target: Box<dyn Target>) -> KestrelResult<Self>
    {
        let registers = target.registers()?;
        debug!(architecture = %registers.architecture(), pc = %registers.pc(), "debugger context created");
        Ok(Self {
            registers,
            modules: Arc::new(ModuleList::new()),
            target,
            options: DisplayOptions::default(),
            profiler: ProfilerState::new(ProfilerSink::new(), ShutdownFlag::new()),
        })
    }

    #[must_use]
    pub fn with_modules(mut self, modules: ModuleList) -> Self
    {
        self.modules = Arc::new(modules);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: DisplayOptions) -> Self
    {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_profiler(mut self, profiler: ProfilerState) -> Self
    {
        self.profiler = profiler;
        self
    }

    #[must_use]
    pub fn registers(&self) -> &RegisterSnapshot
    {
        &self.registers
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleList
    {
        &self.modules
    }

    /// A snapshot of the module list that later loads and unloads do not touch.
    #[must_use]
    pub fn modules_snapshot(&self) -> Arc<ModuleList>
    {
        Arc::clone(&self.modules)
    }

    pub fn modules_mut(&mut self) -> &mut ModuleList
    {
        Arc::make_mut(&mut self.modules)
    }

    #[must_use]
    pub fn target(&self) -> &dyn Target
    {
        self.target.as_ref()
    }

    pub fn target_mut(&mut self) -> &mut dyn Target
    {
        self.target.as_mut()
    }

    #[must_use]
    pub fn options(&self) -> &DisplayOptions
    {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut DisplayOptions
    {
        &mut self.options
    }

    #[must_use]
    pub fn profiler(&self) -> &ProfilerState
    {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut ProfilerState
    {
        &mut self.profiler
    }

    /// Registers and target, as symbol tables see them.
    #[must_use]
    pub fn frame(&self) -> Frame<'_>
    {
        Frame {
            registers: &self.registers,
            target: self.target.as_ref(),
        }
    }

    /// Size of a target pointer in bytes.
    #[must_use]
    pub fn pointer_size(&self) -> usize
    {
        self.registers.architecture().pointer_size()
    }

    /// Evaluate an address expression against the current frame.
    ///
    /// ## Errors
    ///
    /// See [`crate::eval::evaluate`] and the [`Environment`] impl below.
    pub fn evaluate(&self, expression: &str) -> KestrelResult<u64>
    {
        evaluate_str(self, expression)
    }

    /// Describe `address` as `module!symbol+offset`.
    #[must_use]
    pub fn symbolize(&self, address: Address) -> String
    {
        symbolize(&self.modules, address, self.options.print_line_numbers)
    }

    /// Apply a transport event.
    pub fn handle_event(&mut self, event: TargetEvent)
    {
        trace!(event = %event.describe(), "handling target event");
        match event {
            TargetEvent::Break { registers, address } => {
                debug!(%address, "target broke in");
                self.registers = registers;
            }
            TargetEvent::ModuleLoaded(module) => {
                debug!(module = module.name(), base = %module.actual_base(), "module loaded");
                self.modules_mut().insert(module);
            }
            TargetEvent::ModuleUnloaded(id) => {
                if self.modules_mut().remove(id).is_none() {
                    debug!(id = id.0, "unload for unknown module");
                }
            }
            TargetEvent::Profiler { processor, tag, data } => {
                self.profiler.sink().push(processor, tag, data);
            }
        }
    }

    /// Refresh the register snapshot from the target.
    ///
    /// ## Errors
    ///
    /// Returns transport errors from reading the registers.
    pub fn refresh_registers(&mut self) -> KestrelResult<()>
    {
        self.registers = self.target.registers()?;
        Ok(())
    }
}

impl Environment for DebuggerContext
{
    fn register(&self, name: &str) -> KestrelResult<u64>
    {
        self.registers
            .get(name)
            .ok_or_else(|| KestrelError::not_found(format!("Register @{name}")))
    }

    /// Functions evaluate to their runtime start address (with the Thumb bit
    /// set on ARM), data to its runtime address. Types have no value.
    fn symbol(&self, name: &str) -> KestrelResult<u64>
    {
        let found = find_symbol(&self.modules, name)?;
        let base_difference = found.module.base_difference();
        match found.result {
            SearchResult::Function(function) => {
                let mut address = function.start.wrapping_add(base_difference);
                if self.registers.is_thumb() {
                    address |= 1;
                }
                Ok(address)
            }
            SearchResult::Data(data) => match &data.location {
                DataLocation::Absolute { address } => Ok(address.wrapping_add(base_difference)),
                DataLocation::Complex { .. } => {
                    let table = found
                        .module
                        .symbols()
                        .ok_or_else(|| KestrelError::not_found(format!("Symbols for {}", found.module.name())))?;
                    table.address_of_data(&data, &self.frame())
                }
                DataLocation::Register { .. } | DataLocation::Indirect { .. } => Err(KestrelError::out_of_range(
                    format!("{name} does not have a fixed address"),
                )),
            },
            SearchResult::Type(_) => Err(KestrelError::invalid(format!("{name} is a type, not a value"))),
            SearchResult::None => Err(KestrelError::not_found(format!("Symbol {name}"))),
        }
    }
}
