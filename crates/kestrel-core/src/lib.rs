//! # kestrel-core
//!
//! Inspection and profiling engine for the Kestrel kernel debugger.
//!
//! Once a target has broken in, this crate answers questions about it:
//! - Register snapshots for x86, x64, and ARM
//! - Loaded modules and their address translation
//! - Symbol search across modules, with wildcards and `module!name` syntax
//! - Address expressions (`@eax+KeTicks*4`)
//! - Typed reads and C-style pretty printing of target data
//! - Aggregation of profiler notifications into call trees, memory pool
//!   tables, and scheduler statistics
//!
//! Everything is built over the [`target::Target`] trait. Live transports
//! implement it; [`session::Session`] loads a recorded snapshot instead.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_core::registers::{RegisterSnapshot, X86Registers};
//! use kestrel_core::target::InMemoryTarget;
//! use kestrel_core::DebuggerContext;
//!
//! let registers = RegisterSnapshot::X86(X86Registers {
//!     ebp: 0x8000,
//!     ..Default::default()
//! });
//! let context = DebuggerContext::new(Box::new(InMemoryTarget::new(registers)))?;
//! assert_eq!(context.evaluate("@ebp-0x10")?, 0x7ff0);
//! # Ok::<(), kestrel_core::KestrelError>(())
//! ```

pub mod commands;
pub mod console;
pub mod context;
pub mod data;
pub mod error;
pub mod eval;
pub mod events;
pub mod modules;
pub mod profiler;
pub mod registers;
pub mod session;
pub mod symbolize;
pub mod symbols;
pub mod target;
pub mod typeinfo;
pub mod types;

// Re-export commonly used types
pub use commands::{execute, CommandStatus};
pub use console::Console;
pub use context::{DebuggerContext, DisplayOptions};
pub use error::{KestrelError, KestrelResult};
pub use modules::{Module, ModuleId, ModuleList};
pub use registers::RegisterSnapshot;
pub use session::Session;
pub use symbols::SymbolTable;
pub use types::{Address, Architecture, ProcessId};
