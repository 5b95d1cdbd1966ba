//! # Kestrel Utilities
//!
//! Shared utilities for the Kestrel debugger:
//!
//! - [`logging`]: `tracing` subscriber setup for the CLI and the REPL
//! - [`config`]: display settings read from the environment

pub mod config;
pub mod logging;

pub use config::{ConfigError, KestrelConfig};
pub use logging::{init_logging, init_logging_for_repl, init_logging_with_level, LogFormat, LogLevel, LoggingError};
// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
