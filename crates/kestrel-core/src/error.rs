//! # Error Types
//!
//! General error handling for the inspection engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and the one-line messages the command surface prints after `Error: `.

use thiserror::Error;

/// Main error type for inspection and profiler operations
///
/// Every fallible operation in the engine returns one of these. The command
/// dispatcher catches them, prints a single diagnostic line, and keeps the
/// session alive.
///
/// ## Error Categories
///
/// 1. **Lookup errors**: NotFound
/// 2. **Input errors**: Invalid (expression syntax, bad paths, malformed payloads)
/// 3. **Scope errors**: OutOfRange (locals not yet live, array bounds)
/// 4. **Transport errors**: Transport, ShortRead
/// 5. **Resource errors**: Resource
/// 6. **I/O errors**: Io, Session
#[derive(Error, Debug)]
pub enum KestrelError
{
    /// A symbol, type, member, register, module, or local does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Syntax error in an expression, path, or command argument
    ///
    /// Also used for division by zero and malformed profiler payloads.
    #[error("{0}")]
    Invalid(String),

    /// A value exists but cannot be produced at this point
    ///
    /// Examples:
    /// - A local whose minimum valid execution address is past the PC
    /// - An array index outside the declared bounds
    /// - Register or frame-relative data used where an address is required
    #[error("{0}")]
    OutOfRange(String),

    /// The debuggee transport failed or is disconnected
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A memory read returned fewer bytes than requested
    #[error("Failed to read {expected} bytes at 0x{address:08x} (got {actual})")]
    ShortRead
    {
        /// Address that was requested
        address: u64,
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes actually returned
        actual: usize,
    },

    /// An internal limit or allocation was exhausted
    #[error("Resource exhausted: {0}")]
    Resource(String),

    /// I/O error (for session files, the console, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A session document could not be parsed
    #[error("Session error: {0}")]
    Session(#[from] serde_json::Error),
}

impl KestrelError
{
    /// Shorthand for [`KestrelError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self
    {
        Self::NotFound(what.into())
    }

    /// Shorthand for [`KestrelError::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self
    {
        Self::Invalid(message.into())
    }

    /// Shorthand for [`KestrelError::OutOfRange`].
    pub fn out_of_range(message: impl Into<String>) -> Self
    {
        Self::OutOfRange(message.into())
    }

    /// Returns true for failures that the locals view swallows.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool
    {
        matches!(self, Self::OutOfRange(_))
    }

    /// Returns true when the failure came from the debuggee transport.
    #[must_use]
    pub fn is_transport(&self) -> bool
    {
        matches!(self, Self::Transport(_) | Self::ShortRead { .. })
    }
}

/// Profiler records that fail to decode are malformed input.
impl From<scroll::Error> for KestrelError
{
    fn from(error: scroll::Error) -> Self
    {
        Self::Invalid(format!("Malformed profiler record: {error}"))
    }
}

/// Convenience type alias for `Result<T, KestrelError>`
///
/// ```rust
/// use kestrel_core::error::KestrelResult;
/// fn foo() -> KestrelResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type KestrelResult<T> = std::result::Result<T, KestrelError>;
