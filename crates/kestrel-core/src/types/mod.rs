//! # Types
//!
//! Small value types shared by every component of the engine.

pub mod address;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use address::Address;

/// Target machine architecture
///
/// The architecture decides the register alias table, the debug-info register
/// numbering, and the pointer size used by stack samples and pointer types.
///
/// ## Example
///
/// ```rust
/// use kestrel_core::types::Architecture;
///
/// assert_eq!(Architecture::X86.pointer_size(), 4);
/// assert_eq!(Architecture::X64.pointer_size(), 8);
/// assert_eq!("arm".parse::<Architecture>().unwrap(), Architecture::Arm);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture
{
    /// 32-bit x86
    X86,
    /// 64-bit x86
    X64,
    /// 32-bit ARM (ARMv7, including Thumb state)
    Arm,
}

impl Architecture
{
    /// Size in bytes of a target pointer.
    #[must_use]
    pub const fn pointer_size(self) -> usize
    {
        match self {
            Architecture::X86 | Architecture::Arm => 4,
            Architecture::X64 => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Architecture::X86 => "x86",
            Architecture::X64 => "x64",
            Architecture::Arm => "arm",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Architecture
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "x86" | "i686" | "ia32" => Ok(Architecture::X86),
            "x64" | "x86_64" | "amd64" => Ok(Architecture::X64),
            "arm" | "armv7" => Ok(Architecture::Arm),
            _ => Err(format!("Unknown architecture: {s}. Use 'x86', 'x64', or 'arm'")),
        }
    }
}

/// Kernel process identifier carried by modules and profiler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}
