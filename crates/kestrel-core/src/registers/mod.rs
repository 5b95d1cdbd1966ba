//! # Register File
//!
//! Per-architecture register snapshots with named and numbered access.
//!
//! A snapshot is captured when the target breaks in and stays immutable until
//! the next break, so readers never need a lock. Every architecture exposes its
//! registers through an alias table: a case-insensitive name maps to a backing
//! field plus a byte offset and byte size inside that field. `@al`, `@ax`,
//! `@eax`, and `@rax` therefore all read the same storage on x64.
//!
//! Symbol tables refer to registers by debug-info number instead of by name;
//! [`RegisterSnapshot::get_by_number`] implements those numberings.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_core::registers::{RegisterSnapshot, X86Registers};
//!
//! let mut snapshot = RegisterSnapshot::X86(X86Registers { eax: 0x1234_5678, ..Default::default() });
//! assert_eq!(snapshot.get("AH"), Some(0x56));
//!
//! snapshot.set("al", 0x1ff).unwrap();
//! assert_eq!(snapshot.get("eax"), Some(0x1234_56ff));
//! ```

pub mod arm;
pub mod x64;
pub mod x86;

use serde::{Deserialize, Serialize};

pub use arm::ArmRegisters;
pub use x64::X64Registers;
pub use x86::X86Registers;

use crate::error::{KestrelError, KestrelResult};
use crate::types::{Address, Architecture};

/// Location of a named register inside its architecture's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAlias
{
    field: usize,
    offset: u8,
    size: u8,
}

impl RegisterAlias
{
    const fn new(field: usize, offset: u8, size: u8) -> Self
    {
        Self { field, offset, size }
    }

    /// Width of the alias in bytes.
    #[must_use]
    pub fn size(self) -> usize
    {
        usize::from(self.size)
    }

    fn extract(self, field: u64) -> u64
    {
        (field >> (u32::from(self.offset) * 8)) & mask(self.size())
    }

    fn insert(self, field: u64, value: u64) -> u64
    {
        let shift = u32::from(self.offset) * 8;
        let mask = mask(self.size());
        (field & !(mask << shift)) | ((value & mask) << shift)
    }
}

/// All-ones mask covering `size` bytes.
#[must_use]
pub fn mask(size: usize) -> u64
{
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

/// Register state captured at a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "arch", content = "registers", rename_all = "lowercase")]
pub enum RegisterSnapshot
{
    /// 32-bit x86
    X86(X86Registers),
    /// x86-64
    X64(X64Registers),
    /// 32-bit ARM
    Arm(ArmRegisters),
}

impl RegisterSnapshot
{
    /// An all-zero snapshot for the given architecture.
    #[must_use]
    pub fn empty(architecture: Architecture) -> Self
    {
        match architecture {
            Architecture::X86 => Self::X86(X86Registers::default()),
            Architecture::X64 => Self::X64(X64Registers::default()),
            Architecture::Arm => Self::Arm(ArmRegisters::default()),
        }
    }

    /// Architecture this snapshot was captured from.
    #[must_use]
    pub fn architecture(&self) -> Architecture
    {
        match self {
            Self::X86(_) => Architecture::X86,
            Self::X64(_) => Architecture::X64,
            Self::Arm(_) => Architecture::Arm,
        }
    }

    /// Look up a register alias by case-insensitive name.
    #[must_use]
    pub fn alias(&self, name: &str) -> Option<RegisterAlias>
    {
        let name = name.to_ascii_lowercase();
        match self {
            Self::X86(_) => x86::alias(&name),
            Self::X64(_) => x64::alias(&name),
            Self::Arm(_) => arm::alias(&name),
        }
    }

    fn field(&self, index: usize) -> u64
    {
        match self {
            Self::X86(regs) => regs.field(index),
            Self::X64(regs) => regs.field(index),
            Self::Arm(regs) => regs.field(index),
        }
    }

    /// Read a register by name, zero-extended to 64 bits.
    ///
    /// Returns `None` if the architecture has no register with that name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64>
    {
        let alias = self.alias(name)?;
        Some(alias.extract(self.field(alias.field)))
    }

    /// Write a register by name, truncating the value to the alias width.
    ///
    /// Bytes of the backing field outside the alias are preserved, so writing
    /// `ah` leaves `al` untouched.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::NotFound`] for unknown register names.
    pub fn set(&mut self, name: &str, value: u64) -> KestrelResult<()>
    {
        let alias = self
            .alias(name)
            .ok_or_else(|| KestrelError::not_found(format!("Register @{name}")))?;

        let updated = alias.insert(self.field(alias.field), value);
        match self {
            Self::X86(regs) => regs.set_field(alias.field, updated),
            Self::X64(regs) => regs.set_field(alias.field, updated),
            Self::Arm(regs) => regs.set_field(alias.field, updated),
        }
        Ok(())
    }

    /// Read a register by its debug-info number.
    ///
    /// Floating-point and vector registers are not part of the snapshot; they
    /// read as zero until the host fetches them.
    ///
    /// ## Errors
    ///
    /// Returns [`KestrelError::NotFound`] for numbers outside the architecture's table.
    pub fn get_by_number(&self, number: u32) -> KestrelResult<u64>
    {
        match self {
            Self::X86(regs) => regs.by_number(number),
            Self::X64(regs) => regs.by_number(number),
            Self::Arm(regs) => regs.by_number(number),
        }
    }

    /// Program counter.
    #[must_use]
    pub fn pc(&self) -> Address
    {
        let pc = match self {
            Self::X86(regs) => u64::from(regs.eip),
            Self::X64(regs) => regs.rip,
            Self::Arm(regs) => u64::from(regs.r[15]),
        };
        Address::new(pc)
    }

    /// Stack pointer.
    #[must_use]
    pub fn sp(&self) -> Address
    {
        let sp = match self {
            Self::X86(regs) => u64::from(regs.esp),
            Self::X64(regs) => regs.rsp,
            Self::Arm(regs) => u64::from(regs.r[13]),
        };
        Address::new(sp)
    }

    /// True when an ARM core is executing Thumb code.
    #[must_use]
    pub fn is_thumb(&self) -> bool
    {
        matches!(self, Self::Arm(regs) if regs.is_thumb())
    }
}

/// Name of a debug-info register number, as printed in `@name` locations.
#[must_use]
pub fn register_name(architecture: Architecture, number: u32) -> Option<&'static str>
{
    match architecture {
        Architecture::X86 => x86::name_of(number),
        Architecture::X64 => x64::name_of(number),
        Architecture::Arm => arm::name_of(number),
    }
}
