//! 32-bit ARM register record and aliases.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::RegisterAlias;
use crate::error::{KestrelError, KestrelResult};

/// CPSR bit that indicates the core is executing Thumb instructions.
pub const PSR_FLAG_THUMB: u32 = 0x20;

const CPSR: usize = 16;

/// r0-r15 plus the current program status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmRegisters
{
    pub r: [u32; 16],
    pub cpsr: u32,
}

static ALIASES: Lazy<HashMap<String, RegisterAlias>> = Lazy::new(|| {
    let mut table: HashMap<String, RegisterAlias> =
        (0..16).map(|index| (format!("r{index}"), RegisterAlias::new(index, 0, 4))).collect();

    for (name, index) in [("sl", 10), ("fp", 11), ("ip", 12), ("sp", 13), ("lr", 14), ("pc", 15)] {
        table.insert(name.to_string(), RegisterAlias::new(index, 0, 4));
    }
    table.insert("cpsr".to_string(), RegisterAlias::new(CPSR, 0, 4));
    table
});

const NUMBERED: [&str; 16] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "sp", "lr", "pc",
];

/// VFP double registers d0-d31.
const VFP_NUMBERS: std::ops::RangeInclusive<u32> = 256..=287;

pub(super) fn alias(name: &str) -> Option<RegisterAlias>
{
    ALIASES.get(name).copied()
}

pub(super) fn name_of(number: u32) -> Option<&'static str>
{
    usize::try_from(number).ok().and_then(|n| NUMBERED.get(n).copied())
}

impl ArmRegisters
{
    pub(super) fn field(&self, index: usize) -> u64
    {
        if index == CPSR {
            return self.cpsr.into();
        }
        self.r.get(index).copied().map_or(0, u64::from)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn set_field(&mut self, index: usize, value: u64)
    {
        if index == CPSR {
            self.cpsr = value as u32;
        } else if let Some(slot) = self.r.get_mut(index) {
            *slot = value as u32;
        }
    }

    pub(super) fn by_number(&self, number: u32) -> KestrelResult<u64>
    {
        if VFP_NUMBERS.contains(&number) {
            tracing::debug!(number, "VFP register fetch deferred, reporting zero");
            return Ok(0);
        }

        let index = usize::try_from(number)
            .ok()
            .filter(|index| *index < 16)
            .ok_or_else(|| KestrelError::not_found(format!("ARM register number {number}")))?;
        Ok(self.field(index))
    }

    /// True when the core is in Thumb state.
    #[must_use]
    pub fn is_thumb(&self) -> bool
    {
        self.cpsr & PSR_FLAG_THUMB != 0
    }
}
