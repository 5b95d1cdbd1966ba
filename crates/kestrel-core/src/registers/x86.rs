//! 32-bit x86 register record, alias table, and debug-info numbering.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::RegisterAlias;
use crate::error::{KestrelError, KestrelResult};

/// General-purpose and segment registers of a 32-bit x86 core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct X86Registers
{
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebp: u32,
    pub esp: u32,
    pub esi: u32,
    pub edi: u32,
    pub eip: u32,
    pub eflags: u32,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
    pub ss: u16,
}

// Field indices used by the alias table.
const EAX: usize = 0;
const EBX: usize = 1;
const ECX: usize = 2;
const EDX: usize = 3;
const EBP: usize = 4;
const ESP: usize = 5;
const ESI: usize = 6;
const EDI: usize = 7;
const EIP: usize = 8;
const EFLAGS: usize = 9;
const CS: usize = 10;
const DS: usize = 11;
const ES: usize = 12;
const FS: usize = 13;
const GS: usize = 14;
const SS: usize = 15;

static ALIASES: Lazy<HashMap<&'static str, RegisterAlias>> = Lazy::new(|| {
    let full = [
        ("eax", EAX),
        ("ebx", EBX),
        ("ecx", ECX),
        ("edx", EDX),
        ("ebp", EBP),
        ("esp", ESP),
        ("esi", ESI),
        ("edi", EDI),
        ("eip", EIP),
        ("eflags", EFLAGS),
    ];
    let words = [
        ("ax", EAX),
        ("bx", EBX),
        ("cx", ECX),
        ("dx", EDX),
        ("bp", EBP),
        ("sp", ESP),
        ("si", ESI),
        ("di", EDI),
        ("ip", EIP),
        ("flags", EFLAGS),
    ];
    let low = [("al", EAX), ("bl", EBX), ("cl", ECX), ("dl", EDX)];
    let high = [("ah", EAX), ("bh", EBX), ("ch", ECX), ("dh", EDX)];
    let segments = [("cs", CS), ("ds", DS), ("es", ES), ("fs", FS), ("gs", GS), ("ss", SS)];

    let mut table = HashMap::new();
    for (name, field) in full {
        table.insert(name, RegisterAlias::new(field, 0, 4));
    }
    for (name, field) in words {
        table.insert(name, RegisterAlias::new(field, 0, 2));
    }
    for (name, field) in low {
        table.insert(name, RegisterAlias::new(field, 0, 1));
    }
    for (name, field) in high {
        table.insert(name, RegisterAlias::new(field, 1, 1));
    }
    for (name, field) in segments {
        table.insert(name, RegisterAlias::new(field, 0, 2));
    }
    table
});

/// Debug-info register names, indexed by register number.
const NUMBERED: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "eip", "eflags", "cs", "ss", "ds", "es", "fs", "gs",
];

/// x87 stack registers and control words (st0-st7, ctrl, stat, tag, fpcs, fpip, fpds, fpdo).
const FPU_NUMBERS: std::ops::RangeInclusive<u32> = 16..=30;

pub(super) fn alias(name: &str) -> Option<RegisterAlias>
{
    ALIASES.get(name).copied()
}

pub(super) fn name_of(number: u32) -> Option<&'static str>
{
    usize::try_from(number).ok().and_then(|n| NUMBERED.get(n).copied())
}

impl X86Registers
{
    pub(super) fn field(&self, index: usize) -> u64
    {
        match index {
            EAX => self.eax.into(),
            EBX => self.ebx.into(),
            ECX => self.ecx.into(),
            EDX => self.edx.into(),
            EBP => self.ebp.into(),
            ESP => self.esp.into(),
            ESI => self.esi.into(),
            EDI => self.edi.into(),
            EIP => self.eip.into(),
            EFLAGS => self.eflags.into(),
            CS => self.cs.into(),
            DS => self.ds.into(),
            ES => self.es.into(),
            FS => self.fs.into(),
            GS => self.gs.into(),
            SS => self.ss.into(),
            _ => 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn set_field(&mut self, index: usize, value: u64)
    {
        let dword = value as u32;
        let word = value as u16;
        match index {
            EAX => self.eax = dword,
            EBX => self.ebx = dword,
            ECX => self.ecx = dword,
            EDX => self.edx = dword,
            EBP => self.ebp = dword,
            ESP => self.esp = dword,
            ESI => self.esi = dword,
            EDI => self.edi = dword,
            EIP => self.eip = dword,
            EFLAGS => self.eflags = dword,
            CS => self.cs = word,
            DS => self.ds = word,
            ES => self.es = word,
            FS => self.fs = word,
            GS => self.gs = word,
            SS => self.ss = word,
            _ => {}
        }
    }

    pub(super) fn by_number(&self, number: u32) -> KestrelResult<u64>
    {
        if FPU_NUMBERS.contains(&number) {
            tracing::debug!(number, "x87 register fetch deferred, reporting zero");
            return Ok(0);
        }

        let name = name_of(number).ok_or_else(|| KestrelError::not_found(format!("x86 register number {number}")))?;
        let alias = alias(name).ok_or_else(|| KestrelError::not_found(format!("Register {name}")))?;
        Ok(alias.extract(self.field(alias.field)))
    }
}
