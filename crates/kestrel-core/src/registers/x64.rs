//! 64-bit x86 register record, alias table, and DWARF numbering.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::RegisterAlias;
use crate::error::{KestrelError, KestrelResult};

/// General-purpose and segment registers of an x86-64 core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct X64Registers
{
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rflags: u64,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
    pub ss: u16,
}

// Field indices. 0-15 follow the legacy encoding order used by the alias table.
const RAX: usize = 0;
const RBX: usize = 1;
const RCX: usize = 2;
const RDX: usize = 3;
const RBP: usize = 4;
const RSP: usize = 5;
const RSI: usize = 6;
const RDI: usize = 7;
const R8: usize = 8;
const RIP: usize = 16;
const RFLAGS: usize = 17;
const CS: usize = 18;
const DS: usize = 19;
const ES: usize = 20;
const FS: usize = 21;
const GS: usize = 22;
const SS: usize = 23;

const EXTENDED: [&str; 8] = ["r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15"];

static ALIASES: Lazy<HashMap<String, RegisterAlias>> = Lazy::new(|| {
    let legacy = [
        ("rax", "eax", "ax", Some("al"), RAX),
        ("rbx", "ebx", "bx", Some("bl"), RBX),
        ("rcx", "ecx", "cx", Some("cl"), RCX),
        ("rdx", "edx", "dx", Some("dl"), RDX),
        ("rbp", "ebp", "bp", Some("bpl"), RBP),
        ("rsp", "esp", "sp", Some("spl"), RSP),
        ("rsi", "esi", "si", Some("sil"), RSI),
        ("rdi", "edi", "di", Some("dil"), RDI),
        ("rip", "eip", "ip", None, RIP),
        ("rflags", "eflags", "flags", None, RFLAGS),
    ];

    let mut table = HashMap::new();
    for (quad, dword, word, byte, field) in legacy {
        table.insert(quad.to_string(), RegisterAlias::new(field, 0, 8));
        table.insert(dword.to_string(), RegisterAlias::new(field, 0, 4));
        table.insert(word.to_string(), RegisterAlias::new(field, 0, 2));
        if let Some(byte) = byte {
            table.insert(byte.to_string(), RegisterAlias::new(field, 0, 1));
        }
    }

    for (name, field) in [("ah", RAX), ("bh", RBX), ("ch", RCX), ("dh", RDX)] {
        table.insert(name.to_string(), RegisterAlias::new(field, 1, 1));
    }

    for (index, name) in EXTENDED.iter().enumerate() {
        let field = R8 + index;
        table.insert((*name).to_string(), RegisterAlias::new(field, 0, 8));
        table.insert(format!("{name}d"), RegisterAlias::new(field, 0, 4));
        table.insert(format!("{name}w"), RegisterAlias::new(field, 0, 2));
        table.insert(format!("{name}b"), RegisterAlias::new(field, 0, 1));
    }

    for (name, field) in [("cs", CS), ("ds", DS), ("es", ES), ("fs", FS), ("gs", GS), ("ss", SS)] {
        table.insert(name.to_string(), RegisterAlias::new(field, 0, 2));
    }
    table
});

/// DWARF register names for numbers 0-16.
const NUMBERED: [&str; 17] = [
    "rax", "rdx", "rcx", "rbx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
    "rip",
];

/// xmm0-15, st0-7, and mm0-7.
const VECTOR_NUMBERS: std::ops::RangeInclusive<u32> = 17..=48;

pub(super) fn alias(name: &str) -> Option<RegisterAlias>
{
    ALIASES.get(name).copied()
}

pub(super) fn name_of(number: u32) -> Option<&'static str>
{
    match number {
        0..=16 => usize::try_from(number).ok().and_then(|n| NUMBERED.get(n).copied()),
        49 => Some("rflags"),
        50 => Some("es"),
        51 => Some("cs"),
        52 => Some("ss"),
        53 => Some("ds"),
        54 => Some("fs"),
        55 => Some("gs"),
        58 => Some("fs.base"),
        59 => Some("gs.base"),
        _ => None,
    }
}

impl X64Registers
{
    pub(super) fn field(&self, index: usize) -> u64
    {
        match index {
            RAX => self.rax,
            RBX => self.rbx,
            RCX => self.rcx,
            RDX => self.rdx,
            RBP => self.rbp,
            RSP => self.rsp,
            RSI => self.rsi,
            RDI => self.rdi,
            8 => self.r8,
            9 => self.r9,
            10 => self.r10,
            11 => self.r11,
            12 => self.r12,
            13 => self.r13,
            14 => self.r14,
            15 => self.r15,
            RIP => self.rip,
            RFLAGS => self.rflags,
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
        let word = value as u16;
        match index {
            RAX => self.rax = value,
            RBX => self.rbx = value,
            RCX => self.rcx = value,
            RDX => self.rdx = value,
            RBP => self.rbp = value,
            RSP => self.rsp = value,
            RSI => self.rsi = value,
            RDI => self.rdi = value,
            8 => self.r8 = value,
            9 => self.r9 = value,
            10 => self.r10 = value,
            11 => self.r11 = value,
            12 => self.r12 = value,
            13 => self.r13 = value,
            14 => self.r14 = value,
            15 => self.r15 = value,
            RIP => self.rip = value,
            RFLAGS => self.rflags = value,
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
        if VECTOR_NUMBERS.contains(&number) || number == 58 || number == 59 {
            tracing::debug!(number, "x64 vector or segment base fetch deferred, reporting zero");
            return Ok(0);
        }

        let name = name_of(number).ok_or_else(|| KestrelError::not_found(format!("x64 register number {number}")))?;
        let alias = alias(name).ok_or_else(|| KestrelError::not_found(format!("Register {name}")))?;
        Ok(alias.extract(self.field(alias.field)))
    }
}
