//! # Symbols
//!
//! The interface every per-module symbol table implements, and the symbol
//! records it hands out.
//!
//! The engine does not parse debug information itself. A symbol-format driver
//! produces an object implementing [`SymbolTable`], and the module list stores
//! one per loaded image. All addresses exchanged with a table are in the
//! table's own (debased) address space; see [`crate::modules`].

pub mod matching;
pub mod search;
pub mod table;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use search::{find_symbol, SymbolMatch};
pub use table::{InMemorySymbolTable, SymbolTableBuilder};

use crate::error::KestrelResult;
use crate::registers::RegisterSnapshot;
use crate::target::Target;
use crate::typeinfo::{TypeRef, TypeSymbol};
use crate::types::{Address, Architecture};

/// One step of a complex location program.
///
/// Programs run on a small stack machine: the final value on the stack is the
/// address of the datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum LocationOp
{
    /// Push the value of a debug-info numbered register.
    Register(u32),
    /// Push a constant.
    Constant(i64),
    /// Pop two values and push their sum.
    Plus,
    /// Pop an address and push the pointer-sized value stored there.
    Deref,
}

/// Where a data symbol lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataLocation
{
    /// A fixed address in symbol space.
    Absolute
    {
        address: u64,
    },
    /// Held in a register of the current frame.
    Register
    {
        register: u32,
    },
    /// At `[register + offset]`.
    Indirect
    {
        register: u32,
        offset: i64,
    },
    /// Computed by the symbol table.
    Complex
    {
        program: Vec<LocationOp>,
    },
}

/// A global, static, local, or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSymbol
{
    pub name: String,
    pub location: DataLocation,
    /// Lowest debased PC at which the symbol holds a meaningful value.
    #[serde(default)]
    pub min_valid: u64,
    #[serde(default)]
    pub file: u32,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

/// A function and the variables scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSymbol
{
    pub name: String,
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub file: u32,
    #[serde(default)]
    pub parameters: Vec<DataSymbol>,
    #[serde(default)]
    pub locals: Vec<DataSymbol>,
}

impl FunctionSymbol
{
    /// True if a debased address falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, address: Address) -> bool
    {
        (self.start..self.end).contains(&address.value())
    }
}

/// A source-line record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine
{
    pub address: u64,
    pub line: u32,
    pub file: String,
}

/// Outcome of a name or address search within one table.
#[derive(Debug, Clone, Default)]
pub enum SearchResult
{
    Function(Arc<FunctionSymbol>),
    Data(Arc<DataSymbol>),
    Type(Arc<TypeSymbol>),
    #[default]
    None,
}

impl SearchResult
{
    #[must_use]
    pub fn is_none(&self) -> bool
    {
        matches!(self, Self::None)
    }

    /// A zero-sized structure: usable, but a definition elsewhere is preferred.
    #[must_use]
    pub fn is_weak(&self) -> bool
    {
        matches!(self, Self::Type(ty) if ty.is_incomplete_structure())
    }
}

/// Machine state a complex location program may consult.
pub struct Frame<'a>
{
    pub registers: &'a RegisterSnapshot,
    pub target: &'a dyn Target,
}

impl Frame<'_>
{
    #[must_use]
    pub fn architecture(&self) -> Architecture
    {
        self.registers.architecture()
    }
}

/// Capability set of a per-module symbol table.
pub trait SymbolTable: Send + Sync
{
    /// Function containing `address`, else the data symbol at exactly `address`.
    fn lookup_address(&self, address: Address) -> SearchResult;

    /// Line record with the greatest address not above `address`, within the
    /// file of the function containing it.
    fn lookup_source_line(&self, address: Address) -> Option<SourceLine>;

    /// Search functions, data, and types by name.
    ///
    /// Names match case-sensitively first, then case-insensitively, then as a
    /// glob. Complete structure definitions win over zero-sized ones.
    fn find_in_module(&self, name: &str) -> SearchResult;

    /// Search functions only.
    fn find_function(&self, name: &str) -> SearchResult;

    /// Search types only, with the same tiers as [`SymbolTable::find_in_module`].
    fn find_type(&self, name: &str) -> Option<Arc<TypeSymbol>>;

    /// Resolve a `(file, id)` type reference.
    fn type_by_ref(&self, reference: TypeRef) -> Option<Arc<TypeSymbol>>;

    /// Function whose range contains `address`.
    fn function_containing(&self, address: Address) -> Option<Arc<FunctionSymbol>>;

    /// Address of a data symbol with a complex location, in runtime space.
    ///
    /// ## Errors
    ///
    /// Fails when the location cannot be evaluated in `frame`.
    fn address_of_data(&self, symbol: &DataSymbol, frame: &Frame<'_>) -> KestrelResult<u64>;

    /// Read the value of a data symbol with a complex location into `buffer`.
    ///
    /// ## Errors
    ///
    /// Fails when the location cannot be evaluated or the read comes back short.
    fn read_data(&self, symbol: &DataSymbol, frame: &Frame<'_>, buffer: &mut [u8]) -> KestrelResult<()>;

    /// Location prefix printed before a complex-located value.
    fn describe_complex(&self, symbol: &DataSymbol, architecture: Architecture) -> String;
}
