//! In-memory symbol table.
//!
//! Holds already-parsed symbols in plain vectors. Session files deserialize
//! straight into [`SymbolTableData`], which [`InMemorySymbolTable::from_data`]
//! turns into a searchable table.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::matching::MatchTier;
use super::{DataLocation, DataSymbol, Frame, FunctionSymbol, LocationOp, SearchResult, SourceLine, SymbolTable};
use crate::error::{KestrelError, KestrelResult};
use crate::registers::register_name;
use crate::target::read_exact;
use crate::typeinfo::{TypeRef, TypeSymbol};
use crate::types::{Address, Architecture};

/// One line-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord
{
    pub address: u64,
    pub line: u32,
}

/// A source file and its line table, sorted by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile
{
    pub path: String,
    #[serde(default)]
    pub lines: Vec<LineRecord>,
}

/// Serializable form of a symbol table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolTableData
{
    pub files: Vec<SourceFile>,
    pub functions: Vec<FunctionSymbol>,
    pub data: Vec<DataSymbol>,
    pub types: Vec<TypeSymbol>,
}

/// Searchable symbol table backed by vectors.
#[derive(Debug, Default)]
pub struct InMemorySymbolTable
{
    files: Vec<SourceFile>,
    functions: Vec<Arc<FunctionSymbol>>,
    data: Vec<Arc<DataSymbol>>,
    types: Vec<Arc<TypeSymbol>>,
    types_by_ref: HashMap<TypeRef, Arc<TypeSymbol>>,
}

impl InMemorySymbolTable
{
    /// Build a table from its serialized form.
    #[must_use]
    pub fn from_data(data: SymbolTableData) -> Self
    {
        let mut files = data.files;
        for file in &mut files {
            file.lines.sort_by_key(|record| record.address);
        }

        let types: Vec<Arc<TypeSymbol>> = data.types.into_iter().map(Arc::new).collect();
        let types_by_ref = types.iter().map(|ty| (ty.type_ref(), Arc::clone(ty))).collect();

        Self {
            files,
            functions: data.functions.into_iter().map(Arc::new).collect(),
            data: data.data.into_iter().map(Arc::new).collect(),
            types,
            types_by_ref,
        }
    }

    fn file_path(&self, file: u32) -> Option<&SourceFile>
    {
        usize::try_from(file).ok().and_then(|index| self.files.get(index))
    }

    fn find_type_in_tier(&self, name: &str, tier: MatchTier) -> Option<Arc<TypeSymbol>>
    {
        let mut fallback = None;
        for ty in self.types.iter().filter(|ty| !ty.name.is_empty() && tier.matches(name, &ty.name)) {
            if !ty.is_incomplete_structure() {
                return Some(Arc::clone(ty));
            }
            fallback.get_or_insert_with(|| Arc::clone(ty));
        }
        fallback
    }

    fn evaluate_program(&self, symbol: &DataSymbol, frame: &Frame<'_>) -> KestrelResult<u64>
    {
        let DataLocation::Complex { program } = &symbol.location else {
            return Err(KestrelError::invalid(format!("{} does not have a complex location", symbol.name)));
        };

        let pointer_size = frame.architecture().pointer_size();
        let mut stack: SmallVec<[u64; 8]> = SmallVec::new();
        let underflow = || KestrelError::invalid(format!("Location program of {} underflows", symbol.name));

        for op in program {
            match *op {
                LocationOp::Register(number) => stack.push(frame.registers.get_by_number(number)?),
                #[allow(clippy::cast_sign_loss)]
                LocationOp::Constant(value) => stack.push(value as u64),
                LocationOp::Plus => {
                    let right = stack.pop().ok_or_else(underflow)?;
                    let left = stack.pop().ok_or_else(underflow)?;
                    stack.push(left.wrapping_add(right));
                }
                LocationOp::Deref => {
                    let address = stack.pop().ok_or_else(underflow)?;
                    let bytes = read_exact(frame.target, Address::new(address), pointer_size)?;
                    let mut raw = [0u8; 8];
                    raw[..pointer_size].copy_from_slice(&bytes);
                    stack.push(u64::from_le_bytes(raw));
                }
            }
        }

        stack.pop().ok_or_else(underflow)
    }
}

impl SymbolTable for InMemorySymbolTable
{
    fn lookup_address(&self, address: Address) -> SearchResult
    {
        if let Some(function) = self.function_containing(address) {
            return SearchResult::Function(function);
        }

        self.data
            .iter()
            .find(|symbol| matches!(symbol.location, DataLocation::Absolute { address: at } if at == address.value()))
            .map_or(SearchResult::None, |symbol| SearchResult::Data(Arc::clone(symbol)))
    }

    fn lookup_source_line(&self, address: Address) -> Option<SourceLine>
    {
        let function = self.function_containing(address)?;
        let file = self.file_path(function.file)?;
        let record = file
            .lines
            .iter()
            .take_while(|record| record.address <= address.value())
            .last()?;

        Some(SourceLine {
            address: record.address,
            line: record.line,
            file: file.path.clone(),
        })
    }

    fn find_in_module(&self, name: &str) -> SearchResult
    {
        for tier in MatchTier::ALL {
            if let Some(function) = self.functions.iter().find(|function| tier.matches(name, &function.name)) {
                return SearchResult::Function(Arc::clone(function));
            }
            if let Some(symbol) = self.data.iter().find(|symbol| tier.matches(name, &symbol.name)) {
                return SearchResult::Data(Arc::clone(symbol));
            }
            if let Some(ty) = self.find_type_in_tier(name, tier) {
                return SearchResult::Type(ty);
            }
        }
        SearchResult::None
    }

    fn find_function(&self, name: &str) -> SearchResult
    {
        MatchTier::ALL
            .iter()
            .find_map(|tier| self.functions.iter().find(|function| tier.matches(name, &function.name)))
            .map_or(SearchResult::None, |function| SearchResult::Function(Arc::clone(function)))
    }

    fn find_type(&self, name: &str) -> Option<Arc<TypeSymbol>>
    {
        MatchTier::ALL.iter().find_map(|tier| self.find_type_in_tier(name, *tier))
    }

    fn type_by_ref(&self, reference: TypeRef) -> Option<Arc<TypeSymbol>>
    {
        self.types_by_ref.get(&reference).cloned()
    }

    fn function_containing(&self, address: Address) -> Option<Arc<FunctionSymbol>>
    {
        self.functions.iter().find(|function| function.contains(address)).cloned()
    }

    fn address_of_data(&self, symbol: &DataSymbol, frame: &Frame<'_>) -> KestrelResult<u64>
    {
        self.evaluate_program(symbol, frame)
    }

    fn read_data(&self, symbol: &DataSymbol, frame: &Frame<'_>, buffer: &mut [u8]) -> KestrelResult<()>
    {
        let address = self.evaluate_program(symbol, frame)?;
        let bytes = read_exact(frame.target, Address::new(address), buffer.len())?;
        buffer.copy_from_slice(&bytes);
        Ok(())
    }

    fn describe_complex(&self, symbol: &DataSymbol, architecture: Architecture) -> String
    {
        let DataLocation::Complex { program } = &symbol.location else {
            return String::new();
        };

        let mut stack: Vec<String> = Vec::new();
        for op in program {
            match *op {
                LocationOp::Register(number) => stack.push(
                    register_name(architecture, number).map_or_else(|| format!("@r{number}"), |name| format!("@{name}")),
                ),
                LocationOp::Constant(value) if value < 0 => stack.push(format!("-0x{:x}", value.unsigned_abs())),
                LocationOp::Constant(value) => stack.push(format!("0x{value:x}")),
                LocationOp::Plus => {
                    let right = stack.pop().unwrap_or_default();
                    let left = stack.pop().unwrap_or_default();
                    if let Some(negated) = right.strip_prefix('-') {
                        stack.push(format!("{left}-{negated}"));
                    } else {
                        stack.push(format!("{left}+{right}"));
                    }
                }
                LocationOp::Deref => {
                    let inner = stack.pop().unwrap_or_default();
                    stack.push(format!("[{inner}]"));
                }
            }
        }
        format!("[{}]", stack.pop().unwrap_or_default())
    }
}

/// Incremental construction of an [`InMemorySymbolTable`], mostly for tests
/// and synthetic sessions.
#[derive(Debug, Default)]
pub struct SymbolTableBuilder
{
    data: SymbolTableData,
}

impl SymbolTableBuilder
{
    /// Start a table whose file 0 is `primary_file`.
    #[must_use]
    pub fn new(primary_file: &str) -> Self
    {
        let mut data = SymbolTableData::default();
        data.files.push(SourceFile {
            path: primary_file.to_string(),
            lines: Vec::new(),
        });
        Self { data }
    }

    #[must_use]
    pub fn with_line(mut self, file: u32, address: u64, line: u32) -> Self
    {
        if let Some(source) = usize::try_from(file).ok().and_then(|index| self.data.files.get_mut(index)) {
            source.lines.push(LineRecord { address, line });
        }
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: &str) -> Self
    {
        self.data.files.push(SourceFile {
            path: path.to_string(),
            lines: Vec::new(),
        });
        self
    }

    #[must_use]
    pub fn with_function(mut self, function: FunctionSymbol) -> Self
    {
        self.data.functions.push(function);
        self
    }

    #[must_use]
    pub fn with_data(mut self, symbol: DataSymbol) -> Self
    {
        self.data.data.push(symbol);
        self
    }

    #[must_use]
    pub fn with_type(mut self, ty: TypeSymbol) -> Self
    {
        self.data.types.push(ty);
        self
    }

    #[must_use]
    pub fn build(self) -> InMemorySymbolTable
    {
        InMemorySymbolTable::from_data(self.data)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::typeinfo::TypeKind;

    fn function(name: &str, start: u64, end: u64) -> FunctionSymbol
    {
        FunctionSymbol {
            name: name.to_string(),
            start,
            end,
            file: 0,
            parameters: Vec::new(),
            locals: Vec::new(),
        }
    }

    fn structure(name: &str, id: u32, size: u64) -> TypeSymbol
    {
        TypeSymbol::new(
            name,
            0,
            id,
            TypeKind::Structure {
                size,
                members: Vec::new(),
            },
        )
    }

    #[test]
    fn test_lookup_address_prefers_function()
    {
        let table = SymbolTableBuilder::new("trap.c")
            .with_function(function("HandleTrap", 0x1000, 0x1080))
            .with_data(DataSymbol {
                name: "TrapCount".to_string(),
                location: DataLocation::Absolute { address: 0x2000 },
                min_valid: 0,
                file: 0,
                type_ref: TypeRef::new(0, 1),
            })
            .build();

        assert!(matches!(table.lookup_address(Address::new(0x1040)), SearchResult::Function(f) if f.name == "HandleTrap"));
        assert!(matches!(table.lookup_address(Address::new(0x2000)), SearchResult::Data(d) if d.name == "TrapCount"));
        assert!(table.lookup_address(Address::new(0x1080)).is_none());
    }

    #[test]
    fn test_source_line_picks_greatest_not_above()
    {
        let table = SymbolTableBuilder::new("trap.c")
            .with_function(function("HandleTrap", 0x1000, 0x1080))
            .with_line(0, 0x1000, 10)
            .with_line(0, 0x1010, 12)
            .with_line(0, 0x1030, 15)
            .build();

        let line = table.lookup_source_line(Address::new(0x102f)).unwrap();
        assert_eq!(line.line, 12);
        assert_eq!(line.file, "trap.c");
        assert!(table.lookup_source_line(Address::new(0x0fff)).is_none());
    }

    #[test]
    fn test_exact_case_wins_over_insensitive()
    {
        let table = SymbolTableBuilder::new("a.c")
            .with_function(function("foo", 0x10, 0x20))
            .with_function(function("Foo", 0x20, 0x30))
            .build();

        assert!(matches!(table.find_in_module("Foo"), SearchResult::Function(f) if f.start == 0x20));
        assert!(matches!(table.find_in_module("FOO"), SearchResult::Function(f) if f.start == 0x10));
    }

    #[test]
    fn test_complete_definition_beats_forward_declaration()
    {
        let table = SymbolTableBuilder::new("a.c")
            .with_type(structure("Node", 1, 0))
            .with_type(structure("Node", 2, 16))
            .build();

        assert_eq!(table.find_type("Node").unwrap().id, 2);
        assert!(!table.find_in_module("Node").is_weak());
    }

    #[test]
    fn test_glob_search()
    {
        let table = SymbolTableBuilder::new("a.c")
            .with_function(function("KeCreateThread", 0x10, 0x20))
            .build();
        assert!(matches!(table.find_function("KeCreate*"), SearchResult::Function(_)));
        assert!(table.find_function("Mm*").is_none());
    }

    #[test]
    fn test_describe_complex()
    {
        let table = SymbolTableBuilder::new("a.c").build();
        let symbol = DataSymbol {
            name: "x".to_string(),
            location: DataLocation::Complex {
                program: vec![LocationOp::Register(5), LocationOp::Constant(-8), LocationOp::Plus],
            },
            min_valid: 0,
            file: 0,
            type_ref: TypeRef::new(0, 1),
        };
        assert_eq!(table.describe_complex(&symbol, Architecture::X86), "[@ebp-0x8]");
    }
}
