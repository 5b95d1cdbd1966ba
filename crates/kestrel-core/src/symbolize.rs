//! # Address Symbolizer
//!
//! Turns a runtime address into the text shown in stack traces, profiler
//! trees, and the `ln` command.
//!
//! | Hit | Text |
//! |-----|------|
//! | no module | `0x0000abcd` |
//! | function | `module!function+0x12 [file.c:40]` |
//! | data | `module!datum` |
//! | module only | `module+0x3f00` |

use std::fmt;
use std::sync::Arc;

use crate::modules::ModuleList;
use crate::symbols::{FunctionSymbol, SearchResult, SourceLine};
use crate::types::Address;

/// Line numbers are clamped to eight digits.
pub const MAX_LINE_NUMBER: u32 = 99_999_999;

/// What an address resolved to.
#[derive(Debug, Clone)]
pub enum Symbolization
{
    /// No loaded module contains the address.
    Unknown(Address),
    Function
    {
        module: String,
        function: Arc<FunctionSymbol>,
        offset: u64,
        line: Option<SourceLine>,
    },
    Data
    {
        module: String,
        name: String,
    },
    /// Inside a module but not covered by any symbol.
    ModuleOffset
    {
        module: String,
        offset: u64,
        below_base: bool,
    },
}

impl Symbolization
{
    /// The containing function, if the address landed in one.
    #[must_use]
    pub fn function(&self) -> Option<&Arc<FunctionSymbol>>
    {
        match self {
            Self::Function { function, .. } => Some(function),
            _ => None,
        }
    }
}

impl fmt::Display for Symbolization
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Unknown(address) => write!(f, "{address}"),
            Self::Function {
                module,
                function,
                offset,
                line,
            } => {
                write!(f, "{module}!{}", function.name)?;
                if *offset != 0 {
                    write!(f, "+0x{offset:x}")?;
                }
                if let Some(line) = line {
                    write!(f, " [{}:{}]", line.file, line.line.min(MAX_LINE_NUMBER))?;
                }
                Ok(())
            }
            Self::Data { module, name } => write!(f, "{module}!{name}"),
            Self::ModuleOffset {
                module,
                offset,
                below_base,
            } => {
                let sign = if *below_base { '-' } else { '+' };
                write!(f, "{module}{sign}0x{offset:x}")
            }
        }
    }
}

/// Resolve `address` against the modules of the current process.
#[must_use]
pub fn symbolize_address(modules: &ModuleList, address: Address, print_line_numbers: bool) -> Symbolization
{
    let Some((module, debased)) = modules.find_by_address(address) else {
        return Symbolization::Unknown(address);
    };

    let result = module
        .symbols()
        .map(|table| table.lookup_address(debased))
        .unwrap_or_default();

    match result {
        SearchResult::Function(function) => {
            let line = if print_line_numbers {
                module
                    .symbols()
                    .and_then(|table| table.lookup_source_line(debased))
            } else {
                None
            };
            Symbolization::Function {
                module: module.name().to_string(),
                offset: debased.value().wrapping_sub(function.start),
                function,
                line,
            }
        }
        SearchResult::Data(data) => Symbolization::Data {
            module: module.name().to_string(),
            name: data.name.clone(),
        },
        SearchResult::Type(_) | SearchResult::None => {
            let runtime = module.rebase(debased);
            let base = module.actual_base();
            let below_base = runtime < base;
            let offset = if below_base {
                base.value() - runtime.value()
            } else {
                runtime.value() - base.value()
            };
            Symbolization::ModuleOffset {
                module: module.name().to_string(),
                offset,
                below_base,
            }
        }
    }
}

/// Describe `address` as `module!symbol+offset [file:line]`.
///
/// ## Example
///
/// ```rust
/// use kestrel_core::modules::ModuleList;
/// use kestrel_core::symbolize::symbolize;
/// use kestrel_core::types::Address;
///
/// let modules = ModuleList::new();
/// assert_eq!(symbolize(&modules, Address::new(0x1234), true), "0x00001234");
/// ```
#[must_use]
pub fn symbolize(modules: &ModuleList, address: Address, print_line_numbers: bool) -> String
{
    symbolize_address(modules, address, print_line_numbers).to_string()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::modules::{Module, ModuleId};
    use crate::symbols::{DataLocation, DataSymbol, SymbolTableBuilder};
    use crate::typeinfo::TypeRef;

    fn modules() -> ModuleList
    {
        let table = SymbolTableBuilder::new("kernel/init.c")
            .with_function(FunctionSymbol {
                name: "KeStartSystem".into(),
                start: 0x1000,
                end: 0x1100,
                file: 0,
                parameters: Vec::new(),
                locals: Vec::new(),
            })
            .with_line(0, 0x1000, 40)
            .with_line(0, 0x1010, 42)
            .with_data(DataSymbol {
                name: "KeSystemState".into(),
                location: DataLocation::Absolute { address: 0x3000 },
                min_valid: 0,
                file: 0,
                type_ref: TypeRef::new(0, 1),
            })
            .build();

        let mut modules = ModuleList::new();
        modules.insert(
            Module::new(ModuleId(1), "/boot/kernel.elf", Address::new(0x0), Address::new(0x8000_0000), 0x10000)
                .with_symbols(Arc::new(table)),
        );
        modules
    }

    #[test]
    fn test_function_with_offset_and_line()
    {
        let modules = modules();
        assert_eq!(symbolize(&modules, Address::new(0x8000_1014), true), "kernel!KeStartSystem+0x14 [kernel/init.c:42]");
        assert_eq!(symbolize(&modules, Address::new(0x8000_1014), false), "kernel!KeStartSystem+0x14");
        assert_eq!(symbolize(&modules, Address::new(0x8000_1000), false), "kernel!KeStartSystem");
    }

    #[test]
    fn test_data_and_module_offsets()
    {
        let modules = modules();
        assert_eq!(symbolize(&modules, Address::new(0x8000_3000), true), "kernel!KeSystemState");
        assert_eq!(symbolize(&modules, Address::new(0x8000_5000), true), "kernel+0x5000");
    }

    #[test]
    fn test_unknown_address()
    {
        let modules = modules();
        let result = symbolize_address(&modules, Address::new(0x10), true);
        assert!(result.function().is_none());
        assert_eq!(result.to_string(), "0x00000010");
    }
}
