//! # Module List
//!
//! Loaded binaries and address/name lookup across them.
//!
//! Each module records where its image wanted to be loaded (the preferred base
//! from the file) and where the target actually put it. Symbol tables are
//! expressed in preferred-base terms, so every address crossing between the
//! target and a symbol table is shifted by the module's base difference:
//!
//! ```text
//! debased = runtime - (actual_base - preferred_base)
//! runtime = debased + (actual_base - preferred_base)
//! ```
//!
//! The list is ordered by insertion and owned behind an `Arc` by the debugger
//! context; updates build a new list so readers keep a consistent snapshot.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::symbols::SymbolTable;
use crate::types::{Address, ProcessId};

/// Identifier assigned to a module by the target's load notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub u64);

/// Modules owned by this process id are visible from every process.
pub const KERNEL_PROCESS: ProcessId = ProcessId(0);

/// A loaded binary image.
#[derive(Clone)]
pub struct Module
{
    id: ModuleId,
    name: String,
    preferred_base: Address,
    actual_base: Address,
    size: u64,
    process: ProcessId,
    timestamp: u64,
    symbols: Option<Arc<dyn SymbolTable>>,
}

impl Module
{
    /// Describe a module loaded from `path`.
    ///
    /// The friendly name is the file name without its extension, so
    /// `/system/kernel.elf` is addressed as `kernel!...` in expressions.
    #[must_use]
    pub fn new(id: ModuleId, path: &str, preferred_base: Address, actual_base: Address, size: u64) -> Self
    {
        let name = Path::new(path)
            .file_stem()
            .map_or_else(|| path.to_string(), |stem| stem.to_string_lossy().into_owned());

        Self {
            id,
            name,
            preferred_base,
            actual_base,
            size,
            process: KERNEL_PROCESS,
            timestamp: 0,
            symbols: None,
        }
    }

    /// Attach the parsed symbol table for this image.
    #[must_use]
    pub fn with_symbols(mut self, symbols: Arc<dyn SymbolTable>) -> Self
    {
        self.symbols = Some(symbols);
        self
    }

    /// Set the owning process.
    #[must_use]
    pub fn with_process(mut self, process: ProcessId) -> Self
    {
        self.process = process;
        self
    }

    /// Set the image timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self
    {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn id(&self) -> ModuleId
    {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    #[must_use]
    pub fn preferred_base(&self) -> Address
    {
        self.preferred_base
    }

    #[must_use]
    pub fn actual_base(&self) -> Address
    {
        self.actual_base
    }

    #[must_use]
    pub fn size(&self) -> u64
    {
        self.size
    }

    #[must_use]
    pub fn process(&self) -> ProcessId
    {
        self.process
    }

    #[must_use]
    pub fn timestamp(&self) -> u64
    {
        self.timestamp
    }

    /// Symbol table, if one was loaded for this image.
    #[must_use]
    pub fn symbols(&self) -> Option<&Arc<dyn SymbolTable>>
    {
        self.symbols.as_ref()
    }

    /// `actual_base - preferred_base`, wrapping.
    #[must_use]
    pub fn base_difference(&self) -> u64
    {
        self.actual_base - self.preferred_base
    }

    /// Translate a runtime address into symbol-table space.
    #[must_use]
    pub fn debase(&self, runtime: Address) -> Address
    {
        runtime - self.base_difference()
    }

    /// Translate a symbol-table address into a runtime address.
    #[must_use]
    pub fn rebase(&self, debased: Address) -> Address
    {
        debased + self.base_difference()
    }

    /// True if `runtime` lies inside `[actual_base, actual_base + size)`.
    #[must_use]
    pub fn contains(&self, runtime: Address) -> bool
    {
        runtime >= self.actual_base && (runtime - self.actual_base) < self.size
    }
}

impl fmt::Debug for Module
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("preferred_base", &self.preferred_base)
            .field("actual_base", &self.actual_base)
            .field("size", &self.size)
            .field("process", &self.process)
            .field("has_symbols", &self.symbols.is_some())
            .finish_non_exhaustive()
    }
}

/// Ordered collection of loaded modules plus the current process.
#[derive(Debug, Clone, Default)]
pub struct ModuleList
{
    modules: Vec<Arc<Module>>,
    current_process: ProcessId,
}

impl ModuleList
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Process whose modules unqualified lookups consider.
    #[must_use]
    pub fn current_process(&self) -> ProcessId
    {
        self.current_process
    }

    pub fn set_current_process(&mut self, process: ProcessId)
    {
        self.current_process = process;
    }

    /// Append a module. Iteration order is insertion order.
    pub fn insert(&mut self, module: Module)
    {
        tracing::debug!(module = module.name(), base = %module.actual_base(), "module loaded");
        self.modules.push(Arc::new(module));
    }

    /// Remove a module by id, returning it if it was present.
    pub fn remove(&mut self, id: ModuleId) -> Option<Arc<Module>>
    {
        let index = self.modules.iter().position(|module| module.id() == id)?;
        let removed = self.modules.remove(index);
        tracing::debug!(module = removed.name(), "module unloaded");
        Some(removed)
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }

    /// Every module in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Module>>
    {
        self.modules.iter()
    }

    /// Modules visible from the current process.
    pub fn iter_current_process(&self) -> impl Iterator<Item = &Arc<Module>>
    {
        self.modules.iter().filter(|module| self.is_visible(module))
    }

    fn is_visible(&self, module: &Module) -> bool
    {
        module.process() == self.current_process || module.process() == KERNEL_PROCESS
    }

    /// Find the module containing a runtime address.
    ///
    /// Returns the first visible module whose loaded range contains `address`,
    /// along with the address translated into that module's symbol space.
    #[must_use]
    pub fn find_by_address(&self, address: Address) -> Option<(Arc<Module>, Address)>
    {
        self.iter_current_process()
            .find(|module| module.contains(address))
            .map(|module| (Arc::clone(module), module.debase(address)))
    }

    /// Find a module by name, comparing at most `max_length` characters
    /// case-insensitively.
    ///
    /// An explicitly named module is found regardless of which process owns it.
    #[must_use]
    pub fn find_by_name(&self, name: &str, max_length: usize) -> Option<Arc<Module>>
    {
        let wanted: Vec<char> = name.chars().take(max_length).collect();
        self.modules
            .iter()
            .find(|module| {
                let candidate: Vec<char> = module.name().chars().take(max_length).collect();
                candidate.len() == wanted.len()
                    && candidate
                        .iter()
                        .zip(&wanted)
                        .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn kernel() -> Module
    {
        Module::new(
            ModuleId(1),
            "/system/kernel.elf",
            Address::new(0x8000_0000),
            Address::new(0x8010_0000),
            0x10_0000,
        )
    }

    #[test]
    fn test_friendly_name_strips_directory_and_extension()
    {
        assert_eq!(kernel().name(), "kernel");
    }

    #[test]
    fn test_base_difference_and_debase()
    {
        let module = kernel();
        assert_eq!(module.base_difference(), 0x10_0000);
        assert_eq!(module.debase(Address::new(0x8010_45c0)), Address::new(0x8000_45c0));
        assert_eq!(module.rebase(Address::new(0x8000_45c0)), Address::new(0x8010_45c0));
    }

    #[test]
    fn test_module_below_preferred_base()
    {
        let module = Module::new(ModuleId(2), "low.so", Address::new(0x2000), Address::new(0x1000), 0x1000);
        assert_eq!(module.debase(Address::new(0x1010)), Address::new(0x2010));
    }

    #[test]
    fn test_find_by_name_truncated_compare()
    {
        let mut list = ModuleList::new();
        list.insert(kernel());
        assert!(list.find_by_name("KERNEL", 6).is_some());
        assert!(list.find_by_name("kern", 4).is_some());
        assert!(list.find_by_name("kern", 6).is_none());
        assert!(list.find_by_name("kernelx", 7).is_none());
    }

    #[test]
    fn test_remove_module()
    {
        let mut list = ModuleList::new();
        list.insert(kernel());
        assert!(list.remove(ModuleId(1)).is_some());
        assert!(list.remove(ModuleId(1)).is_none());
        assert!(list.is_empty());
    }
}
