//! Symbol search across every loaded module.

use std::sync::Arc;

use super::SearchResult;
use crate::error::{KestrelError, KestrelResult};
use crate::modules::{Module, ModuleList};

/// A search hit and the module whose table produced it.
#[derive(Debug, Clone)]
pub struct SymbolMatch
{
    pub module: Arc<Module>,
    pub result: SearchResult,
}

/// Split `module!name` into its parts. Unqualified names return `None` for the module.
#[must_use]
pub fn split_qualified(query: &str) -> (Option<&str>, &str)
{
    match query.split_once('!') {
        Some((module, name)) => (Some(module), name),
        None => (None, query),
    }
}

/// Resolve a possibly module-qualified name.
///
/// A `module!name` query searches only the named module. An unqualified
/// query searches the current process's modules in load order. A zero-sized
/// structure found along the way is held as a fallback while the search keeps
/// looking for a complete definition; it is returned only if nothing better
/// turns up.
///
/// ## Errors
///
/// Returns [`KestrelError::NotFound`] if the module or the symbol does not exist.
pub fn find_symbol(modules: &ModuleList, query: &str) -> KestrelResult<SymbolMatch>
{
    let (module_name, name) = split_qualified(query);
    if name.is_empty() {
        return Err(KestrelError::invalid(format!("Missing symbol name in '{query}'")));
    }

    if let Some(module_name) = module_name {
        let module = modules
            .find_by_name(module_name, module_name.chars().count())
            .ok_or_else(|| KestrelError::not_found(format!("Module {module_name}")))?;
        let result = module
            .symbols()
            .map(|table| table.find_in_module(name))
            .unwrap_or_default();

        if result.is_none() {
            return Err(KestrelError::not_found(format!("Symbol {query}")));
        }
        return Ok(SymbolMatch { module, result });
    }

    let mut silver_medal: Option<SymbolMatch> = None;
    for module in modules.iter_current_process() {
        let Some(table) = module.symbols() else {
            continue;
        };

        let result = table.find_in_module(name);
        if result.is_none() {
            continue;
        }

        if result.is_weak() {
            if silver_medal.is_none() {
                tracing::trace!(module = module.name(), name, "holding zero-sized definition as fallback");
                silver_medal = Some(SymbolMatch {
                    module: Arc::clone(module),
                    result,
                });
            }
            continue;
        }

        return Ok(SymbolMatch {
            module: Arc::clone(module),
            result,
        });
    }

    silver_medal.ok_or_else(|| KestrelError::not_found(format!("Symbol {query}")))
}
