//! # Typed Reader
//!
//! Locates a variable or a `(type, address)` pair, reads it from the target,
//! and walks member paths into it.
//!
//! A dump request looks like `NAME[.member|[index]]...`, optionally with an
//! address. The root name is resolved as a local of the current function
//! first, then as a global or type through [`find_symbol`]. Types need an
//! address, and with one the root may carry C-style decorators such as
//! `char[12]` or `Node*`.

pub mod locals;
pub mod render;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

pub use locals::{print_data_symbol, print_locals, read_data_symbol, resolve_local, LocalVariable};
pub use render::{render, DEFAULT_DUMP_DEPTH};

use crate::context::DebuggerContext;
use crate::error::{KestrelError, KestrelResult};
use crate::modules::Module;
use crate::symbols::{
    find_symbol, DataLocation, DataSymbol, Frame, FunctionSymbol, SearchResult, SourceLine, SymbolTable,
};
use crate::target::{read_exact, Target};
use crate::typeinfo::path::{member_lookup, parse_path, MemberValue, PathContext};
use crate::typeinfo::{size_of, type_name, TypeKind, TypeRef, TypeSymbol};
use crate::types::{Address, Architecture};

/// File number reserved for types built from decorators.
const SYNTHETIC_FILE: u32 = u32::MAX;

/// Read `size` bytes of target memory.
///
/// ## Errors
///
/// Returns [`KestrelError::ShortRead`] if the target returns fewer bytes.
pub fn read(target: &dyn Target, address: Address, size: u64) -> KestrelResult<Vec<u8>>
{
    let size = usize::try_from(size).map_err(|_| KestrelError::Resource(format!("{size} bytes do not fit in memory")))?;
    read_exact(target, address, size)
}

/// A value read from the target, with the table that describes its type.
#[derive(Clone)]
pub struct TypedValue
{
    pub module: Arc<Module>,
    pub table: Arc<dyn SymbolTable>,
    pub value: MemberValue,
}

impl TypedValue
{
    #[must_use]
    pub fn address(&self) -> Option<Address>
    {
        self.value.address
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8]
    {
        &self.value.bytes
    }

    #[must_use]
    pub fn type_name(&self) -> String
    {
        type_name(self.table.as_ref(), &self.value.ty)
    }

    /// Render the value with `depth` levels of nesting.
    ///
    /// ## Errors
    ///
    /// See [`render()`].
    pub fn render(&self, depth: u32) -> KestrelResult<String>
    {
        render(self.table.as_ref(), &self.value.bytes, &self.value.ty, 0, depth)
    }
}

impl fmt::Debug for TypedValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("TypedValue")
            .field("module", &self.module.name())
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// One `*` or `[N]` after a type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decorator
{
    Pointer,
    Array(u64),
}

/// Split `Node*[4].next` into `("Node", [Pointer, Array(4)], ".next")`.
///
/// Array counts are decimal, as in C declarations. A bracket whose contents
/// are not a plain count starts the member path instead.
fn split_type_expression(text: &str) -> (&str, Vec<Decorator>, &str)
{
    let end = text.find(['.', '[', '*']).unwrap_or(text.len());
    let name = &text[..end];
    let mut decorators = Vec::new();
    let mut rest = &text[end..];

    loop {
        if let Some(after) = rest.strip_prefix('*') {
            decorators.push(Decorator::Pointer);
            rest = after;
            continue;
        }

        let count = rest
            .strip_prefix('[')
            .and_then(|inner| inner.split_once(']'))
            .and_then(|(digits, after)| digits.parse::<u64>().ok().map(|count| (count, after)));
        match count {
            Some((count, after)) => {
                decorators.push(Decorator::Array(count));
                rest = after;
            }
            None => break,
        }
    }

    (name, decorators, rest)
}

/// A symbol table extended with types built from decorators.
///
/// Lookups other than [`SymbolTable::type_by_ref`] go straight to the
/// module's table.
struct TypeOverlay
{
    base: Arc<dyn SymbolTable>,
    synthetic: Vec<Arc<TypeSymbol>>,
}

impl TypeOverlay
{
    /// Wrap `root` in `decorators`, returning the table and the outermost type.
    fn build(base: Arc<dyn SymbolTable>, root: &TypeSymbol, decorators: &[Decorator], architecture: Architecture) -> KestrelResult<(Self, Arc<TypeSymbol>)>
    {
        let mut synthetic: Vec<Arc<TypeSymbol>> = Vec::with_capacity(decorators.len());
        let mut target = root.type_ref();
        for (id, decorator) in (0u32..).zip(decorators) {
            let (pointer_size, max) = match decorator {
                Decorator::Pointer => (u32::try_from(architecture.pointer_size()).unwrap_or(8), 0),
                Decorator::Array(0) => return Err(KestrelError::invalid("Arrays need at least one element")),
                Decorator::Array(count) => {
                    let max = i64::try_from(count - 1)
                        .map_err(|_| KestrelError::invalid(format!("Array of {count} elements is too large")))?;
                    (0, max)
                }
            };
            let ty = Arc::new(TypeSymbol::new(
                "",
                SYNTHETIC_FILE,
                id,
                TypeKind::Relation {
                    pointer_size,
                    min: 0,
                    max,
                    target,
                },
            ));
            target = ty.type_ref();
            synthetic.push(ty);
        }

        let outer = synthetic
            .last()
            .cloned()
            .ok_or_else(|| KestrelError::invalid("Type expression has no decorators"))?;
        Ok((Self { base, synthetic }, outer))
    }
}

impl SymbolTable for TypeOverlay
{
    fn lookup_address(&self, address: Address) -> SearchResult
    {
        self.base.lookup_address(address)
    }

    fn lookup_source_line(&self, address: Address) -> Option<SourceLine>
    {
        self.base.lookup_source_line(address)
    }

    fn find_in_module(&self, name: &str) -> SearchResult
    {
        self.base.find_in_module(name)
    }

    fn find_function(&self, name: &str) -> SearchResult
    {
        self.base.find_function(name)
    }

    fn find_type(&self, name: &str) -> Option<Arc<TypeSymbol>>
    {
        self.base.find_type(name)
    }

    fn type_by_ref(&self, reference: TypeRef) -> Option<Arc<TypeSymbol>>
    {
        if reference.file == SYNTHETIC_FILE {
            let index = usize::try_from(reference.id).ok()?;
            return self.synthetic.get(index).cloned();
        }
        self.base.type_by_ref(reference)
    }

    fn function_containing(&self, address: Address) -> Option<Arc<FunctionSymbol>>
    {
        self.base.function_containing(address)
    }

    fn address_of_data(&self, symbol: &DataSymbol, frame: &Frame<'_>) -> KestrelResult<u64>
    {
        self.base.address_of_data(symbol, frame)
    }

    fn read_data(&self, symbol: &DataSymbol, frame: &Frame<'_>, buffer: &mut [u8]) -> KestrelResult<()>
    {
        self.base.read_data(symbol, frame, buffer)
    }

    fn describe_complex(&self, symbol: &DataSymbol, architecture: Architecture) -> String
    {
        self.base.describe_complex(symbol, architecture)
    }
}

fn module_table(module: &Module) -> KestrelResult<Arc<dyn SymbolTable>>
{
    module
        .symbols()
        .cloned()
        .ok_or_else(|| KestrelError::not_found(format!("Symbols for module {}", module.name())))
}

/// Runtime address of a data symbol, when it lives in memory.
fn data_address(table: &dyn SymbolTable, frame: &Frame<'_>, module: &Module, symbol: &DataSymbol) -> Option<Address>
{
    match &symbol.location {
        DataLocation::Absolute { address } => Some(module.rebase(Address::new(*address))),
        #[allow(clippy::cast_sign_loss)]
        DataLocation::Indirect { register, offset } => frame
            .registers
            .get_by_number(*register)
            .ok()
            .map(|base| Address::new(base.wrapping_add(*offset as u64))),
        DataLocation::Complex { .. } => table.address_of_data(symbol, frame).ok().map(Address::new),
        DataLocation::Register { .. } => None,
    }
}

fn read_symbol_value(context: &DebuggerContext, module: Arc<Module>, symbol: &DataSymbol) -> KestrelResult<TypedValue>
{
    let table = module_table(&module)?;
    let frame = context.frame();
    let (_, bytes, ty) = read_data_symbol(table.as_ref(), &frame, &module, symbol)?;
    let size = size_of(table.as_ref(), &ty)?;
    let address = data_address(table.as_ref(), &frame, &module, symbol);
    Ok(TypedValue {
        value: MemberValue {
            bytes,
            ty,
            size,
            address,
        },
        table,
        module,
    })
}

fn read_typed(context: &DebuggerContext, module: Arc<Module>, table: Arc<dyn SymbolTable>, ty: Arc<TypeSymbol>, address: Address) -> KestrelResult<TypedValue>
{
    let size = size_of(table.as_ref(), &ty)?;
    let bytes = read(context.target(), address, size)?;
    Ok(TypedValue {
        module,
        table,
        value: MemberValue {
            bytes,
            ty,
            size,
            address: Some(address),
        },
    })
}

/// Resolve the root of a dump request before any member path is applied.
fn read_root<'a>(context: &DebuggerContext, text: &'a str, address: Option<Address>) -> KestrelResult<(TypedValue, &'a str)>
{
    let (name, decorators, rest) = split_type_expression(text);
    if name.is_empty() {
        return Err(KestrelError::invalid(format!("Missing type or variable name in '{text}'")));
    }

    if !decorators.is_empty() {
        let address = address.ok_or_else(|| KestrelError::invalid(format!("Type expression {text} needs an address")))?;
        let found = find_symbol(context.modules(), name)?;
        let SearchResult::Type(root) = found.result else {
            return Err(KestrelError::invalid(format!("{name} is not a type")));
        };
        let (overlay, ty) = TypeOverlay::build(
            module_table(&found.module)?,
            &root,
            &decorators,
            context.registers().architecture(),
        )?;
        debug!(name, decorators = decorators.len(), "built type expression");
        let value = read_typed(context, found.module, Arc::new(overlay), ty, address)?;
        return Ok((value, rest));
    }

    let split = text.find(['.', '[']).unwrap_or(text.len());
    let (root, rest) = text.split_at(split);

    if address.is_none() {
        if let Ok(local) = resolve_local(context.modules(), context.registers(), root) {
            debug!(name = root, function = %local.function.name, "dumping local");
            let value = read_symbol_value(context, Arc::clone(&local.module), &local.symbol)?;
            return Ok((value, rest));
        }
    }

    let found = find_symbol(context.modules(), root)?;
    let value = match found.result {
        SearchResult::Type(ty) => {
            let address = address.ok_or_else(|| KestrelError::invalid(format!("Type {root} needs an address")))?;
            let table = module_table(&found.module)?;
            read_typed(context, found.module, table, ty, address)?
        }
        SearchResult::Data(symbol) => {
            if address.is_some() {
                return Err(KestrelError::invalid(format!("{root} is a variable and has its own address")));
            }
            read_symbol_value(context, found.module, &symbol)?
        }
        SearchResult::Function(_) => return Err(KestrelError::invalid(format!("{root} is a function"))),
        SearchResult::None => return Err(KestrelError::not_found(format!("Type or variable {root}"))),
    };
    Ok((value, rest))
}

/// Locate and read `text`, then walk its member path.
///
/// ## Errors
///
/// - [`KestrelError::NotFound`] for unknown roots or members
/// - [`KestrelError::Invalid`] for a type without an address, or a variable
///   given one
/// - [`KestrelError::OutOfRange`] for indices outside an array
/// - Transport errors from reads
pub fn read_by_name(context: &DebuggerContext, text: &str, address: Option<Address>) -> KestrelResult<TypedValue>
{
    let (root, rest) = read_root(context, text, address)?;
    let path = parse_path(rest)?;
    if path.is_empty() {
        return Ok(root);
    }

    let evaluate = |expression: &str| context.evaluate(expression);
    let path_context = PathContext {
        table: root.table.as_ref(),
        target: context.target(),
        evaluate: &evaluate,
    };
    let value = member_lookup(&path_context, root.value, &path)?;
    Ok(TypedValue {
        module: root.module,
        table: root.table,
        value,
    })
}

/// Read and render `text` at the configured dump depth.
///
/// ## Errors
///
/// See [`read_by_name`] and [`render()`].
pub fn dump(context: &DebuggerContext, text: &str, address: Option<Address>) -> KestrelResult<String>
{
    read_by_name(context, text, address)?.render(context.options().dump_depth)
}

/// Parameters and live locals of the current function.
///
/// ## Errors
///
/// See [`print_locals`].
pub fn locals(context: &DebuggerContext) -> KestrelResult<String>
{
    print_locals(context.modules(), &context.frame(), context.options().dump_depth)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_split_type_expression()
    {
        assert_eq!(split_type_expression("char[12]"), ("char", vec![Decorator::Array(12)], ""));
        assert_eq!(
            split_type_expression("Node*[4].next"),
            ("Node", vec![Decorator::Pointer, Decorator::Array(4)], ".next")
        );
        assert_eq!(split_type_expression("list[@eax]"), ("list", Vec::new(), "[@eax]"));
        assert_eq!(split_type_expression("head.next"), ("head", Vec::new(), ".next"));
    }
}
