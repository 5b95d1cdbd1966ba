//! # Type System
//!
//! Source-level type descriptions, size computation, and typedef resolution.
//!
//! Types never point at each other directly. Every cross-reference (pointer
//! target, array element, member type, typedef alias) is a [`TypeRef`] that is
//! looked up in the owning symbol table. This keeps type tables serializable and
//! makes self-referential types such as linked-list nodes trivial.
//!
//! ## Relations
//!
//! Pointers, arrays, and plain aliases share one variant, [`TypeKind::Relation`]:
//!
//! | pointer_size | min != max | meaning                      |
//! |--------------|------------|------------------------------|
//! | > 0          | no         | pointer to `target`          |
//! | 0            | yes        | array of `target`            |
//! | 0            | no         | another name for `target`    |
//! | > 0          | yes        | invalid                      |

pub mod bits;
pub mod path;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KestrelError, KestrelResult};
use crate::symbols::SymbolTable;

/// Maximum typedef/relation hops followed before a chain is declared cyclic.
pub const MAX_TYPE_DEPTH: usize = 50;

/// `(owning file, type number)` key of a type inside a symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef
{
    pub file: u32,
    pub id: u32,
}

impl TypeRef
{
    #[must_use]
    pub const fn new(file: u32, id: u32) -> Self
    {
        Self { file, id }
    }
}

impl fmt::Display for TypeRef
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "({},{})", self.file, self.id)
    }
}

/// One named constant of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember
{
    pub name: String,
    pub value: i64,
}

/// One member of a structure or union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructMember
{
    pub name: String,
    pub bit_offset: u64,
    /// Width in bits, or 0 for "the whole member type".
    pub bit_size: u64,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

impl StructMember
{
    /// True when the member does not start on a byte boundary.
    #[must_use]
    pub fn is_bitfield(&self) -> bool
    {
        self.bit_offset % 8 != 0
    }
}

/// Variant-specific data of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind
{
    Numeric
    {
        bits: u32,
        #[serde(default)]
        signed: bool,
        #[serde(default)]
        float: bool,
    },
    Enumeration
    {
        size: u64,
        members: Vec<EnumMember>,
    },
    Relation
    {
        #[serde(default)]
        pointer_size: u32,
        #[serde(default)]
        min: i64,
        #[serde(default)]
        max: i64,
        target: TypeRef,
    },
    Structure
    {
        size: u64,
        members: Vec<StructMember>,
    },
    FunctionPointer
    {
        size: u64,
    },
    Typedef
    {
        target: TypeRef,
    },
}

/// A named type owned by a symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSymbol
{
    /// Empty for anonymous types.
    #[serde(default)]
    pub name: String,
    pub file: u32,
    pub id: u32,
    #[serde(flatten)]
    pub kind: TypeKind,
}

impl TypeSymbol
{
    #[must_use]
    pub fn new(name: impl Into<String>, file: u32, id: u32, kind: TypeKind) -> Self
    {
        Self {
            name: name.into(),
            file,
            id,
            kind,
        }
    }

    /// Key under which this type is stored.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef
    {
        TypeRef::new(self.file, self.id)
    }

    /// A pointer relation.
    #[must_use]
    pub fn is_pointer(&self) -> bool
    {
        matches!(self.kind, TypeKind::Relation { pointer_size, .. } if pointer_size > 0)
    }

    /// An array relation.
    #[must_use]
    pub fn is_array(&self) -> bool
    {
        matches!(self.kind, TypeKind::Relation { min, max, .. } if min != max)
    }

    /// A structure whose stored size is zero (typically a forward declaration).
    #[must_use]
    pub fn is_incomplete_structure(&self) -> bool
    {
        matches!(self.kind, TypeKind::Structure { size: 0, .. })
    }

    /// Number of elements of an array relation.
    #[must_use]
    pub fn element_count(&self) -> u64
    {
        match self.kind {
            TypeKind::Relation { min, max, .. } if min != max => max.wrapping_sub(min).wrapping_add(1).unsigned_abs(),
            _ => 0,
        }
    }
}

fn resolve(table: &dyn SymbolTable, reference: TypeRef) -> KestrelResult<std::sync::Arc<TypeSymbol>>
{
    table
        .type_by_ref(reference)
        .ok_or_else(|| KestrelError::not_found(format!("Type {reference}")))
}

/// Size in bytes of a value of this type.
///
/// ## Errors
///
/// - [`KestrelError::NotFound`] if a referenced type is missing from the table
/// - [`KestrelError::Invalid`] for a relation that is both pointer and array,
///   or for a reference chain deeper than [`MAX_TYPE_DEPTH`]
pub fn size_of(table: &dyn SymbolTable, ty: &TypeSymbol) -> KestrelResult<u64>
{
    size_of_depth(table, ty, 0)
}

fn size_of_depth(table: &dyn SymbolTable, ty: &TypeSymbol, depth: usize) -> KestrelResult<u64>
{
    if depth > MAX_TYPE_DEPTH {
        return Err(KestrelError::invalid(format!(
            "Type {} nests deeper than {MAX_TYPE_DEPTH} levels",
            ty.type_ref()
        )));
    }

    match &ty.kind {
        TypeKind::Numeric { bits, .. } => Ok(u64::from(bits.div_ceil(8))),
        TypeKind::Enumeration { size, .. }
        | TypeKind::Structure { size, .. }
        | TypeKind::FunctionPointer { size } => Ok(*size),
        TypeKind::Typedef { target } => size_of_depth(table, &*resolve(table, *target)?, depth + 1),
        TypeKind::Relation {
            pointer_size,
            min,
            max,
            target,
        } => {
            if *pointer_size > 0 && min != max {
                return Err(KestrelError::invalid(format!(
                    "Type {} is both a pointer and an array",
                    ty.type_ref()
                )));
            }
            if *pointer_size > 0 {
                return Ok(u64::from(*pointer_size));
            }
            let element = size_of_depth(table, &*resolve(table, *target)?, depth + 1)?;
            if min != max {
                Ok(ty.element_count().wrapping_mul(element))
            } else {
                Ok(element)
            }
        }
    }
}

/// Follow typedefs and plain relations to the underlying type.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] when the chain exceeds [`MAX_TYPE_DEPTH`].
pub fn skip_typedefs(table: &dyn SymbolTable, ty: &std::sync::Arc<TypeSymbol>) -> KestrelResult<std::sync::Arc<TypeSymbol>>
{
    let mut current = std::sync::Arc::clone(ty);
    for _ in 0..=MAX_TYPE_DEPTH {
        let next = match current.kind {
            TypeKind::Typedef { target } => target,
            TypeKind::Relation {
                pointer_size: 0,
                min,
                max,
                target,
            } if min == max => target,
            _ => return Ok(current),
        };
        current = resolve(table, next)?;
    }

    Err(KestrelError::invalid(format!(
        "Typedef chain starting at {} is too deep",
        ty.type_ref()
    )))
}

/// Element type of a pointer or array relation.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] for types that are not relations.
pub fn element_type(table: &dyn SymbolTable, ty: &TypeSymbol) -> KestrelResult<std::sync::Arc<TypeSymbol>>
{
    match ty.kind {
        TypeKind::Relation { target, .. } => resolve(table, target),
        _ => Err(KestrelError::invalid(format!("{} is not a pointer or array", type_name(table, ty)))),
    }
}

/// Human-readable name of a type, e.g. `struct Node`, `char[12]`, `Node*`.
#[must_use]
pub fn type_name(table: &dyn SymbolTable, ty: &TypeSymbol) -> String
{
    type_name_depth(table, ty, 0)
}

fn type_name_depth(table: &dyn SymbolTable, ty: &TypeSymbol, depth: usize) -> String
{
    let anonymous = ty.name.is_empty();
    match &ty.kind {
        TypeKind::Structure { .. } if anonymous => "struct (anon)".to_string(),
        TypeKind::Structure { .. } => format!("struct {}", ty.name),
        TypeKind::Enumeration { .. } if anonymous => "enum (anon)".to_string(),
        TypeKind::Enumeration { .. } => format!("enum {}", ty.name),
        TypeKind::FunctionPointer { .. } if anonymous => "(Function pointer)".to_string(),
        TypeKind::Relation {
            pointer_size,
            min,
            max,
            target,
        } if anonymous => {
            let base = if depth >= MAX_TYPE_DEPTH {
                "...".to_string()
            } else {
                table
                    .type_by_ref(*target)
                    .map_or_else(|| format!("type{target}"), |target| type_name_depth(table, &target, depth + 1))
            };
            if *pointer_size > 0 {
                format!("{base}*")
            } else if min != max && *min == 0 {
                format!("{base}[{}]", max + 1)
            } else if min != max {
                format!("{base}[{min}:{}]", max + 1)
            } else {
                base
            }
        }
        TypeKind::Typedef { target } if anonymous && depth < MAX_TYPE_DEPTH => table
            .type_by_ref(*target)
            .map_or_else(|| format!("type{target}"), |target| type_name_depth(table, &target, depth + 1)),
        _ if anonymous => format!("type{}", ty.type_ref()),
        _ => ty.name.clone(),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::symbols::SymbolTableBuilder;

    fn numeric(name: &str, id: u32, bits: u32, signed: bool) -> TypeSymbol
    {
        TypeSymbol::new(
            name,
            0,
            id,
            TypeKind::Numeric {
                bits,
                signed,
                float: false,
            },
        )
    }

    #[test]
    fn test_size_of_array_and_pointer()
    {
        let table = SymbolTableBuilder::new("test.c")
            .with_type(numeric("int", 1, 32, true))
            .with_type(TypeSymbol::new(
                "",
                0,
                2,
                TypeKind::Relation {
                    pointer_size: 0,
                    min: 0,
                    max: 9,
                    target: TypeRef::new(0, 1),
                },
            ))
            .with_type(TypeSymbol::new(
                "",
                0,
                3,
                TypeKind::Relation {
                    pointer_size: 8,
                    min: 0,
                    max: 0,
                    target: TypeRef::new(0, 2),
                },
            ))
            .build();

        let array = table.type_by_ref(TypeRef::new(0, 2)).unwrap();
        let pointer = table.type_by_ref(TypeRef::new(0, 3)).unwrap();
        assert_eq!(size_of(&table, &array).unwrap(), 40);
        assert_eq!(size_of(&table, &pointer).unwrap(), 8);
        assert_eq!(type_name(&table, &array), "int[10]");
        assert_eq!(type_name(&table, &pointer), "int[10]*");
    }

    #[test]
    fn test_numeric_size_rounds_up()
    {
        let table = SymbolTableBuilder::new("test.c").build();
        assert_eq!(size_of(&table, &numeric("bits", 1, 12, false)).unwrap(), 2);
    }

    #[test]
    fn test_typedef_cycle_is_invalid()
    {
        let table = SymbolTableBuilder::new("test.c")
            .with_type(TypeSymbol::new("a", 0, 1, TypeKind::Typedef { target: TypeRef::new(0, 2) }))
            .with_type(TypeSymbol::new("b", 0, 2, TypeKind::Typedef { target: TypeRef::new(0, 1) }))
            .build();

        let a = table.type_by_ref(TypeRef::new(0, 1)).unwrap();
        assert!(matches!(size_of(&table, &a), Err(KestrelError::Invalid(_))));
        assert!(matches!(skip_typedefs(&table, &a), Err(KestrelError::Invalid(_))));
    }

    #[test]
    fn test_pointer_and_array_at_once_is_invalid()
    {
        let table = SymbolTableBuilder::new("test.c").with_type(numeric("int", 1, 32, true)).build();
        let bad = TypeSymbol::new(
            "",
            0,
            9,
            TypeKind::Relation {
                pointer_size: 4,
                min: 0,
                max: 3,
                target: TypeRef::new(0, 1),
            },
        );
        assert!(matches!(size_of(&table, &bad), Err(KestrelError::Invalid(_))));
    }

    #[test]
    fn test_anonymous_names()
    {
        let table = SymbolTableBuilder::new("test.c").build();
        let anon = TypeSymbol::new(
            "",
            0,
            1,
            TypeKind::Structure {
                size: 4,
                members: Vec::new(),
            },
        );
        assert_eq!(type_name(&table, &anon), "struct (anon)");
        let func = TypeSymbol::new("", 0, 2, TypeKind::FunctionPointer { size: 4 });
        assert_eq!(type_name(&table, &func), "(Function pointer)");
    }
}
