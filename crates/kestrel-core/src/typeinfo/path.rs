//! Member paths: `.field`, `[index]`, and chains of both.
//!
//! A path walks from a value already read into memory toward one of its
//! members. Structure members are cut out of the parent buffer with the
//! bit-field helpers. Array elements are sliced from the buffer without a
//! fetch. Pointers are followed by reading the pointee from the target, which
//! also happens implicitly when a `.field` is applied to a pointer.

use std::sync::Arc;

use smallvec::SmallVec;

use super::bits::{mask_buffer, shift_buffer_right};
use super::{element_type, size_of, skip_typedefs, type_name, TypeKind, TypeSymbol};
use crate::error::{KestrelError, KestrelResult};
use crate::symbols::SymbolTable;
use crate::target::{read_exact, Target};
use crate::types::Address;

/// One step of a member path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment
{
    /// `.NAME`
    Member(String),
    /// `[EXPR]`, with the expression text unevaluated
    Index(String),
}

/// Parsed member path. Most paths are a handful of segments long.
pub type MemberPath = SmallVec<[PathSegment; 4]>;

/// Split a path such as `next.items[@eax+1].value` into segments.
///
/// A leading bare name is treated as `.NAME`.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] for empty member names or unbalanced brackets.
pub fn parse_path(text: &str) -> KestrelResult<MemberPath>
{
    let mut segments = MemberPath::new();
    let mut rest = text;

    if !rest.is_empty() && !rest.starts_with('.') && !rest.starts_with('[') {
        rest = split_member(rest, &mut segments)?;
    }

    while let Some(first) = rest.chars().next() {
        match first {
            '.' => rest = split_member(&rest[1..], &mut segments)?,
            '[' => {
                let close = matching_bracket(rest)
                    .ok_or_else(|| KestrelError::invalid(format!("Unterminated '[' in '{text}'")))?;
                let expression = &rest[1..close];
                if expression.is_empty() {
                    return Err(KestrelError::invalid(format!("Empty index in '{text}'")));
                }
                segments.push(PathSegment::Index(expression.to_string()));
                rest = &rest[close + 1..];
            }
            other => {
                return Err(KestrelError::invalid(format!("Unexpected '{other}' in member path '{text}'")));
            }
        }
    }

    Ok(segments)
}

fn split_member<'a>(text: &'a str, segments: &mut MemberPath) -> KestrelResult<&'a str>
{
    let end = text.find(['.', '[']).unwrap_or(text.len());
    let name = &text[..end];
    if name.is_empty() {
        return Err(KestrelError::invalid("Expected a member name after '.'"));
    }
    segments.push(PathSegment::Member(name.to_string()));
    Ok(&text[end..])
}

fn matching_bracket(text: &str) -> Option<usize>
{
    let mut depth = 0usize;
    for (index, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Services a member walk needs from the rest of the debugger.
pub struct PathContext<'a>
{
    pub table: &'a dyn SymbolTable,
    pub target: &'a dyn Target,
    /// Evaluates index expressions.
    pub evaluate: &'a dyn Fn(&str) -> KestrelResult<u64>,
}

/// A value located by walking a member path.
#[derive(Debug, Clone)]
pub struct MemberValue
{
    /// Value bytes, little-endian, already shifted and masked for bit-fields.
    pub bytes: Vec<u8>,
    pub ty: Arc<TypeSymbol>,
    pub size: u64,
    /// Target address of the value, when it is addressable on a byte boundary.
    pub address: Option<Address>,
}

/// Walk `path` starting from `bytes` of type `ty`.
///
/// ## Errors
///
/// - [`KestrelError::NotFound`] for unknown member names
/// - [`KestrelError::OutOfRange`] for array indices outside the declared bounds
/// - [`KestrelError::Invalid`] for segments that do not apply to the current type
/// - Transport errors from pointer dereferences
pub fn member_lookup(context: &PathContext<'_>, start: MemberValue, path: &MemberPath) -> KestrelResult<MemberValue>
{
    let mut current = start;
    for segment in path {
        current = match segment {
            PathSegment::Member(name) => select_member(context, current, name)?,
            PathSegment::Index(expression) => {
                let index = (context.evaluate)(expression)?;
                index_value(context, current, index)?
            }
        };
    }
    Ok(current)
}

fn pointer_value(bytes: &[u8], pointer_size: usize) -> Address
{
    let mut raw = [0u8; 8];
    let length = pointer_size.min(8).min(bytes.len());
    raw[..length].copy_from_slice(&bytes[..length]);
    Address::new(u64::from_le_bytes(raw))
}

fn to_usize(value: u64) -> KestrelResult<usize>
{
    usize::try_from(value).map_err(|_| KestrelError::Resource(format!("{value} bytes do not fit in memory")))
}

fn dereference(context: &PathContext<'_>, pointer: &MemberValue, pointer_size: u32) -> KestrelResult<MemberValue>
{
    let element = element_type(context.table, &pointer.ty)?;
    let size = size_of(context.table, &element)?;
    let base = pointer_value(&pointer.bytes, to_usize(u64::from(pointer_size))?);
    tracing::trace!(address = %base, size, "following pointer");
    let bytes = read_exact(context.target, base, to_usize(size)?)?;
    Ok(MemberValue {
        bytes,
        ty: element,
        size,
        address: Some(base),
    })
}

fn select_member(context: &PathContext<'_>, current: MemberValue, name: &str) -> KestrelResult<MemberValue>
{
    let mut resolved = skip_typedefs(context.table, &current.ty)?;
    let mut current = current;

    if let TypeKind::Relation { pointer_size, min, max, .. } = resolved.kind {
        if pointer_size > 0 && min == max {
            current = dereference(context, &MemberValue { ty: Arc::clone(&resolved), ..current }, pointer_size)?;
            resolved = skip_typedefs(context.table, &current.ty)?;
        }
    }

    let TypeKind::Structure { members, .. } = &resolved.kind else {
        return Err(KestrelError::invalid(format!(
            "{} has no member '{name}'",
            type_name(context.table, &resolved)
        )));
    };

    let member = members
        .iter()
        .find(|member| member.name == name)
        .or_else(|| members.iter().find(|member| member.name.eq_ignore_ascii_case(name)))
        .ok_or_else(|| {
            KestrelError::not_found(format!("Member '{name}' of {}", type_name(context.table, &resolved)))
        })?;

    let member_type = context
        .table
        .type_by_ref(member.type_ref)
        .ok_or_else(|| KestrelError::not_found(format!("Type {} of member '{name}'", member.type_ref)))?;
    let size = size_of(context.table, &member_type)?;

    let mut bytes = current.bytes;
    shift_buffer_right(&mut bytes, member.bit_offset);
    mask_buffer(&mut bytes, member.bit_size);
    bytes.resize(to_usize(size)?, 0);

    let address = if member.is_bitfield() {
        None
    } else {
        current.address.map(|base| base + member.bit_offset / 8)
    };

    Ok(MemberValue {
        bytes,
        ty: member_type,
        size,
        address,
    })
}

fn index_value(context: &PathContext<'_>, current: MemberValue, index: u64) -> KestrelResult<MemberValue>
{
    let resolved = skip_typedefs(context.table, &current.ty)?;
    let TypeKind::Relation {
        pointer_size, min, max, ..
    } = resolved.kind
    else {
        return Err(KestrelError::invalid(format!(
            "{} cannot be indexed",
            type_name(context.table, &resolved)
        )));
    };

    let element = element_type(context.table, &resolved)?;
    let element_size = size_of(context.table, &element)?;

    if pointer_size > 0 {
        let base = pointer_value(&current.bytes, to_usize(u64::from(pointer_size))?);
        let address = base + index.wrapping_mul(element_size);
        tracing::trace!(%address, index, "indexing through pointer");
        let bytes = read_exact(context.target, address, to_usize(element_size)?)?;
        return Ok(MemberValue {
            bytes,
            ty: element,
            size: element_size,
            address: Some(address),
        });
    }

    if min == max {
        return Err(KestrelError::invalid(format!(
            "{} cannot be indexed",
            type_name(context.table, &resolved)
        )));
    }

    #[allow(clippy::cast_possible_wrap)]
    let signed = index as i64;
    if signed < min || signed > max {
        return Err(KestrelError::out_of_range(format!(
            "Index {signed} is outside {}",
            type_name(context.table, &resolved)
        )));
    }

    let position = signed.wrapping_sub(min).unsigned_abs();
    let offset = to_usize(position.wrapping_mul(element_size))?;
    let length = to_usize(element_size)?;
    let bytes = current
        .bytes
        .get(offset..offset + length)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| KestrelError::out_of_range(format!("Element {signed} extends past the value buffer")))?;

    Ok(MemberValue {
        bytes,
        ty: element,
        size: element_size,
        address: current.address.map(|base| base + offset as u64),
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_leading_bare_name()
    {
        let path = parse_path("next.value").unwrap();
        assert_eq!(
            path.as_slice(),
            &[
                PathSegment::Member("next".to_string()),
                PathSegment::Member("value".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_nested_brackets()
    {
        let path = parse_path("[(@eax+1)].items[2]").unwrap();
        assert_eq!(
            path.as_slice(),
            &[
                PathSegment::Index("(@eax+1)".to_string()),
                PathSegment::Member("items".to_string()),
                PathSegment::Index("2".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_errors()
    {
        assert!(parse_path("a[3").is_err());
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a[]").is_err());
    }

    #[test]
    fn test_empty_path_has_no_segments()
    {
        assert!(parse_path("").unwrap().is_empty());
    }
}
