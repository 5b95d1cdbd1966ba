//! Rendering of typed values as text.
//!
//! Output mirrors the layout of the type: structures print one member per
//! line with its byte offset, arrays print one element per block, and arrays
//! of `char` print as C string literals. Nesting stops after `depth` levels,
//! where only the type name is shown.

use crate::error::{KestrelError, KestrelResult};
use crate::symbols::SymbolTable;
use crate::typeinfo::bits::{mask_buffer, shift_buffer_right};
use crate::typeinfo::{type_name, TypeKind, TypeSymbol, MAX_TYPE_DEPTH};

/// Nesting levels expanded by `dump` unless configured otherwise.
pub const DEFAULT_DUMP_DEPTH: u32 = 2;

/// String literals wrap once a line reaches this column.
const STRING_WRAP_COLUMN: usize = 80;

const ELEMENT_RULE: &str = "---------------------------------------------";

/// Render `bytes` as a value of type `ty`.
///
/// `indent` is the column nested lines start at; `depth` is how many levels
/// of structures and arrays are expanded.
///
/// ## Errors
///
/// - [`KestrelError::Invalid`] if `bytes` is shorter than the type or the
///   type graph is malformed
/// - [`KestrelError::NotFound`] for dangling type references
pub fn render(table: &dyn SymbolTable, bytes: &[u8], ty: &TypeSymbol, indent: usize, depth: u32) -> KestrelResult<String>
{
    let mut out = String::new();
    Renderer { table, out: &mut out }.value(bytes, ty, indent, depth, 0)?;
    Ok(out)
}

fn too_short(needed: u64, available: usize) -> KestrelError
{
    KestrelError::invalid(format!(
        "Type is {needed} bytes large, but only {available} bytes are available"
    ))
}

fn little_endian(bytes: &[u8], width: usize) -> u64
{
    let mut raw = [0u8; 8];
    let width = width.min(8).min(bytes.len());
    raw[..width].copy_from_slice(&bytes[..width]);
    u64::from_le_bytes(raw)
}

/// Render an integer or floating-point value of `bits` bits.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] if `bytes` holds fewer than `bits`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn render_numeric(bytes: &[u8], bits: u32, signed: bool, float: bool) -> KestrelResult<String>
{
    let width = bits.div_ceil(8) as usize;
    if bytes.len() < width {
        return Err(too_short(u64::from(bits.div_ceil(8)), bytes.len()));
    }

    let mut value = little_endian(bytes, width);
    if bits % 8 != 0 && bits < 64 {
        value &= (1u64 << bits) - 1;
    }

    Ok(if float {
        match width {
            4 => format!("{:.6}", f32::from_bits(value as u32)),
            8 => format!("{:.6}", f64::from_bits(value)),
            _ => format!("{value:x}"),
        }
    } else if signed {
        match width {
            1 => (value as u8 as i8).to_string(),
            2 => (value as u16 as i16).to_string(),
            4 => (value as u32 as i32).to_string(),
            _ => (value as i64).to_string(),
        }
    } else {
        format!("0x{value:x}")
    })
}

/// Quote `bytes` as a C string literal, wrapping at column 80.
#[must_use]
pub fn render_string(bytes: &[u8], indent: usize) -> String
{
    let mut out = String::from("\"");
    let mut column = indent + 1;
    for byte in bytes {
        let escaped = match byte {
            0x20..0x80 => char::from(*byte).to_string(),
            0 => "\\0".to_string(),
            b'\r' => "\\r".to_string(),
            b'\n' => "\\n".to_string(),
            0x0c => "\\f".to_string(),
            0x0b => "\\v".to_string(),
            b'\t' => "\\t".to_string(),
            0x07 => "\\a".to_string(),
            0x08 => "\\b".to_string(),
            other => format!("\\x{other:02x}"),
        };
        column += escaped.len();
        out.push_str(&escaped);
        if column >= STRING_WRAP_COLUMN {
            column = indent;
            out.push('\n');
            out.push_str(&" ".repeat(indent));
        }
    }
    out.push('"');
    out
}

struct Renderer<'a>
{
    table: &'a dyn SymbolTable,
    out: &'a mut String,
}

impl Renderer<'_>
{
    fn resolve(&self, reference: crate::typeinfo::TypeRef) -> KestrelResult<std::sync::Arc<TypeSymbol>>
    {
        self.table
            .type_by_ref(reference)
            .ok_or_else(|| KestrelError::not_found(format!("Type {reference}")))
    }

    fn value(&mut self, bytes: &[u8], ty: &TypeSymbol, indent: usize, depth: u32, hops: usize) -> KestrelResult<()>
    {
        if hops > MAX_TYPE_DEPTH {
            return Err(KestrelError::invalid(format!(
                "Type {} nests deeper than {MAX_TYPE_DEPTH} levels",
                ty.type_ref()
            )));
        }

        match &ty.kind {
            TypeKind::Numeric { bits, signed, float } => {
                self.out.push_str(&render_numeric(bytes, *bits, *signed, *float)?);
            }
            TypeKind::Typedef { target } => {
                let target = self.resolve(*target)?;
                self.value(bytes, &target, indent, depth, hops + 1)?;
            }
            TypeKind::Enumeration { size, members } => self.enumeration(bytes, *size, members)?,
            TypeKind::FunctionPointer { size } => {
                let width = usize::try_from(*size).unwrap_or(8).min(8);
                self.out.push_str(&format!("(*0x{:08x})()", little_endian(bytes, width)));
            }
            TypeKind::Relation {
                pointer_size,
                min,
                max,
                target,
            } => {
                if *pointer_size > 0 {
                    let width = *pointer_size as usize;
                    if bytes.len() < width {
                        return Err(too_short(u64::from(*pointer_size), bytes.len()));
                    }
                    self.out.push_str(&format!("0x{:08x}", little_endian(bytes, width)));
                } else if min == max {
                    let target = self.resolve(*target)?;
                    self.value(bytes, &target, indent, depth, hops + 1)?;
                } else {
                    self.array(bytes, ty, *min, *max, *target, indent, depth)?;
                }
            }
            TypeKind::Structure { size, members } => {
                if (bytes.len() as u64) < *size {
                    return Err(too_short(*size, bytes.len()));
                }
                self.out.push_str(&type_name(self.table, ty));
                if depth == 0 {
                    return Ok(());
                }

                let indent = indent + 2;
                for member in members {
                    let offset = usize::try_from(member.bit_offset / 8).unwrap_or(usize::MAX);
                    if offset >= bytes.len() {
                        return Err(KestrelError::invalid(format!(
                            "Member {} lies outside the {} byte structure",
                            member.name,
                            bytes.len()
                        )));
                    }

                    let remainder = member.bit_offset % 8;
                    let field = if remainder == 0 {
                        member.name.clone()
                    } else {
                        format!("{}:{remainder}", member.name)
                    };
                    self.out
                        .push_str(&format!("\n{:indent$}{:<6}  {field:<17} : ", "", format!("+0x{offset:x}")));

                    let member_type = self.resolve(member.type_ref)?;
                    let member_size = crate::typeinfo::size_of(self.table, &member_type)?;
                    if member_size > *size {
                        return Err(KestrelError::invalid(format!(
                            "Member {} of {member_size} bytes does not fit the {size} byte structure",
                            member.name
                        )));
                    }

                    // A bit-field's underlying type may extend past the end of the structure
                    let mut data = bytes[offset..].to_vec();
                    if remainder != 0 || member.bit_size != 0 {
                        shift_buffer_right(&mut data, remainder);
                        mask_buffer(&mut data, member.bit_size);
                    }
                    data.resize(usize::try_from(member_size).unwrap_or(bytes.len()), 0);
                    self.value(&data, &member_type, indent, depth - 1, 0)?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn enumeration(&mut self, bytes: &[u8], size: u64, members: &[crate::typeinfo::EnumMember]) -> KestrelResult<()>
    {
        let width = usize::try_from(size).unwrap_or(8).min(8);
        if bytes.len() < width {
            return Err(too_short(size, bytes.len()));
        }

        let raw = little_endian(bytes, width);
        let value = match width {
            1 => i64::from(raw as u8 as i8),
            2 => i64::from(raw as u16 as i16),
            4 => i64::from(raw as u32 as i32),
            8 => raw as i64,
            _ => return Err(KestrelError::invalid(format!("Unsupported enumeration size {size}"))),
        };

        self.out.push_str(&value.to_string());
        if let Some(member) = members.iter().find(|member| member.value == value) {
            self.out.push(' ');
            self.out.push_str(&member.name);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn array(
        &mut self,
        bytes: &[u8],
        ty: &TypeSymbol,
        min: i64,
        max: i64,
        target: crate::typeinfo::TypeRef,
        indent: usize,
        depth: u32,
    ) -> KestrelResult<()>
    {
        self.out.push_str(&type_name(self.table, ty));
        if depth == 0 {
            return Ok(());
        }

        let indent = indent + 2;
        let element = self.resolve(target)?;
        let underlying = crate::typeinfo::skip_typedefs(self.table, &element)?;
        if let TypeKind::Numeric {
            bits: 8,
            signed: true,
            float: false,
        } = underlying.kind
        {
            let count = usize::try_from(ty.element_count()).unwrap_or(usize::MAX);
            if bytes.len() < count {
                return Err(too_short(ty.element_count(), bytes.len()));
            }
            self.out.push(' ');
            self.out.push_str(&render_string(&bytes[..count], indent));
            return Ok(());
        }

        let element_size = usize::try_from(crate::typeinfo::size_of(self.table, &element)?).unwrap_or(usize::MAX);
        let mut remaining = bytes;
        for index in min..=max {
            if remaining.len() < element_size {
                return Err(too_short(element_size as u64, remaining.len()));
            }
            let nested = indent + 2;
            self.out
                .push_str(&format!("\n{:indent$}[{index}] {ELEMENT_RULE}\n{:nested$}", "", ""));
            self.value(remaining, &element, nested, depth - 1, 0)?;
            remaining = &remaining[element_size..];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::symbols::SymbolTableBuilder;
    use crate::typeinfo::{EnumMember, StructMember, TypeRef};

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
    fn test_numeric_signedness_and_width()
    {
        assert_eq!(render_numeric(&[0xff], 8, true, false).unwrap(), "-1");
        assert_eq!(render_numeric(&[0xff, 0xff], 16, false, false).unwrap(), "0xffff");
        assert_eq!(render_numeric(&[0x2a, 0, 0, 0], 32, true, false).unwrap(), "42");
        assert_eq!(render_numeric(&1.5f32.to_le_bytes(), 32, true, true).unwrap(), "1.500000");
        assert!(render_numeric(&[1], 32, false, false).is_err());
    }

    #[test]
    fn test_string_escapes()
    {
        assert_eq!(render_string(b"hi\n\0\x7f\x90", 0), "\"hi\\n\\0\x7f\\x90\"");
    }

    #[test]
    fn test_string_wraps_at_column_eighty()
    {
        let text = render_string(&[b'a'; 100], 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 78);
        assert!(lines[1].starts_with("  a"));
    }

    #[test]
    fn test_structure_with_bitfields_and_depth()
    {
        let table = SymbolTableBuilder::new("flags.c")
            .with_type(numeric("unsigned int", 1, 32, false))
            .with_type(TypeSymbol::new(
                "Flags",
                0,
                2,
                TypeKind::Structure {
                    size: 4,
                    members: vec![
                        StructMember {
                            name: "a".into(),
                            bit_offset: 0,
                            bit_size: 3,
                            type_ref: TypeRef::new(0, 1),
                        },
                        StructMember {
                            name: "b".into(),
                            bit_offset: 3,
                            bit_size: 5,
                            type_ref: TypeRef::new(0, 1),
                        },
                    ],
                },
            ))
            .build();

        let flags = table.type_by_ref(TypeRef::new(0, 2)).unwrap();
        // a = 6, b = 0x1a
        let bytes = [6 | (0x1a << 3), 0, 0, 0];
        assert_eq!(
            render(&table, &bytes, &flags, 0, 1).unwrap(),
            format!(
                "struct Flags\n  {:<6}  {:<17} : 0x6\n  {:<6}  {:<17} : 0x1a",
                "+0x0", "a", "+0x0", "b:3"
            )
        );
        assert_eq!(render(&table, &bytes, &flags, 0, 0).unwrap(), "struct Flags");
    }

    #[test]
    fn test_trailing_bitfield_wider_than_remaining_bytes()
    {
        let table = SymbolTableBuilder::new("tail.c")
            .with_type(numeric("unsigned int", 1, 32, false))
            .with_type(TypeSymbol::new(
                "Tail",
                0,
                2,
                TypeKind::Structure {
                    size: 4,
                    members: vec![StructMember {
                        name: "flag".into(),
                        bit_offset: 24,
                        bit_size: 4,
                        type_ref: TypeRef::new(0, 1),
                    }],
                },
            ))
            .build();

        let tail = table.type_by_ref(TypeRef::new(0, 2)).unwrap();
        // Only one byte follows the member's offset; the upper nibble is masked off.
        assert_eq!(
            render(&table, &[0, 0, 0, 0xf5], &tail, 0, 1).unwrap(),
            format!("struct Tail\n  {:<6}  {:<17} : 0x5", "+0x3", "flag")
        );
    }

    #[test]
    fn test_enumeration_names_matching_member()
    {
        let table = SymbolTableBuilder::new("state.c").build();
        let ty = TypeSymbol::new(
            "State",
            0,
            1,
            TypeKind::Enumeration {
                size: 4,
                members: vec![
                    EnumMember {
                        name: "Running".into(),
                        value: 1,
                    },
                    EnumMember {
                        name: "Failed".into(),
                        value: -1,
                    },
                ],
            },
        );
        assert_eq!(render(&table, &[1, 0, 0, 0], &ty, 0, 2).unwrap(), "1 Running");
        assert_eq!(render(&table, &[0xff; 4], &ty, 0, 2).unwrap(), "-1 Failed");
        assert_eq!(render(&table, &[7, 0, 0, 0], &ty, 0, 2).unwrap(), "7");
    }

    #[test]
    fn test_array_of_integers_prints_elements()
    {
        let table = SymbolTableBuilder::new("array.c")
            .with_type(numeric("short", 1, 16, true))
            .build();
        let ty = TypeSymbol::new(
            "",
            0,
            2,
            TypeKind::Relation {
                pointer_size: 0,
                min: 0,
                max: 1,
                target: TypeRef::new(0, 1),
            },
        );
        let text = render(&table, &[1, 0, 0xfe, 0xff], &ty, 0, 2).unwrap();
        assert_eq!(
            text,
            format!("short[2]\n  [0] {ELEMENT_RULE}\n    1\n  [1] {ELEMENT_RULE}\n    -2")
        );
    }

    #[test]
    fn test_pointers_and_function_pointers()
    {
        let table = SymbolTableBuilder::new("ptr.c").build();
        let pointer = TypeSymbol::new(
            "",
            0,
            1,
            TypeKind::Relation {
                pointer_size: 4,
                min: 0,
                max: 0,
                target: TypeRef::new(0, 9),
            },
        );
        let callback = TypeSymbol::new("", 0, 2, TypeKind::FunctionPointer { size: 4 });
        assert_eq!(render(&table, &[0x10, 0x20, 0, 0x80], &pointer, 0, 2).unwrap(), "0x80002010");
        assert_eq!(render(&table, &[0x10, 0, 0, 0], &callback, 0, 2).unwrap(), "(*0x00000010)()");
    }
}
