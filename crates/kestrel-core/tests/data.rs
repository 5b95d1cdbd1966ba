//! Tests for typed reads and rendering through a debugger context

use std::sync::atomic::Ordering;
use std::sync::Arc;

use kestrel_core::data::{dump, locals, read_by_name};
use kestrel_core::registers::{RegisterSnapshot, X86Registers};
use kestrel_core::symbols::{DataLocation, DataSymbol, FunctionSymbol, SymbolTableBuilder};
use kestrel_core::target::InMemoryTarget;
use kestrel_core::typeinfo::{StructMember, TypeKind, TypeRef, TypeSymbol};
use kestrel_core::{Address, DebuggerContext, KestrelError, Module, ModuleId, ModuleList};

const FLAGS_ADDRESS: u64 = 0x7000;
const NAME_ADDRESS: u64 = 0x8000;
const FRAME_BASE: u32 = 0x9000;

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

fn member(name: &str, bit_offset: u64, bit_size: u64, id: u32) -> StructMember
{
    StructMember {
        name: name.into(),
        bit_offset,
        bit_size,
        type_ref: TypeRef::new(0, id),
    }
}

fn int_symbol(name: &str, location: DataLocation, min_valid: u64) -> DataSymbol
{
    DataSymbol {
        name: name.into(),
        location,
        min_valid,
        file: 0,
        type_ref: TypeRef::new(0, 2),
    }
}

fn kernel() -> Module
{
    let table = SymbolTableBuilder::new("kernel/list.c")
        .with_type(numeric("char", 1, 8, true))
        .with_type(numeric("int", 2, 32, true))
        .with_type(numeric("unsigned char", 3, 8, false))
        .with_type(TypeSymbol::new(
            "Flags",
            0,
            4,
            TypeKind::Structure {
                size: 2,
                members: vec![member("a", 0, 3, 3), member("b", 3, 5, 3), member("c", 8, 8, 3)],
            },
        ))
        .with_type(TypeSymbol::new(
            "Node",
            0,
            5,
            TypeKind::Structure {
                size: 8,
                members: vec![member("next", 0, 0, 6), member("v", 32, 0, 2)],
            },
        ))
        .with_type(TypeSymbol::new(
            "",
            0,
            6,
            TypeKind::Relation {
                pointer_size: 4,
                min: 0,
                max: 0,
                target: TypeRef::new(0, 5),
            },
        ))
        .with_data(DataSymbol {
            name: "head".into(),
            location: DataLocation::Absolute { address: 0x3000 },
            min_valid: 0,
            file: 0,
            type_ref: TypeRef::new(0, 6),
        })
        .with_data(int_symbol("index", DataLocation::Absolute { address: 0x3100 }, 0))
        .with_function(FunctionSymbol {
            name: "KeWalkList".into(),
            start: 0x2000,
            end: 0x2100,
            file: 0,
            parameters: vec![int_symbol("count", DataLocation::Register { register: 0 }, 0)],
            locals: vec![int_symbol(
                "index",
                DataLocation::Indirect {
                    register: 5,
                    offset: -8,
                },
                0x2010,
            )],
        })
        .build();

    Module::new(ModuleId(1), "kernel", Address::new(0), Address::new(0), 0x10_0000).with_symbols(Arc::new(table))
}

fn node(next: u32, value: i32) -> Vec<u8>
{
    let mut bytes = next.to_le_bytes().to_vec();
    bytes.extend_from_slice(&value.to_le_bytes());
    bytes
}

fn target(eip: u32) -> InMemoryTarget
{
    let registers = RegisterSnapshot::X86(X86Registers {
        eax: 3,
        eip,
        ebp: FRAME_BASE,
        ..Default::default()
    });
    InMemoryTarget::new(registers)
        .with_segment(0x3000, 0x4000u32.to_le_bytes().to_vec())
        .with_segment(0x3100, 99i32.to_le_bytes().to_vec())
        .with_segment(0x4000, node(0x5000, 1))
        .with_segment(0x5000, node(0x6000, 2))
        .with_segment(0x6000, node(0, 0x2a))
        .with_segment(FLAGS_ADDRESS, vec![0b1101_0110, 0x7f])
        .with_segment(NAME_ADDRESS, b"hello\nworld\0".to_vec())
        .with_segment(u64::from(FRAME_BASE) - 8, 7i32.to_le_bytes().to_vec())
}

fn context(target: InMemoryTarget) -> DebuggerContext
{
    let mut modules = ModuleList::new();
    modules.insert(kernel());
    DebuggerContext::new(Box::new(target)).unwrap().with_modules(modules)
}

#[test]
fn test_bitfields_are_shifted_and_masked()
{
    let context = context(target(0));
    let text = dump(&context, "Flags", Some(Address::new(FLAGS_ADDRESS))).unwrap();
    assert_eq!(
        text,
        format!(
            "struct Flags\n  {:<6}  {:<17} : 0x6\n  {:<6}  {:<17} : 0x1a\n  {:<6}  {:<17} : 0x7f",
            "+0x0", "a", "+0x0", "b:3", "+0x1", "c"
        )
    );

    assert_eq!(dump(&context, "Flags.b", Some(Address::new(FLAGS_ADDRESS))).unwrap(), "0x1a");
    assert_eq!(dump(&context, "Flags.c", Some(Address::new(FLAGS_ADDRESS))).unwrap(), "0x7f");
}

#[test]
fn test_char_array_prints_as_string()
{
    let context = context(target(0));
    let text = dump(&context, "char[12]", Some(Address::new(NAME_ADDRESS))).unwrap();
    assert_eq!(text, r#"char[12] "hello\nworld\0""#);
}

#[test]
fn test_pointer_path_reads_once_per_hop()
{
    let target = target(0);
    let reads = target.read_counter();
    let context = context(target);

    reads.store(0, Ordering::Relaxed);
    assert_eq!(dump(&context, "head.next.next.v", None).unwrap(), "42");
    // One read for head itself, then one per pointer hop.
    assert_eq!(reads.load(Ordering::Relaxed), 4);
}

#[test]
fn test_typed_value_keeps_address_and_type()
{
    let context = context(target(0));
    let value = read_by_name(&context, "head.next", None).unwrap();
    assert_eq!(value.type_name(), "Node*");
    assert_eq!(value.address(), Some(Address::new(0x4000)));
    assert_eq!(value.bytes(), 0x5000u32.to_le_bytes());
}

#[test]
fn test_locals_shadow_globals()
{
    // Inside KeWalkList after the local comes alive.
    let context = context(target(0x2020));
    assert_eq!(dump(&context, "index", None).unwrap(), "7");
    assert_eq!(dump(&context, "count", None).unwrap(), "3");

    // Outside any function the global is used.
    let context = self::context(target(0x2f00));
    assert_eq!(dump(&context, "index", None).unwrap(), "99");
}

#[test]
fn test_locals_view()
{
    let context = context(target(0x2020));
    let text = locals(&context).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("@eax"));
    assert!(lines[0].ends_with(": 3"));
    assert!(lines[1].is_empty());
    assert!(lines[2].starts_with("[@ebp-0x8]"));
    assert!(lines[2].ends_with(": 7"));

    // Before the local is live only the parameter shows.
    let context = self::context(target(0x2004));
    assert_eq!(locals(&context).unwrap().lines().count(), 2);
}

#[test]
fn test_dump_errors()
{
    let context = context(target(0));
    assert!(matches!(dump(&context, "Flags", None), Err(KestrelError::Invalid(_))));
    assert!(matches!(
        dump(&context, "head", Some(Address::new(0x3000))),
        Err(KestrelError::Invalid(_))
    ));
    assert!(matches!(dump(&context, "Missing", None), Err(KestrelError::NotFound(_))));
    assert!(matches!(
        dump(&context, "Flags.zz", Some(Address::new(FLAGS_ADDRESS))),
        Err(KestrelError::NotFound(_))
    ));
    assert!(matches!(dump(&context, "KeWalkList", None), Err(KestrelError::Invalid(_))));
}
