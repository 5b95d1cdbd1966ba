//! Data symbols of the current frame: locating, reading, and listing them.

use std::sync::Arc;

use tracing::{debug, warn};

use super::render::render;
use crate::error::{KestrelError, KestrelResult};
use crate::modules::{Module, ModuleList};
use crate::registers::{register_name, RegisterSnapshot};
use crate::symbols::{DataLocation, DataSymbol, Frame, FunctionSymbol, SymbolTable};
use crate::target::read_exact;
use crate::typeinfo::{size_of, TypeSymbol};
use crate::types::{Address, Architecture};

/// Indentation of nested lines in the locals view.
const LOCALS_INDENT: usize = 4;

/// A local or parameter resolved against the current PC.
#[derive(Debug, Clone)]
pub struct LocalVariable
{
    pub module: Arc<Module>,
    pub function: Arc<FunctionSymbol>,
    pub symbol: DataSymbol,
    /// PC translated into the module's symbol space.
    pub debased_pc: Address,
}

/// Index of the live local named `name` with the greatest start address.
fn best_local(function: &FunctionSymbol, name: &str, pc: Address) -> Option<usize>
{
    function
        .locals
        .iter()
        .enumerate()
        .filter(|(_, local)| local.name.eq_ignore_ascii_case(name) && local.min_valid <= pc.value())
        .max_by_key(|(index, local)| (local.min_valid, std::cmp::Reverse(*index)))
        .map(|(index, _)| index)
}

/// Module, symbol table, and function that contain the PC.
fn current_function(modules: &ModuleList, registers: &RegisterSnapshot) -> KestrelResult<(Arc<Module>, Arc<dyn SymbolTable>, Arc<FunctionSymbol>, Address)>
{
    let (module, pc) = modules
        .find_by_address(registers.pc())
        .ok_or_else(|| KestrelError::invalid("Execution is not in any module!"))?;

    let table = module
        .symbols()
        .cloned()
        .ok_or_else(|| KestrelError::invalid(format!("Module {} has no symbols loaded for it!", module.name())))?;

    let function = table.function_containing(pc).ok_or_else(|| {
        KestrelError::invalid(format!("Function symbol could not be found in module {}!", module.name()))
    })?;

    Ok((module, table, function, pc))
}

/// Find a local or parameter of the function executing at the PC.
///
/// Locals win over parameters. Among locals sharing a name, the one whose
/// scope starts latest without starting past the PC is chosen.
///
/// ## Errors
///
/// Returns [`KestrelError::NotFound`] if the PC is outside any function or
/// no variable of that name is visible.
pub fn resolve_local(modules: &ModuleList, registers: &RegisterSnapshot, name: &str) -> KestrelResult<LocalVariable>
{
    let (module, _, function, pc) =
        current_function(modules, registers).map_err(|_| KestrelError::not_found(format!("Local {name}")))?;

    let symbol = best_local(&function, name, pc)
        .map(|index| function.locals[index].clone())
        .or_else(|| {
            function
                .parameters
                .iter()
                .find(|parameter| parameter.name.eq_ignore_ascii_case(name))
                .cloned()
        })
        .ok_or_else(|| KestrelError::not_found(format!("Local {name}")))?;

    debug!(name, function = %function.name, "resolved local");
    Ok(LocalVariable {
        module,
        function,
        symbol,
        debased_pc: pc,
    })
}

fn register_location(architecture: Architecture, number: u32) -> KestrelResult<&'static str>
{
    register_name(architecture, number).ok_or_else(|| KestrelError::not_found(format!("Register number {number}")))
}

/// Second register of the pair holding a 64-bit value on a 32-bit target.
fn register_pair(architecture: Architecture, number: u32) -> KestrelResult<u32>
{
    match architecture {
        Architecture::X86 => match number {
            0 => Ok(2),
            3 => Ok(1),
            _ => Err(KestrelError::invalid(format!(
                "Register {} cannot hold an 8 byte value",
                register_name(architecture, number).unwrap_or("?")
            ))),
        },
        Architecture::Arm => Ok(number + 1),
        Architecture::X64 => Ok(number),
    }
}

fn register_bytes(registers: &RegisterSnapshot, number: u32, size: usize) -> KestrelResult<Vec<u8>>
{
    let architecture = registers.architecture();
    let mut value = registers.get_by_number(number)?.to_le_bytes().to_vec();
    if architecture != Architecture::X64 {
        value.truncate(4);
        if size > 4 {
            let high = registers.get_by_number(register_pair(architecture, number)?)?;
            value.extend_from_slice(&high.to_le_bytes()[..4]);
        }
    }

    let mut bytes = vec![0u8; size];
    let length = size.min(value.len());
    bytes[..length].copy_from_slice(&value[..length]);
    Ok(bytes)
}

/// Read the value of a data symbol.
///
/// Returns the location text shown before the value along with the bytes.
///
/// ## Errors
///
/// - [`KestrelError::NotFound`] for unknown register numbers or types
/// - [`KestrelError::Invalid`] for register pairs the architecture cannot form
/// - Transport errors from memory reads
pub fn read_data_symbol(table: &dyn SymbolTable, frame: &Frame<'_>, module: &Module, symbol: &DataSymbol) -> KestrelResult<(String, Vec<u8>, Arc<TypeSymbol>)>
{
    let ty = table
        .type_by_ref(symbol.type_ref)
        .ok_or_else(|| KestrelError::not_found(format!("Type {} of {}", symbol.type_ref, symbol.name)))?;
    let size = usize::try_from(size_of(table, &ty)?)
        .map_err(|_| KestrelError::Resource(format!("{} is too large to read", symbol.name)))?;
    let architecture = frame.architecture();

    let (location, bytes) = match &symbol.location {
        DataLocation::Register { register } => (
            format!("@{}", register_location(architecture, *register)?),
            register_bytes(frame.registers, *register, size)?,
        ),
        DataLocation::Indirect { register, offset } => {
            let name = register_location(architecture, *register)?;
            let base = frame.registers.get_by_number(*register)?;
            let location = if *offset < 0 {
                format!("[@{name}-0x{:x}]", offset.unsigned_abs())
            } else {
                format!("[@{name}+0x{offset:x}]")
            };
            #[allow(clippy::cast_sign_loss)]
            let address = Address::new(base.wrapping_add(*offset as u64));
            (location, read_exact(frame.target, address, size)?)
        }
        DataLocation::Absolute { address } => {
            let runtime = module.rebase(Address::new(*address));
            (format!("[0x{:x}]", runtime.value()), read_exact(frame.target, runtime, size)?)
        }
        DataLocation::Complex { .. } => {
            let mut bytes = vec![0u8; size];
            table.read_data(symbol, frame, &mut bytes)?;
            (table.describe_complex(symbol, architecture), bytes)
        }
    };

    Ok((location, bytes, ty))
}

/// Format one data symbol as `LOCATION NAME: VALUE`.
///
/// ## Errors
///
/// Returns [`KestrelError::OutOfRange`] if the symbol is not live at
/// `debased_pc`, plus anything [`read_data_symbol`] or rendering reports.
pub fn print_data_symbol(table: &dyn SymbolTable, frame: &Frame<'_>, module: &Module, symbol: &DataSymbol, debased_pc: Address, indent: usize, depth: u32) -> KestrelResult<String>
{
    if debased_pc.value() < symbol.min_valid {
        return Err(KestrelError::out_of_range(format!(
            "{} is not valid until 0x{:x}",
            symbol.name, symbol.min_valid
        )));
    }

    let (location, bytes, ty) = read_data_symbol(table, frame, module, symbol)?;
    let rendered = render(table, &bytes, &ty, indent, depth)?;
    Ok(format!("{location:<12} {:<20}: {rendered}", symbol.name))
}

fn print_into(out: &mut String, table: &dyn SymbolTable, frame: &Frame<'_>, module: &Module, symbol: &DataSymbol, pc: Address, depth: u32) -> bool
{
    match print_data_symbol(table, frame, module, symbol, pc, LOCALS_INDENT, depth) {
        Ok(line) => {
            out.push_str(&line);
            out.push('\n');
            true
        }
        Err(error) if error.is_out_of_range() => false,
        Err(error) => {
            warn!(name = %symbol.name, %error, "failed to read data symbol");
            out.push_str(&format!("Error: unable to get data for data symbol {}\n", symbol.name));
            false
        }
    }
}

/// List the parameters and live locals of the function at the PC.
///
/// Parameters come first, followed by a blank line when any were printed.
/// Variables that are not live yet are left out.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] when the PC is not inside a module, the
/// module has no symbols, or no function contains the PC.
pub fn print_locals(modules: &ModuleList, frame: &Frame<'_>, depth: u32) -> KestrelResult<String>
{
    let (module, table, function, pc) = current_function(modules, frame.registers)?;
    let table = table.as_ref();
    let mut out = String::new();

    let mut parameter_printed = false;
    for parameter in &function.parameters {
        parameter_printed |= print_into(&mut out, table, frame, &module, parameter, pc, depth);
    }
    if parameter_printed {
        out.push('\n');
    }

    for (index, local) in function.locals.iter().enumerate() {
        if local.min_valid != 0 {
            if pc.value() < local.min_valid {
                continue;
            }
            if best_local(&function, &local.name, pc) != Some(index) {
                continue;
            }
        }
        print_into(&mut out, table, frame, &module, local, pc, depth);
    }

    Ok(out)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::modules::ModuleId;
    use crate::registers::X86Registers;
    use crate::symbols::SymbolTableBuilder;
    use crate::target::InMemoryTarget;
    use crate::typeinfo::{TypeKind, TypeRef};

    fn int() -> TypeSymbol
    {
        TypeSymbol::new(
            "int",
            0,
            1,
            TypeKind::Numeric {
                bits: 32,
                signed: true,
                float: false,
            },
        )
    }

    fn data(name: &str, location: DataLocation, min_valid: u64) -> DataSymbol
    {
        DataSymbol {
            name: name.into(),
            location,
            min_valid,
            file: 0,
            type_ref: TypeRef::new(0, 1),
        }
    }

    fn modules() -> ModuleList
    {
        let table = SymbolTableBuilder::new("count.c")
            .with_type(int())
            .with_type(TypeSymbol::new(
                "long long",
                0,
                2,
                TypeKind::Numeric {
                    bits: 64,
                    signed: true,
                    float: false,
                },
            ))
            .with_function(FunctionSymbol {
                name: "Count".into(),
                start: 0x1000,
                end: 0x1100,
                file: 0,
                parameters: vec![data("limit", DataLocation::Indirect { register: 5, offset: 8 }, 0)],
                locals: vec![
                    data("index", DataLocation::Register { register: 0 }, 0x1010),
                    data("index", DataLocation::Indirect { register: 5, offset: -4 }, 0x1030),
                    data("later", DataLocation::Register { register: 3 }, 0x1080),
                ],
            })
            .build();

        let mut modules = ModuleList::new();
        modules.insert(
            Module::new(ModuleId(1), "count.exe", Address::new(0), Address::new(0x40_0000), 0x2000)
                .with_symbols(Arc::new(table)),
        );
        modules
    }

    fn registers(eip: u32) -> RegisterSnapshot
    {
        RegisterSnapshot::X86(X86Registers {
            eax: 7,
            ebp: 0x9000,
            eip,
            ..Default::default()
        })
    }

    fn target() -> InMemoryTarget
    {
        InMemoryTarget::new(registers(0))
            .with_segment(0x8ffc, 0x22u32.to_le_bytes().to_vec())
            .with_segment(0x9008, 0x40u32.to_le_bytes().to_vec())
    }

    #[test]
    fn test_resolve_local_prefers_latest_live_scope()
    {
        let modules = modules();
        let early = resolve_local(&modules, &registers(0x40_1020), "INDEX").unwrap();
        assert_eq!(early.symbol.location, DataLocation::Register { register: 0 });

        let late = resolve_local(&modules, &registers(0x40_1040), "index").unwrap();
        assert_eq!(late.debased_pc, Address::new(0x1040));
        assert!(matches!(late.symbol.location, DataLocation::Indirect { offset: -4, .. }));
    }

    #[test]
    fn test_resolve_local_falls_back_to_parameters()
    {
        let modules = modules();
        let limit = resolve_local(&modules, &registers(0x40_1000), "limit").unwrap();
        assert_eq!(limit.function.name, "Count");
        assert!(matches!(
            resolve_local(&modules, &registers(0x40_1000), "missing"),
            Err(KestrelError::NotFound(_))
        ));
    }

    #[test]
    fn test_print_locals_skips_variables_not_yet_live()
    {
        let modules = modules();
        let registers = registers(0x40_1040);
        let target = target();
        let frame = Frame {
            registers: &registers,
            target: &target,
        };

        let text = print_locals(&modules, &frame, 2).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("{:<12} {:<20}: 64", "[@ebp+0x8]", "limit"));
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], format!("{:<12} {:<20}: 34", "[@ebp-0x4]", "index"));
    }

    #[test]
    fn test_register_pair_on_x86()
    {
        let registers = RegisterSnapshot::X86(X86Registers {
            eax: 0x1111_2222,
            edx: 0x3333_4444,
            ..Default::default()
        });
        let bytes = register_bytes(&registers, 0, 8).unwrap();
        assert_eq!(u64::from_le_bytes(bytes.try_into().unwrap()), 0x3333_4444_1111_2222);
        assert!(register_bytes(&registers, 5, 8).is_err());
    }

    #[test]
    fn test_print_locals_outside_any_module()
    {
        let modules = modules();
        let registers = registers(0x10);
        let target = target();
        let frame = Frame {
            registers: &registers,
            target: &target,
        };
        let error = print_locals(&modules, &frame, 2).unwrap_err();
        assert_eq!(error.to_string(), "Execution is not in any module!");
    }
}
