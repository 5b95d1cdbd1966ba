//! # Command Surface
//!
//! Parses one line of user input and runs it against a [`DebuggerContext`].
//!
//! | Command | Meaning |
//! |---------|---------|
//! | `? EXPR` | Evaluate an address expression |
//! | `ln EXPR` | Symbolize an address |
//! | `dt PATH [EXPR]` | Dump a variable, or a type at an address |
//! | `dv` | Show parameters and locals of the current function |
//! | `profiler ...` | Stack, memory, and thread profiler views |
//! | `q` | Quit |
//!
//! A command that fails prints exactly one `Error: ...` line. The session
//! carries on either way.

use tracing::{debug, warn};

use crate::console::Console;
use crate::context::DebuggerContext;
use crate::data;
use crate::error::{KestrelError, KestrelResult};
use crate::profiler::{
    ProfilerDataType, MEMORY_PROFILER_USAGE, PROFILER_USAGE, STACK_PROFILER_USAGE, THREAD_PROFILER_USAGE,
};
use crate::symbolize::symbolize;
use crate::types::Address;

const HELP: &str = "Commands:\n  \
? <expr>            - Evaluate an expression.\n  \
ln <expr>           - Show the symbol nearest an address.\n  \
dt <path> [<expr>]  - Dump a variable, or a type at an address.\n  \
dv                  - Show the parameters and locals of the current function.\n  \
profiler <type> ... - Work with profiler data. See 'profiler help'.\n  \
q                   - Quit.\n";

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus
{
    Success,
    Failed,
    Quit,
}

impl CommandStatus
{
    /// Process exit code for one-shot invocations.
    #[must_use]
    pub fn exit_code(self) -> i32
    {
        match self {
            Self::Success | Self::Quit => 0,
            Self::Failed => 1,
        }
    }
}

/// Run one line of input, writing results and diagnostics to `console`.
pub fn execute(context: &mut DebuggerContext, console: &Console, line: &str) -> CommandStatus
{
    context.profiler().shutdown().reset();
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((command, arguments)) = words.split_first() else {
        return CommandStatus::Success;
    };

    debug!(command, arguments = arguments.len(), "executing command");
    let result = match command.to_ascii_lowercase().as_str() {
        "q" | "quit" => return CommandStatus::Quit,
        "help" => console.write(HELP),
        "?" => evaluate_command(context, arguments).and_then(|text| console.write(&text)),
        "ln" => show_symbol_command(context, arguments).and_then(|text| console.write_line(&text)),
        "dt" => dump_command(context, arguments).and_then(|text| console.write_line(&text)),
        "dv" => data::locals(context).and_then(|text| console.write(&text)),
        "profiler" => profiler_command(context, console, arguments),
        _ => Err(KestrelError::invalid(format!("Unknown command '{command}'. Try 'help'."))),
    };

    match result {
        Ok(()) => CommandStatus::Success,
        Err(error) => {
            debug!(%error, "command failed");
            if let Err(write_error) = console.write_line(&format!("Error: {error}")) {
                warn!(%write_error, "failed to report command error");
            }
            CommandStatus::Failed
        }
    }
}

fn evaluate_command(context: &DebuggerContext, arguments: &[&str]) -> KestrelResult<String>
{
    let [expression] = arguments else {
        return Err(KestrelError::invalid("Usage: ? <expr>"));
    };
    let value = context.evaluate(expression)?;
    #[allow(clippy::cast_possible_wrap)]
    let signed = value as i64;
    Ok(format!(" 0x{value:x} = {signed}\n"))
}

/// `ln EXPR`
///
/// ## Errors
///
/// Returns evaluation failures.
pub fn show_symbol_command(context: &DebuggerContext, arguments: &[&str]) -> KestrelResult<String>
{
    let [expression] = arguments else {
        return Err(KestrelError::invalid("Usage: ln <expr>"));
    };
    let address = context.evaluate(expression)?;
    Ok(show_symbol(context, Address::new(address)))
}

/// Symbol text for `address`, as printed by `ln`.
#[must_use]
pub fn show_symbol(context: &DebuggerContext, address: Address) -> String
{
    context.symbolize(address)
}

fn dump_command(context: &DebuggerContext, arguments: &[&str]) -> KestrelResult<String>
{
    let (path, address) = match arguments {
        [path] => (*path, None),
        [path, address] => (*path, Some(Address::new(context.evaluate(address)?))),
        _ => return Err(KestrelError::invalid("Usage: dt <path> [<address>]")),
    };
    data::dump(context, path, address)
}

/// Parse an integer the way C's `strtol` does with base 0.
///
/// `0x` selects hex and a leading `0` selects octal. Parsing stops at the
/// first character that is not a digit. Returns `None` if no digits were
/// consumed.
fn parse_c_integer(text: &str) -> Option<i64>
{
    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, digits) = match unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        Some(hex) if hex.starts_with(|c: char| c.is_ascii_hexdigit()) => (16, hex),
        Some(_) => return Some(0),
        None if unsigned.starts_with('0') => (8, unsigned),
        None => (10, unsigned),
    };

    let end = digits.find(|c: char| !c.is_digit(radix)).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if negative { -value } else { value })
}

fn parse_threshold(argument: Option<&&str>, missing: &str) -> KestrelResult<i64>
{
    let argument = argument.ok_or_else(|| KestrelError::invalid(missing))?;
    parse_c_integer(argument).ok_or_else(|| {
        KestrelError::invalid(format!(
            "Invalid argument {argument}. Unable to convert to a valid threshold value."
        ))
    })
}

/// Parse thread ids for the thread profiler views.
fn parse_thread_ids(arguments: &[&str]) -> KestrelResult<Vec<u32>>
{
    arguments
        .iter()
        .map(|argument| {
            let id = parse_c_integer(argument)
                .ok_or_else(|| KestrelError::invalid(format!("Invalid thread ID '{argument}'.")))?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let id = id as u32;
            Ok(id)
        })
        .collect()
}

/// Print `usage` and fail with `message`.
fn usage_error(console: &Console, usage: &str, message: String) -> KestrelResult<()>
{
    console.write(usage)?;
    Err(KestrelError::Invalid(message))
}

/// `profiler TYPE COMMAND [ARGS...]`
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] for unknown types, commands, or
/// arguments (after printing the relevant usage text), plus any failure of
/// the requested view.
pub fn profiler_command(context: &mut DebuggerContext, console: &Console, arguments: &[&str]) -> KestrelResult<()>
{
    let Some((kind, rest)) = arguments.split_first() else {
        return usage_error(console, PROFILER_USAGE, "Missing profiler type.".to_string());
    };

    match kind.to_ascii_lowercase().as_str() {
        "stack" => stack_command(context, console, rest),
        "memory" => memory_command(context, console, rest),
        "thread" => thread_command(context, console, rest),
        "help" => console.write(PROFILER_USAGE),
        _ => usage_error(console, PROFILER_USAGE, format!("Invalid profiler type '{kind}'.")),
    }
}

fn stack_report(context: &mut DebuggerContext, threshold: u32) -> KestrelResult<String>
{
    let modules = context.modules_snapshot();
    let lines = context.options().print_line_numbers;
    let pointer_size = context.pointer_size();
    let symbolize = |address: u64| symbolize(&modules, Address::new(address), lines);

    let profiler = context.profiler_mut();
    let report = profiler.stack_report(threshold, pointer_size, &symbolize)?;
    if profiler.stack_tree().is_empty() {
        return Err(KestrelError::invalid("There is no valid stack data to display."));
    }
    Ok(report)
}

fn stack_command(context: &mut DebuggerContext, console: &Console, arguments: &[&str]) -> KestrelResult<()>
{
    let Some(command) = arguments.first() else {
        return usage_error(console, STACK_PROFILER_USAGE, "Missing stack profiler command.".to_string());
    };

    match command.to_ascii_lowercase().as_str() {
        "start" => context.profiler_mut().start_stack(),
        "stop" => context.profiler_mut().stop_stack(),
        "clear" => context.profiler_mut().clear_stack(),
        "dump" => {
            let threshold = context.options().stack_threshold;
            console.write(&stack_report(context, threshold)?)?;
        }
        "threshold" => {
            let threshold = parse_threshold(arguments.get(1), "Percentage argument expected.")?;
            let threshold = u32::try_from(threshold)
                .ok()
                .filter(|threshold| *threshold <= 100)
                .ok_or_else(|| {
                    KestrelError::invalid("Invalid threshold percentage specified. Valid values are between 0 and 100.")
                })?;
            console.write(&stack_report(context, threshold)?)?;
        }
        "help" => console.write(STACK_PROFILER_USAGE)?,
        _ => {
            return usage_error(
                console,
                STACK_PROFILER_USAGE,
                format!("Unknown stack profiler command '{command}'."),
            );
        }
    }
    Ok(())
}

fn memory_command(context: &mut DebuggerContext, console: &Console, arguments: &[&str]) -> KestrelResult<()>
{
    let Some(command) = arguments.first() else {
        return usage_error(console, MEMORY_PROFILER_USAGE, "Missing memory profiler command.".to_string());
    };

    let dump_threshold = context.options().memory_threshold;
    let profiler = context.profiler_mut();
    match command.to_ascii_lowercase().as_str() {
        "start" => profiler.start_memory(),
        "delta" => console.write(&profiler.start_memory_delta()?)?,
        "stop" => profiler.stop_memory(),
        "clear" => console.write(&profiler.stop_memory_delta())?,
        "dump" => console.write(&profiler.memory_report(dump_threshold)?)?,
        "threshold" => {
            let threshold = parse_threshold(arguments.get(1), "Active count threshold argument expected.")?;
            let threshold = i32::try_from(threshold).unwrap_or(if threshold < 0 { i32::MIN } else { i32::MAX });
            console.write(&profiler.memory_report(threshold)?)?;
        }
        "help" => console.write(MEMORY_PROFILER_USAGE)?,
        _ => {
            return usage_error(
                console,
                MEMORY_PROFILER_USAGE,
                format!("Unknown memory profiler command '{command}'."),
            );
        }
    }
    Ok(())
}

fn thread_command(context: &mut DebuggerContext, console: &Console, arguments: &[&str]) -> KestrelResult<()>
{
    let Some((command, ids)) = arguments.split_first() else {
        return usage_error(console, THREAD_PROFILER_USAGE, "Missing thread profiler command.".to_string());
    };

    let profiler = context.profiler_mut();
    match command.to_ascii_lowercase().as_str() {
        "clear" => profiler.clear_threads(),
        "contextswaps" => {
            let filter = parse_thread_ids(ids)?;
            console.write(&profiler.context_swaps(&filter))?;
        }
        "list" => console.write(&profiler.thread_list())?,
        "blockingqueues" => {
            let filter = parse_thread_ids(ids)?;
            console.write(&profiler.blocking_queues(&filter))?;
        }
        "help" => console.write(THREAD_PROFILER_USAGE)?,
        _ => {
            return usage_error(
                console,
                THREAD_PROFILER_USAGE,
                format!("Unknown thread profiler command '{command}'."),
            );
        }
    }
    Ok(())
}

/// Reports for live profiler displays with new data, for printing before
/// each prompt.
///
/// ## Errors
///
/// Propagates drain and decode failures.
pub fn live_display(context: &mut DebuggerContext) -> KestrelResult<String>
{
    let modules = context.modules_snapshot();
    let options = *context.options();
    let pointer_size = context.pointer_size();
    let symbolize = |address: u64| symbolize(&modules, Address::new(address), options.print_line_numbers);
    context
        .profiler_mut()
        .live_reports(options.stack_threshold, options.memory_threshold, pointer_size, &symbolize)
}

/// One line per profiler queue with pending data, for status displays.
#[must_use]
pub fn pending_summary(context: &DebuggerContext) -> String
{
    let sink = context.profiler().sink();
    let mut out = String::new();
    for (kind, pending) in [
        (ProfilerDataType::Stack, sink.pending_stack()),
        (ProfilerDataType::Memory, sink.pending_memory()),
        (ProfilerDataType::Thread, sink.pending_thread()),
    ] {
        if pending > 0 {
            out.push_str(&format!("{pending} {kind} profiler packet(s) pending\n"));
        }
    }
    out
}
