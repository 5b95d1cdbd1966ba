use std::error::Error;
use std::path::{Path, PathBuf};
use std::{process, thread};

use clap::{Args, Parser, Subcommand};
use kestrel_core::commands::{live_display, pending_summary};
use kestrel_core::{execute, CommandStatus, Console, DebuggerContext, DisplayOptions, Session};
use kestrel_utils::{info, init_logging, init_logging_for_repl, init_logging_with_level, KestrelConfig, LogFormat, LogLevel};
use rustyline::error::ReadlineError;
use rustyline::Editor;

const PROMPT: &str = "kd> ";

/// Inspect and profile a recorded kernel debugging session.
#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(version)]
#[command(about = "Inspect and profile a recorded kernel debugging session", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Evaluate an address expression (e.g. `@eax+kernel!KeMain+0n4`)
    Eval
    {
        /// Expression to evaluate
        expression: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Show the symbol nearest an address
    Symbol
    {
        /// Address expression
        address: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Dump a variable, or a type at an address
    Dump
    {
        /// Variable or type path (e.g. `head.next.v`, `Node`, `char[16]`)
        path: String,
        /// Address expression, required when dumping a type
        address: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Show the parameters and locals of the current function
    Locals
    {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Start an interactive prompt
    Repl
    {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs
{
    /// Session file to load
    #[arg(short, long)]
    session: PathBuf,
    /// Nesting levels expanded when dumping structures
    #[arg(long)]
    dump_depth: Option<u32>,
    /// Do not append file and line to symbols
    #[arg(long, default_value_t = false)]
    no_line_numbers: bool,
    /// Hide call-tree nodes below this percentage
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    stack_threshold: Option<u32>,
    /// Hide memory rows whose active size changed by less than this
    #[arg(long, allow_hyphen_values = true)]
    memory_threshold: Option<i32>,
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<LogLevel>,
}

impl CommonArgs
{
    fn display_options(&self, config: KestrelConfig) -> DisplayOptions
    {
        DisplayOptions {
            print_line_numbers: config.print_line_numbers && !self.no_line_numbers,
            dump_depth: self.dump_depth.unwrap_or(config.dump_depth),
            stack_threshold: self.stack_threshold.unwrap_or(config.stack_threshold),
            memory_threshold: self.memory_threshold.unwrap_or(config.memory_threshold),
        }
    }
}

impl Commands
{
    fn common(&self) -> &CommonArgs
    {
        match self {
            Commands::Eval { common, .. }
            | Commands::Symbol { common, .. }
            | Commands::Dump { common, .. }
            | Commands::Locals { common }
            | Commands::Repl { common } => common,
        }
    }

    /// The REPL command line equivalent to a one-shot subcommand.
    fn command_line(&self) -> Option<String>
    {
        match self {
            // The command parser splits on whitespace
            Commands::Eval { expression, .. } => Some(format!("? {}", compact(expression))),
            Commands::Symbol { address, .. } => Some(format!("ln {}", compact(address))),
            Commands::Dump { path, address, .. } => Some(match address {
                Some(address) => format!("dt {} {}", compact(path), compact(address)),
                None => format!("dt {}", compact(path)),
            }),
            Commands::Locals { .. } => Some("dv".to_string()),
            Commands::Repl { .. } => None,
        }
    }
}

fn compact(text: &str) -> String
{
    text.split_whitespace().collect()
}

fn main()
{
    let cli = Cli::parse();
    let common = cli.command.common();

    // The REPL owns the terminal, so it logs to a file instead
    let log_file = if matches!(cli.command, Commands::Repl { .. }) {
        match init_logging_for_repl(common.log_level) {
            Ok(path) => Some(path),
            Err(e) => {
                eprintln!("Failed to initialize logging: {e}");
                process::exit(1);
            }
        }
    } else {
        let result = match common.log_level {
            Some(level) => init_logging_with_level(level, LogFormat::Pretty),
            None => init_logging(),
        };
        if let Err(e) = result {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
        None
    };

    match run(&cli, log_file.as_deref()) {
        Ok(status) => process::exit(status.exit_code()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli, log_file: Option<&Path>) -> Result<CommandStatus, Box<dyn Error>>
{
    let common = cli.command.common();
    let config = KestrelConfig::from_env()?;

    info!("Loading session {}", common.session.display());
    let session = Session::load(&common.session)?;
    let context = session.context()?.with_options(common.display_options(config));

    match cli.command.command_line() {
        Some(line) => {
            let mut context = context;
            Ok(execute(&mut context, &Console::stdout(), &line))
        }
        None => {
            run_repl(session, context, log_file)?;
            Ok(CommandStatus::Success)
        }
    }
}

fn run_repl(session: Session, mut context: DebuggerContext, log_file: Option<&Path>) -> Result<(), Box<dyn Error>>
{
    let console = Console::stdout();
    let shutdown = context.profiler().shutdown().clone();

    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || handler_flag.request())?;

    // Feed recorded profiler packets in the background, as a live target would
    let replay = {
        let sink = context.profiler().sink().clone();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("profiler-replay".to_string())
            .spawn(move || session.replay(&sink, &shutdown))?
    };

    println!("Kestrel {}. Type 'help' for commands, 'q' to quit.", env!("CARGO_PKG_VERSION"));
    if let Some(path) = log_file {
        println!("Logging to {}", path.display());
    }

    let mut editor = Editor::<()>::new();
    loop {
        match live_display(&mut context) {
            Ok(text) => console.write(&text)?,
            Err(e) => console.write_line(&format!("Error: {e}"))?,
        }

        match editor.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    console.write(&pending_summary(&context))?;
                    continue;
                }
                editor.add_history_entry(line.as_str());
                if execute(&mut context, &console, &line) == CommandStatus::Quit {
                    break;
                }
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        }
    }

    shutdown.request();
    let pushed = replay.join().unwrap_or_default();
    info!(pushed, "Leaving REPL");
    Ok(())
}
