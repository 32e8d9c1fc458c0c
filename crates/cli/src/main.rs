// gridcalc CLI - headless host for the calculation engine

mod exit_codes;
mod logger;
mod script;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use gridcalc_config::{ConfigError, Settings};
use gridcalc_engine::{Address, Engine, EngineError, ErrorKind, FunctionRegistry, RawValue};
use log::LevelFilter;
use serde_json::json;

use exit_codes::{EXIT_EVAL, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "gcalc")]
#[command(about = "Spreadsheet calculation engine (headless)")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (JSON or TOML). Defaults to <config dir>/gridcalc/settings.json
    #[arg(long, global = true, env = "GRIDCALC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log to stderr (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a cell script (stdin when no file is given)
    #[command(after_help = "\
Script commands, one per line:
  set <CELL> <INPUT>   store a value, or a formula when INPUT starts with =
  clear <CELL>         empty a cell
  get <CELL>           print a cell's value
  formula <CELL>       print a cell's formula
  deps <CELL>          print a cell's precedents and dependents
  undo | redo          step through history
  # ...                comment

Examples:
  gcalc run budget.calc
  printf 'set A1 2\\nset B1 =A1*3\\n' | gcalc run --json")]
    Run {
        /// Script file (omit to read stdin)
        script: Option<PathBuf>,

        /// Emit one JSON object per statement
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a single formula
    #[command(after_help = "\
Examples:
  gcalc calc '=1+2*3'
  gcalc calc '=SUM(A1:A3)' --cell A1=1 --cell A2=2 --cell A3=3
  gcalc calc '=B1/2' --cell A1=4 --cell 'B1==A1*5' --json")]
    Calc {
        /// Formula to evaluate (leading = optional)
        formula: String,

        /// Seed a cell before evaluating. Repeatable.
        #[arg(long = "cell", value_name = "CELL=INPUT")]
        cells: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all supported functions
    ListFunctions,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Until settings are read only -v decides what is shown
    let from_flags = logger::verbosity(cli.verbose);
    logger::init(from_flags.unwrap_or(LevelFilter::Warn));

    let result = load_settings(cli.config.as_deref()).and_then(|settings| {
        if from_flags.is_none() {
            log::set_max_level(settings.log_level_filter());
        }
        match cli.command {
            None => {
                eprintln!("Usage: gcalc <command> [options]");
                eprintln!("       gcalc --help for more information");
                Ok(())
            }
            Some(Commands::Run { script, json }) => cmd_run(script, json, &settings),
            Some(Commands::Calc { formula, cells, json }) => cmd_calc(formula, cells, json, &settings),
            Some(Commands::ListFunctions) => cmd_list_functions(),
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self { code: EXIT_EVAL, message: msg.into(), hint: None }
    }

    /// Engine rejection, prefixed with the script line when there is one.
    pub fn engine(line: Option<usize>, err: &EngineError) -> Self {
        let message = match line {
            Some(line) => format!("line {}: {}", line, err),
            None => err.to_string(),
        };
        let hint = match err {
            EngineError::Cycle(_) => Some("remove one of the references on the path"),
            EngineError::RangeTooLarge { .. } => Some("raise engine.max_range_cells in the settings file"),
            EngineError::OutOfBounds(_) => Some("raise engine.max_rows / engine.max_cols in the settings file"),
            EngineError::Poisoned(_) | EngineError::InternalConsistency(_) => {
                Some("the engine state can no longer be trusted; start over")
            }
            _ => None,
        };
        Self { code: EXIT_EVAL, message, hint: hint.map(str::to_string) }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    let Some(path) = path else {
        return Ok(Settings::load());
    };
    Settings::load_from(path).map_err(|e| match e {
        ConfigError::Io { .. } => CliError::io(e.to_string()),
        _ => CliError::args(e.to_string()),
    })
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(script: Option<PathBuf>, json: bool, settings: &Settings) -> Result<(), CliError> {
    let source = match &script {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError::io(e.to_string()))?;
            buf
        }
    };

    let mut engine = Engine::with_options(settings.engine.clone());
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let executed = script::run_script(&mut engine, &source, json, &mut handle)?;
    handle.flush().map_err(|e| CliError::io(e.to_string()))?;

    let stats = engine.stats();
    log::info!(
        "[run] {} statements  revision={}  evaluations={}",
        executed,
        engine.revision(),
        stats.evaluations
    );
    Ok(())
}

// ============================================================================
// calc
// ============================================================================

fn cmd_calc(formula: String, cells: Vec<String>, json: bool, settings: &Settings) -> Result<(), CliError> {
    let mut engine = Engine::with_options(settings.engine.clone());

    for seed in &cells {
        let (cell, input) = seed
            .split_once('=')
            .ok_or_else(|| CliError::args(format!("--cell expects CELL=INPUT, got '{}'", seed)))?;
        let addr = Address::parse(cell)
            .ok_or_else(|| CliError::args(format!("invalid cell reference: {}", cell)))?;
        engine
            .set_input(addr, input)
            .map_err(|e| CliError::engine(None, &e).with_hint(format!("while seeding {}", addr)))?;
    }

    let source = if formula.trim_start().starts_with('=') {
        formula
    } else {
        format!("={}", formula)
    };
    let value = engine
        .evaluate(&source)
        .map_err(|e| CliError::engine(None, &e))?;

    if json {
        println!("{}", json!({ "formula": source, "value": value }));
    } else {
        println!("{}", value);
    }

    if let RawValue::Error(kind) = value {
        // Formula error - result already on stdout, diagnostic to stderr
        let hint = match kind {
            ErrorKind::Ref => "a cell reference is outside the sheet",
            ErrorKind::Name => "unrecognized function name; run gcalc list-functions to see all available",
            ErrorKind::Value => "wrong argument type; check that referenced cells contain the expected data",
            ErrorKind::DivideByZero => "division by zero in your formula",
            ErrorKind::ArgCount => "a function was called with the wrong number of arguments",
            ErrorKind::Num => "a numeric result was out of range",
        };
        return Err(CliError::eval(format!("formula returned {}", kind)).with_hint(hint));
    }
    Ok(())
}

// ============================================================================
// list-functions
// ============================================================================

fn cmd_list_functions() -> Result<(), CliError> {
    let registry = FunctionRegistry::with_builtins();
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for name in registry.names() {
        writeln!(handle, "{}", name).map_err(|e| CliError::io(e.to_string()))?;
    }

    Ok(())
}
