//! Line-oriented cell scripts.
//!
//! ```text
//! # comments and blank lines are skipped
//! set A1 10
//! set B1 =A1*2
//! get B1
//! formula B1
//! deps A1
//! clear A1
//! undo
//! redo
//! ```
//!
//! Each statement runs against one engine, in order. Mutations print the
//! cells they changed; with `--json` every statement prints one JSON object
//! per line instead. The first rejected statement stops the script.

use std::io::Write;

use gridcalc_engine::{Address, CellChange, Engine, RawValue};
use serde_json::json;

use crate::CliError;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Set(Address, String),
    Clear(Address),
    Get(Address),
    Formula(Address),
    Deps(Address),
    Undo,
    Redo,
}

impl Statement {
    fn op(&self) -> &'static str {
        match self {
            Statement::Set(..) => "set",
            Statement::Clear(_) => "clear",
            Statement::Get(_) => "get",
            Statement::Formula(_) => "formula",
            Statement::Deps(_) => "deps",
            Statement::Undo => "undo",
            Statement::Redo => "redo",
        }
    }
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Statement>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let stmt = match cmd.to_ascii_lowercase().as_str() {
        "set" => {
            let (addr, input) = match rest.split_once(char::is_whitespace) {
                Some((addr, input)) => (addr, input.trim()),
                None => (rest, ""),
            };
            Statement::Set(parse_addr(addr)?, input.to_string())
        }
        "clear" => Statement::Clear(single_addr(rest)?),
        "get" => Statement::Get(single_addr(rest)?),
        "formula" => Statement::Formula(single_addr(rest)?),
        "deps" => Statement::Deps(single_addr(rest)?),
        "undo" | "redo" if !rest.is_empty() => {
            return Err(format!("'{}' takes no arguments", cmd));
        }
        "undo" => Statement::Undo,
        "redo" => Statement::Redo,
        _ => return Err(format!("unknown command '{}'", cmd)),
    };
    Ok(Some(stmt))
}

fn parse_addr(s: &str) -> Result<Address, String> {
    if s.is_empty() {
        return Err("missing cell reference".to_string());
    }
    Address::parse(s).ok_or_else(|| format!("invalid cell reference '{}'", s))
}

fn single_addr(rest: &str) -> Result<Address, String> {
    if rest.split_whitespace().count() > 1 {
        return Err(format!("expected one cell reference, got '{}'", rest));
    }
    parse_addr(rest)
}

/// Run every statement of `source`. Returns the number of statements
/// executed.
pub fn run_script(
    engine: &mut Engine,
    source: &str,
    json: bool,
    out: &mut dyn Write,
) -> Result<usize, CliError> {
    let mut executed = 0;
    for (idx, text) in source.lines().enumerate() {
        let line = idx + 1;
        let stmt = match parse_line(text) {
            Ok(Some(stmt)) => stmt,
            Ok(None) => continue,
            Err(msg) => return Err(CliError::eval(format!("line {}: {}", line, msg))),
        };
        log::debug!("[script] line {}: {:?}", line, stmt);
        execute(engine, line, &stmt, json, out)?;
        executed += 1;
    }
    Ok(executed)
}

fn execute(
    engine: &mut Engine,
    line: usize,
    stmt: &Statement,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let changes = match stmt {
        Statement::Set(addr, input) => engine.set_input(*addr, input),
        Statement::Clear(addr) => engine.clear(*addr),
        Statement::Undo => engine.undo(),
        Statement::Redo => engine.redo(),
        Statement::Get(addr) => {
            let value = engine.get_value(*addr);
            return if json {
                emit_json(out, json!({ "line": line, "op": "get", "address": addr, "value": value }))
            } else {
                emit_text(out, &format!("{} = {}", addr, show(&value)))
            };
        }
        Statement::Formula(addr) => {
            let formula = engine.get_formula(*addr);
            return if json {
                emit_json(out, json!({ "line": line, "op": "formula", "address": addr, "formula": formula }))
            } else {
                emit_text(out, &format!("{}: {}", addr, formula.as_deref().unwrap_or("(no formula)")))
            };
        }
        Statement::Deps(addr) => {
            let mut dependents: Vec<Address> = engine.dependents(*addr).into_iter().collect();
            dependents.sort();
            let mut precedents: Vec<Address> = engine.precedents(*addr).into_iter().collect();
            precedents.sort();
            return if json {
                emit_json(
                    out,
                    json!({
                        "line": line,
                        "op": "deps",
                        "address": addr,
                        "precedents": precedents,
                        "dependents": dependents,
                    }),
                )
            } else {
                emit_text(
                    out,
                    &format!("{} <- [{}] -> [{}]", addr, join(&precedents), join(&dependents)),
                )
            };
        }
    };

    let changes = changes.map_err(|e| CliError::engine(Some(line), &e))?;
    if json {
        emit_json(out, json!({ "line": line, "op": stmt.op(), "changes": changes }))
    } else {
        emit_changes(out, &changes)
    }
}

fn emit_changes(out: &mut dyn Write, changes: &[CellChange]) -> Result<(), CliError> {
    for change in changes {
        emit_text(out, &format!("{} = {}", change.address, show(&change.value)))?;
    }
    Ok(())
}

fn emit_text(out: &mut dyn Write, text: &str) -> Result<(), CliError> {
    writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()))
}

fn emit_json(out: &mut dyn Write, value: serde_json::Value) -> Result<(), CliError> {
    writeln!(out, "{}", value).map_err(|e| CliError::io(e.to_string()))
}

fn show(value: &RawValue) -> String {
    match value {
        RawValue::Empty => "(empty)".to_string(),
        RawValue::Text(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

fn join(addrs: &[Address]) -> String {
    addrs.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
}
