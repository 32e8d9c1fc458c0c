// Text functions: CONCAT, CONCATENATE, LEFT, RIGHT, MID, LEN, UPPER, LOWER, TRIM

use super::functions::{arg_number, arg_text, collect_values, Arg, Arity, FunctionRegistry};
use super::value::{ErrorKind, RawValue};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for name in ["CONCAT", "CONCATENATE"] {
        registry.register(name, Arity::at_least(1), |args| {
            match collect_values(args) {
                Ok(vals) => RawValue::Text(vals.iter().map(RawValue::display_text).collect()),
                Err(e) => RawValue::Error(e),
            }
        });
    }

    registry.register("LEFT", Arity::between(1, 2), |args| {
        let (text, n) = match text_and_count(args) {
            Ok(pair) => pair,
            Err(e) => return RawValue::Error(e),
        };
        RawValue::Text(text.chars().take(n).collect())
    });

    registry.register("RIGHT", Arity::between(1, 2), |args| {
        let (text, n) = match text_and_count(args) {
            Ok(pair) => pair,
            Err(e) => return RawValue::Error(e),
        };
        let len = text.chars().count();
        RawValue::Text(text.chars().skip(len.saturating_sub(n)).collect())
    });

    // MID(text, start, count) with a 1-based start
    registry.register("MID", Arity::exactly(3), |args| {
        let text = match arg_text(&args[0]) {
            Ok(t) => t,
            Err(e) => return RawValue::Error(e),
        };
        let start = match arg_number(&args[1]) {
            Ok(s) if s >= 1.0 => s.trunc() as usize,
            Ok(_) => return RawValue::Error(ErrorKind::Value),
            Err(e) => return RawValue::Error(e),
        };
        let count = match arg_number(&args[2]) {
            Ok(c) if c >= 0.0 => c.trunc() as usize,
            Ok(_) => return RawValue::Error(ErrorKind::Value),
            Err(e) => return RawValue::Error(e),
        };
        RawValue::Text(text.chars().skip(start - 1).take(count).collect())
    });

    registry.register("LEN", Arity::exactly(1), |args| {
        match arg_text(&args[0]) {
            Ok(t) => RawValue::Number(t.chars().count() as f64),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("UPPER", Arity::exactly(1), |args| {
        match arg_text(&args[0]) {
            Ok(t) => RawValue::Text(t.to_uppercase()),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("LOWER", Arity::exactly(1), |args| {
        match arg_text(&args[0]) {
            Ok(t) => RawValue::Text(t.to_lowercase()),
            Err(e) => RawValue::Error(e),
        }
    });

    // Strips leading/trailing spaces and collapses inner runs to one space
    registry.register("TRIM", Arity::exactly(1), |args| {
        match arg_text(&args[0]) {
            Ok(t) => RawValue::Text(t.split_whitespace().collect::<Vec<_>>().join(" ")),
            Err(e) => RawValue::Error(e),
        }
    });
}

/// Text plus an optional non-negative character count (default 1), for LEFT/RIGHT.
fn text_and_count(args: &[Arg<'_>]) -> Result<(String, usize), ErrorKind> {
    let text = arg_text(&args[0])?;
    let n = match args.get(1) {
        Some(arg) => {
            let n = arg_number(arg)?;
            if n < 0.0 {
                return Err(ErrorKind::Value);
            }
            n.trunc() as usize
        }
        None => 1,
    };
    Ok((text, n))
}
