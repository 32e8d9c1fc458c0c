// Logical functions: IF, AND, OR, NOT, IFERROR, ISERROR, ISBLANK, ISNUMBER, ISTEXT

use super::functions::{Arg, Arity, FunctionRegistry};
use super::value::{ErrorKind, RawValue};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    // IF sees error arguments so that an error in the branch not taken
    // does not leak into the result.
    registry.register_error_aware("IF", Arity::between(2, 3), |args| {
        let condition = match args[0].scalar().to_bool() {
            Ok(b) => b,
            Err(e) => return RawValue::Error(e),
        };
        if condition {
            args[1].scalar()
        } else if let Some(otherwise) = args.get(2) {
            otherwise.scalar()
        } else {
            RawValue::Boolean(false)
        }
    });

    registry.register("AND", Arity::at_least(1), |args| {
        match truth_values(args) {
            Ok(vals) => RawValue::Boolean(vals.iter().all(|b| *b)),
            Err(e) => e,
        }
    });

    registry.register("OR", Arity::at_least(1), |args| {
        match truth_values(args) {
            Ok(vals) => RawValue::Boolean(vals.iter().any(|b| *b)),
            Err(e) => e,
        }
    });

    registry.register("NOT", Arity::exactly(1), |args| {
        match args[0].scalar().to_bool() {
            Ok(b) => RawValue::Boolean(!b),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register_error_aware("IFERROR", Arity::exactly(2), |args| {
        let value = args[0].scalar();
        if value.is_error() {
            args[1].scalar()
        } else {
            value
        }
    });

    registry.register_error_aware("ISERROR", Arity::exactly(1), |args| {
        RawValue::Boolean(args[0].scalar().is_error())
    });

    registry.register_error_aware("ISBLANK", Arity::exactly(1), |args| {
        RawValue::Boolean(matches!(args[0], Arg::Value(RawValue::Empty)))
    });

    registry.register_error_aware("ISNUMBER", Arity::exactly(1), |args| {
        RawValue::Boolean(matches!(args[0], Arg::Value(RawValue::Number(_))))
    });

    registry.register_error_aware("ISTEXT", Arity::exactly(1), |args| {
        RawValue::Boolean(matches!(args[0], Arg::Value(RawValue::Text(_))))
    });
}

/// Booleans for AND/OR. Direct arguments are coerced; inside ranges only
/// numbers and booleans count. With nothing countable the result is `#VALUE!`.
fn truth_values(args: &[Arg<'_>]) -> Result<Vec<bool>, RawValue> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Value(RawValue::Empty) => {}
            Arg::Value(v) => out.push(v.to_bool().map_err(RawValue::Error)?),
            Arg::Range(range) => {
                for v in range.iter() {
                    match v {
                        RawValue::Boolean(b) => out.push(b),
                        RawValue::Number(n) => out.push(n != 0.0),
                        RawValue::Error(e) => return Err(RawValue::Error(e)),
                        _ => {}
                    }
                }
            }
        }
    }
    if out.is_empty() {
        return Err(RawValue::Error(ErrorKind::Value));
    }
    Ok(out)
}
