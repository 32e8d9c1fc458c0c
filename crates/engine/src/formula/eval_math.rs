// Math functions: SUM, AVERAGE, MIN, MAX, COUNT, COUNTA, PRODUCT, MEDIAN,
// ABS, ROUND, INT, MOD, POWER, SQRT

use ordered_float::OrderedFloat;

use super::eval::modulo;
use super::functions::{arg_number, collect_numbers, num_result, Arg, Arity, FunctionRegistry};
use super::value::{ErrorKind, RawValue};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register("SUM", Arity::at_least(1), |args| {
        match collect_numbers(args) {
            Ok(vals) => num_result(vals.iter().sum()),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("AVERAGE", Arity::at_least(1), |args| {
        match collect_numbers(args) {
            Ok(vals) => {
                if vals.is_empty() {
                    RawValue::Error(ErrorKind::DivideByZero)
                } else {
                    num_result(vals.iter().sum::<f64>() / vals.len() as f64)
                }
            }
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("MIN", Arity::at_least(1), |args| {
        match collect_numbers(args) {
            Ok(vals) if vals.is_empty() => RawValue::Number(0.0),
            Ok(vals) => RawValue::Number(vals.iter().cloned().fold(f64::INFINITY, f64::min)),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("MAX", Arity::at_least(1), |args| {
        match collect_numbers(args) {
            Ok(vals) if vals.is_empty() => RawValue::Number(0.0),
            Ok(vals) => RawValue::Number(vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
            Err(e) => RawValue::Error(e),
        }
    });

    // COUNT never fails: it counts what is numeric and skips the rest,
    // errors included
    registry.register_error_aware("COUNT", Arity::at_least(1), |args| {
        let mut count = 0usize;
        for arg in args {
            match arg {
                Arg::Value(RawValue::Empty) | Arg::Value(RawValue::Error(_)) => {}
                Arg::Value(v) => {
                    if v.to_number().is_ok() {
                        count += 1;
                    }
                }
                Arg::Range(range) => {
                    count += range.iter().filter(|v| matches!(v, RawValue::Number(_))).count();
                }
            }
        }
        RawValue::Number(count as f64)
    });

    registry.register_error_aware("COUNTA", Arity::at_least(1), |args| {
        let count: usize = args
            .iter()
            .map(|arg| arg.values().filter(|v| !v.is_empty()).count())
            .sum();
        RawValue::Number(count as f64)
    });

    registry.register("PRODUCT", Arity::at_least(1), |args| {
        match collect_numbers(args) {
            Ok(vals) if vals.is_empty() => RawValue::Number(0.0),
            Ok(vals) => num_result(vals.iter().product()),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("MEDIAN", Arity::at_least(1), |args| {
        let mut vals: Vec<OrderedFloat<f64>> = match collect_numbers(args) {
            Ok(vals) => vals.into_iter().map(OrderedFloat).collect(),
            Err(e) => return RawValue::Error(e),
        };
        if vals.is_empty() {
            return RawValue::Error(ErrorKind::Num);
        }
        vals.sort_unstable();
        let mid = vals.len() / 2;
        if vals.len() % 2 == 0 {
            num_result((vals[mid - 1].0 + vals[mid].0) / 2.0)
        } else {
            RawValue::Number(vals[mid].0)
        }
    });

    registry.register("ABS", Arity::exactly(1), |args| {
        match arg_number(&args[0]) {
            Ok(n) => RawValue::Number(n.abs()),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("ROUND", Arity::between(1, 2), |args| {
        let n = match arg_number(&args[0]) {
            Ok(n) => n,
            Err(e) => return RawValue::Error(e),
        };
        let digits = match args.get(1).map(arg_number) {
            Some(Ok(d)) => d.trunc().clamp(-308.0, 308.0) as i32,
            Some(Err(e)) => return RawValue::Error(e),
            None => 0,
        };
        // f64::round is half-away-from-zero
        if digits >= 0 {
            let factor = 10f64.powi(digits);
            let scaled = n * factor;
            // Already integral at this precision
            if scaled.abs() >= 2f64.powi(52) {
                return RawValue::Number(n);
            }
            num_result(scaled.round() / factor)
        } else {
            let factor = 10f64.powi(-digits);
            num_result((n / factor).round() * factor)
        }
    });

    registry.register("INT", Arity::exactly(1), |args| {
        match arg_number(&args[0]) {
            Ok(n) => RawValue::Number(n.floor()),
            Err(e) => RawValue::Error(e),
        }
    });

    registry.register("MOD", Arity::exactly(2), |args| {
        let n = match arg_number(&args[0]) {
            Ok(n) => n,
            Err(e) => return RawValue::Error(e),
        };
        let d = match arg_number(&args[1]) {
            Ok(d) => d,
            Err(e) => return RawValue::Error(e),
        };
        match modulo(n, d) {
            Some(m) => num_result(m),
            None => RawValue::Error(ErrorKind::DivideByZero),
        }
    });

    registry.register("POWER", Arity::exactly(2), |args| {
        match (arg_number(&args[0]), arg_number(&args[1])) {
            (Ok(base), Ok(exp)) => num_result(base.powf(exp)),
            (Err(e), _) | (_, Err(e)) => RawValue::Error(e),
        }
    });

    registry.register("SQRT", Arity::exactly(1), |args| {
        match arg_number(&args[0]) {
            Ok(n) if n < 0.0 => RawValue::Error(ErrorKind::Num),
            Ok(n) => RawValue::Number(n.sqrt()),
            Err(e) => RawValue::Error(e),
        }
    });
}
