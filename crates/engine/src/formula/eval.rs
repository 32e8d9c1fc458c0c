// Formula evaluator - walks an AST against a value lookup
//
// Evaluation is a pure function of the expression, the lookup and the
// registry: no mutation, no I/O. Errors are values and short-circuit through
// operators and (non error-aware) function calls, first-encountered wins.

use std::cmp::Ordering;

use crate::address::Address;

use super::functions::{num_result, Arg, FunctionRegistry, RangeValues};
use super::parser::{Expr, Op, UnaryOp};
use super::value::{ErrorKind, RawValue};

/// Source of cell values for the evaluator. Reading through this trait
/// rather than the cell store lets tests substitute any context.
pub trait CellLookup {
    fn value(&self, addr: Address) -> RawValue;
}

impl<F> CellLookup for F
where
    F: Fn(Address) -> RawValue,
{
    fn value(&self, addr: Address) -> RawValue {
        self(addr)
    }
}

/// Evaluate an expression.
pub fn evaluate<L: CellLookup>(expr: &Expr, lookup: &L, registry: &FunctionRegistry) -> RawValue {
    eval_expr(expr, lookup, registry)
}

/// Evaluate an expression as the value of a formula cell: a bare reference
/// to an empty cell shows as `0`.
pub fn evaluate_formula<L: CellLookup>(expr: &Expr, lookup: &L, registry: &FunctionRegistry) -> RawValue {
    match eval_expr(expr, lookup, registry) {
        RawValue::Empty => RawValue::Number(0.0),
        other => other,
    }
}

fn eval_expr(expr: &Expr, lookup: &dyn CellLookup, registry: &FunctionRegistry) -> RawValue {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::CellRef(addr) => lookup.value(*addr),
        // A range where a single value is expected
        Expr::RangeRef(_) => RawValue::Error(ErrorKind::Value),
        Expr::UnaryOp { op, operand } => {
            let v = eval_expr(operand, lookup, registry);
            if v.is_error() {
                return v;
            }
            match op {
                UnaryOp::Plus => v,
                UnaryOp::Neg => match v.to_number() {
                    Ok(n) => RawValue::Number(-n),
                    Err(e) => RawValue::Error(e),
                },
            }
        }
        Expr::BinaryOp { op, left, right } => {
            let l = eval_expr(left, lookup, registry);
            if l.is_error() {
                return l;
            }
            let r = eval_expr(right, lookup, registry);
            if r.is_error() {
                return r;
            }
            eval_binary(*op, &l, &r)
        }
        Expr::FunctionCall { name, args } => eval_function(name, args, lookup, registry),
    }
}

fn eval_function(
    name: &str,
    args: &[Expr],
    lookup: &dyn CellLookup,
    registry: &FunctionRegistry,
) -> RawValue {
    let Some(def) = registry.get(name) else {
        return RawValue::Error(ErrorKind::Name);
    };
    if !def.arity.accepts(args.len()) {
        return RawValue::Error(ErrorKind::ArgCount);
    }

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Expr::RangeRef(range) => {
                let cells = RangeValues::new(*range, lookup);
                // Range errors count at the range's position, before later args
                if !def.error_aware {
                    if let Some(err) = cells.iter().find(RawValue::is_error) {
                        return err;
                    }
                }
                values.push(Arg::Range(cells));
            }
            other => {
                let v = eval_expr(other, lookup, registry);
                if v.is_error() && !def.error_aware {
                    return v;
                }
                values.push(Arg::Value(v));
            }
        }
    }

    match def.call(&values) {
        RawValue::Number(n) => num_result(n),
        other => other,
    }
}

fn eval_binary(op: Op, l: &RawValue, r: &RawValue) -> RawValue {
    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Pow => {
            let a = match l.to_number() {
                Ok(n) => n,
                Err(e) => return RawValue::Error(e),
            };
            let b = match r.to_number() {
                Ok(n) => n,
                Err(e) => return RawValue::Error(e),
            };
            arithmetic(op, a, b)
        }
        Op::Concat => RawValue::Text(format!("{}{}", l.display_text(), r.display_text())),
        Op::Eq => RawValue::Boolean(compare_values(l, r) == Ordering::Equal),
        Op::NotEq => RawValue::Boolean(compare_values(l, r) != Ordering::Equal),
        Op::Lt => RawValue::Boolean(compare_values(l, r) == Ordering::Less),
        Op::Gt => RawValue::Boolean(compare_values(l, r) == Ordering::Greater),
        Op::LtEq => RawValue::Boolean(compare_values(l, r) != Ordering::Greater),
        Op::GtEq => RawValue::Boolean(compare_values(l, r) != Ordering::Less),
    }
}

fn arithmetic(op: Op, a: f64, b: f64) -> RawValue {
    let result = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => {
            if b == 0.0 {
                return RawValue::Error(ErrorKind::DivideByZero);
            }
            a / b
        }
        Op::Mod => match modulo(a, b) {
            Some(m) => m,
            None => return RawValue::Error(ErrorKind::DivideByZero),
        },
        Op::Pow => a.powf(b),
        _ => return RawValue::Error(ErrorKind::Value),
    };
    num_result(result)
}

/// Spreadsheet modulo: the result takes the sign of the divisor.
pub(crate) fn modulo(n: f64, d: f64) -> Option<f64> {
    if d == 0.0 {
        return None;
    }
    Some(n - d * (n / d).floor())
}

/// Compare two values for the comparison operators.
///
/// Blank compares as the zero value of the other side's type. Across types
/// the order is Number < Text < Boolean; text compares case-insensitively.
pub(crate) fn compare_values(a: &RawValue, b: &RawValue) -> Ordering {
    fn blank_like(other: &RawValue) -> RawValue {
        match other {
            RawValue::Text(_) => RawValue::Text(String::new()),
            RawValue::Boolean(_) => RawValue::Boolean(false),
            _ => RawValue::Number(0.0),
        }
    }

    fn type_rank(v: &RawValue) -> u8 {
        match v {
            RawValue::Number(_) | RawValue::Empty => 0,
            RawValue::Text(_) => 1,
            RawValue::Boolean(_) => 2,
            RawValue::Error(_) => 3,
        }
    }

    let a = if a.is_empty() { blank_like(b) } else { a.clone() };
    let b = if b.is_empty() { blank_like(&a) } else { b.clone() };

    let (rank_a, rank_b) = (type_rank(&a), type_rank(&b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match (&a, &b) {
        (RawValue::Number(x), RawValue::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (RawValue::Text(x), RawValue::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (RawValue::Boolean(x), RawValue::Boolean(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
