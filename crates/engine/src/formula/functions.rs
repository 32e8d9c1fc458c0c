// Function registry: maps names to built-in (or host-supplied) implementations

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::address::Range;

use super::eval::CellLookup;
use super::value::{ErrorKind, RawValue};
use super::{eval_logical, eval_math, eval_text};

/// A function argument as seen by an implementation.
///
/// Range arguments are not materialized: `RangeValues` reads its cells
/// through the lookup as it is iterated, row-major.
pub enum Arg<'a> {
    Value(RawValue),
    Range(RangeValues<'a>),
}

pub struct RangeValues<'a> {
    range: Range,
    lookup: &'a dyn CellLookup,
}

impl<'a> RangeValues<'a> {
    pub fn new(range: Range, lookup: &'a dyn CellLookup) -> Self {
        Self { range, lookup }
    }

    pub fn iter(&self) -> impl Iterator<Item = RawValue> + '_ {
        self.range.cells().map(move |addr| self.lookup.value(addr))
    }
}

impl<'a> Arg<'a> {
    /// The argument as a single value. A range in scalar position is `#VALUE!`.
    pub fn scalar(&self) -> RawValue {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Range(_) => RawValue::Error(ErrorKind::Value),
        }
    }

    /// All values of the argument, flattening ranges.
    pub fn values(&self) -> Box<dyn Iterator<Item = RawValue> + '_> {
        match self {
            Arg::Value(v) => Box::new(std::iter::once(v.clone())),
            Arg::Range(r) => Box::new(r.iter()),
        }
    }
}

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

pub type FunctionImpl = Arc<dyn Fn(&[Arg<'_>]) -> RawValue + Send + Sync>;

#[derive(Clone)]
pub struct FunctionDef {
    pub name: String,
    pub arity: Arity,
    /// Error-aware functions receive error arguments instead of being
    /// short-circuited by them (ISERROR, IFERROR).
    pub error_aware: bool,
    imp: FunctionImpl,
}

impl FunctionDef {
    pub fn call(&self, args: &[Arg<'_>]) -> RawValue {
        (self.imp)(args)
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("error_aware", &self.error_aware)
            .finish()
    }
}

/// Lookup table of first-class functions. Host applications extend the
/// built-in set with `register` without touching the evaluator.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in aggregate, math, logical and text functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        eval_math::register(&mut registry);
        eval_logical::register(&mut registry);
        eval_text::register(&mut registry);
        registry
    }

    /// Register (or replace) a function. Names are case-insensitive.
    pub fn register<F>(&mut self, name: &str, arity: Arity, f: F)
    where
        F: Fn(&[Arg<'_>]) -> RawValue + Send + Sync + 'static,
    {
        self.insert(name, arity, false, Arc::new(f));
    }

    /// Register a function that wants to see error arguments.
    pub fn register_error_aware<F>(&mut self, name: &str, arity: Arity, f: F)
    where
        F: Fn(&[Arg<'_>]) -> RawValue + Send + Sync + 'static,
    {
        self.insert(name, arity, true, Arc::new(f));
    }

    fn insert(&mut self, name: &str, arity: Arity, error_aware: bool, imp: FunctionImpl) {
        let name = name.to_uppercase();
        self.functions.insert(
            name.clone(),
            FunctionDef {
                name,
                arity,
                error_aware,
                imp,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        match self.functions.get(name) {
            Some(def) => Some(def),
            None => self.functions.get(&name.to_uppercase()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

// =============================================================================
// Shared helpers for implementations
// =============================================================================

/// Wrap a numeric result, mapping NaN/infinity to `#NUM!`.
pub(crate) fn num_result(n: f64) -> RawValue {
    if n.is_finite() {
        RawValue::Number(n)
    } else {
        RawValue::Error(ErrorKind::Num)
    }
}

/// Coerce a scalar argument to a number.
pub(crate) fn arg_number(arg: &Arg<'_>) -> Result<f64, ErrorKind> {
    arg.scalar().to_number()
}

pub(crate) fn arg_text(arg: &Arg<'_>) -> Result<String, ErrorKind> {
    arg.scalar().to_text()
}

/// Numbers for aggregate functions.
///
/// Direct arguments are coerced (numeric text counts, other text is
/// `#VALUE!`, empty is skipped). Inside ranges only numbers count; text,
/// booleans and blanks are ignored. The first error encountered wins.
pub(crate) fn collect_numbers(args: &[Arg<'_>]) -> Result<Vec<f64>, ErrorKind> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Value(RawValue::Empty) => {}
            Arg::Value(v) => out.push(v.to_number()?),
            Arg::Range(range) => {
                for v in range.iter() {
                    match v {
                        RawValue::Number(n) => out.push(n),
                        RawValue::Error(e) => return Err(e),
                        _ => {}
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Every value across all arguments, ranges flattened. The first error wins.
pub(crate) fn collect_values(args: &[Arg<'_>]) -> Result<Vec<RawValue>, ErrorKind> {
    let mut out = Vec::new();
    for arg in args {
        for v in arg.values() {
            if let RawValue::Error(e) = v {
                return Err(e);
            }
            out.push(v);
        }
    }
    Ok(out)
}
