// Scalar values produced by cells and formulas

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Runtime evaluation errors. These are data, not control flow: they are
/// stored as cell values and flow through dependent formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Wrong operand type, e.g. non-numeric text in arithmetic
    Value,
    /// Reference outside the sheet
    Ref,
    DivideByZero,
    /// Unknown function name
    Name,
    /// Argument-count mismatch
    ArgCount,
    /// Non-finite numeric result
    Num,
}

impl ErrorKind {
    pub fn token(&self) -> &'static str {
        match self {
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::DivideByZero => "#DIV/0!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::ArgCount => "#N/A",
            ErrorKind::Num => "#NUM!",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// The scalar primitive for all cell values.
///
/// `Empty` is what an unaddressed cell reads as; it is never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorKind),
}

impl PartialEq for RawValue {
    /// Numbers compare by total order so that a NaN result is not reported
    /// as a change on every recalculation.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawValue::Empty, RawValue::Empty) => true,
            (RawValue::Number(a), RawValue::Number(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (RawValue::Text(a), RawValue::Text(b)) => a == b,
            (RawValue::Boolean(a), RawValue::Boolean(b)) => a == b,
            (RawValue::Error(a), RawValue::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Boolean(b)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<ErrorKind> for RawValue {
    fn from(e: ErrorKind) -> Self {
        RawValue::Error(e)
    }
}

impl RawValue {
    /// Numeric coercion. Empty reads as 0, booleans as 1/0, numeric text
    /// parses; anything else is `#VALUE!`.
    pub fn to_number(&self) -> Result<f64, ErrorKind> {
        match self {
            RawValue::Number(n) => Ok(*n),
            RawValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            RawValue::Empty => Ok(0.0),
            RawValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(0.0);
                }
                t.parse::<f64>().map_err(|_| ErrorKind::Value)
            }
            RawValue::Error(e) => Err(*e),
        }
    }

    pub fn to_text(&self) -> Result<String, ErrorKind> {
        match self {
            RawValue::Error(e) => Err(*e),
            other => Ok(other.display_text()),
        }
    }

    pub fn to_bool(&self) -> Result<bool, ErrorKind> {
        match self {
            RawValue::Boolean(b) => Ok(*b),
            RawValue::Number(n) => Ok(*n != 0.0),
            RawValue::Empty => Ok(false),
            RawValue::Text(s) => {
                let upper = s.trim().to_uppercase();
                if upper == "TRUE" {
                    Ok(true)
                } else if upper == "FALSE" {
                    Ok(false)
                } else {
                    Err(ErrorKind::Value)
                }
            }
            RawValue::Error(e) => Err(*e),
        }
    }

    /// Text form used for display and for `&` concatenation.
    pub fn display_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Number(n) => format_number(*n),
            RawValue::Text(s) => s.clone(),
            RawValue::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            RawValue::Error(e) => e.token().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RawValue::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Empty)
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            RawValue::Error(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
