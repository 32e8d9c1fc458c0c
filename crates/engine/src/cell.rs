use crate::formula::parser::Expr;
use crate::formula::value::RawValue;

/// A formula together with its parsed form and last evaluation result.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCell {
    pub source: String,
    pub ast: Expr,
    /// Valid evaluation output whenever `dirty` is false.
    pub cached: RawValue,
    /// Set when an upstream dependency changed, cleared after re-evaluation.
    pub dirty: bool,
}

impl FormulaCell {
    /// A freshly parsed formula, not yet evaluated.
    pub fn new(source: impl Into<String>, ast: Expr) -> Self {
        Self {
            source: source.into(),
            ast,
            cached: RawValue::Empty,
            dirty: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Value(RawValue),
    Formula(FormulaCell),
}

impl Cell {
    /// Current value: the literal, the cached formula result, or `Empty`.
    pub fn value(&self) -> RawValue {
        match self {
            Cell::Empty => RawValue::Empty,
            Cell::Value(v) => v.clone(),
            Cell::Formula(f) => f.cached.clone(),
        }
    }

    pub fn formula(&self) -> Option<&str> {
        match self {
            Cell::Formula(f) => Some(&f.source),
            _ => None,
        }
    }

    pub fn ast(&self) -> Option<&Expr> {
        match self {
            Cell::Formula(f) => Some(&f.ast),
            _ => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Cell::Formula(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// Raw user input, classified the way a spreadsheet grid interprets typing.
#[derive(Debug, Clone, PartialEq)]
pub enum CellInput {
    Clear,
    Value(RawValue),
    Formula(String),
}

impl CellInput {
    pub fn classify(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellInput::Clear;
        }

        if trimmed.starts_with('=') {
            return CellInput::Formula(trimmed.to_string());
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            if num.is_finite() {
                return CellInput::Value(RawValue::Number(num));
            }
        }

        match trimmed.to_uppercase().as_str() {
            "TRUE" => CellInput::Value(RawValue::Boolean(true)),
            "FALSE" => CellInput::Value(RawValue::Boolean(false)),
            _ => CellInput::Value(RawValue::Text(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parser::parse;

    #[test]
    fn test_classify_input() {
        assert_eq!(CellInput::classify("  "), CellInput::Clear);
        assert_eq!(CellInput::classify("42"), CellInput::Value(RawValue::Number(42.0)));
        assert_eq!(CellInput::classify("-1.5e2"), CellInput::Value(RawValue::Number(-150.0)));
        assert_eq!(CellInput::classify("true"), CellInput::Value(RawValue::Boolean(true)));
        assert_eq!(CellInput::classify("hello"), CellInput::Value(RawValue::from("hello")));
        assert_eq!(CellInput::classify(" =A1+1 "), CellInput::Formula("=A1+1".to_string()));
    }

    #[test]
    fn test_inf_text_stays_text() {
        assert_eq!(CellInput::classify("inf"), CellInput::Value(RawValue::from("inf")));
    }

    #[test]
    fn test_cell_accessors() {
        assert_eq!(Cell::Empty.value(), RawValue::Empty);
        assert_eq!(Cell::Value(RawValue::Number(1.0)).value(), RawValue::Number(1.0));

        let mut formula = FormulaCell::new("=1+1", parse("=1+1").unwrap());
        assert!(formula.dirty);
        formula.cached = RawValue::Number(2.0);
        formula.dirty = false;
        let cell = Cell::Formula(formula);
        assert_eq!(cell.value(), RawValue::Number(2.0));
        assert_eq!(cell.formula(), Some("=1+1"));
        assert!(cell.is_formula());
        assert!(Cell::Empty.formula().is_none());
    }
}
