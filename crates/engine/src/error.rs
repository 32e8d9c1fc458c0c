use thiserror::Error;

use crate::address::{Address, Range};
use crate::recalc::CycleError;

/// Malformed formula text. `position` is the 0-based character offset of
/// the offending token in the source, counting the leading `=`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at position {position})")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Errors returned synchronously by engine mutations. None of them leave a
/// partially applied change behind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("{0}")]
    Cycle(#[from] CycleError),

    #[error("Range {range} covers {cells} cells (limit {limit})")]
    RangeTooLarge { range: Range, cells: usize, limit: usize },

    #[error("Cell {0} is outside the sheet")]
    OutOfBounds(Address),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("Engine refuses mutations after an internal consistency error: {0}")]
    Poisoned(String),
}

impl EngineError {
    /// Stable machine-readable code for hosts relaying errors to clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Syntax(_) => "syntax_error",
            EngineError::Cycle(_) => "cycle_error",
            EngineError::RangeTooLarge { .. } => "range_too_large",
            EngineError::OutOfBounds(_) => "out_of_bounds",
            EngineError::NothingToUndo => "nothing_to_undo",
            EngineError::NothingToRedo => "nothing_to_redo",
            EngineError::InternalConsistency(_) => "internal_consistency",
            EngineError::Poisoned(_) => "poisoned",
        }
    }
}
