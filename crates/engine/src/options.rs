use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Engine limits. Loaded from the `engine` section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Number of addressable rows.
    pub max_rows: usize,
    /// Number of addressable columns.
    pub max_cols: usize,
    /// Largest range a single formula reference may cover.
    pub max_range_cells: usize,
    /// Undo depth. `None` keeps every command.
    pub history_limit: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_rows: 1_048_576,
            max_cols: 16_384,
            max_range_cells: 1_000_000,
            history_limit: None,
        }
    }
}

impl EngineOptions {
    pub fn in_bounds(&self, addr: Address) -> bool {
        addr.row < self.max_rows && addr.col < self.max_cols
    }
}
