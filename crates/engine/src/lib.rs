pub mod address;
pub mod cell;
pub mod dep_graph;
pub mod engine;
pub mod error;
pub mod events;
pub mod formula;
pub mod history;
pub mod options;
pub mod recalc;
pub mod shared;
pub mod store;

pub use address::{Address, Range};
pub use cell::{Cell, CellInput, FormulaCell};
pub use engine::{Engine, EngineStats};
pub use error::{EngineError, SyntaxError};
pub use events::{
    CellsChangedEvent, EngineEvent, EventCallback, EventCollector, RevisionCause, RevisionChangedEvent,
};
pub use formula::functions::{Arg, Arity, FunctionRegistry};
pub use formula::value::{ErrorKind, RawValue};
pub use options::EngineOptions;
pub use recalc::{CellChange, CycleError, RecalcReport};
pub use shared::SharedEngine;
