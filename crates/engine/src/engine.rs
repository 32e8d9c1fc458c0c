//! The calculation engine facade.
//!
//! Every mutation runs to completion as one unit: store write, edge update
//! (with cycle check), incremental recalculation, history record, revision
//! bump, listener notification. Nothing is partially applied on error.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::address::Address;
use crate::cell::{Cell, CellInput, FormulaCell};
use crate::dep_graph::DepGraph;
use crate::error::EngineError;
use crate::events::{
    CellsChangedEvent, EngineEvent, EventCallback, RevisionCause, RevisionChangedEvent,
};
use crate::formula::eval::evaluate_formula;
use crate::formula::functions::FunctionRegistry;
use crate::formula::parser::parse;
use crate::formula::refs::extract_refs;
use crate::formula::value::{ErrorKind, RawValue};
use crate::history::{Command, CommandKind, History};
use crate::options::EngineOptions;
use crate::recalc::{CellChange, RecalcContext, RecalcReport};
use crate::store::{CellStore, SheetLookup};

/// Counters for instrumentation and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Formula evaluations performed by recalculation.
    pub evaluations: u64,
    /// Recalculation passes run.
    pub recalcs: u64,
    pub last_report: Option<RecalcReport>,
}

pub struct Engine {
    store: CellStore,
    graph: DepGraph,
    registry: FunctionRegistry,
    options: EngineOptions,
    history: History,
    revision: u64,
    stats: EngineStats,
    /// Set after an internal consistency failure; all mutations are refused.
    poisoned: Option<String>,
    listeners: Vec<EventCallback>,
    /// Queue events for the owner to deliver instead of calling listeners.
    defer_events: bool,
    pending_events: Vec<EngineEvent>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("cells", &self.store.len())
            .field("formulas", &self.graph.formula_cell_count())
            .field("revision", &self.revision)
            .field("poisoned", &self.poisoned)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Engine {
    /// An engine with the built-in functions and default limits.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self::with_registry(FunctionRegistry::with_builtins(), options)
    }

    /// An engine using a host-supplied function registry.
    pub fn with_registry(registry: FunctionRegistry, options: EngineOptions) -> Self {
        Self {
            store: CellStore::new(),
            graph: DepGraph::new(),
            registry,
            history: History::new(options.history_limit),
            options,
            revision: 0,
            stats: EngineStats::default(),
            poisoned: None,
            listeners: Vec::new(),
            defer_events: false,
            pending_events: Vec::new(),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Store a literal value. Storing `RawValue::Empty` clears the cell.
    pub fn set_value(&mut self, addr: Address, value: RawValue) -> Result<Vec<CellChange>, EngineError> {
        let cell = match value {
            RawValue::Empty => Cell::Empty,
            value => Cell::Value(value),
        };
        self.execute(CommandKind::SetValue, addr, cell)
    }

    /// Store a formula. Syntax errors, oversized ranges and cycles are
    /// rejected with the cell left exactly as it was.
    pub fn set_formula(&mut self, addr: Address, source: &str) -> Result<Vec<CellChange>, EngineError> {
        let source = source.trim();
        let ast = parse(source)?;
        self.execute(
            CommandKind::SetFormula,
            addr,
            Cell::Formula(FormulaCell::new(source, ast)),
        )
    }

    pub fn clear(&mut self, addr: Address) -> Result<Vec<CellChange>, EngineError> {
        self.execute(CommandKind::Clear, addr, Cell::Empty)
    }

    /// Interpret raw user input the way the grid does: `=...` is a formula,
    /// blank clears, numbers and TRUE/FALSE are typed, the rest is text.
    pub fn set_input(&mut self, addr: Address, input: &str) -> Result<Vec<CellChange>, EngineError> {
        match CellInput::classify(input) {
            CellInput::Clear => self.clear(addr),
            CellInput::Value(value) => self.set_value(addr, value),
            CellInput::Formula(source) => self.set_formula(addr, &source),
        }
    }

    pub fn undo(&mut self) -> Result<Vec<CellChange>, EngineError> {
        self.check_poisoned()?;
        let Some(command) = self.history.peek_undo().cloned() else {
            return Err(EngineError::NothingToUndo);
        };

        let (changes, _) = self.apply(command.address, command.before)?;
        self.history.undo();
        log::debug!("[engine] undo {} {}", command.kind.label(), command.address);
        self.commit(RevisionCause::Undo(command.kind), &changes);
        Ok(changes)
    }

    pub fn redo(&mut self) -> Result<Vec<CellChange>, EngineError> {
        self.check_poisoned()?;
        let Some(command) = self.history.peek_redo().cloned() else {
            return Err(EngineError::NothingToRedo);
        };

        let (changes, _) = self.apply(command.address, command.after)?;
        self.history.redo();
        log::debug!("[engine] redo {} {}", command.kind.label(), command.address);
        self.commit(RevisionCause::Redo(command.kind), &changes);
        Ok(changes)
    }

    /// Re-evaluate every formula in dependency order. For use after bulk
    /// loads; the revision only moves if some value changed.
    pub fn recalculate_all(&mut self) -> Result<Vec<CellChange>, EngineError> {
        self.check_poisoned()?;
        let result = RecalcContext {
            store: &mut self.store,
            graph: &self.graph,
            registry: &self.registry,
            options: &self.options,
        }
        .recalculate_all();

        let (changes, report) = self.absorb(result)?;
        log::info!("{}", report.log_line());
        if !changes.is_empty() {
            self.commit(RevisionCause::RecalculateAll, &changes);
        }
        Ok(changes)
    }

    fn execute(&mut self, kind: CommandKind, addr: Address, cell: Cell) -> Result<Vec<CellChange>, EngineError> {
        self.check_poisoned()?;
        let after = cell.clone();
        let (changes, before) = self.apply(addr, cell)?;
        log::debug!("[engine] {} {}", kind.label(), addr);
        self.history.record(Command {
            kind,
            address: addr,
            before,
            after,
        });
        self.commit(RevisionCause::Execute(kind), &changes);
        Ok(changes)
    }

    /// Write `cell` at `addr`, rewire its edges and recalculate.
    /// Returns the changed cells and the cell that was replaced.
    fn apply(&mut self, addr: Address, cell: Cell) -> Result<(Vec<CellChange>, Cell), EngineError> {
        if !self.options.in_bounds(addr) {
            return Err(EngineError::OutOfBounds(addr));
        }

        let refs = match cell.ast() {
            Some(ast) => extract_refs(ast, &self.options)?,
            None => FxHashSet::default(),
        };
        if let Err(err) = self.graph.set_dependencies(addr, refs) {
            log::warn!("[engine] rejected formula at {}: {}", addr, err);
            return Err(err.into());
        }

        let before = self.store.value(addr);
        let prior = self.store.replace(addr, cell);

        let result = RecalcContext {
            store: &mut self.store,
            graph: &self.graph,
            registry: &self.registry,
            options: &self.options,
        }
        .recalculate(addr, before);

        let (changes, _) = self.absorb(result)?;
        Ok((changes, prior))
    }

    /// Fold a recalculation result into the stats, poisoning the engine on
    /// internal consistency failure.
    fn absorb(
        &mut self,
        result: Result<(Vec<CellChange>, RecalcReport), EngineError>,
    ) -> Result<(Vec<CellChange>, RecalcReport), EngineError> {
        match result {
            Ok((changes, report)) => {
                self.stats.recalcs += 1;
                self.stats.evaluations += report.cells_evaluated as u64;
                self.stats.last_report = Some(report.clone());
                Ok((changes, report))
            }
            Err(EngineError::InternalConsistency(message)) => {
                log::error!("[engine] refusing further mutations: {}", message);
                self.poisoned = Some(message.clone());
                Err(EngineError::InternalConsistency(message))
            }
            Err(other) => Err(other),
        }
    }

    fn check_poisoned(&self) -> Result<(), EngineError> {
        match &self.poisoned {
            Some(reason) => Err(EngineError::Poisoned(reason.clone())),
            None => Ok(()),
        }
    }

    fn commit(&mut self, cause: RevisionCause, changes: &[CellChange]) {
        let previous = self.revision;
        self.revision += 1;

        if self.listeners.is_empty() && !self.defer_events {
            return;
        }
        let mut events = vec![EngineEvent::RevisionChanged(RevisionChangedEvent {
            revision: self.revision,
            previous,
            cause,
        })];
        if !changes.is_empty() {
            events.push(EngineEvent::CellsChanged(CellsChangedEvent {
                revision: self.revision,
                changes: changes.to_vec(),
            }));
        }
        if self.defer_events {
            self.pending_events.extend(events);
            return;
        }
        for event in &events {
            for listener in &self.listeners {
                listener(event);
            }
        }
    }

    /// Switch to queued delivery, handing back the listeners registered so
    /// far. Events then accumulate until `take_events`.
    pub(crate) fn defer_events(&mut self) -> Vec<EventCallback> {
        self.defer_events = true;
        std::mem::take(&mut self.listeners)
    }

    pub(crate) fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current value of a cell; `Empty` when unset, `#REF!` off the sheet.
    pub fn get_value(&self, addr: Address) -> RawValue {
        if !self.options.in_bounds(addr) {
            return RawValue::Error(ErrorKind::Ref);
        }
        self.store.value(addr)
    }

    pub fn get_formula(&self, addr: Address) -> Option<String> {
        self.store.get(addr).and_then(Cell::formula).map(str::to_string)
    }

    /// Snapshot of a cell.
    pub fn cell(&self, addr: Address) -> Cell {
        self.store.cell(addr)
    }

    /// Occupied cells in row-major order, for persistence layers.
    pub fn cells(&self) -> Vec<(Address, &Cell)> {
        self.store
            .addresses()
            .into_iter()
            .filter_map(|addr| self.store.get(addr).map(|cell| (addr, cell)))
            .collect()
    }

    /// Direct readers of `addr`.
    pub fn dependents(&self, addr: Address) -> FxHashSet<Address> {
        self.graph.dependents_of(addr)
    }

    /// Cells `addr` reads.
    pub fn precedents(&self, addr: Address) -> FxHashSet<Address> {
        self.graph.precedents(addr).collect()
    }

    pub fn transitive_dependents(&self, addr: Address) -> FxHashSet<Address> {
        self.graph.transitive_dependents(addr)
    }

    /// Evaluate a formula against the current sheet without storing it.
    pub fn evaluate(&self, source: &str) -> Result<RawValue, EngineError> {
        let ast = parse(source)?;
        let lookup = SheetLookup::new(&self.store, &self.options);
        Ok(evaluate_formula(&ast, &lookup, &self.registry))
    }

    /// Listeners run synchronously inside the mutation that fired them.
    pub fn subscribe(&mut self, listener: EventCallback) {
        self.listeners.push(listener);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Incremented once per committed mutation, undo and redo included.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = EngineStats::default();
    }

    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCollector;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn a(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn num(n: f64) -> RawValue {
        RawValue::Number(n)
    }

    #[test]
    fn test_set_value_and_formula() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(10.0)).unwrap();
        let changes = engine.set_formula(a("B1"), "=A1+5").unwrap();
        assert_eq!(changes, vec![CellChange::new(a("B1"), num(15.0))]);
        assert_eq!(engine.get_value(a("B1")), num(15.0));
        assert_eq!(engine.get_formula(a("B1")).as_deref(), Some("=A1+5"));
        assert_eq!(engine.get_formula(a("A1")), None);
        engine.graph().assert_consistent();
    }

    #[test]
    fn test_syntax_error_leaves_prior_formula() {
        let mut engine = Engine::new();
        engine.set_formula(a("A1"), "=1+1").unwrap();
        let err = engine.set_formula(a("A1"), "=1+").unwrap_err();
        assert!(matches!(err, EngineError::Syntax(_)));
        assert_eq!(engine.get_formula(a("A1")).as_deref(), Some("=1+1"));
        assert_eq!(engine.revision(), 1);
        assert!(engine.can_undo());
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let mut engine = Engine::new();
        engine.set_formula(a("A1"), "=B1+1").unwrap();
        let err = engine.set_formula(a("B1"), "=A1+1").unwrap_err();
        match err {
            EngineError::Cycle(cycle) => assert_eq!(cycle.path, vec![a("B1"), a("A1"), a("B1")]),
            other => panic!("expected cycle, got {:?}", other),
        }
        assert_eq!(engine.get_formula(a("B1")), None);
        assert_eq!(engine.cell(a("B1")), Cell::Empty);
        engine.graph().assert_consistent();
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(3.0)).unwrap();
        assert!(matches!(
            engine.set_formula(a("A1"), "=A1*2"),
            Err(EngineError::Cycle(_))
        ));
        assert_eq!(engine.get_value(a("A1")), num(3.0));
    }

    #[test]
    fn test_clear_reverts_to_empty() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(2.0)).unwrap();
        engine.set_formula(a("B1"), "=A1*2").unwrap();
        let changes = engine.clear(a("A1")).unwrap();
        assert_eq!(
            changes,
            vec![
                CellChange::new(a("A1"), RawValue::Empty),
                CellChange::new(a("B1"), num(0.0)),
            ]
        );
        assert!(engine.cells().iter().all(|(addr, _)| *addr != a("A1")));
    }

    #[test]
    fn test_clear_formula_drops_edges() {
        let mut engine = Engine::new();
        engine.set_formula(a("B1"), "=A1").unwrap();
        assert_eq!(engine.dependents(a("A1")).len(), 1);
        engine.clear(a("B1")).unwrap();
        assert!(engine.dependents(a("A1")).is_empty());
        engine.graph().assert_consistent();
    }

    #[test]
    fn test_set_input_classification() {
        let mut engine = Engine::new();
        engine.set_input(a("A1"), "42").unwrap();
        engine.set_input(a("A2"), "TRUE").unwrap();
        engine.set_input(a("A3"), "hello").unwrap();
        engine.set_input(a("A4"), "=A1*2").unwrap();
        assert_eq!(engine.get_value(a("A1")), num(42.0));
        assert_eq!(engine.get_value(a("A2")), RawValue::Boolean(true));
        assert_eq!(engine.get_value(a("A3")), RawValue::from("hello"));
        assert_eq!(engine.get_value(a("A4")), num(84.0));
        engine.set_input(a("A1"), "").unwrap();
        assert_eq!(engine.get_value(a("A1")), RawValue::Empty);
    }

    #[test]
    fn test_undo_redo_formula_restores_edges() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(1.0)).unwrap();
        engine.set_formula(a("B1"), "=A1+1").unwrap();
        engine.set_formula(a("B1"), "=C1").unwrap();
        assert!(engine.dependents(a("A1")).is_empty());

        engine.undo().unwrap();
        assert_eq!(engine.get_formula(a("B1")).as_deref(), Some("=A1+1"));
        assert_eq!(engine.get_value(a("B1")), num(2.0));
        assert!(engine.dependents(a("A1")).contains(&a("B1")));
        assert!(engine.dependents(a("C1")).is_empty());

        engine.redo().unwrap();
        assert_eq!(engine.get_formula(a("B1")).as_deref(), Some("=C1"));
        assert_eq!(engine.get_value(a("B1")), num(0.0));
        engine.graph().assert_consistent();
    }

    #[test]
    fn test_nothing_to_undo_or_redo() {
        let mut engine = Engine::new();
        assert_eq!(engine.undo(), Err(EngineError::NothingToUndo));
        assert_eq!(engine.redo(), Err(EngineError::NothingToRedo));
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(1.0)).unwrap();
        engine.undo().unwrap();
        assert!(engine.can_redo());
        engine.set_value(a("A2"), num(1.0)).unwrap();
        assert!(!engine.can_redo());
    }

    #[test]
    fn test_history_limit_from_options() {
        let mut engine = Engine::with_options(EngineOptions {
            history_limit: Some(1),
            ..EngineOptions::default()
        });
        engine.set_value(a("A1"), num(1.0)).unwrap();
        engine.set_value(a("A1"), num(2.0)).unwrap();
        engine.undo().unwrap();
        assert_eq!(engine.undo(), Err(EngineError::NothingToUndo));
        assert_eq!(engine.get_value(a("A1")), num(1.0));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut engine = Engine::with_options(EngineOptions {
            max_rows: 10,
            max_cols: 10,
            ..EngineOptions::default()
        });
        let far = Address::new(0, 10);
        assert_eq!(engine.set_value(far, num(1.0)), Err(EngineError::OutOfBounds(far)));
        assert_eq!(engine.get_value(far), RawValue::Error(ErrorKind::Ref));

        engine.set_formula(a("A1"), "=A11+1").unwrap();
        assert_eq!(engine.get_value(a("A1")), RawValue::Error(ErrorKind::Ref));
        assert!(engine.precedents(a("A1")).is_empty());
    }

    #[test]
    fn test_range_too_large_rejected() {
        let mut engine = Engine::with_options(EngineOptions {
            max_range_cells: 10,
            ..EngineOptions::default()
        });
        let err = engine.set_formula(a("C1"), "=SUM(A1:A11)").unwrap_err();
        assert!(matches!(err, EngineError::RangeTooLarge { cells: 11, .. }));
        assert_eq!(engine.cell(a("C1")), Cell::Empty);
        assert_eq!(engine.revision(), 0);
    }

    #[test]
    fn test_leaf_change_evaluates_nothing_else() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(1.0)).unwrap();
        engine.set_formula(a("B1"), "=A1*2").unwrap();
        engine.set_formula(a("C1"), "=B1*2").unwrap();
        engine.reset_stats();

        engine.set_value(a("Z1"), num(5.0)).unwrap();
        assert_eq!(engine.stats().evaluations, 0);

        engine.set_value(a("A1"), num(2.0)).unwrap();
        assert_eq!(engine.stats().evaluations, 2);
        assert_eq!(engine.get_value(a("C1")), num(8.0));
    }

    #[test]
    fn test_revision_and_events() {
        let mut engine = Engine::new();
        let collector = Arc::new(Mutex::new(EventCollector::new()));
        engine.subscribe(EventCollector::callback(&collector));

        engine.set_value(a("A1"), num(1.0)).unwrap();
        engine.set_value(a("A1"), num(1.0)).unwrap();
        engine.undo().unwrap();
        assert_eq!(engine.revision(), 3);

        let collector = collector.lock();
        assert_eq!(collector.revision_changed().len(), 3);
        // The repeated write changed nothing, and neither did undoing it
        let changed = collector.cells_changed();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].revision, 1);
        assert_eq!(changed[0].changes, vec![CellChange::new(a("A1"), num(1.0))]);
    }

    #[test]
    fn test_poisoned_after_internal_consistency_failure() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(1.0)).unwrap();
        // Corrupt the graph behind the cycle check's back: B1 and C1 read
        // each other, and B1 also reads A1
        engine.graph.replace_edges(a("B1"), [a("A1"), a("C1")].into_iter().collect());
        engine.graph.replace_edges(a("C1"), [a("B1")].into_iter().collect());

        let err = engine.set_value(a("A1"), num(2.0)).unwrap_err();
        assert!(matches!(err, EngineError::InternalConsistency(_)));
        assert!(engine.is_poisoned());

        assert!(matches!(engine.set_value(a("C1"), num(1.0)), Err(EngineError::Poisoned(_))));
        assert!(matches!(engine.undo(), Err(EngineError::Poisoned(_))));
        assert!(matches!(engine.recalculate_all(), Err(EngineError::Poisoned(_))));
    }

    #[test]
    fn test_recalculate_all_is_idempotent() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(3.0)).unwrap();
        engine.set_formula(a("B1"), "=A1*A1").unwrap();
        let revision = engine.revision();
        assert!(engine.recalculate_all().unwrap().is_empty());
        assert_eq!(engine.revision(), revision);
        assert_eq!(engine.stats().last_report.as_ref().map(|r| r.cells_evaluated), Some(1));
    }

    #[test]
    fn test_custom_function_registry() {
        let mut registry = FunctionRegistry::with_builtins();
        registry.register(
            "TWICE",
            crate::formula::functions::Arity::exactly(1),
            |args| match crate::formula::functions::arg_number(&args[0]) {
                Ok(n) => RawValue::Number(n * 2.0),
                Err(e) => RawValue::Error(e),
            },
        );
        let mut engine = Engine::with_registry(registry, EngineOptions::default());
        engine.set_value(a("A1"), num(21.0)).unwrap();
        engine.set_formula(a("B1"), "=twice(A1)").unwrap();
        assert_eq!(engine.get_value(a("B1")), num(42.0));
    }

    #[test]
    fn test_evaluate_without_storing() {
        let mut engine = Engine::new();
        engine.set_value(a("A1"), num(4.0)).unwrap();
        assert_eq!(engine.evaluate("=SQRT(A1)").unwrap(), num(2.0));
        assert_eq!(engine.revision(), 1);
    }
}
