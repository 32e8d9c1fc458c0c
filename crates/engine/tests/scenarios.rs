// End-to-end scenarios through the public engine API.

use gridcalc_engine::{Address, CellChange, Engine, EngineError, ErrorKind, RawValue};

fn a(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn num(n: f64) -> RawValue {
    RawValue::Number(n)
}

#[test]
fn formula_reads_value() {
    let mut engine = Engine::new();
    engine.set_value(a("A1"), num(10.0)).unwrap();
    engine.set_formula(a("B1"), "=A1+5").unwrap();
    assert_eq!(engine.get_value(a("B1")), num(15.0));
}

#[test]
fn range_sum_reports_only_changed_cells() {
    let mut engine = Engine::new();
    engine.set_value(a("A1"), num(1.0)).unwrap();
    engine.set_value(a("A2"), num(2.0)).unwrap();
    engine.set_value(a("A3"), num(3.0)).unwrap();
    engine.set_formula(a("C1"), "=SUM(A1:A3)").unwrap();
    assert_eq!(engine.get_value(a("C1")), num(6.0));

    let changes = engine.set_value(a("A2"), num(10.0)).unwrap();
    assert_eq!(
        changes,
        vec![
            CellChange::new(a("A2"), num(10.0)),
            CellChange::new(a("C1"), num(13.0)),
        ]
    );
}

#[test]
fn cycle_is_rejected_and_cell_stays_unset() {
    let mut engine = Engine::new();
    engine.set_formula(a("A1"), "=B1+1").unwrap();
    let err = engine.set_formula(a("B1"), "=A1+1").unwrap_err();
    match &err {
        EngineError::Cycle(cycle) => {
            assert_eq!(cycle.path.first(), Some(&a("B1")));
            assert_eq!(cycle.path.last(), Some(&a("B1")));
            assert!(cycle.path.contains(&a("A1")));
        }
        other => panic!("expected CycleError, got {:?}", other),
    }
    assert_eq!(err.code(), "cycle_error");
    assert_eq!(engine.get_formula(a("B1")), None);
    assert_eq!(engine.get_value(a("B1")), RawValue::Empty);
    assert!(engine.graph().is_acyclic());
}

#[test]
fn division_by_zero_propagates() {
    let mut engine = Engine::new();
    engine.set_formula(a("D1"), "=A1/0").unwrap();
    assert_eq!(engine.get_value(a("D1")), RawValue::Error(ErrorKind::DivideByZero));
    engine.set_formula(a("E1"), "=D1+1").unwrap();
    assert_eq!(engine.get_value(a("E1")), RawValue::Error(ErrorKind::DivideByZero));
    assert_eq!(engine.get_value(a("E1")).to_string(), "#DIV/0!");
}

#[test]
fn undo_twice_returns_to_unset() {
    let mut engine = Engine::new();
    engine.set_value(a("A1"), num(1.0)).unwrap();
    engine.set_value(a("A1"), num(2.0)).unwrap();
    engine.undo().unwrap();
    assert_eq!(engine.get_value(a("A1")), num(1.0));
    engine.undo().unwrap();
    assert_eq!(engine.get_value(a("A1")), RawValue::Empty);
    assert!(engine.cells().is_empty());
    assert_eq!(engine.undo(), Err(EngineError::NothingToUndo));
}

#[test]
fn error_recovers_when_input_fixed() {
    let mut engine = Engine::new();
    engine.set_value(a("A1"), num(0.0)).unwrap();
    engine.set_formula(a("B1"), "=10/A1").unwrap();
    engine.set_formula(a("C1"), "=B1*2").unwrap();
    assert_eq!(engine.get_value(a("C1")), RawValue::Error(ErrorKind::DivideByZero));

    let changes = engine.set_value(a("A1"), num(5.0)).unwrap();
    assert_eq!(changes.len(), 3);
    assert_eq!(engine.get_value(a("C1")), num(4.0));
}

#[test]
fn dependents_for_highlighting() {
    let mut engine = Engine::new();
    engine.set_formula(a("B1"), "=A1").unwrap();
    engine.set_formula(a("C1"), "=A1+B1").unwrap();
    engine.set_formula(a("D1"), "=C1").unwrap();

    let mut direct: Vec<Address> = engine.dependents(a("A1")).into_iter().collect();
    direct.sort();
    assert_eq!(direct, vec![a("B1"), a("C1")]);

    let mut all: Vec<Address> = engine.transitive_dependents(a("A1")).into_iter().collect();
    all.sort();
    assert_eq!(all, vec![a("B1"), a("C1"), a("D1")]);
}

#[test]
fn changed_cells_serialize_for_collaboration() {
    let mut engine = Engine::new();
    engine.set_value(a("A1"), num(2.0)).unwrap();
    let changes = engine.set_formula(a("B2"), "=A1*3").unwrap();
    let json = serde_json::to_string(&changes).unwrap();
    assert_eq!(json, r#"[{"address":"B2","value":{"type":"Number","value":6.0}}]"#);
}
