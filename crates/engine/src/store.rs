// Sparse cell storage: absent entries are semantically Empty

use rustc_hash::FxHashMap;

use crate::address::Address;
use crate::cell::{Cell, FormulaCell};
use crate::formula::eval::CellLookup;
use crate::formula::value::{ErrorKind, RawValue};
use crate::options::EngineOptions;

#[derive(Debug, Clone, Default)]
pub struct CellStore {
    cells: FxHashMap<Address, Cell>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: Address) -> Option<&Cell> {
        self.cells.get(&addr)
    }

    /// Snapshot of the cell at `addr` (`Cell::Empty` when absent).
    pub fn cell(&self, addr: Address) -> Cell {
        self.cells.get(&addr).cloned().unwrap_or_default()
    }

    pub fn value(&self, addr: Address) -> RawValue {
        self.cells.get(&addr).map(Cell::value).unwrap_or_default()
    }

    pub fn formula_mut(&mut self, addr: Address) -> Option<&mut FormulaCell> {
        match self.cells.get_mut(&addr) {
            Some(Cell::Formula(f)) => Some(f),
            _ => None,
        }
    }

    /// Replace the cell at `addr`, returning what was there. Storing
    /// `Cell::Empty` removes the entry.
    pub fn replace(&mut self, addr: Address, cell: Cell) -> Cell {
        let prior = match cell {
            Cell::Empty => self.cells.remove(&addr),
            cell => self.cells.insert(addr, cell),
        };
        prior.unwrap_or_default()
    }

    /// Occupied addresses in row-major order.
    pub fn addresses(&self) -> Vec<Address> {
        let mut addrs: Vec<Address> = self.cells.keys().copied().collect();
        addrs.sort_unstable();
        addrs
    }

    /// Addresses of formula cells, row-major.
    pub fn formula_addresses(&self) -> Vec<Address> {
        let mut addrs: Vec<Address> = self
            .cells
            .iter()
            .filter(|(_, cell)| cell.is_formula())
            .map(|(addr, _)| *addr)
            .collect();
        addrs.sort_unstable();
        addrs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Cell)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Evaluation context over the store: reads outside the sheet are `#REF!`.
pub struct SheetLookup<'a> {
    store: &'a CellStore,
    options: &'a EngineOptions,
}

impl<'a> SheetLookup<'a> {
    pub fn new(store: &'a CellStore, options: &'a EngineOptions) -> Self {
        Self { store, options }
    }
}

impl CellLookup for SheetLookup<'_> {
    fn value(&self, addr: Address) -> RawValue {
        if !self.options.in_bounds(addr) {
            return RawValue::Error(ErrorKind::Ref);
        }
        self.store.value(addr)
    }
}
