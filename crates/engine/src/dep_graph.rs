//! Dependency graph for formula cells.
//!
//! Tracks precedents (cells a formula reads) and dependents (cells that
//! read a given cell) for O(1) queries and incremental recomputation.
//!
//! # Edge Direction
//!
//! ```text
//! B → A  means  "B reads A"  (A is a precedent of B, B a dependent of A)
//! ```
//!
//! "What must be recomputed if I change X?" follows `succs` from X.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::address::Address;
use crate::recalc::CycleError;

/// Persistent dependency graph keyed by `Address`.
///
/// Maintains bidirectional adjacency:
/// - `preds[B]` = cells that B reads (precedents)
/// - `succs[A]` = cells that read A (dependents)
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** A ∈ preds[B] iff B ∈ succs[A].
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **Acyclic:** `set_dependencies` refuses any edge set that closes a cycle.
/// 4. **Atomic updates:** `replace_edges` is the only mutator that touches both maps.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    preds: FxHashMap<Address, FxHashSet<Address>>,
    succs: FxHashMap<Address, FxHashSet<Address>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells this formula cell reads.
    pub fn precedents(&self, cell: Address) -> impl Iterator<Item = Address> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Cells that read this cell.
    pub fn dependents(&self, cell: Address) -> impl Iterator<Item = Address> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Direct readers of `cell`, as a set.
    pub fn dependents_of(&self, cell: Address) -> FxHashSet<Address> {
        self.succs.get(&cell).cloned().unwrap_or_default()
    }

    /// Every cell that reads `cell` directly or indirectly. Breadth-first
    /// over the reverse map, so the cost is bounded by the affected subgraph.
    pub fn transitive_dependents(&self, cell: Address) -> FxHashSet<Address> {
        let mut seen = FxHashSet::default();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(cell);

        while let Some(current) = queue.pop_front() {
            if let Some(deps) = self.succs.get(&current) {
                for &dep in deps {
                    if seen.insert(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        seen
    }

    pub fn formula_cell_count(&self) -> usize {
        self.preds.len()
    }

    pub fn referenced_cell_count(&self) -> usize {
        self.succs.len()
    }

    pub fn edge_count(&self) -> usize {
        self.preds.values().map(|s| s.len()).sum()
    }

    /// Replace the precedents of `cell`, refusing edge sets that would close
    /// a cycle. On error the graph is unchanged.
    pub fn set_dependencies(
        &mut self,
        cell: Address,
        new_refs: FxHashSet<Address>,
    ) -> Result<(), CycleError> {
        if let Some(path) = self.find_cycle(cell, &new_refs) {
            return Err(CycleError::new(path));
        }
        self.replace_edges(cell, new_refs);
        Ok(())
    }

    /// Replace all edges for a cell without cycle checking.
    ///
    /// 1. Removes the cell from all its old precedents' successor sets
    /// 2. Adds the cell to all new precedents' successor sets
    /// 3. Stores the new precedent set (or nothing, if empty)
    pub(crate) fn replace_edges(&mut self, cell: Address, new_preds: FxHashSet<Address>) {
        if let Some(old_preds) = self.preds.remove(&cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        if new_preds.is_empty() {
            return;
        }

        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(cell);
        }
        self.preds.insert(cell, new_preds);
    }

    /// Drop all outgoing edges of a cell (formula removed or cell cleared).
    pub fn clear_cell(&mut self, cell: Address) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Depth-first search from `cell` through its prospective precedents.
    ///
    /// `cell`'s current edges are ignored; every other node uses the
    /// committed graph. Reaching a node already on the recursion stack
    /// yields the path from that node back to itself. Neighbours are
    /// visited in address order so the reported path is deterministic.
    pub fn find_cycle(&self, cell: Address, new_refs: &FxHashSet<Address>) -> Option<Vec<Address>> {
        struct DfsFrame {
            cell: Address,
            neighbours: Vec<Address>,
            next_idx: usize,
        }

        let sorted_neighbours = |node: Address| -> Vec<Address> {
            let mut neighbours: Vec<Address> = if node == cell {
                new_refs.iter().copied().collect()
            } else {
                self.precedents(node).collect()
            };
            neighbours.sort_unstable();
            neighbours
        };

        let mut on_stack: FxHashSet<Address> = FxHashSet::default();
        let mut done: FxHashSet<Address> = FxHashSet::default();
        let mut path: Vec<Address> = vec![cell];
        let mut dfs_stack = vec![DfsFrame {
            cell,
            neighbours: sorted_neighbours(cell),
            next_idx: 0,
        }];
        on_stack.insert(cell);

        while let Some(frame) = dfs_stack.last_mut() {
            if frame.next_idx < frame.neighbours.len() {
                let next = frame.neighbours[frame.next_idx];
                frame.next_idx += 1;

                if on_stack.contains(&next) {
                    let start = path.iter().position(|c| *c == next).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                if done.contains(&next) {
                    continue;
                }

                on_stack.insert(next);
                path.push(next);
                dfs_stack.push(DfsFrame {
                    cell: next,
                    neighbours: sorted_neighbours(next),
                    next_idx: 0,
                });
            } else {
                let finished = frame.cell;
                dfs_stack.pop();
                path.pop();
                on_stack.remove(&finished);
                done.insert(finished);
            }
        }

        None
    }

    /// Topologically sort `cells` over the subgraph they induce: precedents
    /// before dependents, in-degree counting only edges whose source is in
    /// the set. Kahn's algorithm with address-ordered tie breaking.
    ///
    /// `Err` carries the cells left unconsumed, which only happens if the
    /// graph contains a cycle.
    pub fn topo_order(&self, cells: &FxHashSet<Address>) -> Result<Vec<Address>, Vec<Address>> {
        let mut in_degree: FxHashMap<Address, usize> = FxHashMap::default();
        for &cell in cells {
            let count = self.precedents(cell).filter(|p| cells.contains(p)).count();
            in_degree.insert(cell, count);
        }

        let mut queue: Vec<Address> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&cell, _)| cell)
            .collect();
        // Descending, so the smallest address is popped first
        queue.sort_unstable_by(|a, b| b.cmp(a));

        let mut result = Vec::with_capacity(cells.len());

        while let Some(cell) = queue.pop() {
            result.push(cell);

            let mut new_zero_degree = Vec::new();
            for dep in self.dependents(cell) {
                if let Some(deg) = in_degree.get_mut(&dep) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        new_zero_degree.push(dep);
                    }
                }
            }

            new_zero_degree.sort_unstable();
            for cell in new_zero_degree.into_iter().rev() {
                queue.push(cell);
            }
        }

        if result.len() < cells.len() {
            let consumed: FxHashSet<Address> = result.iter().copied().collect();
            let mut stuck: Vec<Address> = cells
                .iter()
                .filter(|c| !consumed.contains(c))
                .copied()
                .collect();
            stuck.sort_unstable();
            return Err(stuck);
        }

        Ok(result)
    }

    /// Exhaustive acyclicity check over every cell with precedents.
    pub fn is_acyclic(&self) -> bool {
        let cells: FxHashSet<Address> = self
            .preds
            .keys()
            .chain(self.succs.keys())
            .copied()
            .collect();
        self.topo_order(&cells).is_ok()
    }

    /// Edge symmetry and no empty sets.
    pub fn is_consistent(&self) -> bool {
        let forward = self.preds.iter().all(|(cell, preds)| {
            !preds.is_empty()
                && preds
                    .iter()
                    .all(|p| self.succs.get(p).map_or(false, |s| s.contains(cell)))
        });
        let reverse = self.succs.iter().all(|(cell, deps)| {
            !deps.is_empty()
                && deps
                    .iter()
                    .all(|d| self.preds.get(d).map_or(false, |s| s.contains(cell)))
        });
        forward && reverse
    }

    /// Check all invariants. Panics if any are violated.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (formula_cell, preds) in &self.preds {
            assert!(!preds.is_empty(), "Empty preds set stored for {}", formula_cell);
            for pred in preds {
                assert!(
                    self.succs.get(pred).map_or(false, |s| s.contains(formula_cell)),
                    "Missing succ edge: {} should have {} in dependents",
                    pred,
                    formula_cell
                );
            }
        }

        for (cell, dependents) in &self.succs {
            assert!(!dependents.is_empty(), "Empty succs set stored for {}", cell);
            for dep in dependents {
                assert!(
                    self.preds.get(dep).map_or(false, |s| s.contains(cell)),
                    "Missing pred edge: {} should have {} in precedents",
                    dep,
                    cell
                );
            }
        }

        assert!(self.is_acyclic(), "Dependency graph contains a cycle");
    }
}
