//! Reference extraction from formula AST.
//!
//! Produces the set of cells a formula reads, for dependency graph
//! construction. Ranges are expanded to their member cells.

use rustc_hash::FxHashSet;

use crate::address::{Address, Range};
use crate::error::EngineError;
use crate::options::EngineOptions;

use super::parser::Expr;

/// Extract every cell an expression references.
///
/// References outside the sheet are skipped: they evaluate to `#REF!` and
/// can never change, so there is nothing to depend on. A range covering
/// more than `max_range_cells` cells is rejected; ranges that run off the
/// sheet are clipped to it.
pub fn extract_refs(expr: &Expr, options: &EngineOptions) -> Result<FxHashSet<Address>, EngineError> {
    let mut refs = FxHashSet::default();
    collect_refs(expr, options, &mut refs)?;
    Ok(refs)
}

fn collect_refs(
    expr: &Expr,
    options: &EngineOptions,
    refs: &mut FxHashSet<Address>,
) -> Result<(), EngineError> {
    match expr {
        Expr::Literal(_) => {}
        Expr::CellRef(addr) => {
            if options.in_bounds(*addr) {
                refs.insert(*addr);
            }
        }
        Expr::RangeRef(range) => collect_range(*range, options, refs)?,
        Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, options, refs)?;
            collect_refs(right, options, refs)?;
        }
        Expr::UnaryOp { operand, .. } => collect_refs(operand, options, refs)?,
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                collect_refs(arg, options, refs)?;
            }
        }
    }
    Ok(())
}

fn collect_range(
    range: Range,
    options: &EngineOptions,
    refs: &mut FxHashSet<Address>,
) -> Result<(), EngineError> {
    let cells = range.cell_count().unwrap_or(usize::MAX);
    if cells > options.max_range_cells {
        log::warn!(
            "[refs] range {} covers {} cells, limit is {}",
            range,
            cells,
            options.max_range_cells
        );
        return Err(EngineError::RangeTooLarge {
            range,
            cells,
            limit: options.max_range_cells,
        });
    }
    if let Some(clipped) = range.clip(options.max_cols, options.max_rows) {
        refs.extend(clipped.cells());
    }
    Ok(())
}
