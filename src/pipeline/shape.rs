//! Shape normalisation: force every raw table onto the 7-column schema.
//!
//! Policy, applied per table:
//! 1. drop columns that are empty in every row;
//! 2. pad short rows on the right with nulls;
//! 3. truncate long rows to the first 7 cells.
//!
//! Truncation is lossy. Trailing columns beyond the seventh are treated as
//! extraction artefacts; a source table with more than 7 meaningful columns
//! will lose data here, which is a known limitation of the fixed layout.

use crate::record::{RawTable, ShapedRow};
use crate::schema::COLUMN_COUNT;
use tracing::debug;

/// Normalise one raw table into schema-shaped rows.
pub fn normalize_table(table: &RawTable) -> Vec<ShapedRow> {
    let width = table.width();
    let kept: Vec<usize> = (0..width)
        .filter(|&col| {
            table
                .rows
                .iter()
                .any(|row| matches!(row.get(col), Some(Some(cell)) if !cell.trim().is_empty()))
        })
        .collect();

    if kept.len() > COLUMN_COUNT {
        debug!(
            "Page {}: truncating {} non-empty columns to {}",
            table.page,
            kept.len(),
            COLUMN_COUNT
        );
    }

    table
        .rows
        .iter()
        .map(|row| {
            let mut shaped = ShapedRow {
                page: table.page,
                ..ShapedRow::default()
            };
            for (slot, &col) in shaped.cells.iter_mut().zip(kept.iter()) {
                *slot = row
                    .get(col)
                    .cloned()
                    .flatten()
                    .filter(|cell| !cell.trim().is_empty());
            }
            shaped
        })
        .collect()
}

/// Normalise every table, preserving document order.
pub fn normalize_tables(tables: &[RawTable]) -> Vec<ShapedRow> {
    tables.iter().flat_map(normalize_table).collect()
}
