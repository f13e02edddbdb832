//! Noise filtering: drop rows that are not municipality data.
//!
//! A row is noise when its municipality cell
//! - is missing or blank,
//! - repeats the column header (or the month header fragment), or
//! - contains any [`DENY_LIST`] term, case-insensitively.
//!
//! Each predicate looks at one row only, so the order they run in does not
//! change the surviving set.

use crate::config::Period;
use crate::record::ShapedRow;
use crate::schema::{Column, DENY_LIST, HEADER_LABEL};
use tracing::debug;

/// Why a row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    Blank,
    Header,
    DenyListed(&'static str),
}

/// Classify a row; `None` means it is data.
pub fn classify(row: &ShapedRow, period: Option<&Period>) -> Option<NoiseKind> {
    let name = match row.get(Column::Municipality).map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => return Some(NoiseKind::Blank),
    };
    let upper = name.to_uppercase();

    if upper == HEADER_LABEL || period.is_some_and(|p| upper == p.month_name()) {
        return Some(NoiseKind::Header);
    }

    DENY_LIST
        .iter()
        .find(|term| upper.contains(**term))
        .map(|term| NoiseKind::DenyListed(*term))
}

/// Keep only data rows. Returns the survivors and the number dropped.
pub fn retain_data_rows(rows: Vec<ShapedRow>, period: Option<&Period>) -> (Vec<ShapedRow>, usize) {
    let before = rows.len();
    let kept: Vec<ShapedRow> = rows
        .into_iter()
        .filter(|row| match classify(row, period) {
            None => true,
            Some(kind) => {
                debug!(
                    "Dropping noise row on page {} ({:?}): {:?}",
                    row.page,
                    kind,
                    row.get(Column::Municipality)
                );
                false
            }
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
