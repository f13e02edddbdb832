//! Column realignment: repair rows that the extractor shifted one column left.
//!
//! When a row's leading numeric cell is empty (or fused into the name cell),
//! the extractor compacts the row and every value lands one column too far to
//! the left. A genuine data row always carries a year-to-date total, so a
//! missing `YTD_TOTAL` is the signal.
//!
//! ## Repair
//!
//! 1. shift `ICMS→IPVA`, `IPVA→ITD`, `ITD→FEES`, `FEES→MONTH_TOTAL`,
//!    `MONTH_TOTAL→YTD_TOTAL`;
//! 2. fill the vacated `ICMS` from the value the cell splitter recovered from
//!    the municipality cell, if any;
//! 3. if `IPVA` is still null, the recovered value parked in `ICMS` moves to
//!    `IPVA`, and `ICMS` is cleared when it holds that same value so it is not
//!    counted twice.
//!
//! The repair assumes a single-column shift. A row that still lacks a
//! year-to-date total afterwards is marked [`Alignment::Unresolved`]; larger
//! shifts are not guessed at.
//!
//! An aligned row can still carry a recovered value when its own `ICMS` cell
//! was empty; [`fill_recovered_icms`] puts it there.

use crate::record::{Alignment, Record};
use crate::schema::Column;
use tracing::debug;

/// Realign one record in place and return its new alignment state.
///
/// Only [`Alignment::Pending`] records are inspected; any other state is
/// returned unchanged, which makes the operation idempotent.
pub fn realign(record: &mut Record) -> Alignment {
    if record.alignment != Alignment::Pending {
        return record.alignment;
    }

    if record.is_complete() {
        record.alignment = Alignment::Aligned;
        return record.alignment;
    }

    // Step 1: move every numeric value one column to the right.
    for pair in Column::NUMERIC.windows(2).rev() {
        let (from, to) = (pair[0], pair[1]);
        record.set_value(to, record.value(from));
    }

    // Step 2: the vacated leading slot takes the recovered value.
    record.icms = record.recovered;

    // Step 3: no IPVA even after the shift.
    if record.ipva.is_none() {
        let parked = record.icms;
        record.ipva = parked;
        if parked.is_some() && record.icms == parked {
            record.icms = None;
        }
    }

    record.alignment = if record.is_complete() {
        Alignment::Shifted
    } else {
        Alignment::Unresolved
    };
    debug!(
        "Realigned '{}' on page {}: {:?}",
        record.municipality, record.page, record.alignment
    );
    record.alignment
}

/// Realign every record; returns how many were shifted and how many remain
/// unresolved.
pub fn realign_all(records: &mut [Record]) -> (usize, usize) {
    let mut shifted = 0;
    let mut unresolved = 0;
    for record in records.iter_mut() {
        let before = record.alignment;
        let after = realign(record);
        if before == Alignment::Pending {
            match after {
                Alignment::Shifted => shifted += 1,
                Alignment::Unresolved => unresolved += 1,
                _ => {}
            }
        }
    }
    (shifted, unresolved)
}

/// Give aligned records with an empty `ICMS` the value recovered from their
/// municipality cell. Returns how many records were filled.
///
/// Runs after [`realign_all`]; the other columns of an aligned record are
/// never touched.
pub fn fill_recovered_icms(records: &mut [Record]) -> usize {
    let mut filled = 0;
    for record in records
        .iter_mut()
        .filter(|r| r.alignment == Alignment::Aligned && r.icms.is_none())
    {
        if let Some(value) = record.recovered {
            record.icms = Some(value);
            filled += 1;
            debug!(
                "Page {}: ICMS for '{}' taken from the name cell",
                record.page, record.municipality
            );
        }
    }
    filled
}
