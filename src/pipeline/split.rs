//! Cell splitting: separate a municipality name from a number fused into the
//! same cell by the table extractor.
//!
//! When the extractor compacts a row whose first numeric cell touches the name
//! column, the municipality cell reads like `"SALVADOR1.234,56"`. Every
//! digit-led run of digits, separators and inner spaces is pulled out,
//! concatenated and parsed as one decimal-comma number. The value travels with
//! the record as `recovered` and is consumed by realignment.

use super::numeric::parse_decimal;
use crate::error::RowIssue;
use crate::record::{Record, ShapedRow};
use crate::schema::Column;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static RE_NUMBER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d.,\s]*").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Result of splitting a municipality cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCell {
    pub name: String,
    pub recovered: Option<f64>,
}

/// Split `text` into a cleaned name and an optional recovered number.
///
/// - no digit run: name unchanged (trimmed), no number;
/// - digit run that parses: runs removed from the name, number returned;
/// - digit run that does not parse: whole text kept as the name, no number.
pub fn split_cell(text: &str) -> SplitCell {
    let runs: Vec<&str> = RE_NUMBER_RUN.find_iter(text).map(|m| m.as_str()).collect();
    if runs.is_empty() {
        return SplitCell {
            name: text.trim().to_string(),
            recovered: None,
        };
    }

    let candidate = runs.concat();
    match parse_decimal(&candidate) {
        Some(value) => {
            let stripped = RE_NUMBER_RUN.replace_all(text, " ");
            let name = RE_SPACES.replace_all(stripped.trim(), " ").into_owned();
            if name.is_empty() {
                // A bare number is not a municipality; keep the text as-is.
                SplitCell {
                    name: text.trim().to_string(),
                    recovered: None,
                }
            } else {
                SplitCell {
                    name,
                    recovered: Some(value),
                }
            }
        }
        None => SplitCell {
            name: text.trim().to_string(),
            recovered: None,
        },
    }
}

/// Turn a shaped row into a [`Record`]: split the municipality cell and parse
/// the six numeric cells.
///
/// Cells that fail to parse become `None` and are reported as
/// [`RowIssue::Parse`]; the row itself is always kept.
pub fn to_record(row: &ShapedRow) -> (Record, Vec<RowIssue>) {
    let split = split_cell(row.get(Column::Municipality).unwrap_or_default());
    let mut record = Record {
        page: row.page,
        municipality: split.name,
        recovered: split.recovered,
        ..Record::default()
    };

    let mut issues = Vec::new();
    for column in Column::NUMERIC {
        let Some(raw) = row.get(column) else {
            continue;
        };
        let value = parse_decimal(raw);
        if value.is_none() {
            warn!(
                "Page {}: {} value {:?} for '{}' is not a number",
                row.page, column, raw, record.municipality
            );
            issues.push(RowIssue::Parse {
                page: row.page,
                municipality: record.municipality.clone(),
                column: column.name().to_string(),
                raw: raw.to_string(),
            });
        }
        record.set_value(column, value);
    }

    (record, issues)
}
