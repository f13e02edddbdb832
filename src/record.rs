//! Row types flowing through the pipeline.
//!
//! ```text
//! RawTable ──▶ ShapedRow ──▶ Record ──▶ EnrichedRecord
//! (extract)    (shape)       (split +    (enrich)
//!                             realign)
//! ```

use crate::schema::{Column, COLUMN_COUNT};
use serde::{Deserialize, Serialize};

/// One table region extracted from a PDF page.
///
/// Rows may have different lengths; whitespace-only cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// 1-indexed page the table was found on.
    pub page: usize,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(page: usize, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { page, rows }
    }

    /// Build a table from string literals; empty strings become `None`.
    ///
    /// Mostly useful for fixtures.
    pub fn from_strs(page: usize, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| clean_cell(cell)).collect())
            .collect();
        Self { page, rows }
    }

    /// Widest row in the table.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Trim a cell and map blank text to `None`.
pub fn clean_cell(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A row forced to the 7-column schema; cells are still raw text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapedRow {
    pub page: usize,
    pub cells: [Option<String>; COLUMN_COUNT],
}

impl ShapedRow {
    pub fn get(&self, column: Column) -> Option<&str> {
        self.cells[column.index()].as_deref()
    }
}

/// Where a record stands with respect to column realignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    /// Not yet inspected.
    #[default]
    Pending,
    /// Already carried a year-to-date total; left untouched.
    Aligned,
    /// Shifted one column to the right and now complete.
    Shifted,
    /// Shifted once but still missing the year-to-date total.
    Unresolved,
}

/// One logical report row after shaping and cell splitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub page: usize,
    pub municipality: String,
    pub icms: Option<f64>,
    pub ipva: Option<f64>,
    pub itd: Option<f64>,
    pub fees: Option<f64>,
    pub month_total: Option<f64>,
    pub year_to_date_total: Option<f64>,
    /// Number the cell splitter pulled out of the municipality cell.
    pub recovered: Option<f64>,
    pub alignment: Alignment,
}

impl Record {
    /// A record is complete once it carries a year-to-date total.
    pub fn is_complete(&self) -> bool {
        self.year_to_date_total.is_some()
    }

    /// Value of a numeric column; `None` for [`Column::Municipality`].
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::Municipality => None,
            Column::Icms => self.icms,
            Column::Ipva => self.ipva,
            Column::Itd => self.itd,
            Column::Fees => self.fees,
            Column::MonthTotal => self.month_total,
            Column::YtdTotal => self.year_to_date_total,
        }
    }

    pub(crate) fn set_value(&mut self, column: Column, value: Option<f64>) {
        match column {
            Column::Municipality => {}
            Column::Icms => self.icms = value,
            Column::Ipva => self.ipva = value,
            Column::Itd => self.itd = value,
            Column::Fees => self.fees = value,
            Column::MonthTotal => self.month_total = value,
            Column::YtdTotal => self.year_to_date_total = value,
        }
    }
}

/// An entry of the external municipality registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub name: String,
    pub code: String,
}

impl ReferenceEntry {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

/// A record joined against the registry. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub municipality: String,
    pub icms: Option<f64>,
    pub ipva: Option<f64>,
    pub itd: Option<f64>,
    pub fees: Option<f64>,
    pub month_total: Option<f64>,
    pub year_to_date_total: Option<f64>,
    pub code: Option<String>,
}

impl EnrichedRecord {
    pub fn from_record(record: Record, code: Option<String>) -> Self {
        Self {
            municipality: record.municipality,
            icms: record.icms,
            ipva: record.ipva,
            itd: record.itd,
            fees: record.fees,
            month_total: record.month_total,
            year_to_date_total: record.year_to_date_total,
            code,
        }
    }

    /// Numeric values in export column order (ICMS … YTD_TOTAL).
    pub fn values(&self) -> [Option<f64>; COLUMN_COUNT - 1] {
        [
            self.icms,
            self.ipva,
            self.itd,
            self.fees,
            self.month_total,
            self.year_to_date_total,
        ]
    }
}
