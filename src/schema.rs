//! Fixed report layout: the 7-column schema and the boilerplate deny-list.
//!
//! Both tables are immutable constants. The report format is not learned or
//! inferred at runtime; a new layout means a new release.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of positional fields every normalised row carries.
pub const COLUMN_COUNT: usize = 7;

/// Header text of the first column as printed in the report.
pub const HEADER_LABEL: &str = "MUNICÍPIOS";

/// Row labels that mark subtotal, total or section lines rather than data.
///
/// Matched as case-insensitive substrings of the municipality cell.
pub const DENY_LIST: &[&str] = &[
    "VALOR PRINCIPAL",
    "CORREÇÃO MONETÁRIA",
    "ACRÉS. MORAT. E/OU JUROS",
    "MULTA",
    "RECEITAS PREVIDENCIÁRIAS",
    "TOTAL GERAL",
    "TOTAIS -",
    "ARRECADAÇÃO",
];

/// A column of the canonical report schema, in positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Municipality,
    Icms,
    Ipva,
    Itd,
    Fees,
    MonthTotal,
    YtdTotal,
}

impl Column {
    /// All columns in report order.
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Municipality,
        Column::Icms,
        Column::Ipva,
        Column::Itd,
        Column::Fees,
        Column::MonthTotal,
        Column::YtdTotal,
    ];

    /// The six numeric columns, in report order.
    pub const NUMERIC: [Column; COLUMN_COUNT - 1] = [
        Column::Icms,
        Column::Ipva,
        Column::Itd,
        Column::Fees,
        Column::MonthTotal,
        Column::YtdTotal,
    ];

    /// Zero-based position in a normalised row.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical column name used in logs and the exported spreadsheet.
    pub fn name(self) -> &'static str {
        match self {
            Column::Municipality => "MUNICIPALITY",
            Column::Icms => "ICMS",
            Column::Ipva => "IPVA",
            Column::Itd => "ITD",
            Column::Fees => "FEES",
            Column::MonthTotal => "MONTH_TOTAL",
            Column::YtdTotal => "YTD_TOTAL",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
