//! Run results: the spreadsheet, the exported records and per-run statistics.

use crate::error::RowIssue;
use crate::record::EnrichedRecord;
use serde::{Deserialize, Serialize};

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Suggested file name, `SAF_{yy}_{mmm}.xlsx`.
    pub filename: String,
    /// The `.xlsx` workbook.
    pub spreadsheet: Vec<u8>,
    /// Records exactly as written to the sheet, in document order.
    pub records: Vec<EnrichedRecord>,
    pub stats: RunStats,
}

/// Counters collected while a run moves through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Raw tables returned by the extractor.
    pub tables_extracted: usize,
    /// Rows across all tables, before filtering.
    pub rows_extracted: usize,
    /// Header, blank and deny-listed rows removed.
    pub noise_rows_dropped: usize,
    /// Records built from the surviving rows.
    pub records: usize,
    /// Records repaired by a one-column shift.
    pub rows_realigned: usize,
    /// Records dropped because realignment could not complete them.
    pub unresolved_rows: usize,
    /// Aligned records whose empty `ICMS` took the value fused into the name.
    pub icms_recovered: usize,
    /// Records with at least one unparsable numeric cell.
    pub rows_with_parse_errors: usize,
    /// Records dropped for lack of a registry code.
    pub unmatched_dropped: usize,
    /// The registry was unavailable (or skipped) and codes are absent.
    pub enrichment_degraded: bool,
    /// Rows written to the spreadsheet.
    pub exported_rows: usize,
    /// Every row-level problem seen during the run.
    pub issues: Vec<RowIssue>,

    pub fetch_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}
