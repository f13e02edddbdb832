//! Error types for the saf2xlsx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SafError`]: **Fatal**: the run cannot produce a spreadsheet at all
//!   (report download failed, PDF unreadable, zero tables found, bad
//!   configuration). Returned as `Err(SafError)` from the `run*` functions
//!   and never accompanied by partial output.
//!
//! * [`RowIssue`]: **Non-fatal**: a single row could not be fully repaired
//!   (unresolved column shift) or a single cell could not be parsed. Issues
//!   are collected into [`crate::output::RunStats`] and the batch carries on.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the saf2xlsx library.
///
/// Row-level problems use [`RowIssue`] and are stored in
/// [`crate::output::RunStats`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SafError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Local report file was not found at the given path.
    #[error("Report file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Report or registry download failed (network error or non-2xx status).
    #[error("Failed to download '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// Report or registry download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    FetchTimeout { url: String, secs: u64 },

    /// The bytes received are not a PDF document.
    #[error("Report is not a valid PDF (first bytes: {magic:?})\nThe report may not be published yet for this period.")]
    NotAPdf { magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF yielded no tables, or the table engine failed.
    #[error("Table extraction failed: {0}")]
    Extraction(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Registry errors ───────────────────────────────────────────────────
    /// The registry page was fetched but its table could not be located.
    #[error("Registry page has an unexpected layout: {0}")]
    RegistryFormat(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Spreadsheet serialisation failed.
    #[error("Failed to build spreadsheet: {0}")]
    ExportFailed(String),

    /// Could not create or write the output spreadsheet file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SafError {
    /// Map a `reqwest` failure for `url` to the matching fetch error.
    pub(crate) fn from_reqwest(url: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SafError::FetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SafError::FetchFailed {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// A non-fatal problem with a single row.
///
/// Collected per run; the row is either dropped (`Schema`) or kept with a
/// null cell (`Parse`).
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum RowIssue {
    /// Realignment could not recover a year-to-date total; row dropped.
    #[error("Row '{municipality}' (page {page}): {detail}")]
    Schema {
        page: usize,
        municipality: String,
        detail: String,
    },

    /// A numeric cell could not be parsed even after cleanup; value nulled.
    #[error("Row '{municipality}' (page {page}): column {column} has unparsable value {raw:?}")]
    Parse {
        page: usize,
        municipality: String,
        column: String,
        raw: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_timeout_display() {
        let e = SafError::FetchTimeout {
            url: "https://example.org/arrec24jan.pdf".into(),
            secs: 60,
        };
        let msg = e.to_string();
        assert!(msg.contains("60s"), "got: {msg}");
        assert!(msg.contains("arrec24jan.pdf"));
    }

    #[test]
    fn extraction_display() {
        let e = SafError::Extraction("no tables found in 3 pages".into());
        assert!(e.to_string().contains("no tables found"));
    }

    #[test]
    fn not_a_pdf_display() {
        let e = SafError::NotAPdf {
            magic: b"<htm".to_vec(),
        };
        assert!(e.to_string().contains("not a valid PDF"));
    }

    #[test]
    fn schema_issue_display() {
        let issue = RowIssue::Schema {
            page: 2,
            municipality: "ILHEUS".into(),
            detail: "year-to-date total missing after shift".into(),
        };
        let msg = issue.to_string();
        assert!(msg.contains("ILHEUS"));
        assert!(msg.contains("page 2"));
    }

    #[test]
    fn parse_issue_roundtrips_through_json() {
        let issue = RowIssue::Parse {
            page: 1,
            municipality: "SALVADOR".into(),
            column: "IPVA".into(),
            raw: "12,3x".into(),
        };
        let json = serde_json::to_string(&issue).unwrap();
        let back: RowIssue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, issue);
    }
}
