//! # saf2xlsx
//!
//! Turn the monthly per-municipality tax-collection PDF report into a clean,
//! column-correct spreadsheet enriched with official municipality codes.
//!
//! The report is a loosely structured, multi-page PDF table: column counts
//! vary between pages, names and amounts end up fused in one cell, and some
//! rows slide one column to the left. This crate rebuilds the tables from
//! positioned text, repairs what can be repaired deterministically, joins the
//! registry codes and writes an `.xlsx` workbook.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Fetch     download {base}arrec{yy}{mmm}.pdf (or read a local file)
//!  ├─ 2. Extract   positioned text → tables via pdfium
//!  ├─ 3. Shape     every row forced to 7 columns
//!  ├─ 4. Filter    header repeats, blanks and totals removed
//!  ├─ 5. Split     "SALVADOR1.234,56" → "SALVADOR" + 1234.56
//!  ├─ 6. Realign   one-column left shifts repaired
//!  ├─ 7. Enrich    registry codes joined by normalised name
//!  └─ 8. Export    SAF_{yy}_{mmm}.xlsx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use saf2xlsx::{run_to_file, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder().year(2024).month(1).build()?;
//!     let (path, stats) = run_to_file(&config, ".").await?;
//!     eprintln!("{} rows → {}", stats.exported_rows, path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `saf2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! saf2xlsx = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDF engine
//!
//! Extraction needs the pdfium shared library. Set `PDFIUM_LIB_PATH` to the
//! library file (or its directory), or install it system-wide.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod run;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LayoutOptions, Period, PipelineConfig, PipelineConfigBuilder};
pub use error::{RowIssue, SafError};
pub use output::{PipelineOutput, RunStats};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use record::{Alignment, EnrichedRecord, RawTable, Record, ReferenceEntry};
pub use run::{process_tables, run, run_sync, run_to_file, run_with, save_output};
pub use schema::Column;
