//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to be told when
//! each stage starts and finishes, and when the run degrades (for example the
//! registry could not be fetched).
//!
//! # Example
//!
//! ```rust
//! use saf2xlsx::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl PipelineProgressCallback for PrintStages {
//!     fn on_stage_complete(&self, stage: Stage, items: usize) {
//!         eprintln!("{stage}: {items}");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .year(2024)
//!     .month(1)
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A coarse step of the run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Download or read the PDF report.
    FetchReport,
    /// Pull raw tables out of the PDF.
    ExtractTables,
    /// Shape, filter, split and realign rows.
    Transform,
    /// Download and scrape the municipality registry.
    FetchRegistry,
    /// Join and serialise the spreadsheet.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::FetchReport => "fetch report",
            Stage::ExtractTables => "extract tables",
            Stage::Transform => "transform rows",
            Stage::FetchRegistry => "fetch registry",
            Stage::Export => "export spreadsheet",
        };
        f.write_str(label)
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes.
    ///
    /// # Arguments
    /// * `stage`: the finished stage
    /// * `items`: what the stage produced: bytes for `FetchReport`, tables
    ///   for `ExtractTables`, records for `Transform`, registry entries for
    ///   `FetchRegistry` and exported rows for `Export`
    fn on_stage_complete(&self, stage: Stage, items: usize) {
        let _ = (stage, items);
    }

    /// Called for non-fatal conditions worth surfacing to a user.
    fn on_warning(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
