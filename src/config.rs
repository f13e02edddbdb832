//! Configuration types for a report-to-spreadsheet run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The report schema and deny-list are not part of
//! the configuration; they live as constants in [`crate::schema`].

use crate::error::SafError;
use crate::progress::PipelineProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default location of the monthly collection reports.
pub const DEFAULT_REPORT_BASE_URL: &str =
    "https://www.sefaz.ba.gov.br/docs/financas-publicas/arrecadacao/";

/// Default municipality registry page.
pub const DEFAULT_REGISTRY_URL: &str = "https://www.ibge.gov.br/explica/codigos-dos-municipios.php";

/// Default registry region (the `id` of the table header to scrape).
pub const DEFAULT_REGION: &str = "BA";

/// Some report hosts reject requests without a browser-like agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

/// Month abbreviations used in report URLs and file names, January first.
const MONTH_ABBREVS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Full month names as printed in report headers, January first.
const MONTH_NAMES: [&str; 12] = [
    "JANEIRO",
    "FEVEREIRO",
    "MARÇO",
    "ABRIL",
    "MAIO",
    "JUNHO",
    "JULHO",
    "AGOSTO",
    "SETEMBRO",
    "OUTUBRO",
    "NOVEMBRO",
    "DEZEMBRO",
];

/// The year/month a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    /// Create a period, validating a 4-digit year and a 1–12 month.
    pub fn new(year: u16, month: u8) -> Result<Self, SafError> {
        if !(1000..=9999).contains(&year) {
            return Err(SafError::InvalidConfig(format!(
                "Year must have 4 digits, got {year}"
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(SafError::InvalidConfig(format!(
                "Month must be 1–12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// Last two digits of the year, zero-padded ("2024" → "24").
    pub fn year_suffix(&self) -> String {
        format!("{:02}", self.year % 100)
    }

    /// Lowercase month abbreviation ("jan", "fev", …).
    pub fn month_abbrev(&self) -> &'static str {
        MONTH_ABBREVS[usize::from(self.month - 1)]
    }

    /// Uppercase full month name as printed in report headers.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[usize::from(self.month - 1)]
    }

    /// Report URL under `base_url` (`{base}arrec{yy}{mmm}.pdf`).
    pub fn report_url(&self, base_url: &str) -> String {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        format!("{base}arrec{}{}.pdf", self.year_suffix(), self.month_abbrev())
    }

    /// File name of the exported spreadsheet.
    pub fn spreadsheet_filename(&self) -> String {
        format!("SAF_{}_{}.xlsx", self.year_suffix(), self.month_abbrev())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Geometry thresholds used to rebuild tables from positioned PDF text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    /// Horizontal gap (points) below which two text segments on the same line
    /// belong to the same cell. Default: 4.0.
    pub merge_gap: f32,

    /// Minimum cells on a line for it to count as a table row. Default: 2.
    pub min_cells: usize,

    /// A vertical gap larger than this many median line heights starts a new
    /// table region. Default: 3.0.
    pub region_gap_factor: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            merge_gap: 4.0,
            min_cells: 2,
            region_gap_factor: 3.0,
        }
    }
}

/// Configuration for a report-to-spreadsheet run.
///
/// Built via [`PipelineConfig::builder()`].
///
/// # Example
/// ```rust
/// use saf2xlsx::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .year(2024)
///     .month(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.report_url(), "https://www.sefaz.ba.gov.br/docs/financas-publicas/arrecadacao/arrec24mar.pdf");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Report period. Required; no default.
    pub period: Period,

    /// Directory URL the monthly reports are published under.
    pub report_base_url: String,

    /// Municipality registry page.
    pub registry_url: String,

    /// Region identifier locating the registry table (`<thead id=…>`). Default: "BA".
    pub region: String,

    /// User-Agent header sent with both downloads.
    pub user_agent: String,

    /// Report download timeout in seconds. Default: 60.
    pub report_timeout_secs: u64,

    /// Registry download timeout in seconds. Default: 30.
    pub registry_timeout_secs: u64,

    /// Table reconstruction thresholds.
    pub layout: LayoutOptions,

    /// Skip the registry fetch and emit every record without a code. Default: false.
    pub skip_registry: bool,

    /// Optional stage-level progress events.
    pub progress_callback: Option<Arc<dyn PipelineProgressCallback>>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("period", &self.period)
            .field("report_base_url", &self.report_base_url)
            .field("registry_url", &self.registry_url)
            .field("region", &self.region)
            .field("report_timeout_secs", &self.report_timeout_secs)
            .field("registry_timeout_secs", &self.registry_timeout_secs)
            .field("layout", &self.layout)
            .field("skip_registry", &self.skip_registry)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            year: None,
            month: None,
            report_base_url: DEFAULT_REPORT_BASE_URL.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            region: DEFAULT_REGION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            report_timeout_secs: 60,
            registry_timeout_secs: 30,
            layout: LayoutOptions::default(),
            skip_registry: false,
            progress_callback: None,
        }
    }

    /// Full report URL for the configured period.
    pub fn report_url(&self) -> String {
        self.period.report_url(&self.report_base_url)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    year: Option<u16>,
    month: Option<u8>,
    report_base_url: String,
    registry_url: String,
    region: String,
    user_agent: String,
    report_timeout_secs: u64,
    registry_timeout_secs: u64,
    layout: LayoutOptions,
    skip_registry: bool,
    progress_callback: Option<Arc<dyn PipelineProgressCallback>>,
}

impl PipelineConfigBuilder {
    pub fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.year = Some(period.year());
        self.month = Some(period.month());
        self
    }

    pub fn report_base_url(mut self, url: impl Into<String>) -> Self {
        self.report_base_url = url.into();
        self
    }

    pub fn registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn report_timeout_secs(mut self, secs: u64) -> Self {
        self.report_timeout_secs = secs;
        self
    }

    pub fn registry_timeout_secs(mut self, secs: u64) -> Self {
        self.registry_timeout_secs = secs;
        self
    }

    pub fn layout(mut self, layout: LayoutOptions) -> Self {
        self.layout = layout;
        self
    }

    pub fn skip_registry(mut self, v: bool) -> Self {
        self.skip_registry = v;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn PipelineProgressCallback>) -> Self {
        self.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, SafError> {
        let year = self
            .year
            .ok_or_else(|| SafError::InvalidConfig("Year is required".into()))?;
        let month = self
            .month
            .ok_or_else(|| SafError::InvalidConfig("Month is required".into()))?;
        let period = Period::new(year, month)?;

        if self.region.is_empty() || !self.region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SafError::InvalidConfig(format!(
                "Region must be a non-empty alphanumeric identifier, got {:?}",
                self.region
            )));
        }
        if self.report_timeout_secs == 0 || self.registry_timeout_secs == 0 {
            return Err(SafError::InvalidConfig("Timeouts must be ≥ 1s".into()));
        }
        if self.layout.min_cells == 0 || self.layout.merge_gap < 0.0 {
            return Err(SafError::InvalidConfig(
                "Layout min_cells must be ≥ 1 and merge_gap ≥ 0".into(),
            ));
        }

        Ok(PipelineConfig {
            period,
            report_base_url: self.report_base_url,
            registry_url: self.registry_url,
            region: self.region,
            user_agent: self.user_agent,
            report_timeout_secs: self.report_timeout_secs,
            registry_timeout_secs: self.registry_timeout_secs,
            layout: self.layout,
            skip_registry: self.skip_registry,
            progress_callback: self.progress_callback,
        })
    }
}
