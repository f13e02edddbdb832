//! Report sources: obtain the monthly PDF as bytes.
//!
//! The report is read fully into memory; pdfium loads it from the byte slice,
//! so no temp file is needed. Every source validates the `%PDF` signature
//! before returning, so callers get [`SafError::NotAPdf`] (typically an HTML
//! "not found" page served with status 200) instead of a pdfium failure.

use super::extract::check_pdf_magic;
use crate::config::PipelineConfig;
use crate::error::SafError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Anything that can produce the report PDF.
pub trait ReportSource {
    fn fetch_report(&self) -> impl Future<Output = Result<Vec<u8>, SafError>> + Send;
}

/// Downloads the report for the configured period.
#[derive(Debug, Clone)]
pub struct HttpReportSource {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl HttpReportSource {
    pub fn new(config: &PipelineConfig) -> Result<Self, SafError> {
        Self::with_url(config, config.report_url())
    }

    /// Download from an explicit URL instead of the period's URL.
    pub fn with_url(config: &PipelineConfig, url: impl Into<String>) -> Result<Self, SafError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.report_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SafError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout_secs: config.report_timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReportSource for HttpReportSource {
    async fn fetch_report(&self) -> Result<Vec<u8>, SafError> {
        info!("Downloading report from: {}", self.url);

        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .map_err(|e| SafError::from_reqwest(&self.url, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(SafError::FetchFailed {
                url: self.url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SafError::from_reqwest(&self.url, self.timeout_secs, e))?;

        check_pdf_magic(&bytes)?;
        info!("Downloaded report: {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Reads a report already on disk.
#[derive(Debug, Clone)]
pub struct FileReportSource {
    path: PathBuf,
}

impl FileReportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSource for FileReportSource {
    async fn fetch_report(&self) -> Result<Vec<u8>, SafError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                SafError::FileNotFound {
                    path: self.path.clone(),
                }
            }
            _ => SafError::Internal(format!("Failed to read '{}': {}", self.path.display(), e)),
        })?;
        check_pdf_magic(&bytes)?;
        debug!("Read local report: {} ({} bytes)", self.path.display(), bytes.len());
        Ok(bytes)
    }
}

/// An in-memory report.
#[derive(Debug, Clone, Default)]
pub struct StaticReport(pub Vec<u8>);

impl ReportSource for StaticReport {
    async fn fetch_report(&self) -> Result<Vec<u8>, SafError> {
        check_pdf_magic(&self.0)?;
        Ok(self.0.clone())
    }
}
