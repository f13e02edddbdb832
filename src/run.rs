//! Run entry points: fetch, extract, transform, enrich and export one report.
//!
//! The transformation in between the two fetches is synchronous and pure;
//! [`process_tables`] exposes it directly for callers that already hold
//! extracted tables.

use crate::config::{Period, PipelineConfig};
use crate::error::{RowIssue, SafError};
use crate::output::{PipelineOutput, RunStats};
use crate::pipeline::enrich::{enrich, HttpRegistrySource, RegistrySource};
use crate::pipeline::export::{select_for_export, write_spreadsheet};
use crate::pipeline::extract::{PdfiumExtractor, TableExtractor};
use crate::pipeline::input::{HttpReportSource, ReportSource};
use crate::pipeline::noise::retain_data_rows;
use crate::pipeline::realign::{fill_recovered_icms, realign_all};
use crate::pipeline::shape::normalize_tables;
use crate::pipeline::split::to_record;
use crate::progress::Stage;
use crate::record::{Alignment, EnrichedRecord, RawTable, Record, ReferenceEntry};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Download the configured period's report and registry, and build the
/// spreadsheet.
///
/// # Errors
/// Returns `Err(SafError)` only for fatal errors: download failure or timeout
/// of the report, an unreadable PDF, zero tables, or a spreadsheet that could
/// not be serialised. A registry failure degrades the run instead.
pub async fn run(config: &PipelineConfig) -> Result<PipelineOutput, SafError> {
    let source = HttpReportSource::new(config)?;
    let extractor = PdfiumExtractor::with_layout(config.layout.clone())?;
    let registry = HttpRegistrySource::new(config)?;
    run_with(&source, &extractor, &registry, config).await
}

/// Run the pipeline with explicit sources.
pub async fn run_with<S, E, R>(
    source: &S,
    extractor: &E,
    registry: &R,
    config: &PipelineConfig,
) -> Result<PipelineOutput, SafError>
where
    S: ReportSource,
    E: TableExtractor,
    R: RegistrySource,
{
    let total_start = Instant::now();
    let callback = config.progress_callback.as_deref();
    let start = |stage: Stage| {
        if let Some(cb) = callback {
            cb.on_stage_start(stage);
        }
    };
    let complete = |stage: Stage, items: usize| {
        if let Some(cb) = callback {
            cb.on_stage_complete(stage, items);
        }
    };
    info!("Starting run for {}", config.period);

    // ── Step 1: Report ───────────────────────────────────────────────────
    start(Stage::FetchReport);
    let fetch_start = Instant::now();
    let pdf = source.fetch_report().await?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    complete(Stage::FetchReport, pdf.len());

    // ── Step 2: Tables ───────────────────────────────────────────────────
    start(Stage::ExtractTables);
    let extract_start = Instant::now();
    let tables = extractor.extract_tables(&pdf)?;
    if tables.is_empty() {
        return Err(SafError::Extraction("no tables found in the report".into()));
    }
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    complete(Stage::ExtractTables, tables.len());

    // ── Step 3: Rows → records ───────────────────────────────────────────
    start(Stage::Transform);
    let (records, mut stats) = transform(&tables, Some(&config.period));
    complete(Stage::Transform, records.len());

    // ── Step 4: Registry ─────────────────────────────────────────────────
    start(Stage::FetchRegistry);
    let entries = if config.skip_registry {
        info!("Registry lookup disabled; exporting without codes");
        None
    } else {
        match registry.fetch_registry().await {
            Ok(entries) => Some(entries),
            Err(e) => {
                let message = format!("Registry unavailable, exporting without codes: {}", e);
                warn!("{}", message);
                if let Some(cb) = callback {
                    cb.on_warning(&message);
                }
                None
            }
        }
    };
    complete(Stage::FetchRegistry, entries.as_ref().map_or(0, Vec::len));

    // ── Step 5: Join and serialise ───────────────────────────────────────
    start(Stage::Export);
    let records = finish(records, entries.as_deref(), &mut stats);
    let spreadsheet = write_spreadsheet(&records)?;
    complete(Stage::Export, records.len());

    stats.fetch_duration_ms = fetch_duration_ms;
    stats.extract_duration_ms = extract_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} rows exported ({} shifted, {} unresolved, {} unmatched), {}ms",
        stats.exported_rows,
        stats.rows_realigned,
        stats.unresolved_rows,
        stats.unmatched_dropped,
        stats.total_duration_ms
    );

    Ok(PipelineOutput {
        filename: config.period.spreadsheet_filename(),
        spreadsheet,
        records,
        stats,
    })
}

/// Turn extracted tables into export-ready records.
///
/// `registry` is the scraped municipality registry; `None` means it was
/// unavailable, in which case every record is kept without a code and the
/// stats are flagged `enrichment_degraded`. `period` enables the month-name
/// header filter.
pub fn process_tables(
    tables: &[RawTable],
    registry: Option<&[ReferenceEntry]>,
    period: Option<&Period>,
) -> (Vec<EnrichedRecord>, RunStats) {
    let (records, mut stats) = transform(tables, period);
    let records = finish(records, registry, &mut stats);
    (records, stats)
}

/// Shape, filter, split and realign. Unresolved rows are dropped here.
fn transform(tables: &[RawTable], period: Option<&Period>) -> (Vec<Record>, RunStats) {
    let mut stats = RunStats {
        tables_extracted: tables.len(),
        rows_extracted: tables.iter().map(|t| t.rows.len()).sum(),
        ..RunStats::default()
    };

    let shaped = normalize_tables(tables);
    let (rows, noise) = retain_data_rows(shaped, period);
    stats.noise_rows_dropped = noise;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let (record, issues) = to_record(row);
        if !issues.is_empty() {
            stats.rows_with_parse_errors += 1;
            stats.issues.extend(issues);
        }
        records.push(record);
    }
    stats.records = records.len();

    let (shifted, unresolved) = realign_all(&mut records);
    stats.rows_realigned = shifted;
    stats.unresolved_rows = unresolved;
    stats.icms_recovered = fill_recovered_icms(&mut records);

    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        if record.alignment == Alignment::Unresolved {
            warn!(
                "Page {}: dropping '{}', no year-to-date total after realignment",
                record.page, record.municipality
            );
            stats.issues.push(RowIssue::Schema {
                page: record.page,
                municipality: record.municipality.clone(),
                detail: "no year-to-date total after realignment".into(),
            });
        } else {
            kept.push(record);
        }
    }

    info!(
        "Transformed {} tables: {} rows, {} noise, {} records kept",
        stats.tables_extracted,
        stats.rows_extracted,
        stats.noise_rows_dropped,
        kept.len()
    );
    (kept, stats)
}

/// Enrich and select the exported set.
fn finish(
    records: Vec<Record>,
    registry: Option<&[ReferenceEntry]>,
    stats: &mut RunStats,
) -> Vec<EnrichedRecord> {
    stats.enrichment_degraded = registry.is_none();
    let enriched = enrich(records, registry);
    let (exported, dropped) = select_for_export(enriched, registry.is_some());
    stats.unmatched_dropped = dropped;
    stats.exported_rows = exported.len();
    exported
}

/// Run the pipeline and write the spreadsheet to `path`.
///
/// If `path` is an existing directory, the spreadsheet is written inside it
/// under the period's default file name. Uses atomic write (temp file +
/// rename) to prevent partial files.
pub async fn run_to_file(
    config: &PipelineConfig,
    path: impl AsRef<Path>,
) -> Result<(PathBuf, RunStats), SafError> {
    let output = run(config).await?;
    let written = save_output(&output, path).await?;
    Ok((written, output.stats))
}

/// Write a run's spreadsheet to `path` (file, or directory for the default
/// file name). Returns the final path.
pub async fn save_output(
    output: &PipelineOutput,
    path: impl AsRef<Path>,
) -> Result<PathBuf, SafError> {
    let mut path = path.as_ref().to_path_buf();
    if tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        path.push(&output.filename);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SafError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, &output.spreadsheet)
        .await
        .map_err(|e| SafError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| SafError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    debug!("Wrote {} bytes to {}", output.spreadsheet.len(), path.display());
    Ok(path)
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(config: &PipelineConfig) -> Result<PipelineOutput, SafError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SafError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, rows: &[&[&str]]) -> RawTable {
        RawTable::from_strs(n, rows)
    }

    #[test]
    fn noise_and_unresolved_rows_are_counted_not_exported() {
        let tables = vec![page(
            1,
            &[
                &["MUNICÍPIOS", "ICMS", "IPVA", "ITD", "TAXAS", "TOTAL", "ACUMULADO"],
                &["SALVADOR", "1,00", "2,00", "3,00", "4,00", "10,00", "20,00"],
                &["ILHEUS500,00", "500,00", "", "", "", "", ""],
                &["TOTAL GERAL", "1,00", "2,00", "3,00", "4,00", "10,00", "20,00"],
            ],
        )];
        let (records, stats) = process_tables(&tables, None, None);

        assert_eq!(stats.tables_extracted, 1);
        assert_eq!(stats.rows_extracted, 4);
        assert_eq!(stats.noise_rows_dropped, 2);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.unresolved_rows, 1);
        assert!(stats.enrichment_degraded);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].municipality, "SALVADOR");
        assert_eq!(stats.exported_rows, 1);
        assert!(matches!(
            &stats.issues[..],
            [RowIssue::Schema { municipality, .. }] if municipality == "ILHEUS"
        ));
    }

    #[test]
    fn fused_amount_fills_empty_icms_of_aligned_row() {
        let tables = vec![page(
            1,
            &[
                &["SALVADOR1.000,00", "", "200,00", "50,00", "10,00", "1.260,00", "5.000,00"],
                &["ITABUNA", "300,00", "40,00", "3,00", "2,00", "345,00", "1.400,00"],
            ],
        )];
        let (records, stats) = process_tables(&tables, None, None);

        assert_eq!(records.len(), 2);
        let salvador = &records[0];
        assert_eq!(salvador.municipality, "SALVADOR");
        assert_eq!(salvador.icms, Some(1000.0));
        assert_eq!(salvador.ipva, Some(200.0));
        assert_eq!(salvador.year_to_date_total, Some(5000.0));
        assert_eq!(records[1].icms, Some(300.0));
        assert_eq!(stats.rows_realigned, 0);
        assert_eq!(stats.icms_recovered, 1);
    }

    #[test]
    fn parse_failures_keep_the_row() {
        let tables = vec![page(
            2,
            &[&["ITABUNA", "n/d", "2,00", "3,00", "4,00", "10,00", "20,00"]],
        )];
        let (records, stats) = process_tables(&tables, None, None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].icms, None);
        assert_eq!(stats.rows_with_parse_errors, 1);
        assert!(matches!(&stats.issues[0], RowIssue::Parse { page: 2, .. }));
    }

    #[test]
    fn registry_join_drops_unmatched() {
        let tables = vec![page(
            1,
            &[
                &["Salvador", "1,00", "2,00", "3,00", "4,00", "10,00", "20,00"],
                &["Atlântida", "1,00", "2,00", "3,00", "4,00", "10,00", "20,00"],
            ],
        )];
        let registry = vec![ReferenceEntry::new("SALVADOR", "2927408")];
        let (records, stats) = process_tables(&tables, Some(registry.as_slice()), None);
        assert!(!stats.enrichment_degraded);
        assert_eq!(stats.unmatched_dropped, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code.as_deref(), Some("2927408"));
    }
}
