//! End-to-end pipeline tests over fixture sources.
//!
//! The report, the table extractor and the registry are all in-memory
//! fixtures, so these tests need neither network access nor pdfium.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use calamine::{Data, Reader, Xlsx};
use saf2xlsx::pipeline::enrich::{RegistrySource, StaticRegistry};
use saf2xlsx::pipeline::extract::{tables_from_segments, TableExtractor, TextSegment};
use saf2xlsx::pipeline::input::StaticReport;
use saf2xlsx::{
    process_tables, run_with, save_output, Alignment, LayoutOptions, PipelineConfig,
    PipelineProgressCallback, RawTable, ReferenceEntry, SafError, Stage,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Returns a fixed set of tables regardless of the PDF bytes.
struct FixtureExtractor(Vec<RawTable>);

impl TableExtractor for FixtureExtractor {
    fn extract_tables(&self, _pdf: &[u8]) -> Result<Vec<RawTable>, SafError> {
        Ok(self.0.clone())
    }
}

/// A registry that is always down.
struct DownRegistry;

impl RegistrySource for DownRegistry {
    async fn fetch_registry(&self) -> Result<Vec<ReferenceEntry>, SafError> {
        Err(SafError::FetchTimeout {
            url: "https://registry.invalid/".into(),
            secs: 30,
        })
    }
}

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for RecordingCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start {stage}"));
    }
    fn on_stage_complete(&self, stage: Stage, items: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {stage} {items}"));
    }
    fn on_warning(&self, message: &str) {
        self.events.lock().unwrap().push(format!("warn {message}"));
    }
}

fn report() -> StaticReport {
    StaticReport(b"%PDF-1.4\n% fixture\n%%EOF".to_vec())
}

/// Two pages, each with one well-formed row and one row shifted one column
/// to the left.
fn two_page_tables() -> Vec<RawTable> {
    vec![
        RawTable::from_strs(
            1,
            &[
                &["MUNICÍPIOS", "ICMS", "IPVA", "ITD", "TAXAS", "TOTAL", "ACUMULADO"],
                &["SALVADOR", "1.000,00", "200,00", "50,00", "10,00", "1.260,00", "5.000,00"],
                // ICMS fused into the name; everything else slid left.
                &["CAMAÇARI800,00", "100,00", "20,00", "5,00", "925,00", "3.700,00", ""],
            ],
        ),
        RawTable::from_strs(
            2,
            &[
                &["JANEIRO", "", "", "", "", "", ""],
                &["FEIRA DE SANTANA", "300,00", "40,00", "", "2,00", "342,00", "1.400,00"],
                // Leading cell empty in the source; no value to recover.
                &["ILHÉUS", "60,00", "7,00", "1,00", "68,00", "250,00", ""],
                &["TOTAL GERAL", "2.160,00", "367,00", "56,00", "1.005,00", "5.777,00", "10.350,00"],
            ],
        ),
    ]
}

fn full_registry() -> StaticRegistry {
    StaticRegistry::new(vec![
        ReferenceEntry::new("Salvador", "2927408"),
        ReferenceEntry::new("Camaçari", "2905701"),
        ReferenceEntry::new("Feira de Santana", "2910800"),
        ReferenceEntry::new("Ilhéus", "2913606"),
    ])
}

fn config() -> PipelineConfig {
    PipelineConfig::builder().year(2024).month(1).build().unwrap()
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_page_report_exports_registered_rows_only() {
    // The registry knows only the two well-formed municipalities.
    let registry = StaticRegistry::new(vec![
        ReferenceEntry::new("Salvador", "2927408"),
        ReferenceEntry::new("Feira de Santana", "2910800"),
    ]);
    let output = run_with(
        &report(),
        &FixtureExtractor(two_page_tables()),
        &registry,
        &config(),
    )
    .await
    .unwrap();

    assert_eq!(output.records.len(), 2);
    let names: Vec<&str> = output.records.iter().map(|r| r.municipality.as_str()).collect();
    assert_eq!(names, vec!["SALVADOR", "FEIRA DE SANTANA"]);
    assert!(output.records.iter().all(|r| r.year_to_date_total.is_some()));
    assert_eq!(output.records[0].code.as_deref(), Some("2927408"));
    assert_eq!(output.records[1].itd, None);

    let stats = &output.stats;
    assert_eq!(stats.tables_extracted, 2);
    assert_eq!(stats.rows_extracted, 7);
    assert_eq!(stats.noise_rows_dropped, 3);
    assert_eq!(stats.records, 4);
    assert_eq!(stats.rows_realigned, 2);
    assert_eq!(stats.unresolved_rows, 0);
    assert_eq!(stats.unmatched_dropped, 2);
    assert!(!stats.enrichment_degraded);
    assert_eq!(stats.exported_rows, 2);
    assert_eq!(output.filename, "SAF_24_jan.xlsx");
}

#[tokio::test]
async fn test_shifted_rows_are_repaired_before_export() {
    let output = run_with(
        &report(),
        &FixtureExtractor(two_page_tables()),
        &full_registry(),
        &config(),
    )
    .await
    .unwrap();

    assert_eq!(output.records.len(), 4);

    let camacari = &output.records[1];
    assert_eq!(camacari.municipality, "CAMAÇARI");
    assert_eq!(camacari.icms, Some(800.0));
    assert_eq!(camacari.ipva, Some(100.0));
    assert_eq!(camacari.itd, Some(20.0));
    assert_eq!(camacari.fees, Some(5.0));
    assert_eq!(camacari.month_total, Some(925.0));
    assert_eq!(camacari.year_to_date_total, Some(3700.0));
    assert_eq!(camacari.code.as_deref(), Some("2905701"));

    let ilheus = &output.records[3];
    assert_eq!(ilheus.municipality, "ILHÉUS");
    assert_eq!(ilheus.icms, None);
    assert_eq!(ilheus.ipva, Some(60.0));
    assert_eq!(ilheus.year_to_date_total, Some(250.0));
    assert_eq!(ilheus.code.as_deref(), Some("2913606"));
}

#[tokio::test]
async fn test_registry_failure_degrades_without_dropping_rows() {
    let callback = Arc::new(RecordingCallback::default());
    let config = PipelineConfig::builder()
        .year(2024)
        .month(1)
        .progress_callback(callback.clone())
        .build()
        .unwrap();

    let degraded = run_with(
        &report(),
        &FixtureExtractor(two_page_tables()),
        &DownRegistry,
        &config,
    )
    .await
    .unwrap();

    assert!(degraded.stats.enrichment_degraded);
    assert_eq!(degraded.stats.unmatched_dropped, 0);
    assert_eq!(degraded.records.len(), degraded.stats.records);
    assert!(degraded.records.iter().all(|r| r.code.is_none()));

    let events = callback.events.lock().unwrap();
    assert!(events.iter().any(|e| e.starts_with("warn Registry unavailable")));
}

#[tokio::test]
async fn test_skip_registry_matches_degraded_mode() {
    let config = PipelineConfig::builder()
        .year(2024)
        .month(1)
        .skip_registry(true)
        .build()
        .unwrap();
    let output = run_with(
        &report(),
        &FixtureExtractor(two_page_tables()),
        &full_registry(),
        &config,
    )
    .await
    .unwrap();
    assert_eq!(output.records.len(), 4);
    assert!(output.stats.enrichment_degraded);
    assert!(output.records.iter().all(|r| r.code.is_none()));
}

#[tokio::test]
async fn test_stages_are_reported_in_order() {
    let callback = Arc::new(RecordingCallback::default());
    let config = PipelineConfig::builder()
        .year(2024)
        .month(1)
        .progress_callback(callback.clone())
        .build()
        .unwrap();
    run_with(
        &report(),
        &FixtureExtractor(two_page_tables()),
        &full_registry(),
        &config,
    )
    .await
    .unwrap();

    let events = callback.events.lock().unwrap();
    let starts: Vec<&str> = events
        .iter()
        .filter(|e| e.starts_with("start "))
        .map(String::as_str)
        .collect();
    assert_eq!(
        starts,
        vec![
            "start fetch report",
            "start extract tables",
            "start transform rows",
            "start fetch registry",
            "start export spreadsheet",
        ]
    );
    assert!(events.contains(&"done extract tables 2".to_string()));
    assert!(events.contains(&"done export spreadsheet 4".to_string()));
}

// ── Layout to records ────────────────────────────────────────────────────────

/// Cells of one row at the given baseline; `None` leaves the column empty.
fn line(y: f32, cells: [Option<(&str, f32, f32)>; 7]) -> Vec<TextSegment> {
    cells
        .into_iter()
        .flatten()
        .map(|(text, left, right)| TextSegment::new(text, left, right, y + 10.0, y))
        .collect()
}

#[test]
fn test_fused_name_cell_shifts_the_whole_region() {
    let mut segments = Vec::new();
    // Name touching its ICMS amount.
    segments.extend(line(
        700.0,
        [
            Some(("SALVADOR", 10.0, 80.0)),
            Some(("1.000,00", 80.2, 118.0)),
            Some(("200,00", 140.0, 170.0)),
            Some(("50,00", 190.0, 220.0)),
            Some(("10,00", 240.0, 270.0)),
            Some(("1.260,00", 290.0, 330.0)),
            Some(("5.000,00", 350.0, 390.0)),
        ],
    ));
    // Name and ICMS apart.
    segments.extend(line(
        686.0,
        [
            Some(("ITABUNA", 10.0, 70.0)),
            Some(("300,00", 90.0, 118.0)),
            Some(("40,00", 140.0, 170.0)),
            Some(("3,00", 190.0, 220.0)),
            Some(("2,00", 240.0, 270.0)),
            Some(("345,00", 290.0, 330.0)),
            Some(("1.400,00", 350.0, 390.0)),
        ],
    ));
    // No ICMS at all.
    segments.extend(line(
        672.0,
        [
            Some(("JEQUIE", 10.0, 60.0)),
            None,
            Some(("9,00", 140.0, 170.0)),
            Some(("1,00", 190.0, 220.0)),
            Some(("1,00", 240.0, 270.0)),
            Some(("11,00", 290.0, 330.0)),
            Some(("400,00", 350.0, 390.0)),
        ],
    ));

    // The fused cell spans the ICMS column, so name and ICMS share one band.
    let tables = tables_from_segments(1, &segments, &LayoutOptions::default());
    assert_eq!(tables.len(), 1);
    assert!(tables[0].rows.iter().all(|row| row.len() == 6));
    assert_eq!(tables[0].rows[0][0].as_deref(), Some("SALVADOR1.000,00"));
    assert_eq!(tables[0].rows[1][0].as_deref(), Some("ITABUNA 300,00"));

    let (records, stats) = process_tables(&tables, None, None);
    assert_eq!(stats.rows_realigned, 3);
    assert_eq!(stats.unresolved_rows, 0);
    assert_eq!(records.len(), 3);

    let by_name = |name: &str| {
        records
            .iter()
            .find(|r| r.municipality == name)
            .unwrap_or_else(|| panic!("{name} missing"))
    };
    let salvador = by_name("SALVADOR");
    assert_eq!(salvador.icms, Some(1000.0));
    assert_eq!(salvador.ipva, Some(200.0));
    assert_eq!(salvador.year_to_date_total, Some(5000.0));

    let itabuna = by_name("ITABUNA");
    assert_eq!(itabuna.icms, Some(300.0));
    assert_eq!(itabuna.month_total, Some(345.0));
    assert_eq!(itabuna.year_to_date_total, Some(1400.0));

    let jequie = by_name("JEQUIE");
    assert_eq!(jequie.icms, None);
    assert_eq!(jequie.ipva, Some(9.0));
    assert_eq!(jequie.year_to_date_total, Some(400.0));
}

// ── Fatal errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_zero_tables_is_an_extraction_error() {
    let err = run_with(
        &report(),
        &FixtureExtractor(Vec::new()),
        &full_registry(),
        &config(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SafError::Extraction(_)), "got {err:?}");
}

#[tokio::test]
async fn test_html_report_is_not_a_pdf() {
    let err = run_with(
        &StaticReport(b"<!DOCTYPE html><html>".to_vec()),
        &FixtureExtractor(two_page_tables()),
        &full_registry(),
        &config(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SafError::NotAPdf { .. }), "got {err:?}");
}

// ── Spreadsheet ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_spreadsheet_reads_back() {
    let output = run_with(
        &report(),
        &FixtureExtractor(two_page_tables()),
        &full_registry(),
        &config(),
    )
    .await
    .unwrap();

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(output.spreadsheet.clone())).unwrap();
    let range = workbook.worksheet_range("SAF").unwrap();
    assert_eq!(range.height(), 5);

    let header: Vec<String> = (0..8)
        .map(|c| match range.get((0, c)) {
            Some(Data::String(s)) => s.clone(),
            other => panic!("header cell {c}: {other:?}"),
        })
        .collect();
    assert_eq!(
        header,
        vec!["MUNICIPALITY", "ICMS", "IPVA", "ITD", "FEES", "MONTH_TOTAL", "YTD_TOTAL", "CODE"]
    );

    assert_eq!(range.get((1, 0)), Some(&Data::String("SALVADOR".into())));
    assert_eq!(range.get((1, 1)), Some(&Data::Float(1000.0)));
    assert_eq!(range.get((1, 6)), Some(&Data::Float(5000.0)));
    assert_eq!(range.get((1, 7)), Some(&Data::String("2927408".into())));

    // FEIRA DE SANTANA has no ITD: the cell stays empty.
    assert_eq!(range.get((3, 0)), Some(&Data::String("FEIRA DE SANTANA".into())));
    assert!(matches!(range.get((3, 3)), None | Some(Data::Empty)));
}

#[tokio::test]
async fn test_save_output_into_directory_uses_period_filename() {
    let output = run_with(
        &report(),
        &FixtureExtractor(two_page_tables()),
        &full_registry(),
        &config(),
    )
    .await
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = save_output(&output, dir.path()).await.unwrap();
    assert_eq!(written, dir.path().join("SAF_24_jan.xlsx"));
    assert_eq!(std::fs::read(&written).unwrap(), output.spreadsheet);
    assert!(!dir.path().join("SAF_24_jan.xlsx.tmp").exists());

    let nested = dir.path().join("out/custom.xlsx");
    let written = save_output(&output, &nested).await.unwrap();
    assert_eq!(written, nested);
    assert!(nested.exists());
}

// ── Misc ─────────────────────────────────────────────────────────────────────

#[test]
fn test_alignment_default_is_pending() {
    assert_eq!(Alignment::default(), Alignment::Pending);
}

#[test]
fn test_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecordingCallback>();
    assert_send_sync::<saf2xlsx::NoopProgressCallback>();
}
