//! CLI binary for saf2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one period and writes the spreadsheet.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use saf2xlsx::pipeline::enrich::HttpRegistrySource;
use saf2xlsx::pipeline::extract::PdfiumExtractor;
use saf2xlsx::pipeline::input::{FileReportSource, HttpReportSource};
use saf2xlsx::{
    run_with, save_output, PipelineConfig, PipelineOutput, PipelineProgressCallback,
    ProgressCallback, Stage,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the current stage, plus one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Stop ticking and erase the spinner line.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, items: usize) {
        let unit = match stage {
            Stage::FetchReport => "bytes",
            Stage::ExtractTables => "tables",
            Stage::Transform => "records",
            Stage::FetchRegistry => "registry entries",
            Stage::Export => "rows",
        };
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{items} {unit}"))
        ));
        if stage == Stage::Export {
            self.finish();
        }
    }

    fn on_warning(&self, message: &str) {
        self.bar.println(format!("  {} {}", yellow("⚠"), message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # January 2024 report, spreadsheet in the current directory
  saf2xlsx --year 2024 --month 1

  # Explicit output file
  saf2xlsx --year 2023 --month 12 -o out/dez.xlsx

  # Reprocess a report already on disk, without registry codes
  saf2xlsx --year 2024 --month 3 --pdf arrec24mar.pdf --no-registry

  # Print run statistics as JSON
  saf2xlsx --year 2024 --month 1 --json > stats.json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory); defaults to the
                    system library
  RUST_LOG          Override the log filter (e.g. saf2xlsx=debug)
"#;

/// Convert a monthly municipal tax-collection PDF report into a spreadsheet.
#[derive(Parser, Debug)]
#[command(
    name = "saf2xlsx",
    version,
    about = "Convert a monthly municipal tax-collection PDF report into a spreadsheet",
    long_about = "Download the monthly per-municipality tax-collection report for a period, \
rebuild its tables, repair misaligned rows, join official municipality codes and write \
an .xlsx spreadsheet.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Report year (4 digits).
    #[arg(long, env = "SAF_YEAR")]
    year: u16,

    /// Report month (1–12).
    #[arg(long, env = "SAF_MONTH", value_parser = clap::value_parser!(u8).range(1..=12))]
    month: u8,

    /// Read the report from this local PDF instead of downloading it.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Output file or directory. Default: SAF_{yy}_{mmm}.xlsx in the current
    /// directory.
    #[arg(short, long, env = "SAF_OUTPUT")]
    output: Option<PathBuf>,

    /// Registry region whose municipality codes are joined.
    #[arg(long, env = "SAF_REGION", default_value = "BA")]
    region: String,

    /// Skip the registry lookup and export without codes.
    #[arg(long)]
    no_registry: bool,

    /// Report download timeout in seconds.
    #[arg(long, env = "SAF_REPORT_TIMEOUT", default_value_t = 60)]
    report_timeout: u64,

    /// Registry download timeout in seconds.
    #[arg(long, env = "SAF_REGISTRY_TIMEOUT", default_value_t = 30)]
    registry_timeout: u64,

    /// Print run statistics as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SAF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SAF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports each stage, so library INFO logs are
    // only shown without it.
    let show_progress = !cli.quiet && !cli.json && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let spinner = show_progress.then(CliProgressCallback::new);
    let (output, written) = run_cli(&cli, spinner).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output.stats).context("Failed to serialise stats")?
        );
    }

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} rows  {}ms  →  {}",
            if stats.issues.is_empty() && !stats.enrichment_degraded {
                green("✔")
            } else {
                yellow("⚠")
            },
            stats.exported_rows,
            stats.total_duration_ms,
            bold(&written.display().to_string()),
        );
        eprintln!(
            "   {}",
            dim(&format!(
                "{} realigned, {} unresolved, {} unmatched, {} parse issues{}",
                stats.rows_realigned,
                stats.unresolved_rows,
                stats.unmatched_dropped,
                stats.rows_with_parse_errors,
                if stats.enrichment_degraded {
                    ", no registry codes"
                } else {
                    ""
                }
            ))
        );
    }

    Ok(())
}

/// Run one conversion; the spinner is cleared whether or not it succeeds.
async fn run_cli(
    cli: &Cli,
    spinner: Option<Arc<CliProgressCallback>>,
) -> Result<(PipelineOutput, PathBuf)> {
    let progress_cb = spinner
        .clone()
        .map(|s| s as Arc<dyn PipelineProgressCallback>);
    let result = convert(cli, progress_cb).await;
    if let Some(spinner) = &spinner {
        spinner.finish();
    }
    result
}

async fn convert(
    cli: &Cli,
    progress_cb: Option<ProgressCallback>,
) -> Result<(PipelineOutput, PathBuf)> {
    let config = build_config(cli, progress_cb)?;

    let extractor = PdfiumExtractor::with_layout(config.layout.clone())
        .context("Failed to load the PDF engine")?;
    let registry = HttpRegistrySource::new(&config)?;

    let output: PipelineOutput = match cli.pdf {
        Some(ref path) => {
            let source = FileReportSource::new(path);
            run_with(&source, &extractor, &registry, &config).await
        }
        None => {
            let source = HttpReportSource::new(&config)?;
            run_with(&source, &extractor, &registry, &config).await
        }
    }
    .with_context(|| format!("Conversion failed for {}", config.period))?;

    let target = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let written = save_output(&output, &target)
        .await
        .context("Failed to save spreadsheet")?;
    Ok((output, written))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .year(cli.year)
        .month(cli.month)
        .region(cli.region.clone())
        .skip_registry(cli.no_registry)
        .report_timeout_secs(cli.report_timeout)
        .registry_timeout_secs(cli.registry_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spinner_is_cleared_when_the_run_fails() {
        let cli = Cli::try_parse_from([
            "saf2xlsx",
            "--year",
            "2024",
            "--month",
            "1",
            "--pdf",
            "/nonexistent/arrec24jan.pdf",
            "--no-registry",
        ])
        .unwrap();
        let spinner = CliProgressCallback::new();
        spinner.on_stage_start(Stage::FetchReport);

        let result = run_cli(&cli, Some(Arc::clone(&spinner))).await;
        assert!(result.is_err());
        assert!(spinner.bar.is_finished());
    }

    #[test]
    fn export_completion_finishes_the_spinner() {
        let spinner = CliProgressCallback::new();
        spinner.on_stage_complete(Stage::Export, 3);
        assert!(spinner.bar.is_finished());
        spinner.finish();
    }
}
