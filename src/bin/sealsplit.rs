//! CLI binary for sealsplit.
//!
//! A thin shim over the library crate that layers CLI flags over the
//! optional JSON configuration file and prints the run report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sealsplit::config::marker_dir_from_file;
use sealsplit::{
    segment, OutputDocument, ProgressCallback, SegmentationConfig, SegmentationProgressCallback,
    SegmentationReport, Stage, WorkerCount,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner between stages and a page bar
/// during detection. Pages finish out of order, so the bar only counts.
struct CliProgressCallback {
    bar: ProgressBar,
    hits: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            hits: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scanning");
        self.bar.reset_eta();
    }
}

impl SegmentationProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if stage != Stage::DetectBoundaries {
            self.bar.set_message(stage.to_string());
        }
    }

    fn on_detection_start(&self, total_pages: usize, workers: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Scanning {total_pages} pages for markers on {workers} workers…"
            ))
        ));
    }

    fn on_page_scanned(&self, page_index: usize, matched: bool) {
        if matched {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.bar
                .println(format!("  {} marker on page {}", green("✓"), page_index + 1));
        }
        self.bar.inc(1);
    }

    fn on_document_written(&self, doc: &OutputDocument) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            doc.path.display(),
            dim(&format!(
                "pages {}–{} ({})",
                doc.range.start + 1,
                doc.range.end + 1,
                doc.pages
            )),
        ));
    }

    fn on_complete(&self, report: &SegmentationReport) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} documents from {} pages  {}",
            green("✔"),
            bold(&report.outputs.len().to_string()),
            report.filtered_page_count,
            dim(&format!(
                "({} markers found, {}ms)",
                self.hits.load(Ordering::Relaxed),
                report.stats.total_duration_ms
            )),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split using ./footer_images, writing into ./split_pdf
  sealsplit bundle.pdf

  # Custom directories, start from a clean output folder
  sealsplit bundle.pdf --markers stamps/ --output out/ --clean-output

  # Stricter matching on four workers
  sealsplit bundle.pdf --match-threshold 40 --workers 4

  # Machine-readable report
  sealsplit --json bundle.pdf > report.json

CONFIGURATION FILE (config.json, optional):
  {
    "blank_page_threshold": 0.95,
    "sift_threshold": 20,
    "ratio": 0.75,
    "workers": "auto",
    "marker_dir": "footer_images"
  }
  Command-line flags take precedence over file values.

ENVIRONMENT VARIABLES:
  SEALSPLIT_*             Every flag has one, e.g. SEALSPLIT_WORKERS=4
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Overrides the log filter
"#;

/// Split a scanned PDF bundle into one file per document.
#[derive(Parser, Debug)]
#[command(
    name = "sealsplit",
    version,
    about = "Split a scanned PDF bundle into documents at each closing seal",
    long_about = "Remove blank pages from a scanned PDF, find the pages carrying a closing seal \
or stamp by feature matching against reference images, and write each document ending at \
such a page to its own PDF. Pages are copied, never re-rendered.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source PDF.
    input: PathBuf,

    /// Directory of marker images (jpg, jpeg, png, bmp).
    #[arg(short, long, env = "SEALSPLIT_MARKERS")]
    markers: Option<PathBuf>,

    /// Directory that receives split_1.pdf, split_2.pdf, …
    #[arg(short, long, env = "SEALSPLIT_OUTPUT", default_value = "split_pdf")]
    output: PathBuf,

    /// JSON configuration file; ignored when absent.
    #[arg(short, long, env = "SEALSPLIT_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// White-sample fraction at which a textless page counts as blank (0–1].
    #[arg(long, env = "SEALSPLIT_BLANK_THRESHOLD")]
    blank_threshold: Option<f32>,

    /// Matches a page must exceed to be a marker page.
    #[arg(long, env = "SEALSPLIT_MATCH_THRESHOLD")]
    match_threshold: Option<usize>,

    /// Nearest/second-nearest distance ratio (0–1).
    #[arg(long, env = "SEALSPLIT_RATIO")]
    ratio: Option<f32>,

    /// Detection workers: auto (CPU count − 1) or a number.
    #[arg(short, long, env = "SEALSPLIT_WORKERS")]
    workers: Option<WorkerCount>,

    /// Rendering DPI for blank checks and matching (72–600).
    #[arg(long, env = "SEALSPLIT_DPI",
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: Option<u32>,

    /// Output file name prefix.
    #[arg(long, env = "SEALSPLIT_PREFIX")]
    prefix: Option<String>,

    /// Empty the output directory before writing.
    #[arg(long, env = "SEALSPLIT_CLEAN_OUTPUT")]
    clean_output: bool,

    /// PDF user password for encrypted sources.
    #[arg(long, env = "SEALSPLIT_PASSWORD")]
    password: Option<String>,

    /// Print the report as JSON on stdout.
    #[arg(long, env = "SEALSPLIT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SEALSPLIT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SEALSPLIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SEALSPLIT_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn SegmentationProgressCallback>);
    let config = build_config(&cli, progress_cb)?;
    let markers = cli
        .markers
        .clone()
        .or_else(|| marker_dir_from_file(&cli.config))
        .unwrap_or_else(|| PathBuf::from("footer_images"));

    // ── Run ──────────────────────────────────────────────────────────────
    let report = match segment(&cli.input, &markers, &cli.output, &config) {
        Ok(report) => report,
        Err(e) => {
            if let Some(cb) = &cli_progress {
                cb.bar.finish_and_clear();
            }
            eprintln!("{} {}", red("✘"), bold(&format!("failed to {}", e.stage())));
            return Err(e).with_context(|| format!("Segmentation of {:?} failed", cli.input));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }
    if !cli.quiet {
        print_report(&report, show_progress);
    }
    Ok(())
}

/// Layer CLI flags over the configuration file.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SegmentationConfig> {
    let base = SegmentationConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    let mut builder = base.into_builder();
    if let Some(t) = cli.blank_threshold {
        builder = builder.blank_threshold(t);
    }
    if let Some(n) = cli.match_threshold {
        builder = builder.match_threshold(n);
    }
    if let Some(r) = cli.ratio {
        builder = builder.ratio(r);
    }
    if let Some(w) = cli.workers {
        builder = builder.workers(w);
    }
    if let Some(dpi) = cli.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(ref prefix) = cli.prefix {
        builder = builder.output_prefix(prefix.clone());
    }
    if cli.clean_output {
        builder = builder.clear_output_dir(true);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable summary on stderr.
fn print_report(report: &SegmentationReport, show_progress: bool) {
    if !report.removed_pages.is_empty() {
        eprintln!(
            "{} {} blank pages removed:",
            cyan("◆"),
            report.removed_pages.len()
        );
        for line in report.removed_pages_lines() {
            eprintln!("   {}", dim(&line));
        }
    }

    if report.boundaries.is_empty() {
        eprintln!(
            "{} no marker pages found; the document was written whole",
            cyan("⚠")
        );
    } else {
        eprintln!();
        eprint!("{}", report.summary_table());
    }

    // Without the bar, the written files have not been listed yet.
    if !show_progress {
        eprintln!();
        for doc in &report.outputs {
            eprintln!(
                "{}  {}  {}",
                green("✔"),
                bold(&doc.path.display().to_string()),
                dim(&format!("pages {}–{}", doc.range.start + 1, doc.range.end + 1)),
            );
        }
        eprintln!(
            "Wrote {} documents in {}ms",
            report.outputs.len(),
            report.stats.total_duration_ms
        );
    }
}
