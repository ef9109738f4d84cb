//! CLI binary for scan2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ProcessingConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scan2md::{
    process_folder, ProcessingConfig, ProcessingProgressCallback, ProgressCallback, ScaleMode,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page log
/// lines using [indicatif]. Designed to work correctly when pages complete
/// out-of-order (concurrent mode).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Count of warnings seen across the run.
    warnings: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set by `on_run_start`
    /// once the page count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            warnings: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, figures: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{figures} figure(s)")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_warning(&self, _page_num: usize, _total: usize, warning: &str) {
        self.warnings.fetch_add(1, Ordering::SeqCst);

        // Truncate very long messages to keep output tidy.
        let msg = match warning.char_indices().nth(100) {
            Some((cut, _)) => format!("{}\u{2026}", &warning[..cut]),
            None => warning.to_string(),
        };
        self.bar.println(format!("  {} {}", yellow("⚠"), yellow(&msg)));
    }

    fn on_run_complete(&self, total_pages: usize, figures_total: usize) {
        self.bar.finish_and_clear();
        let warnings = self.warnings.load(Ordering::SeqCst);

        if warnings == 0 {
            eprintln!(
                "{} {} page(s) processed, {} figure(s) extracted",
                green("✔"),
                bold(&total_pages.to_string()),
                bold(&figures_total.to_string()),
            );
        } else {
            eprintln!(
                "{} {} page(s) processed, {} figure(s) extracted  ({} warning(s))",
                yellow("⚠"),
                bold(&total_pages.to_string()),
                bold(&figures_total.to_string()),
                yellow(&warnings.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process a document folder (markdown/ + images/ inside)
  scan2md my_document

  # Bare <image_here> markers with JSON coordinate sidecars
  scan2md my_document --boxes-dir my_document/boxes

  # Also write _bbox debug copies showing where each box landed
  scan2md my_document --annotate

  # Reprocess an archive produced under the legacy scaling convention
  scan2md my_document --scale-mode uniform

  # Machine-readable per-page report
  scan2md my_document --json > report.json

FOLDER LAYOUT:
  my_document/
    markdown/            page_001.md, page_002.md, …   (input)
    images/              Page_01.jpeg, Page_02.jpeg, … (input)
    markdown_images/     extracted figures             (created)
    processed_markdown/  rewritten markdown            (created)

PLACEHOLDER DIALECTS:
  embedded   <bbox>y_min,x_min,y_max,x_max</bbox> directly in the markdown
  external   bare <image_here> markers + page_{NNN}.json sidecars
             (enable with --boxes-dir)

EXIT STATUS:
  0 even when individual pages or tags produced warnings; non-zero only
  for unrecoverable setup errors (missing directories, corrupt sidecars).
"#;

/// Extract figures referenced by scanned-page Markdown bounding boxes.
#[derive(Parser, Debug)]
#[command(
    name = "scan2md",
    version,
    about = "Extract figures from scanned pages and link them into the Markdown",
    long_about = "Crop every figure a vision model located on a scanned page (normalized \
0-1000 bounding boxes), save the crops, and rewrite each page's Markdown so its \
placeholder tags become working image links.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document folder containing markdown/ and images/ subdirectories.
    root: PathBuf,

    /// Directory of page_{NNN}.json coordinate sidecars (external dialect).
    #[arg(long, env = "SCAN2MD_BOXES_DIR")]
    boxes_dir: Option<PathBuf>,

    /// Also write a _bbox copy of each page with the crop rectangle drawn on it.
    #[arg(long, env = "SCAN2MD_ANNOTATE")]
    annotate: bool,

    /// Coordinate scaling convention: per-axis (canonical) or uniform (legacy).
    #[arg(long, env = "SCAN2MD_SCALE_MODE", value_enum, default_value = "per-axis")]
    scale_mode: ScaleModeArg,

    /// Number of pages processed concurrently.
    #[arg(short, long, env = "SCAN2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Path prefix used in the generated image references.
    #[arg(long, env = "SCAN2MD_FIGURES_REL_PATH", default_value = "../markdown_images")]
    figures_rel_path: String,

    /// Output the structured per-page report as JSON instead of a summary.
    #[arg(long, env = "SCAN2MD_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "SCAN2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCAN2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCAN2MD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ScaleModeArg {
    PerAxis,
    Uniform,
}

impl From<ScaleModeArg> for ScaleMode {
    fn from(v: ScaleModeArg) -> Self {
        match v {
            ScaleModeArg::PerAxis => ScaleMode::PerAxis,
            ScaleModeArg::Uniform => ScaleMode::Uniform,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ProcessingProgressCallback>)
    } else {
        None
    };

    let mut builder = ProcessingConfig::builder()
        .scale_mode(cli.scale_mode.clone().into())
        .annotate(cli.annotate)
        .concurrency(cli.concurrency)
        .figures_rel_path(cli.figures_rel_path.clone());

    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = process_folder(&cli.root, cli.boxes_dir.as_deref(), &config)
        .await
        .context("Processing failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        // Inline summary when the progress callback is disabled.
        println!(
            "Processed {} page(s): {} figure(s), {} page(s) with warnings, {}ms",
            output.stats.processed_pages,
            output.stats.figures_extracted,
            output.stats.pages_with_warnings,
            output.stats.total_duration_ms,
        );
        for report in output.reports.iter().filter(|r| !r.is_clean()) {
            for w in &report.warnings {
                eprintln!("  warning: {w}");
            }
        }
    }

    Ok(())
}
