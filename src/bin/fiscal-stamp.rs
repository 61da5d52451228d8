//! CLI binary for fiscal-stamp.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fiscal_stamp::{
    extract_file, process_file, run_pipeline, watch_only, DayStatus, DocumentError,
    PipelineConfig, PipelineProgressCallback, ProgressCallback, ReceiptPayload, StampPlacement,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
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

/// Spinner anchored at the bottom of the terminal with one log line per
/// document above it.
struct CliProgressCallback {
    bar: ProgressBar,
    stamped: AtomicUsize,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new(watch_dir: &Path) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Watching");
        bar.set_message(watch_dir.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stamped: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        })
    }

    fn idle_message(&self) {
        self.bar.set_prefix("Watching");
        self.bar.set_message(format!(
            "{} stamped, {} skipped",
            self.stamped.load(Ordering::SeqCst),
            self.skipped.load(Ordering::SeqCst)
        ));
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_document_detected(&self, path: &Path) {
        self.bar
            .println(format!("{} {}", cyan("◆"), dim(&path.display().to_string())));
    }

    fn on_document_start(&self, path: &Path) {
        self.bar.set_prefix("Processing");
        self.bar.set_message(file_name(path));
    }

    fn on_document_extracted(&self, _path: &Path, payload: &ReceiptPayload) {
        self.bar.set_message(format!(
            "{} {:?} {:.2}",
            payload.invoice_no.as_deref().unwrap_or("?"),
            payload.receipt_currency,
            payload.total_payment()
        ));
    }

    fn on_document_stamped(&self, source: &Path, output: &Path) {
        self.stamped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  →  {}",
            green("✓"),
            file_name(source),
            bold(&output.display().to_string())
        ));
        self.idle_message();
    }

    fn on_document_skipped(&self, path: &Path, error: &DocumentError) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            file_name(path),
            red(&truncate(&error.to_string(), 80))
        ));
        self.idle_message();
    }

    fn on_pipeline_stopped(&self, stamped: usize, skipped: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} stamped  {} skipped",
            if skipped == 0 { green("✔") } else { cyan("⚠") },
            bold(&stamped.to_string()),
            if skipped == 0 {
                dim("0")
            } else {
                red(&skipped.to_string())
            },
        );
    }
}

/// Prints every detected path to stdout; used by `watch`.
struct PrintDetected;

impl PipelineProgressCallback for PrintDetected {
    fn on_document_detected(&self, path: &Path) {
        println!("{}", path.display());
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Watch ./unprocessed, fiscalize and stamp into ./processed
  fiscal-stamp run

  # Also pick up PDFs that arrived while the service was down
  fiscal-stamp run --scan-existing --watch-dir /srv/docs/unprocessed

  # Point at a local fiscalization service with a 30 s timeout
  fiscal-stamp run --endpoint http://localhost:8080/api/fiscalize --timeout 30

  # Show what would be submitted for one file
  fiscal-stamp extract unprocessed/INV-0042.pdf

  # Fiscalize and stamp a single file
  fiscal-stamp process unprocessed/INV-0042.pdf

  # Only report new files
  fiscal-stamp watch

  # Day status widget
  fiscal-stamp status

ENVIRONMENT VARIABLES:
  FISCAL_STAMP_WATCH_DIR         Directory to watch (default: unprocessed)
  FISCAL_STAMP_ENDPOINT          Fiscalization endpoint URL
  FISCAL_STAMP_TIMEOUT           HTTP request timeout in seconds (default: none)
  FISCAL_STAMP_SETTLE_MS         Size check interval for new files (default: 250)
  FISCAL_STAMP_INVOICE_DEVICE    Device ID for invoices (default: 19014)
  FISCAL_STAMP_CREDIT_DEVICE     Device ID for credit notes (default: 19250)
  PDFIUM_LIB_PATH                Path to an existing libpdfium
  RUST_LOG                       Override the log filter
"#;

/// Fiscalize invoice and credit-note PDFs and stamp them with a QR code.
#[derive(Parser, Debug)]
#[command(
    name = "fiscal-stamp",
    version,
    about = "Fiscalize invoice and credit-note PDFs and stamp them with a QR code",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FISCAL_STAMP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FISCAL_STAMP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch, fiscalize and stamp until Ctrl-C.
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Enqueue PDFs already in the watch directory at start-up.
        #[arg(long, env = "FISCAL_STAMP_SCAN_EXISTING")]
        scan_existing: bool,

        /// Disable the spinner and per-document lines.
        #[arg(long, env = "FISCAL_STAMP_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Print new PDFs as they appear, without processing them.
    Watch {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Also print PDFs already in the watch directory.
        #[arg(long)]
        scan_existing: bool,
    },

    /// Print the payload that would be submitted for one PDF, as JSON.
    Extract {
        file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Fiscalize and stamp one PDF.
    Process {
        file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Interactive day-status widget.
    Status,
}

#[derive(Args, Debug, Clone)]
struct PipelineArgs {
    /// Directory watched for new PDFs.
    #[arg(long, env = "FISCAL_STAMP_WATCH_DIR", default_value = "unprocessed")]
    watch_dir: PathBuf,

    /// Path component replaced to form the output path.
    #[arg(long, env = "FISCAL_STAMP_UNPROCESSED", default_value = "unprocessed")]
    unprocessed: String,

    /// Replacement path component for stamped output.
    #[arg(long, env = "FISCAL_STAMP_PROCESSED", default_value = "processed")]
    processed: String,

    /// Fiscalization endpoint.
    #[arg(long, env = "FISCAL_STAMP_ENDPOINT", default_value = fiscal_stamp::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// HTTP request timeout in seconds. No timeout if unset.
    #[arg(long, env = "FISCAL_STAMP_TIMEOUT")]
    timeout: Option<u64>,

    /// Milliseconds between size checks on a newly arrived file.
    #[arg(long, env = "FISCAL_STAMP_SETTLE_MS", default_value_t = fiscal_stamp::config::DEFAULT_SETTLE_INTERVAL_MS)]
    settle_ms: u64,

    /// Give up waiting for a new file to stop growing after this many milliseconds.
    #[arg(long, env = "FISCAL_STAMP_SETTLE_TIMEOUT_MS", default_value_t = fiscal_stamp::config::DEFAULT_SETTLE_TIMEOUT_MS)]
    settle_timeout_ms: u64,

    /// Device ID for fiscal invoices.
    #[arg(long, env = "FISCAL_STAMP_INVOICE_DEVICE", default_value_t = fiscal_stamp::config::DEFAULT_INVOICE_DEVICE_ID)]
    invoice_device_id: u32,

    /// Device ID for credit notes.
    #[arg(long, env = "FISCAL_STAMP_CREDIT_DEVICE", default_value_t = fiscal_stamp::config::DEFAULT_CREDIT_NOTE_DEVICE_ID)]
    credit_note_device_id: u32,

    /// Money-type code of the payment entry.
    #[arg(long, env = "FISCAL_STAMP_MONEY_TYPE", default_value_t = 1)]
    money_type_code: u32,

    /// Notes sent with credit notes.
    #[arg(long, env = "FISCAL_STAMP_CREDIT_REASON", default_value = fiscal_stamp::config::DEFAULT_CREDIT_NOTE_REASON)]
    credit_note_reason: String,

    /// QR code x position in points.
    #[arg(long, default_value_t = 50.0)]
    qr_x: f32,

    /// QR code y position in points.
    #[arg(long, default_value_t = 750.0)]
    qr_y: f32,

    /// QR code edge length in points.
    #[arg(long, default_value_t = 100.0)]
    qr_size: f32,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs for `run`; `status` owns the terminal.
    let show_progress = !cli.quiet
        && matches!(
            cli.command,
            Command::Run {
                no_progress: false,
                ..
            }
        );
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || matches!(cli.command, Command::Status) {
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

    match cli.command {
        Command::Run {
            pipeline,
            scan_existing,
            ..
        } => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new(&pipeline.watch_dir) as ProgressCallback)
            } else {
                None
            };
            let config = build_config(&pipeline, scan_existing, progress)?;
            let stats = run_pipeline(&config).await.context("Pipeline failed")?;

            if !cli.quiet && !show_progress {
                eprintln!(
                    "Detected {}, stamped {}, skipped {}",
                    stats.detected, stats.stamped, stats.skipped
                );
            }
        }

        Command::Watch {
            pipeline,
            scan_existing,
        } => {
            let config = build_config(&pipeline, scan_existing, Some(Arc::new(PrintDetected) as ProgressCallback))?;
            let detected = watch_only(&config).await.context("Watch failed")?;
            if !cli.quiet {
                eprintln!("{} {} PDFs detected", green("✔"), bold(&detected.to_string()));
            }
        }

        Command::Extract { file, pipeline } => {
            let config = build_config(&pipeline, false, None)?;
            let payload = extract_file(&file, &config)
                .await
                .with_context(|| format!("Failed to extract {}", file.display()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("Failed to serialise payload")?
            );
        }

        Command::Process { file, pipeline } => {
            let config = build_config(&pipeline, false, None)?;
            let output = process_file(&file, &config)
                .await
                .with_context(|| format!("Failed to process {}", file.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {}  →  {}",
                    green("✔"),
                    file.display(),
                    bold(&output.display().to_string())
                );
            }
        }

        Command::Status => {
            tokio::task::spawn_blocking(status_widget)
                .await
                .context("Status widget task failed")??;
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(
    args: &PipelineArgs,
    scan_existing: bool,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .watch_dir(args.watch_dir.clone())
        .output_segments(args.unprocessed.clone(), args.processed.clone())
        .endpoint(args.endpoint.clone())
        .invoice_device_id(args.invoice_device_id)
        .credit_note_device_id(args.credit_note_device_id)
        .money_type_code(args.money_type_code)
        .credit_note_reason(args.credit_note_reason.clone())
        .stamp(StampPlacement {
            x: args.qr_x,
            y: args.qr_y,
            size: args.qr_size,
        })
        .settle(args.settle_ms, args.settle_timeout_ms)
        .scan_existing(scan_existing);

    if let Some(secs) = args.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref path) = args.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

// ── Day-status widget ────────────────────────────────────────────────────────

fn status_widget() -> Result<()> {
    let mut status = DayStatus::initial();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        render_status(status)?;
        match lines.next() {
            Some(line) => {
                let line = line.context("Failed to read from stdin")?;
                match line.trim() {
                    "q" | "Q" => break,
                    "" => status = status.toggle(),
                    _ => {}
                }
            }
            None => break,
        }
    }
    Ok(())
}

fn render_status(status: DayStatus) -> Result<()> {
    let headline = if status.is_open() {
        green(status.headline())
    } else {
        red(status.headline())
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out)?;
    writeln!(out, "  {}", bold(&headline))?;
    write!(
        out,
        "  {}  {}  ",
        cyan(&format!("[Enter] {}", status.button_label())),
        dim("[q] quit")
    )?;
    out.flush()?;
    Ok(())
}
