//! # fiscal-stamp
//!
//! Watch a directory for invoice and credit-note PDFs, fiscalize each one
//! with a remote service, and write a copy carrying the returned QR code.
//!
//! ## Pipeline Overview
//!
//! ```text
//! unprocessed/*.pdf
//!  │
//!  ├─ 1. Watch     notify backend, creation events for `.pdf` only
//!  ├─ 2. Queue     unbounded FIFO, single consumer
//!  ├─ 3. Text      pdfium text layer, pages joined with `\n`
//!  ├─ 4. Extract   classify, pull labelled fields and item lines
//!  ├─ 5. Submit    POST JSON payload, receive `qr_url`
//!  └─ 6. Stamp     QR on a new A4 page → processed/*.pdf
//! ```
//!
//! A document that fails at any step is logged and left where it is; the
//! pipeline carries on with the next one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fiscal_stamp::{run_pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .watch_dir("documents/unprocessed")
//!         .endpoint("http://localhost:8080/api/fiscalize")
//!         .build()?;
//!     let stats = run_pipeline(&config).await?;
//!     eprintln!("{} stamped, {} skipped", stats.stamped, stats.skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fiscal-stamp` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod receipt;
pub mod status;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, StampPlacement};
pub use coordinator::{
    extract_file, process_file, run_pipeline, run_pipeline_until, watch_only, watch_only_until,
    PipelineStats,
};
pub use error::{DocumentError, FiscalError};
pub use pipeline::fiscalize::{Fiscalizer, HttpFiscalizer};
pub use pipeline::stamp::{OutputMapping, PdfiumStamper, Stamper};
pub use pipeline::text::{PdfiumTextReader, TextReader};
pub use pipeline::worker::WorkerStats;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use receipt::{
    CreditDebitNote, Currency, FiscalizationResult, ReceiptLine, ReceiptPayload, ReceiptPayment,
    ReceiptType, WorkItem,
};
pub use status::DayStatus;
