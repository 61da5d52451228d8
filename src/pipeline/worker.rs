//! Extraction worker: drain the queue, one document at a time.
//!
//! For each path: read text → build payload → submit → stamp. Any
//! [`DocumentError`] ends that document's journey: it is logged, reported
//! through the progress callback, and the file is left where it is. Nothing
//! is retried or requeued.
//!
//! The loop awaits the queue instead of polling it and stops when the
//! shutdown signal fires or the queue closes. A shutdown never interrupts a
//! document mid-flight; it is only observed between documents.

use crate::config::PipelineConfig;
use crate::error::{DocumentError, FiscalError};
use crate::pipeline::extract::{extract_payload, PayloadDefaults};
use crate::pipeline::fiscalize::{Fiscalizer, HttpFiscalizer};
use crate::pipeline::queue::QueueReceiver;
use crate::pipeline::stamp::{OutputMapping, PdfiumStamper, Stamper};
use crate::pipeline::text::{PdfiumTextReader, TextReader};
use crate::pipeline::watcher::wait_until_written;
use crate::progress::ProgressCallback;
use crate::receipt::ReceiptPayload;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Create a connected shutdown pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), ShutdownSignal(rx))
}

/// Fires the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }
}

/// Resolves once shutdown has been triggered. Never resolves if the trigger
/// is dropped without firing.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub async fn wait(&mut self) {
        if self.0.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

/// Counts reported when the worker loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub stamped: usize,
    pub skipped: usize,
}

/// The services a document passes through.
#[derive(Clone)]
pub struct DocumentProcessor {
    text_reader: Arc<dyn TextReader>,
    fiscalizer: Arc<dyn Fiscalizer>,
    stamper: Arc<dyn Stamper>,
    defaults: PayloadDefaults,
    settle_interval: Duration,
    settle_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl DocumentProcessor {
    /// Build from config: injected services win, pdfium / HTTP otherwise.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, FiscalError> {
        let text_reader = match config.text_reader {
            Some(ref r) => Arc::clone(r),
            None => Arc::new(PdfiumTextReader::new(config.pdfium_lib_path.clone())),
        };

        let fiscalizer = match config.fiscalizer {
            Some(ref f) => Arc::clone(f),
            None => Arc::new(HttpFiscalizer::from_config(config)?),
        };

        let stamper = match config.stamper {
            Some(ref s) => Arc::clone(s),
            None => Arc::new(PdfiumStamper::new(
                OutputMapping {
                    unprocessed: config.unprocessed_segment.clone(),
                    processed: config.processed_segment.clone(),
                },
                config.stamp,
                config.pdfium_lib_path.clone(),
            )),
        };

        Ok(Self {
            text_reader,
            fiscalizer,
            stamper,
            defaults: PayloadDefaults::from(config),
            settle_interval: Duration::from_millis(config.settle_interval_ms),
            settle_timeout: Duration::from_millis(config.settle_timeout_ms),
            progress: config.progress_callback.clone(),
        })
    }

    /// Read and classify a document, producing its payload.
    ///
    /// Waits for the file size to settle first, so a file still being
    /// copied in is not read half-written.
    pub async fn extract(&self, path: &Path) -> Result<ReceiptPayload, DocumentError> {
        wait_until_written(path, self.settle_interval, self.settle_timeout).await?;

        let reader = Arc::clone(&self.text_reader);
        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || reader.read_text(&owned))
            .await
            .map_err(|e| DocumentError::Pdf {
                path: path.to_path_buf(),
                detail: format!("text reader task failed: {e}"),
            })??;

        extract_payload(&text, &self.defaults)
    }

    /// Run one document through extract → submit → stamp.
    ///
    /// Failures are logged and reported here; the returned error is for the
    /// caller's bookkeeping only.
    pub async fn process(&self, path: &Path) -> Result<PathBuf, DocumentError> {
        info!("Processing {}", path.display());
        if let Some(ref cb) = self.progress {
            cb.on_document_start(path);
        }

        match self.run_stages(path).await {
            Ok(output) => {
                if let Some(ref cb) = self.progress {
                    cb.on_document_stamped(path, &output);
                }
                Ok(output)
            }
            Err(e) => {
                warn!("Skipping {}: {} failed: {}", path.display(), e.stage(), e);
                if let Some(ref cb) = self.progress {
                    cb.on_document_skipped(path, &e);
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&self, path: &Path) -> Result<PathBuf, DocumentError> {
        let payload = self.extract(path).await?;
        if let Some(ref cb) = self.progress {
            cb.on_document_extracted(path, &payload);
        }

        let qr_url = self.fiscalizer.submit(&payload).await?;

        let stamper = Arc::clone(&self.stamper);
        let source = path.to_path_buf();
        tokio::task::spawn_blocking(move || stamper.stamp(&source, &qr_url))
            .await
            .map_err(|e| DocumentError::Stamp {
                detail: format!("stamping task failed: {e}"),
            })?
    }
}

/// Single consumer of the work queue.
pub struct ExtractionWorker {
    queue: QueueReceiver,
    processor: DocumentProcessor,
}

impl ExtractionWorker {
    pub fn new(queue: QueueReceiver, processor: DocumentProcessor) -> Self {
        Self { queue, processor }
    }

    pub fn from_config(queue: QueueReceiver, config: &PipelineConfig) -> Result<Self, FiscalError> {
        Ok(Self::new(queue, DocumentProcessor::from_config(config)?))
    }

    /// Process queued documents until shutdown or until the queue closes.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> WorkerStats {
        let mut stats = WorkerStats::default();

        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Worker stopping: shutdown requested ({} still queued)", self.queue.len());
                    break;
                }
                item = self.queue.next() => match item {
                    Some(item) => item,
                    None => {
                        info!("Worker stopping: queue closed");
                        break;
                    }
                },
            };

            match self.processor.process(&item.path).await {
                Ok(_) => stats.stamped += 1,
                Err(_) => stats.skipped += 1,
            }
        }

        if let Some(ref cb) = self.processor.progress {
            cb.on_pipeline_stopped(stats.stamped, stats.skipped);
        }
        stats
    }
}
