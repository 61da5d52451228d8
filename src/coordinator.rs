//! Entry points that wire the pipeline together.
//!
//! The coordinator owns the work queue: the watcher gets a sender, the worker
//! gets the receiver. Nothing else shares it.
//!
//! The `*_until` variants take the stop condition as a future so that tests
//! (and embedders) can stop the pipeline without sending a real Ctrl-C.

use crate::config::PipelineConfig;
use crate::error::FiscalError;
use crate::pipeline::queue::{work_queue, QueueSender};
use crate::pipeline::watcher::{existing_pdfs, DirectoryWatcher};
use crate::pipeline::worker::{shutdown_channel, DocumentProcessor, ExtractionWorker};
use crate::receipt::ReceiptPayload;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Totals for one run of the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// PDFs the watcher (or the start-up scan) put on the queue.
    pub detected: usize,
    /// Documents fiscalized and written to the output directory.
    pub stamped: usize,
    /// Documents that failed at any stage and were left in place.
    pub skipped: usize,
}

/// Watch, fiscalize and stamp until Ctrl-C.
///
/// On interrupt the watcher stops first, then the worker is cancelled. A
/// document already being processed is finished; anything still queued is
/// dropped and stays in the watch directory. If the worker task dies on its
/// own, the run ends with [`FiscalError::Internal`] instead of waiting for
/// the interrupt.
///
/// # Errors
/// Returns `Err(FiscalError)` only if the pipeline cannot start. Per-document
/// failures are counted in [`PipelineStats::skipped`].
pub async fn run_pipeline(config: &PipelineConfig) -> Result<PipelineStats, FiscalError> {
    run_pipeline_until(config, ctrl_c()).await
}

/// [`run_pipeline`] with a caller-supplied stop condition.
pub async fn run_pipeline_until<F>(
    config: &PipelineConfig,
    stop: F,
) -> Result<PipelineStats, FiscalError>
where
    F: Future<Output = ()>,
{
    let (tx, rx) = work_queue();

    // ── Step 1: Build services before anything starts ────────────────────
    let worker = ExtractionWorker::from_config(rx, config)?;

    // ── Step 2: Start watching ───────────────────────────────────────────
    let watcher = DirectoryWatcher::start(
        &config.watch_dir,
        tx.clone(),
        config.progress_callback.clone(),
    )?;

    // ── Step 3: Optionally pick up files that arrived while we were down ─
    if config.scan_existing {
        enqueue_existing(config, &tx)?;
    }

    // ── Step 4: Run the worker until told to stop ────────────────────────
    let (trigger, signal) = shutdown_channel();
    let mut handle = tokio::spawn(worker.run(signal));

    tokio::pin!(stop);
    let finished_early = tokio::select! {
        _ = &mut stop => {
            info!("Shutdown requested, stopping watcher");
            None
        }
        joined = &mut handle => {
            warn!("Worker ended before shutdown was requested, stopping watcher");
            Some(joined)
        }
    };
    watcher.stop();
    trigger.trigger();

    let joined = match finished_early {
        Some(joined) => joined,
        None => handle.await,
    };
    let worker_stats =
        joined.map_err(|e| FiscalError::Internal(format!("worker task failed: {e}")))?;

    let stats = PipelineStats {
        detected: tx.pushed(),
        stamped: worker_stats.stamped,
        skipped: worker_stats.skipped,
    };
    info!(
        "Pipeline stopped: {} detected, {} stamped, {} skipped",
        stats.detected, stats.stamped, stats.skipped
    );
    Ok(stats)
}

/// Watch only: report detected PDFs until Ctrl-C, processing nothing.
///
/// Returns how many PDFs were detected.
pub async fn watch_only(config: &PipelineConfig) -> Result<usize, FiscalError> {
    watch_only_until(config, ctrl_c()).await
}

/// [`watch_only`] with a caller-supplied stop condition.
pub async fn watch_only_until<F>(config: &PipelineConfig, stop: F) -> Result<usize, FiscalError>
where
    F: Future<Output = ()>,
{
    let (tx, mut rx) = work_queue();
    let watcher = DirectoryWatcher::start(
        &config.watch_dir,
        tx.clone(),
        config.progress_callback.clone(),
    )?;

    if config.scan_existing {
        enqueue_existing(config, &tx)?;
    }

    // Nobody consumes in this mode; keep the queue from growing.
    let drain = tokio::spawn(async move { while rx.next().await.is_some() {} });

    stop.await;
    watcher.stop();
    let detected = tx.pushed();
    drop(tx);
    let _ = drain.await;

    info!("Watch stopped: {} PDFs detected", detected);
    Ok(detected)
}

/// Read one PDF and build its payload without submitting anything.
pub async fn extract_file(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ReceiptPayload, FiscalError> {
    let processor = DocumentProcessor::from_config(config)?;
    Ok(processor.extract(path.as_ref()).await?)
}

/// Run one PDF through extract → submit → stamp, returning the output path.
pub async fn process_file(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PathBuf, FiscalError> {
    let processor = DocumentProcessor::from_config(config)?;
    Ok(processor.process(path.as_ref()).await?)
}

fn enqueue_existing(config: &PipelineConfig, tx: &QueueSender) -> Result<(), FiscalError> {
    let found = existing_pdfs(&config.watch_dir).map_err(|e| FiscalError::Watch {
        path: config.watch_dir.clone(),
        detail: e.to_string(),
    })?;
    info!("Found {} existing PDFs in {}", found.len(), config.watch_dir.display());

    for path in found {
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_detected(&path);
        }
        tx.push(path);
    }
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C ({}), stopping", e);
    }
}
