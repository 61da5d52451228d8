//! Progress-callback trait for per-document pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the watcher detects files and the worker processes them.
//!
//! # Example
//!
//! ```rust
//! use fiscal_stamp::{PipelineConfig, PipelineProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stamped: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_document_stamped(&self, source: &Path, output: &Path) {
//!         let done = self.stamped.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{done}: {} -> {}", source.display(), output.display());
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { stamped: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::DocumentError;
use crate::receipt::ReceiptPayload;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it moves each document along.
///
/// `on_document_detected` runs on the filesystem watcher's event thread; all
/// other methods run on the worker. Implementations must be `Send + Sync`.
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// A PDF was enqueued.
    fn on_document_detected(&self, path: &Path) {
        let _ = path;
    }

    /// The worker dequeued a PDF and starts extracting it.
    fn on_document_start(&self, path: &Path) {
        let _ = path;
    }

    /// Extraction produced a payload that is about to be submitted.
    fn on_document_extracted(&self, path: &Path, payload: &ReceiptPayload) {
        let _ = (path, payload);
    }

    /// The stamped copy was written.
    fn on_document_stamped(&self, source: &Path, output: &Path) {
        let _ = (source, output);
    }

    /// The document was abandoned. It stays where it is.
    fn on_document_skipped(&self, path: &Path, error: &DocumentError) {
        let _ = (path, error);
    }

    /// The worker loop ended.
    fn on_pipeline_stopped(&self, stamped: usize, skipped: usize) {
        let _ = (stamped, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        detected: AtomicUsize,
        stamped: AtomicUsize,
        skipped: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_document_detected(&self, _path: &Path) {
            self.detected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_stamped(&self, _source: &Path, _output: &Path) {
            self.stamped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_skipped(&self, _path: &Path, _error: &DocumentError) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let p = Path::new("unprocessed/a.pdf");
        cb.on_document_detected(p);
        cb.on_document_start(p);
        cb.on_document_stamped(p, Path::new("processed/a.pdf"));
        cb.on_document_skipped(p, &DocumentError::UnsupportedDocument);
        cb.on_pipeline_stopped(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let p = Path::new("unprocessed/a.pdf");

        tracker.on_document_detected(p);
        tracker.on_document_detected(p);
        tracker.on_document_stamped(p, Path::new("processed/a.pdf"));
        tracker.on_document_skipped(p, &DocumentError::UnsupportedDocument);

        assert_eq!(tracker.detected.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.stamped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_start(Path::new("x.pdf"));
    }
}
