//! Configuration types for the fiscalization pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The defaults reproduce the fixed deployment
//! the pipeline was written for: watch `unprocessed/`, write to `processed/`,
//! post to the remote fiscalization endpoint.

use crate::error::FiscalError;
use crate::pipeline::fiscalize::Fiscalizer;
use crate::pipeline::stamp::Stamper;
use crate::pipeline::text::TextReader;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_ENDPOINT: &str = "https://remote-backend/api/fiscalize";
pub const DEFAULT_INVOICE_DEVICE_ID: u32 = 19014;
pub const DEFAULT_CREDIT_NOTE_DEVICE_ID: u32 = 19250;
pub const DEFAULT_CREDIT_NOTE_REASON: &str = "Incorrectly supplied goods";
pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 250;
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 30_000;

/// Configuration for the watch → extract → fiscalize → stamp pipeline.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use fiscal_stamp::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .watch_dir("inbox/unprocessed")
///     .endpoint("http://localhost:8080/api/fiscalize")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory watched (non-recursively) for new PDFs. Default: `unprocessed`.
    pub watch_dir: PathBuf,

    /// Path component replaced when deriving the output path. Default: `unprocessed`.
    pub unprocessed_segment: String,

    /// Replacement for [`Self::unprocessed_segment`]. Default: `processed`.
    pub processed_segment: String,

    /// Fiscalization endpoint receiving the JSON payload.
    pub endpoint: String,

    /// Optional HTTP request timeout. Default: none.
    pub request_timeout_secs: Option<u64>,

    /// Device ID stamped on invoices. Default: 19014.
    pub invoice_device_id: u32,

    /// Device ID stamped on credit notes and their back-reference. Default: 19250.
    pub credit_note_device_id: u32,

    /// Money-type code of the single payment entry. Default: 1.
    pub money_type_code: u32,

    /// `receiptNotes` text sent with credit notes.
    pub credit_note_reason: String,

    /// Where the QR code lands on the overlay page.
    pub stamp: StampPlacement,

    /// How often a new file's size is sampled before reading it. The file is
    /// read once two samples agree. Default: 250 ms.
    pub settle_interval_ms: u64,

    /// Upper bound on the size-settle wait. Default: 30 s.
    pub settle_timeout_ms: u64,

    /// Enqueue PDFs already present in the watch directory at start-up. Default: false.
    pub scan_existing: bool,

    /// Explicit libpdfium path. If None, tries `./` then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Pre-constructed fiscalization client. Takes precedence over `endpoint`.
    pub fiscalizer: Option<Arc<dyn Fiscalizer>>,

    /// Pre-constructed text reader. Default: PDFium.
    pub text_reader: Option<Arc<dyn TextReader>>,

    /// Pre-constructed stamper. Default: PDFium.
    pub stamper: Option<Arc<dyn Stamper>>,

    /// Receives per-document pipeline events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("unprocessed"),
            unprocessed_segment: "unprocessed".to_string(),
            processed_segment: "processed".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: None,
            invoice_device_id: DEFAULT_INVOICE_DEVICE_ID,
            credit_note_device_id: DEFAULT_CREDIT_NOTE_DEVICE_ID,
            money_type_code: 1,
            credit_note_reason: DEFAULT_CREDIT_NOTE_REASON.to_string(),
            stamp: StampPlacement::default(),
            settle_interval_ms: DEFAULT_SETTLE_INTERVAL_MS,
            settle_timeout_ms: DEFAULT_SETTLE_TIMEOUT_MS,
            scan_existing: false,
            pdfium_lib_path: None,
            fiscalizer: None,
            text_reader: None,
            stamper: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("watch_dir", &self.watch_dir)
            .field("unprocessed_segment", &self.unprocessed_segment)
            .field("processed_segment", &self.processed_segment)
            .field("endpoint", &self.endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("invoice_device_id", &self.invoice_device_id)
            .field("credit_note_device_id", &self.credit_note_device_id)
            .field("money_type_code", &self.money_type_code)
            .field("stamp", &self.stamp)
            .field("settle_interval_ms", &self.settle_interval_ms)
            .field("settle_timeout_ms", &self.settle_timeout_ms)
            .field("scan_existing", &self.scan_existing)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("fiscalizer", &self.fiscalizer.as_ref().map(|_| "<dyn Fiscalizer>"))
            .field("text_reader", &self.text_reader.as_ref().map(|_| "<dyn TextReader>"))
            .field("stamper", &self.stamper.as_ref().map(|_| "<dyn Stamper>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watch_dir = dir.into();
        self
    }

    pub fn output_segments(
        mut self,
        unprocessed: impl Into<String>,
        processed: impl Into<String>,
    ) -> Self {
        self.config.unprocessed_segment = unprocessed.into();
        self.config.processed_segment = processed.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn invoice_device_id(mut self, id: u32) -> Self {
        self.config.invoice_device_id = id;
        self
    }

    pub fn credit_note_device_id(mut self, id: u32) -> Self {
        self.config.credit_note_device_id = id;
        self
    }

    pub fn money_type_code(mut self, code: u32) -> Self {
        self.config.money_type_code = code;
        self
    }

    pub fn credit_note_reason(mut self, reason: impl Into<String>) -> Self {
        self.config.credit_note_reason = reason.into();
        self
    }

    pub fn stamp(mut self, placement: StampPlacement) -> Self {
        self.config.stamp = placement;
        self
    }

    /// Size-settle sampling interval and overall limit, in milliseconds.
    pub fn settle(mut self, interval_ms: u64, timeout_ms: u64) -> Self {
        self.config.settle_interval_ms = interval_ms;
        self.config.settle_timeout_ms = timeout_ms;
        self
    }

    pub fn scan_existing(mut self, v: bool) -> Self {
        self.config.scan_existing = v;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn fiscalizer(mut self, fiscalizer: Arc<dyn Fiscalizer>) -> Self {
        self.config.fiscalizer = Some(fiscalizer);
        self
    }

    pub fn text_reader(mut self, reader: Arc<dyn TextReader>) -> Self {
        self.config.text_reader = Some(reader);
        self
    }

    pub fn stamper(mut self, stamper: Arc<dyn Stamper>) -> Self {
        self.config.stamper = Some(stamper);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, FiscalError> {
        let c = &self.config;
        if c.fiscalizer.is_none()
            && !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://"))
        {
            return Err(FiscalError::InvalidConfig(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.unprocessed_segment.is_empty() || c.processed_segment.is_empty() {
            return Err(FiscalError::InvalidConfig(
                "Output path segments must not be empty".into(),
            ));
        }
        if c.unprocessed_segment == c.processed_segment {
            return Err(FiscalError::InvalidConfig(format!(
                "Input and output segments are both '{}'",
                c.processed_segment
            )));
        }
        if c.stamp.size <= 0.0 {
            return Err(FiscalError::InvalidConfig(format!(
                "QR size must be positive, got {}",
                c.stamp.size
            )));
        }
        if c.settle_interval_ms == 0 {
            return Err(FiscalError::InvalidConfig(
                "Settle interval must be at least 1 ms".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Placement of the QR image on the overlay page, in PDF points with the
/// origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampPlacement {
    pub x: f32,
    pub y: f32,
    /// Width and height of the square QR image.
    pub size: f32,
}

impl Default for StampPlacement {
    fn default() -> Self {
        Self {
            x: 50.0,
            y: 750.0,
            size: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_deployment() {
        let c = PipelineConfig::default();
        assert_eq!(c.watch_dir, PathBuf::from("unprocessed"));
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.invoice_device_id, 19014);
        assert_eq!(c.credit_note_device_id, 19250);
        assert_eq!(c.money_type_code, 1);
        assert_eq!(c.request_timeout_secs, None);
        assert_eq!(c.stamp, StampPlacement { x: 50.0, y: 750.0, size: 100.0 });
        assert!(!c.scan_existing);
        assert_eq!(c.settle_interval_ms, 250);
        assert_eq!(c.settle_timeout_ms, 30_000);
    }

    #[test]
    fn builder_rejects_zero_settle_interval() {
        assert!(PipelineConfig::builder().settle(0, 1000).build().is_err());
    }

    #[test]
    fn builder_rejects_non_http_endpoint() {
        let err = PipelineConfig::builder()
            .endpoint("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn builder_rejects_identical_segments() {
        assert!(PipelineConfig::builder()
            .output_segments("inbox", "inbox")
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_empty_qr() {
        assert!(PipelineConfig::builder()
            .stamp(StampPlacement { x: 0.0, y: 0.0, size: 0.0 })
            .build()
            .is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let c = PipelineConfig::builder()
            .watch_dir("in/unprocessed")
            .endpoint("http://localhost:9000/fiscalize")
            .request_timeout_secs(15)
            .scan_existing(true)
            .build()
            .unwrap();
        assert_eq!(c.watch_dir, PathBuf::from("in/unprocessed"));
        assert_eq!(c.request_timeout_secs, Some(15));
        assert!(c.scan_existing);
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", PipelineConfig::default());
        assert!(dbg.contains("PipelineConfig"));
        assert!(dbg.contains("fiscalizer: None"));
    }
}
