//! Error types for the fiscal-stamp library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FiscalError`] is **fatal**: a command cannot proceed at all (the watch
//!   directory is missing, the configuration is invalid, PDFium cannot be
//!   bound). Returned as `Err(FiscalError)` from the coordinator entry points.
//!
//! * [`DocumentError`] is **non-fatal**: a single document failed (unknown
//!   layout, malformed field, rejected by the fiscalization service). The
//!   worker logs it, reports it through the progress callback and moves on to
//!   the next queued file. The document is left in place.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the fiscal-stamp library.
///
/// Per-document failures use [`DocumentError`] and never abort the pipeline.
#[derive(Debug, Error)]
pub enum FiscalError {
    // ── Watcher errors ────────────────────────────────────────────────────
    /// The watch directory does not exist or is not a directory.
    #[error("Watch directory not found: '{path}'\nCreate it or pass --watch-dir.")]
    WatchDirNotFound { path: PathBuf },

    /// The filesystem notification backend refused to start.
    #[error("Failed to watch '{path}': {detail}")]
    Watch { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the binary, install it system-wide, or set\n\
PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Single-document commands ──────────────────────────────────────────
    /// The only document a command was asked to handle failed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panicked, signal handler failed).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// Grouped the way the worker reports them: unsupported layout, parse
/// failures, fiscalization failures and stamping failures. None of them are
/// retried.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    // ── Classification ────────────────────────────────────────────────────
    /// Neither the credit-note nor the invoice marker was found.
    #[error("Unsupported document type")]
    UnsupportedDocument,

    // ── Parse failures ────────────────────────────────────────────────────
    /// The input file could not be opened or inspected.
    #[error("Cannot read '{path}': {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// The file exists but does not start with the `%PDF` magic.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDFium could not open or read the document.
    #[error("Failed to read PDF '{path}': {detail}")]
    Pdf { path: PathBuf, detail: String },

    /// A required field label was not found in the text.
    #[error("Missing field '{field}'")]
    MissingField { field: String },

    /// The `Date` field is not a `dd/mm/yyyy` date.
    #[error("Invalid date '{value}': expected dd/mm/yyyy")]
    InvalidDate { value: String },

    /// A numeric header field could not be parsed.
    #[error("Invalid number '{value}' in field '{field}'")]
    InvalidNumber { field: String, value: String },

    /// An item line did not fit the name / quantity / price / tax layout.
    #[error("Unparseable item line '{line}': {detail}")]
    InvalidItemLine { line: String, detail: String },

    // ── Fiscalization failures ────────────────────────────────────────────
    /// The service answered with `success: false`.
    #[error("Fiscalization rejected: {message}")]
    Rejected { message: String },

    /// The request could not be sent or the answer could not be read.
    #[error("Fiscalization request failed: {detail}")]
    Transport { detail: String },

    // ── Stamping failures ─────────────────────────────────────────────────
    /// The input path has no `unprocessed` component to map to an output.
    #[error("Cannot derive output path for '{path}': no '{segment}' path component")]
    OutputPath { path: PathBuf, segment: String },

    /// QR generation or PDF composition failed.
    #[error("Stamping failed: {detail}")]
    Stamp { detail: String },

    /// Reading or writing a file failed.
    #[error("I/O error on '{path}': {detail}")]
    Io { path: PathBuf, detail: String },
}

impl DocumentError {
    /// `true` for failures raised while reading or parsing the input, before
    /// anything is sent to the fiscalization service.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            DocumentError::UnsupportedDocument
                | DocumentError::Unreadable { .. }
                | DocumentError::NotAPdf { .. }
                | DocumentError::Pdf { .. }
                | DocumentError::MissingField { .. }
                | DocumentError::InvalidDate { .. }
                | DocumentError::InvalidNumber { .. }
                | DocumentError::InvalidItemLine { .. }
        )
    }

    /// The pipeline stage that produced this error, for log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            DocumentError::Rejected { .. } | DocumentError::Transport { .. } => "fiscalization",
            DocumentError::OutputPath { .. }
            | DocumentError::Stamp { .. }
            | DocumentError::Io { .. } => "stamping",
            _ => "extraction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_carries_server_message() {
        let e = DocumentError::Rejected {
            message: "invalid device".into(),
        };
        assert!(e.to_string().contains("invalid device"), "got: {e}");
    }

    #[test]
    fn unsupported_display() {
        assert_eq!(
            DocumentError::UnsupportedDocument.to_string(),
            "Unsupported document type"
        );
    }

    #[test]
    fn output_path_display() {
        let e = DocumentError::OutputPath {
            path: PathBuf::from("/tmp/a.pdf"),
            segment: "unprocessed".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/a.pdf"));
        assert!(msg.contains("unprocessed"));
    }

    #[test]
    fn extraction_failure_classification() {
        assert!(DocumentError::UnsupportedDocument.is_extraction_failure());
        assert!(DocumentError::MissingField {
            field: "Date".into()
        }
        .is_extraction_failure());
        assert!(!DocumentError::Rejected {
            message: "x".into()
        }
        .is_extraction_failure());
        assert!(!DocumentError::Stamp { detail: "x".into() }.is_extraction_failure());
        assert!(DocumentError::Unreadable {
            path: PathBuf::from("a.pdf"),
            detail: "gone".into()
        }
        .is_extraction_failure());
    }

    #[test]
    fn stage_names_follow_the_pipeline() {
        let unreadable = DocumentError::Unreadable {
            path: PathBuf::from("a.pdf"),
            detail: "permission denied".into(),
        };
        assert_eq!(unreadable.stage(), "extraction");
        assert_eq!(
            DocumentError::Transport { detail: "x".into() }.stage(),
            "fiscalization"
        );
        assert_eq!(
            DocumentError::Io {
                path: PathBuf::from("processed/a.pdf"),
                detail: "disk full".into()
            }
            .stage(),
            "stamping"
        );
    }

    #[test]
    fn watch_dir_not_found_display() {
        let e = FiscalError::WatchDirNotFound {
            path: PathBuf::from("unprocessed"),
        };
        assert!(e.to_string().contains("unprocessed"));
    }
}
