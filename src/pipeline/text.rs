//! Text reading: pull the full text of a PDF out through pdfium.
//!
//! Pages are joined with `\n`; a page whose text layer cannot be read
//! contributes an empty string rather than failing the document. We validate
//! the PDF magic bytes (`%PDF`) first so a half-copied or mislabelled file
//! gives a meaningful error instead of a pdfium failure.

use crate::error::{DocumentError, FiscalError};
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of document text. Blocking; the worker calls it from
/// `spawn_blocking`.
pub trait TextReader: Send + Sync {
    fn read_text(&self, path: &Path) -> Result<String, DocumentError>;
}

/// [`TextReader`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextReader {
    lib_path: Option<PathBuf>,
}

impl PdfiumTextReader {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }
}

impl TextReader for PdfiumTextReader {
    fn read_text(&self, path: &Path) -> Result<String, DocumentError> {
        check_pdf_magic(path)?;

        let pdfium = bind_pdfium(self.lib_path.as_deref()).map_err(|e| DocumentError::Pdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| DocumentError::Pdf {
                path: path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let texts: Vec<String> = document
            .pages()
            .iter()
            .map(|page| page.text().map(|t| t.all()).unwrap_or_default())
            .collect();

        debug!("Read {} pages of text from {}", texts.len(), path.display());
        Ok(normalise_line_endings(&texts.join("\n")))
    }
}

/// Bind to pdfium: an explicit library path if given, else `./`, else the
/// system library.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, FiscalError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| FiscalError::PdfiumBindingFailed(e.to_string()))?;

    Ok(Pdfium::new(bindings))
}

/// Reject files that do not start with `%PDF`.
pub fn check_pdf_magic(path: &Path) -> Result<(), DocumentError> {
    let mut file = std::fs::File::open(path).map_err(|e| DocumentError::Unreadable {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) if &magic == b"%PDF" => Ok(()),
        Ok(()) => Err(DocumentError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        }),
        Err(_) => Err(DocumentError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        }),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}
