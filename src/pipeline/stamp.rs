//! Stamping: append a QR-code page to a copy of the original PDF.
//!
//! The QR raster and the one-page overlay document live in memory only. The
//! merged result is saved to a uniquely named temporary file inside the
//! output directory and renamed into place, so two documents stamped at the
//! same time never share a scratch file and a failed save leaves nothing
//! behind.

use crate::config::StampPlacement;
use crate::error::DocumentError;
use crate::pipeline::text::bind_pdfium;
use image::{DynamicImage, Luma};
use pdfium_render::prelude::*;
use qrcode::QrCode;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Writes a stamped copy of `source` and returns its path. Blocking.
pub trait Stamper: Send + Sync {
    fn stamp(&self, source: &Path, qr_url: &str) -> Result<PathBuf, DocumentError>;
}

/// Maps an input path to its output path by swapping one directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMapping {
    pub unprocessed: String,
    pub processed: String,
}

impl Default for OutputMapping {
    fn default() -> Self {
        Self {
            unprocessed: "unprocessed".to_string(),
            processed: "processed".to_string(),
        }
    }
}

impl OutputMapping {
    /// Replace every path component equal to `unprocessed` with `processed`.
    pub fn output_path(&self, source: &Path) -> Result<PathBuf, DocumentError> {
        let mut replaced = false;
        let mapped: PathBuf = source
            .components()
            .map(|c| match c {
                Component::Normal(name) if name == self.unprocessed.as_str() => {
                    replaced = true;
                    Component::Normal(self.processed.as_ref())
                }
                other => other,
            })
            .collect();

        if replaced {
            Ok(mapped)
        } else {
            Err(DocumentError::OutputPath {
                path: source.to_path_buf(),
                segment: self.unprocessed.clone(),
            })
        }
    }
}

/// [`Stamper`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumStamper {
    mapping: OutputMapping,
    placement: StampPlacement,
    lib_path: Option<PathBuf>,
}

impl PdfiumStamper {
    pub fn new(mapping: OutputMapping, placement: StampPlacement, lib_path: Option<PathBuf>) -> Self {
        Self {
            mapping,
            placement,
            lib_path,
        }
    }
}

impl Stamper for PdfiumStamper {
    fn stamp(&self, source: &Path, qr_url: &str) -> Result<PathBuf, DocumentError> {
        let output = self.mapping.output_path(source)?;
        let qr = render_qr(qr_url)?;

        let pdfium = bind_pdfium(self.lib_path.as_deref()).map_err(stamp_err)?;

        let mut document = pdfium
            .load_pdf_from_file(source, None)
            .map_err(|e| DocumentError::Pdf {
                path: source.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let overlay = build_overlay(&pdfium, &qr, &self.placement)?;
        document.pages_mut().append(&overlay).map_err(stamp_err)?;

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let tmp = tempfile::Builder::new()
            .prefix(".stamp-")
            .suffix(".pdf")
            .tempfile_in(dir)
            .map_err(|e| io_err(dir, e))?;
        document.save_to_file(tmp.path()).map_err(stamp_err)?;
        tmp.persist(&output).map_err(|e| io_err(&output, e.error))?;

        info!("Stamped QR on {} → {}", source.display(), output.display());
        Ok(output)
    }
}

/// Render `data` as a QR code raster.
pub fn render_qr(data: &str) -> Result<DynamicImage, DocumentError> {
    let code = QrCode::new(data.as_bytes()).map_err(stamp_err)?;
    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(10, 10)
        .quiet_zone(true)
        .build();
    debug!("QR rendered at {}x{} px", image.width(), image.height());
    Ok(DynamicImage::ImageLuma8(image))
}

/// A new one-page A4 document carrying the QR image at `placement`.
fn build_overlay<'a>(
    pdfium: &'a Pdfium,
    qr: &DynamicImage,
    placement: &StampPlacement,
) -> Result<PdfDocument<'a>, DocumentError> {
    let mut overlay = pdfium.create_new_pdf().map_err(stamp_err)?;
    {
        let mut page = overlay
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(stamp_err)?;

        page.objects_mut()
            .create_image_object(
                PdfPoints::new(placement.x),
                PdfPoints::new(placement.y),
                qr,
                Some(PdfPoints::new(placement.size)),
                Some(PdfPoints::new(placement.size)),
            )
            .map_err(stamp_err)?;
    }

    Ok(overlay)
}

fn stamp_err(e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Stamp {
        detail: e.to_string(),
    }
}

fn io_err(path: &Path, e: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}
