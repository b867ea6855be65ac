//! Page-text extraction for PDF artifacts via pdfium.
//!
//! The extractor only depends on the [`PageTextSource`] trait, so tests and
//! embedders can swap pdfium out. [`PdfiumTextSource`] binds the library on
//! every call: a failed bind is a configuration problem
//! ([`ExtractionError::DecoderUnavailable`]) and is reported separately from
//! a document pdfium cannot parse ([`ExtractionError::Malformed`]).

use crate::error::ExtractionError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// A service that returns, per page in order, the page's text fragments.
///
/// Index `0` of the returned vector is page 1.
pub trait PageTextSource: Send + Sync {
    fn page_fragments(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractionError>;
}

/// [`PageTextSource`] backed by a dynamically loaded libpdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextSource {
    library_path: Option<PathBuf>,
}

impl PdfiumTextSource {
    /// `library_path` overrides `PDFIUM_LIB_PATH` and the system search path.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    fn bind(&self) -> Result<Pdfium, ExtractionError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(ref path) => Pdfium::bind_to_library(path).map_err(|e| {
                ExtractionError::DecoderUnavailable {
                    decoder: "pdfium".into(),
                    reason: format!("cannot load '{}': {:?}", path.display(), e),
                }
            })?,
            None => Pdfium::bind_to_system_library().map_err(|e| {
                ExtractionError::DecoderUnavailable {
                    decoder: "pdfium".into(),
                    reason: format!(
                        "no system libpdfium found ({:?}); set PDFIUM_LIB_PATH",
                        e
                    ),
                }
            })?,
        };

        Ok(Pdfium::new(bindings))
    }
}

impl PageTextSource for PdfiumTextSource {
    fn page_fragments(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractionError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ExtractionError::Malformed(format!("{:?}", e)))?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut result = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| {
                ExtractionError::Malformed(format!("page {}: {:?}", idx + 1, e))
            })?;
            let fragments = line_fragments(&text.all());
            debug!("Page {} → {} fragments", idx + 1, fragments.len());
            result.push(fragments);
        }

        Ok(result)
    }
}

/// Split a page's text into its visual lines, dropping blank ones.
///
/// A page with any text ends with an empty end-of-line fragment, so a
/// one-line page `"A"` joins to `"A \n"`.
fn line_fragments(page_text: &str) -> Vec<String> {
    let mut fragments: Vec<String> = page_text
        .lines()
        .map(|l| l.trim_end_matches('\r').trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if !fragments.is_empty() {
        fragments.push(String::new());
    }
    fragments
}
