//! Content extraction: any [`Artifact`] → canonical [`InputContent`].
//!
//! Decoders are injected. A missing decoder is reported as
//! [`ExtractionError::DecoderUnavailable`], the same kind a decoder reports
//! when its native library cannot be bound, so callers see one configuration
//! error regardless of where the dependency went missing.

use crate::content::{Artifact, ArtifactKind, InputContent, DOCX_MIME, MAX_ARTIFACT_BYTES, PDF_MIME};
use crate::error::{ExamGenError, ExtractionError};
use crate::pipeline::docx::{DocxTextSource, RawTextSource};
use crate::pipeline::encode::{encode_image, image_mime_from_extension, sniff_image_mime};
use crate::pipeline::pdf::{PageTextSource, PdfiumTextSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Normalises uploads into [`InputContent`].
#[derive(Clone)]
pub struct ContentExtractor {
    pdf: Option<Arc<dyn PageTextSource>>,
    docx: Option<Arc<dyn RawTextSource>>,
}

impl ContentExtractor {
    /// Build an extractor from explicit decoders. `None` means "not installed".
    pub fn new(
        pdf: Option<Arc<dyn PageTextSource>>,
        docx: Option<Arc<dyn RawTextSource>>,
    ) -> Self {
        Self { pdf, docx }
    }

    /// The stock decoders: pdfium for PDF, the zip reader for DOCX.
    pub fn with_default_decoders(pdfium_library_path: Option<PathBuf>) -> Self {
        Self::new(
            Some(Arc::new(PdfiumTextSource::new(pdfium_library_path))),
            Some(Arc::new(DocxTextSource)),
        )
    }

    /// Extract canonical content from an uploaded artifact.
    ///
    /// The size ceiling is enforced before the artifact is classified or
    /// decoded.
    pub fn extract(&self, artifact: &Artifact) -> Result<InputContent, ExamGenError> {
        check_size(&artifact.name, artifact.size())?;

        let kind = classify(artifact)?;
        info!(
            "Extracting {} artifact '{}' ({} bytes)",
            kind.label(),
            artifact.name,
            artifact.size()
        );

        match kind {
            ArtifactKind::Image { mime_type } => Ok(encode_image(&artifact.bytes, &mime_type)),
            ArtifactKind::Pdf => {
                let text = self.extract_pdf(&artifact.bytes).map_err(|source| {
                    extraction_failed(ArtifactKind::Pdf.label(), &artifact.name, source)
                })?;
                Ok(InputContent::Text { content: text })
            }
            ArtifactKind::Docx => {
                let text = self.extract_docx(&artifact.bytes).map_err(|source| {
                    extraction_failed(ArtifactKind::Docx.label(), &artifact.name, source)
                })?;
                Ok(InputContent::Text { content: text })
            }
        }
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let source = self
            .pdf
            .as_ref()
            .ok_or_else(|| ExtractionError::DecoderUnavailable {
                decoder: "pdf".into(),
                reason: "no page-text extraction service configured".into(),
            })?;

        let pages = source.page_fragments(bytes)?;
        debug!("PDF yielded {} pages", pages.len());
        Ok(join_pages(&pages))
    }

    fn extract_docx(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let source = self
            .docx
            .as_ref()
            .ok_or_else(|| ExtractionError::DecoderUnavailable {
                decoder: "docx".into(),
                reason: "no raw-text extraction service configured".into(),
            })?;

        source.raw_text(bytes)
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::with_default_decoders(None)
    }
}

/// Reject anything above [`MAX_ARTIFACT_BYTES`].
pub fn check_size(name: &str, size: u64) -> Result<(), ExamGenError> {
    if size > MAX_ARTIFACT_BYTES {
        return Err(ExamGenError::TooLarge {
            name: name.to_string(),
            size,
            limit: MAX_ARTIFACT_BYTES,
        });
    }
    Ok(())
}

/// Decide what an artifact is.
///
/// Precedence: declared `image/*`, then PDF by extension or MIME, then DOCX
/// by extension or MIME. Only when no MIME type was declared at all are the
/// bytes sniffed for an image signature.
pub fn classify(artifact: &Artifact) -> Result<ArtifactKind, ExamGenError> {
    let mime = artifact.declared_mime();
    let ext = artifact.extension();

    if let Some(m) = mime.as_deref().filter(|m| m.starts_with("image/")) {
        return Ok(ArtifactKind::Image {
            mime_type: m.to_string(),
        });
    }
    if ext.as_deref() == Some("pdf") || mime.as_deref() == Some(PDF_MIME) {
        return Ok(ArtifactKind::Pdf);
    }
    if ext.as_deref() == Some("docx") || mime.as_deref() == Some(DOCX_MIME) {
        return Ok(ArtifactKind::Docx);
    }
    if mime.is_none() {
        let guessed = ext
            .as_deref()
            .and_then(image_mime_from_extension)
            .or_else(|| sniff_image_mime(&artifact.bytes));
        if let Some(m) = guessed {
            return Ok(ArtifactKind::Image {
                mime_type: m.to_string(),
            });
        }
    }

    Err(ExamGenError::UnsupportedFormat {
        name: artifact.name.clone(),
        mime: mime.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Join per-page fragments: fragments by one space, each page then `\n`.
pub fn join_pages(pages: &[Vec<String>]) -> String {
    let mut full = String::new();
    for fragments in pages {
        full.push_str(&fragments.join(" "));
        full.push('\n');
    }
    full
}

fn extraction_failed(format: &'static str, name: &str, source: ExtractionError) -> ExamGenError {
    error!("{} extraction failed for '{}': {}", format, name, source);
    ExamGenError::ExtractionFailed {
        format,
        name: name.to_string(),
        source,
    }
}
