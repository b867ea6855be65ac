//! Document export: generated text → a file the user can open.
//!
//! The text is first split into paragraphs by
//! [`to_export_paragraphs`], then handed to a [`DocumentEncoder`]. Formula
//! delimiters are kept literally; no encoder renders math.
//!
//! Files are written atomically: the bytes go to a temp file in the target
//! directory which is then renamed over the destination, so a failed export
//! never leaves a truncated document behind.

use crate::error::ExamGenError;
use crate::pipeline::materialize::to_export_paragraphs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use zip::write::SimpleFileOptions;

/// File name offered when the user does not choose one ("similar exam").
pub const DEFAULT_EXPORT_FILE_NAME: &str = "de-thi-tuong-tu.docx";

/// Turns an ordered list of paragraphs into document bytes.
pub trait DocumentEncoder: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn encode(&self, paragraphs: &[String]) -> Result<Vec<u8>, ExamGenError>;
}

// ── DOCX ─────────────────────────────────────────────────────────────────

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "<w:sectPr/></w:body></w:document>";

/// Minimal WordprocessingML package: one `<w:p>` per paragraph, one run each.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxEncoder;

impl DocxEncoder {
    fn document_xml(paragraphs: &[String]) -> String {
        let mut xml = String::from(DOCUMENT_HEAD);
        for p in paragraphs {
            if p.is_empty() {
                xml.push_str("<w:p/>");
            } else {
                xml.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
                xml.push_str(&escape_xml(p));
                xml.push_str("</w:t></w:r></w:p>");
            }
        }
        xml.push_str(DOCUMENT_TAIL);
        xml
    }
}

impl DocumentEncoder for DocxEncoder {
    fn name(&self) -> &str {
        "docx"
    }

    fn encode(&self, paragraphs: &[String]) -> Result<Vec<u8>, ExamGenError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
            ("_rels/.rels", RELS_XML.to_string()),
            ("word/document.xml", Self::document_xml(paragraphs)),
        ];
        for (name, body) in parts {
            zip.start_file(name, options).map_err(packaging_failed)?;
            zip.write_all(body.as_bytes()).map_err(packaging_failed)?;
        }

        let cursor = zip.finish().map_err(packaging_failed)?;
        Ok(cursor.into_inner())
    }
}

fn packaging_failed(e: impl std::fmt::Display) -> ExamGenError {
    ExamGenError::Internal(format!("DOCX packaging failed: {e}"))
}

/// Escape markup characters and drop code points XML 1.0 forbids.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

// ── Plain text ───────────────────────────────────────────────────────────

/// UTF-8 text, paragraphs joined by `\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextEncoder;

impl DocumentEncoder for PlainTextEncoder {
    fn name(&self) -> &str {
        "text"
    }

    fn encode(&self, paragraphs: &[String]) -> Result<Vec<u8>, ExamGenError> {
        Ok(paragraphs.join("\n").into_bytes())
    }
}

// ── Exporter ─────────────────────────────────────────────────────────────

/// Encodes generated text and saves it.
#[derive(Clone)]
pub struct DocumentExporter {
    encoder: Option<Arc<dyn DocumentEncoder>>,
}

impl DocumentExporter {
    pub fn new(encoder: Arc<dyn DocumentEncoder>) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }

    /// An exporter whose encoder never loaded. Every export fails with
    /// [`ExamGenError::DependencyUnavailable`].
    pub fn without_encoder() -> Self {
        Self { encoder: None }
    }

    /// Pick the encoder from the destination's extension: `.txt` and `.md`
    /// get plain text, anything else DOCX.
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        match ext.as_deref() {
            Some("txt" | "md") => Self::new(Arc::new(PlainTextEncoder)),
            _ => Self::new(Arc::new(DocxEncoder)),
        }
    }

    /// Encode `text` without writing it anywhere.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ExamGenError> {
        let encoder = self.encoder.as_ref().ok_or_else(|| {
            error!("Export requested but no document encoder is available");
            ExamGenError::DependencyUnavailable {
                dependency: "document encoder".into(),
            }
        })?;

        let paragraphs = to_export_paragraphs(text);
        debug!("Encoding {} paragraphs as {}", paragraphs.len(), encoder.name());
        encoder.encode(&paragraphs)
    }

    /// Encode `text` and atomically write it to `path`.
    ///
    /// Blocking; call from `spawn_blocking` inside async code.
    pub fn export(&self, text: &str, path: &Path) -> Result<(), ExamGenError> {
        let bytes = self.encode(text)?;
        write_atomic(path, &bytes)?;
        info!("Exported {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

impl Default for DocumentExporter {
    fn default() -> Self {
        Self::new(Arc::new(DocxEncoder))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExamGenError> {
    let write_failed = |source: std::io::Error| {
        error!("Failed to write {}: {}", path.display(), source);
        ExamGenError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        }
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}
