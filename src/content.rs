//! Canonical input types: the uploaded [`Artifact`] and the normalised
//! [`InputContent`] that every later stage consumes.

use crate::error::ExamGenError;
use serde::{Deserialize, Serialize};

/// Upload ceiling. Larger artifacts are rejected before any decode attempt.
pub const MAX_ARTIFACT_BYTES: u64 = 10 * 1024 * 1024;

/// MIME type of a PDF document.
pub const PDF_MIME: &str = "application/pdf";

/// MIME type of a WordprocessingML (DOCX) document.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A raw uploaded file: name, declared MIME type (if any) and bytes.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            bytes,
        }
    }

    /// Declared size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased extension of `name`, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        Some(ext.to_lowercase())
    }

    /// Declared MIME type, lower-cased with parameters (`; charset=…`) removed.
    pub fn declared_mime(&self) -> Option<String> {
        self.mime_type
            .as_deref()
            .map(|m| m.split(';').next().unwrap_or(m).trim().to_lowercase())
            .filter(|m| !m.is_empty())
    }
}

/// What an artifact was recognised as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    Image { mime_type: String },
    Pdf,
    Docx,
}

impl ArtifactKind {
    /// Short human label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Image { .. } => "image",
            ArtifactKind::Pdf => "PDF",
            ArtifactKind::Docx => "DOCX",
        }
    }
}

/// Normalised source content: either text or a single image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputContent {
    /// Extracted or pasted text.
    Text { content: String },
    /// An image as base64 with its MIME type.
    Image { mime_type: String, data: String },
}

impl InputContent {
    /// Wrap pasted text. Fails with [`ExamGenError::EmptyInput`] when blank.
    pub fn text(content: impl Into<String>) -> Result<Self, ExamGenError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ExamGenError::EmptyInput);
        }
        Ok(InputContent::Text { content })
    }

    pub fn modality(&self) -> Modality {
        match self {
            InputContent::Text { .. } => Modality::Text,
            InputContent::Image { .. } => Modality::Image,
        }
    }
}

/// Which kind of canonical content a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}
