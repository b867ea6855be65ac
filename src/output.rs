//! Result types returned by the top-level generation functions.

use crate::content::Modality;
use crate::pipeline::materialize::{to_export_paragraphs, to_render_lines, RenderLine};
use serde::Serialize;

/// A generated exam plus the numbers behind it.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    /// Plain text with formulas wrapped in `$$…$$`.
    pub text: String,
    /// Model id the request was compiled for.
    pub model: String,
    pub modality: Modality,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Line-by-line render form of [`Self::text`].
    pub fn render_lines(&self) -> Vec<RenderLine> {
        to_render_lines(&self.text)
    }

    /// Paragraphs for document export.
    pub fn export_paragraphs(&self) -> Vec<String> {
        to_export_paragraphs(&self.text)
    }
}

/// Token usage and timings for one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Time spent resolving and decoding an uploaded artifact, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_duration_ms: Option<u64>,
    pub generation_duration_ms: u64,
    pub total_duration_ms: u64,
}
