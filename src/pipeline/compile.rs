//! Prompt compilation: canonical [`InputContent`] → backend-ready
//! [`GenerationRequest`].
//!
//! Pure and deterministic: the same input and policy always give the same
//! request. All prompt wording lives in [`crate::prompts`].

use crate::config::ModelPolicy;
use crate::content::{InputContent, Modality};
use crate::error::ExamGenError;
use crate::prompts::{fill_template, IMAGE_CONTEXT};
use serde::Serialize;
use tracing::debug;

/// One segment of a multi-part payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPart {
    Text(String),
    InlineBinary { mime_type: String, data: String },
}

/// What is sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPayload {
    /// A single filled-in instruction (text input).
    Instruction(String),
    /// Instruction text followed by exactly one inline image (image input).
    Parts(Vec<PromptPart>),
}

/// A compiled request: target model plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub model_id: String,
    pub modality: Modality,
    pub payload: PromptPayload,
}

/// Compiles canonical input into requests under a [`ModelPolicy`].
#[derive(Debug, Clone, Default)]
pub struct PromptCompiler {
    policy: ModelPolicy,
}

impl PromptCompiler {
    pub fn new(policy: ModelPolicy) -> Self {
        Self { policy }
    }

    /// Build the request for `input`.
    ///
    /// Fails with [`ExamGenError::InvalidInputType`] when the content breaks
    /// the canonical-content invariants (image without an `image/*` MIME type
    /// or without data). The extractor never produces such values.
    pub fn compile(&self, input: &InputContent) -> Result<GenerationRequest, ExamGenError> {
        let modality = input.modality();
        let model_id = self.policy.model_for(modality).to_string();

        let payload = match input {
            InputContent::Text { content } => PromptPayload::Instruction(fill_template(content)),
            InputContent::Image { mime_type, data } => {
                if !mime_type.starts_with("image/") {
                    return Err(ExamGenError::InvalidInputType(format!(
                        "image content with non-image MIME type '{mime_type}'"
                    )));
                }
                if data.is_empty() {
                    return Err(ExamGenError::InvalidInputType(
                        "image content without data".into(),
                    ));
                }
                PromptPayload::Parts(vec![
                    PromptPart::Text(fill_template(IMAGE_CONTEXT)),
                    PromptPart::InlineBinary {
                        mime_type: mime_type.clone(),
                        data: data.clone(),
                    },
                ])
            }
        };

        debug!("Compiled {:?} request for model '{}'", modality, model_id);
        Ok(GenerationRequest {
            model_id,
            modality,
            payload,
        })
    }
}
