//! Configuration types for exam generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. The instruction template is *not*
//! configurable: its formula-delimiter contract is what the output
//! materialiser relies on.

use crate::content::Modality;
use crate::error::ExamGenError;
use crate::pipeline::llm::GenerativeBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model for text input.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

/// Default model for image input.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-pro";

/// Which model id a request is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelPolicy {
    /// One model for text input, another (vision-capable) for images. (default)
    PerModality {
        text_model: String,
        image_model: String,
    },
    /// The same vision-capable model for everything.
    Unified(String),
}

impl Default for ModelPolicy {
    fn default() -> Self {
        ModelPolicy::PerModality {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl ModelPolicy {
    /// Model id for the given input modality.
    pub fn model_for(&self, modality: Modality) -> &str {
        match (self, modality) {
            (ModelPolicy::Unified(model), _) => model,
            (ModelPolicy::PerModality { text_model, .. }, Modality::Text) => text_model,
            (ModelPolicy::PerModality { image_model, .. }, Modality::Image) => image_model,
        }
    }
}

/// Configuration for one or more generation requests.
///
/// # Example
/// ```rust
/// use edgequake_examgen::{GenerationConfig, ModelPolicy};
///
/// let config = GenerationConfig::builder()
///     .model_policy(ModelPolicy::Unified("gemini-2.5-pro".into()))
///     .temperature(0.5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Model selection per input modality. Default: [`ModelPolicy::PerModality`].
    pub model_policy: ModelPolicy,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `backend`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn GenerativeBackend>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Unlike transcription, writing *new* questions needs some variety;
    /// near-zero values tend to paraphrase the source exam.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    pub max_tokens: usize,

    /// Timeout for the single backend call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL sources, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Explicit path to libpdfium. Falls back to `PDFIUM_LIB_PATH`, then the
    /// system library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_policy: ModelPolicy::default(),
            provider_name: None,
            backend: None,
            temperature: 0.7,
            max_tokens: 8192,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model_policy", &self.model_policy)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn model_policy(mut self, policy: ModelPolicy) -> Self {
        self.config.model_policy = policy;
        self
    }

    /// Shorthand for [`ModelPolicy::Unified`].
    pub fn model(self, model: impl Into<String>) -> Self {
        self.model_policy(ModelPolicy::Unified(model.into()))
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, ExamGenError> {
        let c = &self.config;
        let models: Vec<&str> = match &c.model_policy {
            ModelPolicy::PerModality {
                text_model,
                image_model,
            } => vec![text_model.as_str(), image_model.as_str()],
            ModelPolicy::Unified(model) => vec![model.as_str()],
        };
        if models.iter().any(|m| m.trim().is_empty()) {
            return Err(ExamGenError::InvalidConfig(
                "Model identifiers must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExamGenError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExamGenError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
