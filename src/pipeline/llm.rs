//! Generation: send one compiled request to the model and validate the reply.
//!
//! Two layers:
//!
//! * [`GenerativeBackend`] — the seam to the model. [`EdgequakeBackend`]
//!   implements it over `edgequake-llm` providers; tests script their own.
//! * [`Generator`] — the orchestrator. Exactly one backend call per
//!   invocation (no retry: a retried call could bill twice while the caller
//!   still shows one request in progress), a per-call timeout, blank-reply
//!   detection, and an explicit single-flight guard.

use crate::config::GenerationConfig;
use crate::error::{BackendError, ExamGenError};
use crate::pipeline::compile::{GenerationRequest, PromptPart, PromptPayload};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Sampling options forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// What a backend returned. `text` is `None` when the model produced nothing
/// (typically content-safety suppression).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendResponse {
    pub text: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A text-completion service that accepts [`GenerationRequest`]s.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Short name for logs and diagnostics (e.g. "gemini").
    fn name(&self) -> &str;

    async fn generate_content(
        &self,
        request: &GenerationRequest,
        options: &CallOptions,
    ) -> Result<BackendResponse, BackendError>;
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// [`GenerativeBackend`] over an `edgequake-llm` provider.
///
/// Providers are bound to one model at construction, so one provider is
/// created lazily per model id and cached. A backend built with
/// [`EdgequakeBackend::with_provider`] sends every request to that provider
/// and ignores the request's model id.
pub struct EdgequakeBackend {
    provider_name: String,
    fixed: Option<Arc<dyn LLMProvider>>,
    providers: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
}

impl EdgequakeBackend {
    /// Backend for a named provider ("gemini", "openai", …). API keys are
    /// read from the environment when the first request for a model is made.
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            fixed: None,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Backend around an already configured provider.
    pub fn with_provider(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider_name: name.into(),
            fixed: Some(provider),
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Check that a provider can be built for `model`.
    pub fn probe(&self, model: &str) -> Result<(), BackendError> {
        self.provider_for(model).map(|_| ())
    }

    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, BackendError> {
        if let Some(ref provider) = self.fixed {
            return Ok(Arc::clone(provider));
        }

        let mut cache = self.providers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(provider) = cache.get(model) {
            return Ok(Arc::clone(provider));
        }

        let provider = ProviderFactory::create_llm_provider(&self.provider_name, model)
            .map_err(|e| BackendError::Unavailable {
                model: model.to_string(),
                reason: format!("{e}"),
            })?;
        debug!("Created '{}' provider for model '{}'", self.provider_name, model);
        cache.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }
}

#[async_trait]
impl GenerativeBackend for EdgequakeBackend {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn generate_content(
        &self,
        request: &GenerationRequest,
        options: &CallOptions,
    ) -> Result<BackendResponse, BackendError> {
        let provider = self.provider_for(&request.model_id)?;
        let messages = to_messages(&request.payload);
        let completion = CompletionOptions {
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            ..Default::default()
        };

        let response = provider
            .chat(&messages, Some(&completion))
            .await
            .map_err(|e| BackendError::Provider(format!("{e}")))?;

        Ok(BackendResponse {
            text: Some(response.content).filter(|t| !t.is_empty()),
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Map a payload onto chat messages.
///
/// Multi-part payloads become one user turn: the text parts (in order) as
/// the message body and the inline binaries as image attachments.
fn to_messages(payload: &PromptPayload) -> Vec<ChatMessage> {
    match payload {
        PromptPayload::Instruction(prompt) => vec![ChatMessage::user(prompt.as_str())],
        PromptPayload::Parts(parts) => {
            let mut text = String::new();
            let mut images = Vec::new();
            for part in parts {
                match part {
                    PromptPart::Text(t) => {
                        if !text.is_empty() {
                            text.push_str("\n\n");
                        }
                        text.push_str(t);
                    }
                    PromptPart::InlineBinary { mime_type, data } => {
                        images.push(ImageData::new(data.clone(), mime_type.clone()));
                    }
                }
            }
            vec![ChatMessage::user_with_images(text, images)]
        }
    }
}

/// Resolve the backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **Named provider** (`config.provider_name`).
/// 3. **`EDGEQUAKE_LLM_PROVIDER`** environment variable.
/// 4. **API key present**: `GEMINI_API_KEY` selects gemini, then
///    `OPENAI_API_KEY` selects openai.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`). The detected
///    provider keeps its own default model; request model ids are ignored.
pub fn resolve_backend(config: &GenerationConfig) -> Result<Arc<dyn GenerativeBackend>, ExamGenError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref name) = config.provider_name {
        return Ok(Arc::new(EdgequakeBackend::new(name.clone())));
    }

    if let Ok(name) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        if !name.is_empty() {
            return Ok(Arc::new(EdgequakeBackend::new(name)));
        }
    }

    for (var, provider) in [("GEMINI_API_KEY", "gemini"), ("OPENAI_API_KEY", "openai")] {
        if std::env::var(var).is_ok_and(|key| !key.is_empty()) {
            return Ok(Arc::new(EdgequakeBackend::new(provider)));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExamGenError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    warn!("Using auto-detected provider; configured model ids are ignored");
    Ok(Arc::new(EdgequakeBackend::with_provider("auto", llm_provider)))
}

// ── Orchestrator ─────────────────────────────────────────────────────────

/// Successful generation: the raw text plus usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Runs compiled requests against a backend, one at a time.
pub struct Generator {
    backend: Arc<dyn GenerativeBackend>,
    options: CallOptions,
    timeout: Duration,
    in_flight: Semaphore,
}

impl Generator {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: &GenerationConfig) -> Self {
        Self {
            backend,
            options: CallOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            timeout: Duration::from_secs(config.api_timeout_secs),
            in_flight: Semaphore::new(1),
        }
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// `true` while a call is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    /// Send `request` exactly once and validate the reply.
    ///
    /// # Errors
    /// - [`ExamGenError::Busy`] if another call on this generator is in flight
    /// - [`ExamGenError::GenerationFailed`] on transport/provider error or timeout
    /// - [`ExamGenError::EmptyOrBlockedResponse`] if the reply has no text
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ExamGenError> {
        let _permit = self.in_flight.try_acquire().map_err(|_| {
            warn!("Rejected generation for '{}': another request in flight", request.model_id);
            ExamGenError::Busy
        })?;

        let backend = self.backend.name().to_string();
        info!("Generating with {} / {}", backend, request.model_id);
        let start = Instant::now();

        let outcome = tokio::time::timeout(
            self.timeout,
            self.backend.generate_content(request, &self.options),
        )
        .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                error!("Backend '{}' error for model '{}': {}", backend, request.model_id, source);
                return Err(ExamGenError::GenerationFailed { backend, source });
            }
            Err(_) => {
                let source = BackendError::Timeout {
                    secs: self.timeout.as_secs(),
                };
                error!("Backend '{}' error for model '{}': {}", backend, request.model_id, source);
                return Err(ExamGenError::GenerationFailed { backend, source });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match response.text {
            Some(text) if !text.trim().is_empty() => {
                debug!(
                    "{} input tokens, {} output tokens, {}ms",
                    response.input_tokens, response.output_tokens, duration_ms
                );
                Ok(Generation {
                    text,
                    input_tokens: response.input_tokens,
                    output_tokens: response.output_tokens,
                    duration_ms,
                })
            }
            _ => {
                warn!(
                    "Backend '{}' returned no text for model '{}' (empty or blocked)",
                    backend, request.model_id
                );
                Err(ExamGenError::EmptyOrBlockedResponse {
                    backend,
                    model: request.model_id.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Modality;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model_id: "test-model".into(),
            modality: Modality::Text,
            payload: PromptPayload::Instruction("prompt".into()),
        }
    }

    /// Replies with a fixed result and counts calls.
    struct Scripted {
        reply: Result<BackendResponse, BackendError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(reply: Result<BackendResponse, BackendError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        fn text(text: Option<&str>) -> Arc<Self> {
            Self::new(Ok(BackendResponse {
                text: text.map(str::to_string),
                input_tokens: 10,
                output_tokens: 20,
            }))
        }
    }

    #[async_trait]
    impl GenerativeBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate_content(
            &self,
            _request: &GenerationRequest,
            _options: &CallOptions,
        ) -> Result<BackendResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    /// Blocks until released, to hold a call in flight.
    #[derive(Default)]
    struct Gated {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl GenerativeBackend for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        async fn generate_content(
            &self,
            _request: &GenerationRequest,
            _options: &CallOptions,
        ) -> Result<BackendResponse, BackendError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(BackendResponse {
                text: Some("done".into()),
                ..Default::default()
            })
        }
    }

    fn generator(backend: Arc<dyn GenerativeBackend>) -> Generator {
        Generator::new(backend, &GenerationConfig::default())
    }

    #[tokio::test]
    async fn success_returns_text_and_usage() {
        let backend = Scripted::text(Some("Câu 1. $$x=2$$"));
        let gen = generator(backend.clone());
        let out = gen.generate(&request()).await.unwrap();
        assert_eq!(out.text, "Câu 1. $$x=2$$");
        assert_eq!(out.input_tokens, 10);
        assert_eq!(out.output_tokens, 20);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_text_is_blocked_not_success() {
        for reply in [Some(""), Some("  \n "), None] {
            let gen = generator(Scripted::text(reply));
            let err = gen.generate(&request()).await.unwrap_err();
            assert!(
                matches!(err, ExamGenError::EmptyOrBlockedResponse { .. }),
                "reply {reply:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn backend_error_is_generic_and_not_retried() {
        let backend = Scripted::new(Err(BackendError::Provider("429 quota exceeded".into())));
        let gen = generator(backend.clone());
        let err = gen.generate(&request()).await.unwrap_err();
        assert!(matches!(err, ExamGenError::GenerationFailed { .. }));
        assert!(!err.user_message().contains("quota"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_generation_failure() {
        let gen = generator(Arc::new(Gated::default())).with_timeout(Duration::from_millis(50));
        let err = gen.generate(&request()).await.unwrap_err();
        match err {
            ExamGenError::GenerationFailed { source, .. } => {
                assert!(matches!(source, BackendError::Timeout { .. }))
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!gen.is_busy(), "guard must be released after timeout");
    }

    #[tokio::test]
    async fn second_concurrent_call_is_rejected() {
        let backend = Arc::new(Gated::default());
        let gen = Arc::new(generator(backend.clone()));

        let first = {
            let gen = Arc::clone(&gen);
            tokio::spawn(async move { gen.generate(&request()).await })
        };
        backend.entered.notified().await;
        assert!(gen.is_busy());

        let err = gen.generate(&request()).await.unwrap_err();
        assert!(matches!(err, ExamGenError::Busy));

        backend.release.notify_one();
        let out = first.await.unwrap().unwrap();
        assert_eq!(out.text, "done");
        assert!(!gen.is_busy());
    }

    #[tokio::test]
    async fn guard_released_after_failure() {
        let gen = generator(Scripted::text(None));
        assert!(gen.generate(&request()).await.is_err());
        assert!(!gen.is_busy());
        assert!(gen.generate(&request()).await.is_err());
    }

    #[test]
    fn parts_become_one_user_turn_with_image() {
        let messages = to_messages(&PromptPayload::Parts(vec![
            PromptPart::Text("instruction".into()),
            PromptPart::InlineBinary {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            },
        ]));
        assert_eq!(messages.len(), 1);
    }
}
