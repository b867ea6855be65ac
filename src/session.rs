//! UI-facing generation trigger with observable state.
//!
//! A host UI holds one [`GenerationSession`], calls [`GenerationSession::submit`]
//! when the user presses "generate", and renders whatever [`SessionState`]
//! its [`watch::Receiver`] shows. While a request is loading further submits
//! are rejected with [`ExamGenError::Busy`] and the visible state is left
//! alone.

use crate::config::GenerationConfig;
use crate::content::{Artifact, InputContent};
use crate::error::ExamGenError;
use crate::pipeline::compile::PromptCompiler;
use crate::pipeline::extract::ContentExtractor;
use crate::pipeline::llm::{resolve_backend, GenerativeBackend, Generator};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// What the UI should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Succeeded { text: String },
    /// `message` is the sanitised, user-facing text.
    Failed { message: String },
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

pub struct GenerationSession {
    extractor: ContentExtractor,
    compiler: PromptCompiler,
    generator: Generator,
    state: watch::Sender<SessionState>,
}

impl GenerationSession {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: &GenerationConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            extractor: ContentExtractor::with_default_decoders(config.pdfium_library_path.clone()),
            compiler: PromptCompiler::new(config.model_policy.clone()),
            generator: Generator::new(backend, config),
            state,
        }
    }

    /// Build a session with the backend [`resolve_backend`] picks for `config`.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, ExamGenError> {
        Ok(Self::new(resolve_backend(config)?, config))
    }

    /// Replace the decoders used by [`Self::submit_artifact`].
    pub fn with_extractor(mut self, extractor: ContentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Generate from canonical content.
    pub async fn submit(&self, input: InputContent) -> Result<String, ExamGenError> {
        let guard = self.begin()?;
        let result = self.run(&input).await;
        guard.finish(&result);
        result
    }

    /// Generate from pasted text. Blank text ends in `Failed` with the
    /// "enter content" message.
    pub async fn submit_text(&self, text: &str) -> Result<String, ExamGenError> {
        let guard = self.begin()?;
        let result = match InputContent::text(text) {
            Ok(input) => self.run(&input).await,
            Err(e) => Err(e),
        };
        guard.finish(&result);
        result
    }

    /// Extract an uploaded artifact, then generate from it.
    pub async fn submit_artifact(&self, artifact: Artifact) -> Result<String, ExamGenError> {
        let guard = self.begin()?;
        let extractor = self.extractor.clone();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&artifact))
            .await
            .map_err(|e| ExamGenError::Internal(format!("extraction task failed: {e}")))
            .and_then(|r| r);
        let result = match extracted {
            Ok(input) => self.run(&input).await,
            Err(e) => Err(e),
        };
        guard.finish(&result);
        result
    }

    /// Move to `Loading` unless already there.
    fn begin(&self) -> Result<LoadingGuard<'_>, ExamGenError> {
        let mut accepted = false;
        self.state.send_if_modified(|state| {
            if state.is_loading() {
                return false;
            }
            *state = SessionState::Loading;
            accepted = true;
            true
        });

        if !accepted {
            warn!("Submit rejected: a generation is already loading");
            return Err(ExamGenError::Busy);
        }
        Ok(LoadingGuard {
            state: &self.state,
            finished: false,
        })
    }

    async fn run(&self, input: &InputContent) -> Result<String, ExamGenError> {
        let request = self.compiler.compile(input)?;
        let generation = self.generator.generate(&request).await?;
        Ok(generation.text)
    }
}

/// Clears `Loading` on every exit, including a dropped future.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    finished: bool,
}

impl LoadingGuard<'_> {
    fn finish(mut self, result: &Result<String, ExamGenError>) {
        let next = match result {
            Ok(text) => SessionState::Succeeded { text: text.clone() },
            Err(e) => {
                e.log();
                SessionState::Failed {
                    message: e.user_message(),
                }
            }
        };
        self.state.send_replace(next);
        self.finished = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Generation cancelled; session back to idle");
            self.state.send_replace(SessionState::Idle);
        }
    }
}
