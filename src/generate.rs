//! Top-level entry points wiring the whole pipeline.
//!
//! ```text
//! source ──▶ resolve ──▶ extract ──▶ compile ──▶ generate ──▶ GenerationOutput
//! (path/URL)  (Artifact)  (InputContent)  (request)  (one backend call)
//! ```
//!
//! Every failure is logged with its diagnostic chain and reported to the
//! progress callback with its sanitised message before it is returned.

use crate::config::GenerationConfig;
use crate::content::{Artifact, InputContent};
use crate::error::ExamGenError;
use crate::export::DocumentExporter;
use crate::output::{GenerationOutput, GenerationStats};
use crate::pipeline::compile::PromptCompiler;
use crate::pipeline::extract::{check_size, classify, ContentExtractor};
use crate::pipeline::input;
use crate::pipeline::llm::{resolve_backend, Generator};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Generate a similar exam from canonical content.
///
/// Each call builds its own [`Generator`], so concurrent calls are not
/// serialised. Hold a [`crate::session::GenerationSession`] or a shared
/// [`Generator`] to get the one-request-at-a-time guard.
///
/// # Errors
/// - [`ExamGenError::InvalidInputType`] for malformed image content
/// - [`ExamGenError::ProviderNotConfigured`] if no backend can be resolved
/// - [`ExamGenError::GenerationFailed`] / [`ExamGenError::EmptyOrBlockedResponse`]
///   when the single backend call does not yield text
pub async fn generate(
    input: &InputContent,
    config: &GenerationConfig,
) -> Result<GenerationOutput, ExamGenError> {
    let start = Instant::now();
    let result = run_generation(input, config).await.map(|mut output| {
        output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        output
    });
    report(config, result)
}

/// Generate from pasted text. Blank text fails with [`ExamGenError::EmptyInput`].
pub async fn generate_from_text(
    text: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, ExamGenError> {
    let input = report(config, InputContent::text(text))?;
    generate(&input, config).await
}

/// Resolve a local path or URL, extract it, and generate from the result.
pub async fn generate_from_source(
    source: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, ExamGenError> {
    let start = Instant::now();
    info!("Starting generation from: {}", source);

    let extract_start = Instant::now();
    let input = extract_only(source, config).await?;
    let extraction_ms = extract_start.elapsed().as_millis() as u64;

    let mut output = report(config, run_generation(&input, config).await)?;
    output.stats.extraction_duration_ms = Some(extraction_ms);
    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Generation complete: {} chars, {}ms total",
        output.text.len(),
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Generate from a source and export the result to `output_path`.
///
/// The exporter is chosen by extension (see [`DocumentExporter::for_path`]).
pub async fn generate_to_file(
    source: &str,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationStats, ExamGenError> {
    let output = generate_from_source(source, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let text = output.text.clone();

    let written = tokio::task::spawn_blocking(move || {
        DocumentExporter::for_path(&path).export(&text, &path)
    })
    .await
    .map_err(|e| ExamGenError::Internal(format!("export task failed: {e}")))
    .and_then(|r| r);
    report(config, written)?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`generate_from_source`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    source: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, ExamGenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExamGenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_from_source(source, config))
}

/// Resolve and extract a source without calling any backend.
///
/// Does not require an LLM provider or API key.
pub async fn extract_only(
    source: &str,
    config: &GenerationConfig,
) -> Result<InputContent, ExamGenError> {
    let artifact = report(
        config,
        input::resolve_source(source, config.download_timeout_secs).await,
    )?;
    let extractor = ContentExtractor::with_default_decoders(config.pdfium_library_path.clone());
    report(config, extract_artifact(&extractor, artifact, config).await)
}

/// Run `extractor` on an in-memory artifact off the async runtime.
pub async fn extract_artifact(
    extractor: &ContentExtractor,
    artifact: Artifact,
    config: &GenerationConfig,
) -> Result<InputContent, ExamGenError> {
    check_size(&artifact.name, artifact.size())?;
    let kind = classify(&artifact)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(&artifact.name, kind.label());
    }

    // pdfium is blocking and not async-safe.
    let extractor = extractor.clone();
    let content = tokio::task::spawn_blocking(move || extractor.extract(&artifact))
        .await
        .map_err(|e| ExamGenError::Internal(format!("extraction task failed: {e}")))??;

    if let Some(ref cb) = config.progress_callback {
        let len = match &content {
            InputContent::Text { content } => content.len(),
            InputContent::Image { data, .. } => data.len(),
        };
        cb.on_extraction_complete(len);
    }
    Ok(content)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_generation(
    input: &InputContent,
    config: &GenerationConfig,
) -> Result<GenerationOutput, ExamGenError> {
    let backend = resolve_backend(config)?;
    let request = PromptCompiler::new(config.model_policy.clone()).compile(input)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(&request.model_id);
    }
    let generation = Generator::new(backend, config).generate(&request).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(generation.text.len(), generation.duration_ms);
    }

    Ok(GenerationOutput {
        text: generation.text,
        model: request.model_id,
        modality: request.modality,
        stats: GenerationStats {
            input_tokens: generation.input_tokens,
            output_tokens: generation.output_tokens,
            extraction_duration_ms: None,
            generation_duration_ms: generation.duration_ms,
            total_duration_ms: generation.duration_ms,
        },
    })
}

/// Log a failure with its full cause chain and tell the progress callback.
fn report<T>(config: &GenerationConfig, result: Result<T, ExamGenError>) -> Result<T, ExamGenError> {
    if let Err(ref e) = result {
        e.log();
        if let Some(ref cb) = config.progress_callback {
            cb.on_error(&e.user_message());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::pipeline::compile::GenerationRequest;
    use crate::pipeline::llm::{BackendResponse, CallOptions, GenerativeBackend};
    use crate::progress::GenerationProgressCallback;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Echo;

    #[async_trait]
    impl GenerativeBackend for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate_content(
            &self,
            request: &GenerationRequest,
            _options: &CallOptions,
        ) -> Result<BackendResponse, BackendError> {
            Ok(BackendResponse {
                text: Some(format!("model={}", request.model_id)),
                input_tokens: 3,
                output_tokens: 4,
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl GenerationProgressCallback for Recorder {
        fn on_generation_start(&self, model: &str) {
            self.0.lock().unwrap().push(format!("start {model}"));
        }
        fn on_generation_complete(&self, text_len: usize, _duration_ms: u64) {
            self.0.lock().unwrap().push(format!("done {text_len}"));
        }
        fn on_error(&self, message: &str) {
            self.0.lock().unwrap().push(format!("error {message}"));
        }
    }

    fn config(recorder: Arc<Recorder>) -> GenerationConfig {
        GenerationConfig::builder()
            .backend(Arc::new(Echo))
            .progress_callback(recorder)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn text_generation_reports_progress_and_usage() {
        let recorder = Arc::new(Recorder::default());
        let out = generate_from_text("Câu 1.", &config(recorder.clone()))
            .await
            .unwrap();
        assert_eq!(out.text, "model=gemini-2.5-flash");
        assert_eq!(out.stats.input_tokens, 3);
        assert_eq!(out.stats.output_tokens, 4);
        assert_eq!(out.stats.extraction_duration_ms, None);
        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events, vec!["start gemini-2.5-flash", "done 22"]);
    }

    #[tokio::test]
    async fn blank_text_reports_user_message() {
        let recorder = Arc::new(Recorder::default());
        let err = generate_from_text(" \n ", &config(recorder.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamGenError::EmptyInput));
        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events, vec![format!("error {}", err.user_message())]);
    }

    #[tokio::test]
    async fn unsupported_source_fails_before_backend() {
        let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        std::io::Write::write_all(&mut tmp, b"plain notes").unwrap();
        let recorder = Arc::new(Recorder::default());
        let err = generate_from_source(tmp.path().to_str().unwrap(), &config(recorder.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamGenError::UnsupportedFormat { .. }));
        assert!(recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .all(|e| e.starts_with("error")));
    }

    #[test]
    fn sync_wrapper_reports_missing_file() {
        let err = generate_sync("/no/such/de-thi.pdf", &GenerationConfig::default()).unwrap_err();
        assert!(matches!(err, ExamGenError::FileNotFound { .. }));
    }

    #[test]
    fn text_generation_on_block_on() {
        let recorder = Arc::new(Recorder::default());
        let out = tokio_test::block_on(generate_from_text("Câu 2.", &config(recorder)))
            .unwrap();
        assert_eq!(out.modality, crate::content::Modality::Text);
    }
}
