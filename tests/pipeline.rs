//! Offline integration tests: the whole pipeline with a scripted backend and
//! counting fake decoders. No network, no API key, no pdfium.

use async_trait::async_trait;
use edgequake_examgen::pipeline::docx::{DocxTextSource, RawTextSource};
use edgequake_examgen::pipeline::pdf::PageTextSource;
use edgequake_examgen::{
    extract_artifact, generate, to_render_lines, Artifact, BackendError, BackendResponse,
    CallOptions, ContentExtractor, DocumentExporter, ExamGenError, ExtractionError,
    GenerationConfig, GenerationRequest, GenerationSession, GenerativeBackend, InputContent,
    Modality, PromptPart, PromptPayload, RenderLine, SessionState, Span, MAX_ARTIFACT_BYTES,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Records every request and replies with a fixed result.
struct ScriptedBackend {
    reply: Result<BackendResponse, BackendError>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    fn replying(text: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(BackendResponse {
                text: text.map(str::to_string),
                input_tokens: 120,
                output_tokens: 80,
            }),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(BackendError::Provider(reason.to_string())),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_content(
        &self,
        request: &GenerationRequest,
        _options: &CallOptions,
    ) -> Result<BackendResponse, BackendError> {
        self.seen.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}

struct CountingPdf {
    pages: Vec<Vec<String>>,
    calls: AtomicUsize,
}

impl PageTextSource for CountingPdf {
    fn page_fragments(&self, _bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.clone())
    }
}

fn counting_pdf(pages: &[&[&str]]) -> Arc<CountingPdf> {
    Arc::new(CountingPdf {
        pages: pages
            .iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect(),
        calls: AtomicUsize::new(0),
    })
}

fn config_with(backend: Arc<ScriptedBackend>) -> GenerationConfig {
    GenerationConfig::builder().backend(backend).build().unwrap()
}

const GENERATED: &str = "ĐỀ THI TƯƠNG TỰ\n\nCâu 1. Giải phương trình $$x^2 - 9 = 0$$.\nA. $$x = 3$$\n";

// ── Text input ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn pasted_text_to_rendered_lines() {
    let backend = ScriptedBackend::replying(Some(GENERATED));
    let config = config_with(backend.clone());

    let input = InputContent::text("Câu 1. Giải phương trình $$x^2 - 4 = 0$$.").unwrap();
    let output = generate(&input, &config).await.unwrap();

    assert_eq!(output.text, GENERATED);
    assert_eq!(output.modality, Modality::Text);
    assert_eq!(output.stats.input_tokens, 120);
    assert_eq!(backend.calls(), 1);

    let lines = output.render_lines();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], RenderLine::Blank);
    assert_eq!(
        lines[2],
        RenderLine::Spans(vec![
            Span::prose("Câu 1. Giải phương trình "),
            Span::formula("x^2 - 9 = 0"),
            Span::prose("."),
        ])
    );

    let request = &backend.seen.lock().unwrap()[0];
    match &request.payload {
        PromptPayload::Instruction(prompt) => {
            assert!(prompt.contains("Câu 1. Giải phương trình $$x^2 - 4 = 0$$."))
        }
        other => panic!("expected instruction payload, got {other:?}"),
    }
}

// ── Image input ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn image_upload_sends_text_then_one_image() {
    let backend = ScriptedBackend::replying(Some("Câu 1."));
    let config = config_with(backend.clone());
    let extractor = ContentExtractor::new(None, None);

    let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
    let artifact = Artifact::new("scan.png", Some("image/png".into()), png);
    let input = extract_artifact(&extractor, artifact, &config).await.unwrap();
    let output = generate(&input, &config).await.unwrap();
    assert_eq!(output.modality, Modality::Image);
    assert_eq!(output.model, "gemini-2.5-pro");

    let request = &backend.seen.lock().unwrap()[0];
    let PromptPayload::Parts(parts) = &request.payload else {
        panic!("expected multi-part payload");
    };
    assert!(matches!(parts[0], PromptPart::Text(_)));
    assert!(matches!(
        &parts[1],
        PromptPart::InlineBinary { mime_type, .. } if mime_type == "image/png"
    ));
    assert_eq!(parts.len(), 2);
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn blocked_reply_is_distinct_from_backend_error() {
    let input = InputContent::text("Câu 1.").unwrap();

    let blocked = ScriptedBackend::replying(None);
    let err = generate(&input, &config_with(blocked.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ExamGenError::EmptyOrBlockedResponse { .. }));
    assert_eq!(blocked.calls(), 1);

    let failing = ScriptedBackend::failing("quota exceeded for key sk-123");
    let err = generate(&input, &config_with(failing.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ExamGenError::GenerationFailed { .. }));
    assert!(!err.user_message().contains("sk-123"));
    assert_eq!(failing.calls(), 1, "failed calls are not retried");
}

#[tokio::test]
async fn oversized_pdf_never_reaches_decoder_or_backend() {
    let backend = ScriptedBackend::replying(Some("unused"));
    let config = config_with(backend.clone());
    let pdf = counting_pdf(&[&["A"]]);
    let extractor = ContentExtractor::new(Some(pdf.clone()), None);

    let big = vec![0u8; (MAX_ARTIFACT_BYTES + 1) as usize];
    let err = extract_artifact(&extractor, Artifact::new("de.pdf", None, big), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ExamGenError::TooLarge { .. }));
    assert_eq!(pdf.calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.calls(), 0);
}

// ── Documents ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_pages_joined_then_sent_as_text() {
    let backend = ScriptedBackend::replying(Some("Câu 1."));
    let config = config_with(backend.clone());
    let extractor = ContentExtractor::new(
        Some(counting_pdf(&[&["Câu 1.", "Tính"], &["Câu 2."]])),
        None,
    );

    let input = extract_artifact(
        &extractor,
        Artifact::new("de.pdf", Some("application/pdf".into()), b"%PDF-1.7".to_vec()),
        &config,
    )
    .await
    .unwrap();
    assert_eq!(
        input,
        InputContent::Text {
            content: "Câu 1. Tính\nCâu 2.\n".into()
        }
    );

    generate(&input, &config).await.unwrap();
    let request = &backend.seen.lock().unwrap()[0];
    assert_eq!(request.model_id, "gemini-2.5-flash");
}

#[test]
fn exported_docx_reads_back_paragraph_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("de-thi-tuong-tu.docx");
    DocumentExporter::for_path(&path)
        .export(GENERATED, &path)
        .unwrap();

    let raw = DocxTextSource
        .raw_text(&std::fs::read(&path).unwrap())
        .unwrap();
    let paragraphs: Vec<&str> = raw.split("\n\n").collect();
    // One paragraph per source line, plus the split's empty tail.
    assert_eq!(paragraphs.len(), GENERATED.split('\n').count() + 1);
    assert_eq!(paragraphs[2], "Câu 1. Giải phương trình $$x^2 - 9 = 0$$.");
}

#[test]
fn render_lines_preserve_every_source_line() {
    for line in to_render_lines(GENERATED) {
        if let RenderLine::Spans(spans) = line {
            assert!(!spans.is_empty());
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_reports_failure_with_user_message() {
    let backend = ScriptedBackend::failing("boom");
    let session = GenerationSession::new(backend, &GenerationConfig::default());
    let mut rx = session.subscribe();

    let err = session.submit_text("Câu 1.").await.unwrap_err();
    assert!(rx.has_changed().unwrap());
    assert_eq!(
        *rx.borrow_and_update(),
        SessionState::Failed {
            message: err.user_message()
        }
    );
    assert!(!session.state().is_loading());
}
