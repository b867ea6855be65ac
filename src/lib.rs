//! # edgequake-examgen
//!
//! Generate a *similar* exam from an existing one using a generative model.
//!
//! ## What it does
//!
//! An instructor pastes an exam or uploads it as an image, PDF or DOCX. The crate
//! normalises the upload into text or a single image, wraps it in a fixed
//! Vietnamese instruction, sends exactly one request to the model and turns
//! the reply into lines of prose and `$$…$$` formula spans for display, or
//! into a Word document for download.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload / pasted text
//!  │
//!  ├─ 1. Input        resolve local file or download from URL (≤ 10 MiB)
//!  ├─ 2. Extract      image → base64, PDF → page text (pdfium), DOCX → raw text
//!  ├─ 3. Compile      fill the instruction template, pick the model
//!  ├─ 4. Generate     one backend call (no retry), timeout, single-flight
//!  └─ 5. Materialise  render lines (prose/formula) or export paragraphs
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_examgen::{generate_from_source, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY
//!     let config = GenerationConfig::default();
//!     let output = generate_from_source("de-thi.pdf", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `examgen` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-examgen = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDF support
//!
//! PDF text extraction binds the pdfium shared library at call time, from
//! [`GenerationConfig::pdfium_library_path`], then `PDFIUM_LIB_PATH`, then the
//! system library path. Images and DOCX need no native library.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, ModelPolicy};
pub use content::{Artifact, ArtifactKind, InputContent, Modality, MAX_ARTIFACT_BYTES};
pub use error::{BackendError, ExamGenError, ExtractionError};
pub use export::{
    DocumentEncoder, DocumentExporter, DocxEncoder, PlainTextEncoder, DEFAULT_EXPORT_FILE_NAME,
};
pub use generate::{
    extract_artifact, extract_only, generate, generate_from_source, generate_from_text,
    generate_sync, generate_to_file,
};
pub use output::{GenerationOutput, GenerationStats};
pub use pipeline::compile::{GenerationRequest, PromptCompiler, PromptPart, PromptPayload};
pub use pipeline::extract::ContentExtractor;
pub use pipeline::llm::{
    BackendResponse, CallOptions, EdgequakeBackend, GenerativeBackend, Generation, Generator,
};
pub use pipeline::materialize::{to_export_paragraphs, to_render_lines, RenderLine, Span, SpanKind};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{GenerationSession, SessionState};
