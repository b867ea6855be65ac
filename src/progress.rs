//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to be told
//! when extraction and generation start and finish. The CLI drives its
//! spinner from these events.
//!
//! # Example
//!
//! ```rust
//! use edgequake_examgen::{GenerationConfig, GenerationProgressCallback};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl GenerationProgressCallback for Log {
//!     fn on_generation_start(&self, model: &str) {
//!         eprintln!("asking {model}…");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(Log) as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as a request moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called before a PDF/DOCX/image artifact is decoded.
    ///
    /// * `name` — artifact name
    /// * `kind` — "PDF", "DOCX" or "image"
    fn on_extraction_start(&self, name: &str, kind: &str) {
        let _ = (name, kind);
    }

    /// Called after extraction succeeded.
    ///
    /// * `content_len` — byte length of the extracted text or base64 image
    fn on_extraction_complete(&self, content_len: usize) {
        let _ = content_len;
    }

    /// Called just before the backend request is sent.
    fn on_generation_start(&self, model: &str) {
        let _ = model;
    }

    /// Called when generated text was received.
    fn on_generation_complete(&self, text_len: usize, duration_ms: u64) {
        let _ = (text_len, duration_ms);
    }

    /// Called on any failure, with the sanitised user-facing message.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
