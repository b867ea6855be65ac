//! Error types for the edgequake-examgen library.
//!
//! Three layers, from the outside in:
//!
//! * [`ExamGenError`] — **Fatal**: the request cannot produce an exam. Every
//!   public operation returns it. Its `Display` is the *diagnostic* text meant
//!   for logs; [`ExamGenError::user_message`] is the sanitised text meant for
//!   the person at the keyboard.
//!
//! * [`ExtractionError`] — why a recognised document could not be decoded.
//!   Configuration problems (decoder library not bound) are kept apart from
//!   parse problems (corrupt file) so operators can tell them apart in logs.
//!
//! * [`BackendError`] — the raw failure from the generative backend. It is
//!   only reachable as the `source()` of [`ExamGenError::GenerationFailed`],
//!   so provider-specific wording never leaks into user-facing text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-examgen library.
#[derive(Debug, Error)]
pub enum ExamGenError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Artifact type is not an image, PDF or DOCX.
    #[error("Unsupported artifact '{name}' (declared type: {mime})")]
    UnsupportedFormat { name: String, mime: String },

    /// Artifact exceeds the fixed upload ceiling. Checked before any decode.
    #[error("Artifact '{name}' is {size} bytes, limit is {limit} bytes")]
    TooLarge { name: String, size: u64, limit: u64 },

    /// Pasted text was empty after trimming.
    #[error("Input text is empty")]
    EmptyInput,

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A recognised document format could not be decoded.
    #[error("Failed to extract text from {format} '{name}'")]
    ExtractionFailed {
        format: &'static str,
        name: String,
        #[source]
        source: ExtractionError,
    },

    // ── Compilation errors ────────────────────────────────────────────────
    /// The compiler received canonical content that violates its invariants.
    #[error("Invalid input content: {0}")]
    InvalidInputType(String),

    // ── Generation errors ─────────────────────────────────────────────────
    /// The backend answered but produced no usable text (blank or filtered).
    #[error("Backend '{backend}' returned no text for model '{model}' (empty or blocked)")]
    EmptyOrBlockedResponse { backend: String, model: String },

    /// Transport or backend failure. The raw cause is only in `source()`.
    #[error("Generation request to backend '{backend}' failed")]
    GenerationFailed {
        backend: String,
        #[source]
        source: BackendError,
    },

    /// A second generation was started while one is still in flight.
    #[error("A generation request is already in progress")]
    Busy,

    /// The configured provider could not be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// A runtime collaborator (encoder, decoder) is missing at call time.
    #[error("Required dependency '{dependency}' is unavailable")]
    DependencyUnavailable { dependency: String },

    /// Could not create or write the exported document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExamGenError {
    /// Sanitised, user-facing message for this error.
    ///
    /// Never includes backend wording or file-system details beyond the
    /// artifact name the user supplied.
    pub fn user_message(&self) -> String {
        match self {
            ExamGenError::UnsupportedFormat { .. } => {
                "Loại file không được hỗ trợ. Vui lòng chọn PDF, DOCX, hoặc file ảnh.".to_string()
            }
            ExamGenError::TooLarge { .. } => {
                "Kích thước file không được vượt quá 10MB.".to_string()
            }
            ExamGenError::EmptyInput => "Vui lòng nhập nội dung đề thi.".to_string(),
            ExamGenError::FileNotFound { path } => {
                format!("Không tìm thấy file '{}'.", path.display())
            }
            ExamGenError::PermissionDenied { path } => {
                format!("Không có quyền đọc file '{}'.", path.display())
            }
            ExamGenError::DownloadFailed { .. } | ExamGenError::DownloadTimeout { .. } => {
                "Không thể tải file từ địa chỉ đã cho. Vui lòng kiểm tra kết nối mạng.".to_string()
            }
            ExamGenError::ExtractionFailed { format, source, .. } => match source {
                ExtractionError::DecoderUnavailable { .. } => format!(
                    "Thư viện xử lý {format} chưa được tải. Vui lòng kiểm tra cấu hình và thử lại."
                ),
                _ => "Không thể xử lý file này.".to_string(),
            },
            ExamGenError::InvalidInputType(_) => "Loại dữ liệu đầu vào không hợp lệ.".to_string(),
            ExamGenError::EmptyOrBlockedResponse { .. } => {
                "Không nhận được nội dung từ AI. Phản hồi có thể đã bị chặn hoặc trống.".to_string()
            }
            ExamGenError::GenerationFailed { .. } | ExamGenError::ProviderNotConfigured { .. } => {
                "Lỗi khi giao tiếp với dịch vụ AI. Vui lòng thử lại sau.".to_string()
            }
            ExamGenError::Busy => "Đang tạo đề, vui lòng chờ.".to_string(),
            ExamGenError::DependencyUnavailable { .. } => {
                "Không thể tạo file Word. Thành phần cần thiết chưa được tải.".to_string()
            }
            ExamGenError::OutputWriteFailed { .. } => {
                "Đã xảy ra lỗi khi tạo file Word.".to_string()
            }
            ExamGenError::InvalidConfig(_) | ExamGenError::Internal(_) => {
                "Đã xảy ra lỗi không xác định. Vui lòng thử lại.".to_string()
            }
        }
    }

    /// This error followed by each of its sources, joined with `": "`.
    pub fn diagnostic(&self) -> String {
        let mut chain = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        chain
    }

    /// Log the full diagnostic chain at error level.
    pub(crate) fn log(&self) {
        tracing::error!("{}", self.diagnostic());
    }
}

/// Why a recognised document could not be decoded.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// Decoder library is not bound or not initialised (configuration).
    #[error("{decoder} is not initialised: {reason}")]
    DecoderUnavailable { decoder: String, reason: String },

    /// The document is corrupt or not what its type claims (parse).
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Raw failure reported by a [`crate::pipeline::llm::GenerativeBackend`].
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Provider rejected the call (auth, quota, bad request, content filter).
    #[error("provider error: {0}")]
    Provider(String),

    /// The call did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backend could not be constructed for the requested model.
    #[error("backend unavailable for model '{model}': {reason}")]
    Unavailable { model: String, reason: String },
}
