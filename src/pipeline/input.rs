//! Source resolution: turn a user-supplied path or URL into an [`Artifact`].
//!
//! The size ceiling is checked from metadata (file length or
//! `Content-Length`) before the body is read, so an oversized upload never
//! costs a full read, let alone a decode.

use crate::content::{Artifact, DOCX_MIME, PDF_MIME};
use crate::error::ExamGenError;
use crate::pipeline::encode::image_mime_from_extension;
use crate::pipeline::extract::check_size;
use std::path::Path;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP/HTTPS URL to an in-memory artifact.
pub async fn resolve_source(source: &str, timeout_secs: u64) -> Result<Artifact, ExamGenError> {
    if is_url(source) {
        download_url(source, timeout_secs).await
    } else {
        read_local(Path::new(source)).await
    }
}

/// MIME type implied by a file name's extension, if any.
pub fn mime_from_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    match ext.as_str() {
        "pdf" => Some(PDF_MIME.to_string()),
        "docx" => Some(DOCX_MIME.to_string()),
        other => image_mime_from_extension(other).map(str::to_string),
    }
}

async fn read_local(path: &Path) -> Result<Artifact, ExamGenError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| io_error(path, e))?;
    if !metadata.is_file() {
        return Err(ExamGenError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    check_size(&name, metadata.len())?;

    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
    debug!("Read local artifact: {} ({} bytes)", path.display(), bytes.len());

    let mime_type = mime_from_name(&name);
    Ok(Artifact::new(name, mime_type, bytes))
}

fn io_error(path: &Path, e: std::io::Error) -> ExamGenError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ExamGenError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else {
        ExamGenError::FileNotFound {
            path: path.to_path_buf(),
        }
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Artifact, ExamGenError> {
    info!("Downloading artifact from: {}", url);

    let download_failed = |reason: String| ExamGenError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| download_failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExamGenError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            download_failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(download_failed(format!("HTTP {}", response.status())));
    }

    let name = filename_from_url(url);
    if let Some(len) = response.content_length() {
        check_size(&name, len)?;
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|m| !m.starts_with("application/octet-stream"));

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ExamGenError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            download_failed(e.to_string())
        }
    })?;
    // Content-Length may be absent or wrong.
    check_size(&name, bytes.len() as u64)?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    let mime_type = declared.or_else(|| mime_from_name(&name));
    Ok(Artifact::new(name, mime_type, bytes.to_vec()))
}

/// Last non-empty URL path segment, or a generic name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MAX_ARTIFACT_BYTES;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/de-thi.pdf"));
        assert!(is_url("http://example.com/de-thi.pdf"));
        assert!(!is_url("/tmp/de-thi.pdf"));
        assert!(!is_url("de-thi.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn mime_inference_from_names() {
        assert_eq!(mime_from_name("a.PDF").as_deref(), Some(PDF_MIME));
        assert_eq!(mime_from_name("a.docx").as_deref(), Some(DOCX_MIME));
        assert_eq!(mime_from_name("scan.jpeg").as_deref(), Some("image/jpeg"));
        assert_eq!(mime_from_name("notes.txt"), None);
        assert_eq!(mime_from_name("noext"), None);
    }

    #[test]
    fn url_filenames() {
        assert_eq!(filename_from_url("https://x.org/files/de.pdf?v=2"), "de.pdf");
        assert_eq!(filename_from_url("https://x.org/"), "downloaded");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_source("/definitely/not/here.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ExamGenError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read_with_inferred_mime() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(b"\x89PNG\r\n\x1a\n").unwrap();
        let artifact = resolve_source(tmp.path().to_str().unwrap(), 5)
            .await
            .unwrap();
        assert_eq!(artifact.mime_type.as_deref(), Some("image/png"));
        assert_eq!(artifact.bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn oversized_local_file_is_rejected_before_read() {
        let tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.as_file().set_len(MAX_ARTIFACT_BYTES + 1).unwrap();
        let err = resolve_source(tmp.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ExamGenError::TooLarge { .. }), "got: {err:?}");
    }
}
