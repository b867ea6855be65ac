//! Raw-text extraction for DOCX artifacts.
//!
//! A DOCX file is a zip archive; the body lives in `word/document.xml` as
//! WordprocessingML. Raw text is the concatenation of each paragraph's
//! `<w:t>` runs, with every paragraph followed by a blank line, which is the
//! shape most raw-text extractors produce and what the prompt expects.

use crate::error::ExtractionError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::io::{Cursor, Read};
use tracing::debug;

/// A service that turns document bytes into one text blob.
pub trait RawTextSource: Send + Sync {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// [`RawTextSource`] for DOCX, reading the zip container directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxTextSource;

impl RawTextSource for DocxTextSource {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::Malformed(format!("not a zip container: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractionError::Malformed(format!("missing word/document.xml: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| ExtractionError::Malformed(format!("unreadable word/document.xml: {e}")))?;

        let text = wordml_to_text(&xml);
        debug!("DOCX: {} bytes of XML → {} chars of text", xml.len(), text.len());
        Ok(text)
    }
}

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)(w:[A-Za-z]+)\b[^>]*?(/?)>").unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|[A-Za-z]+);").unwrap());

/// Convert a WordprocessingML body to raw text.
///
/// `<w:tab/>` and `<w:br/>` only count inside a run; the same element names
/// appear in paragraph properties as tab-stop definitions.
fn wordml_to_text(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 4);
    let mut cursor = 0;
    let mut in_text = false;
    let mut in_run = false;

    for caps in RE_TAG.captures_iter(xml) {
        let Some(whole) = caps.get(0) else { continue };
        if in_text {
            out.push_str(&unescape_xml(&xml[cursor..whole.start()]));
        }
        cursor = whole.end();

        let closing = &caps[1] == "/";
        let self_closing = &caps[3] == "/";
        match (&caps[2], closing, self_closing) {
            ("w:t", false, false) => in_text = true,
            ("w:t", true, _) => in_text = false,
            ("w:r", false, false) => in_run = true,
            ("w:r", true, _) => in_run = false,
            ("w:tab", false, _) if in_run => out.push('\t'),
            ("w:br" | "w:cr", false, _) if in_run => out.push('\n'),
            ("w:p", true, _) | ("w:p", false, true) => out.push_str("\n\n"),
            _ => {}
        }
    }

    out
}

/// Decode the five predefined XML entities and numeric character references.
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    RE_ENTITY
        .replace_all(s, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
        .unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn paragraphs_are_followed_by_blank_line() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:t>Câu 1.</w:t></w:r><w:r><w:t xml:space="preserve"> Tính </w:t></w:r><w:r><w:t>$$x^2$$</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Câu 2.</w:t></w:r></w:p>"#,
        );
        let text = DocxTextSource.raw_text(&bytes).unwrap();
        assert_eq!(text, "Câu 1. Tính $$x^2$$\n\n\n\nCâu 2.\n\n");
    }

    #[test]
    fn tabs_and_breaks_only_inside_runs() {
        let xml = r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>A</w:t><w:tab/><w:t>B</w:t><w:br/><w:t>C</w:t></w:r></w:p>"#;
        assert_eq!(wordml_to_text(xml), "A\tB\nC\n\n");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            unescape_xml("a &lt; b &amp;&amp; c &gt; d &#x1EA1;&#97; &unknown;"),
            "a < b && c > d ạa &unknown;"
        );
    }

    #[test]
    fn not_a_zip_is_malformed() {
        let err = DocxTextSource.raw_text(b"plain text").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn zip_without_body_is_malformed() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", SimpleFileOptions::default())
            .unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let err = DocxTextSource.raw_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }
}
