//! Output materialisation: generated plain text → render lines and export
//! paragraphs.
//!
//! Both functions are total and stateless. Formula spans are found by a plain
//! split on `$$`: even pieces are prose, odd pieces are formulas, delimiters
//! dropped. An odd number of delimiters is not repaired, so the piece after
//! an unmatched `$$` is still read as a formula.

use serde::Serialize;

/// The only recognised formula delimiter.
pub const FORMULA_DELIMITER: &str = "$$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Prose,
    Formula,
}

/// A run of prose or the interior of a formula (delimiters stripped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub kind: SpanKind,
    pub value: String,
}

impl Span {
    pub fn prose(value: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::Prose,
            value: value.into(),
        }
    }

    pub fn formula(value: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::Formula,
            value: value.into(),
        }
    }
}

/// One source line, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "spans", rename_all = "lowercase")]
pub enum RenderLine {
    /// Whitespace-only line: vertical spacing, not a paragraph.
    Blank,
    /// Ordered spans whose values concatenate back to the line.
    Spans(Vec<Span>),
}

/// Split text into lines on `\n` (a trailing `\r` belongs to the break).
fn source_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l))
}

/// Break generated text into renderable lines of prose/formula spans.
pub fn to_render_lines(text: &str) -> Vec<RenderLine> {
    source_lines(text).map(render_line).collect()
}

fn render_line(line: &str) -> RenderLine {
    if line.trim().is_empty() {
        return RenderLine::Blank;
    }

    let pieces: Vec<&str> = line.split(FORMULA_DELIMITER).collect();
    if pieces.len() == 1 {
        return RenderLine::Spans(vec![Span::prose(line)]);
    }

    let spans = pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            if i % 2 == 1 {
                Span::formula(piece)
            } else {
                Span::prose(piece)
            }
        })
        .collect();
    RenderLine::Spans(spans)
}

/// One trimmed paragraph per source line; empty lines stay as empty
/// paragraphs and `$$` delimiters are kept literally.
pub fn to_export_paragraphs(text: &str) -> Vec<String> {
    text.split('\n').map(|l| l.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(line: &RenderLine) -> String {
        match line {
            RenderLine::Blank => String::new(),
            RenderLine::Spans(spans) => spans.iter().map(|s| s.value.as_str()).collect(),
        }
    }

    #[test]
    fn formula_spans_are_split_out() {
        let lines = to_render_lines("Solve $$x^2=4$$ now");
        assert_eq!(
            lines,
            vec![RenderLine::Spans(vec![
                Span::prose("Solve "),
                Span::formula("x^2=4"),
                Span::prose(" now"),
            ])]
        );
    }

    #[test]
    fn lines_without_delimiters_are_single_prose_span() {
        let text = "Câu 1. Cho tam giác ABC.\n  A. 3 cm  \nB. 4 cm";
        let lines = to_render_lines(text);
        assert_eq!(lines.len(), 3);
        for (line, source) in lines.iter().zip(text.split('\n')) {
            assert_eq!(line, &RenderLine::Spans(vec![Span::prose(source)]));
        }
    }

    #[test]
    fn blank_lines_become_spacing() {
        let lines = to_render_lines("A\n\n   \nB");
        assert_eq!(lines[1], RenderLine::Blank);
        assert_eq!(lines[2], RenderLine::Blank);
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn dangling_delimiter_opens_a_formula() {
        let lines = to_render_lines("a $$b$$ c $$d");
        assert_eq!(
            lines,
            vec![RenderLine::Spans(vec![
                Span::prose("a "),
                Span::formula("b"),
                Span::prose(" c "),
                Span::formula("d"),
            ])]
        );
    }

    #[test]
    fn single_delimiter_splits_line() {
        let lines = to_render_lines("Tính $$x^2");
        assert_eq!(
            lines,
            vec![RenderLine::Spans(vec![Span::prose("Tính "), Span::formula("x^2")])]
        );
    }

    #[test]
    fn spans_reconstruct_line_without_delimiters() {
        let text = "$$a$$ và $$b$$\nTính $$\\frac{1}{2}$$.\nKhông có công thức\nTính $$x^2\na $$b$$ c $$d\n$$";
        for (line, source) in to_render_lines(text).iter().zip(text.split('\n')) {
            assert_eq!(joined(line), source.replace("$$", ""));
        }
    }

    #[test]
    fn crlf_is_a_line_break() {
        let lines = to_render_lines("A\r\nB");
        assert_eq!(joined(&lines[0]), "A");
        assert_eq!(joined(&lines[1]), "B");
    }

    #[test]
    fn export_has_one_trimmed_paragraph_per_line() {
        let text = "  Câu 1. $$x+1$$  \n\n\tB\n";
        let paragraphs = to_export_paragraphs(text);
        assert_eq!(paragraphs.len(), text.matches('\n').count() + 1);
        assert_eq!(paragraphs, vec!["Câu 1. $$x+1$$", "", "B", ""]);
    }

    #[test]
    fn export_of_empty_text_is_one_empty_paragraph() {
        assert_eq!(to_export_paragraphs(""), vec![String::new()]);
    }

    #[test]
    fn render_of_empty_text_is_one_blank() {
        assert_eq!(to_render_lines(""), vec![RenderLine::Blank]);
    }
}
