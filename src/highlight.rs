//! Word level highlighting of diff lines.

use serde::{Deserialize, Serialize};

use crate::diff::{DiffLine, LineKind};

/// How a span should be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStyle {
    Plain,
    AddedWord,
    RemovedWord,
}

/// A run of text with a single style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpanStyle::Plain,
        }
    }
}

/// Style used for a highlighted segment on a line of `kind`.
///
/// Only additions and deletions are ever emphasized.
pub fn word_style(kind: LineKind, highlighted: bool) -> SpanStyle {
    match (kind, highlighted) {
        (LineKind::Addition, true) => SpanStyle::AddedWord,
        (LineKind::Deletion, true) => SpanStyle::RemovedWord,
        _ => SpanStyle::Plain,
    }
}

/// Split a line into styled spans from its word segments
pub fn render_line(line: &DiffLine) -> Vec<Span> {
    match &line.word_diff {
        Some(segments) if !segments.is_empty() => segments
            .iter()
            .map(|segment| Span {
                text: segment.text.clone(),
                style: word_style(line.kind, segment.highlighted),
            })
            .collect(),
        _ => vec![Span::plain(line.content.clone())],
    }
}

/// Render spans as text using git's `--word-diff=plain` markers
pub fn render_plain_text(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span.style {
            SpanStyle::Plain => out.push_str(&span.text),
            SpanStyle::AddedWord => {
                out.push_str("{+");
                out.push_str(&span.text);
                out.push_str("+}");
            }
            SpanStyle::RemovedWord => {
                out.push_str("[-");
                out.push_str(&span.text);
                out.push_str("-]");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::WordSegment;
    use similar_asserts::assert_eq;

    fn segments() -> Vec<WordSegment> {
        vec![
            WordSegment::new("enable = ", false),
            WordSegment::new("true", true),
            WordSegment::new(";", false),
        ]
    }

    #[test]
    fn addition_highlights_as_added() {
        let line = DiffLine::addition("enable = true;", 4).with_word_diff(segments());
        let spans = render_line(&line);

        assert_eq!(
            spans.iter().map(|s| s.style).collect::<Vec<_>>(),
            vec![SpanStyle::Plain, SpanStyle::AddedWord, SpanStyle::Plain]
        );
        assert_eq!(render_plain_text(&spans), "enable = {+true+};");
    }

    #[test]
    fn deletion_highlights_as_removed() {
        let line = DiffLine::deletion("enable = true;", 4).with_word_diff(segments());
        assert_eq!(
            render_plain_text(&render_line(&line)),
            "enable = [-true-];"
        );
    }

    #[test]
    fn context_never_highlights() {
        let line = DiffLine::context("enable = true;", 4, 4).with_word_diff(segments());
        let spans = render_line(&line);

        assert!(spans.iter().all(|s| s.style == SpanStyle::Plain));
        assert_eq!(render_plain_text(&spans), "enable = true;");
    }

    #[test]
    fn missing_segments_render_raw_content() {
        let line = DiffLine::addition("fresh line", 1);
        assert_eq!(render_line(&line), vec![Span::plain("fresh line")]);
    }

    #[test]
    fn spans_serialize_snake_case() {
        insta::assert_json_snapshot!(Span { text: "x".into(), style: SpanStyle::AddedWord }, @r#"
        {
          "text": "x",
          "style": "added_word"
        }
        "#);
    }
}
