//! Structuring of raw OCR text into paragraphs and lines, with optional
//! case-insensitive highlighting of a literal term.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"));

pub const NO_TEXT_DETECTED: &str = "No text detected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "paragraphs", rename_all = "snake_case")]
pub enum StructuredDocument {
    /// Nothing but whitespace was extracted.
    NoText,
    Paragraphs(Vec<Paragraph>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub lines: Vec<Line>,
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Line {
    Plain(String),
    Spans(Vec<Span>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub highlighted: bool,
}

impl StructuredDocument {
    pub fn is_empty(&self) -> bool {
        matches!(self, StructuredDocument::NoText)
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        match self {
            StructuredDocument::NoText => &[],
            StructuredDocument::Paragraphs(paragraphs) => paragraphs,
        }
    }

    pub fn highlight_count(&self) -> usize {
        self.paragraphs()
            .iter()
            .flat_map(|paragraph| paragraph.lines.iter())
            .map(Line::highlight_count)
            .sum()
    }
}

impl Line {
    /// The original line text, regardless of highlighting.
    pub fn text(&self) -> String {
        match self {
            Line::Plain(text) => text.clone(),
            Line::Spans(spans) => spans.iter().map(|span| span.text.as_str()).collect(),
        }
    }

    pub fn spans(&self) -> Vec<Span> {
        match self {
            Line::Plain(text) => vec![Span::plain(text)],
            Line::Spans(spans) => spans.clone(),
        }
    }

    fn highlight_count(&self) -> usize {
        match self {
            Line::Plain(_) => 0,
            Line::Spans(spans) => spans.iter().filter(|span| span.highlighted).count(),
        }
    }
}

impl Span {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            highlighted: false,
        }
    }

    fn marked(text: &str) -> Self {
        Self {
            text: text.to_string(),
            highlighted: true,
        }
    }
}

/// Normalizes line endings, collapses blank-line runs and trims the text.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    BLANK_RUNS.replace_all(&unified, "\n\n").trim().to_string()
}

pub fn structure(text: &str, highlight: Option<&str>) -> StructuredDocument {
    let clean = normalize(text);
    if clean.is_empty() {
        return StructuredDocument::NoText;
    }

    let matcher = highlight.filter(|term| !term.is_empty()).and_then(build_matcher);

    let paragraphs = clean
        .split("\n\n")
        .filter(|paragraph| !paragraph.trim().is_empty())
        .map(|paragraph| {
            let lines = paragraph
                .split('\n')
                .filter(|line| !line.trim().is_empty())
                .map(|line| match &matcher {
                    Some(matcher) => Line::Spans(split_highlighted(line, matcher)),
                    None => Line::Plain(line.to_string()),
                })
                .collect::<Vec<_>>();
            Paragraph {
                multiline: lines.len() > 1,
                lines,
            }
        })
        .collect::<Vec<_>>();

    if paragraphs.is_empty() {
        return StructuredDocument::NoText;
    }
    StructuredDocument::Paragraphs(paragraphs)
}

fn build_matcher(term: &str) -> Option<Regex> {
    match RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            debug!("highlight disabled for term of {} bytes: {}", term.len(), err);
            None
        }
    }
}

fn split_highlighted(line: &str, matcher: &Regex) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for found in matcher.find_iter(line) {
        if found.start() > cursor {
            spans.push(Span::plain(&line[cursor..found.start()]));
        }
        spans.push(Span::marked(found.as_str()));
        cursor = found.end();
    }
    if cursor < line.len() {
        spans.push(Span::plain(&line[cursor..]));
    }
    spans
}
