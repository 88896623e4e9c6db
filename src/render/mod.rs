//! Turns structured documents and word tables into terminal text or HTML.

mod html;

pub use html::{DetailsLink, DetailsPage, details_href, html_details, html_error, html_gallery};

use crate::highlight::{Line, NO_TEXT_DETECTED, StructuredDocument};
use crate::models::WordCount;

const ANSI_MARK: &str = "\x1b[1;30;43m";
const ANSI_RESET: &str = "\x1b[0m";
const QUOTE_PREFIX: &str = "│ ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Highlights wrapped in `[` and `]`.
    Plain,
    Ansi,
}

impl Style {
    pub fn from_color(color: bool) -> Self {
        if color { Style::Ansi } else { Style::Plain }
    }

    fn mark(self, text: &str) -> String {
        match self {
            Style::Plain => format!("[{}]", text),
            Style::Ansi => format!("{}{}{}", ANSI_MARK, text, ANSI_RESET),
        }
    }
}

pub fn terminal(doc: &StructuredDocument, style: Style) -> String {
    if doc.is_empty() {
        return NO_TEXT_DETECTED.to_string();
    }
    doc.paragraphs()
        .iter()
        .map(|paragraph| {
            paragraph
                .lines
                .iter()
                .map(|line| {
                    let body = render_line(line, style);
                    if paragraph.multiline {
                        format!("{}{}", QUOTE_PREFIX, body)
                    } else {
                        body
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_line(line: &Line, style: Style) -> String {
    match line {
        Line::Plain(text) => text.clone(),
        Line::Spans(spans) => spans
            .iter()
            .map(|span| {
                if span.highlighted {
                    style.mark(&span.text)
                } else {
                    span.text.clone()
                }
            })
            .collect(),
    }
}

/// `word<TAB>count` per line; the selected word is starred.
pub fn word_table(counts: &[WordCount], selected: Option<&str>) -> String {
    let selected = selected.map(str::to_lowercase);
    counts
        .iter()
        .map(|entry| {
            let star = if selected.as_deref() == Some(entry.word.as_str()) {
                "*"
            } else {
                ""
            };
            format!("{}{}\t{}", star, entry.word, entry.count)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
