//! Lightweight formatting for treatment text.
//!
//! Treatment plans are stored as plain text with a small amount of markup: bullet lines
//! starting with `• `, `- ` or `* `, and key terms wrapped in single asterisks. This module
//! turns that text into a sequence of [`Block`]s that a client can render without
//! interpreting any markup itself.
//!
//! ```text
//! • Take *ibuprofen* with food     -> ListItem([Plain("Take "), Bold("ibuprofen"), Plain(" with food")])
//!                                   -> LineBreak
//! Review in a week                 -> Paragraph([Plain("Review in a week")])
//! ```
//!
//! Whether the blocks belong in a list or a plain container is decided once for the whole
//! document by [`has_bullets`], not per line.

use serde::{Deserialize, Serialize};

/// Bullet prefixes recognised at document level.
const BULLET_MARKERS: [&str; 3] = ["• ", "- ", "* "];

/// Inline run of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Span {
    Plain(String),
    Bold(String),
}

/// One rendered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spans", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Vec<Span>),
    ListItem(Vec<Span>),
    LineBreak,
}

/// Container the blocks of a document are wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    List,
    Plain,
}

impl Container {
    pub fn for_text(text: &str) -> Self {
        if has_bullets(text) {
            Container::List
        } else {
            Container::Plain
        }
    }
}

/// A formatted document: its container and its blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedTreatment {
    pub container: Container,
    pub blocks: Vec<Block>,
}

impl FormattedTreatment {
    pub fn from_text(text: &str) -> Self {
        Self {
            container: Container::for_text(text),
            blocks: format(text),
        }
    }
}

/// Returns true if `text` contains any bullet marker anywhere.
pub fn has_bullets(text: &str) -> bool {
    BULLET_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Formats `text` line by line.
pub fn format(text: &str) -> Vec<Block> {
    if text.is_empty() {
        return Vec::new();
    }

    text.split('\n')
        .map(|line| format_line(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}

fn format_line(line: &str) -> Block {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Block::LineBreak;
    }

    match strip_bullet(trimmed) {
        Some(content) => Block::ListItem(parse_spans(content)),
        None => Block::Paragraph(parse_spans(trimmed)),
    }
}

/// Strips a leading `•`, `-` or `*` plus the whitespace character after it.
fn strip_bullet(line: &str) -> Option<&str> {
    let mut chars = line.char_indices();
    let (_, marker) = chars.next()?;
    let (space_at, space) = chars.next()?;
    if matches!(marker, '•' | '-' | '*') && space.is_whitespace() {
        Some(&line[space_at + space.len_utf8()..])
    } else {
        None
    }
}

fn parse_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('*') {
        push_plain(&mut spans, &rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('*') {
            Some(close) => {
                let bold = &after_open[..close];
                if !bold.is_empty() {
                    spans.push(Span::Bold(bold.to_string()));
                }
                rest = &after_open[close + 1..];
            }
            None => {
                // Unmatched: the rest of the line, asterisk included, is literal.
                push_plain(&mut spans, &rest[open..]);
                return spans;
            }
        }
    }

    push_plain(&mut spans, rest);
    spans
}

fn push_plain(spans: &mut Vec<Span>, text: &str) {
    if text.is_empty() {
        return;
    }
    match spans.last_mut() {
        Some(Span::Plain(last)) => last.push_str(text),
        _ => spans.push(Span::Plain(text.to_string())),
    }
}
