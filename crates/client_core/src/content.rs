//! Inline message content scanning.
//!
//! Message bodies are split into plain text, links, custom emoji and mentions
//! in a single left-to-right pass. At each position the emoji form is tried
//! first, then a link, then the mention forms; the first that matches wins and
//! scanning resumes after it. Anything that does not fit a recognized form,
//! including malformed bracket tokens, stays in the surrounding plain text.

use std::borrow::Cow;

use crate::mentions::MentionDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MentionKind {
    User,
    Role,
    Channel,
    /// `@everyone` / `@here`.
    Broadcast,
}

/// A span of the input as found by [`ContentScanner`], borrowing from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawToken<'a> {
    Text(&'a str),
    Link(&'a str),
    Emoji {
        raw: &'a str,
        animated: bool,
        name: &'a str,
        id: &'a str,
    },
    Mention {
        raw: &'a str,
        kind: MentionKind,
        id: &'a str,
    },
}

impl<'a> RawToken<'a> {
    pub fn source(&self) -> &'a str {
        match *self {
            RawToken::Text(raw) | RawToken::Link(raw) => raw,
            RawToken::Emoji { raw, .. } | RawToken::Mention { raw, .. } => raw,
        }
    }
}

/// Iterator over the tokens of a message body.
///
/// Cloning a scanner restarts from the clone point; every span of the input is
/// yielded exactly once and in order.
#[derive(Debug, Clone)]
pub struct ContentScanner<'a> {
    input: &'a str,
    pos: usize,
    pending: Option<(usize, RawToken<'a>)>,
}

impl<'a> ContentScanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            pending: None,
        }
    }
}

impl<'a> Iterator for ContentScanner<'a> {
    type Item = RawToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((end, token)) = self.pending.take() {
            self.pos = end;
            return Some(token);
        }
        if self.pos >= self.input.len() {
            return None;
        }

        match find_match(self.input, self.pos) {
            Some((start, end, token)) if start == self.pos => {
                self.pos = end;
                Some(token)
            }
            Some((start, end, token)) => {
                let text = &self.input[self.pos..start];
                self.pending = Some((end, token));
                self.pos = start;
                Some(RawToken::Text(text))
            }
            None => {
                let text = &self.input[self.pos..];
                self.pos = self.input.len();
                Some(RawToken::Text(text))
            }
        }
    }
}

fn find_match(input: &str, from: usize) -> Option<(usize, usize, RawToken<'_>)> {
    let bytes = input.as_bytes();
    (from..bytes.len())
        .filter(|&i| matches!(bytes[i], b'<' | b'h' | b'@'))
        .find_map(|i| match_at(&input[i..]).map(|(len, token)| (i, i + len, token)))
}

fn match_at(rest: &str) -> Option<(usize, RawToken<'_>)> {
    match_emoji(rest)
        .or_else(|| match_link(rest))
        .or_else(|| match_mention(rest))
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Length of the run at the start of `s` whose bytes satisfy `pred`.
fn run_len(s: &str, pred: impl Fn(u8) -> bool) -> usize {
    s.bytes().take_while(|&b| pred(b)).count()
}

/// `<:name:id>` or `<a:name:id>`.
fn match_emoji(rest: &str) -> Option<(usize, RawToken<'_>)> {
    let body = rest.strip_prefix('<')?;
    let (animated, body) = match body.strip_prefix("a:") {
        Some(after) => (true, after),
        None => (false, body.strip_prefix(':')?),
    };

    let name_len = run_len(body, is_name_byte);
    if name_len == 0 {
        return None;
    }
    let name = &body[..name_len];
    let after_name = body[name_len..].strip_prefix(':')?;

    let id_len = run_len(after_name, |b| b.is_ascii_digit());
    if id_len == 0 {
        return None;
    }
    let id = &after_name[..id_len];
    after_name[id_len..].strip_prefix('>')?;

    let len = rest.len() - after_name.len() + id_len + 1;
    Some((
        len,
        RawToken::Emoji {
            raw: &rest[..len],
            animated,
            name,
            id,
        },
    ))
}

/// `http://` or `https://` followed by at least one non-whitespace character.
fn match_link(rest: &str) -> Option<(usize, RawToken<'_>)> {
    let after_scheme = rest
        .strip_prefix("https://")
        .or_else(|| rest.strip_prefix("http://"))?;
    let tail_len: usize = after_scheme
        .chars()
        .take_while(|c| !c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if tail_len == 0 {
        return None;
    }
    let len = rest.len() - after_scheme.len() + tail_len;
    Some((len, RawToken::Link(&rest[..len])))
}

/// `<@id>`, `<@!id>`, `<@&id>`, `<#id>`, `@everyone`, `@here`.
fn match_mention(rest: &str) -> Option<(usize, RawToken<'_>)> {
    for broadcast in ["@everyone", "@here"] {
        if rest.starts_with(broadcast) {
            return Some((
                broadcast.len(),
                RawToken::Mention {
                    raw: &rest[..broadcast.len()],
                    kind: MentionKind::Broadcast,
                    id: &rest[..broadcast.len()],
                },
            ));
        }
    }

    let (kind, body) = if let Some(body) = rest.strip_prefix("<@&") {
        (MentionKind::Role, body)
    } else if let Some(body) = rest.strip_prefix("<@!") {
        (MentionKind::User, body)
    } else if let Some(body) = rest.strip_prefix("<@") {
        (MentionKind::User, body)
    } else if let Some(body) = rest.strip_prefix("<#") {
        (MentionKind::Channel, body)
    } else {
        return None;
    };

    let id_len = run_len(body, |b| b.is_ascii_digit());
    if id_len == 0 {
        return None;
    }
    body[id_len..].strip_prefix('>')?;

    let len = rest.len() - body.len() + id_len + 1;
    Some((
        len,
        RawToken::Mention {
            raw: &rest[..len],
            kind,
            id: &body[..id_len],
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEmoji {
    pub animated: bool,
    pub name: String,
    pub id: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub kind: MentionKind,
    pub id: String,
    pub label: String,
    pub raw: String,
}

/// A renderable piece of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSegment {
    Text(String),
    Link(String),
    Emoji(CustomEmoji),
    Mention(Mention),
}

impl ContentSegment {
    /// The exact input text this segment was produced from.
    pub fn source(&self) -> &str {
        match self {
            ContentSegment::Text(text) | ContentSegment::Link(text) => text,
            ContentSegment::Emoji(emoji) => &emoji.raw,
            ContentSegment::Mention(mention) => &mention.raw,
        }
    }

    /// Plain-text rendering: emoji as `:name:`, mentions as their label.
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            ContentSegment::Text(text) | ContentSegment::Link(text) => Cow::Borrowed(text),
            ContentSegment::Emoji(emoji) => Cow::Owned(format!(":{}:", emoji.name)),
            ContentSegment::Mention(mention) => Cow::Borrowed(&mention.label),
        }
    }
}

/// Splits `content` into segments, labelling mentions through `directory`.
///
/// Always returns at least one segment; empty input yields one empty text
/// segment.
pub fn parse_content(content: &str, directory: &MentionDirectory) -> Vec<ContentSegment> {
    let mut segments: Vec<ContentSegment> = ContentScanner::new(content)
        .map(|token| match token {
            RawToken::Text(text) => ContentSegment::Text(text.to_string()),
            RawToken::Link(url) => ContentSegment::Link(url.to_string()),
            RawToken::Emoji {
                raw,
                animated,
                name,
                id,
            } => ContentSegment::Emoji(CustomEmoji {
                animated,
                name: name.to_string(),
                id: id.to_string(),
                raw: raw.to_string(),
            }),
            RawToken::Mention { raw, kind, id } => ContentSegment::Mention(Mention {
                kind,
                id: id.to_string(),
                label: directory.resolve(kind, id),
                raw: raw.to_string(),
            }),
        })
        .collect();

    if segments.is_empty() {
        segments.push(ContentSegment::Text(content.to_string()));
    }
    segments
}

/// Joins segments into a single line of plain text.
pub fn render_plain(segments: &[ContentSegment]) -> String {
    segments.iter().map(|segment| segment.display_text()).collect()
}

#[cfg(test)]
#[path = "tests/content_tests.rs"]
mod tests;
