//! Markup Event Types
//!
//! The event model every stream carries: a tag start, a tag end, text,
//! comments, processing instructions, and a few "other" kinds (DOCTYPE and
//! CDATA section markers). Events own their data and compare structurally.

use crate::core::attributes::Attrs;
use crate::error::{MarkupError, Result};
use std::borrow::Borrow;
use std::fmt;

/// A qualified name, `local` or `prefix:local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QName(String);

impl QName {
    pub fn new(name: impl Into<String>) -> Self {
        QName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace prefix (before colon), if any
    pub fn prefix(&self) -> Option<&str> {
        split_name(&self.0).0
    }

    /// Local name (after colon)
    pub fn local_name(&self) -> &str {
        split_name(&self.0).1
    }
}

/// Split a name into prefix and local name at the colon
fn split_name(name: &str) -> (Option<&str>, &str) {
    match memchr::memchr(b':', name.as_bytes()) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

impl From<&str> for QName {
    fn from(name: &str) -> Self {
        QName(name.to_string())
    }
}

impl From<String> for QName {
    fn from(name: String) -> Self {
        QName(name)
    }
}

impl From<&QName> for QName {
    fn from(name: &QName) -> Self {
        name.clone()
    }
}

impl Borrow<str> for QName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for QName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for QName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Start tag event data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StartTag {
    pub name: QName,
    pub attrs: Attrs,
}

/// A DOCTYPE declaration: `<!DOCTYPE name PUBLIC "pubid" "sysid">`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocType {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

impl DocType {
    pub fn new(
        name: impl Into<String>,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Self {
        DocType {
            name: name.into(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        }
    }

    pub fn html_strict() -> Self {
        Self::new(
            "html",
            Some("-//W3C//DTD HTML 4.01//EN"),
            Some("http://www.w3.org/TR/html4/strict.dtd"),
        )
    }

    pub fn html_transitional() -> Self {
        Self::new(
            "html",
            Some("-//W3C//DTD HTML 4.01 Transitional//EN"),
            Some("http://www.w3.org/TR/html4/loose.dtd"),
        )
    }

    pub fn xhtml_strict() -> Self {
        Self::new(
            "html",
            Some("-//W3C//DTD XHTML 1.0 Strict//EN"),
            Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd"),
        )
    }

    pub fn xhtml_transitional() -> Self {
        Self::new(
            "html",
            Some("-//W3C//DTD XHTML 1.0 Transitional//EN"),
            Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd"),
        )
    }

    /// Parse the body of a declaration (the text between `<!DOCTYPE` and
    /// `>`). An internal subset is skipped.
    pub fn parse(body: &str) -> Option<Self> {
        let body = match body.find('[') {
            Some(pos) => &body[..pos],
            None => body,
        };
        let mut rest = body.trim_start();
        let name_end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        if name.is_empty() {
            return None;
        }
        rest = rest[name_end..].trim_start();

        let mut doctype = DocType::new(name, None, None);
        let keyword_end = rest.find(|c: char| c.is_whitespace()).unwrap_or(rest.len());
        let keyword = rest[..keyword_end].to_ascii_uppercase();
        rest = &rest[keyword_end..];
        match keyword.as_str() {
            "PUBLIC" => {
                let (public_id, after) = quoted(rest)?;
                doctype.public_id = Some(public_id.to_string());
                doctype.system_id = quoted(after).map(|(s, _)| s.to_string());
            }
            "SYSTEM" => {
                doctype.system_id = Some(quoted(rest)?.0.to_string());
            }
            _ => {}
        }
        Some(doctype)
    }
}

/// Extract a leading quoted literal, returning it and the rest of the input
fn quoted(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    let quote = input.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let body = &input[1..];
    let close = body.find(quote)?;
    Some((&body[..close], &body[close + 1..]))
}

/// Markup stream event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    /// Start of an element: <name attrs...>
    Start(StartTag),
    /// End of an element: </name>
    End(QName),
    /// Character data, never escaped
    Text(String),
    /// Comment content
    Comment(String),
    /// Processing instruction: <?target data?>
    Pi { target: String, data: String },
    /// DOCTYPE declaration
    DocType(DocType),
    /// Start of a CDATA section
    StartCdata,
    /// End of a CDATA section
    EndCdata,
}

/// Coarse classification of events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    End,
    Text,
    Comment,
    Pi,
    /// DOCTYPE and CDATA markers
    Other,
}

impl Event {
    /// Create a START event from an attribute list.
    ///
    /// Fails with [`MarkupError::InvalidEvent`] if a name repeats.
    pub fn start<I, K, V>(name: impl Into<QName>, attrs: I) -> Result<Event>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<QName>,
        V: Into<String>,
    {
        let name = name.into();
        match Attrs::try_from_pairs(attrs) {
            Ok(attrs) => Ok(Event::Start(StartTag { name, attrs })),
            Err(dup) => Err(MarkupError::InvalidEvent {
                tag: name.to_string(),
                name: dup.to_string(),
            }),
        }
    }

    /// Create a START event from an already validated attribute map
    pub fn start_with(name: impl Into<QName>, attrs: Attrs) -> Event {
        Event::Start(StartTag {
            name: name.into(),
            attrs,
        })
    }

    pub fn end(name: impl Into<QName>) -> Event {
        Event::End(name.into())
    }

    pub fn text(text: impl Into<String>) -> Event {
        Event::Text(text.into())
    }

    pub fn comment(text: impl Into<String>) -> Event {
        Event::Comment(text.into())
    }

    pub fn pi(target: impl Into<String>, data: impl Into<String>) -> Event {
        Event::Pi {
            target: target.into(),
            data: data.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start(_) => EventKind::Start,
            Event::End(_) => EventKind::End,
            Event::Text(_) => EventKind::Text,
            Event::Comment(_) => EventKind::Comment,
            Event::Pi { .. } => EventKind::Pi,
            Event::DocType(_) | Event::StartCdata | Event::EndCdata => EventKind::Other,
        }
    }

    /// Check if this is a start element event
    pub fn is_start(&self) -> bool {
        matches!(self, Event::Start(_))
    }

    /// Check if this is an end element event
    pub fn is_end(&self) -> bool {
        matches!(self, Event::End(_))
    }

    /// Get as start tag if applicable
    pub fn as_start(&self) -> Option<&StartTag> {
        match self {
            Event::Start(tag) => Some(tag),
            _ => None,
        }
    }

    /// Get text content if applicable
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Event::Text(text) => Some(text),
            _ => None,
        }
    }
}
