//! XML Reader
//!
//! Pull parser for well-formed XML. Tags must nest properly; fragments with
//! several top-level elements are accepted. Empty tags (`<br/>`) produce a
//! START immediately followed by an END, CDATA sections are wrapped in
//! `StartCdata`/`EndCdata` markers, and the XML declaration is consumed.

use super::events::{DocType, Event, QName};
use crate::core::attributes::{parse_attributes, Attrs};
use crate::core::entities::decode_text;
use crate::core::scanner::line_col;
use crate::core::tokenizer::{ParseError, Token, TokenKind, Tokenizer};
use crate::error::{MarkupError, Result};
use crate::stream::{EventSource, Stream};
use std::collections::VecDeque;

/// Single-pass source over XML text
pub struct XmlReader<'a> {
    input: Option<&'a str>,
}

impl<'a> XmlReader<'a> {
    pub fn new(input: &'a str) -> Self {
        XmlReader { input: Some(input) }
    }
}

impl<'a> EventSource<'a> for XmlReader<'a> {
    fn iterate(&mut self) -> Result<Stream<'a>> {
        let input = self.input.take().ok_or(MarkupError::ExhaustedStream)?;
        Ok(Stream::new(XmlEvents::new(input)))
    }
}

/// Event iterator behind [`XmlReader`]
pub struct XmlEvents<'a> {
    tokenizer: Tokenizer<'a>,
    open: Vec<QName>,
    pending: VecDeque<Event>,
    done: bool,
}

impl<'a> XmlEvents<'a> {
    pub fn new(input: &'a str) -> Self {
        XmlEvents {
            tokenizer: Tokenizer::new_strict(input),
            open: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn error_at(&self, message: impl Into<String>, position: usize) -> MarkupError {
        parse_error(self.tokenizer.input(), ParseError::new(message, position))
    }

    /// Turn one token into zero or more events; `Ok(None)` means the token
    /// produced nothing (empty text, XML declaration).
    fn handle(&mut self, token: Token<'a>) -> Result<Option<Event>> {
        let start = token.span.0;
        match token.kind {
            TokenKind::StartTag | TokenKind::EmptyTag => {
                let name = QName::from(token.name.unwrap_or_default());
                let raw = parse_attributes(token.content, true)
                    .map_err(|msg| self.error_at(msg, start))?;
                let attrs = Attrs::try_from_pairs(
                    raw.into_iter()
                        .map(|a| (a.name, a.value.unwrap_or_default().into_owned())),
                )
                .map_err(|dup| MarkupError::InvalidEvent {
                    tag: name.to_string(),
                    name: dup.to_string(),
                })?;
                if token.kind == TokenKind::EmptyTag {
                    self.pending.push_back(Event::End(name.clone()));
                } else {
                    self.open.push(name.clone());
                }
                Ok(Some(Event::start_with(name, attrs)))
            }
            TokenKind::EndTag => {
                let name = token.name.unwrap_or_default();
                match self.open.pop() {
                    Some(open) if open == name => Ok(Some(Event::End(open))),
                    Some(open) => Err(self.error_at(
                        format!("mismatched tag: expected </{}>, found </{}>", open, name),
                        start,
                    )),
                    None => Err(self.error_at(format!("unexpected end tag </{}>", name), start)),
                }
            }
            TokenKind::Text => {
                if token.content.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Event::Text(decode_text(token.content).into_owned())))
            }
            TokenKind::CData => {
                if !token.content.is_empty() {
                    self.pending.push_back(Event::text(token.content));
                }
                self.pending.push_back(Event::EndCdata);
                Ok(Some(Event::StartCdata))
            }
            TokenKind::Comment => Ok(Some(Event::comment(token.content))),
            TokenKind::ProcessingInstruction => {
                let target = token.name.unwrap_or_default();
                if target.eq_ignore_ascii_case("xml") {
                    return Ok(None);
                }
                Ok(Some(Event::pi(target, token.content)))
            }
            TokenKind::DocType => match DocType::parse(token.content) {
                Some(doctype) => Ok(Some(Event::DocType(doctype))),
                None => Err(self.error_at("malformed DOCTYPE declaration", start)),
            },
        }
    }
}

impl<'a> Iterator for XmlEvents<'a> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        if self.done {
            return None;
        }
        loop {
            let token = match self.tokenizer.next_token() {
                Some(Ok(token)) => token,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(parse_error(self.tokenizer.input(), err)));
                }
                None => {
                    self.done = true;
                    let name = self.open.last()?;
                    let message = format!("unclosed element <{}>", name);
                    return Some(Err(self.error_at(message, self.tokenizer.input().len())));
                }
            };
            match self.handle(token) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    self.pending.clear();
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Attach line and column information to a tokenizer error
pub(crate) fn parse_error(input: &str, err: ParseError) -> MarkupError {
    let (line, column) = line_col(input, err.position);
    MarkupError::Parse {
        message: err.message,
        line,
        column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Result<Vec<Event>> {
        XmlReader::new(input).iterate()?.collect()
    }

    #[test]
    fn test_simple_element() {
        let events = events("<root>hello</root>").unwrap();
        assert_eq!(
            events,
            [
                Event::start("root", Vec::<(&str, &str)>::new()).unwrap(),
                Event::text("hello"),
                Event::end("root"),
            ]
        );
    }

    #[test]
    fn test_empty_element() {
        let events = events("<br/>").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_start());
        assert_eq!(events[1], Event::end("br"));
    }

    #[test]
    fn test_attributes_and_entities() {
        let events = events("<div id=\"main\" title='a &amp; b'>&lt;x&gt;</div>").unwrap();
        let start = events[0].as_start().unwrap();
        assert_eq!(start.attrs.get("id"), Some("main"));
        assert_eq!(start.attrs.get("title"), Some("a & b"));
        assert_eq!(events[1], Event::text("<x>"));
    }

    #[test]
    fn test_cdata() {
        let events = events("<script><![CDATA[alert('<hi>')]]></script>").unwrap();
        assert_eq!(events[1], Event::StartCdata);
        assert_eq!(events[2], Event::text("alert('<hi>')"));
        assert_eq!(events[3], Event::EndCdata);
    }

    #[test]
    fn test_declaration_doctype_comment_pi() {
        let events = events(
            "<?xml version=\"1.0\"?><!DOCTYPE html><!-- c --><?php echo 1 ?><html/>",
        )
        .unwrap();
        assert_eq!(events[0], Event::DocType(DocType::new("html", None, None)));
        assert_eq!(events[1], Event::comment(" c "));
        assert_eq!(events[2], Event::pi("php", "echo 1"));
        assert!(events[3].is_start());
    }

    #[test]
    fn test_fragment() {
        let events = events("<a/>text<b></b>").unwrap();
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_mismatched_tag() {
        let err = events("<a>\n  <b></a>").unwrap_err();
        match err {
            MarkupError::Parse { line, column, message } => {
                assert_eq!((line, column), (2, 6));
                assert!(message.contains("mismatched"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_element() {
        let err = events("<a><b></b>").unwrap_err();
        assert!(matches!(err, MarkupError::Parse { ref message, .. } if message.contains("<a>")));
    }

    #[test]
    fn test_duplicate_attribute() {
        let err = events("<a href=\"#\" href=\"/\"/>").unwrap_err();
        assert_eq!(
            err,
            MarkupError::InvalidEvent {
                tag: "a".into(),
                name: "href".into()
            }
        );
    }

    #[test]
    fn test_non_ascii_markup() {
        let events = events("<café naïve=\"é\"><b>été</b><c x=\"ü\"/></café>").unwrap();
        let start = events[0].as_start().unwrap();
        assert_eq!(start.name.as_str(), "café");
        assert_eq!(start.attrs.get("naïve"), Some("é"));
        assert_eq!(events[2], Event::text("été"));
        assert_eq!(events[5].as_start().unwrap().attrs.get("x"), Some("ü"));

        let err = self::events("<a x=é>t</a>").unwrap_err();
        assert!(matches!(err, MarkupError::Parse { line: 1, column: 1, .. }), "{err:?}");
    }

    #[test]
    fn test_single_pass() {
        let mut reader = XmlReader::new("<a/>");
        assert!(reader.iterate().is_ok());
        assert_eq!(reader.iterate().unwrap_err(), MarkupError::ExhaustedStream);
    }
}
