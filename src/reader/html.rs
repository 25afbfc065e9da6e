//! HTML Reader
//!
//! Lenient parser for real-world HTML. It never fails; instead it repairs
//! the markup the way browsers do, so the resulting stream is always
//! balanced:
//! - tag and attribute names are lowercased
//! - minimized attributes take their own name as value (`checked="checked"`)
//! - on duplicate attributes the first one wins
//! - void elements (`<br>`, `<input>`, ...) are closed immediately
//! - an end tag closes every element opened after its match
//! - an end tag with no open match is dropped and closes nothing, so
//!   `<div><p>a</span>b</p></div>` keeps `b` inside the paragraph
//! - elements still open at the end of input are closed
//! - `<script>` and `<style>` content is taken verbatim

use super::events::{DocType, Event, QName};
use crate::core::attributes::{parse_attributes, Attrs};
use crate::core::entities::decode_text;
use crate::core::tokenizer::{Token, TokenKind, Tokenizer};
use crate::error::{MarkupError, Result};
use crate::stream::{EventSource, Stream};
use std::collections::VecDeque;

/// Elements that never have content
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "frame", "hr", "img", "input", "isindex", "link",
    "meta", "param",
];

/// Elements whose content is raw text
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Single-pass source over HTML text
pub struct HtmlReader<'a> {
    input: Option<&'a str>,
}

impl<'a> HtmlReader<'a> {
    pub fn new(input: &'a str) -> Self {
        HtmlReader { input: Some(input) }
    }
}

impl<'a> EventSource<'a> for HtmlReader<'a> {
    fn iterate(&mut self) -> Result<Stream<'a>> {
        let input = self.input.take().ok_or(MarkupError::ExhaustedStream)?;
        Ok(Stream::new(HtmlEvents::new(input).map(Ok)))
    }
}

/// Event iterator behind [`HtmlReader`]
pub struct HtmlEvents<'a> {
    tokenizer: Tokenizer<'a>,
    open: Vec<QName>,
    pending: VecDeque<Event>,
    done: bool,
}

impl<'a> HtmlEvents<'a> {
    pub fn new(input: &'a str) -> Self {
        HtmlEvents {
            tokenizer: Tokenizer::new(input),
            open: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn start_tag(&mut self, token: &Token<'a>) {
        let name = token.name.unwrap_or_default().to_ascii_lowercase();
        let mut attrs = Attrs::new();
        for raw in parse_attributes(token.content, false).unwrap_or_default() {
            let attr_name = raw.name.to_ascii_lowercase();
            if attrs.contains(&attr_name) {
                continue;
            }
            let value = match raw.value {
                Some(value) => value.into_owned(),
                None => attr_name.clone(),
            };
            attrs.set(attr_name, value);
        }

        let name = QName::from(name);
        self.pending.push_back(Event::start_with(name.clone(), attrs));

        if is_void_element(name.as_str()) || token.kind == TokenKind::EmptyTag {
            self.pending.push_back(Event::End(name));
            return;
        }
        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            if let Some(raw) = self.tokenizer.raw_text(name.as_str()) {
                self.pending.push_back(Event::text(raw.content));
            }
        }
        self.open.push(name);
    }

    fn end_tag(&mut self, token: &Token<'a>) {
        let name = token.name.unwrap_or_default().to_ascii_lowercase();
        if is_void_element(&name) {
            return;
        }
        let Some(pos) = self.open.iter().rposition(|open| *open == name.as_str()) else {
            return;
        };
        while self.open.len() > pos {
            if let Some(open) = self.open.pop() {
                self.pending.push_back(Event::End(open));
            }
        }
    }

    fn push_text(&mut self, text: String) {
        // Coalesce adjacent text
        if let Some(Event::Text(last)) = self.pending.back_mut() {
            last.push_str(&text);
        } else if !text.is_empty() {
            self.pending.push_back(Event::Text(text));
        }
    }

    fn handle(&mut self, token: Token<'a>) {
        match token.kind {
            TokenKind::StartTag | TokenKind::EmptyTag => self.start_tag(&token),
            TokenKind::EndTag => self.end_tag(&token),
            TokenKind::Text => self.push_text(decode_text(token.content).into_owned()),
            TokenKind::CData => {
                self.pending.push_back(Event::StartCdata);
                if !token.content.is_empty() {
                    self.pending.push_back(Event::text(token.content));
                }
                self.pending.push_back(Event::EndCdata);
            }
            TokenKind::Comment => self.pending.push_back(Event::comment(token.content)),
            TokenKind::ProcessingInstruction => {
                let target = token.name.unwrap_or_default();
                let data = token.content.trim_end_matches('?').trim();
                self.pending.push_back(Event::pi(target, data));
            }
            TokenKind::DocType => {
                if let Some(doctype) = DocType::parse(token.content) {
                    self.pending.push_back(Event::DocType(doctype));
                }
            }
        }
    }

    /// Whether the next event must wait for more tokens (text may continue)
    fn needs_more(&self) -> bool {
        match self.pending.len() {
            0 => true,
            1 => matches!(self.pending.front(), Some(Event::Text(_))),
            _ => false,
        }
    }
}

impl<'a> Iterator for HtmlEvents<'a> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        while !self.done && self.needs_more() {
            match self.tokenizer.next_token() {
                Some(Ok(token)) => self.handle(token),
                // Lenient tokenizer does not fail; stop if it ever does
                Some(Err(_)) | None => {
                    self.done = true;
                    while let Some(open) = self.open.pop() {
                        self.pending.push_back(Event::End(open));
                    }
                }
            }
        }
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Vec<Event> {
        HtmlEvents::new(input).collect()
    }

    fn start(name: &str, attrs: &[(&str, &str)]) -> Event {
        Event::start(name, attrs.iter().copied()).unwrap()
    }

    #[test]
    fn test_auto_balance() {
        assert_eq!(
            events("<UL compact><LI>Foo</UL>"),
            [
                start("ul", &[("compact", "compact")]),
                start("li", &[]),
                Event::text("Foo"),
                Event::end("li"),
                Event::end("ul"),
            ]
        );
    }

    #[test]
    fn test_void_elements() {
        assert_eq!(
            events("<p>a<br>b</br></p>"),
            [
                start("p", &[]),
                Event::text("a"),
                start("br", &[]),
                Event::end("br"),
                Event::text("b"),
                Event::end("p"),
            ]
        );
    }

    #[test]
    fn test_stray_end_tag_dropped() {
        assert_eq!(
            events("<div></span>x</div>"),
            [start("div", &[]), Event::text("x"), Event::end("div")]
        );
    }

    #[test]
    fn test_stray_end_tag_keeps_open_elements() {
        let events = events("<div><p>a</span>b</p></div>");
        assert_eq!(
            events,
            [
                start("div", &[]),
                start("p", &[]),
                Event::text("ab"),
                Event::end("p"),
                Event::end("div"),
            ]
        );
        let out = Stream::from_events(events)
            .render(&crate::output::Serializer::html())
            .unwrap();
        assert_eq!(out, "<div><p>ab</p></div>");
    }

    #[test]
    fn test_close_at_eof() {
        let events = events("<div><p>text");
        assert_eq!(events.last(), Some(&Event::end("div")));
        assert_eq!(events[events.len() - 2], Event::end("p"));
    }

    #[test]
    fn test_duplicate_attribute_first_wins() {
        assert_eq!(
            events("<a href='1' HREF='2'></a>")[0],
            start("a", &[("href", "1")])
        );
    }

    #[test]
    fn test_script_raw_text() {
        let events = events("<script>if (a < b && c) x('</p>');</script>");
        assert_eq!(events[1], Event::text("if (a < b && c) x('</p>');"));
        assert_eq!(events[2], Event::end("script"));
    }

    #[test]
    fn test_stray_lt_and_entities() {
        assert_eq!(
            events("1 < 2 &amp; 3"),
            [Event::text("1 < 2 & 3")]
        );
    }

    #[test]
    fn test_non_ascii_attributes() {
        assert_eq!(
            events("<p title=café>x</p><b é>hi</b>"),
            [
                start("p", &[("title", "café")]),
                Event::text("x"),
                Event::end("p"),
                start("b", &[("é", "é")]),
                Event::text("hi"),
                Event::end("b"),
            ]
        );
    }

    #[test]
    fn test_single_pass() {
        let mut reader = HtmlReader::new("<p>");
        assert!(reader.iterate().is_ok());
        assert_eq!(reader.iterate().unwrap_err(), MarkupError::ExhaustedStream);
    }
}
