//! Markup Reader Module
//!
//! Turns text into event streams:
//! - XmlReader: strict, well-formed XML
//! - HtmlReader: lenient HTML with browser-style recovery
//! - Events: the event model shared by every stream

pub mod events;
pub mod html;
pub mod xml;

pub use events::{DocType, Event, EventKind, QName, StartTag};
pub use html::HtmlReader;
pub use xml::XmlReader;

use crate::error::Result;
use crate::stream::{EventBuffer, EventSource};

/// Parse well-formed XML into a materialized buffer.
pub fn xml(text: &str) -> Result<EventBuffer> {
    XmlReader::new(text).iterate()?.materialize()
}

/// Parse HTML leniently into a materialized buffer.
pub fn html(text: &str) -> Result<EventBuffer> {
    HtmlReader::new(text).iterate()?.materialize()
}
