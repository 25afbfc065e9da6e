//! Markup Streams
//!
//! A [`Stream`] is a lazy, single-pass sequence of `Result<Event>`. Sources
//! produce streams, filters and selectors transform them, and a serializer
//! consumes them. Nothing is evaluated until the final consumer pulls.
//!
//! ```text
//! source.iterate()? | &form_filler | &sanitizer | &serializer
//! ```
//!
//! Errors travel in-band: a broken upstream yields an `Err` item at the point
//! of failure and every stage passes it through.

use crate::error::Result;
use crate::filters::Filter;
use crate::output::Serializer;
use crate::reader::events::Event;
use crate::xpath::{cache, matcher::Matcher, Selector};
use std::fmt;
use std::io;
use std::ops::BitOr;
use std::sync::Arc;

/// Lazy, single-pass event stream
pub struct Stream<'a> {
    events: Box<dyn Iterator<Item = Result<Event>> + 'a>,
}

impl<'a> Stream<'a> {
    /// Wrap any iterator of event results
    pub fn new<I>(events: I) -> Self
    where
        I: Iterator<Item = Result<Event>> + 'a,
    {
        Stream {
            events: Box::new(events),
        }
    }

    /// Stream over infallible events
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = Event>,
        I::IntoIter: 'a,
    {
        Self::new(events.into_iter().map(Ok))
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Keep only the subtrees, text and attribute values matched by
    /// `selector`, in document order.
    pub fn select(self, selector: &Selector) -> Stream<'a> {
        Stream::new(Matcher::new(self, selector.clone()))
    }

    /// Compile `path` through the shared selector cache and select with it.
    pub fn select_path(self, path: &str) -> Result<Stream<'a>> {
        let selector = cache::compile_cached(path)?;
        Ok(self.select(&selector))
    }

    /// Apply a filter; same as `stream | &filter`.
    pub fn filter<F: Filter + ?Sized>(self, filter: &'a F) -> Stream<'a> {
        filter.apply(self)
    }

    /// Serialize the whole stream into a string.
    pub fn render(self, serializer: &Serializer) -> Result<String> {
        serializer.render(self)
    }

    /// Serialize incrementally into a writer.
    pub fn write_to<W: io::Write>(self, serializer: &Serializer, out: W) -> Result<()> {
        serializer.write(self, out)
    }

    /// Collect into a restartable buffer. The first error wins.
    pub fn materialize(self) -> Result<EventBuffer> {
        self.collect::<Result<Vec<_>>>().map(EventBuffer::from)
    }
}

impl<'a> Iterator for Stream<'a> {
    type Item = Result<Event>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }
}

impl fmt::Debug for Stream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl<'a, F: Filter + ?Sized> BitOr<&'a F> for Stream<'a> {
    type Output = Stream<'a>;

    fn bitor(self, filter: &'a F) -> Stream<'a> {
        filter.apply(self)
    }
}

impl<'a> BitOr<&Serializer> for Stream<'a> {
    type Output = Result<String>;

    fn bitor(self, serializer: &Serializer) -> Result<String> {
        serializer.render(self)
    }
}

/// Anything that can hand out a stream of events.
///
/// Parsers are single-pass: a second `iterate` fails with
/// [`MarkupError::ExhaustedStream`](crate::MarkupError::ExhaustedStream).
/// Buffers and builder trees are restartable.
pub trait EventSource<'a> {
    fn iterate(&mut self) -> Result<Stream<'a>>;
}

/// Materialized, immutable event sequence. Cheap to clone and share across
/// threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventBuffer {
    events: Arc<[Event]>,
}

impl EventBuffer {
    pub fn new(events: Vec<Event>) -> Self {
        EventBuffer {
            events: events.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// A fresh stream over the buffered events
    pub fn stream(&self) -> Stream<'static> {
        let events = Arc::clone(&self.events);
        Stream::new((0..events.len()).map(move |i| Ok(events[i].clone())))
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        EventBuffer::new(Vec::new())
    }
}

impl From<Vec<Event>> for EventBuffer {
    fn from(events: Vec<Event>) -> Self {
        EventBuffer::new(events)
    }
}

impl FromIterator<Event> for EventBuffer {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        EventBuffer::new(iter.into_iter().collect())
    }
}

impl<'a> EventSource<'a> for EventBuffer {
    fn iterate(&mut self) -> Result<Stream<'a>> {
        Ok(self.stream())
    }
}
