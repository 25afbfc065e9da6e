//! Stream Transformer
//!
//! Applies a chain of edits to the parts of a stream picked by path
//! selectors. Every event travels with a [`Mark`] telling whether, and how,
//! it is currently selected; each step reads and rewrites those marks.
//!
//! ```
//! use markstream::builder::tag;
//! use markstream::{reader, Serializer, Transformer};
//!
//! let doc = reader::html("<html><body>Some <em>body</em> text.</body></html>").unwrap();
//! let emphasis = Transformer::path("body/em")
//!     .unwrap()
//!     .map_text(|text| text.to_uppercase())
//!     .unwrap_tag()
//!     .wrap(tag("u"));
//! let out = doc.stream() | &emphasis | &Serializer::xml();
//! assert_eq!(out.unwrap(), "<html><body>Some <u>BODY</u> text.</body></html>");
//! ```
//!
//! A selection is a sequence of runs: a selected element from its START
//! through its END, or consecutive selected nodes of the same kind. Steps
//! that insert or replace content work per run. Inserted events are never
//! selected.

use super::Filter;
use crate::builder::{Element, Fragment};
use crate::error::Result;
use crate::reader::events::{Event, QName};
use crate::stream::{EventBuffer, Stream};
use crate::xpath::cache;
use crate::xpath::matcher::{MatchState, Mark};
use crate::xpath::Selector;
use log::debug;
use std::collections::VecDeque;
use std::fmt;
use std::ops::BitOr;
use std::sync::{Arc, Mutex, MutexGuard};

/// An event with its selection mark
pub type MarkedEvent = (Option<Mark>, Event);

/// Stream of marked events
pub type Marked<'a> = Box<dyn Iterator<Item = Result<MarkedEvent>> + 'a>;

type TextFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
type ApplyFn = Arc<dyn for<'s> Fn(Marked<'s>) -> Marked<'s> + Send + Sync>;

/// Shared event store filled by [`Transformer::copy`] and
/// [`Transformer::cut`], read back when used as [`Content`].
///
/// Clones share the same store. Contents are read when the content is
/// inserted, so a buffer filled earlier in the same stream can be inserted
/// further down.
#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    events: Arc<Mutex<Vec<Event>>>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current contents
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn stream(&self) -> Stream<'static> {
        Stream::from_events(self.events())
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn push(&self, event: Event) {
        self.lock().push(event);
    }
}

/// Content inserted by a transformation
#[derive(Debug, Clone)]
pub enum Content {
    Events(EventBuffer),
    /// Whatever the buffer holds at insertion time
    Buffer(StreamBuffer),
    /// An element whose children are followed by the buffer contents
    Within(Element, StreamBuffer),
}

impl Content {
    /// `element` with the contents of `buffer` appended to its children
    pub fn within(element: Element, buffer: &StreamBuffer) -> Self {
        Content::Within(element, buffer.clone())
    }

    pub fn events(&self) -> Vec<Event> {
        match self {
            Content::Events(buffer) => buffer.events().to_vec(),
            Content::Buffer(buffer) => buffer.events(),
            Content::Within(element, buffer) => {
                let mut events = element.to_events();
                let end = events.pop();
                events.extend(buffer.events());
                events.extend(end);
                events
            }
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Events(EventBuffer::new(vec![Event::text(text)]))
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Events(EventBuffer::new(vec![Event::Text(text)]))
    }
}

impl From<Element> for Content {
    fn from(element: Element) -> Self {
        Content::Events(element.to_events().into())
    }
}

impl From<Fragment> for Content {
    fn from(fragment: Fragment) -> Self {
        Content::Events(fragment.to_events().into())
    }
}

impl From<EventBuffer> for Content {
    fn from(buffer: EventBuffer) -> Self {
        Content::Events(buffer)
    }
}

impl From<StreamBuffer> for Content {
    fn from(buffer: StreamBuffer) -> Self {
        Content::Buffer(buffer)
    }
}

impl From<&StreamBuffer> for Content {
    fn from(buffer: &StreamBuffer) -> Self {
        Content::Buffer(buffer.clone())
    }
}

#[derive(Clone)]
enum Step {
    Select(Selector),
    End,
    Invert,
    Empty,
    Remove,
    Unwrap,
    Wrap(Element),
    Replace(Content),
    Before(Content),
    After(Content),
    Prepend(Content),
    Append(Content),
    SetAttr(QName, String),
    DelAttr(String),
    Rename(QName),
    MapText(TextFn),
    Copy { buffer: StreamBuffer, accumulate: bool },
    Apply(ApplyFn),
    Trace(String),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Select(_) => "select",
            Step::End => "end",
            Step::Invert => "invert",
            Step::Empty => "empty",
            Step::Remove => "remove",
            Step::Unwrap => "unwrap",
            Step::Wrap(_) => "wrap",
            Step::Replace(_) => "replace",
            Step::Before(_) => "before",
            Step::After(_) => "after",
            Step::Prepend(_) => "prepend",
            Step::Append(_) => "append",
            Step::SetAttr(..) => "set_attr",
            Step::DelAttr(_) => "remove_attr",
            Step::Rename(_) => "rename",
            Step::MapText(_) => "map_text",
            Step::Copy { .. } => "copy",
            Step::Apply(_) => "apply",
            Step::Trace(_) => "trace",
        }
    }

    fn apply<'a>(&'a self, input: Marked<'a>) -> Marked<'a> {
        match self {
            Step::Select(selector) => Box::new(Selecting::new(input, selector.clone())),
            Step::End => Box::new(input.map(|item| item.map(|(_, event)| (Some(Mark::Outside), event)))),
            Step::Invert => Box::new(input.map(|item| {
                item.map(|(mark, event)| match mark {
                    Some(_) => (None, event),
                    None => (Some(Mark::Outside), event),
                })
            })),
            Step::Empty => Box::new(input.filter(|item| !matches!(item, Ok((Some(Mark::Inside), _))))),
            Step::Remove => Box::new(input.filter(|item| !matches!(item, Ok((Some(_), _))))),
            Step::Unwrap => Box::new(input.filter(|item| {
                !matches!(item, Ok((Some(Mark::Enter | Mark::Exit), _)))
            })),
            Step::Wrap(_)
            | Step::Replace(_)
            | Step::Before(_)
            | Step::After(_)
            | Step::Copy { .. } => Box::new(Runs::new(input, self)),
            Step::Prepend(content) => Box::new(input.flat_map(move |item| match item {
                Ok((Some(Mark::Enter), event)) => {
                    let mut out = vec![Ok((Some(Mark::Enter), event))];
                    out.extend(inserted(content));
                    out
                }
                other => vec![other],
            })),
            Step::Append(content) => Box::new(input.flat_map(move |item| match item {
                Ok((Some(Mark::Exit), event)) => {
                    let mut out: Vec<_> = inserted(content).collect();
                    out.push(Ok((Some(Mark::Exit), event)));
                    out
                }
                other => vec![other],
            })),
            Step::SetAttr(name, value) => Box::new(input.map(move |item| {
                item.map(|(mark, event)| match (mark, event) {
                    (Some(Mark::Enter), Event::Start(mut tag)) => {
                        tag.attrs.set(name.clone(), value.clone());
                        (mark, Event::Start(tag))
                    }
                    other => other,
                })
            })),
            Step::DelAttr(name) => Box::new(input.map(move |item| {
                item.map(|(mark, event)| match (mark, event) {
                    (Some(Mark::Enter), Event::Start(mut tag)) => {
                        tag.attrs.remove(name);
                        (mark, Event::Start(tag))
                    }
                    other => other,
                })
            })),
            Step::Rename(name) => Box::new(input.map(move |item| {
                item.map(|(mark, event)| match (mark, event) {
                    (Some(Mark::Enter), Event::Start(mut tag)) => {
                        tag.name = name.clone();
                        (mark, Event::Start(tag))
                    }
                    (Some(Mark::Exit), Event::End(_)) => (mark, Event::End(name.clone())),
                    other => other,
                })
            })),
            Step::MapText(func) => Box::new(input.map(move |item| {
                item.map(|(mark, event)| match (mark, event) {
                    (Some(mark), Event::Text(text)) => (Some(mark), Event::Text(func(&text))),
                    other => other,
                })
            })),
            Step::Apply(func) => func(input),
            Step::Trace(prefix) => Box::new(input.map(move |item| {
                if let Ok((mark, event)) = &item {
                    debug!("{}{:?} {:?}", prefix, mark, event);
                }
                item
            })),
        }
    }
}

fn inserted(content: &Content) -> impl Iterator<Item = Result<MarkedEvent>> {
    content.events().into_iter().map(|event| Ok((None, event)))
}

/// A chain of selections and edits, applied lazily as a [`Filter`].
///
/// A new transformer selects the whole stream. Builder methods append steps;
/// steps run in order on every stream the transformer is applied to.
#[derive(Clone, Default)]
pub struct Transformer {
    steps: Vec<Step>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `path` in the whole stream, compiled through the selector cache
    pub fn path(path: &str) -> Result<Self> {
        Self::new().end().select_path(path)
    }

    fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Narrow the current selection to what `selector` matches inside it.
    ///
    /// Relative paths take each top-level selected element as context.
    /// Attribute paths select nothing here.
    pub fn select(self, selector: &Selector) -> Self {
        self.step(Step::Select(selector.clone()))
    }

    pub fn select_path(self, path: &str) -> Result<Self> {
        let selector = cache::compile_cached(path)?;
        Ok(self.select(&selector))
    }

    /// Select the whole stream again
    pub fn end(self) -> Self {
        self.step(Step::End)
    }

    /// Select everything that is not selected, and nothing that is
    pub fn invert(self) -> Self {
        self.step(Step::Invert)
    }

    /// Remove the content of selected elements, keeping their tags
    pub fn empty(self) -> Self {
        self.step(Step::Empty)
    }

    /// Remove the selection
    pub fn remove(self) -> Self {
        self.step(Step::Remove)
    }

    /// Remove the tags of selected elements, keeping their content
    pub fn unwrap_tag(self) -> Self {
        self.step(Step::Unwrap)
    }

    /// Wrap each run in `element`. Existing children of `element` come first.
    pub fn wrap(self, element: Element) -> Self {
        self.step(Step::Wrap(element))
    }

    pub fn replace(self, content: impl Into<Content>) -> Self {
        self.step(Step::Replace(content.into()))
    }

    pub fn before(self, content: impl Into<Content>) -> Self {
        self.step(Step::Before(content.into()))
    }

    pub fn after(self, content: impl Into<Content>) -> Self {
        self.step(Step::After(content.into()))
    }

    /// Insert after the START of each selected element
    pub fn prepend(self, content: impl Into<Content>) -> Self {
        self.step(Step::Prepend(content.into()))
    }

    /// Insert before the END of each selected element
    pub fn append(self, content: impl Into<Content>) -> Self {
        self.step(Step::Append(content.into()))
    }

    pub fn set_attr(self, name: impl Into<QName>, value: impl Into<String>) -> Self {
        self.step(Step::SetAttr(name.into(), value.into()))
    }

    pub fn remove_attr(self, name: impl Into<String>) -> Self {
        self.step(Step::DelAttr(name.into()))
    }

    pub fn rename(self, name: impl Into<QName>) -> Self {
        self.step(Step::Rename(name.into()))
    }

    /// Rewrite selected text
    pub fn map_text<F>(self, func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.step(Step::MapText(Arc::new(func)))
    }

    /// Copy each selected run into `buffer`, replacing what it held before
    pub fn copy(self, buffer: &StreamBuffer) -> Self {
        self.step(Step::Copy {
            buffer: buffer.clone(),
            accumulate: false,
        })
    }

    /// Like [`copy`](Self::copy), but keeps earlier contents
    pub fn copy_all(self, buffer: &StreamBuffer) -> Self {
        self.step(Step::Copy {
            buffer: buffer.clone(),
            accumulate: true,
        })
    }

    /// Copy each selected run into `buffer`, then remove the selection
    pub fn cut(self, buffer: &StreamBuffer) -> Self {
        self.copy(buffer).remove()
    }

    /// Run a custom step over the marked stream
    pub fn apply<F>(self, func: F) -> Self
    where
        F: for<'s> Fn(Marked<'s>) -> Marked<'s> + Send + Sync + 'static,
    {
        self.step(Step::Apply(Arc::new(func)))
    }

    /// Log every marked event at debug level
    pub fn trace(self, prefix: impl Into<String>) -> Self {
        self.step(Step::Trace(prefix.into()))
    }

    /// Append the steps of `other`
    pub fn then(mut self, other: Transformer) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// The stream with the selection marks of the last step
    pub fn marked<'a>(&'a self, stream: Stream<'a>) -> Marked<'a> {
        let mut marked: Marked<'a> =
            Box::new(stream.map(|item| item.map(|event| (Some(Mark::Outside), event))));
        for step in &self.steps {
            marked = step.apply(marked);
        }
        marked
    }
}

impl Filter for Transformer {
    fn apply<'a>(&'a self, stream: Stream<'a>) -> Stream<'a> {
        Stream::new(self.marked(stream).map(|item| item.map(|(_, event)| event)))
    }
}

impl BitOr for Transformer {
    type Output = Transformer;

    fn bitor(self, other: Transformer) -> Transformer {
        self.then(other)
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<_> = self.steps.iter().map(Step::name).collect();
        f.debug_struct("Transformer").field("steps", &steps).finish()
    }
}

/// Re-marks selected events with a fresh selector
struct Selecting<'a> {
    input: Marked<'a>,
    state: MatchState,
    failed: bool,
    finished: bool,
}

impl<'a> Selecting<'a> {
    fn new(input: Marked<'a>, selector: Selector) -> Self {
        Selecting {
            input,
            state: MatchState::new(selector),
            failed: false,
            finished: false,
        }
    }
}

impl Iterator for Selecting<'_> {
    type Item = Result<MarkedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.input.next() {
            Some(Ok((None, event))) => Some(Ok((None, event))),
            Some(Ok((Some(_), event))) => {
                let mark = self.state.mark(&event);
                self.state.take_attribute_values().for_each(drop);
                match mark {
                    Ok(mark) => Some(Ok((mark, event))),
                    Err(err) => {
                        self.finished = true;
                        Some(Err(err))
                    }
                }
            }
            Some(Err(err)) => {
                self.failed = true;
                Some(Err(err))
            }
            None => {
                self.finished = true;
                if self.failed {
                    return None;
                }
                self.state.unclosed().map(Err)
            }
        }
    }
}

/// Drives the run-based steps: wrap, replace, before, after and copy
struct Runs<'a> {
    input: Marked<'a>,
    step: &'a Step,
    /// Mark that opened the current run
    run: Option<Mark>,
    pending: VecDeque<Result<MarkedEvent>>,
}

impl<'a> Runs<'a> {
    fn new(input: Marked<'a>, step: &'a Step) -> Self {
        Runs {
            input,
            step,
            run: None,
            pending: VecDeque::new(),
        }
    }

    fn insert(&mut self, content: &Content) {
        self.pending.extend(inserted(content));
    }

    fn open(&mut self, start: Mark) {
        self.run = Some(start);
        let step = self.step;
        match step {
            Step::Wrap(element) => {
                let mut events = element.to_events();
                events.pop();
                self.pending.extend(events.into_iter().map(|event| Ok((None, event))));
            }
            Step::Replace(content) | Step::Before(content) => self.insert(content),
            Step::Copy { buffer, accumulate } if !accumulate => buffer.reset(),
            _ => {}
        }
    }

    fn close(&mut self) {
        self.run = None;
        let step = self.step;
        match step {
            Step::Wrap(element) => self.pending.push_back(Ok((None, Event::End(element.name().clone())))),
            Step::After(content) => self.insert(content),
            _ => {}
        }
    }

    fn keep(&mut self, mark: Mark, event: Event) {
        let step = self.step;
        match step {
            Step::Replace(_) => {}
            Step::Copy { buffer, .. } => {
                buffer.push(event.clone());
                self.pending.push_back(Ok((Some(mark), event)));
            }
            _ => self.pending.push_back(Ok((Some(mark), event))),
        }
    }
}

impl Iterator for Runs<'_> {
    type Item = Result<MarkedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let (mark, event) = match self.input.next() {
                Some(Ok(marked)) => marked,
                Some(Err(err)) => return Some(Err(err)),
                None if self.run.is_some() => {
                    self.close();
                    continue;
                }
                None => return None,
            };
            if let Some(start) = self.run {
                let continues = match start {
                    Mark::Enter => mark.is_some(),
                    _ => mark == Some(start),
                };
                if !continues {
                    self.close();
                }
            }
            let Some(mark) = mark else {
                self.pending.push_back(Ok((None, event)));
                continue;
            };
            if self.run.is_none() {
                self.open(mark);
            }
            self.keep(mark, event);
            if self.run == Some(Mark::Enter) && mark == Mark::Exit {
                self.close();
            }
        }
    }
}
