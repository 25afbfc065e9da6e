//! Programmatic Markup Builder
//!
//! Builds small element trees in code and turns them into event streams:
//!
//! ```
//! use markstream::builder::tag;
//!
//! let link = tag("a").attr("href", "/about").opt_attr("title", None::<&str>).text("About us");
//! assert_eq!(link.to_string(), "<a href=\"/about\">About us</a>");
//! ```
//!
//! Text is stored raw and escaped by the serializer.

use crate::core::attributes::Attrs;
use crate::error::Result;
use crate::output::Serializer;
use crate::reader::events::{Event, QName};
use crate::stream::{EventSource, Stream};
use std::fmt;

/// A node in a builder tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Fragment(Fragment),
}

impl Node {
    fn generate_into(&self, events: &mut Vec<Event>) {
        match self {
            Node::Element(element) => element.generate_into(events),
            Node::Text(text) => events.push(Event::text(text.as_str())),
            Node::Fragment(fragment) => fragment.generate_into(events),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Fragment> for Node {
    fn from(fragment: Fragment) -> Self {
        Node::Fragment(fragment)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

/// A sequence of nodes without an enclosing element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    children: Vec<Node>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Events for this fragment; can be called any number of times
    pub fn generate(&self) -> Stream<'static> {
        Stream::from_events(self.to_events())
    }

    pub fn to_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        self.generate_into(&mut events);
        events
    }

    fn generate_into(&self, events: &mut Vec<Event>) {
        for child in &self.children {
            child.generate_into(events);
        }
    }
}

/// An element with attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QName,
    attrs: Attrs,
    content: Fragment,
}

/// Shorthand for [`Element::new`]
pub fn tag(name: impl Into<QName>) -> Element {
    Element::new(name)
}

impl Element {
    pub fn new(name: impl Into<QName>) -> Self {
        Element {
            name: name.into(),
            attrs: Attrs::new(),
            content: Fragment::new(),
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Set an attribute, replacing a previous value of the same name
    pub fn attr(mut self, name: impl Into<QName>, value: impl Into<String>) -> Self {
        self.attrs.set(name, value);
        self
    }

    /// Set an attribute if `value` is `Some`, otherwise remove it
    pub fn opt_attr<V: Into<String>>(self, name: impl Into<QName>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => {
                let name = name.into();
                let mut element = self;
                element.attrs.remove(name.as_str());
                element
            }
        }
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.content = self.content.child(node);
        self
    }

    pub fn children<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.content = self.content.children(nodes);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    /// Events for this element; can be called any number of times
    pub fn generate(&self) -> Stream<'static> {
        Stream::from_events(self.to_events())
    }

    pub fn to_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        self.generate_into(&mut events);
        events
    }

    fn generate_into(&self, events: &mut Vec<Event>) {
        events.push(Event::start_with(self.name.clone(), self.attrs.clone()));
        self.content.generate_into(events);
        events.push(Event::End(self.name.clone()));
    }
}

impl<'a> EventSource<'a> for Element {
    fn iterate(&mut self) -> Result<Stream<'a>> {
        Ok(self.generate())
    }
}

impl<'a> EventSource<'a> for Fragment {
    fn iterate(&mut self) -> Result<Stream<'a>> {
        Ok(self.generate())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.generate().render(&Serializer::xml()).map_err(|_| fmt::Error)?;
        f.write_str(&out)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.generate().render(&Serializer::xml()).map_err(|_| fmt::Error)?;
        f.write_str(&out)
    }
}
