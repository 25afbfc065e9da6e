//! Streaming Path Matcher
//!
//! Evaluates a [`Selector`] over a stream in a single forward pass. For
//! every open element the matcher keeps a frame holding, per union branch,
//! the set of step cursors still alive at that element. A cursor equal to
//! the branch length means the node is selected. Absolute branches start
//! with one cursor at the document root; relative branches start with one at
//! every top-level element, which is their context node.
//!
//! - A selected element is emitted with its whole subtree, untested.
//! - An element with no live cursor is skipped with its subtree.
//! - A trailing attribute step emits the matching attribute values as text.
//!
//! Branches are evaluated together on each event, so output stays in document
//! order and a node selected by several branches is emitted once.
//!
//! `MatchState` holds the per-pass state and reports a [`Mark`] for each
//! event; the [`Matcher`] filter keeps marked events, the transformer
//! rewrites them.

use super::compiler::{Branch, CompiledStep, Selector};
use super::parser::Axis;
use crate::core::namespaces::NamespaceScope;
use crate::error::{MarkupError, Result};
use crate::reader::events::{Event, QName, StartTag};
use crate::stream::Stream;
use std::collections::VecDeque;

/// Cursor sets, one per branch
type Cursors = Vec<Vec<usize>>;

/// Where an event sits relative to a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    /// START of a selected element
    Enter,
    /// Any event inside a selected element
    Inside,
    /// END of a selected element
    Exit,
    /// A selected node that is not an element (text, comment, ...)
    Outside,
}

/// Kind of node a cursor is tested against
#[derive(Clone, Copy)]
enum Node<'e> {
    Root,
    Element(&'e StartTag),
    Text,
    /// Comment or processing instruction
    Other,
}

impl Node<'_> {
    fn passes(self, step: &CompiledStep, scope: &NamespaceScope) -> bool {
        match self {
            Node::Root | Node::Other => step.matches_other_node(),
            Node::Text => step.matches_text(),
            Node::Element(tag) => step.matches_element(tag, scope),
        }
    }
}

struct Frame {
    name: QName,
    cursors: Cursors,
}

/// Selection state for one pass over one stream.
///
/// Fed every event in order, it tells whether the event is selected and
/// how. Selected attribute values are collected separately.
pub(crate) struct MatchState {
    selector: Selector,
    root: Cursors,
    stack: Vec<Frame>,
    scope: NamespaceScope,
    /// Every event is selected (`/`)
    pass_all: bool,
    emit_depth: usize,
    skip_depth: usize,
    attribute_values: Vec<String>,
}

impl MatchState {
    pub fn new(selector: Selector) -> Self {
        let scope = NamespaceScope::new();
        let root: Cursors = selector
            .branches()
            .iter()
            .map(|branch| {
                if branch.relative {
                    return Vec::new();
                }
                let mut cursors = vec![0];
                close(&branch.steps, &mut cursors, Node::Root, &scope);
                cursors
            })
            .collect();
        let pass_all = is_selected(selector.branches(), &root);
        MatchState {
            selector,
            root,
            stack: Vec::new(),
            scope,
            pass_all,
            emit_depth: 0,
            skip_depth: 0,
            attribute_values: Vec::new(),
        }
    }

    /// Mark of `event`, or `None` when it is not selected
    pub fn mark(&mut self, event: &Event) -> Result<Option<Mark>> {
        if self.emit_depth > 0 {
            match event {
                Event::Start(_) => self.emit_depth += 1,
                Event::End(_) => {
                    self.emit_depth -= 1;
                    if self.emit_depth == 0 {
                        return Ok(Some(Mark::Exit));
                    }
                }
                _ => {}
            }
            return Ok(Some(Mark::Inside));
        }
        if self.skip_depth > 0 {
            match event {
                Event::Start(_) => self.skip_depth += 1,
                Event::End(_) => self.skip_depth -= 1,
                _ => {}
            }
            return Ok(None);
        }
        if self.pass_all {
            return match event {
                Event::Start(_) => {
                    self.emit_depth = 1;
                    Ok(Some(Mark::Enter))
                }
                Event::End(name) => Err(MarkupError::UnbalancedStream {
                    tag: name.to_string(),
                }),
                _ => Ok(Some(Mark::Outside)),
            };
        }

        match event {
            Event::Start(tag) => {
                self.scope.push_scope(&tag.attrs);
                let cursors = self.transition(Node::Element(tag));
                if is_selected(self.selector.branches(), &cursors) {
                    self.scope.pop_scope();
                    self.emit_depth = 1;
                    return Ok(Some(Mark::Enter));
                }
                self.collect_attribute_values(&cursors, tag);
                if self.has_live_cursor(&cursors) {
                    self.stack.push(Frame {
                        name: tag.name.clone(),
                        cursors,
                    });
                } else {
                    self.scope.pop_scope();
                    self.skip_depth = 1;
                }
                Ok(None)
            }
            Event::End(name) => match self.stack.pop() {
                Some(frame) if frame.name == *name => {
                    self.scope.pop_scope();
                    Ok(None)
                }
                _ => Err(MarkupError::UnbalancedStream {
                    tag: name.to_string(),
                }),
            },
            Event::Text(_) => Ok(self.leaf(Node::Text)),
            Event::Comment(_) | Event::Pi { .. } => Ok(self.leaf(Node::Other)),
            // Markers and doctypes are only selected inside a selected subtree
            Event::DocType(_) | Event::StartCdata | Event::EndCdata => Ok(None),
        }
    }

    /// Attribute values selected by the last START, in attribute order
    pub fn take_attribute_values(&mut self) -> std::vec::Drain<'_, String> {
        self.attribute_values.drain(..)
    }

    /// Error for a stream that ended inside an open element
    pub fn unclosed(&self) -> Option<MarkupError> {
        if let Some(frame) = self.stack.last() {
            return Some(MarkupError::MalformedStream(format!(
                "unclosed element <{}> at end of stream",
                frame.name
            )));
        }
        if self.emit_depth > 0 || self.skip_depth > 0 {
            return Some(MarkupError::MalformedStream(
                "stream ended inside an open element".to_string(),
            ));
        }
        None
    }

    /// Cursor sets of `node` as a child of the innermost open element
    fn transition(&self, node: Node<'_>) -> Cursors {
        let parent = self.stack.last().map(|frame| &frame.cursors);
        self.selector
            .branches()
            .iter()
            .enumerate()
            .map(|(i, branch)| {
                let mut next = Vec::new();
                if parent.is_none() && branch.relative {
                    if let Node::Element(_) = node {
                        next.push(0);
                        close(&branch.steps, &mut next, node, &self.scope);
                    }
                    return next;
                }
                let cursors = parent.map_or(&self.root[i], |cursors| &cursors[i]);
                for &cursor in cursors {
                    let Some(step) = branch.steps.get(cursor) else {
                        continue;
                    };
                    match step.axis {
                        Axis::Child => {
                            if node.passes(step, &self.scope) {
                                insert(&mut next, cursor + 1);
                            }
                        }
                        Axis::Descendant => {
                            insert(&mut next, cursor);
                            if node.passes(step, &self.scope) {
                                insert(&mut next, cursor + 1);
                            }
                        }
                        // The self part is handled by `close`
                        Axis::DescendantOrSelf => insert(&mut next, cursor),
                        Axis::Self_ | Axis::Attribute => {}
                    }
                }
                close(&branch.steps, &mut next, node, &self.scope);
                next
            })
            .collect()
    }

    fn leaf(&self, node: Node<'_>) -> Option<Mark> {
        let cursors = self.transition(node);
        is_selected(self.selector.branches(), &cursors).then_some(Mark::Outside)
    }

    /// Can any cursor still select a descendant?
    fn has_live_cursor(&self, cursors: &Cursors) -> bool {
        self.selector
            .branches()
            .iter()
            .zip(cursors)
            .any(|(branch, cursors)| {
                cursors.iter().any(|&cursor| {
                    branch.steps.get(cursor).map_or(false, |step| {
                        matches!(
                            step.axis,
                            Axis::Child | Axis::Descendant | Axis::DescendantOrSelf
                        )
                    })
                })
            })
    }

    fn collect_attribute_values(&mut self, cursors: &Cursors, tag: &StartTag) {
        let wanted: Vec<&CompiledStep> = self
            .selector
            .branches()
            .iter()
            .zip(cursors)
            .filter_map(|(branch, cursors)| {
                let last = branch.steps.len().checked_sub(1)?;
                let step = &branch.steps[last];
                (step.axis == Axis::Attribute && cursors.contains(&last)).then_some(step)
            })
            .collect();
        if wanted.is_empty() {
            return;
        }
        for (name, value) in tag.attrs.iter() {
            if wanted.iter().any(|step| step.matches_attribute(name, &self.scope)) {
                self.attribute_values.push(value.to_string());
            }
        }
    }
}

/// Iterator adapter returned by [`Stream::select`]
pub struct Matcher<'a> {
    input: Stream<'a>,
    state: MatchState,
    pending: VecDeque<Event>,
    /// An upstream error was forwarded
    upstream_failed: bool,
    finished: bool,
}

impl<'a> Matcher<'a> {
    pub fn new(input: Stream<'a>, selector: Selector) -> Self {
        Matcher {
            input,
            state: MatchState::new(selector),
            pending: VecDeque::new(),
            upstream_failed: false,
            finished: false,
        }
    }

    fn feed(&mut self, event: Event) -> Result<()> {
        let mark = self.state.mark(&event)?;
        self.pending
            .extend(self.state.take_attribute_values().map(Event::Text));
        if mark.is_some() {
            self.pending.push_back(event);
        }
        Ok(())
    }
}

impl Iterator for Matcher<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match self.input.next() {
                Some(Ok(event)) => {
                    if let Err(err) = self.feed(event) {
                        self.finished = true;
                        return Some(Err(err));
                    }
                }
                Some(Err(err)) => {
                    self.upstream_failed = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    if self.upstream_failed {
                        return None;
                    }
                    return self.state.unclosed().map(Err);
                }
            }
        }
    }
}

fn insert(cursors: &mut Vec<usize>, cursor: usize) {
    if !cursors.contains(&cursor) {
        cursors.push(cursor);
    }
}

/// Advance cursors over `self` and `descendant-or-self` steps that `node`
/// itself satisfies.
fn close(steps: &[CompiledStep], cursors: &mut Vec<usize>, node: Node<'_>, scope: &NamespaceScope) {
    let mut i = 0;
    while i < cursors.len() {
        let cursor = cursors[i];
        if let Some(step) = steps.get(cursor) {
            if matches!(step.axis, Axis::Self_ | Axis::DescendantOrSelf) && node.passes(step, scope) {
                insert(cursors, cursor + 1);
            }
        }
        i += 1;
    }
}

fn is_selected(branches: &[Branch], cursors: &Cursors) -> bool {
    branches
        .iter()
        .zip(cursors)
        .any(|(branch, cursors)| cursors.contains(&branch.steps.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Serializer;
    use crate::reader;

    fn select(doc: &str, path: &str) -> String {
        let selector = Selector::compile(path).unwrap();
        reader::xml(doc)
            .unwrap()
            .stream()
            .select(&selector)
            .render(&Serializer::xml())
            .unwrap()
    }

    fn select_events(doc: &str, path: &str) -> Vec<Event> {
        let selector = Selector::compile(path).unwrap();
        reader::xml(doc)
            .unwrap()
            .stream()
            .select(&selector)
            .collect::<Result<_>>()
            .unwrap()
    }

    const LOGIN: &str = "<html><body>\
        <form id=\"search\"><input name=\"q\"/></form>\
        <form id=\"login\"><p><input name=\"user\"/></p><input name=\"pass\" type=\"password\"/></form>\
        </body></html>";

    #[test]
    fn test_descendant_with_predicate() {
        assert_eq!(
            select(LOGIN, "//form[@id='login']//input"),
            "<input name=\"user\"/><input name=\"pass\" type=\"password\"/>"
        );
        assert_eq!(select(LOGIN, "//input[@type!='password']"), "");
        assert_eq!(
            select(LOGIN, "//input[not(@type='password')]"),
            "<input name=\"q\"/><input name=\"user\"/>"
        );
    }

    #[test]
    fn test_child_paths() {
        let doc = "<r><a><b>1</b></a><b>2</b></r>";
        assert_eq!(select(doc, "/r/b"), "<b>2</b>");
        assert_eq!(select(doc, "/r/a/b"), "<b>1</b>");
        assert_eq!(select(doc, "/r/*"), "<a><b>1</b></a><b>2</b>");
        assert_eq!(select(doc, "/b"), "");
    }

    #[test]
    fn test_relative_paths_start_at_top_level_element() {
        assert_eq!(select("<root><elem/></root>", "elem"), "<elem/>");
        assert_eq!(select("<root><elem/></root>", "root"), "");
        assert_eq!(select("<root><elem/></root>", "*"), "<elem/>");
        assert_eq!(select("<root foo=\"bar\"/>", "@foo"), "bar");
        assert_eq!(select("<root/>", "@foo"), "");
        assert_eq!(select("<root>Hey</root>", "text()"), "Hey");
        assert_eq!(select("<root><foo><bar/></foo></root>", "foo/bar"), "<bar/>");
        assert_eq!(select("<root><foo><bar/></foo></root>", "./bar"), "");
        assert_eq!(
            select("<root><foo><bar id=\"1\"/></foo><bar id=\"2\"/></root>", "./bar"),
            "<bar id=\"2\"/>"
        );
        assert_eq!(select("<root><item>Foo</item></root>", "./text()"), "");
        assert_eq!(select("<root><item>Foo</item><item>Bar</item></root>", "item/text()"), "FooBar");
        assert_eq!(select("<root><!-- commented --></root>", "node()"), "<!-- commented -->");
    }

    #[test]
    fn test_relative_attribute_paths() {
        let doc = "<elem class=\"x\"><span id=\"joe\">Hey Joe</span></elem>";
        assert_eq!(select(doc, "@*"), "x");
        assert_eq!(select(doc, "./@*"), "x");
        assert_eq!(select(doc, ".//@*"), "xjoe");
        assert_eq!(select(doc, "*/@*"), "joe");
        assert_eq!(select("<elem><foo id=\"1\"/><foo id=\"2\"/></elem>", "foo/@*"), "12");
    }

    #[test]
    fn test_relative_paths_on_fragments() {
        let doc = "<a><b>1</b></a>text<c><b>2</b></c>";
        assert_eq!(select(doc, "b"), "<b>1</b><b>2</b>");
        assert_eq!(select(doc, "."), "<a><b>1</b></a><c><b>2</b></c>");
        assert_eq!(select(doc, "self::c"), "<c><b>2</b></c>");
    }

    #[test]
    fn test_union_once_in_document_order() {
        let doc = "<r><a><b>1</b></a><b>2</b></r>";
        assert_eq!(select(doc, "//b | //a"), "<a><b>1</b></a><b>2</b>");
        assert_eq!(select(doc, "//a | //a"), "<a><b>1</b></a>");
    }

    #[test]
    fn test_text_nodes() {
        let doc = "<r><p>one <em>two</em></p><p>three</p></r>";
        assert_eq!(select(doc, "//p/text()"), "one three");
        assert_eq!(select(doc, "//text()"), "one twothree");
        assert_eq!(select(doc, "//em/node()"), "two");
    }

    #[test]
    fn test_attribute_values() {
        let doc = "<r><a href=\"/x\">x</a><a>y</a><a href=\"/z\" title=\"t\">z</a></r>";
        assert_eq!(
            select_events(doc, "//a/@href"),
            [Event::text("/x"), Event::text("/z")]
        );
        assert_eq!(
            select_events(doc, "//a/attribute::*"),
            [Event::text("/x"), Event::text("/z"), Event::text("t")]
        );
    }

    #[test]
    fn test_root_selects_everything() {
        let doc = "<r><!--c--><a/></r>";
        assert_eq!(select(doc, "/"), doc);
        assert_eq!(select(doc, "."), doc);
    }

    #[test]
    fn test_explicit_axes() {
        let doc = "<r><a><a id=\"inner\"/></a></r>";
        assert_eq!(select(doc, "descendant::a[@id]"), "<a id=\"inner\"/>");
        assert_eq!(select(doc, "a/self::a"), "<a><a id=\"inner\"/></a>");
        assert_eq!(select(doc, "/r/a/self::a"), "<a><a id=\"inner\"/></a>");
        assert_eq!(select(doc, "descendant-or-self::a"), "<a><a id=\"inner\"/></a>");
        assert_eq!(select(doc, "descendant-or-self::r"), doc);
        assert_eq!(select(doc, "/r/descendant-or-self::r"), doc);
    }

    #[test]
    fn test_prefixed_names() {
        let doc = "<r><svg:rect/><rect/></r>";
        assert_eq!(select(doc, "//rect"), "<svg:rect/><rect/>");
        assert_eq!(select(doc, "//svg:rect"), "<svg:rect/>");
    }

    #[test]
    fn test_namespaced_selection() {
        let doc = "<doc xmlns=\"urn:a\" xmlns:b=\"urn:b\">\
                   <item>1</item><b:item>2</b:item>\
                   <x:item xmlns:x=\"urn:b\">3</x:item>\
                   <item xmlns=\"\">4</item></doc>";
        let select_ns = |path: &str| {
            let selector =
                Selector::with_namespaces(path, [("a", "urn:a"), ("bee", "urn:b")]).unwrap();
            reader::xml(doc)
                .unwrap()
                .stream()
                .select(&selector)
                .render(&Serializer::xml())
                .unwrap()
        };
        assert_eq!(
            select_ns("//bee:item"),
            "<b:item>2</b:item><x:item xmlns:x=\"urn:b\">3</x:item>"
        );
        assert_eq!(select_ns("//a:item"), "<item>1</item>");
        assert_eq!(select_ns("a:item/text()"), "1");
        assert_eq!(select(doc, "//b:item"), "<b:item>2</b:item>");
    }

    #[test]
    fn test_marks() {
        let mut state = MatchState::new(Selector::compile("//em | //p/text()").unwrap());
        let events = reader::xml("<p>a<em>b<i/></em></p>").unwrap();
        let marks: Vec<_> = events
            .events()
            .iter()
            .map(|event| state.mark(event).unwrap())
            .collect();
        assert_eq!(
            marks,
            [
                None,
                Some(Mark::Outside),
                Some(Mark::Enter),
                Some(Mark::Inside),
                Some(Mark::Inside),
                Some(Mark::Inside),
                Some(Mark::Exit),
                None,
            ]
        );
        assert!(state.unclosed().is_none());
    }

    #[test]
    fn test_unbalanced_end() {
        let selector = Selector::compile("//p").unwrap();
        let mut stream = Stream::from_events(vec![Event::end("p")]).select(&selector);
        assert_eq!(
            stream.next(),
            Some(Err(MarkupError::UnbalancedStream { tag: "p".into() }))
        );
        assert_eq!(stream.next(), None);
    }

    #[test]
    fn test_upstream_error_passes_through() {
        let selector = Selector::compile("//p").unwrap();
        let events = vec![
            Ok(Event::start("p", [("a", "1")]).unwrap()),
            Err(MarkupError::ExhaustedStream),
        ];
        let out: Vec<_> = Stream::new(events.into_iter()).select(&selector).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Err(MarkupError::ExhaustedStream));
    }

    #[test]
    fn test_selector_reused_across_streams() {
        let selector = Selector::compile("//b").unwrap();
        let buffer = reader::xml("<a><b>x</b></a>").unwrap();
        let first = buffer.stream().select(&selector).render(&Serializer::xml()).unwrap();
        let second = buffer.stream().select(&selector).render(&Serializer::xml()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "<b>x</b>");
    }
}
