//! Property tests for the stream pipeline
//!
//! - serialize(parse(serialize(tree))) == serialize(tree)
//! - sanitizing twice equals sanitizing once
//! - a selector only emits subtrees rooted at matching elements
//! - a scoped form filler never touches anything outside its form

use markstream::builder::{tag, Element, Node};
use markstream::{
    reader, Event, FormFiller, Result, Sanitizer, SanitizerConfig, Selector, Serializer,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Tree {
    Text(String),
    Elem(String, Vec<(String, String)>, Vec<Tree>),
}

impl Tree {
    fn to_node(&self) -> Node {
        match self {
            Tree::Text(text) => Node::Text(text.clone()),
            Tree::Elem(name, attrs, children) => {
                let element = attrs
                    .iter()
                    .fold(tag(name.as_str()), |e, (k, v)| e.attr(k.as_str(), v.as_str()));
                Node::Element(element.children(children.iter().map(Tree::to_node)))
            }
        }
    }

    /// Elements named `name` that have no ancestor named `name`
    fn outermost(&self, name: &str) -> usize {
        match self {
            Tree::Text(_) => 0,
            Tree::Elem(n, _, _) if n == name => 1,
            Tree::Elem(_, _, children) => children.iter().map(|c| c.outermost(name)).sum(),
        }
    }
}

fn arb_tree(names: &'static [&'static str], attr_names: &'static [&'static str], values: &'static [&'static str]) -> impl Strategy<Value = Tree> {
    let leaf = "[a-z <>&\"']{0,8}".prop_map(Tree::Text);
    leaf.prop_recursive(4, 48, 5, move |inner| {
        (
            prop::sample::select(names),
            prop::collection::btree_map(prop::sample::select(attr_names), prop::sample::select(values), 0..3),
            prop::collection::vec(inner, 0..5),
        )
            .prop_map(|(name, attrs, children)| {
                Tree::Elem(
                    name.to_string(),
                    attrs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                    children,
                )
            })
    })
}

fn document(children: Vec<Tree>) -> Element {
    tag("root").children(children.iter().map(Tree::to_node))
}

const NAMES: &[&str] = &["div", "p", "span", "a", "em", "svg:g"];
const ATTRS: &[&str] = &["id", "class", "href", "title"];
const VALUES: &[&str] = &["x", "a b", "1 < 2", "\"q\"", "it's", "&amp;"];

const HTML_NAMES: &[&str] = &["p", "div", "a", "b", "script", "iframe", "style", "img"];
const HTML_ATTRS: &[&str] = &["href", "src", "onclick", "class", "style"];
const HTML_VALUES: &[&str] = &[
    "javascript:alert(1)",
    "http://example.org/",
    "/relative",
    "color: red",
    "color: red; position: fixed",
    "background: url(javascript:x)",
    "x",
];

const FORM_IDS: &[&str] = &["a", "b", "c"];
const INPUT_TYPES: &[&str] = &["text", "checkbox", "password", "hidden"];
const FIELD_NAMES: &[&str] = &["x", "y", "z"];

fn render(element: &Element) -> String {
    element.generate().render(&Serializer::xml()).unwrap()
}

fn sanitize(sanitizer: &Sanitizer, events: markstream::Stream<'_>) -> Vec<Event> {
    (events | sanitizer).collect::<Result<_>>().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Parsing serialized output and serializing again is stable.
    #[test]
    fn xml_round_trip(children in prop::collection::vec(arb_tree(NAMES, ATTRS, VALUES), 0..4)) {
        let doc = document(children);
        let first = render(&doc);
        let parsed = reader::xml(&first).unwrap();
        let second = parsed.stream().render(&Serializer::xml()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Sanitizing is idempotent and leaves no scripts or javascript URIs.
    #[test]
    fn sanitize_idempotent(children in prop::collection::vec(arb_tree(HTML_NAMES, HTML_ATTRS, HTML_VALUES), 0..4)) {
        let sanitizer = Sanitizer::new(SanitizerConfig::default().allow_style(true));
        let doc = document(children);
        let sanitizer_root = Sanitizer::new(SanitizerConfig::default().allow_style(true).allow_tag("root"));

        let once = sanitize(&sanitizer_root, doc.generate());
        let twice = sanitize(&sanitizer_root, markstream::Stream::from_events(once.clone()));
        prop_assert_eq!(&once, &twice);

        let html = markstream::Stream::from_events(once).render(&Serializer::html()).unwrap();
        prop_assert!(!html.contains("<script"));
        prop_assert!(!html.contains("javascript:"));
        prop_assert!(!html.contains("onclick"));
        prop_assert!(!html.contains("position"));

        // Without "root" allowed, the whole document goes
        prop_assert!(sanitize(&sanitizer, doc.generate()).is_empty());
    }

    /// Every subtree emitted by `//p` starts with a `p` element, and all
    /// outermost `p` elements are emitted.
    #[test]
    fn selector_emits_matching_subtrees(children in prop::collection::vec(arb_tree(NAMES, ATTRS, VALUES), 0..4)) {
        let expected: usize = children.iter().map(|c| c.outermost("p")).sum();
        let doc = document(children);
        let selector = Selector::compile("//p").unwrap();
        let events: Vec<Event> = doc.generate().select(&selector).collect::<Result<_>>().unwrap();

        let mut depth = 0usize;
        let mut roots = 0usize;
        for event in &events {
            match event {
                Event::Start(start) => {
                    if depth == 0 {
                        prop_assert_eq!(start.name.as_str(), "p");
                        roots += 1;
                    }
                    depth += 1;
                }
                Event::End(_) => depth -= 1,
                _ => prop_assert!(depth > 0, "text outside a selected subtree"),
            }
        }
        prop_assert_eq!(depth, 0);
        prop_assert_eq!(roots, expected);
    }

    /// Attribute predicates only let through elements carrying the attribute.
    #[test]
    fn selector_predicate_holds(children in prop::collection::vec(arb_tree(NAMES, ATTRS, VALUES), 0..4)) {
        let doc = document(children);
        let selector = Selector::compile("//*[@id='x' and not(@class)]").unwrap();
        let mut depth = 0usize;
        for event in doc.generate().select(&selector) {
            match event.unwrap() {
                Event::Start(start) => {
                    if depth == 0 {
                        prop_assert_eq!(start.attrs.get("id"), Some("x"));
                        prop_assert!(!start.attrs.contains("class"));
                    }
                    depth += 1;
                }
                Event::End(_) => depth -= 1,
                _ => {}
            }
        }
    }

    /// A filler scoped to form "a" leaves every event outside that form alone.
    #[test]
    fn form_scope_isolation(
        forms in prop::collection::vec(
            (
                prop::sample::select(FORM_IDS),
                prop::collection::vec(
                    (
                        prop::sample::select(INPUT_TYPES),
                        prop::sample::select(FIELD_NAMES),
                    ),
                    0..4,
                ),
            ),
            0..4,
        ),
        loose in prop::collection::vec(prop::sample::select(FIELD_NAMES), 0..3),
    ) {
        let mut root = tag("div");
        for (id, inputs) in &forms {
            let form = inputs.iter().fold(tag("form").attr("id", *id), |form, (kind, name)| {
                form.child(tag("input").attr("type", *kind).attr("name", *name))
            });
            root = root.child(form);
        }
        for name in &loose {
            root = root.child(tag("form").child(tag("p").child(tag("input").attr("name", *name))));
        }

        let filler = FormFiller::new()
            .value("x", "1")
            .value("y", true)
            .value("z", vec!["1", "2"])
            .scope_id("a");
        let input: Vec<Event> = root.generate().collect::<Result<_>>().unwrap();
        let output: Vec<Event> = (root.generate() | &filler).collect::<Result<_>>().unwrap();
        prop_assert_eq!(input.len(), output.len());

        let mut scope_depth: Option<usize> = None;
        let mut depth = 0usize;
        for (before, after) in input.iter().zip(&output) {
            if let Event::Start(start) = before {
                depth += 1;
                if scope_depth.is_none() && start.name.as_str() == "form" && start.attrs.get("id") == Some("a") {
                    scope_depth = Some(depth);
                }
            }
            let password = before
                .as_start()
                .map_or(false, |s| s.attrs.get("type") == Some("password"));
            if scope_depth.is_none() || password {
                prop_assert_eq!(before, after);
            }
            if let Event::End(_) = before {
                if scope_depth == Some(depth) {
                    scope_depth = None;
                }
                depth -= 1;
            }
        }
    }
}
