//! Selector Compiler
//!
//! Validates a parsed expression and turns it into an immutable [`Selector`]
//! that the streaming matcher can evaluate. Everything the matcher cannot
//! honour is rejected here, so compilation is the only place a selector can
//! fail.

use super::parser::{Axis, CmpOp, Expr, NodeTest, Parser, Predicate};
use crate::core::attributes::Attrs;
use crate::core::namespaces::NamespaceScope;
use crate::error::{MarkupError, Result};
use crate::reader::events::{QName, StartTag};
use log::trace;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Compiled node test
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompiledNodeTest {
    Any,
    /// Unprefixed name, compared with the local name
    Local(String),
    /// `prefix:local` with an unmapped prefix, compared with the full name
    Qualified(String),
    /// `prefix:local` with a mapped prefix, compared by namespace URI and
    /// local name
    Namespaced { uri: String, local: String },
    Node,
    Text,
}

impl CompiledNodeTest {
    fn from_test(test: &NodeTest, namespaces: &HashMap<String, String>) -> Self {
        match test {
            NodeTest::Any => CompiledNodeTest::Any,
            NodeTest::Name(name) => match name.split_once(':') {
                Some((prefix, local)) => match namespaces.get(prefix) {
                    Some(uri) => CompiledNodeTest::Namespaced {
                        uri: uri.clone(),
                        local: local.to_string(),
                    },
                    None => CompiledNodeTest::Qualified(name.clone()),
                },
                None => CompiledNodeTest::Local(name.clone()),
            },
            NodeTest::Node => CompiledNodeTest::Node,
            NodeTest::Text => CompiledNodeTest::Text,
        }
    }

    /// `uri` is the namespace the name resolves to where it appears
    fn matches_name(&self, name: &QName, uri: Option<&str>) -> bool {
        match self {
            CompiledNodeTest::Any | CompiledNodeTest::Node => true,
            CompiledNodeTest::Local(local) => name.local_name() == local,
            CompiledNodeTest::Qualified(full) => name.as_str() == full,
            CompiledNodeTest::Namespaced { uri: wanted, local } => {
                uri == Some(wanted.as_str()) && name.local_name() == local
            }
            CompiledNodeTest::Text => false,
        }
    }
}

/// Compiled location step
#[derive(Debug, Clone)]
pub(crate) struct CompiledStep {
    pub axis: Axis,
    pub test: CompiledNodeTest,
    pub predicates: Vec<Predicate>,
}

impl CompiledStep {
    fn predicates_hold(&self, attrs: &Attrs) -> bool {
        self.predicates.iter().all(|p| eval_predicate(p, attrs))
    }

    /// Does an element pass this step's node test and predicates? `scope`
    /// must include the element's own declarations.
    pub fn matches_element(&self, tag: &StartTag, scope: &NamespaceScope) -> bool {
        self.test.matches_name(&tag.name, scope.element_namespace(&tag.name))
            && self.predicates_hold(&tag.attrs)
    }

    /// Does a text node pass?
    pub fn matches_text(&self) -> bool {
        matches!(self.test, CompiledNodeTest::Node | CompiledNodeTest::Text)
            && self.predicates_hold(&Attrs::new())
    }

    /// Does a comment, processing instruction or the document root pass?
    pub fn matches_other_node(&self) -> bool {
        self.test == CompiledNodeTest::Node && self.predicates_hold(&Attrs::new())
    }

    /// Does an attribute pass (attribute axis only)?
    pub fn matches_attribute(&self, name: &QName, scope: &NamespaceScope) -> bool {
        self.test.matches_name(name, scope.attribute_namespace(name))
    }
}

/// Evaluate a predicate against the attributes of the current node
pub(crate) fn eval_predicate(predicate: &Predicate, attrs: &Attrs) -> bool {
    match predicate {
        Predicate::Attr { name, compare } => {
            let value = attrs.get(name);
            match compare {
                None => value.is_some(),
                Some((CmpOp::Eq, expected)) => value == Some(expected.as_str()),
                // Like XPath, `@a != 'v'` needs the attribute to exist
                Some((CmpOp::NotEq, expected)) => value.map_or(false, |v| v != expected),
            }
        }
        Predicate::Not(inner) => !eval_predicate(inner, attrs),
        Predicate::And(left, right) => eval_predicate(left, attrs) && eval_predicate(right, attrs),
        Predicate::Or(left, right) => eval_predicate(left, attrs) || eval_predicate(right, attrs),
    }
}

/// One branch of a union
#[derive(Debug, Clone)]
pub(crate) struct Branch {
    pub steps: Vec<CompiledStep>,
    /// Steps start at each top-level element instead of the document root
    pub relative: bool,
}

#[derive(Debug)]
struct Program {
    source: String,
    branches: Vec<Branch>,
}

/// A compiled path expression.
///
/// Immutable and cheap to clone; one selector can be used on any number of
/// streams, from any number of threads.
#[derive(Debug, Clone)]
pub struct Selector {
    program: Arc<Program>,
}

impl Selector {
    /// Parse and validate `expr`.
    ///
    /// Absolute paths start at the document root. Relative paths use each
    /// top-level element as context node: on `<root><a/></root>`, `a` and
    /// `/root/a` select the same element, `.` selects `root` and `@id` reads
    /// its attribute.
    pub fn compile(expr: &str) -> Result<Selector> {
        Self::with_namespaces(expr, Vec::<(String, String)>::new())
    }

    /// Like [`Selector::compile`], resolving name test prefixes through
    /// `namespaces` (prefix → URI). A mapped `svg:rect` then matches any
    /// element whose in-scope namespace is the mapped URI, whatever prefix
    /// the document uses. Unmapped prefixes compare literally.
    ///
    /// ```
    /// use markstream::{reader, Selector, Serializer};
    ///
    /// let doc = reader::xml("<doc xmlns:s=\"http://www.w3.org/2000/svg\"><s:rect/><rect/></doc>").unwrap();
    /// let rects =
    ///     Selector::with_namespaces("//svg:rect", [("svg", "http://www.w3.org/2000/svg")]).unwrap();
    /// let out = doc.stream().select(&rects).render(&Serializer::xml()).unwrap();
    /// assert_eq!(out, "<s:rect/>");
    /// ```
    pub fn with_namespaces<I, K, V>(expr: &str, namespaces: I) -> Result<Selector>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let namespaces: HashMap<String, String> = namespaces
            .into_iter()
            .map(|(prefix, uri)| (prefix.into(), uri.into()))
            .collect();
        let parsed = Parser::new(expr)?.parse()?;
        let branches = compile_expr(&parsed, &namespaces)?;
        trace!("compiled selector {:?} into {} branch(es)", expr, branches.len());
        Ok(Selector {
            program: Arc::new(Program {
                source: expr.to_string(),
                branches,
            }),
        })
    }

    /// The source expression
    pub fn as_str(&self) -> &str {
        &self.program.source
    }

    pub(crate) fn branches(&self) -> &[Branch] {
        &self.program.branches
    }
}

impl FromStr for Selector {
    type Err = MarkupError;

    fn from_str(expr: &str) -> Result<Self> {
        Selector::compile(expr)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program.source)
    }
}

fn compile_expr(expr: &Expr, namespaces: &HashMap<String, String>) -> Result<Vec<Branch>> {
    let mut branches = Vec::with_capacity(expr.paths.len());
    for path in &expr.paths {
        let last = path.steps.len().saturating_sub(1);
        let mut steps = Vec::with_capacity(path.steps.len());
        for (index, step) in path.steps.iter().enumerate() {
            if step.axis == Axis::Attribute {
                if index != last {
                    return Err(MarkupError::selector(
                        "attribute steps must be the last step of a path",
                        step.offset,
                    ));
                }
                if step.node_test == NodeTest::Text {
                    return Err(MarkupError::selector(
                        "text() cannot be used on the attribute axis",
                        step.offset,
                    ));
                }
                if !step.predicates.is_empty() {
                    return Err(MarkupError::selector(
                        "predicates on attribute steps are not supported",
                        step.offset,
                    ));
                }
            }
            if step.node_test == NodeTest::Text && index != last {
                return Err(MarkupError::selector(
                    "text() must be the last step of a path",
                    step.offset,
                ));
            }
            steps.push(CompiledStep {
                axis: step.axis,
                test: CompiledNodeTest::from_test(&step.node_test, namespaces),
                predicates: step.predicates.clone(),
            });
        }
        branches.push(Branch {
            steps,
            relative: !path.absolute,
        });
    }
    Ok(branches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, attrs: &[(&str, &str)]) -> StartTag {
        StartTag {
            name: QName::from(name),
            attrs: Attrs::try_from_pairs(attrs.iter().copied()).unwrap(),
        }
    }

    #[test]
    fn test_compile_ok() {
        let selector = Selector::compile("//form[@id='login']//input | /a/@href").unwrap();
        assert_eq!(selector.branches().len(), 2);
        assert!(selector.branches().iter().all(|b| !b.relative));
        assert!(Selector::compile("a/b").unwrap().branches()[0].relative);
        assert_eq!(selector.to_string(), "//form[@id='login']//input | /a/@href");
        assert!("p/text()".parse::<Selector>().is_ok());
    }

    #[test]
    fn test_compile_rejects() {
        let offset = |expr: &str| match Selector::compile(expr) {
            Err(MarkupError::SelectorSyntax { offset, .. }) => offset,
            other => panic!("expected syntax error for {expr:?}, got {other:?}"),
        };
        assert_eq!(offset("a/@href/b"), 2);
        assert_eq!(offset("a/@href[@x]"), 2);
        assert_eq!(offset("a/attribute::text()"), 2);
        assert_eq!(offset("text()/a"), 0);
    }

    #[test]
    fn test_step_matching() {
        let scope = NamespaceScope::new();
        let selector = Selector::compile("svg:rect[@x and not(@y='1')]").unwrap();
        let step = &selector.branches()[0].steps[0];
        assert!(step.matches_element(&tag("svg:rect", &[("x", "0")]), &scope));
        assert!(step.matches_element(&tag("svg:rect", &[("x", "0"), ("y", "2")]), &scope));
        assert!(!step.matches_element(&tag("svg:rect", &[("x", "0"), ("y", "1")]), &scope));
        assert!(!step.matches_element(&tag("rect", &[("x", "0")]), &scope));

        let selector = Selector::compile("rect").unwrap();
        let step = &selector.branches()[0].steps[0];
        assert!(step.matches_element(&tag("svg:rect", &[]), &scope));
        assert!(!step.matches_text());
    }

    #[test]
    fn test_namespaced_step_matching() {
        let selector = Selector::with_namespaces("s:rect", [("s", "urn:svg")]).unwrap();
        let step = &selector.branches()[0].steps[0];
        assert_eq!(
            step.test,
            CompiledNodeTest::Namespaced {
                uri: "urn:svg".into(),
                local: "rect".into()
            }
        );

        let mut scope = NamespaceScope::new();
        let declared = tag("g:rect", &[("xmlns:g", "urn:svg")]);
        scope.push_scope(&declared.attrs);
        assert!(step.matches_element(&declared, &scope));
        assert!(!step.matches_element(&tag("s:rect", &[]), &scope));

        scope.push_scope(&Attrs::new().with("xmlns", "urn:svg"));
        assert!(step.matches_element(&tag("rect", &[]), &scope));

        let unmapped = Selector::with_namespaces("x:rect", [("s", "urn:svg")]).unwrap();
        assert_eq!(
            unmapped.branches()[0].steps[0].test,
            CompiledNodeTest::Qualified("x:rect".into())
        );
    }

    #[test]
    fn test_not_equal_needs_attribute() {
        let pred = Predicate::Attr {
            name: "a".into(),
            compare: Some((CmpOp::NotEq, "v".into())),
        };
        assert!(!eval_predicate(&pred, &Attrs::new()));
        assert!(eval_predicate(&pred, &Attrs::new().with("a", "w")));
        assert!(!eval_predicate(&pred, &Attrs::new().with("a", "v")));
    }

    #[test]
    fn test_selector_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Selector>();
    }
}
