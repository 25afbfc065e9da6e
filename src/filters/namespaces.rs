//! Namespace Stripping
//!
//! Removes namespace information from a stream. Elements in the kept
//! namespace, or in none, keep their tags under their local name; tags of
//! other elements are dropped while their content stays. Attributes follow
//! the same rule, and `xmlns` declarations always go.

use super::Filter;
use crate::core::attributes::Attrs;
use crate::core::namespaces::NamespaceScope;
use crate::reader::events::{Event, QName};
use crate::stream::Stream;

/// Filter that flattens namespaced markup to plain names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceStripper {
    namespace: String,
}

impl NamespaceStripper {
    /// Keep unqualified names and names in `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        NamespaceStripper {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn strip(&self, name: &QName, uri: Option<&str>) -> Option<QName> {
        match uri {
            None => Some(name.clone()),
            Some(uri) if uri == self.namespace => Some(QName::from(name.local_name())),
            Some(_) => None,
        }
    }

    /// Kept attributes under their stripped names; on a clash the first wins
    fn strip_attrs(&self, attrs: &Attrs, scope: &NamespaceScope) -> Attrs {
        let mut out = Attrs::new();
        for (name, value) in attrs.iter() {
            if let Some(name) = self.strip(name, scope.attribute_namespace(name)) {
                if !out.contains(name.as_str()) {
                    out.set(name, value);
                }
            }
        }
        out
    }
}

impl Filter for NamespaceStripper {
    fn apply<'a>(&'a self, stream: Stream<'a>) -> Stream<'a> {
        let mut scope = NamespaceScope::new();
        // Output name of every open element, `None` when its tags are dropped
        let mut open: Vec<Option<QName>> = Vec::new();
        Stream::new(stream.filter_map(move |item| {
            let event = match item {
                Ok(event) => event,
                Err(err) => return Some(Err(err)),
            };
            match event {
                Event::Start(mut tag) => {
                    scope.push_scope(&tag.attrs);
                    let name = self.strip(&tag.name, scope.element_namespace(&tag.name));
                    open.push(name.clone());
                    tag.name = name?;
                    tag.attrs = self.strip_attrs(&tag.attrs, &scope);
                    Some(Ok(Event::Start(tag)))
                }
                Event::End(name) => match open.pop() {
                    Some(kept) => {
                        scope.pop_scope();
                        kept.map(|name| Ok(Event::End(name)))
                    }
                    None => Some(Ok(Event::End(name))),
                },
                other => Some(Ok(other)),
            }
        }))
    }
}
