//! Namespace Resolution
//!
//! Stack-based resolver for `xmlns` declarations carried as attributes on
//! START events. Each open element is one scope; leaving it drops the
//! bindings it declared.

use super::attributes::Attrs;
use crate::reader::events::QName;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI); the default namespace has prefix ""
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: String,
    uri: String,
    depth: usize,
}

/// Stack-based namespace resolver
#[derive(Debug, Clone)]
pub struct NamespaceScope {
    bindings: Vec<NsBinding>,
    depth: usize,
}

impl Default for NamespaceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScope {
    /// Create a resolver with the `xml` and `xmlns` prefixes pre-bound
    pub fn new() -> Self {
        let prebound = |prefix: &str, uri: &str| NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: 0,
        };
        NamespaceScope {
            bindings: vec![prebound("xml", ns::XML), prebound("xmlns", ns::XMLNS)],
            depth: 0,
        }
    }

    /// Enter an element scope, declaring its `xmlns` and `xmlns:*` attributes
    pub fn push_scope(&mut self, attrs: &Attrs) {
        self.depth += 1;
        for (name, value) in attrs.iter() {
            match (name.prefix(), name.local_name()) {
                (None, "xmlns") => self.declare("", value),
                (Some("xmlns"), prefix) => self.declare(prefix, value),
                _ => {}
            }
        }
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn declare(&mut self, prefix: &str, uri: &str) {
        // `xml` and `xmlns` cannot be rebound
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        self.bindings.push(NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
    }

    /// Resolve a prefix (`""` for the default namespace). `xmlns=""`
    /// undeclares the default namespace.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|binding| binding.prefix == prefix)
            .map(|binding| binding.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Namespace of an element name; unprefixed names use the default
    pub fn element_namespace(&self, name: &QName) -> Option<&str> {
        self.resolve(name.prefix().unwrap_or(""))
    }

    /// Namespace of an attribute name; unprefixed attributes have none
    pub fn attribute_namespace(&self, name: &QName) -> Option<&str> {
        match name.prefix() {
            Some(prefix) => self.resolve(prefix),
            None if name.as_str() == "xmlns" => Some(ns::XMLNS),
            None => None,
        }
    }

    /// Get current depth
    pub fn depth(&self) -> usize {
        self.depth
    }
}
