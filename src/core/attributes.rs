//! Attributes
//!
//! [`Attrs`] is the ordered attribute map carried by START events, and
//! [`parse_attributes`] extracts raw attributes from tag content.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char};
use crate::reader::events::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered, duplicate-free attribute map.
///
/// Insertion order is preserved for serialization; lookups go through a
/// name → position index so they stay O(1) regardless of attribute count.
#[derive(Clone, Default)]
pub struct Attrs {
    entries: Vec<(QName, String)>,
    index: HashMap<QName, usize>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs. On a duplicate (case-sensitive) name,
    /// returns that name as the error.
    pub fn try_from_pairs<I, K, V>(pairs: I) -> Result<Self, QName>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<QName>,
        V: Into<String>,
    {
        let mut attrs = Attrs::new();
        for (name, value) in pairs {
            let name = name.into();
            if attrs.index.contains_key(&name) {
                return Err(name);
            }
            attrs.push(name, value.into());
        }
        Ok(attrs)
    }

    fn push(&mut self, name: QName, value: String) {
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, (name, _)) in self.entries.iter().enumerate() {
            self.index.insert(name.clone(), pos);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get an attribute value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&pos| self.entries[pos].1.as_str())
    }

    /// Set an attribute. An existing entry keeps its position, a new one is
    /// appended.
    pub fn set(&mut self, name: impl Into<QName>, value: impl Into<String>) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = value.into(),
            None => self.push(name, value.into()),
        }
    }

    /// Remove an attribute, returning its value. The rest keep their order.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.index.remove(name)?;
        let (_, value) = self.entries.remove(pos);
        self.reindex();
        Some(value)
    }

    /// Chaining form of [`Attrs::set`].
    pub fn with(mut self, name: impl Into<QName>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Chaining form of [`Attrs::remove`].
    pub fn without(mut self, name: &str) -> Self {
        self.remove(name);
        self
    }

    /// Keep only the attributes for which `keep` returns a value; the
    /// returned value replaces the old one.
    pub fn retain_map<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&QName, String) -> Option<String>,
    {
        let mut out = Attrs::new();
        for (name, value) in self.entries {
            if let Some(value) = keep(&name, value) {
                out.push(name, value);
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QName, &str)> {
        self.entries.iter().map(|(n, v)| (n, v.as_str()))
    }
}

impl PartialEq for Attrs {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Attrs {}

impl Hash for Attrs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.hash(state);
    }
}

impl fmt::Debug for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, v)| (n.as_str(), v)))
            .finish()
    }
}

impl<'a> IntoIterator for &'a Attrs {
    type Item = (&'a QName, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a QName, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// An attribute as it appears in tag content, value entity-decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute<'a> {
    pub name: &'a str,
    /// `None` for minimized attributes (`<input checked>`)
    pub value: Option<Cow<'a, str>>,
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'.
/// In strict mode every attribute needs a quoted value and values may not
/// contain '<'; lenient mode accepts minimized and unquoted attributes.
pub fn parse_attributes(input: &str, strict: bool) -> Result<Vec<RawAttribute<'_>>, &'static str> {
    let bytes = input.as_bytes();
    let mut attrs = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        // Skip whitespace
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }

        if pos >= bytes.len() {
            break;
        }

        if bytes[pos] == b'/' && !strict {
            pos += 1;
            continue;
        }

        // Parse attribute name
        let name_start = pos;
        if !is_name_start_char(bytes[pos]) {
            if strict {
                return Err("attribute name must start with a letter, underscore, or colon");
            }
            pos += 1;
            continue;
        }

        while pos < bytes.len() && is_name_char(bytes[pos]) {
            pos += 1;
        }

        let name = &input[name_start..pos];

        // Skip whitespace around '='
        let mut look = pos;
        while look < bytes.len() && is_whitespace(bytes[look]) {
            look += 1;
        }

        if look >= bytes.len() || bytes[look] != b'=' {
            if strict {
                return Err("attribute value required");
            }
            // Attribute without value (like HTML boolean attributes)
            attrs.push(RawAttribute { name, value: None });
            continue;
        }

        pos = look + 1; // Skip '='

        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }

        if pos >= bytes.len() {
            if strict {
                return Err("attribute value required");
            }
            attrs.push(RawAttribute { name, value: Some(Cow::Borrowed("")) });
            break;
        }

        let quote = bytes[pos];
        if quote != b'"' && quote != b'\'' {
            if strict {
                return Err("attribute value must be quoted");
            }
            // Unquoted value (non-standard but handle it)
            let value_start = pos;
            while pos < bytes.len() && !is_whitespace(bytes[pos]) {
                pos += 1;
            }
            let value = decode_text(&input[value_start..pos]);
            attrs.push(RawAttribute { name, value: Some(value) });
            continue;
        }

        pos += 1; // Skip opening quote
        let value_start = pos;

        // Find closing quote
        while pos < bytes.len() && bytes[pos] != quote {
            if strict && bytes[pos] == b'<' {
                return Err("attribute value cannot contain '<'");
            }
            pos += 1;
        }

        if strict && pos >= bytes.len() {
            return Err("attribute value has mismatched quotes");
        }

        let value = decode_text(&input[value_start..pos]);
        attrs.push(RawAttribute { name, value: Some(value) });

        if pos < bytes.len() {
            pos += 1; // Skip closing quote
        }
    }

    Ok(attrs)
}

/// Check if byte is whitespace
#[inline]
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrs_preserve_order() {
        let attrs = Attrs::try_from_pairs([("href", "#"), ("title", "Foo")]).unwrap();
        let names: Vec<_> = attrs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["href", "title"]);
        assert_eq!(attrs.get("title"), Some("Foo"));
        assert!(!attrs.contains("tabindex"));
    }

    #[test]
    fn test_attrs_duplicate_rejected() {
        let err = Attrs::try_from_pairs([("id", "a"), ("ID", "b"), ("id", "c")]).unwrap_err();
        assert_eq!(err.as_str(), "id");
    }

    #[test]
    fn test_attrs_set_and_remove() {
        let mut attrs = Attrs::try_from_pairs([("href", "#"), ("title", "Foo")]).unwrap();
        attrs.set("title", "Bar");
        attrs.set("accesskey", "k");
        assert_eq!(attrs.remove("href").as_deref(), Some("#"));
        let pairs: Vec<_> = attrs.iter().map(|(n, v)| (n.as_str(), v)).collect();
        assert_eq!(pairs, [("title", "Bar"), ("accesskey", "k")]);
        assert_eq!(attrs.get("accesskey"), Some("k"));
        assert_eq!(attrs.remove("missing"), None);
    }

    #[test]
    fn test_attrs_equality_is_ordered() {
        let a = Attrs::new().with("a", "1").with("b", "2");
        let b = Attrs::new().with("b", "2").with("a", "1");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_simple_attributes() {
        let attrs = parse_attributes(" id=\"test\" class='foo'", true).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, "id");
        assert_eq!(attrs[0].value.as_deref(), Some("test"));
        assert_eq!(attrs[1].name, "class");
        assert_eq!(attrs[1].value.as_deref(), Some("foo"));
    }

    #[test]
    fn test_entity_in_value() {
        let attrs = parse_attributes(" title=\"&lt;hello&gt;\"", true).unwrap();
        assert_eq!(attrs[0].value.as_deref(), Some("<hello>"));
    }

    #[test]
    fn test_whitespace_handling() {
        let attrs = parse_attributes("  id  =  \"test\"  ", true).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].value.as_deref(), Some("test"));
    }

    #[test]
    fn test_lenient_minimized_and_unquoted() {
        let attrs = parse_attributes(" checked value=on", false).unwrap();
        assert_eq!(attrs[0], RawAttribute { name: "checked", value: None });
        assert_eq!(attrs[1].value.as_deref(), Some("on"));
    }

    #[test]
    fn test_strict_errors() {
        assert!(parse_attributes(" checked", true).is_err());
        assert!(parse_attributes(" a=b", true).is_err());
        assert!(parse_attributes(" a=\"<\"", true).is_err());
        assert!(parse_attributes(" a=\"open", true).is_err());
    }
}
