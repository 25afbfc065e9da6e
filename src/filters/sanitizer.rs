//! HTML Sanitizer
//!
//! Removes markup that is unsafe to render from untrusted HTML. Disallowed
//! elements are dropped with their whole content, disallowed attributes are
//! stripped, URIs with unknown schemes are removed and inline styles are
//! reduced to allow-listed declarations.
//!
//! The sanitizer never fails on hostile input: anything it cannot vouch for
//! is removed. Running it twice gives the same result as running it once.

use super::css::sanitize_style;
use super::Filter;
use crate::core::attributes::Attrs;
use crate::core::entities::decode_text;
use crate::error::Result;
use crate::reader::events::{Event, StartTag};
use crate::stream::Stream;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const SAFE_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "b", "big", "blockquote", "br", "button",
    "caption", "center", "cite", "code", "col", "colgroup", "dd", "del", "dfn", "dir", "div",
    "dl", "dt", "em", "fieldset", "font", "form", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "img", "input", "ins", "kbd", "label", "legend", "li", "map", "menu", "ol",
    "optgroup", "option", "p", "pre", "q", "s", "samp", "select", "small", "span", "strike",
    "strong", "sub", "sup", "table", "tbody", "td", "textarea", "tfoot", "th", "thead", "tr",
    "tt", "u", "ul", "var",
];

const SAFE_ATTRS: &[&str] = &[
    "abbr", "accept", "accept-charset", "accesskey", "action", "align", "alt", "axis",
    "bgcolor", "border", "cellpadding", "cellspacing", "char", "charoff", "charset",
    "checked", "cite", "class", "clear", "cols", "colspan", "color", "compact", "coords",
    "datetime", "dir", "disabled", "enctype", "for", "frame", "headers", "height", "href",
    "hreflang", "hspace", "id", "ismap", "label", "lang", "longdesc", "maxlength", "media",
    "method", "multiple", "name", "nohref", "noshade", "nowrap", "prompt", "readonly", "rel",
    "rev", "rows", "rowspan", "rules", "scope", "selected", "shape", "size", "span", "src",
    "start", "summary", "tabindex", "target", "title", "type", "usemap", "valign", "value",
    "vspace", "width",
];

const SAFE_CSS: &[&str] = &[
    "background", "background-attachment", "background-color", "background-image",
    "background-position", "background-repeat", "border", "border-bottom",
    "border-bottom-color", "border-bottom-style", "border-bottom-width", "border-collapse",
    "border-color", "border-left", "border-left-color", "border-left-style",
    "border-left-width", "border-right", "border-right-color", "border-right-style",
    "border-right-width", "border-spacing", "border-style", "border-top", "border-top-color",
    "border-top-style", "border-top-width", "border-width", "caption-side", "clear", "color",
    "cursor", "direction", "display", "empty-cells", "float", "font", "font-family",
    "font-size", "font-style", "font-variant", "font-weight", "height", "letter-spacing",
    "line-height", "list-style", "list-style-image", "list-style-position", "list-style-type",
    "margin", "margin-bottom", "margin-left", "margin-right", "margin-top", "max-height",
    "max-width", "min-height", "min-width", "outline", "outline-color", "outline-style",
    "outline-width", "overflow", "padding", "padding-bottom", "padding-left", "padding-right",
    "padding-top", "table-layout", "text-align", "text-decoration", "text-indent",
    "text-transform", "vertical-align", "visibility", "white-space", "width", "word-spacing",
];

const URI_SCHEMES: &[&str] = &["file", "ftp", "http", "https", "mailto"];

const URI_ATTRS: &[&str] = &["action", "background", "dynsrc", "href", "lowsrc", "src"];

fn set_of(names: &[&str]) -> HashSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Allow-lists used by [`Sanitizer`].
///
/// Every field has a default, so a partial JSON object is a valid
/// configuration:
///
/// ```
/// use markstream::SanitizerConfig;
///
/// let config: SanitizerConfig =
///     serde_json::from_str(r#"{"allow_style": true, "uri_schemes": ["https"]}"#).unwrap();
/// assert!(config.allow_style);
/// assert!(config.safe_tags.contains("p"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Elements kept; anything else is dropped with its content
    pub safe_tags: HashSet<String>,
    /// Attributes kept on every safe element
    pub safe_attrs: HashSet<String>,
    /// Extra attributes allowed on specific elements
    pub tag_attrs: HashMap<String, HashSet<String>>,
    /// CSS properties kept in `style` attributes
    pub safe_css: HashSet<String>,
    /// URI schemes allowed in URI attributes; relative URIs are always allowed
    pub uri_schemes: HashSet<String>,
    /// Attributes holding a URI
    pub uri_attrs: HashSet<String>,
    /// Keep `style` attributes (cleaned); dropped otherwise
    pub allow_style: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        SanitizerConfig {
            safe_tags: set_of(SAFE_TAGS),
            safe_attrs: set_of(SAFE_ATTRS),
            tag_attrs: HashMap::new(),
            safe_css: set_of(SAFE_CSS),
            uri_schemes: set_of(URI_SCHEMES),
            uri_attrs: set_of(URI_ATTRS),
            allow_style: false,
        }
    }
}

impl SanitizerConfig {
    pub fn allow_style(mut self, allow: bool) -> Self {
        self.allow_style = allow;
        self
    }

    pub fn allow_tag(mut self, tag: impl Into<String>) -> Self {
        self.safe_tags.insert(tag.into());
        self
    }

    pub fn allow_attr(mut self, attr: impl Into<String>) -> Self {
        self.safe_attrs.insert(attr.into());
        self
    }

    /// Allow `attr` on `tag` only
    pub fn allow_tag_attr(mut self, tag: impl Into<String>, attr: impl Into<String>) -> Self {
        self.tag_attrs.entry(tag.into()).or_default().insert(attr.into());
        self
    }

    pub fn allow_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.uri_schemes.insert(scheme.into().to_ascii_lowercase());
        self
    }

    pub fn deny_scheme(mut self, scheme: &str) -> Self {
        self.uri_schemes.remove(&scheme.to_ascii_lowercase());
        self
    }
}

/// Filter that strips unsafe HTML
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    config: SanitizerConfig,
}

impl Sanitizer {
    pub fn new(config: SanitizerConfig) -> Self {
        Sanitizer { config }
    }

    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    fn is_safe_tag(&self, tag: &StartTag) -> bool {
        self.config.safe_tags.contains(tag.name.as_str())
    }

    fn is_safe_attr(&self, tag: &str, attr: &str) -> bool {
        self.config.safe_attrs.contains(attr)
            || self
                .config
                .tag_attrs
                .get(tag)
                .map_or(false, |attrs| attrs.contains(attr))
    }

    /// Is `uri` relative or using an allowed scheme?
    ///
    /// Entities, whitespace and control characters are removed before the
    /// scheme is read, since browsers ignore them too.
    pub fn is_safe_uri(&self, uri: &str) -> bool {
        let decoded = decode_text(uri);
        let cleaned: String = decoded
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_control())
            .collect();
        let Some(end) = cleaned.find([':', '/', '?', '#']) else {
            return true;
        };
        if !cleaned[end..].starts_with(':') {
            return true;
        }
        let scheme = &cleaned[..end];
        let well_formed = scheme.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        well_formed && self.config.uri_schemes.contains(&scheme.to_ascii_lowercase())
    }

    fn clean_attrs(&self, tag: &StartTag) -> Attrs {
        let tag_name = tag.name.as_str();
        tag.attrs.clone().retain_map(|name, value| {
            let name = name.as_str();
            let kept = if name == "style" {
                if !self.config.allow_style {
                    None
                } else {
                    sanitize_style(
                        &value,
                        |property| self.config.safe_css.contains(property),
                        |uri| self.is_safe_uri(uri),
                    )
                }
            } else if !self.is_safe_attr(tag_name, name) {
                None
            } else if self.config.uri_attrs.contains(name) && !self.is_safe_uri(&value) {
                None
            } else {
                Some(value)
            };
            if kept.is_none() {
                debug!("sanitizer dropped attribute {} on <{}>", name, tag_name);
            }
            kept
        })
    }
}

impl From<SanitizerConfig> for Sanitizer {
    fn from(config: SanitizerConfig) -> Self {
        Sanitizer::new(config)
    }
}

impl Filter for Sanitizer {
    fn apply<'a>(&'a self, stream: Stream<'a>) -> Stream<'a> {
        Stream::new(Sanitizing {
            sanitizer: self,
            input: stream,
            skip_depth: 0,
        })
    }
}

struct Sanitizing<'a> {
    sanitizer: &'a Sanitizer,
    input: Stream<'a>,
    /// Depth inside a dropped element
    skip_depth: usize,
}

impl Sanitizing<'_> {
    fn process(&mut self, event: Event) -> Option<Event> {
        if self.skip_depth > 0 {
            match event {
                Event::Start(_) => self.skip_depth += 1,
                Event::End(_) => self.skip_depth -= 1,
                _ => {}
            }
            return None;
        }
        match event {
            Event::Start(tag) => {
                if !self.sanitizer.is_safe_tag(&tag) {
                    debug!("sanitizer dropped <{}> with its content", tag.name);
                    self.skip_depth = 1;
                    return None;
                }
                let attrs = self.sanitizer.clean_attrs(&tag);
                Some(Event::start_with(tag.name, attrs))
            }
            Event::Comment(_) | Event::Pi { .. } => None,
            other => Some(other),
        }
    }
}

impl Iterator for Sanitizing<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.input.next()? {
                Ok(event) => {
                    if let Some(event) = self.process(event) {
                        return Some(Ok(event));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
