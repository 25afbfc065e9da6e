//! Form Filler
//!
//! Populates HTML form controls from a map of field values:
//!
//! ```
//! use markstream::{reader, FormFiller, Serializer};
//!
//! let filler = FormFiller::new().value("q", "rust");
//! let doc = reader::html("<form><input name=\"q\"></form>").unwrap();
//! let out = doc.stream() | &filler | &Serializer::html();
//! assert_eq!(out.unwrap(), "<form><input name=\"q\" value=\"rust\"></form>");
//! ```
//!
//! Password and file inputs are never populated, whatever the data says.

use super::Filter;
use crate::core::attributes::Attrs;
use crate::error::Result;
use crate::reader::events::{Event, QName, StartTag};
use crate::stream::Stream;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Input types that take a `value` attribute from the data
const TEXT_INPUT_TYPES: &[&str] = &[
    "text",
    "hidden",
    "email",
    "search",
    "tel",
    "url",
    "number",
    "date",
    "datetime-local",
    "month",
    "week",
    "time",
    "color",
    "range",
];

/// Value of one form field.
///
/// Deserializes untagged, so `"x"`, `["a", "b"]` and `true` in JSON map to
/// `Text`, `Multi` and `Flag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Multi(Vec<String>),
    Flag(bool),
}

impl FormValue {
    /// Value for a single-valued text control
    pub fn first(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::Multi(values) => values.first().map(String::as_str),
            FormValue::Flag(_) => None,
        }
    }

    /// Does the data select a control declaring `value="declared"`?
    pub fn matches(&self, declared: &str) -> bool {
        match self {
            FormValue::Text(text) => text == declared,
            FormValue::Multi(values) => values.iter().any(|v| v == declared),
            FormValue::Flag(flag) => *flag,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FormValue::Text(text) => !text.is_empty(),
            FormValue::Multi(values) => values.iter().any(|v| !v.is_empty()),
            FormValue::Flag(flag) => *flag,
        }
    }
}

impl From<&str> for FormValue {
    fn from(text: &str) -> Self {
        FormValue::Text(text.to_string())
    }
}

impl From<String> for FormValue {
    fn from(text: String) -> Self {
        FormValue::Text(text)
    }
}

impl From<bool> for FormValue {
    fn from(flag: bool) -> Self {
        FormValue::Flag(flag)
    }
}

impl From<Vec<String>> for FormValue {
    fn from(values: Vec<String>) -> Self {
        FormValue::Multi(values)
    }
}

impl From<Vec<&str>> for FormValue {
    fn from(values: Vec<&str>) -> Self {
        FormValue::Multi(values.into_iter().map(String::from).collect())
    }
}

/// Filter that fills `<input>`, `<select>` and `<textarea>` controls.
///
/// With a scope set (`scope_id` and/or `scope_name`), only forms whose `id`
/// or `name` matches are touched. Controls outside any form are never
/// changed. A field missing from the data leaves its control as it is.
#[derive(Debug, Clone, Default)]
pub struct FormFiller {
    data: HashMap<String, FormValue>,
    scope_id: Option<String>,
    scope_name: Option<String>,
}

impl FormFiller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: HashMap<String, FormValue>) -> Self {
        FormFiller {
            data,
            ..Self::default()
        }
    }

    /// Add or replace one field value
    pub fn value(mut self, name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Only fill the form with this `id`
    pub fn scope_id(mut self, id: impl Into<String>) -> Self {
        self.scope_id = Some(id.into());
        self
    }

    /// Only fill the form with this `name`
    pub fn scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = Some(name.into());
        self
    }

    pub fn data(&self) -> &HashMap<String, FormValue> {
        &self.data
    }

    fn in_scope(&self, attrs: &Attrs) -> bool {
        if self.scope_id.is_none() && self.scope_name.is_none() {
            return true;
        }
        let id_matches = self
            .scope_id
            .as_deref()
            .map_or(false, |id| attrs.get("id") == Some(id));
        let name_matches = self
            .scope_name
            .as_deref()
            .map_or(false, |name| attrs.get("name") == Some(name));
        id_matches || name_matches
    }

    fn lookup(&self, attrs: &Attrs) -> Option<&FormValue> {
        attrs.get("name").and_then(|name| self.data.get(name))
    }

    fn fill_input(&self, mut tag: StartTag) -> StartTag {
        let Some(value) = self.lookup(&tag.attrs) else {
            return tag;
        };
        let kind = tag.attrs.get("type").map(|t| t.trim().to_ascii_lowercase());
        match kind.as_deref() {
            Some("password") | Some("file") => {}
            Some("checkbox") | Some("radio") => {
                let checked = match tag.attrs.get("value") {
                    Some(declared) => value.matches(declared),
                    None => value.is_truthy(),
                };
                toggle(&mut tag.attrs, "checked", checked);
            }
            Some(kind) if !TEXT_INPUT_TYPES.contains(&kind) => {}
            _ => {
                if let Some(text) = value.first() {
                    tag.attrs.set("value", text);
                }
            }
        }
        tag
    }
}

fn toggle(attrs: &mut Attrs, name: &str, on: bool) {
    if on {
        attrs.set(name, name);
    } else {
        attrs.remove(name);
    }
}

impl Filter for FormFiller {
    fn apply<'a>(&'a self, stream: Stream<'a>) -> Stream<'a> {
        Stream::new(Filling {
            filler: self,
            input: stream,
            pending: VecDeque::new(),
            depth: 0,
            form_depth: None,
            select: None,
            option: None,
            textarea: None,
        })
    }
}

struct SelectState<'a> {
    depth: usize,
    value: Option<&'a FormValue>,
}

/// An `<option>` held back until its end tag, since its text may decide
/// whether it is selected
struct PendingOption {
    depth: usize,
    start: StartTag,
    value: Option<String>,
    text: String,
    content: Vec<Event>,
}

struct TextareaState {
    depth: usize,
    replacement: String,
}

struct Filling<'a> {
    filler: &'a FormFiller,
    input: Stream<'a>,
    pending: VecDeque<Event>,
    depth: usize,
    form_depth: Option<usize>,
    select: Option<SelectState<'a>>,
    option: Option<PendingOption>,
    textarea: Option<TextareaState>,
}

impl<'a> Filling<'a> {
    fn feed(&mut self, event: Event) {
        match event {
            Event::Start(tag) => {
                self.depth += 1;
                self.start(tag);
            }
            Event::End(name) => {
                self.end(name);
                self.depth = self.depth.saturating_sub(1);
            }
            other => self.other(other),
        }
    }

    fn start(&mut self, tag: StartTag) {
        if let Some(option) = self.option.as_mut() {
            option.content.push(Event::Start(tag));
            return;
        }
        if self.textarea.is_some() {
            return;
        }
        if self.form_depth.is_none() {
            if tag.name.local_name() == "form" && self.filler.in_scope(&tag.attrs) {
                self.form_depth = Some(self.depth);
            }
            self.pending.push_back(Event::Start(tag));
            return;
        }

        let filler = self.filler;
        match tag.name.local_name() {
            "input" => self.pending.push_back(Event::Start(filler.fill_input(tag))),
            "select" => {
                self.select = Some(SelectState {
                    depth: self.depth,
                    value: filler.lookup(&tag.attrs),
                });
                self.pending.push_back(Event::Start(tag));
            }
            "option" if self.select.is_some() => {
                self.option = Some(PendingOption {
                    depth: self.depth,
                    value: tag.attrs.get("value").map(str::to_string),
                    start: tag,
                    text: String::new(),
                    content: Vec::new(),
                });
            }
            "textarea" => {
                let replacement = filler.lookup(&tag.attrs).and_then(FormValue::first);
                if let Some(text) = replacement {
                    self.textarea = Some(TextareaState {
                        depth: self.depth,
                        replacement: text.to_string(),
                    });
                }
                self.pending.push_back(Event::Start(tag));
            }
            _ => self.pending.push_back(Event::Start(tag)),
        }
    }

    fn end(&mut self, name: QName) {
        if self.option.as_ref().map_or(false, |o| o.depth == self.depth) {
            if let Some(option) = self.option.take() {
                self.finish_option(option, name);
            }
            return;
        }
        if let Some(option) = self.option.as_mut() {
            option.content.push(Event::End(name));
            return;
        }
        if let Some(textarea) = &self.textarea {
            if textarea.depth == self.depth {
                if let Some(textarea) = self.textarea.take() {
                    if !textarea.replacement.is_empty() {
                        self.pending.push_back(Event::Text(textarea.replacement));
                    }
                    self.pending.push_back(Event::End(name));
                }
            }
            return;
        }
        if self.select.as_ref().map_or(false, |s| s.depth == self.depth) {
            self.select = None;
        }
        if self.form_depth == Some(self.depth) {
            self.form_depth = None;
        }
        self.pending.push_back(Event::End(name));
    }

    fn other(&mut self, event: Event) {
        if let Some(option) = self.option.as_mut() {
            if let Event::Text(text) = &event {
                option.text.push_str(text);
            }
            option.content.push(event);
            return;
        }
        if self.textarea.is_none() {
            self.pending.push_back(event);
        }
    }

    fn finish_option(&mut self, option: PendingOption, end: QName) {
        let PendingOption {
            mut start,
            value,
            text,
            content,
            ..
        } = option;
        let data = self.select.as_ref().and_then(|s| s.value);
        // A boolean cannot pick an option
        if let Some(data) = data.filter(|d| !matches!(d, FormValue::Flag(_))) {
            let declared = value.unwrap_or_else(|| text.trim().to_string());
            toggle(&mut start.attrs, "selected", data.matches(&declared));
        }
        self.pending.push_back(Event::Start(start));
        self.pending.extend(content);
        self.pending.push_back(Event::End(end));
    }

    /// Release a held-back option when the input ends inside it
    fn flush(&mut self) -> bool {
        match self.option.take() {
            Some(option) => {
                self.pending.push_back(Event::Start(option.start));
                self.pending.extend(option.content);
                true
            }
            None => false,
        }
    }
}

impl Iterator for Filling<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            match self.input.next() {
                Some(Ok(event)) => self.feed(event),
                Some(Err(err)) => return Some(Err(err)),
                None => {
                    if !self.flush() {
                        return None;
                    }
                }
            }
        }
    }
}
