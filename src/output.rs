//! Serializer
//!
//! Renders event streams as XML, XHTML, HTML or plain text.
//!
//! The serializer is the only place where escaping happens: text gets
//! `& < >` escaped, attribute values additionally `"`. It also validates
//! structure as it goes, so a broken stream is reported instead of silently
//! producing broken markup.
//!
//! Two things are held back while writing:
//! - a START, until the next event shows whether the element is empty
//! - adjacent TEXT events, which are joined before whitespace normalisation

use crate::core::entities::{escape_attribute, escape_text};
use crate::error::{MarkupError, Result};
use crate::reader::events::{DocType, Event, QName, StartTag};
use crate::reader::html::is_void_element;
use crate::stream::Stream;
use log::warn;
use std::borrow::Cow;
use std::io;

/// Attributes written minimized in HTML and as `name="name"` in XHTML
pub const BOOLEAN_ATTRS: &[&str] = &[
    "selected", "checked", "compact", "declare", "defer", "disabled", "ismap", "multiple",
    "nohref", "noresize", "noshade", "nowrap",
];

/// Output flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMethod {
    #[default]
    Xml,
    Xhtml,
    Html,
    Text,
}

/// Configured serializer. Immutable once built; share it freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Serializer {
    method: OutputMethod,
    doctype: Option<DocType>,
    strip_whitespace: bool,
}

impl Default for Serializer {
    fn default() -> Self {
        Serializer::new(OutputMethod::Xml)
    }
}

impl Serializer {
    pub fn new(method: OutputMethod) -> Self {
        Serializer {
            method,
            doctype: None,
            strip_whitespace: true,
        }
    }

    pub fn xml() -> Self {
        Self::new(OutputMethod::Xml)
    }

    pub fn xhtml() -> Self {
        Self::new(OutputMethod::Xhtml)
    }

    pub fn html() -> Self {
        Self::new(OutputMethod::Html)
    }

    pub fn text() -> Self {
        Self::new(OutputMethod::Text)
    }

    /// Emit this DOCTYPE before anything else. A DOCTYPE event in the stream
    /// is then ignored.
    pub fn with_doctype(mut self, doctype: DocType) -> Self {
        self.doctype = Some(doctype);
        self
    }

    /// Trailing blanks before a newline are removed and runs of newlines
    /// collapsed, except inside `pre`, `textarea`, `xml:space="preserve"`
    /// and HTML `script`/`style`. On by default.
    pub fn strip_whitespace(mut self, strip: bool) -> Self {
        self.strip_whitespace = strip;
        self
    }

    pub fn method(&self) -> OutputMethod {
        self.method
    }

    /// Serialize a stream into a string
    pub fn render(&self, stream: Stream<'_>) -> Result<String> {
        let mut out = String::new();
        self.serialize(stream, &mut out)?;
        Ok(out)
    }

    /// Serialize a stream into a writer, piece by piece
    pub fn write<W: io::Write>(&self, stream: Stream<'_>, out: W) -> Result<()> {
        self.serialize(stream, &mut IoSink(out))
    }

    fn serialize<S: Sink>(&self, stream: Stream<'_>, sink: &mut S) -> Result<()> {
        let mut writer = Writer::new(self, sink);
        if let Some(doctype) = &self.doctype {
            writer.doctype(doctype)?;
        }
        for event in stream {
            writer.event(event?)?;
        }
        writer.finish()
    }
}

/// Output target for the writer
trait Sink {
    fn put(&mut self, text: &str) -> Result<()>;
}

impl Sink for String {
    fn put(&mut self, text: &str) -> Result<()> {
        self.push_str(text);
        Ok(())
    }
}

struct IoSink<W>(W);

impl<W: io::Write> Sink for IoSink<W> {
    fn put(&mut self, text: &str) -> Result<()> {
        self.0.write_all(text.as_bytes())?;
        Ok(())
    }
}

/// An element currently open in the output
struct Open {
    name: QName,
    /// Whitespace left untouched
    preserve: bool,
    /// Text written unescaped (HTML script/style)
    raw: bool,
}

struct Writer<'s, S> {
    config: &'s Serializer,
    sink: &'s mut S,
    stack: Vec<Open>,
    pending: Option<StartTag>,
    text: String,
    in_cdata: bool,
    have_doctype: bool,
}

impl<'s, S: Sink> Writer<'s, S> {
    fn new(config: &'s Serializer, sink: &'s mut S) -> Self {
        Writer {
            config,
            sink,
            stack: Vec::new(),
            pending: None,
            text: String::new(),
            in_cdata: false,
            have_doctype: false,
        }
    }

    fn method(&self) -> OutputMethod {
        self.config.method
    }

    fn markup(&mut self, text: &str) -> Result<()> {
        if self.method() == OutputMethod::Text {
            return Ok(());
        }
        self.sink.put(text)
    }

    fn event(&mut self, event: Event) -> Result<()> {
        if let Event::Text(text) = event {
            if !text.is_empty() {
                self.flush_start()?;
                self.text.push_str(&text);
            }
            return Ok(());
        }

        self.flush_text()?;
        match event {
            Event::Start(tag) => {
                self.flush_start()?;
                let open = self.open(&tag);
                self.stack.push(open);
                self.pending = Some(tag);
            }
            Event::End(name) => {
                match self.stack.pop() {
                    Some(open) if open.name == name => {}
                    _ => {
                        warn!("serializer rejected </{}> without a matching start tag", name);
                        return Err(MarkupError::UnbalancedStream {
                            tag: name.to_string(),
                        });
                    }
                }
                match self.pending.take() {
                    Some(tag) => self.empty_tag(&tag)?,
                    None => self.markup(&format!("</{}>", name))?,
                }
            }
            Event::Comment(text) => {
                self.flush_start()?;
                self.markup(&format!("<!--{}-->", comment_text(&text)))?;
            }
            Event::Pi { target, data } => {
                self.flush_start()?;
                if data.is_empty() {
                    self.markup(&format!("<?{}?>", target))?;
                } else {
                    self.markup(&format!("<?{} {}?>", target, data))?;
                }
            }
            Event::DocType(doctype) => {
                self.flush_start()?;
                self.doctype(&doctype)?;
            }
            Event::StartCdata => {
                self.flush_start()?;
                if self.method() != OutputMethod::Html {
                    self.markup("<![CDATA[")?;
                }
                self.in_cdata = true;
            }
            Event::EndCdata => {
                self.flush_start()?;
                if self.method() != OutputMethod::Html {
                    self.markup("]]>")?;
                }
                self.in_cdata = false;
            }
            Event::Text(_) => {}
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.flush_text()?;
        if let Some(open) = self.stack.last() {
            warn!("serializer reached end of stream with <{}> still open", open.name);
            return Err(MarkupError::MalformedStream(format!(
                "unclosed element <{}> at end of stream",
                open.name
            )));
        }
        Ok(())
    }

    fn open(&self, tag: &StartTag) -> Open {
        let method = self.method();
        let local = tag.name.local_name();
        let (parent_preserve, parent_raw) = self
            .stack
            .last()
            .map_or((false, false), |open| (open.preserve, open.raw));
        let html_like = matches!(method, OutputMethod::Xhtml | OutputMethod::Html);
        let raw = parent_raw
            || (method == OutputMethod::Html
                && (local.eq_ignore_ascii_case("script") || local.eq_ignore_ascii_case("style")));
        let preserve = parent_preserve
            || raw
            || (html_like
                && (local.eq_ignore_ascii_case("pre") || local.eq_ignore_ascii_case("textarea")))
            || tag.attrs.get("xml:space") == Some("preserve");
        Open {
            name: tag.name.clone(),
            preserve,
            raw,
        }
    }

    fn doctype(&mut self, doctype: &DocType) -> Result<()> {
        if self.have_doctype {
            return Ok(());
        }
        self.have_doctype = true;
        let mut out = format!("<!DOCTYPE {}", doctype.name);
        match (&doctype.public_id, &doctype.system_id) {
            (Some(public_id), Some(system_id)) => {
                out.push_str(&format!(" PUBLIC \"{}\" \"{}\"", public_id, system_id))
            }
            (Some(public_id), None) => out.push_str(&format!(" PUBLIC \"{}\"", public_id)),
            (None, Some(system_id)) => out.push_str(&format!(" SYSTEM \"{}\"", system_id)),
            (None, None) => {}
        }
        out.push_str(">\n");
        self.markup(&out)
    }

    fn start_tag(&self, tag: &StartTag) -> String {
        let method = self.method();
        let mut out = format!("<{}", tag.name);
        for (name, value) in tag.attrs.iter() {
            let boolean = BOOLEAN_ATTRS.contains(&name.as_str());
            match method {
                OutputMethod::Html if boolean => {
                    if !value.is_empty() {
                        out.push(' ');
                        out.push_str(name.as_str());
                    }
                }
                OutputMethod::Xhtml if boolean => {
                    out.push_str(&format!(" {}=\"{}\"", name, name));
                }
                _ => {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
                }
            }
        }
        out
    }

    fn flush_start(&mut self) -> Result<()> {
        if let Some(tag) = self.pending.take() {
            let mut out = self.start_tag(&tag);
            out.push('>');
            self.markup(&out)?;
        }
        Ok(())
    }

    /// A START directly followed by its END
    fn empty_tag(&mut self, tag: &StartTag) -> Result<()> {
        let mut out = self.start_tag(tag);
        let void = is_void_element(tag.name.local_name());
        match self.method() {
            OutputMethod::Xml => out.push_str("/>"),
            OutputMethod::Xhtml if void => out.push_str(" />"),
            OutputMethod::Html if void => out.push('>'),
            _ => out.push_str(&format!("></{}>", tag.name)),
        }
        self.markup(&out)
    }

    fn flush_text(&mut self) -> Result<()> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        let (preserve, raw) = self
            .stack
            .last()
            .map_or((false, false), |open| (open.preserve, open.raw));

        let method = self.method();
        let text = if self.config.strip_whitespace && !preserve && method != OutputMethod::Text {
            normalize_whitespace(&text)
        } else {
            Cow::Borrowed(text.as_str())
        };
        if self.in_cdata && matches!(method, OutputMethod::Xml | OutputMethod::Xhtml) {
            // `]]>` would end the section early; close and reopen around it
            return self.sink.put(&text.replace("]]>", "]]]]><![CDATA[>"));
        }
        if method == OutputMethod::Text || raw {
            self.sink.put(&text)
        } else {
            self.sink.put(&escape_text(&text))
        }
    }
}

/// Comment body with every `--` broken up and no trailing `-`, so the
/// comment cannot end early or become invalid XML
fn comment_text(text: &str) -> Cow<'_, str> {
    if !text.contains("--") && !text.ends_with('-') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 4);
    for c in text.chars() {
        if c == '-' && out.ends_with('-') {
            out.push(' ');
        }
        out.push(c);
    }
    if out.ends_with('-') {
        out.push(' ');
    }
    Cow::Owned(out)
}

/// Remove spaces and tabs before a newline and collapse runs of newlines
pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
    if !text.contains('\n') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut blanks = String::new();
    for c in text.chars() {
        match c {
            ' ' | '\t' => blanks.push(c),
            '\n' => {
                blanks.clear();
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {
                out.push_str(&blanks);
                blanks.clear();
                out.push(c);
            }
        }
    }
    out.push_str(&blanks);
    if out == text {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tag;

    fn events(events: Vec<Event>) -> Stream<'static> {
        Stream::from_events(events)
    }

    fn div() -> crate::builder::Element {
        tag("div")
            .child(tag("a").attr("href", "foo"))
            .child(tag("br"))
            .child(tag("hr").attr("noshade", "True"))
    }

    #[test]
    fn test_xml_output() {
        assert_eq!(
            Serializer::xml().render(div().generate()).unwrap(),
            "<div><a href=\"foo\"/><br/><hr noshade=\"True\"/></div>"
        );
    }

    #[test]
    fn test_xhtml_output() {
        assert_eq!(
            Serializer::xhtml().render(div().generate()).unwrap(),
            "<div><a href=\"foo\"></a><br /><hr noshade=\"noshade\" /></div>"
        );
    }

    #[test]
    fn test_html_output() {
        assert_eq!(
            Serializer::html().render(div().generate()).unwrap(),
            "<div><a href=\"foo\"></a><br><hr noshade></div>"
        );
    }

    #[test]
    fn test_text_output() {
        let elem = tag("div").child(tag("a").attr("href", "foo").text("<Hello!>")).child(tag("br"));
        assert_eq!(Serializer::text().render(elem.generate()).unwrap(), "<Hello!>");
        assert_eq!(
            Serializer::xml().render(elem.generate()).unwrap(),
            "<div><a href=\"foo\">&lt;Hello!&gt;</a><br/></div>"
        );
    }

    #[test]
    fn test_attribute_escaping() {
        let elem = tag("a").attr("title", "say \"hi\" & <go>");
        assert_eq!(
            Serializer::xml().render(elem.generate()).unwrap(),
            "<a title=\"say &#34;hi&#34; &amp; &lt;go&gt;\"/>"
        );
    }

    #[test]
    fn test_html_script_unescaped() {
        let elem = tag("script").text("if (a < b && c) {}");
        assert_eq!(
            Serializer::html().render(elem.generate()).unwrap(),
            "<script>if (a < b && c) {}</script>"
        );
        assert_eq!(
            Serializer::xhtml().render(elem.generate()).unwrap(),
            "<script>if (a &lt; b &amp;&amp; c) {}</script>"
        );
    }

    #[test]
    fn test_doctype_preamble() {
        let out = Serializer::html()
            .with_doctype(DocType::html_strict())
            .render(events(vec![Event::DocType(DocType::xhtml_strict()), Event::text("x")]))
            .unwrap();
        assert_eq!(
            out,
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://www.w3.org/TR/html4/strict.dtd\">\nx"
        );
    }

    #[test]
    fn test_cdata_comment_pi() {
        let stream = events(vec![
            Event::pi("php", "echo 1"),
            Event::comment(" c "),
            Event::StartCdata,
            Event::text("<x>"),
            Event::EndCdata,
        ]);
        assert_eq!(
            Serializer::xml().render(stream).unwrap(),
            "<?php echo 1?><!-- c --><![CDATA[<x>]]>"
        );
        let stream = events(vec![Event::StartCdata, Event::text("<x>"), Event::EndCdata]);
        assert_eq!(Serializer::html().render(stream).unwrap(), "&lt;x&gt;");
    }

    #[test]
    fn test_cdata_end_marker_split() {
        let cdata = || {
            events(vec![
                Event::StartCdata,
                Event::text("a]]>b"),
                Event::EndCdata,
            ])
        };
        assert_eq!(
            Serializer::xml().render(cdata()).unwrap(),
            "<![CDATA[a]]]]><![CDATA[>b]]>"
        );
        assert_eq!(
            Serializer::xhtml().render(cdata()).unwrap(),
            "<![CDATA[a]]]]><![CDATA[>b]]>"
        );
        assert_eq!(Serializer::html().render(cdata()).unwrap(), "a]]&gt;b");
    }

    #[test]
    fn test_comment_dashes_broken_up() {
        let render = |text: &str| Serializer::xml().render(events(vec![Event::comment(text)])).unwrap();
        assert_eq!(render(" ok "), "<!-- ok -->");
        assert_eq!(render("a--b"), "<!--a- -b-->");
        assert_eq!(render("x --> <script>"), "<!--x - -> <script>-->");
        assert_eq!(render("---"), "<!--- - - -->");
        assert_eq!(render("tail-"), "<!--tail- -->");
        assert_eq!(
            Serializer::html().render(events(vec![Event::comment("a--b")])).unwrap(),
            "<!--a- -b-->"
        );
    }

    #[test]
    fn test_unbalanced_end() {
        let stream = events(vec![Event::text("x"), Event::end("p")]);
        assert_eq!(
            Serializer::xml().render(stream).unwrap_err(),
            MarkupError::UnbalancedStream { tag: "p".into() }
        );

        let stream = events(vec![
            Event::start("a", Vec::<(&str, &str)>::new()).unwrap(),
            Event::end("b"),
        ]);
        assert!(matches!(
            Serializer::xml().render(stream),
            Err(MarkupError::UnbalancedStream { .. })
        ));
    }

    #[test]
    fn test_unclosed_start() {
        let stream = events(vec![Event::start("p", Vec::<(&str, &str)>::new()).unwrap()]);
        assert!(matches!(
            Serializer::html().render(stream),
            Err(MarkupError::MalformedStream(_))
        ));
    }

    #[test]
    fn test_whitespace_normalisation() {
        let elem = tag("div")
            .text("a  \n\n\n  b\t\n")
            .child(tag("pre").text("x  \n\n y"));
        assert_eq!(
            Serializer::xhtml().render(elem.generate()).unwrap(),
            "<div>a\n  b\n<pre>x  \n\n y</pre></div>"
        );
        assert_eq!(
            Serializer::xhtml().strip_whitespace(false).render(elem.generate()).unwrap(),
            "<div>a  \n\n\n  b\t\n<pre>x  \n\n y</pre></div>"
        );
    }

    #[test]
    fn test_xml_space_preserve() {
        let elem = tag("doc").attr("xml:space", "preserve").text("a \n\n b");
        assert_eq!(
            Serializer::xml().render(elem.generate()).unwrap(),
            "<doc xml:space=\"preserve\">a \n\n b</doc>"
        );
    }

    #[test]
    fn test_adjacent_text_coalesced() {
        let stream = events(vec![Event::text("a \n"), Event::text("\n b")]);
        assert_eq!(Serializer::xml().render(stream).unwrap(), "a\n b");
    }

    #[test]
    fn test_write_to() {
        let mut out = Vec::new();
        Serializer::xml().write(div().generate(), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("<div><a href=\"foo\"/>"));
    }
}
