//! markstream - Stream-based XML/HTML markup processing
//!
//! Markup is handled as a lazy stream of events (tag starts and ends, text,
//! comments, processing instructions) that flows through a pipeline:
//!
//! - Sources: XML and HTML readers, programmatic builder, event buffers
//! - Selection: a streaming XPath subset (`//form[@id='login']//input`)
//! - Filters: form filling, HTML sanitizing, path-driven transformations,
//!   namespace stripping, user functions
//! - Output: XML, XHTML, HTML or plain text serialization
//!
//! ```
//! use markstream::{reader, FormFiller, Sanitizer, Serializer};
//!
//! let doc = reader::html(
//!     "<form id=\"login\"><input name=\"user\"><input type=\"password\" name=\"pw\"></form>\
//!      <script>steal()</script>",
//! )
//! .unwrap();
//! let filler = FormFiller::new().value("user", "ada").value("pw", "secret");
//! let sanitizer = Sanitizer::default();
//!
//! let out = doc.stream() | &filler | &sanitizer | &Serializer::html();
//! assert_eq!(
//!     out.unwrap(),
//!     "<form id=\"login\"><input name=\"user\" value=\"ada\"><input type=\"password\" name=\"pw\"></form>"
//! );
//! ```
//!
//! Every stage is lazy: nothing is parsed, filtered or written until the
//! serializer pulls. Filters, selectors and serializers are immutable once
//! built and can be shared across threads.

pub mod builder;
pub mod core;
pub mod error;
pub mod filters;
pub mod output;
pub mod reader;
pub mod stream;
pub mod xpath;

#[cfg(feature = "parallel")]
pub mod strategy;

// ============================================================================
// Public API
// ============================================================================

pub use crate::core::attributes::Attrs;
pub use error::{MarkupError, Result};
pub use filters::{
    Content, Filter, FormFiller, FormValue, NamespaceStripper, Sanitizer, SanitizerConfig,
    StreamBuffer, Transformer,
};
pub use output::{OutputMethod, Serializer};
pub use reader::{DocType, Event, EventKind, HtmlReader, QName, StartTag, XmlReader};
pub use stream::{EventBuffer, EventSource, Stream};
pub use xpath::{Mark, Selector};
