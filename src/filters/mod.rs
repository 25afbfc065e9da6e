//! Stream Filters
//!
//! A filter turns one stream into another. Filters are configured once,
//! then shared read-only: `apply` borrows the filter for as long as the
//! returned stream lives, so one filter can serve any number of streams,
//! also from several threads when it is `Sync`.
//!
//! - FormFiller: populates form controls from a data map
//! - Sanitizer: strips unsafe markup from untrusted HTML
//! - Transformer: edits the parts of a stream picked by path selectors
//! - NamespaceStripper: removes namespace information
//! - [`from_fn`]: wraps a plain function as a filter

pub mod css;
pub mod form;
pub mod namespaces;
pub mod sanitizer;
pub mod transform;

pub use form::{FormFiller, FormValue};
pub use namespaces::NamespaceStripper;
pub use sanitizer::{Sanitizer, SanitizerConfig};
pub use transform::{Content, StreamBuffer, Transformer};

use crate::stream::Stream;

/// A lazy stream transformation
pub trait Filter {
    fn apply<'a>(&'a self, stream: Stream<'a>) -> Stream<'a>;
}

impl<F: Filter + ?Sized> Filter for Box<F> {
    fn apply<'a>(&'a self, stream: Stream<'a>) -> Stream<'a> {
        (**self).apply(stream)
    }
}

/// Filter backed by a function, see [`from_fn`]
#[derive(Clone)]
pub struct FnFilter<F> {
    func: F,
}

impl<F> Filter for FnFilter<F>
where
    F: for<'s> Fn(Stream<'s>) -> Stream<'s>,
{
    fn apply<'a>(&'a self, stream: Stream<'a>) -> Stream<'a> {
        (self.func)(stream)
    }
}

/// Use a function as a filter.
///
/// ```
/// use markstream::{filters::from_fn, reader, Event, Serializer, Stream};
///
/// let upper = from_fn(|stream| {
///     Stream::new(stream.map(|event| {
///         event.map(|e| match e {
///             Event::Text(text) => Event::Text(text.to_uppercase()),
///             other => other,
///         })
///     }))
/// });
/// let doc = reader::xml("<p>hello</p>").unwrap();
/// let out = doc.stream() | &upper | &Serializer::xml();
/// assert_eq!(out.unwrap(), "<p>HELLO</p>");
/// ```
pub fn from_fn<F>(func: F) -> FnFilter<F>
where
    F: for<'s> Fn(Stream<'s>) -> Stream<'s>,
{
    FnFilter { func }
}
