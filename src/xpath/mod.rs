//! Path Selectors
//!
//! A small XPath subset compiled once and evaluated over event streams in a
//! single forward pass:
//! - child, descendant, descendant-or-self, self and attribute axes
//! - name, `*`, `node()` and `text()` tests
//! - attribute predicates with `not`, `and`, `or`
//! - unions with `|`
//! - prefixed name tests resolved against a namespace map

pub mod cache;
pub mod compiler;
pub mod lexer;
pub mod matcher;
pub mod parser;

pub use compiler::Selector;
pub use matcher::Mark;
