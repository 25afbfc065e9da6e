//! Error Types
//!
//! Every fallible operation in the crate returns [`MarkupError`].
//!
//! Errors fall into a few classes:
//! - **Structural**: the event stream itself is broken (duplicate attribute,
//!   unbalanced or unclosed tags). Always surfaced, never repaired.
//! - **Selector syntax**: raised when a path expression is compiled, before
//!   any stream is touched.
//! - **Exhausted**: a single-pass source was iterated twice.
//! - **Parse**: the reader rejected its textual input.
//!
//! Sanitization never produces an error; disallowed content is removed.

/// All errors produced by markstream.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    // ── Structural errors ───────────────────────────────────────────

    #[error("invalid event: duplicate attribute `{name}` on <{tag}>")]
    InvalidEvent { tag: String, name: String },

    #[error("unbalanced stream: </{tag}> has no matching start tag")]
    UnbalancedStream { tag: String },

    #[error("malformed stream: {0}")]
    MalformedStream(String),

    // ── Usage errors ────────────────────────────────────────────────

    #[error("selector syntax error at offset {offset}: {message}")]
    SelectorSyntax { message: String, offset: usize },

    #[error("stream already consumed; obtain a new one from its source")]
    ExhaustedStream,

    // ── Input / output errors ───────────────────────────────────────

    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("I/O error: {0}")]
    Io(String),
}

impl MarkupError {
    /// Whether this error reports a broken event stream (a bug in an
    /// upstream producer or filter).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MarkupError::InvalidEvent { .. }
                | MarkupError::UnbalancedStream { .. }
                | MarkupError::MalformedStream(_)
        )
    }

    pub(crate) fn selector(message: impl Into<String>, offset: usize) -> Self {
        MarkupError::SelectorSyntax {
            message: message.into(),
            offset,
        }
    }
}

impl From<std::io::Error> for MarkupError {
    fn from(err: std::io::Error) -> Self {
        MarkupError::Io(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MarkupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_class() {
        assert!(MarkupError::UnbalancedStream { tag: "p".into() }.is_structural());
        assert!(MarkupError::MalformedStream("x".into()).is_structural());
        assert!(!MarkupError::ExhaustedStream.is_structural());
        assert!(!MarkupError::selector("bad", 3).is_structural());
    }

    #[test]
    fn test_display() {
        let err = MarkupError::InvalidEvent {
            tag: "a".into(),
            name: "href".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid event: duplicate attribute `href` on <a>"
        );
    }
}
