//! Error types and diagnostics.
//!
//! Two kinds of failure exist. A [`SyntaxError`] reports malformed markup
//! (unterminated tags, badly quoted attributes, missing or multiple root
//! elements) and carries the source position when the tokenizer knows it.
//! [`Error::Eval`] reports that the tokenizer or the input decoding failed in
//! a way that is not a property of the markup itself.

use std::fmt;

use thiserror::Error;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Malformed markup, or a document that does not have exactly one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Human-readable description of the problem.
    pub message: String,
    /// Where the problem was detected, when known.
    pub location: Option<SourceLocation>,
}

impl SyntaxError {
    /// Creates a syntax error without position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Creates a syntax error anchored at `location`.
    pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed XML document: {}", self.message)?;
        if let Some(location) = self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxError {}

/// The error type returned by parsing and stringifying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The markup (or the value handed to stringify) is malformed.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The tokenizer or input decoding failed unexpectedly.
    #[error("XML tokenizer failed: {0}")]
    Eval(String),
}

impl Error {
    /// Shorthand for a syntax error without position information.
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(SyntaxError::new(message))
    }

    /// Returns `true` for [`Error::Syntax`].
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    /// Returns `true` for [`Error::Eval`].
    #[must_use]
    pub fn is_eval(&self) -> bool {
        matches!(self, Self::Eval(_))
    }

    /// Returns the source location of a syntax error, if one was recorded.
    #[must_use]
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Syntax(err) => err.location,
            Self::Eval(_) => None,
        }
    }
}

impl From<crate::encoding::EncodingError> for Error {
    fn from(err: crate::encoding::EncodingError) -> Self {
        Self::Eval(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_syntax_error_display_with_location() {
        let err = SyntaxError::at(
            "expected </child>, found </root>",
            SourceLocation {
                line: 3,
                column: 1,
                byte_offset: 24,
            },
        );
        assert_eq!(
            err.to_string(),
            "malformed XML document: expected </child>, found </root> at 3:1"
        );
    }

    #[test]
    fn test_syntax_error_display_without_location() {
        let err = Error::syntax("multiple root node detected");
        assert_eq!(
            err.to_string(),
            "malformed XML document: multiple root node detected"
        );
        assert!(err.is_syntax());
        assert!(!err.is_eval());
        assert_eq!(err.location(), None);
    }

    #[test]
    fn test_eval_error_display() {
        let err = Error::Eval("stream closed".to_string());
        assert_eq!(err.to_string(), "XML tokenizer failed: stream closed");
        assert!(err.is_eval());
    }

    #[test]
    fn test_error_is_error_trait() {
        let err: Box<dyn std::error::Error> = Box::new(Error::syntax("x"));
        assert!(err.to_string().contains('x'));
    }
}
