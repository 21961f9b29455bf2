use crate::ast::Span;

/// A single recoverable or fatal parse failure. Fatal errors ("FATAL") stop
/// parsing outright; recoverable ones are collected and parsing resumes at
/// the next statement boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub at: Span,
    pub expected: String,
    pub got: String,
    pub fatal: bool,
}

impl ParseError {
    pub fn new(at: Span, expected: impl Into<String>, got: impl Into<String>) -> Self {
        ParseError {
            at,
            expected: expected.into(),
            got: got.into(),
            fatal: false,
        }
    }

    pub fn fatal(at: Span, expected: impl Into<String>, got: impl Into<String>) -> Self {
        ParseError {
            at,
            expected: expected.into(),
            got: got.into(),
            fatal: true,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: expected {}, got {}",
            self.at.line, self.at.start, self.expected, self.got
        )
    }
}
