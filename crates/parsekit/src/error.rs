//! Position-stamped parse errors with mergeable expectation sets.

use std::fmt;

use common::Loc;

use crate::input::Input;

/// What the input held at the error position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Byte(u8),
    Eof,
    ReadFailure(String),
}

impl fmt::Display for Received {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Received::Byte(b) => write!(f, "'{}'", (*b as char).escape_default()),
            Received::Eof => write!(f, "end of input"),
            Received::ReadFailure(cause) => write!(f, "read failure ({})", cause),
        }
    }
}

/// A parse failure at a single input position.
///
/// Carries a deduplicated, insertion-ordered set of expectation labels and
/// an optional failure message from `fail` parsers or failed checks. Errors
/// merge through alternation: the later position wins outright, and at equal
/// positions the expectation sets are unioned.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Name of the input the error occurred in.
    pub name: String,
    /// Position of the failure.
    pub loc: Loc,
    /// Expectation labels, deduplicated, in insertion order.
    pub expected: Vec<String>,
    /// What was actually at the failure position. `None` for errors raised
    /// outside a parse, such as grammar compilation failures.
    pub received: Option<Received>,
    /// Message from a `fail` parser or a failed check, if any.
    pub failure: Option<String>,
    /// Set when the failure escaped a predictive boundary after consuming
    /// input; backtracking combinators propagate it instead of retrying.
    pub(crate) cut: bool,
}

impl ParseError {
    fn received_at(input: &mut Input<'_>) -> Received {
        match input.peek() {
            Some(b) => Received::Byte(b),
            None => match input.read_failure() {
                Some(cause) => Received::ReadFailure(cause.to_string()),
                None => Received::Eof,
            },
        }
    }

    /// Singleton expectation at the current input position.
    pub fn expected(input: &mut Input<'_>, label: &str) -> Self {
        Self {
            name: input.name().to_string(),
            loc: input.loc(),
            expected: vec![label.to_string()],
            received: Some(Self::received_at(input)),
            failure: None,
            cut: false,
        }
    }

    /// Failure message at the current input position.
    pub fn failure(input: &mut Input<'_>, msg: &str) -> Self {
        Self {
            name: input.name().to_string(),
            loc: input.loc(),
            expected: Vec::new(),
            received: Some(Self::received_at(input)),
            failure: Some(msg.to_string()),
            cut: false,
        }
    }

    /// "unexpected input" failure, produced by `not` parsers.
    pub fn unexpected(input: &mut Input<'_>) -> Self {
        Self::failure(input, "unexpected input")
    }

    pub(crate) fn failure_at(name: &str, loc: Loc, msg: &str) -> Self {
        Self {
            name: name.to_string(),
            loc,
            expected: Vec::new(),
            received: None,
            failure: Some(msg.to_string()),
            cut: false,
        }
    }

    /// Merge two errors from alternative branches.
    ///
    /// The error at the later position absorbs the earlier one. At equal
    /// positions the expectation labels are unioned and failure messages
    /// joined.
    pub fn merge(mut self, mut other: ParseError) -> ParseError {
        let cut = self.cut || other.cut;
        let mut merged = if other.loc.is_after(&self.loc) {
            other
        } else if self.loc.is_after(&other.loc) {
            self
        } else {
            for label in other.expected.drain(..) {
                if !self.expected.contains(&label) {
                    self.expected.push(label);
                }
            }
            self.failure = match (self.failure.take(), other.failure.take()) {
                (Some(a), Some(b)) => Some(format!("{}; {}", a, b)),
                (a, b) => a.or(b),
            };
            self
        };
        merged.cut = cut;
        merged
    }

    /// Replace the expectation set with a single label, keeping the position
    /// and any failure message.
    pub fn relabel(mut self, label: &str) -> ParseError {
        self.expected.clear();
        self.expected.push(label.to_string());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: error: ",
            self.name, self.loc.line, self.loc.col
        )?;
        if let Some(msg) = &self.failure {
            write!(f, "{}", msg)?;
        } else if self.expected.is_empty() {
            write!(f, "unexpected input")?;
        } else {
            write!(f, "expected {}", self.expected.join(" or "))?;
        }
        match &self.received {
            Some(received) => write!(f, " at {}", received),
            None => Ok(()),
        }
    }
}

impl std::error::Error for ParseError {}
