//! parsekit - a parser combinator engine for byte-oriented text.
//!
//! A grammar is described as a composition of small parser values and then
//! run against an input to produce either a parsed value or a structured
//! error report. Two front-ends build parser values from textual
//! descriptions: a regular-expression compiler ([`Grammar::re`]) and an
//! EBNF-style grammar compiler ([`Grammar::language`]) that yields a generic
//! [`Ast`].
//!
//! # Overview
//!
//! Parsers live in a [`Grammar`], an arena addressed by [`ParserId`].
//! Atomic constructors ([`Grammar::byte`], [`Grammar::string`],
//! [`Grammar::range`], ...) allocate leaf parsers; combinators
//! ([`Grammar::or`], [`Grammar::and`], [`Grammar::many`], ...) take their
//! operands by transfer of ownership. Recursion goes through named retained
//! parsers: [`Grammar::declare`] first, [`Grammar::define`] later,
//! [`Grammar::cleanup`] when done.
//!
//! # Example
//!
//! ```ignore
//! use parsekit::{folds, Grammar};
//!
//! let mut g = Grammar::new();
//! let ident = g.re("[a-zA-Z_][a-zA-Z_0-9]*").unwrap();
//! let name = g.parse("input", "foo_123 bar", ident).unwrap();
//! assert_eq!(parsekit::value::string(name), "foo_123");
//! ```
//!
//! # Execution model
//!
//! Evaluation is single-threaded and strictly sequential; alternatives are
//! tried left to right with controlled backtracking. By default a failed
//! alternative rewinds whatever it consumed; [`Grammar::predictive`]
//! disables that per sub-parser, and the grammar compiler's
//! [`lang::PREDICTIVE`] flag switches a whole language into predictive mode.
//! A parser tree supports one parse at a time; use [`Grammar::copy`] for
//! parallel use.

pub mod ast;
pub mod charset;
pub mod error;
mod exec;
pub mod folds;
pub mod input;
pub mod lang;
pub mod parser;
pub mod regex;
pub mod value;

pub use ast::Ast;
pub use charset::ByteSet;
pub use common::Loc;
pub use error::{ParseError, Received};
pub use input::{Checkpoint, Input};
pub use parser::{Fold, Grammar, ParserId, Value};
