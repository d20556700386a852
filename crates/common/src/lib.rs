//! Common utilities for parsekit crates.
//!
//! This crate provides shared infrastructure used across the parsekit
//! workspace:
//!
//! - [`debug`] - Per-module logging controlled via the `DEBUG` environment
//!   variable
//! - [`loc`] - Source position tracking (byte offset, line, column)

pub mod debug;
pub mod loc;

pub use debug::{create_logger, Logger};
pub use loc::Loc;
