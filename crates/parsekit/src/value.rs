//! Helpers for working with parser output values.
//!
//! A [`Value`] is an opaque owned box; folds and transforms downcast to the
//! concrete types they expect. A downcast mismatch is a programming error
//! and aborts with a report.

use crate::parser::Value;

/// The unit value, used by parsers that match without producing anything
/// (anchors, elided whitespace, `maybe` defaults). Folds skip it.
pub fn unit() -> Value {
    Box::new(())
}

pub fn is_unit(v: &Value) -> bool {
    v.is::<()>()
}

/// Take a value out of its box, panicking if it has a different type.
pub fn take<T: 'static>(v: Value) -> T {
    match v.downcast::<T>() {
        Ok(b) => *b,
        Err(_) => panic!(
            "parser value has unexpected type (expected {})",
            std::any::type_name::<T>()
        ),
    }
}

/// Take a `String` value.
pub fn string(v: Value) -> String {
    take::<String>(v)
}

/// Decode matched bytes into a `String`, mapping each byte to the char with
/// the same code point. The engine is byte-oriented; this keeps matched text
/// printable without assuming an encoding.
pub(crate) fn text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// First byte of a single-character `String` value.
pub(crate) fn first_byte(v: Value) -> u8 {
    let s = string(v);
    match s.chars().next() {
        Some(c) => c as u8,
        None => 0,
    }
}

/// Non-consuming peek at the first char of a `String` value.
pub(crate) fn peek_char(v: &Value) -> Option<char> {
    v.downcast_ref::<String>().and_then(|s| s.chars().next())
}
