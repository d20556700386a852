//! Standard fold functions for `and`, `many`, and `count`.

use crate::parser::Value;
use crate::value;

/// Concatenate `String` child values in order, skipping unit values.
pub fn concat(vals: Vec<Value>) -> Value {
    let mut out = String::new();
    for v in vals {
        if value::is_unit(&v) {
            continue;
        }
        out.push_str(&value::string(v));
    }
    Box::new(out)
}

/// Keep the first child value, dropping the rest.
pub fn first(vals: Vec<Value>) -> Value {
    nth(vals, 0)
}

/// Keep the second child value, dropping the rest.
pub fn second(vals: Vec<Value>) -> Value {
    nth(vals, 1)
}

/// Keep the last child value, dropping the rest.
pub fn last(mut vals: Vec<Value>) -> Value {
    match vals.pop() {
        Some(v) => v,
        None => value::unit(),
    }
}

/// Drop all child values and yield unit.
pub fn discard(_vals: Vec<Value>) -> Value {
    value::unit()
}

fn nth(vals: Vec<Value>, n: usize) -> Value {
    let len = vals.len();
    match vals.into_iter().nth(n) {
        Some(v) => v,
        None => panic!("fold expected at least {} values, got {}", n + 1, len),
    }
}
