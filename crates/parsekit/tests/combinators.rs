//! Combinator runtime tests: atoms, backtracking, error merging, and the
//! retention protocol.

use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;

use parsekit::{folds, value, Grammar, Input, Value};

// =============================================================================
// Atoms
// =============================================================================

#[test]
fn test_byte_and_string_atoms() {
    let mut g = Grammar::new();
    let a = g.byte(b'a');
    assert_eq!(value::string(g.parse("t", "abc", a).unwrap()), "a");

    let lit = g.string("abc");
    assert_eq!(value::string(g.parse("t", "abcdef", lit).unwrap()), "abc");
    assert!(g.parse("t", "abx", lit).is_err());
}

#[test]
fn test_range_and_sets() {
    let mut g = Grammar::new();
    let d = g.range(b'0', b'9');
    assert!(g.parse("t", "7", d).is_ok());
    assert!(g.parse("t", "x", d).is_err());

    let v = g.one_of("aeiou");
    assert!(g.parse("t", "e", v).is_ok());
    assert!(g.parse("t", "z", v).is_err());

    let c = g.none_of("aeiou");
    assert!(g.parse("t", "z", c).is_ok());
    assert!(g.parse("t", "e", c).is_err());
}

#[test]
fn test_satisfy_and_any() {
    let mut g = Grammar::new();
    let upper = g.satisfy(|b| b.is_ascii_uppercase());
    assert_eq!(value::string(g.parse("t", "Q", upper).unwrap()), "Q");
    assert!(g.parse("t", "q", upper).is_err());

    let any = g.any();
    assert!(g.parse("t", "x", any).is_ok());
    assert!(g.parse("t", "", any).is_err());
}

#[test]
fn test_soi_eoi() {
    let mut g = Grammar::new();
    let a = g.byte(b'a');
    let end = g.eoi();
    let p = g.and(folds::first, &[a, end]);
    assert!(g.parse("t", "a", p).is_ok());
    assert!(g.parse("t", "ab", p).is_err());

    let start = g.soi();
    let b = g.byte(b'b');
    let q = g.and(folds::second, &[start, b]);
    assert!(g.parse("t", "b", q).is_ok());
}

#[test]
fn test_anchor_sees_last_and_next() {
    let mut g = Grammar::new();
    // Word boundary: letter before, non-letter after.
    let letter = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_alphabetic());
    let letters = g.satisfy(|b| b.is_ascii_alphabetic());
    let w = g.many1(folds::concat, letters);
    let boundary = g.anchor(move |last, next| letter(last) && !letter(next));
    let p = g.and(folds::first, &[w, boundary]);
    let mut input = Input::string("t", "dog!");
    assert_eq!(value::string(g.parse_at(&mut input, p).unwrap()), "dog");
    assert_eq!(input.pos(), 3);
}

#[test]
fn test_lift_and_pass() {
    let mut g = Grammar::new();
    let v = g.lift_val(42u32);
    assert_eq!(value::take::<u32>(g.parse("t", "", v).unwrap()), 42);

    let p = g.pass();
    assert!(value::is_unit(&g.parse("t", "xyz", p).unwrap()));
}

#[test]
fn test_fail_message() {
    let mut g = Grammar::new();
    let f = g.fail("nope");
    let err = g.parse("t", "x", f).unwrap_err();
    assert_eq!(err.to_string(), "t:1:1: error: nope at 'x'");
}

// =============================================================================
// Position tracking
// =============================================================================

#[test]
fn test_position_row_col_after_newlines() {
    let mut g = Grammar::new();
    let p = g.string("ab\ncd\ne");
    let mut input = Input::string("t", "ab\ncd\nef");
    g.parse_at(&mut input, p).unwrap();
    assert_eq!(input.pos(), 7);
    assert_eq!(input.line(), 3);
    assert_eq!(input.col(), 2);
}

#[test]
fn test_rewind_round_trip_on_failure_and_success() {
    let mut g = Grammar::new();
    let p = g.string("ab");
    for text in ["aXc", "abc"] {
        let mut input = Input::string("t", text);
        input.next();
        let before = (input.pos(), input.line(), input.col(), input.last());
        let cp = input.mark();
        let _ = g.parse_at(&mut input, p);
        input.rewind(&cp);
        let after = (input.pos(), input.line(), input.col(), input.last());
        assert_eq!(before, after);
    }
}

// =============================================================================
// Error merging
// =============================================================================

#[test]
fn test_or_merges_errors_at_same_position() {
    let mut g = Grammar::new();
    let abc = g.string("abc");
    let abd = g.string("abd");
    let p = g.or(&[abc, abd]);
    let err = g.parse("input", "abe", p).unwrap_err();
    assert_eq!(err.loc.line, 1);
    assert_eq!(err.loc.col, 3);
    assert_eq!(
        err.to_string(),
        "input:1:3: error: expected \"abc\" or \"abd\" at 'e'"
    );
}

#[test]
fn test_or_later_position_absorbs_earlier() {
    let mut g = Grammar::new();
    let ax = g.string("ax");
    let abc = g.string("abc");
    let p = g.or(&[ax, abc]);
    let err = g.parse("t", "abd", p).unwrap_err();
    assert_eq!(err.loc.col, 3);
    assert_eq!(err.expected, vec!["\"abc\""]);
}

#[test]
fn test_expect_relabels() {
    let mut g = Grammar::new();
    let a = g.byte(b'a');
    let p = g.expect(a, "the letter a");
    let err = g.parse("t", "z", p).unwrap_err();
    assert_eq!(err.to_string(), "t:1:1: error: expected the letter a at 'z'");
}

// =============================================================================
// Predictive evaluation
// =============================================================================

#[test]
fn test_predict_cut_skips_later_alternatives() {
    let mut g = Grammar::new();
    let ab = g.string("ab");
    let ab = g.predictive(ab);
    let ac = g.string("ac");
    let p = g.or(&[ab, ac]);
    // The first alternative consumes 'a' before failing; the cut stops the
    // second alternative even though it would match.
    let err = g.parse("t", "ac", p).unwrap_err();
    assert_eq!(err.loc.col, 2);
    assert_eq!(err.expected, vec!["\"ab\""]);
}

#[test]
fn test_predict_non_consuming_failure_still_backtracks() {
    let mut g = Grammar::new();
    let ab = g.string("ab");
    let ab = g.predictive(ab);
    let xy = g.string("xy");
    let p = g.or(&[ab, xy]);
    assert_eq!(value::string(g.parse("t", "xy", p).unwrap()), "xy");
}

// =============================================================================
// Repetition
// =============================================================================

#[test]
fn test_many_and_many1() {
    let mut g = Grammar::new();
    let d = g.digit();
    let p = g.many(folds::concat, d);
    assert_eq!(value::string(g.parse("t", "123x", p).unwrap()), "123");
    assert_eq!(value::string(g.parse("t", "x", p).unwrap()), "");

    let d = g.digit();
    let q = g.many1(folds::concat, d);
    assert_eq!(value::string(g.parse("t", "42", q).unwrap()), "42");
    assert!(g.parse("t", "x", q).is_err());
}

#[test]
fn test_many_stops_on_zero_consumption() {
    let mut g = Grammar::new();
    let x = g.byte(b'x');
    let opt = g.maybe(x);
    let p = g.many(folds::concat, opt);
    let mut input = Input::string("t", "yyy");
    let v = g.parse_at(&mut input, p).unwrap();
    assert_eq!(value::string(v), "");
    assert_eq!(input.pos(), 0);
}

#[test]
fn test_many_rewinds_partial_iteration() {
    let mut g = Grammar::new();
    // Items are "ab"; a trailing lone 'a' must be rewound, not consumed.
    let item = g.string("ab");
    let p = g.many(folds::concat, item);
    let mut input = Input::string("t", "ababa");
    let v = g.parse_at(&mut input, p).unwrap();
    assert_eq!(value::string(v), "abab");
    assert_eq!(input.pos(), 4);
}

#[test]
fn test_count_exact() {
    let mut g = Grammar::new();
    let d = g.digit();
    let p = g.count(3, folds::concat, d);
    assert_eq!(value::string(g.parse("t", "123", p).unwrap()), "123");
    assert_eq!(value::string(g.parse("t", "1234", p).unwrap()), "123");

    let mut input = Input::string("t", "12x");
    assert!(g.parse_at(&mut input, p).is_err());
    assert_eq!(input.pos(), 0);
}

// =============================================================================
// Maybe / Not
// =============================================================================

#[test]
fn test_maybe_consuming_failure_fails() {
    let mut g = Grammar::new();
    let ab = g.string("ab");
    let p = g.maybe(ab);
    assert!(g.parse("t", "ax", p).is_err());
    assert!(value::is_unit(&g.parse("t", "xy", p).unwrap()));
    assert_eq!(value::string(g.parse("t", "ab", p).unwrap()), "ab");
}

#[test]
fn test_not_is_zero_width() {
    let mut g = Grammar::new();
    let a = g.byte(b'a');
    let p = g.not(a);
    let mut input = Input::string("t", "b");
    assert!(value::is_unit(&g.parse_at(&mut input, p).unwrap()));
    assert_eq!(input.pos(), 0);

    let err = g.parse("t", "a", p).unwrap_err();
    assert!(err.to_string().contains("unexpected input"));
}

// =============================================================================
// Apply / Check
// =============================================================================

#[test]
fn test_apply_transforms_value() {
    let mut g = Grammar::new();
    let d = g.digit();
    let digits = g.many1(folds::concat, d);
    let num = g.apply(digits, |v| {
        Box::new(value::string(v).parse::<i64>().unwrap_or(0)) as Value
    });
    assert_eq!(value::take::<i64>(g.parse("t", "1234", num).unwrap()), 1234);
}

#[test]
fn test_check_failure_is_a_parse_failure() {
    let mut g = Grammar::new();
    let d = g.digit();
    let digits = g.many1(folds::concat, d);
    let small = g.check(
        digits,
        |v| {
            v.downcast_ref::<String>()
                .and_then(|s| s.parse::<u32>().ok())
                .is_some_and(|n| n < 256)
        },
        "number too large",
    );
    assert!(g.parse("t", "200", small).is_ok());
    let err = g.parse("t", "300", small).unwrap_err();
    assert!(err.to_string().contains("number too large"));
}

// =============================================================================
// Value cleanup on failure paths
// =============================================================================

struct Guard(Rc<Cell<usize>>);

impl Drop for Guard {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_and_drops_partial_values_exactly_once() {
    let drops = Rc::new(Cell::new(0usize));
    let mut g = Grammar::new();

    let guarded = |g: &mut Grammar, b: u8| {
        let counter = drops.clone();
        let p = g.byte(b);
        g.apply(p, move |_| Box::new(Guard(counter.clone())) as Value)
    };
    let a = guarded(&mut g, b'a');
    let b = guarded(&mut g, b'b');
    let c = guarded(&mut g, b'c');
    let p = g.and(folds::discard, &[a, b, c]);

    // The third child fails: the two partial values drop, exactly once each.
    assert!(g.parse("t", "abX", p).is_err());
    assert_eq!(drops.get(), 2);

    drops.set(0);
    let v = g.parse("t", "abc", p).unwrap();
    drop(v);
    assert_eq!(drops.get(), 3);
}

// =============================================================================
// Recursion and the retention protocol
// =============================================================================

#[test]
fn test_recursive_definition_and_cleanup() {
    let mut g = Grammar::new();
    let e = g.declare("expr");
    let plus = g.byte(b'+');
    let digit = g.digit();
    let seq = g.and(folds::concat, &[e, plus, e]);
    let body = g.or(&[seq, digit]);
    g.define(e, body);

    let v = g.parse("input", "1+2+3", e).unwrap();
    assert!(v.is::<String>());

    g.cleanup(&[e, e]);
    assert!(g.is_empty());
    // A repeated cleanup of the same batch is a no-op.
    g.cleanup(&[e]);
    assert!(g.is_empty());
}

#[test]
fn test_mutual_recursion_through_refs() {
    // a : 'x' | '(' b ')' ;  b : a ;
    let mut g = Grammar::new();
    let a = g.declare("a");
    let b = g.declare("b");

    let x = g.byte(b'x');
    let open = g.byte(b'(');
    let close = g.byte(b')');
    let nested = g.and(folds::second, &[open, b, close]);
    let a_body = g.or(&[x, nested]);
    g.define(a, a_body);
    g.define(b, a);

    assert_eq!(value::string(g.parse("t", "((x))", a).unwrap()), "x");
    assert!(g.parse("t", "((x)", a).is_err());

    g.cleanup(&[a, b]);
    assert!(g.is_empty());
}

#[test]
#[should_panic(expected = "evaluated before define")]
fn test_evaluating_undefined_parser_panics() {
    let mut g = Grammar::new();
    let r = g.declare("rule");
    let _ = g.parse("t", "x", r);
}

#[test]
fn test_copy_is_independent() {
    let mut g = Grammar::new();
    let a = g.byte(b'a');
    let b = g.byte(b'b');
    let orig = g.and(folds::concat, &[a, b]);
    let dup = g.copy(orig);
    g.delete(orig);
    assert_eq!(value::string(g.parse("t", "ab", dup).unwrap()), "ab");
}

#[test]
fn test_optimise_preserves_acceptance() {
    let mut g = Grammar::new();
    let a = g.string("aa");
    let b = g.string("bb");
    let c = g.string("cc");
    let inner = g.or(&[a, b]);
    let outer = g.or(&[inner, c]);
    let opt = g.optimise(outer);
    for (text, ok) in [("aa", true), ("bb", true), ("cc", true), ("dd", false)] {
        assert_eq!(g.parse("t", text, opt).is_ok(), ok, "input {:?}", text);
    }
}

// =============================================================================
// Stream input
// =============================================================================

#[test]
fn test_parse_stream_with_backtracking() {
    let mut g = Grammar::new();
    let hw = g.string("hello world");
    let ht = g.string("hello there");
    let p = g.or(&[hw, ht]);
    let v = g.parse_stream("pipe", Cursor::new("hello there".as_bytes()), p);
    assert_eq!(value::string(v.unwrap()), "hello there");
}

#[test]
fn test_parse_stream_error_positions() {
    let mut g = Grammar::new();
    let p = g.string("ab\ncd");
    let err = g
        .parse_stream("pipe", Cursor::new("ab\ncx".as_bytes()), p)
        .unwrap_err();
    assert_eq!(err.loc.line, 2);
    assert_eq!(err.loc.col, 2);
}
