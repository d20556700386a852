//! Regular expression front-end.
//!
//! Compiles a pattern into a parser that matches a prefix of the input and
//! yields the matched text. The pattern itself is parsed by a meta-grammar
//! built from the engine's own combinators in a scratch [`Grammar`], and the
//! resulting shape is lowered into combinators in the target grammar - the
//! regex engine is the engine, applied to itself.
//!
//! Quantifiers are greedy and do not give matched input back: `a*` consumes
//! every `a` it can, even if a later part of the pattern then fails.

use common::Loc;

use crate::charset::ByteSet;
use crate::error::ParseError;
use crate::folds;
use crate::parser::{Grammar, ParserId, Value};
use crate::value;

/// `^` and `$` also match at line boundaries.
pub const MULTILINE: u32 = 1 << 0;
/// `.` also matches a newline.
pub const DOTALL: u32 = 1 << 1;

/// Parsed shape of a pattern, before lowering.
enum Piece {
    Lit(u8),
    Class(ByteSet),
    Dot,
    Bol,
    Eol,
    Seq(Vec<Piece>),
    Alt(Vec<Piece>),
    Rep(Box<Piece>, Rep),
}

#[derive(Clone, Copy)]
enum Rep {
    Opt,
    Star,
    Plus,
    Range(u32, Option<u32>),
}

impl Grammar {
    /// Compile `pattern` into a parser yielding the matched text.
    pub fn re(&mut self, pattern: &str) -> Result<ParserId, ParseError> {
        self.re_flags(pattern, 0)
    }

    /// Like [`Grammar::re`] with [`MULTILINE`] / [`DOTALL`] flags.
    pub fn re_flags(&mut self, pattern: &str, flags: u32) -> Result<ParserId, ParseError> {
        let mut meta = Grammar::new();
        let (top, regex) = syntax(&mut meta);
        let parsed = meta.parse("<regex>", pattern, top);
        meta.cleanup(&[regex]);
        let piece = value::take::<Piece>(parsed?);
        let id = self.lower(&piece, flags)?;
        // Anchors and empty patterns yield unit; normalize to text.
        Ok(self.apply(id, |v| {
            if v.is::<String>() {
                v
            } else {
                Box::new(String::new())
            }
        }))
    }

    // -------------------------------------------------------------------------
    // Lowering into combinators
    // -------------------------------------------------------------------------

    fn lower(&mut self, piece: &Piece, flags: u32) -> Result<ParserId, ParseError> {
        match piece {
            Piece::Lit(b) => Ok(self.byte(*b)),

            Piece::Class(set) => Ok(self.charset(*set)),

            Piece::Dot => {
                if flags & DOTALL != 0 {
                    Ok(self.any())
                } else {
                    Ok(self.charset_labelled(
                        ByteSet::from_bytes(b"\n").negate(),
                        "any character",
                    ))
                }
            }

            Piece::Bol => {
                if flags & MULTILINE != 0 {
                    let a = self.anchor(|last, _| last.is_none() || last == Some(b'\n'));
                    Ok(self.expect(a, "start of line"))
                } else {
                    Ok(self.soi())
                }
            }

            Piece::Eol => {
                if flags & MULTILINE != 0 {
                    let a = self.anchor(|_, next| next.is_none() || next == Some(b'\n'));
                    Ok(self.expect(a, "end of line"))
                } else {
                    Ok(self.eoi())
                }
            }

            Piece::Seq(items) => match items.len() {
                0 => Ok(self.lift_val(String::new())),
                1 => self.lower(&items[0], flags),
                _ => {
                    let mut kids = Vec::with_capacity(items.len());
                    for item in items {
                        kids.push(self.lower(item, flags)?);
                    }
                    Ok(self.and(folds::concat, &kids))
                }
            },

            Piece::Alt(alts) => {
                let mut kids = Vec::with_capacity(alts.len());
                for alt in alts {
                    kids.push(self.lower(alt, flags)?);
                }
                Ok(self.or(&kids))
            }

            Piece::Rep(inner, rep) => {
                let p = self.lower(inner, flags)?;
                match rep {
                    Rep::Opt => Ok(self.maybe_else(p, || Box::new(String::new()) as Value)),
                    Rep::Star => Ok(self.many(folds::concat, p)),
                    Rep::Plus => Ok(self.many1(folds::concat, p)),
                    Rep::Range(min, max) => self.lower_bounded(p, *min, *max),
                }
            }
        }
    }

    fn lower_bounded(
        &mut self,
        p: ParserId,
        min: u32,
        max: Option<u32>,
    ) -> Result<ParserId, ParseError> {
        if let Some(maxv) = max {
            if maxv < min {
                self.delete(p);
                return Err(ParseError::failure_at(
                    "<regex>",
                    Loc::default(),
                    &format!("bad repetition range {{{},{}}}", min, maxv),
                ));
            }
        }
        let mut children = Vec::new();
        match max {
            None => {
                let dup = self.copy(p);
                children.push(self.count(min as usize, folds::concat, p));
                children.push(self.many(folds::concat, dup));
            }
            Some(maxv) => {
                let mut dups = Vec::new();
                for _ in min..maxv {
                    dups.push(self.copy(p));
                }
                children.push(self.count(min as usize, folds::concat, p));
                for dup in dups {
                    children.push(self.maybe_else(dup, || Box::new(String::new()) as Value));
                }
            }
        }
        if children.len() == 1 {
            Ok(children[0])
        } else {
            Ok(self.and(folds::concat, &children))
        }
    }
}

// -----------------------------------------------------------------------------
// Pattern meta-grammar
// -----------------------------------------------------------------------------

/// Build the pattern parser in a scratch grammar. Returns the whole-pattern
/// parser and the retained `regex` rule for cleanup.
fn syntax(m: &mut Grammar) -> (ParserId, ParserId) {
    let regex = m.declare("regex");

    // base: ( regex )
    let lp = m.byte(b'(');
    let rp = m.byte(b')');
    let rp = m.expect(rp, "')'");
    let group = m.and(folds::second, &[lp, regex, rp]);

    let class = class_syntax(m);
    let esc = escape_syntax(m);

    let dot = m.byte(b'.');
    let dot = m.apply(dot, |_| Box::new(Piece::Dot) as Value);
    let caret = m.byte(b'^');
    let bol = m.apply(caret, |_| Box::new(Piece::Bol) as Value);
    let dollar = m.byte(b'$');
    let eol = m.apply(dollar, |_| Box::new(Piece::Eol) as Value);

    let plain = m.none_of(b"\\.^$|()[]*+?");
    let lit = m.apply(plain, |v| Box::new(Piece::Lit(value::first_byte(v))) as Value);

    let base = m.or(&[group, class, esc, dot, bol, eol, lit]);

    // factor: base with postfix quantifiers
    let quant = quantifier_syntax(m);
    let quants = m.many(rep_list, quant);
    let factor = m.and(apply_reps, &[base, quants]);

    // term: factor*
    let term = m.many(seq_pieces, factor);

    // regex: term ('|' regex)?
    let pipe = m.byte(b'|');
    let rhs = m.and(folds::second, &[pipe, regex]);
    let tail = m.maybe(rhs);
    let body = m.and(alt_pieces, &[term, tail]);
    m.define(regex, body);

    let end = m.eoi();
    let top = m.and(folds::first, &[regex, end]);
    (top, regex)
}

fn escape_syntax(m: &mut Grammar) -> ParserId {
    let bs = m.byte(b'\\');
    let any = m.any();
    let raw = m.and(folds::second, &[bs, any]);
    let checked = m.check(
        raw,
        |v| value::peek_char(v).is_some_and(|c| escape_piece(c as u8).is_some()),
        "invalid escape sequence",
    );
    m.apply(checked, |v| {
        let b = value::first_byte(v);
        let piece = match escape_piece(b) {
            Some(piece) => piece,
            None => Piece::Lit(b),
        };
        Box::new(piece) as Value
    })
}

fn quantifier_syntax(m: &mut Grammar) -> ParserId {
    let opt = m.byte(b'?');
    let opt = m.apply(opt, |_| Box::new(Rep::Opt) as Value);
    let star = m.byte(b'*');
    let star = m.apply(star, |_| Box::new(Rep::Star) as Value);
    let plus = m.byte(b'+');
    let plus = m.apply(plus, |_| Box::new(Rep::Plus) as Value);
    let bounded = bounded_syntax(m);
    m.or(&[opt, star, plus, bounded])
}

fn digits(m: &mut Grammar) -> ParserId {
    let d = m.digit();
    m.many1(folds::concat, d)
}

fn bounded_syntax(m: &mut Grammar) -> ParserId {
    let lb = m.byte(b'{');
    let min = digits(m);
    let comma = m.byte(b',');
    let max = digits(m);
    let max = m.maybe(max);
    let tail = m.and(tail_spec, &[comma, max]);
    let tail = m.maybe(tail);
    let rb = m.byte(b'}');
    m.and(bounded_rep, &[lb, min, tail, rb])
}

fn class_syntax(m: &mut Grammar) -> ParserId {
    let item = class_item_syntax(m);
    let items = m.many1(union_sets, item);
    let lb = m.byte(b'[');
    let neg = m.byte(b'^');
    let neg = m.maybe(neg);
    let rb = m.byte(b']');
    let rb = m.expect(rb, "']'");
    m.and(class_piece, &[lb, neg, items, rb])
}

fn class_item_syntax(m: &mut Grammar) -> ParserId {
    let lo = class_char_syntax(m);
    let dash = m.byte(b'-');
    let hi = class_char_syntax(m);
    let range = m.and(range_set, &[lo, dash, hi]);

    let esc = class_escape_syntax(m);

    let plain = m.none_of(b"]\\");
    let plain = m.apply(plain, |v| {
        Box::new(ByteSet::from_bytes(&[value::first_byte(v)])) as Value
    });

    m.or(&[range, esc, plain])
}

/// A single class byte usable as a range endpoint.
fn class_char_syntax(m: &mut Grammar) -> ParserId {
    let plain = m.none_of(b"]\\-");
    let plain = m.apply(plain, |v| Box::new(value::first_byte(v)) as Value);

    let bs = m.byte(b'\\');
    let any = m.any();
    let raw = m.and(folds::second, &[bs, any]);
    let checked = m.check(
        raw,
        |v| value::peek_char(v).is_some_and(|c| escape_byte(c as u8).is_some()),
        "invalid escape sequence",
    );
    let esc = m.apply(checked, |v| {
        let b = value::first_byte(v);
        let b = match escape_byte(b) {
            Some(b) => b,
            None => b,
        };
        Box::new(b) as Value
    });

    m.or(&[esc, plain])
}

fn class_escape_syntax(m: &mut Grammar) -> ParserId {
    let bs = m.byte(b'\\');
    let any = m.any();
    let raw = m.and(folds::second, &[bs, any]);
    let checked = m.check(
        raw,
        |v| {
            value::peek_char(v).is_some_and(|c| {
                let b = c as u8;
                escape_byte(b).is_some() || escape_set(b).is_some()
            })
        },
        "invalid escape sequence",
    );
    m.apply(checked, |v| {
        let b = value::first_byte(v);
        let set = match escape_set(b) {
            Some(set) => set,
            None => ByteSet::from_bytes(&[escape_byte(b).unwrap_or(b)]),
        };
        Box::new(set) as Value
    })
}

// -----------------------------------------------------------------------------
// Folds
// -----------------------------------------------------------------------------

fn rep_list(vals: Vec<Value>) -> Value {
    Box::new(
        vals.into_iter()
            .map(value::take::<Rep>)
            .collect::<Vec<Rep>>(),
    )
}

fn apply_reps(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let piece = value::take::<Piece>(it.next().expect("factor fold arity"));
    let reps = value::take::<Vec<Rep>>(it.next().expect("factor fold arity"));
    let mut out = piece;
    for rep in reps {
        out = Piece::Rep(Box::new(out), rep);
    }
    Box::new(out)
}

fn seq_pieces(vals: Vec<Value>) -> Value {
    Box::new(Piece::Seq(
        vals.into_iter().map(value::take::<Piece>).collect(),
    ))
}

fn alt_pieces(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let first = value::take::<Piece>(it.next().expect("alternation fold arity"));
    let tail = it.next().expect("alternation fold arity");
    if value::is_unit(&tail) {
        Box::new(first)
    } else {
        Box::new(Piece::Alt(vec![first, value::take::<Piece>(tail)]))
    }
}

fn tail_spec(mut vals: Vec<Value>) -> Value {
    // [",", digits?] -> the upper bound, None for "{m,}"
    let max = match vals.pop() {
        Some(v) => v,
        None => return value::unit(),
    };
    if value::is_unit(&max) {
        Box::new(None::<u32>)
    } else {
        Box::new(value::string(max).parse::<u32>().ok())
    }
}

fn bounded_rep(vals: Vec<Value>) -> Value {
    // ["{", digits, tail?, "}"]
    let mut it = vals.into_iter();
    let _lb = it.next();
    let min = it
        .next()
        .map(value::string)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    let max = match it.next() {
        Some(tail) if !value::is_unit(&tail) => value::take::<Option<u32>>(tail),
        _ => Some(min),
    };
    Box::new(Rep::Range(min, max))
}

fn range_set(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let lo = value::take::<u8>(it.next().expect("range fold arity"));
    let _dash = it.next();
    let hi = value::take::<u8>(it.next().expect("range fold arity"));
    Box::new(ByteSet::from_range(lo, hi))
}

fn union_sets(vals: Vec<Value>) -> Value {
    let mut set = ByteSet::empty();
    for v in vals {
        set = set.union(value::take::<ByteSet>(v));
    }
    Box::new(set)
}

fn class_piece(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let _lb = it.next();
    let neg = it.next().expect("class fold arity");
    let set = value::take::<ByteSet>(it.next().expect("class fold arity"));
    let set = if value::is_unit(&neg) { set } else { set.negate() };
    Box::new(Piece::Class(set))
}

// -----------------------------------------------------------------------------
// Escape tables
// -----------------------------------------------------------------------------

fn escape_byte(b: u8) -> Option<u8> {
    match b {
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'\\' | b'.' | b'*' | b'+' | b'?' | b'|' | b'(' | b')' | b'[' | b']' | b'^' | b'$' => {
            Some(b)
        }
        _ => None,
    }
}

fn escape_set(b: u8) -> Option<ByteSet> {
    let space = || ByteSet::from_bytes(b" \t\r\n\x0b\x0c");
    let digit = || ByteSet::from_range(b'0', b'9');
    let word = || {
        ByteSet::from_range(b'a', b'z')
            .union(ByteSet::from_range(b'A', b'Z'))
            .union(ByteSet::from_range(b'0', b'9'))
            .union(ByteSet::from_bytes(b"_"))
    };
    match b {
        b's' => Some(space()),
        b'S' => Some(space().negate()),
        b'd' => Some(digit()),
        b'D' => Some(digit().negate()),
        b'w' => Some(word()),
        b'W' => Some(word().negate()),
        _ => None,
    }
}

fn escape_piece(b: u8) -> Option<Piece> {
    if let Some(set) = escape_set(b) {
        return Some(Piece::Class(set));
    }
    escape_byte(b).map(Piece::Lit)
}
