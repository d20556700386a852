//! Evaluation of parser values against an input.
//!
//! Evaluation is a flat dispatch on the parser's definition tag. Every
//! backtracking construct takes a mark before speculative work and either
//! commits or rewinds it, so a failed branch leaves the input exactly as it
//! found it - except under predictive evaluation, where a consuming failure
//! stays where it failed and carries a cut flag that stops enclosing
//! alternation and repetition from retrying.

use std::io::Read;

use common::{log, log_detail};

use crate::error::ParseError;
use crate::input::Input;
use crate::parser::{Def, Grammar, ParserId, Value};
use crate::value;

/// Parser entries that consume nothing are limited to this depth; past it
/// the entry fails with an ordinary parse error instead of overflowing the
/// stack. Consuming input resets the count, so this only bites grammars
/// that recurse without progressing - left-recursive definitions terminate
/// with a parse instead of looping.
const MAX_RECURSION_DEPTH: usize = 128;

/// Parser entries since the cursor last moved.
#[derive(Clone, Copy)]
struct Depth {
    count: usize,
    pos: usize,
}

impl Grammar {
    /// Run parser `p` against an in-memory string.
    pub fn parse(&self, name: &str, text: &str, p: ParserId) -> Result<Value, ParseError> {
        let mut input = Input::string(name, text);
        self.parse_at(&mut input, p)
    }

    /// Run parser `p` against a forward-only byte stream.
    pub fn parse_stream(
        &self,
        name: &str,
        reader: impl Read,
        p: ParserId,
    ) -> Result<Value, ParseError> {
        let mut input = Input::stream(name, reader);
        self.parse_at(&mut input, p)
    }

    /// Run parser `p` against an existing input, leaving the cursor after
    /// whatever `p` consumed.
    pub fn parse_at(&self, input: &mut Input<'_>, p: ParserId) -> Result<Value, ParseError> {
        let depth = Depth {
            count: 0,
            pos: input.pos(),
        };
        self.run(p, input, depth)
    }

    fn run(&self, p: ParserId, i: &mut Input<'_>, depth: Depth) -> Result<Value, ParseError> {
        let depth = if i.pos() > depth.pos {
            Depth {
                count: 0,
                pos: i.pos(),
            }
        } else {
            Depth {
                count: depth.count + 1,
                pos: depth.pos,
            }
        };
        if depth.count >= MAX_RECURSION_DEPTH {
            return Err(ParseError::failure(i, "maximum recursion depth exceeded"));
        }
        let node = self.node(p);
        if let Some(name) = &node.name {
            log!(self.log, "parse {} at {}", name, i.loc());
            self.log.push_indent();
            let result = self.eval(&node.def, p, i, depth);
            self.log.pop_indent();
            match &result {
                Ok(_) => log_detail!(self.log, "matched {}", name),
                Err(e) => log_detail!(self.log, "failed {}: {}", name, e),
            }
            result
        } else {
            self.eval(&node.def, p, i, depth)
        }
    }

    fn eval(
        &self,
        def: &Def,
        p: ParserId,
        i: &mut Input<'_>,
        depth: Depth,
    ) -> Result<Value, ParseError> {
        match def {
            Def::Undefined => match &self.node(p).name {
                Some(name) => panic!("parser '{}' evaluated before define", name),
                None => panic!("parser {:?} evaluated before define", p),
            },

            Def::Pass => Ok(value::unit()),

            Def::Fail(msg) => Err(ParseError::failure(i, msg)),

            Def::Lift(f) => Ok(f()),

            Def::Loc => Ok(Box::new(i.loc())),

            // -----------------------------------------------------------------
            // Single-byte matchers
            // -----------------------------------------------------------------
            Def::Any => match i.peek() {
                Some(b) => {
                    i.next();
                    Ok(single(b))
                }
                None => Err(ParseError::expected(i, "any character")),
            },

            Def::Byte(want) => match i.peek() {
                Some(b) if b == *want => {
                    i.next();
                    Ok(single(b))
                }
                _ => Err(ParseError::expected(
                    i,
                    &format!("'{}'", (*want as char).escape_default()),
                )),
            },

            Def::Range(lo, hi) => match i.peek() {
                Some(b) if *lo <= b && b <= *hi => {
                    i.next();
                    Ok(single(b))
                }
                _ => Err(ParseError::expected(
                    i,
                    &format!(
                        "character between '{}' and '{}'",
                        (*lo as char).escape_default(),
                        (*hi as char).escape_default()
                    ),
                )),
            },

            Def::Set { set, label } => match i.peek() {
                Some(b) if set.contains(b) => {
                    i.next();
                    Ok(single(b))
                }
                _ => Err(ParseError::expected(i, label)),
            },

            Def::Satisfy(pred) => match i.peek() {
                Some(b) if pred(b) => {
                    i.next();
                    Ok(single(b))
                }
                _ => Err(ParseError::expected(i, "character")),
            },

            Def::Literal(bytes) => {
                let cp = i.mark();
                for &want in bytes {
                    match i.peek() {
                        Some(b) if b == want => {
                            i.next();
                        }
                        _ => {
                            let err = ParseError::expected(
                                i,
                                &format!("\"{}\"", bytes.escape_ascii()),
                            );
                            i.rewind(&cp);
                            return Err(err);
                        }
                    }
                }
                i.commit(&cp);
                Ok(Box::new(value::text(bytes)))
            }

            Def::Anchor(pred) => {
                let last = i.last();
                let next = i.peek();
                if pred(last, next) {
                    Ok(value::unit())
                } else {
                    Err(ParseError::expected(i, "anchor"))
                }
            }

            // -----------------------------------------------------------------
            // Wrappers
            // -----------------------------------------------------------------
            Def::Expect { inner, label } => {
                self.run(*inner, i, depth).map_err(|e| e.relabel(label))
            }

            Def::Apply { inner, f } => self.run(*inner, i, depth).map(|v| f(v)),

            Def::Check { inner, pred, msg } => {
                let v = self.run(*inner, i, depth)?;
                if pred(&v) {
                    Ok(v)
                } else {
                    Err(ParseError::failure(i, msg))
                }
            }

            Def::Predict(inner) => {
                let entry = i.pos();
                i.suspend_backtracking();
                let result = self.run(*inner, i, depth);
                i.resume_backtracking();
                result.map_err(|mut e| {
                    if i.pos() > entry {
                        e.cut = true;
                    }
                    e
                })
            }

            Def::Not { inner, default } => {
                let cp = i.mark();
                match self.run(*inner, i, depth) {
                    Ok(_) => {
                        i.rewind(&cp);
                        Err(ParseError::unexpected(i))
                    }
                    Err(_) => {
                        i.rewind(&cp);
                        Ok(default())
                    }
                }
            }

            Def::Maybe { inner, default } => {
                let cp = i.mark();
                match self.run(*inner, i, depth) {
                    Ok(v) => {
                        i.commit(&cp);
                        Ok(v)
                    }
                    Err(e) => {
                        let consumed = i.pos() > cp.pos();
                        if e.cut {
                            i.commit(&cp);
                            return Err(e);
                        }
                        i.rewind(&cp);
                        if consumed {
                            Err(e)
                        } else {
                            Ok(default())
                        }
                    }
                }
            }

            // -----------------------------------------------------------------
            // Repetition
            // -----------------------------------------------------------------
            Def::Many {
                inner,
                fold,
                at_least_one,
            } => {
                let mut vals = Vec::new();
                let mut last_err = None;
                loop {
                    let cp = i.mark();
                    match self.run(*inner, i, depth) {
                        Ok(v) => {
                            if i.pos() == cp.pos() {
                                // Zero-consumption success: stop rather than loop.
                                drop(v);
                                i.commit(&cp);
                                break;
                            }
                            vals.push(v);
                            i.commit(&cp);
                        }
                        Err(e) => {
                            let consumed = i.pos() > cp.pos();
                            if e.cut {
                                i.commit(&cp);
                                return Err(e);
                            }
                            i.rewind(&cp);
                            if consumed && !i.backtracking() {
                                return Err(e);
                            }
                            last_err = Some(e);
                            break;
                        }
                    }
                }
                if *at_least_one && vals.is_empty() {
                    return Err(match last_err {
                        Some(e) => e,
                        None => ParseError::failure(i, "expected at least one repetition"),
                    });
                }
                Ok(fold(vals))
            }

            Def::Count { n, inner, fold } => {
                let cp = i.mark();
                let mut vals = Vec::with_capacity(*n);
                for _ in 0..*n {
                    match self.run(*inner, i, depth) {
                        Ok(v) => vals.push(v),
                        Err(e) => {
                            if e.cut {
                                i.commit(&cp);
                            } else {
                                i.rewind(&cp);
                            }
                            return Err(e);
                        }
                    }
                }
                i.commit(&cp);
                Ok(fold(vals))
            }

            // -----------------------------------------------------------------
            // Alternation and sequencing
            // -----------------------------------------------------------------
            Def::Or(alts) => {
                let mut acc: Option<ParseError> = None;
                for &alt in alts {
                    let cp = i.mark();
                    match self.run(alt, i, depth) {
                        Ok(v) => {
                            i.commit(&cp);
                            return Ok(v);
                        }
                        Err(e) => {
                            let consumed = i.pos() > cp.pos();
                            if e.cut {
                                i.commit(&cp);
                                return Err(merge_into(acc, e));
                            }
                            i.rewind(&cp);
                            if consumed && !i.backtracking() {
                                return Err(merge_into(acc, e));
                            }
                            acc = Some(merge_into(acc, e));
                        }
                    }
                }
                Err(acc.expect("or has at least one alternative"))
            }

            Def::And { children, fold } => {
                let cp = i.mark();
                let mut vals = Vec::with_capacity(children.len());
                for &child in children {
                    match self.run(child, i, depth) {
                        Ok(v) => vals.push(v),
                        Err(e) => {
                            // Partial values drop here, exactly once each.
                            if e.cut {
                                i.commit(&cp);
                            } else {
                                i.rewind(&cp);
                            }
                            return Err(e);
                        }
                    }
                }
                i.commit(&cp);
                Ok(fold(vals))
            }

            Def::Forward(body) => self.run(*body, i, depth),
        }
    }
}

fn merge_into(acc: Option<ParseError>, e: ParseError) -> ParseError {
    match acc {
        Some(prev) => prev.merge(e),
        None => e,
    }
}

#[inline]
fn single(b: u8) -> Value {
    Box::new((b as char).to_string())
}
