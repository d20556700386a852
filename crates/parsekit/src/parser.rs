//! Parser values: construction, ownership, and the retention protocol.
//!
//! A [`Grammar`] is an arena of parser nodes addressed by [`ParserId`].
//! Constructors allocate nodes; combinator constructors take their operands
//! by transfer of ownership, so deleting a combinator deletes its operands
//! unless they are retained. Retained parsers are created with
//! [`Grammar::declare`], given a body with [`Grammar::define`], and torn
//! down with [`Grammar::undefine`] / [`Grammar::delete`] or the batched
//! [`Grammar::cleanup`] - the only way to express recursion, and the only
//! nodes that may be referenced from more than one place.
//!
//! Misuse (evaluating an undefined parser, defining twice, using a deleted
//! id, handing `cleanup` an unretained parser) is a programming error and
//! aborts with a report.

use std::any::Any;
use std::rc::Rc;

use common::{create_logger, Logger};
use hashbrown::HashSet;

use crate::charset::ByteSet;
use crate::value;

/// An opaque parser output value.
pub type Value = Box<dyn Any>;

/// Combines the ordered child values of a sequence or repetition into one.
pub type Fold = Rc<dyn Fn(Vec<Value>) -> Value>;

pub(crate) type Transform = Rc<dyn Fn(Value) -> Value>;
pub(crate) type CheckPred = Rc<dyn Fn(&Value) -> bool>;
pub(crate) type BytePred = Rc<dyn Fn(u8) -> bool>;
pub(crate) type AnchorPred = Rc<dyn Fn(Option<u8>, Option<u8>) -> bool>;
pub(crate) type Lift = Rc<dyn Fn() -> Value>;

/// Handle to a parser node inside a [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParserId(pub(crate) u32);

/// Tagged parser definition; evaluation dispatches on this.
#[derive(Clone)]
pub(crate) enum Def {
    Undefined,
    Pass,
    Fail(String),
    Lift(Lift),
    Loc,
    Any,
    Byte(u8),
    Range(u8, u8),
    Set { set: ByteSet, label: String },
    Satisfy(BytePred),
    Literal(Vec<u8>),
    Anchor(AnchorPred),
    Expect { inner: ParserId, label: String },
    Apply { inner: ParserId, f: Transform },
    Check { inner: ParserId, pred: CheckPred, msg: String },
    Predict(ParserId),
    Not { inner: ParserId, default: Lift },
    Maybe { inner: ParserId, default: Lift },
    Many { inner: ParserId, fold: Fold, at_least_one: bool },
    Count { n: usize, inner: ParserId, fold: Fold },
    Or(Vec<ParserId>),
    And { children: Vec<ParserId>, fold: Fold },
    Forward(ParserId),
}

impl Def {
    /// Ids of the child parsers this definition references.
    fn children(&self) -> Vec<ParserId> {
        match self {
            Def::Expect { inner, .. }
            | Def::Apply { inner, .. }
            | Def::Check { inner, .. }
            | Def::Predict(inner)
            | Def::Not { inner, .. }
            | Def::Maybe { inner, .. }
            | Def::Many { inner, .. }
            | Def::Count { inner, .. }
            | Def::Forward(inner) => vec![*inner],
            Def::Or(alts) => alts.clone(),
            Def::And { children, .. } => children.clone(),
            _ => Vec::new(),
        }
    }

    fn map_children(self, f: &mut impl FnMut(ParserId) -> ParserId) -> Def {
        match self {
            Def::Expect { inner, label } => Def::Expect { inner: f(inner), label },
            Def::Apply { inner, f: tf } => Def::Apply { inner: f(inner), f: tf },
            Def::Check { inner, pred, msg } => Def::Check { inner: f(inner), pred, msg },
            Def::Predict(inner) => Def::Predict(f(inner)),
            Def::Not { inner, default } => Def::Not { inner: f(inner), default },
            Def::Maybe { inner, default } => Def::Maybe { inner: f(inner), default },
            Def::Many { inner, fold, at_least_one } => Def::Many {
                inner: f(inner),
                fold,
                at_least_one,
            },
            Def::Count { n, inner, fold } => Def::Count { n, inner: f(inner), fold },
            Def::Forward(inner) => Def::Forward(f(inner)),
            Def::Or(alts) => Def::Or(alts.into_iter().map(f).collect()),
            Def::And { children, fold } => Def::And {
                children: children.into_iter().map(f).collect(),
                fold,
            },
            other => other,
        }
    }
}

pub(crate) struct ParserNode {
    pub(crate) def: Def,
    pub(crate) name: Option<String>,
    pub(crate) retained: bool,
}

/// Arena of parser nodes plus the construction and lifecycle API.
pub struct Grammar {
    slots: Vec<Option<ParserNode>>,
    free: Vec<u32>,
    pub(crate) log: Logger,
}

impl Grammar {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            log: create_logger("parse"),
        }
    }

    /// Number of live parser nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Slot management
    // -------------------------------------------------------------------------

    fn alloc(&mut self, def: Def) -> ParserId {
        self.alloc_node(ParserNode {
            def,
            name: None,
            retained: false,
        })
    }

    fn alloc_node(&mut self, node: ParserNode) -> ParserId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(node);
                ParserId(idx)
            }
            None => {
                self.slots.push(Some(node));
                ParserId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn release(&mut self, id: ParserId) {
        self.slots[id.0 as usize] = None;
        self.free.push(id.0);
    }

    fn slot(&self, p: ParserId) -> Option<&ParserNode> {
        self.slots.get(p.0 as usize).and_then(|s| s.as_ref())
    }

    pub(crate) fn node(&self, p: ParserId) -> &ParserNode {
        match self.slot(p) {
            Some(node) => node,
            None => panic!("use of deleted parser {:?}", p),
        }
    }

    fn node_mut(&mut self, p: ParserId) -> &mut ParserNode {
        match self.slots.get_mut(p.0 as usize).and_then(|s| s.as_mut()) {
            Some(node) => node,
            None => panic!("use of deleted parser {:?}", p),
        }
    }

    fn describe(&self, p: ParserId) -> String {
        match self.node(p).name.as_deref() {
            Some(name) => format!("'{}'", name),
            None => format!("{:?}", p),
        }
    }

    // -------------------------------------------------------------------------
    // Atoms
    // -------------------------------------------------------------------------

    /// Always succeeds without consuming input, yielding unit.
    pub fn pass(&mut self) -> ParserId {
        self.alloc(Def::Pass)
    }

    /// Always fails with `msg`.
    pub fn fail(&mut self, msg: &str) -> ParserId {
        self.alloc(Def::Fail(msg.to_string()))
    }

    /// Succeeds without consuming input, yielding `f()`.
    pub fn lift(&mut self, f: impl Fn() -> Value + 'static) -> ParserId {
        self.alloc(Def::Lift(Rc::new(f)))
    }

    /// Succeeds without consuming input, yielding a clone of `v`.
    pub fn lift_val<T: Clone + 'static>(&mut self, v: T) -> ParserId {
        self.lift(move || Box::new(v.clone()) as Value)
    }

    /// Succeeds without consuming input, yielding the current input
    /// position as a [`common::Loc`] value.
    pub fn loc(&mut self) -> ParserId {
        self.alloc(Def::Loc)
    }

    /// Any single byte.
    pub fn any(&mut self) -> ParserId {
        self.alloc(Def::Any)
    }

    /// The literal byte `b`.
    pub fn byte(&mut self, b: u8) -> ParserId {
        self.alloc(Def::Byte(b))
    }

    /// Any byte in the inclusive range `lo..=hi`.
    pub fn range(&mut self, lo: u8, hi: u8) -> ParserId {
        self.alloc(Def::Range(lo, hi))
    }

    /// Any byte contained in `set`.
    pub fn one_of(&mut self, set: impl AsRef<[u8]>) -> ParserId {
        let bytes = set.as_ref();
        let label = format!("one of \"{}\"", bytes.escape_ascii());
        self.alloc(Def::Set {
            set: ByteSet::from_bytes(bytes),
            label,
        })
    }

    /// Any byte not contained in `set`.
    pub fn none_of(&mut self, set: impl AsRef<[u8]>) -> ParserId {
        let bytes = set.as_ref();
        let label = format!("none of \"{}\"", bytes.escape_ascii());
        self.alloc(Def::Set {
            set: ByteSet::from_bytes(bytes).negate(),
            label,
        })
    }

    /// Any byte in an arbitrary [`ByteSet`].
    pub fn charset(&mut self, set: ByteSet) -> ParserId {
        self.alloc(Def::Set {
            set,
            label: "character".to_string(),
        })
    }

    pub(crate) fn charset_labelled(&mut self, set: ByteSet, label: &str) -> ParserId {
        self.alloc(Def::Set {
            set,
            label: label.to_string(),
        })
    }

    /// Any byte for which `pred` returns true.
    pub fn satisfy(&mut self, pred: impl Fn(u8) -> bool + 'static) -> ParserId {
        self.alloc(Def::Satisfy(Rc::new(pred)))
    }

    /// The literal byte string `s`.
    pub fn string(&mut self, s: impl AsRef<[u8]>) -> ParserId {
        self.alloc(Def::Literal(s.as_ref().to_vec()))
    }

    /// Zero-width check on the pair (last consumed byte, next byte). Either
    /// side is `None` at the corresponding end of the input.
    pub fn anchor(&mut self, pred: impl Fn(Option<u8>, Option<u8>) -> bool + 'static) -> ParserId {
        self.alloc(Def::Anchor(Rc::new(pred)))
    }

    /// Start of input.
    pub fn soi(&mut self) -> ParserId {
        let a = self.anchor(|last, _| last.is_none());
        self.expect(a, "start of input")
    }

    /// End of input.
    pub fn eoi(&mut self) -> ParserId {
        let a = self.anchor(|_, next| next.is_none());
        self.expect(a, "end of input")
    }

    /// An ASCII digit.
    pub fn digit(&mut self) -> ParserId {
        self.charset_labelled(ByteSet::from_range(b'0', b'9'), "digit")
    }

    /// A word byte: letter, digit, or underscore.
    pub fn word(&mut self) -> ParserId {
        let set = ByteSet::from_range(b'a', b'z')
            .union(ByteSet::from_range(b'A', b'Z'))
            .union(ByteSet::from_range(b'0', b'9'))
            .union(ByteSet::from_bytes(b"_"));
        self.charset_labelled(set, "word character")
    }

    /// An ASCII whitespace byte.
    pub fn whitespace(&mut self) -> ParserId {
        self.charset_labelled(ByteSet::from_bytes(b" \t\r\n\x0b\x0c"), "whitespace")
    }

    // -------------------------------------------------------------------------
    // Combinators
    // -------------------------------------------------------------------------

    /// On failure of `p`, replace its expectation set with `label`.
    pub fn expect(&mut self, p: ParserId, label: &str) -> ParserId {
        self.alloc(Def::Expect {
            inner: p,
            label: label.to_string(),
        })
    }

    /// Transform the value of `p` with `f`.
    pub fn apply(&mut self, p: ParserId, f: impl Fn(Value) -> Value + 'static) -> ParserId {
        self.alloc(Def::Apply {
            inner: p,
            f: Rc::new(f),
        })
    }

    /// Validate the value of `p`; a failed check becomes a parse failure
    /// with `msg` at the post-`p` position.
    pub fn check(
        &mut self,
        p: ParserId,
        pred: impl Fn(&Value) -> bool + 'static,
        msg: &str,
    ) -> ParserId {
        self.alloc(Def::Check {
            inner: p,
            pred: Rc::new(pred),
            msg: msg.to_string(),
        })
    }

    /// Succeeds (with unit) iff `p` fails; consumes nothing either way.
    pub fn not(&mut self, p: ParserId) -> ParserId {
        self.alloc(Def::Not {
            inner: p,
            default: Rc::new(value::unit),
        })
    }

    /// Like [`Grammar::not`], yielding `default()` on success.
    pub fn not_else(&mut self, p: ParserId, default: impl Fn() -> Value + 'static) -> ParserId {
        self.alloc(Def::Not {
            inner: p,
            default: Rc::new(default),
        })
    }

    /// Optional `p`, yielding unit when `p` fails without consuming input.
    /// A failure that consumed input still fails.
    pub fn maybe(&mut self, p: ParserId) -> ParserId {
        self.alloc(Def::Maybe {
            inner: p,
            default: Rc::new(value::unit),
        })
    }

    /// Like [`Grammar::maybe`], yielding `default()` when `p` fails.
    pub fn maybe_else(&mut self, p: ParserId, default: impl Fn() -> Value + 'static) -> ParserId {
        self.alloc(Def::Maybe {
            inner: p,
            default: Rc::new(default),
        })
    }

    /// Zero or more repetitions of `p`, combined with `fold`.
    ///
    /// The loop stops at the first repetition that fails without consuming
    /// input, and also when a repetition succeeds consuming nothing (the
    /// value of such a repetition is discarded) - this is what guarantees
    /// termination for inner parsers that can succeed on empty input.
    pub fn many(&mut self, fold: impl Fn(Vec<Value>) -> Value + 'static, p: ParserId) -> ParserId {
        self.alloc(Def::Many {
            inner: p,
            fold: Rc::new(fold),
            at_least_one: false,
        })
    }

    /// One or more repetitions of `p`, combined with `fold`.
    pub fn many1(&mut self, fold: impl Fn(Vec<Value>) -> Value + 'static, p: ParserId) -> ParserId {
        self.alloc(Def::Many {
            inner: p,
            fold: Rc::new(fold),
            at_least_one: true,
        })
    }

    /// Exactly `n` repetitions of `p`, combined with `fold`. Fewer is a
    /// failure; partial values are dropped and the input restored.
    pub fn count(
        &mut self,
        n: usize,
        fold: impl Fn(Vec<Value>) -> Value + 'static,
        p: ParserId,
    ) -> ParserId {
        self.alloc(Def::Count {
            n,
            inner: p,
            fold: Rc::new(fold),
        })
    }

    /// Ordered choice over `alts`.
    pub fn or(&mut self, alts: &[ParserId]) -> ParserId {
        if alts.is_empty() {
            panic!("or requires at least one alternative");
        }
        self.alloc(Def::Or(alts.to_vec()))
    }

    /// Sequence of `children`, combining their values with `fold`.
    pub fn and(
        &mut self,
        fold: impl Fn(Vec<Value>) -> Value + 'static,
        children: &[ParserId],
    ) -> ParserId {
        if children.is_empty() {
            panic!("and requires at least one child");
        }
        self.alloc(Def::And {
            children: children.to_vec(),
            fold: Rc::new(fold),
        })
    }

    /// Evaluate `p` with backtracking disabled: a failure after consuming
    /// input is not rewound and propagates past enclosing alternation.
    pub fn predictive(&mut self, p: ParserId) -> ParserId {
        self.alloc(Def::Predict(p))
    }

    // -------------------------------------------------------------------------
    // Named parsers and lifecycle
    // -------------------------------------------------------------------------

    /// Declare a named, retained parser with no body yet. Use it anywhere by
    /// reference, then supply the body with [`Grammar::define`].
    pub fn declare(&mut self, name: &str) -> ParserId {
        self.alloc_node(ParserNode {
            def: Def::Undefined,
            name: Some(name.to_string()),
            retained: true,
        })
    }

    /// Bind the body of a declared parser. Single assignment: defining a
    /// parser twice is a programming error.
    ///
    /// An unretained body is moved into the declared slot; a retained body
    /// is referenced without taking ownership.
    pub fn define(&mut self, r: ParserId, body: ParserId) {
        {
            let node = self.node(r);
            if !node.retained {
                panic!("define target {} is not a declared parser", self.describe(r));
            }
            if !matches!(node.def, Def::Undefined) {
                panic!("parser {} defined twice", self.describe(r));
            }
        }
        if self.node(body).retained {
            self.node_mut(r).def = Def::Forward(body);
        } else {
            let def = std::mem::replace(&mut self.node_mut(body).def, Def::Undefined);
            self.node_mut(r).def = def;
            self.release(body);
        }
    }

    /// Remove and destroy the body of a declared parser, leaving it
    /// undefined. Retained parsers referenced from the body are left alone,
    /// which is what breaks ownership cycles before deletion.
    pub fn undefine(&mut self, r: ParserId) {
        if !self.node(r).retained {
            panic!("undefine on unretained parser {}", self.describe(r));
        }
        let def = std::mem::replace(&mut self.node_mut(r).def, Def::Undefined);
        match def {
            Def::Undefined | Def::Forward(_) => {}
            owned => {
                let mut visited = HashSet::new();
                for child in owned.children() {
                    self.delete_owned(child, &mut visited);
                }
            }
        }
    }

    /// Destroy a parser.
    ///
    /// For an unretained parser this destroys the whole owned subtree,
    /// skipping retained nodes it references. For a retained parser this
    /// undefines it first, then frees the shell.
    pub fn delete(&mut self, p: ParserId) {
        if self.node(p).retained {
            self.undefine(p);
            self.release(p);
        } else {
            let mut visited = HashSet::new();
            self.delete_owned(p, &mut visited);
        }
    }

    fn delete_owned(&mut self, p: ParserId, visited: &mut HashSet<u32>) {
        if !visited.insert(p.0) {
            return;
        }
        match self.slot(p) {
            Some(node) if node.retained => return,
            Some(_) => {}
            None => panic!("delete of already-deleted parser {:?}", p),
        }
        let node = self.slots[p.0 as usize].take().unwrap();
        self.free.push(p.0);
        for child in node.def.children() {
            self.delete_owned(child, visited);
        }
    }

    /// Undefine, then delete, every parser in the batch. Duplicate ids and
    /// already-deleted slots within the batch are skipped; an unretained id
    /// is a programming error.
    pub fn cleanup(&mut self, ps: &[ParserId]) {
        let mut seen = HashSet::new();
        let batch: Vec<ParserId> = ps.iter().copied().filter(|p| seen.insert(p.0)).collect();
        for &p in &batch {
            match self.slot(p) {
                None => continue,
                Some(node) if !node.retained => {
                    panic!("cleanup of unretained parser {:?}", p)
                }
                Some(_) => self.undefine(p),
            }
        }
        for &p in &batch {
            if self.slot(p).is_some() {
                self.release(p);
            }
        }
    }

    /// Structural deep copy. Unretained nodes are cloned; retained nodes
    /// are shared by reference, so copies of recursive parsers keep
    /// pointing at the same named rules.
    pub fn copy(&mut self, p: ParserId) -> ParserId {
        if self.node(p).retained {
            return p;
        }
        let def = self.node(p).def.clone();
        let def = def.map_children(&mut |c| self.copy(c));
        self.alloc(def)
    }

    // -------------------------------------------------------------------------
    // Optimisation
    // -------------------------------------------------------------------------

    /// Simplify the parser tree: single-alternative `or`s collapse to the
    /// alternative, unretained anonymous `or`s nested directly inside an
    /// `or` are spliced into it, and `expect`-of-`expect` keeps the outer
    /// label. Accepts exactly the same inputs with the same outputs, and is
    /// idempotent.
    pub fn optimise(&mut self, p: ParserId) -> ParserId {
        let mut visited = HashSet::new();
        self.optimise_rec(p, &mut visited)
    }

    fn optimise_rec(&mut self, p: ParserId, visited: &mut HashSet<u32>) -> ParserId {
        if !visited.insert(p.0) {
            return p;
        }
        let def = std::mem::replace(&mut self.node_mut(p).def, Def::Undefined);
        let def = def.map_children(&mut |c| self.optimise_rec(c, visited));
        let def = match def {
            Def::Or(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for a in alts {
                    let splice = {
                        let n = self.node(a);
                        !n.retained && n.name.is_none() && matches!(n.def, Def::Or(_))
                    };
                    if splice {
                        match std::mem::replace(&mut self.node_mut(a).def, Def::Undefined) {
                            Def::Or(inner) => out.extend(inner),
                            _ => unreachable!(),
                        }
                        self.release(a);
                    } else {
                        out.push(a);
                    }
                }
                Def::Or(out)
            }
            Def::Expect { inner, label } => {
                let collapse = {
                    let n = self.node(inner);
                    !n.retained && n.name.is_none() && matches!(n.def, Def::Expect { .. })
                };
                if collapse {
                    match std::mem::replace(&mut self.node_mut(inner).def, Def::Undefined) {
                        Def::Expect { inner: body, .. } => {
                            self.release(inner);
                            Def::Expect { inner: body, label }
                        }
                        _ => unreachable!(),
                    }
                } else {
                    Def::Expect { inner, label }
                }
            }
            other => other,
        };
        self.node_mut(p).def = def;

        if !self.node(p).retained {
            if let Def::Or(alts) = &self.node(p).def {
                if alts.len() == 1 {
                    let only = alts[0];
                    self.release(p);
                    return only;
                }
            }
        }
        p
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_moves_unretained_body() {
        let mut g = Grammar::new();
        let r = g.declare("r");
        let body = g.byte(b'x');
        let before = g.len();
        g.define(r, body);
        // The body shell was folded into the declared slot.
        assert_eq!(g.len(), before - 1);
        assert!(matches!(g.node(r).def, Def::Byte(b'x')));
    }

    #[test]
    fn test_define_references_retained_body() {
        let mut g = Grammar::new();
        let r = g.declare("r");
        let s = g.declare("s");
        g.define(r, s);
        assert!(matches!(g.node(r).def, Def::Forward(id) if id == s));
    }

    #[test]
    #[should_panic(expected = "defined twice")]
    fn test_double_define_panics() {
        let mut g = Grammar::new();
        let r = g.declare("r");
        let a = g.byte(b'a');
        let b = g.byte(b'b');
        g.define(r, a);
        g.define(r, b);
    }

    #[test]
    fn test_delete_frees_whole_subtree() {
        let mut g = Grammar::new();
        let a = g.byte(b'a');
        let b = g.byte(b'b');
        let seq = g.and(crate::folds::concat, &[a, b]);
        assert_eq!(g.len(), 3);
        g.delete(seq);
        assert!(g.is_empty());
    }

    #[test]
    fn test_delete_skips_retained_children() {
        let mut g = Grammar::new();
        let r = g.declare("r");
        let a = g.byte(b'a');
        let seq = g.and(crate::folds::concat, &[a, r]);
        g.delete(seq);
        // The retained reference survives cascaded deletion.
        assert_eq!(g.len(), 1);
        g.delete(r);
        assert!(g.is_empty());
    }

    #[test]
    fn test_cleanup_breaks_cycles_and_tolerates_duplicates() {
        let mut g = Grammar::new();
        let e = g.declare("expr");
        let plus = g.byte(b'+');
        let digit = g.digit();
        let seq = g.and(crate::folds::concat, &[e, plus, e]);
        let body = g.or(&[seq, digit]);
        g.define(e, body);
        g.cleanup(&[e, e]);
        assert!(g.is_empty());
        // A second batch naming the same parser is a no-op.
        g.cleanup(&[e]);
        assert!(g.is_empty());
    }

    #[test]
    #[should_panic(expected = "cleanup of unretained parser")]
    fn test_cleanup_rejects_unretained() {
        let mut g = Grammar::new();
        let a = g.byte(b'a');
        g.cleanup(&[a]);
    }

    #[test]
    #[should_panic(expected = "use of deleted parser")]
    fn test_use_after_delete_panics() {
        let mut g = Grammar::new();
        let a = g.byte(b'a');
        g.delete(a);
        let _ = g.node(a);
    }

    #[test]
    fn test_copy_shares_retained() {
        let mut g = Grammar::new();
        let r = g.declare("r");
        let a = g.byte(b'a');
        let seq = g.and(crate::folds::concat, &[a, r]);
        let dup = g.copy(seq);
        assert_ne!(seq, dup);
        let (orig_kids, dup_kids) = (g.node(seq).def.children(), g.node(dup).def.children());
        assert_ne!(orig_kids[0], dup_kids[0]);
        assert_eq!(orig_kids[1], dup_kids[1]);
    }

    #[test]
    fn test_optimise_collapses_singleton_or() {
        let mut g = Grammar::new();
        let a = g.byte(b'a');
        let o = g.or(&[a]);
        let opt = g.optimise(o);
        assert_eq!(opt, a);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_optimise_splices_nested_or() {
        let mut g = Grammar::new();
        let a = g.byte(b'a');
        let b = g.byte(b'b');
        let c = g.byte(b'c');
        let inner = g.or(&[a, b]);
        let outer = g.or(&[inner, c]);
        let opt = g.optimise(outer);
        assert_eq!(opt, outer);
        assert_eq!(g.node(opt).def.children(), vec![a, b, c]);
        // Idempotent: a second pass changes nothing.
        let again = g.optimise(opt);
        assert_eq!(again, opt);
        assert_eq!(g.node(again).def.children(), vec![a, b, c]);
    }

    #[test]
    fn test_optimise_collapses_nested_expect() {
        let mut g = Grammar::new();
        let a = g.byte(b'a');
        let inner = g.expect(a, "inner");
        let outer = g.expect(inner, "outer");
        let opt = g.optimise(outer);
        match &g.node(opt).def {
            Def::Expect { inner, label } => {
                assert_eq!(*inner, a);
                assert_eq!(label, "outer");
            }
            _ => panic!("expected an expect node"),
        }
    }
}
