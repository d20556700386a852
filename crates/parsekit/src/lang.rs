//! EBNF-style grammar front-end.
//!
//! Compiles a textual grammar into a network of parsers yielding a generic
//! [`Ast`]. Rules bind to pre-declared retained parsers, so grammars may be
//! mutually recursive:
//!
//! ```ignore
//! let mut g = Grammar::new();
//! let expr = g.declare("expression");
//! let value = g.declare("value");
//! g.language(lang::DEFAULT, r#"
//!     expression : <value> (('+' | '-') <value>)* ;
//!     value      : /[0-9]+/ | '(' <expression> ')' ;
//! "#, &[expr, value])?;
//! let ast = g.parse("input", "1 + (2 - 3)", expr)?;
//! ```
//!
//! The grammar text itself is parsed by a meta-grammar built from the
//! engine's own combinators.

use common::Loc;
use hashbrown::HashMap;

use crate::ast::Ast;
use crate::charset::ByteSet;
use crate::error::ParseError;
use crate::folds;
use crate::parser::{Grammar, ParserId, Value};
use crate::value;

/// No special behavior.
pub const DEFAULT: u32 = 0;
/// Wrap every alternation in a predictive boundary; faster, requires LL(1).
pub const PREDICTIVE: u32 = 1 << 0;
/// Do not skip implicit whitespace between adjacent factors.
pub const WHITESPACE_SENSITIVE: u32 = 1 << 1;

/// One `name : alternation ;` definition from a grammar text.
struct GRule {
    name: String,
    label: Option<String>,
    body: GExpr,
    at: Loc,
}

/// Parsed shape of a grammar expression, before compilation.
enum GExpr {
    Alt(Vec<GExpr>),
    Seq(Vec<GExpr>),
    Rep(Box<GExpr>, GQuant),
    Lit(String),
    Ch(u8),
    Rex { src: String, at: Loc },
    Rule { name: String, at: Loc },
}

#[derive(Clone, Copy)]
enum GQuant {
    Opt,
    Star,
    Plus,
}

impl Grammar {
    /// Compile a grammar expression (a single alternation) into a parser.
    ///
    /// `refs` supplies the declared parsers that `<name>` references resolve
    /// against. The whole of `src` must be consumed.
    pub fn grammar(
        &mut self,
        flags: u32,
        src: &str,
        refs: &[ParserId],
    ) -> Result<ParserId, ParseError> {
        let map = self.ref_map(refs);
        let mut meta = Grammar::new();
        let (_lang_top, expr_top, alt) = syntax(&mut meta);
        let parsed = meta.parse("<grammar>", src, expr_top);
        meta.cleanup(&[alt]);
        let expr = value::take::<GExpr>(parsed?);
        self.compile_expr(&expr, &map, flags)
    }

    /// Compile a grammar text of `rule : alternation ;` definitions,
    /// binding each rule's body to the declared parser of the same name.
    ///
    /// Every rule in `src` must have a declared parser in `refs`; declared
    /// parsers without a rule are left for the caller to define.
    pub fn language(&mut self, flags: u32, src: &str, refs: &[ParserId]) -> Result<(), ParseError> {
        let map = self.ref_map(refs);
        let mut meta = Grammar::new();
        let (lang_top, _expr_top, alt) = syntax(&mut meta);
        let parsed = meta.parse("<grammar>", src, lang_top);
        meta.cleanup(&[alt]);
        let rules = value::take::<Vec<GRule>>(parsed?);
        for rule in rules {
            let r = match map.get(rule.name.as_str()) {
                Some(&id) => id,
                None => {
                    return Err(ParseError::failure_at(
                        "<grammar>",
                        rule.at,
                        &format!("no declared parser for rule '{}'", rule.name),
                    ))
                }
            };
            let body = self.compile_expr(&rule.body, &map, flags)?;
            let start = self.loc();
            let tagged = self.and(rule_wrap(rule.name), &[start, body]);
            let bound = match rule.label {
                Some(label) => self.expect(tagged, &label),
                None => tagged,
            };
            self.define(r, bound);
        }
        Ok(())
    }

    fn ref_map(&self, refs: &[ParserId]) -> HashMap<String, ParserId> {
        let mut map = HashMap::new();
        for &p in refs {
            match &self.node(p).name {
                Some(name) => {
                    map.insert(name.clone(), p);
                }
                None => panic!("grammar refs must be declared named parsers"),
            }
        }
        map
    }

    // -------------------------------------------------------------------------
    // Compilation into combinators
    // -------------------------------------------------------------------------

    fn compile_expr(
        &mut self,
        e: &GExpr,
        refs: &HashMap<String, ParserId>,
        flags: u32,
    ) -> Result<ParserId, ParseError> {
        match e {
            GExpr::Lit(s) => {
                let start = self.loc();
                let p = self.string(s);
                Ok(self.and(leaf_fold("string"), &[start, p]))
            }

            GExpr::Ch(b) => {
                let start = self.loc();
                let p = self.byte(*b);
                Ok(self.and(leaf_fold("char"), &[start, p]))
            }

            GExpr::Rex { src, at } => {
                let p = match self.re(src) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(ParseError::failure_at(
                            "<grammar>",
                            *at,
                            &format!("invalid regex: {}", err),
                        ))
                    }
                };
                let start = self.loc();
                Ok(self.and(leaf_fold("regex"), &[start, p]))
            }

            GExpr::Rule { name, at } => match refs.get(name.as_str()) {
                Some(&id) => Ok(id),
                None => Err(ParseError::failure_at(
                    "<grammar>",
                    *at,
                    &format!("unknown rule <{}>", name),
                )),
            },

            GExpr::Seq(items) => match items.len() {
                0 => Ok(self.pass()),
                1 => self.compile_expr(&items[0], refs, flags),
                _ => {
                    let mut kids = Vec::new();
                    for (idx, item) in items.iter().enumerate() {
                        if idx > 0 && flags & WHITESPACE_SENSITIVE == 0 {
                            kids.push(self.ws_elided());
                        }
                        kids.push(self.compile_expr(item, refs, flags)?);
                    }
                    Ok(self.and(ast_seq, &kids))
                }
            },

            GExpr::Alt(alts) => {
                let mut kids = Vec::new();
                for alt in alts {
                    kids.push(self.compile_expr(alt, refs, flags)?);
                }
                let o = self.or(&kids);
                if flags & PREDICTIVE != 0 {
                    Ok(self.predictive(o))
                } else {
                    Ok(o)
                }
            }

            GExpr::Rep(inner, q) => {
                let p = self.compile_expr(inner, refs, flags)?;
                match q {
                    GQuant::Opt => Ok(self.maybe(p)),
                    GQuant::Star | GQuant::Plus => {
                        // Repetitions also skip whitespace before each
                        // iteration, so `<x> (',' <x>)*` separates items.
                        let body = if flags & WHITESPACE_SENSITIVE == 0 {
                            let w = self.ws_elided();
                            self.and(folds::second, &[w, p])
                        } else {
                            p
                        };
                        match q {
                            GQuant::Star => Ok(self.many(ast_seq, body)),
                            _ => Ok(self.many1(ast_seq, body)),
                        }
                    }
                }
            }
        }
    }

    fn ws_elided(&mut self) -> ParserId {
        let sp = self.one_of(b" \t\r\n");
        let reps = self.many(folds::concat, sp);
        self.apply(reps, |_| value::unit())
    }
}

// -----------------------------------------------------------------------------
// Runtime AST folds
// -----------------------------------------------------------------------------

/// Collect child [`Ast`] values in order. Unit values are elided and
/// anonymous `">"` nodes are spliced into the parent, so leaves stay in
/// document order without nesting artifacts.
fn ast_seq(vals: Vec<Value>) -> Value {
    let mut kids: Vec<Ast> = Vec::new();
    for v in vals {
        if value::is_unit(&v) {
            continue;
        }
        let a = value::take::<Ast>(v);
        if a.tag == ">" {
            kids.extend(a.children);
        } else {
            kids.push(a);
        }
    }
    match kids.len() {
        0 => value::unit(),
        1 => Box::new(kids.remove(0)),
        _ => Box::new(Ast::branch(">", kids)),
    }
}

fn leaf_fold(tag: &'static str) -> impl Fn(Vec<Value>) -> Value {
    move |vals| {
        let mut it = vals.into_iter();
        let at = value::take::<Loc>(it.next().expect("leaf fold arity"));
        let text = value::string(it.next().expect("leaf fold arity"));
        Box::new(Ast::leaf(tag, text, at)) as Value
    }
}

fn rule_wrap(name: String) -> impl Fn(Vec<Value>) -> Value {
    move |vals| {
        let mut it = vals.into_iter();
        let at = value::take::<Loc>(it.next().expect("rule fold arity"));
        let body = it.next().expect("rule fold arity");
        if value::is_unit(&body) {
            Box::new(Ast::leaf(name.clone(), "", at)) as Value
        } else {
            let mut a = value::take::<Ast>(body);
            a.tag = format!("{}|{}", name, a.tag);
            Box::new(a) as Value
        }
    }
}

// -----------------------------------------------------------------------------
// Grammar-text meta-grammar
// -----------------------------------------------------------------------------

/// Build the grammar-text parser in a scratch grammar. Returns the parser
/// for rule files, the parser for single expressions, and the retained
/// `alternation` rule for cleanup.
fn syntax(m: &mut Grammar) -> (ParserId, ParserId, ParserId) {
    let alt = m.declare("alternation");

    let first_seq = seq_syntax(m, alt);
    let pipe = tok_byte(m, b'|');
    let rest_seq = seq_syntax(m, alt);
    let piped = m.and(folds::second, &[pipe, rest_seq]);
    let rest = m.many(gexpr_list, piped);
    let body = m.and(alt_exprs, &[first_seq, rest]);
    m.define(alt, body);

    let rule = rule_syntax(m, alt);
    let rules = m.many1(rule_list, rule);
    let lead = ws(m);
    let end = m.eoi();
    let lang_top = m.and(folds::second, &[lead, rules, end]);

    let lead = ws(m);
    let end = m.eoi();
    let expr_top = m.and(folds::second, &[lead, alt, end]);

    (lang_top, expr_top, alt)
}

/// `rule_name ["label"] : alternation ;`
fn rule_syntax(m: &mut Grammar, alt: ParserId) -> ParserId {
    let at = m.loc();
    let name = ident(m);
    let name = m.expect(name, "rule name");
    let name = tok(m, name);
    let label = string_lit(m);
    let label = tok(m, label);
    let label = m.maybe(label);
    let colon = tok_byte(m, b':');
    let semi = tok_byte(m, b';');
    m.and(rule_spec, &[at, name, label, colon, alt, semi])
}

/// A whitespace-separated run of quantified factors.
fn seq_syntax(m: &mut Grammar, alt: ParserId) -> ParserId {
    let factor = factor_syntax(m, alt);
    m.many(seq_exprs, factor)
}

fn factor_syntax(m: &mut Grammar, alt: ParserId) -> ParserId {
    let lit = string_lit(m);
    let lit = m.apply(lit, |v| Box::new(GExpr::Lit(value::string(v))) as Value);

    let ch = char_lit(m);
    let rex = regex_lit(m);
    let rref = rule_ref(m);

    let open = tok_byte(m, b'(');
    let close = m.byte(b')');
    let close = m.expect(close, "')'");
    let close = tok(m, close);
    let group = m.and(folds::second, &[open, alt, close]);

    let base = m.or(&[lit, ch, rex, rref, group]);
    let base = tok(m, base);

    let quant = m.one_of(b"?*+");
    let quant = tok(m, quant);
    let quants = m.many(quant_list, quant);
    m.and(apply_quants, &[base, quants])
}

/// `"…"` with backslash escapes; yields the unescaped contents.
fn string_lit(m: &mut Grammar) -> ParserId {
    let esc = escaped_char(m);
    let plain = m.none_of(b"\"\\");
    let chunk = m.or(&[esc, plain]);
    let body = m.many(folds::concat, chunk);
    let open = m.byte(b'"');
    let close = m.byte(b'"');
    let close = m.expect(close, "closing '\"'");
    m.and(folds::second, &[open, body, close])
}

/// `'x'` with backslash escapes.
fn char_lit(m: &mut Grammar) -> ParserId {
    let esc = escaped_char(m);
    let plain = m.none_of(b"'\\");
    let inner = m.or(&[esc, plain]);
    let open = m.byte(b'\'');
    let close = m.byte(b'\'');
    let close = m.expect(close, "closing \"'\"");
    let lit = m.and(folds::second, &[open, inner, close]);
    m.apply(lit, |v| Box::new(GExpr::Ch(value::first_byte(v))) as Value)
}

/// `/…/`; escapes pass through to the regex compiler except `\/`.
fn regex_lit(m: &mut Grammar) -> ParserId {
    let at = m.loc();
    let bs = m.byte(b'\\');
    let any = m.any();
    let esc = m.and(rex_escape, &[bs, any]);
    let plain = m.none_of(b"/\\");
    let chunk = m.or(&[esc, plain]);
    let body = m.many(folds::concat, chunk);
    let open = m.byte(b'/');
    let close = m.byte(b'/');
    let close = m.expect(close, "closing '/'");
    m.and(rex_expr, &[at, open, body, close])
}

/// `<name>`
fn rule_ref(m: &mut Grammar) -> ParserId {
    let at = m.loc();
    let open = m.byte(b'<');
    let name = ident(m);
    let name = m.expect(name, "rule name");
    let close = m.byte(b'>');
    let close = m.expect(close, "'>'");
    m.and(ref_expr, &[at, open, name, close])
}

fn ident(m: &mut Grammar) -> ParserId {
    let first_set = ByteSet::from_range(b'a', b'z')
        .union(ByteSet::from_range(b'A', b'Z'))
        .union(ByteSet::from_bytes(b"_"));
    let rest_set = first_set.union(ByteSet::from_range(b'0', b'9'));
    let first = m.charset_labelled(first_set, "identifier");
    let rest = m.charset_labelled(rest_set, "identifier");
    let rest = m.many(folds::concat, rest);
    m.and(folds::concat, &[first, rest])
}

fn escaped_char(m: &mut Grammar) -> ParserId {
    let bs = m.byte(b'\\');
    let any = m.any();
    let pair = m.and(folds::second, &[bs, any]);
    m.apply(pair, |v| {
        let b = value::first_byte(v);
        Box::new((unescape(b) as char).to_string()) as Value
    })
}

fn unescape(b: u8) -> u8 {
    match b {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        other => other,
    }
}

/// Skip whitespace after a token, keeping the token's value.
fn tok(m: &mut Grammar, p: ParserId) -> ParserId {
    let w = ws(m);
    m.and(folds::first, &[p, w])
}

fn tok_byte(m: &mut Grammar, b: u8) -> ParserId {
    let p = m.byte(b);
    tok(m, p)
}

fn ws(m: &mut Grammar) -> ParserId {
    let sp = m.one_of(b" \t\r\n");
    let reps = m.many(folds::concat, sp);
    m.apply(reps, |_| value::unit())
}

// -----------------------------------------------------------------------------
// Meta-grammar folds
// -----------------------------------------------------------------------------

fn seq_exprs(vals: Vec<Value>) -> Value {
    Box::new(GExpr::Seq(
        vals.into_iter().map(value::take::<GExpr>).collect(),
    ))
}

fn gexpr_list(vals: Vec<Value>) -> Value {
    Box::new(
        vals.into_iter()
            .map(value::take::<GExpr>)
            .collect::<Vec<GExpr>>(),
    )
}

fn alt_exprs(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let first = value::take::<GExpr>(it.next().expect("alternation fold arity"));
    let rest = value::take::<Vec<GExpr>>(it.next().expect("alternation fold arity"));
    if rest.is_empty() {
        Box::new(first)
    } else {
        let mut alts = vec![first];
        alts.extend(rest);
        Box::new(GExpr::Alt(alts))
    }
}

fn quant_list(vals: Vec<Value>) -> Value {
    Box::new(
        vals.into_iter()
            .map(|v| match value::first_byte(v) {
                b'?' => GQuant::Opt,
                b'*' => GQuant::Star,
                _ => GQuant::Plus,
            })
            .collect::<Vec<GQuant>>(),
    )
}

fn apply_quants(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let mut expr = value::take::<GExpr>(it.next().expect("factor fold arity"));
    let quants = value::take::<Vec<GQuant>>(it.next().expect("factor fold arity"));
    for q in quants {
        expr = GExpr::Rep(Box::new(expr), q);
    }
    Box::new(expr)
}

fn rex_escape(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let _bs = it.next();
    let c = value::string(it.next().expect("escape fold arity"));
    if c == "/" {
        Box::new(c)
    } else {
        Box::new(format!("\\{}", c))
    }
}

fn rex_expr(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let at = value::take::<Loc>(it.next().expect("regex fold arity"));
    let _open = it.next();
    let src = value::string(it.next().expect("regex fold arity"));
    Box::new(GExpr::Rex { src, at })
}

fn ref_expr(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let at = value::take::<Loc>(it.next().expect("rule ref fold arity"));
    let _open = it.next();
    let name = value::string(it.next().expect("rule ref fold arity"));
    Box::new(GExpr::Rule { name, at })
}

fn rule_spec(vals: Vec<Value>) -> Value {
    let mut it = vals.into_iter();
    let at = value::take::<Loc>(it.next().expect("rule fold arity"));
    let name = value::string(it.next().expect("rule fold arity"));
    let label = it.next().expect("rule fold arity");
    let label = if value::is_unit(&label) {
        None
    } else {
        Some(value::string(label))
    };
    let _colon = it.next();
    let body = value::take::<GExpr>(it.next().expect("rule fold arity"));
    Box::new(GRule {
        name,
        label,
        body,
        at,
    })
}

fn rule_list(vals: Vec<Value>) -> Value {
    Box::new(
        vals.into_iter()
            .map(value::take::<GRule>)
            .collect::<Vec<GRule>>(),
    )
}
