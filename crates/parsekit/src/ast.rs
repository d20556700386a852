//! Generic abstract syntax tree produced by the grammar front-end.

use common::Loc;

/// A node in the generic AST.
///
/// The tag is a `|`-separated chain of rule names and primitive kinds, e.g.
/// `expression|product|regex`: singleton rule bodies collapse into their
/// child, prepending the rule name to the chain. Anonymous sequence nodes
/// carry the tag `">"`. Leaves hold the matched text in `contents`; interior
/// nodes leave it empty. Each node exclusively owns its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub tag: String,
    pub contents: String,
    pub state: Loc,
    pub children: Vec<Ast>,
}

impl Ast {
    /// Create a leaf node holding matched text.
    pub fn leaf(tag: impl Into<String>, contents: impl Into<String>, state: Loc) -> Ast {
        Ast {
            tag: tag.into(),
            contents: contents.into(),
            state,
            children: Vec::new(),
        }
    }

    /// Create an interior node. Its state is the first child's state.
    pub fn branch(tag: impl Into<String>, children: Vec<Ast>) -> Ast {
        let state = children.first().map(|c| c.state).unwrap_or_default();
        Ast {
            tag: tag.into(),
            contents: String::new(),
            state,
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether any segment of the tag chain equals `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.split('|').any(|seg| seg == tag)
    }

    pub fn child(&self, idx: usize) -> Option<&Ast> {
        self.children.get(idx)
    }

    /// All leaves in document order.
    pub fn leaves(&self) -> Vec<&Ast> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Ast>) {
        if self.is_leaf() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    /// Concatenated contents of all leaves in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.contents);
        for child in &self.children {
            child.collect_text(out);
        }
    }
}
