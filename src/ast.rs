//! The parse tree (§3 "AST (concrete syntax preserving)").
//!
//! Unlike a typical Lisp reader, whitespace and comments are first-class
//! siblings rather than discarded trivia: the unparser (`unparser.rs`) walks
//! the same tree the parser produced and must reproduce the source
//! byte-for-byte when no gene substitution changes a node's value. Each
//! node also keeps the exact source slice it was parsed from so that
//! numeric formatting (decimal places, trailing zeros) survives a
//! parse/unparse round trip untouched.

use crate::word_table::Iname;

/// The syntactic category of a single AST node (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    List,
    Vector,
    Int,
    Float,
    Name,
    /// A `name:` label immediately preceding an argument value.
    Label,
    String,
    Whitespace,
    Comment,
    Boolean,
}

/// A single parse-tree node. `List`/`Vector` carry their elements (including
/// interleaved `Whitespace`/`Comment` nodes) in `children`; every other kind
/// is a leaf.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Verbatim source text this node was parsed from, kept so the
    /// unparser can reproduce whitespace runs, comment text and a float's
    /// original decimal formatting without recomputing it.
    pub source: String,

    // --- leaf payloads, only the one matching `kind` is meaningful ---
    pub int_value: i64,
    pub float_value: f64,
    pub bool_value: bool,
    pub name: Option<Iname>,

    // --- compound payload ---
    pub children: Vec<Node>,

    /// Was this node written as `{expr}` in the source (§3's "alterable"
    /// annotation)? Only INT/FLOAT/NAME/LIST/VECTOR nodes may carry it.
    pub alterable: bool,
    /// The generator body following the alterable value inside the braces
    /// (`{value body…}`'s `body…`, wrapped as a single compound node whose
    /// `source` is the body's exact text), compiled to materialise a gene.
    /// Present iff `alterable`.
    pub parameter_ast: Option<Box<Node>>,
    /// Leading whitespace/comment text between the opening `{` and the
    /// alterable value, e.g. `"  "` in `"{  (gen/scalar)}"`, kept for
    /// byte-exact unparsing of the brace region.
    pub parameter_prefix: Option<String>,
}

impl Node {
    #[must_use]
    pub fn leaf(kind: NodeKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            int_value: 0,
            float_value: 0.0,
            bool_value: false,
            name: None,
            children: Vec::new(),
            alterable: false,
            parameter_ast: None,
            parameter_prefix: None,
        }
    }

    #[must_use]
    pub fn int(value: i64, source: impl Into<String>) -> Self {
        Self {
            int_value: value,
            ..Self::leaf(NodeKind::Int, source)
        }
    }

    #[must_use]
    pub fn float(value: f64, source: impl Into<String>) -> Self {
        Self {
            float_value: value,
            ..Self::leaf(NodeKind::Float, source)
        }
    }

    #[must_use]
    pub fn boolean(value: bool, source: impl Into<String>) -> Self {
        Self {
            bool_value: value,
            ..Self::leaf(NodeKind::Boolean, source)
        }
    }

    #[must_use]
    pub fn name(iname: Iname, source: impl Into<String>) -> Self {
        Self {
            name: Some(iname),
            ..Self::leaf(NodeKind::Name, source)
        }
    }

    #[must_use]
    pub fn label(iname: Iname, source: impl Into<String>) -> Self {
        Self {
            name: Some(iname),
            ..Self::leaf(NodeKind::Label, source)
        }
    }

    /// A `"..."` literal, interned as a word (§3): at runtime it becomes a
    /// `Value::Name` carrying the same iname a bare identifier would get.
    #[must_use]
    pub fn string(iname: Iname, source: impl Into<String>) -> Self {
        Self {
            name: Some(iname),
            ..Self::leaf(NodeKind::String, source)
        }
    }

    #[must_use]
    pub fn compound(kind: NodeKind, children: Vec<Node>, source: impl Into<String>) -> Self {
        Self {
            children,
            ..Self::leaf(kind, source)
        }
    }

    /// Marks this node alterable with the given brace-parameter AST and raw
    /// text, as produced when the parser sees a `{...}` wrapper (§4.2).
    #[must_use]
    pub fn with_alterable(mut self, parameter_ast: Node, parameter_prefix: impl Into<String>) -> Self {
        self.alterable = true;
        self.parameter_ast = Some(Box::new(parameter_ast));
        self.parameter_prefix = Some(parameter_prefix.into());
        self
    }

    #[must_use]
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, NodeKind::Whitespace | NodeKind::Comment)
    }

    /// Non-trivia children, the view the compiler and genotype walker use.
    pub fn significant_children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|c| !c.is_trivia())
    }

    #[must_use]
    pub fn is_alterable_eligible(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Int | NodeKind::Float | NodeKind::Name | NodeKind::List | NodeKind::Vector
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significant_children_skips_trivia() {
        let node = Node::compound(
            NodeKind::List,
            vec![
                Node::leaf(NodeKind::Whitespace, " "),
                Node::int(4, "4"),
                Node::leaf(NodeKind::Comment, "; hi"),
                Node::int(5, "5"),
            ],
            "(4 5)",
        );
        let sig: Vec<_> = node.significant_children().collect();
        assert_eq!(sig.len(), 2);
    }

    #[test]
    fn alterable_wrapper_carries_body_and_prefix() {
        let body = Node::compound(NodeKind::List, vec![Node::int(7, "7")], "(gen/scalar)");
        let node = Node::float(0.5, "0.5").with_alterable(body, "");
        assert!(node.alterable);
        assert_eq!(node.parameter_ast.as_ref().unwrap().source, "(gen/scalar)");
        assert_eq!(node.parameter_prefix.as_deref(), Some(""));
    }
}
