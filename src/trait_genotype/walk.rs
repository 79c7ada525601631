//! Locates every alterable node in an AST in the exact order the compiler's
//! [`crate::compiler`] pass 2 visits alterable positions (§4.5 "Trait
//! extraction": "ordered, one gene per alterable, in pre-order").
//!
//! Pre-order over the raw child list is not enough on its own: `compile_top`
//! emits a program in three groups — every `fn` body first, then every
//! top-level `define`, then everything else — rather than walking `top`
//! top-to-bottom (§4.3 "compile_top"). A trait list built by scanning source
//! order would assign genes in a different sequence than
//! `compile_program_with_genotype` consumes them whenever a script
//! interleaves fns/defines/other forms, so this module mirrors both the
//! grouping and the per-form recursion `compile_form`/`compile_list` performs
//! (skipping call heads, argument/loop labels, and `quote` bodies, none of
//! which ever reach `compile_form`).

use crate::ast::{Node, NodeKind};
use crate::keywords::Keywords;

/// Collects every alterable node reachable from `top`, in the order the
/// compiler's gene cursor would draw for them.
pub fn collect_in_compile_order<'n>(top: &'n [Node], kw: &Keywords) -> Vec<&'n Node> {
    let mut out = Vec::new();

    for node in top {
        if let Some(children) = list_children(node) {
            if head_name(&children) == Some(kw.kfn) {
                visit_fn(&children, kw, &mut out);
            }
        }
    }
    for node in top {
        if let Some(children) = list_children(node) {
            if head_name(&children) == Some(kw.define) {
                visit_define_values(&children, kw, &mut out);
            }
        }
    }
    for node in top {
        if node.is_trivia() {
            continue;
        }
        if let Some(children) = list_children(node) {
            let head = head_name(&children);
            if head == Some(kw.kfn) || head == Some(kw.define) {
                continue;
            }
        }
        visit(node, kw, &mut out);
    }
    out
}

fn visit_fn<'n>(children: &[&'n Node], kw: &Keywords, out: &mut Vec<&'n Node>) {
    if let Some(signature) = children.get(1) {
        let sig_children: Vec<&Node> = signature.significant_children().collect();
        let formals = &sig_children[1..];
        let mut i = 0;
        while i + 1 < formals.len() {
            visit(formals[i + 1], kw, out);
            i += 2;
        }
    }
    for body_form in &children[2..] {
        visit(body_form, kw, out);
    }
}

fn visit_define_values<'n>(children: &[&'n Node], kw: &Keywords, out: &mut Vec<&'n Node>) {
    let mut i = 1;
    while i + 1 < children.len() {
        visit(children[i + 1], kw, out);
        i += 2;
    }
}

/// Mirrors `compile_form`: visits `node` itself (if alterable) then recurses
/// only into the children that would actually be lowered through
/// `compile_form` — skipping call heads, argument/loop labels and anything
/// inside a `quote`d form (`compile_quoted` never consults the gene cursor).
fn visit<'n>(node: &'n Node, kw: &Keywords, out: &mut Vec<&'n Node>) {
    if node.alterable {
        out.push(node);
    }
    match node.kind {
        NodeKind::Vector => {
            for child in node.significant_children() {
                visit(child, kw, out);
            }
        }
        NodeKind::List => {
            let children: Vec<&Node> = node.significant_children().collect();
            let Some(head) = children.first() else { return };
            let Some(head_iname) = head.name else { return };

            if head_iname == kw.define {
                visit_define_values(&children, kw, out);
            } else if head_iname == kw.kif {
                for c in &children[1..] {
                    visit(c, kw, out);
                }
            } else if kw.is_loop_form(head_iname) || head_iname == kw.fence {
                if let Some(header) = children.get(1) {
                    let header_children: Vec<&Node> = header.significant_children().collect();
                    let mut i = 1;
                    while i + 1 < header_children.len() {
                        visit(header_children[i + 1], kw, out);
                        i += 2;
                    }
                }
                for c in &children[2..] {
                    visit(c, kw, out);
                }
            } else if head_iname == kw.on_matrix_stack {
                for c in &children[1..] {
                    visit(c, kw, out);
                }
            } else if head_iname == kw.address_of {
                // name only, never compiled through compile_form.
            } else if head_iname == kw.fn_call {
                if let Some(fn_expr) = children.get(1) {
                    visit(fn_expr, kw, out);
                }
                let mut i = 2;
                while i + 1 < children.len() {
                    visit(children[i + 1], kw, out);
                    i += 2;
                }
            } else if head_iname == kw.quote {
                // compile_quoted never draws from the gene cursor.
            } else if head_iname == kw.setq {
                if let Some(value) = children.get(2) {
                    visit(value, kw, out);
                }
            } else if head_iname == kw.plus
                || head_iname == kw.star
                || head_iname == kw.kand
                || head_iname == kw.kor
                || head_iname == kw.kmod
                || head_iname == kw.minus
                || head_iname == kw.slash
                || head_iname == kw.eq
                || head_iname == kw.lt
                || head_iname == kw.gt
                || head_iname == kw.knot
                || head_iname == kw.sqrt
            {
                for c in &children[1..] {
                    visit(c, kw, out);
                }
            } else {
                // Direct fn call or native call: (label value)* pairs, label
                // never compiled through compile_form.
                let mut i = 1;
                while i + 1 < children.len() {
                    visit(children[i + 1], kw, out);
                    i += 2;
                }
            }
        }
        _ => {}
    }
}

fn list_children<'n>(node: &'n Node) -> Option<Vec<&'n Node>> {
    if node.is_trivia() || node.kind != NodeKind::List {
        return None;
    }
    Some(node.significant_children().collect())
}

fn head_name(children: &[&Node]) -> Option<crate::word_table::Iname> {
    children.first().and_then(|n| n.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::word_table::WordTable;

    fn parse_and_collect(src: &str) -> usize {
        let mut words = WordTable::new();
        let kw = Keywords::register(&mut words);
        let top = Parser::parse_program(src, &mut words).unwrap();
        collect_in_compile_order(&top, &kw).len()
    }

    #[test]
    fn finds_a_single_top_level_alterable() {
        assert_eq!(parse_and_collect("{0.5 (gen/scalar)}"), 1);
    }

    #[test]
    fn skips_call_heads_and_labels() {
        // The label `a:` and the call head `adder` are never alterable-eligible
        // in practice, but even if name-shaped, neither reaches compile_form.
        assert_eq!(parse_and_collect("(fn (adder a: {1 (gen/scalar)}) a) (adder a: {2 (gen/scalar)})"), 2);
    }

    #[test]
    fn fn_bodies_are_visited_before_top_level_defines() {
        let mut words = WordTable::new();
        let kw = Keywords::register(&mut words);
        let top = Parser::parse_program("(define a {1 (gen/scalar)}) (fn (f) {2 (gen/scalar)}) (f)", &mut words).unwrap();
        let nodes = collect_in_compile_order(&top, &kw);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].float_value, 2.0);
        assert_eq!(nodes[1].float_value, 1.0);
    }

    #[test]
    fn quoted_alterables_are_never_visited() {
        assert_eq!(parse_and_collect("'({1 (gen/scalar)} 2)"), 0);
    }
}
