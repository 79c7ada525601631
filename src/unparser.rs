//! Reconstructs source text from an AST (§4.6 "Unparser", table row 10).
//!
//! Grounded on the teacher's `format.rs`/pretty-printer shape (walk the tree,
//! delegate leaf formatting to small per-kind helpers) but driven by the
//! parser's concrete-syntax tree instead of re-deriving layout: every
//! non-alterable node already carries the exact bytes it was parsed from
//! (`Node::source`), so the unparser's only real job is deciding what to put
//! in place of an alterable leaf.
//!
//! [`unparse`] substitutes each alterable leaf with the matching gene from a
//! [`Genotype`], keeping the original `{...}` generator text so the result
//! stays evolvable. [`simplified_unparse`] instead substitutes each
//! alterable's own default (its `parameter_ast`, run to a value) and drops
//! the brace syntax entirely, for previewing a script with markup stripped.

use ahash::AHashMap;

use crate::ast::{Node, NodeKind};
use crate::compiler::compile_program;
use crate::compiler::gene::GeneValue;
use crate::config::VmLimits;
use crate::error::{SeniError, SeniResult};
use crate::keywords::Keywords;
use crate::natives::NativeTable;
use crate::trait_genotype::{walk, Genotype};
use crate::value::ColourFormat;
use crate::vm::Vm;
use crate::word_table::WordTable;

/// Number of digits after the decimal point in `source`, or `0` if there is
/// no `.` (an INT node, or a FLOAT whose gene rounds to a whole number).
fn decimal_places(source: &str) -> usize {
    match source.find('.') {
        Some(dot) => source[dot + 1..].chars().take_while(char::is_ascii_digit).count(),
        None => 0,
    }
}

fn format_float(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

fn colour_native_name(format: ColourFormat) -> &'static str {
    match format {
        ColourFormat::Rgb => "col/rgb",
        ColourFormat::Hsl => "col/hsl",
        ColourFormat::Lab => "col/lab",
        ColourFormat::Hsv => "col/hsv",
    }
}

fn colour_labels(format: ColourFormat) -> [&'static str; 3] {
    match format {
        ColourFormat::Rgb => ["r", "g", "b"],
        ColourFormat::Hsl => ["h", "s", "l"],
        ColourFormat::Lab => ["l", "a", "b"],
        ColourFormat::Hsv => ["h", "s", "v"],
    }
}

/// Renders a gene value with no originating node to match precision
/// against, used for elements nested inside a VECTOR gene.
fn format_gene_plain(gene: &GeneValue, words: &WordTable) -> String {
    match gene {
        GeneValue::Int(i) => i.to_string(),
        GeneValue::Float(f) => format!("{f}"),
        GeneValue::Bool(b) => b.to_string(),
        GeneValue::Name(n) => words.reverse(*n).unwrap_or("#unknown-name").to_owned(),
        GeneValue::Colour(format, [a, b, c, alpha]) => {
            let [la, lb, lc] = colour_labels(*format);
            format!("({} {la}: {a} {lb}: {b} {lc}: {c} alpha: {alpha})", colour_native_name(*format))
        }
        GeneValue::Vec2(x, y) => format!("[{x} {y}]"),
        GeneValue::Vector(items) => {
            let inner: Vec<String> = items.iter().map(|g| format_gene_plain(g, words)).collect();
            format!("[{}]", inner.join(" "))
        }
    }
}

/// Renders `gene` as the text that should replace `node`'s own source slice,
/// matching `node`'s original decimal precision for a scalar FLOAT/INT.
fn format_gene_for_node(gene: &GeneValue, node: &Node, words: &WordTable) -> String {
    match gene {
        GeneValue::Float(f) if matches!(node.kind, NodeKind::Float | NodeKind::Int) => {
            format_float(*f, decimal_places(&node.source))
        }
        _ => format_gene_plain(gene, words),
    }
}

/// Walks `top` reproducing source text, substituting each alterable node
/// with the gene `gene_for` maps it to and re-emitting that node's original
/// `{...}` suffix unchanged, so the result remains evolvable (§4.6).
fn emit(node: &Node, gene_for: &AHashMap<usize, &GeneValue>, words: &WordTable, substituted: &mut usize, out: &mut String) {
    if node.alterable {
        out.push('{');
        if let Some(prefix) = &node.parameter_prefix {
            out.push_str(prefix);
        }
        let key = std::ptr::from_ref(node) as usize;
        if let Some(gene) = gene_for.get(&key) {
            out.push_str(&format_gene_for_node(gene, node, words));
            *substituted += 1;
        } else {
            out.push_str(&node.source);
        }
        if let Some(body) = &node.parameter_ast {
            out.push_str(&body.source);
        }
        out.push('}');
        return;
    }
    match node.kind {
        NodeKind::List => {
            out.push('(');
            for child in &node.children {
                emit(child, gene_for, words, substituted, out);
            }
            out.push(')');
        }
        NodeKind::Vector => {
            out.push('[');
            for child in &node.children {
                emit(child, gene_for, words, substituted, out);
            }
            out.push(']');
        }
        _ => out.push_str(&node.source),
    }
}

/// Reconstructs source text for `top`, substituting each alterable node's
/// default with the matching gene from `genotype` while preserving the
/// brace-wrapped generator syntax (§4.6, §8 round-trip law).
///
/// The gene-to-node assignment follows the exact traversal order
/// [`crate::trait_genotype::build_genotype`] draws genes in
/// ([`walk::collect_in_compile_order`]), not source order, since that is the
/// order a genotype's gene sequence is indexed against.
pub fn unparse(top: &[Node], genotype: &Genotype, keywords: &Keywords, words: &WordTable) -> SeniResult<String> {
    let ordered = walk::collect_in_compile_order(top, keywords);
    if ordered.len() != genotype.len() {
        return Err(SeniError::GeneCountMismatch { expected: ordered.len(), found: genotype.len() });
    }
    let gene_for: AHashMap<usize, &GeneValue> =
        ordered.iter().zip(genotype.genes.iter()).map(|(&n, g)| (std::ptr::from_ref(n) as usize, g)).collect();

    let mut out = String::new();
    let mut substituted = 0;
    for node in top {
        emit(node, &gene_for, words, &mut substituted, &mut out);
    }
    if substituted != ordered.len() {
        return Err(SeniError::GeneCountMismatch { expected: ordered.len(), found: substituted });
    }
    Ok(out)
}

fn emit_simplified(
    node: &Node,
    words: &mut WordTable,
    keywords: &Keywords,
    limits: &VmLimits,
    natives: &NativeTable,
    out: &mut String,
) -> SeniResult<()> {
    if node.alterable {
        let param = node.parameter_ast.as_ref().expect("alterable nodes always carry parameter_ast");
        let program = compile_program(&param.source, words, keywords, limits)?;
        let mut vm = Vm::new(*limits);
        vm.run(&program, natives)?;
        let value = vm.stack[vm.sp - 1];
        let gene = GeneValue::from_value(&vm.heap, value);
        out.push_str(&format_gene_for_node(&gene, node, words));
        return Ok(());
    }
    match node.kind {
        NodeKind::List => {
            out.push('(');
            for child in &node.children {
                emit_simplified(child, words, keywords, limits, natives, out)?;
            }
            out.push(')');
        }
        NodeKind::Vector => {
            out.push('[');
            for child in &node.children {
                emit_simplified(child, words, keywords, limits, natives, out)?;
            }
            out.push(']');
        }
        _ => out.push_str(&node.source),
    }
    Ok(())
}

/// Emits `top` with every alterable's brace markup stripped, substituting
/// each leaf's own default value in its place (§4.6 "simplified variant").
/// Runs each `parameter_ast` on a fresh scratch `Vm` to obtain that default,
/// the same way trait materialisation does, but independent of any
/// genotype.
pub fn simplified_unparse(top: &[Node], words: &mut WordTable, keywords: &Keywords, limits: &VmLimits, natives: &NativeTable) -> SeniResult<String> {
    let mut out = String::new();
    for node in top {
        emit_simplified(node, words, keywords, limits, natives, &mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::gene::GeneValue;
    use crate::natives::NativeNames;
    use crate::parser::Parser;
    use crate::trait_genotype::compile_trait_list;

    fn setup() -> (WordTable, Keywords, NativeTable, VmLimits) {
        let mut words = WordTable::new();
        let keywords = Keywords::register(&mut words);
        let names = NativeNames::register(&mut words);
        let natives = NativeTable::build(&names);
        (words, keywords, natives, VmLimits::default())
    }

    #[test]
    fn non_alterable_source_round_trips_byte_for_byte() {
        let (mut words, keywords, _natives, _limits) = setup();
        let source = "(+ 1 2 3)";
        let top = Parser::parse_program(source, &mut words).unwrap();
        let genotype = Genotype::default();
        let out = unparse(&top, &genotype, &keywords, &words).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn alterable_leaf_is_replaced_by_its_gene_with_brace_preserved() {
        let (mut words, keywords, _natives, _limits) = setup();
        let source = "{0.5 (gen/scalar)}";
        let top = Parser::parse_program(source, &mut words).unwrap();
        let genotype = Genotype { genes: vec![GeneValue::Float(0.25)] };
        let out = unparse(&top, &genotype, &keywords, &words).unwrap();
        assert_eq!(out, "{0.2 (gen/scalar)}");
    }

    #[test]
    fn gene_count_mismatch_is_reported() {
        let (mut words, keywords, _natives, _limits) = setup();
        let top = Parser::parse_program("{0.5 (gen/scalar)}", &mut words).unwrap();
        let genotype = Genotype::default();
        let err = unparse(&top, &genotype, &keywords, &words).unwrap_err();
        assert!(matches!(err, SeniError::GeneCountMismatch { expected: 1, found: 0 }));
    }

    #[test]
    fn unparsed_source_reparses_to_the_same_trait_count() {
        let (mut words, keywords, natives, limits) = setup();
        let source = "(+ {1 (gen/scalar)} {2 (gen/scalar)})";
        let list = compile_trait_list(source, &mut words, &keywords, &limits).unwrap();
        let genotype = crate::trait_genotype::build_genotype(&list, 9, &limits, &natives).unwrap();
        let top = Parser::parse_program(source, &mut words).unwrap();
        let out = unparse(&top, &genotype, &keywords, &words).unwrap();
        let mut words2 = WordTable::new();
        let keywords2 = Keywords::register(&mut words2);
        let reparsed_top = Parser::parse_program(&out, &mut words2).unwrap();
        let list2 = compile_trait_list(&out, &mut words2, &keywords2, &limits).unwrap();
        assert_eq!(list2.len(), list.len());
        let _ = reparsed_top;
    }

    #[test]
    fn simplified_unparse_strips_brace_syntax() {
        let (mut words, keywords, natives, limits) = setup();
        let top = Parser::parse_program("{0.5 (gen/scalar)}", &mut words).unwrap();
        let out = simplified_unparse(&top, &mut words, &keywords, &limits, &natives).unwrap();
        assert!(!out.contains('{'));
    }
}
