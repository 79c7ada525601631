//! The evolutionary trait/genotype engine (§4.1 table row 9, §4.5).
//!
//! Grounded on `original_source/app/c/seni_ga.c`'s trait/genotype/population
//! model — extraction, materialisation, crossover and mutation — re-expressed
//! over this crate's [`crate::compiler`]/[`crate::vm::Vm`] instead of the
//! original's hand-rolled object pools. [`wire`] supplies the cursor-based
//! text format traits/genotypes cross the process boundary in (§6 "Wire
//! format"); [`walk`] supplies the pre-order alterable traversal that keeps a
//! materialised genotype's gene order aligned with
//! [`crate::compiler::compile_program_with_genotype`]'s consumption order.

pub mod walk;
pub mod wire;

use crate::compiler::gene::GeneValue;
use crate::compiler::{compile_program, compile_program_with_genotype};
use crate::config::VmLimits;
use crate::error::{SeniError, SeniResult};
use crate::keywords::Keywords;
use crate::natives::NativeTable;
use crate::parser::Parser;
use crate::prng::Prng;
use crate::program::Program;
use crate::value::Value;
use crate::vm::Vm;
use crate::word_table::WordTable;

const TRAIT_LIST_WIRE_VERSION: u32 = 1;
const GENOTYPE_WIRE_VERSION: u32 = 1;

/// A single alterable's compiled generator program (§4.5 "trait").
#[derive(Debug, Clone)]
pub struct Trait {
    /// Source text of the `parameter_ast`, kept so the trait list can be
    /// re-serialized (and, on the far side of the wire, recompiled) without
    /// needing a bytecode-level encoding of `program`.
    pub source: String,
    pub program: Program,
}

/// The ordered schema a genotype is materialised against (§4.5).
#[derive(Debug, Clone, Default)]
pub struct TraitList {
    pub traits: Vec<Trait>,
}

impl TraitList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}

/// An ordered, materialised gene sequence matching a [`TraitList`]
/// one-to-one (§4.5, GLOSSARY "genotype").
#[derive(Debug, Clone, Default)]
pub struct Genotype {
    pub genes: Vec<GeneValue>,
}

impl Genotype {
    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Scans `source`'s AST for every alterable node and compiles its
/// `parameter_ast` into a standalone program (§4.5 "Trait extraction").
/// Each trait's code is checked against `limits.trait_program_budget`
/// ("its own small code budget").
pub fn compile_trait_list(source: &str, words: &mut WordTable, keywords: &Keywords, limits: &VmLimits) -> SeniResult<TraitList> {
    let top = Parser::parse_program(source, words)?;
    let alterables = walk::collect_in_compile_order(&top, keywords);

    let mut traits = Vec::with_capacity(alterables.len());
    for node in alterables {
        let param = node.parameter_ast.as_ref().expect("alterable nodes always carry parameter_ast");
        let trait_source = param.source.clone();
        let program = compile_program(&trait_source, words, keywords, limits)?;
        if program.code.len() > limits.trait_program_budget {
            return Err(SeniError::TraitProgramTooLarge { budget: limits.trait_program_budget, found: program.code.len() });
        }
        traits.push(Trait { source: trait_source, program });
    }
    Ok(TraitList { traits })
}

/// Runs every trait's program on a fresh scratch VM seeded from `seed`,
/// reading the single value each leaves on top of the stack (§4.5 "Gene
/// materialisation"). `vm` is reset before each trait and reused across the
/// whole trait list so `vm.gen_rng` — seeded once here — stays one
/// continuous sequence regardless of which trait is currently running.
pub fn build_genotype(trait_list: &TraitList, seed: u64, limits: &VmLimits, natives: &NativeTable) -> SeniResult<Genotype> {
    let mut vm = Vm::new(*limits);
    vm.gen_rng = Prng::seeded(seed);
    run_traits(&mut vm, trait_list, natives)
}

fn run_traits(vm: &mut Vm, trait_list: &TraitList, natives: &NativeTable) -> SeniResult<Genotype> {
    let mut genes = Vec::with_capacity(trait_list.len());
    for t in &trait_list.traits {
        vm.reset();
        vm.run(&t.program, natives)?;
        let top = vm.stack[vm.sp - 1];
        genes.push(GeneValue::from_value(&vm.heap, top));
    }
    Ok(Genotype { genes })
}

/// Single-point crossover over the gene sequence of two parents (§4.5
/// "Reproduction"). The cut point is drawn from `rng`; genes past it are
/// taken from `b`, falling back to `a`'s own gene if `b`'s schema is shorter
/// (parents are expected to share a schema, but this keeps the result total).
fn crossover(a: &Genotype, b: &Genotype, rng: &mut Prng) -> Genotype {
    let n = a.genes.len();
    if n == 0 {
        return Genotype::default();
    }
    let point = (rng.range_f32(0.0, n as f32) as usize).min(n - 1);
    let genes = a
        .genes
        .iter()
        .enumerate()
        .map(|(i, gene)| if i < point { gene.clone() } else { b.genes.get(i).cloned().unwrap_or_else(|| gene.clone()) })
        .collect();
    Genotype { genes }
}

/// Per gene, with probability `mutation_rate`, re-runs that gene's trait
/// program from a fresh PRNG seed drawn off `rng` (§4.5 "mutation ... at a
/// probability").
fn mutate(genotype: &Genotype, trait_list: &TraitList, mutation_rate: f32, rng: &mut Prng, vm: &mut Vm, natives: &NativeTable) -> SeniResult<Genotype> {
    let mut genes = genotype.genes.clone();
    for (i, t) in trait_list.traits.iter().enumerate() {
        if i >= genes.len() {
            break;
        }
        if rng.range_f32(0.0, 1.0) < mutation_rate {
            vm.reset();
            vm.gen_rng = Prng::seeded(rng.next_u64());
            vm.run(&t.program, natives)?;
            let top = vm.stack[vm.sp - 1];
            genes[i] = GeneValue::from_value(&vm.heap, top);
        }
    }
    Ok(Genotype { genes })
}

/// Builds the next generation: `size` children, each bred from two parents
/// drawn uniformly from `parents`, crossed over and mutated (§4.5
/// "Population building").
pub fn next_generation(
    parents: &[Genotype],
    size: usize,
    mutation_rate: f32,
    master_seed: u64,
    trait_list: &TraitList,
    limits: &VmLimits,
    natives: &NativeTable,
) -> SeniResult<Vec<Genotype>> {
    if parents.is_empty() {
        return Ok(Vec::new());
    }
    let mut rng = Prng::seeded(master_seed);
    let mut vm = Vm::new(*limits);
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        let a = &parents[(rng.range_f32(0.0, parents.len() as f32) as usize).min(parents.len() - 1)];
        let b = &parents[(rng.range_f32(0.0, parents.len() as f32) as usize).min(parents.len() - 1)];
        let child = crossover(a, b, &mut rng);
        let child = mutate(&child, trait_list, mutation_rate, &mut rng, &mut vm, natives)?;
        out.push(child);
    }
    Ok(out)
}

/// Compiles `source` against a genotype instead of textual defaults (thin
/// wrapper kept alongside the engine so callers don't need to reach into
/// `crate::compiler` directly for the genotype-aware entry point).
pub fn compile_program_with_genotype_entries(
    source: &str,
    genotype: &Genotype,
    words: &mut WordTable,
    keywords: &Keywords,
    limits: &VmLimits,
) -> SeniResult<Program> {
    compile_program_with_genotype(source, &genotype.genes, words, keywords, limits)
}

pub fn serialize_trait_list(list: &TraitList) -> String {
    let mut w = wire::Writer::new();
    w.write_u32(TRAIT_LIST_WIRE_VERSION);
    w.write_u32(u32::try_from(list.traits.len()).unwrap_or(u32::MAX));
    for t in &list.traits {
        w.write_str(&t.source);
    }
    w.finish()
}

/// Recompiles each trait's stored source, since the wire format carries the
/// trait's generator text rather than a bytecode encoding (see [`Trait`]).
pub fn deserialize_trait_list(text: &str, words: &mut WordTable, keywords: &Keywords, limits: &VmLimits) -> SeniResult<TraitList> {
    let mut r = wire::Reader::new(text);
    let version = r.read_u32()?;
    if version != TRAIT_LIST_WIRE_VERSION {
        return Err(SeniError::VersionMismatch { expected: TRAIT_LIST_WIRE_VERSION, found: version });
    }
    let count = r.read_u32()?;
    let mut traits = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let source = r.read_str()?;
        let program = compile_program(&source, words, keywords, limits)?;
        traits.push(Trait { source, program });
    }
    Ok(TraitList { traits })
}

pub fn serialize_genotype(genotype: &Genotype) -> String {
    let mut w = wire::Writer::new();
    w.write_u32(GENOTYPE_WIRE_VERSION);
    w.write_u32(u32::try_from(genotype.genes.len()).unwrap_or(u32::MAX));
    for gene in &genotype.genes {
        wire::write_gene(&mut w, gene);
    }
    w.finish()
}

pub fn deserialize_genotype(text: &str) -> SeniResult<Genotype> {
    let mut r = wire::Reader::new(text);
    let version = r.read_u32()?;
    if version != GENOTYPE_WIRE_VERSION {
        return Err(SeniError::VersionMismatch { expected: GENOTYPE_WIRE_VERSION, found: version });
    }
    let count = r.read_u32()?;
    let mut genes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        genes.push(wire::read_gene(&mut r)?);
    }
    Ok(Genotype { genes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::natives::NativeNames;

    fn setup() -> (WordTable, Keywords, NativeTable, VmLimits) {
        let mut words = WordTable::new();
        let keywords = Keywords::register(&mut words);
        let names = NativeNames::register(&mut words);
        let natives = NativeTable::build(&names);
        (words, keywords, natives, VmLimits::default())
    }

    #[test]
    fn extracts_one_trait_per_alterable() {
        let (mut words, keywords, _natives, limits) = setup();
        let list = compile_trait_list("(+ {1 (gen/scalar)} {2 (gen/scalar)})", &mut words, &keywords, &limits).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn materialises_a_gene_per_trait() {
        let (mut words, keywords, natives, limits) = setup();
        let list = compile_trait_list("{1 (gen/scalar)}", &mut words, &keywords, &limits).unwrap();
        let genotype = build_genotype(&list, 42, &limits, &natives).unwrap();
        assert_eq!(genotype.len(), 1);
        match &genotype.genes[0] {
            GeneValue::Float(f) => assert!((0.0..=1.0).contains(f)),
            other => panic!("expected Float gene, got {other:?}"),
        }
    }

    #[test]
    fn genotype_round_trips_through_the_wire() {
        let (mut words, keywords, natives, limits) = setup();
        let list = compile_trait_list("{1 (gen/scalar)} {2 (gen/2d)}", &mut words, &keywords, &limits).unwrap();
        let genotype = build_genotype(&list, 7, &limits, &natives).unwrap();
        let text = serialize_genotype(&genotype);
        let decoded = deserialize_genotype(&text).unwrap();
        assert_eq!(decoded.genes, genotype.genes);
    }

    #[test]
    fn trait_list_round_trips_through_the_wire() {
        let (mut words, keywords, _natives, limits) = setup();
        let list = compile_trait_list("{1 (gen/scalar)}", &mut words, &keywords, &limits).unwrap();
        let text = serialize_trait_list(&list);
        let decoded = deserialize_trait_list(&text, &mut words, &keywords, &limits).unwrap();
        assert_eq!(decoded.len(), list.len());
        assert_eq!(decoded.traits[0].source, list.traits[0].source);
    }

    #[test]
    fn next_generation_yields_requested_population_size() {
        let (mut words, keywords, natives, limits) = setup();
        let list = compile_trait_list("{1 (gen/scalar)} {2 (gen/scalar)}", &mut words, &keywords, &limits).unwrap();
        let parent_a = build_genotype(&list, 1, &limits, &natives).unwrap();
        let parent_b = build_genotype(&list, 2, &limits, &natives).unwrap();
        let children = next_generation(&[parent_a, parent_b], 6, 0.5, 99, &list, &limits, &natives).unwrap();
        assert_eq!(children.len(), 6);
        for child in &children {
            assert_eq!(child.len(), 2);
        }
    }

    #[test]
    fn compiling_with_genotype_consumes_every_gene() {
        let (mut words, keywords, natives, limits) = setup();
        let source = "(+ {1 (gen/scalar)} {2 (gen/scalar)})";
        let list = compile_trait_list(source, &mut words, &keywords, &limits).unwrap();
        let genotype = build_genotype(&list, 5, &limits, &natives).unwrap();
        let program = compile_program_with_genotype_entries(source, &genotype, &mut words, &keywords, &limits).unwrap();
        let mut vm = Vm::new(limits);
        vm.run(&program, &natives).unwrap();
        assert!(matches!(vm.stack[vm.sp - 1], Value::Float(_)));
    }
}
