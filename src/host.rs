//! The abstract host API (§6 "Host API (abstract)"): the single surface a
//! CLI or a WASM embedding calls through, wiring together interning,
//! compilation, execution and the trait/genotype engine.
//!
//! Grounded on the teacher's top-level `run.rs` (`Executor`/`RunSnapshot`
//! owning interns + namespaces + a parsed AST behind a handful of public
//! methods) adapted from Monty's single execute-to-completion model to
//! Seni's wider surface: compiling against a genotype, trait extraction,
//! population building and unparsing all live on the same handle so a host
//! never has to reach past it into `crate::compiler`/`crate::trait_genotype`
//! directly.

use crate::ast::Node;
use crate::compiler::{self, gene::GeneValue};
use crate::config::VmLimits;
use crate::error::SeniResult;
use crate::keywords::Keywords;
use crate::natives::{NativeNames, NativeTable};
use crate::parser::Parser;
use crate::program::Program;
use crate::render::RenderBuffer;
use crate::trait_genotype::{self, Genotype, TraitList};
use crate::unparser;
use crate::vm::Vm;
use crate::word_table::WordTable;

/// Process-wide subsystem state: the word table and every reserved
/// keyword/native name, registered once (§5 "Shared process-wide state...
/// initialised once per process and torn down at shutdown").
pub struct Host {
    words: WordTable,
    keywords: Keywords,
    native_names: NativeNames,
    natives: NativeTable,
    limits: VmLimits,
}

impl Host {
    /// `systems_startup()`: registers every reserved keyword and native
    /// name into a fresh word table, using [`VmLimits::default`].
    #[must_use]
    pub fn systems_startup() -> Self {
        Self::with_limits(VmLimits::default())
    }

    #[must_use]
    pub fn with_limits(limits: VmLimits) -> Self {
        let mut words = WordTable::new();
        let keywords = Keywords::register(&mut words);
        let native_names = NativeNames::register(&mut words);
        let natives = NativeTable::build(&native_names);
        Self { words, keywords, native_names, natives, limits }
    }

    /// `systems_shutdown()`: process-wide state is plain owned memory here,
    /// so shutdown is just dropping the handle. Kept as a named method so
    /// callers mirror the host lifecycle the spec describes rather than
    /// relying on `Drop` implicitly.
    pub fn systems_shutdown(self) {}

    /// `allocate_vm(...)`: a fresh VM sized from this host's limits.
    #[must_use]
    pub fn allocate_vm(&self) -> Vm {
        Vm::new(self.limits)
    }

    /// `allocate_env()`: the native function binding table, shared
    /// read-only across every VM this host allocates. Crate-internal: `run`
    /// already threads it through, so a host never needs to name the type.
    #[must_use]
    pub(crate) fn allocate_env(&self) -> &NativeTable {
        &self.natives
    }

    #[must_use]
    pub(crate) fn native_names(&self) -> &NativeNames {
        &self.native_names
    }

    #[must_use]
    pub(crate) fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    #[must_use]
    pub fn limits(&self) -> &VmLimits {
        &self.limits
    }

    /// Clears the per-script WORD range between scripts, leaving keywords
    /// and natives (registered once at startup) untouched (§4.1, §5).
    pub fn reset_words(&mut self) {
        self.words.reset_words();
    }

    pub fn parse(&mut self, source: &str) -> SeniResult<Vec<Node>> {
        Parser::parse_program(source, &mut self.words)
    }

    /// `compile_program(source, word_lut, max_size)`.
    pub fn compile_program(&mut self, source: &str) -> SeniResult<Program> {
        compiler::compile_program(source, &mut self.words, &self.keywords, &self.limits)
    }

    /// `compile_program_with_genotype(source, genotype, word_lut, max_size)`.
    pub fn compile_program_with_genotype(&mut self, source: &str, genotype: &Genotype) -> SeniResult<Program> {
        trait_genotype::compile_program_with_genotype_entries(source, genotype, &mut self.words, &self.keywords, &self.limits)
    }

    /// `run(vm, env, program)`. Render output is read back from
    /// `vm.render` afterwards as a sequence of render packets.
    pub fn run(&self, vm: &mut Vm, program: &Program) -> SeniResult<()> {
        vm.run(program, &self.natives)
    }

    #[must_use]
    pub fn render(vm: &Vm) -> &RenderBuffer {
        &vm.render
    }

    /// `compile_trait_list(source, word_lut)`.
    pub fn compile_trait_list(&mut self, source: &str) -> SeniResult<TraitList> {
        trait_genotype::compile_trait_list(source, &mut self.words, &self.keywords, &self.limits)
    }

    pub fn serialize_trait_list(list: &TraitList) -> String {
        trait_genotype::serialize_trait_list(list)
    }

    pub fn deserialize_trait_list(&mut self, text: &str) -> SeniResult<TraitList> {
        trait_genotype::deserialize_trait_list(text, &mut self.words, &self.keywords, &self.limits)
    }

    /// `build_genotype(vm, env, trait_list, seed)`. The scratch VM this
    /// draws genes on is internal to the trait engine (§4.5), so the host
    /// only threads the seed and this host's own limits/natives through.
    pub fn build_genotype(&self, trait_list: &TraitList, seed: u64) -> SeniResult<Genotype> {
        trait_genotype::build_genotype(trait_list, seed, &self.limits, &self.natives)
    }

    pub fn serialize_genotype(genotype: &Genotype) -> String {
        trait_genotype::serialize_genotype(genotype)
    }

    pub fn deserialize_genotype(text: &str) -> SeniResult<Genotype> {
        trait_genotype::deserialize_genotype(text)
    }

    /// `next_generation(parents, size, mutation_rate, rng, traits)`.
    pub fn next_generation(
        &self,
        parents: &[Genotype],
        size: usize,
        mutation_rate: f32,
        master_seed: u64,
        trait_list: &TraitList,
    ) -> SeniResult<Vec<Genotype>> {
        trait_genotype::next_generation(parents, size, mutation_rate, master_seed, trait_list, &self.limits, &self.natives)
    }

    /// `unparse(out_cursor, word_lut, ast, genotype)`.
    pub fn unparse(&self, top: &[Node], genotype: &Genotype) -> SeniResult<String> {
        unparser::unparse(top, genotype, &self.keywords, &self.words)
    }

    /// `simplified_unparse(out_cursor, word_lut, ast)`.
    pub fn simplified_unparse(&mut self, top: &[Node]) -> SeniResult<String> {
        unparser::simplified_unparse(top, &mut self.words, &self.keywords, &self.limits, &self.natives)
    }
}

/// Convenience used by hosts that materialise a genotype and immediately
/// want every drawn gene as a flat list (e.g. for a debug dump), rather than
/// reaching into [`Genotype`] directly.
#[must_use]
pub fn genes_of(genotype: &Genotype) -> &[GeneValue] {
    &genotype.genes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_runs_a_simple_program() {
        let mut host = Host::systems_startup();
        let program = host.compile_program("(+ 3 4)").unwrap();
        let mut vm = host.allocate_vm();
        host.run(&mut vm, &program).unwrap();
        assert_eq!(vm.stack[vm.sp - 1], crate::value::Value::Float(7.0));
    }

    #[test]
    fn builds_a_genotype_and_compiles_against_it() {
        let mut host = Host::systems_startup();
        let source = "(+ {1 (gen/scalar)} {2 (gen/scalar)})";
        let traits = host.compile_trait_list(source).unwrap();
        let genotype = host.build_genotype(&traits, 11).unwrap();
        let program = host.compile_program_with_genotype(source, &genotype).unwrap();
        let mut vm = host.allocate_vm();
        host.run(&mut vm, &program).unwrap();
        assert!(matches!(vm.stack[vm.sp - 1], crate::value::Value::Float(_)));
    }

    #[test]
    fn unparse_round_trips_through_the_host() {
        let mut host = Host::systems_startup();
        let source = "{0.5 (gen/scalar)}";
        let traits = host.compile_trait_list(source).unwrap();
        let genotype = host.build_genotype(&traits, 3).unwrap();
        let top = host.parse(source).unwrap();
        let out = host.unparse(&top, &genotype).unwrap();
        assert!(out.contains("(gen/scalar)"));
    }

    #[test]
    fn reset_words_keeps_scripts_independent() {
        let mut host = Host::systems_startup();
        host.compile_program("(define my-var 1)").unwrap();
        host.reset_words();
        // a second, unrelated script compiles cleanly after the reset.
        host.compile_program("(define other-var 2)").unwrap();
    }
}
