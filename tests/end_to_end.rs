//! End-to-end scenarios driven entirely through [`seni::Host`] — the worked
//! examples a script author (or the CLI) would actually run, as opposed to
//! the unit tests living alongside each module that exercise one piece of
//! machinery in isolation.

use pretty_assertions::assert_eq;
use seni::{Host, Value};

fn run(host: &mut Host, source: &str) -> Value {
    let program = host.compile_program(source).unwrap();
    let mut vm = host.allocate_vm();
    host.run(&mut vm, &program).unwrap();
    vm.stack[vm.sp - 1]
}

#[test]
fn sum_of_four_operands() {
    let mut host = Host::systems_startup();
    assert_eq!(run(&mut host, "(+ 3 4 5 6)"), Value::Float(18.0));
}

#[test]
fn two_top_level_defines_summed() {
    let mut host = Host::systems_startup();
    assert_eq!(run(&mut host, "(define a 6) (define b 7) (+ a b)"), Value::Float(13.0));
}

#[test]
fn default_argument_override_and_fallback() {
    let mut host = Host::systems_startup();
    let overridden = run(&mut host, "(fn (adder a: 9 b: 8) (+ a b)) (adder a: 5 b: 3)");
    assert_eq!(overridden, Value::Float(8.0));

    let defaulted = run(&mut host, "(fn (adder a: 9 b: 8) (+ a b)) (adder b: 20)");
    assert_eq!(defaulted, Value::Float(29.0));
}

#[test]
fn fence_quantity_three_visits_evenly_spaced_samples() {
    let mut host = Host::systems_startup();
    let value = run(
        &mut host,
        "(define v []) (fence (x from: 0 to: 10 quantity: 3) (setq v (vector/append value: v element: x))) (nth vector: v n: 1)",
    );
    assert_eq!(value, Value::Float(5.0));
}

#[test]
fn prng_build_and_draw_is_deterministic_across_runs() {
    let mut host = Host::systems_startup();
    let source = "(fn (f) (define rng (prng/build min: -1 max: 1 seed: 3234)) \
                   (define [a b c] (prng/values num: 3 from: rng)) (+ a b c)) (f)";
    let first = run(&mut host, source);
    let second = run(&mut host, source);
    assert_eq!(first, second);
    match first {
        Value::Float(f) => assert!((-3.0..=3.0).contains(&f), "sum of three draws in [-1, 1) must stay bounded"),
        other => panic!("expected a float, got {other:?}"),
    }
}

#[test]
fn destructure_a_two_vector_and_measure_distance() {
    let mut host = Host::systems_startup();
    assert_eq!(run(&mut host, "(define [a b] [4 5]) (- b a)"), Value::Float(1.0));
    assert_eq!(run(&mut host, "(math/distance vec1: [0 3] vec2: [4 0])"), Value::Float(5.0));
}

#[test]
fn empty_vector_append_then_iterate() {
    let mut host = Host::systems_startup();
    let value = run(
        &mut host,
        "(define v []) (setq v (vector/append value: v element: 1)) (setq v (vector/append value: v element: 2)) (vector/length vector: v)",
    );
    assert_eq!(value, Value::Float(2.0));
}

#[test]
fn two_element_vector_literal_is_a_vec2_not_a_heap_vector() {
    let mut host = Host::systems_startup();
    // (nth ...) on a literal pair only works because [4 5] lowers to SQUISH2
    // and PILE/nth both understand Vec2 directly, not via the heap arena.
    assert_eq!(run(&mut host, "(define pair [4 5]) (nth vector: pair n: 0)"), Value::Float(4.0));
}

#[test]
fn mutual_top_level_fn_references_either_declaration_order() {
    let mut host = Host::systems_startup();
    let forward = run(&mut host, "(fn (is-even n) (if (= n 0) true (is-odd (- n 1)))) (fn (is-odd n) (if (= n 0) false (is-even (- n 1)))) (is-even 4)");
    assert_eq!(forward, Value::Bool(true));

    let backward = run(&mut host, "(fn (is-odd n) (if (= n 0) false (is-even (- n 1)))) (fn (is-even n) (if (= n 0) true (is-odd (- n 1)))) (is-odd 3)");
    assert_eq!(backward, Value::Bool(true));
}

#[test]
fn loop_variants_cover_to_upto_increment_and_steps() {
    let mut host = Host::systems_startup();
    // `to` is exclusive: 0, 2, 4, 6, 8 summed.
    assert_eq!(
        run(&mut host, "(define total 0) (loop (i from: 0 to: 10 increment: 2) (setq total (+ total i))) total"),
        Value::Float(20.0)
    );
    // `upto` is inclusive: 0..=10 summed in steps of 5 -> 0, 5, 10.
    assert_eq!(
        run(&mut host, "(define total 0) (loop (i from: 0 upto: 10 increment: 5) (setq total (+ total i))) total"),
        Value::Float(15.0)
    );
    // `steps` with `upto` evenly spaces the given count of samples, inclusive both ends.
    assert_eq!(
        run(&mut host, "(define v []) (loop (i upto: 10 steps: 3) (setq v (vector/append value: v element: i))) (nth vector: v n: 2)"),
        Value::Float(10.0)
    );
}

#[test]
fn trait_extraction_compiles_and_genotype_round_trip_via_the_host() {
    let mut host = Host::systems_startup();
    let source = "(+ {1 (gen/scalar min: 0 max: 1)} {2 (gen/scalar min: 0 max: 1)})";

    let traits = host.compile_trait_list(source).unwrap();
    assert_eq!(traits.len(), 2);

    let genotype = host.build_genotype(&traits, 42).unwrap();
    assert_eq!(genotype.len(), 2);

    let wire = Host::serialize_genotype(&genotype);
    let decoded = Host::deserialize_genotype(&wire).unwrap();
    assert_eq!(decoded.genes, genotype.genes);

    let program = host.compile_program_with_genotype(source, &genotype).unwrap();
    let mut vm = host.allocate_vm();
    host.run(&mut vm, &program).unwrap();
    assert!(matches!(vm.stack[vm.sp - 1], Value::Float(_)));
}

#[test]
fn next_generation_preserves_population_size_and_schema() {
    let mut host = Host::systems_startup();
    let source = "{1 (gen/scalar)} {2 (gen/scalar)} {3 (gen/scalar)}";
    let traits = host.compile_trait_list(source).unwrap();
    let a = host.build_genotype(&traits, 1).unwrap();
    let b = host.build_genotype(&traits, 2).unwrap();

    let children = host.next_generation(&[a, b], 8, 0.3, 123, &traits).unwrap();
    assert_eq!(children.len(), 8);
    for child in &children {
        assert_eq!(child.len(), 3);
    }
}

#[test]
fn unparse_preserves_trait_count_and_simplified_unparse_strips_braces() {
    let mut host = Host::systems_startup();
    let source = "(define x {0.5 (gen/scalar)})";

    let traits = host.compile_trait_list(source).unwrap();
    let genotype = host.build_genotype(&traits, 7).unwrap();
    let top = host.parse(source).unwrap();

    let unparsed = host.unparse(&top, &genotype).unwrap();
    assert!(unparsed.contains("(gen/scalar)"));

    let simplified = host.simplified_unparse(&top).unwrap();
    assert!(!simplified.contains('{'));
}

#[test]
fn a_script_with_no_alterables_is_unaffected_by_unparse() {
    let mut host = Host::systems_startup();
    let source = "(+ 1 2)";
    let top = host.parse(source).unwrap();
    let unparsed = host.unparse(&top, &seni::Genotype::default()).unwrap();
    assert_eq!(unparsed, source);
}

#[test]
fn undefined_name_is_reported_as_a_compile_error_not_a_panic() {
    let mut host = Host::systems_startup();
    let err = host.compile_program("(+ this-is-not-defined 1)").unwrap_err();
    assert_eq!(err.phase(), seni::Phase::Compile);
}
