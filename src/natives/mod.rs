//! The native function binding table (§4.1 table row 8 "Native library
//! façade").
//!
//! Grounded on the teacher's syscall dispatch table (`syscall/mod.rs`'s
//! `AHashMap<u32, SyscallHandler>` built once at startup and indexed by a
//! dense small integer), adapted here to index by NATIVE-range [`Iname`]
//! instead of a raw syscall number. Argument reading mirrors `test.c`'s
//! native call sites in `original_source/app/c`: every native reads its
//! operands as `(label, value)` pairs rather than positionally, since the
//! language surface always calls natives with labelled arguments (§4.3
//! "Native function call sites").

mod colour;
mod gen;
mod geometry;
mod math;
mod prng_natives;
mod vector;

use std::sync::OnceLock;

use ahash::AHashMap;

use crate::error::{SeniError, SeniResult};
use crate::keywords::Keywords;
use crate::value::Value;
use crate::vm::NativeFn;
use crate::word_table::{Iname, WordTable};

/// Canonical argument-label inames, shared by every native (§4.3 "Native
/// function call sites"). Keyword registration is a fixed, deterministic
/// sequence (`Keywords::register`), so running it once against a throwaway
/// word table yields the exact same inames a host's real word table would —
/// this just avoids threading `Keywords` through `Vm`/`NativeFn` only to
/// read a handful of constants back out of it.
pub(crate) fn labels() -> &'static Keywords {
    static LABELS: OnceLock<Keywords> = OnceLock::new();
    LABELS.get_or_init(|| Keywords::register(&mut WordTable::new()))
}

/// Every NATIVE-range name the language binds a function to, pre-resolved
/// during subsystem startup (mirrors [`crate::keywords::Keywords`]).
#[derive(Debug, Clone, Copy)]
pub struct NativeNames {
    pub vector_append: Iname,
    pub vector_length: Iname,
    pub nth: Iname,
    pub math_distance: Iname,
    pub math_clamp: Iname,
    pub prng_build: Iname,
    pub prng_values: Iname,
    pub perlin_noise: Iname,
    pub col_rgb: Iname,
    pub col_hsl: Iname,
    pub col_complementary: Iname,
    pub line: Iname,
    pub rect: Iname,
    pub circle: Iname,
    pub bezier: Iname,
    pub gen_scalar: Iname,
    pub gen_int: Iname,
    pub gen_select: Iname,
    pub gen_2d: Iname,
    pub gen_colour: Iname,
}

impl NativeNames {
    pub fn register(words: &mut WordTable) -> Self {
        Self {
            vector_append: words.register_native("vector/append"),
            vector_length: words.register_native("vector/length"),
            nth: words.register_native("nth"),
            math_distance: words.register_native("math/distance"),
            math_clamp: words.register_native("math/clamp"),
            prng_build: words.register_native("prng/build"),
            prng_values: words.register_native("prng/values"),
            perlin_noise: words.register_native("perlin/noise"),
            col_rgb: words.register_native("col/rgb"),
            col_hsl: words.register_native("col/hsl"),
            col_complementary: words.register_native("col/complementary"),
            line: words.register_native("line"),
            rect: words.register_native("rect"),
            circle: words.register_native("circle"),
            bezier: words.register_native("bezier"),
            gen_scalar: words.register_native("gen/scalar"),
            gen_int: words.register_native("gen/int"),
            gen_select: words.register_native("gen/select"),
            gen_2d: words.register_native("gen/2d"),
            gen_colour: words.register_native("gen/colour"),
        }
    }
}

/// `iname -> implementation` table, built once from [`NativeNames`] at
/// subsystem startup and shared read-only across every VM run.
#[derive(Default)]
pub struct NativeTable {
    fns: AHashMap<Iname, NativeFn>,
}

impl NativeTable {
    #[must_use]
    pub fn build(names: &NativeNames) -> Self {
        let mut fns: AHashMap<Iname, NativeFn> = AHashMap::default();
        fns.insert(names.vector_append, vector::append);
        fns.insert(names.vector_length, vector::length);
        fns.insert(names.nth, vector::nth);
        fns.insert(names.math_distance, math::distance);
        fns.insert(names.math_clamp, math::clamp);
        fns.insert(names.prng_build, prng_natives::build);
        fns.insert(names.prng_values, prng_natives::values);
        fns.insert(names.perlin_noise, prng_natives::noise);
        fns.insert(names.col_rgb, colour::rgb);
        fns.insert(names.col_hsl, colour::hsl);
        fns.insert(names.col_complementary, colour::complementary);
        fns.insert(names.line, geometry::line);
        fns.insert(names.rect, geometry::rect);
        fns.insert(names.circle, geometry::circle);
        fns.insert(names.bezier, geometry::bezier);
        fns.insert(names.gen_scalar, gen::scalar);
        fns.insert(names.gen_int, gen::int);
        fns.insert(names.gen_select, gen::select);
        fns.insert(names.gen_2d, gen::two_d);
        fns.insert(names.gen_colour, gen::colour);
        Self { fns }
    }

    #[must_use]
    pub fn get(&self, iname: Iname) -> Option<NativeFn> {
        self.fns.get(&iname).copied()
    }
}

/// Finds a labelled argument by its interned label name, or falls back to
/// `default` when the caller omitted it — every native argument is
/// optional at the call site, defaults come from the native's own
/// declaration rather than the compiler (§4.3).
pub(crate) fn arg(args: &[(Iname, Value)], label: Iname, default: Value) -> Value {
    args.iter().find(|(l, _)| *l == label).map_or(default, |(_, v)| *v)
}

pub(crate) fn arg_f32(args: &[(Iname, Value)], label: Iname, default: f32) -> SeniResult<f32> {
    let value = arg(args, label, Value::Float(f64::from(default)));
    value.as_f32().ok_or(SeniError::TypeMismatch { op: "native argument", found: value.type_name() })
}

pub(crate) fn arg_vec2(args: &[(Iname, Value)], label: Iname, default: (f32, f32)) -> SeniResult<(f32, f32)> {
    match arg(args, label, Value::Vec2(default.0, default.1)) {
        Value::Vec2(x, y) => Ok((x, y)),
        other => Err(SeniError::TypeMismatch { op: "native argument", found: other.type_name() }),
    }
}

