//! `gen/*` natives: the default-generators a trait's `parameter_ast` calls
//! to materialise a gene (§4.5 "gene materialisation"). Each draws from
//! `vm.gen_rng` rather than a fresh generator, so a genotype build produces
//! one continuous, reproducible sequence across every trait compiled in
//! pre-order.

use crate::error::SeniError;
use crate::error::SeniResult;
use crate::value::{ColourFormat, Value};
use crate::vm::Vm;
use crate::word_table::Iname;

use super::arg;

/// `(gen/scalar min: lo max: hi)` — a float in `[min, max)`, default `[0, 1)`.
pub fn scalar(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let min = args.first().map_or(0.0, |(_, v)| v.as_f32().unwrap_or(0.0));
    let max = args.get(1).map_or(1.0, |(_, v)| v.as_f32().unwrap_or(1.0));
    Ok(Value::Float(f64::from(vm.gen_rng.range_f32(min, max))))
}

/// `(gen/int min: lo max: hi)` — an integer in `[min, max]`.
pub fn int(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let min = args.first().map_or(0.0, |(_, v)| v.as_f32().unwrap_or(0.0));
    let max = args.get(1).map_or(1.0, |(_, v)| v.as_f32().unwrap_or(1.0));
    let drawn = vm.gen_rng.range_f32(min, max + 1.0).floor();
    Ok(Value::Int(drawn as i64))
}

/// `(gen/select from: [a b c ...])` — picks one element uniformly.
pub fn select(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let from_label = args.first().map(|(l, _)| *l).ok_or(SeniError::TypeMismatch { op: "gen/select", found: "missing 'from'" })?;
    let options = arg(args, from_label, Value::Vector(None));
    let Value::Vector(head) = options else {
        return Err(SeniError::TypeMismatch { op: "gen/select", found: options.type_name() });
    };
    let elements = vm.heap.to_vec(head);
    if elements.is_empty() {
        return Err(SeniError::TypeMismatch { op: "gen/select", found: "empty 'from'" });
    }
    let index = (vm.gen_rng.range_f32(0.0, elements.len() as f32) as usize).min(elements.len() - 1);
    Ok(elements[index])
}

/// `(gen/2d min: lo max: hi)` — an independently-drawn 2D pair.
pub fn two_d(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let min = args.first().map_or(0.0, |(_, v)| v.as_f32().unwrap_or(0.0));
    let max = args.get(1).map_or(1.0, |(_, v)| v.as_f32().unwrap_or(1.0));
    let x = vm.gen_rng.range_f32(min, max);
    let y = vm.gen_rng.range_f32(min, max);
    Ok(Value::Vec2(x, y))
}

/// `(gen/colour)` — a random opaque RGB colour.
pub fn colour(vm: &mut Vm, _args: &[(Iname, Value)]) -> SeniResult<Value> {
    let r = vm.gen_rng.range_f32(0.0, 1.0);
    let g = vm.gen_rng.range_f32(0.0, 1.0);
    let b = vm.gen_rng.range_f32(0.0, 1.0);
    Ok(Value::Colour(ColourFormat::Rgb, [r, g, b, 1.0]))
}
