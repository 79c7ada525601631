//! `prng/build`, `prng/values` and `perlin/noise`: the two external
//! collaborators named in the overview (§1), bound as ordinary natives so
//! scripts reach them the same way as every other built-in (SPEC_FULL §B).

use crate::error::{SeniError, SeniResult};
use crate::prng::{perlin3, Prng};
use crate::value::Value;
use crate::vm::Vm;
use crate::word_table::Iname;

use super::{arg, labels};

fn state_vector(vm: &mut Vm, prng: Prng, min: f32, max: f32) -> SeniResult<Value> {
    let (state, inc) = prng.words();
    let head = vm
        .heap
        .from_slice(&[Value::Long(state), Value::Long(inc), Value::Float(f64::from(min)), Value::Float(f64::from(max))])?;
    Ok(Value::Vector(head))
}

fn read_state(vm: &Vm, value: Value) -> SeniResult<(Prng, f32, f32)> {
    let Value::Vector(head) = value else {
        return Err(SeniError::TypeMismatch { op: "prng state", found: value.type_name() });
    };
    let elements = vm.heap.to_vec(head);
    let (state, inc, min, max) = match elements.as_slice() {
        [Value::Long(state), Value::Long(inc), min, max] => (*state, *inc, *min, *max),
        _ => return Err(SeniError::TypeMismatch { op: "prng state", found: "malformed prng vector" }),
    };
    let min = min.as_f32().ok_or(SeniError::TypeMismatch { op: "prng state", found: "non-numeric min" })?;
    let max = max.as_f32().ok_or(SeniError::TypeMismatch { op: "prng state", found: "non-numeric max" })?;
    Ok((Prng::from_words(state, inc), min, max))
}

/// `(prng/build seed: s min: lo max: hi)` — a fresh generator state, carried
/// around scripts as an ordinary vector value (§3 "LONG ... used only to
/// smuggle PRNG state inside vectors").
pub fn build(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let seed = arg(args, kw.seed, Value::Float(0.0)).as_f64().unwrap_or(0.0) as u64;
    let min = arg(args, kw.min, Value::Float(0.0)).as_f32().unwrap_or(0.0);
    let max = arg(args, kw.max, Value::Float(1.0)).as_f32().unwrap_or(1.0);
    let prng = Prng::seeded(seed);
    state_vector(vm, prng, min, max)
}

/// `(prng/values from: state num: n)` — draws `n` values in `[min, max)`
/// from `state`, returned as a fresh vector (the input state is not
/// threaded back; reseed via `prng/build` for a new sequence).
pub fn values(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let state_value = arg(args, kw.from, Value::Vector(None));
    let (mut prng, min, max) = read_state(vm, state_value)?;
    let num = arg(args, kw.num, Value::Float(1.0)).as_f64().unwrap_or(1.0) as usize;
    let drawn: Vec<Value> = (0..num).map(|_| Value::Float(f64::from(prng.range_f32(min, max)))).collect();
    Ok(Value::Vector(vm.heap.from_slice(&drawn)?))
}

/// `(perlin/noise x: x y: y z: z)`.
pub fn noise(_vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let x = arg(args, kw.x, Value::Float(0.0)).as_f32().unwrap_or(0.0);
    let y = arg(args, kw.y, Value::Float(0.0)).as_f32().unwrap_or(0.0);
    let z = arg(args, kw.z, Value::Float(0.0)).as_f32().unwrap_or(0.0);
    Ok(Value::Float(f64::from(perlin3(x, y, z))))
}
