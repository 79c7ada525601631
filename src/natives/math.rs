//! Scalar and vector arithmetic natives not already covered by a bytecode
//! opcode (§4.1 table row 8).

use crate::error::{SeniError, SeniResult};
use crate::value::Value;
use crate::vm::Vm;
use crate::word_table::Iname;

use super::{arg, arg_vec2, labels};

/// `(math/distance vec1: a vec2: b)` — Euclidean distance between two 2D
/// points, grounded on `original_source/app/c/test.c`'s `math/distance`
/// call sites which always pass both operands as `Vec2`s.
pub fn distance(_vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let (x1, y1) = arg_vec2(args, kw.vec1, (0.0, 0.0))?;
    let (x2, y2) = arg_vec2(args, kw.vec2, (0.0, 0.0))?;
    let (dx, dy) = (x2 - x1, y2 - y1);
    Ok(Value::Float(f64::from((dx * dx + dy * dy).sqrt())))
}

/// `(math/clamp from: v min: lo max: hi)`.
pub fn clamp(_vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let value = arg(args, kw.from, Value::Float(0.0))
        .as_f64()
        .ok_or(SeniError::TypeMismatch { op: "math/clamp", found: "non-numeric 'from'" })?;
    let min = arg(args, kw.min, Value::Float(0.0)).as_f64().unwrap_or(0.0);
    let max = arg(args, kw.max, Value::Float(1.0)).as_f64().unwrap_or(1.0);
    Ok(Value::Float(value.clamp(min, max)))
}
