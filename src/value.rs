//! The runtime value model shared by the VM and the trait/genotype engine
//! (§3 "Values (runtime)").
//!
//! Grounded on the teacher's `Value` enum (`value.rs`): a tagged sum type
//! where small/inline variants carry their payload directly and the one
//! compound variant (`Vector`) carries only a handle into the heap arena.
//! Unlike the teacher's `Value::Ref(HeapId)` + refcounting, Seni's heap is
//! mark-and-sweep (§3 invariants, §9 "ref-counting remnants") so `Vector`
//! carries a plain `Option<HeapId>` with no drop-time bookkeeping at all.

use crate::heap::HeapId;
use crate::word_table::Iname;

/// Colour-space tag for [`Value::Colour`] (§3, §6 `RGB HSL LAB HSV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ColourFormat {
    Rgb,
    Hsl,
    Lab,
    Hsv,
}

/// The tagged runtime value. `Clone`/`Copy` are both safe here (unlike the
/// teacher's `Value`, which withholds `Clone` to protect refcounting)
/// because a `Vector`'s payload is just a heap index — copying the index is
/// exactly the semantics mark-and-sweep wants, no count to keep in sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Smuggles 64-bit PRNG state through a vector slot (§3).
    Long(u64),
    Name(Iname),
    Colour(ColourFormat, [f32; 4]),
    /// Unboxed pair, the common case for 2-vectors (`SQUISH2`, §4.3).
    Vec2(f32, f32),
    /// Head of a heap-allocated list of values. `None` is the empty vector.
    Vector(Option<HeapId>),
}

impl Value {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Long(_) => "long",
            Value::Name(_) => "name",
            Value::Colour(..) => "colour",
            Value::Vec2(..) => "2d",
            Value::Vector(_) => "vector",
        }
    }

    /// Truthiness used by `if`/`JUMP_IF` (§4.3): zero/false/empty are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
            Value::Long(l) => *l != 0,
            Value::Name(_) | Value::Colour(..) | Value::Vec2(..) => true,
            Value::Vector(head) => head.is_some(),
        }
    }

    /// Numeric coercion used by arithmetic opcodes and native readers.
    /// Integer literals are floats after load (§3), but natives may still
    /// hand back an `Int` (e.g. loop counters), so both coerce.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        #[allow(clippy::cast_possible_truncation)]
        self.as_f64().map(|v| v as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec_examples() {
        assert!(!Value::Float(0.0).truthy());
        assert!(Value::Float(0.1).truthy());
        assert!(!Value::Vector(None).truthy());
        assert!(Value::Vec2(0.0, 0.0).truthy());
    }

    #[test]
    fn numeric_coercion_treats_int_as_float_source() {
        assert_eq!(Value::Int(4).as_f64(), Some(4.0));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::Name(Iname::from_raw(0)).as_f64(), None);
    }
}
