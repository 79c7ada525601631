//! The heap-independent mirror of [`crate::value::Value`] used to carry a
//! materialised gene between the scratch `Vm` a trait's program ran on and
//! whichever `Vm` later compiles-with-genotype (§4.5 "gene materialisation").
//! `Value::Vector` only carries a `HeapId` into *one* heap; a gene computed
//! on a trait's throwaway VM must be deep-copied out before that heap goes
//! away, so `GeneValue::Vector` owns its elements directly instead.

use crate::builder::CodeBuilder;
use crate::heap::Heap;
use crate::opcode::Opcode;
use crate::value::{ColourFormat, Value};
use crate::word_table::Iname;

#[derive(Debug, Clone, PartialEq)]
pub enum GeneValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Name(Iname),
    Colour(ColourFormat, [f32; 4]),
    Vec2(f32, f32),
    Vector(Vec<GeneValue>),
}

impl GeneValue {
    /// Deep-copies a runtime `Value` out of `heap` into an owned tree (§4.5).
    #[must_use]
    pub fn from_value(heap: &Heap, value: Value) -> Self {
        match value {
            Value::Int(i) => Self::Int(i),
            Value::Float(f) => Self::Float(f),
            Value::Bool(b) => Self::Bool(b),
            Value::Long(l) => Self::Int(l as i64),
            Value::Name(n) => Self::Name(n),
            Value::Colour(format, rgba) => Self::Colour(format, rgba),
            Value::Vec2(x, y) => Self::Vec2(x, y),
            Value::Vector(head) => Self::Vector(heap.to_vec(head).into_iter().map(|v| Self::from_value(heap, v)).collect()),
        }
    }

    /// Emits the bytecode that reconstructs this value on the stack, used by
    /// compile-with-genotype instead of lowering an alterable node's
    /// textual default (§4.5 "compile with genotype").
    pub fn emit(&self, builder: &mut CodeBuilder) {
        match self {
            Self::Int(i) => {
                builder.emit_const(Value::Int(*i));
            }
            Self::Float(f) => {
                builder.emit_const(Value::Float(*f));
            }
            Self::Bool(b) => {
                builder.emit_const(Value::Bool(*b));
            }
            Self::Name(n) => {
                builder.emit_const(Value::Name(*n));
            }
            Self::Colour(format, rgba) => {
                builder.emit_const(Value::Colour(*format, *rgba));
            }
            Self::Vec2(x, y) => {
                builder.emit_const(Value::Float(f64::from(*x)));
                builder.emit_const(Value::Float(f64::from(*y)));
                builder.emit0(Opcode::Squish2);
            }
            Self::Vector(items) => {
                builder.emit_const(Value::Vector(None));
                for item in items {
                    item.emit(builder);
                    builder.emit0(Opcode::Append);
                }
            }
        }
    }
}

/// Draws genes from a genotype in pre-order during compile-with-genotype
/// (§4.5). Errors if the schema runs dry before the AST does.
#[derive(Debug, Clone)]
pub struct GeneCursor<'a> {
    genes: &'a [GeneValue],
    pos: usize,
}

impl<'a> GeneCursor<'a> {
    #[must_use]
    pub fn new(genes: &'a [GeneValue]) -> Self {
        Self { genes, pos: 0 }
    }

    pub fn next(&mut self) -> Option<&'a GeneValue> {
        let value = self.genes.get(self.pos)?;
        self.pos += 1;
        Some(value)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.genes.len()
    }

    /// Total genes in the underlying genotype, used to report a precise
    /// `GeneCountMismatch` rather than a placeholder pair.
    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Genes drawn so far.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_gene_emits_append_chain() {
        let mut builder = CodeBuilder::new();
        let gene = GeneValue::Vector(vec![GeneValue::Float(1.0), GeneValue::Float(2.0)]);
        gene.emit(&mut builder);
        let program = builder.build();
        assert_eq!(program.code.last().unwrap().op, Opcode::Append);
    }

    #[test]
    fn cursor_reports_exhaustion() {
        let genes = vec![GeneValue::Int(1)];
        let mut cursor = GeneCursor::new(&genes);
        assert!(cursor.next().is_some());
        assert!(cursor.is_exhausted());
        assert!(cursor.next().is_none());
    }
}
