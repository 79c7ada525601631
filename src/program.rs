//! The compiled artifact: a flat instruction array plus per-function
//! metadata (§4.3, §4.1 table row 3 "Program").
//!
//! Grounded on the teacher's `bytecode/code.rs` `Code` struct (flat byte
//! array + side tables for constants/locations/exceptions); Seni's
//! equivalent side table is `fn_info`, since forward function references
//! (§4.3 "Forward references") are resolved against function *metadata*,
//! not constants.

use crate::opcode::Opcode;
use crate::value::Value;
use crate::word_table::Iname;

/// Which memory segment a `Load`/`Store`/`StoreF` instruction addresses
/// (§4.3). Encoded as `arg0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum MemSegment {
    Local = 0,
    Argument = 1,
    Global = 2,
    Void = 3,
}

impl MemSegment {
    #[must_use]
    pub fn from_tag(tag: i64) -> Self {
        match tag {
            0 => Self::Local,
            1 => Self::Argument,
            2 => Self::Global,
            3 => Self::Void,
            other => panic!("bad memory segment tag {other}"),
        }
    }
}

/// Constant table: every `LoadConst` instruction indexes into this pool
/// instead of carrying a [`Value`] inline (mirrors the teacher's
/// `ConstPool`, adapted to `Value`'s `Copy` semantics — no `clone_immediate`
/// split needed here since Seni's heap does not refcount).
#[derive(Debug, Clone, Default)]
pub struct ConstPool {
    values: Vec<Value>,
}

impl ConstPool {
    pub fn push(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.values[index]
    }
}

/// One bytecode instruction. Operands are untyped `i64`s whose meaning
/// depends on `op` (e.g. `Load`'s `arg0` is a memory segment tag and
/// `arg1` an address; `Native`'s `arg0` is a native-function iname offset).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub op: Opcode,
    pub arg0: i64,
    pub arg1: i64,
}

impl Instruction {
    #[must_use]
    pub fn new(op: Opcode, arg0: i64, arg1: i64) -> Self {
        Self { op, arg0, arg1 }
    }
}

/// Per-function metadata registered in compiler pass 1, filled in by pass 2
/// (§4.3 "two-pass"). `active` distinguishes a forward-declared slot that
/// pass 1 reserved from one pass 2 has actually emitted a body for.
#[derive(Debug, Clone)]
pub struct FnInfo {
    pub active: bool,
    pub index: u16,
    pub fn_iname: Iname,
    pub num_args: u16,
    /// Bytecode offset of the CALL-time argument-default block.
    pub arg_address: u16,
    /// Bytecode offset of the function body (the CALL_0 entry point).
    pub body_address: u16,
    /// Labelled-argument iname for each formal, in declaration order — used
    /// by the compiler to match caller-supplied labels against ARG slots.
    pub argument_inames: Vec<Iname>,
    /// High-water mark of operand-stack depth reached while emitting this
    /// function's body, tracked by [`crate::builder::CodeBuilder`].
    pub max_stack: u16,
}

impl FnInfo {
    #[must_use]
    pub fn reserved(index: u16, fn_iname: Iname) -> Self {
        Self {
            active: false,
            index,
            fn_iname,
            num_args: 0,
            arg_address: 0,
            body_address: 0,
            argument_inames: Vec::new(),
            max_stack: 0,
        }
    }
}

/// The compiled program: a single flat instruction stream shared by the
/// top-level form and every function body, plus the function side table.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub code: Vec<Instruction>,
    pub constants: ConstPool,
    pub fn_info: Vec<FnInfo>,
    pub num_globals: u16,
}

impl Program {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanity check run once compilation finishes: no `PLACEHOLDER_*`
    /// sentinel may survive into a program the VM will execute (§4.3).
    #[must_use]
    pub fn has_unpatched_placeholders(&self) -> bool {
        self.code.iter().any(|ins| ins.op.is_placeholder())
    }

    #[must_use]
    pub fn fn_info_by_iname(&self, fn_iname: Iname) -> Option<&FnInfo> {
        self.fn_info.iter().find(|f| f.fn_iname == fn_iname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unpatched_placeholders() {
        let mut program = Program::new();
        program.code.push(Instruction::new(Opcode::PlaceholderJump, 0, 0));
        assert!(program.has_unpatched_placeholders());
    }

    #[test]
    fn clean_program_has_no_placeholders() {
        let mut program = Program::new();
        program.code.push(Instruction::new(Opcode::Stop, 0, 0));
        assert!(!program.has_unpatched_placeholders());
    }
}
