//! `CodeBuilder`: an append-only cursor over a [`Program`] under
//! construction, with jump-label patching (§4.3 "Forward references").
//!
//! Grounded on the teacher's `bytecode/builder.rs` (`emit`/`emit_jump`
//! returning a `JumpLabel`/`patch_jump`/`current_offset`), adapted from a
//! single-function byte-code-and-constants builder to Seni's one-big-array,
//! `(op, arg0, arg1)`-instruction shape.

use crate::opcode::Opcode;
use crate::program::{FnInfo, Instruction, Program};
use crate::value::Value;
use crate::word_table::Iname;

/// A forward reference to a not-yet-known jump target, returned by
/// [`CodeBuilder::emit_jump`]. Must be consumed exactly once by
/// [`CodeBuilder::patch_jump`] before [`CodeBuilder::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpLabel(usize);

pub struct CodeBuilder {
    program: Program,
    stack_depth: i32,
    max_stack_depth: i32,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: Program::new(),
            stack_depth: 0,
            max_stack_depth: 0,
        }
    }

    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.program.code.len()
    }

    /// Emits an instruction, tracking the running stack depth for whichever
    /// function is currently being built (callers reset tracking with
    /// [`CodeBuilder::begin_fn_body`]).
    pub fn emit(&mut self, op: Opcode, arg0: i64, arg1: i64) -> usize {
        let offset = self.current_offset();
        self.program.code.push(Instruction::new(op, arg0, arg1));
        self.stack_depth += op.stack_delta();
        self.max_stack_depth = self.max_stack_depth.max(self.stack_depth);
        offset
    }

    pub fn emit0(&mut self, op: Opcode) -> usize {
        self.emit(op, 0, 0)
    }

    /// Emits an instruction whose stack effect depends on its operands —
    /// `Native`'s pushed/popped label-value pairs, `Pile`'s element count —
    /// rather than being fixed per opcode as `Opcode::stack_delta` assumes.
    /// `delta` overrides it for depth tracking only; the emitted instruction
    /// itself is identical to one built with [`CodeBuilder::emit`].
    pub fn emit_with_delta(&mut self, op: Opcode, arg0: i64, arg1: i64, delta: i32) -> usize {
        let offset = self.current_offset();
        self.program.code.push(Instruction::new(op, arg0, arg1));
        self.stack_depth += delta;
        self.max_stack_depth = self.max_stack_depth.max(self.stack_depth);
        offset
    }

    /// Emits a jump to an already-known offset (a loop's back-edge), where
    /// `emit_jump`'s forward-patch dance isn't needed.
    pub fn emit_jump_to(&mut self, op: Opcode, target: usize) -> usize {
        self.emit(op, target as i64, 0)
    }

    /// Interns `value` into the constant pool and emits a `LoadConst` for it.
    pub fn emit_const(&mut self, value: Value) -> usize {
        let idx = self.program.constants.push(value);
        self.emit(Opcode::LoadConst, idx as i64, 0)
    }

    /// Emits a placeholder jump and returns a label to patch once the real
    /// target offset is known (used for `if`'s else-branch, `loop`/`fence`
    /// back-edges, and short-circuiting `and`/`or`).
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        let offset = self.emit(op, 0, 0);
        JumpLabel(offset)
    }

    /// Patches a previously emitted jump to target the current offset.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = self.current_offset() as i64;
        self.program.code[label.0].arg0 = target;
    }

    /// Patches a previously emitted jump to target an explicit offset
    /// (back-edges, where the target is already known when the jump is
    /// emitted).
    pub fn patch_jump_to(&mut self, label: JumpLabel, target: usize) {
        self.program.code[label.0].arg0 = target as i64;
    }

    /// Resets stack-depth tracking at the start of each function body (the
    /// top-level form and every `fn` share the same flat `code` array but
    /// track depth independently).
    pub fn begin_fn_body(&mut self) {
        self.stack_depth = 0;
        self.max_stack_depth = 0;
    }

    #[must_use]
    pub fn max_stack_depth(&self) -> u16 {
        u16::try_from(self.max_stack_depth.max(0)).unwrap_or(u16::MAX)
    }

    /// The running depth at this point in the current function body, used
    /// by `loop`/`fence` emission to drop unused per-iteration residue
    /// (their body is evaluated for effect, not value) back to the depth it
    /// had before the body ran.
    #[must_use]
    pub fn current_stack_depth(&self) -> i32 {
        self.stack_depth
    }

    /// Reserves a function slot (compiler pass 1); the body is filled in
    /// later by [`CodeBuilder::finish_fn`] once pass 2 emits it.
    pub fn reserve_fn(&mut self, fn_iname: Iname) -> u16 {
        let index = u16::try_from(self.program.fn_info.len()).expect("too many top-level functions");
        self.program.fn_info.push(FnInfo::reserved(index, fn_iname));
        index
    }

    pub fn fn_info_mut(&mut self, index: u16) -> &mut FnInfo {
        &mut self.program.fn_info[index as usize]
    }

    pub fn finish_fn(
        &mut self,
        index: u16,
        num_args: u16,
        arg_address: u16,
        body_address: u16,
        argument_inames: Vec<Iname>,
    ) {
        let info = self.fn_info_mut(index);
        info.active = true;
        info.num_args = num_args;
        info.arg_address = arg_address;
        info.body_address = body_address;
        info.argument_inames = argument_inames;
        info.max_stack = self.max_stack_depth();
    }

    pub fn set_num_globals(&mut self, num_globals: u16) {
        self.program.num_globals = num_globals;
    }

    /// Consumes the builder, yielding the completed program. Panics if any
    /// `PLACEHOLDER_*` opcode was left unpatched — that is always a
    /// compiler bug, never a user-facing condition.
    #[must_use]
    pub fn build(self) -> Program {
        assert!(
            !self.program.has_unpatched_placeholders(),
            "compiler emitted an unpatched placeholder opcode"
        );
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_tracks_stack_depth_via_opcode_deltas() {
        let mut b = CodeBuilder::new();
        b.emit0(Opcode::Load); // +1
        b.emit0(Opcode::Load); // +1
        b.emit0(Opcode::Add); // -1
        assert_eq!(b.max_stack_depth(), 2);
    }

    #[test]
    fn patch_jump_writes_current_offset_into_arg0() {
        let mut b = CodeBuilder::new();
        let label = b.emit_jump(Opcode::Jump);
        b.emit0(Opcode::Stop);
        b.emit0(Opcode::Stop);
        b.patch_jump(label);
        let program = b.build();
        assert_eq!(program.code[0].arg0, 2);
    }

    #[test]
    fn build_panics_on_unpatched_placeholder() {
        let mut b = CodeBuilder::new();
        b.emit_jump(Opcode::PlaceholderJump);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| b.build()));
        assert!(result.is_err());
    }
}
