//! The stack virtual machine (§4.4).
//!
//! Grounded on the teacher's bytecode `vm/` submodule (`attr.rs`,
//! `compare.rs` — small per-opcode-family helpers dispatched from a central
//! fetch-decode-execute loop) and on `run.rs`'s top-level `execute` entry
//! point, adapted from Monty's namespace-slot model to Seni's frame +
//! hop-back scoping (§3, §9 "frame + hop-back scoping" — deliberately kept
//! intact rather than simplified to closures, since it is the language's
//! only mechanism for default-argument overrides, per the design note).

use crate::config::VmLimits;
use crate::error::{SeniError, SeniResult};
use crate::heap::Heap;
use crate::matrix::MatrixStack;
use crate::opcode::Opcode;
use crate::prng::Prng;
use crate::program::{Instruction, MemSegment, Program};
use crate::render::RenderBuffer;
use crate::value::Value;
use crate::word_table::Iname;

/// A native function reads its labelled arguments off the VM's operand
/// stack and returns a single value (§4.1 table row 8 "Native library
/// façade"). Bound into a table keyed by NATIVE-range iname at subsystem
/// startup; see `crate::natives`.
pub type NativeFn = fn(&mut Vm, &[(Iname, Value)]) -> SeniResult<Value>;

fn as_frame_int(value: Value) -> i64 {
    match value {
        Value::Int(i) => i,
        other => panic!("vm: frame bookkeeping cell holds non-Int value {other:?}"),
    }
}

/// The stack machine. Owns every piece of mutable execution state (§5
/// "Resource ownership" — the VM exclusively owns its stack, heap, matrix
/// stack and render buffer).
pub struct Vm {
    pub stack: Vec<Value>,
    pub sp: usize,
    fp: usize,
    ip: usize,
    pub globals: Vec<Value>,
    pub heap: Heap,
    pub matrix_stack: MatrixStack,
    pub render: RenderBuffer,
    /// Seeded once per genotype build and threaded across the fresh per-trait
    /// `Vm`s the trait/genotype engine runs (§4.5 "gene materialisation") so
    /// the `gen/*` natives draw from one continuous sequence regardless of
    /// which trait's scratch VM is currently running.
    pub gen_rng: Prng,
    limits: VmLimits,
}

/// Sentinel `caller_fp` for the outermost (top-level) pseudo-frame; `RET`
/// at this frame means the program ran off the end without hitting `STOP`.
const NO_CALLER: i64 = -1;

impl Vm {
    #[must_use]
    pub fn new(limits: VmLimits) -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(limits.stack_size),
            sp: 0,
            fp: 0,
            ip: 0,
            globals: Vec::new(),
            heap: Heap::new(limits.heap_cells),
            matrix_stack: MatrixStack::new(),
            render: RenderBuffer::new(),
            gen_rng: Prng::seeded(0),
            limits,
        };
        vm.reset();
        vm
    }

    /// Clears mutable state without freeing backing storage (§5 "`reset`
    /// clears them without freeing"). Called between runs of the same VM.
    /// `gen_rng` is deliberately left untouched: the genotype engine seeds
    /// it once per build and expects it to survive across the per-trait
    /// `reset`+`run` cycles that reuse one scratch `Vm`.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.sp = 0;
        self.heap = Heap::new(self.limits.heap_cells);
        self.matrix_stack.reset();
        self.render.reset();
        self.globals.clear();
        // Top-level pseudo-frame: caller_fp/return_ip/num_args/hop_back.
        self.stack.push(Value::Int(NO_CALLER));
        self.stack.push(Value::Int(0));
        self.stack.push(Value::Int(0));
        self.stack.push(Value::Int(0));
        self.fp = 0;
        for _ in 0..self.limits.locals_per_frame {
            self.stack.push(Value::Bool(false));
        }
        self.sp = self.stack.len();
        self.ip = 0;
    }

    fn push(&mut self, value: Value) -> SeniResult<()> {
        if self.sp >= self.limits.stack_size {
            return Err(SeniError::StackOverflow);
        }
        if self.sp == self.stack.len() {
            self.stack.push(value);
        } else {
            self.stack[self.sp] = value;
        }
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> SeniResult<Value> {
        if self.sp == 0 {
            return Err(SeniError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    fn peek(&self) -> SeniResult<Value> {
        self.stack.get(self.sp.wrapping_sub(1)).copied().ok_or(SeniError::StackUnderflow)
    }

    fn num_args_at(&self, fp: usize) -> u16 {
        u16::try_from(as_frame_int(self.stack[fp + 2])).expect("num_args fits u16")
    }

    fn hop_back_at(&self, fp: usize) -> u16 {
        u16::try_from(as_frame_int(self.stack[fp + 3])).expect("hop_back fits u16")
    }

    fn frame_for_hops(&self, hops: u16) -> usize {
        let mut fp = self.fp;
        for _ in 0..hops {
            fp = as_frame_int(self.stack[fp]) as usize;
        }
        fp
    }

    fn argument_index(&self, fp: usize, slot: u16) -> usize {
        let num_args = self.num_args_at(fp) as usize;
        fp - num_args + slot as usize
    }

    fn local_index(&self, fp: usize, slot: u16) -> usize {
        fp + 4 + slot as usize
    }

    fn load(&mut self, segment: MemSegment, slot: i64) -> SeniResult<Value> {
        let slot = u16::try_from(slot).map_err(|_| SeniError::BadSegment { segment: "negative slot" })?;
        match segment {
            MemSegment::Local => {
                let hops = self.hop_back_at(self.fp);
                let frame = self.frame_for_hops(hops);
                Ok(self.stack[self.local_index(frame, slot)])
            }
            MemSegment::Argument => {
                let hops = self.hop_back_at(self.fp);
                let frame = self.frame_for_hops(hops);
                Ok(self.stack[self.argument_index(frame, slot)])
            }
            MemSegment::Global => self.globals.get(slot as usize).copied().ok_or(SeniError::BadSegment { segment: "global" }),
            MemSegment::Void => Err(SeniError::BadSegment { segment: "cannot LOAD from VOID" }),
        }
    }

    fn store(&mut self, segment: MemSegment, slot: i64, value: Value) -> SeniResult<()> {
        match segment {
            MemSegment::Void => Ok(()), // drop on the floor: loop-body residue, unmatched labels
            MemSegment::Local => {
                let slot = u16::try_from(slot).map_err(|_| SeniError::BadSegment { segment: "negative slot" })?;
                let hops = self.hop_back_at(self.fp);
                let frame = self.frame_for_hops(hops);
                let idx = self.local_index(frame, slot);
                self.stack[idx] = value;
                Ok(())
            }
            // Argument writes never hop back: they install a default (arg_address
            // block) or an actual-argument override (call-site emission) into
            // *this* newly pushed frame, even while hop_back > 0 (§3, §9).
            MemSegment::Argument => {
                let slot = u16::try_from(slot).map_err(|_| SeniError::BadSegment { segment: "negative slot" })?;
                let idx = self.argument_index(self.fp, slot);
                self.stack[idx] = value;
                Ok(())
            }
            MemSegment::Global => {
                let slot = usize::try_from(slot).map_err(|_| SeniError::BadSegment { segment: "negative slot" })?;
                if slot >= self.globals.len() {
                    self.globals.resize(slot + 1, Value::Bool(false));
                }
                self.globals[slot] = value;
                Ok(())
            }
        }
    }

    fn gc_if_needed(&mut self) {
        if self.heap.should_sweep() {
            let roots: Vec<Value> = self.stack[..self.sp].iter().copied().chain(self.globals.iter().copied()).collect();
            self.heap.sweep(roots);
        }
    }

    /// `CALL`: builds a new frame below the callee and jumps to its
    /// `arg_address` block (§3, §4.3 "Function invocation"). The callee's
    /// arity is read from `fn_info` rather than carried on the instruction,
    /// so `CALL` and the indirect `CALL_F` (whose target is only known once
    /// the index is popped off the stack) share one implementation.
    fn do_call(&mut self, program: &Program, fn_index: u16) -> SeniResult<()> {
        let info = program.fn_info.get(fn_index as usize).ok_or(SeniError::UnboundNative { iname: u32::from(fn_index) })?;
        let num_args = info.num_args;
        let arg_address = info.arg_address;
        let parent_hop_back = self.hop_back_at(self.fp);
        for _ in 0..num_args {
            self.push(Value::Bool(false))?;
        }
        let new_fp = self.sp;
        self.push(Value::Int(self.fp as i64))?;
        self.push(Value::Int(self.ip as i64))?;
        self.push(Value::Int(i64::from(num_args)))?;
        self.push(Value::Int(i64::from(parent_hop_back) + 1))?;
        for _ in 0..self.limits.locals_per_frame {
            self.push(Value::Bool(false))?;
        }
        self.fp = new_fp;
        self.ip = arg_address as usize;
        Ok(())
    }

    /// `CALL_0`: reuses the current frame, resetting `hop_back` to 0 and
    /// jumping into the body (§3, §4.4 "Frame convention"). `return_ip` is
    /// re-pointed to just past this instruction: `RET_0` (emitted at the end
    /// of the arg_address block) already consumed the original "just past
    /// CALL" return_ip to get here, and the body's eventual `RET` must land
    /// after `CALL_0`, not loop back into the override-store sequence
    /// between `CALL` and `CALL_0`.
    fn do_call0(&mut self, program: &Program, fn_index: u16) -> SeniResult<()> {
        self.stack[self.fp + 1] = Value::Int(self.ip as i64);
        self.stack[self.fp + 3] = Value::Int(0);
        let info = program.fn_info.get(fn_index as usize).ok_or(SeniError::UnboundNative { iname: u32::from(fn_index) })?;
        self.ip = info.body_address as usize;
        Ok(())
    }

    /// `RET`: pops the current frame, restoring the caller's, and pushes the
    /// return value onto the now-current (caller's) stack.
    fn do_ret(&mut self, value: Value) -> SeniResult<()> {
        let caller_fp = as_frame_int(self.stack[self.fp]);
        let return_ip = as_frame_int(self.stack[self.fp + 1]) as usize;
        let num_args = self.num_args_at(self.fp) as usize;
        self.sp = self.fp - num_args;
        if caller_fp < 0 {
            self.ip = return_ip;
            self.push(value)?;
            return Ok(());
        }
        self.fp = caller_fp as usize;
        self.ip = return_ip;
        self.push(value)
    }

    /// `RET_0`: jumps back to just after the matching `CALL`, without
    /// popping the frame — execution is still mid-call, installing defaults
    /// or actual-argument overrides (§4.3, §4.4).
    fn do_ret0(&mut self) {
        self.ip = as_frame_int(self.stack[self.fp + 1]) as usize;
    }

    fn binary_numeric(&mut self, op: &'static str, f: impl Fn(f64, f64) -> f64) -> SeniResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let (a, b) = (
            a.as_f64().ok_or(SeniError::TypeMismatch { op, found: a.type_name() })?,
            b.as_f64().ok_or(SeniError::TypeMismatch { op, found: b.type_name() })?,
        );
        self.push(Value::Float(f(a, b)))
    }

    fn binary_compare(&mut self, op: &'static str, f: impl Fn(f64, f64) -> bool) -> SeniResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let (a, b) = (
            a.as_f64().ok_or(SeniError::TypeMismatch { op, found: a.type_name() })?,
            b.as_f64().ok_or(SeniError::TypeMismatch { op, found: b.type_name() })?,
        );
        self.push(Value::Bool(f(a, b)))
    }

    fn do_append(&mut self) -> SeniResult<()> {
        let value = self.pop()?;
        let head = self.pop()?;
        let Value::Vector(head) = head else {
            return Err(SeniError::TypeMismatch { op: "APPEND", found: head.type_name() });
        };
        let new_head = match head {
            None => Some(self.heap.cons(value, None)?),
            Some(h) => {
                let mut tail = h;
                while let Some(next) = self.heap.next(tail) {
                    tail = next;
                }
                self.heap.append_after(tail, value)?;
                Some(h)
            }
        };
        self.push(Value::Vector(new_head))
    }

    /// `PILE n`: expands a 2D pair or a heap VECTOR into `n` stack cells, in
    /// source order, for destructuring `(define [a b] ...)` (§4.3).
    fn do_pile(&mut self, n: i64) -> SeniResult<()> {
        let value = self.pop()?;
        let elements: Vec<Value> = match value {
            Value::Vec2(x, y) => vec![Value::Float(f64::from(x)), Value::Float(f64::from(y))],
            Value::Vector(head) => self.heap.to_vec(head),
            other => return Err(SeniError::TypeMismatch { op: "PILE", found: other.type_name() }),
        };
        if elements.len() != n as usize {
            return Err(SeniError::DestructureShapeMismatch { expected: n as usize, found: elements.len() });
        }
        for value in elements {
            self.push(value)?;
        }
        Ok(())
    }

    fn do_native(&mut self, program: &Program, natives: &crate::natives::NativeTable, iname_raw: i64, num_args: i64) -> SeniResult<()> {
        let mut args = Vec::with_capacity(num_args as usize);
        for _ in 0..num_args {
            let value = self.pop()?;
            let label = self.pop()?;
            let Value::Name(label) = label else {
                return Err(SeniError::TypeMismatch { op: "NATIVE", found: label.type_name() });
            };
            args.push((label, value));
        }
        args.reverse();
        let iname = Iname::from_raw(u32::try_from(iname_raw).expect("native iname fits u32"));
        let f = natives.get(iname).ok_or(SeniError::UnboundNative { iname: iname.raw() })?;
        let result = f(self, &args)?;
        let _ = program;
        self.push(result)
    }

    /// Runs `program` to completion (`STOP`) or a fatal [`SeniError`] (§4.4,
    /// §7). On error the VM is left reset to a clean state for the next run.
    pub fn run(&mut self, program: &Program, natives: &crate::natives::NativeTable) -> SeniResult<()> {
        self.ip = 0;
        let result = self.run_inner(program, natives);
        if result.is_err() {
            self.sp = self.stack.len().min(self.sp);
            self.matrix_stack.reset();
        }
        result
    }

    fn run_inner(&mut self, program: &Program, natives: &crate::natives::NativeTable) -> SeniResult<()> {
        loop {
            self.gc_if_needed();
            let Instruction { op, arg0, arg1 } = *program.code.get(self.ip).ok_or(SeniError::BadSegment { segment: "ip past end of code" })?;
            self.ip += 1;
            match op {
                Opcode::LoadConst => {
                    let value = program.constants.get(arg0 as usize);
                    self.push(value)?;
                }
                Opcode::Load => {
                    let value = self.load(MemSegment::from_tag(arg0), arg1)?;
                    self.push(value)?;
                }
                Opcode::Store => {
                    let value = self.pop()?;
                    self.store(MemSegment::from_tag(arg0), arg1, value)?;
                }
                Opcode::Jump => self.ip = arg0 as usize,
                Opcode::JumpIf => {
                    let cond = self.pop()?;
                    if !cond.truthy() {
                        self.ip = arg0 as usize;
                    }
                }
                Opcode::Call => self.do_call(program, u16::try_from(arg0).expect("fn index fits u16"))?,
                Opcode::Call0 => self.do_call0(program, u16::try_from(arg0).expect("fn index fits u16"))?,
                Opcode::CallF => {
                    let index = self.pop()?;
                    let Value::Int(index) = index else {
                        return Err(SeniError::TypeMismatch { op: "CALL_F", found: index.type_name() });
                    };
                    self.do_call(program, u16::try_from(index).expect("fn index fits u16"))?;
                }
                Opcode::CallF0 => {
                    let index = self.pop()?;
                    let Value::Int(index) = index else {
                        return Err(SeniError::TypeMismatch { op: "CALL_F_0", found: index.type_name() });
                    };
                    self.do_call0(program, u16::try_from(index).expect("fn index fits u16"))?;
                }
                Opcode::StoreF => {
                    let index = self.pop()?;
                    let value = self.pop()?;
                    let Value::Int(index) = index else {
                        return Err(SeniError::TypeMismatch { op: "STORE_F", found: index.type_name() });
                    };
                    let info = program
                        .fn_info
                        .get(index as usize)
                        .ok_or(SeniError::UnboundNative { iname: u32::try_from(index).unwrap_or(u32::MAX) })?;
                    if let Some(slot) = info.argument_inames.iter().position(|&n| n.raw() as i64 == arg1) {
                        self.store(MemSegment::Argument, slot as i64, value)?;
                    }
                }
                Opcode::Ret => {
                    let value = self.pop()?;
                    self.do_ret(value)?;
                }
                Opcode::Ret0 => self.do_ret0(),
                Opcode::Native => self.do_native(program, natives, arg0, arg1)?,
                Opcode::Add => self.binary_numeric("+", |a, b| a + b)?,
                Opcode::Sub => self.binary_numeric("-", |a, b| a - b)?,
                Opcode::Mul => self.binary_numeric("*", |a, b| a * b)?,
                Opcode::Div => self.binary_numeric("/", |a, b| a / b)?,
                Opcode::Mod => self.binary_numeric("mod", |a, b| a.rem_euclid(b))?,
                Opcode::Eq => self.binary_compare("=", |a, b| (a - b).abs() < f64::EPSILON)?,
                Opcode::Gt => self.binary_compare(">", |a, b| a > b)?,
                Opcode::Lt => self.binary_compare("<", |a, b| a < b)?,
                Opcode::And => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a.truthy() && b.truthy()))?;
                }
                Opcode::Or => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a.truthy() || b.truthy()))?;
                }
                Opcode::Not => {
                    let a = self.pop()?;
                    self.push(Value::Bool(!a.truthy()))?;
                }
                Opcode::Sqrt => {
                    let a = self.pop()?;
                    let a = a.as_f64().ok_or(SeniError::TypeMismatch { op: "sqrt", found: a.type_name() })?;
                    self.push(Value::Float(a.sqrt()))?;
                }
                Opcode::Append => self.do_append()?,
                Opcode::Pile => self.do_pile(arg0)?,
                Opcode::Squish2 => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let (a, b) = (
                        a.as_f32().ok_or(SeniError::TypeMismatch { op: "SQUISH2", found: a.type_name() })?,
                        b.as_f32().ok_or(SeniError::TypeMismatch { op: "SQUISH2", found: b.type_name() })?,
                    );
                    self.push(Value::Vec2(a, b))?;
                }
                Opcode::VecNonEmpty => {
                    let value = self.peek()?;
                    let non_empty = match value {
                        Value::Vector(head) => head.is_some(),
                        Value::Vec2(..) => true,
                        other => return Err(SeniError::TypeMismatch { op: "VEC_NON_EMPTY", found: other.type_name() }),
                    };
                    self.push(Value::Bool(non_empty))?;
                }
                Opcode::VecLoadFirst => {
                    let value = self.peek()?;
                    let first = match value {
                        Value::Vector(Some(head)) => self.heap.value(head),
                        Value::Vec2(x, _) => Value::Float(f64::from(x)),
                        other => return Err(SeniError::TypeMismatch { op: "VEC_LOAD_FIRST", found: other.type_name() }),
                    };
                    self.push(first)?;
                }
                Opcode::VecHasNext => {
                    let value = self.peek()?;
                    let has_next = match value {
                        Value::Vector(Some(head)) => self.heap.next(head).is_some(),
                        Value::Vector(None) => false,
                        Value::Vec2(..) => true, // second element always available after the first
                        other => return Err(SeniError::TypeMismatch { op: "VEC_HAS_NEXT", found: other.type_name() }),
                    };
                    self.push(Value::Bool(has_next))?;
                }
                Opcode::VecNext => {
                    let value = self.pop()?;
                    let advanced = match value {
                        Value::Vector(Some(head)) => Value::Vector(self.heap.next(head)),
                        Value::Vec2(_, y) => Value::Vec2(y, 0.0),
                        other => return Err(SeniError::TypeMismatch { op: "VEC_NEXT", found: other.type_name() }),
                    };
                    self.push(advanced)?;
                }
                Opcode::MtxLoad => self.matrix_stack.push(),
                Opcode::MtxStore => self.matrix_stack.pop(),
                Opcode::Stop => return Ok(()),
                Opcode::PlaceholderJump | Opcode::PlaceholderCall | Opcode::PlaceholderStore => {
                    unreachable!("placeholder opcode reached the VM — compiler bug, should have been patched")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CodeBuilder;
    use crate::natives::NativeTable;

    fn run_program(build: impl FnOnce(&mut CodeBuilder)) -> Value {
        let mut builder = CodeBuilder::new();
        build(&mut builder);
        let program = builder.build();
        let mut vm = Vm::new(VmLimits::default());
        let natives = NativeTable::default();
        vm.run(&program, &natives).unwrap();
        vm.stack[vm.sp - 1]
    }

    #[test]
    fn arithmetic_adds_four_operands_left_to_right() {
        // (+ 3 4 5 6) => LOAD_CONST 3,4; ADD; LOAD_CONST 5; ADD; LOAD_CONST 6; ADD; STOP
        let value = run_program(|b| {
            b.emit_const(Value::Float(3.0));
            b.emit_const(Value::Float(4.0));
            b.emit0(Opcode::Add);
            b.emit_const(Value::Float(5.0));
            b.emit0(Opcode::Add);
            b.emit_const(Value::Float(6.0));
            b.emit0(Opcode::Add);
            b.emit0(Opcode::Stop);
        });
        assert_eq!(value, Value::Float(18.0));
    }

    #[test]
    fn squish2_combines_two_floats_into_vec2() {
        let value = run_program(|b| {
            b.emit_const(Value::Float(4.0));
            b.emit_const(Value::Float(5.0));
            b.emit0(Opcode::Squish2);
            b.emit0(Opcode::Stop);
        });
        assert_eq!(value, Value::Vec2(4.0, 5.0));
    }

    #[test]
    fn if_true_branch_skips_else() {
        let mut builder = CodeBuilder::new();
        builder.emit_const(Value::Bool(true));
        let jump_if = builder.emit_jump(Opcode::JumpIf);
        builder.emit_const(Value::Float(1.0));
        let jump_over_else = builder.emit_jump(Opcode::Jump);
        builder.patch_jump(jump_if);
        builder.emit_const(Value::Float(2.0));
        builder.patch_jump(jump_over_else);
        builder.emit0(Opcode::Stop);
        let program = builder.build();
        let mut vm = Vm::new(VmLimits::default());
        vm.run(&program, &NativeTable::default()).unwrap();
        assert_eq!(vm.stack[vm.sp - 1], Value::Float(1.0));
    }

    #[test]
    fn global_store_and_load_round_trip() {
        let value = run_program(|b| {
            b.emit_const(Value::Float(42.0));
            b.emit(Opcode::Store, MemSegment::Global as i64, 0);
            b.emit(Opcode::Load, MemSegment::Global as i64, 0);
            b.emit0(Opcode::Stop);
        });
        assert_eq!(value, Value::Float(42.0));
    }

    #[test]
    fn stack_underflow_is_reported_not_panicked() {
        let mut builder = CodeBuilder::new();
        builder.emit0(Opcode::Add);
        builder.emit0(Opcode::Stop);
        let program = builder.build();
        let mut vm = Vm::new(VmLimits::default());
        let err = vm.run(&program, &NativeTable::default()).unwrap_err();
        assert_eq!(err, SeniError::StackUnderflow);
    }
}
