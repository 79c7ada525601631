//! Pass 2 of the compiler: expression lowering and bytecode emission (§4.3).
//!
//! Grounded on the teacher's `bytecode/compiler.rs` (a `Compiler` struct
//! wrapping a `CodeBuilder`, dispatching on AST node shape, with a
//! `Scopes`-equivalent namespace stack) and on `original_source/app/c/seni_vm_compiler.c`'s
//! `compile_loop`/`compile_fn_call` shapes, which this module's `loop`/`fence`
//! and direct-call emission follow closely. Unlike the teacher, Seni's pass 1
//! ([`resolver`]) already resolves every forward function reference to a
//! concrete `fn_index` and labelled-argument slot before pass 2 starts, so
//! `Call`/`Call0` carry their target directly and none of the
//! `PLACEHOLDER_CALL`/`PLACEHOLDER_STORE` sentinels in [`crate::opcode`] are
//! ever actually emitted (§9 "placeholder opcodes" — the fix-up-table
//! alternative, not the LOAD-CONST-then-patch one).

pub mod gene;
pub mod resolver;

use crate::ast::{Node, NodeKind};
use crate::builder::CodeBuilder;
use crate::compiler::gene::GeneCursor;
use crate::compiler::resolver::{Binding, FnSignature, Scopes};
use crate::config::VmLimits;
use crate::error::{SeniError, SeniResult};
use crate::keywords::Keywords;
use crate::opcode::Opcode;
use crate::parser::Parser;
use crate::program::{MemSegment, Program};
use crate::value::{ColourFormat, Value};
use crate::word_table::{Iname, WordTable};

/// Compiles `source` into a [`Program`], using the textual default of every
/// alterable node (§4.3 "compile", the ordinary, non-genotype path).
pub fn compile_program(source: &str, words: &mut WordTable, keywords: &Keywords, limits: &VmLimits) -> SeniResult<Program> {
    compile(source, words, keywords, limits, None)
}

/// Compiles `source` against a materialised [`gene::GeneValue`] sequence:
/// every alterable node draws the next gene instead of lowering its own
/// textual value or `parameter_ast` (§4.5 "compile with genotype").
pub fn compile_program_with_genotype(
    source: &str,
    genes: &[gene::GeneValue],
    words: &mut WordTable,
    keywords: &Keywords,
    limits: &VmLimits,
) -> SeniResult<Program> {
    compile(source, words, keywords, limits, Some(GeneCursor::new(genes)))
}

fn compile(
    source: &str,
    words: &mut WordTable,
    keywords: &Keywords,
    limits: &VmLimits,
    genes: Option<GeneCursor<'_>>,
) -> SeniResult<Program> {
    let top = Parser::parse_program(source, words)?;
    let mut compiler = Compiler {
        builder: CodeBuilder::new(),
        scopes: Scopes::default(),
        keywords,
        words,
        genes,
    };
    compiler.compile_top(&top, limits)?;
    if let Some(cursor) = &compiler.genes {
        if !cursor.is_exhausted() {
            return Err(SeniError::GeneCountMismatch { expected: cursor.pos(), found: cursor.len() });
        }
    }
    Ok(compiler.builder.build())
}

struct Compiler<'a> {
    builder: CodeBuilder,
    scopes: Scopes,
    keywords: &'a Keywords,
    words: &'a WordTable,
    genes: Option<GeneCursor<'a>>,
}

/// The ten predefined globals every program starts with (§4.3 "preamble").
fn preamble_entries(keywords: &Keywords) -> [(Iname, Value); 10] {
    const OPAQUE: f32 = 1.0;
    [
        (keywords.canvas_width, Value::Float(1000.0)),
        (keywords.canvas_height, Value::Float(1000.0)),
        (keywords.white, Value::Colour(ColourFormat::Rgb, [1.0, 1.0, 1.0, OPAQUE])),
        (keywords.black, Value::Colour(ColourFormat::Rgb, [0.0, 0.0, 0.0, OPAQUE])),
        (keywords.red, Value::Colour(ColourFormat::Rgb, [1.0, 0.0, 0.0, OPAQUE])),
        (keywords.green, Value::Colour(ColourFormat::Rgb, [0.0, 1.0, 0.0, OPAQUE])),
        (keywords.blue, Value::Colour(ColourFormat::Rgb, [0.0, 0.0, 1.0, OPAQUE])),
        (keywords.yellow, Value::Colour(ColourFormat::Rgb, [1.0, 1.0, 0.0, OPAQUE])),
        (keywords.magenta, Value::Colour(ColourFormat::Rgb, [1.0, 0.0, 1.0, OPAQUE])),
        (keywords.cyan, Value::Colour(ColourFormat::Rgb, [0.0, 1.0, 1.0, OPAQUE])),
    ]
}

impl<'a> Compiler<'a> {
    fn compile_top(&mut self, top: &[Node], limits: &VmLimits) -> SeniResult<()> {
        let preamble = preamble_entries(self.keywords);
        for (iname, _) in &preamble {
            self.scopes.declare_global(*iname)?;
        }
        resolver::resolve_top_level(top, self.keywords, &mut self.builder, &mut self.scopes)?;
        if self.scopes.fn_signatures.len() > limits.max_top_level_functions {
            return Err(SeniError::TooManyTopLevelFunctions);
        }
        if self.scopes.globals.len() > limits.max_globals {
            return Err(SeniError::TooManyGlobals);
        }

        // (a) every fn body, skipped over at runtime by the leading JUMP.
        let skip_fns = self.builder.emit_jump(Opcode::Jump);
        for node in top {
            let Some(children) = list_children(node) else { continue };
            if head_name(&children) == Some(self.keywords.kfn) {
                self.compile_fn(&children)?;
            }
        }
        self.builder.patch_jump(skip_fns);

        // (b) the fixed preamble.
        for (iname, value) in &preamble {
            let slot = *self.scopes.globals.get(iname).expect("preamble global pre-registered");
            self.builder.emit_const(*value);
            self.builder.emit(Opcode::Store, MemSegment::Global as i64, slot as i64);
        }

        // (c) every top-level define.
        for node in top {
            let Some(children) = list_children(node) else { continue };
            if head_name(&children) == Some(self.keywords.define) {
                self.compile_define_pairs(&children, MemSegment::Global, false)?;
            }
        }

        // (d) every other top-level form, for effect.
        for node in top {
            if node.is_trivia() {
                continue;
            }
            if let Some(children) = list_children(node) {
                let head = head_name(&children);
                if head == Some(self.keywords.kfn) || head == Some(self.keywords.define) {
                    continue;
                }
            }
            self.compile_for_effect(node)?;
        }

        self.builder.emit0(Opcode::Stop);
        self.builder.set_num_globals(self.scopes.globals.len() as u16);
        Ok(())
    }

    fn compile_fn(&mut self, children: &[&Node]) -> SeniResult<()> {
        let signature = children.get(1).ok_or(SeniError::UnsupportedAlterableShape)?;
        let sig_children: Vec<&Node> = signature.significant_children().collect();
        let fn_iname = sig_children.first().and_then(|n| n.name).ok_or(SeniError::UnsupportedAlterableShape)?;
        let sig = self.scopes.fn_signatures.get(&fn_iname).cloned().expect("pass 1 registered every fn");

        self.scopes.enter_fn(&sig.arg_inames);
        self.builder.begin_fn_body();

        let arg_address = self.builder.current_offset();
        let formals: Vec<&Node> = sig_children[1..].to_vec();
        let mut i = 0;
        let mut slot = 0u16;
        while i + 1 < formals.len() {
            let default_expr = formals[i + 1];
            self.compile_form(default_expr)?;
            self.builder.emit(Opcode::Store, MemSegment::Argument as i64, slot as i64);
            slot += 1;
            i += 2;
        }
        self.builder.emit0(Opcode::Ret0);

        let body_address = self.builder.current_offset();
        let body: Vec<&Node> = children[2..].to_vec();
        self.compile_sequence_for_value(&body)?;
        self.builder.emit0(Opcode::Ret);

        self.builder.finish_fn(
            sig.index,
            sig.arg_inames.len() as u16,
            u16::try_from(arg_address).unwrap_or(u16::MAX),
            u16::try_from(body_address).unwrap_or(u16::MAX),
            sig.arg_inames.clone(),
        );
        self.scopes.exit_fn();
        Ok(())
    }

    /// Compiles a sequence of body forms, discarding every value but the
    /// last (§4.3 "fn body"/"on-matrix-stack body"). An empty body yields
    /// `false`, matching `if`'s missing-else default.
    fn compile_sequence_for_value(&mut self, forms: &[&Node]) -> SeniResult<()> {
        let Some((last, rest)) = forms.split_last() else {
            self.builder.emit_const(Value::Bool(false));
            return Ok(());
        };
        for form in rest {
            self.compile_for_effect(*form)?;
        }
        self.compile_form(*last)
    }

    /// Compiles `node` then drops whatever it left on the stack, measured
    /// dynamically rather than assumed — most forms net +1 (they are
    /// ordinary expressions), `define`/`setq` net 0 (§4.3 "Any stack residue
    /// the body leaves behind is consumed by emitting STORE VOID opcodes
    /// equal to the net stack delta").
    fn compile_for_effect(&mut self, node: &Node) -> SeniResult<()> {
        let before = self.builder.current_stack_depth();
        self.compile_form(node)?;
        let residue = self.builder.current_stack_depth() - before;
        for _ in 0..residue.max(0) {
            self.builder.emit(Opcode::Store, MemSegment::Void as i64, 0);
        }
        Ok(())
    }

    /// The single expression-lowering entry point, used both for effect and
    /// for value (§4.3). Every kind nets exactly +1 onto the operand stack
    /// except the statement-only forms (`define`, `setq`), which net 0.
    fn compile_form(&mut self, node: &Node) -> SeniResult<()> {
        if node.alterable {
            if let Some(cursor) = self.genes.as_mut() {
                let total = cursor.len();
                let gene = cursor.next().ok_or(SeniError::GeneCountMismatch { expected: total + 1, found: total })?;
                gene.emit(&mut self.builder);
                return Ok(());
            }
        }
        match node.kind {
            NodeKind::Int => {
                // Integer literals become floats once loaded (§3).
                self.builder.emit_const(Value::Float(node.int_value as f64));
                Ok(())
            }
            NodeKind::Float => {
                self.builder.emit_const(Value::Float(node.float_value));
                Ok(())
            }
            NodeKind::Boolean => {
                self.builder.emit_const(Value::Bool(node.bool_value));
                Ok(())
            }
            NodeKind::String | NodeKind::Label => {
                let iname = node.name.expect("String/Label nodes always carry an iname");
                self.builder.emit_const(Value::Name(iname));
                Ok(())
            }
            NodeKind::Name => self.compile_name(node),
            NodeKind::Vector => self.compile_vector(node),
            NodeKind::List => self.compile_list(node),
            NodeKind::Whitespace | NodeKind::Comment => unreachable!("trivia is filtered before compilation"),
        }
    }

    fn compile_name(&mut self, node: &Node) -> SeniResult<()> {
        let iname = node.name.expect("Name node always carries an iname");
        match self.scopes.resolve(iname) {
            Some(Binding::Local(slot)) => self.builder.emit(Opcode::Load, MemSegment::Local as i64, slot as i64),
            Some(Binding::Argument(slot)) => self.builder.emit(Opcode::Load, MemSegment::Argument as i64, slot as i64),
            Some(Binding::Global(slot)) => self.builder.emit(Opcode::Load, MemSegment::Global as i64, slot as i64),
            None if WordTable::is_keyword(iname) || WordTable::is_native(iname) => self.builder.emit_const(Value::Name(iname)),
            None => return Err(SeniError::UndefinedName { name: self.name_of(iname) }),
        };
        Ok(())
    }

    fn compile_vector(&mut self, node: &Node) -> SeniResult<()> {
        let children: Vec<&Node> = node.significant_children().collect();
        if children.len() == 2 {
            self.compile_form(children[0])?;
            self.compile_form(children[1])?;
            self.builder.emit0(Opcode::Squish2);
        } else {
            self.builder.emit_const(Value::Vector(None));
            for child in children {
                self.compile_form(child)?;
                self.builder.emit0(Opcode::Append);
            }
        }
        Ok(())
    }

    fn compile_list(&mut self, node: &Node) -> SeniResult<()> {
        let children: Vec<&Node> = node.significant_children().collect();
        let Some(head) = children.first() else {
            self.builder.emit_const(Value::Vector(None));
            return Ok(());
        };
        let Some(head_iname) = head.name else {
            return Err(SeniError::UnsupportedAlterableShape);
        };
        let kw = self.keywords;

        if head_iname == kw.define {
            self.compile_define_pairs(&children, MemSegment::Local, true)
        } else if head_iname == kw.kif {
            self.compile_if(&children)
        } else if kw.is_loop_form(head_iname) || head_iname == kw.fence {
            self.compile_loop(&children)
        } else if head_iname == kw.on_matrix_stack {
            self.compile_on_matrix_stack(&children)
        } else if head_iname == kw.address_of {
            self.compile_address_of(&children)
        } else if head_iname == kw.fn_call {
            self.compile_indirect_call(&children)
        } else if head_iname == kw.quote {
            let quoted = children.get(1).ok_or(SeniError::UnsupportedAlterableShape)?;
            self.compile_quoted(quoted)
        } else if head_iname == kw.setq {
            self.compile_setq(&children)
        } else if head_iname == kw.plus {
            self.compile_fold(Opcode::Add, &children[1..])
        } else if head_iname == kw.minus {
            self.compile_minus(&children[1..])
        } else if head_iname == kw.star {
            self.compile_fold(Opcode::Mul, &children[1..])
        } else if head_iname == kw.slash {
            self.compile_slash(&children[1..])
        } else if head_iname == kw.eq {
            self.compile_binary(Opcode::Eq, &children[1..])
        } else if head_iname == kw.lt {
            self.compile_binary(Opcode::Lt, &children[1..])
        } else if head_iname == kw.gt {
            self.compile_binary(Opcode::Gt, &children[1..])
        } else if head_iname == kw.kand {
            self.compile_fold(Opcode::And, &children[1..])
        } else if head_iname == kw.kor {
            self.compile_fold(Opcode::Or, &children[1..])
        } else if head_iname == kw.knot {
            self.compile_unary(Opcode::Not, &children[1..])
        } else if head_iname == kw.sqrt {
            self.compile_unary(Opcode::Sqrt, &children[1..])
        } else if head_iname == kw.kmod {
            self.compile_fold(Opcode::Mod, &children[1..])
        } else if let Some(sig) = self.scopes.fn_signatures.get(&head_iname).cloned() {
            self.compile_direct_call(&sig, &children[1..])
        } else if WordTable::is_native(head_iname) {
            self.compile_native_call(head_iname, &children[1..])
        } else {
            Err(SeniError::UndefinedName { name: self.name_of(head_iname) })
        }
    }

    fn name_of(&self, iname: Iname) -> String {
        self.words.reverse(iname).map_or_else(|| format!("#{}", iname.raw()), str::to_owned)
    }

    // --- define / setq -----------------------------------------------

    fn compile_define_pairs(&mut self, children: &[&Node], segment: MemSegment, declare: bool) -> SeniResult<()> {
        let mut i = 1;
        while i + 1 < children.len() {
            self.compile_form(children[i + 1])?;
            self.store_destructure(children[i], segment, declare)?;
            i += 2;
        }
        Ok(())
    }

    /// Stores the single value already on top of the stack into `target`,
    /// unpacking nested `[a b]` patterns with `PILE` and storing leaves in
    /// reverse, matching `PILE`'s push order (§4.3 "destructuring").
    fn store_destructure(&mut self, target: &Node, segment: MemSegment, declare: bool) -> SeniResult<()> {
        match target.kind {
            NodeKind::Name => {
                let iname = target.name.expect("Name node always carries an iname");
                let slot = if declare {
                    self.scopes.declare_local(iname)?
                } else {
                    *self.scopes.globals.get(&iname).ok_or_else(|| SeniError::UndefinedName { name: self.name_of(iname) })?
                };
                self.builder.emit(Opcode::Store, segment as i64, slot as i64);
                Ok(())
            }
            NodeKind::Vector => {
                let kids: Vec<&Node> = target.significant_children().collect();
                let n = kids.len();
                self.builder.emit_with_delta(Opcode::Pile, n as i64, 0, n as i32 - 1);
                for child in kids.iter().rev() {
                    self.store_destructure(child, segment, declare)?;
                }
                Ok(())
            }
            _ => Err(SeniError::UnsupportedAlterableShape),
        }
    }

    fn compile_setq(&mut self, children: &[&Node]) -> SeniResult<()> {
        let name_node = children.get(1).ok_or(SeniError::UnsupportedAlterableShape)?;
        let value_node = children.get(2).ok_or(SeniError::UnsupportedAlterableShape)?;
        let iname = name_node.name.ok_or(SeniError::UnsupportedAlterableShape)?;
        self.compile_form(value_node)?;
        match self.scopes.resolve(iname) {
            Some(Binding::Local(slot)) => self.builder.emit(Opcode::Store, MemSegment::Local as i64, slot as i64),
            Some(Binding::Argument(slot)) => self.builder.emit(Opcode::Store, MemSegment::Argument as i64, slot as i64),
            Some(Binding::Global(slot)) => self.builder.emit(Opcode::Store, MemSegment::Global as i64, slot as i64),
            None => return Err(SeniError::UndefinedName { name: self.name_of(iname) }),
        };
        Ok(())
    }

    // --- if ------------------------------------------------------------

    fn compile_if(&mut self, children: &[&Node]) -> SeniResult<()> {
        let test = children.get(1).ok_or(SeniError::UnsupportedAlterableShape)?;
        let then_branch = children.get(2).ok_or(SeniError::UnsupportedAlterableShape)?;
        self.compile_form(test)?;
        let jump_if_false = self.builder.emit_jump(Opcode::JumpIf);
        self.compile_form(then_branch)?;
        let jump_over_else = self.builder.emit_jump(Opcode::Jump);
        self.builder.patch_jump(jump_if_false);
        match children.get(3) {
            Some(else_branch) => self.compile_form(else_branch)?,
            None => {
                self.builder.emit_const(Value::Bool(false));
            }
        }
        self.builder.patch_jump(jump_over_else);
        Ok(())
    }

    // --- on-matrix-stack -------------------------------------------------

    fn compile_on_matrix_stack(&mut self, children: &[&Node]) -> SeniResult<()> {
        self.builder.emit0(Opcode::MtxLoad);
        for form in &children[1..] {
            self.compile_for_effect(form)?;
        }
        self.builder.emit0(Opcode::MtxStore);
        Ok(())
    }

    // --- address-of / fn-call (indirect calls) --------------------------

    fn compile_address_of(&mut self, children: &[&Node]) -> SeniResult<()> {
        let name_node = children.get(1).ok_or(SeniError::UnsupportedAlterableShape)?;
        let fn_iname = name_node.name.ok_or(SeniError::UnsupportedAlterableShape)?;
        let sig = self.scopes.fn_signatures.get(&fn_iname).ok_or_else(|| SeniError::UndefinedName { name: self.name_of(fn_iname) })?;
        self.builder.emit_const(Value::Int(i64::from(sig.index)));
        Ok(())
    }

    fn compile_indirect_call(&mut self, children: &[&Node]) -> SeniResult<()> {
        let fn_expr = children.get(1).ok_or(SeniError::UnsupportedAlterableShape)?;
        self.compile_form(fn_expr)?;
        self.builder.emit0(Opcode::CallF);

        let mut i = 2;
        while i + 1 < children.len() {
            let label = children[i];
            let value = children[i + 1];
            let label_iname = label.name.ok_or(SeniError::UnsupportedAlterableShape)?;
            self.compile_form(value)?;
            self.compile_form(fn_expr)?;
            self.builder.emit_with_delta(Opcode::StoreF, 0, i64::from(label_iname.raw()), -2);
            i += 2;
        }

        self.compile_form(fn_expr)?;
        // True net effect across (push index, CALL_F_0) is the call's one
        // return value, realised later via RET — not the immediate -1 an
        // ordinary CALL_F_0 pop would suggest (§4.3 "fn-call").
        self.builder.emit_with_delta(Opcode::CallF0, 0, 0, 0);
        Ok(())
    }

    // --- quote -----------------------------------------------------------

    fn compile_quoted(&mut self, node: &Node) -> SeniResult<()> {
        match node.kind {
            NodeKind::Name | NodeKind::Label | NodeKind::String => {
                let iname = node.name.expect("carries an iname");
                self.builder.emit_const(Value::Name(iname));
                Ok(())
            }
            NodeKind::Int | NodeKind::Float | NodeKind::Boolean => self.compile_form(node),
            NodeKind::List | NodeKind::Vector => {
                self.builder.emit_const(Value::Vector(None));
                for child in node.significant_children() {
                    self.compile_quoted(child)?;
                    self.builder.emit0(Opcode::Append);
                }
                Ok(())
            }
            NodeKind::Whitespace | NodeKind::Comment => unreachable!("trivia is filtered before compilation"),
        }
    }

    // --- operators ---------------------------------------------------------

    fn compile_fold(&mut self, op: Opcode, operands: &[&Node]) -> SeniResult<()> {
        let (first, rest) = operands.split_first().ok_or(SeniError::UnsupportedAlterableShape)?;
        self.compile_form(first)?;
        for operand in rest {
            self.compile_form(operand)?;
            self.builder.emit0(op);
        }
        Ok(())
    }

    fn compile_minus(&mut self, operands: &[&Node]) -> SeniResult<()> {
        if operands.len() == 1 {
            self.builder.emit_const(Value::Float(0.0));
            self.compile_form(operands[0])?;
            self.builder.emit0(Opcode::Sub);
            Ok(())
        } else {
            self.compile_fold(Opcode::Sub, operands)
        }
    }

    fn compile_slash(&mut self, operands: &[&Node]) -> SeniResult<()> {
        if operands.len() == 1 {
            self.builder.emit_const(Value::Float(1.0));
            self.compile_form(operands[0])?;
            self.builder.emit0(Opcode::Div);
            Ok(())
        } else {
            self.compile_fold(Opcode::Div, operands)
        }
    }

    fn compile_binary(&mut self, op: Opcode, operands: &[&Node]) -> SeniResult<()> {
        if operands.len() != 2 {
            return Err(SeniError::UnsupportedAlterableShape);
        }
        self.compile_form(operands[0])?;
        self.compile_form(operands[1])?;
        self.builder.emit0(op);
        Ok(())
    }

    fn compile_unary(&mut self, op: Opcode, operands: &[&Node]) -> SeniResult<()> {
        if operands.len() != 1 {
            return Err(SeniError::UnsupportedAlterableShape);
        }
        self.compile_form(operands[0])?;
        self.builder.emit0(op);
        Ok(())
    }

    // --- calls -----------------------------------------------------------

    fn compile_direct_call(&mut self, sig: &FnSignature, args: &[&Node]) -> SeniResult<()> {
        self.builder.emit(Opcode::Call, i64::from(sig.index), 0);
        let mut i = 0;
        while i + 1 < args.len() {
            let label = args[i];
            let value = args[i + 1];
            self.compile_form(value)?;
            let slot = label.name.and_then(|l| sig.arg_inames.iter().position(|&a| a == l));
            match slot {
                Some(slot) => self.builder.emit(Opcode::Store, MemSegment::Argument as i64, slot as i64),
                None => self.builder.emit(Opcode::Store, MemSegment::Void as i64, 0),
            };
            i += 2;
        }
        // See `compile_indirect_call`: the call's eventual return value
        // only materialises once its RET runs, so the bookkeeping delta is
        // overridden to +1 rather than CALL_0's intrinsic 0.
        self.builder.emit_with_delta(Opcode::Call0, i64::from(sig.index), 0, 1);
        Ok(())
    }

    fn compile_native_call(&mut self, native_iname: Iname, args: &[&Node]) -> SeniResult<()> {
        let mut num_args: i64 = 0;
        let mut i = 0;
        while i + 1 < args.len() {
            let label = args[i];
            let value = args[i + 1];
            let label_iname = label.name.ok_or(SeniError::UnsupportedAlterableShape)?;
            self.builder.emit_const(Value::Name(label_iname));
            self.compile_form(value)?;
            num_args += 1;
            i += 2;
        }
        let delta = 1 - 2 * i32::try_from(num_args).unwrap_or(i32::MAX);
        self.builder.emit_with_delta(Opcode::Native, i64::from(native_iname.raw()), num_args, delta);
        Ok(())
    }

    // --- loop / fence ------------------------------------------------------

    fn compile_loop(&mut self, children: &[&Node]) -> SeniResult<()> {
        let header = children.get(1).ok_or(SeniError::UnsupportedAlterableShape)?;
        let header_children: Vec<&Node> = header.significant_children().collect();
        let var_node = header_children.first().ok_or(SeniError::UnsupportedAlterableShape)?;
        let var_iname = var_node.name.ok_or(SeniError::UnsupportedAlterableShape)?;
        let body: Vec<&Node> = children[2..].to_vec();

        let mut from = None;
        let mut to = None;
        let mut upto = None;
        let mut increment = None;
        let mut count = None;
        let mut i = 1;
        while i + 1 < header_children.len() {
            let label = header_children[i];
            let value = header_children[i + 1];
            let label_iname = label.name.ok_or(SeniError::UnsupportedAlterableShape)?;
            let kw = self.keywords;
            if label_iname == kw.from {
                from = Some(value);
            } else if label_iname == kw.to {
                to = Some(value);
            } else if label_iname == kw.upto {
                upto = Some(value);
            } else if label_iname == kw.increment {
                increment = Some(value);
            } else if label_iname == kw.steps || label_iname == kw.quantity {
                count = Some(value);
            }
            i += 2;
        }
        if to.is_some() && upto.is_some() {
            return Err(SeniError::LoopConflictingBound);
        }
        let bound = to.or(upto);

        self.scopes.push_block();
        let result = if let Some(count_expr) = count {
            let bound_expr = bound.ok_or(SeniError::LoopMissingBound)?;
            self.compile_fixed_count_loop(var_iname, from, bound_expr, count_expr, &body)
        } else {
            match (to, upto) {
                (Some(b), None) => self.compile_increment_loop(var_iname, from, b, false, increment, &body),
                (None, Some(b)) => self.compile_increment_loop(var_iname, from, b, true, increment, &body),
                _ => Err(SeniError::LoopMissingBound),
            }
        };
        self.scopes.pop_block();
        result
    }

    /// Integer-like increment iteration: `from` defaults to 0, `increment` to
    /// 1, `to` is exclusive and `upto` inclusive (§4.3 "loop").
    fn compile_increment_loop(
        &mut self,
        var_iname: Iname,
        from: Option<&Node>,
        bound: &Node,
        inclusive: bool,
        increment: Option<&Node>,
        body: &[&Node],
    ) -> SeniResult<()> {
        let looper = self.scopes.declare_local(var_iname)?;

        match from {
            Some(e) => self.compile_form(e)?,
            None => {
                self.builder.emit_const(Value::Float(0.0));
            }
        }
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(looper));

        let loop_start = self.builder.current_offset();
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(looper));
        self.compile_form(bound)?;
        if inclusive {
            self.builder.emit0(Opcode::Gt);
            self.builder.emit0(Opcode::Not);
        } else {
            self.builder.emit0(Opcode::Lt);
        }
        let exit = self.builder.emit_jump(Opcode::JumpIf);

        for form in body {
            self.compile_for_effect(form)?;
        }

        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(looper));
        match increment {
            Some(e) => self.compile_form(e)?,
            None => {
                self.builder.emit_const(Value::Float(1.0));
            }
        }
        self.builder.emit0(Opcode::Add);
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(looper));
        self.builder.emit_jump_to(Opcode::Jump, loop_start);
        self.builder.patch_jump(exit);
        Ok(())
    }

    /// Fixed-count float iteration (`steps`/`quantity`, the `fence` form):
    /// evenly spaces `count` samples across `[from, bound]` inclusive on
    /// both ends, rather than treating `bound` as exclusive/inclusive per
    /// `to`/`upto` (an Open Question resolved against the worked example in
    /// DESIGN.md — `(fence (x from: 0 to: 10 quantity: 3))` visits 0, 5, 10).
    fn compile_fixed_count_loop(
        &mut self,
        var_iname: Iname,
        from: Option<&Node>,
        bound: &Node,
        count: &Node,
        body: &[&Node],
    ) -> SeniResult<()> {
        let n = self.scopes.declare_local(var_iname)?;
        let delta = self.scopes.declare_local(var_iname)?;
        let index = self.scopes.declare_local(var_iname)?;
        let from_val = self.scopes.declare_local(var_iname)?;
        let looper = self.scopes.declare_local(var_iname)?;

        self.compile_form(count)?;
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(n));

        match from {
            Some(e) => self.compile_form(e)?,
            None => {
                self.builder.emit_const(Value::Float(0.0));
            }
        }
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(from_val));

        // delta = (N > 1) ? (bound - from) / (N - 1) : 0
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(n));
        self.builder.emit_const(Value::Float(1.0));
        self.builder.emit0(Opcode::Gt);
        let to_zero_branch = self.builder.emit_jump(Opcode::JumpIf);
        self.compile_form(bound)?;
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(from_val));
        self.builder.emit0(Opcode::Sub);
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(n));
        self.builder.emit_const(Value::Float(1.0));
        self.builder.emit0(Opcode::Sub);
        self.builder.emit0(Opcode::Div);
        let skip_zero_branch = self.builder.emit_jump(Opcode::Jump);
        self.builder.patch_jump(to_zero_branch);
        self.builder.emit_const(Value::Float(0.0));
        self.builder.patch_jump(skip_zero_branch);
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(delta));

        self.builder.emit_const(Value::Float(0.0));
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(index));

        let loop_start = self.builder.current_offset();
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(index));
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(n));
        self.builder.emit0(Opcode::Lt);
        let exit = self.builder.emit_jump(Opcode::JumpIf);

        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(from_val));
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(index));
        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(delta));
        self.builder.emit0(Opcode::Mul);
        self.builder.emit0(Opcode::Add);
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(looper));

        for form in body {
            self.compile_for_effect(form)?;
        }

        self.builder.emit(Opcode::Load, MemSegment::Local as i64, i64::from(index));
        self.builder.emit_const(Value::Float(1.0));
        self.builder.emit0(Opcode::Add);
        self.builder.emit(Opcode::Store, MemSegment::Local as i64, i64::from(index));
        self.builder.emit_jump_to(Opcode::Jump, loop_start);
        self.builder.patch_jump(exit);
        Ok(())
    }
}

fn list_children<'n>(node: &'n Node) -> Option<Vec<&'n Node>> {
    if node.is_trivia() || node.kind != NodeKind::List {
        return None;
    }
    Some(node.significant_children().collect())
}

fn head_name(children: &[&Node]) -> Option<Iname> {
    children.first().and_then(|n| n.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::natives::NativeNames;
    use crate::vm::Vm;

    fn run(source: &str) -> Value {
        let mut words = WordTable::new();
        let keywords = Keywords::register(&mut words);
        let _natives_names = NativeNames::register(&mut words);
        let limits = VmLimits::default();
        let program = compile_program(source, &mut words, &keywords, &limits).unwrap();
        let mut vm = Vm::new(limits);
        let natives = crate::natives::NativeTable::build(&_natives_names);
        vm.run(&program, &natives).unwrap();
        vm.stack[vm.sp - 1]
    }

    #[test]
    fn arithmetic_expression() {
        assert_eq!(run("(+ 3 4 5 6)"), Value::Float(18.0));
    }

    #[test]
    fn mutually_referencing_top_level_defines_resolve() {
        let value = run(
            "(define a (+ b 1))
             (define b 10)
             a",
        );
        assert_eq!(value, Value::Float(11.0));
    }

    #[test]
    fn fn_default_argument_can_be_overridden() {
        let value = run(
            "(fn (adder a: 1 b: 2) (+ a b))
             (adder b: 10)",
        );
        assert_eq!(value, Value::Float(11.0));
    }

    #[test]
    fn destructuring_define_unpacks_vector() {
        let value = run(
            "(define [a b] [4 5])
             (+ a b)",
        );
        assert_eq!(value, Value::Float(9.0));
    }

    #[test]
    fn if_without_else_defaults_to_false() {
        assert_eq!(run("(if false 1)"), Value::Bool(false));
    }

    #[test]
    fn increment_loop_accumulates_into_a_define() {
        let value = run(
            "(define total 0)
             (loop (i from: 0 to: 5) (setq total (+ total i)))
             total",
        );
        assert_eq!(value, Value::Float(10.0));
    }

    #[test]
    fn fence_visits_evenly_spaced_samples() {
        let value = run(
            "(define v [])
             (fence (x from: 0 to: 10 quantity: 3) (setq v (vector/append value: v element: x)))
             (nth vector: v n: 1)",
        );
        assert_eq!(value, Value::Float(5.0));
    }
}
