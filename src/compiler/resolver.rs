//! Pass 1 of the compiler: registers every top-level function and global
//! binding before any bytecode is emitted, so forward references resolve
//! regardless of declaration order (§4.3 "Forward references").

use ahash::AHashMap;

use crate::ast::{Node, NodeKind};
use crate::builder::CodeBuilder;
use crate::error::{SeniError, SeniResult};
use crate::keywords::Keywords;
use crate::word_table::Iname;

/// Where a resolved name lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Local(u16),
    Argument(u16),
    Global(u16),
}

/// A top-level function's call-site shape, captured in pass 1 (name + arity
/// + labelled-argument order) so that call sites compiled *before* the
/// callee's own body is emitted — forward or mutual references — already
/// know which ARGUMENT slot each label maps to (§4.3 "Forward references").
#[derive(Debug, Clone)]
pub struct FnSignature {
    pub index: u16,
    pub arg_inames: Vec<Iname>,
}

/// Lexical scope stack used during pass 2's expression lowering. Globals are
/// looked up last, matching ordinary Lisp shadowing rules.
#[derive(Debug, Default)]
pub struct Scopes {
    locals: Vec<Vec<(Iname, u16)>>,
    arguments: Vec<(Iname, u16)>,
    pub globals: AHashMap<Iname, u16>,
    pub fn_signatures: AHashMap<Iname, FnSignature>,
    next_local: u16,
}

impl Scopes {
    pub fn enter_fn(&mut self, argument_inames: &[Iname]) {
        self.locals.clear();
        self.locals.push(Vec::new());
        self.arguments = argument_inames.iter().enumerate().map(|(i, &n)| (n, i as u16)).collect();
        self.next_local = 0;
    }

    pub fn exit_fn(&mut self) {
        self.locals.clear();
        self.arguments.clear();
        self.next_local = 0;
    }

    pub fn push_block(&mut self) {
        self.locals.push(Vec::new());
    }

    pub fn pop_block(&mut self) {
        self.locals.pop();
    }

    /// Declares a new local in the innermost block, returning its slot.
    pub fn declare_local(&mut self, iname: Iname) -> SeniResult<u16> {
        let slot = self.next_local;
        self.next_local = self.next_local.checked_add(1).ok_or(SeniError::TooManyLocals)?;
        self.locals.last_mut().expect("enter_fn always pushes a block").push((iname, slot));
        Ok(slot)
    }

    #[must_use]
    pub fn resolve(&self, iname: Iname) -> Option<Binding> {
        for block in self.locals.iter().rev() {
            if let Some(&(_, slot)) = block.iter().rev().find(|(n, _)| *n == iname) {
                return Some(Binding::Local(slot));
            }
        }
        if let Some(&(_, slot)) = self.arguments.iter().find(|(n, _)| *n == iname) {
            return Some(Binding::Argument(slot));
        }
        self.globals.get(&iname).map(|&slot| Binding::Global(slot))
    }

    pub fn declare_global(&mut self, iname: Iname) -> SeniResult<u16> {
        if let Some(&slot) = self.globals.get(&iname) {
            return Ok(slot);
        }
        let slot = u16::try_from(self.globals.len()).map_err(|_| SeniError::TooManyGlobals)?;
        self.globals.insert(iname, slot);
        Ok(slot)
    }
}

/// Scans every top-level form once, reserving a function slot for each
/// `(fn (name ...) ...)` and a global slot for each `(define name ...)` at
/// the top level (including destructured `(define [a b] ...)` targets).
/// Forward references inside function bodies resolve against these
/// reservations in pass 2, before any body has actually been emitted.
pub fn resolve_top_level(top: &[Node], keywords: &Keywords, builder: &mut CodeBuilder, scopes: &mut Scopes) -> SeniResult<()> {
    for node in top {
        if node.is_trivia() {
            continue;
        }
        if node.kind != NodeKind::List {
            continue;
        }
        let children: Vec<&Node> = node.significant_children().collect();
        let Some(head) = children.first() else { continue };
        let Some(head_name) = head.name else { continue };

        if head_name == keywords.kfn {
            register_fn(&children, builder, scopes)?;
        } else if head_name == keywords.define {
            register_define_targets(&children, keywords, scopes)?;
        }
    }
    Ok(())
}

/// A `(fn (name a: 1 b: 2) body...)` signature's labelled formals are just
/// `(label, default-expr)` pairs following the function name — every other
/// child of the signature list is a LABEL node naming a formal.
fn register_fn(children: &[&Node], builder: &mut CodeBuilder, scopes: &mut Scopes) -> SeniResult<()> {
    let Some(signature) = children.get(1) else {
        return Err(SeniError::UnsupportedAlterableShape);
    };
    let sig_children: Vec<&Node> = signature.significant_children().collect();
    let Some(fn_name_node) = sig_children.first() else {
        return Err(SeniError::UnsupportedAlterableShape);
    };
    let Some(fn_iname) = fn_name_node.name else {
        return Err(SeniError::UnsupportedAlterableShape);
    };
    let index = builder.reserve_fn(fn_iname);
    let arg_inames: Vec<Iname> = sig_children[1..]
        .iter()
        .filter(|n| n.kind == NodeKind::Label)
        .filter_map(|n| n.name)
        .collect();
    scopes.fn_signatures.insert(fn_iname, FnSignature { index, arg_inames });
    Ok(())
}

fn register_define_targets(children: &[&Node], keywords: &Keywords, scopes: &mut Scopes) -> SeniResult<()> {
    // (define name expr) or (define [a b ...] expr) — pairs of (target, expr)
    // may repeat: (define a 1 b 2).
    let mut i = 1;
    while i < children.len() {
        register_define_target(children[i], keywords, scopes)?;
        i += 2;
    }
    Ok(())
}

fn register_define_target(target: &Node, keywords: &Keywords, scopes: &mut Scopes) -> SeniResult<()> {
    match target.kind {
        NodeKind::Name => {
            let iname = target.name.expect("Name node always carries an iname");
            scopes.declare_global(iname)?;
            Ok(())
        }
        NodeKind::Vector => {
            for child in target.significant_children() {
                register_define_target(child, keywords, scopes)?;
            }
            Ok(())
        }
        _ => Err(SeniError::UnsupportedAlterableShape),
    }
}
