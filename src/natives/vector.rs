//! Vector/list natives: `vector/append`, `vector/length`, `nth`.
//!
//! Grounded on `original_source/app/c/test.c`'s native call sites for the
//! same three operations; argument labels match what those call sites pass.

use crate::error::{SeniError, SeniResult};
use crate::value::Value;
use crate::vm::Vm;
use crate::word_table::Iname;

use super::{arg, labels};

/// `(vector/append value: v element: x)` — appends in place when `v`
/// already holds a heap list (so a caller that never re-stores the return
/// value still observes the growth), and returns the (possibly new) head.
pub fn append(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let head = arg(args, kw.value, Value::Vector(None));
    let value = arg(args, kw.element, Value::Bool(false));
    let Value::Vector(head) = head else {
        return Err(SeniError::TypeMismatch { op: "vector/append", found: head.type_name() });
    };
    let new_head = match head {
        None => Some(vm.heap.cons(value, None)?),
        Some(h) => {
            let mut tail = h;
            while let Some(next) = vm.heap.next(tail) {
                tail = next;
            }
            vm.heap.append_after(tail, value)?;
            Some(h)
        }
    };
    Ok(Value::Vector(new_head))
}

/// `(vector/length vector: v)`.
pub fn length(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let value = arg(args, kw.vector, Value::Vector(None));
    let Value::Vector(head) = value else {
        return Err(SeniError::TypeMismatch { op: "vector/length", found: value.type_name() });
    };
    Ok(Value::Int(vm.heap.to_vec(head).len() as i64))
}

/// `(nth vector: v n: i)` — zero-indexed element access.
pub fn nth(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let kw = labels();
    let from = arg(args, kw.vector, Value::Vector(None));
    let n = arg(args, kw.n, Value::Bool(false));
    let Value::Vector(head) = from else {
        return Err(SeniError::TypeMismatch { op: "nth", found: from.type_name() });
    };
    let index = n.as_f64().ok_or(SeniError::TypeMismatch { op: "nth", found: n.type_name() })? as usize;
    let elements = vm.heap.to_vec(head);
    elements.get(index).copied().ok_or(SeniError::TypeMismatch { op: "nth", found: "index out of range" })
}
