use object::{Array, Value};
use parser::Span;

use crate::alloc::alloc_array_fill;
use crate::interpreter::{try_heap, Completion, Interp};
use crate::primitives::{expect_integer, expect_variant, index_error};
use crate::Rooted;

/// `_ArrayNew:` — a fresh array of nils. Length zero is fine.
pub fn new(interp: &mut Interp, _receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let length = expect_integer!(args[0].get(), span);
    if length < 0 {
        return Completion::RuntimeError {
            message: format!("array length {length} is negative"),
            span,
        };
    }
    let actor = interp.globals.current_actor;
    let map = interp.globals.empty_map;
    let nil = interp.nil();
    let array = try_heap!(
        alloc_array_fill(
            interp.heap,
            &mut *interp.globals,
            actor,
            map,
            length as u64,
            nil
        ),
        span
    );
    Completion::Normal(array)
}

/// `_ArraySize`
pub fn size(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), Array, span);
    // SAFETY: variant checked above.
    let length = unsafe { receiver.get().as_ref::<Array>().len() };
    Completion::Normal(Value::integer(length as i64))
}

/// `_ArrayAt:`
pub fn at(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), Array, span);
    let index = expect_integer!(args[0].get(), span);
    // SAFETY: variant checked above.
    let array = unsafe { receiver.get().as_ref::<Array>() };
    if index < 0 || index as u64 >= array.len() {
        return index_error(span, index, array.len());
    }
    // SAFETY: bounds checked.
    Completion::Normal(unsafe { array.element(index as u64) })
}

/// `_ArrayAt:Put:`
pub fn at_put(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), Array, span);
    let index = expect_integer!(args[0].get(), span);
    let value = args[1].get();
    // SAFETY: variant checked above.
    let array = unsafe { receiver.get().as_mut::<Array>() };
    if index < 0 || index as u64 >= array.len() {
        return index_error(span, index, array.len());
    }
    // SAFETY: bounds checked.
    unsafe {
        array.set_element(index as u64, value);
    }
    interp.heap.record_store(receiver.get(), value);
    Completion::Normal(receiver.get())
}
