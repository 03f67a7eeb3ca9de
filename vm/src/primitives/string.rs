use std::io::Write;

use object::{ByteArray, Value};
use parser::Span;

use crate::alloc::alloc_byte_array;
use crate::interpreter::{try_heap, Completion, Interp};
use crate::primitives::{expect_integer, expect_variant, index_error};
use crate::Rooted;

fn write_bytes(bytes: &[u8], newline: bool) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let _ = out.write_all(bytes);
    if newline {
        let _ = out.write_all(b"\n");
    }
    let _ = out.flush();
}

/// `_StringPrint` — write the receiver's bytes to stdout.
pub fn print(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), ByteArray, span);
    // SAFETY: variant checked above.
    let bytes = unsafe { receiver.get().as_ref::<ByteArray>().bytes() };
    write_bytes(bytes, false);
    Completion::Normal(receiver.get())
}

/// `_StringPrintLine` — write the receiver's bytes plus a newline.
pub fn print_line(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), ByteArray, span);
    // SAFETY: variant checked above.
    let bytes = unsafe { receiver.get().as_ref::<ByteArray>().bytes() };
    write_bytes(bytes, true);
    Completion::Normal(receiver.get())
}

/// `_ByteVectorSize`
pub fn size(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), ByteArray, span);
    // SAFETY: variant checked above.
    let length = unsafe { receiver.get().as_ref::<ByteArray>().len() };
    Completion::Normal(Value::integer(length as i64))
}

/// `_ByteAt:` — read one byte; valid indices are `0..length`.
pub fn byte_at(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), ByteArray, span);
    let index = expect_integer!(args[0].get(), span);
    // SAFETY: variant checked above.
    let bytes = unsafe { receiver.get().as_ref::<ByteArray>() };
    if index < 0 || index as u64 >= bytes.len() {
        return index_error(span, index, bytes.len());
    }
    // SAFETY: bounds checked.
    let byte = unsafe { bytes.bytes()[index as usize] };
    Completion::Normal(Value::integer(byte as i64))
}

/// `_ByteAt:Put:` — store one byte; values outside `0..=255` error.
pub fn byte_at_put(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), ByteArray, span);
    let index = expect_integer!(args[0].get(), span);
    let value = expect_integer!(args[1].get(), span);
    // SAFETY: variant checked above.
    let bytes = unsafe { receiver.get().as_mut::<ByteArray>() };
    if index < 0 || index as u64 >= bytes.len() {
        return index_error(span, index, bytes.len());
    }
    if !(0..=255).contains(&value) {
        return Completion::RuntimeError {
            message: format!("byte value {value} out of range 0..=255"),
            span,
        };
    }
    // SAFETY: bounds checked.
    unsafe {
        bytes.bytes_mut()[index as usize] = value as u8;
    }
    Completion::Normal(receiver.get())
}

/// `_ByteVectorCopySize:` — copy the first `size` bytes into a fresh
/// byte array; `size` must be strictly below the receiver's length.
pub fn copy_size(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), ByteArray, span);
    let size = expect_integer!(args[0].get(), span);
    // SAFETY: variant checked above.
    let length = unsafe { receiver.get().as_ref::<ByteArray>().len() };
    if size < 0 || size as u64 >= length {
        return index_error(span, size, length);
    }

    // Copy out before allocating; the reservation may move the receiver.
    let prefix: Vec<u8> =
        unsafe { receiver.get().as_ref::<ByteArray>().bytes()[..size as usize].to_vec() };

    let actor = interp.globals.current_actor;
    let map = interp.globals.empty_map;
    let copy = try_heap!(
        alloc_byte_array(interp.heap, &mut *interp.globals, actor, map, &prefix),
        span
    );
    Completion::Normal(copy)
}
