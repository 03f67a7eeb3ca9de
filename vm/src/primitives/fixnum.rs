use std::io::Write;

use object::Value;
use parser::Span;

use crate::interpreter::{Completion, Interp};
use crate::primitives::expect_integer;
use crate::Rooted;

/// `_IntAdd:`
pub fn add(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_integer!(receiver.get(), span);
    let rhs = expect_integer!(args[0].get(), span);
    Completion::Normal(Value::integer(lhs.wrapping_add(rhs)))
}

/// `_IntSub:`
pub fn sub(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_integer!(receiver.get(), span);
    let rhs = expect_integer!(args[0].get(), span);
    Completion::Normal(Value::integer(lhs.wrapping_sub(rhs)))
}

/// `_IntMul:`
pub fn mul(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_integer!(receiver.get(), span);
    let rhs = expect_integer!(args[0].get(), span);
    Completion::Normal(Value::integer(lhs.wrapping_mul(rhs)))
}

/// `_IntLt:`
pub fn lt(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_integer!(receiver.get(), span);
    let rhs = expect_integer!(args[0].get(), span);
    Completion::Normal(interp.boolean(lhs < rhs))
}

/// `_IntEq:`
pub fn eq(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_integer!(receiver.get(), span);
    let rhs = args[0].get();
    let equal = rhs.is_integer() && unsafe { rhs.as_integer() } == lhs;
    Completion::Normal(interp.boolean(equal))
}

fn write_decimal(n: i64, newline: bool) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if newline {
        let _ = writeln!(out, "{n}");
    } else {
        let _ = write!(out, "{n}");
    }
    let _ = out.flush();
}

/// `_IntPrint`
pub fn print(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    let n = expect_integer!(receiver.get(), span);
    write_decimal(n, false);
    Completion::Normal(receiver.get())
}

/// `_IntPrintLine`
pub fn print_line(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    let n = expect_integer!(receiver.get(), span);
    write_decimal(n, true);
    Completion::Normal(receiver.get())
}

/// `_IntTimesRepeat:` — run the argument block n times. A one-argument
/// block receives the iteration index.
pub fn times_repeat(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let count = expect_integer!(receiver.get(), span);
    let block = &args[0];
    let wants_index = crate::interpreter::is_block(block.get())
        && unsafe { block.get().as_ref::<object::Block>().argument_count } == 1;

    for index in 0..count.max(0) {
        let completion = if wants_index {
            let index = Rooted::new(interp.heap, Value::integer(index));
            interp.call_block(block, std::slice::from_ref(&index), span)
        } else {
            interp.call_block(block, &[], span)
        };
        match completion {
            Completion::Normal(_) => {}
            other => return other,
        }
    }
    Completion::Normal(receiver.get())
}
