use std::io::Write;

use object::Value;
use parser::Span;

use crate::interpreter::{Completion, Interp};
use crate::primitives::type_error;
use crate::Rooted;

macro_rules! expect_float {
    ($value:expr, $span:expr) => {{
        let value = $value;
        if !value.is_float() {
            return type_error($span, "Float", value);
        }
        // SAFETY: just checked.
        unsafe { value.as_float() }
    }};
}

/// `_FloatAdd:`
pub fn add(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_float!(receiver.get(), span);
    let rhs = expect_float!(args[0].get(), span);
    Completion::Normal(Value::float(lhs + rhs))
}

/// `_FloatMul:`
pub fn mul(_interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_float!(receiver.get(), span);
    let rhs = expect_float!(args[0].get(), span);
    Completion::Normal(Value::float(lhs * rhs))
}

/// `_FloatLt:`
pub fn lt(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let lhs = expect_float!(receiver.get(), span);
    let rhs = expect_float!(args[0].get(), span);
    Completion::Normal(interp.boolean(lhs < rhs))
}

/// `_FloatPrint`
pub fn print(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    let value = expect_float!(receiver.get(), span);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let _ = write!(out, "{value}");
    let _ = out.flush();
    Completion::Normal(receiver.get())
}
