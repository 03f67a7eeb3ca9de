use parser::Span;

use crate::interpreter::{is_block, Completion, Interp};
use crate::primitives::type_error;
use crate::Rooted;

/// `_BlockValue`
pub fn value0(interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    interp.call_block(receiver, &[], span)
}

/// `_BlockValue:`
pub fn value1(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    interp.call_block(receiver, args, span)
}

/// `_BlockValue:With:`
pub fn value2(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    interp.call_block(receiver, args, span)
}

/// Run the receiver block, passing the reason argument along when the
/// block declares a parameter for it.
fn run_harness_block(
    interp: &mut Interp,
    block: &Rooted,
    reason: &Rooted,
    span: Span,
) -> Completion {
    if !is_block(block.get()) {
        return type_error(span, "Block", block.get());
    }
    // SAFETY: checked above.
    let argument_count = unsafe { block.get().as_ref::<object::Block>().argument_count };
    match argument_count {
        0 => interp.call_block(block, &[], span),
        1 => interp.call_block(block, std::slice::from_ref(reason), span),
        other => Completion::RuntimeError {
            message: format!("harness block takes {other} arguments, expected 0 or 1"),
            span,
        },
    }
}

/// `_ExpectToFail:` — succeed exactly when the receiver block produces a
/// runtime error (the error is swallowed).
pub fn expect_to_fail(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    match run_harness_block(interp, receiver, &args[0], span) {
        Completion::RuntimeError { .. } => Completion::Normal(interp.nil()),
        Completion::Normal(_) => Completion::RuntimeError {
            message: "expected the block to fail, but it completed normally".into(),
            span,
        },
        other => other,
    }
}

/// `_ExpectToNotFail:` — pass the block's value through; a runtime error
/// propagates.
pub fn expect_to_not_fail(
    interp: &mut Interp,
    receiver: &Rooted,
    args: &[Rooted],
    span: Span,
) -> Completion {
    run_harness_block(interp, receiver, &args[0], span)
}
