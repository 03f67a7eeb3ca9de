use parser::Span;

use crate::alloc::alloc_managed;
use crate::interpreter::{try_heap, Completion, Interp};
use crate::primitives::{expect_integer, expect_variant};
use crate::Rooted;

/// `_ManagedNew:` — wrap an opaque host resource handle. The wrapper is
/// enrolled with the finalizer queue; its hook runs after the first
/// collection that fails to trace it.
pub fn new(interp: &mut Interp, _receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let resource = expect_integer!(args[0].get(), span);
    let actor = interp.globals.current_actor;
    let map = interp.globals.empty_map;
    let nil = interp.nil();
    let managed = try_heap!(
        alloc_managed(
            interp.heap,
            &mut *interp.globals,
            actor,
            map,
            object::Value::integer(resource),
            nil,
        ),
        span
    );
    Completion::Normal(managed)
}

/// `_ManagedResource` — the wrapped handle.
pub fn resource(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), Managed, span);
    // SAFETY: variant checked above.
    let resource = unsafe { receiver.get().as_ref::<object::Managed>().resource };
    Completion::Normal(resource)
}
