use object::{ObjectType, Reachability, Value};
use parser::Span;

use crate::alloc::{alloc_actor_object, alloc_actor_proxy};
use crate::interpreter::{try_heap, Completion, Interp};
use crate::primitives::{object_type_of, type_error};
use crate::Rooted;

/// `_ActorSpawn` — register a new actor and answer its Actor object.
///
/// The Actor object itself belongs to the new actor's domain.
pub fn spawn(interp: &mut Interp, _receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    let nil = interp.nil();
    let id = interp.globals.actors.register(nil);
    let map = interp.globals.empty_map;
    let object = try_heap!(
        alloc_actor_object(
            interp.heap,
            &mut *interp.globals,
            id,
            map,
            Value::integer(id as i64),
            nil,
        ),
        span
    );
    interp.globals.actors.set_object(id, object);
    Completion::Normal(object)
}

fn target_actor_id(value: Value) -> Option<u32> {
    // SAFETY: the caller verified the variant.
    unsafe {
        match object_type_of(value)? {
            ObjectType::Actor => Some(value.as_ref::<object::Actor>().actor.as_integer() as u32),
            ObjectType::ActorProxy => {
                Some(value.as_ref::<object::ActorProxy>().actor.as_integer() as u32)
            }
            _ => None,
        }
    }
}

/// `_ActorSend:` — enqueue a message for the receiver actor.
///
/// Immediates and Global-reachability objects cross domains as-is; a
/// Local object is wrapped in an ActorProxy so the remote actor never
/// holds a direct reference into this actor's heap.
pub fn send(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let Some(target) = target_actor_id(receiver.get()) else {
        return type_error(span, "Actor", receiver.get());
    };
    if !interp.globals.actors.contains(target) {
        return Completion::RuntimeError {
            message: format!("unknown actor {target}"),
            span,
        };
    }

    let message = args[0].get();
    let needs_proxy = message.is_reference() && {
        // SAFETY: checked reference.
        let header: &object::Header = unsafe { message.as_ref() };
        header.reachability() == Reachability::Local
    };

    let payload = if needs_proxy {
        let source = interp.globals.current_actor;
        let map = interp.globals.empty_map;
        try_heap!(
            alloc_actor_proxy(
                interp.heap,
                &mut *interp.globals,
                target,
                map,
                Value::integer(source as i64),
                message,
            ),
            span
        )
    } else {
        message
    };

    interp.globals.actors.enqueue(target, payload);
    Completion::Normal(receiver.get())
}

/// `_ActorReceive` — dequeue the current actor's next message, FIFO.
pub fn receive(interp: &mut Interp, _receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    let current = interp.globals.current_actor;
    match interp.globals.actors.dequeue(current) {
        Some(message) => Completion::Normal(message),
        None => Completion::RuntimeError {
            message: "mailbox is empty".into(),
            span,
        },
    }
}

/// `_ActorYield` — an explicit suspension point. The cooperative
/// single-actor runtime has nothing to switch to, so this is a no-op.
pub fn r#yield(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], _span: Span) -> Completion {
    Completion::Normal(receiver.get())
}
