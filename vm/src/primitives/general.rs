use object::{Map, ObjectType};
use parser::Span;

use crate::alloc::{add_constant_slots, clone_object};
use crate::interpreter::{try_heap, Completion, Interp};
use crate::primitives::{object_type_of, type_error};
use crate::{value_to_string, Rooted};

/// `_Error:` — construct a runtime-error completion from a message value.
pub fn error(_interp: &mut Interp, _receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let message = value_to_string(args[0].get())
        .unwrap_or_else(|| format!("{:?}", args[0].get()));
    Completion::RuntimeError { message, span }
}

/// `_Clone` — shallow-copy the receiver for the current actor.
pub fn clone(interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    let actor = interp.globals.current_actor;
    let value = try_heap!(
        clone_object(interp.heap, &mut *interp.globals, actor, receiver.get()),
        span
    );
    Completion::Normal(value)
}

/// `_AddSlots:` — extend the receiver's map with the argument object's
/// constant slots (a shape transition; the old map is left untouched for
/// its other holders).
pub fn add_slots(interp: &mut Interp, receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    let holder = receiver.get();
    if object_type_of(holder) != Some(ObjectType::Slots) {
        return type_error(span, "Slots", holder);
    }
    let addition = args[0].get();
    if object_type_of(addition) != Some(ObjectType::Slots) {
        return type_error(span, "Slots", addition);
    }

    // SAFETY: both objects are live; maps are read before any allocation.
    let additions: Vec<object::Slot> = unsafe {
        let map: &Map = object::chase(addition.as_ref::<object::Header>().map).as_ref();
        map.slots().to_vec()
    };
    if additions.iter().any(|slot| slot.is_assignable()) {
        return Completion::RuntimeError {
            message: "only constant slots can be added to an existing object".into(),
            span,
        };
    }

    let actor = interp.globals.current_actor;
    let map_map = interp.globals.specials.map_map;
    // SAFETY: the rooted receiver is live.
    let old_map = unsafe { receiver.get().as_ref::<object::Header>().map };
    let new_map = try_heap!(
        add_constant_slots(
            interp.heap,
            &mut *interp.globals,
            actor,
            map_map,
            old_map,
            &additions
        ),
        span
    );

    // SAFETY: the rooted receiver is live; the map word is a plain field.
    unsafe {
        receiver.get().as_mut::<object::Header>().map = new_map;
    }
    interp.heap.record_store(receiver.get(), new_map);
    Completion::Normal(receiver.get())
}

/// `_ChooseFirst:Or:` — evaluate the first block (true's `ifTrue:False:`).
pub fn choose_first(interp: &mut Interp, _receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    interp.call_block(&args[0], &[], span)
}

/// `_ChooseSecond:Or:` — evaluate the second block (false's `ifTrue:False:`).
pub fn choose_second(interp: &mut Interp, _receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    interp.call_block(&args[1], &[], span)
}
