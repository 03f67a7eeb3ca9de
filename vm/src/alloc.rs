//! Typed allocation helpers over [`AllocationToken`]s.
//!
//! Every helper pins its Value arguments in the tracked-root table before
//! reserving, so a collection triggered by the reservation cannot leave
//! the initializers pointing into from-space. Reservation and payload
//! allocation happen atomically through one token per object.

use std::ptr;

use heap::{Generation, Heap, HeapError, RootProvider, Tracked};
use object::{
    activation_allocation_size, actor_allocation_size, actor_proxy_allocation_size,
    addr_info_allocation_size, array_allocation_size, block_allocation_size,
    byte_array_allocation_size, init_activation, init_actor, init_actor_proxy, init_addr_info,
    init_array, init_array_with, init_block, init_byte_array, init_managed, init_map,
    init_method, init_slots, managed_allocation_size, map_allocation_size,
    method_allocation_size, slots_allocation_size, Activation, Array, ByteArray, Header, Map,
    ObjectType, Slot, SlotsObject, Value,
};

/// A batch of values pinned for the duration of one allocation.
struct Pinned<'h> {
    heap: &'h Heap,
    tracked: Vec<Tracked>,
}

impl<'h> Pinned<'h> {
    fn new(heap: &'h Heap, values: &[Value]) -> Self {
        Self {
            heap,
            tracked: values.iter().map(|value| heap.track(*value)).collect(),
        }
    }

    #[inline]
    fn get(&self, index: usize) -> Value {
        self.heap.get(&self.tracked[index])
    }
}

impl Drop for Pinned<'_> {
    fn drop(&mut self) {
        for tracked in self.tracked.drain(..) {
            self.heap.release(tracked);
        }
    }
}

/// Allocate a [`Map`] with inline slot descriptors.
pub fn alloc_map(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map_map: Value,
    slots: &[Slot],
    value_count: u32,
) -> Result<Value, HeapError> {
    let mut pin_values = Vec::with_capacity(1 + slots.len() * 2);
    pin_values.push(map_map);
    for slot in slots {
        pin_values.push(slot.name);
        pin_values.push(slot.value);
    }
    let pinned = Pinned::new(heap, &pin_values);

    let size = map_allocation_size(slots.len() as u32);
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Map, size).as_ptr() as *mut Map;

    let rebuilt: Vec<Slot> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| Slot {
            meta: slot.meta,
            name: pinned.get(1 + i * 2),
            value: pinned.get(2 + i * 2),
        })
        .collect();

    unsafe {
        init_map(ptr, pinned.get(0), actor_id, &rebuilt, value_count);
    }
    Ok(Value::reference(ptr))
}

/// Allocate a [`SlotsObject`] with inline values.
pub fn alloc_slots_object(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    values: &[Value],
) -> Result<Value, HeapError> {
    let mut pin_values = Vec::with_capacity(1 + values.len());
    pin_values.push(map);
    pin_values.extend_from_slice(values);
    let pinned = Pinned::new(heap, &pin_values);

    let size = slots_allocation_size(values.len() as u32);
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Slots, size).as_ptr() as *mut SlotsObject;

    let fresh: Vec<Value> = (0..values.len()).map(|i| pinned.get(1 + i)).collect();
    unsafe {
        init_slots(ptr, actor_id, pinned.get(0), &fresh);
    }
    Ok(Value::reference(ptr))
}

/// Allocate a [`ByteArray`] holding `bytes`.
pub fn alloc_byte_array(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    bytes: &[u8],
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map]);
    let size = byte_array_allocation_size(bytes.len() as u64);
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::ByteArray, size).as_ptr() as *mut ByteArray;
    unsafe {
        init_byte_array(ptr, actor_id, pinned.get(0), bytes);
    }
    Ok(Value::reference(ptr))
}

/// Allocate an [`Array`] from a slice of elements.
pub fn alloc_array_with(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    elements: &[Value],
) -> Result<Value, HeapError> {
    let mut pin_values = Vec::with_capacity(1 + elements.len());
    pin_values.push(map);
    pin_values.extend_from_slice(elements);
    let pinned = Pinned::new(heap, &pin_values);

    let size = array_allocation_size(elements.len() as u64);
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Array, size).as_ptr() as *mut Array;

    let fresh: Vec<Value> = (0..elements.len()).map(|i| pinned.get(1 + i)).collect();
    unsafe {
        init_array_with(ptr, actor_id, pinned.get(0), &fresh);
    }
    Ok(Value::reference(ptr))
}

/// Allocate an [`Array`] of `length` copies of `fill`.
pub fn alloc_array_fill(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    length: u64,
    fill: Value,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, fill]);
    let size = array_allocation_size(length);
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Array, size).as_ptr() as *mut Array;
    unsafe {
        init_array(ptr, actor_id, pinned.get(0), length);
        let array = &mut *ptr;
        let fill = pinned.get(1);
        for element in array.elements_mut() {
            *element = fill;
        }
    }
    Ok(Value::reference(ptr))
}

/// Allocate a [`Method`](object::Method).
pub fn alloc_method(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    code: Value,
    argument_count: u32,
    local_count: u32,
    kind: u8,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, code]);
    let size = method_allocation_size();
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Method, size).as_ptr() as *mut object::Method;
    unsafe {
        init_method(
            ptr,
            actor_id,
            pinned.get(0),
            pinned.get(1),
            argument_count,
            local_count,
            kind,
        );
    }
    Ok(Value::reference(ptr))
}

/// Allocate a [`Block`](object::Block) closure.
pub fn alloc_block(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    code: Value,
    argument_count: u32,
    local_count: u32,
    home: Value,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, code, home]);
    let size = block_allocation_size();
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Block, size).as_ptr() as *mut object::Block;
    unsafe {
        init_block(
            ptr,
            actor_id,
            pinned.get(0),
            pinned.get(1),
            argument_count,
            local_count,
            pinned.get(2),
        );
    }
    Ok(Value::reference(ptr))
}

/// Allocate an [`Activation`] frame. The local area starts out as `fill`.
pub fn alloc_activation(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    receiver: Value,
    sender: Value,
    method: Value,
    fill: Value,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, receiver, sender, method, fill]);

    // The map prescribes the frame size (fixed fields included).
    let value_count = unsafe {
        let map: &Map = pinned.get(0).as_ref();
        map.value_count()
    };
    debug_assert!(value_count >= Activation::FIXED_VALUES);

    let size = activation_allocation_size(value_count);
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Activation, size).as_ptr() as *mut Activation;
    unsafe {
        init_activation(
            ptr,
            actor_id,
            pinned.get(0),
            pinned.get(1),
            pinned.get(2),
            pinned.get(3),
            value_count,
            pinned.get(4),
        );
    }
    Ok(Value::reference(ptr))
}

/// Allocate a [`Managed`](object::Managed) wrapper and enroll it with the
/// heap's finalizer queue.
pub fn alloc_managed(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    resource: Value,
    finalizer: Value,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, resource, finalizer]);
    let size = managed_allocation_size();
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Managed, size).as_ptr() as *mut object::Managed;
    unsafe {
        init_managed(ptr, actor_id, pinned.get(0), pinned.get(1), pinned.get(2));
    }
    let value = Value::reference(ptr);
    heap.register_finalizable(value);
    Ok(value)
}

/// Allocate an [`Actor`](object::Actor) object.
pub fn alloc_actor_object(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    actor: Value,
    activation: Value,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, actor, activation]);
    let size = actor_allocation_size();
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::Actor, size).as_ptr() as *mut object::Actor;
    unsafe {
        init_actor(ptr, actor_id, pinned.get(0), pinned.get(1), pinned.get(2));
    }
    Ok(Value::reference(ptr))
}

/// Allocate an [`ActorProxy`](object::ActorProxy), the only kind of
/// reference that may cross actor domains.
pub fn alloc_actor_proxy(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    actor: Value,
    target: Value,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, actor, target]);
    let size = actor_proxy_allocation_size();
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::ActorProxy, size).as_ptr() as *mut object::ActorProxy;
    unsafe {
        init_actor_proxy(ptr, actor_id, pinned.get(0), pinned.get(1), pinned.get(2));
    }
    Ok(Value::reference(ptr))
}

/// Allocate an [`AddrInfo`](object::AddrInfo) wrapper.
pub fn alloc_addr_info(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map: Value,
    host: Value,
    port: Value,
    addresses: Value,
) -> Result<Value, HeapError> {
    let pinned = Pinned::new(heap, &[map, host, port, addresses]);
    let size = addr_info_allocation_size();
    let mut token = heap.reserve(Generation::Young, size, roots)?;
    let ptr = token.allocate(ObjectType::AddrInfo, size).as_ptr() as *mut object::AddrInfo;
    unsafe {
        init_addr_info(
            ptr,
            actor_id,
            pinned.get(0),
            pinned.get(1),
            pinned.get(2),
            pinned.get(3),
        );
    }
    Ok(Value::reference(ptr))
}

/// Clone an object for `actor_id`: copy it (payload included) into fresh
/// space, preserving the map and resetting the collection bookkeeping.
/// Immediates clone to themselves.
pub fn clone_object(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    value: Value,
) -> Result<Value, HeapError> {
    if !value.is_reference() {
        return Ok(value);
    }

    let pinned = Pinned::new(heap, &[value]);
    // SAFETY: the pinned value is a live object reference.
    let size = unsafe { crate::object_size(pinned.get(0).address() as *const u8) };

    let mut token = heap.reserve(Generation::Young, size, roots)?;

    let source = pinned.get(0);
    let src = source.address() as *const u8;
    // SAFETY: pinned source survived any collection the reservation ran.
    let src_header = unsafe { &*(src as *const Header) };
    let kind = src_header.object_type();

    let ptr = token.allocate(kind, size).as_ptr();
    // SAFETY: destination was just carved out with the exact object size.
    unsafe {
        ptr::copy_nonoverlapping(src, ptr, size);
        let new_header = &mut *(ptr as *mut Header);
        *new_header = Header::new(kind, actor_id, src_header.map);
        new_header.set_extra(src_header.extra());
    }

    let clone = Value::reference(ptr);
    if object::can_finalize(kind) {
        heap.register_finalizable(clone);
    }
    Ok(clone)
}

/// Shape transition: a new Map that is `old_map` plus `additions`.
///
/// Only constant (and constant-parent) slots may be added this way — the
/// host object's inline value area cannot grow in place. The caller
/// re-points the object's map word (with the write barrier) afterwards.
pub fn add_constant_slots(
    heap: &Heap,
    roots: &mut dyn RootProvider,
    actor_id: u32,
    map_map: Value,
    old_map: Value,
    additions: &[Slot],
) -> Result<Value, HeapError> {
    debug_assert!(additions.iter().all(|slot| !slot.is_assignable()));

    // SAFETY: old_map references a live Map.
    let (mut slots, value_count) = unsafe {
        let map: &Map = old_map.as_ref();
        (map.slots().to_vec(), map.value_count())
    };

    // Re-declaring a selector replaces the old descriptor.
    for addition in additions {
        match slots
            .iter_mut()
            .find(|slot| slot.hash() == addition.hash() && slot.is_constant())
        {
            Some(slot) => *slot = *addition,
            None => slots.push(*addition),
        }
    }

    alloc_map(heap, roots, actor_id, map_map, &slots, value_count)
}
