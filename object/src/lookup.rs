use crate::header::{chase, Header, ObjectType};
use crate::map::{slot_name_matches, Map};
use crate::selector::Selector;
use crate::slot::{Slot, SlotFlags};
use crate::special::SpecialObjects;
use crate::{objects, Value};

/// Stack-allocated linked list for cycle detection.
///
/// Each node lives on a recursive call's stack frame and points to the
/// caller's node. Because every node outlives its callees, the raw pointer
/// chain is always valid for the duration of a lookup. Identity is the
/// object address after forward-chasing, not structural equality.
pub struct VisitedLink {
    value: Value,
    prev: *const VisitedLink,
}

impl VisitedLink {
    #[inline]
    fn contains(mut link: *const Self, target: Value) -> bool {
        while !link.is_null() {
            // SAFETY: all nodes are stack-allocated in the recursion chain
            // and remain valid for the duration of the lookup.
            let node = unsafe { &*link };
            if node.value.raw() == target.raw() {
                return true;
            }
            link = node.prev;
        }
        false
    }
}

/// The result of a message lookup.
#[derive(Debug, Clone, Copy)]
pub enum LookupResult {
    /// The selector was not found anywhere in the receiver's parent graph.
    Missing,
    /// A slot matched. The slot's value may be a plain value or a Method
    /// the evaluator activates.
    Found {
        /// The object that owns the slot (differs from the receiver when
        /// the slot was found via a parent link).
        holder: Value,
        /// Copy of the matching descriptor, with assignable slots resolved
        /// to the value stored in the holder.
        slot: Slot,
        /// Index of the slot within the holder's map.
        slot_index: u32,
    },
    /// An assignment selector matched a mutable data slot: the mutator
    /// half of the setter pair.
    Assignment {
        /// The object whose inline value area receives the write.
        holder: Value,
        /// Index of the data slot within the holder's map.
        slot_index: u32,
        /// Word index of the data within the holder's value area.
        value_index: u32,
    },
}

impl LookupResult {
    #[inline(always)]
    pub fn is_missing(&self) -> bool {
        matches!(self, LookupResult::Missing)
    }
}

/// Look up `selector` on `receiver`.
///
/// Dispatches on the receiver's variant: map-bearing objects (Slots,
/// Activation, Method, Block, Map) search their map's slot table and walk
/// parent links; payload variants (Array, ByteArray, integers, floats,
/// the intrinsic wrappers) delegate to the matching traits object in
/// `specials`, giving them a prototype chain without per-instance storage.
///
/// # Safety
///
/// - `receiver` must be a valid tagged value.
/// - All objects reachable through maps and parent links must be live.
/// - `specials` must contain valid tagged references.
#[inline]
pub unsafe fn lookup(
    receiver: Value,
    selector: Selector<'_>,
    specials: &SpecialObjects,
) -> LookupResult {
    lookup_value(receiver, selector, specials, core::ptr::null())
}

unsafe fn lookup_value(
    receiver: Value,
    selector: Selector<'_>,
    specials: &SpecialObjects,
    visited: *const VisitedLink,
) -> LookupResult {
    if receiver.is_integer() {
        return delegate(specials.integer_traits, selector, specials, visited);
    }
    if receiver.is_float() {
        return delegate(specials.float_traits, selector, specials, visited);
    }

    debug_assert!(receiver.is_reference());
    let receiver = chase(receiver);

    let header: &Header = receiver.as_ref();
    match header.object_type() {
        ObjectType::Slots
        | ObjectType::Method
        | ObjectType::Block
        | ObjectType::Activation
        | ObjectType::Map => {
            let offset = objects::values_offset(header.object_type());
            lookup_map_bearing(receiver, selector, specials, visited, offset)
        }
        ObjectType::Array => delegate(specials.array_traits, selector, specials, visited),
        ObjectType::ByteArray => {
            // Byte arrays answer the built-in parent selector with the
            // string traits object and otherwise defer into it.
            if selector.hash.regular == specials.parent_hash && selector.name == b"parent" {
                return LookupResult::Found {
                    holder: receiver,
                    slot: Slot::new(
                        SlotFlags::CONSTANT.with(SlotFlags::PARENT),
                        specials.parent_hash,
                        specials.nil,
                        specials.string_traits,
                    ),
                    slot_index: 0,
                };
            }
            delegate(specials.string_traits, selector, specials, visited)
        }
        ObjectType::Managed => delegate(specials.managed_traits, selector, specials, visited),
        ObjectType::Actor | ObjectType::ActorProxy => {
            delegate(specials.actor_traits, selector, specials, visited)
        }
        ObjectType::AddrInfo => {
            delegate(specials.addr_info_traits, selector, specials, visited)
        }
        ObjectType::ForwardedObject => {
            unreachable!("forwarded object survived forward-chasing")
        }
    }
}

#[inline]
unsafe fn delegate(
    traits: Value,
    selector: Selector<'_>,
    specials: &SpecialObjects,
    visited: *const VisitedLink,
) -> LookupResult {
    // Unwired traits (bootstrap placeholders) terminate the search rather
    // than looping through an immediate.
    if !traits.is_reference() {
        return LookupResult::Missing;
    }
    lookup_value(traits, selector, specials, visited)
}

/// Read the inline value word at `word_index` of a map-bearing object.
#[inline(always)]
unsafe fn read_object_value(obj: Value, offset: u32, word_index: u32) -> Value {
    let base = obj.address() as *const u8;
    let ptr = base.add(offset as usize) as *const Value;
    ptr.add(word_index as usize).read()
}

/// Search one object's map, then its parent slots in declaration order.
///
/// `values_offset` is the byte offset of the object's inline value area;
/// `None` means the variant stores no inline values (Method, Block, Map),
/// so assignable slots in its map are invisible to lookup.
unsafe fn lookup_map_bearing(
    obj: Value,
    selector: Selector<'_>,
    specials: &SpecialObjects,
    visited: *const VisitedLink,
    values_offset: Option<u32>,
) -> LookupResult {
    if VisitedLink::contains(visited, obj) {
        return LookupResult::Missing;
    }

    let header: &Header = obj.as_ref();
    let map_value = chase(header.map);
    if !map_value.is_reference() {
        return LookupResult::Missing;
    }
    let map: &Map = map_value.as_ref();
    let slots = map.slots();

    // Local scan.
    for (i, slot) in slots.iter().enumerate() {
        if slot.hash() != selector.hash.regular
            || !slot_name_matches(slot.name, selector.name)
        {
            continue;
        }

        let resolved = if slot.is_assignable() {
            match values_offset {
                Some(offset) => {
                    let value = read_object_value(obj, offset, slot.value_index());
                    Slot::new(slot.flags(), slot.hash(), slot.name, value)
                }
                None => continue,
            }
        } else {
            *slot
        };

        return LookupResult::Found {
            holder: obj,
            slot: resolved,
            slot_index: i as u32,
        };
    }

    // Assignment scan: `foo:` writes through the mutable data slot `foo`.
    if let (Some(target_hash), Some(_)) = (selector.hash.assign_target, values_offset) {
        let target_name = selector.assign_target_name();
        if let Some((i, slot)) = map.find_assignment_target(target_hash, target_name) {
            return LookupResult::Assignment {
                holder: obj,
                slot_index: i,
                value_index: slot.value_index(),
            };
        }
    }

    // Parent walk, declaration order, first hit wins.
    let link = VisitedLink {
        value: obj,
        prev: visited,
    };

    for slot in slots.iter() {
        if !slot.is_parent() {
            continue;
        }

        let parent = if slot.is_assignable() {
            match values_offset {
                Some(offset) => read_object_value(obj, offset, slot.value_index()),
                None => continue,
            }
        } else {
            slot.value
        };

        match lookup_value(parent, selector, specials, &link) {
            LookupResult::Missing => continue,
            hit => return hit,
        }
    }

    LookupResult::Missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{init_map, map_allocation_size};
    use crate::objects::{init_byte_array, init_slots, slots_allocation_size};
    use crate::objects::{byte_array_allocation_size, ByteArray};
    use crate::selector::{hash_selector, Selector};
    use crate::Map;

    /// Specials where every traits object is unwired (nil = integer 0).
    fn dummy_specials() -> SpecialObjects {
        SpecialObjects::placeholder(Value::integer(0))
    }

    /// 8-byte aligned scratch buffer.
    fn buffer(size: usize) -> Vec<u64> {
        vec![0u64; size / 8 + 1]
    }

    fn alloc_map(map_map: Value, slots: &[Slot]) -> (Vec<u64>, Value) {
        let size = map_allocation_size(slots.len() as u32);
        let mut buf = buffer(size);
        let ptr = buf.as_mut_ptr() as *mut Map;
        let value_count = crate::map::required_value_count(slots);
        unsafe {
            init_map(ptr, map_map, 0, slots, value_count);
        }
        let val = Value::reference(ptr);
        (buf, val)
    }

    fn alloc_slots(map: Value, values: &[Value]) -> (Vec<u64>, Value) {
        let size = slots_allocation_size(values.len() as u32);
        let mut buf = buffer(size);
        let ptr = buf.as_mut_ptr() as *mut crate::SlotsObject;
        unsafe {
            init_slots(ptr, 0, map, values);
        }
        let val = Value::reference(ptr);
        (buf, val)
    }

    fn alloc_name(name: &str) -> (Vec<u64>, Value) {
        let size = byte_array_allocation_size(name.len() as u64);
        let mut buf = buffer(size);
        let ptr = buf.as_mut_ptr() as *mut ByteArray;
        unsafe {
            init_byte_array(ptr, 0, Value::integer(0), name.as_bytes());
        }
        let val = Value::reference(ptr);
        (buf, val)
    }

    fn constant_slot(name: &str, value: Value) -> Slot {
        Slot::new(
            SlotFlags::CONSTANT,
            hash_selector(name.as_bytes()),
            Value::integer(0),
            value,
        )
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[test]
    fn lookup_constant_slot() {
        let specials = dummy_specials();
        let slot_value = Value::integer(42);

        let slot = constant_slot("answer", slot_value);
        let (_map_buf, map_val) = alloc_map(specials.nil, &[slot]);
        let (_obj_buf, obj_val) = alloc_slots(map_val, &[]);

        unsafe {
            match lookup(obj_val, Selector::new("answer"), &specials) {
                LookupResult::Found {
                    holder,
                    slot,
                    slot_index,
                } => {
                    assert_eq!(holder.raw(), obj_val.raw());
                    assert_eq!(slot.value.raw(), slot_value.raw());
                    assert_eq!(slot_index, 0);
                }
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn lookup_assignable_slot_resolves_stored_value() {
        let specials = dummy_specials();
        let stored = Value::integer(99);

        let slot = Slot::new(
            SlotFlags::ASSIGNABLE,
            hash_selector(b"x"),
            Value::integer(0),
            Value::integer(0), // word index 0
        );
        let (_map_buf, map_val) = alloc_map(specials.nil, &[slot]);
        let (_obj_buf, obj_val) = alloc_slots(map_val, &[stored]);

        unsafe {
            match lookup(obj_val, Selector::new("x"), &specials) {
                LookupResult::Found { slot, .. } => {
                    assert_eq!(slot.value.raw(), stored.raw());
                }
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn lookup_assignment_selector_finds_mutable_slot() {
        let specials = dummy_specials();

        let slot = Slot::new(
            SlotFlags::ASSIGNABLE,
            hash_selector(b"x"),
            Value::integer(0),
            Value::integer(0),
        );
        let (_map_buf, map_val) = alloc_map(specials.nil, &[slot]);
        let (_obj_buf, obj_val) = alloc_slots(map_val, &[Value::integer(7)]);

        unsafe {
            match lookup(obj_val, Selector::new("x:"), &specials) {
                LookupResult::Assignment {
                    holder,
                    slot_index,
                    value_index,
                } => {
                    assert_eq!(holder.raw(), obj_val.raw());
                    assert_eq!(slot_index, 0);
                    assert_eq!(value_index, 0);
                }
                other => panic!("expected Assignment, got {other:?}"),
            }
        }
    }

    #[test]
    fn assignment_does_not_match_constant_slot() {
        let specials = dummy_specials();

        let slot = constant_slot("x", Value::integer(1));
        let (_map_buf, map_val) = alloc_map(specials.nil, &[slot]);
        let (_obj_buf, obj_val) = alloc_slots(map_val, &[]);

        unsafe {
            assert!(lookup(obj_val, Selector::new("x:"), &specials).is_missing());
        }
    }

    #[test]
    fn lookup_parent_delegation() {
        let specials = dummy_specials();
        let greeting = Value::integer(77);

        let parent_slot = constant_slot("greet", greeting);
        let (_pm_buf, parent_map) = alloc_map(specials.nil, &[parent_slot]);
        let (_p_buf, parent_val) = alloc_slots(parent_map, &[]);

        let parent_link = Slot::new(
            SlotFlags::CONSTANT.with(SlotFlags::PARENT),
            hash_selector(b"p"),
            Value::integer(0),
            parent_val,
        );
        let (_cm_buf, child_map) = alloc_map(specials.nil, &[parent_link]);
        let (_c_buf, child_val) = alloc_slots(child_map, &[]);

        unsafe {
            match lookup(child_val, Selector::new("greet"), &specials) {
                LookupResult::Found { holder, slot, .. } => {
                    assert_eq!(holder.raw(), parent_val.raw());
                    assert_eq!(slot.value.raw(), greeting.raw());
                }
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn lookup_first_parent_wins() {
        let specials = dummy_specials();

        let (_am_buf, a_map) = alloc_map(specials.nil, &[constant_slot("v", Value::integer(1))]);
        let (_a_buf, a_val) = alloc_slots(a_map, &[]);
        let (_bm_buf, b_map) = alloc_map(specials.nil, &[constant_slot("v", Value::integer(2))]);
        let (_b_buf, b_val) = alloc_slots(b_map, &[]);

        let link_a = Slot::new(
            SlotFlags::CONSTANT.with(SlotFlags::PARENT),
            hash_selector(b"pa"),
            Value::integer(0),
            a_val,
        );
        let link_b = Slot::new(
            SlotFlags::CONSTANT.with(SlotFlags::PARENT),
            hash_selector(b"pb"),
            Value::integer(0),
            b_val,
        );
        let (_cm_buf, child_map) = alloc_map(specials.nil, &[link_a, link_b]);
        let (_c_buf, child_val) = alloc_slots(child_map, &[]);

        unsafe {
            match lookup(child_val, Selector::new("v"), &specials) {
                LookupResult::Found { slot, .. } => {
                    assert_eq!(slot.value.raw(), Value::integer(1).raw());
                }
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn lookup_cycle_detection() {
        let specials = dummy_specials();

        // Two objects that are each other's parents; parent links are
        // mutable so we can patch them after allocation.
        let link = Slot::new(
            SlotFlags::ASSIGNABLE.with(SlotFlags::PARENT),
            hash_selector(b"p"),
            Value::integer(0),
            Value::integer(0), // word index 0
        );
        let (_am_buf, a_map) = alloc_map(specials.nil, &[link]);
        let (_bm_buf, b_map) = alloc_map(specials.nil, &[link]);

        let (mut a_buf, a_val) = alloc_slots(a_map, &[Value::integer(0)]);
        let (_b_buf, b_val) = alloc_slots(b_map, &[a_val]);

        // Patch A's parent value to B, closing the cycle.
        unsafe {
            let a = &mut *(a_buf.as_mut_ptr() as *mut crate::SlotsObject);
            a.write_value(0, b_val);
        }

        unsafe {
            assert!(lookup(a_val, Selector::new("absent"), &specials).is_missing());
        }
    }

    #[test]
    fn lookup_through_assignable_parent() {
        let specials = dummy_specials();
        let target = Value::integer(55);

        let (_pm_buf, parent_map) = alloc_map(specials.nil, &[constant_slot("t", target)]);
        let (_p_buf, parent_val) = alloc_slots(parent_map, &[]);

        let link = Slot::new(
            SlotFlags::ASSIGNABLE.with(SlotFlags::PARENT),
            hash_selector(b"p"),
            Value::integer(0),
            Value::integer(0),
        );
        let (_cm_buf, child_map) = alloc_map(specials.nil, &[link]);
        let (_c_buf, child_val) = alloc_slots(child_map, &[parent_val]);

        unsafe {
            match lookup(child_val, Selector::new("t"), &specials) {
                LookupResult::Found { holder, slot, .. } => {
                    assert_eq!(holder.raw(), parent_val.raw());
                    assert_eq!(slot.value.raw(), target.raw());
                }
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn lookup_miss() {
        let specials = dummy_specials();
        let (_map_buf, map_val) =
            alloc_map(specials.nil, &[constant_slot("something", Value::integer(1))]);
        let (_obj_buf, obj_val) = alloc_slots(map_val, &[]);

        unsafe {
            assert!(lookup(obj_val, Selector::new("absent"), &specials).is_missing());
        }
    }

    #[test]
    fn hash_collision_rechecks_name() {
        let specials = dummy_specials();

        // Forge a slot whose hash matches "b" but whose name bytes say "a".
        let (_n_buf, name_a) = alloc_name("a");
        let forged = Slot::new(
            SlotFlags::CONSTANT,
            hash_selector(b"b"),
            name_a,
            Value::integer(13),
        );
        let (_map_buf, map_val) = alloc_map(specials.nil, &[forged]);
        let (_obj_buf, obj_val) = alloc_slots(map_val, &[]);

        unsafe {
            assert!(lookup(obj_val, Selector::new("b"), &specials).is_missing());
        }
    }

    #[test]
    fn integer_receiver_delegates_to_traits() {
        let value = Value::integer(33);
        let (_tm_buf, traits_map) =
            alloc_map(Value::integer(0), &[constant_slot("succ", value)]);
        let (_t_buf, traits_val) = alloc_slots(traits_map, &[]);

        let mut specials = dummy_specials();
        specials.integer_traits = traits_val;

        unsafe {
            match lookup(Value::integer(42), Selector::new("succ"), &specials) {
                LookupResult::Found { slot, .. } => {
                    assert_eq!(slot.value.raw(), value.raw());
                }
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn byte_array_answers_parent_with_string_traits() {
        let (_tm_buf, traits_map) =
            alloc_map(Value::integer(0), &[constant_slot("reverse", Value::integer(5))]);
        let (_t_buf, traits_val) = alloc_slots(traits_map, &[]);

        let mut specials = dummy_specials();
        specials.string_traits = traits_val;

        let (_s_buf, string_val) = alloc_name("hello");

        unsafe {
            // The built-in parent selector answers the traits object itself.
            match lookup(string_val, Selector::new("parent"), &specials) {
                LookupResult::Found { slot, .. } => {
                    assert_eq!(slot.value.raw(), traits_val.raw());
                    assert!(slot.is_parent());
                }
                other => panic!("expected Found, got {other:?}"),
            }

            // Anything else delegates into the traits object.
            match lookup(string_val, Selector::new("reverse"), &specials) {
                LookupResult::Found { holder, .. } => {
                    assert_eq!(holder.raw(), traits_val.raw());
                }
                other => panic!("expected Found, got {other:?}"),
            }
        }
    }
}
