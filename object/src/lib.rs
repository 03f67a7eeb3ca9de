mod handle;
mod header;
mod lookup;
mod map;
mod objects;
mod selector;
mod slot;
mod special;
mod value;

pub use handle::Tagged;
pub use header::{chase, Header, ObjectInfo, ObjectType, Reachability, MAX_ACTOR_ID};
pub use lookup::{lookup, LookupResult, VisitedLink};
pub use map::{
    init_map, is_data_mutable, map_allocation_size, required_value_count, slot_name_matches, Map,
};
pub use objects::{
    activation_allocation_size, actor_allocation_size, actor_proxy_allocation_size,
    addr_info_allocation_size, array_allocation_size, block_allocation_size,
    byte_array_allocation_size, can_finalize, init_activation, init_actor, init_actor_proxy,
    init_addr_info, init_array, init_array_with, init_block, init_byte_array,
    init_byte_array_zeroed, init_managed, init_method, init_slots, managed_allocation_size,
    method_allocation_size, slots_allocation_size, values_offset, Activation, Actor, ActorProxy,
    AddrInfo, Array, Block, ByteArray, Managed, Method, ObjectRef, SlotsObject,
    ACTIVATION_RETURNED, METHOD_KIND_PRIMITIVE, METHOD_KIND_SCRIPT,
};
pub use selector::{hash_selector, parent_hash, Selector, SelectorHash, PARENT_NAME};
pub use slot::{Slot, SlotFlags};
pub use special::SpecialObjects;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    // ── Value tagging ──────────────────────────────────────────────

    #[test]
    fn integer_round_trip() {
        for &n in &[0i64, 1, -1, 42, -42, (1 << 61) - 1, -(1 << 61)] {
            let v = Value::integer(n);
            assert!(v.is_integer());
            assert!(!v.is_reference());
            assert!(!v.is_float());
            assert!(!v.is_marker());
            assert_eq!(unsafe { v.as_integer() }, n);
        }
    }

    #[test]
    fn integer_zero_is_zero_bits() {
        assert_eq!(Value::integer(0).raw(), 0);
    }

    #[test]
    fn float_round_trip_is_truncated() {
        for &f in &[0.0f64, 1.5, -2.25, 1024.0] {
            let v = Value::float(f);
            assert!(v.is_float());
            assert!(!v.is_integer());
            // Dyadic values with short mantissas survive the 2-bit truncation.
            assert_eq!(unsafe { v.as_float() }, f);
        }

        // A full-mantissa value loses exactly its two low mantissa bits.
        let f = core::f64::consts::PI;
        let v = Value::float(f);
        assert_eq!(unsafe { v.as_float() }.to_bits(), f.to_bits() & !0b11);
    }

    #[test]
    fn reference_tagging() {
        let dummy: u64 = 0;
        let ptr = &dummy as *const u64;
        let v = Value::reference(ptr);
        assert!(v.is_reference());
        assert!(!v.is_integer());
        assert!(!v.is_marker());
        assert_eq!(v.address(), ptr as u64);
    }

    // ── Tagged ─────────────────────────────────────────────────────

    #[test]
    fn tagged_wraps_immediates() {
        let h = Tagged::<()>::from_value(Value::integer(42));
        assert!(h.is_integer());
        assert!(!h.is_reference());
        assert_eq!(unsafe { h.value().as_integer() }, 42);
    }

    #[test]
    fn tagged_round_trips_references() {
        let data: u64 = 0xCAFE;
        let h = Tagged::<u64>::from_ptr(&data);
        assert!(h.is_reference());
        assert_eq!(unsafe { *h.as_ref() }, 0xCAFE);
        let copy = h;
        assert_eq!(copy.value().raw(), h.value().raw());
    }

    // ── Header ─────────────────────────────────────────────────────

    #[test]
    fn header_word_is_a_marker() {
        let header = Header::new(ObjectType::Slots, 0, Value::integer(0));
        let raw = unsafe { *((&header) as *const Header as *const u64) };
        let v = Value::from_raw(raw);
        assert!(v.is_marker());
        assert!(!v.is_integer());
        assert!(!v.is_reference());
    }

    #[test]
    fn header_round_trips_every_variant() {
        for raw in 0..ObjectType::COUNT as u8 {
            let ty = ObjectType::from_raw(raw);
            let header = Header::new(ty, 7, Value::integer(0));
            assert_eq!(header.object_type(), ty);
            assert_eq!(header.actor_id(), 7);
            assert_eq!(header.reachability(), Reachability::Local);
        }
    }

    #[test]
    fn header_field_independence() {
        let mut header = Header::new(ObjectType::ByteArray, MAX_ACTOR_ID, Value::integer(0));
        header.set_extra(0xAB);
        header.set_reachability(Reachability::Global);
        header.set_age(5);
        header.set_remembered(true);

        assert_eq!(header.object_type(), ObjectType::ByteArray);
        assert_eq!(header.actor_id(), MAX_ACTOR_ID);
        assert_eq!(header.extra(), 0xAB);
        assert_eq!(header.reachability(), Reachability::Global);
        assert_eq!(header.age(), 5);
        assert!(header.remembered());

        header.set_remembered(false);
        assert!(!header.remembered());
        assert_eq!(header.age(), 5);
        assert_eq!(header.extra(), 0xAB);
    }

    #[test]
    fn forwarding_is_one_shot() {
        let first: u64 = 0;
        let second: u64 = 0;
        let target_a = Value::reference(&first as *const u64);
        let target_b = Value::reference(&second as *const u64);

        let mut header = Header::new(ObjectType::Array, 3, Value::integer(0));
        assert!(!header.is_forwarded());

        assert!(header.forward_to(target_a));
        assert!(header.is_forwarded());
        assert_eq!(header.forward_address().raw(), target_a.raw());
        // Forwarding replaces the variant, not the actor stamp.
        assert_eq!(header.actor_id(), 3);

        assert!(!header.forward_to(target_b));
        assert_eq!(header.forward_address().raw(), target_a.raw());
    }

    // ── Slots ──────────────────────────────────────────────────────

    #[test]
    fn slot_flags_round_trip() {
        let flags = SlotFlags::ASSIGNABLE.with(SlotFlags::PARENT);
        let s = Slot::new(flags, 0xDEAD, Value::integer(0), Value::integer(2));
        assert!(s.is_assignable());
        assert!(s.is_parent());
        assert!(!s.is_constant());
        assert!(!s.is_argument());
        assert_eq!(s.hash(), 0xDEAD);
        assert_eq!(s.value_index(), 2);
    }

    #[test]
    fn data_mutable_excludes_parents_and_arguments() {
        assert!(is_data_mutable(SlotFlags::ASSIGNABLE));
        assert!(!is_data_mutable(SlotFlags::ASSIGNABLE.with(SlotFlags::PARENT)));
        assert!(!is_data_mutable(SlotFlags::ASSIGNABLE.with(SlotFlags::ARGUMENT)));
        assert!(!is_data_mutable(SlotFlags::CONSTANT));
    }

    // ── Layout ─────────────────────────────────────────────────────

    #[test]
    fn allocation_sizes() {
        assert_eq!(map_allocation_size(0), 24);
        assert_eq!(map_allocation_size(2), 24 + 2 * 24);
        assert_eq!(slots_allocation_size(0), 16);
        assert_eq!(slots_allocation_size(3), 16 + 3 * 8);
        assert_eq!(array_allocation_size(4), 24 + 4 * 8);
        assert_eq!(byte_array_allocation_size(0), 24);
        assert_eq!(byte_array_allocation_size(1), 32);
        assert_eq!(byte_array_allocation_size(8), 32);
        assert_eq!(activation_allocation_size(4), 48);
        assert_eq!(activation_allocation_size(6), 48 + 2 * 8);
    }

    #[test]
    fn byte_array_payload_round_trip() {
        let bytes = b"hello, world";
        let mut buf = vec![0u64; byte_array_allocation_size(bytes.len() as u64) / 8 + 1];
        let ptr = buf.as_mut_ptr() as *mut ByteArray;
        unsafe {
            init_byte_array(ptr, 0, Value::integer(0), bytes);
            let ba = &*ptr;
            assert_eq!(ba.len(), bytes.len() as u64);
            assert_eq!(ba.bytes(), bytes);
        }
    }

    #[test]
    fn empty_byte_array_has_zero_length() {
        let mut buf = vec![0u64; byte_array_allocation_size(0) / 8 + 1];
        let ptr = buf.as_mut_ptr() as *mut ByteArray;
        unsafe {
            init_byte_array(ptr, 0, Value::integer(0), &[]);
            assert_eq!((*ptr).len(), 0);
            assert!((*ptr).is_empty());
        }
    }

    #[test]
    fn object_ref_dispatch_checks_marker() {
        let mut buf = vec![0u64; array_allocation_size(0) / 8 + 1];
        let ptr = buf.as_mut_ptr() as *mut Array;
        unsafe {
            init_array(ptr, 0, Value::integer(0), 0);
            match ObjectRef::from_address(ptr as *mut u8) {
                ObjectRef::Array(arr) => assert_eq!(arr.as_ref().len(), 0),
                _ => panic!("expected Array dispatch"),
            }
        }
    }

    #[test]
    #[should_panic(expected = "object header")]
    fn object_ref_rejects_non_marker() {
        let mut word: u64 = 0; // an Integer, not a marker
        unsafe {
            let _ = ObjectRef::from_address(&mut word as *mut u64 as *mut u8);
        }
    }

    #[test]
    fn finalization_is_managed_only() {
        assert!(can_finalize(ObjectType::Managed));
        assert!(!can_finalize(ObjectType::Slots));
        assert!(!can_finalize(ObjectType::ByteArray));
        assert!(!can_finalize(ObjectType::Actor));
    }
}

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn integer_values_round_trip(n in -(1i64 << 61)..(1i64 << 61)) {
            let v = Value::integer(n);
            prop_assert!(v.is_integer());
            prop_assert_eq!(unsafe { v.as_integer() }, n);
        }

        #[test]
        fn selector_hashes_are_deterministic(name in "[a-zA-Z][a-zA-Z0-9]{0,12}:?") {
            prop_assert_eq!(SelectorHash::of(&name), SelectorHash::of(&name));
        }

        #[test]
        fn float_truncation_loses_at_most_two_mantissa_bits(bits in any::<u64>()) {
            let f = f64::from_bits(bits & !0b11);
            let v = Value::float(f);
            prop_assert!(v.is_float());
            prop_assert_eq!(unsafe { v.as_float() }.to_bits(), f.to_bits());
        }
    }
}
