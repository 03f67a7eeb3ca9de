mod heap;
mod system;

pub use heap::{
    AllocationToken, FinalizeFn, Generation, Heap, HeapError, HeapSettings, RootProvider, SizeFn,
    TraceFn, Tracked,
};
pub use system::{map_memory, unmap_memory, OS_PAGE_SIZE};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use object::{
        array_allocation_size, byte_array_allocation_size, init_byte_array,
        managed_allocation_size, Array, ByteArray, Header, Managed, ObjectType, Value,
    };

    /// Edge tracer for the object variants these tests allocate.
    unsafe fn test_trace(obj: *const u8, visitor: &mut dyn FnMut(&mut Value)) {
        let header = &mut *(obj as *mut Header);
        match header.object_type() {
            ObjectType::Array => {
                visitor(&mut header.map);
                let array = &mut *(obj as *mut Array);
                for element in array.elements_mut() {
                    visitor(element);
                }
            }
            ObjectType::ByteArray => {
                visitor(&mut header.map);
            }
            ObjectType::Managed => {
                visitor(&mut header.map);
                let managed = &mut *(obj as *mut Managed);
                visitor(&mut managed.resource);
                visitor(&mut managed.finalizer);
            }
            other => unreachable!("unexpected object type {other:?} in test heap"),
        }
    }

    unsafe fn test_size(obj: *const u8) -> usize {
        let header = &*(obj as *const Header);
        match header.object_type() {
            ObjectType::Array => array_allocation_size((*(obj as *const Array)).len()),
            ObjectType::ByteArray => {
                byte_array_allocation_size((*(obj as *const ByteArray)).len())
            }
            ObjectType::Managed => managed_allocation_size(),
            other => unreachable!("unexpected object type {other:?} in test heap"),
        }
    }

    static FINALIZED: AtomicUsize = AtomicUsize::new(0);

    unsafe fn test_finalize(_obj: *const u8) {
        FINALIZED.fetch_add(1, Ordering::SeqCst);
    }

    struct NoRoots;

    impl RootProvider for NoRoots {
        fn visit_roots(&mut self, _visitor: &mut dyn FnMut(&mut Value)) {}
    }

    fn small_heap(promotion_age: u8) -> Heap {
        let settings = HeapSettings {
            young_size: 16 * OS_PAGE_SIZE,
            old_size: 64 * OS_PAGE_SIZE,
            promotion_age,
        };
        Heap::new(settings, test_trace, test_size, test_finalize)
    }

    fn nil_map() -> Value {
        Value::integer(0)
    }

    fn alloc_byte_array(heap: &Heap, bytes: &[u8]) -> Value {
        let size = byte_array_allocation_size(bytes.len() as u64);
        let mut token = heap
            .reserve(Generation::Young, size, &mut NoRoots)
            .expect("reserve");
        let ptr = token.allocate(ObjectType::ByteArray, size).as_ptr() as *mut ByteArray;
        unsafe {
            init_byte_array(ptr, 0, nil_map(), bytes);
        }
        Value::reference(ptr)
    }

    fn alloc_array(heap: &Heap, elements: &[Value]) -> Value {
        let size = array_allocation_size(elements.len() as u64);
        let mut token = heap
            .reserve(Generation::Young, size, &mut NoRoots)
            .expect("reserve");
        let ptr = token.allocate(ObjectType::Array, size).as_ptr() as *mut Array;
        unsafe {
            object::init_array_with(ptr, 0, nil_map(), elements);
        }
        Value::reference(ptr)
    }

    // ── reservation / tokens ───────────────────────────────────────

    #[test]
    fn reserve_and_allocate() {
        let heap = small_heap(3);
        let value = alloc_byte_array(&heap, b"hello");
        assert!(value.is_reference());
        assert_eq!(heap.generation_of(value), Some(Generation::Young));
        unsafe {
            let ba: &ByteArray = value.as_ref();
            assert_eq!(ba.bytes(), b"hello");
        }
    }

    #[test]
    fn token_releases_unused_budget() {
        let heap = small_heap(3);
        let budget = 8 * OS_PAGE_SIZE;
        {
            let _token = heap
                .reserve(Generation::Young, budget, &mut NoRoots)
                .expect("reserve");
            // A second full-size reservation cannot be satisfied while the
            // first budget is outstanding, and the live token blocks the
            // collection that could make room.
            assert!(matches!(
                heap.reserve(Generation::Young, 10 * OS_PAGE_SIZE, &mut NoRoots),
                Err(HeapError::OutOfMemory { .. })
            ));
        }
        // Budget returned on drop.
        let token = heap
            .reserve(Generation::Young, budget, &mut NoRoots)
            .expect("reserve after release");
        drop(token);
    }

    #[test]
    fn token_spends_down_its_budget() {
        let heap = small_heap(3);
        let mut token = heap
            .reserve(Generation::Young, 64, &mut NoRoots)
            .expect("reserve");
        assert_eq!(token.remaining(), 64);
        token.allocate(ObjectType::ByteArray, 24);
        assert_eq!(token.remaining(), 40);
        token.allocate(ObjectType::ByteArray, 40);
        assert_eq!(token.remaining(), 0);
    }

    #[test]
    fn out_of_memory_after_one_collection() {
        let heap = small_heap(3);
        let err = heap
            .reserve(Generation::Young, 17 * OS_PAGE_SIZE, &mut NoRoots)
            .unwrap_err();
        assert!(matches!(
            err,
            HeapError::OutOfMemory {
                generation: Generation::Young,
                ..
            }
        ));
        // The failed reservation collected once.
        assert_eq!(heap.collection_count(Generation::Young), 1);
    }

    // ── collection ────────────────────────────────────────────────

    #[test]
    fn tracked_handles_survive_collection() {
        let heap = small_heap(100);
        let value = alloc_byte_array(&heap, b"survivor");
        let old_address = value.address();
        let tracked = heap.track(value);

        heap.collect(Generation::Young, &mut NoRoots);

        let moved = heap.get(&tracked);
        assert_ne!(moved.address(), old_address, "object should have moved");
        assert_eq!(heap.generation_of(moved), Some(Generation::Young));
        unsafe {
            let ba: &ByteArray = moved.as_ref();
            assert_eq!(ba.bytes(), b"survivor");
        }

        // The from-space copy is a forwarding tombstone.
        unsafe {
            let header = &*(old_address as *const Header);
            assert!(header.is_forwarded());
            assert_eq!(header.forward_address().raw(), moved.raw());
        }

        heap.release(tracked);
    }

    #[test]
    fn dead_objects_are_left_behind() {
        let heap = small_heap(100);
        let garbage = alloc_byte_array(&heap, b"garbage");
        let garbage_address = garbage.address();
        let live = alloc_byte_array(&heap, b"live");
        let tracked = heap.track(live);

        heap.collect(Generation::Young, &mut NoRoots);

        // The dead object was never forwarded.
        unsafe {
            let header = &*(garbage_address as *const Header);
            assert!(!header.is_forwarded());
        }
        unsafe {
            let ba: &ByteArray = heap.get(&tracked).as_ref();
            assert_eq!(ba.bytes(), b"live");
        }
        heap.release(tracked);
    }

    #[test]
    fn object_graphs_survive_with_cycles() {
        let heap = small_heap(100);
        let leaf = alloc_byte_array(&heap, b"leaf");
        let arr_a = alloc_array(&heap, &[leaf, Value::integer(1)]);
        let arr_b = alloc_array(&heap, &[arr_a, Value::integer(2)]);
        // Close a cycle: a[1] = b.
        unsafe {
            let a: &mut Array = arr_a.as_mut();
            a.set_element(1, arr_b);
        }
        let tracked = heap.track(arr_b);

        heap.collect(Generation::Young, &mut NoRoots);

        unsafe {
            let b_val = heap.get(&tracked);
            let b: &Array = b_val.as_ref();
            let a_val = b.element(0);
            let a: &Array = a_val.as_ref();
            // Cycle intact after address substitution.
            assert_eq!(a.element(1).raw(), b_val.raw());
            let leaf_val = a.element(0);
            let leaf: &ByteArray = leaf_val.as_ref();
            assert_eq!(leaf.bytes(), b"leaf");
        }
        heap.release(tracked);
    }

    #[test]
    fn survivors_promote_after_enough_collections() {
        let heap = small_heap(2);
        let value = alloc_byte_array(&heap, b"old-timer");
        let tracked = heap.track(value);

        heap.collect(Generation::Young, &mut NoRoots);
        assert_eq!(
            heap.generation_of(heap.get(&tracked)),
            Some(Generation::Young)
        );

        heap.collect(Generation::Young, &mut NoRoots);
        assert_eq!(heap.generation_of(heap.get(&tracked)), Some(Generation::Old));

        unsafe {
            let ba: &ByteArray = heap.get(&tracked).as_ref();
            assert_eq!(ba.bytes(), b"old-timer");
        }
        heap.release(tracked);
    }

    #[test]
    fn write_barrier_keeps_young_objects_alive() {
        let heap = small_heap(1);
        // Promote a holder into the old generation.
        let holder = alloc_array(&heap, &[Value::integer(0)]);
        let holder_tracked = heap.track(holder);
        heap.collect(Generation::Young, &mut NoRoots);
        let holder = heap.get(&holder_tracked);
        assert_eq!(heap.generation_of(holder), Some(Generation::Old));

        // Store a fresh young object into it, with the barrier.
        let young = alloc_byte_array(&heap, b"young");
        unsafe {
            let arr: &mut Array = holder.as_mut();
            arr.set_element(0, young);
        }
        heap.record_store(holder, young);

        // The young object has no root of its own; only the remembered
        // set keeps it alive.
        heap.collect(Generation::Young, &mut NoRoots);

        unsafe {
            let arr: &Array = heap.get(&holder_tracked).as_ref();
            let kept = arr.element(0);
            assert_eq!(heap.generation_of(kept), Some(Generation::Young));
            let ba: &ByteArray = kept.as_ref();
            assert_eq!(ba.bytes(), b"young");
        }
        heap.release(holder_tracked);
    }

    #[test]
    fn full_collection_evacuates_both_generations() {
        let heap = small_heap(1);
        let value = alloc_byte_array(&heap, b"veteran");
        let tracked = heap.track(value);
        heap.collect(Generation::Young, &mut NoRoots);
        assert_eq!(heap.generation_of(heap.get(&tracked)), Some(Generation::Old));
        let old_address = heap.get(&tracked).address();

        heap.collect(Generation::Old, &mut NoRoots);

        let moved = heap.get(&tracked);
        assert_ne!(moved.address(), old_address);
        assert_eq!(heap.generation_of(moved), Some(Generation::Old));
        unsafe {
            let ba: &ByteArray = moved.as_ref();
            assert_eq!(ba.bytes(), b"veteran");
        }
        heap.release(tracked);
    }

    #[test]
    fn dead_managed_objects_are_finalized() {
        let heap = small_heap(100);
        FINALIZED.store(0, Ordering::SeqCst);

        let size = managed_allocation_size();
        let mut token = heap
            .reserve(Generation::Young, size, &mut NoRoots)
            .expect("reserve");
        let ptr = token.allocate(ObjectType::Managed, size).as_ptr() as *mut Managed;
        unsafe {
            object::init_managed(ptr, 0, nil_map(), Value::integer(7), Value::integer(0));
        }
        drop(token);
        let value = Value::reference(ptr);
        heap.register_finalizable(value);

        // Rooted: survives, finalizer does not run.
        let tracked = heap.track(value);
        heap.collect(Generation::Young, &mut NoRoots);
        assert_eq!(FINALIZED.load(Ordering::SeqCst), 0);

        // Unrooted: dies, finalizer runs exactly once.
        heap.release(tracked);
        heap.collect(Generation::Young, &mut NoRoots);
        assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);

        heap.collect(Generation::Young, &mut NoRoots);
        assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn allocation_pressure_triggers_collection() {
        let heap = small_heap(100);
        let survivor = alloc_byte_array(&heap, b"still here");
        let tracked = heap.track(survivor);

        // Enough garbage to overflow the young space several times over.
        for _ in 0..2000 {
            let _ = alloc_byte_array(&heap, &[0xAB; 64]);
        }

        assert!(heap.collection_count(Generation::Young) > 0);
        unsafe {
            let ba: &ByteArray = heap.get(&tracked).as_ref();
            assert_eq!(ba.bytes(), b"still here");
        }
        heap.release(tracked);
    }
}
