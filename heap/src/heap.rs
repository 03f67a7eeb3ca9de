//! Generational semispace copying collector.
//!
//! Two generations, each a pair of mmap'd semispaces. New objects bump-
//! allocate into the young generation through [`AllocationToken`]s; a
//! scavenge copies survivors into to-space, promotes objects that have
//! lived through enough collections into the old generation, and leaves
//! forwarding tombstones behind. Collecting the old generation evacuates
//! both generations.
//!
//! This crate is decoupled from any specific VM. Consumers provide:
//! - A [`TraceFn`] to enumerate the Value edges of heap objects.
//! - A [`SizeFn`] for exact object sizes.
//! - A [`FinalizeFn`] invoked on dead finalizable objects.
//! - A [`RootProvider`] to supply live roots at collection time.

use std::cell::{Cell, RefCell};
use std::ptr::{self, NonNull};

use thiserror::Error;
use tracing::{debug, trace};

use object::{Header, ObjectType, Value};

use crate::system::{self, OS_PAGE_SIZE};

// ── Public API types ──────────────────────────────────────────────────

/// Function that traces all Value edges of a heap object, the map word
/// included.
///
/// Given a pointer to a heap object (whose first word is an object-marker
/// header), the function must call `visitor` for every [`Value`] field
/// that may be a heap reference. The visitor may mutate the Value in
/// place as objects relocate.
///
/// # Safety
///
/// `obj` must point to a valid, live heap object with a valid [`Header`].
pub type TraceFn = unsafe fn(obj: *const u8, visitor: &mut dyn FnMut(&mut Value));

/// Function that returns the total byte size of a heap object.
///
/// Must return the exact number of bytes allocated for the object starting
/// at `obj`, including the header. Called before the forwarding tombstone
/// is written; implementations must chase already-forwarded map references.
///
/// # Safety
///
/// `obj` must point to a valid heap object with a valid [`Header`].
pub type SizeFn = unsafe fn(obj: *const u8) -> usize;

/// Function invoked on an object that died in a collection and was
/// registered as finalizable. Runs after the copy phase, in arbitrary
/// order; must not allocate.
///
/// # Safety
///
/// `obj` points at the dead object's from-space remains, which stay
/// readable until the next collection of that generation.
pub type FinalizeFn = unsafe fn(obj: *const u8);

/// Consumers implement this to provide collection roots.
///
/// Called at collection time to discover live roots from VM state. The
/// visitor receives `&mut Value` so root pointers are rewritten in place
/// during relocation.
pub trait RootProvider {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value));
}

/// The two generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Young,
    Old,
}

#[derive(Debug, Error)]
pub enum HeapError {
    #[error("out of memory: {requested} bytes requested from the {generation:?} generation")]
    OutOfMemory {
        generation: Generation,
        requested: usize,
    },
}

#[inline(always)]
const fn align8(size: usize) -> usize {
    (size + 7) & !7
}

// ── Settings ──────────────────────────────────────────────────────────

/// Heap sizing configuration.
#[derive(Debug, Clone)]
pub struct HeapSettings {
    /// Byte size of each young semispace. Must be a page multiple.
    pub young_size: usize,
    /// Byte size of each old semispace. Must be a page multiple.
    pub old_size: usize,
    /// Number of collections an object survives before promotion.
    pub promotion_age: u8,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            young_size: 4 * 1024 * 1024,
            old_size: 64 * 1024 * 1024,
            promotion_age: 3,
        }
    }
}

impl HeapSettings {
    fn validate(&self) -> Result<(), &'static str> {
        if self.young_size == 0 || self.old_size == 0 {
            return Err("generation sizes must be > 0");
        }
        if self.young_size % OS_PAGE_SIZE != 0 || self.old_size % OS_PAGE_SIZE != 0 {
            return Err("generation sizes must be page multiples");
        }
        if self.promotion_age == 0 {
            return Err("promotion_age must be > 0");
        }
        Ok(())
    }
}

// ── Semispaces ────────────────────────────────────────────────────────

#[derive(Debug)]
struct Semispace {
    start: NonNull<u8>,
    size: usize,
}

impl Semispace {
    fn map(size: usize) -> Self {
        let start = system::map_memory(size).expect("map semispace memory");
        Self { start, size }
    }

    #[inline(always)]
    fn contains(&self, addr: u64) -> bool {
        let base = self.start.as_ptr() as u64;
        addr >= base && addr < base + self.size as u64
    }

    #[inline(always)]
    fn at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.size);
        unsafe { self.start.as_ptr().add(offset) }
    }
}

/// One generation: a live semispace, a scratch semispace, and the bump
/// cursor plus reservation accounting for the live one.
#[derive(Debug)]
struct Space {
    a: Semispace,
    b: Semispace,
    live_is_a: Cell<bool>,
    bump: Cell<usize>,
    /// Bytes promised to outstanding allocation tokens.
    reserved: Cell<usize>,
    tokens: Cell<u32>,
    collections: Cell<u64>,
}

impl Space {
    fn new(size: usize) -> Self {
        Self {
            a: Semispace::map(size),
            b: Semispace::map(size),
            live_is_a: Cell::new(true),
            bump: Cell::new(0),
            reserved: Cell::new(0),
            tokens: Cell::new(0),
            collections: Cell::new(0),
        }
    }

    #[inline(always)]
    fn live(&self) -> &Semispace {
        if self.live_is_a.get() {
            &self.a
        } else {
            &self.b
        }
    }

    #[inline(always)]
    fn scratch(&self) -> &Semispace {
        if self.live_is_a.get() {
            &self.b
        } else {
            &self.a
        }
    }

    #[inline(always)]
    fn free(&self) -> usize {
        self.live().size - self.bump.get()
    }

    /// Free bytes not promised to an outstanding token.
    #[inline(always)]
    fn available(&self) -> usize {
        self.free() - self.reserved.get()
    }

    /// Bump-allocate without touching the reservation account. The caller
    /// has verified capacity.
    #[inline]
    fn allocate_raw(&self, size: usize) -> *mut u8 {
        debug_assert!(size % 8 == 0);
        debug_assert!(size <= self.free());
        let offset = self.bump.get();
        self.bump.set(offset + size);
        self.live().at(offset)
    }

    /// Bump-allocate if unreserved capacity remains.
    #[inline]
    fn try_allocate(&self, size: usize) -> Option<*mut u8> {
        if self.available() < size {
            return None;
        }
        Some(self.allocate_raw(size))
    }

    fn flip(&self, new_bump: usize) {
        self.live_is_a.set(!self.live_is_a.get());
        self.bump.set(new_bump);
        self.collections.set(self.collections.get() + 1);
    }
}

// ── Tracked roots ─────────────────────────────────────────────────────

/// A registered root. The evaluator tracks any live Value it holds across
/// a potential allocation, because allocation may collect and invalidate
/// raw addresses. Release is explicit; a leaked handle is a leaked root.
#[derive(Debug)]
pub struct Tracked {
    index: u32,
}

#[derive(Default)]
struct TrackedTable {
    slots: Vec<Value>,
    free: Vec<u32>,
}

impl TrackedTable {
    fn insert(&mut self, value: Value) -> Tracked {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = value;
                index
            }
            None => {
                self.slots.push(value);
                (self.slots.len() - 1) as u32
            }
        };
        Tracked { index }
    }

    fn remove(&mut self, tracked: Tracked) {
        self.slots[tracked.index as usize] = Value::integer(0);
        self.free.push(tracked.index);
    }
}

// ── Heap ──────────────────────────────────────────────────────────────

pub struct Heap {
    settings: HeapSettings,
    young: Space,
    old: Space,
    tracked: RefCell<TrackedTable>,
    /// Old-generation objects that may hold young references.
    remembered: RefCell<Vec<Value>>,
    /// Registered finalizable objects (Managed).
    finalizable: RefCell<Vec<Value>>,
    trace_fn: TraceFn,
    size_fn: SizeFn,
    finalize_fn: FinalizeFn,
}

impl Heap {
    #[must_use]
    pub fn new(
        settings: HeapSettings,
        trace_fn: TraceFn,
        size_fn: SizeFn,
        finalize_fn: FinalizeFn,
    ) -> Self {
        settings.validate().expect("invalid heap settings");
        Self {
            young: Space::new(settings.young_size),
            old: Space::new(settings.old_size),
            settings,
            tracked: RefCell::new(TrackedTable::default()),
            remembered: RefCell::new(Vec::new()),
            finalizable: RefCell::new(Vec::new()),
            trace_fn,
            size_fn,
            finalize_fn,
        }
    }

    #[inline(always)]
    fn space(&self, generation: Generation) -> &Space {
        match generation {
            Generation::Young => &self.young,
            Generation::Old => &self.old,
        }
    }

    /// Which generation a reference currently lives in, if any.
    pub fn generation_of(&self, value: Value) -> Option<Generation> {
        if !value.is_reference() {
            return None;
        }
        let addr = value.address();
        if self.young.live().contains(addr) {
            Some(Generation::Young)
        } else if self.old.live().contains(addr) {
            Some(Generation::Old)
        } else {
            None
        }
    }

    /// Collections run so far on a generation.
    pub fn collection_count(&self, generation: Generation) -> u64 {
        self.space(generation).collections.get()
    }

    // ── reservation ───────────────────────────────────────────────

    /// Reserve `bytes` from `generation`, collecting at most once under
    /// pressure. While the returned token is alive, no collection runs on
    /// that generation.
    pub fn reserve(
        &self,
        generation: Generation,
        bytes: usize,
        roots: &mut dyn RootProvider,
    ) -> Result<AllocationToken<'_>, HeapError> {
        let bytes = align8(bytes);
        let space = self.space(generation);

        if space.available() < bytes {
            if space.tokens.get() == 0 {
                self.collect(generation, roots);
            }
            if space.available() < bytes {
                return Err(HeapError::OutOfMemory {
                    generation,
                    requested: bytes,
                });
            }
        }

        space.reserved.set(space.reserved.get() + bytes);
        space.tokens.set(space.tokens.get() + 1);
        trace!(?generation, bytes, "reserved allocation budget");

        Ok(AllocationToken {
            heap: self,
            generation,
            remaining: bytes,
        })
    }

    // ── roots ─────────────────────────────────────────────────────

    pub fn track(&self, value: Value) -> Tracked {
        self.tracked.borrow_mut().insert(value)
    }

    pub fn get(&self, tracked: &Tracked) -> Value {
        self.tracked.borrow().slots[tracked.index as usize]
    }

    pub fn set(&self, tracked: &Tracked, value: Value) {
        self.tracked.borrow_mut().slots[tracked.index as usize] = value;
    }

    pub fn release(&self, tracked: Tracked) {
        self.tracked.borrow_mut().remove(tracked);
    }

    // ── write barrier ─────────────────────────────────────────────

    /// Record a store of `stored` into `holder`. An old-generation holder
    /// keeping a young reference joins the remembered set so the next
    /// scavenge traces it.
    pub fn record_store(&self, holder: Value, stored: Value) {
        if !holder.is_reference() || !stored.is_reference() {
            return;
        }
        if !self.old.live().contains(holder.address())
            || !self.young.live().contains(stored.address())
        {
            return;
        }
        // SAFETY: holder was just verified to live in the old generation.
        let header = unsafe { &mut *(holder.address() as *mut Header) };
        if header.remembered() {
            return;
        }
        header.set_remembered(true);
        self.remembered.borrow_mut().push(holder);
    }

    // ── finalization ──────────────────────────────────────────────

    /// Enroll a finalizable object. Its finalizer runs after the first
    /// collection that fails to trace it.
    pub fn register_finalizable(&self, value: Value) {
        debug_assert!(value.is_reference());
        self.finalizable.borrow_mut().push(value);
    }

    // ── collection ────────────────────────────────────────────────

    /// Forced collection; normally driven by reservation pressure.
    /// Collecting [`Generation::Old`] evacuates both generations.
    pub fn collect(&self, generation: Generation, roots: &mut dyn RootProvider) {
        let full = generation == Generation::Old;
        debug_assert!(
            self.space(generation).tokens.get() == 0
                && (!full || self.young.tokens.get() == 0),
            "collection requested while an allocation token is alive"
        );
        if self.space(generation).tokens.get() != 0
            || (full && self.young.tokens.get() != 0)
        {
            return;
        }

        let live_before = self.young.bump.get()
            + if full { self.old.bump.get() } else { 0 };

        let mut collector = Collector {
            heap: self,
            full,
            young_to: BumpRegion::new(self.young.scratch()),
            old_to: if full {
                Some(BumpRegion::new(self.old.scratch()))
            } else {
                None
            },
            worklist: Vec::with_capacity(64),
            new_remembered: Vec::new(),
            copied_bytes: 0,
            promoted_bytes: 0,
        };

        // Previously remembered old objects are re-traced as roots during
        // a scavenge; a full collection rediscovers the set from scratch.
        let previous_remembered = std::mem::take(&mut *self.remembered.borrow_mut());
        if !full {
            for holder in &previous_remembered {
                // SAFETY: remembered entries are live old-generation objects.
                unsafe {
                    let header = &mut *(holder.address() as *mut Header);
                    header.set_remembered(false);
                    (self.trace_fn)(holder.address() as *const u8, &mut |value| {
                        collector.visit(value)
                    });
                }
            }
        }

        // Tracked handles.
        {
            let mut tracked = self.tracked.borrow_mut();
            for slot in tracked.slots.iter_mut() {
                collector.visit(slot);
            }
        }

        // VM roots.
        roots.visit_roots(&mut |value| collector.visit(value));

        // Transitive closure.
        collector.drain();

        // Remembered-set upkeep for the holders that were re-traced above.
        if !full {
            for holder in previous_remembered {
                collector.note_old_to_young(holder.address() as *mut u8);
            }
        }

        // Finalizables: survivors are re-pointed, the dead get finalized.
        self.run_finalizers(full);

        let copied = collector.copied_bytes;
        let promoted = collector.promoted_bytes;
        let young_bump = collector.young_to.cursor;
        let old_bump = collector.old_to.as_ref().map(|region| region.cursor);
        let mut new_remembered = std::mem::take(&mut collector.new_remembered);
        drop(collector);

        self.remembered.borrow_mut().append(&mut new_remembered);

        self.young.flip(young_bump);
        if let Some(old_bump) = old_bump {
            self.old.flip(old_bump);
        }

        debug!(
            ?generation,
            live_before,
            copied,
            promoted,
            "collection finished"
        );
    }

    fn run_finalizers(&self, full: bool) {
        let finalize = self.finalize_fn;
        let mut finalizable = self.finalizable.borrow_mut();
        finalizable.retain_mut(|entry| {
            let addr = entry.address() as *const u8;
            // SAFETY: from-space remains readable until its next reuse.
            let header = unsafe { &*(addr as *const Header) };
            if header.is_forwarded() {
                *entry = header.forward_address();
                return true;
            }
            if !full && self.old.live().contains(entry.address()) {
                // Old generation was not collected; still live.
                return true;
            }
            // SAFETY: the object is dead; its payload is still intact.
            unsafe { finalize(addr) };
            false
        });
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        for space in [&self.young, &self.old] {
            system::unmap_memory(space.a.start, space.a.size);
            system::unmap_memory(space.b.start, space.b.size);
        }
    }
}

// ── Allocation token ──────────────────────────────────────────────────

/// A scoped reservation of heap bytes.
///
/// The token exclusively holds a byte budget carved out of one
/// generation's free space, so multi-object allocation sequences cannot
/// trigger a collection mid-way. Dropping the token returns the unused
/// budget; leaking one inhibits collection on its generation
/// indefinitely.
pub struct AllocationToken<'h> {
    heap: &'h Heap,
    generation: Generation,
    remaining: usize,
}

impl std::fmt::Debug for AllocationToken<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationToken")
            .field("generation", &self.generation)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl AllocationToken<'_> {
    #[inline(always)]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Carve `bytes` (8-byte aligned) out of the reserved budget.
    ///
    /// Spending more than was reserved is a programmer error and is
    /// caught in debug builds.
    pub fn allocate(&mut self, kind: ObjectType, bytes: usize) -> NonNull<u8> {
        let bytes = align8(bytes);
        debug_assert!(
            bytes <= self.remaining,
            "allocation token over-spend: {bytes} > {} for {kind:?}",
            self.remaining
        );
        let space = self.heap.space(self.generation);
        space.reserved.set(space.reserved.get() - bytes);
        self.remaining -= bytes;
        let ptr = space.allocate_raw(bytes);
        trace!(?kind, bytes, "allocated");
        // SAFETY: semispace addresses are never null.
        unsafe { NonNull::new_unchecked(ptr) }
    }
}

impl Drop for AllocationToken<'_> {
    fn drop(&mut self) {
        let space = self.heap.space(self.generation);
        space.reserved.set(space.reserved.get() - self.remaining);
        space.tokens.set(space.tokens.get() - 1);
    }
}

// ── Collector ─────────────────────────────────────────────────────────

/// Bump window over a to-space region.
struct BumpRegion {
    base: *mut u8,
    cursor: usize,
    limit: usize,
}

impl BumpRegion {
    fn new(space: &Semispace) -> Self {
        Self {
            base: space.start.as_ptr(),
            cursor: 0,
            limit: space.size,
        }
    }

    fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        if self.cursor + size > self.limit {
            return None;
        }
        let ptr = unsafe { self.base.add(self.cursor) };
        self.cursor += size;
        Some(ptr)
    }

    #[inline(always)]
    fn contains(&self, addr: u64) -> bool {
        let base = self.base as u64;
        addr >= base && addr < base + self.cursor as u64
    }
}

struct Collector<'h> {
    heap: &'h Heap,
    full: bool,
    young_to: BumpRegion,
    old_to: Option<BumpRegion>,
    worklist: Vec<*mut u8>,
    new_remembered: Vec<Value>,
    copied_bytes: usize,
    promoted_bytes: usize,
}

impl Collector<'_> {
    /// Evacuate the object behind one Value edge, rewriting the edge.
    ///
    /// Forwarded headers are chased instead of copied, which is what makes
    /// the copy phase re-entrant across partial traversals: maps reference
    /// other maps that may already have moved.
    fn visit(&mut self, value: &mut Value) {
        if !value.is_reference() {
            return;
        }
        let ptr = value.address() as *mut u8;
        // SAFETY: reachable references point at live (or tombstoned)
        // object headers.
        let header = unsafe { &mut *(ptr as *mut Header) };

        if header.is_forwarded() {
            *value = header.forward_address();
            return;
        }

        let in_old = self.heap.old.live().contains(value.address());
        if !self.full && in_old {
            // A scavenge leaves the old generation in place.
            return;
        }
        debug_assert!(
            in_old || self.heap.young.live().contains(value.address()),
            "reference outside the heap"
        );

        let size = align8(unsafe { (self.heap.size_fn)(ptr) });
        let age = header.age().saturating_add(1);
        let promote = !in_old && age >= self.heap.settings.promotion_age;

        let new_ptr = if in_old {
            self.old_to
                .as_mut()
                .expect("old object during scavenge")
                .allocate(size)
                .expect("old to-space overflow")
        } else if promote {
            self.promotion_target(size)
        } else {
            self.young_to
                .allocate(size)
                .expect("young to-space overflow")
        };

        // SAFETY: source and destination are valid, non-overlapping
        // regions of at least `size` bytes.
        unsafe {
            ptr::copy_nonoverlapping(ptr, new_ptr, size);
            let new_header = &mut *(new_ptr as *mut Header);
            new_header.set_age(age);
            new_header.set_remembered(false);
        }

        let target = Value::reference(new_ptr);
        let forwarded = header.forward_to(target);
        debug_assert!(forwarded, "object forwarded twice");

        *value = target;
        self.worklist.push(new_ptr);
        self.copied_bytes += size;
        if promote {
            self.promoted_bytes += size;
        }
    }

    /// Where a promoted young object lands. Falls back to the young
    /// to-space when the old generation has no unreserved room.
    fn promotion_target(&mut self, size: usize) -> *mut u8 {
        if self.full {
            if let Some(ptr) = self.old_to.as_mut().and_then(|region| region.allocate(size)) {
                return ptr;
            }
        } else if let Some(ptr) = self.heap.old.try_allocate(size) {
            return ptr;
        }
        self.young_to
            .allocate(size)
            .expect("young to-space overflow")
    }

    fn drain(&mut self) {
        let trace_fn = self.heap.trace_fn;
        while let Some(obj) = self.worklist.pop() {
            // SAFETY: worklist entries are freshly copied, valid objects.
            unsafe {
                trace_fn(obj, &mut |value| self.visit(value));
            }
            self.note_old_to_young(obj);
        }
    }

    /// Re-establish the remembered-set invariant for an object that now
    /// lives in the old generation: if any field points into the young
    /// survivors, the object must be remembered.
    fn note_old_to_young(&mut self, obj: *mut u8) {
        let addr = obj as u64;
        let in_old_dest = if self.full {
            self.old_to
                .as_ref()
                .map(|region| region.contains(addr))
                .unwrap_or(false)
        } else {
            self.heap.old.live().contains(addr)
        };
        if !in_old_dest {
            return;
        }

        let young_base = self.young_to.base as u64;
        let young_limit = young_base + self.young_to.cursor as u64;
        let mut has_young = false;
        let trace_fn = self.heap.trace_fn;
        // SAFETY: `obj` is a live old-generation object; the closure only
        // reads the edges.
        unsafe {
            trace_fn(obj, &mut |value| {
                if value.is_reference()
                    && value.address() >= young_base
                    && value.address() < young_limit
                {
                    has_young = true;
                }
            });
        }

        // SAFETY: valid header of a live object.
        let header = unsafe { &mut *(obj as *mut Header) };
        if has_young && !header.remembered() {
            header.set_remembered(true);
            self.new_remembered.push(Value::reference(obj));
        }
    }
}
