use crate::header::{chase, Header, ObjectType};
use crate::objects::ByteArray;
use crate::slot::{Slot, SlotFlags};
use crate::Value;

/// A map (shape descriptor) shared by every object with the same layout.
///
/// Layout in memory:
/// ```text
/// [Header 16B] [slot_count: u32] [value_count: u32]
/// [Slot_0 24B] [Slot_1 24B] ... [Slot_N-1 24B]
/// ```
///
/// The inline slot table immediately follows the fixed fields. The header's
/// map word points to the map-of-maps, which is self-referential at the
/// root. `value_count` is the number of inline value words an object using
/// this map carries after its own fixed fields.
///
/// Maps are not interned: two objects with structurally equal slot sets may
/// hold distinct Map instances.
#[repr(C)]
pub struct Map {
    pub header: Header,
    slot_count: u32,
    value_count: u32,
}

const _: () = assert!(size_of::<Map>() == 24);

impl Map {
    #[inline(always)]
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    #[inline(always)]
    pub fn value_count(&self) -> u32 {
        self.value_count
    }

    /// Byte size of the entire map including the inline slot table.
    #[inline(always)]
    pub fn byte_size(&self) -> usize {
        map_allocation_size(self.slot_count)
    }

    #[inline(always)]
    fn slots_ptr(&self) -> *const Slot {
        unsafe { (self as *const Map).add(1) as *const Slot }
    }

    /// Access the inline slot table.
    ///
    /// # Safety
    ///
    /// The memory after this `Map` must contain `slot_count` valid [`Slot`]
    /// entries.
    #[inline(always)]
    pub unsafe fn slots(&self) -> &[Slot] {
        core::slice::from_raw_parts(self.slots_ptr(), self.slot_count as usize)
    }

    /// Access a single inline slot by index.
    ///
    /// # Safety
    ///
    /// `index` must be `< slot_count` and the inline memory must be valid.
    #[inline(always)]
    pub unsafe fn slot(&self, index: u32) -> &Slot {
        debug_assert!(index < self.slot_count);
        &*self.slots_ptr().add(index as usize)
    }

    /// Find the slot whose name hashes to `hash`, re-checking the name
    /// bytes on a hash hit.
    ///
    /// # Safety
    ///
    /// The inline slot table must be valid and every slot name must be a
    /// live value.
    pub unsafe fn find_slot(&self, hash: u32, name: &[u8]) -> Option<(u32, &Slot)> {
        for (i, slot) in self.slots().iter().enumerate() {
            if slot.hash() == hash && slot_name_matches(slot.name, name) {
                return Some((i as u32, slot));
            }
        }
        None
    }

    /// Find the mutable slot an assignment selector targets.
    ///
    /// Data and parent slots qualify (re-parenting an object is an
    /// ordinary assignment); argument slots do not.
    ///
    /// # Safety
    ///
    /// Same requirements as [`find_slot`](Self::find_slot).
    pub unsafe fn find_assignment_target(
        &self,
        hash: u32,
        name: &[u8],
    ) -> Option<(u32, &Slot)> {
        for (i, slot) in self.slots().iter().enumerate() {
            if slot.is_assignable()
                && !slot.is_argument()
                && slot.hash() == hash
                && slot_name_matches(slot.name, name)
            {
                return Some((i as u32, slot));
            }
        }
        None
    }

    /// Whether the slot at `index` is a mutable data slot.
    ///
    /// # Safety
    ///
    /// `index < slot_count` and the inline memory must be valid.
    #[inline]
    pub unsafe fn is_assignable(&self, index: u32) -> bool {
        let slot = self.slot(index);
        slot.is_assignable() && !slot.is_constant()
    }

    /// Parent slots in declaration order, which fixes the lookup order.
    ///
    /// # Safety
    ///
    /// The inline slot table must be valid.
    pub unsafe fn parents(&self) -> impl Iterator<Item = (u32, &Slot)> {
        self.slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_parent())
            .map(|(i, slot)| (i as u32, slot))
    }
}

impl core::fmt::Debug for Map {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Map")
            .field("header", &self.header)
            .field("slot_count", &self.slot_count)
            .field("value_count", &self.value_count)
            .finish()
    }
}

/// Compare a slot's stored name against canonical name bytes.
///
/// Slots with no name reference (synthesized slots) match on hash alone.
///
/// # Safety
///
/// `slot_name`, if a reference, must point at a live object header.
pub unsafe fn slot_name_matches(slot_name: Value, name: &[u8]) -> bool {
    if !slot_name.is_reference() {
        return true;
    }
    let slot_name = chase(slot_name);
    let header: &Header = slot_name.as_ref();
    if header.object_type() != ObjectType::ByteArray {
        return true;
    }
    let bytes: &ByteArray = slot_name.as_ref();
    bytes.bytes() == name
}

/// Compute the total allocation size for a [`Map`] with `slot_count` inline
/// slots.
pub const fn map_allocation_size(slot_count: u32) -> usize {
    size_of::<Map>() + slot_count as usize * size_of::<Slot>()
}

/// Initialize a map at a raw allocation.
///
/// # Safety
///
/// `ptr` must point to at least `map_allocation_size(slots.len())` bytes of
/// writable memory; `map_map` must stay valid for the map's lifetime.
pub unsafe fn init_map(
    ptr: *mut Map,
    map_map: Value,
    actor_id: u32,
    slots: &[Slot],
    value_count: u32,
) {
    ptr.write(Map {
        header: Header::new(ObjectType::Map, actor_id, map_map),
        slot_count: slots.len() as u32,
        value_count,
    });
    if !slots.is_empty() {
        let dst = ptr.add(1) as *mut Slot;
        core::ptr::copy_nonoverlapping(slots.as_ptr(), dst, slots.len());
    }
}

/// Count the inline value words a slot list demands of its host objects.
pub fn required_value_count(slots: &[Slot]) -> u32 {
    slots
        .iter()
        .filter(|slot| slot.is_assignable())
        .map(|slot| slot.value_index() + 1)
        .max()
        .unwrap_or(0)
}

/// `true` when `flags` describes a mutable data slot (spec kind
/// Data-mutable), as opposed to constants, parents, and arguments.
pub const fn is_data_mutable(flags: SlotFlags) -> bool {
    flags.contains(SlotFlags::ASSIGNABLE)
        && !flags.contains(SlotFlags::PARENT)
        && !flags.contains(SlotFlags::ARGUMENT)
}
