use crate::Value;

/// Property flags for a slot within a [`Map`](crate::Map).
///
/// Stored in the low 16 bits of the slot's `meta` field. The slot kinds of
/// the object model map onto flag combinations:
///
/// | kind            | flags                  |
/// |-----------------|------------------------|
/// | Data-mutable    | `ASSIGNABLE`           |
/// | Data-constant   | `CONSTANT`             |
/// | Parent-mutable  | `PARENT \| ASSIGNABLE` |
/// | Parent-constant | `PARENT \| CONSTANT`   |
/// | Argument        | `ARGUMENT \| ASSIGNABLE` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SlotFlags(pub u16);

impl SlotFlags {
    pub const NONE: Self = Self(0);

    /// Mutable slot. `value` stores the word index of the data within the
    /// owning object's inline value area.
    pub const ASSIGNABLE: Self = Self(1 << 0);

    /// Parent link — the lookup algorithm traverses it.
    pub const PARENT: Self = Self(1 << 1);

    /// Method/block argument. Always assignable.
    pub const ARGUMENT: Self = Self(1 << 2);

    /// Constant slot. `value` stores the actual value directly in the map.
    pub const CONSTANT: Self = Self(1 << 3);

    #[inline(always)]
    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    #[inline(always)]
    pub const fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }

    #[inline(always)]
    pub const fn without(self, flag: Self) -> Self {
        Self(self.0 & !flag.0)
    }
}

/// A slot descriptor embedded inline in a [`Map`](crate::Map).
///
/// - `meta`:  low 16 bits are [`SlotFlags`]; bits 16..48 are the selector
///   hash of the slot's name; upper 16 bits reserved.
/// - `name`:  tagged reference to the ByteArray holding the canonical name.
/// - `value`: depends on slot kind:
///   - **Constant**: the actual tagged value.
///   - **Assignable / Argument**: word index (as tagged integer) into the
///     owning object's inline value area.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Slot {
    pub meta: u64,
    pub name: Value,
    pub value: Value,
}

const _: () = assert!(size_of::<Slot>() == 24);

const HASH_SHIFT: u32 = 16;

impl Slot {
    #[inline(always)]
    pub fn new(flags: SlotFlags, hash: u32, name: Value, value: Value) -> Self {
        Self {
            meta: flags.0 as u64 | ((hash as u64) << HASH_SHIFT),
            name,
            value,
        }
    }

    #[inline(always)]
    pub fn flags(&self) -> SlotFlags {
        SlotFlags(self.meta as u16)
    }

    /// The selector hash of this slot's name.
    #[inline(always)]
    pub fn hash(&self) -> u32 {
        (self.meta >> HASH_SHIFT) as u32
    }

    #[inline(always)]
    pub fn is_parent(&self) -> bool {
        self.flags().contains(SlotFlags::PARENT)
    }

    #[inline(always)]
    pub fn is_assignable(&self) -> bool {
        self.flags().contains(SlotFlags::ASSIGNABLE)
    }

    #[inline(always)]
    pub fn is_argument(&self) -> bool {
        self.flags().contains(SlotFlags::ARGUMENT)
    }

    #[inline(always)]
    pub fn is_constant(&self) -> bool {
        self.flags().contains(SlotFlags::CONSTANT)
    }

    /// Word index into the owning object's inline value area.
    ///
    /// Only meaningful for assignable slots.
    #[inline(always)]
    pub fn value_index(&self) -> u32 {
        debug_assert!(self.is_assignable());
        // SAFETY: assignable slots always store the index as a tagged integer.
        unsafe { self.value.as_integer() as u32 }
    }
}

impl core::fmt::Debug for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("flags", &self.flags())
            .field("hash", &self.hash())
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}
