use crate::Value;

/// Object variant tag stored in bits 2..8 of the object-information word.
///
/// The registry is closed: adding a variant means updating every dispatch
/// site (the compiler enforces this through exhaustive matches).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    Slots = 0,
    Method,
    Block,
    Activation,
    Array,
    ByteArray,
    Managed,
    Actor,
    ActorProxy,
    Map,
    AddrInfo,
    /// Tombstone left behind by the copying collector. The header's map
    /// word holds the forwarding address.
    ForwardedObject,
}

impl ObjectType {
    pub const COUNT: usize = Self::ForwardedObject as usize + 1;

    #[inline(always)]
    pub fn from_raw(raw: u8) -> Self {
        debug_assert!((raw as usize) < Self::COUNT, "unknown object type {raw}");
        // SAFETY: every discriminant below COUNT is a valid variant.
        unsafe { core::mem::transmute::<u8, ObjectType>(raw) }
    }
}

/// Whether an object may be referenced from another actor's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reachability {
    Local = 0,
    Global = 1,
}

/// Largest representable actor id (31 bits).
pub const MAX_ACTOR_ID: u32 = (1 << 31) - 1;

const MARKER_TAG: u64 = 0b11;

const TYPE_SHIFT: u32 = 2;
const TYPE_MASK: u64 = 0x3F;
const EXTRA_SHIFT: u32 = 8;
const EXTRA_MASK: u64 = 0xFF;
const ACTOR_SHIFT: u32 = 16;
const ACTOR_MASK: u64 = (1 << 31) - 1;
const REACHABILITY_SHIFT: u32 = 47;
const AGE_SHIFT: u32 = 48;
const AGE_MASK: u64 = 0xFF;
const REMEMBERED_SHIFT: u32 = 56;

/// The packed object-information word.
///
/// ```text
/// bits  0..2   marker (0b11)
/// bits  2..8   object type
/// bits  8..16  extra (per-variant scratch byte)
/// bits 16..47  actor id
/// bit  47      reachability (0 = Local, 1 = Global)
/// bits 48..56  collection age
/// bit  56      remembered (write-barrier bookkeeping)
/// bits 57..64  reserved (zero)
/// ```
///
/// Reading this word as a [`Value`] yields an ObjectMarker, which is how
/// the collector recognises object headers during scans.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ObjectInfo(u64);

impl ObjectInfo {
    #[inline(always)]
    pub fn new(object_type: ObjectType, actor_id: u32) -> Self {
        debug_assert!(actor_id <= MAX_ACTOR_ID);
        Self(
            MARKER_TAG
                | ((object_type as u64) << TYPE_SHIFT)
                | ((actor_id as u64) << ACTOR_SHIFT),
        )
    }

    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn object_type(self) -> ObjectType {
        ObjectType::from_raw(((self.0 >> TYPE_SHIFT) & TYPE_MASK) as u8)
    }

    #[inline(always)]
    fn with_object_type(self, object_type: ObjectType) -> Self {
        Self((self.0 & !(TYPE_MASK << TYPE_SHIFT)) | ((object_type as u64) << TYPE_SHIFT))
    }

    #[inline(always)]
    pub fn extra(self) -> u8 {
        ((self.0 >> EXTRA_SHIFT) & EXTRA_MASK) as u8
    }

    #[inline(always)]
    fn with_extra(self, extra: u8) -> Self {
        Self((self.0 & !(EXTRA_MASK << EXTRA_SHIFT)) | ((extra as u64) << EXTRA_SHIFT))
    }

    #[inline(always)]
    pub fn actor_id(self) -> u32 {
        ((self.0 >> ACTOR_SHIFT) & ACTOR_MASK) as u32
    }

    #[inline(always)]
    pub fn reachability(self) -> Reachability {
        if self.0 & (1 << REACHABILITY_SHIFT) != 0 {
            Reachability::Global
        } else {
            Reachability::Local
        }
    }

    #[inline(always)]
    fn with_reachability(self, reachability: Reachability) -> Self {
        match reachability {
            Reachability::Global => Self(self.0 | (1 << REACHABILITY_SHIFT)),
            Reachability::Local => Self(self.0 & !(1 << REACHABILITY_SHIFT)),
        }
    }

    #[inline(always)]
    pub fn age(self) -> u8 {
        ((self.0 >> AGE_SHIFT) & AGE_MASK) as u8
    }

    #[inline(always)]
    fn with_age(self, age: u8) -> Self {
        Self((self.0 & !(AGE_MASK << AGE_SHIFT)) | ((age as u64) << AGE_SHIFT))
    }

    #[inline(always)]
    pub fn remembered(self) -> bool {
        self.0 & (1 << REMEMBERED_SHIFT) != 0
    }

    #[inline(always)]
    fn with_remembered(self, remembered: bool) -> Self {
        if remembered {
            Self(self.0 | (1 << REMEMBERED_SHIFT))
        } else {
            Self(self.0 & !(1 << REMEMBERED_SHIFT))
        }
    }
}

/// The fixed two-word prefix of every heap object.
///
/// ```text
/// word 0: object information (see [`ObjectInfo`])
/// word 1: map — ObjectReference to this object's Map, or, once the
///         object has been forwarded, ObjectReference to the new copy
/// ```
#[repr(C)]
pub struct Header {
    info: ObjectInfo,
    pub map: Value,
}

const _: () = assert!(size_of::<Header>() == 16);

impl Header {
    #[inline(always)]
    pub fn new(object_type: ObjectType, actor_id: u32, map: Value) -> Self {
        Self {
            info: ObjectInfo::new(object_type, actor_id),
            map,
        }
    }

    #[inline(always)]
    pub fn info(&self) -> ObjectInfo {
        self.info
    }

    #[inline(always)]
    pub fn object_type(&self) -> ObjectType {
        self.info.object_type()
    }

    #[inline(always)]
    pub fn actor_id(&self) -> u32 {
        self.info.actor_id()
    }

    #[inline(always)]
    pub fn reachability(&self) -> Reachability {
        self.info.reachability()
    }

    #[inline(always)]
    pub fn set_reachability(&mut self, reachability: Reachability) {
        self.info = self.info.with_reachability(reachability);
    }

    #[inline(always)]
    pub fn extra(&self) -> u8 {
        self.info.extra()
    }

    #[inline(always)]
    pub fn set_extra(&mut self, extra: u8) {
        self.info = self.info.with_extra(extra);
    }

    // ── collection bookkeeping ─────────────────────────────────────

    #[inline(always)]
    pub fn age(&self) -> u8 {
        self.info.age()
    }

    #[inline(always)]
    pub fn set_age(&mut self, age: u8) {
        self.info = self.info.with_age(age);
    }

    #[inline(always)]
    pub fn remembered(&self) -> bool {
        self.info.remembered()
    }

    #[inline(always)]
    pub fn set_remembered(&mut self, remembered: bool) {
        self.info = self.info.with_remembered(remembered);
    }

    // ── forwarding ─────────────────────────────────────────────────

    #[inline(always)]
    pub fn is_forwarded(&self) -> bool {
        self.object_type() == ObjectType::ForwardedObject
    }

    /// Turn this header into a forwarding tombstone pointing at `target`.
    ///
    /// One-shot: a second attempt is rejected and changes nothing.
    #[inline]
    pub fn forward_to(&mut self, target: Value) -> bool {
        if self.is_forwarded() {
            return false;
        }
        debug_assert!(target.is_reference());
        self.info = self.info.with_object_type(ObjectType::ForwardedObject);
        self.map = target;
        true
    }

    /// The new location of a forwarded object.
    #[inline(always)]
    pub fn forward_address(&self) -> Value {
        debug_assert!(self.is_forwarded());
        self.map
    }
}

impl core::fmt::Debug for Header {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Header")
            .field("type", &self.object_type())
            .field("actor", &self.actor_id())
            .field("reachability", &self.reachability())
            .field("age", &self.age())
            .field("map", &self.map)
            .finish()
    }
}

/// Follow forwarding tombstones until a non-forwarded object is reached.
///
/// Immediate values pass through unchanged. Forwarding chains are at most
/// one hop long in practice (the collector never forwards into from-space),
/// but the loop costs nothing and tolerates re-entrant traversals.
///
/// # Safety
///
/// If `value` is a reference it must point at a valid [`Header`].
#[inline]
pub unsafe fn chase(value: Value) -> Value {
    let mut value = value;
    while value.is_reference() {
        let header: &Header = value.as_ref();
        if !header.is_forwarded() {
            break;
        }
        value = header.forward_address();
    }
    value
}
