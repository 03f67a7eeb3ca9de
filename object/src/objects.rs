use core::ptr::NonNull;

use crate::header::{Header, ObjectType};
use crate::Value;

// ── SlotsObject ────────────────────────────────────────────────────

/// An ordinary object: header plus inline slot values in the order its
/// map prescribes.
///
/// ```text
/// [Header 16B] [value_0 8B] [value_1 8B] ...
/// ```
#[repr(C)]
pub struct SlotsObject {
    pub header: Header,
}

const _: () = assert!(size_of::<SlotsObject>() == 16);

impl SlotsObject {
    /// Byte offset of the first inline value.
    pub const VALUES_OFFSET: u32 = size_of::<SlotsObject>() as u32;

    /// Read the inline value at `word_index`.
    ///
    /// # Safety
    ///
    /// `word_index` must be below the map's `value_count`.
    #[inline(always)]
    pub unsafe fn read_value(&self, word_index: u32) -> Value {
        read_inline_value(self as *const Self as *const u8, Self::VALUES_OFFSET, word_index)
    }

    /// Write the inline value at `word_index`.
    ///
    /// # Safety
    ///
    /// `word_index` must be below the map's `value_count`.
    #[inline(always)]
    pub unsafe fn write_value(&mut self, word_index: u32, value: Value) {
        write_inline_value(self as *mut Self as *mut u8, Self::VALUES_OFFSET, word_index, value)
    }
}

pub const fn slots_allocation_size(value_count: u32) -> usize {
    size_of::<SlotsObject>() + value_count as usize * size_of::<Value>()
}

/// # Safety
///
/// `ptr` must point at `slots_allocation_size(values.len())` writable bytes.
pub unsafe fn init_slots(ptr: *mut SlotsObject, actor_id: u32, map: Value, values: &[Value]) {
    ptr.write(SlotsObject {
        header: Header::new(ObjectType::Slots, actor_id, map),
    });
    copy_inline_values(ptr as *mut u8, SlotsObject::VALUES_OFFSET, values);
}

// ── Array ──────────────────────────────────────────────────────────

/// A fixed-size sequence of tagged values, payload allocated in the same
/// contiguous block as the wrapper.
///
/// ```text
/// [Header 16B] [length: u64 8B] [elem_0 8B] [elem_1 8B] ...
/// ```
#[repr(C)]
pub struct Array {
    pub header: Header,
    length: u64,
}

const _: () = assert!(size_of::<Array>() == 24);

impl Array {
    #[inline(always)]
    pub fn len(&self) -> u64 {
        self.length
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline(always)]
    fn elements_ptr(&self) -> *const Value {
        unsafe { (self as *const Array).add(1) as *const Value }
    }

    /// # Safety
    ///
    /// The inline memory after this struct must contain `len()` valid elements.
    #[inline(always)]
    pub unsafe fn elements(&self) -> &[Value] {
        core::slice::from_raw_parts(self.elements_ptr(), self.length as usize)
    }

    /// # Safety
    ///
    /// Same as [`elements`](Self::elements), plus exclusive access.
    #[inline(always)]
    pub unsafe fn elements_mut(&mut self) -> &mut [Value] {
        core::slice::from_raw_parts_mut(self.elements_ptr() as *mut Value, self.length as usize)
    }

    /// # Safety
    ///
    /// `index < len()` and the inline memory must be valid.
    #[inline(always)]
    pub unsafe fn element(&self, index: u64) -> Value {
        debug_assert!(index < self.length);
        *self.elements_ptr().add(index as usize)
    }

    /// # Safety
    ///
    /// `index < len()` and the inline memory must be valid.
    #[inline(always)]
    pub unsafe fn set_element(&mut self, index: u64, value: Value) {
        debug_assert!(index < self.length);
        *(self.elements_ptr() as *mut Value).add(index as usize) = value;
    }
}

pub const fn array_allocation_size(length: u64) -> usize {
    size_of::<Array>() + length as usize * size_of::<Value>()
}

/// # Safety
///
/// `ptr` must point at `array_allocation_size(length)` writable bytes. The
/// caller initializes the elements (or copies them via `init_array_with`).
pub unsafe fn init_array(ptr: *mut Array, actor_id: u32, map: Value, length: u64) {
    ptr.write(Array {
        header: Header::new(ObjectType::Array, actor_id, map),
        length,
    });
}

/// # Safety
///
/// `ptr` must point at `array_allocation_size(elements.len())` writable bytes.
pub unsafe fn init_array_with(ptr: *mut Array, actor_id: u32, map: Value, elements: &[Value]) {
    init_array(ptr, actor_id, map, elements.len() as u64);
    if !elements.is_empty() {
        let dst = ptr.add(1) as *mut Value;
        core::ptr::copy_nonoverlapping(elements.as_ptr(), dst, elements.len());
    }
}

// ── ByteArray ──────────────────────────────────────────────────────

/// A raw byte payload allocated beside its wrapper.
///
/// ```text
/// [Header 16B] [length: u64 8B] [byte_0] [byte_1] ...
/// ```
///
/// ByteArrays double as the string representation; their lookups root into
/// `string_traits`.
#[repr(C)]
pub struct ByteArray {
    pub header: Header,
    length: u64,
}

const _: () = assert!(size_of::<ByteArray>() == 24);

impl ByteArray {
    #[inline(always)]
    pub fn len(&self) -> u64 {
        self.length
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline(always)]
    fn bytes_ptr(&self) -> *const u8 {
        unsafe { (self as *const ByteArray).add(1) as *const u8 }
    }

    /// # Safety
    ///
    /// The inline memory after this struct must contain `len()` valid bytes.
    #[inline(always)]
    pub unsafe fn bytes(&self) -> &[u8] {
        core::slice::from_raw_parts(self.bytes_ptr(), self.length as usize)
    }

    /// # Safety
    ///
    /// Same as [`bytes`](Self::bytes), plus exclusive access.
    #[inline(always)]
    pub unsafe fn bytes_mut(&mut self) -> &mut [u8] {
        core::slice::from_raw_parts_mut(self.bytes_ptr() as *mut u8, self.length as usize)
    }
}

/// Rounded up so the next bump allocation stays 8-byte aligned.
pub const fn byte_array_allocation_size(length: u64) -> usize {
    (size_of::<ByteArray>() + length as usize + 7) & !7
}

/// # Safety
///
/// `ptr` must point at `byte_array_allocation_size(bytes.len())` writable bytes.
pub unsafe fn init_byte_array(ptr: *mut ByteArray, actor_id: u32, map: Value, bytes: &[u8]) {
    ptr.write(ByteArray {
        header: Header::new(ObjectType::ByteArray, actor_id, map),
        length: bytes.len() as u64,
    });
    if !bytes.is_empty() {
        let dst = ptr.add(1) as *mut u8;
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
    }
}

/// # Safety
///
/// `ptr` must point at `byte_array_allocation_size(length)` writable bytes.
pub unsafe fn init_byte_array_zeroed(ptr: *mut ByteArray, actor_id: u32, map: Value, length: u64) {
    ptr.write(ByteArray {
        header: Header::new(ObjectType::ByteArray, actor_id, map),
        length,
    });
    let dst = ptr.add(1) as *mut u8;
    core::ptr::write_bytes(dst, 0, length as usize);
}

// ── Method ─────────────────────────────────────────────────────────

/// Method kind, stored in the header's extra byte.
pub const METHOD_KIND_SCRIPT: u8 = 0;
pub const METHOD_KIND_PRIMITIVE: u8 = 1;

/// A named method.
///
/// `code` is a tagged integer: an index into the evaluator's code table
/// for script methods, or a primitive index when the extra byte says
/// [`METHOD_KIND_PRIMITIVE`]. The method's own map describes the layout of
/// its activations (self parent, arguments, locals).
#[repr(C)]
pub struct Method {
    pub header: Header,
    pub code: Value,
    pub argument_count: u32,
    pub local_count: u32,
}

const _: () = assert!(size_of::<Method>() == 32);

impl Method {
    #[inline(always)]
    pub fn is_primitive(&self) -> bool {
        self.header.extra() == METHOD_KIND_PRIMITIVE
    }
}

pub const fn method_allocation_size() -> usize {
    size_of::<Method>()
}

/// # Safety
///
/// `ptr` must point at `method_allocation_size()` writable bytes.
pub unsafe fn init_method(
    ptr: *mut Method,
    actor_id: u32,
    map: Value,
    code: Value,
    argument_count: u32,
    local_count: u32,
    kind: u8,
) {
    let mut header = Header::new(ObjectType::Method, actor_id, map);
    header.set_extra(kind);
    ptr.write(Method {
        header,
        code,
        argument_count,
        local_count,
    });
}

// ── Block ──────────────────────────────────────────────────────────

/// A closure: code plus the captured home activation.
///
/// Shares the Method code conventions; `home` is the activation whose
/// receiver becomes `self` inside the block and whose frame a `^` return
/// unwinds to.
#[repr(C)]
pub struct Block {
    pub header: Header,
    pub code: Value,
    pub argument_count: u32,
    pub local_count: u32,
    pub home: Value,
}

const _: () = assert!(size_of::<Block>() == 40);

pub const fn block_allocation_size() -> usize {
    size_of::<Block>()
}

/// # Safety
///
/// `ptr` must point at `block_allocation_size()` writable bytes.
pub unsafe fn init_block(
    ptr: *mut Block,
    actor_id: u32,
    map: Value,
    code: Value,
    argument_count: u32,
    local_count: u32,
    home: Value,
) {
    ptr.write(Block {
        header: Header::new(ObjectType::Block, actor_id, map),
        code,
        argument_count,
        local_count,
        home,
    });
}

// ── Activation ─────────────────────────────────────────────────────

/// Extra-byte bit set once the frame has returned; a non-local return
/// into such a frame is a runtime error.
pub const ACTIVATION_RETURNED: u8 = 1 << 0;

/// A running frame.
///
/// ```text
/// [Header 16B] [receiver 8B] [sender 8B] [method 8B] [pc 8B] [local_0] ...
/// ```
///
/// The fixed fields are inline values 0..4 of the activation's map, so the
/// map's self slot (a parent-mutable slot at word index 0) makes implicit
/// sends inside the frame fall through to the receiver. `pc` is a tagged
/// integer so frames trace uniformly.
#[repr(C)]
pub struct Activation {
    pub header: Header,
    pub receiver: Value,
    pub sender: Value,
    pub method: Value,
    pub pc: Value,
}

const _: () = assert!(size_of::<Activation>() == 48);

impl Activation {
    /// Byte offset of inline value word 0 (the receiver).
    pub const VALUES_OFFSET: u32 = size_of::<Header>() as u32;
    /// Number of inline words occupied by the fixed fields.
    pub const FIXED_VALUES: u32 = 4;
    /// Word index of the receiver (a method map's self slot points here).
    pub const SELF_INDEX: u32 = 0;
    /// Word index of the sender (a block map's lexical-parent slot points
    /// here — block frames store their home activation as the sender).
    pub const SENDER_INDEX: u32 = 1;

    #[inline(always)]
    pub fn has_returned(&self) -> bool {
        self.header.extra() & ACTIVATION_RETURNED != 0
    }

    #[inline(always)]
    pub fn set_returned(&mut self) {
        let extra = self.header.extra();
        self.header.set_extra(extra | ACTIVATION_RETURNED);
    }

    /// # Safety
    ///
    /// `word_index` must be below the map's `value_count`.
    #[inline(always)]
    pub unsafe fn read_value(&self, word_index: u32) -> Value {
        read_inline_value(self as *const Self as *const u8, Self::VALUES_OFFSET, word_index)
    }

    /// # Safety
    ///
    /// `word_index` must be below the map's `value_count`.
    #[inline(always)]
    pub unsafe fn write_value(&mut self, word_index: u32, value: Value) {
        write_inline_value(self as *mut Self as *mut u8, Self::VALUES_OFFSET, word_index, value)
    }
}

/// `value_count` is the map's count, fixed fields included.
pub const fn activation_allocation_size(value_count: u32) -> usize {
    debug_assert!(value_count >= Activation::FIXED_VALUES);
    size_of::<Header>() + value_count as usize * size_of::<Value>()
}

/// Locals start zeroed to `fill` (the VM passes nil).
///
/// # Safety
///
/// `ptr` must point at `activation_allocation_size(value_count)` writable
/// bytes and `value_count` must match the map.
pub unsafe fn init_activation(
    ptr: *mut Activation,
    actor_id: u32,
    map: Value,
    receiver: Value,
    sender: Value,
    method: Value,
    value_count: u32,
    fill: Value,
) {
    ptr.write(Activation {
        header: Header::new(ObjectType::Activation, actor_id, map),
        receiver,
        sender,
        method,
        pc: Value::integer(0),
    });
    let base = (ptr as *mut u8).add(size_of::<Activation>()) as *mut Value;
    for i in 0..(value_count - Activation::FIXED_VALUES) as usize {
        base.add(i).write(fill);
    }
}

// ── Managed ────────────────────────────────────────────────────────

/// Wrapper holding an opaque host resource handle plus a finalizer hook.
///
/// The only variant that participates in finalization.
#[repr(C)]
pub struct Managed {
    pub header: Header,
    pub resource: Value,
    pub finalizer: Value,
}

const _: () = assert!(size_of::<Managed>() == 32);

pub const fn managed_allocation_size() -> usize {
    size_of::<Managed>()
}

/// # Safety
///
/// `ptr` must point at `managed_allocation_size()` writable bytes.
pub unsafe fn init_managed(
    ptr: *mut Managed,
    actor_id: u32,
    map: Value,
    resource: Value,
    finalizer: Value,
) {
    ptr.write(Managed {
        header: Header::new(ObjectType::Managed, actor_id, map),
        resource,
        finalizer,
    });
}

// ── Actor ──────────────────────────────────────────────────────────

/// An actor: its registry id plus the activation it is suspended in.
///
/// The mailbox lives in the VM's actor registry, keyed by `actor`.
#[repr(C)]
pub struct Actor {
    pub header: Header,
    pub actor: Value,
    pub activation: Value,
}

const _: () = assert!(size_of::<Actor>() == 32);

pub const fn actor_allocation_size() -> usize {
    size_of::<Actor>()
}

/// # Safety
///
/// `ptr` must point at `actor_allocation_size()` writable bytes.
pub unsafe fn init_actor(ptr: *mut Actor, actor_id: u32, map: Value, actor: Value, activation: Value) {
    ptr.write(Actor {
        header: Header::new(ObjectType::Actor, actor_id, map),
        actor,
        activation,
    });
}

// ── ActorProxy ─────────────────────────────────────────────────────

/// A reference from one actor's domain to another actor's object.
///
/// The only operation a proxy admits is enqueueing a message for the
/// remote actor; `target` is never dereferenced by the holding actor.
#[repr(C)]
pub struct ActorProxy {
    pub header: Header,
    pub actor: Value,
    pub target: Value,
}

const _: () = assert!(size_of::<ActorProxy>() == 32);

pub const fn actor_proxy_allocation_size() -> usize {
    size_of::<ActorProxy>()
}

/// # Safety
///
/// `ptr` must point at `actor_proxy_allocation_size()` writable bytes.
pub unsafe fn init_actor_proxy(
    ptr: *mut ActorProxy,
    actor_id: u32,
    map: Value,
    actor: Value,
    target: Value,
) {
    ptr.write(ActorProxy {
        header: Header::new(ObjectType::ActorProxy, actor_id, map),
        actor,
        target,
    });
}

// ── AddrInfo ───────────────────────────────────────────────────────

/// Intrinsic wrapper around a host address-info record.
#[repr(C)]
pub struct AddrInfo {
    pub header: Header,
    pub host: Value,
    pub port: Value,
    pub addresses: Value,
}

const _: () = assert!(size_of::<AddrInfo>() == 40);

pub const fn addr_info_allocation_size() -> usize {
    size_of::<AddrInfo>()
}

/// # Safety
///
/// `ptr` must point at `addr_info_allocation_size()` writable bytes.
pub unsafe fn init_addr_info(
    ptr: *mut AddrInfo,
    actor_id: u32,
    map: Value,
    host: Value,
    port: Value,
    addresses: Value,
) {
    ptr.write(AddrInfo {
        header: Header::new(ObjectType::AddrInfo, actor_id, map),
        host,
        port,
        addresses,
    });
}

// ── Dispatch ───────────────────────────────────────────────────────

/// A typed view of a raw object address, one arm per registry variant.
pub enum ObjectRef {
    Slots(NonNull<SlotsObject>),
    Method(NonNull<Method>),
    Block(NonNull<Block>),
    Activation(NonNull<Activation>),
    Array(NonNull<Array>),
    ByteArray(NonNull<ByteArray>),
    Managed(NonNull<Managed>),
    Actor(NonNull<Actor>),
    ActorProxy(NonNull<ActorProxy>),
    Map(NonNull<crate::Map>),
    AddrInfo(NonNull<AddrInfo>),
}

impl ObjectRef {
    /// Cast a raw address to a typed object handle.
    ///
    /// Panics if the first word is not an ObjectMarker (the address does
    /// not point at an object header) or if the header is a forwarding
    /// tombstone — callers chase forwards before dispatching.
    ///
    /// # Safety
    ///
    /// `addr` must point at readable memory laid out as one of the
    /// registry variants.
    pub unsafe fn from_address(addr: *mut u8) -> ObjectRef {
        let info_word = Value::from_raw(*(addr as *const u64));
        assert!(info_word.is_marker(), "address does not hold an object header");
        let header = &*(addr as *const Header);
        match header.object_type() {
            ObjectType::Slots => ObjectRef::Slots(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::Method => ObjectRef::Method(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::Block => ObjectRef::Block(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::Activation => {
                ObjectRef::Activation(NonNull::new_unchecked(addr as *mut _))
            }
            ObjectType::Array => ObjectRef::Array(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::ByteArray => {
                ObjectRef::ByteArray(NonNull::new_unchecked(addr as *mut _))
            }
            ObjectType::Managed => ObjectRef::Managed(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::Actor => ObjectRef::Actor(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::ActorProxy => {
                ObjectRef::ActorProxy(NonNull::new_unchecked(addr as *mut _))
            }
            ObjectType::Map => ObjectRef::Map(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::AddrInfo => ObjectRef::AddrInfo(NonNull::new_unchecked(addr as *mut _)),
            ObjectType::ForwardedObject => {
                panic!("forwarded object reached variant dispatch")
            }
        }
    }
}

/// Whether a variant participates in finalization.
pub const fn can_finalize(object_type: ObjectType) -> bool {
    matches!(object_type, ObjectType::Managed)
}

/// Byte offset of a variant's inline value area, if it has one.
///
/// Assignable slots in a map only make sense for these variants; lookup
/// skips assignable slots on receivers without a value area.
pub const fn values_offset(object_type: ObjectType) -> Option<u32> {
    match object_type {
        ObjectType::Slots => Some(SlotsObject::VALUES_OFFSET),
        ObjectType::Activation => Some(Activation::VALUES_OFFSET),
        _ => None,
    }
}

// ── inline value helpers ───────────────────────────────────────────

#[inline(always)]
unsafe fn read_inline_value(base: *const u8, offset: u32, word_index: u32) -> Value {
    let ptr = base.add(offset as usize) as *const Value;
    ptr.add(word_index as usize).read()
}

#[inline(always)]
unsafe fn write_inline_value(base: *mut u8, offset: u32, word_index: u32, value: Value) {
    let ptr = base.add(offset as usize) as *mut Value;
    ptr.add(word_index as usize).write(value);
}

/// # Safety
///
/// The value area after `base + offset` must have room for `values`.
pub(crate) unsafe fn copy_inline_values(base: *mut u8, offset: u32, values: &[Value]) {
    if !values.is_empty() {
        let dst = base.add(offset as usize) as *mut Value;
        core::ptr::copy_nonoverlapping(values.as_ptr(), dst, values.len());
    }
}
