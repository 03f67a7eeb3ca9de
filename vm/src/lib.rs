pub mod actors;
pub mod alloc;
pub mod intern;
pub mod interpreter;
pub mod primitives;
pub mod special;

use std::sync::Mutex;

use heap::{FinalizeFn, Heap, HeapSettings, RootProvider, SizeFn, Tracked, TraceFn};
use object::{
    activation_allocation_size, array_allocation_size, byte_array_allocation_size, Activation,
    Array, ByteArray, Header, Managed, Map, ObjectType, SlotsObject, SpecialObjects, Value,
};

use actors::ActorRegistry;
use intern::InternTable;
use interpreter::{Completion, Interp, RuntimeError};
use primitives::PrimitiveDesc;

/// Everything process-wide except the heap itself. Split out so the heap
/// can borrow it as a [`RootProvider`] while the VM holds both.
pub struct Globals {
    pub specials: SpecialObjects,
    /// The shared empty map given to objects whose variant carries no
    /// lookupable slots of its own (byte arrays, arrays, primitive
    /// methods, …).
    pub empty_map: Value,
    pub intern: InternTable,
    pub code: CodeTable,
    pub primitives: Vec<PrimitiveDesc>,
    pub actors: ActorRegistry,
    pub current_actor: u32,
}

impl RootProvider for Globals {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        self.specials.visit(visitor);
        visitor(&mut self.empty_map);
        self.intern.visit(visitor);
        self.actors.visit(visitor);
    }
}

/// The single point of entry for the evaluator: owns the heap, the root
/// set, the actor table, and the well-known traits objects.
pub struct VirtualMachine {
    pub heap: Heap,
    pub globals: Globals,
}

impl VirtualMachine {
    pub fn new() -> Self {
        Self::with_settings(HeapSettings::default())
    }

    pub fn with_settings(settings: HeapSettings) -> Self {
        special::bootstrap(settings)
    }

    /// Run a parsed script against the lobby. Returns the final
    /// statement's value, or `None` for an empty script.
    pub fn execute_entrypoint_script(
        &mut self,
        script: &[parser::Expr],
    ) -> Result<Option<Value>, RuntimeError> {
        let mut interp = Interp {
            heap: &self.heap,
            globals: &mut self.globals,
        };
        interp.eval_script(script)
    }
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ── Code table ────────────────────────────────────────────────────────

/// The body of one compiled method or block.
///
/// Method objects carry a tagged integer index into this table; the AST
/// itself lives outside the heap and is never traced.
pub struct CodeBody {
    pub arguments: Vec<String>,
    /// Local slot names with their optional initializer expressions.
    pub locals: Vec<(String, Option<parser::Expr>)>,
    pub body: Vec<parser::Expr>,
    pub span: parser::Span,
}

#[derive(Default)]
pub struct CodeTable {
    bodies: Vec<std::rc::Rc<CodeBody>>,
}

impl CodeTable {
    pub fn add(&mut self, body: CodeBody) -> i64 {
        self.bodies.push(std::rc::Rc::new(body));
        (self.bodies.len() - 1) as i64
    }

    pub fn get(&self, id: i64) -> std::rc::Rc<CodeBody> {
        self.bodies[id as usize].clone()
    }
}

// ── Scoped root guard ─────────────────────────────────────────────────

/// A tracked handle with scope-bound release.
///
/// The evaluator pins every Value it holds across a potential allocation,
/// because allocation may collect and move the object behind it. Reads go
/// through [`get`](Rooted::get) so they always observe the post-move
/// address.
pub struct Rooted<'h> {
    heap: &'h Heap,
    tracked: Option<Tracked>,
}

impl<'h> Rooted<'h> {
    pub fn new(heap: &'h Heap, value: Value) -> Self {
        Self {
            heap,
            tracked: Some(heap.track(value)),
        }
    }

    #[inline]
    pub fn get(&self) -> Value {
        self.heap.get(self.tracked.as_ref().expect("live handle"))
    }

    #[inline]
    pub fn set(&self, value: Value) {
        self.heap.set(self.tracked.as_ref().expect("live handle"), value);
    }
}

impl Drop for Rooted<'_> {
    fn drop(&mut self) {
        if let Some(tracked) = self.tracked.take() {
            self.heap.release(tracked);
        }
    }
}

// ── GC callbacks ──────────────────────────────────────────────────────

/// Read a map reference that may already have been forwarded mid-collection.
///
/// # Safety
///
/// `map_value` must reference a live map or a forwarding tombstone.
unsafe fn resolve_map(map_value: Value) -> *const Map {
    let header: &Header = map_value.as_ref();
    if header.is_forwarded() {
        header.forward_address().as_ptr::<Map>() as *const Map
    } else {
        map_value.as_ptr::<Map>() as *const Map
    }
}

/// Trace all Value edges of a heap object for the collector.
///
/// # Safety
///
/// `obj` must point to a valid, live heap object with a valid [`Header`].
pub unsafe fn trace_object(obj: *const u8, visitor: &mut dyn FnMut(&mut Value)) {
    let header = &mut *(obj as *mut Header);
    let object_type = header.object_type();
    visitor(&mut header.map);

    match object_type {
        ObjectType::Slots => {
            // The map knows how many inline values follow.
            if header.map.is_reference() {
                let map = &*resolve_map(header.map);
                let count = map.value_count() as usize;
                let base = (obj as *mut u8).add(SlotsObject::VALUES_OFFSET as usize) as *mut Value;
                for i in 0..count {
                    visitor(&mut *base.add(i));
                }
            }
        }
        ObjectType::Activation => {
            // Fixed fields (receiver, sender, method, pc) are inline
            // values 0..4; locals follow.
            if header.map.is_reference() {
                let map = &*resolve_map(header.map);
                let count = map.value_count() as usize;
                let base = (obj as *mut u8).add(Activation::VALUES_OFFSET as usize) as *mut Value;
                for i in 0..count {
                    visitor(&mut *base.add(i));
                }
            }
        }
        ObjectType::Map => {
            let map = &mut *(obj as *mut Map);
            let count = map.slot_count() as usize;
            let slots = map.slots();
            for i in 0..count {
                let slot = slots.as_ptr().add(i) as *mut object::Slot;
                visitor(&mut (*slot).name);
                visitor(&mut (*slot).value);
            }
        }
        ObjectType::Method => {
            let method = &mut *(obj as *mut object::Method);
            visitor(&mut method.code);
        }
        ObjectType::Block => {
            let block = &mut *(obj as *mut object::Block);
            visitor(&mut block.code);
            visitor(&mut block.home);
        }
        ObjectType::Array => {
            let array = &mut *(obj as *mut Array);
            for element in array.elements_mut() {
                visitor(element);
            }
        }
        ObjectType::ByteArray => {
            // Raw payload, no reference fields.
        }
        ObjectType::Managed => {
            let managed = &mut *(obj as *mut Managed);
            visitor(&mut managed.resource);
            visitor(&mut managed.finalizer);
        }
        ObjectType::Actor => {
            let actor = &mut *(obj as *mut object::Actor);
            visitor(&mut actor.actor);
            visitor(&mut actor.activation);
        }
        ObjectType::ActorProxy => {
            let proxy = &mut *(obj as *mut object::ActorProxy);
            visitor(&mut proxy.actor);
            visitor(&mut proxy.target);
        }
        ObjectType::AddrInfo => {
            let info = &mut *(obj as *mut object::AddrInfo);
            visitor(&mut info.host);
            visitor(&mut info.port);
            visitor(&mut info.addresses);
        }
        ObjectType::ForwardedObject => {
            unreachable!("collector traced a forwarding tombstone")
        }
    }
}

/// Compute the total byte size of a heap object.
///
/// The counterpart of [`trace_object`] used by the copy phase; called
/// before the forwarding tombstone is written, and tolerant of map
/// references that were forwarded first.
///
/// # Safety
///
/// `obj` must point to a valid, live heap object.
pub unsafe fn object_size(obj: *const u8) -> usize {
    let header = &*(obj as *const Header);
    match header.object_type() {
        ObjectType::Slots => {
            let map = &*resolve_map(header.map);
            object::slots_allocation_size(map.value_count())
        }
        ObjectType::Activation => {
            let map = &*resolve_map(header.map);
            activation_allocation_size(map.value_count())
        }
        ObjectType::Map => (*(obj as *const Map)).byte_size(),
        ObjectType::Method => object::method_allocation_size(),
        ObjectType::Block => object::block_allocation_size(),
        ObjectType::Array => array_allocation_size((*(obj as *const Array)).len()),
        ObjectType::ByteArray => {
            byte_array_allocation_size((*(obj as *const ByteArray)).len())
        }
        ObjectType::Managed => object::managed_allocation_size(),
        ObjectType::Actor => object::actor_allocation_size(),
        ObjectType::ActorProxy => object::actor_proxy_allocation_size(),
        ObjectType::AddrInfo => object::addr_info_allocation_size(),
        ObjectType::ForwardedObject => {
            unreachable!("size requested for a forwarding tombstone")
        }
    }
}

/// Resource ids whose owning [`Managed`] objects died in a collection.
///
/// Finalizers run inside the collector with no VM context and no
/// allocation budget, so the hook records the released resource for the
/// host side to drain.
static RELEASED_RESOURCES: Mutex<Vec<i64>> = Mutex::new(Vec::new());

/// Finalize a dead object. Dispatch is driven by the variant's
/// `can_finalize`; only Managed participates today.
///
/// # Safety
///
/// `obj` points at the dead object's from-space remains.
pub unsafe fn finalize_object(obj: *const u8) {
    let header = &*(obj as *const Header);
    debug_assert!(object::can_finalize(header.object_type()));
    if header.object_type() != ObjectType::Managed {
        return;
    }
    let managed = &*(obj as *const Managed);
    if managed.resource.is_integer() {
        let resource = managed.resource.as_integer();
        tracing::debug!(resource, "managed resource released");
        RELEASED_RESOURCES.lock().expect("resource list").push(resource);
    }
}

/// Drain the resource ids released by finalizers since the last call.
pub fn take_released_resources() -> Vec<i64> {
    std::mem::take(&mut *RELEASED_RESOURCES.lock().expect("resource list"))
}

pub const OBJECT_TRACE_FN: TraceFn = trace_object;
pub const OBJECT_SIZE_FN: SizeFn = object_size;
pub const OBJECT_FINALIZE_FN: FinalizeFn = finalize_object;

/// Render a Value as a Rust string if it is a byte array or immediate.
pub fn value_to_string(value: Value) -> Option<String> {
    if value.is_integer() {
        return Some(unsafe { value.as_integer() }.to_string());
    }
    if value.is_float() {
        return Some(unsafe { value.as_float() }.to_string());
    }
    if !value.is_reference() {
        return None;
    }
    let header: &Header = unsafe { value.as_ref() };
    if header.object_type() == ObjectType::ByteArray {
        let bytes: &ByteArray = unsafe { value.as_ref() };
        return Some(String::from_utf8_lossy(unsafe { bytes.bytes() }).into_owned());
    }
    None
}

/// Re-dispatch a completion-producing expression's heap failure.
pub(crate) fn heap_error_completion(error: heap::HeapError, span: parser::Span) -> Completion {
    Completion::RuntimeError {
        message: error.to_string(),
        span,
    }
}
