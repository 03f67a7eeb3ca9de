//! VM bootstrap: allocate the well-known objects and wire the traits.
//!
//! Order matters only at the start — the map-of-maps must exist (and be
//! made self-referential) before anything else gets a map. The whole
//! bootstrap fits comfortably inside a fresh young generation; nothing
//! here may trigger a collection, and the assertion at the end pins that.

use std::collections::{HashMap, HashSet};

use heap::{Generation, Heap, HeapSettings, RootProvider};
use object::{
    Header, Map, Reachability, SelectorHash, Slot, SlotFlags, SpecialObjects, Value,
    METHOD_KIND_PRIMITIVE,
};

use crate::actors::{ActorRegistry, MAIN_ACTOR};
use crate::alloc::{alloc_byte_array, alloc_map, alloc_method, alloc_slots_object};
use crate::intern::{InternTable, InternedSelector};
use crate::primitives::{default_primitives, PrimitiveDesc};
use crate::{
    trace_object, CodeTable, Globals, VirtualMachine, OBJECT_FINALIZE_FN, OBJECT_SIZE_FN,
    OBJECT_TRACE_FN,
};

/// Temporary root provider used during bootstrap.
struct BootstrapRoots {
    roots: Vec<Value>,
}

impl BootstrapRoots {
    fn new() -> Self {
        Self {
            roots: Vec::with_capacity(128),
        }
    }

    fn push(&mut self, value: Value) {
        self.roots.push(value);
    }
}

impl RootProvider for BootstrapRoots {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for root in &mut self.roots {
            visitor(root);
        }
    }
}

struct Boot<'h> {
    heap: &'h Heap,
    roots: BootstrapRoots,
    intern_entries: HashMap<String, InternedSelector>,
    primitives: Vec<PrimitiveDesc>,
    map_map: Value,
    empty_map: Value,
}

impl Boot<'_> {
    fn intern(&mut self, name: &str) -> InternedSelector {
        if let Some(entry) = self.intern_entries.get(name) {
            return *entry;
        }
        let hash = SelectorHash::of(name);
        let bytes = alloc_byte_array(
            self.heap,
            &mut self.roots,
            MAIN_ACTOR,
            self.empty_map,
            name.as_bytes(),
        )
        .expect("bootstrap allocation");
        self.roots.push(bytes);
        let entry = InternedSelector { hash, name: bytes };
        self.intern_entries.insert(name.to_string(), entry);
        entry
    }

    fn primitive_method(&mut self, primitive: &str) -> Value {
        let index = self
            .primitives
            .iter()
            .position(|desc| desc.name == primitive)
            .unwrap_or_else(|| panic!("unknown primitive {primitive}"));
        let arity = self.primitives[index].arity as u32;
        let method = alloc_method(
            self.heap,
            &mut self.roots,
            MAIN_ACTOR,
            self.empty_map,
            Value::integer(index as i64),
            arity,
            0,
            METHOD_KIND_PRIMITIVE,
        )
        .expect("bootstrap allocation");
        self.roots.push(method);
        method
    }

    fn method_slot(&mut self, selector: &str, primitive: &str) -> Slot {
        let interned = self.intern(selector);
        let method = self.primitive_method(primitive);
        Slot::new(
            SlotFlags::CONSTANT,
            interned.hash.regular,
            interned.name,
            method,
        )
    }

    fn constant_slot(&mut self, name: &str, value: Value) -> Slot {
        let interned = self.intern(name);
        Slot::new(
            SlotFlags::CONSTANT,
            interned.hash.regular,
            interned.name,
            value,
        )
    }

    /// An object with the given map slots and no inline values.
    fn object(&mut self, slots: &[Slot]) -> Value {
        let map = alloc_map(
            self.heap,
            &mut self.roots,
            MAIN_ACTOR,
            self.map_map,
            slots,
            0,
        )
        .expect("bootstrap allocation");
        self.roots.push(map);
        let object = alloc_slots_object(self.heap, &mut self.roots, MAIN_ACTOR, map, &[])
            .expect("bootstrap allocation");
        self.roots.push(object);
        object
    }

    /// A traits object holding one primitive method per entry.
    fn methods_object(&mut self, entries: &[(&str, &str)]) -> Value {
        let slots: Vec<Slot> = entries
            .iter()
            .map(|(selector, primitive)| self.method_slot(selector, primitive))
            .collect();
        self.object(&slots)
    }
}

/// Bootstrap a [`VirtualMachine`]: heap, map-of-maps, nil/true/false,
/// the lobby, the traits objects, and the primitive registry.
pub fn bootstrap(settings: HeapSettings) -> VirtualMachine {
    let heap = Heap::new(settings, OBJECT_TRACE_FN, OBJECT_SIZE_FN, OBJECT_FINALIZE_FN);

    let globals = {
        let mut roots = BootstrapRoots::new();

        // The map-of-maps first: allocated with a placeholder map word,
        // then patched to describe itself.
        let map_map = alloc_map(&heap, &mut roots, MAIN_ACTOR, Value::integer(0), &[], 0)
            .expect("bootstrap allocation");
        // SAFETY: just allocated, nothing else references it yet.
        unsafe {
            map_map.as_mut::<Map>().header.map = map_map;
        }
        roots.push(map_map);

        // The shared empty map for payload variants (byte arrays, arrays,
        // primitive methods, …).
        let empty_map = alloc_map(&heap, &mut roots, MAIN_ACTOR, map_map, &[], 0)
            .expect("bootstrap allocation");
        roots.push(empty_map);

        let mut boot = Boot {
            heap: &heap,
            roots,
            intern_entries: HashMap::new(),
            primitives: default_primitives(),
            map_map,
            empty_map,
        };

        let nil = boot.object(&[]);

        let true_slot = boot.method_slot("ifTrue:False:", "_ChooseFirst:Or:");
        let true_obj = boot.object(&[true_slot]);
        let false_slot = boot.method_slot("ifTrue:False:", "_ChooseSecond:Or:");
        let false_obj = boot.object(&[false_slot]);

        let integer_traits = boot.methods_object(&[
            ("+", "_IntAdd:"),
            ("-", "_IntSub:"),
            ("*", "_IntMul:"),
            ("<", "_IntLt:"),
            ("=", "_IntEq:"),
            ("print", "_IntPrint"),
            ("printLine", "_IntPrintLine"),
            ("timesRepeat:", "_IntTimesRepeat:"),
        ]);
        let float_traits = boot.methods_object(&[
            ("+", "_FloatAdd:"),
            ("*", "_FloatMul:"),
            ("<", "_FloatLt:"),
            ("print", "_FloatPrint"),
        ]);
        let string_traits = boot.methods_object(&[
            ("print", "_StringPrint"),
            ("printLine", "_StringPrintLine"),
            ("size", "_ByteVectorSize"),
            ("at:", "_ByteAt:"),
            ("at:Put:", "_ByteAt:Put:"),
            ("copySize:", "_ByteVectorCopySize:"),
        ]);
        let array_traits = boot.methods_object(&[
            ("size", "_ArraySize"),
            ("at:", "_ArrayAt:"),
            ("at:Put:", "_ArrayAt:Put:"),
        ]);
        let block_traits = boot.methods_object(&[
            ("value", "_BlockValue"),
            ("value:", "_BlockValue:"),
            ("value:With:", "_BlockValue:With:"),
            ("expectToFail:", "_ExpectToFail:"),
            ("expectToNotFail:", "_ExpectToNotFail:"),
        ]);
        let actor_traits = boot.methods_object(&[
            ("send:", "_ActorSend:"),
            ("receive", "_ActorReceive"),
            ("yield", "_ActorYield"),
        ]);
        let managed_traits = boot.methods_object(&[("resource", "_ManagedResource")]);
        let addr_info_traits = boot.methods_object(&[
            ("host", "_AddrInfoHost"),
            ("port", "_AddrInfoPort"),
            ("addresses", "_AddrInfoAddresses"),
        ]);

        // The lobby starts with an empty map so it exists before its own
        // map mentions it.
        let lobby = boot.object(&[]);
        let lobby_slots = vec![
            boot.constant_slot("lobby", lobby),
            boot.constant_slot("nil", nil),
            boot.constant_slot("true", true_obj),
            boot.constant_slot("false", false_obj),
            boot.method_slot("spawnActor", "_ActorSpawn"),
            boot.method_slot("managed:", "_ManagedNew:"),
            boot.method_slot("arrayOf:", "_ArrayNew:"),
            boot.method_slot("addrInfoForHost:Port:", "_AddrInfoForHost:Port:"),
            boot.method_slot("error:", "_Error:"),
        ];
        let lobby_map = alloc_map(
            boot.heap,
            &mut boot.roots,
            MAIN_ACTOR,
            map_map,
            &lobby_slots,
            0,
        )
        .expect("bootstrap allocation");
        boot.roots.push(lobby_map);
        // SAFETY: the lobby is live and exclusively ours during bootstrap.
        unsafe {
            lobby.as_mut::<Header>().map = lobby_map;
        }

        let mut specials = SpecialObjects::placeholder(nil);
        specials.true_obj = true_obj;
        specials.false_obj = false_obj;
        specials.map_map = map_map;
        specials.lobby = lobby;
        specials.integer_traits = integer_traits;
        specials.float_traits = float_traits;
        specials.string_traits = string_traits;
        specials.array_traits = array_traits;
        specials.block_traits = block_traits;
        specials.actor_traits = actor_traits;
        specials.managed_traits = managed_traits;
        specials.addr_info_traits = addr_info_traits;

        // Everything allocated so far is immutable post-boot and visible
        // to every actor.
        mark_global(&boot.roots.roots);

        let mut actors = ActorRegistry::new();
        let main_id = actors.register(nil);
        debug_assert_eq!(main_id, MAIN_ACTOR);

        assert_eq!(
            heap.collection_count(Generation::Young),
            0,
            "bootstrap must fit in the young generation"
        );

        Globals {
            specials,
            empty_map,
            intern: InternTable::from_entries(boot.intern_entries),
            code: CodeTable::default(),
            primitives: boot.primitives,
            actors,
            current_actor: MAIN_ACTOR,
        }
    };

    VirtualMachine { heap, globals }
}

/// Flip every object reachable from the bootstrap roots to Global
/// reachability.
fn mark_global(roots: &[Value]) {
    let mut seen: HashSet<u64> = HashSet::new();
    let mut queue: Vec<Value> = roots
        .iter()
        .copied()
        .filter(|value| value.is_reference())
        .collect();

    while let Some(value) = queue.pop() {
        if !seen.insert(value.address()) {
            continue;
        }
        // SAFETY: bootstrap objects are live and unforwarded.
        unsafe {
            let header = value.as_mut::<Header>();
            header.set_reachability(Reachability::Global);
            trace_object(value.address() as *const u8, &mut |edge| {
                if edge.is_reference() {
                    queue.push(*edge);
                }
            });
        }
    }
}
