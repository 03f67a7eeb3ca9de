use crate::selector;
use crate::Value;

/// Well-known singleton objects and traits objects.
///
/// Holds tagged [`Value`] references to objects the VM needs for core
/// operations and for looking up methods on receivers that don't carry
/// their own map-reachable slots (integers, floats, arrays, byte arrays,
/// and the intrinsic wrappers).
///
/// **Objects are not allocated here.** They must be allocated on the heap
/// first and then stored as tagged references; all of them are immutable
/// after VM init and marked Global. Pass this struct by reference
/// (`&SpecialObjects`) to subsystems that need it.
pub struct SpecialObjects {
    // ── Singletons ─────────────────────────────────────────────────
    /// The canonical nil object.
    pub nil: Value,

    /// The canonical `true` object.
    pub true_obj: Value,

    /// The canonical `false` object.
    pub false_obj: Value,

    /// The map that describes all other maps (self-referential).
    pub map_map: Value,

    /// The root namespace object scripts evaluate against.
    pub lobby: Value,

    // ── Traits objects ─────────────────────────────────────────────
    /// Methods / slots for tagged integer values.
    pub integer_traits: Value,

    /// Methods / slots for tagged float values.
    pub float_traits: Value,

    /// Methods / slots for [`ByteArray`](crate::ByteArray) objects —
    /// the prototype-chain root of every string.
    pub string_traits: Value,

    /// Methods / slots for [`Array`](crate::Array) objects.
    pub array_traits: Value,

    /// Methods / slots for [`Block`](crate::Block) objects.
    pub block_traits: Value,

    /// Methods / slots for [`Actor`](crate::Actor) and
    /// [`ActorProxy`](crate::ActorProxy) objects.
    pub actor_traits: Value,

    /// Methods / slots for [`Managed`](crate::Managed) objects.
    pub managed_traits: Value,

    /// Methods / slots for [`AddrInfo`](crate::AddrInfo) objects.
    pub addr_info_traits: Value,

    /// Hash of the built-in `parent` selector.
    pub parent_hash: u32,
}

impl SpecialObjects {
    /// All specials pointing at `nil`; the bootstrap patches them in order.
    pub fn placeholder(nil: Value) -> Self {
        Self {
            nil,
            true_obj: nil,
            false_obj: nil,
            map_map: nil,
            lobby: nil,
            integer_traits: nil,
            float_traits: nil,
            string_traits: nil,
            array_traits: nil,
            block_traits: nil,
            actor_traits: nil,
            managed_traits: nil,
            addr_info_traits: nil,
            parent_hash: selector::parent_hash(),
        }
    }

    /// Visit every special root for the collector.
    pub fn visit(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        visitor(&mut self.nil);
        visitor(&mut self.true_obj);
        visitor(&mut self.false_obj);
        visitor(&mut self.map_map);
        visitor(&mut self.lobby);
        visitor(&mut self.integer_traits);
        visitor(&mut self.float_traits);
        visitor(&mut self.string_traits);
        visitor(&mut self.array_traits);
        visitor(&mut self.block_traits);
        visitor(&mut self.actor_traits);
        visitor(&mut self.managed_traits);
        visitor(&mut self.addr_info_traits);
    }
}
