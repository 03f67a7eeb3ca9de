//! Primitive methods.
//!
//! Primitives are reachable two ways: directly, through `_Name` selectors
//! in source, and through the Method objects the bootstrap installs on
//! the traits objects (whose code word is a primitive index).

use object::{Header, ObjectType, Value};
use parser::Span;

use crate::interpreter::{Completion, Interp};
use crate::Rooted;

pub mod actor;
pub mod addrinfo;
pub mod array;
pub mod block;
pub mod fixnum;
pub mod float;
pub mod general;
pub mod managed;
pub mod string;

pub type PrimitiveFn = fn(&mut Interp, &Rooted, &[Rooted], Span) -> Completion;

#[derive(Clone, Copy)]
pub struct PrimitiveDesc {
    pub name: &'static str,
    pub arity: u8,
    pub func: PrimitiveFn,
}

impl PrimitiveDesc {
    pub const fn new(name: &'static str, arity: u8, func: PrimitiveFn) -> Self {
        Self { name, arity, func }
    }
}

pub fn default_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("_Error:", 1, general::error),
        PrimitiveDesc::new("_Clone", 0, general::clone),
        PrimitiveDesc::new("_AddSlots:", 1, general::add_slots),
        PrimitiveDesc::new("_ChooseFirst:Or:", 2, general::choose_first),
        PrimitiveDesc::new("_ChooseSecond:Or:", 2, general::choose_second),
        PrimitiveDesc::new("_StringPrint", 0, string::print),
        PrimitiveDesc::new("_StringPrintLine", 0, string::print_line),
        PrimitiveDesc::new("_ByteVectorSize", 0, string::size),
        PrimitiveDesc::new("_ByteAt:", 1, string::byte_at),
        PrimitiveDesc::new("_ByteAt:Put:", 2, string::byte_at_put),
        PrimitiveDesc::new("_ByteVectorCopySize:", 1, string::copy_size),
        PrimitiveDesc::new("_ArrayNew:", 1, array::new),
        PrimitiveDesc::new("_ArraySize", 0, array::size),
        PrimitiveDesc::new("_ArrayAt:", 1, array::at),
        PrimitiveDesc::new("_ArrayAt:Put:", 2, array::at_put),
        PrimitiveDesc::new("_IntAdd:", 1, fixnum::add),
        PrimitiveDesc::new("_IntSub:", 1, fixnum::sub),
        PrimitiveDesc::new("_IntMul:", 1, fixnum::mul),
        PrimitiveDesc::new("_IntLt:", 1, fixnum::lt),
        PrimitiveDesc::new("_IntEq:", 1, fixnum::eq),
        PrimitiveDesc::new("_IntPrint", 0, fixnum::print),
        PrimitiveDesc::new("_IntPrintLine", 0, fixnum::print_line),
        PrimitiveDesc::new("_IntTimesRepeat:", 1, fixnum::times_repeat),
        PrimitiveDesc::new("_FloatAdd:", 1, float::add),
        PrimitiveDesc::new("_FloatMul:", 1, float::mul),
        PrimitiveDesc::new("_FloatLt:", 1, float::lt),
        PrimitiveDesc::new("_FloatPrint", 0, float::print),
        PrimitiveDesc::new("_BlockValue", 0, block::value0),
        PrimitiveDesc::new("_BlockValue:", 1, block::value1),
        PrimitiveDesc::new("_BlockValue:With:", 2, block::value2),
        PrimitiveDesc::new("_ExpectToFail:", 1, block::expect_to_fail),
        PrimitiveDesc::new("_ExpectToNotFail:", 1, block::expect_to_not_fail),
        PrimitiveDesc::new("_ActorSpawn", 0, actor::spawn),
        PrimitiveDesc::new("_ActorSend:", 1, actor::send),
        PrimitiveDesc::new("_ActorReceive", 0, actor::receive),
        PrimitiveDesc::new("_ActorYield", 0, actor::r#yield),
        PrimitiveDesc::new("_ManagedNew:", 1, managed::new),
        PrimitiveDesc::new("_ManagedResource", 0, managed::resource),
        PrimitiveDesc::new("_AddrInfoForHost:Port:", 2, addrinfo::for_host_port),
        PrimitiveDesc::new("_AddrInfoHost", 0, addrinfo::host),
        PrimitiveDesc::new("_AddrInfoPort", 0, addrinfo::port),
        PrimitiveDesc::new("_AddrInfoAddresses", 0, addrinfo::addresses),
    ]
}

// ── shared checks ─────────────────────────────────────────────────────

pub(crate) fn object_type_of(value: Value) -> Option<ObjectType> {
    if !value.is_reference() {
        return None;
    }
    // SAFETY: references handed to primitives are live objects.
    let header: &Header = unsafe { value.as_ref() };
    Some(header.object_type())
}

pub(crate) fn type_error(span: Span, expected: &str, got: Value) -> Completion {
    let description = match object_type_of(got) {
        Some(object_type) => format!("{object_type:?}"),
        None if got.is_integer() => "Integer".to_string(),
        None if got.is_float() => "Float".to_string(),
        None => "non-reference".to_string(),
    };
    Completion::RuntimeError {
        message: format!("type mismatch: expected {expected}, got {description}"),
        span,
    }
}

pub(crate) fn index_error(span: Span, index: i64, length: u64) -> Completion {
    Completion::RuntimeError {
        message: format!("index {index} out of bounds for length {length}"),
        span,
    }
}

/// Check the receiver's variant, or fail with a type-mismatch completion.
macro_rules! expect_variant {
    ($value:expr, $variant:ident, $span:expr) => {
        if crate::primitives::object_type_of($value) != Some(object::ObjectType::$variant) {
            return crate::primitives::type_error($span, stringify!($variant), $value);
        }
    };
}

/// Extract a tagged integer argument, or fail.
macro_rules! expect_integer {
    ($value:expr, $span:expr) => {{
        let value = $value;
        if !value.is_integer() {
            return crate::primitives::type_error($span, "Integer", value);
        }
        // SAFETY: just checked.
        unsafe { value.as_integer() }
    }};
}

pub(crate) use expect_integer;
pub(crate) use expect_variant;
