use std::net::ToSocketAddrs;

use object::{ByteArray, Value};
use parser::Span;

use crate::alloc::{alloc_addr_info, alloc_array_with, alloc_byte_array};
use crate::interpreter::{try_heap, Completion, Interp};
use crate::primitives::{expect_integer, expect_variant};
use crate::Rooted;

/// `_AddrInfoForHost:Port:` — resolve a host name through the platform
/// resolver and wrap the result.
pub fn for_host_port(interp: &mut Interp, _receiver: &Rooted, args: &[Rooted], span: Span) -> Completion {
    expect_variant!(args[0].get(), ByteArray, span);
    let port = expect_integer!(args[1].get(), span);
    if !(0..=u16::MAX as i64).contains(&port) {
        return Completion::RuntimeError {
            message: format!("port {port} out of range"),
            span,
        };
    }

    // SAFETY: variant checked above.
    let host = unsafe {
        String::from_utf8_lossy(args[0].get().as_ref::<ByteArray>().bytes()).into_owned()
    };

    // Resolve on the host side first; nothing below may hold heap
    // references across the blocking call.
    let resolved: Vec<String> = match (host.as_str(), port as u16).to_socket_addrs() {
        Ok(addrs) => addrs.map(|addr| addr.to_string()).collect(),
        Err(error) => {
            return Completion::RuntimeError {
                message: format!("address lookup for `{host}` failed: {error}"),
                span,
            };
        }
    };

    let actor = interp.globals.current_actor;
    let map = interp.globals.empty_map;

    let mut address_values: Vec<Rooted> = Vec::with_capacity(resolved.len());
    for address in &resolved {
        let value = try_heap!(
            alloc_byte_array(
                interp.heap,
                &mut *interp.globals,
                actor,
                map,
                address.as_bytes()
            ),
            span
        );
        address_values.push(Rooted::new(interp.heap, value));
    }

    let elements: Vec<Value> = address_values.iter().map(|rooted| rooted.get()).collect();
    let addresses = try_heap!(
        alloc_array_with(interp.heap, &mut *interp.globals, actor, map, &elements),
        span
    );
    let addresses = Rooted::new(interp.heap, addresses);

    let info = try_heap!(
        alloc_addr_info(
            interp.heap,
            &mut *interp.globals,
            actor,
            map,
            args[0].get(),
            Value::integer(port),
            addresses.get(),
        ),
        span
    );
    Completion::Normal(info)
}

/// `_AddrInfoHost`
pub fn host(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), AddrInfo, span);
    // SAFETY: variant checked above.
    Completion::Normal(unsafe { receiver.get().as_ref::<object::AddrInfo>().host })
}

/// `_AddrInfoPort`
pub fn port(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), AddrInfo, span);
    // SAFETY: variant checked above.
    Completion::Normal(unsafe { receiver.get().as_ref::<object::AddrInfo>().port })
}

/// `_AddrInfoAddresses`
pub fn addresses(_interp: &mut Interp, receiver: &Rooted, _args: &[Rooted], span: Span) -> Completion {
    expect_variant!(receiver.get(), AddrInfo, span);
    // SAFETY: variant checked above.
    Completion::Normal(unsafe { receiver.get().as_ref::<object::AddrInfo>().addresses })
}
