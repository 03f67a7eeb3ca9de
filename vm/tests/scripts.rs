//! End-to-end scripts through `execute_entrypoint_script`.

use heap::{Generation, HeapSettings, OS_PAGE_SIZE};
use object::{Header, ObjectType, Value};
use vm::interpreter::RuntimeError;
use vm::{value_to_string, VirtualMachine};

fn exec(machine: &mut VirtualMachine, source: &str) -> Result<Option<Value>, RuntimeError> {
    let script = parser::parse_source(source).expect("script parses");
    machine.execute_entrypoint_script(&script)
}

fn run(source: &str) -> Result<Option<Value>, RuntimeError> {
    let mut machine = VirtualMachine::new();
    exec(&mut machine, source)
}

fn final_string(result: Result<Option<Value>, RuntimeError>) -> String {
    let value = result.expect("script succeeds").expect("script has a value");
    value_to_string(value).expect("value renders as a string")
}

fn final_integer(result: Result<Option<Value>, RuntimeError>) -> i64 {
    let value = result.expect("script succeeds").expect("script has a value");
    assert!(value.is_integer(), "expected an integer, got {value:?}");
    unsafe { value.as_integer() }
}

fn object_type(value: Value) -> ObjectType {
    assert!(value.is_reference());
    let header: &Header = unsafe { value.as_ref() };
    header.object_type()
}

// ── core scenarios ─────────────────────────────────────────────────

#[test]
fn hello_world() {
    let result = run("'hello' print.");
    assert_eq!(final_string(result), "hello");
}

#[test]
fn lookup_through_parents() {
    let result = run(
        "lobby _AddSlots: (| b = (| greet = 'hi' |) |). \
         lobby _AddSlots: (| a = (| p* = b |) |). \
         a greet",
    );
    assert_eq!(final_string(result), "hi");
}

#[test]
fn cyclic_parents_terminate() {
    let error = run(
        "lobby _AddSlots: (| a = (| p* <- nil |) |). \
         lobby _AddSlots: (| b = (| q* <- nil |) |). \
         a p: b. \
         b q: a. \
         a foo",
    )
    .expect_err("the selector does not exist anywhere in the cycle");
    assert!(error.message.contains("message not understood: foo"));
}

#[test]
fn assignment_via_setter() {
    let mut machine = VirtualMachine::new();
    exec(&mut machine, "lobby _AddSlots: (| o = (| x <- 0 |) |).").expect("setup");

    // The setter answers the receiver.
    let receiver = exec(&mut machine, "o x: 5")
        .expect("assignment succeeds")
        .expect("assignment has a value");
    assert_eq!(object_type(receiver), ObjectType::Slots);

    let result = exec(&mut machine, "o x");
    assert_eq!(final_integer(result), 5);
}

#[test]
fn collection_preserves_the_survivor() {
    let mut machine = VirtualMachine::with_settings(HeapSettings {
        young_size: 16 * OS_PAGE_SIZE,
        old_size: 64 * OS_PAGE_SIZE,
        promotion_age: 2,
    });
    exec(&mut machine, "lobby _AddSlots: (| h = (| survivor <- nil |) |).").expect("setup");

    exec(
        &mut machine,
        "1000 timesRepeat: [ h survivor: 'payload-data-payload' _Clone ].",
    )
    .expect("allocation loop succeeds");

    assert!(
        machine.heap.collection_count(Generation::Young) > 0,
        "the loop must outgrow the young generation"
    );

    let result = exec(&mut machine, "h survivor");
    assert_eq!(final_string(result), "payload-data-payload");
}

#[test]
fn expect_to_fail_swallows_the_error() {
    run("[| :err | _Error: 'boom'] expectToFail: [ nil ]").expect("harness reports success");
}

#[test]
fn expect_to_not_fail_propagates_the_error() {
    let error = run("[| :err | _Error: 'boom'] expectToNotFail: [ nil ]")
        .expect_err("the block fails");
    assert_eq!(error.message, "boom");
}

#[test]
fn expect_to_fail_rejects_a_passing_block() {
    let error = run("[ 1 ] expectToFail: [ nil ]").expect_err("the block does not fail");
    assert!(error.message.contains("expected the block to fail"));
}

// ── evaluation semantics ───────────────────────────────────────────

#[test]
fn binary_sends_are_left_associative() {
    assert_eq!(final_integer(run("3 + 4 * 2")), 14);
}

#[test]
fn keyword_conditionals() {
    let result = run("(1 < 2) ifTrue: [ 'yes' ] False: [ 'no' ]");
    assert_eq!(final_string(result), "yes");
}

#[test]
fn methods_activate_with_arguments() {
    let result = run(
        "lobby _AddSlots: (| calc = (| sum: a And: b = (a + b) |) |). \
         calc sum: 20 And: 22",
    );
    assert_eq!(final_integer(result), 42);
}

#[test]
fn self_resolves_to_the_receiver() {
    let result = run(
        "lobby _AddSlots: (| o = (| x <- 3. double = (x + x). quad = (self double + self double) |) |). \
         o quad",
    );
    assert_eq!(final_integer(result), 12);
}

#[test]
fn blocks_close_over_method_locals() {
    let result = run(
        "lobby _AddSlots: (| o = (| m = (| t <- 5 | [ t + 1 ] value) |) |). \
         o m",
    );
    assert_eq!(final_integer(result), 6);
}

#[test]
fn non_local_return_unwinds_to_the_home_method() {
    let result = run(
        "lobby _AddSlots: (| o = (| early = ([ ^ 42 ] value. 7) |) |). \
         o early",
    );
    assert_eq!(final_integer(result), 42);
}

#[test]
fn missing_message_is_an_error() {
    let error = run("nil fooBarBaz").expect_err("nil has no such slot");
    assert!(error.message.contains("message not understood: fooBarBaz"));
}

// ── clone semantics ────────────────────────────────────────────────

#[test]
fn clone_copies_payload() {
    assert_eq!(final_string(run("'abc' _Clone")), "abc");
}

#[test]
fn clone_shares_the_map_and_copies_values() {
    let mut machine = VirtualMachine::new();
    exec(&mut machine, "lobby _AddSlots: (| o = (| x <- 7 |) |).").expect("setup");

    let original = exec(&mut machine, "o").expect("lookup").expect("value");
    let clone = vm::alloc::clone_object(&machine.heap, &mut machine.globals, 0, original)
        .expect("clone succeeds");

    let (original_map, clone_map) = unsafe {
        (
            original.as_ref::<Header>().map.raw(),
            clone.as_ref::<Header>().map.raw(),
        )
    };
    assert_eq!(original_map, clone_map, "a clone shares its original's map");
    assert_ne!(original.raw(), clone.raw());

    // Mutating the clone leaves the original untouched.
    let slot_values = unsafe {
        let o: &object::SlotsObject = original.as_ref();
        let c: &mut object::SlotsObject = clone.as_mut();
        c.write_value(0, Value::integer(9));
        (o.read_value(0), c.read_value(0))
    };
    assert_eq!(unsafe { slot_values.0.as_integer() }, 7);
    assert_eq!(unsafe { slot_values.1.as_integer() }, 9);
}

// ── byte array boundaries ──────────────────────────────────────────

#[test]
fn byte_at_boundaries() {
    assert_eq!(final_integer(run("'abc' at: 2")), b'c' as i64);
    run("'abc' at: 3").expect_err("index == length errors");
    run("'abc' at: 0 - 1").expect_err("negative index errors");
}

#[test]
fn byte_at_put_boundaries() {
    assert_eq!(final_string(run("'abc' at: 0 Put: 120")), "xbc");
    run("'abc' at: 0 Put: 0").expect("0 is a valid byte");
    run("'abc' at: 0 Put: 255").expect("255 is a valid byte");
    run("'abc' at: 0 Put: 256").expect_err("256 is out of range");
    run("'abc' at: 0 Put: 0 - 1").expect_err("-1 is out of range");
}

#[test]
fn copy_size_boundaries() {
    assert_eq!(final_string(run("'abc' copySize: 2")), "ab");
    run("'abc' copySize: 3").expect_err("size == length errors");
    assert_eq!(final_integer(run("('abc' copySize: 0) size")), 0);
}

// ── arrays ─────────────────────────────────────────────────────────

#[test]
fn array_primitives() {
    assert_eq!(final_integer(run("(arrayOf: 3) size")), 3);
    let result = run(
        "lobby _AddSlots: (| xs = (arrayOf: 2) |). \
         xs at: 0 Put: 'first'. \
         xs at: 1 Put: 41. \
         (xs at: 1) + 1",
    );
    assert_eq!(final_integer(result), 42);
    run("(arrayOf: 2) at: 2").expect_err("index == length errors");
}

// ── actors ─────────────────────────────────────────────────────────

#[test]
fn actor_send_enqueues_fifo() {
    let mut machine = VirtualMachine::new();
    exec(&mut machine, "lobby _AddSlots: (| a = spawnActor |).").expect("spawn");
    exec(&mut machine, "a send: 1. a send: 2. a send: nil.").expect("sends");

    let first = machine.globals.actors.dequeue(1).expect("first message");
    let second = machine.globals.actors.dequeue(1).expect("second message");
    let third = machine.globals.actors.dequeue(1).expect("third message");
    assert_eq!(unsafe { first.as_integer() }, 1);
    assert_eq!(unsafe { second.as_integer() }, 2);
    // nil is Global after boot, so it crosses without a proxy.
    assert_eq!(third.raw(), machine.globals.specials.nil.raw());
    assert!(machine.globals.actors.dequeue(1).is_none());
}

#[test]
fn local_objects_cross_domains_as_proxies() {
    let mut machine = VirtualMachine::new();
    exec(&mut machine, "lobby _AddSlots: (| a = spawnActor |).").expect("spawn");
    exec(&mut machine, "a send: (| x <- 1 |).").expect("send");

    let message = machine.globals.actors.dequeue(1).expect("message");
    assert_eq!(object_type(message), ObjectType::ActorProxy);
    let proxy: &object::ActorProxy = unsafe { message.as_ref() };
    // The proxy records the sending actor's domain.
    assert_eq!(unsafe { proxy.actor.as_integer() }, 0);
    assert_eq!(object_type(proxy.target), ObjectType::Slots);
}

// ── intrinsic wrappers ─────────────────────────────────────────────

#[test]
fn addr_info_wraps_a_resolved_host() {
    let result = run("(addrInfoForHost: '127.0.0.1' Port: 8080) port");
    assert_eq!(final_integer(result), 8080);

    let mut machine = VirtualMachine::new();
    let addresses = exec(
        &mut machine,
        "(addrInfoForHost: '127.0.0.1' Port: 80) addresses",
    )
    .expect("resolves")
    .expect("value");
    assert_eq!(object_type(addresses), ObjectType::Array);
    let array: &object::Array = unsafe { addresses.as_ref() };
    assert!(array.len() >= 1);
    let rendered = value_to_string(unsafe { array.element(0) }).expect("address string");
    assert!(rendered.contains("127.0.0.1"));
}

#[test]
fn managed_objects_finalize_when_unreachable() {
    let mut machine = VirtualMachine::with_settings(HeapSettings {
        young_size: 16 * OS_PAGE_SIZE,
        old_size: 64 * OS_PAGE_SIZE,
        promotion_age: 100,
    });
    exec(&mut machine, "managed: 424242.").expect("wrap");
    exec(&mut machine, "800 timesRepeat: [ 'junk-junk-junk' _Clone ].").expect("churn");

    assert!(
        machine.heap.collection_count(Generation::Young) > 0,
        "the churn must trigger a collection"
    );
    assert!(
        vm::take_released_resources().contains(&424242),
        "the dead wrapper's resource must be released"
    );
}

#[test]
fn managed_resource_is_readable() {
    assert_eq!(final_integer(run("(managed: 7) resource")), 7);
}
