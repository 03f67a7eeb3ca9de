//! The AST-walking evaluator.
//!
//! Frames are ordinary heap objects ([`Activation`]) whose maps carry a
//! `self` parent slot at word 0, so the lookup engine resolves implicit
//! sends against locals, arguments, and the receiver chain with no extra
//! machinery. Every Value the evaluator holds across a potential
//! allocation is pinned in a [`Rooted`] guard.

use heap::Heap;
use object::{
    lookup, Activation, Header, LookupResult, ObjectType, Selector, SelectorHash, Slot,
    SlotFlags, Value, METHOD_KIND_SCRIPT,
};
use parser::{BlockLit, Expr, ExprKind, ObjectLit, SlotDef, SlotDefKind, Span};

use crate::alloc::{
    alloc_activation, alloc_block, alloc_byte_array, alloc_map, alloc_method,
    alloc_slots_object,
};
use crate::intern::InternedSelector;
use crate::{CodeBody, Globals, Rooted};

/// The result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Completion {
    Normal(Value),
    RuntimeError { message: String, span: Span },
    /// `^ value` unwinding towards its home method activation.
    NonLocalReturn { home: Value, value: Value },
}

/// A runtime error that escaped to the top level.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.span.start)
    }
}

impl std::error::Error for RuntimeError {}

/// Propagate anything that is not a normal value.
macro_rules! try_eval {
    ($expr:expr) => {
        match $expr {
            crate::interpreter::Completion::Normal(value) => value,
            other => return other,
        }
    };
}

/// Turn a heap failure into a runtime-error completion.
macro_rules! try_heap {
    ($expr:expr, $span:expr) => {
        match $expr {
            Ok(value) => value,
            Err(error) => return crate::heap_error_completion(error, $span),
        }
    };
}

pub(crate) use try_eval;
pub(crate) use try_heap;

/// The evaluator context handed to every primitive.
pub struct Interp<'vm> {
    pub heap: &'vm Heap,
    pub globals: &'vm mut Globals,
}

impl<'vm> Interp<'vm> {
    pub fn nil(&self) -> Value {
        self.globals.specials.nil
    }

    pub fn boolean(&self, value: bool) -> Value {
        if value {
            self.globals.specials.true_obj
        } else {
            self.globals.specials.false_obj
        }
    }

    // ── entry point ────────────────────────────────────────────────

    /// Evaluate a script against the lobby. The entry activation is the
    /// home of every top-level `^`.
    pub fn eval_script(&mut self, script: &[Expr]) -> Result<Option<Value>, RuntimeError> {
        if script.is_empty() {
            return Ok(None);
        }
        let span = script[0].span;

        let entry = match self.make_entry_activation(span) {
            Completion::Normal(value) => value,
            Completion::RuntimeError { message, span } => {
                return Err(RuntimeError { message, span })
            }
            Completion::NonLocalReturn { .. } => unreachable!("no frame to return from"),
        };
        let activation = Rooted::new(self.heap, entry);

        match self.eval_body(&activation, script) {
            Completion::Normal(value) => Ok(Some(value)),
            Completion::NonLocalReturn { value, .. } => Ok(Some(value)),
            Completion::RuntimeError { message, span } => Err(RuntimeError { message, span }),
        }
    }

    fn make_entry_activation(&mut self, span: Span) -> Completion {
        let map = try_eval!(self.make_activation_map(&[], &[], false, span));
        let map = Rooted::new(self.heap, map);
        let lobby = self.globals.specials.lobby;
        let nil = self.nil();
        let actor = self.globals.current_actor;
        let frame = try_heap!(
            alloc_activation(
                self.heap,
                &mut *self.globals,
                actor,
                map.get(),
                lobby,
                nil,
                nil,
                nil,
            ),
            span
        );
        Completion::Normal(frame)
    }

    // ── statement sequences ────────────────────────────────────────

    fn eval_body(&mut self, activation: &Rooted, body: &[Expr]) -> Completion {
        let result = Rooted::new(self.heap, self.nil());
        for (index, expr) in body.iter().enumerate() {
            // SAFETY: the rooted activation is live; pc is a plain field.
            unsafe {
                activation.get().as_mut::<Activation>().pc = Value::integer(index as i64);
            }
            let value = try_eval!(self.eval_expr(activation, expr));
            result.set(value);
        }
        Completion::Normal(result.get())
    }

    // ── expressions ────────────────────────────────────────────────

    pub fn eval_expr(&mut self, activation: &Rooted, expr: &Expr) -> Completion {
        match &expr.kind {
            ExprKind::Integer(n) => Completion::Normal(Value::integer(*n)),
            ExprKind::Float(f) => Completion::Normal(Value::float(*f)),
            ExprKind::String(text) => {
                let actor = self.globals.current_actor;
                let map = self.globals.empty_map;
                let value = try_heap!(
                    alloc_byte_array(
                        self.heap,
                        &mut *self.globals,
                        actor,
                        map,
                        text.as_bytes()
                    ),
                    expr.span
                );
                Completion::Normal(value)
            }
            ExprKind::SelfRef => Completion::Normal(self.receiver_of(activation)),
            ExprKind::Message {
                receiver,
                selector,
                arguments,
            } => self.eval_message(activation, receiver.as_deref(), selector, arguments, expr.span),
            ExprKind::Object(lit) => self.eval_object_literal(lit, expr.span),
            ExprKind::Block(lit) => self.eval_block_literal(activation, lit, expr.span),
            ExprKind::Return(inner) => {
                let value = try_eval!(self.eval_expr(activation, inner));
                let home = self.method_home(activation.get());
                // SAFETY: activations in the home chain are live objects.
                let dead = unsafe { home.as_ref::<Activation>().has_returned() };
                if dead {
                    return Completion::RuntimeError {
                        message: "non-local return from an exited method".into(),
                        span: expr.span,
                    };
                }
                Completion::NonLocalReturn { home, value }
            }
        }
    }

    fn receiver_of(&self, activation: &Rooted) -> Value {
        // SAFETY: the rooted activation is a live Activation.
        unsafe { activation.get().as_ref::<Activation>().receiver }
    }

    /// The method frame a `^` in `activation` unwinds to: block frames
    /// defer to their block's captured home.
    fn method_home(&self, activation: Value) -> Value {
        // SAFETY: frames and the blocks they run are live objects.
        unsafe {
            let frame: &Activation = activation.as_ref();
            if frame.method.is_reference() {
                let header: &Header = frame.method.as_ref();
                if header.object_type() == ObjectType::Block {
                    let block: &object::Block = frame.method.as_ref();
                    return block.home;
                }
            }
        }
        activation
    }

    // ── message sends ──────────────────────────────────────────────

    fn eval_message(
        &mut self,
        activation: &Rooted,
        receiver: Option<&Expr>,
        selector: &str,
        arguments: &[Expr],
        span: Span,
    ) -> Completion {
        let (receiver_value, implicit) = match receiver {
            Some(expr) => (try_eval!(self.eval_expr(activation, expr)), false),
            None if selector.starts_with('_') => {
                // Primitive sends with no receiver act on self.
                (self.receiver_of(activation), false)
            }
            None => (activation.get(), true),
        };
        let receiver = Rooted::new(self.heap, receiver_value);

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = try_eval!(self.eval_expr(activation, argument));
            args.push(Rooted::new(self.heap, value));
        }

        self.send(&receiver, selector, &args, span, implicit)
    }

    /// Dispatch one send: primitive, slot value, method activation, or
    /// assignment.
    pub fn send(
        &mut self,
        receiver: &Rooted,
        selector: &str,
        args: &[Rooted],
        span: Span,
        implicit: bool,
    ) -> Completion {
        if selector.starts_with('_') {
            return self.call_primitive_named(selector, receiver, args, span);
        }

        let interned = try_heap!(self.intern(selector), span);
        let sel = Selector {
            name: selector.as_bytes(),
            hash: interned.hash,
        };

        // SAFETY: receiver and everything reachable from it are live.
        let result = unsafe { lookup(receiver.get(), sel, &self.globals.specials) };

        match result {
            LookupResult::Missing => Completion::RuntimeError {
                message: format!("message not understood: {selector}"),
                span,
            },
            LookupResult::Assignment {
                holder,
                value_index,
                ..
            } => {
                debug_assert_eq!(args.len(), 1, "assignment selectors take one argument");
                let value = args[0].get();
                // SAFETY: the holder came out of a live lookup walk.
                unsafe {
                    write_object_value(holder, value_index, value);
                }
                self.heap.record_store(holder, value);
                // An assignment answers the receiver of the send.
                let answer = if implicit {
                    // SAFETY: implicit receivers are activations.
                    unsafe { receiver.get().as_ref::<Activation>().receiver }
                } else {
                    receiver.get()
                };
                Completion::Normal(answer)
            }
            LookupResult::Found { slot, .. } => {
                let value = slot.value;
                if !is_method(value) {
                    return Completion::Normal(value);
                }
                let method_self = if implicit {
                    // SAFETY: implicit receivers are activations.
                    unsafe { receiver.get().as_ref::<Activation>().receiver }
                } else {
                    receiver.get()
                };

                // SAFETY: methods found by lookup are live.
                let (primitive, code) = unsafe {
                    let method: &object::Method = value.as_ref();
                    (method.is_primitive(), method.code)
                };
                if primitive {
                    // SAFETY: primitive code words are tagged integers.
                    let index = unsafe { code.as_integer() };
                    let method_self = Rooted::new(self.heap, method_self);
                    return self.call_primitive_indexed(index, &method_self, args, span);
                }
                self.activate_method(value, method_self, args, span)
            }
        }
    }

    /// Build and run a method activation.
    fn activate_method(
        &mut self,
        method_value: Value,
        receiver_value: Value,
        args: &[Rooted],
        span: Span,
    ) -> Completion {
        let method = Rooted::new(self.heap, method_value);
        let receiver = Rooted::new(self.heap, receiver_value);

        // SAFETY: the rooted method is live.
        let (argument_count, code_id, map) = unsafe {
            let m: &object::Method = method.get().as_ref();
            (m.argument_count, m.code.as_integer(), m.header.map)
        };
        if args.len() != argument_count as usize {
            return Completion::RuntimeError {
                message: format!(
                    "wrong number of arguments: expected {argument_count}, got {}",
                    args.len()
                ),
                span,
            };
        }

        let actor = self.globals.current_actor;
        let nil = self.nil();
        let frame_value = try_heap!(
            alloc_activation(
                self.heap,
                &mut *self.globals,
                actor,
                map,
                receiver.get(),
                nil,
                method.get(),
                nil,
            ),
            span
        );
        let frame = Rooted::new(self.heap, frame_value);
        self.run_frame(&frame, code_id, argument_count, args)
    }

    /// Invoke a block with arguments: the counterpart of method
    /// activation used by the block primitives.
    pub fn call_block(&mut self, block: &Rooted, args: &[Rooted], span: Span) -> Completion {
        if !is_block(block.get()) {
            return Completion::RuntimeError {
                message: "receiver is not a block".into(),
                span,
            };
        }

        // SAFETY: the rooted block is live.
        let (argument_count, code_id, map, home) = unsafe {
            let b: &object::Block = block.get().as_ref();
            (b.argument_count, b.code.as_integer(), b.header.map, b.home)
        };
        if args.len() != argument_count as usize {
            return Completion::RuntimeError {
                message: format!(
                    "wrong number of block arguments: expected {argument_count}, got {}",
                    args.len()
                ),
                span,
            };
        }

        // A block runs with its home frame's receiver as self.
        // SAFETY: the captured home frame is kept alive by the block.
        let receiver = unsafe { home.as_ref::<Activation>().receiver };

        let actor = self.globals.current_actor;
        let nil = self.nil();
        let frame_value = try_heap!(
            alloc_activation(
                self.heap,
                &mut *self.globals,
                actor,
                map,
                receiver,
                home,
                block.get(),
                nil,
            ),
            span
        );
        let frame = Rooted::new(self.heap, frame_value);
        self.run_frame(&frame, code_id, argument_count, args)
    }

    /// Shared frame body: bind arguments, run local initializers,
    /// evaluate the body, retire the frame.
    fn run_frame(
        &mut self,
        frame: &Rooted,
        code_id: i64,
        argument_count: u32,
        args: &[Rooted],
    ) -> Completion {
        for (index, arg) in args.iter().enumerate() {
            // SAFETY: the frame was sized for its map; argument words
            // start right after the fixed fields.
            unsafe {
                frame
                    .get()
                    .as_mut::<Activation>()
                    .write_value(Activation::FIXED_VALUES + index as u32, arg.get());
            }
        }

        let code = self.globals.code.get(code_id);
        for (index, (_, initializer)) in code.locals.iter().enumerate() {
            if let Some(initializer) = initializer {
                match self.eval_expr(frame, initializer) {
                    Completion::Normal(value) => {
                        // SAFETY: local words follow the argument words.
                        unsafe {
                            frame.get().as_mut::<Activation>().write_value(
                                Activation::FIXED_VALUES + argument_count + index as u32,
                                value,
                            );
                        }
                    }
                    other => {
                        // SAFETY: the rooted frame is live.
                        unsafe {
                            frame.get().as_mut::<Activation>().set_returned();
                        }
                        return other;
                    }
                }
            }
        }

        let completion = self.eval_body(frame, &code.body);

        // SAFETY: the rooted frame is live.
        unsafe {
            frame.get().as_mut::<Activation>().set_returned();
        }

        match completion {
            Completion::NonLocalReturn { home, value } if home.raw() == frame.get().raw() => {
                Completion::Normal(value)
            }
            other => other,
        }
    }

    // ── literals ───────────────────────────────────────────────────

    /// Evaluate `(| … |)`: fresh map, fresh object. Constant initializers
    /// run in declaration order; mutable slots take word indices in
    /// declaration order.
    fn eval_object_literal(&mut self, lit: &ObjectLit, span: Span) -> Completion {
        if !lit.body.is_empty() {
            return Completion::RuntimeError {
                message: "code belongs in method slots, not object literals".into(),
                span,
            };
        }

        enum Payload<'h> {
            Constant(Rooted<'h>),
            Index(u32),
        }
        let mut descriptors: Vec<(SlotFlags, u32, Rooted, Payload)> = Vec::new();
        let mut mutable_values: Vec<Rooted> = Vec::new();
        let mut mutable_count = 0u32;

        for slot in &lit.slots {
            let interned = try_heap!(self.intern(&slot.selector), slot.span);
            let name = Rooted::new(self.heap, interned.name);
            let parent_flag = if slot.is_parent {
                SlotFlags::PARENT
            } else {
                SlotFlags::NONE
            };

            match slot.kind {
                SlotDefKind::Method => {
                    let method = try_eval!(self.make_method(slot, span));
                    descriptors.push((
                        SlotFlags::CONSTANT.with(parent_flag),
                        interned.hash.regular,
                        name,
                        Payload::Constant(Rooted::new(self.heap, method)),
                    ));
                }
                SlotDefKind::Constant => {
                    let initializer = slot.value.as_ref().expect("constant slots have values");
                    let value = try_eval!(self.eval_in_fresh_frame(initializer, span));
                    descriptors.push((
                        SlotFlags::CONSTANT.with(parent_flag),
                        interned.hash.regular,
                        name,
                        Payload::Constant(Rooted::new(self.heap, value)),
                    ));
                }
                SlotDefKind::Mutable => {
                    let value = match &slot.value {
                        Some(initializer) => {
                            try_eval!(self.eval_in_fresh_frame(initializer, span))
                        }
                        None => self.nil(),
                    };
                    mutable_values.push(Rooted::new(self.heap, value));
                    descriptors.push((
                        SlotFlags::ASSIGNABLE.with(parent_flag),
                        interned.hash.regular,
                        name,
                        Payload::Index(mutable_count),
                    ));
                    mutable_count += 1;
                }
            }
        }

        let slots: Vec<Slot> = descriptors
            .iter()
            .map(|(flags, hash, name, payload)| {
                let value = match payload {
                    Payload::Constant(rooted) => rooted.get(),
                    Payload::Index(index) => Value::integer(*index as i64),
                };
                Slot::new(*flags, *hash, name.get(), value)
            })
            .collect();

        let actor = self.globals.current_actor;
        let map_map = self.globals.specials.map_map;
        let map = try_heap!(
            alloc_map(
                self.heap,
                &mut *self.globals,
                actor,
                map_map,
                &slots,
                mutable_count
            ),
            span
        );
        let map = Rooted::new(self.heap, map);

        let values: Vec<Value> = mutable_values.iter().map(|rooted| rooted.get()).collect();
        let object = try_heap!(
            alloc_slots_object(self.heap, &mut *self.globals, actor, map.get(), &values),
            span
        );
        Completion::Normal(object)
    }

    /// Slot initializers evaluate against the lobby, not the literal
    /// under construction.
    fn eval_in_fresh_frame(&mut self, expr: &Expr, span: Span) -> Completion {
        let entry = try_eval!(self.make_entry_activation(span));
        let activation = Rooted::new(self.heap, entry);
        self.eval_expr(&activation, expr)
    }

    /// Build a Method object from a method slot declaration.
    fn make_method(&mut self, slot: &SlotDef, span: Span) -> Completion {
        let Some(Expr {
            kind: ExprKind::Object(body),
            ..
        }) = &slot.value
        else {
            return Completion::RuntimeError {
                message: format!("method slot `{}` has no body", slot.selector),
                span,
            };
        };

        for local in &body.slots {
            if local.kind == SlotDefKind::Method {
                return Completion::RuntimeError {
                    message: format!(
                        "nested method slot `{}` inside `{}`",
                        local.selector, slot.selector
                    ),
                    span,
                };
            }
        }

        let argument_count = slot.parameters.len() as u32;
        let local_count = body.slots.len() as u32;

        let map = try_eval!(self.make_activation_map(&slot.parameters, &body.slots, false, span));
        let map = Rooted::new(self.heap, map);

        let code_id = self.globals.code.add(CodeBody {
            arguments: slot.parameters.clone(),
            locals: body
                .slots
                .iter()
                .map(|local| (local.selector.clone(), local.value.clone()))
                .collect(),
            body: body.body.clone(),
            span,
        });

        let actor = self.globals.current_actor;
        let method = try_heap!(
            alloc_method(
                self.heap,
                &mut *self.globals,
                actor,
                map.get(),
                Value::integer(code_id),
                argument_count,
                local_count,
                METHOD_KIND_SCRIPT,
            ),
            span
        );
        Completion::Normal(method)
    }

    fn eval_block_literal(
        &mut self,
        activation: &Rooted,
        lit: &BlockLit,
        span: Span,
    ) -> Completion {
        for local in &lit.locals {
            if local.kind == SlotDefKind::Method {
                return Completion::RuntimeError {
                    message: format!("method slot `{}` inside a block header", local.selector),
                    span,
                };
            }
        }

        let argument_count = lit.parameters.len() as u32;
        let local_count = lit.locals.len() as u32;

        let map = try_eval!(self.make_activation_map(&lit.parameters, &lit.locals, true, span));
        let map = Rooted::new(self.heap, map);

        let code_id = self.globals.code.add(CodeBody {
            arguments: lit.parameters.clone(),
            locals: lit
                .locals
                .iter()
                .map(|local| (local.selector.clone(), local.value.clone()))
                .collect(),
            body: lit.body.clone(),
            span,
        });

        let home = self.method_home(activation.get());
        let actor = self.globals.current_actor;
        let block = try_heap!(
            alloc_block(
                self.heap,
                &mut *self.globals,
                actor,
                map.get(),
                Value::integer(code_id),
                argument_count,
                local_count,
                home,
            ),
            span
        );
        Completion::Normal(block)
    }

    /// Build an activation map: a parent slot into the enclosing scope,
    /// then arguments, then locals.
    ///
    /// Method frames parent into the receiver (the `self` slot at word 0);
    /// block frames parent into the home activation through the sender
    /// word, which is what makes enclosing locals visible inside block
    /// bodies. Block maps also carry a constant parent into the block
    /// traits so block objects answer `value`.
    fn make_activation_map(
        &mut self,
        parameters: &[String],
        locals: &[SlotDef],
        for_block: bool,
        span: Span,
    ) -> Completion {
        // Intern every name up front; building the descriptor list must
        // not allocate, or earlier name reads would go stale.
        try_heap!(self.intern("self"), span);
        for parameter in parameters {
            try_heap!(self.intern(parameter), span);
        }
        for local in locals {
            try_heap!(self.intern(&local.selector), span);
        }
        if for_block {
            try_heap!(self.intern("outer"), span);
            try_heap!(self.intern(object::PARENT_NAME), span);
        }

        let table = &self.globals.intern;
        let fetch = |name: &str| table.lookup(name).expect("interned above");

        let mut slots = Vec::with_capacity(1 + parameters.len() + locals.len() + 1);
        if for_block {
            let outer_entry = fetch("outer");
            slots.push(Slot::new(
                SlotFlags::ASSIGNABLE.with(SlotFlags::PARENT),
                outer_entry.hash.regular,
                outer_entry.name,
                Value::integer(Activation::SENDER_INDEX as i64),
            ));
        } else {
            let self_entry = fetch("self");
            slots.push(Slot::new(
                SlotFlags::ASSIGNABLE.with(SlotFlags::PARENT),
                self_entry.hash.regular,
                self_entry.name,
                Value::integer(Activation::SELF_INDEX as i64),
            ));
        }

        for (index, parameter) in parameters.iter().enumerate() {
            let entry = fetch(parameter);
            slots.push(Slot::new(
                SlotFlags::ARGUMENT.with(SlotFlags::ASSIGNABLE),
                entry.hash.regular,
                entry.name,
                Value::integer((Activation::FIXED_VALUES as usize + index) as i64),
            ));
        }

        for (index, local) in locals.iter().enumerate() {
            let entry = fetch(&local.selector);
            let mut flags = SlotFlags::ASSIGNABLE;
            if local.is_parent {
                flags = flags.with(SlotFlags::PARENT);
            }
            slots.push(Slot::new(
                flags,
                entry.hash.regular,
                entry.name,
                Value::integer(
                    (Activation::FIXED_VALUES as usize + parameters.len() + index) as i64,
                ),
            ));
        }

        if for_block {
            let entry = fetch(object::PARENT_NAME);
            slots.push(Slot::new(
                SlotFlags::CONSTANT.with(SlotFlags::PARENT),
                entry.hash.regular,
                entry.name,
                self.globals.specials.block_traits,
            ));
        }

        let value_count =
            Activation::FIXED_VALUES + parameters.len() as u32 + locals.len() as u32;
        let actor = self.globals.current_actor;
        let map_map = self.globals.specials.map_map;
        let map = try_heap!(
            alloc_map(
                self.heap,
                &mut *self.globals,
                actor,
                map_map,
                &slots,
                value_count
            ),
            span
        );
        Completion::Normal(map)
    }

    // ── primitives ─────────────────────────────────────────────────

    fn call_primitive_named(
        &mut self,
        name: &str,
        receiver: &Rooted,
        args: &[Rooted],
        span: Span,
    ) -> Completion {
        match self
            .globals
            .primitives
            .iter()
            .position(|desc| desc.name == name)
        {
            Some(index) => self.call_primitive_indexed(index as i64, receiver, args, span),
            None => Completion::RuntimeError {
                message: format!("unknown primitive: {name}"),
                span,
            },
        }
    }

    fn call_primitive_indexed(
        &mut self,
        index: i64,
        receiver: &Rooted,
        args: &[Rooted],
        span: Span,
    ) -> Completion {
        let desc = self.globals.primitives[index as usize];
        if args.len() != desc.arity as usize {
            return Completion::RuntimeError {
                message: format!(
                    "{} takes {} arguments, got {}",
                    desc.name,
                    desc.arity,
                    args.len()
                ),
                span,
            };
        }
        (desc.func)(self, receiver, args, span)
    }

    // ── interning ──────────────────────────────────────────────────

    /// Get or create the interned entry for a selector name.
    pub fn intern(&mut self, name: &str) -> Result<InternedSelector, heap::HeapError> {
        if let Some(entry) = self.globals.intern.lookup(name) {
            return Ok(entry);
        }
        let hash = SelectorHash::of(name);
        let actor = self.globals.current_actor;
        let map = self.globals.empty_map;
        let bytes = alloc_byte_array(
            self.heap,
            &mut *self.globals,
            actor,
            map,
            name.as_bytes(),
        )?;
        Ok(self
            .globals
            .intern
            .insert(name, InternedSelector { hash, name: bytes }))
    }
}

/// `true` when the value is a Method object (to be activated on lookup
/// hits rather than returned).
fn is_method(value: Value) -> bool {
    if !value.is_reference() {
        return false;
    }
    // SAFETY: slot values are live objects.
    let header: &Header = unsafe { value.as_ref() };
    header.object_type() == ObjectType::Method
}

pub(crate) fn is_block(value: Value) -> bool {
    if !value.is_reference() {
        return false;
    }
    // SAFETY: checked reference.
    let header: &Header = unsafe { value.as_ref() };
    header.object_type() == ObjectType::Block
}

/// Write into a map-bearing object's inline value area.
///
/// # Safety
///
/// `holder` must be a live object with a value area and `word_index`
/// must be inside it.
pub(crate) unsafe fn write_object_value(holder: Value, word_index: u32, value: Value) {
    let header: &Header = holder.as_ref();
    let offset = object::values_offset(header.object_type())
        .expect("assignment into a variant without a value area");
    let base = holder.address() as *mut u8;
    let slot = (base.add(offset as usize) as *mut Value).add(word_index as usize);
    slot.write(value);
}
