//! Abstract syntax tree for Self expressions.
//!
//! The parser produces a list of [`Expr`] nodes, one per top-level
//! statement. Each node carries a [`Span`] so downstream consumers
//! (error reporting, the AST dump) always know the exact source location.

use crate::span::Span;

/// A single expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The different forms a Self expression can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal.
    Integer(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal.
    String(String),

    /// `self`.
    SelfRef,

    /// A message send.
    ///
    /// `receiver` is `None` for implicit-receiver sends (a bare
    /// identifier or a leading keyword message), which the evaluator
    /// resolves against the current activation. The three precedence
    /// tiers (unary, binary, keyword) all normalize to this node; the
    /// tier is recoverable from the selector shape.
    Message {
        receiver: Option<Box<Expr>>,
        selector: String,
        arguments: Vec<Expr>,
    },

    /// An object literal: `(| slots |)` or a parenthesized method body.
    Object(ObjectLit),

    /// A block literal: `[ body ]` or `[| :args. locals | body ]`.
    Block(BlockLit),

    /// Non-local return: `^ expr`.
    Return(Box<Expr>),
}

/// An object literal or method body: slot list plus code.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLit {
    pub slots: Vec<SlotDef>,
    pub body: Vec<Expr>,
}

/// A block literal.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLit {
    /// Argument names, in declaration order (`:a. :b`).
    pub parameters: Vec<String>,
    /// Local data slots.
    pub locals: Vec<SlotDef>,
    pub body: Vec<Expr>,
}

/// How a slot was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDefKind {
    /// `name = value` — read-only.
    Constant,
    /// `name` or `name <- value` — read-write, with an implicit setter.
    Mutable,
    /// `name = ( … )` / `key: a = ( … )` — a method body.
    Method,
}

/// A single slot declaration inside `(| … |)` or a block header.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDef {
    /// The selector this slot answers to (`x`, `at:Put:`, `+`).
    pub selector: String,
    /// Argument names for keyword/binary method slots.
    pub parameters: Vec<String>,
    pub kind: SlotDefKind,
    /// `name*` — this slot contributes to the lookup chain.
    pub is_parent: bool,
    /// Initializer; `None` means the slot starts out nil.
    pub value: Option<Expr>,
    pub span: Span,
}

/// Render an indented tree of the AST, one line per node.
pub fn dump(exprs: &[Expr]) -> String {
    let mut out = String::new();
    for (index, expr) in exprs.iter().enumerate() {
        dump_expr(&mut out, expr, 0, &format!("[{index}]"));
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize, label: &str) {
    indent(out, depth);
    match &expr.kind {
        ExprKind::Integer(n) => out.push_str(&format!("{label} integer {n}\n")),
        ExprKind::Float(f) => out.push_str(&format!("{label} float {f}\n")),
        ExprKind::String(s) => out.push_str(&format!("{label} string {s:?}\n")),
        ExprKind::SelfRef => out.push_str(&format!("{label} self\n")),
        ExprKind::Message {
            receiver,
            selector,
            arguments,
        } => {
            out.push_str(&format!("{label} send `{selector}`\n"));
            if let Some(receiver) = receiver {
                dump_expr(out, receiver, depth + 1, "receiver:");
            } else {
                indent(out, depth + 1);
                out.push_str("receiver: <implicit>\n");
            }
            for (index, argument) in arguments.iter().enumerate() {
                dump_expr(out, argument, depth + 1, &format!("arg[{index}]:"));
            }
        }
        ExprKind::Object(object) => {
            out.push_str(&format!(
                "{label} object ({} slots, {} exprs)\n",
                object.slots.len(),
                object.body.len()
            ));
            for slot in &object.slots {
                dump_slot(out, slot, depth + 1);
            }
            for (index, expr) in object.body.iter().enumerate() {
                dump_expr(out, expr, depth + 1, &format!("body[{index}]:"));
            }
        }
        ExprKind::Block(block) => {
            out.push_str(&format!(
                "{label} block ({} args, {} locals, {} exprs)\n",
                block.parameters.len(),
                block.locals.len(),
                block.body.len()
            ));
            for parameter in &block.parameters {
                indent(out, depth + 1);
                out.push_str(&format!("arg :{parameter}\n"));
            }
            for slot in &block.locals {
                dump_slot(out, slot, depth + 1);
            }
            for (index, expr) in block.body.iter().enumerate() {
                dump_expr(out, expr, depth + 1, &format!("body[{index}]:"));
            }
        }
        ExprKind::Return(inner) => {
            out.push_str(&format!("{label} return\n"));
            dump_expr(out, inner, depth + 1, "value:");
        }
    }
}

fn dump_slot(out: &mut String, slot: &SlotDef, depth: usize) {
    indent(out, depth);
    let kind = match slot.kind {
        SlotDefKind::Constant => "constant",
        SlotDefKind::Mutable => "mutable",
        SlotDefKind::Method => "method",
    };
    let parent = if slot.is_parent { " parent" } else { "" };
    out.push_str(&format!("slot `{}` {kind}{parent}\n", slot.selector));
    if let Some(value) = &slot.value {
        dump_expr(out, value, depth + 1, "init:");
    }
}
