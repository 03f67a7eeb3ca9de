//! Recursive-descent parser for Self surface syntax.
//!
//! Message precedence follows the three classic tiers: unary binds
//! tightest, then binary, then keyword. Keyword parts are collected
//! greedily into one selector (`at: i Put: v` sends `at:Put:`).

use std::iter::Peekable;

use crate::ast::{BlockLit, Expr, ExprKind, ObjectLit, SlotDef, SlotDefKind};
use crate::span::{Pos, Span};
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.span.start)
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
    last_span: Span,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Self {
        Self {
            tokens: tokens.peekable(),
            last_span: Span::point(Pos::origin()),
        }
    }

    /// Parse a whole script: statements separated by `.`, optional
    /// trailing separator.
    pub fn parse_script(&mut self) -> ParseResult<Vec<Expr>> {
        let statements = self.parse_statements_until(&TokenKind::Eof)?;
        self.expect(&TokenKind::Eof)?;
        Ok(statements)
    }

    // ── token plumbing ─────────────────────────────────────────────

    fn peek(&mut self) -> &TokenKind {
        match self.tokens.peek() {
            Some(token) => &token.kind,
            None => &TokenKind::Eof,
        }
    }

    fn peek_span(&mut self) -> Span {
        match self.tokens.peek() {
            Some(token) => token.span,
            None => self.last_span,
        }
    }

    fn advance(&mut self) -> Token {
        match self.tokens.next() {
            Some(token) => {
                self.last_span = token.span;
                token
            }
            None => Token::new(TokenKind::Eof, self.last_span),
        }
    }

    fn check(&mut self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let span = self.peek_span();
            let found = self.peek().name();
            Err(ParseError::new(
                format!("expected {}, found {found}", kind.name()),
                span,
            ))
        }
    }

    fn bail_on_error_token(&mut self) -> ParseResult<()> {
        if let TokenKind::Error(message) = self.peek() {
            let message = message.clone();
            let span = self.peek_span();
            return Err(ParseError::new(message, span));
        }
        Ok(())
    }

    // ── statements ─────────────────────────────────────────────────

    fn parse_statements_until(&mut self, end: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut statements = Vec::new();
        loop {
            self.bail_on_error_token()?;
            if self.check(end) {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.eat(&TokenKind::Dot) {
                break;
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Caret) {
            let start = self.advance().span;
            let value = self.parse_expr()?;
            let span = start.merge(value.span);
            return Ok(Expr::new(ExprKind::Return(Box::new(value)), span));
        }
        self.parse_expr()
    }

    // ── expressions, by precedence tier ────────────────────────────

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_keyword_message()
    }

    fn parse_keyword_message(&mut self) -> ParseResult<Expr> {
        // A leading keyword token is an implicit-receiver send.
        if matches!(self.peek(), TokenKind::Keyword(_)) {
            let span = self.peek_span();
            return self.parse_keyword_parts(None, span);
        }

        let receiver = self.parse_binary_message()?;
        if matches!(self.peek(), TokenKind::Keyword(_)) {
            let start = receiver.span;
            return self.parse_keyword_parts(Some(receiver), start);
        }
        Ok(receiver)
    }

    fn parse_keyword_parts(&mut self, receiver: Option<Expr>, start: Span) -> ParseResult<Expr> {
        let mut selector = String::new();
        let mut arguments = Vec::new();
        let mut span = start;

        while matches!(self.peek(), TokenKind::Keyword(_)) {
            let token = self.advance();
            let TokenKind::Keyword(part) = token.kind else {
                unreachable!("peeked a keyword");
            };
            selector.push_str(&part);
            let argument = self.parse_binary_message()?;
            span = span.merge(argument.span);
            arguments.push(argument);
        }

        Ok(Expr::new(
            ExprKind::Message {
                receiver: receiver.map(Box::new),
                selector,
                arguments,
            },
            span,
        ))
    }

    fn parse_binary_message(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary_message()?;
        loop {
            let selector = match self.peek() {
                TokenKind::Operator(op) => op.clone(),
                TokenKind::Star => "*".to_string(),
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_message()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Message {
                    receiver: Some(Box::new(left)),
                    selector,
                    arguments: vec![right],
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_unary_message(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        while matches!(self.peek(), TokenKind::Identifier(_)) {
            let token = self.advance();
            let TokenKind::Identifier(selector) = token.kind else {
                unreachable!("peeked an identifier");
            };
            let span = expr.span.merge(token.span);
            expr = Expr::new(
                ExprKind::Message {
                    receiver: Some(Box::new(expr)),
                    selector,
                    arguments: Vec::new(),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        self.bail_on_error_token()?;
        let span = self.peek_span();
        match self.peek() {
            TokenKind::Integer(_) => {
                let token = self.advance();
                let TokenKind::Integer(n) = token.kind else {
                    unreachable!();
                };
                Ok(Expr::new(ExprKind::Integer(n), token.span))
            }
            TokenKind::Float(_) => {
                let token = self.advance();
                let TokenKind::Float(f) = token.kind else {
                    unreachable!();
                };
                Ok(Expr::new(ExprKind::Float(f), token.span))
            }
            TokenKind::String(_) => {
                let token = self.advance();
                let TokenKind::String(s) = token.kind else {
                    unreachable!();
                };
                Ok(Expr::new(ExprKind::String(s), token.span))
            }
            TokenKind::SelfKw => {
                let token = self.advance();
                Ok(Expr::new(ExprKind::SelfRef, token.span))
            }
            TokenKind::Identifier(_) => {
                // A bare identifier is an implicit-receiver unary send.
                let token = self.advance();
                let TokenKind::Identifier(selector) = token.kind else {
                    unreachable!();
                };
                Ok(Expr::new(
                    ExprKind::Message {
                        receiver: None,
                        selector,
                        arguments: Vec::new(),
                    },
                    token.span,
                ))
            }
            TokenKind::LParen => self.parse_paren(),
            TokenKind::LBracket => self.parse_block(),
            other => Err(ParseError::new(
                format!("expected an expression, found {}", other.name()),
                span,
            )),
        }
    }

    /// `(| slots |)`, `()`, or a parenthesized subexpression.
    fn parse_paren(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&TokenKind::LParen)?.span;

        if self.check(&TokenKind::Pipe) {
            let (parameters, slots) = self.parse_slot_list(false)?;
            debug_assert!(parameters.is_empty());
            let body = self.parse_statements_until(&TokenKind::RParen)?;
            let end = self.expect(&TokenKind::RParen)?.span;
            return Ok(Expr::new(
                ExprKind::Object(ObjectLit { slots, body }),
                start.merge(end),
            ));
        }

        if self.check(&TokenKind::RParen) {
            let end = self.advance().span;
            return Ok(Expr::new(
                ExprKind::Object(ObjectLit {
                    slots: Vec::new(),
                    body: Vec::new(),
                }),
                start.merge(end),
            ));
        }

        let inner = self.parse_expr()?;
        let end = self.expect(&TokenKind::RParen)?.span;
        Ok(Expr::new(inner.kind, start.merge(end)))
    }

    /// `[ body ]` or `[| :args. locals | body ]`.
    fn parse_block(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&TokenKind::LBracket)?.span;

        let (parameters, locals) = if self.check(&TokenKind::Pipe) {
            self.parse_slot_list(true)?
        } else {
            (Vec::new(), Vec::new())
        };

        let body = self.parse_statements_until(&TokenKind::RBracket)?;
        let end = self.expect(&TokenKind::RBracket)?.span;

        Ok(Expr::new(
            ExprKind::Block(BlockLit {
                parameters,
                locals,
                body,
            }),
            start.merge(end),
        ))
    }

    // ── slot lists ─────────────────────────────────────────────────

    /// Parse `| entry. entry. … |`. Argument names (`:a`) are only legal
    /// in block headers.
    fn parse_slot_list(&mut self, allow_arguments: bool) -> ParseResult<(Vec<String>, Vec<SlotDef>)> {
        self.expect(&TokenKind::Pipe)?;
        let mut parameters = Vec::new();
        let mut slots = Vec::new();

        loop {
            self.bail_on_error_token()?;
            if self.eat(&TokenKind::Pipe) {
                break;
            }

            if matches!(self.peek(), TokenKind::ArgName(_)) {
                let token = self.advance();
                let TokenKind::ArgName(name) = token.kind else {
                    unreachable!();
                };
                if !allow_arguments {
                    return Err(ParseError::new(
                        "argument slots are only allowed in block headers",
                        token.span,
                    ));
                }
                parameters.push(name);
            } else {
                slots.push(self.parse_slot_def()?);
            }

            if self.eat(&TokenKind::Dot) {
                continue;
            }
            self.expect(&TokenKind::Pipe)?;
            break;
        }

        Ok((parameters, slots))
    }

    fn parse_slot_def(&mut self) -> ParseResult<SlotDef> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                let is_parent = self.eat(&TokenKind::Star);
                self.parse_slot_tail(name, Vec::new(), is_parent, span)
            }
            TokenKind::Keyword(_) => {
                let mut selector = String::new();
                let mut parameters = Vec::new();
                while matches!(self.peek(), TokenKind::Keyword(_)) {
                    let token = self.advance();
                    let TokenKind::Keyword(part) = token.kind else {
                        unreachable!();
                    };
                    selector.push_str(&part);
                    let parameter = self.expect_identifier()?;
                    parameters.push(parameter);
                }
                self.parse_slot_tail(selector, parameters, false, span)
            }
            TokenKind::Operator(op) if op != "=" => {
                self.advance();
                let parameter = self.expect_identifier()?;
                self.parse_slot_tail(op, vec![parameter], false, span)
            }
            other => Err(ParseError::new(
                format!("expected a slot declaration, found {}", other.name()),
                span,
            )),
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::new(
                format!("expected an identifier, found {}", other.name()),
                span,
            )),
        }
    }

    /// The initializer part of a slot declaration.
    fn parse_slot_tail(
        &mut self,
        selector: String,
        parameters: Vec<String>,
        is_parent: bool,
        start: Span,
    ) -> ParseResult<SlotDef> {
        let takes_arguments = !parameters.is_empty();

        // `name` with no initializer: a mutable slot starting out nil.
        if self.check(&TokenKind::Dot) || self.check(&TokenKind::Pipe) {
            if takes_arguments {
                return Err(ParseError::new(
                    format!("method slot `{selector}` requires a body"),
                    start,
                ));
            }
            return Ok(SlotDef {
                selector,
                parameters,
                kind: SlotDefKind::Mutable,
                is_parent,
                value: None,
                span: start,
            });
        }

        if self.eat(&TokenKind::Arrow) {
            if takes_arguments {
                return Err(ParseError::new(
                    format!("method slot `{selector}` cannot be assignable"),
                    start,
                ));
            }
            let value = self.parse_expr()?;
            let span = start.merge(value.span);
            return Ok(SlotDef {
                selector,
                parameters,
                kind: SlotDefKind::Mutable,
                is_parent,
                value: Some(value),
                span,
            });
        }

        // `= initializer`: constant slot, or a method when the
        // initializer is a parenthesized body containing code.
        let span = self.peek_span();
        if !matches!(self.peek(), TokenKind::Operator(op) if op == "=") {
            let found = self.peek().name();
            return Err(ParseError::new(
                format!("expected `=`, `<-`, `.` or `|` after slot name, found {found}"),
                span,
            ));
        }
        self.advance();

        if self.check(&TokenKind::LParen) {
            let (value, has_code) = self.parse_method_body()?;
            let span = start.merge(value.span);
            let kind = if has_code || takes_arguments {
                SlotDefKind::Method
            } else {
                SlotDefKind::Constant
            };
            return Ok(SlotDef {
                selector,
                parameters,
                kind,
                is_parent,
                value: Some(value),
                span,
            });
        }

        if takes_arguments {
            return Err(ParseError::new(
                format!("method slot `{selector}` requires a parenthesized body"),
                start,
            ));
        }

        let value = self.parse_expr()?;
        let span = start.merge(value.span);
        Ok(SlotDef {
            selector,
            parameters,
            kind: SlotDefKind::Constant,
            is_parent,
            value: Some(value),
            span,
        })
    }

    /// A parenthesized slot initializer: `( … )` with optional local slot
    /// list and any number of statements. Returns the object literal and
    /// whether it contained code.
    fn parse_method_body(&mut self) -> ParseResult<(Expr, bool)> {
        let start = self.expect(&TokenKind::LParen)?.span;

        let slots = if self.check(&TokenKind::Pipe) {
            let (parameters, slots) = self.parse_slot_list(false)?;
            debug_assert!(parameters.is_empty());
            slots
        } else {
            Vec::new()
        };

        let body = self.parse_statements_until(&TokenKind::RParen)?;
        let end = self.expect(&TokenKind::RParen)?.span;

        let has_code = !body.is_empty();
        Ok((
            Expr::new(
                ExprKind::Object(ObjectLit { slots, body }),
                start.merge(end),
            ),
            has_code,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Vec<Expr> {
        Parser::new(Lexer::new(source))
            .parse_script()
            .unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    fn parse_err(source: &str) -> ParseError {
        Parser::new(Lexer::new(source))
            .parse_script()
            .expect_err("expected a parse error")
    }

    #[test]
    fn parses_hello_world() {
        let exprs = parse("'hello' print.");
        assert_eq!(exprs.len(), 1);
        match &exprs[0].kind {
            ExprKind::Message {
                receiver: Some(receiver),
                selector,
                arguments,
            } => {
                assert_eq!(selector, "print");
                assert!(arguments.is_empty());
                assert!(matches!(&receiver.kind, ExprKind::String(s) if s == "hello"));
            }
            other => panic!("expected a unary send, got {other:?}"),
        }
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        // `1 double + 2 double` is `(1 double) + (2 double)`.
        let exprs = parse("1 double + 2 double");
        match &exprs[0].kind {
            ExprKind::Message {
                selector,
                receiver: Some(receiver),
                arguments,
            } => {
                assert_eq!(selector, "+");
                assert!(
                    matches!(&receiver.kind, ExprKind::Message { selector, .. } if selector == "double")
                );
                assert!(
                    matches!(&arguments[0].kind, ExprKind::Message { selector, .. } if selector == "double")
                );
            }
            other => panic!("expected binary send, got {other:?}"),
        }
    }

    #[test]
    fn keyword_parts_collect_into_one_selector() {
        let exprs = parse("a at: 1 Put: 2");
        match &exprs[0].kind {
            ExprKind::Message {
                selector,
                arguments,
                ..
            } => {
                assert_eq!(selector, "at:Put:");
                assert_eq!(arguments.len(), 2);
            }
            other => panic!("expected keyword send, got {other:?}"),
        }
    }

    #[test]
    fn implicit_receiver_sends() {
        let exprs = parse("x: 5");
        match &exprs[0].kind {
            ExprKind::Message {
                receiver,
                selector,
                arguments,
            } => {
                assert!(receiver.is_none());
                assert_eq!(selector, "x:");
                assert_eq!(arguments.len(), 1);
            }
            other => panic!("expected implicit send, got {other:?}"),
        }

        let exprs = parse("counter");
        assert!(matches!(
            &exprs[0].kind,
            ExprKind::Message {
                receiver: None,
                selector,
                ..
            } if selector == "counter"
        ));
    }

    #[test]
    fn parses_object_literal_slots() {
        let exprs = parse("(| x <- 0. name = 'anon'. p* = q |)");
        match &exprs[0].kind {
            ExprKind::Object(object) => {
                assert_eq!(object.slots.len(), 3);
                assert!(object.body.is_empty());

                assert_eq!(object.slots[0].selector, "x");
                assert_eq!(object.slots[0].kind, SlotDefKind::Mutable);
                assert!(!object.slots[0].is_parent);

                assert_eq!(object.slots[1].selector, "name");
                assert_eq!(object.slots[1].kind, SlotDefKind::Constant);

                assert_eq!(object.slots[2].selector, "p");
                assert!(object.slots[2].is_parent);
            }
            other => panic!("expected object literal, got {other:?}"),
        }
    }

    #[test]
    fn parenthesized_initializer_with_code_is_a_method() {
        let exprs = parse("(| double = (x + x). zero = 0 |)");
        match &exprs[0].kind {
            ExprKind::Object(object) => {
                assert_eq!(object.slots[0].kind, SlotDefKind::Method);
                assert_eq!(object.slots[1].kind, SlotDefKind::Constant);
            }
            other => panic!("expected object literal, got {other:?}"),
        }
    }

    #[test]
    fn keyword_method_slot_collects_parameters() {
        let exprs = parse("(| at: i Put: v = (i + v) |)");
        match &exprs[0].kind {
            ExprKind::Object(object) => {
                let slot = &object.slots[0];
                assert_eq!(slot.selector, "at:Put:");
                assert_eq!(slot.parameters, vec!["i", "v"]);
                assert_eq!(slot.kind, SlotDefKind::Method);
            }
            other => panic!("expected object literal, got {other:?}"),
        }
    }

    #[test]
    fn parses_blocks() {
        let exprs = parse("[| :err. count | count ]");
        match &exprs[0].kind {
            ExprKind::Block(block) => {
                assert_eq!(block.parameters, vec!["err"]);
                assert_eq!(block.locals.len(), 1);
                assert_eq!(block.body.len(), 1);
            }
            other => panic!("expected block, got {other:?}"),
        }

        let exprs = parse("[ 1 ]");
        match &exprs[0].kind {
            ExprKind::Block(block) => {
                assert!(block.parameters.is_empty());
                assert_eq!(block.body.len(), 1);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn parses_return() {
        let exprs = parse("[ ^ 5 ]");
        match &exprs[0].kind {
            ExprKind::Block(block) => {
                assert!(matches!(&block.body[0].kind, ExprKind::Return(_)));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn grouping_parens_pass_through() {
        let exprs = parse("(1 + 2) * 3");
        match &exprs[0].kind {
            ExprKind::Message { selector, .. } => assert_eq!(selector, "*"),
            other => panic!("expected binary send, got {other:?}"),
        }
    }

    #[test]
    fn statements_are_dot_separated() {
        let exprs = parse("1. 2. 3.");
        assert_eq!(exprs.len(), 3);
        let exprs = parse("1. 2. 3");
        assert_eq!(exprs.len(), 3);
    }

    #[test]
    fn reports_error_position() {
        let error = parse_err("1 +");
        assert_eq!(error.span.start.line, 1);
        assert!(error.message.contains("expected an expression"));
    }

    #[test]
    fn rejects_argument_slots_outside_blocks() {
        let error = parse_err("(| :x | )");
        assert!(error.message.contains("block headers"));
    }
}
