//! Lexer for Self surface syntax.
//!
//! Comments are `"…"` (double quotes, non-nesting), strings are `'…'`
//! with backslash escapes. The lexer implements `Iterator` over
//! [`Token`]s and tracks byte offset, line, and column for every token.

use crate::span::{Pos, Span};
use crate::token::{Token, TokenKind};

/// Characters that may appear in Self binary operators.
///
/// `|` is always the slot-list pipe, `^` the return operator, and `*`
/// lexes as its own token because it doubles as the parent-slot suffix.
fn is_op_char(c: u8) -> bool {
    matches!(
        c,
        b'+' | b'-' | b'/' | b'<' | b'>' | b'=' | b'~' | b'&' | b'!' | b'?' | b'%' | b','
    )
}

fn is_word_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_word_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: Pos,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: Pos::origin(),
            finished: false,
        }
    }

    fn pos(&self) -> Pos {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos.offset + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos.step(byte);
        Some(byte)
    }

    /// Skip whitespace and `"…"` comments.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'"') => {
                    let start = self.pos();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some(b'"') => break,
                            Some(_) => {}
                            None => {
                                return Some(Token::new(
                                    TokenKind::Error("unterminated comment".into()),
                                    Span::new(start, self.pos()),
                                ));
                            }
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn lex_number(&mut self) -> TokenKind {
        let start = self.pos.offset;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_float = false;
        if self.peek() == Some(b'.')
            && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit())
        {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = core::str::from_utf8(&self.src[start..self.pos.offset]).expect("ascii digits");
        if is_float {
            match text.parse::<f64>() {
                Ok(f) => TokenKind::Float(f),
                Err(_) => TokenKind::Error(format!("malformed float literal `{text}`")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Integer(n),
                Err(_) => TokenKind::Error(format!("integer literal out of range `{text}`")),
            }
        }
    }

    fn lex_string(&mut self) -> TokenKind {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(b'\'') => return TokenKind::String(text),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => text.push('\n'),
                    Some(b't') => text.push('\t'),
                    Some(b'\\') => text.push('\\'),
                    Some(b'\'') => text.push('\''),
                    Some(other) => {
                        return TokenKind::Error(format!(
                            "unknown string escape `\\{}`",
                            other as char
                        ));
                    }
                    None => return TokenKind::Error("unterminated string".into()),
                },
                Some(other) => text.push(other as char),
                None => return TokenKind::Error("unterminated string".into()),
            }
        }
    }

    fn lex_word(&mut self) -> TokenKind {
        let start = self.pos.offset;
        while matches!(self.peek(), Some(c) if is_word_char(c)) {
            self.bump();
        }
        let word = core::str::from_utf8(&self.src[start..self.pos.offset])
            .expect("word chars are ascii")
            .to_string();
        if self.peek() == Some(b':') && self.peek_at(1) != Some(b'=') {
            self.bump();
            return TokenKind::Keyword(format!("{word}:"));
        }
        if word == "self" {
            return TokenKind::SelfKw;
        }
        TokenKind::Identifier(word)
    }

    fn lex_operator(&mut self) -> TokenKind {
        let start = self.pos.offset;
        while matches!(self.peek(), Some(c) if is_op_char(c)) {
            self.bump();
        }
        let op = core::str::from_utf8(&self.src[start..self.pos.offset])
            .expect("operator chars are ascii")
            .to_string();
        if op == "<-" {
            TokenKind::Arrow
        } else {
            TokenKind::Operator(op)
        }
    }

    fn next_token(&mut self) -> Token {
        if let Some(error) = self.skip_trivia() {
            return error;
        }

        let start = self.pos();
        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) if c.is_ascii_digit() => self.lex_number(),
            Some(b'\'') => self.lex_string(),
            Some(c) if is_word_start(c) => self.lex_word(),
            Some(b':') => {
                self.bump();
                if matches!(self.peek(), Some(c) if is_word_start(c)) {
                    match self.lex_word() {
                        TokenKind::Identifier(name) => TokenKind::ArgName(name),
                        other => TokenKind::Error(format!(
                            "expected argument name after `:`, found {}",
                            other.name()
                        )),
                    }
                } else {
                    TokenKind::Error("expected argument name after `:`".into())
                }
            }
            Some(b'(') => {
                self.bump();
                TokenKind::LParen
            }
            Some(b')') => {
                self.bump();
                TokenKind::RParen
            }
            Some(b'[') => {
                self.bump();
                TokenKind::LBracket
            }
            Some(b']') => {
                self.bump();
                TokenKind::RBracket
            }
            Some(b'|') => {
                self.bump();
                TokenKind::Pipe
            }
            Some(b'.') => {
                self.bump();
                TokenKind::Dot
            }
            Some(b'^') => {
                self.bump();
                TokenKind::Caret
            }
            Some(b'*') => {
                self.bump();
                TokenKind::Star
            }
            Some(c) if is_op_char(c) => self.lex_operator(),
            Some(other) => {
                self.bump();
                TokenKind::Error(format!("unexpected character `{}`", other as char))
            }
        };

        Token::new(kind, Span::new(start, self.pos()))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.is_eof() {
            self.finished = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_hello_world() {
        assert_eq!(
            kinds("'hello' print."),
            vec![
                TokenKind::String("hello".into()),
                TokenKind::Identifier("print".into()),
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_argnames() {
        assert_eq!(
            kinds("at: i Put: v"),
            vec![
                TokenKind::Keyword("at:".into()),
                TokenKind::Identifier("i".into()),
                TokenKind::Keyword("Put:".into()),
                TokenKind::Identifier("v".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("[| :err | err ]"),
            vec![
                TokenKind::LBracket,
                TokenKind::Pipe,
                TokenKind::ArgName("err".into()),
                TokenKind::Pipe,
                TokenKind::Identifier("err".into()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_primitive_selectors() {
        assert_eq!(
            kinds("_ByteAt: 0"),
            vec![
                TokenKind::Keyword("_ByteAt:".into()),
                TokenKind::Integer(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_slot_syntax() {
        assert_eq!(
            kinds("(| x <- 0. p* = y |)"),
            vec![
                TokenKind::LParen,
                TokenKind::Pipe,
                TokenKind::Identifier("x".into()),
                TokenKind::Arrow,
                TokenKind::Integer(0),
                TokenKind::Dot,
                TokenKind::Identifier("p".into()),
                TokenKind::Star,
                TokenKind::Operator("=".into()),
                TokenKind::Identifier("y".into()),
                TokenKind::Pipe,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(
            kinds("42 3.5"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Float(3.5),
                TokenKind::Eof,
            ]
        );
        // A trailing dot is an expression separator, not a float.
        assert_eq!(
            kinds("42."),
            vec![TokenKind::Integer(42), TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("\"a greeting\" 'hi' print"),
            vec![
                TokenKind::String("hi".into()),
                TokenKind::Identifier("print".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds("'a\\nb'"),
            vec![TokenKind::String("a\nb".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens: Vec<Token> = Lexer::new("x.\ny").collect();
        assert_eq!(tokens[0].span.start.line, 1);
        assert_eq!(tokens[0].span.start.column, 1);
        assert_eq!(tokens[2].span.start.line, 2);
        assert_eq!(tokens[2].span.start.column, 1);
    }

    #[test]
    fn reports_unterminated_string() {
        let kinds = kinds("'oops");
        assert!(matches!(kinds[0], TokenKind::Error(_)));
    }
}
