/// Token types produced by the Self lexer.
use crate::span::Span;

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal, e.g. `42`.
    Integer(i64),
    /// Floating-point literal, e.g. `3.14`.
    Float(f64),
    /// String literal (contents without surrounding quotes), e.g. `'hello'`.
    String(std::string::String),

    /// A lowercase- or underscore-starting identifier, e.g. `factorial`,
    /// `x`, `_StringPrint`.
    Identifier(std::string::String),
    /// A keyword (identifier + colon), e.g. `at:`, `Put:`, `expectToFail:`.
    Keyword(std::string::String),
    /// An argument name (colon + identifier), e.g. `:name`.
    ArgName(std::string::String),

    /// The reserved word `self`.
    SelfKw,

    /// A binary operator composed of op-chars, e.g. `+`, `<`, `=`.
    Operator(std::string::String),
    /// Mutable-slot initializer `<-`.
    Arrow,

    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `|` — slot list delimiter.
    Pipe,
    /// `.` — expression separator / slot separator.
    Dot,
    /// `^` — return operator.
    Caret,
    /// `*` — parent-slot suffix (also a binary operator in expressions).
    Star,

    /// End of input.
    Eof,
    /// An unrecognized character or malformed token.
    Error(std::string::String),
}

impl TokenKind {
    /// Human-readable name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Identifier(_) => "identifier",
            Self::Keyword(_) => "keyword",
            Self::ArgName(_) => "argument name",
            Self::SelfKw => "`self`",
            Self::Operator(_) => "operator",
            Self::Arrow => "`<-`",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::Pipe => "`|`",
            Self::Dot => "`.`",
            Self::Caret => "`^`",
            Self::Star => "`*`",
            Self::Eof => "end of input",
            Self::Error(_) => "error",
        }
    }
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
