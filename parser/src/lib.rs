pub mod ast;
mod lexer;
mod parser;
mod span;
mod token;

pub use ast::{dump, BlockLit, Expr, ExprKind, ObjectLit, SlotDef, SlotDefKind};
pub use lexer::Lexer;
pub use parser::{ParseError, Parser};
pub use span::{Pos, Span};
pub use token::{Token, TokenKind};

/// Parse a complete source text into its top-level statements.
pub fn parse_source(source: &str) -> Result<Vec<Expr>, ParseError> {
    Parser::new(Lexer::new(source)).parse_script()
}
