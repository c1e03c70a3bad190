//! Scanner for the Pebble scripting language (spec §4.4).

pub mod lexer;
pub mod token;

pub use lexer::{Lexer, Scanner};
pub use token::{Span, Token, TokenKind};
