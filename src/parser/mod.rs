//! GCode Parser
//!
//! Clean, fast parsing of GCode with minimal allocations.
//! Focused solely on tokenization and block construction.

pub mod ast;
pub mod lexer;

pub use ast::{Block, Comment, ParsedLine, Word};
pub use lexer::{Token, TokenKind, tokenize_line};

/// Parse a single line of GCode into structured data
///
/// This is the main entry point for parsing. It tokenizes the line
/// and constructs a simple block representation.
pub fn parse_line(line: &str) -> ParsedLine {
    let tokens = lexer::tokenize_line(line);
    ast::tokens_to_parsed_line(tokens)
}
