//! Abstract Syntax Tree for GCode
//!
//! Clean, minimal types representing a parsed GCode line.
//! No machine state here - pure data representation.

use crate::parser::lexer::{Token, TokenKind};

/// A parsed line of GCode
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// A block of words with optional comment
    Block(Block),
    /// A comment-only line
    Comment(Comment),
    /// An empty or whitespace-only line
    Empty,
}

/// One program block: every word on the line, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    /// Address words with a numeric value (e.g., G1, X10)
    pub words: Vec<Word>,
    /// Address letters given without a value (e.g., the X in "G28 X")
    pub flags: Vec<char>,
    /// Multi-letter identifiers (e.g., WAIT)
    pub keywords: Vec<String>,
    /// Tokens whose numeric part did not parse; kept for verification
    pub malformed: Vec<String>,
    /// Optional trailing or inline comment
    pub comment: Option<Comment>,
}

/// An address word like "G1" or "X-10.5"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    /// Uppercase address letter
    pub letter: char,
    pub value: f64,
}

/// A comment (semicolon or parenthetical)
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Comment text (without the delimiters)
    pub text: String,
}

impl Word {
    /// True when this word is `letter` with the integral code `code` (G0 == G00).
    pub fn is(&self, letter: char, code: u32) -> bool {
        self.letter == letter && (self.value - f64::from(code)).abs() < 1e-9
    }

    /// Integral code number, when the value is a whole number
    pub fn code(&self) -> Option<u32> {
        if self.value >= 0.0 && self.value.fract() == 0.0 && self.value <= f64::from(u32::MAX) {
            Some(self.value as u32)
        } else {
            None
        }
    }

    /// Canonical command name, e.g. "G0" for "G00", "M6" for "M06"
    pub fn name(&self) -> String {
        match self.code() {
            Some(code) => format!("{}{}", self.letter, code),
            None => format!("{}{}", self.letter, self.value),
        }
    }
}

impl Block {
    /// Whether the block carries `letter` + `code` anywhere on the line
    pub fn has(&self, letter: char, code: u32) -> bool {
        self.words.iter().any(|w| w.is(letter, code))
    }

    /// Last value given for an address letter (later words win)
    pub fn value(&self, letter: char) -> Option<f64> {
        self.words
            .iter()
            .rev()
            .find(|w| w.letter == letter)
            .map(|w| w.value)
    }

    /// Whether a bare flag was given for `letter`
    pub fn has_flag(&self, letter: char) -> bool {
        self.flags.contains(&letter)
    }

    /// Whether a keyword (case-insensitive) appears on the line
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    /// Command words (G, M, T) in source order
    pub fn commands(&self) -> impl Iterator<Item = &Word> {
        self.words
            .iter()
            .filter(|w| matches!(w.letter, 'G' | 'M' | 'T'))
    }
}

/// Convert tokens into a parsed line
pub fn tokens_to_parsed_line(tokens: Vec<Token>) -> ParsedLine {
    if tokens.is_empty() {
        return ParsedLine::Empty;
    }

    if tokens.iter().all(|t| t.kind == TokenKind::Comment) {
        return ParsedLine::Comment(Comment {
            text: tokens
                .iter()
                .map(|t| extract_comment_text(&t.text))
                .collect::<Vec<_>>()
                .join(" "),
        });
    }

    let mut block = Block::default();

    for token in tokens {
        match token.kind {
            TokenKind::Word => match parse_word_token(&token.text) {
                Some(word) => block.words.push(word),
                None => block.malformed.push(token.text),
            },
            TokenKind::Flag => {
                if let Some(letter) = token.text.chars().next() {
                    block.flags.push(letter.to_ascii_uppercase());
                }
            }
            TokenKind::Keyword => block.keywords.push(token.text),
            TokenKind::Comment => {
                // Keep the first comment; inline comments rarely repeat
                if block.comment.is_none() {
                    block.comment = Some(Comment {
                        text: extract_comment_text(&token.text),
                    });
                }
            }
        }
    }

    ParsedLine::Block(block)
}

/// Parse a word token like "X10.5" into a Word
fn parse_word_token(text: &str) -> Option<Word> {
    if text.len() < 2 {
        return None;
    }

    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();

    if !letter.is_ascii_alphabetic() {
        return None;
    }

    let value = chars.as_str().parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(Word { letter, value })
}

/// Extract comment text, removing delimiters
fn extract_comment_text(text: &str) -> String {
    if let Some(stripped) = text.strip_prefix(';') {
        stripped.to_string()
    } else if let Some(inner) = text.strip_prefix('(') {
        inner.strip_suffix(')').unwrap_or(inner).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize_line;

    #[test]
    fn test_parse_word_token() {
        let word = parse_word_token("X10.5").unwrap();
        assert_eq!(word.letter, 'X');
        assert_eq!(word.value, 10.5);
        assert!(parse_word_token("X1.2.3").is_none());
        assert!(parse_word_token("X-").is_none());
    }

    #[test]
    fn test_extract_semicolon_comment() {
        let text = extract_comment_text("; this is a comment");
        assert_eq!(text, " this is a comment");
    }

    #[test]
    fn test_extract_paren_comment() {
        assert_eq!(extract_comment_text("(this is a comment)"), "this is a comment");
        assert_eq!(extract_comment_text("(unterminated"), "unterminated");
    }

    #[test]
    fn test_word_codes() {
        let g00 = Word { letter: 'G', value: 0.0 };
        assert!(g00.is('G', 0));
        assert_eq!(g00.name(), "G0");

        let g54_1 = Word { letter: 'G', value: 54.1 };
        assert!(!g54_1.is('G', 54));
        assert_eq!(g54_1.code(), None);
    }

    #[test]
    fn test_malformed_numbers_are_set_aside() {
        let parsed = tokens_to_parsed_line(tokenize_line("G1 X1.2.3 Y4"));
        let ParsedLine::Block(block) = parsed else {
            panic!("Expected block");
        };
        assert_eq!(block.words.len(), 2);
        assert_eq!(block.malformed, vec!["X1.2.3".to_string()]);
        assert_eq!(block.value('Y'), Some(4.0));
        assert_eq!(block.value('X'), None);
    }

    #[test]
    fn test_keyword_only_line_is_a_block() {
        let parsed = tokens_to_parsed_line(tokenize_line("WAIT"));
        let ParsedLine::Block(block) = parsed else {
            panic!("Expected block");
        };
        assert!(block.has_keyword("wait"));
        assert!(block.words.is_empty());
    }
}
