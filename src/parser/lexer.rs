//! GCode Lexer
//!
//! Fast, simple tokenization of GCode lines.
//! Focus: split a line once into words, flags, keywords and comments so the
//! interpreter never has to re-scan raw text.

/// Token types in GCode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Address letter followed by a number, like "G1", "X-10.5"
    Word,
    /// Bare address letter without a number, like the "X" in "G28 X"
    Flag,
    /// Multi-letter identifier, like "WAIT"
    Keyword,
    /// Comment (semicolon or parenthetical)
    Comment,
}

/// A token with its text content
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

/// Tokenize a line of GCode into tokens
///
/// Letters immediately followed by letters form a keyword; a letter followed
/// by numeric characters forms a word. Anything else that is not whitespace
/// or a comment is skipped.
pub fn tokenize_line(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some((start_idx, ch)) = chars.next() {
        match ch {
            // Skip whitespace
            ' ' | '\t' | '\r' | '\n' => continue,

            // Semicolon comment: consume rest of line
            ';' => {
                let text = line[start_idx..].to_string();
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text,
                });
                break; // Rest of line is comment
            }

            // Parenthetical comment
            '(' => {
                let mut end_idx = line.len();

                for (idx, ch) in chars.by_ref() {
                    if ch == ')' {
                        end_idx = idx + 1;
                        break;
                    }
                }

                let text = line[start_idx..end_idx].to_string();
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text,
                });
            }

            c if c.is_ascii_alphabetic() => {
                let mut end_idx = start_idx + 1;

                let keyword = matches!(chars.peek(), Some(&(_, next)) if next.is_ascii_alphabetic());

                if keyword {
                    while let Some(&(idx, next_ch)) = chars.peek() {
                        if next_ch.is_ascii_alphabetic() {
                            end_idx = idx + 1;
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token {
                        kind: TokenKind::Keyword,
                        text: line[start_idx..end_idx].to_ascii_uppercase(),
                    });
                    continue;
                }

                // Consume the numeric part: digits, dots, signs, and blanks
                // between the address and its value ("X -10" is one word)
                let mut seen_digit = false;
                while let Some(&(idx, next_ch)) = chars.peek() {
                    if next_ch.is_ascii_digit() {
                        seen_digit = true;
                        end_idx = idx + 1;
                        chars.next();
                    } else if next_ch == '.' || next_ch == '-' || next_ch == '+' {
                        end_idx = idx + 1;
                        chars.next();
                    } else if (next_ch == ' ' || next_ch == '\t') && end_idx == start_idx + 1 {
                        if !starts_number(&line[idx..]) {
                            break;
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }

                let text: String = line[start_idx..end_idx]
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_uppercase();

                let kind = if end_idx == start_idx + 1 && !seen_digit {
                    TokenKind::Flag
                } else {
                    TokenKind::Word
                };

                tokens.push(Token { kind, text });
            }

            // Skip other characters (malformed input, macro syntax)
            _ => continue,
        }
    }

    tokens
}

/// Whether the text after leading blanks begins a numeric value
fn starts_number(rest: &str) -> bool {
    rest.trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
}
