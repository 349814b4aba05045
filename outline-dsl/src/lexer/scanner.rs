//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

// ============================================================================
// LEXER IMPLEMENTATION
// ============================================================================

/// Lexer for the body of an inline expression.
///
/// The lexer may cover only a slice of the bullet source; spans are always
/// absolute byte offsets into the full source so that UI decorations can be
/// anchored without translation.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    base: usize,
    end: usize,
    line: usize,
    column: usize,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over the whole source.
    pub fn new(source: &'a str) -> Self {
        Self::with_range(source, 0, source.len())
    }

    /// Create a lexer over `source[start..end]`.
    pub fn with_range(source: &'a str, start: usize, end: usize) -> Self {
        let end = end.min(source.len());
        let start = start.min(end);
        let (line, column) = position_at(source, start);
        Self {
            source,
            chars: source[start..end].char_indices().peekable(),
            base: start,
            end,
            line,
            column,
            pos: start,
        }
    }

    /// Tokenize the covered range into a vector of tokens ending in `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Get the next token from the source.
    fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '{' => {
                    self.advance();
                    TokenKind::LBrace
                }
                '}' => {
                    self.advance();
                    TokenKind::RBrace
                }
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                ':' => {
                    self.advance();
                    TokenKind::Colon
                }
                '.' => {
                    self.advance();
                    TokenKind::Dot
                }
                '+' => {
                    self.advance();
                    TokenKind::Plus
                }
                '-' => {
                    self.advance();
                    TokenKind::Minus
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '/' => {
                    self.advance();
                    TokenKind::Slash
                }

                '#' => self.scan_id_ref(),

                '"' => self.scan_string(),

                c if c.is_ascii_digit() => self.scan_number(),

                c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

                c => {
                    self.advance();
                    TokenKind::Error(format!("Unexpected character: {}", c))
                }
            },
        };

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    /// Scan an identifier.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        TokenKind::Identifier(self.source[start..self.pos].to_string())
    }

    /// Scan a `#[id]` transclusion token.
    fn scan_id_ref(&mut self) -> TokenKind {
        self.advance(); // consume '#'
        if self.peek_char() != Some('[') {
            return TokenKind::Error("Expected '[' after '#'".to_string());
        }
        self.advance();

        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_id_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        let id = self.source[start..self.pos].to_string();

        match self.peek_char() {
            Some(']') if !id.is_empty() => {
                self.advance();
                TokenKind::IdRef(id)
            }
            Some(']') => {
                self.advance();
                TokenKind::Error("Empty node reference".to_string())
            }
            Some(c) => TokenKind::Error(format!("Invalid character in node reference: {}", c)),
            None => TokenKind::Error("Unterminated node reference".to_string()),
        }
    }

    /// Scan a string literal with escape sequences.
    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None => return TokenKind::Error("Unterminated string".to_string()),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('\\') => {
                            self.advance();
                            value.push('\\');
                        }
                        Some('"') => {
                            self.advance();
                            value.push('"');
                        }
                        _ => value.push('\\'),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        TokenKind::String(value)
    }

    /// Scan `digits ("." digits)?`. A dot not followed by a digit is left
    /// for field access.
    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;

        self.consume_digits();
        if self.peek_char() == Some('.')
            && self
                .peek_next_char()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            self.advance();
            self.consume_digits();
        }

        let text = &self.source[start..self.pos];
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("Invalid number: {}", text)),
        }
    }

    fn consume_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..self.end].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = self.base + i + c.len_utf8();
            self.column += 1;
            Some(c)
        } else {
            None
        }
    }
}

/// Characters allowed inside `#[...]`.
pub fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/')
}

/// 1-based line and column of a byte offset.
pub fn position_at(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lexer_delimiters_and_operators() {
        assert_eq!(
            kinds("{ } ( ) , : . + - * /"),
            vec![
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Dot,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_number_vs_field_access() {
        assert_eq!(
            kinds("1.5 2.lat"),
            vec![
                TokenKind::Number(1.5),
                TokenKind::Number(2.0),
                TokenKind::Dot,
                TokenKind::Identifier("lat".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_id_ref() {
        assert_eq!(
            kinds("#[a-1/b_2]"),
            vec![TokenKind::IdRef("a-1/b_2".into()), TokenKind::Eof]
        );
        assert!(matches!(kinds("#[]")[0], TokenKind::Error(_)));
        assert!(matches!(kinds("#[ab")[0], TokenKind::Error(_)));
        assert!(matches!(kinds("#ab")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_lexer_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokenKind::String("a\"b\n".into()), TokenKind::Eof]
        );
        assert!(matches!(kinds("\"open")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_lexer_spans_are_absolute() {
        let source = "km: {Distance(a)}";
        let tokens = Lexer::with_range(source, 5, 16).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Identifier("Distance".into()));
        assert_eq!(tokens[0].span.start, 5);
        assert_eq!(tokens[0].span.end, 13);
        assert_eq!(tokens[0].span.column, 6);
        assert_eq!(tokens.last().map(|t| t.span.start), Some(16));
    }

    #[test]
    fn test_position_at_counts_lines() {
        assert_eq!(position_at("ab\ncd", 0), (1, 1));
        assert_eq!(position_at("ab\ncd", 4), (2, 2));
    }
}
