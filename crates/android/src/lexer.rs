//! Tokenizer for the Gradle Kotlin DSL subset used by build descriptors

use crate::error::{Location, ParseError};
use std::fmt;

/// Token kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    True,
    False,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Eq,
    /// A line break; statements end at one
    Newline,
    Semicolon,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier `{}`", name),
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            TokenKind::Int(i) => write!(f, "integer {}", i),
            TokenKind::True => f.write_str("`true`"),
            TokenKind::False => f.write_str("`false`"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Eq => f.write_str("'='"),
            TokenKind::Newline => f.write_str("end of line"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}

/// A token with the position of its first character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

/// Converts descriptor text into tokens
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input. The last token is always [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;

        let location = self.location();
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                location,
            });
        };

        let kind = match c {
            '\n' => {
                self.bump();
                TokenKind::Newline
            }
            '{' | '}' | '(' | ')' | '[' | ']' | '.' | ',' | '=' | ';' => {
                self.bump();
                match c {
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    '.' => TokenKind::Dot,
                    ',' => TokenKind::Comma,
                    '=' => TokenKind::Eq,
                    _ => TokenKind::Semicolon,
                }
            }
            '"' => self.string(location)?,
            c if c.is_ascii_digit() => self.integer(location)?,
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            other => {
                return Err(ParseError::new(
                    location,
                    format!("unexpected character '{}'", other),
                ));
            }
        };

        Ok(Token { kind, location })
    }

    /// Skip spaces, tabs, carriage returns and comments (not newlines)
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '/' if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_second() == Some('*') => {
                    let start = self.location();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(ParseError::new(start, "unterminated block comment"));
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn string(&mut self, start: Location) -> Result<TokenKind, ParseError> {
        self.bump();
        if self.peek() == Some('"') && self.peek_second() == Some('"') {
            return Err(ParseError::new(start, "raw string literals are not supported"));
        }

        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(ParseError::new(start, "unterminated string literal"));
                }
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => {
                    let escape_at = self.location();
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some(c @ ('"' | '\\' | '$' | '\'')) => value.push(c),
                        Some(other) => {
                            return Err(ParseError::new(
                                escape_at,
                                format!("invalid escape sequence '\\{}'", other),
                            ));
                        }
                        None => {
                            return Err(ParseError::new(start, "unterminated string literal"));
                        }
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn integer(&mut self, start: Location) -> Result<TokenKind, ParseError> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
            } else if c != '_' {
                break;
            }
            self.bump();
        }
        if self.peek().is_some_and(|c| c.is_alphabetic()) {
            return Err(ParseError::new(
                self.location(),
                "unexpected character after integer literal",
            ));
        }
        digits
            .parse()
            .map(TokenKind::Int)
            .map_err(|_| ParseError::new(start, format!("integer literal {} is out of range", digits)))
    }

    fn identifier(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match name.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(name),
        }
    }
}

/// Tokenize descriptor text
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_assignment_tokens() {
        assert_eq!(
            kinds("minSdk = 21"),
            vec![
                TokenKind::Ident("minSdk".into()),
                TokenKind::Eq,
                TokenKind::Int(21),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped_but_newlines_kept() {
        let tokens = kinds("// Firebase SDKs ✅\nid(\"x\") /* inline\n comment */ ;");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Newline,
                TokenKind::Ident("id".into()),
                TokenKind::LParen,
                TokenKind::Str("x".into()),
                TokenKind::RParen,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c\$d""#),
            vec![TokenKind::Str("a\"b\\c$d".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_locations_are_one_based() {
        let tokens = tokenize("android {\n    namespace = \"x\"\n}").unwrap();
        assert_eq!(tokens[0].location, Location::new(1, 1));
        assert_eq!(tokens[1].location, Location::new(1, 9));
        let namespace = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("namespace".into()))
            .unwrap();
        assert_eq!(namespace.location, Location::new(2, 5));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("namespace = \"com.appdev\n").unwrap_err();
        assert_eq!(err.location, Location::new(1, 13));
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = tokenize("a = 1\n/* never closed").unwrap_err();
        assert_eq!(err.location, Location::new(2, 1));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("minSdk = 21 + 1").unwrap_err();
        assert_eq!(err.location, Location::new(1, 13));
        assert!(err.message.contains("'+'"));
    }

    #[test]
    fn test_integer_with_underscores_and_suffix() {
        assert_eq!(kinds("1_000"), vec![TokenKind::Int(1000), TokenKind::Eof]);
        assert!(tokenize("34L").is_err());
    }

    #[test]
    fn test_booleans() {
        assert_eq!(
            kinds("isCoreLibraryDesugaringEnabled = true"),
            vec![
                TokenKind::Ident("isCoreLibraryDesugaringEnabled".into()),
                TokenKind::Eq,
                TokenKind::True,
                TokenKind::Eof,
            ]
        );
    }

    proptest! {
        #[test]
        fn tokenize_never_panics(source in "\\PC{0,64}") {
            let _ = tokenize(&source);
        }

        #[test]
        fn identifiers_round_trip(name in "[a-zA-Z_][a-zA-Z0-9_]{0,16}") {
            prop_assume!(name != "true" && name != "false");
            prop_assert_eq!(kinds(&name), vec![TokenKind::Ident(name.clone()), TokenKind::Eof]);
        }
    }
}
