use std::fmt::Display;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    AndAnd,
    OrOr,

    // Literals
    Identifier(String),
    String(String),
    Number(f64),

    // Keywords
    If,
    Else,
    True,
    False,

    // End of file
    Eof,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Star => write!(f, "*"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Percent => write!(f, "%"),
            TokenType::Equal => write!(f, "="),
            TokenType::EqualEqual => write!(f, "=="),
            TokenType::BangEqual => write!(f, "!="),
            TokenType::Greater => write!(f, ">"),
            TokenType::GreaterEqual => write!(f, ">="),
            TokenType::Less => write!(f, "<"),
            TokenType::LessEqual => write!(f, "<="),
            TokenType::AndAnd => write!(f, "&&"),
            TokenType::OrOr => write!(f, "||"),
            TokenType::Identifier(name) => write!(f, "{}", name),
            TokenType::String(s) => write!(f, "{:?}", s),
            TokenType::Number(n) => write!(f, "{}", n),
            TokenType::If => write!(f, "if"),
            TokenType::Else => write!(f, "else"),
            TokenType::True => write!(f, "true"),
            TokenType::False => write!(f, "false"),
            TokenType::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unexpected character '{character}' at {span}")]
    UnexpectedCharacter { character: char, span: Span },
    #[error("Unterminated string starting at {span}")]
    UnterminatedString { span: Span },
    #[error("Invalid escape sequence '\\{character}' at {span}")]
    InvalidEscape { character: char, span: Span },
    #[error("Number literal at {span} is too large")]
    NumberOutOfRange { span: Span },
}

impl TokenizeError {
    pub fn span(&self) -> Span {
        match self {
            TokenizeError::UnexpectedCharacter { span, .. }
            | TokenizeError::UnterminatedString { span }
            | TokenizeError::InvalidEscape { span, .. }
            | TokenizeError::NumberOutOfRange { span } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    line: usize,
    column: usize,
}

impl Cursor {
    fn start() -> Self {
        Cursor { line: 1, column: 1 }
    }

    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn span_to(self, end: Cursor) -> Span {
        Span {
            start_line: self.line,
            start_column: self.column,
            end_line: end.line,
            end_column: end.column,
        }
    }

    fn point(self) -> Span {
        Span::point(self.line, self.column)
    }
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut remaining = source;
    let mut cursor = Cursor::start();

    loop {
        while let Some((_, rest)) = maximal(&[whitespace, comment], remaining) {
            cursor.advance(consumed(remaining, rest));
            remaining = rest;
        }

        if remaining.is_empty() {
            tokens.push(Token {
                token_type: TokenType::Eof,
                lexeme: String::new(),
                span: cursor.point(),
            });
            break;
        }

        let start = cursor;
        let (token_type, rest) = token(remaining, start)?;
        let lexeme = consumed(remaining, rest);
        cursor.advance(lexeme);
        if matches!(token_type, TokenType::Number(n) if !n.is_finite()) {
            return Err(TokenizeError::NumberOutOfRange {
                span: start.span_to(cursor),
            });
        }
        tokens.push(Token {
            token_type,
            lexeme: lexeme.to_string(),
            span: start.span_to(cursor),
        });
        remaining = rest;
    }

    Ok(tokens)
}

fn consumed<'a>(before: &'a str, after: &str) -> &'a str {
    &before[..before.len() - after.len()]
}

fn token(source: &str, start: Cursor) -> Result<(TokenType, &str), TokenizeError> {
    if source.starts_with('"') {
        return string(source, start);
    }

    maximal(
        &[
            // punctuation
            left_paren,
            right_paren,
            left_brace,
            right_brace,
            semicolon,
            // operators
            plus,
            minus,
            star,
            slash,
            percent,
            equal,
            equal_equal,
            bang_equal,
            greater,
            greater_equal,
            less,
            less_equal,
            and_and,
            or_or,
            // keywords
            if_,
            else_,
            true_,
            false_,
            // literals
            identifier,
            number,
        ],
        source,
    )
    .ok_or_else(|| TokenizeError::UnexpectedCharacter {
        character: source.chars().next().unwrap_or_default(),
        span: start.point(),
    })
}

fn maximal<'a, T: std::fmt::Debug>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn comment(source: &str) -> Option<((), &str)> {
    if source.starts_with("//") {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum();
        Some(((), &source[len..]))
    } else {
        None
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            if source.starts_with($word) {
                Some(($token, &source[$word.len()..]))
            } else {
                None
            }
        }
    };
}

match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { left_brace, "{", TokenType::LeftBrace }
match_literal! { right_brace, "}", TokenType::RightBrace }
match_literal! { semicolon, ";", TokenType::Semicolon }
match_literal! { plus, "+", TokenType::Plus }
match_literal! { minus, "-", TokenType::Minus }
match_literal! { star, "*", TokenType::Star }
match_literal! { slash, "/", TokenType::Slash }
match_literal! { percent, "%", TokenType::Percent }
match_literal! { equal, "=", TokenType::Equal }
match_literal! { equal_equal, "==", TokenType::EqualEqual }
match_literal! { bang_equal, "!=", TokenType::BangEqual }
match_literal! { greater, ">", TokenType::Greater }
match_literal! { greater_equal, ">=", TokenType::GreaterEqual }
match_literal! { less, "<", TokenType::Less }
match_literal! { less_equal, "<=", TokenType::LessEqual }
match_literal! { and_and, "&&", TokenType::AndAnd }
match_literal! { or_or, "||", TokenType::OrOr }
match_literal! { if_, "if", TokenType::If }
match_literal! { else_, "else", TokenType::Else }
match_literal! { true_, "true", TokenType::True }
match_literal! { false_, "false", TokenType::False }

fn identifier(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    Some((
        TokenType::Identifier(source[..len].to_string()),
        &source[len..],
    ))
}

fn string(source: &str, start: Cursor) -> Result<(TokenType, &str), TokenizeError> {
    let mut value = String::new();
    let mut chars = source.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((TokenType::String(value), &source[i + 1..])),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                value.push(match escaped {
                    '"' => '"',
                    '\\' => '\\',
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => {
                        let mut at = start;
                        at.advance(&source[..i]);
                        return Err(TokenizeError::InvalidEscape {
                            character: other,
                            span: at.point(),
                        });
                    }
                });
            }
            c => value.push(c),
        }
    }

    Err(TokenizeError::UnterminatedString {
        span: start.point(),
    })
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let bytes = source.as_bytes();
    let mut len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let mut digits = len;

    if bytes.get(len) == Some(&b'.') {
        let fraction = bytes[len + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 || fraction > 0 {
            len += 1 + fraction;
            digits += fraction;
        }
    }

    if digits == 0 {
        return None;
    }

    let value = source[..len].parse().ok()?;
    Some((TokenType::Number(value), &source[len..]))
}
