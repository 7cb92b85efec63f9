//! Tokenizer for Cinder source text.

use std::{fmt, iter::Peekable, str::Chars};

/// A point in the source text. Line and column are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 1,
    };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open range of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }

    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident(String),
    IntLit(i64),
    // Keywords
    Fn,
    Extern,
    Type,
    Let,
    Return,
    If,
    Else,
    While,
    True,
    False,
    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Arrow,
    Equals,
    EqEq,
    NotEq,
    LessThan,
    LessThanEq,
    GreaterThan,
    GreaterThanEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Amp,
    AmpAmp,
    PipePipe,
    Eof,
}

impl TokenKind {
    fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "fn" => TokenKind::Fn,
            "extern" => TokenKind::Extern,
            "type" => TokenKind::Type,
            "let" => TokenKind::Let,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }

    /// Token class shown by `--dump-tokens`.
    pub fn category(&self) -> &'static str {
        match self {
            TokenKind::Ident(_) => "identifier",
            TokenKind::IntLit(_) => "integer",
            TokenKind::Fn
            | TokenKind::Extern
            | TokenKind::Type
            | TokenKind::Let
            | TokenKind::Return
            | TokenKind::If
            | TokenKind::Else
            | TokenKind::While
            | TokenKind::True
            | TokenKind::False => "keyword",
            TokenKind::Eof => "eof",
            _ => "punct",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident(name) => return write!(f, "identifier '{name}'"),
            TokenKind::IntLit(value) => return write!(f, "integer {value}"),
            TokenKind::Fn => "fn",
            TokenKind::Extern => "extern",
            TokenKind::Type => "type",
            TokenKind::Let => "let",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Arrow => "->",
            TokenKind::Equals => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::LessThan => "<",
            TokenKind::LessThanEq => "<=",
            TokenKind::GreaterThan => ">",
            TokenKind::GreaterThanEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::Amp => "&",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Eof => return f.write_str("end of file"),
        };
        write!(f, "'{text}'")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    pos: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().peekable(),
            pos: Position::START,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
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

    fn peek(&mut self) -> Option<char> {
        self.source.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.next()?;
        self.pos.offset += ch.len_utf8();
        if ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') => {
                    let mut ahead = self.source.clone();
                    ahead.next();
                    if ahead.peek() != Some(&'/') {
                        return;
                    }
                    while let Some(ch) = self.peek()
                        && ch != '\n'
                    {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// Consume `next` if it follows, choosing between a two-character and a
    /// one-character token.
    fn pair(&mut self, next: char, long: TokenKind, short: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            long
        } else {
            short
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.pos;
        let Some(ch) = self.advance() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        };

        let kind = match ch {
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let mut ident = String::from(ch);
                while let Some(ch) = self.peek()
                    && (ch.is_ascii_alphanumeric() || ch == '_')
                {
                    ident.push(ch);
                    self.advance();
                }
                TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident(ident))
            }
            ch if ch.is_ascii_digit() => {
                let mut digits = String::from(ch);
                while let Some(ch) = self.peek()
                    && ch.is_ascii_digit()
                {
                    digits.push(ch);
                    self.advance();
                }
                let value = digits.parse::<i64>().map_err(|_| LexError {
                    message: format!("integer literal out of range: {digits}"),
                    span: Span::new(start, self.pos),
                })?;
                TokenKind::IntLit(value)
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '-' => self.pair('>', TokenKind::Arrow, TokenKind::Minus),
            '=' => self.pair('=', TokenKind::EqEq, TokenKind::Equals),
            '!' => self.pair('=', TokenKind::NotEq, TokenKind::Bang),
            '<' => self.pair('=', TokenKind::LessThanEq, TokenKind::LessThan),
            '>' => self.pair('=', TokenKind::GreaterThanEq, TokenKind::GreaterThan),
            '&' => self.pair('&', TokenKind::AmpAmp, TokenKind::Amp),
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::PipePipe
            }
            other => {
                return Err(LexError {
                    message: format!("unexpected character '{other}'"),
                    span: Span::new(start, self.pos),
                });
            }
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("fn main extern_ret"),
            vec![
                TokenKind::Fn,
                TokenKind::Ident("main".into()),
                TokenKind::Ident("extern_ret".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_character_operators() {
        assert_eq!(
            kinds("-> == != <= >= && || - = ! < > &"),
            vec![
                TokenKind::Arrow,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LessThanEq,
                TokenKind::GreaterThanEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Minus,
                TokenKind::Equals,
                TokenKind::Bang,
                TokenKind::LessThan,
                TokenKind::GreaterThan,
                TokenKind::Amp,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 // one\n/ 2"),
            vec![
                TokenKind::IntLit(1),
                TokenKind::Slash,
                TokenKind::IntLit(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("fn\n  main").tokenize().unwrap();
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
        assert_eq!(tokens[1].span.start.offset, 5);
        assert_eq!(tokens[1].span.len(), 4);
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("let x = 1 | 2;").tokenize().unwrap_err();
        assert_eq!(err.message, "unexpected character '|'");
        assert_eq!(err.span.start.column, 11);
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
        assert!(err.message.starts_with("integer literal out of range"));
    }
}
