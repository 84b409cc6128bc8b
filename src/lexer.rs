//! A hand-written lexer for MiniC source text, producing a flat `Token`
//! stream the parser consumes directly.

use std::fmt;

/// A byte-offset span into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Int,
    Extern,
    If,
    Else,
    While,
    Return,
    Identifier(String),
    IntLiteral(i32),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => write!(f, "identifier `{name}`"),
            Self::IntLiteral(value) => write!(f, "integer literal `{value}`"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.source.get(self.pos + 1) == Some(&b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Scan every token in the source, returning a token stream ending in
    /// `TokenKind::Eof`.
    pub fn scan(&mut self) -> Result<Vec<Token>, crate::error::Error> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span { offset: start, len: 0 },
                });
                break;
            };
            let kind = match c {
                b'(' => {
                    self.bump();
                    TokenKind::LParen
                }
                b')' => {
                    self.bump();
                    TokenKind::RParen
                }
                b'{' => {
                    self.bump();
                    TokenKind::LBrace
                }
                b'}' => {
                    self.bump();
                    TokenKind::RBrace
                }
                b';' => {
                    self.bump();
                    TokenKind::Semicolon
                }
                b',' => {
                    self.bump();
                    TokenKind::Comma
                }
                b'+' => {
                    self.bump();
                    TokenKind::Plus
                }
                b'-' => {
                    self.bump();
                    TokenKind::Minus
                }
                b'*' => {
                    self.bump();
                    TokenKind::Star
                }
                b'/' => {
                    self.bump();
                    TokenKind::Slash
                }
                b'=' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::EqEq
                    } else {
                        TokenKind::Assign
                    }
                }
                b'!' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Neq
                    } else {
                        return Err(crate::error::Error::ParseFailure(format!(
                            "unexpected character `!` at offset {start}"
                        )));
                    }
                }
                b'<' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                b'>' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                c if c.is_ascii_digit() => {
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                    }
                    let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
                    let value = text.parse::<i32>().map_err(|_| {
                        crate::error::Error::ParseFailure(format!(
                            "integer literal `{text}` out of range at offset {start}"
                        ))
                    })?;
                    TokenKind::IntLiteral(value)
                }
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    while self
                        .peek()
                        .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
                    {
                        self.bump();
                    }
                    let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
                    match text {
                        "int" => TokenKind::Int,
                        "extern" => TokenKind::Extern,
                        "if" => TokenKind::If,
                        "else" => TokenKind::Else,
                        "while" => TokenKind::While,
                        "return" => TokenKind::Return,
                        _ => TokenKind::Identifier(text.to_string()),
                    }
                }
                other => {
                    return Err(crate::error::Error::ParseFailure(format!(
                        "unexpected character `{}` at offset {start}",
                        other as char
                    )))
                }
            };
            tokens.push(Token {
                kind,
                span: Span {
                    offset: start,
                    len: self.pos - start,
                },
            });
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_a_minimal_function() {
        let mut lexer = Lexer::new("int f(){ return 1+2; }");
        let tokens = lexer.scan().expect("valid source should scan");
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int,
                TokenKind::Identifier("f".into()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::IntLiteral(1),
                TokenKind::Plus,
                TokenKind::IntLiteral(2),
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unterminated_bang() {
        let mut lexer = Lexer::new("int f(){ return 1!1; }");
        assert!(lexer.scan().is_err());
    }
}
