use std::fmt::{Display, Formatter};

use crate::text::span::TextSpan;


#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    // literals
    Number(i64),
    String(String),

    // arithmetic
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Equals,

    // comparison
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    EqualsEquals,
    NotEquals,

    // keywords
    Let,
    If,
    Else,
    While,
    True,
    False,
    Function,
    Return,

    // separators
    LeftParen,
    RightParen,
    OpenBrace,
    CloseBrace,
    Comma,
    Colon,
    Arrow,
    SemiColon,

    Whitespace,
    Identifier,
    /// Digits that do not fit an `i64`
    NumberOutOfRange,
    Bad,
    Eof,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "fx" => TokenKind::Function,
            "return" => TokenKind::Return,
            _ => return None,
        };

        Some(kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::Number(_) => "Number",
            TokenKind::String(_) => "String",

            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Equals => "=",

            TokenKind::LessThan => "<",
            TokenKind::GreaterThan => ">",
            TokenKind::LessThanOrEqual => "<=",
            TokenKind::GreaterThanOrEqual => ">=",
            TokenKind::EqualsEquals => "==",
            TokenKind::NotEquals => "!=",

            TokenKind::Let => "Let",
            TokenKind::If => "If",
            TokenKind::Else => "Else",
            TokenKind::While => "While",
            TokenKind::True => "True",
            TokenKind::False => "False",
            TokenKind::Function => "Function",
            TokenKind::Return => "Return",

            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::OpenBrace => "{",
            TokenKind::CloseBrace => "}",
            TokenKind::Comma => "Comma",
            TokenKind::Colon => "Colon",
            TokenKind::Arrow => "Arrow",
            TokenKind::SemiColon => "Semicolon",

            TokenKind::Whitespace => "Whitespace",
            TokenKind::Identifier => "Identifier",
            TokenKind::NumberOutOfRange => "Number",
            TokenKind::Bad => "Bad",
            TokenKind::Eof => "Eof",
        };

        write!(f, "{}", text)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextSpan,
}

impl Token {
    pub fn new(kind: TokenKind, span: TextSpan) -> Self {
        Self { kind, span }
    }
}
