use ember_common::text::span::TextSpan;
use ember_common::token::{Token, TokenKind};


pub struct Lexer<'a> {
    input: &'a str,
    current_pos: usize,
    finished: bool,
}

impl <'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, current_pos: 0, finished: false }
    }

    /// Lexes the whole input, dropping whitespace and comments
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            if token.kind != TokenKind::Whitespace {
                tokens.push(token);
            }
        }

        tokens
    }

    pub fn next_token(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }

        let Some(c) = self.current_char() else {
            self.finished = true;
            let end = self.input.len();
            return Some(Token::new(TokenKind::Eof, TextSpan::new(end, end, String::new())));
        };

        let start = self.current_pos;
        let kind = if c.is_ascii_digit() {
            self.consume_number()
        } else if c == '"' {
            self.consume_string_literal()
        } else if c.is_whitespace() {
            self.consume_while(char::is_whitespace);
            TokenKind::Whitespace
        } else if Self::is_identifier_start(c) {
            self.consume_while(Self::is_identifier_continue);
            TokenKind::keyword(&self.input[start..self.current_pos]).unwrap_or(TokenKind::Identifier)
        } else {
            self.consume_punctuation()
        };

        let literal = self.input[start..self.current_pos].to_string();
        Some(Token::new(kind, TextSpan::new(start, self.current_pos, literal)))
    }

    fn consume_number(&mut self) -> TokenKind {
        let start = self.current_pos;
        self.consume_while(|c| c.is_ascii_digit());

        match self.input[start..self.current_pos].parse::<i64>() {
            Ok(number) => TokenKind::Number(number),
            Err(_) => TokenKind::NumberOutOfRange,
        }
    }

    fn consume_string_literal(&mut self) -> TokenKind {
        self.consume(); // opening quote
        let mut value = String::new();

        while let Some(c) = self.consume() {
            match c {
                '"' => return TokenKind::String(value),
                '\\' => match self.consume() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                },
                _ => value.push(c),
            }
        }

        // unterminated
        TokenKind::Bad
    }

    fn consume_punctuation(&mut self) -> TokenKind {
        let Some(c) = self.consume() else {
            return TokenKind::Bad;
        };

        match c {
            '+' => TokenKind::Plus,
            '*' => TokenKind::Asterisk,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::SemiColon,
            '-' => self.choose('>', TokenKind::Arrow, TokenKind::Minus),
            '=' => self.choose('=', TokenKind::EqualsEquals, TokenKind::Equals),
            '<' => self.choose('=', TokenKind::LessThanOrEqual, TokenKind::LessThan),
            '>' => self.choose('=', TokenKind::GreaterThanOrEqual, TokenKind::GreaterThan),
            '!' => self.choose('=', TokenKind::NotEquals, TokenKind::Bad),
            '/' => match self.current_char() {
                Some('/') => {
                    self.consume_while(|c| c != '\n');
                    TokenKind::Whitespace
                }
                Some('*') => {
                    self.consume();
                    self.consume_block_comment();
                    TokenKind::Whitespace
                }
                _ => TokenKind::Slash,
            },
            _ => TokenKind::Bad,
        }
    }

    /// Picks `matched` and consumes `next` if it follows, `otherwise` if it does not
    fn choose(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.current_char() == Some(next) {
            self.consume();
            matched
        } else {
            otherwise
        }
    }

    fn consume_block_comment(&mut self) {
        while let Some(c) = self.consume() {
            if c == '*' && self.current_char() == Some('/') {
                self.consume();
                break;
            }
        }
    }

    fn consume_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.current_char() {
            if !predicate(c) {
                break;
            }
            self.consume();
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.current_pos..].chars().next()
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.current_char()?;
        self.current_pos += c.len_utf8();

        Some(c)
    }

    fn is_identifier_start(c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    fn is_identifier_continue(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }
}
