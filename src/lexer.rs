use tracing::trace;

use crate::error::LexError;


#[derive(Clone, Copy, Hash, Debug, Eq, PartialEq)]
pub enum TokenClass {
    Number,
    Ident,
    Let,
    Function,
    Assign,
    Plus,
    Minus,
    Times,
    Div,
    Mod,
    Colon,
    Comma,
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    EOF,
}

/// Line and column, both 1-based.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash)]
pub struct Position(pub u32, pub u32);

impl Position {
    pub fn line(&self) -> u32 { self.0 }
    pub fn column(&self) -> u32 { self.1 }
}

/// Class, source text, position and byte offset of one token.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Token<'a>(pub TokenClass, pub &'a str, pub Position, pub usize);

impl<'a> Token<'a> {
    pub fn class(&self) -> TokenClass { self.0 }
    pub fn text(&self) -> &'a str     { self.1 }
    pub fn pos(&self) -> Position     { self.2 }
    pub fn offset(&self) -> usize     { self.3 }
    pub fn len(&self) -> usize        { self.1.len() }
    pub fn is_empty(&self) -> bool    { self.1.is_empty() }
}

const KEYWORDS: &[(&str, TokenClass)] = &[
    ("let", TokenClass::Let),
    ("function", TokenClass::Function),
];

const TAB_STOP: u32 = 8;

pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
    line: u32,
    col: u32,
    peeked: Option<Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer { input, offset: 0, line: 1, col: 1, peeked: None }
    }

    pub fn source(&self) -> &'a str { self.input }

    /// Consumes one token. After the end of input every call yields `EOF`.
    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.scan(),
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Token<'a>, LexError> {
        if let Some(tok) = self.peeked {
            return Ok(tok);
        }
        let tok = self.scan()?;
        self.peeked = Some(tok);
        Ok(tok)
    }

    fn current(&self) -> Option<u8> {
        self.input.as_bytes().get(self.offset).copied()
    }

    fn is_eof(&self) -> bool {
        self.offset >= self.input.len()
    }

    fn make_token(&mut self, class: TokenClass, len: usize) -> Token<'a> {
        let tok = Token(
            class,
            &self.input[self.offset..self.offset + len],
            Position(self.line, self.col),
            self.offset);
        self.offset += len;
        self.col += len as u32;
        let Position(line, col) = tok.2;
        trace!(?class, text = tok.1, line, col, "token");
        tok
    }

    fn skip_space(&mut self) {
        while let Some(c) = self.current() {
            match c {
                b' ' | b'\r' | b'\x0c' => self.col += 1,
                b'\n' => {
                    self.line += 1;
                    self.col = 1;
                }
                b'\t' => {
                    self.col -= self.col % TAB_STOP;
                    self.col += TAB_STOP;
                }
                b'\x0b' => self.line += 1,
                _ => return,
            }
            self.offset += 1;
        }
    }

    fn alnum_run(&self) -> usize {
        self.input.as_bytes()[self.offset..]
            .iter()
            .take_while(|c| c.is_ascii_alphanumeric())
            .count()
    }

    fn read_ident_or_keyword(&mut self) -> Token<'a> {
        let len = self.alnum_run();
        let text = &self.input[self.offset..self.offset + len];
        let class = KEYWORDS.iter()
            .find(|(kw, _)| kw.len() == len && *kw == text)
            .map(|&(_, class)| class)
            .unwrap_or(TokenClass::Ident);
        self.make_token(class, len)
    }

    // Digit legality and base prefixes are left to the parser, which also
    // needs to see type suffixes such as `10u8`.
    fn read_number(&mut self) -> Token<'a> {
        let len = self.alnum_run();
        self.make_token(TokenClass::Number, len)
    }

    fn scan(&mut self) -> Result<Token<'a>, LexError> {
        self.skip_space();
        if self.is_eof() {
            return Ok(self.make_token(TokenClass::EOF, 0));
        }

        let c = self.input.as_bytes()[self.offset];
        let tok = match c {
            b'+' => self.make_token(TokenClass::Plus, 1),
            b'-' => {
                if self.input.as_bytes().get(self.offset + 1) == Some(&b'>') {
                    self.make_token(TokenClass::Arrow, 2)
                } else {
                    self.make_token(TokenClass::Minus, 1)
                }
            }
            b'*' => self.make_token(TokenClass::Times, 1),
            b'/' => self.make_token(TokenClass::Div, 1),
            b'%' => self.make_token(TokenClass::Mod, 1),
            b'=' => self.make_token(TokenClass::Assign, 1),
            b':' => self.make_token(TokenClass::Colon, 1),
            b',' => self.make_token(TokenClass::Comma, 1),
            b'(' => self.make_token(TokenClass::LParen, 1),
            b')' => self.make_token(TokenClass::RParen, 1),
            b'{' => self.make_token(TokenClass::LBrace, 1),
            b'}' => self.make_token(TokenClass::RBrace, 1),
            b';' => self.make_token(TokenClass::Semicolon, 1),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_ascii_alphabetic() => self.read_ident_or_keyword(),
            _ => {
                let ch = self.input[self.offset..].chars().next().unwrap_or('\0');
                return Err(LexError::UnknownCharacter {
                    ch,
                    pos: Position(self.line, self.col),
                });
            }
        };
        Ok(tok)
    }
}

/// Tokenizes the whole input, the final token being `EOF`.
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token()?;
        tokens.push(tok);
        if tok.0 == TokenClass::EOF {
            return Ok(tokens);
        }
    }
}
