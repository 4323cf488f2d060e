// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-line lexer for ASL-style assembly source.
//!
//! One `Lexer` is created per source line. The operand parser needs to look
//! one token past a comma to disambiguate `C`/`Z`/`NC`/`NZ` between register
//! and condition readings, so the lexer supports a full save/restore of its
//! position (`save_state`/`restore_state`) in addition to single-token peek.

/// Token kinds delivered to the parser and expression evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Identifier,
    Number,
    Str,
    Char,
    Colon,
    Comma,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Equals,
    EqEq,
    Ne,
    Not,
    Dollar,
    Hash,
    Dot,
    Question,
    Backslash,
    At,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text for identifiers; decoded bytes for strings and chars.
    pub text: String,
    /// Numeric value for `Number` and `Char` tokens.
    pub value: i64,
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, column: usize) -> Self {
        Self {
            kind,
            text: String::new(),
            value: 0,
            column,
        }
    }

    /// Human-readable form for diagnostics.
    pub fn describe(&self) -> String {
        if !self.text.is_empty() {
            return self.text.clone();
        }
        match self.kind {
            TokenKind::Eof => "end of line".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
            TokenKind::Plus => "+".to_string(),
            TokenKind::Minus => "-".to_string(),
            TokenKind::Star => "*".to_string(),
            TokenKind::Slash => "/".to_string(),
            TokenKind::Percent => "%".to_string(),
            TokenKind::Amp => "&".to_string(),
            TokenKind::AmpAmp => "&&".to_string(),
            TokenKind::Pipe => "|".to_string(),
            TokenKind::PipePipe => "||".to_string(),
            TokenKind::Caret => "^".to_string(),
            TokenKind::Tilde => "~".to_string(),
            TokenKind::Shl => "<<".to_string(),
            TokenKind::Shr => ">>".to_string(),
            TokenKind::Lt => "<".to_string(),
            TokenKind::Le => "<=".to_string(),
            TokenKind::Gt => ">".to_string(),
            TokenKind::Ge => ">=".to_string(),
            TokenKind::Equals => "=".to_string(),
            TokenKind::EqEq => "==".to_string(),
            TokenKind::Ne => "!=".to_string(),
            TokenKind::Not => "!".to_string(),
            TokenKind::Dollar => "$".to_string(),
            TokenKind::Hash => "#".to_string(),
            TokenKind::Dot => ".".to_string(),
            TokenKind::Question => "?".to_string(),
            TokenKind::Backslash => "\\".to_string(),
            TokenKind::At => "@".to_string(),
            _ => String::new(),
        }
    }
}

/// Saved lexer position for lookahead with rewind.
#[derive(Debug, Clone)]
pub struct LexerState {
    cursor: usize,
    peeked: Option<Token>,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    cursor: usize,
    peeked: Option<Token>,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'.'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

impl<'a> Lexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            input: line.as_bytes(),
            cursor: 0,
            peeked: None,
        }
    }

    pub fn save_state(&self) -> LexerState {
        LexerState {
            cursor: self.cursor,
            peeked: self.peeked.clone(),
        }
    }

    pub fn restore_state(&mut self, state: LexerState) {
        self.cursor = state.cursor;
        self.peeked = state.peeked;
    }

    /// Byte position of the next unconsumed token, ignoring a pending peek.
    pub fn position(&self) -> usize {
        match &self.peeked {
            Some(tok) => tok.column,
            None => self.cursor,
        }
    }

    /// Remaining raw text of the line from the current position.
    pub fn remainder(&self) -> &str {
        let start = self.position().min(self.input.len());
        std::str::from_utf8(&self.input[start..]).unwrap_or("")
    }

    pub fn peek(&mut self) -> Token {
        if self.peeked.is_none() {
            let tok = self.scan();
            self.peeked = Some(tok);
        }
        self.peeked.clone().unwrap_or_else(|| Token::new(TokenKind::Eof, self.cursor))
    }

    pub fn next(&mut self) -> Token {
        if let Some(tok) = self.peeked.take() {
            return tok;
        }
        self.scan()
    }

    fn current(&self) -> u8 {
        self.input.get(self.cursor).copied().unwrap_or(0)
    }

    fn at(&self, offset: usize) -> u8 {
        self.input.get(self.cursor + offset).copied().unwrap_or(0)
    }

    fn bump(&mut self) -> u8 {
        let c = self.current();
        if c != 0 {
            self.cursor += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), b' ' | b'\t' | b'\r' | b'\n') {
            self.cursor += 1;
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.cursor;
        let c = self.current();

        if c == 0 {
            return Token::new(TokenKind::Eof, start);
        }

        // Comment runs to end of line.
        if c == b';' {
            self.cursor = self.input.len();
            return Token::new(TokenKind::Eof, start);
        }

        if c == b'"' {
            return self.scan_string(start);
        }
        if c == b'\'' {
            return self.scan_char(start);
        }

        if c == b'$' {
            self.cursor += 1;
            if self.current().is_ascii_hexdigit() {
                return self.scan_radix_digits(start, 16);
            }
            return Token::new(TokenKind::Dollar, start);
        }

        if c == b'%' {
            if matches!(self.at(1), b'0' | b'1') {
                self.cursor += 1;
                return self.scan_radix_digits(start, 2);
            }
            self.cursor += 1;
            return Token::new(TokenKind::Percent, start);
        }

        if c == b'0' && matches!(self.at(1), b'x' | b'X') {
            self.cursor += 2;
            return self.scan_radix_digits(start, 16);
        }

        if c.is_ascii_digit() {
            return self.scan_number(start);
        }

        if is_ident_start(c) {
            while is_ident_char(self.current()) {
                self.cursor += 1;
            }
            let mut tok = Token::new(TokenKind::Identifier, start);
            tok.text = String::from_utf8_lossy(&self.input[start..self.cursor]).into_owned();
            // F' (the alternate flag register) is the single quoted identifier.
            if self.current() == b'\'' && tok.text.eq_ignore_ascii_case("F") {
                self.cursor += 1;
                tok.text.push('\'');
            }
            return tok;
        }

        self.cursor += 1;
        let kind = match c {
            b':' => TokenKind::Colon,
            b',' => TokenKind::Comma,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'^' => TokenKind::Caret,
            b'~' => TokenKind::Tilde,
            b'#' => TokenKind::Hash,
            b'.' => TokenKind::Dot,
            b'?' => TokenKind::Question,
            b'\\' => TokenKind::Backslash,
            b'@' => TokenKind::At,
            b'&' => {
                if self.current() == b'&' {
                    self.cursor += 1;
                    TokenKind::AmpAmp
                } else {
                    TokenKind::Amp
                }
            }
            b'|' => {
                if self.current() == b'|' {
                    self.cursor += 1;
                    TokenKind::PipePipe
                } else {
                    TokenKind::Pipe
                }
            }
            b'=' => {
                if self.current() == b'=' {
                    self.cursor += 1;
                    TokenKind::EqEq
                } else {
                    TokenKind::Equals
                }
            }
            b'<' => match self.current() {
                b'<' => {
                    self.cursor += 1;
                    TokenKind::Shl
                }
                b'=' => {
                    self.cursor += 1;
                    TokenKind::Le
                }
                _ => TokenKind::Lt,
            },
            b'>' => match self.current() {
                b'>' => {
                    self.cursor += 1;
                    TokenKind::Shr
                }
                b'=' => {
                    self.cursor += 1;
                    TokenKind::Ge
                }
                _ => TokenKind::Gt,
            },
            b'!' => {
                if self.current() == b'=' {
                    self.cursor += 1;
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            _ => TokenKind::Eof,
        };
        Token::new(kind, start)
    }

    fn scan_radix_digits(&mut self, start: usize, radix: u32) -> Token {
        let mut value: i64 = 0;
        loop {
            let c = self.current();
            let digit = match (c as char).to_digit(radix) {
                Some(d) => d,
                None => break,
            };
            value = value.wrapping_mul(radix as i64).wrapping_add(digit as i64);
            self.cursor += 1;
        }
        // Optional H suffix on $-prefixed hex, matching the reference syntax.
        if radix == 16 && matches!(self.current(), b'H' | b'h') {
            self.cursor += 1;
        }
        let mut tok = Token::new(TokenKind::Number, start);
        tok.value = value;
        tok.text = String::from_utf8_lossy(&self.input[start..self.cursor]).into_owned();
        tok
    }

    /// Digit-leading literal: decimal, `H`-suffixed hex, or `B`-suffixed
    /// binary. A run like `1A` with no suffix lexes as the decimal prefix
    /// (`1`) followed by an identifier, as in the reference lexer.
    fn scan_number(&mut self, start: usize) -> Token {
        let mut end = self.cursor;
        while end < self.input.len() && self.input[end].is_ascii_alphanumeric() {
            end += 1;
        }
        let run = &self.input[self.cursor..end];

        let classified: Option<(i64, usize)> = match run.last() {
            Some(b'H') | Some(b'h') if run[..run.len() - 1].iter().all(u8::is_ascii_hexdigit) => {
                parse_radix(&run[..run.len() - 1], 16).map(|v| (v, end))
            }
            Some(b'B') | Some(b'b') if run[..run.len() - 1].iter().all(|c| matches!(c, b'0' | b'1')) => {
                parse_radix(&run[..run.len() - 1], 2).map(|v| (v, end))
            }
            _ if run.iter().all(u8::is_ascii_digit) => parse_radix(run, 10).map(|v| (v, end)),
            _ => None,
        };

        let (value, stop) = match classified {
            Some(pair) => pair,
            None => {
                // Fall back to the longest decimal prefix.
                let mut stop = self.cursor;
                while stop < self.input.len() && self.input[stop].is_ascii_digit() {
                    stop += 1;
                }
                (
                    parse_radix(&self.input[self.cursor..stop], 10).unwrap_or(0),
                    stop,
                )
            }
        };

        self.cursor = stop;
        let mut tok = Token::new(TokenKind::Number, start);
        tok.value = value;
        tok.text = String::from_utf8_lossy(&self.input[start..stop]).into_owned();
        tok
    }

    fn scan_string(&mut self, start: usize) -> Token {
        self.cursor += 1;
        let mut text = String::new();
        while self.current() != b'"' && self.current() != 0 {
            let c = self.bump();
            if c == b'\\' {
                text.push(unescape(self.bump()));
            } else {
                text.push(c as char);
            }
        }
        if self.current() == b'"' {
            self.cursor += 1;
        }
        let mut tok = Token::new(TokenKind::Str, start);
        tok.text = text;
        tok
    }

    /// Char literal: value packs the characters big-endian, so `'AB'` is
    /// 0x4142.
    fn scan_char(&mut self, start: usize) -> Token {
        self.cursor += 1;
        let mut text = String::new();
        let mut value: i64 = 0;
        while self.current() != b'\'' && self.current() != 0 {
            let c = self.bump();
            let ch = if c == b'\\' { unescape(self.bump()) } else { c as char };
            text.push(ch);
            value = (value << 8) | (ch as u32 as i64 & 0xFF);
        }
        if self.current() == b'\'' {
            self.cursor += 1;
        }
        let mut tok = Token::new(TokenKind::Char, start);
        tok.text = text;
        tok.value = value;
        tok
    }
}

fn unescape(c: u8) -> char {
    match c {
        b'n' => '\n',
        b'r' => '\r',
        b't' => '\t',
        b'0' => '\0',
        other => other as char,
    }
}

fn parse_radix(digits: &[u8], radix: u32) -> Option<i64> {
    if digits.is_empty() {
        return None;
    }
    let mut value: i64 = 0;
    for &c in digits {
        let digit = (c as char).to_digit(radix)?;
        value = value.wrapping_mul(radix as i64).wrapping_add(digit as i64);
    }
    Some(value)
}
