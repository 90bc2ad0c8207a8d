use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the whole source. Stops at the first lexical error.
    pub fn tokenize(mut self) -> Result<Vec<Spanned<Lexeme>>, Vec<Diagnostic>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            if !self.diagnostics.is_empty() {
                return Err(self.diagnostics);
            }
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        self.skip_whitespace_and_comments();

        if self.pos >= self.source.len() {
            return self.make_token(Lexeme::Eof, self.pos, self.pos);
        }

        let start = self.pos;
        let ch = self.source[self.pos];

        if is_ident_start(ch) {
            return self.scan_ident_or_keyword();
        }

        if ch.is_ascii_digit() {
            return self.scan_number();
        }

        self.scan_symbol(start)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            // Line comments run from '#' to end of line
            if self.pos < self.source.len() && self.source[self.pos] == b'#' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        let token = Lexeme::from_keyword(text).unwrap_or_else(|| Lexeme::Ident(text.to_string()));
        self.make_token(token, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        match text.parse::<u64>() {
            Ok(n) => self.make_token(Lexeme::Integer(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("integer literal '{}' is too large", text),
                        Span::new(start as u32, self.pos as u32),
                    )
                    .with_help(format!("maximum integer value is {}", u64::MAX)),
                );
                self.make_token(Lexeme::Integer(0), start, self.pos)
            }
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Spanned<Lexeme> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => Lexeme::LBrace,
            b'}' => Lexeme::RBrace,
            b',' => Lexeme::Comma,
            b':' => Lexeme::Colon,
            b'+' => Lexeme::Plus,
            b'-' => Lexeme::Minus,
            b'*' => Lexeme::Star,
            b'/' => Lexeme::Slash,
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::EqEq
                } else {
                    self.diagnostics.push(
                        Diagnostic::error(
                            "unexpected '='".to_string(),
                            Span::new(start as u32, self.pos as u32),
                        )
                        .with_help("equality is written '=='".to_string()),
                    );
                    Lexeme::EqEq
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::BangEq
                } else {
                    self.diagnostics.push(
                        Diagnostic::error(
                            "unexpected '!'".to_string(),
                            Span::new(start as u32, self.pos as u32),
                        )
                        .with_help(
                            "inequality is written '!='; boolean negation is 'not'".to_string(),
                        ),
                    );
                    Lexeme::BangEq
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::Le
                } else {
                    Lexeme::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::Ge
                } else {
                    Lexeme::Gt
                }
            }
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    format!("unexpected character '{}' (U+{:04X})", ch as char, ch),
                    Span::new(start as u32, self.pos as u32),
                ));
                Lexeme::Eof
            }
        };

        self.make_token(token, start, self.pos)
    }

    fn peek(&self) -> Option<u8> {
        if self.pos < self.source.len() {
            Some(self.source[self.pos])
        } else {
            None
        }
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
