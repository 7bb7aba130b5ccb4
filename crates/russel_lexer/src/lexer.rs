//! Core lexer implementation.
//!
//! Scans Russel source byte by byte with one byte of lookahead, producing
//! one token per call. Comments and whitespace are skipped in place; every
//! token carries a `Where` describing its row, column and length.

use std::rc::Rc;

use crate::token::{Token, TokenKind, Where};

const EOF: u8 = 0;

/// Look a lexeme up in the keyword table. Operator-shaped lexemes like `->`
/// and `++` arrive here too, because their bytes are identifier characters.
fn keyword(lexeme: &str) -> Option<TokenKind> {
    let kind = match lexeme {
        "true" => TokenKind::True,
        "false" => TokenKind::False,

        "->" => TokenKind::Arrow,
        "=" => TokenKind::Assign,
        "++" => TokenKind::Increment,
        "--" => TokenKind::Decrement,

        "module" => TokenKind::Module,
        "import" => TokenKind::Import,

        "macro" => TokenKind::Macro,
        "let" => TokenKind::Let,
        "proc" => TokenKind::Proc,
        "inline" => TokenKind::Inline,

        "if" => TokenKind::If,
        "unless" => TokenKind::Unless,
        "else" => TokenKind::Else,

        "while" => TokenKind::While,
        "until" => TokenKind::Until,
        "for" => TokenKind::For,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,

        "return" => TokenKind::Return,

        _ => return None,
    };

    Some(kind)
}

fn is_separator_ch(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'{' | b'}' | b'[' | b']' | b',' | b'.' | b':' | b';'
    ) || is_whitespace(ch)
        || ch == EOF
}

fn is_id_ch(ch: u8) -> bool {
    matches!(
        ch,
        b'+' | b'-' | b'*' | b'/' | b'%' | b'>' | b'<' | b'=' | b'_' | b'$'
    ) || ch.is_ascii_alphanumeric()
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\r' | b'\t' | b'\x0b' | b'\x0c' | b'\n')
}

/// The Russel lexer.
pub struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
    ch: u8,

    path: Rc<str>,
    row: usize,
    col: usize,
    line: Rc<str>,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str, path: &str) -> Self {
        let src = input.as_bytes();
        let mut lx = Lexer {
            src,
            pos: 0,
            ch: src.first().copied().unwrap_or(EOF),
            path: Rc::from(path),
            row: 1,
            col: 1,
            line: Rc::from(""),
        };
        lx.line = lx.scan_line(0);
        lx
    }

    /// Produce the next token. Whitespace and `#` comments are skipped; at
    /// end of input every call returns an `Eof` token.
    pub fn next_token(&mut self) -> Token {
        loop {
            let start = self.here(0);

            let kind = match self.ch {
                EOF => return Token::eof(start),

                b'#' => {
                    self.skip_comment();
                    continue;
                }

                b';' => self.simple(TokenKind::Separator),

                b'(' => self.simple(TokenKind::LParen),
                b')' => self.simple(TokenKind::RParen),

                b'{' => self.simple(TokenKind::LCurly),
                b'}' => self.simple(TokenKind::RCurly),

                b'[' => self.simple(TokenKind::LSquare),
                b']' => self.simple(TokenKind::RSquare),

                b':' => self.simple(TokenKind::Colon),
                b'.' => self.simple(TokenKind::Dot),

                b'"' => self.lex_string(),

                ch if ch.is_ascii_digit() => self.lex_num(),
                ch if is_id_ch(ch) => self.lex_id(),

                ch if is_whitespace(ch) => {
                    self.next();
                    continue;
                }

                ch => {
                    let loc = self.here(1);
                    self.next();
                    return Token::new(
                        TokenKind::Error(format!("Unexpected character '{}'", ch as char)),
                        loc,
                    );
                }
            };

            let mut loc = start;
            if self.row != loc.row {
                // The token ran over a newline (strings only); highlight to
                // the end of its starting line.
                loc.len = (loc.line.len() + 1).saturating_sub(loc.col);
            } else {
                loc.len = self.col - loc.col;
            }

            return Token::new(kind, loc);
        }
    }

    fn here(&self, len: usize) -> Where {
        Where {
            path: Rc::clone(&self.path),
            row: self.row,
            col: self.col,
            len,
            line: Rc::clone(&self.line),
        }
    }

    fn simple(&mut self, kind: TokenKind) -> TokenKind {
        self.next();
        kind
    }

    fn lex_string(&mut self) -> TokenKind {
        self.next();

        let mut str = String::new();
        let mut escape = false;

        while self.ch != b'"' {
            if self.ch == EOF {
                return TokenKind::Error("Unterminated string".to_string());
            }

            if escape {
                match self.ch {
                    b'\\' => str.push('\\'),
                    b'e' => str.push('\x1b'),
                    b'n' => str.push('\n'),
                    b'r' => str.push('\r'),
                    b't' => str.push('\t'),
                    b'v' => str.push('\x0b'),
                    b'b' => str.push('\x08'),
                    b'f' => str.push('\x0c'),

                    ch => {
                        return TokenKind::Error(format!(
                            "Unknown escape sequence '\\{}'",
                            ch as char
                        ))
                    }
                }

                escape = false;
            } else if self.ch == b'\\' {
                escape = true;
            } else {
                str.push(self.ch as char);
            }

            self.next();
        }

        self.next();

        TokenKind::Str(str)
    }

    fn lex_num(&mut self) -> TokenKind {
        if self.ch == b'0' && matches!(self.peek(), b'x' | b'X') {
            self.next();
            self.next();
            self.lex_digits(TokenKind::Hex, |ch| ch.is_ascii_hexdigit(), "hexadecimal")
        } else if self.ch == b'0' && matches!(self.peek(), b'o' | b'O') {
            self.next();
            self.next();
            self.lex_digits(TokenKind::Oct, |ch| (b'0'..=b'7').contains(&ch), "octal")
        } else if self.ch == b'0' && matches!(self.peek(), b'b' | b'B') {
            self.next();
            self.next();
            self.lex_digits(TokenKind::Bin, |ch| ch == b'0' || ch == b'1', "binary")
        } else {
            self.lex_digits(TokenKind::Dec, |ch| ch.is_ascii_digit(), "decimal")
        }
    }

    /// Consume digits until the next separator character. Any byte that is
    /// not a digit of the base turns the whole lexeme into an error token.
    fn lex_digits(
        &mut self,
        make: fn(String) -> TokenKind,
        is_digit: fn(u8) -> bool,
        base: &str,
    ) -> TokenKind {
        let mut str = String::new();

        while !is_separator_ch(self.ch) {
            if !is_digit(self.ch) {
                return TokenKind::Error(format!(
                    "Unexpected character '{}' in {} number",
                    self.ch as char, base
                ));
            }

            str.push(self.ch as char);
            self.next();
        }

        if str.is_empty() {
            return TokenKind::Error(format!("Missing digits in {} number", base));
        }

        make(str)
    }

    fn lex_id(&mut self) -> TokenKind {
        let mut str = String::new();

        while is_id_ch(self.ch) {
            str.push(self.ch as char);
            self.next();
        }

        match keyword(&str) {
            Some(kind) => kind,
            None => TokenKind::Id(str),
        }
    }

    fn skip_comment(&mut self) {
        while self.ch != EOF && self.ch != b'\n' {
            self.next();
        }
    }

    fn next(&mut self) {
        self.pos += 1;
        self.ch = self.src.get(self.pos).copied().unwrap_or(EOF);

        if self.ch == b'\n' {
            // The newline byte itself sits at column 0 of the next row; the
            // byte after it lands on column 1.
            self.col = 0;
            self.row += 1;
            self.line = self.scan_line(self.pos + 1);
        } else {
            self.col += 1;
        }
    }

    fn peek(&self) -> u8 {
        self.src.get(self.pos + 1).copied().unwrap_or(EOF)
    }

    /// Text of the line starting at `from`, without its newline.
    fn scan_line(&self, from: usize) -> Rc<str> {
        let from = from.min(self.src.len());
        let end = self.src[from..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| from + i)
            .unwrap_or(self.src.len());

        // The source arrived as &str and newlines are ASCII, so slicing
        // between them cannot split a UTF-8 sequence.
        Rc::from(std::str::from_utf8(&self.src[from..end]).unwrap_or(""))
    }
}
