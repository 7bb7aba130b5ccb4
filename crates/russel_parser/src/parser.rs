//! Parser infrastructure — token navigation, error reporting, top level.

use russel_ast::{Id, Stmt, Stmts};
use russel_diag::Diag;
use russel_lexer::{Lexer, Token, TokenKind, Where};

/// Result of parsing a source file: the top-level statement list and the
/// position of the end of the file (where the missing-`main` suggestion is
/// anchored).
#[derive(Debug)]
pub struct ParseResult {
    pub top: Stmts,
    pub file_end: Where,
}

/// The parser.
pub struct Parser<'src, 'd> {
    lx: Lexer<'src>,
    pub(crate) tok: Token,
    pub(crate) diag: &'d mut Diag,
    file_end: Where,
}

impl<'src, 'd> Parser<'src, 'd> {
    pub fn new(input: &'src str, path: &str, diag: &'d mut Diag) -> Self {
        let mut lx = Lexer::new(input, path);
        let tok = first_token(&mut lx, diag);
        let file_end = tok.loc.clone();
        Parser {
            lx,
            tok,
            diag,
            file_end,
        }
    }

    /// Parse the whole file. The top level admits only `proc`, `let` and
    /// `macro` declarations.
    pub fn parse(mut self) -> ParseResult {
        let loc = self.tok.loc.clone();
        let mut list = vec![];

        while !self.at(&TokenKind::Eof) && !self.diag.aborted() {
            if self.eat(&TokenKind::Separator) {
                continue;
            }

            let stmt = match self.tok.kind {
                TokenKind::Proc => self.parse_proc().map(Stmt::Proc),
                TokenKind::Let => self.parse_let().map(Stmt::Let),
                TokenKind::Macro => self.parse_macro().map(Stmt::MacroDef),

                _ => {
                    let msg = format!("Unexpected {} in top-level", self.tok);
                    self.diag.error(&self.tok.loc.clone(), &msg);
                    self.bump();
                    None
                }
            };

            if let Some(stmt) = stmt {
                list.push(stmt);
            }
        }

        ParseResult {
            top: Stmts { loc, list },
            file_end: self.file_end,
        }
    }

    // ---- Token navigation ----

    /// Advance to the next token. Lexical error tokens are reported here
    /// and skipped so the caller only ever sees well-formed tokens.
    pub(crate) fn bump(&mut self) {
        if self.at(&TokenKind::Eof) {
            return;
        }

        loop {
            self.tok = self.lx.next_token();
            if let TokenKind::Error(msg) = &self.tok.kind {
                let (loc, msg) = (self.tok.loc.clone(), msg.clone());
                self.diag.error(&loc, &msg);
                if self.diag.aborted() {
                    self.tok = Token::eof(loc);
                    break;
                }
                continue;
            }
            break;
        }

        if self.at(&TokenKind::Eof) {
            self.file_end = self.tok.loc.clone();
        }
    }

    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.tok.kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn loc(&self) -> Where {
        self.tok.loc.clone()
    }

    // ---- Error reporting ----

    pub(crate) fn error_here(&mut self, msg: &str) {
        let loc = self.tok.loc.clone();
        self.diag.error(&loc, msg);
    }

    /// Report a missing closing delimiter with a back-reference to where it
    /// was opened.
    pub(crate) fn unmatched(&mut self, close: &str, opened: &Where) {
        let msg = format!("Expected matching '{}', got {}", close, self.tok);
        self.error_here(&msg);
        self.diag.note(opened, "Opened here");
    }

    // ---- Shared small parsers ----

    pub(crate) fn parse_id(&mut self) -> Option<Id> {
        if let TokenKind::Id(name) = &self.tok.kind {
            let id = Id {
                loc: self.tok.loc.clone(),
                name: name.clone(),
            };
            self.bump();
            Some(id)
        } else {
            let msg = format!("Expected identifier, got {}", self.tok);
            self.error_here(&msg);
            None
        }
    }
}

fn first_token(lx: &mut Lexer, diag: &mut Diag) -> Token {
    loop {
        let tok = lx.next_token();
        if let TokenKind::Error(msg) = &tok.kind {
            diag.error(&tok.loc, msg);
            if diag.aborted() {
                return Token::eof(tok.loc);
            }
            continue;
        }
        return tok;
    }
}
