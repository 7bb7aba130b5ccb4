//! Statement and block parsing.

use russel_ast::{
    Assign, Attrs, For, If, Increment, Let, MacroDef, Proc, Return, Stmt, Stmts, While,
};
use russel_lexer::TokenKind;

use crate::parser::Parser;

impl<'src, 'd> Parser<'src, 'd> {
    /// Parse a statement block: either a single statement (one-liner body)
    /// or `{ … }`. Returns `None` when a `{` is never matched.
    pub(crate) fn parse_stmts(&mut self) -> Option<Stmts> {
        let loc = self.loc();
        let mut list = vec![];

        if !self.at(&TokenKind::LCurly) {
            if let Some(stmt) = self.parse_stmt() {
                list.push(stmt);
            }
            return Some(Stmts { loc, list });
        }

        self.bump();

        while !self.at(&TokenKind::RCurly) {
            if self.at(&TokenKind::Eof) || self.diag.aborted() {
                self.unmatched("}", &loc);
                return None;
            }

            // `;` between statements is an empty separator.
            if self.eat(&TokenKind::Separator) {
                continue;
            }

            if let Some(stmt) = self.parse_stmt() {
                list.push(stmt);
            }
        }

        self.bump();

        Some(Stmts { loc, list })
    }

    pub(crate) fn parse_stmt(&mut self) -> Option<Stmt> {
        let loc = self.loc();

        match self.tok.kind {
            TokenKind::Let => self.parse_let().map(Stmt::Let),
            TokenKind::Macro => self.parse_macro().map(Stmt::MacroDef),
            TokenKind::Return => self.parse_return().map(Stmt::Return),
            TokenKind::If => self.parse_if(false).map(Stmt::If),
            TokenKind::Unless => self.parse_if(true).map(Stmt::If),
            TokenKind::While => self.parse_while(false).map(Stmt::While),
            TokenKind::Until => self.parse_while(true).map(Stmt::While),
            TokenKind::For => self.parse_for().map(Stmt::For),

            TokenKind::Break => {
                self.bump();
                Some(Stmt::Break { loc })
            }

            TokenKind::Continue => {
                self.bump();
                Some(Stmt::Continue { loc })
            }

            TokenKind::Increment => {
                self.bump();
                let name = self.parse_id()?;
                Some(Stmt::Increment(Increment {
                    loc,
                    name,
                    negative: false,
                }))
            }

            TokenKind::Decrement => {
                self.bump();
                let name = self.parse_id()?;
                Some(Stmt::Increment(Increment {
                    loc,
                    name,
                    negative: true,
                }))
            }

            TokenKind::Id(_) => {
                let id = self.parse_id()?;
                if self.eat(&TokenKind::Assign) {
                    let value = self.parse_expr()?;
                    Some(Stmt::Assign(Assign {
                        loc: id.loc.clone(),
                        name: id,
                        value,
                    }))
                } else {
                    Some(Stmt::Expr(russel_ast::Expr::Id(id)))
                }
            }

            _ => self.parse_expr().map(Stmt::Expr),
        }
    }

    pub(crate) fn parse_let(&mut self) -> Option<Let> {
        let loc = self.loc();

        self.bump();
        let name = self.parse_id()?;

        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_id()?)
        } else {
            None
        };

        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Some(Let {
            loc,
            name,
            ty,
            init,
        })
    }

    pub(crate) fn parse_macro(&mut self) -> Option<MacroDef> {
        let loc = self.loc();

        self.bump();
        let name = self.parse_id()?;

        if !self.eat(&TokenKind::Assign) {
            self.diag.error(&loc, "Macro expression expected");
            return None;
        }

        let body = self.parse_expr()?;

        Some(MacroDef { loc, name, body })
    }

    fn parse_return(&mut self) -> Option<Return> {
        let loc = self.loc();

        self.bump();
        let value = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Some(Return { loc, value })
    }

    fn parse_if(&mut self, invert: bool) -> Option<If> {
        let loc = self.loc();

        self.bump();
        let init = self.parse_loop_init()?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_stmts()?;

        let else_block = if self.eat(&TokenKind::Else) {
            Some(self.parse_stmts()?)
        } else {
            None
        };

        Some(If {
            loc,
            init,
            cond,
            then_block,
            else_block,
            invert,
        })
    }

    fn parse_while(&mut self, invert: bool) -> Option<While> {
        let loc = self.loc();

        self.bump();
        let cond = self.parse_expr()?;
        let body = self.parse_stmts()?;

        Some(While {
            loc,
            cond,
            body,
            invert,
        })
    }

    /// `for [let …;] COND; STEP BODY` — every clause may be omitted.
    fn parse_for(&mut self) -> Option<For> {
        let loc = self.loc();
        self.bump();

        let init = if self.eat(&TokenKind::Separator) {
            None
        } else if self.at(&TokenKind::Let) {
            let init = self.parse_let()?;
            if !self.eat(&TokenKind::Separator) {
                let msg = format!("Expected ';', got {}", self.tok);
                self.error_here(&msg);
                return None;
            }
            Some(init)
        } else {
            let msg = format!("Expected 'let' or ';' in loop header, got {}", self.tok);
            self.error_here(&msg);
            return None;
        };

        let cond = if self.eat(&TokenKind::Separator) {
            None
        } else {
            let cond = self.parse_expr()?;
            if !self.eat(&TokenKind::Separator) {
                let msg = format!("Expected ';', got {}", self.tok);
                self.error_here(&msg);
                return None;
            }
            Some(cond)
        };

        let step = if self.eat(&TokenKind::Separator) {
            None
        } else {
            Some(Box::new(self.parse_stmt()?))
        };

        let body = self.parse_stmts()?;

        Some(For {
            loc,
            init,
            cond,
            step,
            body,
        })
    }

    /// Optional `let …;` before a condition (`if let x = 5; (== x 5) …`).
    fn parse_loop_init(&mut self) -> Option<Option<Let>> {
        if !self.at(&TokenKind::Let) {
            return Some(None);
        }

        let init = self.parse_let()?;
        if !self.eat(&TokenKind::Separator) {
            let msg = format!("Expected ';', got {}", self.tok);
            self.error_here(&msg);
            return None;
        }

        Some(Some(init))
    }

    pub(crate) fn parse_proc(&mut self) -> Option<Proc> {
        let loc = self.loc();

        self.bump();
        if !self.at(&TokenKind::LParen) {
            let msg = format!(
                "Expected '(' to open procedure head, got {}",
                self.tok
            );
            self.error_here(&msg);
            self.bump();
            return None;
        }

        let open = self.loc();
        self.bump();
        let name = self.parse_id()?;

        // Formal parameters are reserved syntax: consume, but bind nothing.
        while !self.at(&TokenKind::RParen) {
            if self.at(&TokenKind::Eof) || self.diag.aborted() {
                self.unmatched(")", &open);
                return None;
            }
            self.bump();
        }
        self.bump();

        let attrs = self.parse_attrs()?;

        let ret = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_id()?)
        } else {
            None
        };

        let body = self.parse_stmts()?;

        Some(Proc {
            loc,
            attrs,
            name,
            ret,
            body,
        })
    }

    /// Bracketed attribute list after a procedure head: `[inline interrupt]`.
    fn parse_attrs(&mut self) -> Option<Attrs> {
        let mut attrs = Attrs::default();

        if !self.at(&TokenKind::LSquare) {
            return Some(attrs);
        }

        let open = self.loc();
        self.bump();

        while !self.at(&TokenKind::RSquare) {
            match &self.tok.kind {
                TokenKind::Eof => {
                    self.unmatched("]", &open);
                    return None;
                }

                TokenKind::Inline => {
                    attrs.set(Attrs::INLINE);
                    self.bump();
                }

                // `interrupt` is not a keyword; it is matched by spelling.
                TokenKind::Id(name) if name == "interrupt" => {
                    attrs.set(Attrs::INTERRUPT);
                    self.bump();
                }

                _ => {
                    let msg = format!("Unknown procedure attribute {}", self.tok);
                    self.error_here(&msg);
                    self.bump();
                }
            }

            if self.diag.aborted() {
                return None;
            }
        }
        self.bump();

        Some(attrs)
    }
}
