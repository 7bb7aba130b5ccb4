//! Expression parsing.
//!
//! An expression is a parenthesised call form `(name arg …)`, a bare
//! identifier, or a literal. There are no infix operators: arithmetic and
//! comparison are call forms with operator-named procedures.

use russel_ast::{Call, Expr};
use russel_lexer::TokenKind;

use crate::parser::Parser;

impl<'src, 'd> Parser<'src, 'd> {
    pub(crate) fn parse_expr(&mut self) -> Option<Expr> {
        let loc = self.loc();

        let expr = match &self.tok.kind {
            TokenKind::LParen => return self.parse_call().map(Expr::Call),
            TokenKind::Id(_) => return self.parse_id().map(Expr::Id),

            TokenKind::Dec(digits) => self.parse_int(digits.clone(), 10, &loc)?,
            TokenKind::Hex(digits) => self.parse_int(digits.clone(), 16, &loc)?,
            TokenKind::Oct(digits) => self.parse_int(digits.clone(), 8, &loc)?,
            TokenKind::Bin(digits) => self.parse_int(digits.clone(), 2, &loc)?,

            TokenKind::True => Expr::Bool { loc, value: true },
            TokenKind::False => Expr::Bool { loc, value: false },

            TokenKind::Str(value) => Expr::Str {
                value: value.clone(),
                loc,
            },

            _ => {
                let msg = format!("Unexpected {}", self.tok);
                self.error_here(&msg);
                self.bump();
                return None;
            }
        };

        self.bump();

        Some(expr)
    }

    fn parse_int(&mut self, digits: String, radix: u32, loc: &russel_lexer::Where) -> Option<Expr> {
        match i64::from_str_radix(&digits, radix) {
            Ok(value) => Some(Expr::Int {
                loc: loc.clone(),
                value,
            }),
            Err(_) => {
                let msg = format!("Integer '{}' does not fit into 64 bits", digits);
                self.diag.error(loc, &msg);
                self.bump();
                None
            }
        }
    }

    fn parse_call(&mut self) -> Option<Call> {
        let loc = self.loc();

        self.bump();
        let name = self.parse_id()?;

        let mut args = vec![];
        while !self.at(&TokenKind::RParen) {
            if self.at(&TokenKind::Eof) || self.diag.aborted() {
                self.unmatched(")", &loc);
                return None;
            }

            if let Some(arg) = self.parse_expr() {
                args.push(arg);
            }
        }
        self.bump();

        Some(Call { loc, name, args })
    }
}
