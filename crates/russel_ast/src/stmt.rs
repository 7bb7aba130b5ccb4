//! Statement AST nodes.

use russel_lexer::Where;

use crate::expr::{Expr, Id};

/// A statement list — a `{ … }` block, a one-liner body, or the top level
/// of a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmts {
    pub loc: Where,
    pub list: Vec<Stmt>,
}

/// Statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression in statement position.
    Expr(Expr),

    /// Variable declaration: `let x [: type] [= expr]`.
    Let(Let),

    /// Assignment: `x = expr`.
    Assign(Assign),

    /// `++ x` / `-- x`.
    Increment(Increment),

    /// Macro declaration: `macro name = expr`.
    MacroDef(MacroDef),

    /// `return [-> expr]`.
    Return(Return),

    /// `if`/`unless` with optional `let …;` initialiser.
    If(If),

    /// `while`/`until`.
    While(While),

    /// `for [let …;] cond; step body`.
    For(For),

    Break { loc: Where },
    Continue { loc: Where },

    /// Procedure declaration.
    Proc(Proc),
}

impl Stmt {
    pub fn loc(&self) -> &Where {
        match self {
            Stmt::Expr(expr) => expr.loc(),
            Stmt::Let(let_) => &let_.loc,
            Stmt::Assign(assign) => &assign.loc,
            Stmt::Increment(inc) => &inc.loc,
            Stmt::MacroDef(mac) => &mac.loc,
            Stmt::Return(ret) => &ret.loc,
            Stmt::If(if_) => &if_.loc,
            Stmt::While(while_) => &while_.loc,
            Stmt::For(for_) => &for_.loc,
            Stmt::Break { loc } => loc,
            Stmt::Continue { loc } => loc,
            Stmt::Proc(proc) => &proc.loc,
        }
    }
}

/// Variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Let {
    pub loc: Where,
    pub name: Id,
    pub ty: Option<Id>,
    pub init: Option<Expr>,
}

/// Variable assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub loc: Where,
    pub name: Id,
    pub value: Expr,
}

/// Variable increment/decrement.
#[derive(Debug, Clone, PartialEq)]
pub struct Increment {
    pub loc: Where,
    pub name: Id,
    pub negative: bool,
}

/// Macro declaration. A macro stores an expression that is re-emitted at
/// every reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub loc: Where,
    pub name: Id,
    pub body: Expr,
}

/// Return statement; the value is written `return -> expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub loc: Where,
    pub value: Option<Expr>,
}

/// `if`/`unless`. `invert` is set for `unless`.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub loc: Where,
    pub init: Option<Let>,
    pub cond: Expr,
    pub then_block: Stmts,
    pub else_block: Option<Stmts>,
    pub invert: bool,
}

/// `while`/`until`. `invert` is set for `until`.
#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub loc: Where,
    pub cond: Expr,
    pub body: Stmts,
    pub invert: bool,
}

/// `for` loop. Every clause may be absent; a missing condition means the
/// loop only exits through `break`.
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub loc: Where,
    pub init: Option<Let>,
    pub cond: Option<Expr>,
    pub step: Option<Box<Stmt>>,
    pub body: Stmts,
}

/// Procedure attributes, stored as a bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attrs(u8);

impl Attrs {
    pub const INLINE: Attrs = Attrs(1 << 0);
    pub const INTERRUPT: Attrs = Attrs(1 << 1);

    pub fn has(self, attr: Attrs) -> bool {
        self.0 & attr.0 != 0
    }

    pub fn set(&mut self, attr: Attrs) {
        self.0 |= attr.0;
    }
}

/// Procedure declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Proc {
    pub loc: Where,
    pub attrs: Attrs,
    pub name: Id,
    pub ret: Option<Id>,
    pub body: Stmts,
}
