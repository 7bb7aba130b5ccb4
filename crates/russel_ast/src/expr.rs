//! Expression AST nodes.

use std::fmt;

use russel_lexer::Where;

/// Identifier with source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Id {
    pub loc: Where,
    pub name: String,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Call form: `(name arg …)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub loc: Where,
    pub name: Id,
    pub args: Vec<Expr>,
}

/// Expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal in any of the four bases, already decoded.
    Int { loc: Where, value: i64 },

    /// `true` / `false`.
    Bool { loc: Where, value: bool },

    /// String literal with escapes applied.
    Str { loc: Where, value: String },

    /// Bare identifier — a macro or variable reference.
    Id(Id),

    /// Call form.
    Call(Call),
}

impl Expr {
    pub fn loc(&self) -> &Where {
        match self {
            Expr::Int { loc, .. } => loc,
            Expr::Bool { loc, .. } => loc,
            Expr::Str { loc, .. } => loc,
            Expr::Id(id) => &id.loc,
            Expr::Call(call) => &call.loc,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int { value, .. } => write!(f, "{}", value),
            Expr::Bool { value, .. } => write!(f, "{}", value),
            Expr::Str { value, .. } => write!(f, "{:?}", value),
            Expr::Id(id) => write!(f, "{}", id),
            Expr::Call(call) => {
                write!(f, "({}", call.name)?;
                for arg in &call.args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
