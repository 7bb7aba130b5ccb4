//! Russel AST — Abstract Syntax Tree node definitions.
//!
//! This crate defines every node type that the parser produces.
//! It contains NO logic — purely data structures. Every node carries the
//! `Where` of the token that introduced it.

pub mod expr;
pub mod stmt;

pub use expr::{Call, Expr, Id};
pub use stmt::{Assign, Attrs, For, If, Increment, Let, MacroDef, Proc, Return, Stmt, Stmts, While};
