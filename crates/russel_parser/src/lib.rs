//! Russel Parser — transforms the token stream into an AST.
//!
//! Handwritten recursive descent with one-token lookahead. Syntax errors go
//! straight into the diagnostic sink; recovery advances one token, except
//! unmatched delimiters, which report the opener with an `Opened here` note
//! and abandon the construct.

pub mod parser;
mod expr;
mod stmt;


pub use parser::{ParseResult, Parser};
