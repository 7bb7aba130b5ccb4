//! The fixed intrinsic table.
//!
//! An intrinsic call pushes its arguments left to right and then issues a
//! single opcode. Intrinsic names are reserved: user code may not redefine
//! them.

/// Russel name → AVM opcode, in suggestion order.
pub const TABLE: &[(&str, &str)] = &[
    ("writef", "wrf"),
    ("iprint", "prt"),
    ("fprint", "fpr"),
    ("halt", "hlt"),
    ("exit", "hlt"),
    ("+", "add"),
    ("-", "sub"),
    ("*", "mul"),
    ("/", "div"),
    ("%", "mod"),
    ("not", "not"),
    ("and", "and"),
    ("or", "orr"),
    ("==", "equ"),
    ("/=", "neq"),
    (">", "grt"),
    (">=", "geq"),
    ("<", "les"),
    ("<=", "leq"),
];

/// The opcode an intrinsic lowers to, if `name` is one.
pub fn opcode(name: &str) -> Option<&'static str> {
    TABLE
        .iter()
        .find(|(russel, _)| *russel == name)
        .map(|(_, op)| *op)
}

pub fn is_intrinsic(name: &str) -> bool {
    opcode(name).is_some()
}

/// All intrinsic names, used as suggestion candidates for unknown calls.
pub fn names() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|(russel, _)| *russel)
}
