//! Textual assembly builder.
//!
//! The output program has three parts, written in this order regardless of
//! the order they were generated in: data objects (string bytes and
//! variable slots), the `.entry` block, and the procedure bodies. Labels
//! are `.NAME` lines, instructions are `\tOP [OPERAND]` lines, data objects
//! are `\tlet NAME TYPE = V, …` lines.

use std::fmt::Display;
use std::fmt::Write;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Entry,
    Code,
}

pub(crate) struct Asm {
    data: String,
    entry: String,
    code: String,
    section: Section,
}

impl Asm {
    pub fn new() -> Self {
        Asm {
            data: String::new(),
            entry: String::new(),
            code: String::new(),
            section: Section::Code,
        }
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn select(&mut self, section: Section) {
        self.section = section;
    }

    fn buf(&mut self) -> &mut String {
        match self.section {
            Section::Entry => &mut self.entry,
            Section::Code => &mut self.code,
        }
    }

    pub fn label(&mut self, name: &str) {
        let _ = writeln!(self.buf(), ".{}", name);
    }

    pub fn inst(&mut self, op: &str) {
        let _ = writeln!(self.buf(), "\t{}", op);
    }

    pub fn inst_with(&mut self, op: &str, operand: impl Display) {
        let _ = writeln!(self.buf(), "\t{} {}", op, operand);
    }

    /// String bytes as a `char` data object.
    pub fn data_bytes(&mut self, name: &str, bytes: &[u8]) {
        let values: Vec<String> = bytes.iter().map(|byte| byte.to_string()).collect();
        let _ = writeln!(self.data, "\tlet {} char = {}", name, values.join(", "));
    }

    /// A 64-bit variable slot.
    pub fn data_word(&mut self, name: &str, value: i64) {
        let _ = writeln!(self.data, "\tlet {} i64 = {}", name, value);
    }

    /// Assemble the final program text.
    pub fn finish(self) -> String {
        let mut out = String::new();

        if !self.data.is_empty() {
            out.push_str(&self.data);
            out.push('\n');
        }

        out.push_str(&self.entry);

        if !self.code.is_empty() {
            out.push('\n');
            out.push_str(&self.code);
        }

        out
    }
}
