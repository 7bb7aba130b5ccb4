//! Russel diagnostics — the sink every pipeline stage reports into.
//!
//! Renders errors, warnings and notes with a caret-style source excerpt,
//! counts errors against a configurable ceiling, and offers the two
//! specialised note forms: a "did you mean" name suggestion and a
//! multi-line code suggestion.
//!
//! The sink is an explicit collaborator, not a global: tests (and any
//! future batch driver) can run several compilations in one process, each
//! with its own `Diag`.

use std::io::{self, Write};

use ansi_term::{Colour, Style};
use russel_lexer::Where;

pub const DEFAULT_MAX_ERRORS: usize = 8;

#[derive(Clone, Copy)]
enum Kind {
    Error,
    Warning,
    Note,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Error => "Error",
            Kind::Warning => "Warning",
            Kind::Note => "Note",
        }
    }

    fn style(self) -> Style {
        match self {
            Kind::Error => Colour::Red.bold(),
            Kind::Warning => Colour::Yellow.bold(),
            Kind::Note => Colour::Cyan.bold(),
        }
    }
}

/// The diagnostic sink.
pub struct Diag {
    out: Box<dyn Write>,
    colors: bool,
    max_errors: usize,
    errors: usize,
    first: bool,
    aborted: bool,
}

impl Diag {
    /// Sink writing styled output to stderr — what the driver uses.
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(io::stderr()), true)
    }

    /// Sink writing plain output to an arbitrary writer — what tests use.
    pub fn to_writer(out: Box<dyn Write>) -> Self {
        Self::with_writer(out, false)
    }

    fn with_writer(out: Box<dyn Write>, colors: bool) -> Self {
        Diag {
            out,
            colors,
            max_errors: DEFAULT_MAX_ERRORS,
            errors: 0,
            first: true,
            aborted: false,
        }
    }

    pub fn set_max_errors(&mut self, max: usize) {
        self.max_errors = max;
    }

    /// Has any error been reported? Gates the pipeline between stages.
    pub fn had_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// The error ceiling was hit; stages should stop working.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn error(&mut self, loc: &Where, msg: &str) {
        if !self.count_error() {
            return;
        }
        self.separator();
        self.template(loc, msg, Kind::Error, None);
    }

    /// Error without a source position.
    pub fn error_simple(&mut self, msg: &str) {
        if !self.count_error() {
            return;
        }
        self.separator();
        let label = self.paint(Kind::Error.style(), Kind::Error.label());
        let _ = writeln!(self.out, "{}: {}", label, msg);
    }

    pub fn warning(&mut self, loc: &Where, msg: &str) {
        if self.aborted {
            return;
        }
        self.separator();
        self.template(loc, msg, Kind::Warning, None);
    }

    pub fn note(&mut self, loc: &Where, msg: &str) {
        if self.aborted {
            return;
        }
        self.separator();
        self.template(loc, msg, Kind::Note, None);
    }

    /// Note that re-renders the excerpt with `name` in place of the
    /// highlighted slice, asking `Did you mean 'name'?`.
    pub fn suggest_name(&mut self, loc: &Where, name: &str) {
        if self.aborted {
            return;
        }
        self.separator();
        self.template(loc, &format!("Did you mean '{}'?", name), Kind::Note, Some(name));
    }

    /// Note followed by a block of suggested code, each line prefixed with
    /// `+` and a synthetic row number counting on from `loc.row`.
    pub fn suggest_code(&mut self, loc: &Where, msg: &str, lines: &[&str]) {
        if self.aborted {
            return;
        }
        self.separator();

        let label = self.paint(Kind::Note.style(), Kind::Note.label());
        let at = self.paint(Style::new().bold(), &loc.to_string());
        let _ = writeln!(self.out, "{}: {}: {}", label, at, msg);

        let last_row = loc.row + lines.len().saturating_sub(1);
        let width = last_row.to_string().len();
        for (i, line) in lines.iter().enumerate() {
            let _ = writeln!(self.out, "    {:>width$} + {}", loc.row + i, line);
        }
    }

    /// Count one error toward the ceiling. Returns false when the
    /// diagnostic must be suppressed (already aborted, or this error
    /// tripped the ceiling).
    fn count_error(&mut self) -> bool {
        if self.aborted {
            return false;
        }

        self.errors += 1;
        if self.errors > self.max_errors {
            let _ = writeln!(self.out, "...");
            let _ = writeln!(self.out, "Compilation aborted");
            self.aborted = true;
            return false;
        }

        true
    }

    /// Blank line between diagnostics; nothing before the first.
    fn separator(&mut self) {
        if self.first {
            self.first = false;
        } else {
            let _ = writeln!(self.out);
        }
    }

    /// The two-line header + excerpt block shared by every kind.
    ///
    /// `main_override` substitutes the highlighted slice (used by the name
    /// suggestion).
    fn template(&mut self, loc: &Where, msg: &str, kind: Kind, main_override: Option<&str>) {
        let label = self.paint(kind.style(), kind.label());
        let at = self.paint(Style::new().bold(), &loc.to_string());
        let _ = writeln!(self.out, "{}: {}: {}", label, at, msg);

        let line = loc.line.as_ref();
        let idx = (loc.col.saturating_sub(1)).min(line.len());
        let end = (idx + loc.len).min(line.len());

        let (before, main, after) = match (line.get(..idx), line.get(idx..end), line.get(end..)) {
            (Some(before), Some(main), Some(after)) => (before, main, after),
            // A slice boundary fell inside a multi-byte character; show the
            // line without a highlight rather than panic.
            _ => (line, "", ""),
        };

        let main = main_override.unwrap_or(main);
        let main = self.paint(kind.style(), &expand_tabs(main));
        let _ = writeln!(
            self.out,
            "    {} | {}{}{}",
            loc.row,
            expand_tabs(before),
            main,
            expand_tabs(after)
        );
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.colors {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }
}

fn expand_tabs(text: &str) -> String {
    text.replace('\t', "    ")
}
