//! The code generator.
//!
//! One pre-pass over the top level fills the symbol tables, then `main` is
//! compiled and every procedure it (transitively) calls follows, in
//! call-site order. The entry block runs the initialisers of every used
//! variable before `cal f_main`.

use std::collections::HashMap;
use std::mem;

use russel_ast::{Attrs, Call, Expr, Id, Let, MacroDef, Proc, Stmt, Stmts};
use russel_diag::Diag;
use russel_lexer::Where;

use crate::asm::{Asm, Section};
use crate::intrinsics;
use crate::names;

pub const MAIN_PROC_NAME: &str = "main";

/// The primitive type names `let` and procedure heads may mention.
const TYPE_NAMES: &[&str] = &["int", "bool", "string"];

/// Label prefix for the entry block. A lone `_` is not in the image of the
/// name mangler, so user procedures can never collide with it.
const ENTRY_SCOPE: &str = "_";

struct ProcEntry<'ast> {
    node: &'ast Proc,
    used: bool,
    /// The body has (or is having) its label emitted; calls may reference
    /// `f_<name>` without queueing it again.
    emitted: bool,
}

struct VarEntry<'ast> {
    decl: &'ast Let,
    used: bool,
    top_level: bool,
    init_emitted: bool,
}

struct MacroEntry<'ast> {
    node: &'ast MacroDef,
}

struct LoopFrame {
    loop_label: String,
    end_label: String,
}

/// Walks one parsed program and produces the assembly text.
pub struct Compiler<'ast, 'd> {
    diag: &'d mut Diag,
    asm: Asm,

    procs: HashMap<String, ProcEntry<'ast>>,
    proc_order: Vec<String>,
    vars: HashMap<String, VarEntry<'ast>>,
    var_order: Vec<String>,
    macros: HashMap<String, MacroEntry<'ast>>,
    macro_order: Vec<String>,

    /// Callees referenced but not yet emitted, per procedure frame.
    to_compile: Vec<String>,
    /// Innermost loop last; `break`/`continue` target its labels.
    loops: Vec<LoopFrame>,
    /// Inline procedures currently being spliced, to refuse self-inlining.
    inlining: Vec<String>,
    /// Macros currently being expanded, to refuse self-expansion.
    expanding: Vec<String>,

    /// Mangled name of the procedure being emitted; prefixes labels and
    /// string data objects.
    scope: String,
    in_main: bool,
    labels: usize,
    strings: usize,
    nest: usize,
}

impl<'ast, 'd> Compiler<'ast, 'd> {
    pub fn new(diag: &'d mut Diag) -> Self {
        Compiler {
            diag,
            asm: Asm::new(),
            procs: HashMap::new(),
            proc_order: vec![],
            vars: HashMap::new(),
            var_order: vec![],
            macros: HashMap::new(),
            macro_order: vec![],
            to_compile: vec![],
            loops: vec![],
            inlining: vec![],
            expanding: vec![],
            scope: String::new(),
            in_main: false,
            labels: 0,
            strings: 0,
            nest: 0,
        }
    }

    /// Compile a parsed program. `file_end` anchors the missing-`main`
    /// suggestion. Always returns the program text; the caller checks the
    /// sink before using it.
    pub fn compile(mut self, program: &'ast Stmts, file_end: &Where) -> String {
        for stmt in &program.list {
            match stmt {
                Stmt::Proc(node) => self.register_proc(node),
                Stmt::Let(node) => self.register_var(node),
                Stmt::MacroDef(node) => self.register_macro(node),
                _ => {}
            }
        }

        if !self.procs.contains_key(MAIN_PROC_NAME) {
            self.diag
                .error_simple(&format!("Missing entry function '{}'", MAIN_PROC_NAME));
            self.diag.suggest_code(
                file_end,
                "Suggestion: add",
                &[
                    "proc (main) -> int {",
                    "    # Put your entry code here",
                    "",
                    "    return -> 0",
                    "}",
                ],
            );
            return self.asm.finish();
        }

        self.compile_proc(MAIN_PROC_NAME);
        self.emit_entry();
        self.emit_var_slots();
        self.warn_unused();

        self.asm.finish()
    }

    // ---- Symbol registration ----

    fn register_proc(&mut self, node: &'ast Proc) {
        let name = &node.name.name;

        if let Some(ret) = &node.ret {
            if name != MAIN_PROC_NAME {
                self.diag
                    .error(&ret.loc, &format!("Return type is only allowed for '{}'", MAIN_PROC_NAME));
            } else {
                self.check_type(ret);
            }
        }

        // The entry block calls `f_main`, so it must have a body to call.
        if name == MAIN_PROC_NAME && node.attrs.has(Attrs::INLINE) {
            self.diag.error(
                &node.loc,
                &format!("'{}' cannot be marked inline", MAIN_PROC_NAME),
            );
            return;
        }

        if !self.check_name_free(&node.loc, name, "Function") {
            return;
        }

        self.procs.insert(
            name.clone(),
            ProcEntry {
                node,
                used: false,
                emitted: false,
            },
        );
        self.proc_order.push(name.clone());
    }

    fn register_var(&mut self, node: &'ast Let) {
        if let Some(ty) = &node.ty {
            self.check_type(ty);
        }

        let name = &node.name.name;
        if !self.check_name_free(&node.loc, name, "Variable") {
            return;
        }

        self.vars.insert(
            name.clone(),
            VarEntry {
                decl: node,
                used: false,
                top_level: true,
                init_emitted: false,
            },
        );
        self.var_order.push(name.clone());
    }

    fn register_macro(&mut self, node: &'ast MacroDef) {
        let name = &node.name.name;
        if !self.check_name_free(&node.loc, name, "Macro") {
            return;
        }

        self.macros.insert(name.clone(), MacroEntry { node });
        self.macro_order.push(name.clone());
    }

    /// Names are unique across procedures, variables, macros and the
    /// intrinsic set. Reports the clash and returns false if taken.
    fn check_name_free(&mut self, loc: &Where, name: &str, what: &str) -> bool {
        if intrinsics::is_intrinsic(name) {
            self.diag.error(
                loc,
                &format!("'{}' is a built-in and cannot be redefined", name),
            );
            return false;
        }

        let previous = if let Some(prev) = self.procs.get(name) {
            Some(prev.node.loc.clone())
        } else if let Some(prev) = self.vars.get(name) {
            Some(prev.decl.loc.clone())
        } else {
            self.macros.get(name).map(|prev| prev.node.loc.clone())
        };

        match previous {
            Some(prev_loc) => {
                self.diag.error(loc, &format!("{} '{}' redefined", what, name));
                self.diag.note(&prev_loc, "Previously defined here");
                false
            }
            None => true,
        }
    }

    fn check_type(&mut self, ty: &Id) {
        if !TYPE_NAMES.contains(&ty.name.as_str()) {
            self.diag
                .error(&ty.loc, &format!("Unknown type '{}'", ty.name));
        }
    }

    // ---- Procedures ----

    /// Compile a procedure body. Inline procedures splice into the current
    /// emission point; everything else gets its own labelled section, with
    /// procedures it referenced compiled right after it.
    fn compile_proc(&mut self, name: &str) {
        let (node, inline) = match self.procs.get_mut(name) {
            Some(entry) => {
                entry.used = true;
                (entry.node, entry.node.attrs.has(Attrs::INLINE))
            }
            None => return,
        };

        if inline {
            if self.inlining.iter().any(|active| active == name) {
                self.diag.error(
                    &node.loc,
                    &format!("Inline function '{}' inlines itself", name),
                );
                return;
            }

            self.inlining.push(name.to_string());
            self.compile_stmts(&node.body);
            self.inlining.pop();
            return;
        }

        if let Some(entry) = self.procs.get_mut(name) {
            entry.emitted = true;
        }

        let saved_section = self.asm.section();
        let saved_queue = mem::take(&mut self.to_compile);
        let saved_loops = mem::take(&mut self.loops);
        let saved_scope = mem::replace(&mut self.scope, names::mangle(name));
        let saved = (self.in_main, self.labels, self.strings, self.nest);

        self.in_main = name == MAIN_PROC_NAME;
        self.labels = 0;
        self.strings = 0;
        self.nest = 0;
        self.asm.select(Section::Code);

        self.asm.label(&format!("f_{}", self.scope));
        self.compile_stmts(&node.body);
        self.asm.inst("ret");

        let queue = mem::take(&mut self.to_compile);

        self.to_compile = saved_queue;
        self.loops = saved_loops;
        self.scope = saved_scope;
        (self.in_main, self.labels, self.strings, self.nest) = saved;
        self.asm.select(saved_section);

        for callee in queue {
            if self.diag.aborted() {
                break;
            }
            let pending = self.procs.get(&callee).is_some_and(|entry| !entry.emitted);
            if pending {
                self.compile_proc(&callee);
            }
        }
    }

    /// The `.entry` block: used-variable initialisers in declaration
    /// order, then call `main` and halt with exit code 0.
    fn emit_entry(&mut self) {
        self.asm.select(Section::Entry);
        self.scope = ENTRY_SCOPE.to_string();
        self.in_main = false;
        self.labels = 0;
        self.strings = 0;
        self.nest = 0;

        self.asm.label("entry");

        // An initialiser can reference (and thereby mark used) a variable
        // that nothing else used, so rescan until nothing new appears.
        loop {
            let mut progress = false;

            for name in self.var_order.clone() {
                let pending = self
                    .vars
                    .get(&name)
                    .is_some_and(|entry| entry.top_level && entry.used && !entry.init_emitted);
                if !pending {
                    continue;
                }

                if let Some(entry) = self.vars.get_mut(&name) {
                    entry.init_emitted = true;
                }
                progress = true;

                let decl = self.vars.get(&name).map(|entry| entry.decl);
                if let Some(init) = decl.and_then(|decl| decl.init.as_ref()) {
                    self.compile_expr(init);
                    self.write_slot(&slot_label(&name));
                }
            }

            if !progress {
                break;
            }
        }

        self.asm.inst_with("cal", "f_main");
        self.asm.inst_with("psh", 0);
        self.asm.inst("hlt");

        // Procedures first referenced by an initialiser still need bodies.
        let queue = mem::take(&mut self.to_compile);
        for callee in queue {
            if self.diag.aborted() {
                break;
            }
            let pending = self.procs.get(&callee).is_some_and(|entry| !entry.emitted);
            if pending {
                self.compile_proc(&callee);
            }
        }
    }

    /// One zeroed 64-bit data object per used variable.
    fn emit_var_slots(&mut self) {
        for name in self.var_order.clone() {
            let used = self.vars.get(&name).is_some_and(|entry| entry.used);
            if used {
                self.asm.data_word(&slot_label(&name), 0);
            }
        }
    }

    fn warn_unused(&mut self) {
        for name in self.proc_order.clone() {
            let unused = self
                .procs
                .get(&name)
                .filter(|entry| !entry.used)
                .map(|entry| entry.node.loc.clone());
            if let Some(loc) = unused {
                self.diag
                    .warning(&loc, &format!("Unused function '{}'", name));
            }
        }
    }

    // ---- Statements ----

    fn compile_stmts(&mut self, stmts: &'ast Stmts) {
        for stmt in &stmts.list {
            if self.diag.aborted() {
                return;
            }
            self.compile_stmt(stmt);
        }
    }

    fn compile_stmt(&mut self, stmt: &'ast Stmt) {
        match stmt {
            Stmt::Expr(expr) => self.compile_expr(expr),
            Stmt::Let(node) => self.compile_let(node),

            Stmt::Assign(node) => {
                self.compile_expr(&node.value);
                if let Some(slot) = self.var_slot(&node.name) {
                    self.write_slot(&slot);
                }
            }

            Stmt::Increment(node) => {
                if let Some(slot) = self.var_slot(&node.name) {
                    self.asm.inst_with("psh", &slot);
                    self.asm.inst("r64");
                    self.asm.inst(if node.negative { "dec" } else { "inc" });
                    self.write_slot(&slot);
                }
            }

            Stmt::Return(node) => self.compile_return(node),
            Stmt::If(node) => self.compile_if(node),
            Stmt::While(node) => self.compile_while(node),
            Stmt::For(node) => self.compile_for(node),

            Stmt::Break { loc } => match self.loops.last() {
                Some(frame) => {
                    let target = frame.end_label.clone();
                    self.asm.inst_with("jmp", target);
                }
                None => self.diag.error(loc, "'break' outside of a loop"),
            },

            Stmt::Continue { loc } => match self.loops.last() {
                Some(frame) => {
                    let target = frame.loop_label.clone();
                    self.asm.inst_with("jmp", target);
                }
                None => self.diag.error(loc, "'continue' outside of a loop"),
            },

            Stmt::MacroDef(node) => self.diag.error(
                &node.loc,
                "Macro declarations are only allowed at top-level",
            ),

            Stmt::Proc(node) => self.diag.error(
                &node.loc,
                "Procedure declarations are only allowed at top-level",
            ),
        }
    }

    /// A `let` in a procedure body hoists to a global 64-bit slot; the
    /// initialiser runs in place.
    fn compile_let(&mut self, node: &'ast Let) {
        if let Some(ty) = &node.ty {
            self.check_type(ty);
        }

        let name = &node.name.name;
        if !self.check_name_free(&node.loc, name, "Variable") {
            return;
        }

        self.vars.insert(
            name.clone(),
            VarEntry {
                decl: node,
                used: false,
                top_level: false,
                init_emitted: true,
            },
        );
        self.var_order.push(name.clone());

        if let Some(init) = &node.init {
            self.compile_expr(init);
            if let Some(entry) = self.vars.get_mut(name) {
                entry.used = true;
            }
            self.write_slot(&slot_label(name));
        }
    }

    fn compile_return(&mut self, node: &'ast russel_ast::Return) {
        if self.in_main {
            if let Some(value) = &node.value {
                self.compile_expr(value);
            }
            self.asm.inst("hlt");
        } else if node.value.is_some() {
            self.diag.error(
                &node.loc,
                &format!("Returning a value is only supported in '{}'", MAIN_PROC_NAME),
            );
        } else {
            self.asm.inst("ret");
        }
    }

    fn compile_if(&mut self, node: &'ast russel_ast::If) {
        if let Some(init) = &node.init {
            self.compile_let(init);
        }

        self.compile_expr(&node.cond);
        if !node.invert {
            self.asm.inst("not");
        }

        let base = self.label_base();
        let end_label = format!("{}_end_if", base);

        match &node.else_block {
            Some(else_block) => {
                let else_label = format!("{}_else", base);
                self.asm.inst_with("jnz", &else_label);
                self.nest += 1;
                self.compile_stmts(&node.then_block);
                self.nest -= 1;
                self.asm.inst_with("jmp", &end_label);
                self.asm.label(&else_label);
                self.nest += 1;
                self.compile_stmts(else_block);
                self.nest -= 1;
                self.asm.label(&end_label);
            }
            None => {
                self.asm.inst_with("jnz", &end_label);
                self.nest += 1;
                self.compile_stmts(&node.then_block);
                self.nest -= 1;
                self.asm.label(&end_label);
            }
        }
    }

    fn compile_while(&mut self, node: &'ast russel_ast::While) {
        let base = self.label_base();
        let loop_label = format!("{}_loop", base);
        let end_label = format!("{}_end_loop", base);

        self.asm.label(&loop_label);
        self.compile_expr(&node.cond);
        if !node.invert {
            self.asm.inst("not");
        }
        self.asm.inst_with("jnz", &end_label);

        self.loops.push(LoopFrame {
            loop_label: loop_label.clone(),
            end_label: end_label.clone(),
        });
        self.nest += 1;
        self.compile_stmts(&node.body);
        self.nest -= 1;
        self.loops.pop();

        self.asm.inst_with("jmp", &loop_label);
        self.asm.label(&end_label);
    }

    fn compile_for(&mut self, node: &'ast russel_ast::For) {
        if let Some(init) = &node.init {
            self.compile_let(init);
        }

        let base = self.label_base();
        let loop_label = format!("{}_loop", base);
        let skip_label = format!("{}_loop_skip", base);
        let end_label = format!("{}_end_loop", base);

        // The step statement sits before the condition check and is jumped
        // over on the first pass; `continue` re-enters through it.
        self.asm.inst_with("jmp", &skip_label);
        self.asm.label(&loop_label);
        if let Some(step) = &node.step {
            self.compile_stmt(step);
        }
        self.asm.label(&skip_label);

        match &node.cond {
            Some(cond) => self.compile_expr(cond),
            None => self.asm.inst_with("psh", 1),
        }
        self.asm.inst("not");
        self.asm.inst_with("jnz", &end_label);

        self.loops.push(LoopFrame {
            loop_label: loop_label.clone(),
            end_label: end_label.clone(),
        });
        self.nest += 1;
        self.compile_stmts(&node.body);
        self.nest -= 1;
        self.loops.pop();

        self.asm.inst_with("jmp", &loop_label);
        self.asm.label(&end_label);
    }

    // ---- Expressions ----

    fn compile_expr(&mut self, expr: &'ast Expr) {
        match expr {
            Expr::Int { value, .. } => self.asm.inst_with("psh", value),

            Expr::Bool { value, .. } => {
                self.asm.inst_with("psh", i64::from(*value));
            }

            Expr::Str { value, .. } => {
                let label = format!("s_{}_{}", self.scope, self.strings);
                self.strings += 1;
                self.asm.data_bytes(&label, value.as_bytes());
                self.asm.inst_with("psh", &label);
                self.asm.inst_with("psh", format!("(sizeof {})", label));
            }

            Expr::Id(id) => self.compile_id(id),
            Expr::Call(call) => self.compile_call(call),
        }
    }

    fn compile_id(&mut self, id: &Id) {
        if let Some(entry) = self.macros.get(&id.name) {
            let body: &'ast Expr = &entry.node.body;

            if self.expanding.iter().any(|active| active == &id.name) {
                self.diag
                    .error(&id.loc, &format!("Macro '{}' expands itself", id.name));
                return;
            }

            self.expanding.push(id.name.clone());
            self.compile_expr(body);
            self.expanding.pop();
            return;
        }

        if let Some(entry) = self.vars.get_mut(&id.name) {
            entry.used = true;
            let slot = slot_label(&id.name);
            self.asm.inst_with("psh", slot);
            self.asm.inst("r64");
            return;
        }

        self.diag
            .error(&id.loc, &format!("Unknown macro/variable '{}'", id.name));
        let candidates: Vec<String> = self
            .var_order
            .iter()
            .chain(self.macro_order.iter())
            .cloned()
            .collect();
        self.suggest(&id.loc, &id.name, candidates);
    }

    fn compile_call(&mut self, call: &'ast Call) {
        for arg in &call.args {
            self.compile_expr(arg);
        }

        let name = &call.name.name;

        if let Some(op) = intrinsics::opcode(name) {
            self.asm.inst(op);
            return;
        }

        let target = self
            .procs
            .get(name)
            .map(|entry| (entry.node.attrs.has(Attrs::INLINE), entry.emitted));

        match target {
            Some((true, _)) => self.compile_proc(name),

            Some((false, emitted)) => {
                if let Some(entry) = self.procs.get_mut(name) {
                    entry.used = true;
                }
                self.asm
                    .inst_with("cal", format!("f_{}", names::mangle(name)));
                if !emitted && !self.to_compile.iter().any(|queued| queued == name) {
                    self.to_compile.push(name.clone());
                }
            }

            None => {
                self.diag
                    .error(&call.name.loc, &format!("Unknown function '{}'", name));
                let candidates: Vec<String> = intrinsics::names()
                    .map(str::to_string)
                    .chain(self.proc_order.iter().cloned())
                    .collect();
                self.suggest(&call.name.loc, name, candidates);
            }
        }
    }

    // ---- Variable access ----

    /// Resolve a name in variable position, marking it used. Reports and
    /// suggests on failure.
    fn var_slot(&mut self, id: &Id) -> Option<String> {
        if let Some(entry) = self.vars.get_mut(&id.name) {
            entry.used = true;
            return Some(slot_label(&id.name));
        }

        if self.macros.contains_key(&id.name) {
            self.diag.error(
                &id.loc,
                &format!("'{}' is a macro, not a variable", id.name),
            );
            return None;
        }

        self.diag
            .error(&id.loc, &format!("Unknown variable '{}'", id.name));
        let candidates: Vec<String> = self.var_order.to_vec();
        self.suggest(&id.loc, &id.name, candidates);
        None
    }

    /// Store the value on top of the stack into a slot.
    fn write_slot(&mut self, slot: &str) {
        self.asm.inst_with("psh", slot);
        self.asm.inst_with("swp", 0);
        self.asm.inst("w64");
    }

    // ---- Helpers ----

    fn label_base(&mut self) -> String {
        let base = format!("l_{}_{}_{}", self.scope, self.labels, self.nest);
        self.labels += 1;
        base
    }

    fn suggest(&mut self, loc: &Where, name: &str, candidates: Vec<String>) {
        if let Some(best) = names::closest(name, candidates.iter().map(String::as_str)) {
            self.diag.suggest_name(loc, best);
        }
    }
}

fn slot_label(name: &str) -> String {
    format!("v_{}", names::mangle(name))
}
