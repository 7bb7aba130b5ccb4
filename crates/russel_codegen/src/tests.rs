//! End-to-end emission tests: source text in, assembly fragments out.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use russel_diag::Diag;
use russel_parser::Parser;

use crate::compiler::Compiler;

#[derive(Clone)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Helper: run the whole pipeline, asserting it is clean, and return the
/// emitted assembly.
fn compile_ok(source: &str) -> String {
    let (asm, diagnostics, errors) = compile(source);
    assert_eq!(errors, 0, "unexpected diagnostics:\n{}", diagnostics);
    asm
}

/// Helper: run the whole pipeline and return (assembly, diagnostics text,
/// error count).
fn compile(source: &str) -> (String, String, usize) {
    let buf = SharedBuf(Rc::new(RefCell::new(Vec::new())));
    let mut diag = Diag::to_writer(Box::new(buf.clone()));

    let result = Parser::new(source, "test.rsl", &mut diag).parse();
    let asm = Compiler::new(&mut diag).compile(&result.top, &result.file_end);

    let errors = diag.error_count();
    let text = String::from_utf8(buf.0.borrow().clone()).unwrap();
    (asm, text, errors)
}

/// Assert that `needles` occur in `haystack` in the given order.
fn assert_in_order(haystack: &str, needles: &[&str]) {
    let mut from = 0;
    for needle in needles {
        match haystack[from..].find(needle) {
            Some(at) => from += at + needle.len(),
            None => panic!(
                "missing {:?} (in order) in:\n{}",
                needle, haystack
            ),
        }
    }
}

// ========================================================
// Core scenarios
// ========================================================

#[test]
fn hello_world() {
    let asm = compile_ok("proc (main) -> int { (writef \"hi\") return -> 0 }");
    assert_in_order(
        &asm,
        &[
            "\tlet s_main_0 char = 104, 105\n",
            "\tpsh s_main_0\n",
            "\tpsh (sizeof s_main_0)\n",
            "\twrf\n",
            "\tpsh 0\n",
            "\thlt\n",
        ],
    );
}

#[test]
fn arithmetic_call_form() {
    let asm = compile_ok("proc (main) -> int { (iprint (+ 2 3)) return -> 0 }");
    assert_in_order(
        &asm,
        &["\tpsh 2\n", "\tpsh 3\n", "\tadd\n", "\tprt\n", "\tpsh 0\n", "\thlt\n"],
    );
}

#[test]
fn unless_emits_no_not() {
    let asm = compile_ok("proc (main) -> int { unless (== 1 1) { (halt) } return -> 0 }");
    assert_in_order(
        &asm,
        &[
            "\tpsh 1\n\tpsh 1\n\tequ\n\tjnz l_main_0_0_end_if\n",
            "\thlt\n",
            ".l_main_0_0_end_if\n",
        ],
    );
}

#[test]
fn if_emits_not() {
    let asm = compile_ok("proc (main) -> int { if (== 1 1) { (halt) } return -> 0 }");
    assert_in_order(&asm, &["\tequ\n", "\tnot\n", "\tjnz l_main_0_0_end_if\n"]);
}

#[test]
fn if_else_shape() {
    let asm = compile_ok(
        "proc (main) -> int { if (== 1 2) { (iprint 1) } else { (iprint 2) } return -> 0 }",
    );
    assert_in_order(
        &asm,
        &[
            "\tequ\n",
            "\tnot\n",
            "\tjnz l_main_0_0_else\n",
            "\tpsh 1\n\tprt\n",
            "\tjmp l_main_0_0_end_if\n",
            ".l_main_0_0_else\n",
            "\tpsh 2\n\tprt\n",
            ".l_main_0_0_end_if\n",
        ],
    );
}

#[test]
fn while_with_break() {
    let asm = compile_ok(
        "proc (main) -> int { let i = 0; while (< i 10) { if (== i 5) { break } ++ i } return -> 0 }",
    );
    assert_in_order(
        &asm,
        &[
            // Initialiser runs in place, before the loop.
            "\tpsh 0\n\tpsh v_i\n\tswp 0\n\tw64\n",
            ".l_main_0_0_loop\n",
            "\tpsh v_i\n\tr64\n\tpsh 10\n\tles\n\tnot\n",
            "\tjnz l_main_0_0_end_loop\n",
            // `break` jumps straight to the loop end.
            "\tjmp l_main_0_0_end_loop\n",
            ".l_main_1_1_end_if\n",
            // `++ i` and the back edge.
            "\tpsh v_i\n\tr64\n\tinc\n\tpsh v_i\n\tswp 0\n\tw64\n",
            "\tjmp l_main_0_0_loop\n",
            ".l_main_0_0_end_loop\n",
        ],
    );
    // The hoisted slot exists.
    assert_in_order(&asm, &["\tlet v_i i64 = 0\n"]);
}

#[test]
fn unknown_function_suggests_intrinsic() {
    let (_, text, errors) = compile("proc (main) -> int { (writfe \"hi\") return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Unknown function 'writfe'", "Did you mean 'writef'?"]);
}

#[test]
fn redefinition_notes_previous() {
    let (_, text, errors) =
        compile("proc (foo) { (iprint 1) }\nproc (foo) { (iprint 2) }\nproc (main) -> int { (foo) return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(
        &text,
        &[
            "Error: test.rsl:2:1: Function 'foo' redefined",
            "Note: test.rsl:1:1: Previously defined here",
        ],
    );
}

// ========================================================
// Entry block and variables
// ========================================================

#[test]
fn entry_calls_main_and_halts() {
    let asm = compile_ok("proc (main) -> int { return -> 0 }");
    assert_in_order(
        &asm,
        &[".entry\n", "\tcal f_main\n", "\tpsh 0\n", "\thlt\n", ".f_main\n"],
    );
}

#[test]
fn main_body_ends_with_ret() {
    let asm = compile_ok("proc (main) -> int { (iprint 1) }");
    assert_in_order(&asm, &[".f_main\n", "\tpsh 1\n", "\tprt\n", "\tret\n"]);
}

#[test]
fn used_global_gets_slot_and_initialiser() {
    let asm = compile_ok("let g = 41\nproc (main) -> int { (iprint g) return -> 0 }");
    // Slot.
    assert_in_order(&asm, &["\tlet v_g i64 = 0\n"]);
    // Initialiser runs in the entry block before main is called.
    assert_in_order(
        &asm,
        &[
            ".entry\n",
            "\tpsh 41\n",
            "\tpsh v_g\n\tswp 0\n\tw64\n",
            "\tcal f_main\n",
        ],
    );
    // The read in main.
    assert_in_order(&asm, &[".f_main\n", "\tpsh v_g\n\tr64\n", "\tprt\n"]);
}

#[test]
fn unused_global_gets_no_slot() {
    let asm = compile_ok("let unused = 1\nproc (main) -> int { return -> 0 }");
    assert!(!asm.contains("v_unused"));
}

#[test]
fn initialisers_run_in_declaration_order() {
    let asm = compile_ok(
        "let a = 1\nlet b = 2\nproc (main) -> int { (iprint a) (iprint b) return -> 0 }",
    );
    assert_in_order(
        &asm,
        &["\tpsh 1\n", "\tpsh v_a\n", "\tpsh 2\n", "\tpsh v_b\n", "\tcal f_main\n"],
    );
}

#[test]
fn initialiser_reading_another_global_pulls_it_in() {
    // `b` is the only variable main touches, but its initialiser reads `a`,
    // so `a` gets a slot and an initialiser too.
    let asm = compile_ok("let a = 7\nlet b = a\nproc (main) -> int { (iprint b) return -> 0 }");
    assert_in_order(&asm, &["\tlet v_a i64 = 0\n", "\tlet v_b i64 = 0\n"]);
    assert_in_order(&asm, &["\tpsh v_a\n\tr64\n", "\tpsh v_b\n\tswp 0\n\tw64\n"]);
}

#[test]
fn assignment_and_decrement() {
    let asm = compile_ok("proc (main) -> int { let x = 1; x = 5 -- x return -> 0 }");
    assert_in_order(
        &asm,
        &[
            "\tpsh 5\n\tpsh v_x\n\tswp 0\n\tw64\n",
            "\tpsh v_x\n\tr64\n\tdec\n\tpsh v_x\n\tswp 0\n\tw64\n",
        ],
    );
}

#[test]
fn assignment_to_unknown_variable() {
    let (_, text, errors) =
        compile("proc (main) -> int { let count = 0; cuont = 5 return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Unknown variable 'cuont'", "Did you mean 'count'?"]);
}

// ========================================================
// Procedures, calls, inlining
// ========================================================

#[test]
fn procedures_compile_in_call_site_order() {
    let asm = compile_ok(
        "proc (second) { (iprint 2) }\n\
         proc (first) { (iprint 1) }\n\
         proc (main) -> int { (first) (second) return -> 0 }",
    );
    assert_in_order(
        &asm,
        &[
            ".f_main\n",
            "\tcal f_first\n",
            "\tcal f_second\n",
            ".f_first\n",
            ".f_second\n",
        ],
    );
}

#[test]
fn call_before_definition_resolves_symbolically() {
    let asm = compile_ok("proc (main) -> int { (later) return -> 0 }\nproc (later) { (iprint 1) }");
    assert_in_order(&asm, &["\tcal f_later\n", ".f_later\n"]);
}

#[test]
fn recursive_procedure_compiles_once() {
    let asm = compile_ok(
        "proc (loop-forever) { (loop-forever) }\nproc (main) -> int { (loop-forever) return -> 0 }",
    );
    assert_eq!(asm.matches(".f_loop_2dforever\n").count(), 1);
    assert!(asm.contains("\tcal f_loop_2dforever\n"));
}

#[test]
fn inline_procedure_splices_without_call() {
    let asm = compile_ok(
        "proc (double) [inline] { (* 2) }\nproc (main) -> int { (iprint (double 21)) return -> 0 }",
    );
    // Arguments first, then the spliced body: no label, no call.
    assert_in_order(&asm, &["\tpsh 21\n", "\tpsh 2\n", "\tmul\n", "\tprt\n"]);
    assert!(!asm.contains("f_double"));
}

#[test]
fn inline_body_splices_at_every_call_site() {
    let asm = compile_ok(
        "proc (bump) [inline] { (+ 1) }\nproc (main) -> int { (iprint (bump (bump 1))) return -> 0 }",
    );
    assert_eq!(asm.matches("\tadd\n").count(), 2);
}

#[test]
fn self_inlining_is_rejected() {
    let (_, text, errors) = compile(
        "proc (spin) [inline] { (spin) }\nproc (main) -> int { (spin) return -> 0 }",
    );
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Inline function 'spin' inlines itself"]);
}

#[test]
fn interrupt_attribute_changes_nothing() {
    let with = compile_ok("proc (f) [interrupt] { (iprint 1) }\nproc (main) -> int { (f) return -> 0 }");
    let without = compile_ok("proc (f) { (iprint 1) }\nproc (main) -> int { (f) return -> 0 }");
    assert_eq!(with, without);
}

#[test]
fn return_value_outside_main_is_rejected() {
    let (_, text, errors) =
        compile("proc (f) { return -> 1 }\nproc (main) -> int { (f) return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Returning a value is only supported in 'main'"]);
}

#[test]
fn bare_return_outside_main_emits_ret() {
    let asm = compile_ok("proc (f) { return (iprint 1) }\nproc (main) -> int { (f) return -> 0 }");
    assert_in_order(&asm, &[".f_f\n", "\tret\n"]);
}

#[test]
fn return_type_on_non_main_is_rejected() {
    let (_, text, errors) =
        compile("proc (f) -> int { (iprint 1) }\nproc (main) -> int { (f) return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Return type is only allowed for 'main'"]);
}

#[test]
fn main_cannot_be_inline() {
    let (_, _, errors) = compile("proc (main) [inline] -> int { return -> 0 }");
    assert!(errors >= 1);
}

// ========================================================
// Missing main, dead code, name clashes
// ========================================================

#[test]
fn missing_main_suggests_a_skeleton() {
    let (_, text, errors) = compile("proc (helper) { (iprint 1) }\n");
    assert_eq!(errors, 1);
    assert_in_order(
        &text,
        &[
            "Error: Missing entry function 'main'",
            "Suggestion: add",
            "+ proc (main) -> int {",
            "+     # Put your entry code here",
            "+     return -> 0",
            "+ }",
        ],
    );
}

#[test]
fn unused_procedure_warns_once() {
    let (_, text, errors) =
        compile("proc (dead) { (iprint 1) }\nproc (main) -> int { return -> 0 }");
    assert_eq!(errors, 0);
    assert_eq!(text.matches("Unused function 'dead'").count(), 1);
    assert!(text.contains("Warning: test.rsl:1:1: Unused function 'dead'"));
}

#[test]
fn transitively_used_procedures_do_not_warn() {
    let (_, text, errors) = compile(
        "proc (inner) { (iprint 1) }\nproc (outer) { (inner) }\nproc (main) -> int { (outer) return -> 0 }",
    );
    assert_eq!(errors, 0);
    assert!(!text.contains("Unused"));
}

#[test]
fn intrinsic_names_cannot_be_redefined() {
    let (_, text, errors) = compile(
        "proc (writef) { (iprint 1) }\nlet halt = 1\nmacro + = 2\nproc (main) -> int { return -> 0 }",
    );
    assert_eq!(errors, 3);
    assert_eq!(
        text.matches("is a built-in and cannot be redefined").count(),
        3
    );
}

#[test]
fn name_clash_across_tables() {
    let (_, text, errors) =
        compile("let x = 1\nmacro x = 2\nproc (main) -> int { (iprint x) return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Macro 'x' redefined", "Previously defined here"]);
}

#[test]
fn break_and_continue_outside_loops() {
    let (asm, text, errors) = compile("proc (main) -> int { break continue return -> 0 }");
    assert_eq!(errors, 2);
    assert_in_order(&text, &["'break' outside of a loop", "'continue' outside of a loop"]);
    // No stray jumps were emitted for them.
    assert!(!asm.contains("jmp"));
}

// ========================================================
// Loops
// ========================================================

#[test]
fn for_loop_shape() {
    let asm = compile_ok(
        "proc (main) -> int { for let i = 0; (< i 3); ++ i { (iprint i) } return -> 0 }",
    );
    assert_in_order(
        &asm,
        &[
            // init
            "\tpsh 0\n\tpsh v_i\n\tswp 0\n\tw64\n",
            // jump over the step on the first pass
            "\tjmp l_main_0_0_loop_skip\n",
            ".l_main_0_0_loop\n",
            // step
            "\tpsh v_i\n\tr64\n\tinc\n",
            ".l_main_0_0_loop_skip\n",
            // condition
            "\tpsh v_i\n\tr64\n\tpsh 3\n\tles\n\tnot\n",
            "\tjnz l_main_0_0_end_loop\n",
            // body and back edge
            "\tprt\n",
            "\tjmp l_main_0_0_loop\n",
            ".l_main_0_0_end_loop\n",
        ],
    );
}

#[test]
fn for_without_condition_pushes_true() {
    let asm = compile_ok("proc (main) -> int { for ;; ; { break } return -> 0 }");
    assert_in_order(&asm, &["\tpsh 1\n", "\tnot\n", "\tjnz l_main_0_0_end_loop\n"]);
}

#[test]
fn continue_in_for_reenters_through_step() {
    let asm = compile_ok(
        "proc (main) -> int { for let i = 0; (< i 3); ++ i { continue } return -> 0 }",
    );
    // The body's continue jumps to the step label, not the skip label.
    assert_in_order(
        &asm,
        &["\tjnz l_main_0_0_end_loop\n", "\tjmp l_main_0_0_loop\n", "\tjmp l_main_0_0_loop\n"],
    );
}

#[test]
fn until_emits_no_not() {
    let asm = compile_ok("proc (main) -> int { until (== 1 1) { (iprint 1) } return -> 0 }");
    assert_in_order(&asm, &["\tequ\n\tjnz l_main_0_0_end_loop\n"]);
}

#[test]
fn nested_loops_have_independent_frames() {
    let asm = compile_ok(
        "proc (main) -> int {\n\
         while true {\n\
             while true { break }\n\
             break\n\
         }\n\
         return -> 0 }",
    );
    // Inner break targets the inner loop, outer break the outer loop.
    assert_in_order(
        &asm,
        &[
            ".l_main_0_0_loop\n",
            ".l_main_1_1_loop\n",
            "\tjmp l_main_1_1_end_loop\n",
            ".l_main_1_1_end_loop\n",
            "\tjmp l_main_0_0_end_loop\n",
            ".l_main_0_0_end_loop\n",
        ],
    );
}

#[test]
fn loop_labels_do_not_leak_into_later_procedures() {
    let asm = compile_ok(
        "proc (a) { while true { break } }\n\
         proc (b) { while true { break } }\n\
         proc (main) -> int { (a) (b) return -> 0 }",
    );
    assert_in_order(&asm, &[".l_a_0_0_loop\n", ".l_b_0_0_loop\n"]);
}

// ========================================================
// Macros
// ========================================================

#[test]
fn macro_reference_reemits_its_expression() {
    let asm = compile_ok(
        "macro answer = 42\nproc (main) -> int { (iprint answer) (iprint answer) return -> 0 }",
    );
    assert_eq!(asm.matches("\tpsh 42\n").count(), 2);
}

#[test]
fn macro_body_can_be_a_call_form() {
    let asm = compile_ok(
        "macro doubled = (* 2 21)\nproc (main) -> int { (iprint doubled) return -> 0 }",
    );
    assert_in_order(&asm, &["\tpsh 2\n", "\tpsh 21\n", "\tmul\n", "\tprt\n"]);
}

#[test]
fn self_expanding_macro_is_rejected() {
    let (_, text, errors) =
        compile("macro loop = loop\nproc (main) -> int { (iprint loop) return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Macro 'loop' expands itself"]);
}

#[test]
fn unknown_identifier_suggests_macro() {
    let (_, text, errors) = compile(
        "macro answer = 42\nproc (main) -> int { (iprint answre) return -> 0 }",
    );
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Unknown macro/variable 'answre'", "Did you mean 'answer'?"]);
}

#[test]
fn nested_macro_declaration_is_rejected() {
    let (_, text, errors) =
        compile("proc (main) -> int { macro ten = 10 return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Macro declarations are only allowed at top-level"]);
}

// ========================================================
// Literals and types
// ========================================================

#[test]
fn integer_bases_emit_decoded_values() {
    let asm = compile_ok(
        "proc (main) -> int { (iprint 0x10) (iprint 0o10) (iprint 0b110) (iprint 9) return -> 0 }",
    );
    assert_in_order(&asm, &["\tpsh 16\n", "\tpsh 8\n", "\tpsh 6\n", "\tpsh 9\n"]);
}

#[test]
fn booleans_push_one_and_zero() {
    let asm = compile_ok("proc (main) -> int { (iprint true) (iprint false) return -> 0 }");
    assert_in_order(&asm, &["\tpsh 1\n\tprt\n", "\tpsh 0\n\tprt\n"]);
}

#[test]
fn string_bytes_include_escapes() {
    let asm = compile_ok("proc (main) -> int { (writef \"a\\n\") return -> 0 }");
    assert_in_order(&asm, &["\tlet s_main_0 char = 97, 10\n"]);
}

#[test]
fn each_string_gets_its_own_object() {
    let asm = compile_ok(
        "proc (main) -> int { (writef \"a\") (writef \"b\") return -> 0 }",
    );
    assert_in_order(
        &asm,
        &["\tlet s_main_0 char = 97\n", "\tlet s_main_1 char = 98\n"],
    );
}

#[test]
fn unknown_type_is_reported() {
    let (_, text, errors) =
        compile("proc (main) -> int { let x : float = 1; return -> 0 }");
    assert_eq!(errors, 1);
    assert_in_order(&text, &["Unknown type 'float'"]);
}

#[test]
fn known_types_pass() {
    compile_ok("let a : int = 1\nproc (main) -> int { (iprint a) return -> 0 }");
}

// ========================================================
// Determinism
// ========================================================

#[test]
fn identical_input_identical_output() {
    let source = "let g = 3\nmacro m = (+ g 1)\n\
                  proc (helper) { (iprint m) }\n\
                  proc (main) -> int { (helper) while (< g 9) { ++ g } return -> 0 }";
    let first = compile_ok(source);
    for _ in 0..5 {
        assert_eq!(compile_ok(source), first);
    }
}

#[test]
fn suggestion_ties_resolve_to_first_declared() {
    let (_, text, _) = compile(
        "proc (aab) {}\nproc (aac) {}\nproc (main) -> int { (aaa) return -> 0 }",
    );
    assert_in_order(&text, &["Did you mean 'aab'?"]);
}
