//! The build pipeline — read, compile, write, assemble.

use std::fs;
use std::path::Path;
use std::process::Command;

use russel_codegen::Compiler;
use russel_diag::Diag;
use russel_parser::Parser;

/// Options parsed from the command line. Flags may appear before or after
/// the positional arguments.
#[derive(Debug, Clone)]
pub struct Options {
    pub out: Option<String>,
    pub max_errors: usize,
    pub help: bool,
    pub version: bool,
    pub positional: Vec<String>,
}

impl Options {
    pub fn parse(args: &[String]) -> Result<Options, String> {
        let mut opts = Options {
            out: None,
            max_errors: russel_diag::DEFAULT_MAX_ERRORS,
            help: false,
            version: false,
            positional: vec![],
        };

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-help" | "-h" => opts.help = true,
                "-version" | "-v" => opts.version = true,

                "-o" => match iter.next() {
                    Some(path) => opts.out = Some(path.clone()),
                    None => return Err("Option '-o' expects a path".to_string()),
                },

                "-maxE" => match iter.next().and_then(|n| n.parse().ok()) {
                    Some(max) => opts.max_errors = max,
                    None => return Err("Option '-maxE' expects a number".to_string()),
                },

                arg if arg.starts_with('-') => {
                    return Err(format!("Unknown option '{}'", arg));
                }

                _ => opts.positional.push(arg.clone()),
            }
        }

        Ok(opts)
    }
}

/// Compile `file` to assembly text, write it next to the output path, and
/// hand it to `anasm`. On success the intermediate `.anasm` file is
/// removed; when the assembler cannot be spawned it is left on disk.
pub fn build(file: &str, opts: &Options) -> Result<(), i32> {
    let out = output_base(file, opts.out.as_deref());
    let asm_path = format!("{}.anasm", out);

    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(_) => {
            eprintln!("Error: Could not open file '{}'", file);
            return Err(1);
        }
    };

    let mut diag = Diag::stderr();
    diag.set_max_errors(opts.max_errors);

    let parsed = Parser::new(&source, file, &mut diag).parse();
    if diag.had_errors() {
        return Err(1);
    }

    let program = Compiler::new(&mut diag).compile(&parsed.top, &parsed.file_end);
    if diag.had_errors() {
        return Err(1);
    }

    if let Err(err) = fs::write(&asm_path, program) {
        eprintln!("Error: Could not write '{}': {}", asm_path, err);
        return Err(1);
    }

    assemble(&asm_path, &out)
}

/// Run `anasm` over the emitted program with inherited standard streams,
/// propagating its exit code.
fn assemble(asm_path: &str, out: &str) -> Result<(), i32> {
    println!("[CMD] anasm -o {} {}", out, asm_path);

    let status = match Command::new("anasm")
        .arg("-o")
        .arg(out)
        .arg(asm_path)
        .status()
    {
        Ok(status) => status,
        Err(err) => {
            eprintln!("Error: Could not run 'anasm' on '{}': {}", asm_path, err);
            return Err(1);
        }
    };

    if !status.success() {
        return Err(status.code().unwrap_or(1));
    }

    println!("Remove '{}'", asm_path);
    let _ = fs::remove_file(asm_path);

    Ok(())
}

/// Derive the output name: `-o` wins; otherwise the source file's base
/// name loses its extension, or gains `.out` when it has none so the
/// binary never overwrites the source.
fn output_base(file: &str, out: Option<&str>) -> String {
    if let Some(out) = out {
        return out.to_string();
    }

    let path = Path::new(file);
    let base = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => file.to_string(),
    };

    if path.extension().is_some() {
        match Path::new(&base).file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => base,
        }
    } else {
        format!("{}.out", base)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
