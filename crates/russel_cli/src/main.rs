//! Russel CLI — the `russel` binary.
//!
//! Modes:
//!   russel build FILE        Compile FILE and assemble it with `anasm`
//!   russel run FILE          Reserved; not implemented
//!
//! Options:
//!   -o PATH        Output binary path
//!   -version, -v   Print name and version
//!   -help, -h      Print usage
//!   -maxE N        Maximum number of errors before abort

mod compile;

use std::env;
use std::process;

use compile::Options;

const APP_NAME: &str = "russel";
const VERSION: &str = "0.14.1";
const GITHUB_LINK: &str = "https://github.com/avm-collection/russel";

const ASCII_LOGO: &str = r" ____                    _
|  _ \                  | |
| |_) |   _ ___ ___  ___| |
|    / | | / __/ __\/ _ \ |
| |\ \ |_| \__ \__ \  __/ |
|_| \_\__,_\___/___/\___/_|";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let opts = match Options::parse(&args) {
        Ok(opts) => opts,
        Err(msg) => {
            print_error(&msg);
            print_try_help();
            process::exit(1);
        }
    };

    if opts.help {
        usage();
        return;
    }
    if opts.version {
        version();
        return;
    }

    let mut positional = opts.positional.iter();
    let mode = match positional.next() {
        Some(mode) => mode.as_str(),
        None => {
            print_error("No mode specified");
            print_try_help();
            process::exit(1);
        }
    };

    let result = match mode {
        "build" => cmd_build(&opts, positional.as_slice()),

        "run" => {
            print_error("'run' mode is not implemented yet");
            Err(1)
        }

        mode => {
            print_error(&format!("Unknown mode '{}'", mode));
            print_try_help();
            Err(1)
        }
    };

    match result {
        Ok(()) => process::exit(0),
        Err(code) => process::exit(code),
    }
}

fn cmd_build(opts: &Options, rest: &[String]) -> Result<(), i32> {
    let file = match rest.first() {
        Some(file) => file,
        None => {
            print_error("Build system mode is not implemented yet");
            return Err(1);
        }
    };

    if let Some(extra) = rest.get(1) {
        print_error(&format!("Unexpected argument '{}'", extra));
        print_try_help();
        return Err(1);
    }

    compile::build(file, opts)
}

fn print_error(msg: &str) {
    eprintln!("Error: {}", msg);
}

fn print_try_help() {
    let prog = env::args().next().unwrap_or_else(|| APP_NAME.to_string());
    eprintln!("Try '{} -h'", prog);
}

fn usage() {
    println!("{} v{}\n", ASCII_LOGO, VERSION);
    println!("Github: {}", GITHUB_LINK);
    println!("Usage: {} [build [FILE] | run FILE] [OPTIONS]", APP_NAME);
    println!("Options:");
    println!("  -o PATH        Path of the output binary");
    println!("  -version, -v   Show the version");
    println!("  -help, -h      Show this message");
    println!(
        "  -maxE N        Max amount of compiler errors (default {})",
        russel_diag::DEFAULT_MAX_ERRORS
    );
}

fn version() {
    println!("{} {}", APP_NAME, VERSION);
}
