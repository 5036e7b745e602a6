use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anise_core::error::ERROR_TAG;
use anise_core::CompileOptions;

use anise_lang::{compile_file, compile_source, render_ast, VERSION};

fn help() -> ! {
    println!("Usage: anise [--ast] [--indent STR] [-e CODE] [file]");
    println!();
    println!("Compiles anise source to Lua text on stdout.");
    println!();
    println!("Options:");
    println!("  -e CODE        Compile CODE instead of reading a file");
    println!("  --ast          Print the parsed forms instead of compiling");
    println!("  --indent STR   Indent emitted blocks with STR (default: two spaces)");
    println!("  --version      Show version");
    println!("  -h, --help     Show this help");
    std::process::exit(0);
}

fn unknown_option(opt: &str) -> ! {
    eprintln!("unknown option: {}", opt);
    help();
}

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let mut file: Option<PathBuf> = None;
    let mut inline: Option<String> = None;
    let mut indent: Option<String> = None;
    let mut print_ast = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => help(),
            "--version" => {
                println!("anise {}", VERSION);
                return ExitCode::SUCCESS;
            }
            "--ast" => print_ast = true,
            "--indent" => match args.next() {
                Some(value) => indent = Some(value),
                None => {
                    eprintln!("--indent requires a value");
                    return ExitCode::FAILURE;
                }
            },
            "-e" => match args.next() {
                Some(code) => inline = Some(code),
                None => {
                    eprintln!("-e requires code");
                    return ExitCode::FAILURE;
                }
            },
            other if other.starts_with('-') => unknown_option(other),
            other => file = Some(PathBuf::from(other)),
        }
    }

    let mut options = CompileOptions::default();
    if let Some(indent) = indent {
        options = options.with_indent(indent);
    }

    let result = match (&inline, &file) {
        (Some(code), _) => {
            let options = options.with_source_name("command line");
            if print_ast {
                render_ast(code).map_err(|err| err.to_string())
            } else {
                compile_source(code, &options).map_err(|err| err.to_string())
            }
        }
        (None, Some(path)) => {
            if print_ast {
                std::fs::read_to_string(path)
                    .map_err(|err| format!("cannot read {}: {}", path.display(), err))
                    .and_then(|source| render_ast(&source).map_err(|err| err.to_string()))
            } else {
                compile_file(path, &options)
            }
        }
        (None, None) => {
            eprintln!("no input: pass a file or -e CODE");
            help();
        }
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{} {}", ERROR_TAG, message);
            ExitCode::FAILURE
        }
    }
}
