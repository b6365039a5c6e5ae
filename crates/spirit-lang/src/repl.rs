use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use spirit_core::env::{ScopeRef, SpiritRef};
use spirit_core::error::{format_error, ERROR_TAG};
use spirit_core::reader::Reader;
use spirit_core::stack;

use crate::VERSION;

const PROMPT: &str = "λ >>";
const MULTILINE: &str = "|";

/// Read-eval-print loop. Partial input (the reader's EOF sentinel)
/// keeps accumulating lines under the continuation prompt; every other
/// error is reported and the loop continues.
pub fn run(spirit: &SpiritRef, scope: &ScopeRef) {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{} readline: {}", ERROR_TAG, e);
            std::process::exit(1);
        }
    };
    let hist_path = crate::history_path();
    if let Some(ref path) = hist_path {
        let _ = rl.load_history(path);
    }

    println!("spirit {}", VERSION);
    println!("Visit https://github.com/issadarkthing/spirit for more.");

    'outer: loop {
        let ns = spirit.current_ns();
        let mut src = String::new();
        loop {
            let prompt = if src.is_empty() {
                format!("{} {} ", ns, PROMPT)
            } else {
                format!("{}{} ", " ".repeat(ns.len() + PROMPT.len()), MULTILINE)
            };
            let line = match rl.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => break,
                Err(ReadlineError::Eof) => break 'outer,
                Err(e) => {
                    eprintln!("{} readline: {}", ERROR_TAG, e);
                    break 'outer;
                }
            };
            src.push_str(&line);
            src.push('\n');
            if src.trim().is_empty() {
                break;
            }

            let module = match Reader::with_file(&src, "REPL").all() {
                Ok(module) => module,
                Err(e) if e.is_eof() => continue,
                Err(e) => {
                    for line in format_error(&e) {
                        println!("{}", line);
                    }
                    break;
                }
            };

            if let Some(ref path) = hist_path {
                let _ = rl.add_history_entry(src.trim());
                let _ = rl.append_history(path);
            }

            match spirit_core::eval::eval(scope, &module) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    for line in format_error(&e) {
                        println!("{}", line);
                    }
                }
            }
            // A failed evaluation leaves its frames in place for the
            // trace above; start the next form clean.
            stack::clear();
            break;
        }
    }
    println!("Bye!");
}
