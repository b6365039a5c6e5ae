use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use spirit_core::ast::Value;
use spirit_core::error::{format_error, ERROR_TAG};

use spirit_lang::{create_runtime, eval_file, repl, stdlib_path, VERSION};

fn help() -> ! {
    println!("Usage: spirit [-e EXPR] [-u] [-p FILE] [-v] [--cpuprofile FILE] [--memprofile FILE] [file args...]");
    println!();
    println!("Options:");
    println!("  -e EXPR              Evaluate EXPR and exit");
    println!("  -u                   Skip loading the standard library");
    println!("  -p FILE              Pre-load FILE before the REPL or script");
    println!("  -v                   Print version and exit");
    println!("  --cpuprofile FILE    Write a timing profile of the run");
    println!("  --memprofile FILE    Write a memory profile of the run");
    println!("  -h, --help           Show this help");
    std::process::exit(0);
}

fn fatal(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", ERROR_TAG, message);
    std::process::exit(1);
}

struct Options {
    execute: Option<String>,
    skip_stdlib: bool,
    preload: Option<PathBuf>,
    cpu_profile: Option<PathBuf>,
    mem_profile: Option<PathBuf>,
    script: Option<PathBuf>,
    script_args: Vec<String>,
}

fn parse_args() -> Options {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut opts = Options {
        execute: None,
        skip_stdlib: false,
        preload: None,
        cpu_profile: None,
        mem_profile: None,
        script: None,
        script_args: Vec::new(),
    };

    loop {
        match args.first().map(|s| s.as_str()) {
            Some("-e") => {
                if args.len() < 2 {
                    fatal("-e requires an expression");
                }
                opts.execute = Some(args[1].clone());
                args.drain(0..2);
            }
            Some("-u") => {
                opts.skip_stdlib = true;
                args.remove(0);
            }
            Some("-p") => {
                if args.len() < 2 {
                    fatal("-p requires a file");
                }
                opts.preload = Some(PathBuf::from(args[1].clone()));
                args.drain(0..2);
            }
            Some("-v") => {
                println!("{}", VERSION);
                std::process::exit(0);
            }
            Some("--cpuprofile") => {
                if args.len() < 2 {
                    fatal("--cpuprofile requires a file");
                }
                opts.cpu_profile = Some(PathBuf::from(args[1].clone()));
                args.drain(0..2);
            }
            Some("--memprofile") => {
                if args.len() < 2 {
                    fatal("--memprofile requires a file");
                }
                opts.mem_profile = Some(PathBuf::from(args[1].clone()));
                args.drain(0..2);
            }
            Some("-h") | Some("--help") => help(),
            Some(s) if s.starts_with('-') => {
                eprintln!("unknown option: {}", s);
                help();
            }
            _ => break,
        }
    }

    if let Some(file) = args.first() {
        opts.script = Some(PathBuf::from(file));
        opts.script_args = args[1..].to_vec();
    }
    opts
}

fn main() {
    let opts = parse_args();
    let started = Instant::now();

    let (spirit, scope) = create_runtime();

    if !opts.skip_stdlib {
        let path = match stdlib_path() {
            Some(path) => path,
            None => fatal("HOME is not set; cannot locate the standard library"),
        };
        if let Err(e) = eval_file(&scope, &path) {
            fatal(format!("loading {}: {}", path.display(), e));
        }
    }

    if let Some(ref preload) = opts.preload {
        if let Err(e) = eval_file(&scope, preload) {
            fatal(format!("preloading {}: {}", preload.display(), e));
        }
    }

    if let Some(ref script) = opts.script {
        let argv: Vec<Value> = opts
            .script_args
            .iter()
            .map(|a| Value::String(a.clone()))
            .collect();
        bind_or_fatal(&spirit, "*argv*", Value::list(argv, Default::default()));
        bind_or_fatal(
            &spirit,
            "*file*",
            Value::String(script.to_string_lossy().into_owned()),
        );
        match eval_file(&scope, script) {
            Ok(_) => {}
            Err(e) => {
                for line in format_error(&e) {
                    eprintln!("{}", line);
                }
                write_profiles(&opts, started);
                std::process::exit(1);
            }
        }
        write_profiles(&opts, started);
        return;
    }

    if let Some(ref src) = opts.execute {
        match spirit_core::eval::read_eval_str(&scope, src) {
            Ok(value) => println!("{}", value),
            Err(e) => {
                for line in format_error(&e) {
                    eprintln!("{}", line);
                }
                write_profiles(&opts, started);
                std::process::exit(1);
            }
        }
        write_profiles(&opts, started);
        return;
    }

    repl::run(&spirit, &scope);
    write_profiles(&opts, started);
}

fn bind_or_fatal(spirit: &spirit_core::env::SpiritRef, name: &str, value: Value) {
    if let Err(e) = spirit.bind(name, value) {
        fatal(format!("binding {}: {}", name, e));
    }
}

/// Profiles are a plain-text run summary; the flag surface matches the
/// original driver, the format is ours.
fn write_profiles(opts: &Options, started: Instant) {
    if let Some(ref path) = opts.cpu_profile {
        let report = format!("wall-time: {:?}\n", started.elapsed());
        if let Err(e) = std::fs::File::create(path).and_then(|mut f| f.write_all(report.as_bytes()))
        {
            eprintln!("{} writing {}: {}", ERROR_TAG, path.display(), e);
        }
    }
    if let Some(ref path) = opts.mem_profile {
        let rss = std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|s| {
                s.split_whitespace()
                    .nth(1)
                    .and_then(|field| field.parse::<u64>().ok())
            })
            .map(|pages| pages * 4096)
            .unwrap_or(0);
        let report = format!("resident-bytes: {}\n", rss);
        if let Err(e) = std::fs::File::create(path).and_then(|mut f| f.write_all(report.as_bytes()))
        {
            eprintln!("{} writing {}: {}", ERROR_TAG, path.display(), e);
        }
    }
}
