//! Tally CLI — compile and run ledger scripts.
//!
//! Exit codes:
//! - 0: success
//! - 1: usage, I/O, compile, or protocol error
//! - 2-4: machine exit codes for failed runs (fail / invalid /
//!   insufficient funds)

mod commands;

use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "compile" => commands::compile(&args[2..]),
        "run" => commands::run(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

fn print_usage() {
    eprintln!("Usage: tally <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  compile <script>                        Compile and print the program listing");
    eprintln!("  run <script> [--vars vars.json]         Compile and execute a script");
    eprintln!("      [--balances balances.json]");
    eprintln!("      [--meta meta.json]");
    eprintln!();
    eprintln!("Files:");
    eprintln!("  vars.json      {{\"name\": <value>, ...}} per declared variable");
    eprintln!("  balances.json  {{\"account\": {{\"asset\": amount, ...}}, ...}}");
    eprintln!("  meta.json      {{\"account\": {{\"key\": <value>, ...}}, ...}}");
}
