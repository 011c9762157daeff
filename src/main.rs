//! custodia CLI entry point
//!
//! Minimal entrypoint: parse and dispatch via cli::run, print errors to
//! stderr, and exit with the code the command decided on. Exit code 2 is
//! reserved for errors and critical health grades so external schedulers
//! can page on it.

use custodia::cli;

fn main() {
    match cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }
}
