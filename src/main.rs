//! aeroquery CLI entry point
//!
//! Parses arguments, dispatches to the CLI module and maps failures to a
//! non-zero exit. Request-level errors are already answered on stdout.

use aeroquery::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
