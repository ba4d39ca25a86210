//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - compile: print the aggregation pipeline for one filter
//! - explain: print the routing decision and finished request for one read

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{boot, compile, compile_request, explain, explain_request, run, run_command, QueryRequest};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_envelope, ok_envelope, parse_request, read_request, write_error, write_response};
