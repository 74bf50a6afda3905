//! sketch-matrix - build matrix runner for Arduino sketches
//!
//! Every selected sketch is compiled for every selected board by invoking the
//! external builder once per pair, and the outcomes are aggregated into a run
//! report with a CI-usable exit status.
//!
//! ## Architecture
//!
//! ```text
//! CLI → config → matrix (sketches, boards, command, scheduler, report) → arduino-builder
//! ```

mod cli;
mod commands;
mod config;
mod error;
mod exec;
mod matrix;
mod reporting;
mod utils;

use std::process::ExitCode;

use clap::Parser;

use cli::Cli;
use error::MatrixError;
use utils::terminal::print_error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<MatrixError>() {
                Some(matrix_err) => {
                    // Context added on top of the typed error, e.g. the config file path
                    if err.to_string() != matrix_err.to_string() {
                        print_error(&err.to_string());
                    }
                    matrix_err.display_with_hints();
                }
                None => print_error(&format!("{:#}", err)),
            }
            ExitCode::FAILURE
        }
    }
}
