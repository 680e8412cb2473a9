//! forge - Command-line tool for building content assets

use std::process::ExitCode;

use assetforge::cli;

fn main() -> ExitCode {
    cli::run()
}
