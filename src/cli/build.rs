//! Build command implementation

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use super::{Cli, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildPipeline, TracingLog};
use crate::config::CliOverrides;

/// Directories given on the command line are relative to the working
/// directory, not to the configuration file.
fn from_cwd(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Run the build command
pub fn run_build(cli: &Cli) -> ExitCode {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("Error: cannot read working directory: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let overrides = CliOverrides {
        input: cli.input.as_deref().map(|p| from_cwd(p, &cwd)),
        output: cli.output.as_deref().map(|p| from_cwd(p, &cwd)),
        rebuild: cli.rebuild,
        jobs: cli.jobs.map(|j| j as usize),
    };

    let pipeline = BuildPipeline::new(from_cwd(&cli.config, &cwd))
        .with_overrides(overrides)
        .with_log(Arc::new(TracingLog::new(cli.verbosity)));

    match pipeline.build() {
        Ok(result) => {
            if result.is_success() {
                println!("{}", result.summary());
                ExitCode::from(EXIT_SUCCESS)
            } else {
                eprintln!("{}", result.summary());
                ExitCode::from(EXIT_ERROR)
            }
        }
        Err(e) => {
            eprintln!("Build error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
