//! Command-line interface implementation
//!
//! Parses arguments, installs the tracing subscriber and dispatches to the
//! build command.

mod build;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::build::Verbosity;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// assetforge - Build content files through importers, processors and writers
#[derive(Debug, Parser)]
#[command(name = "forge")]
#[command(about = "Build content assets incrementally from a TOML build configuration")]
#[command(version)]
pub struct Cli {
    /// Build configuration file (TOML)
    pub config: PathBuf,

    /// Input directory (overrides [build].input)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output directory (overrides [build].output)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Log detail: quiet, minimal, normal, detailed, diagnostic
    #[arg(short, long, default_value = "normal")]
    pub verbosity: Verbosity,

    /// Ignore the previous manifest and rebuild every asset
    #[arg(long)]
    pub rebuild: bool,

    /// Number of assets built in parallel (default: available cores)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: Option<u32>,
}

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `--verbosity`.
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.as_filter()));

    // A subscriber may already be installed when running under a harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI, returning the process exit code.
pub fn run() -> ExitCode {
    run_from(std::env::args_os())
}

/// Run the CLI with explicit arguments (first item is the program name).
pub fn run_from<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are reported through the error path
            return if e.use_stderr() {
                ExitCode::from(EXIT_INVALID_ARGS)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            };
        }
    };

    init_tracing(cli.verbosity);
    build::run_build(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["forge", "forge.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("forge.toml"));
        assert_eq!(cli.verbosity, Verbosity::Normal);
        assert!(!cli.rebuild);
        assert_eq!(cli.jobs, None);
        assert_eq!(cli.input, None);
    }

    #[test]
    fn test_parse_all_options() {
        let cli = Cli::try_parse_from([
            "forge",
            "--input=src",
            "--output=dist",
            "--verbosity=diag",
            "--rebuild",
            "--jobs=3",
            "assets.toml",
        ])
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("src")));
        assert_eq!(cli.output, Some(PathBuf::from("dist")));
        assert_eq!(cli.verbosity, Verbosity::Diagnostic);
        assert!(cli.rebuild);
        assert_eq!(cli.jobs, Some(3));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(Cli::try_parse_from(["forge", "--jobs=0", "a.toml"]).is_err());
        assert!(Cli::try_parse_from(["forge", "--verbosity=loud", "a.toml"]).is_err());
        assert!(Cli::try_parse_from(["forge"]).is_err());
    }

    #[test]
    fn test_invalid_args_exit_code() {
        assert_eq!(run_from(["forge", "--jobs=0", "a.toml"]), ExitCode::from(EXIT_INVALID_ARGS));
        assert_eq!(run_from(["forge", "--version"]), ExitCode::from(EXIT_SUCCESS));
    }
}
