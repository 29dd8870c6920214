//! CLI module - argument parsing and run entry point

pub mod args;
pub mod output;

use clap::error::ErrorKind;
use std::ffi::OsString;

use crate::core::orchestrator;
use crate::core::{Config, ExitStatus};
use crate::version;

pub use args::Cli;
pub use output::Reporter;

/// Parse `args` and run the whole batch, returning the exit status
pub fn run<I, T>(args: I) -> ExitStatus
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let cli = match Cli::try_parse_args(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
                _ => ExitStatus::UsageError,
            };
        }
    };

    let config = Config::from(cli);
    let mut reporter = Reporter::stdio(config.quiet);
    if config.show_version {
        reporter.banner(&version::banner());
    }
    orchestrator::run(&config, &mut reporter)
}
