//! Runs every enabled engine over every input file

use std::path::{Path, PathBuf};

use crate::cli::output::Reporter;
use crate::core::config::Config;
use crate::core::exit::ExitStatus;
use crate::core::outcome::{Outcome, Verdict};
use crate::core::state::RunState;
use crate::engine::{Engine, EngineSet};

/// Check preconditions, build the engines once, then validate the batch.
///
/// Files are processed in order and engines in priority order per file; a
/// failing file never stops the batch.
pub fn run(config: &Config, reporter: &mut Reporter) -> ExitStatus {
    if let Err(err) = config.check() {
        reporter.report(miette::Report::new(err));
        return ExitStatus::UsageError;
    }

    let mut set = EngineSet::build(config);
    let mut state = RunState::new();
    state.construction_io_error = set.construction_io_failed();
    for failure in std::mem::take(&mut set.failures) {
        reporter.report(miette::Report::new(failure));
    }

    validate_files(&set, &config.files, reporter, &mut state);
    reporter.flush();
    ExitStatus::from_state(&state)
}

/// Validate `files` with an already built engine set, folding every verdict
/// into `state`
pub fn validate_files(
    set: &EngineSet,
    files: &[PathBuf],
    reporter: &mut Reporter,
    state: &mut RunState,
) {
    for file in files {
        for engine in &set.engines {
            let verdict = run_engine(engine.as_ref(), file, reporter);
            state.record(&verdict);
            print_verdict(&verdict, reporter);
        }
    }

    if state.graded {
        reporter.summary(state.all_correct);
    }
}

fn run_engine(engine: &dyn Engine, file: &Path, reporter: &mut Reporter) -> Verdict {
    if let Some(line) = engine.announce(file) {
        reporter.progress(&line);
    }
    engine.validate(file, reporter)
}

fn print_verdict(verdict: &Verdict, reporter: &mut Reporter) {
    match &verdict.outcome {
        Outcome::Valid => {}
        Outcome::Invalid(problems) => {
            for problem in problems {
                reporter.problem(problem);
            }
        }
        Outcome::Syntax(detail) => reporter.syntax(detail),
        Outcome::Io(detail) => reporter.io_error(detail),
        Outcome::Internal(detail) => reporter.internal_error(detail),
    }
}
