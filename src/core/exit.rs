//! Mapping of a finished run to a process exit code

use crate::core::state::RunState;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    SyntaxError,
    ValidationError,
    InternalError,
    IoError,
    UsageError,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::SyntaxError => 1,
            ExitStatus::ValidationError => 2,
            ExitStatus::InternalError => 3,
            ExitStatus::IoError => 4,
            ExitStatus::UsageError => 5,
        }
    }

    /// Map the final run state, first match wins:
    /// construction I/O, syntax, file I/O, internal, validation, success.
    ///
    /// Usage errors never reach a `RunState`; they are mapped where they are
    /// detected.
    pub fn from_state(state: &RunState) -> Self {
        if state.construction_io_error {
            ExitStatus::IoError
        } else if state.syntax_error {
            ExitStatus::SyntaxError
        } else if state.file_io_error {
            ExitStatus::IoError
        } else if state.internal_error {
            ExitStatus::InternalError
        } else if !state.all_correct {
            ExitStatus::ValidationError
        } else {
            ExitStatus::Success
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}
