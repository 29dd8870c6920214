//! Run configuration, outcomes and orchestration

pub mod config;
pub mod error;
pub mod exit;
pub mod orchestrator;
pub mod outcome;
pub mod state;

pub use config::{Config, EngineSelection};
pub use error::{EngineError, UsageError};
pub use exit::ExitStatus;
pub use outcome::{Outcome, Problem, Verdict};
pub use state::RunState;
