//! `directorctl` support library: configuration loading, tracing setup, CLI-
//! level retry/error handling, and the glue that wires `match-video`
//! adapters into a `match-director::Orchestrator` run.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use cli::{run_report_command, run_run_command, run_validate_command};
pub use config::RunnerConfig;
pub use error::{RunnerError, RunnerResult};
pub use logging::{init_tracing, RunLogger};
