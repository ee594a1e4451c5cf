//! Tracing setup and structured run logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `json` selects structured JSON output (for log aggregation in
/// production); otherwise a human-readable ANSI format is used, which is
/// friendlier for local runs. `verbose` raises the default filter from
/// `info` to `debug` for this crate's own modules without touching noisier
/// dependencies.
pub fn init_tracing(json: bool, verbose: bool) {
    let default_directive = if verbose { "directorctl=debug,match_director=debug,match_video=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json {
        tracing_subscriber::registry().with(fmt::layer().json()).with(filter).init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }
}

/// Structured logging for one run's lifecycle, consistent with how the
/// director pipeline logs switches and warnings.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
}

impl RunLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, "run started: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, "run warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, "run error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, "run completed: {}", message);
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_logger_carries_its_id() {
        let logger = RunLogger::new("run-1");
        assert_eq!(logger.run_id, "run-1");
    }
}
