//! CLI-level error type.

use thiserror::Error;

pub type RunnerResult<T> = Result<T, RunnerError>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("director configuration invalid: {0}")]
    DirectorConfig(#[from] match_models::ConfigError),

    #[error("director pipeline error: {0}")]
    Director(#[from] match_director::DirectorError),

    #[error("media adapter error: {0}")]
    Media(#[from] match_video::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
