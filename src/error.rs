use std::path::PathBuf;

use thiserror::Error;

pub type SpeedResult<T> = Result<T, SpeedError>;

#[derive(Debug, Error)]
pub enum SpeedError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("series `{0}` has no data")]
    EmptySeries(String),

    #[error("record `{timestamp}` has no field `{field}`")]
    MissingField { timestamp: String, field: String },

    #[error("a record for `{0}` already exists")]
    DuplicateTimestamp(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    #[error("could not find {0} in the speed test output")]
    Acquisition(String),

    #[error("pid file `{path}`: {reason}")]
    PidFile { path: PathBuf, reason: String },

    #[error("render failure: {0}")]
    Render(String),
}

impl SpeedError {
    pub fn parse(message: impl Into<String>) -> Self {
        SpeedError::Parse(message.into())
    }

    pub fn command(command: &str, reason: impl Into<String>) -> Self {
        SpeedError::Command {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}
