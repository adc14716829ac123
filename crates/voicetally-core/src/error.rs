use std::path::PathBuf;

use thiserror::Error;

use crate::member::MemberId;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid time data JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed member id {key:?} in time data")]
    MalformedKey { key: String },

    #[error("Member {member} appears more than once in time data")]
    DuplicateMember { member: MemberId },

    #[error("Malformed time record {value:?} for member {key}: {reason}")]
    MalformedTimestamp {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Accumulated time for member {member} does not fit a time record")]
    OutOfRange { member: MemberId },

    #[error("Background task failed: {0}")]
    Worker(String),
}

impl TallyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for TallyError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
