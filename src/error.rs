// Error types: `Error` is what a run ends with, `AvatarError` and `ApiError`
// carry the cause from the avatar and API steps.

use std::path::PathBuf;
use thiserror::Error;

/// Every failure is terminal for the run; `main` prints it and exits.
#[derive(Error, Debug)]
pub enum Error {
    #[error("incorrect usage: must provide at least one of `-avatar`, `-username`")]
    MissingChanges,
    #[error("username must be 3-31 characters in length (got {0})")]
    UsernameLength(usize),
    #[error("no token was provided")]
    NoToken,
    #[error("error reading avatar: {0}")]
    Avatar(#[from] AvatarError),
    #[error("failed to modify user: {0}")]
    Api(#[from] ApiError),
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl Error {
    /// Usage errors are followed by the flag help on stderr.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::MissingChanges)
    }
}

#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("failed to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to get image from server: {0}")]
    Fetch(#[source] reqwest::Error),
    #[error("image server responded with non-200 error: {0}")]
    Status(String),
    #[error("image file was empty")]
    Empty,
    #[error("mime type {0} not allowed")]
    MimeNotAllowed(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to serialize request payload: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to create request: token is not a valid header value")]
    InvalidToken(#[source] reqwest::header::InvalidHeaderValue),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("discord responded with non-200 status: {0}")]
    Status(String),
    #[error("failed to deserialize response from discord: {0}")]
    Decode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
