//! The errors surfaced while serving a request.

use axum::http::StatusCode;
use thiserror::Error;

/// A shorthand for results carrying an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while serving a request.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Talking to the GitHub API failed.
    #[error("{0}")]
    Upstream(String),
    /// The artifact, file or named artifact does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The repository is not in the allow-list.
    #[error("forbidden repository addressed")]
    Forbidden,
    /// Only `GET` is supported.
    #[error("Only GET supported")]
    BadMethod,
    /// Disk access failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Anything unexpected.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Creates an [`Error::Upstream`].
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Creates an [`Error::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// The status code to respond with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadMethod => StatusCode::NOT_IMPLEMENTED,
            Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message that is safe to show to a client. Internal details are withheld.
    pub fn public_message(&self) -> String {
        match self {
            Self::Io(_) | Self::Internal(_) => String::from("Unexpected failure"),
            other => other.to_string(),
        }
    }
}
