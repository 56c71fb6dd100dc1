use thiserror::Error;

/// Errors surfaced by the log index.
///
/// Absence (unknown token, unknown track, sampling past the end of the log) is
/// never an error: it comes back as `None` or an empty collection.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Malformed row in {table}: {message}")]
    MalformedRow { table: &'static str, message: String },

    #[error("Log store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl IndexError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn malformed(table: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedRow {
            table,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
