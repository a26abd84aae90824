use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("fetch {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("unexpected document shape: {0}")]
    Parse(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response, either non-retryable or the last one after retries.
    #[error("http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid json body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("column `{column}` expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Sqlite(err))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(StorageError::Postgres(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
