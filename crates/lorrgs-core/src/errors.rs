//! Error types for the Lorrgs core library.

/// Failure reported by a [`GraphQlClient`](crate::client::GraphQlClient).
///
/// `RateLimited` is the only variant the retry policy treats as transient.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("rate limited by the analytics API")]
    RateLimited,

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ClientError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ClientError::RateLimited)
            || matches!(self, ClientError::Http { status: 429, .. })
    }
}

/// Top-level error enum for the Lorrgs core library.
#[derive(Debug, thiserror::Error)]
pub enum LorrgsError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Rate limit persisted after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("Unknown spec: {0}")]
    UnknownSpec(String),

    #[error("Unknown boss: {0}")]
    UnknownBoss(String),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<LorrgsError> for pyo3::PyErr {
    fn from(err: LorrgsError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyKeyError, PyRuntimeError, PyValueError};
        match &err {
            LorrgsError::Client(_) | LorrgsError::RateLimitExhausted { .. } => {
                PyRuntimeError::new_err(err.to_string())
            }
            LorrgsError::UnknownSpec(_) | LorrgsError::UnknownBoss(_) => {
                PyKeyError::new_err(err.to_string())
            }
            LorrgsError::Store(_) | LorrgsError::Sqlite(_) => PyRuntimeError::new_err(err.to_string()),
            LorrgsError::Payload(_) | LorrgsError::Config(_) | LorrgsError::Json(_) => {
                PyValueError::new_err(err.to_string())
            }
            LorrgsError::Io(_) => PyIOError::new_err(err.to_string()),
        }
    }
}

pub type LorrgsResult<T> = Result<T, LorrgsError>;
