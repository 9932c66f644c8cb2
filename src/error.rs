use thiserror::Error;

use crate::domain::error::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failure of an optimistic mutation.
///
/// `Invalid` is raised before anything touches the cache. `Rejected` means
/// the optimistic patch was applied and then rolled back.
#[derive(Error, Debug)]
pub enum MutationError {
    #[error("invalid input: {0}")]
    Invalid(#[from] DomainError),

    #[error("{operation} rejected, {restored} cache entries restored: {source}")]
    Rejected {
        operation: &'static str,
        restored: usize,
        #[source]
        source: Box<Error>,
    },
}

impl MutationError {
    /// The underlying transport or API error for rejected mutations.
    #[must_use]
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Self::Rejected { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("STOMP protocol error: {0}")]
    Stomp(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("realtime hub is shut down")]
    HubClosed,

    #[error("unexpected cache value: {0}")]
    UnexpectedValue(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}
