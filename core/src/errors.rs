use thiserror::Error;

/// Knowledge base chat errors
#[derive(Error, Debug)]
pub enum KbChatError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    /// The service answered, but with a failure status.
    #[error("{code}: {message}")]
    ServiceError { code: String, message: String },

    #[error("Transport Error: {0}")]
    TransportError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("the knowledge base client was not initialized")]
    ClientNotInitialized,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
}

/// How an error is presented to the person chatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reported by the remote service; shown verbatim.
    Service,
    /// Anything else; shown with a generic apology.
    Unexpected,
}

impl KbChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KbChatError::ServiceError { .. } => ErrorKind::Service,
            _ => ErrorKind::Unexpected,
        }
    }
}

/// Result type for knowledge base chat operations
pub type KbChatResult<T> = Result<T, KbChatError>;
