//! Error types for Imgcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImgcastError>;

#[derive(Error, Debug)]
pub enum ImgcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Unknown context: {0}")]
    UnknownContext(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ImgcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ImgcastError::InvalidInput(_) | ImgcastError::UnknownContext(_) => 3,
            ImgcastError::Config(_) => 2,
            ImgcastError::Store(_) => 1,
            ImgcastError::Dispatch(_) => 1,
        }
    }

    /// Returns the response status code used when this error reaches the router
    ///
    /// Only an unrecognised context is reported as 404; every other error that
    /// propagates to the top level becomes 501.
    pub fn status_code(&self) -> u16 {
        match self {
            ImgcastError::UnknownContext(_) => 404,
            _ => 501,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write schedule record: {0}")]
    Write(String),

    #[error("Failed to query schedule records for {context}: {message}")]
    Query { context: String, message: String },

    #[error("Failed to delete schedule record {id}: {message}")]
    Delete { id: String, message: String },

    #[error("Database connection failed: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure inside a single record's dispatch pipeline
///
/// These never abort a sweep; the engine logs them and counts the record as failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Failed to fetch media: {0}")]
    MediaFetch(String),

    #[error("Failed to upload media: {0}")]
    MediaUpload(String),

    #[error("Failed to publish: {0}")]
    Publish(String),
}
