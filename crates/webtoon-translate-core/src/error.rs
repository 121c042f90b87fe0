//! Error types for the webtoon translation core library.

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the webtoon translation library.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Metadata store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Remote model provider error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(String),

    /// Pipeline orchestration error
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob-storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Key rejected (absolute, empty, or contains `..`)
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Storage backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Metadata-store-specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database error
    #[error("Database error: {0}")]
    Database(String),

    /// Record failed to encode/decode
    #[error("Record serialization error: {0}")]
    Serialization(String),
}

/// Errors from remote model providers (detection, inpainting, translation)
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    /// Transport-level failure reaching the provider
    #[error("{provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },

    /// Provider answered with something we could not use
    #[error("{provider} returned an unusable response: {message}")]
    BadResponse { provider: String, message: String },

    /// Request exceeded the configured timeout
    #[error("{provider} request timed out")]
    Timeout { provider: String },

    /// Circuit breaker is open for this provider
    #[error("{provider} circuit breaker is open")]
    CircuitOpen { provider: String },
}

impl ProviderError {
    /// Map a reqwest transport error onto the provider error taxonomy.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            ProviderError::Unavailable {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Provider the error originated from.
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Unavailable { provider, .. }
            | ProviderError::BadResponse { provider, .. }
            | ProviderError::Timeout { provider }
            | ProviderError::CircuitOpen { provider } => provider,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(StoreError::Database(err.to_string()))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}
