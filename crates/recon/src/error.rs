use thiserror::Error;

/// Result alias for fallible credsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (bad weight, empty column list, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// Missing required column in an adapter's input.
    #[error("source '{source_label}': missing column '{column}'")]
    MissingColumn { source_label: String, column: String },

    /// Input payload that an adapter could not interpret.
    #[error("source '{source_label}': {message}")]
    InvalidInput { source_label: String, message: String },

    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}
