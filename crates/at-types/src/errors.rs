use thiserror::Error;

/// Main error type for the Attune tuning core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Length mismatch: expected {expected} terms, got {got}")]
    SpaceMismatch { expected: usize, got: usize },

    #[error("Unknown point id: {0}")]
    UnknownId(u32),

    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("Stage '{stage}' error: {message}")]
    Stage { stage: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Attune operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for creating configuration errors.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::Error::Config(format!($($arg)*))
    };
}

/// Macro for creating strategy-internal errors.
#[macro_export]
macro_rules! strategy_error {
    ($($arg:tt)*) => {
        $crate::Error::Strategy(format!($($arg)*))
    };
}
