//! Error types for TSUKIHI

use thiserror::Error;

/// TSUKIHI engine error type
#[derive(Debug, Error)]
pub enum SimError {
    /// Input file version does not match the engine
    #[error("Input version mismatch: found {found}, expected {expected}")]
    InputVersion { found: String, expected: String },

    /// Input file could not be parsed
    #[error("Input parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// A mandatory input field is missing or out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output formatting error
    #[error("Output error: {0}")]
    Output(String),

    /// Run-level error (cohort setup, transmission warmup)
    #[error("Run error: {0}")]
    Run(String),
}

/// TSUKIHI result type
pub type Result<T> = std::result::Result<T, SimError>;
