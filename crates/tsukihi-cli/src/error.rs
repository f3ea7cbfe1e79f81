//! CLI error types

use thiserror::Error;

/// TSUKIHI CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// No input files were found
    #[error("No input files (*.ron) found in {0}")]
    NoInputs(String),

    /// Every discovered input failed
    #[error("All {0} input file(s) failed; see diagnostics above")]
    AllRunsFailed(usize),

    /// Engine error
    #[error(transparent)]
    Sim(#[from] tsukihi::SimError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// TSUKIHI CLI result type
pub type Result<T> = std::result::Result<T, CliError>;
