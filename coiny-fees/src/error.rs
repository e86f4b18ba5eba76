use thiserror::Error;

/// Main error type for the coiny-fees library.
#[derive(Error, Debug)]
pub enum FeeError {
    /// Malformed numeric data, an empty table, or an out of range target.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Neither fee table carries a value for a target that must be published.
    #[error("No source has a fee for target {target} blocks")]
    AllSourcesMissing { target: u32 },

    /// Both estimators failed, so there is nothing to blend.
    #[error("All fee sources are unavailable")]
    AllSourcesUnavailable,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Type alias for Results in this library.
pub type Result<T> = std::result::Result<T, FeeError>;

impl FeeError {
    /// Creates an InvalidInput error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates an AllSourcesMissing error for the given target.
    pub fn all_sources_missing(target: u32) -> Self {
        Self::AllSourcesMissing { target }
    }
}
