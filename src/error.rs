use thiserror::Error;

/// Errors that can escape the diagnostic engine.
///
/// Per-classifier failures never appear here: they are contained as
/// abstentions inside the corresponding [`crate::ModelResult`]. Only
/// configuration-time problems are fatal to the caller.
#[derive(Error, Debug)]
pub enum DiagnosisError {
    /// Malformed registry configuration (unknown model id, threshold
    /// outside [0,1]). Raised at registry construction, before any scan
    /// is processed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value could not be serialized into the output document.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DiagnosisError>;
