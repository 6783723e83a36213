//! Error types for the conversion gateway.

use std::time::Duration;

/// Failures raised while converting a message with the external tool.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("Converter exited with code {code}")]
    Failed { code: i32, diagnostics: String },

    #[error("Converter exited successfully but produced no PDF")]
    NoOutput,

    #[error("Staging IO error: {0}")]
    Io(#[from] std::io::Error),
}
