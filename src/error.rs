use thiserror::Error;

/// Result type alias for operations that may fail with [`VectorizeError`].
pub type VectorizeResult<T> = std::result::Result<T, VectorizeError>;

/// Error types that can occur while turning a pixel buffer into vector paths.
///
/// Every variant aborts the whole invocation; no stage returns partial output.
#[derive(Debug, Error)]
pub enum VectorizeError {
    /// The pixel buffer is malformed or uses an unsupported layout.
    #[error("Pixel buffer could not be decoded: {0}")]
    Decode(String),
    /// A configuration value is out of range.
    #[error("Invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    /// Mask dimensions are malformed or an internal tracing invariant broke.
    #[error("Tracing failed: {0}")]
    Tracing(String),
    /// The invocation was cancelled between stages.
    #[error("Vectorization cancelled")]
    Cancelled,
    /// Image encoding or decoding error (file helpers only).
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),
    /// File system I/O error (file helpers only).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VectorizeError {
    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
