//! Render error taxonomy

use std::time::Duration;

use thiserror::Error;

/// Why a markup-to-bitmap conversion failed
#[derive(Debug, Error)]
pub enum RasterFailure {
    #[error("failed to start renderer: {0}")]
    Spawn(String),

    #[error("renderer did not finish within {0:?}")]
    Timeout(Duration),

    #[error("renderer exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("cannot decode captured image: {0}")]
    Decode(String),

    /// Content continued past the bottom of the tallest capture
    #[error("captured page ends inside content after {0} rows")]
    Truncated(u32),

    #[error("renderer scratch IO failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    /// Invalid or missing paper profile / render settings. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Job content lacks structure the layout needs. Fatal for this job.
    #[error("Content error: {0}")]
    Content(String),

    /// Markup could not be turned into a bitmap. The caller may fall back to text mode.
    #[error("Rasterization failed: {0}")]
    Rasterize(#[from] RasterFailure),

    #[error("Markup template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Raster framing error: {0}")]
    Codec(#[from] kot_printer::PrintError),
}

impl RenderError {
    /// Whether retrying the job in text mode can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::Rasterize(_) | RenderError::Template(_) | RenderError::Codec(_)
        )
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Durable cache tier failures; logged and treated as a miss, never returned
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bitmap decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Corrupt cache record: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(RenderError::Rasterize(RasterFailure::Timeout(Duration::from_secs(1))).is_recoverable());
        assert!(!RenderError::Configuration("x".into()).is_recoverable());
        assert!(!RenderError::Content("x".into()).is_recoverable());
    }
}
