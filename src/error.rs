//! Error types for the content-fit renderer

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering a content-fit PDF
#[derive(Error, Debug)]
pub enum Error {
    /// The request itself is unusable (empty markup, bad width, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failed to find or launch the browser engine
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Failed to load the markup into the rendering surface
    #[error("Content load failed: {0}")]
    Load(String),

    /// The content measurement script failed or returned garbage
    #[error("Content measurement failed: {0}")]
    Measure(String),

    /// PDF generation or output write failed
    #[error("PDF export failed: {0}")]
    Export(String),

    /// Filesystem error outside the export step
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

// `headless_chrome` surfaces `anyhow::Error` from most of its API; callers
// that need a precise class map explicitly, everything else lands here.
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
