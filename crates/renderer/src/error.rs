//! Rendering errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Pixel buffer does not match the declared image size.
    #[error("invalid image size: {0}")]
    InvalidSize(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
