use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// The formatter could not turn the accumulated text into lines.
    #[error("failed to render markdown: {0}")]
    Render(String),
    /// The terminal (or whatever sits behind the display) stopped accepting output.
    #[error("display unavailable: {0}")]
    Display(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
