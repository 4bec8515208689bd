//! Error types for summary deck conversion.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting between summaries, Markdown and decks.
///
/// Malformed Markdown never produces an error: offending lines and headings
/// are skipped with a logged warning.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("Failed to read or write file: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing or malformed theme descriptor.
    #[error("Theme configuration error: {0}")]
    ConfigError(String),

    /// An image could not be used on a slide.
    #[error("Image asset error: {0}")]
    AssetError(String),

    /// Malformed summary JSON or image map.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// The input file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the PPTX file structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML error (for PPTX).
    #[error("XML error: {0}")]
    XmlError(String),
}

impl Error {
    /// Shorthand for a theme configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::JsonError(e.to_string())
    }
}
