//! Encoder error types.

use thiserror::Error;

/// Errors produced while encoding a GIF89a stream.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// A frame failed validation. The encoder state is unchanged and the
    /// output stream has not been touched.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// A single frame produced more than 256 distinct palette entries.
    #[error("Palette overflow: more than 256 distinct colors in one frame")]
    PaletteOverflow,

    /// The output sink failed to accept a write or seek. The encoder is
    /// closed afterwards; the stream may be truncated mid-frame.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Duplicate-frame discarding was requested but the output sink cannot
    /// seek back to rewrite graphic control extensions.
    #[error("Output sink does not support seeking")]
    SeekUnsupported,
}

/// Encoder result type.
pub type Result<T> = std::result::Result<T, EncodeError>;

impl EncodeError {
    /// Create an invalid-frame error.
    pub(crate) fn invalid_frame(msg: impl Into<String>) -> Self {
        EncodeError::InvalidFrame(msg.into())
    }
}
