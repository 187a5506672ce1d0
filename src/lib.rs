//! Streaming animated GIF89a encoder.
//!
//! This crate turns a sequence of 24-bit BGR frames into a well-formed
//! GIF89a byte stream. Each frame is quantized to at most 256 colors with a
//! NeuQuant neural network, optionally diffed against its predecessor
//! (duplicate discarding, auto-transparency, change-rectangle clipping),
//! and compressed with the format's variable-width LZW coding.
//!
//! ## Example
//!
//! ```
//! use std::io::Cursor;
//! use gifenc::{EncoderConfig, Frame, GifEncoder, Optimizations};
//!
//! let config = EncoderConfig::new()
//!     .optimizations(Optimizations::DISCARD_DUPLICATES)
//!     .repeat(0);
//! let mut encoder = GifEncoder::new(Cursor::new(Vec::new()), config)?;
//!
//! let red = Frame::from_bgr(2, 2, [0u8, 0, 255].repeat(4));
//! let blue = Frame::from_bgr(2, 2, [255u8, 0, 0].repeat(4));
//! encoder.add_frame(red)?;
//! encoder.add_frame(blue)?;
//!
//! let gif = encoder.finish()?.into_inner();
//! assert_eq!(&gif[..6], b"GIF89a");
//! # Ok::<(), gifenc::EncodeError>(())
//! ```

#![warn(missing_docs)]

mod bitstream;
mod encoder;
mod error;
mod frame;
mod lzw;
pub mod neuquant;
mod pipeline;
mod sink;

pub use encoder::{EncoderConfig, GifEncoder};
pub use error::{EncodeError, Result};
pub use frame::{DisposalMethod, Frame, Optimizations};
pub use neuquant::NeuQuant;
pub use sink::{OutputSink, StreamSink};

/// GIF89a file signature and version.
pub const GIF89A_SIGNATURE: &[u8; 6] = b"GIF89a";
/// Extension introducer byte.
pub const EXTENSION_INTRODUCER: u8 = 0x21;
/// Graphic control extension label.
pub const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
/// Application extension label.
pub const APPLICATION_LABEL: u8 = 0xFF;
/// Image separator byte.
pub const IMAGE_SEPARATOR: u8 = 0x2C;
/// File trailer byte.
pub const TRAILER: u8 = 0x3B;
