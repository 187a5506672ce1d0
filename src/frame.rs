//! Frame values and encoder optimization flags.

use bitflags::bitflags;

bitflags! {
    /// Inter-frame optimizations. All three are independently settable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Optimizations: u8 {
        /// Write nothing for a frame identical to its predecessor; extend
        /// the previous frame's delay instead. Requires a seekable sink.
        const DISCARD_DUPLICATES = 1 << 0;
        /// Replace pixels unchanged since the previous frame with a
        /// transparent index, shrinking the LZW stream.
        const AUTO_TRANSPARENCY = 1 << 1;
        /// Restrict each image block to the tight rectangle of changed
        /// pixels instead of the full canvas.
        const CLIP_FRAME = 1 << 2;
    }
}

/// Post-display disposal action carried in the Graphic Control Extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalMethod {
    /// No disposal specified.
    #[default]
    Unspecified,
    /// Leave the frame in place.
    DoNotDispose,
    /// Clear the frame area to the background color.
    RestoreBackground,
    /// Restore the area to the previous frame's contents.
    RestorePrevious,
}

impl DisposalMethod {
    /// The 2-bit field value stored in the GCE packed byte.
    pub fn to_byte(self) -> u8 {
        match self {
            DisposalMethod::Unspecified => 0,
            DisposalMethod::DoNotDispose => 1,
            DisposalMethod::RestoreBackground => 2,
            DisposalMethod::RestorePrevious => 3,
        }
    }

    /// Parse the disposal field from a GCE packed byte.
    pub fn from_byte(byte: u8) -> Self {
        match (byte >> 2) & 0x07 {
            1 => DisposalMethod::DoNotDispose,
            2 => DisposalMethod::RestoreBackground,
            3 => DisposalMethod::RestorePrevious,
            _ => DisposalMethod::Unspecified,
        }
    }
}

/// One input frame: BGR pixels plus presentation metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Flat BGR bytes, length `3 * width * height`.
    pub pixels: Vec<u8>,
    /// Frame width in pixels. The first frame fixes the canvas size.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// Presentation delay in hundredths of a second.
    pub delay: u16,
    /// Quantizer sampling factor, 1 (best, slowest) through 30 (fastest).
    pub quality: u8,
    /// Fixed transparent color as RGB. Mutually exclusive with
    /// [`Optimizations::AUTO_TRANSPARENCY`].
    pub transparent: Option<[u8; 3]>,
    /// Disposal action after the frame is shown.
    pub disposal: DisposalMethod,
}

impl Frame {
    /// Wrap a BGR pixel buffer with default metadata (10 cs delay,
    /// sampling factor 10, no transparency).
    pub fn from_bgr(width: u16, height: u16, pixels: Vec<u8>) -> Self {
        Self {
            pixels,
            width,
            height,
            delay: 10,
            quality: 10,
            transparent: None,
            disposal: DisposalMethod::default(),
        }
    }

    /// Set the delay from milliseconds; the format stores hundredths of a
    /// second, so the value is divided by ten.
    pub fn set_delay_ms(&mut self, millis: u32) {
        self.delay = (millis / 10).min(u32::from(u16::MAX)) as u16;
    }

    /// Frame duration in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        u32::from(self.delay) * 10
    }
}
