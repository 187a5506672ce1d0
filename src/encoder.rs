//! GIF89a stream orchestration.
//!
//! [`GifEncoder`] drives the whole pipeline: frame validation, inter-frame
//! analysis, quantization, and serialization of every container block. The
//! canvas size is fixed by the first frame; the first frame's palette is
//! written as the global color table and every later frame carries its own
//! local table. Under duplicate discarding the encoder seeks back and
//! rewrites the previous frame's graphic control extension instead of
//! emitting a new image block.

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, trace};

use crate::error::{EncodeError, Result};
use crate::frame::{DisposalMethod, Frame, Optimizations};
use crate::lzw::LzwEncoder;
use crate::neuquant::NeuQuant;
use crate::pipeline::{self, ChangeRect, IndexedFrame};
use crate::sink::OutputSink;
use crate::{
    APPLICATION_LABEL, EXTENSION_INTRODUCER, GIF89A_SIGNATURE, GRAPHIC_CONTROL_LABEL,
    IMAGE_SEPARATOR, TRAILER,
};

/// Encoder configuration.
#[derive(Debug, Clone, Default)]
pub struct EncoderConfig {
    /// Inter-frame optimizations to apply.
    pub optimizations: Optimizations,
    /// Netscape loop count. `Some(0)` loops forever, `Some(n)` repeats the
    /// animation `n` times, `None` writes no loop extension.
    pub repeat: Option<u16>,
}

impl EncoderConfig {
    /// Default configuration: no optimizations, no loop extension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a set of inter-frame optimizations.
    pub fn optimizations(mut self, opts: Optimizations) -> Self {
        self.optimizations = opts;
        self
    }

    /// Write a Netscape loop extension; zero loops forever.
    pub fn repeat(mut self, count: u16) -> Self {
        self.repeat = Some(count);
        self
    }
}

/// Fields of a written graphic control extension, kept so a duplicate
/// frame can rewrite it in place.
#[derive(Debug, Clone, Copy)]
struct PendingGce {
    offset: u64,
    delay: u16,
    disposal: DisposalMethod,
    transparent_index: Option<u8>,
}

/// Streaming animated GIF89a encoder.
///
/// Frames are added one at a time and serialized immediately; [`finish`]
/// writes the trailer and returns the sink. Validation failures leave the
/// encoder untouched; an I/O failure closes it.
///
/// [`finish`]: Self::finish
#[derive(Debug)]
pub struct GifEncoder<S: OutputSink> {
    sink: S,
    config: EncoderConfig,
    canvas: Option<(u16, u16)>,
    prev_pixels: Option<Vec<u8>>,
    pending_gce: Option<PendingGce>,
    frames_written: u64,
    closed: bool,
}

impl<S: OutputSink> GifEncoder<S> {
    /// Create an encoder writing into `sink`. Fails with
    /// [`EncodeError::SeekUnsupported`] when duplicate discarding is
    /// requested over a sink that cannot seek.
    pub fn new(sink: S, config: EncoderConfig) -> Result<Self> {
        if config
            .optimizations
            .contains(Optimizations::DISCARD_DUPLICATES)
            && !sink.is_seekable()
        {
            return Err(EncodeError::SeekUnsupported);
        }
        Ok(Self {
            sink,
            config,
            canvas: None,
            prev_pixels: None,
            pending_gce: None,
            frames_written: 0,
            closed: false,
        })
    }

    /// Number of image blocks written so far (discarded duplicates do not
    /// count).
    pub fn frame_count(&self) -> u64 {
        self.frames_written
    }

    /// Analyze and serialize one frame.
    pub fn add_frame(&mut self, frame: Frame) -> Result<()> {
        self.validate(&frame)?;
        let first = self.canvas.is_none();

        trace!(
            frame = self.frames_written,
            width = frame.width,
            height = frame.height,
            "analyzing frame"
        );
        let analysis =
            pipeline::analyze(&frame, self.prev_pixels.as_deref(), self.config.optimizations);

        if !first
            && !analysis.changed
            && self
                .config
                .optimizations
                .contains(Optimizations::DISCARD_DUPLICATES)
        {
            let result = self.merge_duplicate(&frame);
            if result.is_err() {
                self.closed = true;
            }
            return result;
        }

        let has_transparency =
            frame.transparent.is_some() || analysis.transparent_mask.iter().any(|&m| m);
        let netsize = 256 - usize::from(has_transparency);
        let quantizer = NeuQuant::new(
            i32::from(frame.quality),
            netsize,
            &analysis.opaque_pixels,
        );
        let indexed = pipeline::build_indexed(&frame, &analysis, &quantizer)?;
        debug!(
            colors = indexed.color_table.len() / 3,
            rect_width = analysis.change_rect.width,
            rect_height = analysis.change_rect.height,
            "frame quantized"
        );

        let result = self.write_frame(&frame, analysis.change_rect, &indexed, first);
        if result.is_err() {
            self.closed = true;
        }
        result?;

        if first {
            self.canvas = Some((frame.width, frame.height));
        }
        self.prev_pixels = Some(frame.pixels);
        Ok(())
    }

    /// Write the trailer, flush, and return the sink.
    pub fn finish(mut self) -> Result<S> {
        if self.closed {
            return Err(EncodeError::invalid_frame("encoder is closed"));
        }
        if self.canvas.is_none() {
            return Err(EncodeError::invalid_frame("no frames were added"));
        }
        self.sink.write_all(&[TRAILER])?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn validate(&self, frame: &Frame) -> Result<()> {
        if self.closed {
            return Err(EncodeError::invalid_frame("frame added after close"));
        }
        if frame.width == 0 || frame.height == 0 || frame.pixels.is_empty() {
            return Err(EncodeError::invalid_frame("frame has no pixel data"));
        }
        let expected = 3 * usize::from(frame.width) * usize::from(frame.height);
        if frame.pixels.len() != expected {
            return Err(EncodeError::invalid_frame(format!(
                "pixel buffer holds {} bytes but {}x{} needs {}",
                frame.pixels.len(),
                frame.width,
                frame.height,
                expected
            )));
        }
        if let Some((width, height)) = self.canvas {
            if frame.width != width || frame.height != height {
                return Err(EncodeError::invalid_frame(format!(
                    "frame size {}x{} does not match canvas {}x{}",
                    frame.width, frame.height, width, height
                )));
            }
        }
        if self
            .config
            .optimizations
            .contains(Optimizations::AUTO_TRANSPARENCY)
            && frame.transparent.is_some()
        {
            return Err(EncodeError::invalid_frame(
                "an explicit transparent color cannot be combined with auto-transparency",
            ));
        }
        Ok(())
    }

    /// Extend the previous frame's display time instead of writing a new
    /// image block for an identical frame.
    fn merge_duplicate(&mut self, frame: &Frame) -> Result<()> {
        let Some(mut gce) = self.pending_gce else {
            return Ok(());
        };
        gce.delay = gce.delay.saturating_add(frame.delay);
        let end = self.sink.position()?;
        self.sink.set_position(gce.offset)?;
        write_gce(&mut self.sink, &gce)?;
        self.sink.set_position(end)?;
        self.pending_gce = Some(gce);
        debug!(
            delay = gce.delay,
            "discarded duplicate frame, extended previous delay"
        );
        Ok(())
    }

    fn write_frame(
        &mut self,
        frame: &Frame,
        rect: ChangeRect,
        indexed: &IndexedFrame,
        first: bool,
    ) -> Result<()> {
        if first {
            self.sink.write_all(GIF89A_SIGNATURE)?;
            self.sink.write_u16::<LittleEndian>(frame.width)?;
            self.sink.write_u16::<LittleEndian>(frame.height)?;
            // Global color table present, color resolution 8 bits.
            let packed = 0x80 | 0x70 | size_field(&indexed.color_table);
            self.sink.write_all(&[packed, 0x00, 0x00])?;
            self.sink.write_all(&indexed.color_table)?;
            if let Some(repeat) = self.config.repeat {
                self.write_netscape(repeat)?;
            }
        }

        let gce = PendingGce {
            offset: self.sink.position()?,
            delay: frame.delay,
            disposal: frame.disposal,
            transparent_index: indexed.transparent_index,
        };
        write_gce(&mut self.sink, &gce)?;

        self.sink.write_all(&[IMAGE_SEPARATOR])?;
        self.sink.write_u16::<LittleEndian>(rect.left)?;
        self.sink.write_u16::<LittleEndian>(rect.top)?;
        self.sink.write_u16::<LittleEndian>(rect.width)?;
        self.sink.write_u16::<LittleEndian>(rect.height)?;
        if first {
            // The first frame's palette is the global color table.
            self.sink.write_all(&[0x00])?;
        } else {
            self.sink
                .write_all(&[0x80 | size_field(&indexed.color_table)])?;
            self.sink.write_all(&indexed.color_table)?;
        }

        LzwEncoder::new(min_code_size(&indexed.color_table))
            .encode(&mut self.sink, &indexed.indexed)?;

        self.pending_gce = Some(gce);
        self.frames_written += 1;
        Ok(())
    }

    fn write_netscape(&mut self, repeat: u16) -> Result<()> {
        self.sink
            .write_all(&[EXTENSION_INTRODUCER, APPLICATION_LABEL, 0x0B])?;
        self.sink.write_all(b"NETSCAPE2.0")?;
        self.sink.write_all(&[0x03, 0x01])?;
        self.sink.write_u16::<LittleEndian>(repeat)?;
        self.sink.write_all(&[0x00])?;
        Ok(())
    }
}

fn write_gce<S: OutputSink>(sink: &mut S, gce: &PendingGce) -> Result<()> {
    let packed = (gce.disposal.to_byte() << 2) | u8::from(gce.transparent_index.is_some());
    sink.write_all(&[EXTENSION_INTRODUCER, GRAPHIC_CONTROL_LABEL, 0x04, packed])?;
    sink.write_u16::<LittleEndian>(gce.delay)?;
    sink.write_all(&[gce.transparent_index.unwrap_or(0), 0x00])?;
    Ok(())
}

/// The descriptor size field: `log2(entries) - 1` for a power-of-two table.
fn size_field(color_table: &[u8]) -> u8 {
    ((color_table.len() / 3).trailing_zeros() - 1) as u8
}

/// Initial LZW code size for a power-of-two table, at least 2.
fn min_code_size(color_table: &[u8]) -> u8 {
    ((color_table.len() / 3).trailing_zeros() as u8).max(2)
}
