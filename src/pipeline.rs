//! Per-frame analysis: inter-frame diffing and palette construction.
//!
//! Each frame after the first is compared pixel-for-pixel against its
//! predecessor to derive the opaque subset, the transparency mask, and the
//! change rectangle. The indexed stream and its color table are then built
//! by walking the change rectangle in display order through the quantizer.

use std::collections::HashMap;

use crate::error::{EncodeError, Result};
use crate::frame::{Frame, Optimizations};
use crate::neuquant::NeuQuant;

/// Tight axis-aligned rectangle of changed pixels, in canvas coordinates.
/// A zero width or height means no pixel changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChangeRect {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
}

impl ChangeRect {
    fn full(width: u16, height: u16) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
        }
    }

    fn empty() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 0,
            height: 0,
        }
    }
}

/// Derived per-frame state produced by [`analyze`].
#[derive(Debug)]
pub(crate) struct FrameAnalysis {
    /// BGR bytes fed to the quantizer: only changed pixels under
    /// auto-transparency, the whole frame otherwise.
    pub opaque_pixels: Vec<u8>,
    /// Per-pixel flag; true forces the pixel to the transparency index.
    pub transparent_mask: Vec<bool>,
    /// Rectangle the image block will cover.
    pub change_rect: ChangeRect,
    /// Whether any pixel differs from the previous frame.
    pub changed: bool,
}

/// Diff a frame against the previous frame's raw pixels.
pub(crate) fn analyze(frame: &Frame, prev: Option<&[u8]>, opts: Optimizations) -> FrameAnalysis {
    let pixel_count = usize::from(frame.width) * usize::from(frame.height);
    let auto = opts.contains(Optimizations::AUTO_TRANSPARENCY);
    let clip = opts.contains(Optimizations::CLIP_FRAME);

    let Some(prev) = prev else {
        return FrameAnalysis {
            opaque_pixels: frame.pixels.clone(),
            transparent_mask: vec![false; pixel_count],
            change_rect: ChangeRect::full(frame.width, frame.height),
            changed: true,
        };
    };

    let mut opaque = Vec::with_capacity(frame.pixels.len());
    let mut mask = vec![false; pixel_count];
    let mut changed = false;
    let (mut min_x, mut min_y) = (u16::MAX, u16::MAX);
    let (mut max_x, mut max_y) = (0u16, 0u16);

    for i in 0..pixel_count {
        let at = i * 3;
        let contributes = frame.pixels[at..at + 3] != prev[at..at + 3];
        if contributes {
            changed = true;
            if clip {
                let x = (i % usize::from(frame.width)) as u16;
                let y = (i / usize::from(frame.width)) as u16;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        if auto {
            if contributes {
                opaque.extend_from_slice(&frame.pixels[at..at + 3]);
            } else {
                mask[i] = true;
            }
        }
    }
    if !auto {
        opaque.extend_from_slice(&frame.pixels);
    }

    let change_rect = if !clip {
        ChangeRect::full(frame.width, frame.height)
    } else if changed {
        ChangeRect {
            left: min_x,
            top: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    } else {
        ChangeRect::empty()
    };

    FrameAnalysis {
        opaque_pixels: opaque,
        transparent_mask: mask,
        change_rect,
        changed,
    }
}

/// Per-frame color table and indexed pixel stream.
#[derive(Debug)]
pub(crate) struct IndexedFrame {
    /// Packed RGB bytes, zero-padded to a power-of-two entry count.
    pub color_table: Vec<u8>,
    /// One palette index per pixel of the change rectangle.
    pub indexed: Vec<u8>,
    /// Palette slot of the transparency color, when one was emitted.
    pub transparent_index: Option<u8>,
}

/// Build the compact palette and indexed stream by walking the change
/// rectangle in display order. Quantizer indices are memoized into palette
/// slots on first use; the palette stores RGB while the source is BGR.
pub(crate) fn build_indexed(
    frame: &Frame,
    analysis: &FrameAnalysis,
    quantizer: &NeuQuant,
) -> Result<IndexedFrame> {
    let rect = analysis.change_rect;
    let mut palette = Vec::new();
    let mut indexed = Vec::with_capacity(usize::from(rect.width) * usize::from(rect.height));
    let mut slots: HashMap<usize, u8> = HashMap::new();
    let mut transparent_index = None;

    for y in rect.top..rect.top + rect.height {
        for x in rect.left..rect.left + rect.width {
            let i = usize::from(y) * usize::from(frame.width) + usize::from(x);
            let at = i * 3;
            let (b, g, r) = (frame.pixels[at], frame.pixels[at + 1], frame.pixels[at + 2]);

            let is_transparent = analysis.transparent_mask[i]
                || frame
                    .transparent
                    .is_some_and(|[tr, tg, tb]| r == tr && g == tg && b == tb);

            if is_transparent {
                let slot = match transparent_index {
                    Some(slot) => slot,
                    None => {
                        let color = frame.transparent.unwrap_or([0, 0, 0]);
                        let slot = push_color(&mut palette, color)?;
                        transparent_index = Some(slot);
                        slot
                    }
                };
                indexed.push(slot);
                continue;
            }

            let quant = quantizer.map(b, g, r);
            let slot = match slots.get(&quant) {
                Some(&slot) => slot,
                None => {
                    // The quantizer reports original neuron indices, not
                    // sorted positions; fetch the color it stands for.
                    let [nb, ng, nr] = quantizer
                        .color_bgr(quant)
                        .ok_or(EncodeError::PaletteOverflow)?;
                    let slot = push_color(&mut palette, [nr, ng, nb])?;
                    slots.insert(quant, slot);
                    slot
                }
            };
            indexed.push(slot);
        }
    }

    pad_color_table(&mut palette);
    Ok(IndexedFrame {
        color_table: palette,
        indexed,
        transparent_index,
    })
}

fn push_color(palette: &mut Vec<u8>, rgb: [u8; 3]) -> Result<u8> {
    let slot = palette.len() / 3;
    if slot >= 256 {
        return Err(EncodeError::PaletteOverflow);
    }
    palette.extend_from_slice(&rgb);
    Ok(slot as u8)
}

/// Zero-pad to the next power-of-two entry count; valid table byte lengths
/// are 6, 12, 24, 48, 96, 192, 384, and 768.
fn pad_color_table(palette: &mut Vec<u8>) {
    let entries = (palette.len() / 3).next_power_of_two().max(2);
    palette.resize(entries * 3, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bgr(width: u16, height: u16, pixels: Vec<u8>) -> Frame {
        Frame::from_bgr(width, height, pixels)
    }

    #[test]
    fn test_first_frame_is_fully_opaque() {
        let frame = frame_bgr(2, 2, vec![1; 12]);
        let analysis = analyze(&frame, None, Optimizations::all());
        assert_eq!(analysis.opaque_pixels, frame.pixels);
        assert!(analysis.transparent_mask.iter().all(|&m| !m));
        assert_eq!(analysis.change_rect, ChangeRect::full(2, 2));
        assert!(analysis.changed);
    }

    #[test]
    fn test_identical_frame_contributes_no_change() {
        let frame = frame_bgr(2, 2, vec![9; 12]);
        let prev = frame.pixels.clone();
        let analysis = analyze(&frame, Some(prev.as_slice()), Optimizations::all());
        assert!(!analysis.changed);
        assert!(analysis.opaque_pixels.is_empty());
        assert!(analysis.transparent_mask.iter().all(|&m| m));
        assert_eq!(analysis.change_rect, ChangeRect::empty());
    }

    #[test]
    fn test_change_rect_bounds_changed_pixels_inclusively() {
        // 4x4 canvas; pixels (1,1) and (2,2) change.
        let prev = vec![0u8; 48];
        let mut pixels = prev.clone();
        for i in [5usize, 10] {
            pixels[i * 3] = 0xFF;
        }
        let frame = frame_bgr(4, 4, pixels);
        let analysis = analyze(&frame, Some(prev.as_slice()), Optimizations::CLIP_FRAME);
        assert_eq!(
            analysis.change_rect,
            ChangeRect {
                left: 1,
                top: 1,
                width: 2,
                height: 2
            }
        );
    }

    #[test]
    fn test_change_rect_is_full_frame_without_clipping() {
        let prev = vec![0u8; 48];
        let mut pixels = prev.clone();
        pixels[0] = 1;
        let frame = frame_bgr(4, 4, pixels);
        let analysis = analyze(&frame, Some(prev.as_slice()), Optimizations::empty());
        assert_eq!(analysis.change_rect, ChangeRect::full(4, 4));
        assert_eq!(analysis.opaque_pixels.len(), 48);
    }

    #[test]
    fn test_auto_transparency_masks_unchanged_pixels() {
        let prev = vec![7u8; 12];
        let mut pixels = prev.clone();
        pixels[3] = 8;
        let frame = frame_bgr(2, 2, pixels);
        let analysis = analyze(&frame, Some(prev.as_slice()), Optimizations::AUTO_TRANSPARENCY);
        assert_eq!(analysis.transparent_mask, vec![true, false, true, true]);
        assert_eq!(analysis.opaque_pixels, vec![8, 7, 7]);
    }

    #[test]
    fn test_indexed_stream_covers_the_rect_only() {
        let prev = vec![0u8; 48];
        let mut pixels = prev.clone();
        for i in [5usize, 6, 9, 10] {
            pixels[i * 3 + 2] = 0xFF;
        }
        let frame = frame_bgr(4, 4, pixels);
        let analysis = analyze(&frame, Some(prev.as_slice()), Optimizations::CLIP_FRAME);
        let quantizer = NeuQuant::new(1, 255, &analysis.opaque_pixels);
        let result = build_indexed(&frame, &analysis, &quantizer).unwrap();
        assert_eq!(result.indexed.len(), 4);
        assert!(result.transparent_index.is_none());
    }

    #[test]
    fn test_palette_stores_rgb_from_bgr_source() {
        // Solid orange: BGR (0, 128, 255).
        let frame = frame_bgr(2, 2, vec![0, 128, 255].repeat(4));
        let analysis = analyze(&frame, None, Optimizations::empty());
        let quantizer = NeuQuant::new(1, 256, &analysis.opaque_pixels);
        let result = build_indexed(&frame, &analysis, &quantizer).unwrap();
        let first = &result.color_table[..3];
        assert_eq!(first, &[255, 128, 0]);
    }

    #[test]
    fn test_transparent_pixels_share_one_slot() {
        let prev = vec![3u8; 12];
        let mut pixels = prev.clone();
        pixels[0] = 4;
        let frame = frame_bgr(2, 2, pixels);
        let analysis = analyze(&frame, Some(prev.as_slice()), Optimizations::AUTO_TRANSPARENCY);
        let quantizer = NeuQuant::new(1, 255, &analysis.opaque_pixels);
        let result = build_indexed(&frame, &analysis, &quantizer).unwrap();
        let trans = result.transparent_index.unwrap();
        let count = result.indexed.iter().filter(|&&i| i == trans).count();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_explicit_transparent_color_matches_exactly() {
        // Two magenta pixels (RGB 255, 0, 255) and two black.
        let mut pixels = Vec::new();
        pixels.extend_from_slice(&[255, 0, 255]);
        pixels.extend_from_slice(&[0, 0, 0]);
        pixels.extend_from_slice(&[255, 0, 255]);
        pixels.extend_from_slice(&[0, 0, 0]);
        let mut frame = frame_bgr(2, 2, pixels);
        frame.transparent = Some([255, 0, 255]);
        let analysis = analyze(&frame, None, Optimizations::empty());
        let quantizer = NeuQuant::new(1, 255, &analysis.opaque_pixels);
        let result = build_indexed(&frame, &analysis, &quantizer).unwrap();
        let trans = result.transparent_index.unwrap();
        assert_eq!(result.indexed[0], trans);
        assert_eq!(result.indexed[2], trans);
        assert_ne!(result.indexed[1], trans);
    }

    #[test]
    fn test_color_table_length_is_a_power_of_two() {
        let mut palette = vec![0u8; 3 * 5];
        pad_color_table(&mut palette);
        assert_eq!(palette.len(), 3 * 8);

        let mut palette = Vec::new();
        pad_color_table(&mut palette);
        assert_eq!(palette.len(), 6);

        let mut palette = vec![0u8; 3 * 256];
        pad_color_table(&mut palette);
        assert_eq!(palette.len(), 768);
    }
}
