//! GIF-variant LZW compression.
//!
//! Variable-width LZW over an 8-bit symbol alphabet with clear and
//! end-of-information codes. Code widths start at `min_code_size + 1` and
//! grow up to 12 bits; a full dictionary emits a clear code and starts over.

use std::collections::HashMap;
use std::io::Write;

use crate::bitstream::BitWriter;
use crate::error::Result;

/// Dictionary codes are at most 12 bits wide.
const MAX_CODE_WIDTH: u8 = 12;

/// Total code space at the maximum width.
const MAX_CODES: u16 = 1 << MAX_CODE_WIDTH;

/// Variable-width LZW encoder for GIF image data.
#[derive(Debug)]
pub(crate) struct LzwEncoder {
    min_code_size: u8,
}

impl LzwEncoder {
    /// The GIF spec requires a minimum code size of at least 2.
    pub fn new(min_code_size: u8) -> Self {
        Self {
            min_code_size: min_code_size.max(2),
        }
    }

    /// Compress `pixels` into `sink`: one byte giving the initial code size,
    /// then LZW codes packed into sub-blocks, then the block terminator.
    pub fn encode<W: Write>(&self, mut sink: W, pixels: &[u8]) -> Result<()> {
        sink.write_all(&[self.min_code_size])?;

        let clear_code: u16 = 1 << self.min_code_size;
        let end_code: u16 = clear_code + 1;

        let mut writer = BitWriter::new(&mut sink);
        let mut code_size = self.min_code_size + 1;
        let mut next_code = end_code + 1;
        let mut table: HashMap<(u16, u8), u16> = HashMap::new();

        writer.write_bits(clear_code, code_size)?;

        let mut iter = pixels.iter();
        let Some(&first) = iter.next() else {
            writer.write_bits(end_code, code_size)?;
            writer.finish()?;
            return Ok(());
        };
        let mut prefix = u16::from(first);

        for &pixel in iter {
            if let Some(&code) = table.get(&(prefix, pixel)) {
                prefix = code;
                continue;
            }
            writer.write_bits(prefix, code_size)?;
            if next_code < MAX_CODES {
                table.insert((prefix, pixel), next_code);
                next_code += 1;
                if next_code > (1 << code_size) && code_size < MAX_CODE_WIDTH {
                    code_size += 1;
                }
            } else {
                // Dictionary full: signal the decoder to reset.
                writer.write_bits(clear_code, code_size)?;
                table.clear();
                code_size = self.min_code_size + 1;
                next_code = end_code + 1;
            }
            prefix = u16::from(pixel);
        }

        writer.write_bits(prefix, code_size)?;
        writer.write_bits(end_code, code_size)?;
        writer.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference decoder for round-trip checks: unframes sub-blocks and
    /// expands codes the way a conforming GIF reader does.
    fn lzw_decode(stream: &[u8]) -> Vec<u8> {
        let min_code_size = stream[0];
        let mut data = Vec::new();
        let mut pos = 1;
        loop {
            let len = stream[pos] as usize;
            pos += 1;
            if len == 0 {
                break;
            }
            data.extend_from_slice(&stream[pos..pos + len]);
            pos += len;
        }

        let clear = 1u16 << min_code_size;
        let end = clear + 1;
        let mut width = min_code_size + 1;
        let base: Vec<Vec<u8>> = (0..=end).map(|c| vec![c as u8]).collect();
        let mut dict = base.clone();
        let mut prev: Option<u16> = None;
        let mut out = Vec::new();

        let mut acc: u32 = 0;
        let mut bits: u8 = 0;
        let mut bytes = data.iter();
        loop {
            while bits < width {
                match bytes.next() {
                    Some(&b) => {
                        acc |= u32::from(b) << bits;
                        bits += 8;
                    }
                    None => return out,
                }
            }
            let code = (acc & ((1 << width) - 1)) as u16;
            acc >>= width;
            bits -= width;

            if code == clear {
                dict = base.clone();
                width = min_code_size + 1;
                prev = None;
                continue;
            }
            if code == end {
                return out;
            }

            let entry = if (code as usize) < dict.len() {
                dict[code as usize].clone()
            } else {
                let p = &dict[prev.unwrap() as usize];
                let mut e = p.clone();
                e.push(p[0]);
                e
            };
            out.extend_from_slice(&entry);
            if let Some(p) = prev {
                let mut grown = dict[p as usize].clone();
                grown.push(entry[0]);
                dict.push(grown);
                if dict.len() == (1 << width) && width < MAX_CODE_WIDTH {
                    width += 1;
                }
            }
            prev = Some(code);
        }
    }

    fn roundtrip(pixels: &[u8], min_code_size: u8) {
        let mut out = Vec::new();
        LzwEncoder::new(min_code_size)
            .encode(&mut out, pixels)
            .unwrap();
        assert_eq!(lzw_decode(&out), pixels);
    }

    #[test]
    fn test_min_code_size_byte_leads_the_stream() {
        let mut out = Vec::new();
        LzwEncoder::new(8).encode(&mut out, &[0, 0, 0, 0]).unwrap();
        assert_eq!(out[0], 8);
        assert_eq!(*out.last().unwrap(), 0x00);
    }

    #[test]
    fn test_min_code_size_is_clamped_to_two() {
        let enc = LzwEncoder::new(1);
        assert_eq!(enc.min_code_size, 2);
    }

    #[test]
    fn test_roundtrip_solid() {
        roundtrip(&[7; 64], 3);
    }

    #[test]
    fn test_roundtrip_small_alphabet() {
        roundtrip(&[0, 0, 0, 1, 1, 1, 2, 2, 2, 0, 1, 2], 2);
    }

    #[test]
    fn test_roundtrip_repeating_pattern() {
        let pixels: Vec<u8> = (0..2048).map(|i| (i % 7) as u8).collect();
        roundtrip(&pixels, 3);
    }

    #[test]
    fn test_roundtrip_full_byte_alphabet() {
        let pixels: Vec<u8> = (0..4096).map(|i| (i * 31 % 256) as u8).collect();
        roundtrip(&pixels, 8);
    }

    #[test]
    fn test_roundtrip_forces_dictionary_reset() {
        // High-entropy data exhausts the 12-bit code space several times.
        let mut state: u32 = 1;
        let pixels: Vec<u8> = (0..40_000)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect();
        roundtrip(&pixels, 8);
    }

    #[test]
    fn test_empty_input_emits_clear_and_end_only() {
        let mut out = Vec::new();
        LzwEncoder::new(2).encode(&mut out, &[]).unwrap();
        assert_eq!(lzw_decode(&out), Vec::<u8>::new());
    }
}
