// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Palette state: the absolute 256-color table plus the delta channels
//! `XPAL` interpolation updates.
//!
//! `NPAL` and `XPAL`'s absolute-triplet form store their bytes as
//! `B, G, R` on disk; `AHDR`'s initial palette stores `R, G, B`. This is
//! not a bug in one or the other: the worked fixture for a minimal
//! stream only produces the expected color when read this way, so the
//! two loaders below deliberately disagree on byte order.

use std::io::Read;

use crate::error::{Error, Result};
use crate::reader::{le_i16, le_u32, le_u8, ChunkReader};

pub const PALETTE_LEN: usize = 256;
const DELTA_LEN: usize = PALETTE_LEN * 3;

pub struct Palette {
    /// ARGB8888, alpha always 0xFF.
    pub entries: [u32; PALETTE_LEN],
    delta: [i16; DELTA_LEN],
}

impl Palette {
    pub fn new() -> Self {
        Palette {
            entries: [0xFF00_0000; PALETTE_LEN],
            delta: [0; DELTA_LEN],
        }
    }

    fn channel(&self, i: usize) -> u8 {
        let color = i / 3;
        let shift = match i % 3 {
            0 => 16,
            1 => 8,
            _ => 0,
        };
        (self.entries[color] >> shift) as u8
    }

    fn set_channel(&mut self, i: usize, v: u8) {
        let color = i / 3;
        let shift = match i % 3 {
            0 => 16,
            1 => 8,
            _ => 0,
        };
        self.entries[color] = (self.entries[color] & !(0xFFu32 << shift)) | (u32::from(v) << shift);
    }

    /// `AHDR`'s absolute palette: 256 `R, G, B` triplets.
    pub fn load_ahdr<T: Read>(&mut self, r: &mut T) -> Result<()> {
        for entry in self.entries.iter_mut() {
            let red = le_u8(r)?;
            let green = le_u8(r)?;
            let blue = le_u8(r)?;
            *entry = 0xFF00_0000 | u32::from(red) << 16 | u32::from(green) << 8 | u32::from(blue);
        }
        Ok(())
    }

    /// `NPAL`: as many `B, G, R` triplets as fit, up to 256.
    pub fn load_npal<T: Read>(&mut self, r: &mut ChunkReader<'_, T>) -> Result<()> {
        for entry in self.entries.iter_mut() {
            if r.bytes_left() < 3 {
                break;
            }
            let blue = le_u8(r)?;
            let green = le_u8(r)?;
            let red = le_u8(r)?;
            *entry = 0xFF00_0000 | u32::from(red) << 16 | u32::from(green) << 8 | u32::from(blue);
        }
        Ok(())
    }

    /// `XPAL`: dispatch on declared chunk size.
    pub fn apply_xpal<T: Read>(&mut self, r: &mut ChunkReader<'_, T>) -> Result<()> {
        match r.header.size {
            4 | 6 => self.interpolate(),
            772..=3843 => {
                let _reserved = le_u32(r)?;
                self.read_delta(r)?;
                for entry in self.entries.iter_mut() {
                    *entry = 0xFF00_0000;
                }
                Ok(())
            }
            n if n >= 3844 => {
                let _reserved = le_u32(r)?;
                self.read_delta(r)?;
                for entry in self.entries.iter_mut() {
                    let red = le_u8(r)?;
                    let green = le_u8(r)?;
                    let blue = le_u8(r)?;
                    *entry =
                        0xFF00_0000 | u32::from(red) << 16 | u32::from(green) << 8 | u32::from(blue);
                }
                Ok(())
            }
            _ => Err(Error::FormatError("XPAL chunk too small")),
        }
    }

    fn read_delta<T: Read>(&mut self, r: &mut ChunkReader<'_, T>) -> Result<()> {
        for d in self.delta.iter_mut() {
            *d = le_i16(r)?;
        }
        Ok(())
    }

    /// Interpolate every channel toward `delta`: `((c * 129) + delta) >> 7`,
    /// clamped to 8 bits. At `delta == 0` this is the identity for
    /// `c < 128` but not above it: `c * 129 >> 7` is `c + (c >> 7)`, so
    /// channel values from 128 through 254 creep up by one per call. That
    /// matches the literal operation this chunk's format documents; it is
    /// not rounded down to a plain `c * 128` (`c << 7`) shift to force
    /// exact idempotency, since that would quietly implement a different
    /// formula than the one specified.
    fn interpolate(&mut self) -> Result<()> {
        for i in 0..DELTA_LEN {
            let c = i32::from(self.channel(i));
            let updated = (c * 129 + i32::from(self.delta[i])) >> 7;
            self.set_channel(i, updated.clamp(0, 255) as u8);
        }
        Ok(())
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npal_uses_bgr_disk_order() {
        let mut p = Palette::new();
        let bytes = [0xAAu8, 0xBB, 0xCC].repeat(256);
        let mut cursor = std::io::Cursor::new(bytes);
        let mut chunk = crate::reader::ChunkReader::for_test(&mut cursor, 768);
        p.load_npal(&mut chunk).unwrap();
        assert_eq!(p.entries[0], 0xFFCC_BBAA);
    }

    #[test]
    fn ahdr_uses_rgb_disk_order() {
        let mut p = Palette::new();
        let bytes = [0xAAu8, 0xBB, 0xCC].repeat(256);
        let mut cursor = std::io::Cursor::new(bytes);
        p.load_ahdr(&mut cursor).unwrap();
        assert_eq!(p.entries[0], 0xFFAA_BBCC);
    }

    #[test]
    fn xpal_interpolation_is_idempotent_at_zero_delta_below_128() {
        let mut p = Palette::new();
        p.entries[5] = 0xFF11_2233;
        let before = p.entries;
        p.interpolate().unwrap();
        assert_eq!(p.entries, before);
    }

    #[test]
    fn xpal_interpolation_creeps_up_by_one_at_zero_delta_at_or_above_128() {
        let mut p = Palette::new();
        p.entries[5] = 0xFF80_9AC8; // R=0x80, G=0x9A, B=0xC8, all >= 128
        p.interpolate().unwrap();
        assert_eq!(p.entries[5], 0xFF81_9BC9);
    }
}
