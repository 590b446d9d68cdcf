// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `IACT` audio: 22.05kHz 16-bit stereo PCM reassembled from
//! length-prefixed sub-blocks that may straddle chunk boundaries.

use std::io::Read;

use crate::error::{Error, Result};
use crate::reader::{le_u16, le_u32, ChunkReader};
use crate::TryVec;

const STAGING_LEN: usize = 4096;
const SUBBLOCK_SAMPLES: usize = 1024;
const SUBBLOCK_OUTPUT_LEN: usize = SUBBLOCK_SAMPLES * 2 * 2; // stereo, 16-bit

pub struct IactHeader {
    pub code: u16,
    pub flags: u16,
    pub unk: u16,
    pub uid: u16,
    pub trkid: u16,
    pub index: u16,
    pub frame_count: u16,
    pub size2: u32,
}

pub fn read_iact_header<T: Read>(r: &mut T) -> Result<IactHeader> {
    Ok(IactHeader {
        code: le_u16(r)?,
        flags: le_u16(r)?,
        unk: le_u16(r)?,
        uid: le_u16(r)?,
        trkid: le_u16(r)?,
        index: le_u16(r)?,
        frame_count: le_u16(r)?,
        size2: le_u32(r)?,
    })
}

/// Cross-chunk assembly state for the length-prefixed sub-block stream.
pub struct IactState {
    staging: [u8; STAGING_LEN],
    pos: usize,
}

impl IactState {
    pub fn new() -> Self {
        IactState {
            staging: [0; STAGING_LEN],
            pos: 0,
        }
    }

    /// Consume the remainder of one `IACT` chunk body (after its 18-byte
    /// header), reassembling and emitting every completed sub-block
    /// through `sink`.
    pub fn process<T: Read>(
        &mut self,
        r: &mut ChunkReader<'_, T>,
        mut sink: impl FnMut(TryVec<u8>) -> Result<()>,
    ) -> Result<()> {
        while r.bytes_left() > 0 {
            if self.pos < 2 {
                let need = 2 - self.pos;
                let avail = need.min(r.bytes_left() as usize);
                let mut buf: TryVec<u8> = TryVec::with_capacity(avail)?;
                buf.resize(avail, 0)?;
                r.read_exact(&mut buf)?;
                self.staging[self.pos..self.pos + avail].copy_from_slice(&buf);
                self.pos += avail;
                continue;
            }

            let l = usize::from(u16::from_be_bytes([self.staging[0], self.staging[1]]));
            let need = l + 2 - self.pos;
            let avail = r.bytes_left() as usize;

            if avail < need {
                let mut buf: TryVec<u8> = TryVec::with_capacity(avail)?;
                buf.resize(avail, 0)?;
                r.read_exact(&mut buf)?;
                self.staging[self.pos..self.pos + avail].copy_from_slice(&buf);
                self.pos += avail;
                break;
            }

            let mut buf: TryVec<u8> = TryVec::with_capacity(need)?;
            buf.resize(need, 0)?;
            r.read_exact(&mut buf)?;
            self.staging[self.pos..self.pos + need].copy_from_slice(&buf);
            self.pos += need;

            let pcm = expand_subblock(&self.staging[2..2 + l])?;
            sink(pcm)?;
            self.pos = 0;
        }
        Ok(())
    }
}

impl Default for IactState {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand one completed sub-block's `data` (the bytes declared by its
/// length prefix, header byte included) into exactly 4096 bytes of
/// interleaved 16-bit big-endian stereo PCM.
fn expand_subblock(data: &[u8]) -> Result<TryVec<u8>> {
    let v = *data.first().ok_or(Error::FormatError("empty IACT sub-block"))?;
    let shift = [v >> 4, v & 0x0F];

    let mut out: TryVec<u8> = TryVec::with_capacity(SUBBLOCK_OUTPUT_LEN)?;
    out.resize(SUBBLOCK_OUTPUT_LEN, 0)?;

    let mut idx = 1usize;
    for iter in 0..SUBBLOCK_SAMPLES {
        for ch in 0..2usize {
            let e = *data
                .get(idx)
                .ok_or(Error::FormatError("IACT sub-block truncated"))?;
            idx += 1;
            let sample: i16 = if e == 0x80 {
                let hi = *data
                    .get(idx)
                    .ok_or(Error::FormatError("IACT sub-block truncated"))?;
                let lo = *data
                    .get(idx + 1)
                    .ok_or(Error::FormatError("IACT sub-block truncated"))?;
                idx += 2;
                i16::from_be_bytes([hi, lo])
            } else {
                let signed = e as i8;
                i16::from(signed) << shift[ch]
            };
            let out_off = (iter * 2 + ch) * 2;
            out[out_off] = (sample >> 8) as u8;
            out[out_off + 1] = sample as u8;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subblock_expands_to_4096_bytes() {
        // header byte (no shift) + 2048 literal codes, none using the 0x80 escape.
        let mut data = vec![0x00u8];
        data.extend(std::iter::repeat(0x01u8).take(SUBBLOCK_SAMPLES * 2));
        let out = expand_subblock(&data).unwrap();
        assert_eq!(out.len(), SUBBLOCK_OUTPUT_LEN);
    }

    #[test]
    fn literal_escape_is_copied_verbatim() {
        let mut data = vec![0x00u8];
        data.push(0x80);
        data.push(0x12);
        data.push(0x34);
        data.extend(std::iter::repeat(0x00u8).take(2 * SUBBLOCK_SAMPLES * 2 - 3));
        let out = expand_subblock(&data).unwrap();
        assert_eq!(&out[0..2], &[0x12, 0x34]);
    }

    #[test]
    fn whole_stream_assembly_fires_one_callback_per_subblock() {
        let mut state = IactState::new();
        let body_len = 1 + SUBBLOCK_SAMPLES * 2; // header byte + codes
        let mut payload = Vec::new();
        payload.extend((body_len as u16).to_be_bytes());
        payload.push(0x00); // shift byte
        payload.extend(std::iter::repeat(0x01u8).take(SUBBLOCK_SAMPLES * 2));

        let mut cursor = std::io::Cursor::new(payload.clone());
        let mut chunk = ChunkReader::for_test(&mut cursor, payload.len() as u32);
        let mut seen = 0;
        state
            .process(&mut chunk, |pcm| {
                assert_eq!(pcm.len(), SUBBLOCK_OUTPUT_LEN);
                seen += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, 1);
    }
}
