// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `ANIM` container driver: top-level parse, `AHDR`, and the `FRME`
//! inner tag loop.

use std::io::Read;

use crate::audio::{read_iact_header, IactState};
use crate::buffers::{FramePool, Role, Rotation};
use crate::codec47::{decode_fobj, Codec47State};
use crate::error::{Error, Result};
use crate::glyph::GlyphTables;
use crate::motion::MOTION_VECTOR_COUNT;
use crate::palette::Palette;
use crate::reader::{le_u16, read_tag_header, skip, ChunkReader};
use crate::tags::{FourCC, FrameTag};
use crate::TryVec;

const AHDR_PALETTE_BYTES: usize = 768;
const AHDR_MIN_SIZE: u32 = AHDR_PALETTE_BYTES as u32 + 6;
const AHDR_TIMING_BYTES: u32 = 20;

pub struct AnimHeader {
    pub version: u16,
    pub frame_count: u16,
    pub framerate: u32,
    pub maxframe: u32,
    pub samplerate: u32,
}

/// Scan forward for the `ANIM` tag, then within it for `AHDR`, parsing
/// the absolute palette and header fields. Any tag encountered along the
/// way that isn't the one being looked for is skipped.
pub fn open<R: Read>(r: &mut R, palette: &mut Palette) -> Result<AnimHeader> {
    loop {
        let hdr = read_tag_header(r)?;
        if hdr.name == FourCC::ANIM {
            break;
        }
        skip(r, u64::from(hdr.size))?;
    }

    loop {
        let hdr = read_tag_header(r)?;
        if hdr.name == FourCC::AHDR {
            let mut chunk = ChunkReader::new(r, hdr);
            let ahdr = read_ahdr(&mut chunk, palette)?;
            chunk.drain()?;
            return Ok(ahdr);
        }
        skip(r, u64::from(hdr.size))?;
    }
}

fn read_ahdr<R: Read>(r: &mut ChunkReader<'_, R>, palette: &mut Palette) -> Result<AnimHeader> {
    if r.header.size < AHDR_MIN_SIZE {
        return Err(Error::FormatError("AHDR chunk too small"));
    }
    let version = le_u16(r)?;
    let frame_count = le_u16(r)?;
    let mut dummy = [0u8; 2];
    r.read_exact(&mut dummy)?;
    palette.load_ahdr(r)?;

    let (framerate, maxframe, samplerate) = if r.bytes_left() >= u64::from(AHDR_TIMING_BYTES) {
        let framerate = crate::reader::le_u32(r)?;
        let maxframe = crate::reader::le_u32(r)?;
        let samplerate = crate::reader::le_u32(r)?;
        let mut unknown = [0u8; 8];
        r.read_exact(&mut unknown)?;
        (framerate, maxframe, samplerate)
    } else {
        (0, 0, 0)
    };

    Ok(AnimHeader {
        version,
        frame_count,
        framerate,
        maxframe,
        samplerate,
    })
}

/// Everything decoding one `FRME` chunk touches, gathered so the driver
/// doesn't need a dozen separate arguments threaded through.
pub struct FrameContext<'p> {
    pub pool: &'p mut FramePool,
    pub palette: &'p mut Palette,
    pub glyphs: &'p GlyphTables,
    pub motion: &'p [(i8, i8); MOTION_VECTOR_COUNT],
    pub codec47: &'p mut Codec47State,
    pub iact: &'p mut IactState,
}

/// Result of successfully decoding one `FRME`: whatever subtitle id it
/// carried, if any, plus the rotation to apply once the caller is done
/// reading the committed `Cur` buffer.
pub struct FrameResult {
    pub subtitle_id: Option<u16>,
    rotation: Rotation,
    to_store: bool,
}

impl FrameResult {
    /// Apply `STOR`/rotation now that the caller has finished reading the
    /// `Cur` buffer this frame committed. Must be called exactly once per
    /// `decode_frame` call before the next one.
    pub fn commit(self, pool: &mut FramePool) {
        if self.to_store {
            pool.copy_role(Role::Saved, Role::Cur);
        }
        pool.rotate(self.rotation);
    }
}

/// Decode one `FRME` chunk, dispatching every inner tag. `audio_sink` is
/// called zero or more times with owned PCM buffers as `IACT` sub-blocks
/// complete. The caller must read `pool`'s `Cur` buffer and then call
/// [`FrameResult::commit`] before decoding the next frame.
pub fn decode_frame<R: Read>(
    r: &mut R,
    ctx: &mut FrameContext<'_>,
    mut audio_sink: impl FnMut(TryVec<u8>) -> Result<()>,
) -> Result<FrameResult> {
    let outer = read_tag_header(r)?;
    if outer.name != FourCC::FRME {
        return Err(Error::FormatError("expected FRME tag"));
    }

    let mut budget = ChunkReader::new(r, outer);
    let mut to_store = false;
    let mut rotation = Rotation::None;
    let mut subtitle_id = None;

    while budget.bytes_left() > 3 {
        let inner_hdr = read_tag_header(&mut budget)?;
        if u64::from(inner_hdr.size) > budget.bytes_left() {
            return Err(Error::FormatError("inner tag exceeds FRME budget"));
        }
        let mut inner = ChunkReader::new(&mut budget, inner_hdr);

        match FrameTag::from(inner_hdr.name) {
            FrameTag::Npal => ctx.palette.load_npal(&mut inner)?,
            FrameTag::Xpal => ctx.palette.apply_xpal(&mut inner)?,
            FrameTag::Fobj => {
                rotation = decode_fobj(ctx.pool, ctx.glyphs, ctx.motion, ctx.codec47, &mut inner)?;
            }
            FrameTag::Iact => {
                let _header = read_iact_header(&mut inner)?;
                ctx.iact.process(&mut inner, &mut audio_sink)?;
            }
            FrameTag::Tres => {
                let mut fields = [0u16; 9];
                for f in fields.iter_mut() {
                    *f = le_u16(&mut inner)?;
                }
                subtitle_id = Some(fields[8]);
            }
            FrameTag::Stor => to_store = true,
            FrameTag::Ftch => ctx.pool.copy_role(Role::Cur, Role::Saved),
            FrameTag::Unknown(tag) => {
                debug!("unknown FRME child tag '{}'", tag);
                return Err(Error::FormatError("unknown FRME child tag"));
            }
        }
        inner.drain()?;
    }
    budget.drain()?;

    Ok(FrameResult {
        subtitle_id,
        rotation,
        to_store,
    })
}
