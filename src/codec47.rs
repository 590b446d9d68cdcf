// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SMUSH codec 47 video decoder (the `FOBJ` payload).

use byteorder::{ByteOrder, LittleEndian};
use fallible_collections::TryVec;
use std::io::Read;

use crate::buffers::{FramePool, Role, Rotation};
use crate::error::{Error, Result};
use crate::glyph::GlyphTables;
use crate::motion::MOTION_VECTOR_COUNT;
use crate::reader::{le_u16, le_u32, le_u8, skip, ChunkReader};

const FOBJ_HEADER_LEN: usize = 14;
const CODEC47_PAYLOAD_HEADER_LEN: usize = 26;
const SKIP_AUX_LEN: u64 = 0x8080;

/// Carries state that must survive across `FOBJ` chunks within a stream:
/// the last seen sequence number, used to decide whether block-tree
/// decode and rotation apply to this frame at all.
pub struct Codec47State {
    lastseq: i64,
}

impl Codec47State {
    pub fn new() -> Self {
        Codec47State { lastseq: -1 }
    }
}

impl Default for Codec47State {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one `FOBJ` chunk's body into `pool`'s `Cur` buffer, growing the
/// pool first if the object's rectangle demands a larger canvas. Returns
/// the rotation to apply once the enclosing `FRME` commits.
pub fn decode_fobj<T: Read>(
    pool: &mut FramePool,
    glyphs: &GlyphTables,
    motion: &[(i8, i8); MOTION_VECTOR_COUNT],
    state: &mut Codec47State,
    r: &mut ChunkReader<'_, T>,
) -> Result<Rotation> {
    let codec = le_u16(r)?;
    if codec != 47 {
        return Err(Error::FormatError("FOBJ codec id is not 47"));
    }
    let left = le_u16(r)?;
    let top = le_u16(r)?;
    let w = le_u16(r)?;
    let h = le_u16(r)?;
    let _unused = le_u32(r)?;

    let new_w = pool.width().max(left.saturating_add(w));
    let new_h = pool.height().max(top.saturating_add(h));
    pool.ensure(new_w, new_h)?;

    let mut hdr = [0u8; CODEC47_PAYLOAD_HEADER_LEN];
    r.read_exact(&mut hdr)?;
    let seq = LittleEndian::read_u16(&hdr[0..2]);
    let comp = hdr[2];
    let newrot = hdr[3];
    let skip_flag = hdr[4];
    let decsize = LittleEndian::read_u32(&hdr[14..18]);
    let headtbl = &hdr[8..16];

    if seq == 0 {
        state.lastseq = -1;
        pool.get_mut(Role::P1).fill(0);
        pool.get_mut(Role::P2).fill(0);
    }
    if skip_flag & 1 != 0 {
        skip(r, SKIP_AUX_LEN)?;
    }

    let consecutive = i64::from(seq) == state.lastseq + 1;

    match comp {
        0 => decode_raw(pool, r, left, top, w, h)?,
        1 => decode_halfres(pool, r, left, top, w, h)?,
        2 => {
            if consecutive {
                decode_blocktree(pool, glyphs, motion, headtbl, r, left, top, w, h)?;
            }
        }
        3 => pool.copy_role(Role::Cur, Role::P2),
        4 => pool.copy_role(Role::Cur, Role::P1),
        5 => {
            let data = decode_rle(r, decsize)?;
            write_rect(pool, left, top, w, h, &data)?;
        }
        _other => return Err(Error::FormatError("unknown codec47 comp value")),
    }

    state.lastseq = i64::from(seq);
    Ok(if consecutive {
        Rotation::from(newrot)
    } else {
        Rotation::None
    })
}

fn decode_raw<T: Read>(
    pool: &mut FramePool,
    r: &mut ChunkReader<'_, T>,
    left: u16,
    top: u16,
    w: u16,
    h: u16,
) -> Result<()> {
    let mut row = TryVec::with_capacity(usize::from(w))?;
    row.resize(usize::from(w), 0)?;
    let stride = usize::from(pool.width());
    for dy in 0..h {
        r.read_exact(&mut row)?;
        let base = (usize::from(top + dy)) * stride + usize::from(left);
        pool.get_mut(Role::Cur)[base..base + usize::from(w)].copy_from_slice(&row);
    }
    Ok(())
}

fn decode_halfres<T: Read>(
    pool: &mut FramePool,
    r: &mut ChunkReader<'_, T>,
    left: u16,
    top: u16,
    w: u16,
    h: u16,
) -> Result<()> {
    let stride = usize::from(pool.width());
    let mut cy = 0u16;
    while cy < h {
        let mut cx = 0u16;
        while cx < w {
            let color = le_u8(r)?;
            for dy in 0..2u16 {
                for dx in 0..2u16 {
                    if cy + dy >= h || cx + dx >= w {
                        continue;
                    }
                    let idx = usize::from(top + cy + dy) * stride + usize::from(left + cx + dx);
                    pool.get_mut(Role::Cur)[idx] = color;
                }
            }
            cx += 2;
        }
        cy += 2;
    }
    Ok(())
}

fn decode_rle<T: Read>(r: &mut ChunkReader<'_, T>, decsize: u32) -> Result<TryVec<u8>> {
    let mut out = TryVec::with_capacity(decsize as usize)?;
    while out.len() < decsize as usize {
        let opc = le_u8(r)?;
        let run = usize::from(opc >> 1) + 1;
        if opc & 1 != 0 {
            let color = le_u8(r)?;
            for _ in 0..run {
                out.push(color)?;
            }
        } else {
            for _ in 0..run {
                let b = le_u8(r)?;
                out.push(b)?;
            }
        }
    }
    out.truncate(decsize as usize);
    Ok(out)
}

fn write_rect(pool: &mut FramePool, left: u16, top: u16, w: u16, h: u16, data: &[u8]) -> Result<()> {
    let stride = usize::from(pool.width());
    let dst = pool.get_mut(Role::Cur);
    for row in 0..usize::from(h) {
        let src_off = row * usize::from(w);
        if src_off + usize::from(w) > data.len() {
            return Err(Error::FormatError("RLE output shorter than declared size"));
        }
        let dst_off = (usize::from(top) + row) * stride + usize::from(left);
        dst[dst_off..dst_off + usize::from(w)].copy_from_slice(&data[src_off..src_off + usize::from(w)]);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn decode_blocktree<T: Read>(
    pool: &mut FramePool,
    glyphs: &GlyphTables,
    motion: &[(i8, i8); MOTION_VECTOR_COUNT],
    headtbl: &[u8],
    r: &mut ChunkReader<'_, T>,
    left: u16,
    top: u16,
    w: u16,
    h: u16,
) -> Result<()> {
    let mut by = 0u16;
    while by < h {
        let mut bx = 0u16;
        while bx < w {
            decode_block(pool, glyphs, motion, headtbl, r, left + bx, top + by, 8)?;
            bx += 8;
        }
        by += 8;
    }
    Ok(())
}

fn decode_block<T: Read>(
    pool: &mut FramePool,
    glyphs: &GlyphTables,
    motion: &[(i8, i8); MOTION_VECTOR_COUNT],
    headtbl: &[u8],
    r: &mut ChunkReader<'_, T>,
    x0: u16,
    y0: u16,
    size0: u8,
) -> Result<()> {
    let mut stack: TryVec<(u16, u16, u8)> = TryVec::new();
    stack.push((x0, y0, size0))?;

    while let Some((x, y, size)) = stack.pop() {
        let code = le_u8(r)?;
        match code {
            0xFF => {
                if size > 2 {
                    let half = size / 2;
                    stack.push((x + u16::from(half), y + u16::from(half), half))?;
                    stack.push((x, y + u16::from(half), half))?;
                    stack.push((x + u16::from(half), y, half))?;
                    stack.push((x, y, half))?;
                } else {
                    let tl = le_u8(r)?;
                    let tr = le_u8(r)?;
                    let bl = le_u8(r)?;
                    let br = le_u8(r)?;
                    write_pixel(pool, x, y, tl)?;
                    write_pixel(pool, x + 1, y, tr)?;
                    write_pixel(pool, x, y + 1, bl)?;
                    write_pixel(pool, x + 1, y + 1, br)?;
                }
            }
            0xFE => {
                let color = le_u8(r)?;
                fill_block(pool, x, y, size, color)?;
            }
            0xFD => {
                if size <= 2 {
                    return Err(Error::FormatError("glyph fill below minimum block size"));
                }
                let glyph_idx = usize::from(le_u8(r)?);
                let c0 = le_u8(r)?;
                let c1 = le_u8(r)?;
                let stride = usize::from(pool.width());
                let dst = pool.get_mut(Role::Cur);
                let sz = usize::from(size);
                let mask: &[u8] = if size == 4 {
                    &glyphs.mask4[glyph_idx]
                } else {
                    &glyphs.mask8[glyph_idx]
                };
                for row in 0..sz {
                    for col in 0..sz {
                        let bit = mask[row * sz + col];
                        let color = if bit == 0 { c1 } else { c0 };
                        let idx = (usize::from(y) + row) * stride + usize::from(x) + col;
                        dst[idx] = color;
                    }
                }
            }
            0xFC => copy_block(pool, Role::P1, x, y, size, 0, 0)?,
            0xF8..=0xFB => {
                let color = headtbl[usize::from(code & 7)];
                fill_block(pool, x, y, size, color)?;
            }
            _ => {
                let (dx, dy) = motion[usize::from(code)];
                copy_block(pool, Role::P2, x, y, size, i32::from(dx), i32::from(dy))?;
            }
        }
    }
    Ok(())
}

fn write_pixel(pool: &mut FramePool, x: u16, y: u16, color: u8) -> Result<()> {
    let stride = usize::from(pool.width());
    let idx = usize::from(y) * stride + usize::from(x);
    pool.get_mut(Role::Cur)[idx] = color;
    Ok(())
}

fn fill_block(pool: &mut FramePool, x: u16, y: u16, size: u8, color: u8) -> Result<()> {
    let stride = usize::from(pool.width());
    let dst = pool.get_mut(Role::Cur);
    for row in 0..usize::from(size) {
        let base = (usize::from(y) + row) * stride + usize::from(x);
        dst[base..base + usize::from(size)].fill(color);
    }
    Ok(())
}

fn copy_block(
    pool: &mut FramePool,
    src_role: Role,
    x: u16,
    y: u16,
    size: u8,
    dx: i32,
    dy: i32,
) -> Result<()> {
    let w = i32::from(pool.width());
    let h = i32::from(pool.height());
    let sz = usize::from(size);
    let mut tmp = [0u8; 64];
    {
        let src = pool.get(src_role);
        for row in 0..sz as i32 {
            let sy = i32::from(y) + dy + row;
            for col in 0..sz as i32 {
                let sx = i32::from(x) + dx + col;
                if sx < 0 || sy < 0 || sx >= w || sy >= h {
                    return Err(Error::FormatError(
                        "motion-compensated read out of frame bounds",
                    ));
                }
                tmp[(row * sz as i32 + col) as usize] = src[(sy * w + sx) as usize];
            }
        }
    }
    let stride = usize::from(pool.width());
    let dst = pool.get_mut(Role::Cur);
    for row in 0..sz {
        let base = (usize::from(y) as usize + row) * stride + usize::from(x);
        dst[base..base + sz].copy_from_slice(&tmp[row * sz..row * sz + sz]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::build_motion_vectors;

    fn make_pool(w: u16, h: u16) -> FramePool {
        let mut pool = FramePool::new();
        pool.ensure(w, h).unwrap();
        pool
    }

    #[test]
    fn raw_copies_bytes_directly() {
        let mut pool = make_pool(4, 4);
        let data: Vec<u8> = (0u8..16).collect();
        let mut cursor = std::io::Cursor::new(data.clone());
        let mut chunk = ChunkReader::for_test(&mut cursor, 16);
        decode_raw(&mut pool, &mut chunk, 0, 0, 4, 4).unwrap();
        assert_eq!(pool.get(Role::Cur), data.as_slice());
    }

    #[test]
    fn halfres_replicates_each_byte_into_a_2x2_cell() {
        let mut pool = make_pool(4, 4);
        let data = [0x10u8, 0x20, 0x30, 0x40];
        let mut cursor = std::io::Cursor::new(data);
        let mut chunk = ChunkReader::for_test(&mut cursor, 4);
        decode_halfres(&mut pool, &mut chunk, 0, 0, 4, 4).unwrap();
        let expect: [u8; 16] = [
            0x10, 0x10, 0x20, 0x20, 0x10, 0x10, 0x20, 0x20, 0x30, 0x30, 0x40, 0x40, 0x30, 0x30,
            0x40, 0x40,
        ];
        assert_eq!(pool.get(Role::Cur), &expect);
    }

    #[test]
    fn rle_fill_tokens_expand_to_runs() {
        let tokens = [0x07u8, 0xAA, 0x07, 0xBB];
        let mut cursor = std::io::Cursor::new(tokens);
        let mut chunk = ChunkReader::for_test(&mut cursor, 4);
        let out = decode_rle(&mut chunk, 8).unwrap();
        assert_eq!(out.as_slice(), &[0xAA, 0xAA, 0xAA, 0xAA, 0xBB, 0xBB, 0xBB, 0xBB]);
    }

    #[test]
    fn comp3_copies_p2_byte_exactly() {
        let mut pool = make_pool(2, 2);
        pool.get_mut(Role::P2).copy_from_slice(&[1, 2, 3, 4]);
        pool.copy_role(Role::Cur, Role::P2);
        assert_eq!(pool.get(Role::Cur), pool.get(Role::P2));
    }

    #[test]
    fn motion_copy_rejects_out_of_bounds_read() {
        let mut pool = make_pool(4, 4);
        let mv = build_motion_vectors();
        // pick a large-offset vector guaranteed to push the source out of
        // frame for an 8x8 block placed at the origin of a 4x4 canvas.
        let (dx, dy) = mv[mv.len() - 1];
        let err = copy_block(&mut pool, Role::P2, 0, 0, 8, i32::from(dx) - 10, i32::from(dy) - 10);
        assert!(err.is_err());
    }
}
