// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder for LucasArts "SAN" animation files: the `ANIMv2` container,
//! SMUSH codec 47 video, and `IACT` 22.05kHz 16-bit stereo audio.
//!
//! [`SanDecoder::open`] parses the stream up through its `AHDR` header;
//! [`SanDecoder::decode_next_frame`] then drives one `FRME` at a time,
//! handing decoded video to a sink closure and any audio sub-blocks to a
//! second one. The decoder only ever reads forward through its `R: Read`
//! source, and it never seeks.

#[macro_use]
extern crate log;

use std::io::Read;

mod audio;
mod buffers;
pub mod c_api;
mod codec47;
mod container;
pub mod error;
mod glyph;
mod motion;
mod palette;
mod reader;
mod tags;

pub use error::{Error, Result};

/// Fallible-allocation byte buffer used for everything whose size is
/// taken from an untrusted chunk-size field (`IACT` sub-blocks, `RLE`
/// output). Re-exported so sink closures can name the audio buffer type.
pub use fallible_collections::TryVec;

use buffers::{FramePool, Role};
use codec47::Codec47State;
use container::{AnimHeader, FrameContext};
use glyph::GlyphTables;
use motion::{build_motion_vectors, MOTION_VECTOR_COUNT};
use palette::Palette;

/// One decoded video frame, borrowed from the decoder's internal state
/// for the duration of the sink call that receives it.
///
/// `pixels` is an indexed (paletted) image, `width * height` bytes,
/// row-major, one byte per pixel. `palette` has exactly 256 ARGB8888
/// entries with alpha always `0xFF`.
pub struct VideoFrame<'a> {
    pub pixels: &'a [u8],
    pub width: u16,
    pub height: u16,
    pub palette: &'a [u32; 256],
    /// The subtitle string id from the most recent `TRES` tag in this
    /// `FRME`, if any. The decoder does not render text; this is a
    /// lookup key into whatever string table the host owns.
    pub subtitle_id: Option<u16>,
}

/// An open SAN stream, positioned just after its `AHDR` header.
///
/// Owns everything the decode loop needs: the frame buffer pool, the
/// palette, the precomputed glyph and motion-vector tables, and the
/// per-stream codec state that must survive across `FRME` chunks
/// (`Codec47State`'s `lastseq`, `IactState`'s sub-block assembly
/// position).
pub struct SanDecoder<R> {
    src: R,
    header: AnimHeader,
    pool: FramePool,
    palette: Palette,
    glyphs: GlyphTables,
    motion: [(i8, i8); MOTION_VECTOR_COUNT],
    codec47: Codec47State,
    iact: audio::IactState,
    current_frame: u32,
    done: bool,
}

impl<R: Read> SanDecoder<R> {
    /// Bind a byte source and parse the stream up through `AHDR`. Frame
    /// buffers aren't allocated yet, that happens lazily on the first
    /// `FOBJ`, but the glyph and motion-vector tables are built here,
    /// since every later `FOBJ` needs them and they depend on nothing
    /// from the stream itself.
    pub fn open(mut src: R) -> Result<Self> {
        let mut palette = Palette::new();
        let header = container::open(&mut src, &mut palette)?;
        debug!(
            "opened SAN stream: version {}, {} frame(s), {}Hz",
            header.version, header.frame_count, header.samplerate
        );
        Ok(SanDecoder {
            src,
            header,
            pool: FramePool::new(),
            palette,
            glyphs: GlyphTables::build(),
            motion: build_motion_vectors(),
            codec47: Codec47State::new(),
            iact: audio::IactState::new(),
            current_frame: 0,
            done: false,
        })
    }

    /// Version field from `AHDR`.
    pub fn version(&self) -> u16 {
        self.header.version
    }

    /// Declared frames-per-second, if `AHDR` carried the optional timing
    /// fields; `0` otherwise. Informational only, this crate never
    /// paces playback.
    pub fn framerate(&self) -> u32 {
        self.header.framerate
    }

    /// Declared audio sample rate in Hz, or `0` if `AHDR` didn't carry it.
    pub fn samplerate(&self) -> u32 {
        self.header.samplerate
    }

    /// Total number of `FRME` chunks the stream declares.
    pub fn frame_count(&self) -> u32 {
        u32::from(self.header.frame_count)
    }

    /// Number of `FRME` chunks successfully committed so far.
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Decode one `FRME` chunk.
    ///
    /// `video_sink` is called exactly once, with a [`VideoFrame`]
    /// borrowing this decoder's buffers for the duration of the call.
    /// `audio_sink` is called zero or more times, in the order `IACT`
    /// sub-blocks complete, with an owned 4096-byte PCM buffer per call.
    ///
    /// Returns [`Error::Done`] once every declared `FRME` has been
    /// decoded; every call after the first `Done` also returns `Done`.
    /// Any other error aborts the in-progress `FRME` and is returned to
    /// the caller; the decoder must not be used again afterward, since
    /// its buffers may reflect a partially-applied frame.
    pub fn decode_next_frame(
        &mut self,
        mut video_sink: impl FnMut(VideoFrame<'_>) -> Result<()>,
        audio_sink: impl FnMut(TryVec<u8>) -> Result<()>,
    ) -> Result<()> {
        if self.done || self.current_frame >= self.frame_count() {
            self.done = true;
            return Err(Error::Done);
        }

        let result = {
            let mut ctx = FrameContext {
                pool: &mut self.pool,
                palette: &mut self.palette,
                glyphs: &self.glyphs,
                motion: &self.motion,
                codec47: &mut self.codec47,
                iact: &mut self.iact,
            };
            match container::decode_frame(&mut self.src, &mut ctx, audio_sink) {
                Ok(result) => result,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        };

        video_sink(VideoFrame {
            pixels: self.pool.get(Role::Cur),
            width: self.pool.width(),
            height: self.pool.height(),
            palette: &self.palette.entries,
            subtitle_id: result.subtitle_id,
        })?;

        result.commit(&mut self.pool);
        self.current_frame += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn be_tag(name: &[u8; 4], size: u32) -> Vec<u8> {
        let mut v = name.to_vec();
        v.extend_from_slice(&size.to_be_bytes());
        v
    }

    fn pad_even(mut v: Vec<u8>) -> Vec<u8> {
        if v.len() % 2 == 1 {
            v.push(0);
        }
        v
    }

    /// Builds the smallest well-formed stream: one `FRME` with an `NPAL`
    /// and a raw `FOBJ`.
    fn s1_stream() -> Vec<u8> {
        let mut ahdr_body = Vec::new();
        ahdr_body.extend_from_slice(&2u16.to_le_bytes()); // version
        ahdr_body.extend_from_slice(&1u16.to_le_bytes()); // FRMEcnt
        ahdr_body.extend_from_slice(&[0, 0]); // dummy
        for _ in 0..256 {
            ahdr_body.extend_from_slice(&[0x01, 0x02, 0x03]); // R,G,B
        }
        ahdr_body.extend_from_slice(&15u32.to_le_bytes()); // framerate
        ahdr_body.extend_from_slice(&64u32.to_le_bytes()); // maxframe
        ahdr_body.extend_from_slice(&22050u32.to_le_bytes()); // samplerate
        ahdr_body.extend_from_slice(&[0u8; 8]); // two unknown u32s

        let mut npal_body = Vec::new();
        for _ in 0..256 {
            npal_body.extend_from_slice(&[0xAA, 0xBB, 0xCC]); // B,G,R on disk
        }

        let mut fobj_body = Vec::new();
        fobj_body.extend_from_slice(&47u16.to_le_bytes()); // codec
        fobj_body.extend_from_slice(&0u16.to_le_bytes()); // left
        fobj_body.extend_from_slice(&0u16.to_le_bytes()); // top
        fobj_body.extend_from_slice(&4u16.to_le_bytes()); // w
        fobj_body.extend_from_slice(&4u16.to_le_bytes()); // h
        fobj_body.extend_from_slice(&0u32.to_le_bytes()); // unused
        fobj_body.extend_from_slice(&0u16.to_le_bytes()); // seq
        fobj_body.push(0); // comp = raw
        fobj_body.push(0); // newrot
        fobj_body.push(0); // skip
        fobj_body.extend_from_slice(&[0u8; 9]); // reserved
        fobj_body.extend_from_slice(&16u32.to_le_bytes()); // decsize
        fobj_body.extend_from_slice(&[0u8; 8]); // headtbl
        fobj_body.extend((0u8..16).collect::<Vec<u8>>()); // raw pixels

        let mut frme_body = Vec::new();
        frme_body.extend(be_tag(b"NPAL", npal_body.len() as u32));
        frme_body.extend(pad_even(npal_body));
        frme_body.extend(be_tag(b"FOBJ", fobj_body.len() as u32));
        frme_body.extend(pad_even(fobj_body));

        let mut out = Vec::new();
        out.extend(be_tag(b"ANIM", 0));
        out.extend(be_tag(b"AHDR", ahdr_body.len() as u32));
        out.extend(ahdr_body);
        out.extend(be_tag(b"FRME", frme_body.len() as u32));
        out.extend(frme_body);
        out
    }

    #[test]
    fn s1_smallest_stream_decodes_one_frame() {
        let stream = s1_stream();
        let mut dec = SanDecoder::open(Cursor::new(stream)).unwrap();
        assert_eq!(dec.version(), 2);
        assert_eq!(dec.framerate(), 15);
        assert_eq!(dec.samplerate(), 22050);
        assert_eq!(dec.frame_count(), 1);

        let mut seen_pixels = Vec::new();
        let mut seen_palette0 = 0u32;
        dec.decode_next_frame(
            |f| {
                seen_pixels = f.pixels.to_vec();
                seen_palette0 = f.palette[0];
                assert_eq!(f.width, 4);
                assert_eq!(f.height, 4);
                Ok(())
            },
            |_pcm| Ok(()),
        )
        .unwrap();

        assert_eq!(seen_pixels, (0u8..16).collect::<Vec<u8>>());
        assert_eq!(seen_palette0, 0xFFCC_BBAA);
        assert_eq!(dec.current_frame(), 1);

        let err = dec.decode_next_frame(|_| Ok(()), |_| Ok(()));
        assert!(matches!(err, Err(Error::Done)));
        // Done is sticky.
        let err2 = dec.decode_next_frame(|_| Ok(()), |_| Ok(()));
        assert!(matches!(err2, Err(Error::Done)));
    }

    #[test]
    fn unknown_frame_child_tag_is_fatal() {
        let mut ahdr_body = Vec::new();
        ahdr_body.extend_from_slice(&1u16.to_le_bytes());
        ahdr_body.extend_from_slice(&1u16.to_le_bytes());
        ahdr_body.extend_from_slice(&[0, 0]);
        ahdr_body.extend_from_slice(&[0u8; 768]);

        let frme_body = be_tag(b"ZZZZ", 0);

        let mut out = Vec::new();
        out.extend(be_tag(b"ANIM", 0));
        out.extend(be_tag(b"AHDR", ahdr_body.len() as u32));
        out.extend(ahdr_body);
        out.extend(be_tag(b"FRME", frme_body.len() as u32));
        out.extend(frme_body);

        let mut dec = SanDecoder::open(Cursor::new(out)).unwrap();
        let err = dec.decode_next_frame(|_| Ok(()), |_| Ok(()));
        assert!(matches!(err, Err(Error::FormatError(_))));
    }
}
