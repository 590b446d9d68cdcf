// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tag-scoped reading.
//!
//! [`ChunkReader`] wraps a byte source in a `Take`: it carries its own
//! remaining-byte budget and knows how to drain whatever the handler
//! didn't consume.

use byteorder::ReadBytesExt;
use std::io::{Read, Take};

use crate::error::{Error, Result};
use crate::tags::FourCC;

/// Header of one tag: its four-character name and its big-endian size.
#[derive(Debug, Clone, Copy)]
pub struct TagHeader {
    pub name: FourCC,
    pub size: u32,
}

/// A reader scoped to exactly one tag's body.
pub struct ChunkReader<'a, T> {
    pub header: TagHeader,
    content: Take<&'a mut T>,
}

impl<'a, T: Read> ChunkReader<'a, T> {
    pub(crate) fn new(src: &'a mut T, header: TagHeader) -> Self {
        ChunkReader {
            header,
            content: src.take(u64::from(header.size)),
        }
    }

    /// Build a `ChunkReader` directly from a declared size, for use by
    /// other modules' unit tests that exercise one chunk handler in
    /// isolation without going through the full tag-reading loop.
    #[cfg(test)]
    pub(crate) fn for_test(src: &'a mut T, size: u32) -> Self {
        ChunkReader::new(
            src,
            TagHeader {
                name: FourCC(0),
                size,
            },
        )
    }

    pub fn bytes_left(&self) -> u64 {
        self.content.limit()
    }

    /// Drain and discard whatever remains of this tag's body, including
    /// the even-alignment pad byte if the declared size was odd.
    pub fn drain(&mut self) -> Result<()> {
        let remain = self.content.limit();
        std::io::copy(&mut self.content, &mut std::io::sink())?;
        if remain > 0 {
            debug!("drained {} leftover byte(s) in '{}'", remain, self.header.name);
        }
        if self.header.size % 2 == 1 {
            let mut pad = [0u8; 1];
            self.content.get_mut().read_exact(&mut pad)?;
        }
        Ok(())
    }
}

impl<'a, T: Read> Read for ChunkReader<'a, T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.content.read(buf)
    }
}

/// Read one 8-byte tag header: a big-endian 4-byte FourCC followed by a
/// big-endian 4-byte size.
pub fn read_tag_header<T: Read>(src: &mut T) -> Result<TagHeader> {
    let name = FourCC(be_u32(src)?);
    let size = be_u32(src)?;
    Ok(TagHeader { name, size })
}

/// Read one tag header and return a `ChunkReader` scoped to its body.
pub fn read_chunk<'a, T: Read>(src: &'a mut T) -> Result<ChunkReader<'a, T>> {
    let header = read_tag_header(src)?;
    Ok(ChunkReader::new(src, header))
}

/// Skip a number of bytes we don't care to parse.
pub fn skip<T: Read>(src: &mut T, bytes: u64) -> Result<()> {
    std::io::copy(&mut src.take(bytes), &mut std::io::sink())?;
    Ok(())
}

pub fn be_u16<T: ReadBytesExt>(src: &mut T) -> Result<u16> {
    src.read_u16::<byteorder::BigEndian>().map_err(Error::from)
}

pub fn be_u32<T: ReadBytesExt>(src: &mut T) -> Result<u32> {
    src.read_u32::<byteorder::BigEndian>().map_err(Error::from)
}

pub fn le_u8<T: ReadBytesExt>(src: &mut T) -> Result<u8> {
    src.read_u8().map_err(Error::from)
}

pub fn le_u16<T: ReadBytesExt>(src: &mut T) -> Result<u16> {
    src.read_u16::<byteorder::LittleEndian>().map_err(Error::from)
}

pub fn le_u32<T: ReadBytesExt>(src: &mut T) -> Result<u32> {
    src.read_u32::<byteorder::LittleEndian>().map_err(Error::from)
}

pub fn le_i16<T: ReadBytesExt>(src: &mut T) -> Result<i16> {
    src.read_i16::<byteorder::LittleEndian>().map_err(Error::from)
}
