// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Four-character chunk tags used by the ANIMv2 container.
//!
//! Tags are stored on disk as 4 raw bytes, read big-endian as a `u32` for
//! cheap comparison, but they read as ASCII (`ANIM`, `FRME`, ...).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const ANIM: FourCC = FourCC(0x414e_494d);
    pub const AHDR: FourCC = FourCC(0x4148_4452);
    pub const FRME: FourCC = FourCC(0x4652_4d45);
    pub const NPAL: FourCC = FourCC(0x4e50_414c);
    pub const FOBJ: FourCC = FourCC(0x464f_424a);
    pub const IACT: FourCC = FourCC(0x4941_4354);
    pub const TRES: FourCC = FourCC(0x5452_4553);
    pub const STOR: FourCC = FourCC(0x5354_4f52);
    pub const FTCH: FourCC = FourCC(0x4654_4348);
    pub const XPAL: FourCC = FourCC(0x5850_414c);
}

impl From<u32> for FourCC {
    fn from(v: u32) -> Self {
        FourCC(v)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0.to_be_bytes()) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:#010x}", self.0),
        }
    }
}

/// Tags that can appear as the inner children of a `FRME` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    Npal,
    Fobj,
    Iact,
    Tres,
    Stor,
    Ftch,
    Xpal,
    Unknown(FourCC),
}

impl From<FourCC> for FrameTag {
    fn from(tag: FourCC) -> Self {
        match tag {
            FourCC::NPAL => FrameTag::Npal,
            FourCC::FOBJ => FrameTag::Fobj,
            FourCC::IACT => FrameTag::Iact,
            FourCC::TRES => FrameTag::Tres,
            FourCC::STOR => FrameTag::Stor,
            FourCC::FTCH => FrameTag::Ftch,
            FourCC::XPAL => FrameTag::Xpal,
            other => FrameTag::Unknown(other),
        }
    }
}
