// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Describes decoder failures.
///
/// This enum wraps the standard `io::Error` type, unified with our own
/// format-validation states and those of the allocation crate we use.
#[derive(Debug)]
pub enum Error {
    /// A chunk or sub-structure was smaller than required, or a read ran
    /// past the end of the host's byte source.
    ShortRead,
    /// Malformed container or codec data: a bad tag, an out-of-range
    /// field, a chunk whose declared size exceeds its parent's budget.
    FormatError(&'static str),
    /// A fallible allocation failed because a size field, taken from
    /// untrusted input, requested more memory than was available.
    AllocFailure,
    /// Propagate underlying errors from `std::io`.
    Io(std::io::Error),
    /// `decode_next_frame` was called after the last `FRME` had already
    /// been decoded. Sticky: every subsequent call also returns this.
    Done,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ShortRead => write!(f, "short read"),
            Error::FormatError(msg) => write!(f, "malformed SAN data: {msg}"),
            Error::AllocFailure => write!(f, "out of memory"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Done => write!(f, "no more frames"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::ShortRead,
            _ => Error::Io(err),
        }
    }
}

impl From<fallible_collections::TryReserveError> for Error {
    fn from(_: fallible_collections::TryReserveError) -> Error {
        Error::AllocFailure
    }
}

/// Result shorthand using our Error enum.
pub type Result<T> = std::result::Result<T, Error>;
