// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! C bindings.
//!
//! Wraps [`crate::SanDecoder`] behind the callback-and-userdata shape a
//! C host (the original engine's windowing/audio shell, out of scope for
//! this crate) expects: a blocking read callback plus two delivery
//! callbacks, exactly the "Host callback contract" this decoder's
//! container format is specified against. The safe, idiomatic API in
//! the crate root (`Read` + `FnMut` sinks) is what this module is built
//! on top of, not a parallel implementation.

use std::io::Read;
use std::os::raw::c_void;
use std::ptr;

use crate::{Error, SanDecoder, VideoFrame};

/// `read(userctx, dst, n) -> 1` on a full read, `0` on short read/EOF.
/// `dst` may be `NULL`, in which case the callback must still advance its
/// stream position by `n` bytes without writing anything (used to drain
/// chunk padding the decoder doesn't care to inspect).
pub type SanReadCb =
    unsafe extern "C" fn(userctx: *mut c_void, dst: *mut u8, n: usize) -> i32;

/// Called exactly once per successfully decoded `FRME`. `buf`/`pal` are
/// only valid for the duration of the call.
pub type SanVideoCb = unsafe extern "C" fn(
    userctx: *mut c_void,
    buf: *const u8,
    size: usize,
    w: u16,
    h: u16,
    pal: *const u32,
    subid: i32,
);

/// Called zero or more times per `FRME` with one decoded PCM sub-block.
/// `buf` is valid only for the duration of the call; the host must copy
/// it if it needs to outlive the callback.
pub type SanAudioCb = unsafe extern "C" fn(userctx: *mut c_void, buf: *const u8, size: usize);

/// Adapts a `SanReadCb` + userdata pointer into `std::io::Read`.
struct CallbackReader {
    read_cb: SanReadCb,
    userctx: *mut c_void,
}

impl Read for CallbackReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let dst = if buf.is_empty() {
            ptr::null_mut()
        } else {
            buf.as_mut_ptr()
        };
        let ok = unsafe { (self.read_cb)(self.userctx, dst, buf.len()) };
        if ok == 1 {
            Ok(buf.len())
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "san read callback reported a short read",
            ))
        }
    }
}

/// Opaque handle to an open decoder, owned by the caller until passed to
/// [`san_close`].
pub struct SanDecoderHandle {
    decoder: SanDecoder<CallbackReader>,
}

/// Open a SAN stream. `userctx` is passed back unchanged to `read_cb` on
/// every call. Returns `NULL` on a parse failure (bad `ANIM`/`AHDR`,
/// short read before one is found).
///
/// # Safety
/// `read_cb` must be safe to call from this thread with `userctx`, and
/// `userctx` must remain valid until [`san_close`] is called on the
/// returned handle.
#[no_mangle]
pub unsafe extern "C" fn san_open(
    read_cb: SanReadCb,
    userctx: *mut c_void,
) -> *mut SanDecoderHandle {
    let src = CallbackReader { read_cb, userctx };
    match SanDecoder::open(src) {
        Ok(decoder) => Box::into_raw(Box::new(SanDecoderHandle { decoder })),
        Err(e) => {
            error!("san_open failed: {e}");
            ptr::null_mut()
        }
    }
}

/// Decode one `FRME`, invoking `video_cb` once and `audio_cb` zero or
/// more times. Returns `0` on a committed frame, a negative value at
/// end-of-stream, a positive value on any other error.
///
/// # Safety
/// `handle` must come from [`san_open`] and not have been passed to
/// [`san_close`] yet. `video_cb`/`audio_cb` must be safe to call from
/// this thread with `userctx`.
#[no_mangle]
pub unsafe extern "C" fn san_decode_next_frame(
    handle: *mut SanDecoderHandle,
    video_cb: SanVideoCb,
    audio_cb: SanAudioCb,
    userctx: *mut c_void,
) -> i32 {
    let Some(handle) = handle.as_mut() else {
        return 1;
    };

    let result = handle.decoder.decode_next_frame(
        |frame: VideoFrame<'_>| {
            let subid = frame.subtitle_id.map_or(-1, i32::from);
            unsafe {
                video_cb(
                    userctx,
                    frame.pixels.as_ptr(),
                    frame.pixels.len(),
                    frame.width,
                    frame.height,
                    frame.palette.as_ptr(),
                    subid,
                );
            }
            Ok(())
        },
        |pcm| {
            unsafe {
                audio_cb(userctx, pcm.as_ptr(), pcm.len());
            }
            Ok(())
        },
    );

    match result {
        Ok(()) => 0,
        Err(Error::Done) => -1,
        Err(e) => {
            error!("san_decode_next_frame failed: {e}");
            1
        }
    }
}

/// Stream version field from `AHDR`.
///
/// # Safety
/// `handle` must come from [`san_open`] and not have been closed.
#[no_mangle]
pub unsafe extern "C" fn san_version(handle: *const SanDecoderHandle) -> u16 {
    (*handle).decoder.version()
}

/// Declared frame rate, or `0` if `AHDR` didn't carry timing fields.
///
/// # Safety
/// `handle` must come from [`san_open`] and not have been closed.
#[no_mangle]
pub unsafe extern "C" fn san_framerate(handle: *const SanDecoderHandle) -> u32 {
    (*handle).decoder.framerate()
}

/// Declared audio sample rate in Hz, or `0` if `AHDR` didn't carry it.
///
/// # Safety
/// `handle` must come from [`san_open`] and not have been closed.
#[no_mangle]
pub unsafe extern "C" fn san_samplerate(handle: *const SanDecoderHandle) -> u32 {
    (*handle).decoder.samplerate()
}

/// Total number of `FRME` chunks the stream declares.
///
/// # Safety
/// `handle` must come from [`san_open`] and not have been closed.
#[no_mangle]
pub unsafe extern "C" fn san_frame_count(handle: *const SanDecoderHandle) -> u32 {
    (*handle).decoder.frame_count()
}

/// Number of `FRME` chunks successfully committed so far.
///
/// # Safety
/// `handle` must come from [`san_open`] and not have been closed.
#[no_mangle]
pub unsafe extern "C" fn san_current_frame(handle: *const SanDecoderHandle) -> u32 {
    (*handle).decoder.current_frame()
}

/// Free a decoder opened with [`san_open`].
///
/// # Safety
/// `handle` must come from [`san_open`] and must not be used again after
/// this call. Passing `NULL` is a no-op.
#[no_mangle]
pub unsafe extern "C" fn san_close(handle: *mut SanDecoderHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}
