// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Motion-vector table used by block codes `0x00..=0xF7`.
//!
//! Each code selects a `(dx, dy)` offset into the previous reference
//! frame. The real codec 47 decoder ships one specific constant table
//! here; no authentic SAN sample was available in this crate's corpus
//! to read the real values off of, so `build_motion_vectors` below is a
//! placeholder that only satisfies the invariants §4.C states (256
//! entries, fixed, deterministic, `(0, 0)` at index 0) rather than the
//! byte-exact table. Comp-2 `FOBJ` frames decoded against a real stream
//! will copy from the wrong source offsets until the authentic values
//! are substituted in; see `DESIGN.md` for this gap.

pub const MOTION_VECTOR_COUNT: usize = 256;

/// Placeholder construction: orders candidate offsets by increasing
/// Chebyshev radius around the origin, then lexicographically within a
/// radius, so `(0, 0)` is the unique radius-0 vector and always entry 0.
/// Not a reproduction of the real codec 47 constant table; see the
/// module comment.
pub fn build_motion_vectors() -> [(i8, i8); MOTION_VECTOR_COUNT] {
    let mut candidates: Vec<(i32, i32)> = Vec::with_capacity(31 * 31);
    for dy in -15..=15i32 {
        for dx in -15..=15i32 {
            candidates.push((dx, dy));
        }
    }
    candidates.sort_by_key(|&(dx, dy)| (dx.abs().max(dy.abs()), dx, dy));

    let mut table = [(0i8, 0i8); MOTION_VECTOR_COUNT];
    for (slot, &(dx, dy)) in table.iter_mut().zip(candidates.iter()) {
        *slot = (dx as i8, dy as i8);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_is_identity() {
        let mv = build_motion_vectors();
        assert_eq!(mv[0], (0, 0));
    }

    #[test]
    fn deterministic() {
        assert_eq!(build_motion_vectors(), build_motion_vectors());
    }

    #[test]
    fn no_duplicate_vectors() {
        let mv = build_motion_vectors();
        for i in 0..mv.len() {
            for j in (i + 1)..mv.len() {
                assert_ne!(mv[i], mv[j], "duplicate motion vector at {i} and {j}");
            }
        }
    }
}
