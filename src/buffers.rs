// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Four-buffer frame pool.
//!
//! Codec 47 needs four equal-size paletted buffers: the frame being
//! decoded (`Cur`), the two most recent committed frames for motion
//! compensation (`P1`, `P2`), and a save slot for `STOR`/`FTCH` (`Saved`).
//! Rotation after a commit only ever needs to change *which physical
//! buffer plays which role*, so roles are tracked as a small index
//! permutation rather than by copying or swapping the underlying bytes.

use fallible_collections::TryVec;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Cur = 0,
    P1 = 1,
    P2 = 2,
    Saved = 3,
}

/// Rotation mode read from a codec 47 payload header's `newrot` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Single,
    Double,
}

impl From<u8> for Rotation {
    fn from(v: u8) -> Self {
        match v {
            1 => Rotation::Single,
            2 => Rotation::Double,
            _ => Rotation::None,
        }
    }
}

pub struct FramePool {
    buffers: [TryVec<u8>; 4],
    /// `roles[r as usize]` is the physical slot currently playing role `r`.
    roles: [usize; 4],
    w: u16,
    h: u16,
}

impl FramePool {
    pub fn new() -> Self {
        FramePool {
            buffers: [TryVec::new(), TryVec::new(), TryVec::new(), TryVec::new()],
            roles: [0, 1, 2, 3],
            w: 0,
            h: 0,
        }
    }

    pub fn width(&self) -> u16 {
        self.w
    }

    pub fn height(&self) -> u16 {
        self.h
    }

    pub fn fbsize(&self) -> usize {
        usize::from(self.w) * usize::from(self.h)
    }

    /// Grow the pool so all four buffers can hold `new_w * new_h` bytes.
    /// A no-op if the pool is already at least that size. Existing pixel
    /// data is not preserved across a reallocation.
    pub fn ensure(&mut self, new_w: u16, new_h: u16) -> Result<()> {
        if usize::from(new_w) * usize::from(new_h) <= self.fbsize() && self.fbsize() > 0 {
            return Ok(());
        }
        let size = usize::from(new_w) * usize::from(new_h);
        for buf in self.buffers.iter_mut() {
            let mut fresh = TryVec::with_capacity(size)?;
            fresh.resize(size, 0)?;
            *buf = fresh;
        }
        self.roles = [0, 1, 2, 3];
        self.w = new_w;
        self.h = new_h;
        Ok(())
    }

    fn slot(&self, role: Role) -> usize {
        self.roles[role as usize]
    }

    pub fn get(&self, role: Role) -> &[u8] {
        &self.buffers[self.slot(role)]
    }

    pub fn get_mut(&mut self, role: Role) -> &mut [u8] {
        let s = self.slot(role);
        &mut self.buffers[s]
    }

    /// Copy the bytes of `src` role into `dst` role (used by `STOR`/`FTCH`
    /// and codec 47's `comp` 3/4 full-frame copies).
    pub fn copy_role(&mut self, dst: Role, src: Role) {
        let (d, s) = (self.slot(dst), self.slot(src));
        if d == s {
            return;
        }
        let (lo, hi) = if d < s { (d, s) } else { (s, d) };
        let (left, right) = self.buffers.split_at_mut(hi);
        let (low_buf, high_buf) = (&mut left[lo], &mut right[0]);
        if d < s {
            low_buf.clone_from_slice(high_buf);
        } else {
            high_buf.clone_from_slice(low_buf);
        }
    }

    fn swap_roles(&mut self, a: Role, b: Role) {
        self.roles.swap(a as usize, b as usize);
    }

    /// Apply a rotation after a frame has been committed.
    pub fn rotate(&mut self, rot: Rotation) {
        match rot {
            Rotation::None => {}
            Rotation::Single => self.swap_roles(Role::Cur, Role::P2),
            Rotation::Double => {
                self.swap_roles(Role::P1, Role::P2);
                self.swap_roles(Role::Cur, Role::P2);
            }
        }
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_none_preserves_p1_p2() {
        let mut pool = FramePool::new();
        pool.ensure(2, 2).unwrap();
        pool.get_mut(Role::P1).copy_from_slice(&[1, 2, 3, 4]);
        pool.get_mut(Role::P2).copy_from_slice(&[5, 6, 7, 8]);
        pool.rotate(Rotation::None);
        assert_eq!(pool.get(Role::P1), &[1, 2, 3, 4]);
        assert_eq!(pool.get(Role::P2), &[5, 6, 7, 8]);
    }

    #[test]
    fn rotation_single_swaps_cur_and_p2() {
        let mut pool = FramePool::new();
        pool.ensure(2, 2).unwrap();
        pool.get_mut(Role::Cur).copy_from_slice(&[1, 1, 1, 1]);
        pool.get_mut(Role::P2).copy_from_slice(&[2, 2, 2, 2]);
        pool.rotate(Rotation::Single);
        assert_eq!(pool.get(Role::Cur), &[2, 2, 2, 2]);
        assert_eq!(pool.get(Role::P2), &[1, 1, 1, 1]);
    }

    #[test]
    fn rotation_double() {
        let mut pool = FramePool::new();
        pool.ensure(1, 1).unwrap();
        pool.get_mut(Role::Cur).copy_from_slice(&[1]);
        pool.get_mut(Role::P1).copy_from_slice(&[2]);
        pool.get_mut(Role::P2).copy_from_slice(&[3]);
        pool.rotate(Rotation::Double);
        // p1<->p2 first: p1 role now reads old p2 (3), p2 role reads old p1 (2).
        // cur<->p2 next: cur role reads old p2-role content (2), p2 role reads old cur (1).
        assert_eq!(pool.get(Role::P1), &[3]);
        assert_eq!(pool.get(Role::Cur), &[2]);
        assert_eq!(pool.get(Role::P2), &[1]);
    }

    #[test]
    fn stor_fetch_roundtrip() {
        let mut pool = FramePool::new();
        pool.ensure(2, 2).unwrap();
        pool.get_mut(Role::Cur).copy_from_slice(&[9, 9, 9, 9]);
        pool.copy_role(Role::Saved, Role::Cur);
        pool.get_mut(Role::Cur).copy_from_slice(&[0, 0, 0, 0]);
        pool.copy_role(Role::Cur, Role::Saved);
        assert_eq!(pool.get(Role::Cur), &[9, 9, 9, 9]);
    }
}
