//! Per-tile possibility masks and the stack of snapshots the search works on.
//!
//! A [`Mask`] holds four groups of four bits, one group per [`Direction`] at the direction's slot.
//! Within a group, bits 0 through 2 say "this many bridges is still possible" and bit 3 marks an internal edge of a
//! large island, which never carries a bridge. Masks only ever lose bits; a group losing its last bit means the
//! layer it lives in has no solution.

use ndarray::{Array2, Ix2};

use crate::shape::Direction;

pub(crate) type Mask = u16;

pub(crate) const ZERO: u8 = 0b0001;
pub(crate) const ONE: u8 = 0b0010;
pub(crate) const TWO: u8 = 0b0100;
pub(crate) const INTERNAL: u8 = 0b1000;
pub(crate) const ANY: u8 = ZERO | ONE | TWO;
pub(crate) const NONZERO: u8 = ONE | TWO;

/// Every group allowing only zero bridges.
pub(crate) const CLOSED: Mask = 0x1111;

#[inline]
fn shift(direction: Direction) -> u32 {
    4 * direction.index() as u32
}

#[inline]
pub(crate) fn group(mask: Mask, direction: Direction) -> u8 {
    ((mask >> shift(direction)) & 0xf) as u8
}

#[inline]
pub(crate) fn with_group(mask: Mask, direction: Direction, group: u8) -> Mask {
    (mask & !(0xf << shift(direction))) | ((group as Mask & 0xf) << shift(direction))
}

/// The group bit meaning "exactly `count` bridges".
#[inline]
pub(crate) fn bit(count: u8) -> u8 {
    1 << count
}

/// Bits for every count in `lo..=hi`, empty if the range is.
#[inline]
pub(crate) fn between(lo: i32, hi: i32) -> u8 {
    (lo.max(0)..=hi.min(2)).fold(0, |acc, count| acc | bit(count as u8))
}

#[inline]
pub(crate) fn min_count(group: u8) -> u8 {
    match group & ANY {
        0 => 0,
        counts => counts.trailing_zeros() as u8,
    }
}

#[inline]
pub(crate) fn max_count(group: u8) -> u8 {
    match group & ANY {
        0 => 0,
        counts => 7 - counts.leading_zeros() as u8,
    }
}

#[inline]
pub(crate) fn is_determined(group: u8) -> bool {
    group & INTERNAL != 0 || (group & ANY).count_ones() == 1
}

/// A bounded stack of mask snapshots, one per search depth.
///
/// Layers are allocated on first use and kept for the lifetime of the owner, so a solver reused across boards of the
/// same size never reallocates.
#[derive(Clone, Debug, Default)]
pub(crate) struct Layers {
    layers: Vec<Array2<Mask>>,
}

impl Layers {
    /// Make layer 0 ready for a board of `shape` (rows, columns), every group closed.
    pub(crate) fn prepare(&mut self, shape: Ix2) {
        if self.layers.first().is_some_and(|layer| layer.raw_dim() != shape) {
            self.layers.clear();
        }

        match self.layers.first_mut() {
            Some(layer) => layer.fill(CLOSED),
            None => self.layers.push(Array2::from_elem(shape, CLOSED)),
        }
    }

    /// Overwrite layer `depth + 1` with layer `depth`.
    pub(crate) fn copy_forward(&mut self, depth: usize) {
        if self.layers.len() == depth + 1 {
            let copy = self.layers[depth].clone();
            self.layers.push(copy);
            return;
        }

        let (lower, upper) = self.layers.split_at_mut(depth + 1);
        upper[0].assign(&lower[depth]);
    }

    /// Overwrite layer `depth` with layer `depth + 1`.
    pub(crate) fn copy_back(&mut self, depth: usize) {
        let (lower, upper) = self.layers.split_at_mut(depth + 1);
        lower[depth].assign(&upper[0]);
    }
}

impl std::ops::Index<usize> for Layers {
    type Output = Array2<Mask>;

    fn index(&self, depth: usize) -> &Self::Output {
        &self.layers[depth]
    }
}

impl std::ops::IndexMut<usize> for Layers {
    fn index_mut(&mut self, depth: usize) -> &mut Self::Output {
        &mut self.layers[depth]
    }
}
