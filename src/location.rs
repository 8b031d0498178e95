use std::num::NonZero;

use ndarray::Ix;

pub(crate) type Coord = usize;
/// One side of a board, in tiles.
pub type Dimension = NonZero<Coord>;

/// Largest width or height a board may have.
pub const MAX_DIMENSION: Coord = 100;

#[derive(Clone, Eq, Hash, Copy, PartialEq, Ord, PartialOrd, Debug, Default)]
/// A location `(x, y)` on a board. The top left corner is `Location(0, 0)`.
pub struct Location(pub Coord, pub Coord);

impl Location {
    /// The `(row, column)` index of this location in an [`ndarray::Array2`].
    pub(crate) fn as_index(&self) -> (Coord, Coord) {
        (self.1, self.0)
    }

    pub(crate) fn offset_by(self, rhs: (isize, isize)) -> Self {
        Self(self.0.wrapping_add_signed(rhs.0), self.1.wrapping_add_signed(rhs.1))
    }

    pub(crate) fn within(&self, dims: (Dimension, Dimension)) -> bool {
        self.0 < dims.0.get() && self.1 < dims.1.get()
    }
}

impl From<(Ix, Ix)> for Location {
    fn from(value: (Ix, Ix)) -> Self {
        Self(value.1, value.0)
    }
}
