use strum::VariantArray;

use crate::location::Location;

/// The four directions a bridge may leave a tile in.
///
/// The discriminants are the slot each direction occupies in per-tile arrays and in the
/// four-bit groups of a possibility mask.
#[derive(Copy, Clone, VariantArray, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub enum Direction {
    /// Toward row 0.
    Up = 0,
    /// Toward the last row.
    Down = 1,
    /// Toward column 0.
    Left = 2,
    /// Toward the last column.
    Right = 3,
}

impl Direction {
    /// The "forward" directions.
    ///
    /// Stepping in a forward direction always lands on a location indexed higher than the origin
    /// in row-major order, so every edge of the board is reachable from exactly one of its
    /// endpoints by a forward step.
    pub const FORWARD_VARIANTS: &'static [Self] = &[Self::Right, Self::Down];

    /// Attempt the step from `location` in the direction specified by `self` and return the resultant [`Location`].
    ///
    /// Steps off the top or left edge wrap to huge coordinates, which fail any bounds check.
    pub fn attempt_from(&self, location: Location) -> Location {
        match self {
            Self::Up => location.offset_by((0, -1)),
            Self::Down => location.offset_by((0, 1)),
            Self::Left => location.offset_by((-1, 0)),
            Self::Right => location.offset_by((1, 0)),
        }
    }

    /// Invert the direction specified by `self`.
    pub fn invert(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Convert this direction to a forward direction, if it is not already one.
    pub fn ensure_forward(&self) -> Self {
        match Self::FORWARD_VARIANTS.contains(self) {
            true => *self,
            false => self.invert(),
        }
    }

    /// Whether this direction runs along a row.
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// The forward direction along the other axis.
    pub(crate) fn perpendicular(&self) -> Self {
        if self.is_horizontal() { Self::Down } else { Self::Right }
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// Determine the direction from `a` to `b`, if they are orthogonally adjacent.
    pub fn direction_to(a: Location, b: Location) -> Option<Self> {
        Self::VARIANTS.iter().find(|dir| dir.attempt_from(a) == b).copied()
    }
}
