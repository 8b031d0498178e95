use strum::VariantArray;

use crate::location::Location;
use crate::shape::Direction;

/// Largest population an island may carry; populations are written as a single base-36 digit.
pub const MAX_POPULATION: u8 = 35;

/// Sentinel stored in [`Tile::bridge_count`] for the edge between two tiles of the same large island.
pub(crate) const INTERNAL_EDGE: u8 = u8::MAX;

pub(crate) type IslandId = usize;

/// The colour of a castle. Castles of different colours must never be joined; castles of one colour must be.
#[derive(Copy, Clone, VariantArray, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub enum Color {
    /// `r`
    Red,
    /// `b`
    Blue,
    /// `y`
    Yellow,
    /// `g`
    Green,
}

impl Color {
    /// The population id a castle of this colour is stored under, 80 through 83.
    pub fn id(&self) -> u8 {
        80 + *self as u8
    }

    pub(crate) fn display(&self) -> char {
        match self {
            Self::Red => 'r',
            Self::Blue => 'b',
            Self::Yellow => 'y',
            Self::Green => 'g',
        }
    }

    pub(crate) fn from_display(c: char) -> Option<Self> {
        Self::VARIANTS.iter().find(|color| color.display() == c).copied()
    }
}

/// What occupies a tile.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum TileKind {
    /// Open water; bridges may pass over it.
    #[default]
    Ocean,
    /// Impassable; no bridge may be scanned across it.
    Reef,
    /// A tile of an island. Only the root tile of a large island carries the population, the others hold 0.
    Island {
        /// Bridges the island needs.
        population: u8,
    },
    /// A tile of a 2x2 castle.
    Castle {
        /// Colour shared by all four tiles.
        color: Color,
    },
}

impl TileKind {
    /// Whether bridges may end on this tile.
    pub fn is_land(&self) -> bool {
        matches!(self, Self::Island { .. } | Self::Castle { .. })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Tile {
    pub(crate) kind: TileKind,
    // representative tile of the island this tile belongs to; self for everything else
    pub(crate) root: Location,
    pub(crate) island: Option<IslandId>,
    // the arrow of a non-root large island tile
    pub(crate) toward: Option<Direction>,
    // distance to the far end of the bridge run leaving in each direction
    pub(crate) bridge_len: [Option<usize>; 4],
    pub(crate) bridge_count: [u8; 4],
}

impl Tile {
    pub(crate) fn new(kind: TileKind, location: Location) -> Self {
        Self {
            kind,
            root: location,
            island: None,
            toward: None,
            bridge_len: [None; 4],
            bridge_count: [0; 4],
        }
    }
}

/// Bookkeeping for one island, which may span several tiles.
#[derive(Clone, Debug)]
pub(crate) struct Island {
    pub(crate) root: Location,
    pub(crate) tiles: Vec<Location>,
    // required bridge count; castles have none
    pub(crate) population: Option<u8>,
    pub(crate) color: Option<Color>,
    // bridges currently placed
    pub(crate) total: u32,
}
