use std::fmt::{Display, Formatter};

use ndarray::Array2;
use unordered_pair::UnorderedPair;

use crate::builder::arrow_for;
use crate::cell::{Island, IslandId, Tile, TileKind, INTERNAL_EDGE};
use crate::connectivity;
use crate::location::{Dimension, Location};
use crate::mask::{self, Mask};
use crate::shape::Direction;
use crate::solver::{SolveStats, Solver, SolverFailure};

/// Reasons [`Board::toggle`] may refuse to change a bridge.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ToggleError {
    /// The location is not on the board.
    #[display("location out of bounds")]
    OutOfBounds,
    /// Bridges only start on islands and castles.
    #[display("not an island")]
    NotAnIsland,
    /// Nothing a bridge could reach lies in that direction.
    #[display("no bridge possible in that direction")]
    NoBridge,
    /// The two tiles belong to the same large island.
    #[display("edge inside a large island")]
    InternalEdge,
    /// The bridge would cross one already placed.
    #[display("bridge would cross another bridge")]
    Crossing,
}

/// A Hashiwokakero board: the fixed layout of islands, reefs and water, plus the bridges currently placed.
///
/// [`Board`]s are usually parsed from text with [`str::parse`], or built with a
/// [`BoardBuilder`](crate::builder::BoardBuilder). [`Display`] writes the layout back in the same text format, without
/// bridges.
#[derive(Clone, Debug)]
pub struct Board {
    pub(crate) dims: (Dimension, Dimension),
    pub(crate) tiles: Array2<Tile>,
    pub(crate) islands: Vec<Island>,
}

impl Board {
    /// Width and height in tiles.
    pub fn dims(&self) -> (Dimension, Dimension) {
        self.dims
    }

    /// Number of islands, counting a large island or a castle once.
    pub fn island_count(&self) -> usize {
        self.islands.len()
    }

    /// What occupies `location`, if it is on the board.
    pub fn kind(&self, location: Location) -> Option<TileKind> {
        self.tiles.get(location.as_index()).map(|tile| tile.kind)
    }

    /// The root tile of the island covering `location`.
    pub fn root(&self, location: Location) -> Option<Location> {
        self.island_at(location).map(|island| island.root)
    }

    /// The bridges the island covering `location` needs; `None` for castles and non-island tiles.
    pub fn population(&self, location: Location) -> Option<u8> {
        self.island_at(location).and_then(|island| island.population)
    }

    /// The bridges currently placed on the island covering `location`.
    pub fn total(&self, location: Location) -> Option<u32> {
        self.island_at(location).map(|island| island.total)
    }

    /// Bridges placed from `location` toward `direction`. Ocean tiles report the bridge passing over them.
    pub fn bridge_count(&self, location: Location, direction: Direction) -> u8 {
        match self.tiles.get(location.as_index()).map(|tile| tile.bridge_count[direction.index()]) {
            Some(INTERNAL_EDGE) | None => 0,
            Some(count) => count,
        }
    }

    fn island_at(&self, location: Location) -> Option<&Island> {
        self.tiles.get(location.as_index())
            .and_then(|tile| tile.island)
            .map(|id| &self.islands[id])
    }

    /// The tile at the other end of the run leaving `location` toward `direction`.
    pub(crate) fn far_end(&self, location: Location, direction: Direction) -> Option<Location> {
        let len = self.tiles.get(location.as_index())?.bridge_len[direction.index()]?;
        Some((0..len).fold(location, |at, _| direction.attempt_from(at)))
    }

    /// Cycle the bridge count between `location` and whatever lies toward `direction` through 0, 1, 2 and back to 0.
    ///
    /// Returns the new count. Both islands' totals follow, and every ocean tile the bridge passes over mirrors it.
    pub fn toggle(&mut self, location: Location, direction: Direction) -> Result<u8, ToggleError> {
        let tile = self.tiles.get(location.as_index()).ok_or(ToggleError::OutOfBounds)?;
        if !tile.kind.is_land() {
            return Err(ToggleError::NotAnIsland);
        }
        if tile.bridge_count[direction.index()] == INTERNAL_EDGE {
            return Err(ToggleError::InternalEdge);
        }
        let far = self.far_end(location, direction).ok_or(ToggleError::NoBridge)?;

        // only right and down are walked; left and up start from the other end
        let (start, end, direction) = match Direction::FORWARD_VARIANTS.contains(&direction) {
            true => (location, far, direction),
            false => (far, location, direction.invert()),
        };

        let count = (self.bridge_count(start, direction) + 1) % 3;
        if count > 0 {
            let across = direction.perpendicular();
            let mut at = direction.attempt_from(start);
            while at != end {
                if self.bridge_count(at, across) > 0 {
                    return Err(ToggleError::Crossing);
                }
                at = direction.attempt_from(at);
            }
        }

        self.set_bridge(start, direction, count);
        Ok(count)
    }

    /// Place `count` bridges on the run leaving `start` toward `direction`, keeping totals and ocean tiles in step.
    fn set_bridge(&mut self, start: Location, direction: Direction, count: u8) {
        let Some(len) = self.tiles[start.as_index()].bridge_len[direction.index()] else {
            return;
        };
        let old = self.bridge_count(start, direction);

        let mut at = start;
        for step in 0..=len {
            let tile = &mut self.tiles[at.as_index()];
            if step < len {
                tile.bridge_count[direction.index()] = count;
            }
            if step > 0 {
                tile.bridge_count[direction.invert().index()] = count;
            }
            if step == 0 || step == len {
                if let Some(id) = tile.island {
                    let island = &mut self.islands[id];
                    island.total = island.total + count as u32 - old as u32;
                }
            }
            at = direction.attempt_from(at);
        }
    }

    /// Remove every bridge, keeping the layout.
    pub fn reset(&mut self) {
        for tile in self.tiles.iter_mut() {
            for count in tile.bridge_count.iter_mut().filter(|count| **count != INTERNAL_EDGE) {
                *count = 0;
            }
        }
        for island in self.islands.iter_mut() {
            island.total = 0;
        }
    }

    /// Place the bridges decided in a fully determined mask layer.
    pub(crate) fn apply(&mut self, layer: &Array2<Mask>) {
        self.reset();
        let starts = self.islands.iter()
            .flat_map(|island| island.tiles.clone())
            .collect::<Vec<_>>();

        for at in starts {
            for direction in Direction::FORWARD_VARIANTS {
                let group = mask::group(layer[at.as_index()], *direction);
                if group & mask::INTERNAL == 0 {
                    self.set_bridge(at, *direction, mask::min_count(group));
                }
            }
        }
    }

    /// Each pair of islands joined by bridges, with the island ids at both ends.
    fn links(&self) -> impl Iterator<Item = (IslandId, IslandId)> + '_ {
        self.tiles.indexed_iter()
            .filter(|(_, tile)| tile.kind.is_land())
            .flat_map(|(index, tile)| Direction::FORWARD_VARIANTS.iter().map(move |direction| (Location::from(index), tile, *direction)))
            .filter(|(_, tile, direction)| !matches!(tile.bridge_count[direction.index()], 0 | INTERNAL_EDGE))
            .filter_map(|(at, tile, direction)| {
                let far = self.far_end(at, direction)?;
                Some((tile.island?, self.tiles[far.as_index()].island?))
            })
    }

    /// Every placed bridge as the pair of tiles it joins and its count.
    ///
    /// Unlike [`Self::solution`], this includes vertical bridges.
    pub fn bridges(&self) -> Vec<(UnorderedPair<Location>, u8)> {
        self.tiles.indexed_iter()
            .filter(|(_, tile)| tile.kind.is_land())
            .flat_map(|(index, _)| Direction::FORWARD_VARIANTS.iter().map(move |direction| (Location::from(index), *direction)))
            .filter_map(|(at, direction)| {
                let count = self.bridge_count(at, direction);
                let far = self.far_end(at, direction)?;
                (count > 0).then(|| (UnorderedPair(at, far), count))
            })
            .collect()
    }

    /// Whether the bridges placed solve the board: every island has exactly its population (castles have none), no
    /// two bridges cross, and the bridges connect the islands, castle colours kept apart.
    pub fn finished(&self) -> bool {
        if self.islands.iter().any(|island| island.population.is_some_and(|population| island.total != population as u32)) {
            return false;
        }

        let crossed = self.tiles.iter()
            .filter(|tile| tile.kind == TileKind::Ocean)
            .any(|tile| tile.bridge_count[Direction::Right.index()] > 0 && tile.bridge_count[Direction::Down.index()] > 0);
        if crossed {
            return false;
        }

        connectivity::is_connected(&self.islands, self.links())
    }

    /// The layout in the grid text format, without bridges. Parsing it gives back an equal layout.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// The solution text: the layout with every non-ocean tile replaced by the number of bridges leaving it to the
    /// right. Vertical bridges are not recorded; see [`Self::bridges`].
    pub fn solution(&self) -> String {
        self.render(|at, tile| match tile.kind {
            TileKind::Ocean => ' ',
            _ => char::from(b'0' + self.bridge_count(at, Direction::Right)),
        })
    }

    fn render(&self, mut glyph: impl FnMut(Location, &Tile) -> char) -> String {
        let mut out = String::with_capacity(self.tiles.nrows() * (self.tiles.ncols() + 1));

        for (index, tile) in self.tiles.indexed_iter() {
            out.push(glyph(Location::from(index), tile));
            if index.1 + 1 == self.tiles.ncols() {
                out.push('\n');
            }
        }

        out
    }

    /// Solve this board from scratch with a default [`Solver`], placing the solution found.
    pub fn solve(&mut self) -> Result<SolveStats, SolverFailure> {
        Solver::default().solve(self)
    }

    /// Look for a solution other than the bridges currently placed; see [`Solver::solve_another`].
    pub fn solve_another(&mut self) -> Result<SolveStats, SolverFailure> {
        Solver::default().solve_another(self)
    }

    /// Score how hard this board is for the solver; higher is harder. The placed bridges are not touched.
    pub fn difficulty(&self) -> Result<f64, SolverFailure> {
        let mut scratch = self.clone();
        Solver::default().solve(&mut scratch).map(|stats| stats.difficulty())
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render(|_, tile| match (tile.toward, tile.kind) {
            (Some(toward), _) => arrow_for(toward),
            (None, TileKind::Ocean) => ' ',
            (None, TileKind::Reef) => '#',
            (None, TileKind::Island { population }) => char::from_digit(population as u32, 36).unwrap_or('?').to_ascii_uppercase(),
            (None, TileKind::Castle { color }) => color.display(),
        }))
    }
}

impl PartialEq for Board {
    /// Boards are equal when their layouts are; placed bridges are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && self.to_string() == other.to_string()
    }
}
