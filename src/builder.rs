use std::collections::HashMap;
use std::num::NonZero;
use std::str::FromStr;

use itertools::Itertools;
use ndarray::Array2;

use crate::board::Board;
use crate::cell::{Color, INTERNAL_EDGE, Island, MAX_POPULATION, Tile, TileKind};
use crate::location::{Dimension, Location, MAX_DIMENSION};
use crate::shape::Direction;

/// Reasons a builder may become invalid while building.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display, derive_more::Error)]
pub enum BuilderInvalidReason {
    /// A feature was inserted outside the bounds specified by `dims` on a builder.
    #[display("feature out of bounds")]
    FeatureOutOfBounds,
    /// A feature was inserted on a tile already holding one.
    #[display("features overlap")]
    FeatureOverlap,
    /// An island population above [`MAX_POPULATION`].
    #[display("island population out of range")]
    PopulationOutOfRange,
    /// A large island tile points off the board or at water or reef.
    #[display("large island tile points nowhere")]
    DanglingArrow,
    /// A chain of large island tiles never reaches a tile carrying a population.
    #[display("large island tiles point at each other in a cycle")]
    ArrowCycle,
    /// A castle is not exactly a 2x2 block.
    #[display("castle is not a 2x2 block")]
    MalformedCastle,
    /// The board is wider or taller than [`MAX_DIMENSION`].
    #[display("board larger than {MAX_DIMENSION}x{MAX_DIMENSION}")]
    TooLarge,
}

/// Reasons grid text may fail to parse.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ParseError {
    /// No grid lines before the end marker.
    #[display("empty grid")]
    Empty,
    /// A line whose length differs from the first line.
    #[display("line {line} has {found} tiles, expected {expected}")]
    RaggedLine {
        /// One-based line number.
        line: usize,
        /// Width of the first line.
        expected: usize,
        /// Width of this line.
        found: usize,
    },
    /// A character outside the grid alphabet.
    #[display("unexpected character {ch:?} at line {line}, column {column}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// One-based line number.
        line: usize,
        /// One-based column number.
        column: usize,
    },
    /// The characters parsed, but do not describe a valid grid.
    #[display("invalid grid: {reason}")]
    Invalid {
        /// What the builder rejected.
        reason: BuilderInvalidReason,
    },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
enum Feature {
    #[default]
    Ocean,
    Reef,
    Island { population: u8 },
    // part of a large island whose root is further in this direction
    Part { toward: Direction },
    Castle { color: Color },
}

/// A builder for boards, used both by the text parser and by the level generator.
///
/// Builders mutate themselves while building but can be [`Clone`]d to save their state at some point.
#[derive(Clone)]
pub struct BoardBuilder {
    // width, height
    dims: (Dimension, Dimension),
    cells: Array2<Feature>,
    invalid_reasons: Vec<BuilderInvalidReason>,
}

impl BoardBuilder {
    /// Construct a new [`Self`] with the specified dimensions, specified in `(x, y)` order.
    ///
    /// Boards larger than [`MAX_DIMENSION`] on either side leave the builder invalid.
    pub fn with_dims(dims: (Dimension, Dimension)) -> Self {
        let mut invalid_reasons = Vec::new();
        let clamped = if dims.0.get() > MAX_DIMENSION || dims.1.get() > MAX_DIMENSION {
            invalid_reasons.push(BuilderInvalidReason::TooLarge);
            (NonZero::<usize>::MIN, NonZero::<usize>::MIN)
        } else {
            dims
        };

        Self {
            dims: clamped,
            cells: Array2::from_shape_simple_fn((clamped.1.get(), clamped.0.get()), Feature::default),
            invalid_reasons,
        }
    }

    fn place(&mut self, location: Location, feature: Feature) -> &mut Self {
        if !self.invalid_reasons.is_empty() {
            return self;
        }

        let Some(cell) = self.cells.get_mut(location.as_index()) else {
            self.invalid_reasons.push(BuilderInvalidReason::FeatureOutOfBounds);
            return self;
        };
        if *cell != Feature::Ocean {
            self.invalid_reasons.push(BuilderInvalidReason::FeatureOverlap);
            return self;
        }

        *cell = feature;
        self
    }

    /// Add an island requiring `population` bridges. For a large island this is the root tile.
    ///
    /// May cause the builder to enter an invalid state if `location` is out of bounds or occupied, or if `population`
    /// exceeds [`MAX_POPULATION`]. If the builder is already in an invalid state, this function does nothing.
    pub fn add_island(&mut self, location: Location, population: u8) -> &mut Self {
        if population > MAX_POPULATION {
            self.invalid_reasons.push(BuilderInvalidReason::PopulationOutOfRange);
            return self;
        }

        self.place(location, Feature::Island { population })
    }

    /// Add a tile of a large island whose root lies further `toward`.
    ///
    /// Chains of such tiles are resolved by [`Self::build`]; they must end at an island or castle root.
    pub fn add_island_part(&mut self, location: Location, toward: Direction) -> &mut Self {
        self.place(location, Feature::Part { toward })
    }

    /// Add a reef, which blocks every bridge across it.
    pub fn add_reef(&mut self, location: Location) -> &mut Self {
        self.place(location, Feature::Reef)
    }

    /// Add a 2x2 castle of `color` whose top left tile is `top_left`.
    pub fn add_castle(&mut self, top_left: Location, color: Color) -> &mut Self {
        self.place(top_left, Feature::Castle { color })
            .add_island_part(Direction::Right.attempt_from(top_left), Direction::Left)
            .add_island_part(Direction::Down.attempt_from(top_left), Direction::Up)
            .add_island_part(Direction::Right.attempt_from(Direction::Down.attempt_from(top_left)), Direction::Left)
    }

    /// Check the validity of this builder, ensuring no [`BuilderInvalidReason`] condition has arisen.
    ///
    /// Returns `None` if the builder is valid, `Some(&Vec<BuilderInvalidReason>)` otherwise.
    pub fn is_valid(&self) -> Option<&Vec<BuilderInvalidReason>> {
        if self.invalid_reasons.is_empty() {
            None
        } else {
            Some(&self.invalid_reasons)
        }
    }

    /// Follow the arrows from `location` to the tile carrying the island's population.
    fn resolve_root(&self, location: Location) -> Result<Location, BuilderInvalidReason> {
        let mut current = location;
        // any chain longer than the board has revisited a tile
        for _ in 0..=self.cells.len() {
            match self.cells.get(current.as_index()) {
                Some(Feature::Part { toward }) => current = toward.attempt_from(current),
                Some(Feature::Island { .. } | Feature::Castle { .. }) => return Ok(current),
                Some(Feature::Ocean | Feature::Reef) | None => return Err(BuilderInvalidReason::DanglingArrow),
            }
        }

        Err(BuilderInvalidReason::ArrowCycle)
    }

    /// Convert the state of this builder into a [`Board`].
    /// If the builder is invalid for any reason, a reference to a [`Vec`] of [`BuilderInvalidReason`] will indicate why.
    ///
    /// Problems only detectable once the whole grid is known, such as a dangling arrow, are recorded on the builder.
    pub fn build(&mut self) -> Result<Board, &Vec<BuilderInvalidReason>> {
        if self.invalid_reasons.is_empty() {
            match self.assemble() {
                Ok(board) => return Ok(board),
                Err(reason) => self.invalid_reasons.push(reason),
            }
        }

        Err(&self.invalid_reasons)
    }

    /// Like [`Self::build`] but consuming the builder, which lets the failure reason escape.
    pub(crate) fn into_board(self) -> Result<Board, BuilderInvalidReason> {
        match self.invalid_reasons.first() {
            Some(reason) => Err(*reason),
            None => self.assemble(),
        }
    }

    fn assemble(&self) -> Result<Board, BuilderInvalidReason> {
        let mut tiles = Array2::from_shape_fn(self.cells.raw_dim(), |ind| Tile::new(TileKind::Ocean, Location::from(ind)));
        let mut islands: Vec<Island> = Vec::new();
        let mut island_of_root = HashMap::new();

        for (index, feature) in self.cells.indexed_iter() {
            let location = Location::from(index);
            let kind = match *feature {
                Feature::Ocean => continue,
                Feature::Reef => {
                    tiles[index].kind = TileKind::Reef;
                    continue;
                }
                Feature::Island { .. } | Feature::Castle { .. } | Feature::Part { .. } => {
                    let root = self.resolve_root(location)?;
                    let (kind, population, color) = match self.cells[root.as_index()] {
                        Feature::Island { population } => (TileKind::Island { population: if root == location { population } else { 0 } }, Some(population), None),
                        Feature::Castle { color } => (TileKind::Castle { color }, None, Some(color)),
                        _ => unreachable!("resolve_root only stops on roots"),
                    };

                    let id = *island_of_root.entry(root).or_insert_with(|| {
                        islands.push(Island { root, tiles: Vec::new(), population, color, total: 0 });
                        islands.len() - 1
                    });
                    islands[id].tiles.push(location);

                    let tile = &mut tiles[index];
                    tile.root = root;
                    tile.island = Some(id);
                    if let Feature::Part { toward } = feature {
                        tile.toward = Some(*toward);
                    }
                    kind
                }
            };
            tiles[index].kind = kind;
        }

        for island in islands.iter().filter(|island| island.color.is_some()) {
            let expected = [(0, 0), (1, 0), (0, 1), (1, 1)]
                .map(|offset| island.root.offset_by(offset));
            if island.tiles.len() != 4 || !island.tiles.iter().all(|tile| expected.contains(tile)) {
                return Err(BuilderInvalidReason::MalformedCastle);
            }
        }

        let land = tiles.indexed_iter()
            .filter(|(_, tile)| tile.kind.is_land())
            .map(|(index, _)| Location::from(index))
            .collect_vec();

        for location in land {
            for direction in Direction::FORWARD_VARIANTS {
                link_run(&mut tiles, self.dims, location, *direction);
            }
        }

        Ok(Board {
            dims: self.dims,
            tiles,
            islands,
        })
    }
}

/// Scan from `location` toward `direction` for the nearest non-ocean tile and, if a bridge may join the two,
/// record the run on both endpoints and every ocean tile between them.
fn link_run(tiles: &mut Array2<Tile>, dims: (Dimension, Dimension), location: Location, direction: Direction) {
    let mut far = location;
    let mut distance = 0;
    loop {
        far = direction.attempt_from(far);
        distance += 1;
        if !far.within(dims) {
            return;
        }
        match tiles[far.as_index()].kind {
            TileKind::Ocean => continue,
            TileKind::Reef => return,
            _ => break,
        }
    }

    let (near_tile, far_tile) = (&tiles[location.as_index()], &tiles[far.as_index()]);
    let (forward, backward) = (direction.index(), direction.invert().index());

    if near_tile.root == far_tile.root {
        // the two halves of an internal edge; a large island never bridges to itself
        if distance == 1 {
            for (at, slot) in [(location, forward), (far, backward)] {
                let tile = &mut tiles[at.as_index()];
                tile.bridge_len[slot] = Some(1);
                tile.bridge_count[slot] = INTERNAL_EDGE;
            }
        }
        return;
    }

    if let (TileKind::Castle { color: a }, TileKind::Castle { color: b }) = (near_tile.kind, far_tile.kind) {
        if a != b {
            return;
        }
    }

    let mut at = location;
    for step in 0..=distance {
        let tile = &mut tiles[at.as_index()];
        if step < distance {
            tile.bridge_len[forward] = Some(distance - step);
        }
        if step > 0 {
            tile.bridge_len[backward] = Some(step);
        }
        at = direction.attempt_from(at);
    }
}

impl FromStr for Board {
    type Err = ParseError;

    /// Parse the grid text format: equal-length lines, each ended by a line break, the block ending at the first empty
    /// line or at the end of input.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let rows = text.split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .take_while(|line| !line.is_empty())
            .map(|line| line.chars().collect_vec())
            .collect_vec();

        let Some(width) = rows.first().map(Vec::len) else {
            return Err(ParseError::Empty);
        };
        if let Some((line, row)) = rows.iter().find_position(|row| row.len() != width) {
            return Err(ParseError::RaggedLine { line: line + 1, expected: width, found: row.len() });
        }

        // width is nonzero, an empty first line would have ended the block
        let dims = (
            NonZero::new(width).ok_or(ParseError::Empty)?,
            NonZero::new(rows.len()).ok_or(ParseError::Empty)?,
        );
        let mut builder = BoardBuilder::with_dims(dims);

        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.iter().enumerate() {
                let location = Location(x, y);
                match *ch {
                    ' ' => {}
                    '#' => {
                        builder.add_reef(location);
                    }
                    '>' => {
                        builder.add_island_part(location, Direction::Right);
                    }
                    '<' => {
                        builder.add_island_part(location, Direction::Left);
                    }
                    '^' => {
                        builder.add_island_part(location, Direction::Up);
                    }
                    'v' => {
                        builder.add_island_part(location, Direction::Down);
                    }
                    c @ ('0'..='9' | 'A'..='Z') => {
                        // radix 36 accepts every character in this arm
                        let population = c.to_digit(36).unwrap_or_default() as u8;
                        builder.add_island(location, population);
                    }
                    c => match Color::from_display(c) {
                        Some(color) => {
                            builder.place(location, Feature::Castle { color });
                        }
                        None => return Err(ParseError::UnexpectedChar { ch: c, line: y + 1, column: x + 1 }),
                    },
                }
            }
        }

        builder.into_board().map_err(|reason| ParseError::Invalid { reason })
    }
}

/// The grid character of a large island tile whose root lies further `direction`.
pub(crate) fn arrow_for(direction: Direction) -> char {
    match direction {
        Direction::Right => '>',
        Direction::Left => '<',
        Direction::Up => '^',
        Direction::Down => 'v',
    }
}
