use std::collections::{HashSet, VecDeque};

use itertools::Itertools;
use log::trace;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use strum::VariantArray;
use unordered_pair::UnorderedPair;

use crate::board::Board;
use crate::builder::{BoardBuilder, BuilderInvalidReason};
use crate::cell::{Color, MAX_POPULATION};
use crate::generator::GenParams;
use crate::location::{Dimension, Location};
use crate::shape::Direction;

/// Longest bridge the generator draws.
const MAX_BRIDGE_LEN: usize = 4;
/// Full sweeps over the board looking for islands that can still grow.
const MAX_SWEEPS: usize = 4;

const REEF_CHANCE: f64 = 0.04;
const SKIP_DIRECTION_CHANCE: f64 = 0.4;
const JOIN_EXISTING_CHANCE: f64 = 0.35;
const DOUBLE_BRIDGE_CHANCE: f64 = 0.45;
const LARGE_ISLAND_CHANCE: f64 = 0.15;
const CASTLE_CHANCE: f64 = 0.08;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Spot {
    Open,
    Reef,
    Land(usize),
    // water under a bridge, along that axis
    Span { horizontal: bool },
}

struct Draft {
    tiles: Vec<Location>,
    // colour of the castle this island's component grew from
    color: Option<Color>,
    castle: bool,
    bridges: u32,
}

/// Where a bridge leaving a tile could go: new island sites, and the first existing island in line.
struct Reach {
    sites: Vec<Location>,
    existing: Option<(Location, usize)>,
}

/// A board under construction, together with the bridges of the solution it is grown around.
pub(super) struct Sketch<'a> {
    params: &'a GenParams,
    dims: (Dimension, Dimension),
    spots: Array2<Spot>,
    drafts: Vec<Draft>,
    bridged: HashSet<UnorderedPair<Location>>,
    frontier: VecDeque<usize>,
    land: usize,
    target: usize,
    rng: Pcg64,
}

impl<'a> Sketch<'a> {
    /// Grow the board for `seed`.
    pub(super) fn grow(params: &'a GenParams, dims: (Dimension, Dimension), seed: u64) -> Result<Board, BuilderInvalidReason> {
        let area = dims.0.get() * dims.1.get();
        let mut sketch = Self {
            params,
            dims,
            spots: Array2::from_elem((dims.1.get(), dims.0.get()), Spot::Open),
            drafts: Vec::new(),
            bridged: HashSet::new(),
            frontier: VecDeque::new(),
            land: 0,
            target: ((params.density.clamp(0.0, 1.0) * area as f64).round() as usize).max(1),
            rng: Pcg64::seed_from_u64(seed),
        };

        if params.use_reef {
            sketch.scatter_reefs();
        }
        sketch.plant();
        sketch.expand();
        sketch.into_board()
    }

    fn locations(&self) -> impl Iterator<Item = Location> {
        (0..self.dims.1.get()).cartesian_product(0..self.dims.0.get()).map(|(y, x)| Location(x, y))
    }

    fn spot(&self, location: Location) -> Option<Spot> {
        self.spots.get(location.as_index()).copied()
    }

    fn scatter_reefs(&mut self) {
        for location in self.locations().collect_vec() {
            if self.rng.gen_bool(REEF_CHANCE) {
                self.spots[location.as_index()] = Spot::Reef;
            }
        }
    }

    /// Whether a new tile of island `owner` (or of a new island, for `None`) may go at `location`.
    fn free_for(&self, location: Location, owner: Option<usize>) -> bool {
        if self.spot(location) != Some(Spot::Open) {
            return false;
        }
        self.params.allow_dense || Direction::VARIANTS.iter().all(|direction| {
            match self.spot(direction.attempt_from(location)) {
                Some(Spot::Land(id)) => Some(id) == owner,
                _ => true,
            }
        })
    }

    /// Whether a castle of `color` fits with its top left tile at `top_left`, touching no other colour even at a corner.
    fn castle_fits(&self, top_left: Location, color: Color) -> bool {
        let block = [(0, 0), (1, 0), (0, 1), (1, 1)].map(|offset| top_left.offset_by(offset));
        if !block.iter().all(|tile| self.free_for(*tile, None)) {
            return false;
        }

        (-1..=2).cartesian_product(-1..=2)
            .filter_map(|offset| self.spot(top_left.offset_by(offset)))
            .all(|spot| match spot {
                Spot::Land(id) => self.drafts[id].color == Some(color),
                _ => true,
            })
    }

    fn add_draft(&mut self, tiles: Vec<Location>, color: Option<Color>, castle: bool) -> usize {
        let id = self.drafts.len();
        for tile in &tiles {
            self.spots[tile.as_index()] = Spot::Land(id);
        }
        self.land += tiles.len();
        self.drafts.push(Draft { tiles, color, castle, bridges: 0 });
        self.frontier.push_back(id);
        id
    }

    fn add_castle(&mut self, top_left: Location, color: Color) -> usize {
        let block = [(0, 0), (1, 0), (0, 1), (1, 1)].map(|offset| top_left.offset_by(offset));
        self.add_draft(block.to_vec(), Some(color), true)
    }

    /// Place the first islands: castles of up to four colours, or a single island.
    fn plant(&mut self) {
        let cells = self.locations().collect_vec();

        if self.params.use_castle {
            let mut colors = Color::VARIANTS.to_vec();
            colors.shuffle(&mut self.rng);
            let wanted = self.rng.gen_range(1..=colors.len());
            for color in colors.into_iter().take(wanted) {
                for _ in 0..32 {
                    let top_left = cells[self.rng.gen_range(0..cells.len())];
                    if self.castle_fits(top_left, color) {
                        self.add_castle(top_left, color);
                        break;
                    }
                }
            }
            if !self.drafts.is_empty() {
                return;
            }
        }

        let start = self.rng.gen_range(0..cells.len());
        let stride = coprime_stride(cells.len(), &mut self.rng);
        let first = (0..cells.len())
            .map(|step| cells[(start + step * stride) % cells.len()])
            .find(|location| self.spot(*location) == Some(Spot::Open));
        if let Some(location) = first {
            self.add_draft(vec![location], None, false);
        }
    }

    /// Scan up to [`MAX_BRIDGE_LEN`] tiles from `location` toward `direction`.
    fn valid_bridges_from(&self, location: Location, direction: Direction, owner: usize) -> Reach {
        let mut reach = Reach { sites: Vec::new(), existing: None };
        let mut at = location;

        for distance in 1..=MAX_BRIDGE_LEN {
            at = direction.attempt_from(at);
            match self.spot(at) {
                None | Some(Spot::Reef) | Some(Spot::Span { .. }) => break,
                Some(Spot::Land(id)) => {
                    let joinable = id != owner
                        && self.drafts[id].color == self.drafts[owner].color
                        && !self.bridged.contains(&UnorderedPair(location, at));
                    if joinable {
                        reach.existing = Some((at, id));
                    }
                    break;
                }
                Some(Spot::Open) => {
                    if (distance > 1 || self.params.allow_dense) && self.free_for(at, None) {
                        reach.sites.push(at);
                    }
                }
            }
        }

        reach
    }

    /// Try extending a fresh single-tile island at `site` into a large island, returning its tiles.
    fn shape_large(&mut self, site: Location) -> Vec<Location> {
        let offsets: Vec<(isize, isize)> = match self.rng.gen_range(0..3) {
            // straight, two to four tiles
            0 => {
                let length = self.rng.gen_range(1..=3);
                let (dx, dy) = *[(1, 0), (-1, 0), (0, 1), (0, -1)].choose(&mut self.rng).unwrap_or(&(1, 0));
                (1..=length).map(|k| (dx * k, dy * k)).collect()
            }
            // centred on the site: a bar of three, an L, or a T
            1 => {
                let mut arms = vec![(1, 0), (-1, 0), (0, 1), (0, -1)];
                arms.shuffle(&mut self.rng);
                let first = arms[0];
                match self.rng.gen_range(0..3) {
                    0 => vec![first, (-first.0, -first.1)],
                    1 => {
                        let bent = arms.iter().copied().find(|arm| arm.0 * first.0 + arm.1 * first.1 == 0).unwrap_or(arms[1]);
                        vec![first, bent]
                    }
                    _ => arms[..3].to_vec(),
                }
            }
            // square, with the site at a random corner
            _ => {
                let dx = if self.rng.gen_bool(0.5) { 1 } else { -1 };
                let dy = if self.rng.gen_bool(0.5) { 1 } else { -1 };
                vec![(dx, 0), (0, dy), (dx, dy)]
            }
        };

        let extra = offsets.into_iter().map(|offset| site.offset_by(offset)).collect_vec();
        let all_free = extra.iter().all_unique()
            && !extra.contains(&site)
            && extra.iter().all(|tile| self.free_for(*tile, None));
        let mut tiles = vec![site];
        if all_free {
            tiles.extend(extra);
        }
        tiles
    }

    /// Create the island a new bridge from `owner` lands on at `site`: a castle, a large island, or a single tile.
    fn found(&mut self, site: Location, owner: usize) -> usize {
        let color = self.drafts[owner].color;
        if let Some(color) = color.filter(|_| self.rng.gen_bool(CASTLE_CHANCE)) {
            let anchors = [(0, 0), (-1, 0), (0, -1), (-1, -1)].map(|offset| site.offset_by(offset));
            if let Some(top_left) = anchors.into_iter().find(|top_left| self.castle_fits(*top_left, color)) {
                return self.add_castle(top_left, color);
            }
        }

        let tiles = if self.params.use_large && self.rng.gen_bool(LARGE_ISLAND_CHANCE) {
            self.shape_large(site)
        } else {
            vec![site]
        };
        self.add_draft(tiles, color, false)
    }

    /// Mark the water between `from` and `to` as bridged.
    fn span(&mut self, from: Location, to: Location, direction: Direction) {
        let mut at = direction.attempt_from(from);
        while at != to {
            self.spots[at.as_index()] = Spot::Span { horizontal: direction.is_horizontal() };
            at = direction.attempt_from(at);
        }
    }

    fn connect(&mut self, from: Location, to: Location, count: u32) {
        self.bridged.insert(UnorderedPair(from, to));
        for end in [from, to] {
            if let Some(Spot::Land(id)) = self.spot(end) {
                self.drafts[id].bridges += count;
            }
        }
    }

    fn can_take(&self, island: usize, count: u32) -> bool {
        self.drafts[island].castle || self.drafts[island].bridges + count <= MAX_POPULATION as u32
    }

    /// Draw bridges out of one island toward a random subset of directions.
    fn grow_from(&mut self, owner: usize) {
        let mut starts = self.drafts[owner].tiles.iter()
            .flat_map(|tile| Direction::VARIANTS.iter().map(move |direction| (*tile, *direction)))
            .collect_vec();
        starts.shuffle(&mut self.rng);

        for (tile, direction) in starts {
            if self.land >= self.target {
                return;
            }
            if self.rng.gen_bool(SKIP_DIRECTION_CHANCE) {
                continue;
            }

            let count = if self.rng.gen_bool(DOUBLE_BRIDGE_CHANCE) { 2 } else { 1 };
            if !self.can_take(owner, count) {
                return;
            }

            let reach = self.valid_bridges_from(tile, direction, owner);
            let join = match reach.existing {
                Some(_) if reach.sites.is_empty() => true,
                Some(_) => self.rng.gen_bool(JOIN_EXISTING_CHANCE),
                None => false,
            };

            if join {
                if let Some((at, id)) = reach.existing.filter(|(_, id)| self.can_take(*id, count)) {
                    trace!("joining {tile:?} to existing island at {at:?}");
                    self.span(tile, at, direction);
                    self.connect(tile, at, count);
                    self.frontier.push_back(id);
                }
            } else if let Some(site) = reach.sites.choose(&mut self.rng).copied() {
                // water first, so the new island cannot spread over it
                self.span(tile, site, direction);
                let id = self.found(site, owner);
                self.connect(tile, site, count);
                trace!("new island {id} at {site:?}");
            }
        }
    }

    /// Grow from the frontier, then keep sweeping the board for islands able to take more bridges, until the
    /// density target is reached or a sweep changes nothing.
    fn expand(&mut self) {
        let cells = self.locations().collect_vec();

        for _ in 0..MAX_SWEEPS {
            while let Some(island) = self.frontier.pop_front() {
                if self.land >= self.target {
                    return;
                }
                self.grow_from(island);
            }

            let before = (self.land, self.bridged.len());
            let start = self.rng.gen_range(0..cells.len());
            let stride = coprime_stride(cells.len(), &mut self.rng);
            for step in 0..cells.len() {
                if self.land >= self.target {
                    return;
                }
                if let Some(Spot::Land(island)) = self.spot(cells[(start + step * stride) % cells.len()]) {
                    self.grow_from(island);
                    while let Some(island) = self.frontier.pop_front() {
                        self.grow_from(island);
                    }
                }
            }
            if before == (self.land, self.bridged.len()) {
                return;
            }
        }
    }

    /// Lay the drafts out on a builder. Each large island gets a uniformly random root so its arrows do not give the
    /// shape away.
    fn into_board(mut self) -> Result<Board, BuilderInvalidReason> {
        let mut builder = BoardBuilder::with_dims(self.dims);
        for location in self.locations().collect_vec() {
            if self.spot(location) == Some(Spot::Reef) {
                builder.add_reef(location);
            }
        }

        for draft in &self.drafts {
            if draft.castle {
                let top_left = draft.tiles.iter().copied().min_by_key(|tile| (tile.1, tile.0)).unwrap_or_default();
                builder.add_castle(top_left, draft.color.unwrap_or(Color::Red));
                continue;
            }

            let root = *draft.tiles.choose(&mut self.rng).unwrap_or(&draft.tiles[0]);
            builder.add_island(root, draft.bridges.min(MAX_POPULATION as u32) as u8);

            // breadth first from the root, each tile pointing at the tile it was reached from
            let mut seen = vec![root];
            let mut queue = VecDeque::from([root]);
            while let Some(parent) = queue.pop_front() {
                for tile in &draft.tiles {
                    if seen.contains(tile) {
                        continue;
                    }
                    if let Some(toward) = Direction::direction_to(*tile, parent) {
                        builder.add_island_part(*tile, toward);
                        seen.push(*tile);
                        queue.push_back(*tile);
                    }
                }
            }
        }

        builder.into_board()
    }
}

/// A step size sharing no factor with `len`, so `(start + k * stride) % len` visits every index once.
fn coprime_stride(len: usize, rng: &mut Pcg64) -> usize {
    if len <= 2 {
        return 1;
    }
    loop {
        let stride = rng.gen_range(1..len);
        if gcd(stride, len) == 1 {
            return stride;
        }
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}
