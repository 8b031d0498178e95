use std::collections::VecDeque;

use log::{debug, trace};
use ndarray::Array2;
use strum::VariantArray;

use crate::board::Board;
use crate::cell::{IslandId, INTERNAL_EDGE};
use crate::connectivity;
use crate::isolation;
use crate::location::Location;
use crate::mask::{self, between, bit, group, is_determined, max_count, min_count, with_group, Layers, Mask, ANY, INTERNAL, NONZERO, ZERO};
use crate::shape::Direction;

/// Default bound on the number of nested guesses, and so on the number of mask layers kept.
pub const MAX_DEPTH: usize = 32;

/// Reasons a [`Solver`] may fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SolverFailure {
    /// The board as stated has no solution (or, for [`Solver::solve_another`], no solution besides the known one).
    #[display("no solution")]
    Inconsistent,
    /// The search needed more nested guesses than the configured depth allows; the board may or may not be solvable.
    #[display("search depth exhausted")]
    DepthExhausted,
}

/// Counters describing how much work one solve took.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SolveStats {
    /// Guesses tried, successful or not.
    pub branches: u32,
    /// Propagation rounds, each ending in a pass of the isolation rule.
    pub rounds: u32,
    /// Deepest guess nesting reached.
    pub max_depth: usize,
}

impl SolveStats {
    /// A difficulty heuristic: guesses weigh far more than the rounds of pure deduction between them.
    pub fn difficulty(&self) -> f64 {
        self.rounds as f64 + 8.0 * self.branches as f64 + 4.0 * self.max_depth as f64
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Outcome {
    Solved,
    Unsolvable,
    Exhausted,
}

#[derive(Copy, Clone, Debug)]
enum Work {
    Island(IslandId),
    Crossing(Location),
}

/// A bounded backtracking solver over possibility masks.
///
/// Each depth of the search owns one layer of masks. Deduction at a layer is local propagation (bridge count bounds
/// per island, the no-crossing rule) interleaved with the isolation rule until nothing changes. When deduction
/// stalls, the solver guesses on the first undecided edge; a guess that fails is banned in the parent layer, so
/// every failed branch shrinks the space left to search.
///
/// Buffers are kept between calls, so one solver can be reused across many boards.
pub struct Solver {
    max_depth: usize,
    layers: Layers,
    queue: VecDeque<Work>,
    // a solution to avoid, for uniqueness checks
    known: Option<Array2<Mask>>,
    stats: SolveStats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::with_max_depth(MAX_DEPTH)
    }
}

impl Solver {
    /// A solver that gives up with [`SolverFailure::DepthExhausted`] rather than nest more than `max_depth` guesses.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            layers: Layers::default(),
            queue: VecDeque::new(),
            known: None,
            stats: SolveStats::default(),
        }
    }

    /// Solve `board` from scratch, ignoring any bridges already placed, and place the solution found.
    ///
    /// The board is left untouched on failure.
    pub fn solve(&mut self, board: &mut Board) -> Result<SolveStats, SolverFailure> {
        self.known = None;
        self.run(board)
    }

    /// Find a solution differing from the bridges currently placed on `board`, and place it.
    ///
    /// Called right after [`Self::solve`], success means the board has more than one solution and
    /// [`SolverFailure::Inconsistent`] means the first one was unique.
    pub fn solve_another(&mut self, board: &mut Board) -> Result<SolveStats, SolverFailure> {
        let known = Array2::from_shape_fn(board.tiles.raw_dim(), |index| {
            let tile = &board.tiles[index];
            Direction::VARIANTS.iter().fold(0, |known, direction| {
                let count = tile.bridge_count[direction.index()];
                with_group(known, *direction, if count == INTERNAL_EDGE { INTERNAL } else { bit(count.min(2)) })
            })
        });
        self.known = Some(known);
        let result = self.run(board);
        self.known = None;
        result
    }

    fn run(&mut self, board: &mut Board) -> Result<SolveStats, SolverFailure> {
        self.prepare(board);
        let outcome = self.solve_rec(board, 0);
        debug!("search finished: {outcome:?} after {:?}", self.stats);

        match outcome {
            Outcome::Solved => {
                board.apply(&self.layers[0]);
                Ok(self.stats)
            }
            Outcome::Unsolvable => Err(SolverFailure::Inconsistent),
            Outcome::Exhausted => Err(SolverFailure::DepthExhausted),
        }
    }

    /// Reset the buffers and open layer 0 for `board`.
    fn prepare(&mut self, board: &Board) {
        self.layers.prepare(board.tiles.raw_dim());
        self.queue.clear();
        self.stats = SolveStats::default();
        open_runs(board, &mut self.layers[0]);
        self.queue.extend((0..board.islands.len()).map(Work::Island));
    }

    /// Remove every count not in `allowed` from the run through `location` along `direction`'s axis.
    ///
    /// Returns false if that leaves the run with no possible count. Changes are mirrored onto every tile the run
    /// covers, and the islands and ocean tiles touched are queued for another look.
    fn restrict(&mut self, board: &Board, depth: usize, location: Location, direction: Direction, allowed: u8) -> bool {
        let tile = &board.tiles[location.as_index()];
        let layer = &mut self.layers[depth];

        // start from the land end of the run
        let start = if tile.kind.is_land() {
            location
        } else {
            match tile.bridge_len[direction.invert().index()] {
                Some(back) => (0..back).fold(location, |at, _| direction.invert().attempt_from(at)),
                None => return group(layer[location.as_index()], direction) & allowed != 0,
            }
        };
        let Some(len) = board.tiles[start.as_index()].bridge_len[direction.index()] else {
            return group(layer[start.as_index()], direction) & allowed != 0;
        };

        let old = group(layer[start.as_index()], direction);
        if old & INTERNAL != 0 {
            return true;
        }
        let new = old & allowed;
        if new == old {
            return true;
        }
        if new == 0 {
            return false;
        }

        write_run(layer, start, direction, len, new);

        let mut at = start;
        for _ in 1..len {
            at = direction.attempt_from(at);
            self.queue.push_back(Work::Crossing(at));
        }
        let far = direction.attempt_from(at);
        for end in [start, far] {
            if let Some(island) = board.tiles[end.as_index()].island {
                self.queue.push_back(Work::Island(island));
            }
        }

        true
    }

    /// Bound the bridges of one island by its population.
    ///
    /// With `min` and `max` the fewest and most bridges the island could still get, a direction able to take `lo`
    /// to `hi` bridges is clamped to `max_d - (max - p)` through `min_d + (p - min)`. This forces every direction to
    /// its minimum when `p == min` and to its maximum when `p == max`, and bans the double bridge (or the empty
    /// edge) when the population is one away from either end.
    fn fill_simple(&mut self, board: &Board, depth: usize, island: IslandId) -> bool {
        let island = &board.islands[island];
        let Some(population) = island.population else {
            return true;
        };
        let population = population as i32;

        let layer = &self.layers[depth];
        let slots = island.tiles.iter()
            .flat_map(|at| Direction::VARIANTS.iter().map(move |direction| (*at, *direction)))
            .map(|(at, direction)| (at, direction, group(layer[at.as_index()], direction)))
            .filter(|(_, _, group)| group & INTERNAL == 0)
            .collect::<Vec<_>>();

        let min: i32 = slots.iter().map(|(_, _, group)| min_count(*group) as i32).sum();
        let max: i32 = slots.iter().map(|(_, _, group)| max_count(*group) as i32).sum();
        if population < min || population > max {
            return false;
        }

        for (at, direction, group) in slots {
            let allowed = between(
                max_count(group) as i32 - (max - population),
                min_count(group) as i32 + (population - min),
            );
            if group & !allowed & ANY != 0 && !self.restrict(board, depth, at, direction, allowed) {
                return false;
            }
        }

        true
    }

    /// An ocean tile may not carry a bridge along both axes.
    fn check_crossing(&mut self, board: &Board, depth: usize, location: Location) -> bool {
        let mask = self.layers[depth][location.as_index()];
        let across = group(mask, Direction::Right);
        let down = group(mask, Direction::Down);

        if across & ZERO == 0 && !self.restrict(board, depth, location, Direction::Down, ZERO) {
            return false;
        }
        if down & ZERO == 0 && !self.restrict(board, depth, location, Direction::Right, ZERO) {
            return false;
        }
        true
    }

    /// Run deduction at `depth` to a fixed point. Returns false on a contradiction.
    fn propagate(&mut self, board: &Board, depth: usize) -> bool {
        loop {
            self.stats.rounds += 1;

            while let Some(work) = self.queue.pop_front() {
                let consistent = match work {
                    Work::Island(island) => self.fill_simple(board, depth, island),
                    Work::Crossing(location) => self.check_crossing(board, depth, location),
                };
                if !consistent {
                    self.queue.clear();
                    return false;
                }
            }

            let Some(forced) = isolation::forced_links(board, &self.layers[depth]) else {
                trace!("depth {depth}: islands cannot all be connected");
                return false;
            };
            if forced.is_empty() {
                return true;
            }
            for (at, direction) in forced {
                if !self.restrict(board, depth, at, direction, NONZERO) {
                    self.queue.clear();
                    return false;
                }
            }
        }
    }

    fn undecided(&self, board: &Board, depth: usize) -> Option<(Location, Direction)> {
        let layer = &self.layers[depth];
        board.islands.iter()
            .flat_map(|island| island.tiles.iter())
            .flat_map(|at| Direction::FORWARD_VARIANTS.iter().map(move |direction| (*at, *direction)))
            .find(|(at, direction)| !is_determined(group(layer[at.as_index()], *direction)))
    }

    /// The order to guess counts in: 0, 1, 2, except that the known solution's count goes last.
    fn guess_order(&self, location: Location, direction: Direction) -> Vec<u8> {
        let known = self.known.as_ref().map(|known| mask::min_count(group(known[location.as_index()], direction)));
        let mut order = (0..=2).filter(|count| Some(*count) != known).collect::<Vec<_>>();
        order.extend(known);
        order
    }

    /// Accept a fully decided layer if its bridges connect the board, and differ from the known solution if any.
    fn accept(&self, board: &Board, depth: usize) -> bool {
        let layer = &self.layers[depth];

        let links = board.islands.iter()
            .flat_map(|island| island.tiles.iter())
            .flat_map(|at| Direction::FORWARD_VARIANTS.iter().map(move |direction| (at, *direction)))
            .filter(|(at, direction)| {
                let decided = group(layer[at.as_index()], *direction);
                decided & INTERNAL == 0 && min_count(decided) > 0
            })
            .filter_map(|(at, direction)| {
                let near = board.tiles[at.as_index()].island?;
                let far = board.tiles[board.far_end(*at, direction)?.as_index()].island?;
                Some((near, far))
            });
        if !connectivity::is_connected(&board.islands, links) {
            return false;
        }

        match &self.known {
            None => true,
            Some(known) => board.islands.iter()
                .flat_map(|island| island.tiles.iter())
                .flat_map(|at| Direction::FORWARD_VARIANTS.iter().map(move |direction| (at, *direction)))
                .any(|(at, direction)| group(layer[at.as_index()], direction) != group(known[at.as_index()], direction)),
        }
    }

    fn solve_rec(&mut self, board: &Board, depth: usize) -> Outcome {
        self.stats.max_depth = self.stats.max_depth.max(depth);
        if !self.propagate(board, depth) {
            return Outcome::Unsolvable;
        }

        'scan: loop {
            let Some((at, direction)) = self.undecided(board, depth) else {
                return if self.accept(board, depth) { Outcome::Solved } else { Outcome::Unsolvable };
            };
            if depth + 1 >= self.max_depth {
                return Outcome::Exhausted;
            }

            let mut exhausted = false;
            for count in self.guess_order(at, direction) {
                let current = group(self.layers[depth][at.as_index()], direction);
                if is_determined(current) {
                    continue 'scan;
                }
                if current & bit(count) == 0 {
                    continue;
                }

                self.stats.branches += 1;
                trace!("depth {depth}: guessing {count} bridges {direction:?} of {at:?}");
                self.layers.copy_forward(depth);
                let outcome = if self.restrict(board, depth + 1, at, direction, bit(count)) {
                    self.solve_rec(board, depth + 1)
                } else {
                    self.queue.clear();
                    Outcome::Unsolvable
                };

                match outcome {
                    Outcome::Solved => {
                        self.layers.copy_back(depth);
                        return Outcome::Solved;
                    }
                    Outcome::Exhausted => exhausted = true,
                    Outcome::Unsolvable => {
                        // nothing below this guess works, so it is wrong here too
                        if !self.restrict(board, depth, at, direction, ANY & !bit(count)) || !self.propagate(board, depth) {
                            return Outcome::Unsolvable;
                        }
                    }
                }
            }

            if !is_determined(group(self.layers[depth][at.as_index()], direction)) {
                debug_assert!(exhausted);
                return Outcome::Exhausted;
            }
        }
    }
}

/// Open every run on a closed `layer` to the counts it could take on an empty board.
pub(crate) fn open_runs(board: &Board, layer: &mut Array2<Mask>) {
    for island in &board.islands {
        for at in &island.tiles {
            let tile = &board.tiles[at.as_index()];
            for direction in Direction::FORWARD_VARIANTS {
                let Some(len) = tile.bridge_len[direction.index()] else { continue };
                let initial = if tile.bridge_count[direction.index()] == INTERNAL_EDGE { INTERNAL } else { ANY };
                write_run(layer, *at, *direction, len, initial);
            }
        }
    }
}

/// Set the group of the run of `len` tiles from `start` toward `direction` to `value`, on both ends and every tile between.
fn write_run(layer: &mut Array2<Mask>, start: Location, direction: Direction, len: usize, value: u8) {
    let mut at = start;
    for step in 0..=len {
        let mask = &mut layer[at.as_index()];
        if step < len {
            *mask = with_group(*mask, direction, value);
        }
        if step > 0 {
            *mask = with_group(*mask, direction.invert(), value);
        }
        at = direction.attempt_from(at);
    }
}
