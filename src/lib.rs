#![warn(missing_docs)]

//! # `hashi`
//!
//! A solver and level generator for [Hashiwokakero](https://en.wikipedia.org/wiki/Hashiwokakero) ("bridges") puzzles,
//! extended with reefs, large multi-tile islands and coloured castles.
//! Parse a board from text with [`str::parse`] (or build one with [`BoardBuilder`](builder::BoardBuilder)), then call
//! [`solve()`](crate::Board::solve), which places the bridges of the solution it finds on the board.
//! [`generator::generate`] builds new boards with a unique solution and a requested difficulty.
//!
//! # Internals
//! Every edge between two tiles that a bridge could join holds a small set of still possible bridge counts (0, 1 or
//! 2), packed four bits per direction into one 16-bit mask per tile. Solving narrows these sets:
//!
//! 1. An island needing `p` bridges whose edges can supply at least `min` and at most `max` bounds every edge by how
//! much slack `p` leaves on either side.
//! 2. An ocean tile carrying a bridge along one axis carries none along the other.
//! 3. Among islands needing more than one bridge, any edge whose removal would split the remaining candidate graph
//! must carry a bridge (the isolation rule, see the `isolation` module).
//!
//! When these stall, a bounded backtracking search guesses a count, and any guess that fails is removed from the
//! parent's masks before the next guess. Boards are accepted only once every edge is decided and the bridges connect
//! the islands.
//!
//! The generator grows random boards from a seed and keeps the seed whose solver effort best matches the requested
//! difficulty, using several worker threads.

pub use board::{Board, ToggleError};
pub use builder::{BoardBuilder, BuilderInvalidReason, ParseError};
pub use cell::{Color, TileKind, MAX_POPULATION};
pub use location::{Dimension, Location, MAX_DIMENSION};
pub use shape::Direction;
pub use solver::{SolveStats, Solver, SolverFailure, MAX_DEPTH};

pub(crate) mod board;
mod tests;
pub(crate) mod location;
pub(crate) mod mask;
pub(crate) mod shape;
pub(crate) mod cell;
pub mod builder;
pub(crate) mod connectivity;
pub(crate) mod isolation;
pub(crate) mod solver;
pub mod generator;
#[cfg(feature = "wasm")]
pub mod wasm;
