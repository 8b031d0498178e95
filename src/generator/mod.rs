//! Random level generation.
//!
//! [`generate`] runs many seeded attempts in parallel (see [`Generator`]): each seed grows a candidate board
//! together with the bridges of one solution, the solver rejects candidates with more than one solution, and the
//! seed whose solver effort lies closest to the requested difficulty wins. Only seeds are kept; the winner is grown
//! again from its seed at the end.

use std::fmt::{Debug, Formatter};
use std::num::NonZero;
use std::sync::Arc;

pub use orchestrator::Generator;

use crate::board::Board;
use crate::location::{Dimension, MAX_DIMENSION};

mod orchestrator;
mod sketch;

/// Callback told how many candidates have been evaluated so far. Returning `false` cancels generation.
pub type Progress = Arc<dyn Fn(u64) -> bool + Send + Sync>;

/// What to generate, and how hard to try.
#[derive(Clone)]
pub struct GenParams {
    /// Board width, 1 through [`MAX_DIMENSION`].
    pub width: usize,
    /// Board height, 1 through [`MAX_DIMENSION`].
    pub height: usize,
    /// Target fraction of tiles covered by islands, 0.0 to 1.0. Sparse layouts may fall short of it.
    pub density: f64,
    /// Allow islands directly next to each other, with no water between.
    pub allow_dense: bool,
    /// Scatter reefs before placing islands.
    pub use_reef: bool,
    /// Grow some islands to two to four tiles.
    pub use_large: bool,
    /// Seed the board with coloured castles.
    pub use_castle: bool,
    /// Accept boards with more than one solution.
    pub allow_multi: bool,
    /// Requested difficulty, 0.0 (easiest seen) to 1.0 (hardest seen).
    pub difficulty: f64,
    /// Number of candidates to evaluate. `None` keeps going until cancelled.
    pub quality: Option<u32>,
    /// Seed for the seed sequence; `None` draws one from the OS. Output is reproducible only with a seed and a
    /// single worker, i.e. a quality below 1000.
    pub seed: Option<u64>,
    /// Called after every evaluated candidate.
    pub progress: Option<Progress>,
}

impl Default for GenParams {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            density: 0.3,
            allow_dense: false,
            use_reef: false,
            use_large: false,
            use_castle: false,
            allow_multi: false,
            difficulty: 0.5,
            quality: Some(1000),
            seed: None,
            progress: None,
        }
    }
}

impl Debug for GenParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenParams")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("density", &self.density)
            .field("allow_dense", &self.allow_dense)
            .field("use_reef", &self.use_reef)
            .field("use_large", &self.use_large)
            .field("use_castle", &self.use_castle)
            .field("allow_multi", &self.allow_multi)
            .field("difficulty", &self.difficulty)
            .field("quality", &self.quality)
            .field("seed", &self.seed)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl GenParams {
    /// Install a progress callback.
    pub fn with_progress(mut self, progress: impl Fn(u64) -> bool + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub(crate) fn dims(&self) -> Result<(Dimension, Dimension), GenerateError> {
        let invalid = GenerateError::InvalidDimensions { width: self.width, height: self.height };
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(invalid);
        }
        match (NonZero::new(self.width), NonZero::new(self.height)) {
            (Some(width), Some(height)) => Ok((width, height)),
            _ => Err(invalid),
        }
    }
}

/// Reasons generation may produce no board.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display, derive_more::Error)]
pub enum GenerateError {
    /// Width or height outside 1 through [`MAX_DIMENSION`].
    #[display("cannot generate a {width}x{height} board")]
    InvalidDimensions {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },
    /// Every candidate within the quality budget was rejected.
    #[display("no acceptable board found")]
    Exhausted,
    /// Generation was cancelled before any acceptable board was found.
    #[display("generation cancelled")]
    Cancelled,
}

/// Generate a board, blocking until the quality budget is spent or the progress callback cancels.
pub fn generate(params: GenParams) -> Result<Board, GenerateError> {
    Generator::start(params)?.finish()
}

/// Grow the single candidate board `seed` leads to. The same parameters and seed always give the same board.
pub fn candidate(params: &GenParams, seed: u64) -> Result<Board, GenerateError> {
    let dims = params.dims()?;
    sketch::Sketch::grow(params, dims, seed).map_err(|_| GenerateError::Exhausted)
}
