use std::num::NonZero;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::board::Board;
use crate::generator::{candidate, GenParams, GenerateError};
use crate::solver::{Solver, SolverFailure};

/// Upper bound on worker threads.
const MAX_WORKERS: usize = 32;
/// Candidates per worker needed before another worker pays off.
const CANDIDATES_PER_WORKER: u32 = 500;

/// How one candidate fared.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Verdict {
    Rejected,
    // at most one island; usable only when nothing better turns up
    Trivial,
    Scored(f64),
}

#[derive(Copy, Clone, Debug)]
struct Best {
    seed: u64,
    score: f64,
}

struct State {
    seeds: Pcg64,
    started: u64,
    finished: u64,
    running: usize,
    range: Option<(f64, f64)>,
    best: Option<Best>,
    fallback: Option<u64>,
}

impl State {
    fn normalized(&self, score: f64) -> f64 {
        match self.range {
            Some((lo, hi)) if hi > lo => (score - lo) / (hi - lo),
            _ => 0.5,
        }
    }

    fn record(&mut self, seed: u64, verdict: Verdict, target: f64) {
        match verdict {
            Verdict::Rejected => {}
            Verdict::Trivial => {
                self.fallback.get_or_insert(seed);
            }
            Verdict::Scored(score) => {
                self.range = Some(match self.range {
                    Some((lo, hi)) => (lo.min(score), hi.max(score)),
                    None => (score, score),
                });

                // the range moves, so the current best is re-measured against it every time
                let closer = match self.best {
                    Some(best) => (self.normalized(score) - target).abs() < (self.normalized(best.score) - target).abs(),
                    None => true,
                };
                if closer {
                    debug!("seed {seed} is the new best with score {score}");
                    self.best = Some(Best { seed, score });
                }
            }
        }
    }
}

struct Shared {
    state: Mutex<State>,
    drained: Condvar,
    cancelled: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A generation run in progress on a pool of worker threads.
///
/// Workers share one seed sequence. Each takes the next seed, grows a candidate, solves it, rejects it if a second
/// solution exists (unless [`GenParams::allow_multi`]), and scores it by solver effort. The seed whose score,
/// normalized against the range seen so far, lies closest to [`GenParams::difficulty`] wins.
pub struct Generator {
    params: Arc<GenParams>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Generator {
    /// Validate `params` and start the workers.
    pub fn start(params: GenParams) -> Result<Self, GenerateError> {
        params.dims()?;

        let count = worker_count(params.quality);
        let seeds = match params.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_entropy(),
        };
        info!("generating {}x{} board with {count} workers", params.width, params.height);
        debug!("{params:?}");

        let params = Arc::new(params);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                seeds,
                started: 0,
                finished: 0,
                running: count,
                range: None,
                best: None,
                fallback: None,
            }),
            drained: Condvar::new(),
            cancelled: AtomicBool::new(false),
        });

        let workers = (0..count)
            .map(|_| {
                let params = Arc::clone(&params);
                let shared = Arc::clone(&shared);
                thread::spawn(move || work(&shared, &params))
            })
            .collect();

        Ok(Self { params, shared, workers })
    }

    /// Ask the workers to stop after their current candidate.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
    }

    /// Candidates evaluated so far.
    pub fn progress(&self) -> u64 {
        self.shared.lock().finished
    }

    /// Wait for every worker, then rebuild the winning board from its seed.
    pub fn finish(self) -> Result<Board, GenerateError> {
        let (best, fallback, finished) = {
            let mut state = self.shared.lock();
            while state.running > 0 {
                state = self.shared.drained.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            (state.best, state.fallback, state.finished)
        };

        for worker in self.workers {
            if worker.join().is_err() {
                warn!("generator worker panicked");
            }
        }

        let seed = match (best, fallback) {
            (Some(best), _) => {
                info!("picked seed {} with score {} after {finished} candidates", best.seed, best.score);
                best.seed
            }
            (None, Some(seed)) => {
                info!("no scored candidate in {finished}, falling back to trivial seed {seed}");
                seed
            }
            (None, None) if self.shared.cancelled.load(Ordering::Relaxed) => return Err(GenerateError::Cancelled),
            (None, None) => return Err(GenerateError::Exhausted),
        };

        candidate(&self.params, seed)
    }
}

fn worker_count(quality: Option<u32>) -> usize {
    let cores = thread::available_parallelism().map(NonZero::get).unwrap_or(1);
    let wanted = quality.map_or(MAX_WORKERS, |quality| (quality / CANDIDATES_PER_WORKER) as usize);
    cores.min(wanted).min(MAX_WORKERS).max(1)
}

/// Counts a worker out when dropped, whether it returned or unwound.
struct Running<'a>(&'a Shared);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.running -= 1;
        if state.running == 0 {
            self.0.drained.notify_all();
        }
    }
}

fn work(shared: &Shared, params: &GenParams) {
    let _running = Running(shared);
    let mut solver = Solver::default();

    loop {
        let seed = {
            let mut state = shared.lock();
            let spent = params.quality.is_some_and(|quality| state.started >= quality as u64);
            if spent || shared.cancelled.load(Ordering::Relaxed) {
                return;
            }
            state.started += 1;
            state.seeds.gen::<u64>()
        };

        let verdict = evaluate(&mut solver, params, seed);

        let finished = {
            let mut state = shared.lock();
            state.finished += 1;
            state.record(seed, verdict, params.difficulty);
            state.finished
        };

        if let Some(progress) = &params.progress {
            if !progress(finished) {
                shared.cancelled.store(true, Ordering::Relaxed);
            }
        }
    }
}

fn evaluate(solver: &mut Solver, params: &GenParams, seed: u64) -> Verdict {
    let mut board = match candidate(params, seed) {
        Ok(board) => board,
        Err(err) => {
            warn!("seed {seed} grew an invalid board: {err}");
            return Verdict::Rejected;
        }
    };
    if board.island_count() <= 1 {
        return Verdict::Trivial;
    }

    let stats = match solver.solve(&mut board) {
        Ok(stats) => stats,
        Err(failure) => {
            debug!("seed {seed} rejected: {failure}");
            return Verdict::Rejected;
        }
    };

    if !params.allow_multi {
        match solver.solve_another(&mut board) {
            Err(SolverFailure::Inconsistent) => {}
            Ok(_) => {
                debug!("seed {seed} rejected: more than one solution");
                return Verdict::Rejected;
            }
            Err(SolverFailure::DepthExhausted) => {
                debug!("seed {seed} rejected: uniqueness undecided");
                return Verdict::Rejected;
            }
        }
    }

    Verdict::Scored(stats.difficulty())
}
