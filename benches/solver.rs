//! Solver benchmarks.
//!
//! - **`solve_fixed`**: hand-written boards, from pure deduction to a board needing guesses.
//! - **`solve_generated`**: 12x12 candidates grown from fixed seeds, solved and then checked for a second solution,
//!   the work the generator does per candidate.
//!
//! ```sh
//! cargo bench --bench solver
//! ```

use std::hint;
use std::time::Duration;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use hashi::generator::{self, GenParams};
use hashi::{Board, Solver};

const BOARDS: [(&str, &str); 3] = [
    ("cross", " 2 \n271\n 2 \n"),
    ("guess", "33\n22\n"),
    ("large", "2<  3\n    ^\n1 2 2\n"),
];

const SEEDS: [u64; 3] = [1, 0x5eed, 0xdead_beef];

fn bench_solve_fixed(c: &mut Criterion) {
    let mut solver = Solver::default();

    for (name, text) in BOARDS {
        let board: Board = text.parse().unwrap();
        c.bench_with_input(BenchmarkId::new("solve_fixed", name), &board, |b, board| {
            b.iter_batched(
                || hint::black_box(board.clone()),
                |mut board| solver.solve(&mut board),
                BatchSize::SmallInput,
            );
        });
    }
}

fn bench_solve_generated(c: &mut Criterion) {
    let params = GenParams { width: 12, height: 12, density: 0.35, use_large: true, ..GenParams::default() };
    let mut solver = Solver::default();

    for seed in SEEDS {
        let board = generator::candidate(&params, seed).unwrap();
        c.bench_with_input(BenchmarkId::new("solve_generated", format!("seed_{seed:x}")), &board, |b, board| {
            b.iter_batched(
                || hint::black_box(board.clone()),
                |mut board| solver.solve(&mut board).and_then(|_| solver.solve_another(&mut board)),
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(8));
    targets = bench_solve_fixed, bench_solve_generated
);
criterion_main!(benches);
