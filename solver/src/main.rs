use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use hashi::generator::{self, GenParams};
use hashi::{Board, Solver, SolverFailure};
use log::info;
use unordered_pair::UnorderedPair;

#[derive(Debug, Parser)]
#[command(author, version, about = "Solve, check and generate bridge puzzles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve a board and print its solution.
    Solve {
        /// Board file; `-` reads standard input.
        #[arg(default_value = "-")]
        file: PathBuf,
        /// Also list every bridge, vertical ones included.
        #[arg(long)]
        bridges: bool,
        /// Nested guesses allowed before giving up.
        #[arg(long, default_value_t = hashi::MAX_DEPTH)]
        max_depth: usize,
    },
    /// Report whether a board has no, one, or several solutions.
    Check {
        /// Board file; `-` reads standard input.
        #[arg(default_value = "-")]
        file: PathBuf,
    },
    /// Generate a new board.
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long, default_value_t = 10)]
    width: usize,
    #[arg(long, default_value_t = 10)]
    height: usize,
    /// Fraction of tiles to cover with islands.
    #[arg(long, default_value_t = 0.3)]
    density: f64,
    /// Allow islands next to each other.
    #[arg(long)]
    allow_dense: bool,
    /// Scatter reefs.
    #[arg(long)]
    reef: bool,
    /// Grow multi-tile islands.
    #[arg(long)]
    large: bool,
    /// Place coloured castles.
    #[arg(long)]
    castle: bool,
    /// Accept boards with more than one solution.
    #[arg(long)]
    allow_multi: bool,
    /// 0.0 is the easiest board seen, 1.0 the hardest.
    #[arg(long, default_value_t = 0.5)]
    difficulty: f64,
    /// Candidates to evaluate.
    #[arg(long, default_value_t = 1000)]
    quality: u32,
    #[arg(long)]
    seed: Option<u64>,
    /// Also print the solution.
    #[arg(long)]
    solution: bool,
}

impl From<&GenerateArgs> for GenParams {
    fn from(args: &GenerateArgs) -> Self {
        GenParams {
            width: args.width,
            height: args.height,
            density: args.density,
            allow_dense: args.allow_dense,
            use_reef: args.reef,
            use_large: args.large,
            use_castle: args.castle,
            allow_multi: args.allow_multi,
            difficulty: args.difficulty,
            quality: Some(args.quality),
            seed: args.seed,
            progress: None,
        }
    }
}

fn read_board(file: &Path) -> Board {
    let text = if file.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).map(|_| text)
    } else {
        fs::read_to_string(file)
    };

    let text = text.unwrap_or_else(|err| {
        eprintln!("cannot read {}: {err}", file.display());
        process::exit(2);
    });
    text.parse().unwrap_or_else(|err| {
        eprintln!("cannot parse {}: {err}", file.display());
        process::exit(2);
    })
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Solve { file, bridges, max_depth } => {
            let mut board = read_board(&file);
            match Solver::with_max_depth(max_depth).solve(&mut board) {
                Ok(stats) => {
                    info!("solved with {stats:?}, difficulty {}", stats.difficulty());
                    print!("{}", board.solution());
                    if bridges {
                        for (UnorderedPair(a, b), count) in board.bridges() {
                            println!("({}, {}) - ({}, {}) x{count}", a.0, a.1, b.0, b.1);
                        }
                    }
                }
                Err(failure) => {
                    eprintln!("{failure}");
                    process::exit(1);
                }
            }
        }
        Command::Check { file } => {
            let mut board = read_board(&file);
            let mut solver = Solver::default();
            let verdict = match solver.solve(&mut board) {
                Err(SolverFailure::Inconsistent) => "unsolvable",
                Err(SolverFailure::DepthExhausted) => "undecided",
                Ok(_) => match solver.solve_another(&mut board) {
                    Ok(_) => "multiple",
                    Err(SolverFailure::Inconsistent) => "unique",
                    Err(SolverFailure::DepthExhausted) => "undecided",
                },
            };
            println!("{verdict}");
        }
        Command::Generate(args) => {
            let quality = args.quality;
            let params = GenParams::from(&args).with_progress(move |done| {
                if done % 100 == 0 {
                    info!("{done}/{quality} candidates");
                }
                true
            });

            match generator::generate(params) {
                Ok(mut board) => {
                    print!("{board}");
                    if args.solution && board.solve().is_ok() {
                        println!();
                        print!("{}", board.solution());
                    }
                }
                Err(err) => {
                    eprintln!("{err}");
                    process::exit(1);
                }
            }
        }
    }
}
