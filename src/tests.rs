#[cfg(test)]
mod tests {
    use std::num::NonZero;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use ndarray::Array2;
    use proptest::prelude::*;
    use unordered_pair::UnorderedPair;

    use crate::board::{Board, ToggleError};
    use crate::builder::{BoardBuilder, BuilderInvalidReason, ParseError};
    use crate::cell::{Color, TileKind};
    use crate::generator::{self, GenParams, GenerateError};
    use crate::isolation;
    use crate::location::Location;
    use crate::mask::{Mask, CLOSED};
    use crate::shape::Direction;
    use crate::solver::{self, Solver, SolverFailure};

    fn board(text: &str) -> Board {
        text.parse().unwrap()
    }

    fn open_layer(board: &Board) -> Array2<Mask> {
        let mut layer = Array2::from_elem(board.tiles.raw_dim(), CLOSED);
        solver::open_runs(board, &mut layer);
        layer
    }

    #[test]
    fn solve_cross() {
        let mut board = board(" 2 \n271\n 2 \n");
        board.solve().unwrap();

        assert!(board.finished());
        assert_eq!(board.solution(), " 0 \n210\n 0 \n");
        assert_eq!(board.bridge_count(Location(1, 0), Direction::Down), 2);
        assert_eq!(board.bridge_count(Location(1, 1), Direction::Down), 2);
        assert_eq!(board.total(Location(1, 1)), Some(7));
        assert_eq!(board.solve_another(), Err(SolverFailure::Inconsistent));
    }

    #[test]
    fn second_solution_found() {
        let mut board = board("33\n22\n");
        let mut solver = Solver::default();
        solver.solve(&mut board).unwrap();
        let first = board.bridges();

        solver.solve_another(&mut board).unwrap();
        assert!(board.finished());
        assert_ne!(board.bridges(), first);
    }

    #[test]
    fn unsolvable_disconnected() {
        // every count fits, but the islands split into two pairs
        assert_eq!(board("11\n11\n").solve(), Err(SolverFailure::Inconsistent));
        assert_eq!(board("2 2 \n 2 2\n").solve(), Err(SolverFailure::Inconsistent));
        // two bridges cannot join four islands
        assert_eq!(board(" 1 \n1 1\n 1 \n").solve(), Err(SolverFailure::Inconsistent));
    }

    #[test]
    fn failed_solve_leaves_board_alone() {
        let mut board = board("11\n11\n");
        board.toggle(Location(0, 0), Direction::Right).unwrap();
        assert!(board.solve().is_err());
        assert_eq!(board.bridge_count(Location(0, 0), Direction::Right), 1);
    }

    #[test]
    fn depth_exhausted() {
        // propagation alone cannot decide this one
        let mut board = board("33\n22\n");
        assert_eq!(Solver::with_max_depth(1).solve(&mut board), Err(SolverFailure::DepthExhausted));
        assert!(board.bridges().is_empty());
    }

    #[test]
    fn solver_reuse() {
        let mut solver = Solver::default();
        let mut small = board("1 1\n");
        let mut cross = board(" 2 \n271\n 2 \n");

        solver.solve(&mut small).unwrap();
        solver.solve(&mut cross).unwrap();
        solver.solve(&mut small).unwrap();

        assert!(small.finished());
        assert!(cross.finished());
        assert_eq!(small.solution(), "1 0\n");
    }

    #[test]
    fn reef_blocks_bridges() {
        let mut open = board("2 1\n   \n1  \n");
        open.solve().unwrap();
        assert_eq!(open.bridges(), vec![
            (UnorderedPair(Location(0, 0), Location(2, 0)), 1),
            (UnorderedPair(Location(0, 0), Location(0, 2)), 1),
        ]);

        let mut blocked = board("2#1\n   \n1  \n");
        assert_eq!(blocked.kind(Location(1, 0)), Some(TileKind::Reef));
        assert_eq!(blocked.solve(), Err(SolverFailure::Inconsistent));
    }

    #[test]
    fn large_island() {
        let mut board = board("2<\n  \n11\n");
        assert_eq!(board.island_count(), 3);
        assert_eq!(board.root(Location(1, 0)), Some(Location(0, 0)));
        assert_eq!(board.population(Location(1, 0)), Some(2));

        board.solve().unwrap();
        assert!(board.finished());
        assert_eq!(board.solution(), "00\n  \n00\n");
        assert_eq!(board.bridge_count(Location(0, 0), Direction::Down), 1);
        assert_eq!(board.bridge_count(Location(1, 0), Direction::Down), 1);
        assert_eq!(board.bridge_count(Location(0, 2), Direction::Right), 0);
        assert_eq!(board.total(Location(1, 0)), Some(2));
    }

    #[test]
    fn castle_bridges() {
        let mut board = board("r<  1\n^<   \n");
        assert_eq!(board.island_count(), 2);
        assert_eq!(board.kind(Location(1, 1)), Some(TileKind::Castle { color: Color::Red }));
        assert_eq!(board.population(Location(0, 0)), None);

        board.solve().unwrap();
        assert_eq!(board.solution(), "01  0\n00   \n");
        assert!(board.finished());
        assert_eq!(board.solve_another(), Err(SolverFailure::Inconsistent));
    }

    #[test]
    fn castle_colours() {
        // different colours never join, and need not
        let mut apart = board("r<b<\n^<^<\n");
        apart.solve().unwrap();
        assert!(apart.bridges().is_empty());
        assert!(apart.finished());

        // one colour must end up in one piece
        let mut together = board("r<r<\n^<^<\n");
        assert!(!together.finished());
        together.solve().unwrap();
        assert!(!together.bridges().is_empty());
        assert!(together.finished());
        together.solve_another().unwrap();
    }

    #[test]
    fn toggle_cycles() {
        let mut board = board("2 1\n   \n1  \n");

        assert_eq!(board.toggle(Location(0, 0), Direction::Right), Ok(1));
        assert_eq!(board.total(Location(0, 0)), Some(1));
        assert_eq!(board.total(Location(2, 0)), Some(1));
        assert_eq!(board.bridge_count(Location(1, 0), Direction::Left), 1);

        // the same bridge, from its other end
        assert_eq!(board.toggle(Location(2, 0), Direction::Left), Ok(2));
        assert_eq!(board.total(Location(0, 0)), Some(2));
        assert_eq!(board.toggle(Location(0, 0), Direction::Right), Ok(0));
        assert_eq!(board.total(Location(2, 0)), Some(0));
        assert_eq!(board.bridge_count(Location(1, 0), Direction::Right), 0);

        board.toggle(Location(0, 0), Direction::Right).unwrap();
        board.toggle(Location(0, 2), Direction::Up).unwrap();
        assert!(board.finished());
        board.reset();
        assert_eq!(board.total(Location(0, 0)), Some(0));
        assert!(!board.finished());
    }

    #[test]
    fn toggle_errors() {
        let mut cross = board(" 1 \n1 1\n 1 \n");
        assert_eq!(cross.toggle(Location(5, 5), Direction::Up), Err(ToggleError::OutOfBounds));
        assert_eq!(cross.toggle(Location(1, 1), Direction::Up), Err(ToggleError::NotAnIsland));
        assert_eq!(cross.toggle(Location(1, 0), Direction::Right), Err(ToggleError::NoBridge));
        assert_eq!(cross.toggle(Location(0, 1), Direction::Right), Ok(1));
        assert_eq!(cross.toggle(Location(1, 0), Direction::Down), Err(ToggleError::Crossing));
        assert_eq!(cross.toggle(Location(1, 2), Direction::Up), Err(ToggleError::Crossing));

        let mut large = board("2<\n  \n11\n");
        assert_eq!(large.toggle(Location(0, 0), Direction::Right), Err(ToggleError::InternalEdge));
    }

    #[test]
    fn parse_round_trip() {
        for text in ["1 1\n", " 2 \n271\n 2 \n", "2<\n  \n11\n", "r<  Z\n^<#  \n", "v3\n>^\n"] {
            assert_eq!(board(text).serialize(), text);
        }
    }

    #[test]
    fn parse_line_endings() {
        assert_eq!(board("1 1\r\n1 1\r\n"), board("1 1\n1 1\n"));
        // the grid ends at the first empty line
        assert_eq!(board("1 1\n\nanything at all"), board("1 1"));
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<Board>().unwrap_err(), ParseError::Empty);
        assert_eq!("\n12\n".parse::<Board>().unwrap_err(), ParseError::Empty);
        assert_eq!(
            "12\n1\n".parse::<Board>().unwrap_err(),
            ParseError::RaggedLine { line: 2, expected: 2, found: 1 },
        );
        assert_eq!(
            "1x\n".parse::<Board>().unwrap_err(),
            ParseError::UnexpectedChar { ch: 'x', line: 1, column: 2 },
        );
        assert_eq!(
            ">\n".parse::<Board>().unwrap_err(),
            ParseError::Invalid { reason: BuilderInvalidReason::DanglingArrow },
        );
        assert_eq!(
            "><\n".parse::<Board>().unwrap_err(),
            ParseError::Invalid { reason: BuilderInvalidReason::ArrowCycle },
        );
        assert_eq!(
            "r<\n".parse::<Board>().unwrap_err(),
            ParseError::Invalid { reason: BuilderInvalidReason::MalformedCastle },
        );
    }

    #[test]
    fn builder_invalid() {
        let five = NonZero::new(5).unwrap();

        let mut builder = BoardBuilder::with_dims((five, five));
        builder.add_island(Location(0, 0), 36);
        assert_eq!(builder.is_valid(), Some(&vec![BuilderInvalidReason::PopulationOutOfRange]));

        let mut builder = BoardBuilder::with_dims((five, five));
        builder.add_island(Location(0, 0), 1).add_reef(Location(0, 0));
        assert_eq!(builder.is_valid(), Some(&vec![BuilderInvalidReason::FeatureOverlap]));

        let mut builder = BoardBuilder::with_dims((five, five));
        builder.add_reef(Location(5, 0));
        assert_eq!(builder.build().unwrap_err(), &vec![BuilderInvalidReason::FeatureOutOfBounds]);

        let builder = BoardBuilder::with_dims((NonZero::new(101).unwrap(), five));
        assert_eq!(builder.is_valid(), Some(&vec![BuilderInvalidReason::TooLarge]));

        let mut builder = BoardBuilder::with_dims((five, five));
        builder.add_island_part(Location(0, 0), Direction::Up);
        assert_eq!(builder.build().unwrap_err(), &vec![BuilderInvalidReason::DanglingArrow]);
    }

    #[test]
    fn builder_matches_parse() {
        let five = NonZero::new(5).unwrap();
        let two = NonZero::new(2).unwrap();
        let built = BoardBuilder::with_dims((five, two))
            .add_castle(Location(0, 0), Color::Red)
            .add_island(Location(4, 0), 1)
            .build()
            .unwrap();

        assert_eq!(built, board("r<  1\n^<   \n"));
    }

    #[test]
    fn difficulty_leaves_board_alone() {
        let hard = board("33\n22\n");
        let easy = board("1 1\n").difficulty().unwrap();
        assert!(hard.difficulty().unwrap() > easy);
        assert!(hard.bridges().is_empty());
    }

    #[test]
    fn generate_tiny() {
        let params = GenParams {
            width: 2,
            height: 2,
            density: 1.0,
            quality: Some(1),
            seed: Some(7),
            ..GenParams::default()
        };

        let board = generator::generate(params).unwrap();
        assert_eq!(board.island_count(), 1);
    }

    #[test]
    fn generate_unique() {
        let params = GenParams {
            width: 7,
            height: 7,
            density: 0.4,
            quality: Some(40),
            seed: Some(3),
            ..GenParams::default()
        };

        let mut board = generator::generate(params).unwrap();
        assert!(board.island_count() > 1);

        let mut solver = Solver::default();
        solver.solve(&mut board).unwrap();
        assert!(board.finished());
        assert_eq!(solver.solve_another(&mut board), Err(SolverFailure::Inconsistent));
    }

    #[test]
    fn generate_invalid_dims() {
        let params = GenParams { width: 0, ..GenParams::default() };
        assert_eq!(generator::generate(params).unwrap_err(), GenerateError::InvalidDimensions { width: 0, height: 10 });

        let params = GenParams { height: 101, ..GenParams::default() };
        assert!(matches!(generator::Generator::start(params), Err(GenerateError::InvalidDimensions { .. })));
    }

    #[test]
    fn generate_cancel() {
        let seen = Arc::new(AtomicU64::new(0));
        let params = GenParams {
            width: 6,
            height: 6,
            quality: None,
            seed: Some(11),
            ..GenParams::default()
        }.with_progress({
            let seen = Arc::clone(&seen);
            move |finished| {
                seen.fetch_max(finished, Ordering::Relaxed);
                finished < 3
            }
        });

        match generator::generate(params) {
            Ok(_) | Err(GenerateError::Cancelled) => {}
            Err(err) => panic!("unexpected {err}"),
        }
        assert!(seen.load(Ordering::Relaxed) >= 3);
    }

    #[test]
    fn generate_survives_worker_panic() {
        let params = GenParams {
            width: 6,
            height: 6,
            quality: Some(4),
            seed: Some(2),
            ..GenParams::default()
        }.with_progress(|finished| {
            if finished == 1 {
                panic!("progress callback failed");
            }
            true
        });

        // the only worker dies after its first candidate; finishing must not wait on it forever
        match generator::generate(params) {
            Ok(_) | Err(GenerateError::Exhausted) => {}
            Err(err) => panic!("unexpected {err}"),
        }
    }

    #[test]
    fn castle_candidate_solves() {
        let params = GenParams {
            width: 20,
            height: 20,
            density: 0.4,
            use_large: true,
            use_reef: true,
            use_castle: true,
            ..GenParams::default()
        };
        let mut board = generator::candidate(&params, 0).unwrap();
        let mut solver = Solver::default();

        // grown from a solution, so never inconsistent
        match solver.solve(&mut board) {
            Ok(_) => assert!(board.finished()),
            Err(failure) => assert_eq!(failure, SolverFailure::DepthExhausted),
        }
        if board.finished() && solver.solve_another(&mut board).is_ok() {
            assert!(board.finished());
        }
    }

    #[test]
    fn isolation_forces_bridge_between_loops() {
        // two rings of islands joined only by the run from (2, 0) to (6, 0); local counting decides nothing here
        let board = board("2 3   3 2\n         \n2 2 # 2 2\n");
        let layer = open_layer(&board);

        assert_eq!(isolation::forced_links(&board, &layer), Some(vec![(Location(2, 0), Direction::Right)]));

        let mut board = board;
        board.solve().unwrap();
        assert_eq!(board.bridge_count(Location(2, 0), Direction::Right), 1);
    }

    #[test]
    fn isolation_forces_path_to_castle() {
        let board = board("r< 2 2\n^<    \n");
        let layer = open_layer(&board);

        let mut forced = isolation::forced_links(&board, &layer).unwrap();
        forced.sort();
        assert_eq!(forced, vec![(Location(1, 0), Direction::Right), (Location(3, 0), Direction::Right)]);

        // an island with no way to any castle
        let stranded = self::board("r<   \n^<   \n    2\n     \n    2\n");
        assert_eq!(isolation::forced_links(&stranded, &open_layer(&stranded)), None);
    }

    #[test]
    fn candidate_deterministic() {
        let params = GenParams { use_large: true, use_reef: true, density: 0.5, ..GenParams::default() };
        assert_eq!(generator::candidate(&params, 42).unwrap(), generator::candidate(&params, 42).unwrap());
    }

    fn params() -> impl Strategy<Value = GenParams> {
        (2usize..8, 2usize..8, 0.1f64..0.9, any::<[bool; 4]>()).prop_map(|(width, height, density, flags)| GenParams {
            width,
            height,
            density,
            allow_dense: flags[0],
            use_reef: flags[1],
            use_large: flags[2],
            use_castle: flags[3],
            ..GenParams::default()
        })
    }

    proptest! {
        #[test]
        fn candidates_round_trip(params in params(), seed in any::<u64>()) {
            let board = generator::candidate(&params, seed).unwrap();
            let text = board.serialize();
            prop_assert_eq!(text.parse::<Board>().unwrap(), board);
            prop_assert_eq!(text.lines().count(), params.height);
        }

        #[test]
        fn candidates_solve_soundly(params in params(), seed in any::<u64>()) {
            // every candidate is grown around a solution
            let mut board = generator::candidate(&params, seed).unwrap();
            match board.solve() {
                Ok(_) => {
                    prop_assert!(board.finished());
                    for (ends, count) in board.bridges() {
                        prop_assert!(count == 1 || count == 2);
                        prop_assert_ne!(board.root(ends.0), board.root(ends.1));
                    }
                }
                Err(failure) => prop_assert_eq!(failure, SolverFailure::DepthExhausted),
            }
        }
    }
}
