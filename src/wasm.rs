//! Bindings for a browser front end.

use wasm_bindgen::prelude::*;

use crate::board::Board;
use crate::solver::{Solver, SolverFailure};

fn parse(text: &str) -> Result<Board, JsValue> {
    text.parse::<Board>().map_err(|err| js_sys::Error::new(&err.to_string()).into())
}

/// Solve the board in `text`, returning its solution string.
#[wasm_bindgen]
pub fn solve_text(text: &str) -> Result<String, JsValue> {
    let mut board = parse(text)?;
    board.solve().map_err(|failure| JsValue::from(js_sys::Error::new(&failure.to_string())))?;
    Ok(board.solution())
}

/// Whether the board in `text` has exactly one solution. Unsolvable boards are an error.
#[wasm_bindgen]
pub fn is_unique(text: &str) -> Result<bool, JsValue> {
    let mut board = parse(text)?;
    let mut solver = Solver::default();
    solver.solve(&mut board).map_err(|failure| JsValue::from(js_sys::Error::new(&failure.to_string())))?;

    match solver.solve_another(&mut board) {
        Ok(_) => Ok(false),
        Err(SolverFailure::Inconsistent) => Ok(true),
        Err(failure) => Err(js_sys::Error::new(&failure.to_string()).into()),
    }
}
