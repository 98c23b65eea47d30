//! Grid scoring: exact match and partial pixel correctness.

use std::fmt;

use tracing::warn;

use crate::grid::Grid;

/// Height and width of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub height: usize,
    pub width: usize,
}

impl Dimensions {
    pub fn of(grid: &Grid) -> Self {
        Self {
            height: grid.height(),
            width: grid.width(),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

/// True iff both grids have the same shape and every cell matches.
pub fn exact_match(a: &Grid, b: &Grid) -> bool {
    a == b
}

/// Fraction of cells where `output` agrees with `ground_truth`.
///
/// A shape mismatch is a hard penalty: the score is 0, not an error.
pub fn pixel_correctness(output: &Grid, ground_truth: &Grid) -> f64 {
    if let Some(note) = mismatch_note(output, ground_truth) {
        warn!(%note, "Grid dimensions mismatch while measuring pixel correctness");
        return 0.0;
    }

    let matches = output
        .cells()
        .zip(ground_truth.cells())
        .filter(|(a, b)| a == b)
        .count();

    matches as f64 / output.area() as f64
}

/// Describe a shape mismatch, or `None` when the shapes agree.
pub fn mismatch_note(output: &Grid, expected: &Grid) -> Option<String> {
    let got = Dimensions::of(output);
    let want = Dimensions::of(expected);
    (got != want).then(|| format!("output is {got} but expected {want}"))
}
