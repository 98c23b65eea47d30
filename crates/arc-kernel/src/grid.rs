//! Grid: the rectangular colour matrix every task, prompt and verdict is built from.
//!
//! A grid is never empty, every row has the same length, and every cell is a
//! colour in `0..=9`. The only ways in are [`Grid::new`] and the `TryFrom`
//! impls (which serde also goes through), so a `Grid` value always upholds
//! the invariant and scoring never has to guard against zero area.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Highest colour value a cell may hold.
pub const MAX_COLOR: u8 = 9;

/// A validated, rectangular grid of colours.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<i64>>", into = "Vec<Vec<u8>>")]
pub struct Grid {
    rows: Vec<Vec<u8>>,
}

impl Grid {
    /// Build a grid from rows, checking rectangularity and the colour range.
    pub fn new(rows: Vec<Vec<u8>>) -> Result<Self, GridError> {
        let width = Self::check_shape(&rows)?;
        debug_assert!(width > 0);

        for (r, row) in rows.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                if value > MAX_COLOR {
                    return Err(GridError::CellOutOfRange {
                        row: r,
                        col: c,
                        value: i64::from(value),
                    });
                }
            }
        }

        Ok(Self { rows })
    }

    fn check_shape<T>(rows: &[Vec<T>]) -> Result<usize, GridError> {
        let first = rows.first().ok_or(GridError::Empty)?;
        let width = first.len();
        if width == 0 {
            return Err(GridError::EmptyRow { row: 0 });
        }

        for (r, row) in rows.iter().enumerate().skip(1) {
            if row.is_empty() {
                return Err(GridError::EmptyRow { row: r });
            }
            if row.len() != width {
                return Err(GridError::Ragged {
                    row: r,
                    expected: width,
                    found: row.len(),
                });
            }
        }

        Ok(width)
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    /// Total number of cells (always > 0).
    pub fn area(&self) -> usize {
        self.height() * self.width()
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<u8> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Iterate over all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = u8> + '_ {
        self.rows.iter().flat_map(|row| row.iter().copied())
    }

    /// Format a single row as `[a, b, c]`.
    pub fn format_row(row: &[u8]) -> String {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        format!("[{}]", cells.join(", "))
    }

    /// Render the grid as a nested-list literal, one row per line:
    ///
    /// ```text
    /// [[0, 1],
    /// [1, 0]]
    /// ```
    ///
    /// The output is accepted by [`parse_grid_literal`](crate::parse::parse_grid_literal).
    pub fn to_literal(&self) -> String {
        let rows: Vec<String> = self.rows.iter().map(|row| Self::format_row(row)).collect();
        format!("[{}]", rows.join(",\n"))
    }
}

impl TryFrom<Vec<Vec<u8>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl TryFrom<Vec<Vec<i64>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<i64>>) -> Result<Self, Self::Error> {
        Self::check_shape(&rows)?;

        let mut converted = Vec::with_capacity(rows.len());
        for (r, row) in rows.into_iter().enumerate() {
            let mut out = Vec::with_capacity(row.len());
            for (c, value) in row.into_iter().enumerate() {
                match u8::try_from(value) {
                    Ok(v) if v <= MAX_COLOR => out.push(v),
                    _ => {
                        return Err(GridError::CellOutOfRange {
                            row: r,
                            col: c,
                            value,
                        })
                    }
                }
            }
            converted.push(out);
        }

        Ok(Self { rows: converted })
    }
}

impl From<Grid> for Vec<Vec<u8>> {
    fn from(grid: Grid) -> Self {
        grid.rows
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grid {
        Grid::new(vec![vec![0, 1, 2], vec![3, 4, 5]]).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let grid = sample();
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.area(), 6);
        assert_eq!(grid.cell(1, 2), Some(5));
        assert_eq!(grid.cell(2, 0), None);
        assert_eq!(grid.cells().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(Grid::new(vec![]), Err(GridError::Empty));
        assert_eq!(Grid::new(vec![vec![]]), Err(GridError::EmptyRow { row: 0 }));
    }

    #[test]
    fn test_rejects_ragged() {
        let err = Grid::new(vec![vec![1, 2], vec![3]]).unwrap_err();
        assert_eq!(
            err,
            GridError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = Grid::new(vec![vec![1, 10]]).unwrap_err();
        assert_eq!(
            err,
            GridError::CellOutOfRange {
                row: 0,
                col: 1,
                value: 10
            }
        );

        let err = Grid::try_from(vec![vec![-1_i64]]).unwrap_err();
        assert!(matches!(err, GridError::CellOutOfRange { value: -1, .. }));
    }

    #[test]
    fn test_literal_format() {
        assert_eq!(sample().to_literal(), "[[0, 1, 2],\n[3, 4, 5]]");
        assert_eq!(Grid::format_row(&[7]), "[7]");
    }

    #[test]
    fn test_serde_validates() {
        let grid: Grid = serde_json::from_str("[[1, 2], [3, 4]]").unwrap();
        assert_eq!(grid.rows(), &[vec![1, 2], vec![3, 4]]);
        assert_eq!(serde_json::to_string(&grid).unwrap(), "[[1,2],[3,4]]");

        assert!(serde_json::from_str::<Grid>("[[1, 2], [3]]").is_err());
        assert!(serde_json::from_str::<Grid>("[[12]]").is_err());
        assert!(serde_json::from_str::<Grid>("[]").is_err());
    }
}
