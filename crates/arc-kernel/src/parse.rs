//! Response parsing: pull a candidate answer out of free-form model text.
//!
//! A response answers in one of two modalities:
//! - **grid**: a literal grid between `<output>` and `</output>`
//! - **code**: a fenced ```` ```python ```` block defining the transformation
//!
//! Grid takes precedence. When `<output>` appears anywhere, the response is a
//! grid answer and the code path is never tried, even if a fence is present.
//!
//! Grid literals are parsed as data only. Nothing in the `<output>` region is
//! ever executed; names, calls and arithmetic are rejected.

use regex::Regex;

use crate::error::ParseError;
use crate::grid::Grid;

pub const CODE_FENCE_OPEN: &str = "```python";
pub const CODE_FENCE_CLOSE: &str = "```";
pub const OUTPUT_OPEN: &str = "<output>";
pub const OUTPUT_CLOSE: &str = "</output>";
pub const REASONING_OPEN: &str = "<reasoning>";

/// Which answer form a response uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Code,
    Grid,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code => write!(f, "code"),
            Self::Grid => write!(f, "grid"),
        }
    }
}

/// A candidate answer extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Source text of the transformation routine
    Code(String),
    /// A directly predicted test output
    Grid(Grid),
}

impl Candidate {
    pub fn modality(&self) -> Modality {
        match self {
            Self::Code(_) => Modality::Code,
            Self::Grid(_) => Modality::Grid,
        }
    }
}

/// Detect the modality a response declares, if any.
pub fn detect_modality(response: &str) -> Option<Modality> {
    if response.contains(OUTPUT_OPEN) {
        Some(Modality::Grid)
    } else if response.contains(CODE_FENCE_OPEN) {
        Some(Modality::Code)
    } else {
        None
    }
}

/// Extract the candidate answer, honouring grid-over-code precedence.
///
/// A response with neither marker is treated as a code answer whose block is
/// missing, so it fails with [`ParseError::CodeBlockNotFound`].
pub fn parse_candidate(response: &str) -> Result<Candidate, ParseError> {
    match detect_modality(response) {
        Some(Modality::Grid) => extract_output_grid(response).map(Candidate::Grid),
        Some(Modality::Code) | None => extract_program(response).map(Candidate::Code),
    }
}

/// Extract the source between the last ```` ```python ```` and the next fence.
///
/// Anchoring on the last opener skips code echoed from earlier turns.
pub fn extract_program(response: &str) -> Result<String, ParseError> {
    let start = response
        .rfind(CODE_FENCE_OPEN)
        .ok_or(ParseError::CodeBlockNotFound)?;
    let body_start = start + CODE_FENCE_OPEN.len();
    let body_len = response[body_start..]
        .find(CODE_FENCE_CLOSE)
        .ok_or(ParseError::CodeBlockNotFound)?;

    Ok(response[body_start..body_start + body_len].trim().to_string())
}

/// Extract and parse the grid between the first `<output>` and the next `</output>`.
pub fn extract_output_grid(response: &str) -> Result<Grid, ParseError> {
    let start = response
        .find(OUTPUT_OPEN)
        .ok_or(ParseError::MissingTag { tag: OUTPUT_OPEN })?;
    let body_start = start + OUTPUT_OPEN.len();
    let body_len = response[body_start..]
        .find(OUTPUT_CLOSE)
        .ok_or(ParseError::MissingTag { tag: OUTPUT_CLOSE })?;

    parse_grid_literal(response[body_start..body_start + body_len].trim())
}

/// Parse a nested-list literal such as `[[0, 1], [1, 0]]` into a grid.
///
/// Only lists or tuples of integer literals are accepted. Tuples are read as
/// lists, and trailing commas inside a sequence are tolerated.
pub fn parse_grid_literal(text: &str) -> Result<Grid, ParseError> {
    let trailing_commas =
        Regex::new(r",\s*\]").map_err(|e| ParseError::Literal(e.to_string()))?;
    let bracketed = text.trim().replace('(', "[").replace(')', "]");
    let normalized = trailing_commas.replace_all(&bracketed, "]");

    let rows: Vec<Vec<i64>> =
        serde_json::from_str(&normalized).map_err(|e| ParseError::Literal(e.to_string()))?;

    Ok(Grid::try_from(rows)?)
}

/// The part of a response worth replaying as "previous answer" context.
///
/// Returns everything from the first `<reasoning>` tag onwards, or the whole
/// response when the tag is absent.
pub fn reasoning_section(response: &str) -> &str {
    match response.find(REASONING_OPEN) {
        Some(start) => &response[start..],
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;

    #[test]
    fn test_detect_modality() {
        assert_eq!(detect_modality("<output>[[1]]</output>"), Some(Modality::Grid));
        assert_eq!(
            detect_modality("```python\ndef transform(g): return g\n```"),
            Some(Modality::Code)
        );
        assert_eq!(detect_modality("I am not sure."), None);
        assert_eq!(detect_modality(""), None);
    }

    #[test]
    fn test_grid_takes_precedence_over_code() {
        let response = "```python\ndef transform(g):\n    return g\n```\n<output>[[3]]</output>";
        assert_eq!(detect_modality(response), Some(Modality::Grid));
        let candidate = parse_candidate(response).unwrap();
        assert_eq!(candidate, Candidate::Grid(Grid::new(vec![vec![3]]).unwrap()));
        assert_eq!(candidate.modality(), Modality::Grid);
    }

    #[test]
    fn test_extract_program_uses_last_fence() {
        let response = "Previously:\n```python\ndef transform(g):\n    return None\n```\n\
                        Revised:\n```python\ndef transform(g):\n    return g\n```\ntrailing";
        let code = extract_program(response).unwrap();
        assert_eq!(code, "def transform(g):\n    return g");
    }

    #[test]
    fn test_extract_program_missing_close() {
        let response = "```python\ndef transform(g):\n    return g\n";
        assert_eq!(extract_program(response), Err(ParseError::CodeBlockNotFound));
    }

    #[test]
    fn test_extract_program_missing_fence() {
        assert_eq!(
            extract_program("def transform(g): return g"),
            Err(ParseError::CodeBlockNotFound)
        );
        assert_eq!(parse_candidate(""), Err(ParseError::CodeBlockNotFound));
    }

    #[test]
    fn test_extract_output_grid() {
        let response = "<reasoning>mirror</reasoning>\n<output>\n[[1, 0],\n[0, 1]]\n</output>";
        let grid = extract_output_grid(response).unwrap();
        assert_eq!(grid.rows(), &[vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn test_extract_output_grid_missing_close() {
        assert_eq!(
            extract_output_grid("<output>[[1]]"),
            Err(ParseError::MissingTag { tag: OUTPUT_CLOSE })
        );
        assert_eq!(
            extract_output_grid("[[1]]</output>"),
            Err(ParseError::MissingTag { tag: OUTPUT_OPEN })
        );
    }

    #[test]
    fn test_close_tag_before_open_is_missing() {
        assert_eq!(
            extract_output_grid("</output> oops <output>[[1]]"),
            Err(ParseError::MissingTag { tag: OUTPUT_CLOSE })
        );
    }

    #[test]
    fn test_literal_round_trip() {
        let grid = Grid::new(vec![vec![0, 1, 2], vec![9, 8, 7]]).unwrap();
        let response = format!("{OUTPUT_OPEN}{}{OUTPUT_CLOSE}", grid.to_literal());
        assert_eq!(extract_output_grid(&response).unwrap(), grid);
    }

    #[test]
    fn test_literal_tolerates_trailing_commas() {
        let grid = parse_grid_literal("[[1, 2,], [3, 4],\n]").unwrap();
        assert_eq!(grid.rows(), &[vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_literal_accepts_tuples() {
        let grid = parse_grid_literal("((1, 2), (3, 4))").unwrap();
        assert_eq!(grid.rows(), &[vec![1, 2], vec![3, 4]]);

        let grid = parse_grid_literal("[(5,), (6,)]").unwrap();
        assert_eq!(grid.rows(), &[vec![5], vec![6]]);
    }

    #[test]
    fn test_literal_rejects_expressions() {
        for text in [
            "__import__('os').system('true')",
            "[[1 + 1]]",
            "[[len([])]]",
            "[list(range(3))]",
            "[['a']]",
            "[[1.5]]",
        ] {
            assert!(
                matches!(parse_grid_literal(text), Err(ParseError::Literal(_))),
                "accepted {text}"
            );
        }
    }

    #[test]
    fn test_literal_rejects_malformed_grid() {
        assert_eq!(
            parse_grid_literal("[[1, 2], [3]]"),
            Err(ParseError::MalformedGrid(GridError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            }))
        );
        assert!(matches!(
            parse_grid_literal("[[10]]"),
            Err(ParseError::MalformedGrid(GridError::CellOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_reasoning_section() {
        assert_eq!(
            reasoning_section("preamble <reasoning>why</reasoning> answer"),
            "<reasoning>why</reasoning> answer"
        );
        assert_eq!(reasoning_section("no tags here"), "no tags here");
    }
}
