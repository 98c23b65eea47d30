//! Evaluator: turn one model response into a [`Verdict`] for a task.
//!
//! Evaluation never fails. Every parse, load, and execution problem is folded
//! into an unsolved verdict with a diagnostic report, so the search drivers
//! can treat all candidates uniformly.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::grid::Grid;
use crate::error::ParseError;
use crate::parse::{detect_modality, parse_candidate, Candidate, Modality};
use crate::sandbox::Sandbox;
use crate::scoring::{exact_match, mismatch_note, pixel_correctness};
use crate::task::Task;

/// Metric value recorded when a candidate could not be scored at all.
pub const FAILURE_SENTINEL: f64 = -1.0;

/// Score of a candidate whose metrics are both [`FAILURE_SENTINEL`].
pub const FAILURE_SCORE: f64 = 2.0 * FAILURE_SENTINEL;

/// Report attached to grid answers, which have no per-example results.
pub const GRID_ANSWER_REPORT: &str = "Not applicable: the answer is a predicted grid.";

/// Outcome of evaluating one response.
///
/// `solved == true` implies the candidate's test output exactly equals the
/// expected test output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub solved: bool,
    /// Modality the response declared, if any
    pub modality: Option<Modality>,
    /// Extracted source, empty for grid answers and unparsable responses
    pub code: String,
    /// Human-readable per-example results and diagnostics
    pub report: String,
    /// Exact training matches / training pairs, or [`FAILURE_SENTINEL`]
    pub train_correctness: f64,
    /// Mean per-pair pixel correctness, or [`FAILURE_SENTINEL`]
    pub avg_pixel_correctness: f64,
}

impl Verdict {
    /// Unsolved verdict with both metrics set to the failure sentinel.
    pub fn failure(modality: Option<Modality>, code: String, report: String) -> Self {
        Self {
            solved: false,
            modality,
            code,
            report,
            train_correctness: FAILURE_SENTINEL,
            avg_pixel_correctness: FAILURE_SENTINEL,
        }
    }

    /// Ranking score: `train_correctness + avg_pixel_correctness`.
    pub fn score(&self) -> f64 {
        self.train_correctness + self.avg_pixel_correctness
    }

    /// True when the candidate was scored rather than rejected outright.
    pub fn is_scored(&self) -> bool {
        self.train_correctness != FAILURE_SENTINEL
    }
}

/// Scores responses against tasks, running code answers in a [`Sandbox`].
#[derive(Clone)]
pub struct Evaluator {
    sandbox: Arc<dyn Sandbox>,
}

impl Evaluator {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self { sandbox }
    }

    /// Evaluate `response` against `task`.
    pub async fn evaluate(&self, response: &str, task: &Task) -> Verdict {
        let modality = detect_modality(response);
        let verdict = match parse_candidate(response) {
            Ok(Candidate::Grid(grid)) => score_grid(grid, task),
            Ok(Candidate::Code(code)) => self.evaluate_code(modality, code, task).await,
            Err(e) => unparsable(modality, e),
        };

        if verdict.solved {
            info!(modality = ?verdict.modality, "Candidate solved the task");
        } else {
            debug!(
                modality = ?verdict.modality,
                train_correctness = verdict.train_correctness,
                avg_pixel_correctness = verdict.avg_pixel_correctness,
                "Candidate did not solve the task"
            );
        }
        verdict
    }

    async fn evaluate_code(
        &self,
        modality: Option<Modality>,
        code: String,
        task: &Task,
    ) -> Verdict {
        let mut transform = match self.sandbox.load(&code).await {
            Ok(transform) => transform,
            Err(e) => {
                return Verdict::failure(
                    modality,
                    code,
                    format!("\nError: Could not load the transform function with error: {e}"),
                );
            }
        };

        let mut report = String::new();
        let mut correct = 0usize;
        let mut pixel_sum = 0.0;

        for (i, pair) in task.train().iter().enumerate() {
            let example = i + 1;
            let output = match transform.apply(&pair.input).await {
                Ok(output) => output,
                Err(e) => {
                    debug!(example, error = %e, "Transform failed on training example");
                    return Verdict::failure(
                        modality,
                        code,
                        format!(
                            "\nError: Transform function failed to run on example {example} with error: {e}"
                        ),
                    );
                }
            };

            let _ = writeln!(report, "Result for example {example}:");
            if exact_match(&output, &pair.output) {
                report.push_str("✓ Transformation matches expected output!\n");
                correct += 1;
            } else {
                report.push_str("✗ Transformation does not match expected output.\n");
                write_counterexample(&mut report, &pair.input, &pair.output, &output);
            }

            pixel_sum += pixel_correctness(&output, &pair.output);
            report.push('\n');
        }

        let n = task.train().len() as f64;
        let train_correctness = correct as f64 / n;
        let avg_pixel_correctness = pixel_sum / n;

        let solved = match transform.apply(task.test_input()).await {
            Ok(output) => exact_match(&output, task.test_output()),
            Err(e) => {
                let _ = write!(
                    report,
                    "\nError: Transform function failed to run on the test input with error: {e}"
                );
                false
            }
        };

        Verdict {
            solved,
            modality,
            code,
            report,
            train_correctness,
            avg_pixel_correctness,
        }
    }
}

fn score_grid(grid: Grid, task: &Task) -> Verdict {
    let expected = task.test_output();
    let solved = exact_match(&grid, expected);
    Verdict {
        solved,
        modality: Some(Modality::Grid),
        code: String::new(),
        report: GRID_ANSWER_REPORT.to_string(),
        train_correctness: if solved { 1.0 } else { 0.0 },
        avg_pixel_correctness: pixel_correctness(&grid, expected),
    }
}

fn unparsable(modality: Option<Modality>, error: ParseError) -> Verdict {
    let report = match modality {
        Some(Modality::Grid) => {
            format!("\nError: Could not parse the output grid with error: {error}")
        }
        Some(Modality::Code) | None => format!(
            "\nError: Could not find Python code between triple backticks with error: {error}"
        ),
    };
    Verdict::failure(modality, String::new(), report)
}

fn write_counterexample(report: &mut String, input: &Grid, expected: &Grid, actual: &Grid) {
    let _ = writeln!(report, "\nInput Grid:\n{input}");
    let _ = writeln!(report, "\nExpected Output Grid:\n{expected}");
    let _ = writeln!(report, "\nIncorrect Resulting Output Grid:\n{actual}");
    if let Some(note) = mismatch_note(actual, expected) {
        let _ = writeln!(report, "\nNote: {note}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_verdict_score() {
        let verdict = Verdict::failure(None, String::new(), "boom".to_string());
        assert!(!verdict.solved);
        assert!(!verdict.is_scored());
        assert_eq!(verdict.score(), FAILURE_SCORE);
        assert_eq!(FAILURE_SCORE, -2.0);
    }

    #[test]
    fn test_counterexample_lists_all_grids() {
        let input = Grid::new(vec![vec![1, 2]]).unwrap();
        let expected = Grid::new(vec![vec![2, 1]]).unwrap();
        let actual = Grid::new(vec![vec![2], vec![1]]).unwrap();

        let mut report = String::new();
        write_counterexample(&mut report, &input, &expected, &actual);

        assert!(report.contains("Input Grid:\n[[1, 2]]"));
        assert!(report.contains("Expected Output Grid:\n[[2, 1]]"));
        assert!(report.contains("Incorrect Resulting Output Grid:\n[[2],\n[1]]"));
        assert!(report.contains("Note: output is 2x1 but expected 1x2"));
    }
}
