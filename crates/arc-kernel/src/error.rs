//! Error taxonomy for grids, tasks, response parsing and sandboxed execution.
//!
//! Everything below the search drivers resolves to one of these types and is
//! then folded into a [`Verdict`](crate::evaluator::Verdict); only
//! [`TaskError`] is allowed to travel further up.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A grid that violates the rectangular, non-empty, `0..=9` invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid has no rows")]
    Empty,

    #[error("row {row} has no cells")]
    EmptyRow { row: usize },

    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("cell ({row}, {col}) holds {value}, expected a colour in 0..=9")]
    CellOutOfRange { row: usize, col: usize, value: i64 },
}

/// A task description that cannot be used. Fatal for the run.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to decode task JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error while reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task has no training pairs")]
    NoTrainingPairs,

    #[error("task has {0} test pairs, expected exactly one")]
    TestCount(usize),

    #[error("malformed grid in task: {0}")]
    Grid(#[from] GridError),
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A model response that does not contain a usable candidate answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no {tag} tag found in response")]
    MissingTag { tag: &'static str },

    #[error("could not parse grid literal: {0}")]
    Literal(String),

    #[error("grid literal is not a valid grid: {0}")]
    MalformedGrid(#[from] GridError),

    #[error("could not find Python code between triple backticks")]
    CodeBlockNotFound,
}

/// Failure to load or run a candidate transformation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("{0}")]
    Load(String),

    #[error("{0}")]
    Execution(String),

    #[error("transform exceeded its time budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("transform returned an invalid grid: {0}")]
    InvalidOutput(String),

    #[error("interpreter failure: {0}")]
    Interpreter(String),
}

impl SandboxError {
    /// True for failures raised by the candidate's own code while running.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Self::Execution(_) | Self::Timeout { .. } | Self::InvalidOutput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_failure_grouping() {
        assert!(SandboxError::Execution("boom".into()).is_execution_failure());
        assert!(SandboxError::Timeout {
            budget: Duration::from_secs(1)
        }
        .is_execution_failure());
        assert!(SandboxError::InvalidOutput("None".into()).is_execution_failure());
        assert!(!SandboxError::Load("missing".into()).is_execution_failure());
        assert!(!SandboxError::Interpreter("spawn".into()).is_execution_failure());
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = GridError::Ragged {
            row: 2,
            expected: 3,
            found: 1,
        };
        assert_eq!(err.to_string(), "row 2 has 1 cells, expected 3");

        let err = ParseError::MissingTag { tag: "</output>" };
        assert_eq!(err.to_string(), "no </output> tag found in response");
    }
}
