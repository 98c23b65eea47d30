//! Task: training pairs plus the single held-out test pair.
//!
//! Task files use the usual ARC layout:
//!
//! ```json
//! { "train": [{"input": [[0]], "output": [[1]]}], "test": [{"input": [[1]], "output": [[0]]}] }
//! ```
//!
//! A [`Task`] carries exactly one test pair. Files with several test inputs are
//! split into one task per test pair by [`Task::split_json`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::grid::Grid;

/// An input grid and the output the hidden rule maps it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub input: Grid,
    pub output: Grid,
}

impl Pair {
    pub fn new(input: Grid, output: Grid) -> Self {
        Self { input, output }
    }
}

/// On-disk shape of a task description.
#[derive(Debug, Deserialize)]
struct TaskFile {
    train: Vec<Pair>,
    test: Vec<Pair>,
}

/// An immutable puzzle: ordered training pairs and one test pair.
///
/// The test output is never shown to the model; it is only used to decide
/// whether a candidate solved the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    train: Vec<Pair>,
    test: Pair,
}

impl Task {
    /// Create a task. At least one training pair is required.
    pub fn new(train: Vec<Pair>, test: Pair) -> Result<Self, TaskError> {
        if train.is_empty() {
            return Err(TaskError::NoTrainingPairs);
        }
        Ok(Self { train, test })
    }

    /// Decode a task with exactly one test pair.
    pub fn from_json(json: &str) -> Result<Self, TaskError> {
        let file: TaskFile = serde_json::from_str(json)?;
        if file.test.len() != 1 {
            return Err(TaskError::TestCount(file.test.len()));
        }
        let test = file.test.into_iter().next().ok_or(TaskError::TestCount(0))?;
        Self::new(file.train, test)
    }

    /// Decode a task file into one task per test pair, in file order.
    pub fn split_json(json: &str) -> Result<Vec<Self>, TaskError> {
        let file: TaskFile = serde_json::from_str(json)?;
        if file.test.is_empty() {
            return Err(TaskError::TestCount(0));
        }
        if file.train.is_empty() {
            return Err(TaskError::NoTrainingPairs);
        }

        Ok(file
            .test
            .into_iter()
            .map(|test| Self {
                train: file.train.clone(),
                test,
            })
            .collect())
    }

    /// Read and decode a single-test task file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TaskError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TaskError::io(path, e))?;
        Self::from_json(&json)
    }

    /// Load every `*.json` file in `dir`, sorted by file name.
    ///
    /// Each returned id is the file stem; files with several test pairs yield
    /// `stem#0`, `stem#1`, ...
    pub fn load_all(dir: impl AsRef<Path>) -> Result<Vec<(String, Self)>, TaskError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| TaskError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut tasks = Vec::new();
        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("task")
                .to_string();
            let json = std::fs::read_to_string(&path).map_err(|e| TaskError::io(&path, e))?;
            let split = Self::split_json(&json)?;
            if split.len() == 1 {
                tasks.extend(split.into_iter().map(|t| (stem.clone(), t)));
            } else {
                tasks.extend(
                    split
                        .into_iter()
                        .enumerate()
                        .map(|(i, t)| (format!("{stem}#{i}"), t)),
                );
            }
        }

        Ok(tasks)
    }

    pub fn train(&self) -> &[Pair] {
        &self.train
    }

    pub fn test_input(&self) -> &Grid {
        &self.test.input
    }

    pub fn test_output(&self) -> &Grid {
        &self.test.output
    }
}
