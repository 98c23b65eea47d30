//! ARC Kernel: Scoring, Parsing and Sandboxed Evaluation of Candidate Answers
//!
//! This crate turns a free-form model response into a verdict for a grid
//! puzzle. Responses either predict the test output directly or supply a
//! transformation routine, which is run in an isolated interpreter against
//! every training pair before it is trusted with the test input.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod grid;
pub mod parse;
pub mod sandbox;
pub mod scoring;
pub mod task;

pub use config::SandboxConfig;
pub use error::{GridError, ParseError, SandboxError, TaskError};
pub use evaluator::{Evaluator, Verdict, FAILURE_SCORE, FAILURE_SENTINEL};
pub use grid::Grid;
pub use parse::{Candidate, Modality};
pub use sandbox::{PythonSandbox, Sandbox, Transform};
pub use scoring::{exact_match, pixel_correctness};
pub use task::{Pair, Task};
