//! Results collection and output for ARC search runs.
//!
//! Captures metrics like:
//! - Rounds (generations or revision steps) until solved or exhausted
//! - Model queries spent per task
//! - Best and average candidate score per round
//! - Solve rate with standard error and 95% confidence interval

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metrics for a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    /// Zero-based round (generation) number
    pub round: usize,
    /// Candidates evaluated this round (fewer than sampled when one solved early)
    pub candidates_evaluated: usize,
    /// Responses skipped for declaring no answer modality (hybrid only)
    pub skipped: usize,
    /// Best score seen this round, if anything was evaluated
    pub best_score: Option<f64>,
    /// Average score of the evaluated candidates
    pub avg_score: Option<f64>,
}

/// Outcome of running one strategy on one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub strategy: String,
    pub solved: bool,
    /// Rounds executed, including the solving round
    pub rounds: usize,
    /// Model queries issued
    pub queries: usize,
    pub round_metrics: Vec<RoundMetrics>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Summary statistics over all tasks of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub solved: usize,
    pub solve_rate: f64,
    /// Standard error of solve rate: sqrt(p(1-p)/n)
    pub solve_rate_se: f64,
    /// 95% confidence interval for solve rate: (lower, upper)
    pub solve_rate_ci: (f64, f64),
    pub avg_rounds: f64,
    pub avg_queries: f64,
}

/// All task results of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    pub run_id: Uuid,
    pub strategy: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub results: Vec<TaskResult>,
    pub summary: Option<RunSummary>,
}

impl RunResults {
    pub fn new(strategy: &str, model: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            strategy: strategy.to_string(),
            model: model.to_string(),
            started_at: Utc::now(),
            results: Vec::new(),
            summary: None,
        }
    }

    pub fn add(&mut self, result: TaskResult) {
        self.results.push(result);
    }

    pub fn solved_count(&self) -> usize {
        self.results.iter().filter(|r| r.solved).count()
    }

    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// Compute summary statistics.
    pub fn compute_summary(&mut self) {
        let attempted = self.attempted();
        if attempted == 0 {
            self.summary = None;
            return;
        }

        let n = attempted as f64;
        let solved = self.solved_count();
        let solve_rate = solved as f64 / n;

        // Standard error for proportion: SE = sqrt(p(1-p)/n)
        let solve_rate_se = if attempted > 1 {
            (solve_rate * (1.0 - solve_rate) / n).sqrt()
        } else {
            0.0
        };

        // 95% CI: p ± 1.96 * SE, clamped to [0, 1]
        let z = 1.96;
        let solve_rate_ci = (
            (solve_rate - z * solve_rate_se).max(0.0),
            (solve_rate + z * solve_rate_se).min(1.0),
        );

        let avg_rounds = self.results.iter().map(|r| r.rounds as f64).sum::<f64>() / n;
        let avg_queries = self.results.iter().map(|r| r.queries as f64).sum::<f64>() / n;

        self.summary = Some(RunSummary {
            attempted,
            solved,
            solve_rate,
            solve_rate_se,
            solve_rate_ci,
            avg_rounds,
            avg_queries,
        });
    }

    /// Save results to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read results from {}", path.display()))?;
        let results = serde_json::from_str(&json)?;
        Ok(results)
    }
}

/// Format a duration in milliseconds for display.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{:.1}m", ms as f64 / 60_000.0)
    }
}
