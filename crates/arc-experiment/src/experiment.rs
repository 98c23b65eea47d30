//! Search drivers for ARC tasks.
//!
//! Each driver runs a bounded loop of prompt → query → evaluate:
//! 1. Hybrid: a single revision chain; every round feeds the last evaluated
//!    answer (code or grid) back into the next prompt
//! 2. Evolutionary: generations of code candidates; the best survivors'
//!    code and per-example results seed the next generation
//! 3. Evolutionary transduction: the same population mechanics with direct
//!    grid predictions, carrying the survivors' full responses forward
//!
//! Every run ends either solved or with its round budget exhausted.
//! Candidate failures are absorbed into scores and reports, never raised.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use arc_kernel::parse::detect_modality;
use arc_kernel::{Evaluator, Sandbox, Task};

use crate::chat_client::{ChatMessage, ChatModel};
use crate::config::SearchConfig;
use crate::population::{select_survivors, GenerationStats, PopulationEntry};
use crate::prompts::{
    conversation, evolutionary_feedback, hybrid_prompt, initial_prompt, system_prompt,
    transduction_feedback, Attempt,
};
use crate::results::{RoundMetrics, TaskResult};
use crate::sampling::{SamplingBand, SamplingConfig};
use crate::transcript::Transcript;

/// Configuration for the experiment runner.
#[derive(Debug, Clone, Default)]
pub struct ExperimentRunnerConfig {
    /// Round bounds, population shape and query concurrency
    pub search: SearchConfig,
    /// Sampling used for every query unless sampling is diversified
    pub sampling: SamplingConfig,
}

/// Search strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Population search over transformation programs
    Evolutionary,
    /// Single-chain revision accepting either answer modality
    Hybrid,
    /// Population search over directly predicted grids
    EvolutionaryTransduction,
}

impl Strategy {
    /// Get all strategies.
    pub fn all() -> Vec<Self> {
        vec![Self::Evolutionary, Self::Hybrid, Self::EvolutionaryTransduction]
    }

    /// Get the name of this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evolutionary => "evolutionary",
            Self::Hybrid => "hybrid",
            Self::EvolutionaryTransduction => "evolutionary_transduction",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "evolutionary" | "evo" => Ok(Self::Evolutionary),
            "hybrid" => Ok(Self::Hybrid),
            "et" | "transduction" | "evolutionary_transduction" | "evolutionary-transduction" => {
                Ok(Self::EvolutionaryTransduction)
            }
            _ => anyhow::bail!(
                "Unknown strategy: {}. Valid: evolutionary, hybrid, evolutionary_transduction",
                s
            ),
        }
    }
}

/// How a search loop ended.
#[derive(Debug)]
struct SearchOutcome {
    solved: bool,
    rounds: usize,
    queries: usize,
    round_metrics: Vec<RoundMetrics>,
}

/// The experiment runner.
pub struct ExperimentRunner {
    config: ExperimentRunnerConfig,
    model: Arc<dyn ChatModel>,
    evaluator: Evaluator,
}

impl ExperimentRunner {
    /// Create a new experiment runner.
    pub fn new(
        config: ExperimentRunnerConfig,
        model: Arc<dyn ChatModel>,
        sandbox: Arc<dyn Sandbox>,
    ) -> Self {
        Self {
            config,
            model,
            evaluator: Evaluator::new(sandbox),
        }
    }

    pub fn config(&self) -> &ExperimentRunnerConfig {
        &self.config
    }

    /// Run one strategy on one task until it is solved or out of rounds.
    pub async fn run(
        &self,
        strategy: Strategy,
        task_id: &str,
        task: &Task,
        transcript: &mut Transcript,
    ) -> Result<TaskResult> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        info!(task = task_id, strategy = strategy.name(), "Starting task");
        transcript.section("SYSTEM PROMPT", system_prompt(strategy));

        let outcome = match strategy {
            Strategy::Hybrid => self.run_hybrid(task_id, task, transcript).await?,
            Strategy::Evolutionary | Strategy::EvolutionaryTransduction => {
                self.run_evolutionary(strategy, task_id, task, transcript)
                    .await?
            }
        };
        transcript.flush();

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            task = task_id,
            strategy = strategy.name(),
            solved = outcome.solved,
            rounds = outcome.rounds,
            queries = outcome.queries,
            duration_ms,
            "Finished task"
        );

        Ok(TaskResult {
            task_id: task_id.to_string(),
            strategy: strategy.name().to_string(),
            solved: outcome.solved,
            rounds: outcome.rounds,
            queries: outcome.queries,
            round_metrics: outcome.round_metrics,
            started_at,
            ended_at: Utc::now(),
            duration_ms,
        })
    }

    /// Population search shared by the evolutionary and transduction strategies.
    async fn run_evolutionary(
        &self,
        strategy: Strategy,
        task_id: &str,
        task: &Task,
        transcript: &mut Transcript,
    ) -> Result<SearchOutcome> {
        let search = &self.config.search;
        let base_prompt = initial_prompt(task);
        let mut survivors: Vec<PopulationEntry> = Vec::new();
        let mut round_metrics = Vec::with_capacity(search.generations);
        let mut queries = 0;

        for generation in 0..search.generations {
            transcript.section(&format!("Iteration {}", generation + 1), "");

            let prompt = if generation == 0 {
                base_prompt.clone()
            } else {
                let feedback = match strategy {
                    Strategy::EvolutionaryTransduction => transduction_feedback(&survivors),
                    _ => evolutionary_feedback(&survivors),
                };
                format!("{base_prompt}\n\n{feedback}")
            };
            transcript.section("PROMPT", &prompt);

            let messages = conversation(system_prompt(strategy), prompt);
            let responses = self
                .query_generation(&messages, search.candidates_per_generation)
                .await?;
            queries += responses.len();
            for (index, response) in responses.iter().enumerate() {
                transcript.section(&format!("RESPONSE {}", index + 1), response);
            }

            let mut entries = Vec::with_capacity(responses.len());
            for (index, response) in responses.into_iter().enumerate() {
                let verdict = self.evaluator.evaluate(&response, task).await;
                transcript.section(&format!("RESULTS {}", index + 1), &verdict.report);
                transcript.line(&format!("Score: {}", verdict.score()));

                let solved = verdict.solved;
                entries.push(PopulationEntry::new(index, response, &verdict));

                if solved {
                    info!(task = task_id, generation, candidate = index, "Task solved");
                    transcript.section("Task solved!", "");
                    round_metrics.push(generation_metrics(generation, &entries));
                    return Ok(SearchOutcome {
                        solved: true,
                        rounds: generation + 1,
                        queries,
                        round_metrics,
                    });
                }
            }

            round_metrics.push(generation_metrics(generation, &entries));
            let stats = GenerationStats::of(&entries);

            survivors = select_survivors(entries, search.survivors);
            for entry in &survivors {
                transcript.line(&format!("Top response score: {}", entry.score));
            }

            if let Some(stats) = stats {
                info!(
                    task = task_id,
                    generation,
                    best_score = stats.best_score,
                    avg_score = stats.avg_score,
                    "Generation complete"
                );
                transcript.section(
                    &format!("Average score per generation: {}", stats.avg_score),
                    "",
                );
            }
        }

        transcript.section(
            &format!("Failed to solve task in {} generations", search.generations),
            "",
        );
        Ok(SearchOutcome {
            solved: false,
            rounds: search.generations,
            queries,
            round_metrics,
        })
    }

    /// Single-chain revision. A response without any answer modality is
    /// skipped; the skipped round still counts against the bound.
    async fn run_hybrid(
        &self,
        task_id: &str,
        task: &Task,
        transcript: &mut Transcript,
    ) -> Result<SearchOutcome> {
        let max_rounds = self.config.search.hybrid_max_rounds;
        let mut previous: Option<Attempt> = None;
        let mut round_metrics = Vec::with_capacity(max_rounds);

        for round in 0..max_rounds {
            let prompt = if round == 0 {
                initial_prompt(task)
            } else {
                hybrid_prompt(task, previous.as_ref())
            };

            let messages = conversation(system_prompt(Strategy::Hybrid), prompt.as_str());
            let response = self
                .model
                .complete(&messages, &self.sampling_for(0))
                .await;

            transcript.section(&format!("Iteration {}", round + 1), "");
            transcript.section("PROMPT", &prompt);
            transcript.section("RESPONSE", &response);

            if detect_modality(&response).is_none() {
                warn!(task = task_id, round, "Response declared no answer, skipping round");
                transcript.line(&format!(
                    "Skipping iteration {} due to invalid response",
                    round + 1
                ));
                round_metrics.push(RoundMetrics {
                    round,
                    candidates_evaluated: 0,
                    skipped: 1,
                    best_score: None,
                    avg_score: None,
                });
                continue;
            }

            let verdict = self.evaluator.evaluate(&response, task).await;
            transcript.section("Evaluation Results", &verdict.report);
            transcript.line(&format!(
                "Pixel Correctness: {}",
                verdict.avg_pixel_correctness
            ));

            let score = verdict.score();
            round_metrics.push(RoundMetrics {
                round,
                candidates_evaluated: 1,
                skipped: 0,
                best_score: Some(score),
                avg_score: Some(score),
            });

            if verdict.solved {
                info!(task = task_id, round, modality = ?verdict.modality, "Task solved");
                transcript.section("Solved task!", "");
                return Ok(SearchOutcome {
                    solved: true,
                    rounds: round + 1,
                    queries: round + 1,
                    round_metrics,
                });
            }

            debug!(task = task_id, round, score, "Revising previous answer");
            previous = Some(Attempt {
                response,
                modality: verdict.modality,
                report: verdict.report,
            });
        }

        transcript.section(
            &format!("Couldn't solve task in {} tries", max_rounds),
            "",
        );
        Ok(SearchOutcome {
            solved: false,
            rounds: max_rounds,
            queries: max_rounds,
            round_metrics,
        })
    }

    /// Query `count` responses for one conversation.
    ///
    /// At most `max_concurrent_queries` requests are in flight; results come
    /// back in candidate order whatever order they complete in.
    async fn query_generation(
        &self,
        messages: &[ChatMessage],
        count: usize,
    ) -> Result<Vec<String>> {
        let permits = Semaphore::new(self.config.search.max_concurrent_queries);
        let permits = &permits;

        let queries = (0..count).map(|index| {
            let sampling = self.sampling_for(index);
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .context("Query limiter closed unexpectedly")?;
                debug!(
                    candidate = index,
                    temperature = sampling.temperature,
                    top_p = sampling.top_p,
                    "Querying model"
                );
                Ok::<_, anyhow::Error>(self.model.complete(messages, &sampling).await)
            }
        });

        join_all(queries).await.into_iter().collect()
    }

    fn sampling_for(&self, candidate: usize) -> SamplingConfig {
        if self.config.search.diversify_sampling {
            SamplingConfig::random_in_band(SamplingBand::for_candidate(candidate))
        } else {
            self.config.sampling
        }
    }
}

fn generation_metrics(round: usize, entries: &[PopulationEntry]) -> RoundMetrics {
    let stats = GenerationStats::of(entries);
    RoundMetrics {
        round,
        candidates_evaluated: entries.len(),
        skipped: 0,
        best_score: stats.map(|s| s.best_score),
        avg_score: stats.map(|s| s.avg_score),
    }
}
