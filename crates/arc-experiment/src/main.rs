//! ARC Experiment CLI.
//!
//! Commands:
//! - run: Run one search strategy over every task in a directory
//! - evaluate: Score a saved model response against a task offline
//! - health: Check that the model server is reachable

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use arc_experiment::chat_client::ChatClient;
use arc_experiment::config::RunConfig;
use arc_experiment::experiment::{ExperimentRunner, ExperimentRunnerConfig, Strategy};
use arc_experiment::results::{format_duration, RunResults};
use arc_experiment::transcript::Transcript;
use arc_kernel::{Evaluator, PythonSandbox, Task};

/// Generate a timestamped output path from the given path.
/// e.g., "results.json" -> "results-20260108-010530.json"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[derive(Parser)]
#[command(name = "arc-experiment")]
#[command(version)]
#[command(about = "LLM-driven search over ARC grid tasks")]
struct Cli {
    /// OpenAI-compatible API base URL, including the version prefix
    #[arg(long = "api-base", env = "OPENAI_BASE_URL")]
    api_base: Option<String>,

    /// API key sent as a bearer token
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name (overrides the config file)
    #[arg(long)]
    model: Option<String>,

    /// TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a strategy over every task in a directory
    Run {
        /// Strategy to use. Valid: evolutionary, hybrid, et
        #[arg(long, default_value = "evolutionary")]
        strategy: String,

        /// Directory of task JSON files
        #[arg(long, default_value = "sample_data")]
        tasks: PathBuf,

        /// Directory that receives one transcript folder per run
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,

        /// Output file for results
        #[arg(long, default_value = "results.json")]
        output: PathBuf,

        /// Maximum concurrent model queries within a generation
        #[arg(long)]
        max_concurrent: Option<usize>,
    },

    /// Evaluate a saved response against a task
    Evaluate {
        /// Task JSON file with a single test pair
        #[arg(long)]
        task: PathBuf,

        /// File holding the raw model response
        #[arg(long)]
        response: PathBuf,
    },

    /// Check that the model server is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(api_base) = &cli.api_base {
        config.model.api_base = api_base.clone();
    }
    if let Some(model) = &cli.model {
        config.model.model = model.clone();
    }
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| config.model.api_key_from_env());

    match cli.command {
        Commands::Run {
            strategy,
            tasks,
            log_dir,
            output,
            max_concurrent,
        } => {
            let strategy: Strategy = strategy.parse()?;
            if let Some(n) = max_concurrent {
                config.search.max_concurrent_queries = n;
            }
            config.validate()?;

            let tasks = Task::load_all(&tasks)
                .with_context(|| format!("Failed to load tasks from {}", tasks.display()))?;

            let run_dir = log_dir.join(format!(
                "{}-{}",
                strategy.name(),
                Local::now().format("%Y%m%d-%H%M%S")
            ));
            std::fs::create_dir_all(&run_dir)
                .with_context(|| format!("Failed to create {}", run_dir.display()))?;

            info!(
                strategy = strategy.name(),
                model = %config.model.model,
                tasks = tasks.len(),
                logs = %run_dir.display(),
                "Starting run"
            );

            let sandbox = PythonSandbox::new(config.sandbox.clone());
            if !sandbox.is_available().await {
                warn!(
                    python = %config.sandbox.python_command,
                    "Python interpreter not found; code answers will fail to load"
                );
            }

            let client = ChatClient::from_config(&config.model, api_key)?;
            let runner = ExperimentRunner::new(
                ExperimentRunnerConfig {
                    search: config.search.clone(),
                    sampling: config.model.sampling(),
                },
                Arc::new(client),
                Arc::new(sandbox),
            );

            let mut results = RunResults::new(strategy.name(), &config.model.model);
            let total = tasks.len();

            for (completed, (task_id, task)) in tasks.iter().enumerate() {
                println!("\nProcessing {}", task_id);

                let transcript_path = run_dir.join(format!("{}.txt", task_id));
                let mut transcript = match Transcript::create(&transcript_path) {
                    Ok(transcript) => transcript,
                    Err(e) => {
                        warn!(
                            task = %task_id,
                            error = %e,
                            "Transcript unavailable, continuing without it"
                        );
                        Transcript::discard()
                    }
                };

                let result = runner.run(strategy, task_id, task, &mut transcript).await?;
                info!(
                    progress = format!("{}/{}", completed + 1, total),
                    task = %task_id,
                    solved = result.solved,
                    duration = %format_duration(result.duration_ms),
                    "Completed task"
                );
                results.add(result);
            }

            results.compute_summary();
            let output_path = timestamped_path(&output);
            results.save(&output_path)?;

            println!(
                "Solved {} out of {} tasks",
                results.solved_count(),
                results.attempted()
            );
            println!("Transcripts written to: {}", run_dir.display());
            println!("Results saved to: {}", output_path.display());
        }

        Commands::Evaluate { task, response } => {
            config.validate()?;
            let task = Task::load(&task)
                .with_context(|| format!("Failed to load task {}", task.display()))?;
            let response = std::fs::read_to_string(&response)
                .with_context(|| format!("Failed to read response {}", response.display()))?;

            let evaluator = Evaluator::new(Arc::new(PythonSandbox::new(config.sandbox.clone())));
            let verdict = evaluator.evaluate(&response, &task).await;

            println!("\n=== Evaluation ===");
            match verdict.modality {
                Some(modality) => println!("Modality: {}", modality),
                None => println!("Modality: none"),
            }
            println!("Solved: {}", verdict.solved);
            println!("Train correctness: {:.3}", verdict.train_correctness);
            println!("Avg pixel correctness: {:.3}", verdict.avg_pixel_correctness);
            println!("Score: {:.3}", verdict.score());
            println!("\nReport:\n{}", verdict.report);
        }

        Commands::Health => {
            let client = ChatClient::from_config(&config.model, api_key)?;
            let healthy = client.health_check().await?;
            println!(
                "{} at {}: {}",
                client.model(),
                config.model.api_base,
                if healthy { "healthy" } else { "unreachable" }
            );
        }
    }

    Ok(())
}
