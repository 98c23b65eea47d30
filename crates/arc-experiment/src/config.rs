//! Run configuration loaded from TOML.
//!
//! ```toml
//! [model]
//! api_base = "http://localhost:8000/v1"
//! model = "Qwen/Qwen2.5-Coder-32B-Instruct"
//!
//! [search]
//! generations = 5
//! max_concurrent_queries = 5
//!
//! [sandbox]
//! invoke_timeout_ms = 5000
//! ```
//!
//! Every table and field is optional; omitted values keep their defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use arc_kernel::SandboxConfig;

use crate::sampling::SamplingConfig;

/// Top-level configuration for a run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub model: ModelConfig,
    pub search: SearchConfig,
    pub sandbox: SandboxConfig,
}

impl RunConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        if self.sandbox.invoke_timeout_ms == 0 {
            anyhow::bail!("sandbox.invoke_timeout_ms must be positive");
        }
        if self.model.max_tokens == 0 {
            anyhow::bail!("model.max_tokens must be positive");
        }
        Ok(())
    }
}

/// Model endpoint and sampling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI-compatible API base, including the version prefix
    pub api_base: String,
    /// Model name sent with every request
    pub model: String,
    /// Environment variable holding the bearer key
    pub api_key_env: String,
    /// Maximum tokens to generate per response
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling parameter
    pub top_p: f32,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl ModelConfig {
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }

    /// Bearer key from the configured environment variable, if set and non-empty.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let sampling = SamplingConfig::default();
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 10_000,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            request_timeout_secs: 300,
        }
    }
}

/// Bounds and shape of the search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Round bound for the hybrid revision chain
    pub hybrid_max_rounds: usize,
    /// Generation bound for the evolutionary drivers
    pub generations: usize,
    /// Responses sampled per generation
    pub candidates_per_generation: usize,
    /// Candidates carried into the next generation's prompt
    pub survivors: usize,
    /// Model queries allowed in flight at once within a generation
    pub max_concurrent_queries: usize,
    /// Sample each candidate of a generation from a different band
    pub diversify_sampling: bool,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("search.hybrid_max_rounds", self.hybrid_max_rounds),
            ("search.generations", self.generations),
            ("search.candidates_per_generation", self.candidates_per_generation),
            ("search.survivors", self.survivors),
            ("search.max_concurrent_queries", self.max_concurrent_queries),
        ] {
            if value == 0 {
                anyhow::bail!("{name} must be at least 1");
            }
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hybrid_max_rounds: 25,
            generations: 5,
            candidates_per_generation: 5,
            survivors: 2,
            max_concurrent_queries: 1,
            diversify_sampling: false,
        }
    }
}
