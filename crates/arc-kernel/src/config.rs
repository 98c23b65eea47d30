//! Configuration types for the sandbox.

use std::time::Duration;

use serde::Deserialize;

/// How candidate transformation code is loaded and run.
///
/// Loaded from the `[sandbox]` table of the run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter executable used for code answers
    pub python_command: String,

    /// Name of the routine every code answer must define
    pub entry_point: String,

    /// Wall-clock budget for loading the code and for each invocation (milliseconds)
    pub invoke_timeout_ms: u64,
}

impl SandboxConfig {
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python_command: "python3".to_string(),
            entry_point: "transform".to_string(),
            invoke_timeout_ms: 10_000,
        }
    }
}
