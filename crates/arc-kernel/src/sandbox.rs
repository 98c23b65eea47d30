//! Sandboxed execution of model-written transformation routines.
//!
//! The [`Sandbox`] trait loads candidate source into a fresh namespace and
//! hands back a [`Transform`] that can be applied to grids one at a time.
//! Every failure comes back as a [`SandboxError`]; nothing here panics or
//! aborts the calling process.
//!
//! [`PythonSandbox`] is the production implementation. Each `load` spawns its
//! own interpreter running a small JSON-lines runner, so no global state can
//! leak from one candidate into another. Loading and every invocation run
//! under a wall-clock budget; a candidate that exceeds it has its interpreter
//! killed and is reported as [`SandboxError::Timeout`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::grid::Grid;

/// Loads candidate source code into an isolated namespace.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute the definitions in `source` and return its entry point.
    ///
    /// Fails with [`SandboxError::Load`] when the entry point is missing and
    /// with [`SandboxError::Execution`] when the definitions themselves raise.
    async fn load(&self, source: &str) -> Result<Box<dyn Transform>, SandboxError>;
}

/// A loaded transformation routine.
#[async_trait]
pub trait Transform: Send {
    /// Apply the routine to one input grid.
    async fn apply(&mut self, input: &Grid) -> Result<Grid, SandboxError>;
}

/// JSON-lines runner executed by the interpreter.
///
/// Protocol: one `load` request, answered with `{"ok": true}` or an error
/// carrying `kind` = `define` | `missing`; then any number of `apply`
/// requests, answered with the output rows or an error of `kind` =
/// `raise` | `output`. Candidate prints go to stderr, never the protocol pipe.
pub const PYTHON_RUNNER: &str = r#"
import io
import json
import operator
import sys
import traceback

_HOST_STDIN = sys.stdin
_HOST_STDOUT = sys.stdout
sys.stdin = io.StringIO("")
sys.stdout = sys.stderr


def _read_json():
    line = _HOST_STDIN.readline()
    if not line:
        raise EOFError("stdin closed")
    return json.loads(line)


def _write_json(obj):
    _HOST_STDOUT.write(json.dumps(obj) + "\n")
    _HOST_STDOUT.flush()


def _describe(exc):
    return type(exc).__name__ + ": " + str(exc)


def _to_cell(value):
    if isinstance(value, bool):
        raise TypeError("cell " + repr(value) + " is not an integer")
    try:
        return operator.index(value)
    except TypeError:
        pass
    try:
        cell = int(value)
    except (TypeError, ValueError, OverflowError):
        raise TypeError("cell " + repr(value) + " is not an integer") from None
    if cell != value:
        raise TypeError("cell " + repr(value) + " is not an integer")
    return cell


def _plain(value):
    if hasattr(value, "tolist"):
        return value.tolist()
    return value


def _to_rows(value):
    return [[_to_cell(cell) for cell in _plain(row)] for row in _plain(value)]


request = _read_json()
entry_name = request["entry_point"]
namespace = {"__name__": "__candidate__"}
try:
    exec(compile(request["code"], "<candidate>", "exec"), namespace)
except BaseException as exc:
    _write_json({"ok": False, "kind": "define",
                 "error": "Failed to execute code with error: " + _describe(exc)})
    sys.exit(0)

entry = namespace.get(entry_name)
if not callable(entry):
    _write_json({"ok": False, "kind": "missing",
                 "error": "No " + entry_name + " function found in the code"})
    sys.exit(0)

_write_json({"ok": True})

while True:
    try:
        request = _read_json()
    except EOFError:
        break
    try:
        result = entry(request["grid"])
    except BaseException as exc:
        _write_json({"ok": False, "kind": "raise", "error": _describe(exc),
                     "traceback": traceback.format_exc(limit=5)})
        continue
    try:
        rows = _to_rows(result)
    except BaseException as exc:
        _write_json({"ok": False, "kind": "output",
                     "error": "returned " + type(result).__name__ + " (" + _describe(exc) + ")"})
        continue
    _write_json({"ok": True, "grid": rows})
"#;

/// Request sent from the host to the runner.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostRequest<'a> {
    Load { code: &'a str, entry_point: &'a str },
    Apply { grid: &'a Grid },
}

/// Reply from the runner.
#[derive(Debug, Deserialize)]
struct RunnerReply {
    ok: bool,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    traceback: Option<String>,
    #[serde(default)]
    grid: Option<Vec<Vec<i64>>>,
}

impl RunnerReply {
    fn message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Sandbox that runs each candidate in its own Python interpreter.
#[derive(Debug, Clone, Default)]
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Check whether the configured interpreter can be started.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.config.python_command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Sandbox for PythonSandbox {
    async fn load(&self, source: &str) -> Result<Box<dyn Transform>, SandboxError> {
        let budget = self.config.invoke_timeout();
        let mut process = RunnerProcess::spawn(&self.config.python_command)?;

        let request = HostRequest::Load {
            code: source,
            entry_point: &self.config.entry_point,
        };
        let reply = process.round_trip(&request, budget).await?;

        if reply.ok {
            debug!(entry_point = %self.config.entry_point, "Loaded candidate code");
            return Ok(Box::new(PythonTransform { process, budget }));
        }

        match reply.kind.as_deref() {
            Some("missing") => Err(SandboxError::Load(reply.message())),
            _ => Err(SandboxError::Execution(reply.message())),
        }
    }
}

/// A loaded entry point living in a dedicated interpreter process.
struct PythonTransform {
    process: RunnerProcess,
    budget: Duration,
}

#[async_trait]
impl Transform for PythonTransform {
    async fn apply(&mut self, input: &Grid) -> Result<Grid, SandboxError> {
        let reply = self
            .process
            .round_trip(&HostRequest::Apply { grid: input }, self.budget)
            .await?;

        if !reply.ok {
            if let Some(tb) = &reply.traceback {
                debug!(traceback = %tb, "Candidate transform raised");
            }
            return Err(match reply.kind.as_deref() {
                Some("output") => SandboxError::InvalidOutput(reply.message()),
                _ => SandboxError::Execution(reply.message()),
            });
        }

        let rows = reply
            .grid
            .ok_or_else(|| SandboxError::InvalidOutput("reply carried no grid".to_string()))?;
        Grid::try_from(rows).map_err(|e| SandboxError::InvalidOutput(e.to_string()))
    }
}

/// Interpreter child process speaking the runner protocol.
struct RunnerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    terminated: bool,
}

impl RunnerProcess {
    fn spawn(python_command: &str) -> Result<Self, SandboxError> {
        let mut child = Command::new(python_command)
            .arg("-u")
            .arg("-c")
            .arg(PYTHON_RUNNER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SandboxError::Interpreter(format!(
                    "failed to spawn python interpreter `{python_command}`: {e}"
                ))
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            SandboxError::Interpreter("failed to capture interpreter stdin".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            SandboxError::Interpreter("failed to capture interpreter stdout".to_string())
        })?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            terminated: false,
        })
    }

    async fn send(&mut self, request: &HostRequest<'_>) -> Result<(), SandboxError> {
        let mut line = serde_json::to_vec(request)
            .map_err(|e| SandboxError::Interpreter(format!("failed to encode request: {e}")))?;
        line.push(b'\n');
        self.stdin
            .write_all(&line)
            .await
            .map_err(stopped_accepting_input)?;
        self.stdin.flush().await.map_err(stopped_accepting_input)
    }

    async fn receive(&mut self) -> Result<RunnerReply, SandboxError> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).await.map_err(|e| {
            SandboxError::Interpreter(format!("failed to read interpreter output: {e}"))
        })?;
        if read == 0 {
            return Err(SandboxError::Execution(
                "interpreter exited unexpectedly".to_string(),
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            SandboxError::Interpreter(format!(
                "invalid message from interpreter: {e}; raw={}",
                line.trim()
            ))
        })
    }

    /// Send one request and wait for its reply within `budget`.
    ///
    /// Any failure leaves the process unusable, so it is killed.
    async fn round_trip(
        &mut self,
        request: &HostRequest<'_>,
        budget: Duration,
    ) -> Result<RunnerReply, SandboxError> {
        if self.terminated {
            return Err(SandboxError::Interpreter(
                "interpreter was terminated after an earlier failure".to_string(),
            ));
        }

        let exchange = async {
            self.send(request).await?;
            self.receive().await
        };

        let outcome = timeout(budget, exchange).await;
        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                self.terminate();
                Err(e)
            }
            Err(_) => {
                warn!(
                    budget_ms = budget.as_millis() as u64,
                    "Candidate exceeded time budget, killing interpreter"
                );
                self.terminate();
                Err(SandboxError::Timeout { budget })
            }
        }
    }

    fn terminate(&mut self) {
        self.terminated = true;
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "Interpreter already gone");
        }
    }
}

fn stopped_accepting_input(e: std::io::Error) -> SandboxError {
    SandboxError::Execution(format!("interpreter stopped accepting input: {e}"))
}
