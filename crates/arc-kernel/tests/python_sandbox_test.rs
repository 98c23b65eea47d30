//! Integration tests for the Python sandbox.
//!
//! Each test returns early when no `python3` interpreter is installed.

use std::time::Instant;

use std::sync::Arc;

use arc_kernel::{
    Evaluator, Grid, Modality, Pair, PythonSandbox, Sandbox, SandboxConfig, SandboxError, Task,
};

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn sandbox_with_timeout(invoke_timeout_ms: u64) -> PythonSandbox {
    PythonSandbox::new(SandboxConfig {
        invoke_timeout_ms,
        ..Default::default()
    })
}

fn grid(rows: Vec<Vec<u8>>) -> Grid {
    Grid::new(rows).unwrap()
}

#[tokio::test]
async fn test_runs_transform() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    let code = "def transform(grid):\n    print('noise on stdout')\n    return [row[::-1] for row in grid]";

    let mut transform = sandbox.load(code).await.unwrap();
    let output = transform.apply(&grid(vec![vec![1, 2, 3]])).await.unwrap();
    assert_eq!(output, grid(vec![vec![3, 2, 1]]));

    let output = transform.apply(&grid(vec![vec![4], vec![5]])).await.unwrap();
    assert_eq!(output, grid(vec![vec![4], vec![5]]));
}

#[tokio::test]
async fn test_helpers_and_imports_are_visible_to_entry_point() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    let code = "import copy\n\nSHIFT = 1\n\ndef bump(v):\n    return (v + SHIFT) % 10\n\n\
                def transform(grid):\n    out = copy.deepcopy(grid)\n    \
                return [[bump(v) for v in row] for row in out]";

    let mut transform = sandbox.load(code).await.unwrap();
    let output = transform.apply(&grid(vec![vec![8, 9]])).await.unwrap();
    assert_eq!(output, grid(vec![vec![9, 0]]));
}

#[tokio::test]
async fn test_loads_are_isolated() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    let code = "import builtins\n\n\
                def transform(grid):\n    \
                builtins.calls = getattr(builtins, 'calls', 0) + 1\n    \
                return [[builtins.calls]]";

    let mut first = sandbox.load(code).await.unwrap();
    assert_eq!(first.apply(&grid(vec![vec![0]])).await.unwrap(), grid(vec![vec![1]]));
    assert_eq!(first.apply(&grid(vec![vec![0]])).await.unwrap(), grid(vec![vec![2]]));

    let mut second = sandbox.load(code).await.unwrap();
    assert_eq!(second.apply(&grid(vec![vec![0]])).await.unwrap(), grid(vec![vec![1]]));
}

#[tokio::test]
async fn test_missing_entry_point_is_load_error() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    let err = sandbox.load("def solve(grid):\n    return grid").await.err();
    match err {
        Some(SandboxError::Load(msg)) => assert!(msg.contains("No transform function")),
        other => panic!("expected load error, got {other:?}"),
    }

    let err = sandbox.load("transform = 3").await.err();
    assert!(matches!(err, Some(SandboxError::Load(_))));
}

#[tokio::test]
async fn test_definition_error_is_execution_error() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    let err = sandbox.load("raise RuntimeError('bad module')").await.err();
    match err {
        Some(SandboxError::Execution(msg)) => assert!(msg.contains("RuntimeError: bad module")),
        other => panic!("expected execution error, got {other:?}"),
    }

    let err = sandbox.load("def transform(grid) return grid").await.err();
    assert!(matches!(err, Some(SandboxError::Execution(_))));
}

#[tokio::test]
async fn test_raising_transform_is_execution_error() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    let mut transform = sandbox
        .load("def transform(grid):\n    return grid[5]")
        .await
        .unwrap();

    let err = transform.apply(&grid(vec![vec![1]])).await.unwrap_err();
    assert!(err.is_execution_failure());
    assert!(err.to_string().contains("IndexError"));

    // The interpreter survives an exception raised by the candidate.
    assert!(transform.apply(&grid(vec![vec![1]])).await.is_err());
}

#[tokio::test]
async fn test_non_grid_result_is_invalid_output() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);

    let mut transform = sandbox
        .load("def transform(grid):\n    return None")
        .await
        .unwrap();
    let err = transform.apply(&grid(vec![vec![1]])).await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidOutput(_)));

    let mut transform = sandbox
        .load("def transform(grid):\n    return [[1, 2], [3]]")
        .await
        .unwrap();
    let err = transform.apply(&grid(vec![vec![1]])).await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidOutput(_)));

    let mut transform = sandbox
        .load("def transform(grid):\n    return [[12]]")
        .await
        .unwrap();
    let err = transform.apply(&grid(vec![vec![1]])).await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidOutput(_)));
}

#[tokio::test]
async fn test_integer_like_cells_are_accepted() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    // Scalars exposing only `__index__`, and rows exposing `tolist`, as numpy returns them.
    let code = "from fractions import Fraction\n\n\
                class Scalar:\n    \
                def __init__(self, v):\n        self.v = v\n    \
                def __index__(self):\n        return self.v\n    \
                def __eq__(self, other):\n        return self.v == other\n\n\
                class Row:\n    \
                def __init__(self, cells):\n        self.cells = cells\n    \
                def tolist(self):\n        return list(self.cells)\n\n\
                def transform(grid):\n    \
                return [[Scalar(grid[0][0]), Fraction(2), 3.0], Row([Scalar(4), 5, 6])]";

    let mut transform = sandbox.load(code).await.unwrap();
    let output = transform.apply(&grid(vec![vec![1]])).await.unwrap();
    assert_eq!(output, grid(vec![vec![1, 2, 3], vec![4, 5, 6]]));
}

#[tokio::test]
async fn test_non_integral_cells_are_invalid_output() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(10_000);
    for result in ["[[True]]", "[[1.5]]", "[['3']]", "[[float('nan')]]"] {
        let code = format!("def transform(grid):\n    return {result}");
        let mut transform = sandbox.load(&code).await.unwrap();
        let err = transform.apply(&grid(vec![vec![1]])).await.unwrap_err();
        assert!(
            matches!(err, SandboxError::InvalidOutput(_)),
            "{result} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn test_evaluator_scores_interpreted_transform() {
    if !python_available() {
        return;
    }
    let evaluator = Evaluator::new(Arc::new(sandbox_with_timeout(10_000)));
    let task = Task::new(
        vec![
            Pair::new(grid(vec![vec![1, 2, 3]]), grid(vec![vec![3, 2, 1]])),
            Pair::new(grid(vec![vec![4, 5], vec![6, 7]]), grid(vec![vec![5, 4], vec![7, 6]])),
        ],
        Pair::new(grid(vec![vec![8, 9, 0]]), grid(vec![vec![0, 9, 8]])),
    )
    .unwrap();
    let response = "<reasoning>Mirror each row.</reasoning>\n\
                    ```python\ndef transform(grid):\n    return [row[::-1] for row in grid]\n```";

    let verdict = evaluator.evaluate(response, &task).await;
    assert!(verdict.solved);
    assert_eq!(verdict.modality, Some(Modality::Code));
    assert_eq!(verdict.train_correctness, 1.0);
    assert_eq!(verdict.avg_pixel_correctness, 1.0);
    assert!(verdict.report.contains("Result for example 2:"));
}

#[tokio::test]
async fn test_runaway_transform_times_out() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(1_000);
    let mut transform = sandbox
        .load("def transform(grid):\n    while True:\n        pass")
        .await
        .unwrap();

    let started = Instant::now();
    let err = transform.apply(&grid(vec![vec![1]])).await.unwrap_err();
    assert!(matches!(err, SandboxError::Timeout { .. }));
    assert!(started.elapsed().as_secs() < 5);

    // The interpreter was killed; later calls fail fast.
    let err = transform.apply(&grid(vec![vec![1]])).await.unwrap_err();
    assert!(matches!(err, SandboxError::Interpreter(_)));
}

#[tokio::test]
async fn test_runaway_definition_times_out() {
    if !python_available() {
        return;
    }
    let sandbox = sandbox_with_timeout(1_000);
    let err = sandbox
        .load("while True:\n    pass\n\ndef transform(grid):\n    return grid")
        .await
        .err();
    assert!(matches!(err, Some(SandboxError::Timeout { .. })));
}
