//! Prompt construction for the search drivers.
//!
//! Grids are always rendered with [`Grid::to_literal`], the same form the
//! parser accepts back inside `<output>` tags.

use std::fmt::Write as _;

use arc_kernel::parse::reasoning_section;
use arc_kernel::{Modality, Task};

use crate::chat_client::ChatMessage;
use crate::experiment::Strategy;
use crate::population::PopulationEntry;

/// System prompt for the evolutionary (code-writing) driver.
pub const CODE_SYSTEM_PROMPT: &str = "\
You are an expert at abstract visual reasoning puzzles. Each puzzle is a set of \
input/output grid pairs that share one hidden transformation rule. Grids are lists \
of rows and every cell is a colour from 0 to 9.

Study the examples, describe the rule inside <reasoning></reasoning> tags, then \
implement it as a Python function:

```python
def transform(grid: list[list[int]]) -> list[list[int]]:
    ...
```

The function must work for every example and for the test input. You may define \
helpers and import from the standard library or numpy. Return a list of lists of \
integers. Put the complete program in a single ```python block at the end of your \
answer.";

/// System prompt for the hybrid revision driver.
pub const HYBRID_SYSTEM_PROMPT: &str = "\
You are an expert at abstract visual reasoning puzzles. Each puzzle is a set of \
input/output grid pairs that share one hidden transformation rule. Grids are lists \
of rows and every cell is a colour from 0 to 9.

Explain the rule inside <reasoning></reasoning> tags. Then answer in exactly ONE of \
two ways:

1. Write a Python function `transform(grid)` that maps any input grid to its output \
grid, in a single ```python block.
2. Predict the test output directly, written as a list of rows between <output> and \
</output> tags, for example <output>[[0, 1], [1, 0]]</output>.

Pick whichever you are more confident in. Do not give both.";

/// System prompt for the evolutionary transduction driver.
pub const TRANSDUCTION_SYSTEM_PROMPT: &str = "\
You are an expert at abstract visual reasoning puzzles. Each puzzle is a set of \
input/output grid pairs that share one hidden transformation rule. Grids are lists \
of rows and every cell is a colour from 0 to 9.

Work out the rule step by step inside <reasoning></reasoning> tags, apply it to the \
test input, and write the predicted output grid as a list of rows between <output> \
and </output> tags, for example <output>[[0, 1], [1, 0]]</output>. Do not write code.";

const EVOLUTIONARY_FEEDBACK_INTRO: &str = "\
Below are the best transform functions written so far for this puzzle, with the \
result of running each one on the examples. None of them solves the puzzle. Learn \
from what they get right and wrong.";

const EVOLUTIONARY_FEEDBACK_OUTRO: &str = "\
Write an improved transform function. Explain what the earlier attempts missed, \
then give the complete program in a single ```python block.";

const TRANSDUCTION_FEEDBACK_INTRO: &str = "\
Below are the best answers given so far for this puzzle. None of them is correct. \
Check their reasoning against every example, find the mistake, and give a corrected \
prediction inside <output></output> tags.";

const HYBRID_REVISION_INSTRUCTIONS: &str = "\
Solve this puzzle. Section A lists the examples. When section B is present it is \
your previous answer, which was wrong; if that answer was a program, section C \
shows what it produced for each example. Find the flaw and answer again, either \
with a ```python transform function or with a predicted <output> grid.";

/// The last evaluated answer in a hybrid revision chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub response: String,
    pub modality: Option<Modality>,
    pub report: String,
}

/// The system prompt a strategy runs with.
pub fn system_prompt(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Evolutionary => CODE_SYSTEM_PROMPT,
        Strategy::Hybrid => HYBRID_SYSTEM_PROMPT,
        Strategy::EvolutionaryTransduction => TRANSDUCTION_SYSTEM_PROMPT,
    }
}

/// Numbered training examples followed by the test input.
pub fn initial_prompt(task: &Task) -> String {
    let mut prompt = String::from("Here are the example inputs and their outputs.");
    for (i, pair) in task.train().iter().enumerate() {
        let _ = write!(
            prompt,
            "\n\nExample {}\n\nInput:\n\n{}\n\nOutput:\n\n{}",
            i + 1,
            pair.input,
            pair.output
        );
    }
    let _ = write!(
        prompt,
        "\n\nHere is the test input. Its output is unknown:\n\n{}",
        task.test_input()
    );
    prompt
}

/// Survivors' code and per-example results, for the next code generation.
pub fn evolutionary_feedback(survivors: &[PopulationEntry]) -> String {
    let mut prompt = format!("{EVOLUTIONARY_FEEDBACK_INTRO}\n\n");
    for (i, entry) in survivors.iter().enumerate() {
        let _ = write!(
            prompt,
            "Program {}\n\nCode:\n\n{}\n\nResults from running the code:\n\n{}\n\n",
            i + 1,
            entry.code,
            entry.report
        );
    }
    prompt.push_str(EVOLUTIONARY_FEEDBACK_OUTRO);
    prompt
}

/// Survivors' full responses, for the next transduction generation.
pub fn transduction_feedback(survivors: &[PopulationEntry]) -> String {
    let mut prompt = format!("{TRANSDUCTION_FEEDBACK_INTRO}\n\n");
    for (i, entry) in survivors.iter().enumerate() {
        let _ = write!(prompt, "Response {}\n\n{}\n\n", i + 1, entry.response);
    }
    prompt
}

/// Revision prompt for the hybrid chain.
///
/// Without a previous attempt this is just the instructions and section A.
pub fn hybrid_prompt(task: &Task, previous: Option<&Attempt>) -> String {
    let mut prompt = format!(
        "{HYBRID_REVISION_INSTRUCTIONS}\n\nA. Examples\n\n{}",
        initial_prompt(task)
    );

    if let Some(attempt) = previous {
        let _ = write!(
            prompt,
            "\n\nB. Incorrect Previous Answer\n\n{}",
            reasoning_section(&attempt.response)
        );
        if attempt.modality == Some(Modality::Code) {
            let _ = write!(
                prompt,
                "\n\nC. Outputs produced by the previous answer\n\n{}",
                attempt.report
            );
        }
    }

    prompt
}

/// A two-message conversation: system prompt then user prompt.
pub fn conversation(system: &str, user: impl Into<String>) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
