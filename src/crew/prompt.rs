//! Execution prompt assembly
//!
//! A task prompt is the agent persona, the task instructions, the
//! expected-output contract, and then every earlier task output in run
//! order.

use crate::crew::agent::Persona;
use crate::crew::output::TaskOutput;
use crate::crew::task::RenderedTask;
use std::fmt::Write;

/// Build the prompt for one task dispatch
pub fn build_prompt(persona: &Persona, task: &RenderedTask, context: &[TaskOutput]) -> String {
    let mut prompt = persona.to_prompt();

    prompt.push_str("\n\nCurrent Task: ");
    prompt.push_str(task.description.trim_end());

    if !task.expected_output.trim().is_empty() {
        prompt.push_str("\n\nThis is the expected criteria for your final answer: ");
        prompt.push_str(task.expected_output.trim_end());
        prompt.push_str(
            "\nYou MUST return the actual complete content as the final answer, not a summary.",
        );
    }

    if !context.is_empty() {
        prompt.push_str("\n\nThis is the context you're working with:");
        for output in context {
            // write! into a String cannot fail
            let _ = write!(
                prompt,
                "\n\n--- Output of task {} ({}) ---\n{}",
                output.task_index + 1,
                output.agent_role,
                output.raw
            );
        }
    }

    prompt
}
