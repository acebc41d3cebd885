//! The plan/act/observe agent loop.
//!
//! The agent follows a **Plan → Act → Observe** cycle driven entirely by the
//! reasoning engine:
//!
//! 1. **Send** the fixed directive plus the full conversation log
//! 2. **Parse** the reply into exactly one [`ReasoningStep`](stepwise_core::ReasoningStep)
//! 3. **Append** it to the log
//! 4. **If action**: invoke the tool, append its result as an observation, loop
//! 5. **If output**: return the answer
//!
//! The loop ends on an output step, on the first error, or when the round
//! limit is reached.

pub mod loop_runner;
pub mod prompt;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{AgentLoop, RunSummary};
pub use prompt::SystemDirective;
