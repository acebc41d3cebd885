//! The system directive handed to the reasoning engine.
//!
//! Built once per [`AgentLoop`](crate::AgentLoop) from the tool registry and
//! never modified afterwards.

use std::fmt;

use stepwise_core::tool::ToolRegistry;

const PREAMBLE: &str = "\
You are a helpful AI assistant specialized in resolving user queries.
You work in plan, action, observe and output steps.
For the given user query and the available tools, plan the step-by-step execution.
Based on the plan, select the relevant tool and perform an action step to call it.
Wait for the observation, and based on it resolve the user query.

Rules:
- Follow the output JSON format exactly.
- Always perform one step at a time and wait for the next input.
- Reply with a single JSON object and nothing else.
- Only call functions listed under Available Tools.
- Carefully analyse the user query.

Output JSON Format:
{ \"step\": \"plan | action | output\", \"content\": \"string\", \"function\": \"the function name if the step is action\", \"input\": \"the input for the function\" }
";

const EXAMPLE: &str = "\
Example:
User Query: What is the weather of new york?
Output: { \"step\": \"plan\", \"content\": \"The user is interested in the weather of new york\" }
Output: { \"step\": \"plan\", \"content\": \"From the available tools I should call get_weather\" }
Output: { \"step\": \"action\", \"function\": \"get_weather\", \"input\": \"new york\" }
Output: { \"step\": \"observe\", \"output\": \"12 Degree Cel\" }
Output: { \"step\": \"output\", \"content\": \"The weather for new york seems to be 12 degrees.\" }
";

/// The fixed instructions for one agent loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDirective(String);

impl SystemDirective {
    /// Render the standard directive listing every tool in `tools`.
    pub fn from_registry(tools: &ToolRegistry) -> Self {
        let mut text = String::from(PREAMBLE);
        text.push_str("\nAvailable Tools:\n");
        if tools.is_empty() {
            text.push_str("- (none)\n");
        }
        for spec in tools.specs() {
            text.push_str(&format!(
                "- {}: {} (input: {})\n",
                spec.name,
                spec.description,
                spec.input.describe()
            ));
        }
        text.push('\n');
        text.push_str(EXAMPLE);
        Self(text)
    }

    /// Use `text` verbatim.
    pub fn custom(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
