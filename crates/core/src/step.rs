//! Reasoning steps: the structured decisions the reasoning engine emits.
//!
//! The engine is told to answer every round with exactly one JSON object
//! carrying a `step` discriminator:
//!
//! ```json
//! { "step": "plan",    "content": "The user wants the weather" }
//! { "step": "action",  "function": "get_weather", "input": "Paris" }
//! { "step": "observe", "output": "The weather in Paris is Clear +15°C." }
//! { "step": "output",  "content": "It's 15°C and clear in Paris." }
//! ```
//!
//! The engine is an untrusted producer, so [`parse`] validates every field
//! before a step reaches the agent loop. There is no repair and no retry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StepError;
use crate::tool::{ToolInput, ToolRegistry};

/// One structured decision, exactly one variant active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum ReasoningStep {
    /// Intermediate reasoning. No side effect.
    Plan { content: String },

    /// A request to invoke a registered tool.
    Action {
        function: String,
        #[serde(default)]
        input: ToolInput,
    },

    /// The result of an action. Authored by the loop, not the engine.
    Observe { output: String },

    /// The final answer.
    Output { content: String },
}

impl ReasoningStep {
    pub fn observe(output: impl Into<String>) -> Self {
        Self::Observe {
            output: output.into(),
        }
    }

    /// The `step` tag of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plan { .. } => "plan",
            Self::Action { .. } => "action",
            Self::Observe { .. } => "observe",
            Self::Output { .. } => "output",
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output { .. })
    }
}

/// Parse and validate one raw reply from the reasoning engine.
///
/// For `action` steps the function name is resolved against `tools`
/// exactly once; an unregistered name is an error.
pub fn parse(raw: &str, tools: &ToolRegistry) -> Result<ReasoningStep, StepError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| StepError::Malformed {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !value.is_object() {
        return Err(StepError::Malformed {
            raw: raw.to_string(),
            reason: format!("expected a JSON object, got {}", json_type(&value)),
        });
    }

    match value.get("step").and_then(Value::as_str) {
        Some("plan") => Ok(ReasoningStep::Plan {
            content: required_string(&value, "plan", "content")?,
        }),
        Some("output") => Ok(ReasoningStep::Output {
            content: required_string(&value, "output", "content")?,
        }),
        Some("observe") => Ok(ReasoningStep::Observe {
            output: observation_text(&value)?,
        }),
        Some("action") => {
            let function = required_string(&value, "action", "function")?;
            if tools.lookup(&function).is_none() {
                return Err(StepError::UnknownTool {
                    function,
                    raw: value,
                });
            }
            let input = tool_input(&value)?;
            Ok(ReasoningStep::Action { function, input })
        }
        _ => Err(StepError::UnknownStep { raw: value }),
    }
}

fn required_string(
    value: &Value,
    step: &'static str,
    field: &'static str,
) -> Result<String, StepError> {
    match value.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(
            value,
            step,
            field,
            format!("expected a string, got {}", json_type(other)),
        )),
        None => Err(invalid(value, step, field, "missing".into())),
    }
}

/// Engine-authored observations may carry any JSON; non-strings are kept as compact JSON text.
fn observation_text(value: &Value) -> Result<String, StepError> {
    match value.get("output") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(invalid(value, "observe", "output", "missing".into())),
        Some(other) => Ok(other.to_string()),
    }
}

fn tool_input(value: &Value) -> Result<ToolInput, StepError> {
    match value.get("input") {
        None | Some(Value::Null) => Ok(ToolInput::Empty),
        Some(Value::String(s)) => Ok(ToolInput::Text(s.clone())),
        Some(Value::Number(n)) => Ok(ToolInput::Text(n.to_string())),
        Some(Value::Bool(b)) => Ok(ToolInput::Text(b.to_string())),
        Some(Value::Object(map)) => Ok(ToolInput::Record(map.clone())),
        Some(Value::Array(_)) => Err(invalid(
            value,
            "action",
            "input",
            "expected a string or an object, got an array".into(),
        )),
    }
}

fn invalid(value: &Value, step: &'static str, field: &'static str, reason: String) -> StepError {
    StepError::InvalidField {
        step,
        field,
        reason,
        raw: value.clone(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
