//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! look up the weather, run a shell command, fetch stock data, etc.
//! Each one takes a [`ToolInput`] and answers with plain text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::error::ToolError;

/// The input an `action` step hands to a tool.
///
/// Serialized as `null`, a JSON string, or a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolInput {
    /// No input (`null` or absent).
    #[default]
    Empty,
    /// A scalar input such as a city name or a ticker.
    Text(String),
    /// A structured record.
    Record(serde_json::Map<String, serde_json::Value>),
}

impl ToolInput {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The scalar value, if this is a non-blank text input.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// A field of a record input.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        match self {
            Self::Record(map) => map.get(name),
            _ => None,
        }
    }

    /// A scalar input, or a string field of a record input.
    ///
    /// Lets text-shaped tools accept `"AAPL"` as well as `{"ticker": "AAPL"}`.
    pub fn text_or_field(&self, name: &str) -> Option<&str> {
        self.as_text().or_else(|| {
            self.field(name)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for ToolInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "null"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Record(map) => {
                let json = serde_json::to_string(map).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// The declared shape of a tool's input, rendered into the system directive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InputShape {
    /// The tool takes no input.
    None,
    /// A single string.
    Text { hint: String },
    /// A JSON object; `schema` describes its fields.
    Record { schema: serde_json::Value },
}

impl InputShape {
    pub fn text(hint: impl Into<String>) -> Self {
        Self::Text { hint: hint.into() }
    }

    /// One-line human readable form used in prompts.
    pub fn describe(&self) -> String {
        match self {
            Self::None => "no input".into(),
            Self::Text { hint } => format!("string: {hint}"),
            Self::Record { schema } => format!("object {schema}"),
        }
    }
}

/// The public description of a registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input: InputShape,
}

/// The core Tool trait.
///
/// Each capability (weather, shell, stock quotes, ...) implements this
/// trait and is registered in the [`ToolRegistry`]. Tools should turn their
/// own failures into descriptive text where they can; an `Err` is reserved
/// for input the tool cannot work with at all.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// The input this tool expects.
    fn input_shape(&self) -> InputShape;

    /// Run the tool.
    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input: self.input_shape(),
        }
    }
}

/// A registry of available tools.
///
/// Built once at startup and read-only afterwards, so it can be shared
/// across requests behind an `Arc` without locking. Every [`lookup`]
/// is counted.
///
/// [`lookup`]: ToolRegistry::lookup
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    lookups: AtomicUsize,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Resolve a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn Tool> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Look up and invoke a tool.
    pub async fn invoke(&self, name: &str, input: ToolInput) -> Result<String, ToolError> {
        let tool = self
            .lookup(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.invoke(input).await
    }

    /// Specs of all registered tools, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// How many lookups have been made against this registry.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
