//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent.
//! Every external collaborator of the agent loop is a trait here.
//! Implementations live in their own crates.

pub mod conversation;
pub mod error;
pub mod event;
pub mod provider;
pub mod step;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use conversation::{Conversation, ConversationEntry, ConversationId};
pub use error::{AgentError, ProviderError, StepError, ToolError, TranscriptError};
pub use event::{DomainEvent, EventBus};
pub use provider::{Completion, CompletionRequest, Provider, Usage};
pub use step::ReasoningStep;
pub use tool::{InputShape, Tool, ToolInput, ToolRegistry, ToolSpec};
