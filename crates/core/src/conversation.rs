//! Conversation state: the append-only log of one request.
//!
//! A conversation always opens with the system directive followed by the
//! user query. After that only assistant steps are appended; nothing is
//! ever removed or reordered. The whole log is re-sent to the reasoning
//! engine every round, serialized as:
//!
//! ```json
//! [
//!   {"role":"system","content":"You are ..."},
//!   {"role":"user","content":"What is the weather in Paris?"},
//!   {"role":"assistant","content":{"step":"plan","content":"..."}}
//! ]
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TranscriptError;
use crate::step::ReasoningStep;

/// Unique identifier for a conversation (one request).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single entry of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ConversationEntry {
    System {
        #[serde(rename = "content")]
        directive: String,
    },
    User {
        #[serde(rename = "content")]
        query: String,
    },
    Assistant {
        #[serde(rename = "content")]
        step: ReasoningStep,
    },
}

impl ConversationEntry {
    pub fn step(&self) -> Option<&ReasoningStep> {
        match self {
            Self::Assistant { step } => Some(step),
            _ => None,
        }
    }
}

/// The ordered log of one request.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: ConversationId,
    entries: Vec<ConversationEntry>,
    created_at: DateTime<Utc>,
}

impl Conversation {
    /// Start a conversation with the directive and the query.
    pub fn new(directive: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: ConversationId::new(),
            entries: vec![
                ConversationEntry::System {
                    directive: directive.into(),
                },
                ConversationEntry::User {
                    query: query.into(),
                },
            ],
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a conversation holds at least the directive and the query.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn directive(&self) -> &str {
        match self.entries.first() {
            Some(ConversationEntry::System { directive }) => directive,
            _ => "",
        }
    }

    pub fn query(&self) -> &str {
        match self.entries.get(1) {
            Some(ConversationEntry::User { query }) => query,
            _ => "",
        }
    }

    /// Append an assistant step.
    pub fn push(&mut self, step: ReasoningStep) {
        self.entries.push(ConversationEntry::Assistant { step });
    }

    /// All assistant steps, in order.
    pub fn steps(&self) -> impl Iterator<Item = &ReasoningStep> {
        self.entries.iter().filter_map(ConversationEntry::step)
    }

    pub fn last_step(&self) -> Option<&ReasoningStep> {
        self.entries.last().and_then(ConversationEntry::step)
    }

    /// Serialize the full log in its wire form.
    pub fn to_transcript(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }

    /// Restore a conversation from its wire form.
    ///
    /// The log must open with a system entry followed by a user entry, and
    /// contain no further system or user entries.
    pub fn from_transcript(transcript: &str) -> Result<Self, TranscriptError> {
        let entries: Vec<ConversationEntry> = serde_json::from_str(transcript)?;

        match entries.as_slice() {
            [ConversationEntry::System { .. }, ConversationEntry::User { .. }, rest @ ..] => {
                if let Some(pos) = rest.iter().position(|e| e.step().is_none()) {
                    return Err(TranscriptError::MissingHeader(format!(
                        "unexpected non-assistant entry at position {}",
                        pos + 3
                    )));
                }
            }
            _ => {
                return Err(TranscriptError::MissingHeader(format!(
                    "got {} entries without the expected header",
                    entries.len()
                )));
            }
        }

        Ok(Self {
            id: ConversationId::new(),
            entries,
            created_at: Utc::now(),
        })
    }
}
