//! Shared test doubles for agent loop tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stepwise_core::error::{ProviderError, ToolError};
use stepwise_core::provider::{Completion, CompletionRequest, Provider};
use stepwise_core::tool::{InputShape, Tool, ToolInput};

/// A provider that replays a fixed script of replies and records every
/// request it receives.
///
/// Once the script runs out it answers with `InvalidResponse`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(replies: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers `reply` exactly `times` times.
    pub fn repeating(reply: &str, times: usize) -> Self {
        Self::new(std::iter::repeat_n(reply.to_string(), times))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))?;
        Ok(Completion {
            text: reply,
            model,
            usage: None,
        })
    }
}

/// A provider that never answers.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, ProviderError> {
        std::future::pending().await
    }
}

/// A tool that answers with a fixed text and counts its invocations.
pub struct StubTool {
    name: String,
    description: String,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<ToolInput>>>,
}

enum Behavior {
    Reply(String),
    Fail(String),
    Sleep(Duration),
}

impl StubTool {
    pub fn new(name: &str, reply: &str) -> Self {
        Self::with_behavior(name, Behavior::Reply(reply.into()))
    }

    /// A tool whose every invocation fails with `ExecutionFailed`.
    pub fn failing(name: &str, reason: &str) -> Self {
        Self::with_behavior(name, Behavior::Fail(reason.into()))
    }

    /// A tool that sleeps for `delay` before answering.
    pub fn slow(name: &str, delay: Duration) -> Self {
        Self::with_behavior(name, Behavior::Sleep(delay))
    }

    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.into(),
            description: format!("stub tool {name}"),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared invocation counter; stays valid after the tool is boxed.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared record of received inputs.
    pub fn inputs(&self) -> Arc<Mutex<Vec<ToolInput>>> {
        Arc::clone(&self.inputs)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_shape(&self) -> InputShape {
        InputShape::text("anything")
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input);
        match &self.behavior {
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Fail(reason) => Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: reason.clone(),
            }),
            Behavior::Sleep(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("finally done".into())
            }
        }
    }
}
