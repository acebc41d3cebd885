//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use stepwise_config::{AppConfig, ToolFaultPolicy};
use stepwise_core::conversation::Conversation;
use stepwise_core::error::{AgentError, StepError, ToolError};
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::provider::{CompletionRequest, Provider};
use stepwise_core::step::{self, ReasoningStep};
use stepwise_core::tool::{ToolInput, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompt::SystemDirective;

/// The outcome of a successful request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Content of the `output` step
    pub answer: String,

    /// Reasoning-engine calls made
    pub rounds: u32,

    /// Tools invoked
    pub tool_calls: usize,
}

/// The core agent loop that orchestrates reasoning-engine calls and tool
/// execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Fixed instructions sent with every round
    directive: SystemDirective,

    /// Maximum engine calls per request
    max_rounds: u32,

    engine_timeout: Duration,
    tool_timeout: Duration,
    on_tool_fault: ToolFaultPolicy,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with the standard directive for `tools`.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let directive = SystemDirective::from_registry(&tools);
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            directive,
            max_rounds: 25,
            engine_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
            on_tool_fault: ToolFaultPolicy::Observe,
            event_bus,
        }
    }

    /// Create an agent loop with every setting taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let agent = &config.agent;
        let mut this = Self::new(
            provider,
            &config.default_model,
            config.default_temperature,
            tools,
            event_bus,
        )
        .with_max_tokens(config.default_max_tokens)
        .with_max_rounds(agent.max_rounds)
        .with_engine_timeout(Duration::from_secs(agent.engine_timeout_secs))
        .with_tool_timeout(Duration::from_secs(agent.tool_timeout_secs))
        .with_tool_fault_policy(agent.on_tool_fault);

        if let Some(text) = &agent.system_prompt_override {
            this = this.with_directive(SystemDirective::custom(text));
        }
        this
    }

    /// Set the maximum number of engine calls per request.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_tool_fault_policy(mut self, policy: ToolFaultPolicy) -> Self {
        self.on_tool_fault = policy;
        self
    }

    /// Replace the generated directive.
    pub fn with_directive(mut self, directive: SystemDirective) -> Self {
        self.directive = directive;
        self
    }

    pub fn directive(&self) -> &SystemDirective {
        &self.directive
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start a fresh conversation for `query` under this loop's directive.
    pub fn conversation(&self, query: impl Into<String>) -> Conversation {
        Conversation::new(self.directive.as_str(), query)
    }

    /// Answer `query` in a fresh conversation.
    pub async fn run(&self, query: &str) -> Result<RunSummary, AgentError> {
        let mut conversation = self.conversation(query);
        self.process(&mut conversation).await
    }

    /// Drive `conversation` until the engine produces an output step.
    pub async fn process(&self, conversation: &mut Conversation) -> Result<RunSummary, AgentError> {
        self.process_with_cancel(conversation, &CancellationToken::new())
            .await
    }

    /// Like [`process`](Self::process), aborting with
    /// [`AgentError::Cancelled`] as soon as `cancel` fires.
    ///
    /// The conversation keeps every step appended before termination.
    pub async fn process_with_cancel(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, AgentError> {
        let conversation_id = conversation.id().to_string();
        info!(
            conversation_id = %conversation_id,
            entries = conversation.len(),
            "Processing conversation"
        );

        let mut rounds = 0;
        let mut tool_calls = 0;
        let result = self
            .drive(conversation, cancel, &mut rounds, &mut tool_calls)
            .await;

        match result {
            Ok(answer) => {
                info!(conversation_id = %conversation_id, rounds, tool_calls, "Request completed");
                self.event_bus.publish(DomainEvent::RequestCompleted {
                    conversation_id,
                    rounds,
                    tool_calls,
                    timestamp: Utc::now(),
                });
                Ok(RunSummary {
                    answer,
                    rounds,
                    tool_calls,
                })
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, rounds, error = %e, "Request failed");
                self.event_bus.publish(DomainEvent::RequestFailed {
                    conversation_id,
                    rounds,
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
        rounds: &mut u32,
        tool_calls: &mut usize,
    ) -> Result<String, AgentError> {
        let conversation_id = conversation.id().to_string();

        loop {
            if *rounds >= self.max_rounds {
                return Err(AgentError::RoundLimitExceeded {
                    limit: self.max_rounds,
                });
            }
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            *rounds += 1;
            let round = *rounds;
            debug!(conversation_id = %conversation_id, round, "Agent loop round");
            self.event_bus.publish(DomainEvent::RoundStarted {
                conversation_id: conversation_id.clone(),
                round,
                timestamp: Utc::now(),
            });

            let request = CompletionRequest {
                model: self.model.clone(),
                system: self.directive.as_str().to_string(),
                transcript: conversation.to_transcript()?,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                json_mode: true,
            };

            let completion = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                reply = tokio::time::timeout(
                    self.engine_timeout,
                    self.provider.complete(request),
                ) => {
                    reply.map_err(|_| AgentError::EngineTimeout {
                        secs: self.engine_timeout.as_secs(),
                    })??
                }
            };

            let step = step::parse(&completion.text, &self.tools)?;
            self.event_bus.publish(DomainEvent::StepReceived {
                conversation_id: conversation_id.clone(),
                round,
                kind: step.kind().to_string(),
                summary: summarize(&step),
                timestamp: Utc::now(),
            });
            conversation.push(step.clone());

            match step {
                ReasoningStep::Plan { content } => {
                    info!(conversation_id = %conversation_id, "Plan: {content}");
                }
                ReasoningStep::Observe { .. } => {
                    debug!(
                        conversation_id = %conversation_id,
                        "Ignoring engine-authored observe step"
                    );
                }
                ReasoningStep::Output { content } => {
                    info!(conversation_id = %conversation_id, "Output: {content}");
                    return Ok(content);
                }
                ReasoningStep::Action { function, input } => {
                    info!(
                        conversation_id = %conversation_id,
                        function = %function,
                        input = %input,
                        "Action"
                    );
                    let observation = self
                        .dispatch(&conversation_id, &function, input, cancel)
                        .await?;
                    *tool_calls += 1;
                    conversation.push(ReasoningStep::observe(observation));
                }
            }
        }
    }

    /// Invoke one tool and turn its result into observation text.
    async fn dispatch(
        &self,
        conversation_id: &str,
        function: &str,
        input: ToolInput,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let tool = self.tools.lookup(function).ok_or_else(|| StepError::UnknownTool {
            function: function.to_string(),
            raw: serde_json::json!({"step": "action", "function": function}),
        })?;

        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = tokio::time::timeout(self.tool_timeout, tool.invoke(input)) => {
                result.unwrap_or_else(|_| Err(ToolError::Timeout {
                    tool_name: function.to_string(),
                    timeout_secs: self.tool_timeout.as_secs(),
                }))
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            conversation_id: conversation_id.to_string(),
            tool_name: function.to_string(),
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match outcome {
            Ok(text) => Ok(text),
            Err(e) => match self.on_tool_fault {
                ToolFaultPolicy::Observe => {
                    warn!(tool = %function, error = %e, "Tool execution failed");
                    // Report error to the LLM so it can recover
                    Ok(format!("Error: {e}"))
                }
                ToolFaultPolicy::Abort => Err(AgentError::ToolFault {
                    tool: function.to_string(),
                    source: e,
                }),
            },
        }
    }
}

fn summarize(step: &ReasoningStep) -> String {
    match step {
        ReasoningStep::Plan { content } | ReasoningStep::Output { content } => content.clone(),
        ReasoningStep::Action { function, input } => format!("{function}({input})"),
        ReasoningStep::Observe { output } => output.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{HangingProvider, ScriptedProvider, StubTool};
    use std::sync::atomic::Ordering;
    use stepwise_core::conversation::ConversationEntry;
    use stepwise_core::error::ProviderError;

    const WEATHER_OBSERVATION: &str = "The weather in new york is Sunny +12°C.";

    fn weather_registry() -> (Arc<ToolRegistry>, Arc<std::sync::atomic::AtomicUsize>) {
        let tool = StubTool::new("get_weather", WEATHER_OBSERVATION);
        let calls = tool.calls();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(tool));
        (Arc::new(registry), calls)
    }

    fn agent(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> AgentLoop {
        AgentLoop::new(provider, "mock-model", 0.7, tools, Arc::new(EventBus::default()))
    }

    fn weather_script() -> Vec<&'static str> {
        vec![
            r#"{"step":"plan","content":"The user is interested in weather data of new york"}"#,
            r#"{"step":"plan","content":"From the available tools I should call get_weather"}"#,
            r#"{"step":"action","function":"get_weather","input":"new york"}"#,
            r#"{"step":"output","content":"The weather for new york seems to be 12 degrees."}"#,
        ]
    }

    fn assert_header_intact(conv: &Conversation, directive: &str, query: &str) {
        assert!(matches!(
            &conv.entries()[0],
            ConversationEntry::System { directive: d } if d == directive
        ));
        assert!(matches!(
            &conv.entries()[1],
            ConversationEntry::User { query: q } if q == query
        ));
    }

    #[tokio::test]
    async fn weather_query_runs_to_output() {
        let provider = Arc::new(ScriptedProvider::new(weather_script()));
        let tool = StubTool::new("get_weather", WEATHER_OBSERVATION);
        let calls = tool.calls();
        let inputs = tool.inputs();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(tool));
        let agent = agent(provider.clone(), Arc::new(registry));

        let mut conv = agent.conversation("What is the weather of new york?");
        let summary = agent.process(&mut conv).await.unwrap();

        assert_eq!(summary.answer, "The weather for new york seems to be 12 degrees.");
        assert_eq!(summary.rounds, 4);
        assert_eq!(summary.tool_calls, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*inputs.lock().unwrap(), vec![ToolInput::text("new york")]);
        assert_eq!(provider.call_count(), 4);

        // system, user, plan, plan, action, observe, output
        assert_eq!(conv.len(), 7);
        assert_eq!(
            conv.entries()[5].step(),
            Some(&ReasoningStep::observe(WEATHER_OBSERVATION))
        );
        assert_header_intact(&conv, agent.directive().as_str(), "What is the weather of new york?");
    }

    #[tokio::test]
    async fn every_action_is_followed_by_one_observe() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"action","function":"get_weather","input":"paris"}"#,
            r#"{"step":"action","function":"get_weather","input":"rome"}"#,
            r#"{"step":"output","content":"done"}"#,
        ]));
        let (tools, calls) = weather_registry();
        let agent = agent(provider, tools);

        let mut conv = agent.conversation("compare");
        agent.process(&mut conv).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let steps: Vec<&ReasoningStep> = conv.steps().collect();
        for (i, s) in steps.iter().enumerate() {
            if matches!(s, ReasoningStep::Action { .. }) {
                assert!(matches!(steps[i + 1], ReasoningStep::Observe { .. }));
                assert!(!matches!(steps.get(i + 2), Some(ReasoningStep::Observe { .. })));
            }
        }
    }

    #[tokio::test]
    async fn transcript_grows_every_round() {
        let provider = Arc::new(ScriptedProvider::new(weather_script()));
        let (tools, _) = weather_registry();
        let agent = agent(provider.clone(), tools);

        agent.run("What is the weather of new york?").await.unwrap();

        let requests = provider.requests();
        let sizes: Vec<usize> = requests
            .iter()
            .map(|r| Conversation::from_transcript(&r.transcript).unwrap().len())
            .collect();
        // The action round adds both the action and its observation.
        assert_eq!(sizes, vec![2, 3, 4, 6]);
        assert!(requests.iter().all(|r| r.system == agent.directive().as_str()));
        assert!(requests.iter().all(|r| r.json_mode));
    }

    #[tokio::test]
    async fn malformed_reply_terminates_without_tool_call() {
        let provider = Arc::new(ScriptedProvider::new(["not json"]));
        let (tools, calls) = weather_registry();
        let agent = agent(provider, tools);

        let mut conv = agent.conversation("hi");
        let err = agent.process(&mut conv).await.unwrap_err();

        match err {
            AgentError::Step(StepError::Malformed { raw, .. }) => assert_eq!(raw, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(conv.len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_looks_up_once() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"action","function":"delete_universe","input":""}"#,
        ]));
        let (tools, calls) = weather_registry();
        let agent = agent(provider, Arc::clone(&tools));

        let mut conv = agent.conversation("destroy everything");
        let err = agent.process(&mut conv).await.unwrap_err();

        match err {
            AgentError::Step(StepError::UnknownTool { function, .. }) => {
                assert_eq!(function, "delete_universe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tools.lookups(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_header_intact(&conv, agent.directive().as_str(), "destroy everything");
    }

    #[tokio::test]
    async fn unrecognized_step_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new([r#"{"step":"reflect","content":"hmm"}"#]));
        let (tools, _) = weather_registry();
        let agent = agent(provider, tools);

        let err = agent.run("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Step(StepError::UnknownStep { .. })));
    }

    #[tokio::test]
    async fn engine_authored_observe_is_kept_and_ignored() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"observe","output":"I made this up"}"#,
            r#"{"step":"output","content":"ok"}"#,
        ]));
        let (tools, calls) = weather_registry();
        let agent = agent(provider.clone(), tools);

        let mut conv = agent.conversation("hi");
        let summary = agent.process(&mut conv).await.unwrap();

        assert_eq!(summary.answer, "ok");
        assert_eq!(summary.tool_calls, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(conv.len(), 4);
        assert_eq!(conv.entries()[2].step(), Some(&ReasoningStep::observe("I made this up")));
    }

    #[tokio::test]
    async fn no_engine_call_after_output() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"output","content":"first"}"#,
            r#"{"step":"output","content":"second"}"#,
        ]));
        let (tools, _) = weather_registry();
        let agent = agent(provider.clone(), tools);

        let summary = agent.run("hi").await.unwrap();
        assert_eq!(summary.answer, "first");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn round_limit_stops_endless_planning() {
        let provider = Arc::new(ScriptedProvider::repeating(
            r#"{"step":"plan","content":"thinking"}"#,
            10,
        ));
        let (tools, _) = weather_registry();
        let agent = agent(provider.clone(), tools).with_max_rounds(3);

        let mut conv = agent.conversation("hi");
        let err = agent.process(&mut conv).await.unwrap_err();

        assert!(matches!(err, AgentError::RoundLimitExceeded { limit: 3 }));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(conv.len(), 5);
    }

    #[tokio::test]
    async fn provider_error_is_propagated() {
        let provider = Arc::new(ScriptedProvider::with_results([Err(
            ProviderError::RateLimited { retry_after_secs: 5 },
        )]));
        let (tools, _) = weather_registry();
        let agent = agent(provider, tools);

        let err = agent.run("hi").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Provider(ProviderError::RateLimited { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn engine_timeout() {
        let (tools, _) = weather_registry();
        let agent = agent(Arc::new(HangingProvider), tools)
            .with_engine_timeout(Duration::from_secs(5));

        let err = agent.run("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::EngineTimeout { secs: 5 }));
    }

    #[tokio::test]
    async fn tool_fault_is_observed_by_default() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"action","function":"flaky","input":"x"}"#,
            r#"{"step":"output","content":"sorry"}"#,
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(StubTool::failing("flaky", "disk on fire")));
        let agent = agent(provider, Arc::new(registry));

        let mut conv = agent.conversation("hi");
        let summary = agent.process(&mut conv).await.unwrap();

        assert_eq!(summary.answer, "sorry");
        match conv.entries()[3].step() {
            Some(ReasoningStep::Observe { output }) => {
                assert!(output.starts_with("Error: "), "{output}");
                assert!(output.contains("disk on fire"));
            }
            other => panic!("expected observe, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_fault_aborts_under_abort_policy() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"action","function":"flaky","input":"x"}"#,
            r#"{"step":"output","content":"unreachable"}"#,
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(StubTool::failing("flaky", "disk on fire")));
        let agent = agent(provider.clone(), Arc::new(registry))
            .with_tool_fault_policy(ToolFaultPolicy::Abort);

        let mut conv = agent.conversation("hi");
        let err = agent.process(&mut conv).await.unwrap_err();

        match err {
            AgentError::ToolFault { tool, source } => {
                assert_eq!(tool, "flaky");
                assert!(matches!(source, ToolError::ExecutionFailed { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(provider.call_count(), 1);
        // The action stays in the log; no observation follows it.
        assert_eq!(conv.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out_into_observation() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"action","function":"slow","input":"x"}"#,
            r#"{"step":"output","content":"gave up"}"#,
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(StubTool::slow("slow", Duration::from_secs(600))));
        let agent = agent(provider, Arc::new(registry)).with_tool_timeout(Duration::from_secs(1));

        let mut conv = agent.conversation("hi");
        let summary = agent.process(&mut conv).await.unwrap();

        assert_eq!(summary.answer, "gave up");
        assert_eq!(
            conv.entries()[3].step(),
            Some(&ReasoningStep::observe("Error: Tool timed out: slow after 1s"))
        );
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let provider = Arc::new(ScriptedProvider::new(weather_script()));
        let (tools, _) = weather_registry();
        let agent = agent(provider.clone(), tools);

        let token = CancellationToken::new();
        token.cancel();
        let mut conv = agent.conversation("hi");
        let err = agent.process_with_cancel(&mut conv, &token).await.unwrap_err();

        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(conv.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_engine_call() {
        let (tools, _) = weather_registry();
        let agent = agent(Arc::new(HangingProvider), tools);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let mut conv = agent.conversation("hi");
        let err = agent.process_with_cancel(&mut conv, &token).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_tool_call() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"step":"action","function":"slow","input":"x"}"#,
            r#"{"step":"output","content":"never reached"}"#,
        ]));
        let tool = StubTool::slow("slow", Duration::from_secs(600));
        let calls = tool.calls();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(tool));
        let agent = agent(provider.clone(), Arc::new(registry));

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let mut conv = agent.conversation("hi");
        let err = agent.process_with_cancel(&mut conv, &token).await.unwrap_err();

        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.call_count(), 1);
        // system, user, action; the interrupted call leaves no observation
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last_step().map(ReasoningStep::kind), Some("action"));
    }

    #[tokio::test]
    async fn events_trace_the_request() {
        let provider = Arc::new(ScriptedProvider::new(weather_script()));
        let (tools, _) = weather_registry();
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let agent = AgentLoop::new(provider, "mock-model", 0.7, tools, Arc::clone(&bus));

        agent.run("What is the weather of new york?").await.unwrap();

        let mut rounds = 0;
        let mut steps = Vec::new();
        let mut tools_run = 0;
        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            match event.as_ref() {
                DomainEvent::RoundStarted { .. } => rounds += 1,
                DomainEvent::StepReceived { kind, .. } => steps.push(kind.clone()),
                DomainEvent::ToolExecuted { success, .. } => {
                    assert!(success);
                    tools_run += 1;
                }
                DomainEvent::RequestCompleted { rounds: r, tool_calls, .. } => {
                    assert_eq!(*r, 4);
                    assert_eq!(*tool_calls, 1);
                    completed = true;
                }
                DomainEvent::RequestFailed { .. } => panic!("request should not fail"),
            }
        }
        assert_eq!(rounds, 4);
        assert_eq!(steps, vec!["plan", "plan", "action", "output"]);
        assert_eq!(tools_run, 1);
        assert!(completed);
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default();
        config.agent.max_rounds = 7;
        config.agent.on_tool_fault = ToolFaultPolicy::Abort;
        config.agent.system_prompt_override = Some("Be terse.".into());

        let (tools, _) = weather_registry();
        let agent = AgentLoop::from_config(
            &config,
            Arc::new(HangingProvider),
            tools,
            Arc::new(EventBus::default()),
        );

        assert_eq!(agent.max_rounds, 7);
        assert_eq!(agent.on_tool_fault, ToolFaultPolicy::Abort);
        assert_eq!(agent.directive().as_str(), "Be terse.");
        assert_eq!(agent.model(), "gemini-2.0-flash");
        assert_eq!(agent.max_tokens, Some(2048));
    }
}
