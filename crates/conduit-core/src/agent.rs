// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The supervisor agent: the model/tool-calling loop that drives a single
//! turn of conversation. A bounded round counter, bounded LLM-call retry,
//! and tool-call extraction from streamed text (for providers with no
//! native tool-calling) compose with this system's confirmation gate and
//! memory integration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{instrument, warn};

use conduit_config::AgentConfig;
use conduit_memory::MemorySystem;
use conduit_model::{
    toolcall::{contains_malformed_tool_call, extract_tool_calls},
    CompletionRequest, Message, ModelProvider, ResponseEvent, ResponseStream,
};
use conduit_session::{Session, SessionKey, SessionStore};
use conduit_tools::{ToolCall, ToolRegistry};

use crate::compact::smart_truncate;
use crate::confirmation::{ConfirmationOutcome, ConfirmationStore};
use crate::events::{AgentEvent, TerminationReason};
use crate::prompts::{system_prompt, DEFAULT_IDENTITY};

/// Bound on how many times one turn will nudge the model after it emits a
/// malformed `<tool_call>` block as plain text, before giving up and
/// surfacing the text as-is. Mirrors the teacher's empty-turn retry cap.
const MAX_MALFORMED_RETRIES: u32 = 2;

pub struct SupervisorAgent {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    memory: Arc<MemorySystem>,
    sessions: Arc<SessionStore>,
    confirmations: Arc<ConfirmationStore>,
    config: AgentConfig,
    identity: String,
}

/// In-flight accumulation of a streamed tool call. Some providers stream
/// argument JSON incrementally under a stable id; concatenating by id and
/// parsing once the stream ends handles both that and single-shot providers.
#[derive(Default)]
struct PendingToolCall {
    name: String,
    arguments: String,
}

impl SupervisorAgent {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<MemorySystem>,
        sessions: Arc<SessionStore>,
        config: AgentConfig,
        identity: impl Into<String>,
    ) -> Self {
        let confirmations =
            ConfirmationStore::new(config.confirmation_ttl_secs, config.confirm_lexemes.clone(), config.cancel_lexemes.clone());
        Self { model, tools, memory, sessions, confirmations, config, identity: identity.into() }
    }

    pub fn with_default_identity(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<MemorySystem>,
        sessions: Arc<SessionStore>,
        config: AgentConfig,
    ) -> Self {
        Self::new(model, tools, memory, sessions, config, DEFAULT_IDENTITY)
    }

    /// Run one turn: load the session, resolve any pending confirmation,
    /// otherwise drive the full agent loop, and persist the result. Events
    /// are streamed to `tx` as they happen; the channel's receiver drives
    /// the gateway's `chat.delta`/`chat.end` frames.
    #[instrument(skip(self, tx), fields(session_key = %key))]
    pub async fn handle(&self, key: &SessionKey, user_input: &str, tx: tokio::sync::mpsc::Sender<AgentEvent>) -> anyhow::Result<()> {
        let canonical = key.to_string();
        // Held for the whole turn: a second concurrent request for this
        // sessionKey blocks here rather than interleaving with this turn's
        // reads/writes, and since confirmation state is only ever touched
        // while this guard is held, it is serialized along with it.
        let _session_guard = self.sessions.acquire(key).await;
        let mut session = self.sessions.get_or_create_locked(key).await;

        let (outcome, pending) = self.confirmations.resolve(&canonical, user_input).await;
        match outcome {
            ConfirmationOutcome::Confirmed => {
                let pending = pending.expect("Confirmed outcome always carries the consumed entry");
                self.run_confirmed_tool(&mut session, pending, &tx).await?;
            }
            ConfirmationOutcome::Cancelled => {
                session.push(Message::user(user_input));
                session.push(Message::assistant("Okay, cancelled."));
                let _ = tx.send(AgentEvent::TextDelta("Okay, cancelled.".to_string())).await;
                let _ = tx.send(AgentEvent::TurnComplete(TerminationReason::Text)).await;
            }
            ConfirmationOutcome::NotApplicable | ConfirmationOutcome::Expired => {
                self.run_loop(&mut session, user_input, &tx).await?;
            }
        }

        self.sessions.save_locked(&mut session).await?;
        Ok(())
    }

    async fn run_confirmed_tool(
        &self,
        session: &mut Session,
        pending: crate::confirmation::PendingConfirmation,
        tx: &tokio::sync::mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()> {
        let call = ToolCall { id: uuid::Uuid::new_v4().to_string(), name: pending.tool_name.clone(), args: pending.parameters.clone() };
        let _ = tx.send(AgentEvent::ToolCallStarted(call.clone())).await;
        let output = self.tools.execute_with_timeout(&call, Duration::from_secs(self.config.tool_timeout_secs)).await;
        let _ = tx
            .send(AgentEvent::ToolCallFinished {
                call_id: output.call_id.clone(),
                tool_name: pending.tool_name.clone(),
                output: output.content.clone(),
                is_error: output.is_error,
            })
            .await;

        let category = self.tools.output_category(&call.name);
        let content = smart_truncate(&output.content, category, self.config.tool_result_token_cap);
        session.push(Message::tool_call(&call.id, &call.name, call.args.to_string()));
        session.push(Message::tool_result(&call.id, &content));

        self.run_loop_continuation(session, tx).await
    }

    async fn run_loop(&self, session: &mut Session, user_input: &str, tx: &tokio::sync::mpsc::Sender<AgentEvent>) -> anyhow::Result<()> {
        let memory_context = self.memory.recall(user_input, Some(self.config.recall_top_k), None).await.unwrap_or_default();
        if !memory_context.is_empty() {
            session.push(Message::system(format!("[Relevant memory] {memory_context}")));
        }
        session.push(Message::user(user_input));
        self.run_loop_continuation(session, tx).await
    }

    /// Shared tail of the agent loop: builds the message list from the
    /// current session state and iterates until a final reply, a
    /// confirmation gate, an error, or the step cap.
    async fn run_loop_continuation(&self, session: &mut Session, tx: &tokio::sync::mpsc::Sender<AgentEvent>) -> anyhow::Result<()> {
        let schemas = self.tools.schemas();
        let system = system_prompt(&self.identity, &schemas);
        let model_schemas: Vec<conduit_model::ToolSchema> = schemas
            .iter()
            .map(|s| conduit_model::ToolSchema { name: s.name.clone(), description: s.description.clone(), parameters: s.parameters.clone() })
            .collect();

        let mut malformed_retries = 0u32;

        for _step in 0..self.config.max_steps {
            let working_set = conduit_memory::compress_working_set(
                &session.messages,
                self.config.working_memory_max_tokens,
                self.config.working_memory_keep_recent,
            );
            session.replace_messages(working_set.clone());

            let mut messages = vec![Message::system(&system)];
            messages.extend(working_set);

            let request = CompletionRequest { messages, tools: model_schemas.clone(), stream: true, ..Default::default() };

            let stream = match self.complete_with_retry(request).await {
                Ok(s) => s,
                Err(err) => {
                    let _ = tx.send(AgentEvent::Error(err.to_string())).await;
                    let _ = tx.send(AgentEvent::TurnComplete(TerminationReason::Error)).await;
                    return Ok(());
                }
            };

            let (text, tool_calls) = self.drain_stream(stream, tx).await;

            if tool_calls.is_empty() {
                let (extracted, remainder) = extract_tool_calls(&text);
                if extracted.is_empty() {
                    let final_text = if remainder.is_empty() { text.clone() } else { remainder };
                    if contains_malformed_tool_call(&final_text) && malformed_retries < MAX_MALFORMED_RETRIES {
                        malformed_retries += 1;
                        session.push(Message::assistant(&final_text));
                        session.push(Message::user(
                            "You included a tool call in your text response using the wrong format. \
                             Do not write tool calls as text. Use the structured tool-call protocol \
                             provided by your schema.",
                        ));
                        continue;
                    }
                    session.push(Message::assistant(final_text));
                    let _ = tx.send(AgentEvent::TurnComplete(TerminationReason::Text)).await;
                    return Ok(());
                }
                let first = &extracted[0];
                let call = ToolCall {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: first.name.clone(),
                    args: serde_json::from_str(&first.arguments).unwrap_or(serde_json::Value::Null),
                };
                if !self.dispatch_tool_call(session, call, tx).await? {
                    return Ok(());
                }
                continue;
            }

            let call = tool_calls.into_iter().next().expect("checked non-empty above");
            if !self.dispatch_tool_call(session, call, tx).await? {
                return Ok(());
            }
        }

        session.push(Message::assistant(
            "I wasn't able to finish this within the allotted number of steps. Could you narrow the request?",
        ));
        let _ = tx.send(AgentEvent::TurnComplete(TerminationReason::StepCapExceeded)).await;
        Ok(())
    }

    /// Execute (or gate) one proposed tool call. Returns `Ok(true)` if the
    /// loop should continue to the next iteration, `Ok(false)` if the turn
    /// has already been terminated (confirmation gate).
    async fn dispatch_tool_call(&self, session: &mut Session, call: ToolCall, tx: &tokio::sync::mpsc::Sender<AgentEvent>) -> anyhow::Result<bool> {
        if self.tools.needs_confirmation(&call.name) {
            let prompt = format!("This will run `{}` with {}. Reply to confirm or cancel.", call.name, call.args);
            self.confirmations.set(&session.key, call.name.clone(), call.args.clone()).await;
            let _ = tx.send(AgentEvent::NeedsConfirmation { tool_name: call.name.clone(), prompt }).await;
            let _ = tx.send(AgentEvent::TurnComplete(TerminationReason::NeedsConfirmation)).await;
            return Ok(false);
        }

        let _ = tx.send(AgentEvent::ToolCallStarted(call.clone())).await;
        let output = self.tools.execute_with_timeout(&call, Duration::from_secs(self.config.tool_timeout_secs)).await;
        let _ = tx
            .send(AgentEvent::ToolCallFinished {
                call_id: output.call_id.clone(),
                tool_name: call.name.clone(),
                output: output.content.clone(),
                is_error: output.is_error,
            })
            .await;

        let category = self.tools.output_category(&call.name);
        let content = smart_truncate(&output.content, category, self.config.tool_result_token_cap);
        session.push(Message::tool_call(&call.id, &call.name, call.args.to_string()));
        session.push(Message::tool_result(&call.id, &content));
        Ok(true)
    }

    /// Issue `request` with bounded exponential-backoff retry. Retries apply
    /// only to failures of the initial call (connection/auth/etc); once a
    /// stream is returned, errors surfacing mid-stream are reported to the
    /// caller as-is.
    async fn complete_with_retry(&self, request: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let mut attempt = 0;
        loop {
            match self.model.complete(request.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(err) if attempt + 1 < self.config.llm_retry_attempts => {
                    let delay = Duration::from_secs(self.config.llm_retry_base_secs * 2u64.pow(attempt));
                    warn!(attempt, error = %err, "LLM call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Consume a response stream, forwarding text deltas as events and
    /// accumulating any tool calls. Returns the full text and any finalized
    /// tool calls.
    async fn drain_stream(&self, mut stream: ResponseStream, tx: &tokio::sync::mpsc::Sender<AgentEvent>) -> (String, Vec<ToolCall>) {
        let mut text = String::new();
        let mut pending: HashMap<String, PendingToolCall> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        while let Some(event) = stream.next().await {
            match event {
                Ok(ResponseEvent::TextDelta(delta)) => {
                    text.push_str(&delta);
                    let _ = tx.send(AgentEvent::TextDelta(delta)).await;
                }
                Ok(ResponseEvent::ThinkingDelta(_)) => {}
                Ok(ResponseEvent::ToolCall { id, name, arguments }) => {
                    let entry = pending.entry(id.clone()).or_default();
                    if !name.is_empty() {
                        entry.name = name;
                    }
                    entry.arguments.push_str(&arguments);
                    if !order.contains(&id) {
                        order.push(id);
                    }
                }
                Ok(ResponseEvent::Usage(_)) | Ok(ResponseEvent::Done) => {}
                Ok(ResponseEvent::Error(msg)) => {
                    let _ = tx.send(AgentEvent::Error(msg)).await;
                }
                Err(err) => {
                    let _ = tx.send(AgentEvent::Error(err.to_string())).await;
                }
            }
        }

        let calls = order
            .into_iter()
            .filter_map(|id| {
                let entry = pending.remove(&id)?;
                let args = serde_json::from_str(&entry.arguments).unwrap_or(serde_json::Value::Null);
                Some(ToolCall { id, name: entry.name, args })
            })
            .collect();

        (text, calls)
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_model::ScriptedMockProvider;
    use tempfile::tempdir;

    struct EchoTool;

    #[async_trait::async_trait]
    impl conduit_tools::Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> conduit_tools::ToolOutput {
            conduit_tools::ToolOutput::ok(&call.id, format!("echoed:{}", call.args))
        }
    }

    struct DeleteTool;

    #[async_trait::async_trait]
    impl conduit_tools::Tool for DeleteTool {
        fn name(&self) -> &str {
            "delete_everything"
        }
        fn description(&self) -> &str {
            "deletes everything"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn needs_confirmation(&self) -> bool {
            true
        }
        async fn execute(&self, call: &ToolCall) -> conduit_tools::ToolOutput {
            conduit_tools::ToolOutput::ok(&call.id, "deleted")
        }
    }

    async fn agent_with(provider: ScriptedMockProvider, tools: ToolRegistry) -> (SupervisorAgent, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let memory = Arc::new(MemorySystem::open(dir.path(), conduit_config::MemoryConfig::default()).unwrap());
        let sessions = Arc::new(SessionStore::open(dir.path().join("sessions"), 8000).await.unwrap());
        let agent = SupervisorAgent::with_default_identity(Arc::new(provider), Arc::new(tools), memory, sessions, AgentConfig::default());
        (agent, dir)
    }

    async fn drain(mut rx: tokio::sync::mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        // Drain anything still in flight after the handle() future completed.
        while let Some(ev) = rx.recv().await {
            out.push(ev);
            if rx.is_empty() {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn plain_text_reply_ends_turn_with_text_reason() {
        let (agent, _dir) = agent_with(ScriptedMockProvider::always_text("hello there"), ToolRegistry::new()).await;
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        agent.handle(&SessionKey::main("bob"), "hi", tx).await.unwrap();
        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TextDelta(t) if t == "hello there")));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TurnComplete(TerminationReason::Text))));
    }

    #[tokio::test]
    async fn tool_call_then_text_executes_tool_and_continues() {
        let provider = ScriptedMockProvider::tool_then_text("c1", "echo", r#"{"x":1}"#, "done");
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        let (agent, _dir) = agent_with(provider, tools).await;
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        agent.handle(&SessionKey::main("bob"), "run echo", tx).await.unwrap();
        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallFinished { tool_name, .. } if tool_name == "echo")));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TurnComplete(TerminationReason::Text))));
    }

    #[tokio::test]
    async fn destructive_tool_call_stops_for_confirmation() {
        let provider = ScriptedMockProvider::tool_then_text("c1", "delete_everything", r#"{}"#, "unreachable");
        let mut tools = ToolRegistry::new();
        tools.register(DeleteTool);
        let (agent, _dir) = agent_with(provider, tools).await;
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        agent.handle(&SessionKey::main("bob"), "delete it all", tx).await.unwrap();
        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::NeedsConfirmation { tool_name, .. } if tool_name == "delete_everything")));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TurnComplete(TerminationReason::NeedsConfirmation))));
    }

    #[tokio::test]
    async fn confirming_a_pending_tool_executes_it_without_another_llm_decision() {
        let provider = ScriptedMockProvider::tool_then_text("c1", "delete_everything", r#"{}"#, "all done");
        let mut tools = ToolRegistry::new();
        tools.register(DeleteTool);
        let (agent, _dir) = agent_with(provider, tools).await;
        let key = SessionKey::main("bob");

        let (tx1, _rx1) = tokio::sync::mpsc::channel(32);
        agent.handle(&key, "delete it all", tx1).await.unwrap();

        let (tx2, rx2) = tokio::sync::mpsc::channel(32);
        agent.handle(&key, "yes", tx2).await.unwrap();
        let events = drain(rx2).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallFinished { tool_name, is_error: false, .. } if tool_name == "delete_everything")));
    }

    #[tokio::test]
    async fn cancelling_a_pending_tool_skips_execution() {
        let provider = ScriptedMockProvider::tool_then_text("c1", "delete_everything", r#"{}"#, "unreachable");
        let mut tools = ToolRegistry::new();
        tools.register(DeleteTool);
        let (agent, _dir) = agent_with(provider, tools).await;
        let key = SessionKey::main("bob");

        let (tx1, _rx1) = tokio::sync::mpsc::channel(32);
        agent.handle(&key, "delete it all", tx1).await.unwrap();

        let (tx2, rx2) = tokio::sync::mpsc::channel(32);
        agent.handle(&key, "no", tx2).await.unwrap();
        let events = drain(rx2).await;
        assert!(!events.iter().any(|e| matches!(e, AgentEvent::ToolCallFinished { .. })));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TextDelta(t) if t.contains("cancelled"))));
    }

    #[tokio::test]
    async fn step_cap_is_respected() {
        // Always emits a tool call referencing a registered but slow-looping tool,
        // so the loop should exhaust max_steps rather than run forever.
        let scripts: Vec<Vec<conduit_model::ResponseEvent>> = (0..20)
            .map(|_| {
                vec![
                    conduit_model::ResponseEvent::ToolCall { id: "c".into(), name: "echo".into(), arguments: "{}".into() },
                    conduit_model::ResponseEvent::Done,
                ]
            })
            .collect();
        let provider = ScriptedMockProvider::new(scripts);
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        let mut cfg = AgentConfig::default();
        cfg.max_steps = 3;
        let dir = tempdir().unwrap();
        let memory = Arc::new(MemorySystem::open(dir.path(), conduit_config::MemoryConfig::default()).unwrap());
        let sessions = Arc::new(SessionStore::open(dir.path().join("sessions"), 8000).await.unwrap());
        let agent = SupervisorAgent::with_default_identity(Arc::new(provider), Arc::new(tools), memory, sessions, cfg);

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        agent.handle(&SessionKey::main("bob"), "loop forever", tx).await.unwrap();
        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TurnComplete(TerminationReason::StepCapExceeded))));
    }

    #[tokio::test]
    async fn malformed_tool_call_text_is_nudged_then_recovers() {
        // First two turns emit a broken <tool_call> block as plain text;
        // the third emits a real tool call, demonstrating the nudge gave
        // the model room to correct itself within MAX_MALFORMED_RETRIES.
        let scripts: Vec<Vec<conduit_model::ResponseEvent>> = vec![
            vec![conduit_model::ResponseEvent::TextDelta("<tool_call>{not json</tool_call>".into()), conduit_model::ResponseEvent::Done],
            vec![conduit_model::ResponseEvent::TextDelta("<tool_call>{not json</tool_call>".into()), conduit_model::ResponseEvent::Done],
            vec![
                conduit_model::ResponseEvent::ToolCall { id: "c1".into(), name: "echo".into(), arguments: r#"{"x":1}"#.into() },
                conduit_model::ResponseEvent::Done,
            ],
            vec![conduit_model::ResponseEvent::TextDelta("done".into()), conduit_model::ResponseEvent::Done],
        ];
        let provider = ScriptedMockProvider::new(scripts);
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        let (agent, _dir) = agent_with(provider, tools).await;
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        agent.handle(&SessionKey::main("bob"), "do the thing", tx).await.unwrap();
        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallFinished { tool_name, .. } if tool_name == "echo")));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TurnComplete(TerminationReason::Text))));
    }

    #[tokio::test]
    async fn malformed_tool_call_text_gives_up_after_retry_cap() {
        // Every turn emits the same broken block, forever - the loop must
        // stop nudging after MAX_MALFORMED_RETRIES and surface the text.
        let scripts: Vec<Vec<conduit_model::ResponseEvent>> = (0..10)
            .map(|_| vec![conduit_model::ResponseEvent::TextDelta("<tool_call>{not json</tool_call>".into()), conduit_model::ResponseEvent::Done])
            .collect();
        let provider = ScriptedMockProvider::new(scripts);
        let (agent, _dir) = agent_with(provider, ToolRegistry::new()).await;
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        agent.handle(&SessionKey::main("bob"), "do the thing", tx).await.unwrap();
        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TurnComplete(TerminationReason::Text))));
    }

    struct OversizedTool;

    #[async_trait::async_trait]
    impl conduit_tools::Tool for OversizedTool {
        fn name(&self) -> &str {
            "oversized"
        }
        fn description(&self) -> &str {
            "returns a huge result"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> conduit_tools::ToolOutput {
            let lines: Vec<String> = (0..500).map(|i| format!("line {i} of filler output text")).collect();
            conduit_tools::ToolOutput::ok(&call.id, lines.join("\n"))
        }
    }

    #[tokio::test]
    async fn oversized_tool_result_is_truncated_before_being_stored() {
        let provider = ScriptedMockProvider::tool_then_text("c1", "oversized", r#"{}"#, "done");
        let mut tools = ToolRegistry::new();
        tools.register(OversizedTool);
        let dir = tempdir().unwrap();
        let memory = Arc::new(MemorySystem::open(dir.path(), conduit_config::MemoryConfig::default()).unwrap());
        let sessions = Arc::new(SessionStore::open(dir.path().join("sessions"), 8000).await.unwrap());
        let mut cfg = AgentConfig::default();
        cfg.tool_result_token_cap = 50;
        let agent = SupervisorAgent::with_default_identity(Arc::new(provider), Arc::new(tools), memory, sessions.clone(), cfg);

        let key = SessionKey::main("bob");
        let (tx, _rx) = tokio::sync::mpsc::channel(64);
        agent.handle(&key, "run it", tx).await.unwrap();

        let session = sessions.get_or_create(&key).await;
        let tool_result_content = session
            .messages
            .iter()
            .find_map(|m| match &m.content {
                conduit_model::MessageContent::ToolResult { content, .. } => Some(content.clone()),
                _ => None,
            })
            .expect("a tool_result message was pushed");
        assert!(tool_result_content.len() < 500 * "line 000 of filler output text".len());
        assert!(tool_result_content.contains("truncated") || tool_result_content.lines().count() < 500);
    }
}
