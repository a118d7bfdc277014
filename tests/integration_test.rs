// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end tests wiring the supervisor agent, session store, memory
//! system, and tool registry together the same way `serve()` does.
use std::sync::Arc;

use conduit_config::{AgentConfig, MemoryConfig};
use conduit_core::{AgentEvent, SupervisorAgent, TerminationReason};
use conduit_memory::MemorySystem;
use conduit_model::ScriptedMockProvider;
use conduit_session::{SessionKey, SessionStore};
use conduit_tools::{Tool, ToolCall, ToolOutput, ToolRegistry};
use tokio::sync::mpsc;

async fn harness(
    provider: ScriptedMockProvider,
    tools: ToolRegistry,
) -> (SupervisorAgent, Arc<SessionStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let memory = Arc::new(MemorySystem::open(dir.path(), MemoryConfig::default()).unwrap());
    let sessions = Arc::new(SessionStore::open(dir.path().join("sessions"), 8000).await.unwrap());
    let agent = SupervisorAgent::with_default_identity(
        Arc::new(provider),
        Arc::new(tools),
        memory,
        sessions.clone(),
        AgentConfig::default(),
    );
    (agent, sessions, dir)
}

async fn drain(rx: &mut mpsc::Receiver<AgentEvent>) -> (String, Option<TerminationReason>) {
    let mut text = String::new();
    let mut termination = None;
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::TextDelta(t) => text.push_str(&t),
            AgentEvent::TurnComplete(reason) => termination = Some(reason),
            _ => {}
        }
    }
    (text, termination)
}

#[tokio::test]
async fn plain_text_turn_round_trips_through_session_store() {
    let (agent, _sessions, _dir) = harness(ScriptedMockProvider::always_text("hello there"), ToolRegistry::new()).await;
    let key = SessionKey::parse("agent:default:main").unwrap();
    let (tx, mut rx) = mpsc::channel(16);

    agent.handle(&key, "hi", tx).await.unwrap();
    let (text, termination) = drain(&mut rx).await;

    assert_eq!(text, "hello there");
    assert_eq!(termination, Some(TerminationReason::Text));
}

struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "echo input back"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let text = call.args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
        ToolOutput::ok(&call.id, text)
    }
}

#[tokio::test]
async fn tool_call_then_text_completes_in_one_turn() {
    let provider = ScriptedMockProvider::tool_then_text("call-1", "echo", r#"{"text":"ping"}"#, "done");
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    let (agent, _sessions, _dir) = harness(provider, tools).await;

    let key = SessionKey::parse("agent:default:main").unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    agent.handle(&key, "ping please", tx).await.unwrap();
    let (text, termination) = drain(&mut rx).await;

    assert_eq!(text, "done");
    assert_eq!(termination, Some(TerminationReason::Text));
}

#[tokio::test]
async fn session_history_persists_across_turns() {
    let (agent, sessions, _dir) = harness(ScriptedMockProvider::always_text("ack"), ToolRegistry::new()).await;
    let key = SessionKey::parse("agent:default:telegram:alice").unwrap();

    for msg in ["first", "second"] {
        let (tx, mut rx) = mpsc::channel(16);
        agent.handle(&key, msg, tx).await.unwrap();
        drain(&mut rx).await;
    }

    let session = sessions.get(&key).await.expect("session should exist");
    let user_messages: Vec<_> = session
        .messages
        .iter()
        .filter(|m| matches!(m.role, conduit_model::Role::User))
        .collect();
    assert_eq!(user_messages.len(), 2);
}
