// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! The WebSocket JSON-RPC 2.0 bridge: one connection, one JSON text frame
//! per request/response/event. Frames are processed sequentially per
//! connection (simplest implementation satisfying the ordering guarantees
//! in the spec: events for one `message_id` are FIFO, and nothing on a
//! connection can interleave with them since nothing else runs
//! concurrently on that connection).

use std::{net::SocketAddr, sync::Arc};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, warn};

use conduit_core::{AgentEvent, TerminationReason};
use conduit_session::SessionKey;

use crate::auth::{strip_bearer, AuthResult};
use crate::gateway::GatewayState;
use crate::rpc;

const WS_STATUS_TOO_MANY_CONNECTIONS: u16 = 1013;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let handshake_token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_bearer)
        .map(|s| s.to_string());

    ws.on_upgrade(move |socket| handle_socket(socket, state, addr.ip(), handshake_token))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<GatewayState>,
    peer_ip: std::net::IpAddr,
    handshake_token: Option<String>,
) {
    if !state.try_acquire_connection() {
        let mut socket = socket;
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: WS_STATUS_TOO_MANY_CONNECTIONS,
                reason: "too many connections".into(),
            })))
            .await;
        return;
    }

    // Handshake-supplied tokens authenticate the whole connection; absent
    // that, every request must carry its own `params.token`.
    let connection_authenticated = match &handshake_token {
        Some(t) => matches!(state.auth.verify(peer_ip, Some(t)), AuthResult::Ok),
        None => false,
    };

    let (mut sink, mut stream) = socket.split();

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if text.len() > state.config.max_frame_bytes {
                    let _ = send(&mut sink, rpc::error(None, rpc::INVALID_REQUEST, "frame too large")).await;
                    continue;
                }
                if process_frame(&mut sink, &mut stream, &state, peer_ip, connection_authenticated, &text).await.is_break()
                {
                    break;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                // Text frames only; binary frames are rejected per the wire contract.
                let _ = sink
                    .send(Message::Close(Some(CloseFrame { code: 1003, reason: "binary frames are rejected".into() })))
                    .await;
                break;
            }
            Some(Ok(Message::Ping(data))) => {
                if sink.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                debug!("WebSocket recv error: {e}");
                break;
            }
        }
    }

    state.release_connection();
    debug!("WebSocket connection closed");
}

enum Flow {
    Continue,
    Break,
}

impl Flow {
    fn is_break(&self) -> bool {
        matches!(self, Flow::Break)
    }
}

type Sink = futures::stream::SplitSink<WebSocket, Message>;
type Stream = futures::stream::SplitStream<WebSocket>;

async fn send(sink: &mut Sink, frame: Value) -> Result<(), axum::Error> {
    sink.send(Message::Text(frame.to_string())).await
}

async fn process_frame(
    sink: &mut Sink,
    stream: &mut Stream,
    state: &Arc<GatewayState>,
    peer_ip: std::net::IpAddr,
    connection_authenticated: bool,
    text: &str,
) -> Flow {
    let req: rpc::RpcRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            let _ = send(sink, rpc::error(None, rpc::PARSE_ERROR, format!("parse error: {e}"))).await;
            return Flow::Continue;
        }
    };

    let id = req.id.clone();

    if req.method != "health" && !connection_authenticated {
        let provided = req.params.get("token").and_then(|v| v.as_str());
        match state.auth.verify(peer_ip, provided) {
            AuthResult::Ok => {}
            AuthResult::Unauthorized => {
                let _ = send(sink, rpc::error(id, rpc::UNAUTHORIZED, "unauthorized")).await;
                return Flow::Continue;
            }
            AuthResult::RateLimited => {
                let _ = send(sink, rpc::error(id, rpc::UNAUTHORIZED, "too many failed attempts")).await;
                return Flow::Continue;
            }
        }
    }

    match req.method.as_str() {
        "health" => {
            let _ = send(
                sink,
                rpc::result(
                    id,
                    json!({
                        "status": "ok",
                        "version": env!("CARGO_PKG_VERSION"),
                        "timestamp": chrono::Utc::now(),
                    }),
                ),
            )
            .await;
            Flow::Continue
        }
        "chat.send" => {
            handle_chat_send(sink, state, id, &req.params).await;
            Flow::Continue
        }
        "chat.send_stream" => handle_chat_send_stream(sink, stream, state, id, &req.params).await,
        "chat.history" => {
            handle_chat_history(sink, state, id, &req.params).await;
            Flow::Continue
        }
        "sessions.list" => {
            handle_sessions_list(sink, state, id, &req.params).await;
            Flow::Continue
        }
        "sessions.delete" => {
            handle_sessions_delete(sink, state, id, &req.params).await;
            Flow::Continue
        }
        other => {
            let _ = send(sink, rpc::error(id, rpc::METHOD_NOT_FOUND, format!("unknown method: {other}"))).await;
            Flow::Continue
        }
    }
}

fn parse_session_key(params: &Value) -> Option<SessionKey> {
    let raw = params.get("session_key")?.as_str()?;
    SessionKey::parse(raw).ok()
}

/// Accumulate one turn's events into a single reply string. Confirmation
/// prompts and sanitized error text are folded into the same channel the
/// model's own text deltas use, since the wire contract defines no separate
/// "needs input" event type — the distinguishing behavior (no further LLM
/// round-trip happens until the user answers) already lives in
/// [`conduit_core::SupervisorAgent`].
fn fold_event(text: &mut String, event: &AgentEvent) {
    match event {
        AgentEvent::TextDelta(delta) => text.push_str(delta),
        AgentEvent::NeedsConfirmation { prompt, .. } => text.push_str(prompt),
        AgentEvent::Error(_) => text.push_str("I couldn't complete that."),
        AgentEvent::ToolCallStarted(_) | AgentEvent::ToolCallFinished { .. } | AgentEvent::TurnComplete(_) => {}
    }
}

async fn handle_chat_send(sink: &mut Sink, state: &Arc<GatewayState>, id: Option<Value>, params: &Value) {
    let Some(text) = params.get("text").and_then(|v| v.as_str()) else {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "missing `text`")).await;
        return;
    };
    if text.chars().count() > state.config.max_input_chars {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "text exceeds max_input_chars")).await;
        return;
    }
    let Some(key) = parse_session_key(params) else {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "missing or malformed `session_key`")).await;
        return;
    };

    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let agent = state.agent.clone();
    let owned_text = text.to_string();
    let owned_key = key.clone();
    let handle = tokio::spawn(async move { agent.handle(&owned_key, &owned_text, tx).await });

    let mut reply = String::new();
    while let Some(event) = rx.recv().await {
        fold_event(&mut reply, &event);
    }
    let turn_failed = match handle.await {
        Ok(Err(e)) => {
            warn!(error = %e, "agent turn failed");
            true
        }
        Err(e) => {
            warn!(error = %e, "agent turn task panicked");
            true
        }
        Ok(Ok(())) => false,
    };
    if turn_failed {
        let _ = send(sink, rpc::error(id, rpc::INTERNAL_ERROR, "agent turn failed")).await;
        return;
    }

    let message_id = uuid::Uuid::new_v4().to_string();
    let _ = send(
        sink,
        rpc::result(
            id,
            json!({
                "message_id": message_id,
                "text": reply,
                "session_key": key.to_string(),
                "timestamp": chrono::Utc::now(),
            }),
        ),
    )
    .await;
}

/// Drives `chat.send_stream`: `chat.start` → zero or more `chat.delta` →
/// `chat.end` → the RPC result. A client disconnect mid-turn aborts the
/// in-flight agent task and drops the partial message — no `chat.end` is
/// sent, matching the cancellation contract.
async fn handle_chat_send_stream(
    sink: &mut Sink,
    stream: &mut Stream,
    state: &Arc<GatewayState>,
    id: Option<Value>,
    params: &Value,
) -> Flow {
    let Some(text) = params.get("text").and_then(|v| v.as_str()) else {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "missing `text`")).await;
        return Flow::Continue;
    };
    if text.chars().count() > state.config.max_input_chars {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "text exceeds max_input_chars")).await;
        return Flow::Continue;
    }
    let Some(key) = parse_session_key(params) else {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "missing or malformed `session_key`")).await;
        return Flow::Continue;
    };

    let message_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let agent = state.agent.clone();
    let owned_text = text.to_string();
    let owned_key = key.clone();
    let handle = tokio::spawn(async move { agent.handle(&owned_key, &owned_text, tx).await });

    if send(sink, rpc::event("chat.start", json!({ "message_id": message_id }))).await.is_err() {
        handle.abort();
        return Flow::Break;
    }

    loop {
        tokio::select! {
            biased;
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        handle.abort();
                        return Flow::Break;
                    }
                    Some(Err(_)) => {
                        handle.abort();
                        return Flow::Break;
                    }
                    // A client that pipelines another request mid-stream is
                    // out of scope for this bridge; well-behaved clients
                    // wait for chat.end before sending the next frame.
                    _ => {}
                }
            }
            event = rx.recv() => {
                match event {
                    Some(AgentEvent::TurnComplete(_reason)) => break,
                    Some(ev) => {
                        let mut delta = String::new();
                        fold_event(&mut delta, &ev);
                        if !delta.is_empty() {
                            if send(sink, rpc::event("chat.delta", json!({ "delta": delta }))).await.is_err() {
                                handle.abort();
                                return Flow::Break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let turn_failed = match handle.await {
        Ok(Err(e)) => {
            warn!(error = %e, "agent turn failed");
            true
        }
        Err(e) => {
            warn!(error = %e, "agent turn task panicked");
            true
        }
        Ok(Ok(())) => false,
    };

    let _ = send(sink, rpc::event("chat.end", json!({ "message_id": message_id }))).await;
    if turn_failed {
        let _ = send(sink, rpc::error(id, rpc::INTERNAL_ERROR, "agent turn failed")).await;
    } else {
        let _ = send(
            sink,
            rpc::result(id, json!({ "message_id": message_id, "stream": true })),
        )
        .await;
    }
    Flow::Continue
}

async fn handle_chat_history(sink: &mut Sink, state: &Arc<GatewayState>, id: Option<Value>, params: &Value) {
    let Some(key) = parse_session_key(params) else {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "missing or malformed `session_key`")).await;
        return;
    };
    let limit = params.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);

    let messages = match state.sessions.get(&key).await {
        Some(session) => {
            let all = session.messages;
            let start = limit.map(|n| all.len().saturating_sub(n)).unwrap_or(0);
            all[start..].to_vec()
        }
        None => Vec::new(),
    };

    let _ = send(sink, rpc::result(id, json!({ "messages": messages }))).await;
}

async fn handle_sessions_list(sink: &mut Sink, state: &Arc<GatewayState>, id: Option<Value>, params: &Value) {
    let agent_id = params.get("agent_id").and_then(|v| v.as_str());
    let sessions = state.sessions.list_sessions(agent_id).await;
    let sessions: Vec<Value> = sessions
        .into_iter()
        .map(|m| {
            json!({
                "session_key": m.key,
                "agent_id": m.agent_id,
                "created_at": m.created_at,
                "updated_at": m.updated_at,
                "message_count": m.message_count,
            })
        })
        .collect();
    let _ = send(sink, rpc::result(id, json!({ "sessions": sessions }))).await;
}

async fn handle_sessions_delete(sink: &mut Sink, state: &Arc<GatewayState>, id: Option<Value>, params: &Value) {
    let Some(key) = parse_session_key(params) else {
        let _ = send(sink, rpc::error(id, rpc::INVALID_PARAMS, "missing or malformed `session_key`")).await;
        return;
    };
    match state.sessions.delete(&key).await {
        Ok(()) => {
            let _ = send(sink, rpc::result(id, json!({ "deleted": true }))).await;
        }
        Err(e) => {
            let _ = send(sink, rpc::error(id, rpc::INTERNAL_ERROR, format!("{e}"))).await;
        }
    }
}
