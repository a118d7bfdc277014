// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! JSON-RPC 2.0 frame shapes and the standard error codes used on the wire.
//!
//! One frame is one UTF-8 JSON document. A connection carries three kinds:
//! a client request (`id` + `method`), a server response (`id` + one of
//! `result`/`error`), and a server-initiated event (no `id`, `method:
//! "event"`).

use serde::Deserialize;
use serde_json::{json, Value};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const UNAUTHORIZED: i64 = -32001;

/// An incoming JSON-RPC request frame, as parsed off the wire.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

pub fn result(id: Option<Value>, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message.into() } })
}

/// A server-initiated event frame. Carries no `id`; framed as
/// `{"jsonrpc":"2.0","method":"event","params":{"type":<str>,...}}`.
pub fn event(event_type: &str, mut params: Value) -> Value {
    if let Value::Object(ref mut map) = params {
        map.insert("type".to_string(), Value::String(event_type.to_string()));
    }
    json!({ "jsonrpc": "2.0", "method": "event", "params": params })
}
