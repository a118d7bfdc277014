// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{Tool, ToolCall, ToolOutput};

/// A tool schema - mirrors conduit_model::ToolSchema but keeps this crate
/// independent from the model crate.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry holding all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

// SAFETY: ToolRegistry is Sync because:
// - HashMap<String, Arc<dyn Tool>> is Sync (String is Sync, Arc<T: Send + Sync> is Sync)
// - Tools implement Send + Sync (required by the Tool trait)
// - No interior mutability exists after construction (all methods take &self)
unsafe impl Sync for ToolRegistry {}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Produce schemas for all registered tools, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Whether `name` is registered and requires confirmation before running.
    pub fn needs_confirmation(&self, name: &str) -> bool {
        self.tools.get(name).map(|t| t.needs_confirmation()).unwrap_or(false)
    }

    /// The output category `name` declares, for context-aware truncation of
    /// its results. An unknown tool is treated as [`crate::OutputCategory::Generic`].
    pub fn output_category(&self, name: &str) -> crate::OutputCategory {
        self.tools.get(name).map(|t| t.output_category()).unwrap_or_default()
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => ToolOutput::err(&call.id, format!("unknown tool: {}", call.name)),
        }
    }

    /// Execute a tool call with a wall-clock bound. A tool that is still
    /// running when `timeout` elapses is abandoned (its future is dropped)
    /// and a retryable-looking error is returned to the caller - the agent
    /// loop treats this the same as any other tool error, never a panic.
    pub async fn execute_with_timeout(&self, call: &ToolCall, timeout: Duration) -> ToolOutput {
        let Some(tool) = self.tools.get(&call.name).cloned() else {
            return ToolOutput::err(&call.id, format!("unknown tool: {}", call.name));
        };
        match tokio::time::timeout(timeout, tool.execute(call)).await {
            Ok(output) => output,
            Err(_) => ToolOutput::err(&call.id, format!("tool '{}' timed out after {:?}", call.name, timeout)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
