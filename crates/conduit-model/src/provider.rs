// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// Provider-agnostic LLM adapter contract.
///
/// Concrete providers (OpenAI, Anthropic, ...) are out of scope for this
/// repository; callers construct a [`ModelProvider`] elsewhere and hand it to
/// the supervisor agent. [`crate::mock::MockProvider`] is the only
/// implementation shipped here, for tests and local development.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display and logging.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    ///
    /// Implementations without native tool-calling should instead prompt the
    /// model to emit `<tool_call>{...}</tool_call>` blocks and run the
    /// resulting text through [`crate::toolcall::extract_tool_calls`].
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}
