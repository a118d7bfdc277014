// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod provider;
mod mock;
pub mod toolcall;

pub use types::*;
pub use provider::{ModelProvider, ResponseStream};
pub use mock::{MockProvider, ScriptedMockProvider};

use conduit_config::ModelConfig;

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Concrete network-backed drivers are out of scope for this repository;
/// the only implementation wired up here is [`MockProvider`], used for local
/// development and tests. Production deployments supply their own
/// `ModelProvider` implementation and pass it to the supervisor agent
/// directly rather than going through this resolver.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "mock" => Ok(Box::new(MockProvider)),
        other => anyhow::bail!(
            "unknown model provider: {other:?}; only \"mock\" is built into this crate, \
             supply a custom ModelProvider for real backends"
        ),
    }
}
