// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Root configuration for the conduit gateway process.
///
/// Loaded by [`crate::load`] from a layered set of YAML files (see
/// `loader.rs`), each section falling back to its own defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// Root directory for all persisted state: `sessions/`,
    /// `delivery-queue/`, `memories/`. Mirrors the `DATA_DIR` environment
    /// variable.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("conduit")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier (e.g. "openai", "anthropic", "mock"). The concrete
    /// provider implementation is out of scope for this repository; only the
    /// `LLMAdapter` contract (`conduit_model::ModelProvider`) is specified.
    pub provider: String,
    /// Model name forwarded to the provider.
    pub name: String,
    /// Environment variable that holds the API key.
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Hard per-call timeout in seconds. Default 60s.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub cache_system_prompt: bool,
    #[serde(default = "default_true")]
    pub cache_tools: bool,
    #[serde(default)]
    pub cache_conversation: bool,
    #[serde(default)]
    pub extended_cache_time: bool,
}

fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            name: "gpt-4o-mini".to_string(),
            api_key_env: Some("LLM_API_KEY".to_string()),
            base_url: None,
            max_tokens: None,
            temperature: None,
            timeout_secs: default_llm_timeout_secs(),
            cache_system_prompt: true,
            cache_tools: true,
            cache_conversation: false,
            extended_cache_time: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// Embedding vector dimension. A store rebuild is required to change this.
    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,
}

fn default_embedding_dim() -> usize {
    256
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: "hash-256".to_string(),
            base_url: None,
            dimension: default_embedding_dim(),
        }
    }
}

/// Supervisor agent tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool-execution iterations per turn before the agent gives up.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Per-tool execution timeout in seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Bounded retry attempts for a single LLM call.
    #[serde(default = "default_llm_retry_attempts")]
    pub llm_retry_attempts: u32,
    /// Base delay (seconds) for the LLM call retry's exponential backoff.
    #[serde(default = "default_llm_retry_base_secs")]
    pub llm_retry_base_secs: u64,
    /// Working-memory token budget (Tier 0). Default 8000.
    #[serde(default = "default_working_memory_tokens")]
    pub working_memory_max_tokens: usize,
    /// Number of most-recent non-system messages kept verbatim when working
    /// memory is compressed.
    #[serde(default = "default_working_memory_keep_recent")]
    pub working_memory_keep_recent: usize,
    /// Number of long-term memories injected into context per turn.
    #[serde(default = "default_recall_top_k")]
    pub recall_top_k: usize,
    /// TTL, in seconds, for a pending confirmation before it is discarded.
    #[serde(default = "default_confirmation_ttl_secs")]
    pub confirmation_ttl_secs: u64,
    /// Confirmation lexemes (case-insensitive, trimmed before compare).
    #[serde(default = "default_confirm_lexemes")]
    pub confirm_lexemes: Vec<String>,
    /// Cancellation lexemes (case-insensitive, trimmed before compare).
    #[serde(default = "default_cancel_lexemes")]
    pub cancel_lexemes: Vec<String>,
    /// Token budget for a single tool result before it is truncated by
    /// category-aware extraction rather than dropped from context wholesale.
    #[serde(default = "default_tool_result_token_cap")]
    pub tool_result_token_cap: usize,
}

fn default_max_steps() -> u32 {
    10
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_llm_retry_attempts() -> u32 {
    3
}
fn default_llm_retry_base_secs() -> u64 {
    1
}
fn default_working_memory_tokens() -> usize {
    8000
}
fn default_working_memory_keep_recent() -> usize {
    5
}
fn default_recall_top_k() -> usize {
    5
}
fn default_confirmation_ttl_secs() -> u64 {
    300
}
fn default_confirm_lexemes() -> Vec<String> {
    ["yes", "是", "确认", "ok", "go", "confirm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_cancel_lexemes() -> Vec<String> {
    ["no", "取消", "cancel", "stop", "算了"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_tool_result_token_cap() -> usize {
    4000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            tool_timeout_secs: default_tool_timeout_secs(),
            llm_retry_attempts: default_llm_retry_attempts(),
            llm_retry_base_secs: default_llm_retry_base_secs(),
            working_memory_max_tokens: default_working_memory_tokens(),
            working_memory_keep_recent: default_working_memory_keep_recent(),
            recall_top_k: default_recall_top_k(),
            confirmation_ttl_secs: default_confirmation_ttl_secs(),
            confirm_lexemes: default_confirm_lexemes(),
            cancel_lexemes: default_cancel_lexemes(),
            tool_result_token_cap: default_tool_result_token_cap(),
        }
    }
}

/// Gateway tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Bearer token required on every method except `health`. `None` disables
    /// auth entirely (intended for local development only).
    pub auth_token: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Failed-auth attempts allowed per IP per minute before a lockout.
    #[serde(default = "default_auth_failures_per_minute")]
    pub auth_failures_per_minute: u32,
    #[serde(default = "default_auth_failure_burst")]
    pub auth_failure_burst: u32,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}
fn default_gateway_port() -> u16 {
    8787
}
fn default_max_connections() -> usize {
    1000
}
fn default_max_input_chars() -> usize {
    10_000
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}
fn default_auth_failures_per_minute() -> u32 {
    5
}
fn default_auth_failure_burst() -> u32 {
    2
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            auth_token: None,
            max_connections: default_max_connections(),
            max_input_chars: default_max_input_chars(),
            max_frame_bytes: default_max_frame_bytes(),
            auth_failures_per_minute: default_auth_failures_per_minute(),
            auth_failure_burst: default_auth_failure_burst(),
        }
    }
}

/// Delivery queue tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff schedule in seconds, indexed by `retryCount - 1` and clamped
    /// to the last entry. Default: `{5, 25, 120, 600}`.
    #[serde(default = "default_backoff_schedule_secs")]
    pub backoff_schedule_secs: Vec<u64>,
}

fn default_scan_interval_secs() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    5
}
fn default_backoff_schedule_secs() -> Vec<u64> {
    vec![5, 25, 120, 600]
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            max_retries: default_max_retries(),
            backoff_schedule_secs: default_backoff_schedule_secs(),
        }
    }
}

/// Session store tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are eligible for archival.
    #[serde(default = "default_archive_age_days")]
    pub archive_age_days: u32,
}

fn default_archive_age_days() -> u32 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            archive_age_days: default_archive_age_days(),
        }
    }
}

/// Memory system tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Fusion weight for vector cosine similarity.
    #[serde(default = "default_w_vec")]
    pub w_vec: f32,
    /// Fusion weight for keyword (BM25-style) rank.
    #[serde(default = "default_w_kw")]
    pub w_kw: f32,
    /// Fusion weight for the RIF composite score.
    #[serde(default = "default_w_rif")]
    pub w_rif: f32,
    /// RIF recency weight.
    #[serde(default = "default_rif_w_r")]
    pub rif_w_recency: f32,
    /// RIF importance weight.
    #[serde(default = "default_rif_w_i")]
    pub rif_w_importance: f32,
    /// RIF frequency weight.
    #[serde(default = "default_rif_w_f")]
    pub rif_w_frequency: f32,
    /// Recency half-life in hours (τ in `recency = exp(-hours/τ)`).
    #[serde(default = "default_recency_tau_hours")]
    pub recency_tau_hours: f32,
    /// Cosine-similarity threshold for clustering during consolidation.
    #[serde(default = "default_cluster_threshold")]
    pub cluster_similarity_threshold: f32,
    /// Confidence multiplier applied to source entries after consolidation.
    #[serde(default = "default_consolidation_decay")]
    pub consolidation_decay: f32,
    /// Forgetting threshold: entries below this confidence are eligible.
    #[serde(default = "default_forget_confidence_below")]
    pub forget_confidence_below: f32,
    /// Forgetting threshold: entries with fewer accesses are eligible.
    #[serde(default = "default_forget_access_count")]
    pub forget_access_count_below: u32,
}

fn default_w_vec() -> f32 {
    0.5
}
fn default_w_kw() -> f32 {
    0.2
}
fn default_w_rif() -> f32 {
    0.3
}
fn default_rif_w_r() -> f32 {
    0.34
}
fn default_rif_w_i() -> f32 {
    0.33
}
fn default_rif_w_f() -> f32 {
    0.33
}
fn default_recency_tau_hours() -> f32 {
    24.0
}
fn default_cluster_threshold() -> f32 {
    0.85
}
fn default_consolidation_decay() -> f32 {
    0.7
}
fn default_forget_confidence_below() -> f32 {
    0.3
}
fn default_forget_access_count() -> u32 {
    2
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            w_vec: default_w_vec(),
            w_kw: default_w_kw(),
            w_rif: default_w_rif(),
            rif_w_recency: default_rif_w_r(),
            rif_w_importance: default_rif_w_i(),
            rif_w_frequency: default_rif_w_f(),
            recency_tau_hours: default_recency_tau_hours(),
            cluster_similarity_threshold: default_cluster_threshold(),
            consolidation_decay: default_consolidation_decay(),
            forget_confidence_below: default_forget_confidence_below(),
            forget_access_count_below: default_forget_access_count(),
        }
    }
}

/// Channel bus tunables. Concrete adapters (Telegram,
/// Discord, Slack) are out of scope; this configures the bus itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Per-channel allow-lists, keyed by channel name. Empty/absent entry
    /// means "accept all senders" for that channel.
    #[serde(default)]
    pub allow_lists: std::collections::HashMap<String, Vec<String>>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
