// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones (system → XDG →
/// workspace-local).
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/conduit/config.yaml"));
    paths.push(PathBuf::from("/etc/conduit/config.yml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/conduit/config.yaml"));
        paths.push(home.join(".config/conduit/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("conduit/config.yaml"));
        paths.push(cfg.join("conduit/config.yml"));
    }

    paths.push(PathBuf::from(".conduit/config.yaml"));
    paths.push(PathBuf::from(".conduit/config.yml"));
    paths.push(PathBuf::from("conduit.yaml"));
    paths.push(PathBuf::from("conduit.yml"));

    paths
}

/// Load configuration by deep-merging every discovered YAML file, then
/// applying the selected environment-variable overrides. `extra` may supply
/// an explicit path (e.g. a `--config` CLI flag), applied last (highest
/// priority).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Apply well-known environment variables on top of whatever the YAML
/// layers produced. Env vars always win, matching the CLI's `--env` clap
/// convention used elsewhere in this codebase for secrets that should never
/// land in a committed config file.
fn apply_env_overrides(config: &mut Config) {
    use std::env;

    if let Ok(v) = env::var("LLM_PROVIDER") {
        config.model.provider = v;
    }
    if let Ok(v) = env::var("LLM_MODEL") {
        config.model.name = v;
    }
    if env::var("LLM_API_KEY").is_ok() {
        config.model.api_key_env = Some("LLM_API_KEY".to_string());
    }
    if let Ok(v) = env::var("LLM_BASE_URL") {
        config.model.base_url = Some(v);
    }

    if let Ok(v) = env::var("EMBEDDING_PROVIDER") {
        config.embedding.provider = v;
    }
    if let Ok(v) = env::var("EMBEDDING_MODEL") {
        config.embedding.model = v;
    }
    if let Ok(v) = env::var("EMBEDDING_BASE_URL") {
        config.embedding.base_url = Some(v);
    }

    if let Ok(v) = env::var("GATEWAY_HOST") {
        config.gateway.host = v;
    }
    if let Ok(v) = env::var("GATEWAY_PORT") {
        if let Ok(port) = v.parse() {
            config.gateway.port = port;
        }
    }
    if let Ok(v) = env::var("GATEWAY_AUTH_TOKEN") {
        config.gateway.auth_token = Some(v);
    }
    if let Ok(v) = env::var("GATEWAY_MAX_CONNECTIONS") {
        if let Ok(n) = v.parse() {
            config.gateway.max_connections = n;
        }
    }

    if let Ok(v) = env::var("DATA_DIR") {
        config.data_dir = PathBuf::from(v);
    }
}

/// Deep-merge `src` into `dst`; `src` wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a: 1\nb: 2");
        let src = val("b: 99");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["a"].as_i64(), Some(1));
        assert_eq!(dst["b"].as_i64(), Some(99));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("gateway:\n  host: 0.0.0.0\n  port: 1234");
        let src = val("gateway:\n  port: 9999");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["gateway"]["host"].as_str(), Some("0.0.0.0"));
        assert_eq!(dst["gateway"]["port"].as_i64(), Some(9999));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/conduit_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        // Ensure no GATEWAY_* env vars bleed in from the test harness.
        std::env::remove_var("GATEWAY_PORT");
        let cfg = load(None).unwrap();
        assert_eq!(cfg.gateway.port, 8787);
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "gateway:\n  port: 4000\n  max_connections: 50").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.gateway.port, 4000);
        assert_eq!(cfg.gateway.max_connections, 50);
    }

    #[test]
    fn env_var_overrides_yaml_layer() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "gateway:\n  port: 4000").unwrap();
        std::env::set_var("GATEWAY_PORT", "5555");
        let cfg = load(Some(f.path())).unwrap();
        std::env::remove_var("GATEWAY_PORT");
        assert_eq!(cfg.gateway.port, 5555);
    }
}
