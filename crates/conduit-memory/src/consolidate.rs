// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tier 1 maintenance: consolidation (cluster near-duplicate memories and
//! summarize them with an LLM call) and forgetting (prune low-value
//! entries). Both run over a snapshot of all entries handed in by the
//! caller (`MemorySystem::consolidate`), not directly against a backend, so
//! the clustering/scoring logic here stays storage-agnostic.

use conduit_config::MemoryConfig;
use conduit_model::{CompletionRequest, Message, ModelProvider, ResponseEvent};
use futures::StreamExt;

use crate::embedder::cosine_similarity;
use crate::entry::MemoryEntry;

const CONSOLIDATION_PROMPT: &str = "The following memory entries describe related facts, beliefs, or \
events about the same user. Merge them into a single, concise statement \
that preserves every distinct piece of information. Respond with the \
merged statement only, no preamble.";

/// A group of source entries judged similar enough to merge, plus the
/// resulting consolidated entry once summarization completes.
pub struct Cluster {
    pub source_ids: Vec<String>,
    pub consolidated: MemoryEntry,
}

/// Greedily group `entries` into clusters where every member is within
/// `cluster_similarity_threshold` cosine similarity of the cluster's first
/// member AND shares at least one tag with it. Singletons (no match) are
/// dropped from the result - there is nothing to consolidate for them.
fn cluster_candidates(entries: &[MemoryEntry], cfg: &MemoryConfig) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; entries.len()];
    let mut clusters = Vec::new();

    for i in 0..entries.len() {
        if assigned[i] {
            continue;
        }
        let mut group = vec![i];
        for j in (i + 1)..entries.len() {
            if assigned[j] {
                continue;
            }
            let sim = cosine_similarity(&entries[i].embedding, &entries[j].embedding);
            let shares_tag = entries[i].tags.iter().any(|t| entries[j].tags.contains(t));
            if sim >= cfg.cluster_similarity_threshold && shares_tag {
                group.push(j);
            }
        }
        if group.len() > 1 {
            for &idx in &group {
                assigned[idx] = true;
            }
            clusters.push(group);
        }
    }
    clusters
}

async fn summarize_with_llm(provider: &dyn ModelProvider, entries: &[&MemoryEntry]) -> anyhow::Result<String> {
    let bullet_list = entries.iter().map(|e| format!("- {}", e.content)).collect::<Vec<_>>().join("\n");
    let req = CompletionRequest {
        messages: vec![Message::system(CONSOLIDATION_PROMPT), Message::user(bullet_list)],
        stream: true,
        ..Default::default()
    };
    let mut stream = provider.complete(req).await?;
    let mut summary = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            ResponseEvent::TextDelta(t) => summary.push_str(&t),
            ResponseEvent::Done => break,
            _ => {}
        }
    }
    if summary.trim().is_empty() {
        anyhow::bail!("consolidation summarizer returned no text");
    }
    Ok(summary.trim().to_string())
}

/// Cluster `entries`, summarize each cluster with `provider`, and return the
/// resulting consolidated entries alongside the source ids they replace.
/// The caller is responsible for inserting the consolidated entries, decaying
/// or deleting the sources, and embedding the new content.
pub async fn consolidate(entries: &[MemoryEntry], provider: &dyn ModelProvider, cfg: &MemoryConfig) -> anyhow::Result<Vec<Cluster>> {
    let clusters = cluster_candidates(entries, cfg);
    let mut out = Vec::with_capacity(clusters.len());
    for group in clusters {
        let members: Vec<&MemoryEntry> = group.iter().map(|&i| &entries[i]).collect();
        let summary_text = summarize_with_llm(provider, &members).await?;

        let mut tags: Vec<String> = Vec::new();
        for m in &members {
            for t in &m.tags {
                if !tags.contains(t) {
                    tags.push(t.clone());
                }
            }
        }
        let max_confidence = members.iter().map(|m| m.confidence).fold(0.0f32, f32::max);
        let mut consolidated = MemoryEntry::new(summary_text, Some("consolidation".to_string()), tags, None);
        consolidated.confidence = max_confidence;

        out.push(Cluster { source_ids: members.iter().map(|m| m.id.clone()).collect(), consolidated });
    }
    Ok(out)
}

/// Decayed confidence for a source entry that was folded into a cluster.
pub fn decay_confidence(original: f32, cfg: &MemoryConfig) -> f32 {
    original * cfg.consolidation_decay
}

/// Whether `entry` is eligible to be forgotten (physically deleted). `fact`
/// and `solution` entries are always exempt regardless of confidence or
/// access count.
pub fn is_forgettable(entry: &MemoryEntry, cfg: &MemoryConfig) -> bool {
    !entry.is_forgetting_exempt() && entry.confidence < cfg.forget_confidence_below && entry.access_count < cfg.forget_access_count_below
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_model::ScriptedMockProvider;

    fn entry(content: &str, tags: Vec<&str>, embedding: Vec<f32>) -> MemoryEntry {
        let mut e = MemoryEntry::new(content, None, tags.into_iter().map(String::from).collect(), None);
        e.embedding = embedding;
        e
    }

    #[test]
    fn clustering_groups_similar_entries_with_shared_tags() {
        let cfg = MemoryConfig::default();
        let entries = vec![
            entry("likes python", vec!["python"], vec![1.0, 0.0]),
            entry("prefers python 3.12", vec!["python"], vec![0.99, 0.01]),
            entry("weather is cold", vec!["weather"], vec![0.0, 1.0]),
        ];
        let clusters = cluster_candidates(&entries, &cfg);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }

    #[test]
    fn clustering_requires_shared_tag_even_if_similar() {
        let cfg = MemoryConfig::default();
        let entries = vec![
            entry("a", vec!["x"], vec![1.0, 0.0]),
            entry("b", vec!["y"], vec![0.99, 0.01]),
        ];
        assert!(cluster_candidates(&entries, &cfg).is_empty());
    }

    #[tokio::test]
    async fn consolidate_merges_cluster_into_single_summary() {
        let cfg = MemoryConfig::default();
        let entries = vec![
            entry("likes python", vec!["python"], vec![1.0, 0.0]),
            entry("prefers python 3.12 with uv", vec!["python"], vec![0.99, 0.01]),
        ];
        let provider = ScriptedMockProvider::always_text("User likes Python, specifically 3.12 with uv");
        let clusters = consolidate(&entries, &provider, &cfg).await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].source_ids.len(), 2);
        assert!(clusters[0].consolidated.content.contains("Python"));
        assert_eq!(clusters[0].consolidated.entry_type, "consolidation");
    }

    #[test]
    fn decay_confidence_applies_multiplier() {
        let cfg = MemoryConfig::default();
        assert!((decay_confidence(1.0, &cfg) - cfg.consolidation_decay).abs() < 1e-6);
    }

    #[test]
    fn low_confidence_low_access_belief_is_forgettable() {
        let cfg = MemoryConfig::default();
        let mut e = entry("x", vec![], vec![]);
        e.entry_type = "belief".to_string();
        e.confidence = 0.1;
        e.access_count = 0;
        assert!(is_forgettable(&e, &cfg));
    }

    #[test]
    fn fact_is_never_forgettable_regardless_of_confidence() {
        let cfg = MemoryConfig::default();
        let mut e = entry("x", vec![], vec![]);
        e.entry_type = "fact".to_string();
        e.confidence = 0.0;
        e.access_count = 0;
        assert!(!is_forgettable(&e, &cfg));
    }

    #[test]
    fn high_access_count_protects_low_confidence_entry() {
        let cfg = MemoryConfig::default();
        let mut e = entry("x", vec![], vec![]);
        e.entry_type = "belief".to_string();
        e.confidence = 0.1;
        e.access_count = 10;
        assert!(!is_forgettable(&e, &cfg));
    }
}
