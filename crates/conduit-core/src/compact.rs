// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic, content-aware tool-result truncation.
//!
//! Applied to a tool's output before it is pushed into the session as a
//! `{role: tool}` message, so a single oversized result (a long match list, a
//! dumped file) cannot blow the working-memory token budget on its own.
//! Dispatching on [`conduit_tools::OutputCategory`] (not on tool names) keeps
//! this independent of the concrete tool catalogue - each tool declares its
//! own category.

use conduit_tools::OutputCategory;

/// Returns `content` unchanged when it fits within `cap_tokens` (tokens
/// approximated as 4 characters each, matching [`conduit_model::Message::approx_tokens`]).
/// Otherwise applies a category-specific extraction strategy and appends a
/// notice so the model knows additional content exists.
pub fn smart_truncate(content: &str, category: OutputCategory, cap_tokens: usize) -> String {
    if cap_tokens == 0 {
        return content.to_string();
    }
    let cap_chars = cap_tokens * 4;
    if content.len() <= cap_chars {
        return content.to_string();
    }
    let omitted_bytes = content.len().saturating_sub(cap_chars);
    match category {
        OutputCategory::MatchList => head_lines(
            content,
            cap_chars,
            &format!(
                "[... {{lines}} more matches omitted ({omitted_bytes} bytes); \
                 use a more specific query to see them ...]"
            ),
        ),
        OutputCategory::Generic => {
            let cut = content[..cap_chars].rfind('\n').map(|p| p + 1).unwrap_or(cap_chars);
            format!(
                "{}\n[... {omitted_bytes} bytes omitted; content truncated to fit context budget ...]",
                &content[..cut]
            )
        }
    }
}

/// Keep only the leading lines that fit within `cap_chars`.
fn head_lines(content: &str, cap_chars: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = String::with_capacity(cap_chars);
    let mut kept_count = 0usize;
    for line in &lines {
        let needed = if kept.is_empty() { line.len() } else { line.len() + 1 };
        if kept.len() + needed > cap_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_count += 1;
    }
    let omitted = lines.len().saturating_sub(kept_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{kept}\n{notice}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smart_truncate_returns_original_when_under_cap() {
        let short = "hello world";
        assert_eq!(smart_truncate(short, OutputCategory::Generic, 100), short);
    }

    #[test]
    fn smart_truncate_zero_cap_returns_original() {
        let content = "a".repeat(10_000);
        assert_eq!(smart_truncate(&content, OutputCategory::Generic, 0), content);
    }

    #[test]
    fn smart_truncate_empty_content_returns_empty() {
        assert_eq!(smart_truncate("", OutputCategory::Generic, 10), "");
    }

    #[test]
    fn generic_truncation_cuts_at_line_boundary_and_appends_notice() {
        let content = (0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let truncated = smart_truncate(&content, OutputCategory::Generic, 20);
        assert!(truncated.len() < content.len());
        assert!(truncated.contains("bytes omitted"));
        assert!(!truncated.contains("line 199"));
    }

    #[test]
    fn match_list_truncation_keeps_leading_matches() {
        let content = (0..100).map(|i| format!("match {i}")).collect::<Vec<_>>().join("\n");
        let truncated = smart_truncate(&content, OutputCategory::MatchList, 20);
        assert!(truncated.starts_with("match 0"));
        assert!(truncated.contains("more matches omitted"));
        assert!(!truncated.contains("match 99"));
    }
}
