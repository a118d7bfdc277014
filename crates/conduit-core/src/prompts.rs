// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System prompt construction. The prompt declares the agent's identity and
//! personality, then lists the tools available this turn with their JSON
//! schemas so the model can decide whether and how to call them.

use conduit_tools::ToolSchema;

/// Default identity used when no personality config is supplied. Concrete
/// personality/skill loading is out of scope here; callers that need a
/// custom identity pass one in directly.
pub const DEFAULT_IDENTITY: &str = "You are a helpful personal assistant with access to a set of tools. \
Use a tool only when it is needed to answer the user; otherwise reply directly.";

/// Build the system prompt for one turn: identity/personality text followed
/// by a compact tool catalogue.
pub fn system_prompt(identity: &str, tools: &[ToolSchema]) -> String {
    let mut prompt = String::from(identity);
    prompt.push('\n');

    if tools.is_empty() {
        return prompt;
    }

    prompt.push_str("\nAvailable tools:\n");
    for tool in tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    prompt.push_str(
        "\nTo call a tool, respond with exactly one block of the form \
         <tool_call>{\"name\": \"<tool name>\", \"arguments\": { ... }}</tool_call>. \
         Only one tool call per response.",
    );
    prompt
}
