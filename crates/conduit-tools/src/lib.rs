// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod events;
pub mod registry;
pub mod tool;

pub use events::{TodoItem, ToolEvent};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput, ToolOutputPart};

pub use builtin::memory_note::{CapturedNote, MemoryNoteTool, NoteBuffer};
pub use builtin::task_list::{TaskClearTool, TaskListState, TaskListTool};
