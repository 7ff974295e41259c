//! Tool registry and the long-term memory tools exposed to a conversational
//! agent.
//!
//! Tools are invoked with JSON arguments and a [`registry::ToolContext`]
//! naming the caller; [`memory::register_memory_tools`] wires the
//! `store_memory`, `search_memory` and `delete_memory` tools onto a
//! [`recall_memory::MemoryStore`].

#![warn(missing_docs, clippy::pedantic)]

pub mod memory;
pub mod registry;

pub use memory::{
    DeleteMemoryTool, SearchLimits, SearchMemoryTool, StoreMemoryTool, register_memory_tools,
    render_hits,
};
pub use registry::{
    Tool, ToolContext, ToolError, ToolHandle, ToolMetadata, ToolOutput, ToolRegistry, ToolResult,
};
