//! 类型系统模块：定义会话事件、工具与探测结果等核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that crosses the client SDK
//! boundary.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionEvent`] | Event delivered during a turn (delta, tool activity, idle) |
//! | [`Tool`] | Caller-supplied callback the model may invoke |
//! | [`ToolDefinition`] | Tool definition advertised to the model |
//! | [`SessionConfig`] | Model, streaming flag, tools and system message for a session |
//! | [`PingResponse`] / [`AuthStatus`] / [`ModelInfo`] | Probe payloads used by preflight |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_orchestrator::types::{SessionConfig, Tool, ToolResult};
//!
//! let shout = Tool::new("shout", "Upper-case the input", |args| {
//!     ToolResult::ok(args["text"].as_str().unwrap_or_default().to_uppercase())
//! });
//!
//! let config = SessionConfig::new("gpt-5-mini")
//!     .streaming(true)
//!     .with_tools(vec![shout])
//!     .with_system_message("Be concise.");
//! assert_eq!(config.tools.len(), 1);
//! ```

pub mod events;
pub mod model;
pub mod tool;

pub use events::SessionEvent;
pub use model::{
    format_token_limit, AssistantMessage, AuthStatus, ModelCapabilities, ModelInfo, ModelLimits,
    ModelSupports, PingResponse, SessionConfig,
};
pub use tool::{Tool, ToolDefinition, ToolFn, ToolResult};
