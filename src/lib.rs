//! # ai-lib-orchestrator
//!
//! 面向对话式 AI 客户端 SDK 的请求编排层：预检、重试、超时、流式事件消费与工具注册。
//!
//! Request orchestration for a conversational-AI client SDK. The SDK owns the
//! wire protocol and the model; this crate owns everything around a prompt:
//! deciding whether the client is usable, bounding how long a prompt may take,
//! retrying what is worth retrying, and turning pushed session events into an
//! ordered, per-turn stream.
//!
//! ## Core Philosophy
//!
//! - **Fail closed**: no request is issued until liveness and authentication pass
//! - **Isolate failures**: one failed prompt never takes down the rest of a run
//! - **Explicit lifecycle**: sessions cannot outlive the client, turns cannot overlap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_lib_orchestrator::{Orchestrator, OrchestratorConfig, ScriptedClient};
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_orchestrator::Result<()> {
//!     let config = OrchestratorConfig::default();
//!     let orchestrator = Orchestrator::new(ScriptedClient::default(), config);
//!
//!     let prompts = vec!["What is 2 + 2?".to_string()];
//!     let report = orchestrator.run(&prompts).await?;
//!     println!("{} of {} prompts succeeded", report.succeeded(), report.prompts.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | SDK boundary traits, lifecycle/session wrappers, scripted client |
//! | [`config`] | YAML + environment configuration |
//! | [`orchestrator`] | Full run pipeline and model comparison |
//! | [`preflight`] | Liveness, authentication and capability checks |
//! | [`resilience`] | Retry with exponential backoff and timeout wrapper |
//! | [`streaming`] | Callback-to-queue bridge and per-turn event consumption |
//! | [`tools`] | Tool registry and built-in tools |
//! | [`types`] | Events, tool and model types |

pub mod client;
pub mod config;
pub mod orchestrator;
pub mod preflight;
pub mod resilience;
pub mod streaming;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use client::{ClientHandle, ManagedClient, ManagedSession, ScriptedClient, SessionHandle};
pub use config::OrchestratorConfig;
pub use orchestrator::{Orchestrator, PromptOutcome, RunReport, TurnOutcome};
pub use preflight::{preflight, PreflightConfig, PreflightReport};
pub use resilience::{retry_async, with_timeout, RetryPolicy};
pub use streaming::TurnSummary;
pub use types::{SessionConfig, SessionEvent, Tool, ToolResult};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
