//! Client SDK boundary.
//!
//! The conversational-AI SDK is an external collaborator. The orchestrator
//! only consumes the small async surface below; the wire protocol, process
//! management and model invocation all stay inside the SDK.
//!
//! Implementation details are split into submodules under `src/client/`:
//! [`lifecycle`] enforces start/stop ordering, [`session`] enforces one turn at
//! a time, and [`scripted`] is an in-memory implementation for dry runs and
//! tests.

pub mod lifecycle;
pub mod scripted;
pub mod session;

pub use lifecycle::{ClientState, ManagedClient};
pub use scripted::{CallCounts, ScriptStep, ScriptedClient, ScriptedClientBuilder, ScriptedReply};
pub use session::ManagedSession;

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{
    AssistantMessage, AuthStatus, ModelInfo, PingResponse, SessionConfig, SessionEvent,
};
use crate::Result;

/// Callback the SDK invokes once per session event, in emission order.
pub type EventHandler = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Handle to a running client process or connection.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    type Session: SessionHandle + 'static;

    async fn start(&self) -> Result<()>;

    /// Liveness check.
    async fn ping(&self, label: &str) -> Result<PingResponse>;

    async fn get_auth_status(&self) -> Result<AuthStatus>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    async fn create_session(&self, config: SessionConfig) -> Result<Self::Session>;

    /// Shut the client down, returning any shutdown warnings.
    async fn stop(&self) -> Vec<String>;
}

/// Conversation context bound to one model.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    fn id(&self) -> &str;

    /// Register the event callback.
    fn on(&self, handler: EventHandler);

    /// Fire-and-forget: events for the turn follow through the registered handler.
    async fn send(&self, prompt: &str) -> Result<()>;

    /// Send and block until the turn completes.
    async fn send_and_wait(&self, prompt: &str) -> Result<AssistantMessage>;

    async fn destroy(&self) -> Result<()>;
}
