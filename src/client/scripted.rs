//! In-memory client for dry runs and tests.
//!
//! Behaves like the real SDK from the orchestrator's point of view: checks can
//! fail or stall, turns stream deltas from a background task, registered tools
//! are invoked mid-turn, and every call is counted so tests can assert on what
//! did (or did not) happen.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

use super::{ClientHandle, EventHandler, SessionHandle};
use crate::tools::ToolRegistry;
use crate::types::{
    AssistantMessage, AuthStatus, ModelInfo, PingResponse, SessionConfig, SessionEvent,
};
use crate::{Error, Result};

/// One step of a scripted turn.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Stream a piece of assistant content.
    Delta(String),
    /// Invoke a registered tool with these arguments.
    Tool {
        name: String,
        arguments: serde_json::Value,
    },
    /// Wait before the next step.
    Pause(Duration),
    /// Report a `session.error` event.
    Error(String),
}

/// How the scripted session answers one prompt.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Steps(Vec<ScriptStep>),
    /// The send itself fails with a transient error.
    Fail(String),
    /// The turn never completes.
    Hang,
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        ScriptedReply::Steps(vec![ScriptStep::Delta(content.into())])
    }

    pub fn deltas<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedReply::Steps(parts.into_iter().map(|p| ScriptStep::Delta(p.into())).collect())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        ScriptedReply::Fail(message.into())
    }
}

/// Snapshot of how often each client/session operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub start: usize,
    pub ping: usize,
    pub auth: usize,
    pub list_models: usize,
    pub create_session: usize,
    pub send: usize,
    pub destroy: usize,
    pub stop: usize,
}

#[derive(Default)]
struct Counters {
    start: AtomicUsize,
    ping: AtomicUsize,
    auth: AtomicUsize,
    list_models: AtomicUsize,
    create_session: AtomicUsize,
    send: AtomicUsize,
    destroy: AtomicUsize,
    stop: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Decrement `budget` if positive; true when a failure should be injected.
fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

struct Shared {
    start_failures: AtomicU32,
    session_failures: AtomicU32,
    ping_failure: Option<String>,
    ping_delay: Option<Duration>,
    protocol_version: u32,
    auth: AuthStatus,
    auth_failure: Option<String>,
    models: Vec<ModelInfo>,
    models_failure: Option<String>,
    replies: Mutex<VecDeque<ScriptedReply>>,
    stop_warnings: Vec<String>,
    counters: Counters,
}

impl Shared {
    fn next_reply(&self, model: &str, prompt: &str) -> ScriptedReply {
        let queued = match self.replies.lock() {
            Ok(mut q) => q.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        queued.unwrap_or_else(|| ScriptedReply::text(format!("[{model}] {prompt}")))
    }
}

/// Builder for [`ScriptedClient`].
pub struct ScriptedClientBuilder {
    start_failures: u32,
    session_failures: u32,
    ping_failure: Option<String>,
    ping_delay: Option<Duration>,
    protocol_version: u32,
    auth: AuthStatus,
    auth_failure: Option<String>,
    models: Vec<ModelInfo>,
    models_failure: Option<String>,
    replies: VecDeque<ScriptedReply>,
    stop_warnings: Vec<String>,
}

impl Default for ScriptedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedClientBuilder {
    pub fn new() -> Self {
        Self {
            start_failures: 0,
            session_failures: 0,
            ping_failure: None,
            ping_delay: None,
            protocol_version: 2,
            auth: AuthStatus::authenticated("dry-run"),
            auth_failure: None,
            models: default_models(),
            models_failure: None,
            replies: VecDeque::new(),
            stop_warnings: Vec::new(),
        }
    }

    /// Fail the first `n` start calls.
    pub fn fail_start(mut self, n: u32) -> Self {
        self.start_failures = n;
        self
    }

    /// Fail the first `n` session creations.
    pub fn fail_session_creation(mut self, n: u32) -> Self {
        self.session_failures = n;
        self
    }

    pub fn ping_failure(mut self, message: impl Into<String>) -> Self {
        self.ping_failure = Some(message.into());
        self
    }

    pub fn ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = Some(delay);
        self
    }

    pub fn protocol_version(mut self, version: u32) -> Self {
        self.protocol_version = version;
        self
    }

    pub fn auth_status(mut self, auth: AuthStatus) -> Self {
        self.auth = auth;
        self
    }

    pub fn unauthenticated(self, message: impl Into<String>) -> Self {
        self.auth_status(AuthStatus::unauthenticated(message))
    }

    /// Make the auth check itself fail.
    pub fn auth_failure(mut self, message: impl Into<String>) -> Self {
        self.auth_failure = Some(message.into());
        self
    }

    pub fn models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    pub fn list_models_failure(mut self, message: impl Into<String>) -> Self {
        self.models_failure = Some(message.into());
        self
    }

    /// Queue a reply; replies are consumed one per prompt, across sessions.
    /// Once the queue is empty, prompts are echoed back.
    pub fn reply(mut self, reply: ScriptedReply) -> Self {
        self.replies.push_back(reply);
        self
    }

    pub fn stop_warning(mut self, warning: impl Into<String>) -> Self {
        self.stop_warnings.push(warning.into());
        self
    }

    pub fn build(self) -> ScriptedClient {
        ScriptedClient {
            shared: Arc::new(Shared {
                start_failures: AtomicU32::new(self.start_failures),
                session_failures: AtomicU32::new(self.session_failures),
                ping_failure: self.ping_failure,
                ping_delay: self.ping_delay,
                protocol_version: self.protocol_version,
                auth: self.auth,
                auth_failure: self.auth_failure,
                models: self.models,
                models_failure: self.models_failure,
                replies: Mutex::new(self.replies),
                stop_warnings: self.stop_warnings,
                counters: Counters::default(),
            }),
        }
    }
}

fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new("gpt-5-mini")
            .with_reasoning(&["low", "medium", "high"], "medium")
            .with_limits(Some(264_000), Some(128_000)),
        ModelInfo::new("gpt-4.1")
            .with_vision()
            .with_limits(Some(128_000), Some(64_000)),
        ModelInfo::new("claude-sonnet-4.5")
            .with_vision()
            .with_limits(Some(200_000), None),
    ]
}

/// In-memory [`ClientHandle`]. Cloning shares state, so a test can keep a
/// clone to inspect [`ScriptedClient::calls`] after handing one to the
/// orchestrator.
#[derive(Clone)]
pub struct ScriptedClient {
    shared: Arc<Shared>,
}

impl ScriptedClient {
    pub fn builder() -> ScriptedClientBuilder {
        ScriptedClientBuilder::new()
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.shared.counters;
        CallCounts {
            start: c.start.load(Ordering::SeqCst),
            ping: c.ping.load(Ordering::SeqCst),
            auth: c.auth.load(Ordering::SeqCst),
            list_models: c.list_models.load(Ordering::SeqCst),
            create_session: c.create_session.load(Ordering::SeqCst),
            send: c.send.load(Ordering::SeqCst),
            destroy: c.destroy.load(Ordering::SeqCst),
            stop: c.stop.load(Ordering::SeqCst),
        }
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[async_trait]
impl ClientHandle for ScriptedClient {
    type Session = ScriptedSession;

    async fn start(&self) -> Result<()> {
        bump(&self.shared.counters.start);
        if take_failure(&self.shared.start_failures) {
            return Err(Error::transient("client process failed to start"));
        }
        Ok(())
    }

    async fn ping(&self, label: &str) -> Result<PingResponse> {
        bump(&self.shared.counters.ping);
        if let Some(delay) = self.shared.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = &self.shared.ping_failure {
            return Err(Error::connectivity(msg.clone()));
        }
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Ok(PingResponse {
            message: format!("pong: {label}"),
            protocol_version: self.shared.protocol_version,
            timestamp,
        })
    }

    async fn get_auth_status(&self) -> Result<AuthStatus> {
        bump(&self.shared.counters.auth);
        if let Some(msg) = &self.shared.auth_failure {
            return Err(Error::transient(msg.clone()));
        }
        Ok(self.shared.auth.clone())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        bump(&self.shared.counters.list_models);
        if let Some(msg) = &self.shared.models_failure {
            return Err(Error::transient(msg.clone()));
        }
        Ok(self.shared.models.clone())
    }

    async fn create_session(&self, config: SessionConfig) -> Result<ScriptedSession> {
        bump(&self.shared.counters.create_session);
        if take_failure(&self.shared.session_failures) {
            return Err(Error::transient("session creation failed"));
        }
        Ok(ScriptedSession {
            id: Uuid::new_v4().to_string(),
            model: config.model,
            streaming: config.streaming,
            shared: self.shared.clone(),
            handlers: Arc::new(Mutex::new(Vec::new())),
            tools: Arc::new(ToolRegistry::from_tools(config.tools)),
            closed: AtomicBool::new(false),
        })
    }

    async fn stop(&self) -> Vec<String> {
        bump(&self.shared.counters.stop);
        self.shared.stop_warnings.clone()
    }
}

/// Session produced by [`ScriptedClient`].
pub struct ScriptedSession {
    id: String,
    model: String,
    streaming: bool,
    shared: Arc<Shared>,
    handlers: Arc<Mutex<Vec<EventHandler>>>,
    tools: Arc<ToolRegistry>,
    closed: AtomicBool,
}

impl ScriptedSession {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::session_closed(format!(
                "session {} was destroyed",
                self.id
            )));
        }
        Ok(())
    }

    fn emitter(&self) -> Emitter {
        Emitter {
            handlers: self.handlers.clone(),
        }
    }
}

#[derive(Clone)]
struct Emitter {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl Emitter {
    fn emit(&self, event: SessionEvent) {
        // snapshot so handlers run without the lock held
        let handlers = match self.handlers.lock() {
            Ok(h) => h.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for handler in &handlers {
            handler(event.clone());
        }
    }
}

async fn play(steps: Vec<ScriptStep>, emitter: &Emitter, tools: &ToolRegistry) -> String {
    let mut content = String::new();
    for step in steps {
        match step {
            ScriptStep::Delta(text) => {
                content.push_str(&text);
                emitter.emit(SessionEvent::MessageDelta { content: text });
            }
            ScriptStep::Pause(delay) => tokio::time::sleep(delay).await,
            ScriptStep::Tool { name, arguments } => {
                let tool_call_id = format!("call_{}", Uuid::new_v4().simple());
                emitter.emit(SessionEvent::ToolExecutionStart {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: name.clone(),
                });
                let result = tools.invoke(&name, arguments);
                emitter.emit(SessionEvent::ToolExecutionComplete {
                    tool_call_id,
                    success: !result.is_error,
                    result: Some(result.content),
                });
            }
            ScriptStep::Error(message) => emitter.emit(SessionEvent::Error { message }),
        }
    }
    emitter.emit(SessionEvent::Message {
        content: content.clone(),
    });
    emitter.emit(SessionEvent::Idle);
    content
}

#[async_trait]
impl SessionHandle for ScriptedSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn on(&self, handler: EventHandler) {
        match self.handlers.lock() {
            Ok(mut h) => h.push(handler),
            Err(poisoned) => poisoned.into_inner().push(handler),
        }
    }

    async fn send(&self, prompt: &str) -> Result<()> {
        self.ensure_open()?;
        bump(&self.shared.counters.send);
        match self.shared.next_reply(&self.model, prompt) {
            ScriptedReply::Fail(msg) => Err(Error::transient(msg)),
            ScriptedReply::Hang => Ok(()),
            ScriptedReply::Steps(steps) => {
                let emitter = self.emitter();
                let tools = self.tools.clone();
                // events arrive from another task, like a transport reader thread
                tokio::spawn(async move {
                    play(steps, &emitter, &tools).await;
                });
                Ok(())
            }
        }
    }

    async fn send_and_wait(&self, prompt: &str) -> Result<AssistantMessage> {
        self.ensure_open()?;
        bump(&self.shared.counters.send);
        match self.shared.next_reply(&self.model, prompt) {
            ScriptedReply::Fail(msg) => Err(Error::transient(msg)),
            ScriptedReply::Hang => std::future::pending::<Result<AssistantMessage>>().await,
            ScriptedReply::Steps(steps) => {
                let content = play(steps, &self.emitter(), &self.tools).await;
                Ok(AssistantMessage { content })
            }
        }
    }

    async fn destroy(&self) -> Result<()> {
        bump(&self.shared.counters.destroy);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::session_closed(format!(
                "session {} already destroyed",
                self.id
            )));
        }
        match self.handlers.lock() {
            Ok(mut h) => h.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        debug!(session_id = self.id.as_str(), "scripted session destroyed");
        Ok(())
    }
}
