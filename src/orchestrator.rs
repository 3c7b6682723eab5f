//! 编排模块：启动 → 预检 → 会话 → 逐条提示（重试 + 超时）→ 关闭。
//!
//! Request orchestration over a [`ClientHandle`].
//!
//! [`Orchestrator::run`] is the whole pipeline. The steps are also public so
//! callers can compose them differently, e.g. [`Orchestrator::compare_models`]
//! runs one session per model concurrently on an already started client.

use futures::future::join_all;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::client::{ClientHandle, ManagedClient, ManagedSession};
use crate::config::OrchestratorConfig;
use crate::preflight::PreflightReport;
use crate::resilience::with_timeout;
use crate::types::{SessionConfig, SessionEvent, Tool};
use crate::{Error, Result};

/// How a single prompt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed {
        content: String,
        tool_calls: Vec<String>,
    },
    Failed {
        error: String,
        timed_out: bool,
    },
}

/// Per-prompt record: attempts, time spent and the result or terminal error.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOutcome {
    /// 1-based position in the run.
    pub index: usize,
    pub label: String,
    pub prompt: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub outcome: TurnOutcome,
}

impl PromptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Completed { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Completed { content, .. } => Some(content),
            TurnOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Failed { error, .. } => Some(error),
            TurnOutcome::Completed { .. } => None,
        }
    }
}

/// Summary of a full [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunReport {
    pub model: String,
    /// Every session the run used, in order. More than one means a session
    /// was replaced because an abandoned turn never went idle.
    pub sessions: Vec<String>,
    pub preflight: PreflightReport,
    pub prompts: Vec<PromptOutcome>,
    pub shutdown_warnings: Vec<String>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.prompts.iter().filter(|p| p.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.prompts.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

pub struct Orchestrator<C: ClientHandle> {
    client: ManagedClient<C>,
    config: OrchestratorConfig,
    tools: Vec<Tool>,
}

impl<C: ClientHandle> Orchestrator<C> {
    pub fn new(client: C, config: OrchestratorConfig) -> Self {
        Self {
            client: ManagedClient::new(client),
            config,
            tools: Vec::new(),
        }
    }

    /// Tools registered with every session this orchestrator opens.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn client(&self) -> &ManagedClient<C> {
        &self.client
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start the client under the start retry policy.
    ///
    /// Exhausting the policy is unrecoverable and reported as
    /// [`Error::FatalSetup`] carrying the last failure. Starting a client that
    /// was already stopped is a [`Error::Lifecycle`] error, returned as is.
    pub async fn start(&self) -> Result<()> {
        let (result, stats) = self
            .config
            .start_retry
            .run_with_stats("Client start", || self.client.start())
            .await;
        result.map_err(|e| {
            if matches!(e, Error::Lifecycle { .. }) {
                return e;
            }
            error!(
                attempts = stats.attempts,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "could not start client"
            );
            Error::fatal_setup("could not start client", stats.attempts, e)
        })
    }

    pub async fn preflight(&self) -> Result<PreflightReport> {
        self.client.preflight(&self.config.preflight).await
    }

    fn session_config(&self, model: &str) -> SessionConfig {
        let mut config = SessionConfig::new(model)
            .streaming(self.config.streaming)
            .with_tools(self.tools.clone());
        if let Some(system) = &self.config.system_message {
            config = config.with_system_message(system.clone());
        }
        config
    }

    /// Open a session for `model` under the session retry policy.
    pub async fn open_session(&self, model: &str) -> Result<ManagedSession<C::Session>> {
        let config = self.session_config(model);
        let session = self
            .config
            .session_retry
            .run("Session creation", || self.client.create_session(config.clone()))
            .await?;
        Ok(session.with_settle_timeout(self.config.turn_settle_timeout))
    }

    /// Make sure `session` has no abandoned turn still running; replace it
    /// with a fresh session for `model` if one does not go idle in time.
    async fn recover_session(
        &self,
        session: ManagedSession<C::Session>,
        model: &str,
    ) -> Result<ManagedSession<C::Session>> {
        if session.stale_turns() == 0 {
            return Ok(session);
        }
        match session.settle().await {
            Ok(()) => Ok(session),
            Err(e) => {
                warn!(
                    session_id = session.id(),
                    error = %e,
                    "replacing session stuck on an abandoned turn"
                );
                if let Err(e) = session.destroy().await {
                    warn!(error = %e, "failed to destroy session");
                }
                self.open_session(model).await
            }
        }
    }

    /// Send one prompt under retry + timeout. Never fails: the outcome records
    /// the terminal error instead so the caller can move on.
    ///
    /// `on_event` only sees events when streaming is enabled.
    pub async fn prompt<F>(
        &self,
        session: &ManagedSession<C::Session>,
        index: usize,
        label: &str,
        prompt: &str,
        on_event: &F,
    ) -> PromptOutcome
    where
        F: Fn(&SessionEvent) + Sync,
    {
        let ceiling = self.config.prompt_timeout;
        let streaming = self.config.streaming;

        let (result, stats) = self
            .config
            .prompt_retry
            .run_with_stats(label, || async move {
                if streaming {
                    let summary =
                        with_timeout(session.send_streaming(prompt, on_event), ceiling, label)
                            .await?;
                    Ok((summary.content, summary.tool_calls))
                } else {
                    let reply = with_timeout(session.send_and_wait(prompt), ceiling, label).await?;
                    Ok((reply.content, Vec::new()))
                }
            })
            .await;

        let outcome = match result {
            Ok((content, tool_calls)) => {
                info!(
                    label,
                    attempts = stats.attempts,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    tool_calls = tool_calls.len(),
                    "response received"
                );
                TurnOutcome::Completed {
                    content,
                    tool_calls,
                }
            }
            Err(e) => {
                error!(
                    label,
                    attempts = stats.attempts,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    error = %e,
                    "{label} failed after {:.1}s, skipping to next prompt",
                    stats.elapsed.as_secs_f64()
                );
                TurnOutcome::Failed {
                    error: e.to_string(),
                    timed_out: e.is_timeout(),
                }
            }
        };

        PromptOutcome {
            index,
            label: label.to_string(),
            prompt: prompt.to_string(),
            attempts: stats.attempts,
            elapsed: stats.elapsed,
            outcome,
        }
    }

    /// Send the same prompt to several models at once, one session each.
    ///
    /// The client must already be started. Failures (including session
    /// creation) are isolated per model.
    pub async fn compare_models(&self, models: &[String], prompt: &str) -> Vec<PromptOutcome> {
        let noop = |_: &SessionEvent| {};
        let runs = models.iter().enumerate().map(|(i, model)| {
            let noop = &noop;
            async move {
                let started = Instant::now();
                let session = match self.open_session(model).await {
                    Ok(s) => s,
                    Err(e) => {
                        return PromptOutcome {
                            index: i + 1,
                            label: model.clone(),
                            prompt: prompt.to_string(),
                            attempts: 0,
                            elapsed: started.elapsed(),
                            outcome: TurnOutcome::Failed {
                                error: e.to_string(),
                                timed_out: e.is_timeout(),
                            },
                        }
                    }
                };
                let outcome = self.prompt(&session, i + 1, model, prompt, noop).await;
                if let Err(e) = session.destroy().await {
                    warn!(model = model.as_str(), error = %e, "failed to destroy session");
                }
                outcome
            }
        });
        join_all(runs).await
    }

    /// Stop the client; returns shutdown warnings.
    pub async fn shutdown(&self) -> Vec<String> {
        self.client.stop().await
    }

    /// Run every prompt in order on one session, without an event handler.
    pub async fn run(&self, prompts: &[String]) -> Result<RunReport> {
        self.run_with_handler(prompts, |_: &SessionEvent| {}).await
    }

    /// Full pipeline: start → preflight → session → prompts → teardown.
    ///
    /// Start exhaustion, a failed preflight and session creation failure abort
    /// the run with an error (after stopping the client). Individual prompt
    /// failures do not: they are recorded and the next prompt is sent. A
    /// session left stuck by a timed-out turn is replaced before that prompt.
    pub async fn run_with_handler<F>(&self, prompts: &[String], on_event: F) -> Result<RunReport>
    where
        F: Fn(&SessionEvent) + Sync,
    {
        let started = Instant::now();
        let result = self.drive(prompts, &on_event).await;
        let shutdown_warnings = self.shutdown().await;

        let (preflight, sessions, outcomes) = result?;
        let report = RunReport {
            model: self.config.model.clone(),
            sessions,
            preflight,
            prompts: outcomes,
            shutdown_warnings,
            elapsed: started.elapsed(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(report)
    }

    async fn drive<F>(
        &self,
        prompts: &[String],
        on_event: &F,
    ) -> Result<(PreflightReport, Vec<String>, Vec<PromptOutcome>)>
    where
        F: Fn(&SessionEvent) + Sync,
    {
        self.start().await?;

        let preflight = self.preflight().await?;
        if !preflight.is_ready() {
            error!("pre-flight checks failed, no requests will be issued");
            return Err(preflight
                .into_failure()
                .unwrap_or_else(|| Error::connectivity("pre-flight checks failed")));
        }

        let model = self.config.model.as_str();
        let mut session = self.open_session(model).await?;
        let mut sessions = vec![session.id().to_string()];

        let mut outcomes = Vec::with_capacity(prompts.len());
        for (i, prompt) in prompts.iter().enumerate() {
            if i > 0 {
                session = self.recover_session(session, model).await?;
                if sessions.last().map(String::as_str) != Some(session.id()) {
                    sessions.push(session.id().to_string());
                }
            }
            let label = format!("Prompt {}", i + 1);
            outcomes.push(self.prompt(&session, i + 1, &label, prompt, on_event).await);
        }

        let session_id = session.id().to_string();
        if let Err(e) = session.destroy().await {
            warn!(session_id = session_id.as_str(), error = %e, "failed to destroy session");
        }
        Ok((preflight, sessions, outcomes))
    }
}
