//! 预检模块：在发出真实请求前验证连通性、认证状态与模型可用性。
//!
//! Preflight checks run before any real work is issued:
//!
//! 1. liveness (`ping`), bounded by `ping_timeout`
//! 2. authentication status, bounded by `auth_timeout`
//! 3. model listing, bounded by `models_timeout` (optional, never fatal)
//!
//! The check fails closed. A failed or timed-out liveness check stops
//! everything after it, and so does a failed or negative auth check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::client::ClientHandle;
use crate::resilience::with_timeout;
use crate::types::ModelInfo;
use crate::{Error, ErrorContext};

fn default_ping_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_auth_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_models_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_check_models() -> bool {
    true
}

fn default_ping_label() -> String {
    "preflight".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightConfig {
    #[serde(default = "default_ping_timeout", with = "crate::config::duration_secs")]
    pub ping_timeout: Duration,
    #[serde(default = "default_auth_timeout", with = "crate::config::duration_secs")]
    pub auth_timeout: Duration,
    #[serde(default = "default_models_timeout", with = "crate::config::duration_secs")]
    pub models_timeout: Duration,
    /// Whether to run the (non-fatal) model listing phase.
    #[serde(default = "default_check_models")]
    pub check_models: bool,
    /// Label sent with the liveness ping.
    #[serde(default = "default_ping_label")]
    pub ping_label: String,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            ping_timeout: default_ping_timeout(),
            auth_timeout: default_auth_timeout(),
            models_timeout: default_models_timeout(),
            check_models: default_check_models(),
            ping_label: default_ping_label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Liveness,
    Authentication,
    Capabilities,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Liveness => "liveness",
            Phase::Authentication => "authentication",
            Phase::Capabilities => "capabilities",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Passed,
    Failed,
    /// Failed, but the phase is not fatal.
    Warned,
    /// Not run, because an earlier phase failed or it is disabled.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub detail: String,
    pub elapsed: Duration,
}

/// Result of a preflight run: one outcome per phase, in order.
#[derive(Debug)]
pub struct PreflightReport {
    pub phases: Vec<PhaseOutcome>,
    /// Models reported by the capability phase, if it ran and succeeded.
    pub models: Option<Vec<ModelInfo>>,
    failure: Option<Error>,
}

impl PreflightReport {
    pub fn is_ready(&self) -> bool {
        self.failure.is_none()
    }

    /// The error that made the client not ready.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    pub fn into_failure(self) -> Option<Error> {
        self.failure
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

impl fmt::Display for PreflightReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pre-flight checks")?;
        for p in &self.phases {
            let mark = match p.status {
                PhaseStatus::Passed => "ok",
                PhaseStatus::Failed => "FAIL",
                PhaseStatus::Warned => "warn",
                PhaseStatus::Skipped => "skip",
            };
            writeln!(
                f,
                "  [{mark:>4}] {:<14} {} ({:.2}s)",
                p.phase.to_string(),
                p.detail,
                p.elapsed.as_secs_f64()
            )?;
        }
        if self.is_ready() {
            write!(f, "  ready")
        } else {
            write!(f, "  not ready")
        }
    }
}

/// Runs the three preflight phases against a client.
pub struct Preflight {
    config: PreflightConfig,
}

impl Preflight {
    pub fn new(config: PreflightConfig) -> Self {
        Self { config }
    }

    pub async fn run<C>(&self, client: &C) -> PreflightReport
    where
        C: ClientHandle + ?Sized,
    {
        let mut report = PreflightReport {
            phases: Vec::with_capacity(3),
            models: None,
            failure: None,
        };

        // 1. Liveness
        let started = Instant::now();
        let ping = with_timeout(
            client.ping(&self.config.ping_label),
            self.config.ping_timeout,
            "Ping",
        )
        .await;
        match ping {
            Ok(pong) => {
                let detail = format!("server reachable (protocol v{})", pong.protocol_version);
                info!(phase = "liveness", protocol_version = pong.protocol_version, "{detail}");
                report.push(Phase::Liveness, PhaseStatus::Passed, detail, started);
            }
            Err(e) => {
                let detail = format!("server unreachable: {e}");
                error!(phase = "liveness", error = %e, "{detail}");
                report.push(Phase::Liveness, PhaseStatus::Failed, detail, started);
                report.skip(Phase::Authentication, "liveness failed");
                report.skip(Phase::Capabilities, "liveness failed");
                report.failure = Some(Error::connectivity_with_context(
                    "server unreachable",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("preflight"),
                ));
                return report;
            }
        }

        // 2. Authentication
        let started = Instant::now();
        let auth = with_timeout(
            client.get_auth_status(),
            self.config.auth_timeout,
            "Auth check",
        )
        .await;
        let auth_failure = match auth {
            Ok(status) if status.is_authenticated => {
                let detail = format!(
                    "authenticated as {}",
                    status.login.as_deref().unwrap_or("unknown")
                );
                info!(phase = "authentication", "{detail}");
                report.push(Phase::Authentication, PhaseStatus::Passed, detail, started);
                None
            }
            Ok(status) => {
                let reason = status
                    .status_message
                    .unwrap_or_else(|| "not authenticated".to_string());
                let detail = format!("not authenticated: {reason}");
                error!(phase = "authentication", "{detail}");
                report.push(Phase::Authentication, PhaseStatus::Failed, detail, started);
                Some(Error::auth_with_context(
                    reason,
                    ErrorContext::new()
                        .with_details("log in with the client CLI first")
                        .with_source("preflight"),
                ))
            }
            Err(e) => {
                let detail = format!("auth check failed: {e}");
                error!(phase = "authentication", error = %e, "{detail}");
                report.push(Phase::Authentication, PhaseStatus::Failed, detail, started);
                Some(Error::auth_with_context(
                    "auth check failed",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("preflight"),
                ))
            }
        };
        if let Some(err) = auth_failure {
            report.skip(Phase::Capabilities, "authentication failed");
            report.failure = Some(err);
            return report;
        }

        // 3. Capabilities (non-fatal)
        if !self.config.check_models {
            report.skip(Phase::Capabilities, "disabled");
            return report;
        }
        let started = Instant::now();
        let models = with_timeout(
            client.list_models(),
            self.config.models_timeout,
            "List models",
        )
        .await;
        match models {
            Ok(models) => {
                let detail = format!("{} model(s) available", models.len());
                info!(phase = "capabilities", count = models.len(), "{detail}");
                report.push(Phase::Capabilities, PhaseStatus::Passed, detail, started);
                report.models = Some(models);
            }
            Err(e) => {
                let detail = format!("could not list models: {e}");
                warn!(phase = "capabilities", error = %e, "{detail}");
                report.push(Phase::Capabilities, PhaseStatus::Warned, detail, started);
            }
        }

        report
    }
}

impl PreflightReport {
    fn push(&mut self, phase: Phase, status: PhaseStatus, detail: String, started: Instant) {
        self.phases.push(PhaseOutcome {
            phase,
            status,
            detail,
            elapsed: started.elapsed(),
        });
    }

    fn skip(&mut self, phase: Phase, reason: &str) {
        self.phases.push(PhaseOutcome {
            phase,
            status: PhaseStatus::Skipped,
            detail: reason.to_string(),
            elapsed: Duration::ZERO,
        });
    }
}

/// Run preflight with default settings and return the readiness verdict.
pub async fn preflight<C>(client: &C) -> bool
where
    C: ClientHandle + ?Sized,
{
    Preflight::new(PreflightConfig::default())
        .run(client)
        .await
        .is_ready()
}
