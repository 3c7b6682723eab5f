//! Lifecycle enforcement around a [`ClientHandle`].

use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::session::ManagedSession;
use super::ClientHandle;
use crate::preflight::{Preflight, PreflightConfig, PreflightReport};
use crate::types::{AuthStatus, ModelInfo, PingResponse, SessionConfig};
use crate::{Error, ErrorContext, Result};

/// Where a client is in its `start → ready → stopped` lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Created,
    Ready,
    Stopped,
}

/// Wraps a client handle and rejects calls made out of lifecycle order.
///
/// - Nothing but `start`/`stop` is allowed before `start` completes
/// - Nothing at all is allowed after `stop`
pub struct ManagedClient<C> {
    inner: C,
    state: Mutex<ClientState>,
}

impl<C: ClientHandle> ManagedClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            state: Mutex::new(ClientState::Created),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn state(&self) -> ClientState {
        match self.state.lock() {
            Ok(st) => *st,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: ClientState) {
        match self.state.lock() {
            Ok(mut st) => *st = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn require_ready(&self, operation: &str) -> Result<()> {
        match self.state() {
            ClientState::Ready => Ok(()),
            ClientState::Created => Err(Error::lifecycle_with_context(
                format!("{operation} called before the client finished starting"),
                ErrorContext::new().with_source("managed_client"),
            )),
            ClientState::Stopped => Err(Error::lifecycle_with_context(
                format!("{operation} called after the client was stopped"),
                ErrorContext::new().with_source("managed_client"),
            )),
        }
    }

    /// Start the client. Starting a ready client is a no-op; a stopped client
    /// cannot be restarted.
    pub async fn start(&self) -> Result<()> {
        match self.state() {
            ClientState::Ready => return Ok(()),
            ClientState::Stopped => {
                return Err(Error::lifecycle_with_context(
                    "start called after the client was stopped",
                    ErrorContext::new().with_source("managed_client"),
                ))
            }
            ClientState::Created => {}
        }
        self.inner.start().await?;
        self.set_state(ClientState::Ready);
        info!("client ready");
        Ok(())
    }

    pub async fn ping(&self, label: &str) -> Result<PingResponse> {
        self.require_ready("ping")?;
        self.inner.ping(label).await
    }

    pub async fn get_auth_status(&self) -> Result<AuthStatus> {
        self.require_ready("get_auth_status")?;
        self.inner.get_auth_status().await
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.require_ready("list_models")?;
        self.inner.list_models().await
    }

    /// Run the preflight checks against the started client.
    pub async fn preflight(&self, config: &PreflightConfig) -> Result<PreflightReport> {
        self.require_ready("preflight")?;
        Ok(Preflight::new(config.clone()).run(&self.inner).await)
    }

    pub async fn create_session(
        &self,
        config: SessionConfig,
    ) -> Result<ManagedSession<C::Session>> {
        self.require_ready("create_session")?;
        let model = config.model.clone();
        let session = self.inner.create_session(config).await?;
        let session = ManagedSession::new(session);
        debug!(session_id = session.id(), model = model.as_str(), "session created");
        Ok(session)
    }

    /// Stop the client and return its shutdown warnings.
    ///
    /// Stopping twice is harmless; the second call returns no warnings.
    pub async fn stop(&self) -> Vec<String> {
        if self.state() == ClientState::Stopped {
            return Vec::new();
        }
        self.set_state(ClientState::Stopped);
        let warnings = self.inner.stop().await;
        for w in &warnings {
            warn!(warning = w.as_str(), "client shutdown warning");
        }
        warnings
    }
}
