use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "prompt_retry.max_attempts")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., the underlying ping failure)
    pub details: Option<String>,
    /// Source of the error (e.g., "preflight", "managed_client")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the orchestrator.
///
/// Variants follow the failure taxonomy callers branch on: connectivity and
/// authentication abort a run during preflight, timeouts stay distinguishable
/// from other transient failures, and setup failures are terminal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connectivity error: {message}{}", format_context(.context))]
    Connectivity {
        message: String,
        context: ErrorContext,
    },

    #[error("Authentication error: {message}{}", format_context(.context))]
    Auth {
        message: String,
        context: ErrorContext,
    },

    #[error("{label} timed out after {:.1}s", .ceiling.as_secs_f64())]
    Timeout { label: String, ceiling: Duration },

    #[error("Transient error: {message}{}", format_context(.context))]
    Transient {
        message: String,
        context: ErrorContext,
    },

    #[error("Fatal setup error: {message} (after {attempts} attempt(s)): {source}")]
    FatalSetup {
        message: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Lifecycle error: {message}{}", format_context(.context))]
    Lifecycle {
        message: String,
        context: ErrorContext,
    },

    #[error("Turn in progress on session {session_id}")]
    TurnInProgress { session_id: String },

    #[error("Session closed: {message}")]
    SessionClosed { message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Error::Connectivity {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Error::Transient {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn timeout(label: impl Into<String>, ceiling: Duration) -> Self {
        Error::Timeout {
            label: label.into(),
            ceiling,
        }
    }

    pub fn session_closed(msg: impl Into<String>) -> Self {
        Error::SessionClosed {
            message: msg.into(),
        }
    }

    /// Create a new connectivity error with structured context
    pub fn connectivity_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Connectivity {
            message: msg.into(),
            context,
        }
    }

    /// Create a new authentication error with structured context
    pub fn auth_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Auth {
            message: msg.into(),
            context,
        }
    }

    /// Create a new lifecycle error with structured context
    pub fn lifecycle_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Lifecycle {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Wrap the last start failure once the start policy is exhausted.
    pub fn fatal_setup(msg: impl Into<String>, attempts: u32, source: Error) -> Self {
        Error::FatalSetup {
            message: msg.into(),
            attempts,
            source: Box::new(source),
        }
    }

    /// Whether a retry loop may attempt the operation again after this error.
    ///
    /// Timeouts are reported as retryable here; [`crate::resilience::RetryPolicy`]
    /// can opt out of retrying them separately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connectivity { .. }
                | Error::Transient { .. }
                | Error::Timeout { .. }
                | Error::Io(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Connectivity { context, .. }
            | Error::Auth { context, .. }
            | Error::Transient { context, .. }
            | Error::Lifecycle { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_carries_label_and_ceiling() {
        let err = Error::timeout("Prompt 2", Duration::from_secs(30));
        assert_eq!(err.to_string(), "Prompt 2 timed out after 30.0s");
        assert!(err.is_timeout());
        assert!(err.is_retryable());
    }

    #[test]
    fn context_is_rendered_in_display() {
        let err = Error::connectivity_with_context(
            "server unreachable",
            ErrorContext::new()
                .with_details("connection refused")
                .with_source("preflight"),
        );
        assert_eq!(
            err.to_string(),
            concat!(
                "Connectivity error: server unreachable ",
                "(details: connection refused, source: preflight)"
            )
        );
    }

    #[test]
    fn auth_and_lifecycle_errors_are_not_retryable() {
        assert!(!Error::auth("not logged in").is_retryable());
        assert!(!Error::lifecycle_with_context("stopped", ErrorContext::new()).is_retryable());
        assert!(!Error::TurnInProgress {
            session_id: "s-1".into()
        }
        .is_retryable());
    }

    #[test]
    fn fatal_setup_keeps_the_original_cause() {
        let err = Error::fatal_setup("client start", 3, Error::transient("spawn failed"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Transient error: spawn failed"));
        assert!(!err.is_retryable());
    }
}
