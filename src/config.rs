//! Orchestrator configuration
//!
//! Loaded from YAML (all fields optional) and then adjusted from the
//! environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AI_LIB_ORCH_MODEL` | `model` |
//! | `AI_LIB_ORCH_STREAMING` | `streaming` (`1`/`true`/`yes`) |
//! | `AI_LIB_ORCH_PROMPT_TIMEOUT_SECS` | `prompt_timeout` |
//! | `AI_LIB_ORCH_PROMPT_MAX_ATTEMPTS` | `prompt_retry.max_attempts` |
//! | `AI_LIB_ORCH_START_MAX_ATTEMPTS` | `start_retry.max_attempts` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::client::session::DEFAULT_SETTLE_TIMEOUT;
use crate::preflight::PreflightConfig;
use crate::resilience::RetryPolicy;
use crate::{Error, ErrorContext, Result};

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_prompt_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Knobs for one orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub model: String,
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub start_retry: RetryPolicy,
    pub session_retry: RetryPolicy,
    pub prompt_retry: RetryPolicy,
    #[serde(with = "duration_secs")]
    pub prompt_timeout: Duration,
    /// How long a new prompt waits for an abandoned (timed-out) turn to go idle.
    #[serde(with = "duration_secs")]
    pub turn_settle_timeout: Duration,
    pub preflight: PreflightConfig,
    /// Prompts used when the caller does not pass any.
    pub prompts: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            streaming: false,
            system_message: None,
            start_retry: RetryPolicy::new(3, Duration::from_secs(1)),
            session_retry: RetryPolicy::new(3, Duration::from_secs(1)),
            prompt_retry: RetryPolicy::new(2, Duration::from_secs(1)),
            prompt_timeout: default_prompt_timeout(),
            turn_settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            preflight: PreflightConfig::default(),
            prompts: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Apply `AI_LIB_ORCH_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("AI_LIB_ORCH_MODEL") {
            let model = model.trim();
            if !model.is_empty() {
                self.model = model.to_string();
            }
        }
        if let Some(raw) = lookup("AI_LIB_ORCH_STREAMING") {
            self.streaming = parse_flag("AI_LIB_ORCH_STREAMING", &raw)?;
        }
        if let Some(raw) = lookup("AI_LIB_ORCH_PROMPT_TIMEOUT_SECS") {
            let secs = parse_number::<f64>("AI_LIB_ORCH_PROMPT_TIMEOUT_SECS", &raw)?;
            self.prompt_timeout = secs_to_duration(secs).map_err(|msg| {
                Error::configuration_with_context(
                    msg,
                    ErrorContext::new()
                        .with_field_path("AI_LIB_ORCH_PROMPT_TIMEOUT_SECS")
                        .with_source("env"),
                )
            })?;
        }
        if let Some(raw) = lookup("AI_LIB_ORCH_PROMPT_MAX_ATTEMPTS") {
            self.prompt_retry.max_attempts =
                parse_number::<u32>("AI_LIB_ORCH_PROMPT_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("AI_LIB_ORCH_START_MAX_ATTEMPTS") {
            self.start_retry.max_attempts =
                parse_number::<u32>("AI_LIB_ORCH_START_MAX_ATTEMPTS", &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(invalid("model", "model must not be empty"));
        }
        if self.prompt_timeout.is_zero() {
            return Err(invalid("prompt_timeout", "prompt_timeout must be positive"));
        }
        for (field, policy) in [
            ("start_retry", &self.start_retry),
            ("session_retry", &self.session_retry),
            ("prompt_retry", &self.prompt_retry),
        ] {
            if policy.max_attempts == 0 {
                return Err(invalid(
                    format!("{field}.max_attempts"),
                    "max_attempts must be at least 1",
                ));
            }
            if policy.backoff_multiplier == 0 {
                return Err(invalid(
                    format!("{field}.backoff_multiplier"),
                    "backoff_multiplier must be at least 1",
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: impl Into<String>, msg: &str) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("orchestrator_config"),
    )
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::configuration_with_context(
            format!("expected a boolean, got {other:?}"),
            ErrorContext::new().with_field_path(key).with_source("env"),
        )),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("expected a number, got {raw:?}"),
            ErrorContext::new().with_field_path(key).with_source("env"),
        )
    })
}

fn secs_to_duration(secs: f64) -> std::result::Result<Duration, String> {
    Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid duration: {secs} seconds"))
}

/// Serialize a [`Duration`] as fractional seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        super::secs_to_duration(secs).map_err(serde::de::Error::custom)
    }
}

/// Same as [`duration_secs`] for optional values (`null` or absent means `None`).
pub(crate) mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => super::secs_to_duration(secs)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
