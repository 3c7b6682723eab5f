//! Probe payloads and session configuration exchanged with the client SDK

use serde::{Deserialize, Serialize};

use super::tool::Tool;

/// Liveness check response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub message: String,
    pub protocol_version: u32,
    /// Server time, milliseconds since the unix epoch
    pub timestamp: u64,
}

/// Authentication status of the running client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_authenticated: bool,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl AuthStatus {
    pub fn authenticated(login: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            login: Some(login.into()),
            host: Some("github.com".to_string()),
            auth_type: Some("user".to_string()),
            status_message: None,
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            is_authenticated: false,
            status_message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSupports {
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub reasoning_effort: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelLimits {
    #[serde(default)]
    pub max_context_window_tokens: Option<u64>,
    #[serde(default)]
    pub max_prompt_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    #[serde(default)]
    pub supports: ModelSupports,
    #[serde(default)]
    pub limits: ModelLimits,
}

/// A model the client can open sessions against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub capabilities: ModelCapabilities,
    #[serde(default)]
    pub supported_reasoning_efforts: Vec<String>,
    #[serde(default)]
    pub default_reasoning_effort: Option<String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: ModelCapabilities::default(),
            supported_reasoning_efforts: Vec::new(),
            default_reasoning_effort: None,
        }
    }

    pub fn with_vision(mut self) -> Self {
        self.capabilities.supports.vision = true;
        self
    }

    pub fn with_reasoning(mut self, efforts: &[&str], default: &str) -> Self {
        self.capabilities.supports.reasoning_effort = true;
        self.supported_reasoning_efforts = efforts.iter().map(|s| s.to_string()).collect();
        self.default_reasoning_effort = Some(default.to_string());
        self
    }

    pub fn with_limits(mut self, context_window: Option<u64>, prompt: Option<u64>) -> Self {
        self.capabilities.limits = ModelLimits {
            max_context_window_tokens: context_window,
            max_prompt_tokens: prompt,
        };
        self
    }
}

/// Format a token limit for display: `128K`, `1.0M`, `unlimited`.
pub fn format_token_limit(value: Option<u64>) -> String {
    match value {
        None => "unlimited".to_string(),
        Some(v) if v >= 1_000_000 => format!("{:.1}M", v as f64 / 1_000_000.0),
        Some(v) if v >= 1_000 => format!("{:.0}K", v as f64 / 1_000.0),
        Some(v) => v.to_string(),
    }
}

/// Configuration a session is created with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub streaming: bool,
    pub tools: Vec<Tool>,
    pub system_message: Option<String>,
}

impl SessionConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            streaming: false,
            tools: Vec::new(),
            system_message: None,
        }
    }

    pub fn streaming(mut self, enable: bool) -> Self {
        self.streaming = enable;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }
}

/// Final assistant reply returned by `send_and_wait`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_limits_are_humanized() {
        assert_eq!(format_token_limit(None), "unlimited");
        assert_eq!(format_token_limit(Some(512)), "512");
        assert_eq!(format_token_limit(Some(128_000)), "128K");
        assert_eq!(format_token_limit(Some(1_048_576)), "1.0M");
    }

    #[test]
    fn auth_status_reads_camel_case() {
        let auth: AuthStatus = serde_json::from_str(
            r#"{"isAuthenticated": false, "statusMessage": "token expired"}"#,
        )
        .unwrap();
        assert_eq!(auth, AuthStatus::unauthenticated("token expired"));
    }
}
