//! Gateway configuration, read once at startup.
//!
//! Values come from the process environment (after `dotenvy`), with the API
//! key and signing secret optionally pulled from a named secret through a
//! [`SecretStore`].

use std::time::Duration;

use serde_json::Value;

use crate::mcp::server::DEFAULT_TOOL_TIMEOUT;
use crate::mcp::signing::{SigningCredentials, DEFAULT_VALIDITY_WINDOW};

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Keys looked up inside the secret named by `MCP_SECRET_NAME`.
pub const SECRET_KEY_API_KEY: &str = "X_API_KEY";
pub const SECRET_KEY_SIGNING_SECRET: &str = "SIGNING_SECRET";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

// ── Secret store ────────────────────────────────────────────────────────────

/// Source of named secrets. A secret is either a JSON object of key/value
/// pairs or a single plain string.
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, name: &str, key: &str) -> Option<String>;
}

/// Secrets held in environment variables: the variable `name` holds the
/// secret body.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, name: &str, key: &str) -> Option<String> {
        let raw = std::env::var(name).ok()?;
        secret_value(&raw, key)
    }
}

/// Extract `key` from a secret body. A body that is not a JSON object is
/// returned whole.
pub fn secret_value(raw: &str, key: &str) -> Option<String> {
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => match map.get(key)? {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        },
        _ => raw.to_string(),
    };
    non_empty(value)
}

// ── Gateway config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    /// Expected `X-Api-Key`. `None` disables API-key auth.
    pub api_key: Option<String>,
    /// Accepted signing key. `None` disables signature auth.
    pub signing: Option<SigningCredentials>,
    pub signature_window: Duration,
    pub tool_timeout: Duration,
    pub max_body_bytes: usize,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_key: None,
            signing: None,
            signature_window: DEFAULT_VALIDITY_WINDOW,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cors_origins: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), &EnvSecretStore)
    }

    /// Build from an arbitrary variable lookup. Explicit variables win over
    /// values from the secret store.
    pub fn from_lookup<F>(var: F, secrets: &dyn SecretStore) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).and_then(non_empty);
        let secret_name = var("MCP_SECRET_NAME");
        let from_store = |key: &str| secret_name.as_deref().and_then(|name| secrets.get_secret(name, key));

        let port = parse_or("PORT", var("PORT"), DEFAULT_PORT, "a port number")?;
        let signature_window = Duration::from_secs(parse_or(
            "MCP_SIGNATURE_WINDOW_SECS",
            var("MCP_SIGNATURE_WINDOW_SECS"),
            DEFAULT_VALIDITY_WINDOW.as_secs(),
            "a whole number of seconds",
        )?);
        let tool_timeout = Duration::from_secs(parse_or(
            "MCP_TOOL_TIMEOUT_SECS",
            var("MCP_TOOL_TIMEOUT_SECS"),
            DEFAULT_TOOL_TIMEOUT.as_secs(),
            "a whole number of seconds",
        )?);
        if tool_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "MCP_TOOL_TIMEOUT_SECS",
                expected: "greater than zero",
                value: "0".into(),
            });
        }
        let max_body_bytes = parse_or(
            "MCP_MAX_BODY_BYTES",
            var("MCP_MAX_BODY_BYTES"),
            DEFAULT_MAX_BODY_BYTES,
            "a byte count",
        )?;

        let cors_origins = var("MCP_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let api_key = var("MCP_API_KEY").or_else(|| from_store(SECRET_KEY_API_KEY));

        let key_id = var("MCP_SIGNING_KEY_ID");
        let signing_secret = var("MCP_SIGNING_SECRET").or_else(|| from_store(SECRET_KEY_SIGNING_SECRET));
        let signing = match (key_id, signing_secret) {
            (Some(id), Some(secret)) => Some(SigningCredentials::new(id, secret.into_bytes())),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: "MCP_SIGNING_KEY_ID",
                    missing: "MCP_SIGNING_SECRET",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: "MCP_SIGNING_SECRET",
                    missing: "MCP_SIGNING_KEY_ID",
                });
            }
        };

        Ok(Self {
            port,
            api_key,
            signing,
            signature_window,
            tool_timeout,
            max_body_bytes,
            cors_origins,
        })
    }

    /// True when neither API key nor signature auth is configured.
    pub fn auth_disabled(&self) -> bool {
        self.api_key.is_none() && self.signing.is_none()
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::Invalid {
                name,
                expected,
                value,
            }),
        },
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
