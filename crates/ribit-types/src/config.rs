//! Startup-only configuration surface.
//!
//! [`BotConfig`] is loaded once from a JSON file and treated as immutable
//! for the process lifetime; there is no hot-reload. Every section has
//! serde defaults so a partial (or missing) config file still yields a
//! usable value, and camelCase aliases so hand-written configs can use
//! either convention.

use serde::{Deserialize, Serialize};

use crate::error::RibitError;
use crate::secret::SecretString;

/// Full agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    /// Matrix connection settings.
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Trigger-token and command-prefix settings.
    #[serde(default)]
    pub triggers: TriggerConfig,

    /// Privileged-command authorization settings.
    #[serde(default)]
    pub authorization: AuthConfig,

    /// Per-sender rate limiting.
    #[serde(default, alias = "rateLimit")]
    pub rate_limit: RateLimitConfig,

    /// Per-room conversation context retention.
    #[serde(default)]
    pub context: ContextConfig,
}

impl BotConfig {
    /// Validate the fields the gateway cannot run without.
    ///
    /// Called at startup; a default config fails here until the Matrix
    /// section is filled in.
    pub fn validate(&self) -> Result<(), RibitError> {
        if self.matrix.homeserver_url.is_empty() {
            return Err(RibitError::ConfigInvalid {
                reason: "matrix.homeserverUrl is required".into(),
            });
        }
        if self.matrix.access_token.is_empty() {
            return Err(RibitError::ConfigInvalid {
                reason: "matrix.accessToken is required".into(),
            });
        }
        if self.matrix.user_id.is_empty() {
            return Err(RibitError::ConfigInvalid {
                reason: "matrix.userId is required".into(),
            });
        }
        if self.triggers.tokens.is_empty() {
            return Err(RibitError::ConfigInvalid {
                reason: "triggers.tokens must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Matrix connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Homeserver base URL (e.g. `https://envs.net`).
    #[serde(default, alias = "homeserverUrl")]
    pub homeserver_url: String,

    /// Access token for the bot account.
    #[serde(default, alias = "accessToken")]
    pub access_token: SecretString,

    /// Full user ID of the bot (e.g. `@ribit.2.0:envs.net`).
    #[serde(default, alias = "userId")]
    pub user_id: String,

    /// Whether to automatically accept room invitations.
    #[serde(default = "default_true", alias = "autoJoin")]
    pub auto_join: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver_url: String::new(),
            access_token: SecretString::default(),
            user_id: String::new(),
            auto_join: true,
        }
    }
}

/// Trigger-token configuration for the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Names the agent answers to at the start of a message.
    /// Matching is case-insensitive.
    #[serde(default = "default_trigger_tokens")]
    pub tokens: Vec<String>,

    /// Prefix character that marks a command payload.
    #[serde(default = "default_command_prefix", alias = "commandPrefix")]
    pub command_prefix: char,
}

fn default_trigger_tokens() -> Vec<String> {
    vec!["ribit.2.0".into(), "ribit".into(), "emulator".into()]
}

fn default_command_prefix() -> char {
    '?'
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            tokens: default_trigger_tokens(),
            command_prefix: default_command_prefix(),
        }
    }
}

/// Authorization settings for privileged commands.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Identities allowed to run privileged commands. Matched exactly,
    /// case-sensitively, on the full identity string.
    #[serde(default, alias = "authorizedUsers")]
    pub authorized_users: Vec<String>,

    /// Optional expiry for denial records, in seconds. `None` keeps
    /// denial history for the process lifetime.
    #[serde(default, alias = "denialTtlSecs")]
    pub denial_ttl_secs: Option<u64>,
}

/// Per-sender rate limiting (fixed window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Events allowed per window per sender. 0 disables the limiter.
    #[serde(default = "default_max_events", alias = "maxEvents")]
    pub max_events: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_secs", alias = "windowSecs")]
    pub window_secs: u64,
}

fn default_max_events() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            window_secs: default_window_secs(),
        }
    }
}

/// Per-room conversation context retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum retained turns per room (FIFO eviction beyond this).
    #[serde(default = "default_max_turns", alias = "maxTurns")]
    pub max_turns: usize,

    /// Optional idle age in seconds after which a room's context is
    /// discarded. `None` keeps context until an explicit reset.
    #[serde(default, alias = "maxIdleSecs")]
    pub max_idle_secs: Option<u64>,
}

fn default_max_turns() -> usize {
    10
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_idle_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: BotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.rate_limit.max_events, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.context.max_turns, 10);
        assert!(config.context.max_idle_secs.is_none());
        assert!(config.matrix.auto_join);
        assert_eq!(config.triggers.command_prefix, '?');
        assert_eq!(config.triggers.tokens.len(), 3);
        assert!(config.authorization.authorized_users.is_empty());
        assert!(config.authorization.denial_ttl_secs.is_none());
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let json = r#"{
            "matrix": {
                "homeserverUrl": "https://envs.net",
                "accessToken": "syt_abc",
                "userId": "@ribit.2.0:envs.net",
                "autoJoin": false
            },
            "rateLimit": { "maxEvents": 3, "windowSecs": 10 },
            "authorization": {
                "authorizedUsers": ["@rabit233:matrix.anarchists.space"],
                "denialTtlSecs": 3600
            },
            "context": { "maxTurns": 4, "maxIdleSecs": 900 }
        }"#;
        let config: BotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.matrix.homeserver_url, "https://envs.net");
        assert_eq!(config.matrix.access_token.reveal(), "syt_abc");
        assert!(!config.matrix.auto_join);
        assert_eq!(config.rate_limit.max_events, 3);
        assert_eq!(config.authorization.denial_ttl_secs, Some(3600));
        assert_eq!(config.context.max_turns, 4);
        assert_eq!(config.context.max_idle_secs, Some(900));
    }

    #[test]
    fn validate_rejects_missing_matrix_fields() {
        let config = BotConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("homeserverUrl"));

        let mut config = BotConfig::default();
        config.matrix.homeserver_url = "https://envs.net".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("accessToken"));

        config.matrix.access_token = "syt_abc".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("userId"));

        config.matrix.user_id = "@ribit.2.0:envs.net".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_trigger_list() {
        let mut config = BotConfig::default();
        config.matrix.homeserver_url = "https://envs.net".into();
        config.matrix.access_token = "syt_abc".into();
        config.matrix.user_id = "@ribit.2.0:envs.net".into();
        config.triggers.tokens.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn serialized_config_redacts_token() {
        let mut config = BotConfig::default();
        config.matrix.access_token = "syt_secret".into();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("syt_secret"));
    }
}
