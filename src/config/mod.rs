//! Configuration Module
//!
//! Provides TOML-based configuration for the demo with support for:
//! - Gateway settings (server URL, named broker aliases)
//! - Topic grid parameters
//! - Feed (traffic generator) parameters
//! - The demo user table (credentials, tokens, permission strings)
//! - Environment variable overrides (AUTHDEMO__* prefix)

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

use crate::acl::PermissionInfo;


/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Gateway configuration
    pub gateway: GatewayConfig,
    /// Topic grid configuration
    pub topics: TopicsConfig,
    /// Feed (traffic generator) configuration
    pub feed: FeedConfig,
    /// The demo user table. An empty list falls back to the built-in table.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            gateway: GatewayConfig::default(),
            topics: TopicsConfig::default(),
            feed: FeedConfig::default(),
            users: default_users(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway server URL the session is opened against
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Alias of the broker the demo client binds to
    #[serde(default = "default_broker_alias")]
    pub default_broker: String,
    /// Named broker aliases (alias -> MQTT address)
    #[serde(default = "default_brokers")]
    pub brokers: HashMap<String, String>,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_broker_alias() -> String {
    "mosquitto".to_string()
}

fn default_brokers() -> HashMap<String, String> {
    let mut brokers = HashMap::new();
    brokers.insert(default_broker_alias(), "mqtt://localhost:1883".to_string());
    brokers
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            default_broker: default_broker_alias(),
            brokers: default_brokers(),
        }
    }
}

/// Topic grid configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Prefix for derived topic names
    #[serde(default = "default_topic_prefix")]
    pub prefix: String,
    /// Number of topics (grid rows)
    #[serde(default = "default_topic_count")]
    pub count: usize,
}

fn default_topic_prefix() -> String {
    "topics/topic_".to_string()
}

fn default_topic_count() -> usize {
    30
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            prefix: default_topic_prefix(),
            count: default_topic_count(),
        }
    }
}

impl TopicsConfig {
    /// Derived topic name for row `n` (1-based)
    pub fn topic(&self, n: usize) -> String {
        format!("{}{}", self.prefix, n)
    }

    /// All topic names in grid order
    pub fn all(&self) -> Vec<String> {
        (1..=self.count).map(|n| self.topic(n)).collect()
    }
}

/// Feed (traffic generator) configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Publish interval (e.g. "500ms")
    #[serde(with = "humantime_serde", default = "default_feed_interval")]
    pub interval: Duration,
    /// Random payload length in characters
    #[serde(default = "default_payload_len")]
    pub payload_len: usize,
}

fn default_feed_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_payload_len() -> usize {
    7
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval: default_feed_interval(),
            payload_len: default_payload_len(),
        }
    }
}

/// One entry of the demo user table
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    /// Username
    pub username: String,
    /// Password (plaintext, demo-only)
    pub password: String,
    /// Pre-shared token handed to the client after login
    pub token: String,
    /// Token the gateway actually accepts. Defaults to `token`; set to a
    /// different value to model a client-side token that the gateway
    /// considers expired.
    #[serde(default)]
    pub gateway_token: Option<String>,
    /// "yes" to allow a broker connection, anything else denies
    #[serde(default)]
    pub can_connect: String,
    /// Comma-separated subscribe permission string (or "all"/"none")
    #[serde(default)]
    pub can_subscribe: String,
    /// Comma-separated publish permission string (or "all"/"none")
    #[serde(default)]
    pub can_publish: String,
}

impl UserConfig {
    /// The token the gateway validates against
    pub fn gateway_token(&self) -> &str {
        self.gateway_token.as_deref().unwrap_or(&self.token)
    }

    /// Parsed permission set
    pub fn permissions(&self) -> PermissionInfo {
        PermissionInfo::from_strings(&self.can_connect, &self.can_subscribe, &self.can_publish)
    }
}

/// The built-in demo user table, shared between the login simulator and the
/// gateway hook.
pub fn default_users() -> Vec<UserConfig> {
    fn user(
        username: &str,
        password: &str,
        token: &str,
        gateway_token: Option<&str>,
        can_connect: &str,
        can_subscribe: &str,
        can_publish: &str,
    ) -> UserConfig {
        UserConfig {
            username: username.to_string(),
            password: password.to_string(),
            token: token.to_string(),
            gateway_token: gateway_token.map(|t| t.to_string()),
            can_connect: can_connect.to_string(),
            can_subscribe: can_subscribe.to_string(),
            can_publish: can_publish.to_string(),
        }
    }

    vec![
        user(
            "user1",
            "wow",
            "ikgdfigdfhihdsih",
            None,
            "yes",
            "topics/topic_1, topics/topic_2, topics/topic_3",
            "topics/topic_4, topics/topic_5, topics/topic_6",
        ),
        user("user2", "wow", "slaoejkauekalkew", None, "no", "", ""),
        // The token this user carries is already expired on the gateway, to
        // demonstrate the session-open failure path.
        user(
            "patient0",
            "suchpassword",
            "imwrongtoken",
            Some("lookihaveanewtokenhere"),
            "",
            "",
            "",
        ),
        user("leto", "sosecurity", "powerfultoken", None, "yes", "all", "all"),
        user("gollum", "veryauth", "toobadforyou", None, "yes", "none", "none"),
        user(
            "lucky",
            "muchhappy",
            "srsly",
            None,
            "yes",
            "none",
            "topics/topic_13, topics/topic_17",
        ),
    ]
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `AUTHDEMO__` prefix with double underscores for nesting:
    ///    - `AUTHDEMO__GATEWAY__SERVER_URL=http://gw:8080` overrides `gateway.server_url`
    ///    - `AUTHDEMO__TOPICS__COUNT=10` overrides `topics.count`
    ///    - `AUTHDEMO__LOG__LEVEL=debug` overrides `log.level`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // Start with defaults
            .set_default("log.level", "info")?
            .set_default("gateway.server_url", default_server_url())?
            .set_default("gateway.default_broker", default_broker_alias())?
            .set_default("topics.prefix", default_topic_prefix())?
            .set_default("topics.count", default_topic_count() as i64)?
            .set_default("feed.interval", "500ms")?
            .set_default("feed.payload_len", default_payload_len() as i64)?;

        // Load from file with env var substitution
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        // Override with environment variables (AUTHDEMO__GATEWAY__SERVER_URL, etc.)
        // Double underscore separates nested keys, single underscore preserved in field names
        let cfg = builder
            .add_source(
                Environment::with_prefix("AUTHDEMO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = cfg.try_deserialize()?;
        if config.users.is_empty() {
            config.users = default_users();
        }
        if config.gateway.brokers.is_empty() {
            config.gateway.brokers = default_brokers();
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides only (no file).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new(""))
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        if config.users.is_empty() {
            config.users = default_users();
        }
        if config.gateway.brokers.is_empty() {
            config.gateway.brokers = default_brokers();
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topics.count == 0 {
            return Err(ConfigError::Validation(
                "topics.count must be at least 1".to_string(),
            ));
        }

        if !self.gateway.brokers.contains_key(&self.gateway.default_broker) {
            return Err(ConfigError::Validation(format!(
                "gateway.default_broker '{}' has no entry in gateway.brokers",
                self.gateway.default_broker
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err(ConfigError::Validation(
                    "user with empty username".to_string(),
                ));
            }
            if !seen.insert(&user.username) {
                return Err(ConfigError::Validation(format!(
                    "duplicate user '{}'",
                    user.username
                )));
            }
            if user.token.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "user '{}' has empty token",
                    user.username
                )));
            }
        }

        if self.feed.payload_len == 0 {
            return Err(ConfigError::Validation(
                "feed.payload_len must be at least 1".to_string(),
            ));
        }

        // A zero period would panic in the feed's interval timer.
        if self.feed.interval.is_zero() {
            return Err(ConfigError::Validation(
                "feed.interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Build a user lookup map for efficient auth checks
    pub fn build_user_map(&self) -> HashMap<String, &UserConfig> {
        self.users
            .iter()
            .map(|user| (user.username.clone(), user))
            .collect()
    }
}
