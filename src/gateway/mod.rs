//! Gateway Session Layer
//!
//! Simulates the gateway that authenticates demo clients and brokers their
//! access to the MQTT broker. The authorization decisions live behind the
//! [`AuthHook`] trait, mirroring the hook contract the real product exposes
//! on the server side; [`DemoAuthHook`] answers them from the configured
//! user table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::acl::PermissionInfo;
use crate::client::{codes, ClientEvent, MqttClient};
use crate::config::{GatewayConfig, UserConfig};

#[cfg(test)]
mod tests;

/// Outcome of a single authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationResult {
    /// Access to the requested resource is authorized.
    Ok,
    /// The supplied token is invalid or expired.
    InvalidToken,
    /// Connection to the requested MQTT broker is not authorized.
    BrokerConnectionNotAllowed,
    /// Publishing to the requested topic is not authorized.
    PublishingNotAllowed,
    /// Subscription to the requested topic filter is not authorized.
    SubscriptionNotAllowed,
}

impl AuthorizationResult {
    /// Numeric code sent to the client to react on the user interface.
    pub fn code(&self) -> u8 {
        match self {
            AuthorizationResult::Ok => 0,
            AuthorizationResult::InvalidToken => 1,
            AuthorizationResult::BrokerConnectionNotAllowed => 2,
            AuthorizationResult::PublishingNotAllowed => 3,
            AuthorizationResult::SubscriptionNotAllowed => 4,
        }
    }

    /// Human-readable refusal message shown in the demo front end.
    pub fn error_message(&self) -> &'static str {
        match self {
            AuthorizationResult::Ok => "OK",
            AuthorizationResult::InvalidToken => "Unauthorized access: invalid token",
            AuthorizationResult::BrokerConnectionNotAllowed => {
                "Unauthorized access: connection to the broker is not allowed"
            }
            AuthorizationResult::PublishingNotAllowed => {
                "Unauthorized access: publishing to the topic is not allowed"
            }
            AuthorizationResult::SubscriptionNotAllowed => {
                "Unauthorized access: subscription to the topic is not allowed"
            }
        }
    }

    /// Whether the request was authorized.
    pub fn is_ok(&self) -> bool {
        matches!(self, AuthorizationResult::Ok)
    }

    /// Render the result as the detail object the front end stringifies
    /// into toasts.
    pub fn detail(&self) -> String {
        serde_json::json!({
            "errorCode": self.code(),
            "errorMessage": self.error_message(),
        })
        .to_string()
    }
}

/// Authorization hook consulted by the gateway and by every client created
/// from one of its sessions.
///
/// All methods default to allowing the request, so an implementation only
/// overrides the checks it cares about.
#[async_trait]
pub trait AuthHook: Send + Sync {
    /// Validate the token presented at session open.
    async fn validate_token(&self, _username: &str, _token: &str) -> AuthorizationResult {
        AuthorizationResult::Ok
    }

    /// Authorize a client connection to the named broker.
    async fn authorize_connection(
        &self,
        _username: &str,
        _broker_alias: &str,
    ) -> AuthorizationResult {
        AuthorizationResult::Ok
    }

    /// Authorize publishing to a topic.
    async fn authorize_publish(&self, _username: &str, _topic: &str) -> AuthorizationResult {
        AuthorizationResult::Ok
    }

    /// Authorize subscribing to a topic filter.
    async fn authorize_subscribe(&self, _username: &str, _filter: &str) -> AuthorizationResult {
        AuthorizationResult::Ok
    }
}

/// Hook implementation backed by the configured demo user table.
///
/// Token validation uses the gateway-side token, which may differ from the
/// one handed to the client (that is how the expired-token user fails here
/// even though the login simulator gave it a token).
pub struct DemoAuthHook {
    /// Gateway-side tokens (username -> token)
    tokens: HashMap<String, String>,
    /// Parsed permission sets (username -> permissions)
    permissions: HashMap<String, PermissionInfo>,
}

impl DemoAuthHook {
    /// Build the hook from the configured user table.
    pub fn new(users: &[UserConfig]) -> Self {
        let mut tokens = HashMap::new();
        let mut permissions = HashMap::new();

        for user in users {
            tokens.insert(user.username.clone(), user.gateway_token().to_string());
            permissions.insert(user.username.clone(), user.permissions());
        }

        Self {
            tokens,
            permissions,
        }
    }

    fn permissions_of(&self, username: &str) -> Option<&PermissionInfo> {
        self.permissions.get(username)
    }
}

#[async_trait]
impl AuthHook for DemoAuthHook {
    async fn validate_token(&self, username: &str, token: &str) -> AuthorizationResult {
        // A real deployment would look the pair up on an external service
        // (or a local cache); the demo looks up the static table.
        match self.tokens.get(username) {
            Some(expected) if expected == token => AuthorizationResult::Ok,
            _ => AuthorizationResult::InvalidToken,
        }
    }

    async fn authorize_connection(
        &self,
        username: &str,
        _broker_alias: &str,
    ) -> AuthorizationResult {
        match self.permissions_of(username) {
            Some(info) if info.allow_connect() => AuthorizationResult::Ok,
            _ => AuthorizationResult::BrokerConnectionNotAllowed,
        }
    }

    async fn authorize_publish(&self, username: &str, topic: &str) -> AuthorizationResult {
        match self.permissions_of(username) {
            Some(info) if info.allow_publish_to(topic) => AuthorizationResult::Ok,
            _ => AuthorizationResult::PublishingNotAllowed,
        }
    }

    async fn authorize_subscribe(&self, username: &str, filter: &str) -> AuthorizationResult {
        match self.permissions_of(username) {
            Some(info) if info.allow_subscribe_to(filter) => AuthorizationResult::Ok,
            _ => AuthorizationResult::SubscriptionNotAllowed,
        }
    }
}

/// Gateway error types
#[derive(Debug)]
pub enum GatewayError {
    /// The gateway refused the request
    NotAuthorized(String),
    /// The request failed for another reason (network, bad alias, ...)
    Failure(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NotAuthorized(detail) => write!(f, "not authorized: {}", detail),
            GatewayError::Failure(detail) => write!(f, "failure: {}", detail),
        }
    }
}

impl std::error::Error for GatewayError {}

/// The simulated gateway.
pub struct Gateway {
    /// Server URL sessions are opened against
    server_url: String,
    /// Named broker aliases (alias -> MQTT address)
    brokers: HashMap<String, String>,
    /// Authorization hook
    hook: Arc<dyn AuthHook>,
}

impl Gateway {
    /// Create a gateway from configuration and an authorization hook.
    pub fn new(config: &GatewayConfig, hook: Arc<dyn AuthHook>) -> Self {
        Self {
            server_url: config.server_url.clone(),
            brokers: config.brokers.clone(),
            hook,
        }
    }

    /// The configured server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Open a session for the given username/token pair.
    ///
    /// The token is the one obtained from the login simulator; the gateway
    /// validates it against its own table, so a stale client-side token is
    /// refused here.
    pub async fn open_session(
        &self,
        username: &str,
        token: &str,
    ) -> Result<Session, GatewayError> {
        debug!("Opening session against {} for '{}'", self.server_url, username);

        let result = self.hook.validate_token(username, token).await;
        if !result.is_ok() {
            return Err(GatewayError::NotAuthorized(result.detail()));
        }

        info!("Session opened for '{}'", username);
        Ok(Session {
            username: username.to_string(),
            brokers: self.brokers.clone(),
            hook: self.hook.clone(),
            clients: RwLock::new(Vec::new()),
        })
    }
}

/// An open gateway session. Owned by the page controller; closed on logout.
pub struct Session {
    /// Authenticated username
    username: String,
    /// Broker aliases resolvable by this session
    brokers: HashMap<String, String>,
    /// Authorization hook shared with created clients
    hook: Arc<dyn AuthHook>,
    /// Event channels of clients created from this session, notified on close
    clients: RwLock<Vec<mpsc::Sender<ClientEvent>>>,
}

impl Session {
    /// The authenticated username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Create an MQTT client bound to a named broker alias.
    ///
    /// Events (delivery, arrival, refusals, connection loss) are emitted on
    /// the supplied channel.
    pub fn create_client(
        &self,
        broker_alias: &str,
        event_tx: mpsc::Sender<ClientEvent>,
    ) -> Result<MqttClient, GatewayError> {
        let broker_url = self
            .brokers
            .get(broker_alias)
            .ok_or_else(|| {
                GatewayError::Failure(format!("unknown broker alias '{}'", broker_alias))
            })?
            .clone();

        self.clients.write().push(event_tx.clone());

        Ok(MqttClient::new(
            broker_alias.to_string(),
            broker_url,
            self.username.clone(),
            self.hook.clone(),
            event_tx,
        ))
    }

    /// Close the session. Clients created from it observe connection-lost
    /// code 12 (explicit close), which the controller treats as silent.
    pub async fn close(&self) {
        let senders: Vec<_> = self.clients.write().drain(..).collect();
        for tx in senders {
            let _ = tx
                .send(ClientEvent::ConnectionLost {
                    code: codes::SESSION_CLOSED,
                    reason: "session closed".to_string(),
                })
                .await;
        }
        info!("Session closed for '{}'", self.username);
    }
}
