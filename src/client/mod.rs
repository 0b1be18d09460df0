//! MQTT Client Wrapper
//!
//! Thin client over the `rumqttc` transport. Every publish and subscribe is
//! checked against the session's authorization hook before it reaches the
//! broker, so refusals surface exactly where the gateway would refuse them.
//! Delivery, arrival, refusal and connection-lost notifications are emitted
//! as [`ClientEvent`]s on the channel supplied at creation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::time::timeout_at;
use tracing::{debug, error};

use crate::gateway::AuthHook;


/// Connection-lost codes, matching the wire values of the product the demo
/// targets. The controller treats everything except 10 and 11 as silent.
pub mod codes {
    /// Clean disconnect requested by the client.
    pub const CLIENT_DISCONNECT: u8 = 0;
    /// Transport-level connection error.
    pub const CONNECTION_ERROR: u8 = 8;
    /// The authorization layer refused the connection.
    pub const CONNECTION_NOT_AUTHORIZED: u8 = 10;
    /// The server invalidated the session (e.g. token expired).
    pub const SESSION_INVALIDATED: u8 = 11;
    /// Explicit session close.
    pub const SESSION_CLOSED: u8 = 12;
}

/// Timeout for the broker connection handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// An own publish was handed to the broker (QoS 0: fire-and-forget).
    MessageDelivered { topic: String, payload: String },
    /// A message arrived on a subscribed topic.
    MessageArrived { topic: String, payload: String },
    /// A publish was refused by the authorization hook.
    MessageNotAuthorized { topic: String, reason: String },
    /// The connection (or session) was lost.
    ConnectionLost { code: u8, reason: String },
}

/// Outcome of a connect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Connected to the broker.
    Success,
    /// The authorization hook refused the connection.
    NotAuthorized(String),
    /// The connection failed (network, handshake, refusal by the broker).
    Failure(String),
}

/// Outcome of a subscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Subscription requested.
    Success,
    /// The authorization hook refused the subscription.
    NotAuthorized(String),
    /// The request failed.
    Failure(String),
}

/// Client error types
#[derive(Debug)]
pub enum ClientError {
    /// Operation requires an established connection
    NotConnected,
    /// The transport rejected the request
    Transport(String),
    /// The broker address could not be parsed
    BadAddress(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::NotConnected => write!(f, "client is not connected"),
            ClientError::Transport(msg) => write!(f, "transport error: {}", msg),
            ClientError::BadAddress(addr) => write!(f, "bad broker address: {}", addr),
        }
    }
}

impl std::error::Error for ClientError {}

/// Parse an MQTT broker address of the form `[mqtt://|tcp://]host[:port]`.
/// The port defaults to 1883.
pub fn parse_broker_url(url: &str) -> Result<(String, u16), ClientError> {
    let stripped = url
        .trim()
        .strip_prefix("mqtt://")
        .or_else(|| url.trim().strip_prefix("tcp://"))
        .unwrap_or_else(|| url.trim());

    if stripped.is_empty() {
        return Err(ClientError::BadAddress(url.to_string()));
    }

    match stripped.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| ClientError::BadAddress(url.to_string()))?;
            if host.is_empty() {
                return Err(ClientError::BadAddress(url.to_string()));
            }
            Ok((host.to_string(), port))
        }
        None => Ok((stripped.to_string(), 1883)),
    }
}

/// Random lowercase-alphanumeric string, used for payloads and client-id
/// suffixes.
pub fn random_payload(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(len)
        .collect()
}

struct ClientShared {
    broker_alias: String,
    broker_url: String,
    username: String,
    client_id: String,
    hook: Arc<dyn AuthHook>,
    event_tx: mpsc::Sender<ClientEvent>,
    /// Transport handle, present once connected
    mqtt: RwLock<Option<AsyncClient>>,
    /// Set when a clean disconnect is in progress
    closing: AtomicBool,
}

/// MQTT client bound to a named broker alias.
pub struct MqttClient {
    shared: Arc<ClientShared>,
}

impl MqttClient {
    /// Create a client. Called by the gateway session; the client is not
    /// connected until [`MqttClient::connect`] succeeds.
    pub fn new(
        broker_alias: String,
        broker_url: String,
        username: String,
        hook: Arc<dyn AuthHook>,
        event_tx: mpsc::Sender<ClientEvent>,
    ) -> Self {
        let suffix = random_payload(6);
        let client_id = format!("{}-{}", username, suffix);

        Self {
            shared: Arc::new(ClientShared {
                broker_alias,
                broker_url,
                username,
                client_id,
                hook,
                event_tx,
                mqtt: RwLock::new(None),
                closing: AtomicBool::new(false),
            }),
        }
    }

    /// The broker alias this client is bound to.
    pub fn broker_alias(&self) -> &str {
        &self.shared.broker_alias
    }

    /// Whether the client is currently connected.
    pub fn is_connected(&self) -> bool {
        self.shared.mqtt.read().is_some()
    }

    /// Connect to the broker.
    ///
    /// The authorization hook is consulted first; a refusal never touches
    /// the network. On success the event pump task is spawned and keeps
    /// forwarding arrivals and connection loss until the connection ends.
    pub async fn connect(&self) -> ConnectOutcome {
        let shared = &self.shared;

        let result = shared
            .hook
            .authorize_connection(&shared.username, &shared.broker_alias)
            .await;
        if !result.is_ok() {
            return ConnectOutcome::NotAuthorized(result.detail());
        }

        let (host, port) = match parse_broker_url(&shared.broker_url) {
            Ok(parts) => parts,
            Err(e) => return ConnectOutcome::Failure(e.to_string()),
        };

        let mut options = MqttOptions::new(shared.client_id.clone(), host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        // Wait for the CONNACK before declaring success.
        let deadline = tokio::time::Instant::now() + CONNECT_TIMEOUT;
        loop {
            let poll = match timeout_at(deadline, eventloop.poll()).await {
                Ok(poll) => poll,
                Err(_) => return ConnectOutcome::Failure("connection timed out".to_string()),
            };

            match poll {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == rumqttc::ConnectReturnCode::Success {
                        debug!(
                            "Client '{}': connected to {}",
                            shared.client_id, shared.broker_url
                        );
                        *shared.mqtt.write() = Some(client);
                        tokio::spawn(pump(shared.clone(), eventloop));
                        return ConnectOutcome::Success;
                    }
                    return ConnectOutcome::Failure(format!(
                        "connection refused by broker: {:?}",
                        ack.code
                    ));
                }
                Ok(_) => continue,
                Err(e) => return ConnectOutcome::Failure(e.to_string()),
            }
        }
    }

    /// Publish a message, QoS 0, fire-and-forget.
    ///
    /// Refusals are reported through the `MessageNotAuthorized` event, as
    /// the delivery callback wiring expects; accepted publishes emit
    /// `MessageDelivered` once handed to the transport.
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<(), ClientError> {
        let shared = &self.shared;

        let result = shared.hook.authorize_publish(&shared.username, topic).await;
        if !result.is_ok() {
            let _ = shared
                .event_tx
                .send(ClientEvent::MessageNotAuthorized {
                    topic: topic.to_string(),
                    reason: result.error_message().to_string(),
                })
                .await;
            return Ok(());
        }

        let client = shared.mqtt.read().clone().ok_or(ClientError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let _ = shared
            .event_tx
            .send(ClientEvent::MessageDelivered {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
            .await;
        Ok(())
    }

    /// Subscribe to a topic filter, QoS 0.
    pub async fn subscribe(&self, filter: &str) -> SubscribeOutcome {
        let shared = &self.shared;

        let result = shared
            .hook
            .authorize_subscribe(&shared.username, filter)
            .await;
        if !result.is_ok() {
            return SubscribeOutcome::NotAuthorized(result.error_message().to_string());
        }

        let client = match shared.mqtt.read().clone() {
            Some(client) => client,
            None => return SubscribeOutcome::Failure(ClientError::NotConnected.to_string()),
        };

        match client.subscribe(filter, QoS::AtMostOnce).await {
            Ok(()) => SubscribeOutcome::Success,
            Err(e) => SubscribeOutcome::Failure(e.to_string()),
        }
    }

    /// Disconnect cleanly. The pump reports connection-lost code 0.
    pub async fn disconnect(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        let client = self.shared.mqtt.write().take();
        if let Some(client) = client {
            let _ = client.disconnect().await;
        }
    }
}

/// Event pump: forwards transport events to the client event channel until
/// the connection ends.
async fn pump(shared: Arc<ClientShared>, mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = String::from_utf8_lossy(&publish.payload).to_string();
                let event = ClientEvent::MessageArrived {
                    topic: publish.topic,
                    payload,
                };
                if shared.event_tx.send(event).await.is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                shared.mqtt.write().take();
                let (code, reason) = if shared.closing.load(Ordering::SeqCst) {
                    debug!("Client '{}': disconnected", shared.client_id);
                    (codes::CLIENT_DISCONNECT, "client disconnected".to_string())
                } else {
                    error!("Client '{}': connection lost: {}", shared.client_id, e);
                    (codes::CONNECTION_ERROR, e.to_string())
                };
                let _ = shared
                    .event_tx
                    .send(ClientEvent::ConnectionLost { code, reason })
                    .await;
                return;
            }
        }
    }
}
