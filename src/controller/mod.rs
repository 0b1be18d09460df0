//! Connection/UI Controller
//!
//! The page controller of the demo, redesigned from callback soup into an
//! explicit object: it owns the session and client handles, the topic grid,
//! and the event-port wiring (delivery, arrival, refusals, connection
//! loss). The rendering surface is abstracted behind [`UiSink`], so the
//! same controller drives the console front end and the tests.

use tokio::sync::mpsc;
use tracing::debug;

use crate::auth::UserDirectory;
use crate::client::{codes, random_payload, ClientEvent, ConnectOutcome, MqttClient, SubscribeOutcome};
use crate::config::Config;
use crate::gateway::{Gateway, Session};

mod grid;

pub use grid::{Row, RowColor, RowKind, TopicGrid, CLICK_TO_PUBLISH, CLICK_TO_SUBSCRIBE};


/// Rendering surface the controller draws on.
pub trait UiSink {
    /// Show a dismissible error toast.
    fn toast_error(&self, message: &str);
    /// A grid row changed (label, color or armed state).
    fn row_changed(&self, row: &Row);
    /// The connect action was armed or consumed.
    fn connect_changed(&self, armed: bool);
    /// The publish/subscribe panels became visible.
    fn panels_revealed(&self);
    /// The application panel replaced the login form.
    fn application_shown(&self);
    /// The login form replaced the application panel.
    fn application_hidden(&self);
    /// The demo user table (passwords included) for display.
    fn user_table(&self, table: &str);
}

/// The demo page controller.
pub struct Controller<U: UiSink> {
    ui: U,
    directory: UserDirectory,
    gateway: Gateway,
    default_broker: String,
    grid: TopicGrid,
    connect_armed: bool,
    session: Option<Session>,
    client: Option<MqttClient>,
    event_tx: mpsc::Sender<ClientEvent>,
}

impl<U: UiSink> Controller<U> {
    /// Build the controller. `event_tx` is the channel clients created by
    /// this controller emit their events on; the owner of the receiving
    /// half feeds them back through [`Controller::handle_event`].
    pub fn new(
        config: &Config,
        gateway: Gateway,
        directory: UserDirectory,
        ui: U,
        event_tx: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            ui,
            directory,
            gateway,
            default_broker: config.gateway.default_broker.clone(),
            grid: TopicGrid::new(&config.topics),
            connect_armed: false,
            session: None,
            client: None,
            event_tx,
        }
    }

    /// The current grid, for rendering.
    pub fn grid(&self) -> &TopicGrid {
        &self.grid
    }

    /// Whether a session is open.
    pub fn logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Render the user table into the UI (demo convenience; a production
    /// site would obviously never show its password table).
    pub fn show_user_table(&self) {
        self.ui.user_table(&self.directory.render_table());
    }

    /// Handle a login form submission.
    ///
    /// Fetches a token from the login simulator, then opens a gateway
    /// session with (server URL, username, token). On success the
    /// application panel is revealed and one client is created, bound to
    /// the configured broker alias. On any failure a toast is shown and
    /// the form stays usable.
    pub async fn login(&mut self, username: &str, password: &str) {
        let username = username.trim();
        let password = password.trim();

        let token = match self.directory.token_for(username, password) {
            Some(token) => token.to_string(),
            None => {
                self.ui
                    .toast_error("Authentication failed: wrong user/password");
                return;
            }
        };

        // The password stays behind; only the token travels to the gateway.
        let session = match self.gateway.open_session(username, &token).await {
            Ok(session) => session,
            Err(e) => {
                self.ui
                    .toast_error(&format!("Connection to gateway refused: {}", e));
                return;
            }
        };

        let client = match session.create_client(&self.default_broker, self.event_tx.clone()) {
            Ok(client) => client,
            Err(e) => {
                self.ui
                    .toast_error(&format!("Connection to gateway refused: {}", e));
                return;
            }
        };

        self.session = Some(session);
        self.client = Some(client);
        self.ui.application_shown();
        self.reset_grids();
    }

    /// Handle a click on the connect action.
    pub async fn connect(&mut self) {
        if !self.connect_armed {
            return;
        }
        let Some(client) = &self.client else { return };

        match client.connect().await {
            ConnectOutcome::Success => {
                // Consume the click handler so the next click is a no-op.
                self.connect_armed = false;
                self.ui.connect_changed(false);
                self.ui.panels_revealed();
            }
            ConnectOutcome::NotAuthorized(detail) => {
                self.ui
                    .toast_error(&format!("Authorization to MQTT broker failed: {}", detail));
            }
            ConnectOutcome::Failure(detail) => {
                self.ui.toast_error(&detail);
            }
        }
    }

    /// Handle a click on publish row `n`.
    pub async fn publish_row(&mut self, n: usize) {
        let armed = self
            .grid
            .publish_row(n)
            .map(|row| row.armed)
            .unwrap_or(false);
        if !armed {
            return;
        }
        let Some(client) = &self.client else { return };

        let topic = self.grid.topic(n);
        let payload = format!("ByClient_{}", random_payload(7));
        if let Err(e) = client.publish(&topic, &payload).await {
            self.ui.toast_error(&e.to_string());
        }
    }

    /// Handle a click on subscription row `n`.
    pub async fn subscribe_row(&mut self, n: usize) {
        let armed = self
            .grid
            .subscription_row(n)
            .map(|row| row.armed)
            .unwrap_or(false);
        if !armed {
            return;
        }
        let Some(client) = &self.client else { return };

        let topic = self.grid.topic(n);
        if let Some(row) = self.grid.subscription_row_mut(n) {
            row.label = format!("Subscribing to {}", topic);
        }
        if let Some(row) = self.grid.subscription_row(n) {
            self.ui.row_changed(row);
        }

        let outcome = client.subscribe(&topic).await;
        match outcome {
            SubscribeOutcome::Success => {
                if let Some(row) = self.grid.subscription_row_mut(n) {
                    row.color = Some(RowColor::Yellow);
                    row.label = format!("Start receiving messages from \"{}\"", topic);
                }
                if let Some(row) = self.grid.subscription_row(n) {
                    self.ui.row_changed(row);
                }
            }
            SubscribeOutcome::NotAuthorized(reason) => {
                // Refusal is permanent: recolor and drop the click handler.
                if let Some(row) = self.grid.subscription_row_mut(n) {
                    row.color = Some(RowColor::Red);
                    row.label = reason;
                    row.armed = false;
                }
                if let Some(row) = self.grid.subscription_row(n) {
                    self.ui.row_changed(row);
                }
            }
            SubscribeOutcome::Failure(reason) => {
                self.ui.toast_error(&format!(
                    "Subscription to \"{}\" failed: {}",
                    topic, reason
                ));
            }
        }
    }

    /// Handle a logout click: hide the application and close the session.
    pub async fn logout(&mut self) {
        if let Some(client) = self.client.take() {
            client.disconnect().await;
        }
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.ui.application_hidden();
    }

    /// Feed one client event through the controller's ports.
    pub async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::MessageDelivered { topic, payload } => {
                self.on_message_delivered(&topic, &payload);
            }
            ClientEvent::MessageArrived { topic, payload } => {
                self.on_message_arrived(&topic, &payload);
            }
            ClientEvent::MessageNotAuthorized { topic, reason } => {
                self.on_message_not_authorized(&topic, &reason);
            }
            ClientEvent::ConnectionLost { code, reason } => {
                self.on_connection_lost(code, &reason);
            }
        }
    }

    /// Reset the application grids: recreate every row idle and re-arm the
    /// connect action.
    pub fn reset_grids(&mut self) {
        self.grid.reset();
        self.connect_armed = true;
        self.ui.connect_changed(true);
        for row in self.grid.rows() {
            self.ui.row_changed(row);
        }
    }

    fn on_message_delivered(&mut self, topic: &str, payload: &str) {
        let Some(n) = self.grid.row_for_topic(topic) else { return };
        if let Some(row) = self.grid.publish_row_mut(n) {
            row.color = Some(RowColor::Yellow);
            row.label = format!(
                "Published [{}], click to publish again to {}",
                payload, topic
            );
        }
        if let Some(row) = self.grid.publish_row(n) {
            self.ui.row_changed(row);
        }
    }

    fn on_message_arrived(&mut self, topic: &str, payload: &str) {
        let Some(n) = self.grid.row_for_topic(topic) else { return };
        // Own messages echo back with the ByClient marker.
        let color = if payload.contains("ByClient") {
            RowColor::Orange
        } else {
            RowColor::Yellow
        };
        if let Some(row) = self.grid.subscription_row_mut(n) {
            row.color = Some(color);
            row.label = format!("{}:{}", topic, payload);
        }
        if let Some(row) = self.grid.subscription_row(n) {
            self.ui.row_changed(row);
        }
    }

    fn on_message_not_authorized(&mut self, topic: &str, reason: &str) {
        let Some(n) = self.grid.row_for_topic(topic) else { return };
        if let Some(row) = self.grid.publish_row_mut(n) {
            row.color = Some(RowColor::Red);
            row.label = reason.to_string();
            row.armed = false;
        }
        if let Some(row) = self.grid.publish_row(n) {
            self.ui.row_changed(row);
        }
    }

    fn on_connection_lost(&mut self, code: u8, reason: &str) {
        match code {
            codes::CONNECTION_NOT_AUTHORIZED | codes::SESSION_INVALIDATED => {
                self.ui.toast_error(reason);
                self.reset_grids();
            }
            // Explicit session close (12), client disconnection (0) and the
            // remaining codes stay silent.
            _ => {
                debug!("Connection lost (code {}): {}", code, reason);
            }
        }
    }
}
