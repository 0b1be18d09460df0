//! MQTT authentication and authorization demo
//!
//! The server-side half of the classic auth demo: a login simulator that
//! trades user/password for a pre-shared token, a gateway that enforces
//! per-user broker permissions through a pluggable hook, an MQTT client
//! wrapper, and the page controller that drives the topic grid.

pub mod acl;
pub mod auth;
pub mod client;
pub mod config;
pub mod controller;
pub mod gateway;

pub use acl::{Grant, PermissionInfo};
pub use auth::UserDirectory;
pub use client::{ClientEvent, MqttClient};
pub use config::Config;
pub use controller::{Controller, TopicGrid, UiSink};
pub use gateway::{AuthHook, AuthorizationResult, DemoAuthHook, Gateway, Session};
