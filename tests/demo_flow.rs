//! End-to-end tests for the auth demo
//!
//! These drive the public API the way the front end does, entirely
//! offline: every refusal in the demo is decided by the authorization
//! hook before the MQTT transport is touched.

use std::sync::Arc;

use tokio::sync::mpsc;

use mqtt_auth_demo::auth::UserDirectory;
use mqtt_auth_demo::client::{codes, ClientEvent};
use mqtt_auth_demo::config::Config;
use mqtt_auth_demo::gateway::{AuthHook, AuthorizationResult, DemoAuthHook, Gateway};

fn demo() -> (Config, Gateway, UserDirectory) {
    let config = Config::default();
    let hook = Arc::new(DemoAuthHook::new(&config.users));
    let gateway = Gateway::new(&config.gateway, hook);
    let directory = UserDirectory::new(&config.users);
    (config, gateway, directory)
}

#[tokio::test]
async fn login_then_session_then_client() {
    let (config, gateway, directory) = demo();

    // The login simulator hands out the pre-shared token.
    let token = directory.token_for("user1", "wow").unwrap().to_string();
    assert_eq!(token, "ikgdfigdfhihdsih");

    let session = gateway.open_session("user1", &token).await.unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let client = session
        .create_client(&config.gateway.default_broker, tx)
        .unwrap();
    assert_eq!(client.broker_alias(), "mosquitto");
    assert!(!client.is_connected());
}

#[tokio::test]
async fn stale_token_never_reaches_a_session() {
    let (_config, gateway, directory) = demo();

    // patient0's stored token was rotated on the server side.
    let token = directory
        .token_for("patient0", "suchpassword")
        .unwrap()
        .to_string();
    assert_eq!(token, "imwrongtoken");
    assert!(gateway.open_session("patient0", &token).await.is_err());
}

#[tokio::test]
async fn every_demo_user_authenticates() {
    let (config, _gateway, directory) = demo();

    for user in &config.users {
        let token = directory.token_for(&user.username, &user.password);
        assert_eq!(token, Some(user.token.as_str()), "{}", user.username);
    }
    assert!(directory.token_for("user1", "not-wow").is_none());
    assert!(directory.token_for("stranger", "wow").is_none());
}

#[tokio::test]
async fn permission_matrix_matches_the_user_table() {
    let config = Config::default();
    let hook = DemoAuthHook::new(&config.users);

    // leto: everything allowed.
    assert!(hook.authorize_connection("leto", "mosquitto").await.is_ok());
    assert!(hook.authorize_publish("leto", "topics/topic_30").await.is_ok());

    // user2: valid credentials, connection refused.
    assert_eq!(
        hook.authorize_connection("user2", "mosquitto").await,
        AuthorizationResult::BrokerConnectionNotAllowed
    );

    // user1: subscribe topics 1-3, publish topics 4-6, nothing crossed.
    assert!(hook.authorize_subscribe("user1", "topics/topic_2").await.is_ok());
    assert_eq!(
        hook.authorize_subscribe("user1", "topics/topic_4").await,
        AuthorizationResult::SubscriptionNotAllowed
    );
    assert!(hook.authorize_publish("user1", "topics/topic_6").await.is_ok());
    assert_eq!(
        hook.authorize_publish("user1", "topics/topic_3").await,
        AuthorizationResult::PublishingNotAllowed
    );
}

#[tokio::test]
async fn closing_the_session_notifies_every_client() {
    let (config, gateway, _directory) = demo();

    let session = gateway.open_session("leto", "powerfultoken").await.unwrap();

    let (tx1, mut rx1) = mpsc::channel(8);
    let (tx2, mut rx2) = mpsc::channel(8);
    let _c1 = session
        .create_client(&config.gateway.default_broker, tx1)
        .unwrap();
    let _c2 = session
        .create_client(&config.gateway.default_broker, tx2)
        .unwrap();

    session.close().await;

    for rx in [&mut rx1, &mut rx2] {
        match rx.recv().await.unwrap() {
            ClientEvent::ConnectionLost { code, .. } => {
                assert_eq!(code, codes::SESSION_CLOSED);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[tokio::test]
async fn refused_publish_flows_back_as_an_event() {
    let (config, gateway, directory) = demo();

    let token = directory.token_for("gollum", "veryauth").unwrap().to_string();
    let session = gateway.open_session("gollum", &token).await.unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let client = session
        .create_client(&config.gateway.default_broker, tx)
        .unwrap();

    client.publish("topics/topic_5", "ByClient_zzzzzzz").await.unwrap();

    match rx.recv().await.unwrap() {
        ClientEvent::MessageNotAuthorized { topic, reason } => {
            assert_eq!(topic, "topics/topic_5");
            assert!(reason.contains("not allowed"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn config_defaults_validate() {
    let config = Config::default();
    config.validate().unwrap();
    assert_eq!(config.topics.count, 30);
    assert_eq!(config.topics.prefix, "topics/topic_");
    assert_eq!(config.users.len(), 6);
}
