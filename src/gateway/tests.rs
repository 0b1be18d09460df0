//! Gateway session tests

use pretty_assertions::assert_eq;

use super::*;
use crate::config::{default_users, Config};

fn hook() -> DemoAuthHook {
    DemoAuthHook::new(&default_users())
}

fn gateway() -> Gateway {
    let config = Config::default();
    Gateway::new(&config.gateway, Arc::new(DemoAuthHook::new(&config.users)))
}

#[tokio::test]
async fn valid_token_opens_session() {
    let session = gateway().open_session("leto", "powerfultoken").await.unwrap();
    assert_eq!(session.username(), "leto");
}

#[tokio::test]
async fn wrong_token_is_refused() {
    let err = gateway()
        .open_session("leto", "nottherealone")
        .await
        .err()
        .unwrap();
    match err {
        GatewayError::NotAuthorized(detail) => assert!(detail.contains("invalid token")),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn unknown_user_is_refused() {
    assert!(gateway().open_session("nobody", "token").await.is_err());
}

#[tokio::test]
async fn expired_client_token_is_refused() {
    // patient0 logs in and receives "imwrongtoken", but the gateway only
    // accepts its refreshed server-side token.
    let err = gateway()
        .open_session("patient0", "imwrongtoken")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, GatewayError::NotAuthorized(_)));

    assert!(gateway()
        .open_session("patient0", "lookihaveanewtokenhere")
        .await
        .is_ok());
}

#[tokio::test]
async fn user2_opens_session_but_cannot_connect() {
    // Session open succeeds with a valid token; the broker connection is
    // what the gateway refuses.
    let session = gateway()
        .open_session("user2", "slaoejkauekalkew")
        .await
        .unwrap();
    assert_eq!(session.username(), "user2");

    let result = hook().authorize_connection("user2", "mosquitto").await;
    assert_eq!(result, AuthorizationResult::BrokerConnectionNotAllowed);
}

#[tokio::test]
async fn hook_publish_and_subscribe_decisions() {
    let hook = hook();

    assert!(hook.authorize_publish("leto", "topics/topic_29").await.is_ok());
    assert!(hook.authorize_subscribe("leto", "topics/topic_29").await.is_ok());

    assert_eq!(
        hook.authorize_publish("gollum", "topics/topic_1").await,
        AuthorizationResult::PublishingNotAllowed
    );
    assert_eq!(
        hook.authorize_subscribe("gollum", "topics/topic_1").await,
        AuthorizationResult::SubscriptionNotAllowed
    );

    // lucky may publish to exactly two topics and subscribe to none.
    assert!(hook.authorize_publish("lucky", "topics/topic_13").await.is_ok());
    assert!(hook.authorize_publish("lucky", "topics/topic_17").await.is_ok());
    assert_eq!(
        hook.authorize_publish("lucky", "topics/topic_14").await,
        AuthorizationResult::PublishingNotAllowed
    );
    assert_eq!(
        hook.authorize_subscribe("lucky", "topics/topic_13").await,
        AuthorizationResult::SubscriptionNotAllowed
    );

    // user1 has disjoint subscribe and publish grants.
    assert!(hook.authorize_subscribe("user1", "topics/topic_1").await.is_ok());
    assert_eq!(
        hook.authorize_publish("user1", "topics/topic_1").await,
        AuthorizationResult::PublishingNotAllowed
    );
    assert!(hook.authorize_publish("user1", "topics/topic_4").await.is_ok());
}

#[tokio::test]
async fn unknown_user_denied_everywhere() {
    let hook = hook();
    assert!(!hook.authorize_connection("ghost", "mosquitto").await.is_ok());
    assert!(!hook.authorize_publish("ghost", "topics/topic_1").await.is_ok());
    assert!(!hook.authorize_subscribe("ghost", "topics/topic_1").await.is_ok());
}

#[tokio::test]
async fn create_client_resolves_alias() {
    let session = gateway().open_session("leto", "powerfultoken").await.unwrap();

    let (tx, _rx) = mpsc::channel(4);
    let client = session.create_client("mosquitto", tx).unwrap();
    assert_eq!(client.broker_alias(), "mosquitto");
}

#[tokio::test]
async fn create_client_rejects_unknown_alias() {
    let session = gateway().open_session("leto", "powerfultoken").await.unwrap();

    let (tx, _rx) = mpsc::channel(4);
    let err = session.create_client("not-a-broker", tx).err().unwrap();
    match err {
        GatewayError::Failure(detail) => assert!(detail.contains("unknown broker alias")),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn session_close_emits_code_12() {
    let session = gateway().open_session("leto", "powerfultoken").await.unwrap();

    let (tx, mut rx) = mpsc::channel(4);
    let _client = session.create_client("mosquitto", tx).unwrap();

    session.close().await;

    match rx.recv().await.unwrap() {
        ClientEvent::ConnectionLost { code, .. } => assert_eq!(code, codes::SESSION_CLOSED),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn authorization_detail_is_json() {
    let detail = AuthorizationResult::InvalidToken.detail();
    let value: serde_json::Value = serde_json::from_str(&detail).unwrap();
    assert_eq!(value["errorCode"], 1);
    assert!(value["errorMessage"].as_str().unwrap().contains("invalid token"));
}
