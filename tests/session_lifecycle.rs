//! Client and session lifecycle ordering.

use ai_lib_orchestrator::client::{ClientState, ScriptedClient};
use ai_lib_orchestrator::types::SessionConfig;
use ai_lib_orchestrator::{Error, ManagedClient};

#[tokio::test]
async fn test_session_creation_before_start_is_rejected() {
    let client = ManagedClient::new(ScriptedClient::default());
    assert_eq!(client.state(), ClientState::Created);

    let err = client
        .create_session(SessionConfig::new("gpt-5-mini"))
        .await
        .err()
        .expect("create before start must fail");
    assert!(matches!(err, Error::Lifecycle { .. }));
    assert!(err.to_string().contains("before the client finished starting"));
    assert_eq!(client.inner().calls().create_session, 0);
}

#[tokio::test]
async fn test_nothing_is_allowed_after_stop() {
    let client = ManagedClient::new(ScriptedClient::default());
    client.start().await.unwrap();
    client.stop().await;
    assert_eq!(client.state(), ClientState::Stopped);

    assert!(matches!(
        client.create_session(SessionConfig::new("gpt-5-mini")).await,
        Err(Error::Lifecycle { .. })
    ));
    assert!(matches!(client.ping("late").await, Err(Error::Lifecycle { .. })));
    assert!(matches!(client.start().await, Err(Error::Lifecycle { .. })));
    assert_eq!(client.inner().calls().start, 1);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let scripted = ScriptedClient::builder()
        .stop_warning("socket closed uncleanly")
        .build();
    let client = ManagedClient::new(scripted.clone());
    client.start().await.unwrap();

    assert_eq!(client.stop().await, vec!["socket closed uncleanly".to_string()]);
    assert!(client.stop().await.is_empty());
    assert_eq!(scripted.calls().stop, 1);
}

#[tokio::test]
async fn test_start_twice_is_a_no_op() {
    let scripted = ScriptedClient::default();
    let client = ManagedClient::new(scripted.clone());
    client.start().await.unwrap();
    client.start().await.unwrap();
    assert_eq!(scripted.calls().start, 1);
}

#[tokio::test]
async fn test_session_is_usable_until_destroyed() {
    let scripted = ScriptedClient::default();
    let client = ManagedClient::new(scripted.clone());
    client.start().await.unwrap();

    let session = client
        .create_session(SessionConfig::new("gpt-4.1"))
        .await
        .unwrap();
    assert!(!session.id().is_empty());
    let reply = session.send_and_wait("ping?").await.unwrap();
    assert_eq!(reply.content, "[gpt-4.1] ping?");

    session.destroy().await.unwrap();
    assert_eq!(scripted.calls().destroy, 1);
    client.stop().await;
}
