//! Preflight phases against the scripted client: fail-closed ordering and the
//! non-fatal capability phase.

use std::time::Duration;

use ai_lib_orchestrator::client::{ClientState, ScriptedClient};
use ai_lib_orchestrator::preflight::{Phase, PhaseStatus, Preflight, PreflightConfig};
use ai_lib_orchestrator::{preflight, Error, ManagedClient};

fn statuses(report: &ai_lib_orchestrator::PreflightReport) -> Vec<(Phase, PhaseStatus)> {
    report.phases.iter().map(|p| (p.phase, p.status)).collect()
}

#[tokio::test]
async fn test_healthy_client_passes_every_phase() {
    let client = ScriptedClient::default();
    let report = Preflight::new(PreflightConfig::default()).run(&client).await;

    assert!(report.is_ready());
    assert_eq!(
        statuses(&report),
        vec![
            (Phase::Liveness, PhaseStatus::Passed),
            (Phase::Authentication, PhaseStatus::Passed),
            (Phase::Capabilities, PhaseStatus::Passed),
        ]
    );
    assert_eq!(report.models.as_ref().map(Vec::len), Some(3));

    let rendered = report.to_string();
    assert!(rendered.contains("[  ok] liveness"), "{rendered}");
    assert!(rendered.ends_with("ready"));
}

#[tokio::test]
async fn test_ping_failure_skips_auth_and_models() {
    let client = ScriptedClient::builder()
        .ping_failure("connection refused")
        .build();
    let report = Preflight::new(PreflightConfig::default()).run(&client).await;

    assert!(!report.is_ready());
    assert!(matches!(report.failure(), Some(Error::Connectivity { .. })));
    assert_eq!(
        statuses(&report),
        vec![
            (Phase::Liveness, PhaseStatus::Failed),
            (Phase::Authentication, PhaseStatus::Skipped),
            (Phase::Capabilities, PhaseStatus::Skipped),
        ]
    );

    let calls = client.calls();
    assert_eq!(calls.ping, 1);
    assert_eq!(calls.auth, 0);
    assert_eq!(calls.list_models, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_ping_times_out_as_connectivity_failure() {
    let client = ScriptedClient::builder()
        .ping_delay(Duration::from_secs(60))
        .build();
    let config = PreflightConfig {
        ping_timeout: Duration::from_secs(10),
        ..PreflightConfig::default()
    };
    let report = Preflight::new(config).run(&client).await;

    let failure = report.failure().expect("stalled ping must fail preflight");
    assert!(matches!(failure, Error::Connectivity { .. }));
    assert!(failure.to_string().contains("Ping timed out after 10.0s"));
    assert_eq!(client.calls().auth, 0);
}

#[tokio::test]
async fn test_unauthenticated_client_is_not_ready() {
    let client = ScriptedClient::builder()
        .unauthenticated("token expired")
        .build();
    let report = Preflight::new(PreflightConfig::default()).run(&client).await;

    match report.failure() {
        Some(Error::Auth { message, .. }) => assert_eq!(message, "token expired"),
        other => panic!("expected auth failure, got {other:?}"),
    }
    assert_eq!(
        report.phase(Phase::Capabilities).map(|p| p.status),
        Some(PhaseStatus::Skipped)
    );
    assert_eq!(client.calls().list_models, 0);
}

#[tokio::test]
async fn test_auth_status_error_is_an_auth_failure() {
    let client = ScriptedClient::builder().auth_failure("rpc reset").build();
    let report = Preflight::new(PreflightConfig::default()).run(&client).await;

    assert!(matches!(report.failure(), Some(Error::Auth { .. })));
    assert_eq!(
        report.phase(Phase::Authentication).map(|p| p.status),
        Some(PhaseStatus::Failed)
    );
}

#[tokio::test]
async fn test_model_listing_failure_only_warns() {
    let client = ScriptedClient::builder()
        .list_models_failure("models endpoint unavailable")
        .build();
    let report = Preflight::new(PreflightConfig::default()).run(&client).await;

    assert!(report.is_ready());
    assert!(report.models.is_none());
    assert_eq!(
        report.phase(Phase::Capabilities).map(|p| p.status),
        Some(PhaseStatus::Warned)
    );
}

#[tokio::test]
async fn test_model_check_can_be_disabled() {
    let client = ScriptedClient::default();
    let config = PreflightConfig {
        check_models: false,
        ..PreflightConfig::default()
    };
    let report = Preflight::new(config).run(&client).await;

    assert!(report.is_ready());
    assert_eq!(client.calls().list_models, 0);
    assert_eq!(
        report.phase(Phase::Capabilities).map(|p| p.status),
        Some(PhaseStatus::Skipped)
    );
}

#[tokio::test]
async fn test_preflight_helper_returns_verdict() {
    assert!(preflight(&ScriptedClient::default()).await);
    let unreachable = ScriptedClient::builder().ping_failure("down").build();
    assert!(!preflight(&unreachable).await);
}

#[tokio::test]
async fn test_managed_preflight_requires_started_client() {
    let client = ManagedClient::new(ScriptedClient::default());
    let err = client
        .preflight(&PreflightConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Lifecycle { .. }));
    assert_eq!(client.inner().calls().ping, 0);

    client.start().await.unwrap();
    assert_eq!(client.state(), ClientState::Ready);
    let report = client.preflight(&PreflightConfig::default()).await.unwrap();
    assert!(report.is_ready());
}
