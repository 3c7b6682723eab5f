//! Streaming turns through `ManagedSession`: ordering, single completion,
//! turn exclusivity and tool dispatch.

use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;

use ai_lib_orchestrator::client::{ManagedSession, ScriptStep, ScriptedClient, ScriptedReply};
use ai_lib_orchestrator::client::scripted::ScriptedSession;
use ai_lib_orchestrator::tools::builtin::FindingsLog;
use ai_lib_orchestrator::types::{SessionConfig, Tool};
use ai_lib_orchestrator::{with_timeout, Error, ManagedClient, SessionEvent};

async fn open(client: ScriptedClient, tools: Vec<Tool>) -> ManagedSession<ScriptedSession> {
    let managed = ManagedClient::new(client);
    managed.start().await.unwrap();
    match managed
        .create_session(SessionConfig::new("gpt-5-mini").streaming(true).with_tools(tools))
        .await
    {
        Ok(session) => session,
        Err(e) => panic!("session creation failed: {e}"),
    }
}

#[tokio::test]
async fn test_deltas_arrive_in_order_and_turn_completes_once() {
    let client = ScriptedClient::builder()
        .reply(ScriptedReply::deltas(["Hel", "lo", " world"]))
        .build();
    let session = open(client, Vec::new()).await;

    let mut seen = Vec::new();
    let summary = session
        .send_streaming("greet me", |event: &SessionEvent| seen.push(event.clone()))
        .await
        .unwrap();

    let deltas: Vec<&str> = seen.iter().filter_map(|e| e.delta()).collect();
    assert_eq!(deltas, vec!["Hel", "lo", " world"]);
    assert_eq!(seen.iter().filter(|e| e.is_idle()).count(), 1);
    assert!(seen.last().map(|e| e.is_idle()).unwrap_or(false));
    assert_eq!(summary.content, "Hello world");
    assert_eq!(summary.events, seen.len());
    assert!(!session.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_second_turn_is_rejected_while_first_is_in_flight() {
    let client = ScriptedClient::builder().reply(ScriptedReply::Hang).build();
    let session = open(client, Vec::new()).await;

    let mut first = Box::pin(session.send_streaming("never finishes", |_: &SessionEvent| {}));
    tokio::select! {
        _ = &mut first => panic!("hung turn completed"),
        _ = sleep(Duration::from_millis(10)) => {}
    }
    assert!(session.is_busy());

    let err = session.send_and_wait("overlapping").await.unwrap_err();
    assert!(matches!(err, Error::TurnInProgress { .. }));

    // abandoning the first turn frees the flag, but its idle event is still owed
    drop(first);
    assert!(!session.is_busy());
    assert_eq!(session.stale_turns(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_turn_is_rejected_while_abandoned_turn_never_goes_idle() {
    let client = ScriptedClient::builder().reply(ScriptedReply::Hang).build();
    let session = open(client, Vec::new())
        .await
        .with_settle_timeout(Duration::from_secs(3));

    let err = with_timeout(
        session.send_streaming("never finishes", |_: &SessionEvent| {}),
        Duration::from_secs(1),
        "Prompt 1",
    )
    .await
    .unwrap_err();
    assert!(err.is_timeout());

    let started = tokio::time::Instant::now();
    let err = session.send_and_wait("after").await.unwrap_err();
    assert!(matches!(err, Error::TurnInProgress { .. }));
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(session.stale_turns(), 1);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_tools_are_invoked_mid_turn_and_state_is_visible_after_idle() {
    let findings = FindingsLog::new();
    let client = ScriptedClient::builder()
        .reply(ScriptedReply::Steps(vec![
            ScriptStep::Delta("Reviewing... ".into()),
            ScriptStep::Tool {
                name: "record_finding".into(),
                arguments: json!({
                    "severity": "critical",
                    "category": "security",
                    "line": 4,
                    "message": "SQL built by string concatenation"
                }),
            },
            ScriptStep::Delta("done.".into()),
        ]))
        .build();
    let session = open(client, vec![findings.tool()]).await;

    let mut completions = Vec::new();
    let summary = session
        .send_streaming("review this", |event: &SessionEvent| {
            if let SessionEvent::ToolExecutionComplete { success, result, .. } = event {
                completions.push((*success, result.clone()));
            }
        })
        .await
        .unwrap();

    assert_eq!(summary.tool_calls, vec!["record_finding".to_string()]);
    assert_eq!(summary.content, "Reviewing... done.");
    assert_eq!(completions.len(), 1);
    assert!(completions[0].0);

    let recorded = findings.findings();
    assert_eq!(recorded.len(), 1);
    assert_eq!(
        recorded[0].to_string(),
        "[CRITICAL] (security, L4) SQL built by string concatenation"
    );
}

#[tokio::test]
async fn test_session_error_event_fails_turn_without_leaking_into_next() {
    let client = ScriptedClient::builder()
        .reply(ScriptedReply::Steps(vec![
            ScriptStep::Delta("partial".into()),
            ScriptStep::Error("model overloaded".into()),
        ]))
        .build();
    let session = open(client, Vec::new()).await;

    let err = session
        .send_streaming("first", |_: &SessionEvent| {})
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transient { .. }));
    assert!(err.is_retryable());

    let summary = session
        .send_streaming("second", |_: &SessionEvent| {})
        .await
        .unwrap();
    assert_eq!(summary.content, "[gpt-5-mini] second");
    assert!(summary.errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_from_abandoned_turn_are_discarded() {
    let client = ScriptedClient::builder()
        .reply(ScriptedReply::Steps(vec![
            ScriptStep::Pause(Duration::from_secs(5)),
            ScriptStep::Delta("stale".into()),
        ]))
        .build();
    let session = open(client, Vec::new()).await;

    let err = with_timeout(
        session.send_streaming("slow", |_: &SessionEvent| {}),
        Duration::from_secs(1),
        "Prompt 1",
    )
    .await
    .unwrap_err();
    assert!(err.is_timeout());
    assert!(!session.is_busy());

    // let the background turn finish and queue its events
    sleep(Duration::from_secs(10)).await;

    let mut seen = Vec::new();
    let summary = session
        .send_streaming("fresh", |event: &SessionEvent| seen.push(event.clone()))
        .await
        .unwrap();
    assert_eq!(summary.content, "[gpt-5-mini] fresh");
    assert!(seen.iter().all(|e| e.delta() != Some("stale")));
}

#[tokio::test(start_paused = true)]
async fn test_late_events_of_timed_out_turn_do_not_answer_the_next_prompt() {
    let client = ScriptedClient::builder()
        .reply(ScriptedReply::Steps(vec![
            ScriptStep::Pause(Duration::from_secs(31)),
            ScriptStep::Delta("STALE answer to prompt 1".into()),
        ]))
        .reply(ScriptedReply::Steps(vec![
            ScriptStep::Pause(Duration::from_secs(5)),
            ScriptStep::Delta("fresh answer to prompt 2".into()),
        ]))
        .build();
    let session = open(client.clone(), Vec::new()).await;

    let err = with_timeout(
        session.send_streaming("prompt 1", |_: &SessionEvent| {}),
        Duration::from_secs(30),
        "Prompt 1",
    )
    .await
    .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(session.stale_turns(), 1);

    // sent right away: the first turn's events arrive while this one is waiting
    let mut seen = Vec::new();
    let summary = with_timeout(
        session.send_streaming("prompt 2", |event: &SessionEvent| seen.push(event.clone())),
        Duration::from_secs(30),
        "Prompt 2",
    )
    .await
    .unwrap();

    assert_eq!(summary.content, "fresh answer to prompt 2");
    assert!(seen.iter().all(|e| e.delta() != Some("STALE answer to prompt 1")));
    assert_eq!(seen.iter().filter(|e| e.is_idle()).count(), 1);
    assert_eq!(session.stale_turns(), 0);
    assert_eq!(client.calls().send, 2);
}

#[tokio::test(start_paused = true)]
async fn test_settle_waits_for_abandoned_turn_to_go_idle() {
    let client = ScriptedClient::builder()
        .reply(ScriptedReply::Steps(vec![
            ScriptStep::Pause(Duration::from_secs(4)),
            ScriptStep::Delta("late".into()),
        ]))
        .build();
    let session = open(client, Vec::new()).await;

    let err = with_timeout(
        session.send_streaming("slow", |_: &SessionEvent| {}),
        Duration::from_secs(1),
        "Prompt 1",
    )
    .await
    .unwrap_err();
    assert!(err.is_timeout());

    session.settle().await.unwrap();
    assert_eq!(session.stale_turns(), 0);
    // nothing owed any more, so settling again returns at once
    session.settle().await.unwrap();
}
