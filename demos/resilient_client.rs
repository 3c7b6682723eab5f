//! Resilient run: a flaky start, a transient send failure and a hung prompt,
//! all absorbed by the orchestrator.
//!
//! Run with: cargo run --example resilient_client

use std::time::Duration;

use ai_lib_orchestrator::client::{ScriptedClient, ScriptedReply};
use ai_lib_orchestrator::{Orchestrator, OrchestratorConfig, RetryPolicy, TurnOutcome};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_target(false)
        .try_init();

    let client = ScriptedClient::builder()
        .fail_start(1)
        .reply(ScriptedReply::text(
            "Subtypes must be usable anywhere their base type is expected.",
        ))
        .reply(ScriptedReply::fail("upstream returned 503"))
        .reply(ScriptedReply::text("A Square that overrides Rectangle::set_width."))
        .reply(ScriptedReply::Hang)
        .stop_warning("1 pending request cancelled")
        .build();

    let config = OrchestratorConfig {
        prompt_timeout: Duration::from_secs(2),
        prompt_retry: RetryPolicy::new(2, Duration::from_millis(500)),
        ..OrchestratorConfig::default()
    };

    let prompts = vec![
        "What is the Liskov Substitution Principle? Answer in 2 sentences.".to_string(),
        "Give a code example that violates it.".to_string(),
        "Now fix the example so it follows the principle.".to_string(),
    ];

    println!("🛡️  Resilient client\n");
    let orchestrator = Orchestrator::new(client, config);
    let report = orchestrator.run(&prompts).await?;

    println!("{}\n", report.preflight);
    for p in &report.prompts {
        println!("📝 {}: {}", p.label, p.prompt);
        match &p.outcome {
            TurnOutcome::Completed { content, .. } => {
                println!("   ✅ {content} ({} attempt(s))\n", p.attempts)
            }
            TurnOutcome::Failed { error, .. } => {
                println!("   ❌ {error}\n   Skipping to next prompt...\n")
            }
        }
    }
    for w in &report.shutdown_warnings {
        println!("⚠️  {w}");
    }
    println!(
        "{} succeeded, {} failed in {:.1}s",
        report.succeeded(),
        report.failed(),
        report.elapsed.as_secs_f64()
    );
    Ok(())
}
