//! Discover models, check auth and smoke-test one model.
//!
//! Run with: cargo run --example model_explorer

use ai_lib_orchestrator::client::ScriptedClient;
use ai_lib_orchestrator::types::{format_token_limit, SessionConfig};
use ai_lib_orchestrator::ManagedClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = ManagedClient::new(ScriptedClient::default());
    client.start().await?;

    println!("🔌 Connecting...\n");
    let pong = client.ping("model explorer").await?;
    println!("  Ping response : {}", pong.message);
    println!("  Protocol ver  : {}", pong.protocol_version);
    println!("  Server time   : {}", pong.timestamp);

    println!("\n🔐 Authentication\n");
    let auth = client.get_auth_status().await?;
    if auth.is_authenticated {
        println!("  User    : {}", auth.login.as_deref().unwrap_or("unknown"));
        println!("  Host    : {}", auth.host.as_deref().unwrap_or("github.com"));
        println!("  Method  : {}", auth.auth_type.as_deref().unwrap_or("unknown"));
    } else {
        println!("  Not authenticated: {}", auth.status_message.unwrap_or_default());
        client.stop().await;
        return Ok(());
    }

    println!("\n📋 Available models\n");
    let mut models = client.list_models().await?;
    models.sort_by(|a, b| a.id.cmp(&b.id));
    for m in &models {
        println!(
            "  {:<24} vision={:<5} reasoning={:<5} context={:>8} prompt={:>8}",
            m.id,
            m.capabilities.supports.vision,
            m.capabilities.supports.reasoning_effort,
            format_token_limit(m.capabilities.limits.max_context_window_tokens),
            format_token_limit(m.capabilities.limits.max_prompt_tokens),
        );
    }

    println!("\n🧪 Smoke test\n");
    let session = client.create_session(SessionConfig::new("gpt-5-mini")).await?;
    let status = match session.send_and_wait("Reply with OK").await {
        Ok(reply) if !reply.content.is_empty() => "✅ responding",
        Ok(_) => "⚠️  empty reply",
        Err(_) => "❌ failed",
    };
    println!("  gpt-5-mini → {status}");
    session.destroy().await?;

    for w in client.stop().await {
        println!("⚠️  {w}");
    }
    Ok(())
}
