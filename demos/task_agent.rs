//! Multi-turn agent that manages a task board through tool calls, streaming
//! each turn as it arrives.
//!
//! Run with: cargo run --example task_agent

use serde_json::json;
use std::io::Write;

use ai_lib_orchestrator::client::{ScriptStep, ScriptedClient, ScriptedReply};
use ai_lib_orchestrator::tools::builtin::TaskBoard;
use ai_lib_orchestrator::{Orchestrator, OrchestratorConfig, SessionEvent};

fn tool(name: &str, arguments: serde_json::Value) -> ScriptStep {
    ScriptStep::Tool {
        name: name.to_string(),
        arguments,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("warn".parse()?),
        )
        .with_target(false)
        .try_init();

    let board = TaskBoard::new();

    let client = ScriptedClient::builder()
        .reply(ScriptedReply::Steps(vec![
            tool("add_task", json!({"title": "Design database schema", "priority": "high"})),
            tool("add_task", json!({"title": "Write API tests"})),
            tool("add_task", json!({"title": "Update README", "priority": "low"})),
            ScriptStep::Delta("I added three tasks ".into()),
            ScriptStep::Delta("to the board.".into()),
        ]))
        .reply(ScriptedReply::Steps(vec![
            tool("update_task", json!({"task_id": 1, "status": "in-progress"})),
            ScriptStep::Delta("Task #1 is now in progress.".into()),
        ]))
        .reply(ScriptedReply::Steps(vec![
            tool("delete_task", json!({"task_id": 3})),
            tool("list_tasks", json!({})),
            ScriptStep::Delta("Removed the README task; two remain.".into()),
        ]))
        .build();

    let config = OrchestratorConfig {
        streaming: true,
        system_message: Some("You manage a task board. Use the tools.".into()),
        ..OrchestratorConfig::default()
    };

    let prompts = vec![
        "Plan the backend work: schema (high), API tests, README (low).".to_string(),
        "I've started on the schema.".to_string(),
        "Drop the README task and show me the board.".to_string(),
    ];

    let orchestrator = Orchestrator::new(client, config).with_tools(board.tools());
    let report = orchestrator
        .run_with_handler(&prompts, |event: &SessionEvent| match event {
            SessionEvent::MessageDelta { content } => {
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
            SessionEvent::ToolExecutionStart { tool_name, .. } => println!("  🔧 {tool_name}"),
            SessionEvent::Idle => println!("\n"),
            _ => {}
        })
        .await?;

    println!("📋 Board after {} turn(s):", report.prompts.len());
    println!("{}", board.render());
    Ok(())
}
