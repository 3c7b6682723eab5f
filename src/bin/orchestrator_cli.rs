//! Orchestrator CLI: 预检、编排演练与模型查询的命令行工具
//!
//! Usage:
//!   orchestrator-cli dry-run [OPTIONS] [PROMPT]...   Run prompts against the scripted client
//!   orchestrator-cli preflight [OPTIONS]             Run pre-flight checks only
//!   orchestrator-cli models [--compare <prompt>]     List models, optionally compare them
//!
//! Exit codes: 0 success, 1 run aborted or a prompt failed, 2 usage or config error.

use anyhow::{bail, Context};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use ai_lib_orchestrator::client::{ScriptedClient, ScriptedReply};
use ai_lib_orchestrator::tools::builtin;
use ai_lib_orchestrator::types::format_token_limit;
use ai_lib_orchestrator::{
    Orchestrator, OrchestratorConfig, PromptOutcome, SessionEvent, TurnOutcome,
};

const DEFAULT_PROMPTS: [&str; 3] = [
    "What is the Liskov Substitution Principle? Answer in 2 sentences.",
    "Give a code example that violates it.",
    "Now fix the example so it follows the principle.",
];

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::from(2);
    }

    match args[1].as_str() {
        "dry-run" => cmd_dry_run(&args[2..]).await,
        "preflight" => cmd_preflight(&args[2..]).await,
        "models" => cmd_models(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            ExitCode::SUCCESS
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            ExitCode::from(2)
        }
    }
}

fn print_usage() {
    println!(
        r#"orchestrator-cli: 请求编排命令行工具

USAGE:
    orchestrator-cli <COMMAND> [OPTIONS]

COMMANDS:
    dry-run [PROMPT]...         Run prompts through the full pipeline (scripted client)
    preflight                   Run liveness, authentication and capability checks
    models                      List models with capabilities
    version                     Show version information
    help                        Show this help message

OPTIONS:
    --config <path>             YAML configuration file
    --model <id>                Model for the session
    --stream                    Stream deltas as they arrive
    --timeout <secs>            Per-prompt timeout
    --compare <prompt>          (models) send one prompt to every model concurrently

FAULT INJECTION (scripted client):
    --fail-start <n>            Fail the first n start attempts
    --fail-ping                 Make the liveness check fail
    --unauthenticated           Report the client as not logged in
    --flaky <n>                 Fail the next n prompt sends
    --hang                      Stall the first prompt send until it times out

ENVIRONMENT:
    RUST_LOG                    Log filter (default: info)
    AI_LIB_ORCH_MODEL           Model override
    AI_LIB_ORCH_STREAMING       Streaming override (1/true/yes)
    AI_LIB_ORCH_PROMPT_TIMEOUT_SECS
    AI_LIB_ORCH_PROMPT_MAX_ATTEMPTS
    AI_LIB_ORCH_START_MAX_ATTEMPTS"#
    );
}

fn version_line() -> String {
    format!("orchestrator-cli {}", env!("CARGO_PKG_VERSION"))
}

fn cmd_version() {
    println!("{}", version_line());
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    model: Option<String>,
    stream: bool,
    timeout: Option<f64>,
    compare: Option<String>,
    fail_start: u32,
    fail_ping: bool,
    unauthenticated: bool,
    flaky: u32,
    hang: bool,
    prompts: Vec<String>,
}

fn flag_value<'a>(
    iter: &mut std::slice::Iter<'a, String>,
    flag: &str,
) -> anyhow::Result<&'a str> {
    match iter.next() {
        Some(v) => Ok(v.as_str()),
        None => bail!("{flag} expects a value"),
    }
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => opts.config = Some(PathBuf::from(flag_value(&mut iter, arg)?)),
            "--model" => opts.model = Some(flag_value(&mut iter, arg)?.to_string()),
            "--stream" => opts.stream = true,
            "--timeout" => {
                let raw = flag_value(&mut iter, arg)?;
                let secs: f64 = raw
                    .parse()
                    .with_context(|| format!("--timeout expects seconds, got '{raw}'"))?;
                opts.timeout = Some(secs);
            }
            "--compare" => opts.compare = Some(flag_value(&mut iter, arg)?.to_string()),
            "--fail-start" => {
                let raw = flag_value(&mut iter, arg)?;
                opts.fail_start = raw
                    .parse()
                    .with_context(|| format!("--fail-start expects a count, got '{raw}'"))?;
            }
            "--fail-ping" => opts.fail_ping = true,
            "--unauthenticated" => opts.unauthenticated = true,
            "--flaky" => {
                let raw = flag_value(&mut iter, arg)?;
                opts.flaky = raw
                    .parse()
                    .with_context(|| format!("--flaky expects a count, got '{raw}'"))?;
            }
            "--hang" => opts.hang = true,
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            prompt => opts.prompts.push(prompt.to_string()),
        }
    }
    Ok(opts)
}

fn load_config(opts: &Options) -> anyhow::Result<OrchestratorConfig> {
    let base = match &opts.config {
        Some(path) => OrchestratorConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };
    let mut config = base.with_env_overrides()?;
    if let Some(model) = &opts.model {
        config.model = model.clone();
    }
    if opts.stream {
        config.streaming = true;
    }
    if let Some(secs) = opts.timeout {
        config.prompt_timeout = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid --timeout: {secs}"))?;
    }
    config.validate()?;
    Ok(config)
}

fn build_client(opts: &Options) -> ScriptedClient {
    let mut builder = ScriptedClient::builder().fail_start(opts.fail_start);
    if opts.fail_ping {
        builder = builder.ping_failure("connection refused");
    }
    if opts.unauthenticated {
        builder = builder.unauthenticated("no stored credentials");
    }
    if opts.hang {
        builder = builder.reply(ScriptedReply::Hang);
    }
    for _ in 0..opts.flaky {
        builder = builder.reply(ScriptedReply::fail("upstream returned 503"));
    }
    builder.build()
}

/// Parse options and load configuration; failures here are usage errors.
fn prepare(args: &[String]) -> Result<(Options, OrchestratorConfig), ExitCode> {
    let result = parse_options(args).and_then(|opts| {
        let config = load_config(&opts)?;
        Ok((opts, config))
    });
    result.map_err(|e| {
        eprintln!("error: {e:#}");
        ExitCode::from(2)
    })
}

fn print_outcome(outcome: &PromptOutcome) {
    match &outcome.outcome {
        TurnOutcome::Completed {
            content,
            tool_calls,
        } => {
            println!("  -> {content}");
            if !tool_calls.is_empty() {
                println!("     tools: {}", tool_calls.join(", "));
            }
            println!(
                "     ({} attempt(s), {:.1}s)",
                outcome.attempts,
                outcome.elapsed.as_secs_f64()
            );
        }
        TurnOutcome::Failed { error, timed_out } => {
            let kind = if *timed_out { "timed out" } else { "failed" };
            println!(
                "  x {kind} after {} attempt(s), {:.1}s: {error}",
                outcome.attempts,
                outcome.elapsed.as_secs_f64()
            );
            println!("    Skipping to next prompt...");
        }
    }
}

async fn cmd_dry_run(args: &[String]) -> ExitCode {
    let (opts, config) = match prepare(args) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let prompts: Vec<String> = if !opts.prompts.is_empty() {
        opts.prompts.clone()
    } else if !config.prompts.is_empty() {
        config.prompts.clone()
    } else {
        DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect()
    };

    println!("Resilient run against '{}' ({} prompt(s))\n", config.model, prompts.len());
    let streaming = config.streaming;
    let tools = vec![
        builtin::current_time(),
        builtin::calculate(),
        builtin::reverse_string(),
    ];
    let orchestrator = Orchestrator::new(build_client(&opts), config).with_tools(tools);

    let handler = |event: &SessionEvent| {
        if let Some(delta) = event.delta() {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        } else if event.is_idle() {
            println!();
        }
    };
    let result = if streaming {
        orchestrator.run_with_handler(&prompts, handler).await
    } else {
        orchestrator.run(&prompts).await
    };

    match result {
        Ok(report) => {
            println!("{}\n", report.preflight);
            for outcome in &report.prompts {
                println!("{}: {}", outcome.label, outcome.prompt);
                print_outcome(outcome);
                println!();
            }
            for warning in &report.shutdown_warnings {
                println!("shutdown warning: {warning}");
            }
            println!(
                "{} succeeded, {} failed in {:.1}s",
                report.succeeded(),
                report.failed(),
                report.elapsed.as_secs_f64()
            );
            if report.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("run aborted: {e}");
            ExitCode::from(1)
        }
    }
}

async fn cmd_preflight(args: &[String]) -> ExitCode {
    let (opts, config) = match prepare(args) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let orchestrator = Orchestrator::new(build_client(&opts), config);

    let code = match orchestrator.start().await {
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
        Ok(()) => match orchestrator.preflight().await {
            Ok(report) => {
                println!("{report}");
                if report.is_ready() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(1)
                }
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::from(1)
            }
        },
    };
    orchestrator.shutdown().await;
    code
}

async fn cmd_models(args: &[String]) -> ExitCode {
    let (opts, config) = match prepare(args) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let orchestrator = Orchestrator::new(build_client(&opts), config);
    let code = match list_and_compare(&orchestrator, opts.compare.as_deref()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    };
    orchestrator.shutdown().await;
    code
}

async fn list_and_compare(
    orchestrator: &Orchestrator<ScriptedClient>,
    compare: Option<&str>,
) -> anyhow::Result<bool> {
    orchestrator.start().await?;
    let mut models = orchestrator.client().list_models().await?;
    models.sort_by(|a, b| a.id.cmp(&b.id));

    let header = format!(
        "  {:<30} {:>6} {:>9} {:>10} {:>10}",
        "Model ID", "Vision", "Reasoning", "Context", "Prompt"
    );
    println!("{header}");
    println!("  {}", "-".repeat(header.len() - 2));
    for m in &models {
        let supports = &m.capabilities.supports;
        let limits = &m.capabilities.limits;
        println!(
            "  {:<30} {:>6} {:>9} {:>10} {:>10}",
            m.id,
            if supports.vision { "yes" } else { "-" },
            if supports.reasoning_effort { "yes" } else { "-" },
            format_token_limit(limits.max_context_window_tokens),
            format_token_limit(limits.max_prompt_tokens),
        );
    }

    let vision = models.iter().filter(|m| m.capabilities.supports.vision).count();
    let reasoning: Vec<_> = models
        .iter()
        .filter(|m| m.capabilities.supports.reasoning_effort)
        .collect();
    println!();
    println!("  Total models       : {}", models.len());
    println!("  Vision-capable     : {vision}");
    println!("  Reasoning-capable  : {}", reasoning.len());
    for m in &reasoning {
        println!(
            "    {}: {} (default: {})",
            m.id,
            m.supported_reasoning_efforts.join(", "),
            m.default_reasoning_effort.as_deref().unwrap_or("n/a")
        );
    }

    let Some(prompt) = compare else {
        return Ok(true);
    };
    println!("\nComparing {} model(s): {prompt}\n", models.len());
    let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
    let outcomes = orchestrator.compare_models(&ids, prompt).await;
    for outcome in &outcomes {
        println!("[{}]", outcome.label);
        print_outcome(outcome);
        println!();
    }
    Ok(outcomes.iter().all(|o| o.is_success()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn version_is_printed_once() {
        let line = version_line();
        assert_eq!(line, format!("orchestrator-cli {}", env!("CARGO_PKG_VERSION")));
        assert_eq!(line.matches(env!("CARGO_PKG_VERSION")).count(), 1);
    }

    #[test]
    fn options_collect_flags_and_prompts() {
        let opts = parse_options(&args(&["--stream", "--flaky", "2", "hello", "--hang"])).unwrap();
        assert!(opts.stream);
        assert!(opts.hang);
        assert_eq!(opts.flaky, 2);
        assert_eq!(opts.prompts, vec!["hello".to_string()]);
    }

    #[test]
    fn missing_flag_value_is_rejected() {
        let err = parse_options(&args(&["--timeout"])).unwrap_err();
        assert_eq!(err.to_string(), "--timeout expects a value");
    }
}
