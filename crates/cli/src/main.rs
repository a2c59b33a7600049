//! Voice Agent Console Entry Point

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_agent_agent::ConversationalAgent;
use voice_agent_cli::display::{describe_event, format_history, format_latency};
use voice_agent_cli::{Command, ConsoleCapture, ConsoleSynthesis, HELP};
use voice_agent_config::{load_settings, Settings};
use voice_agent_llm::{ReasoningClient, ReasoningConfig};
use voice_agent_pipeline::{
    CaptureConfig, CaptureController, OrchestratorConfig, TurnOrchestrator,
};
use voice_agent_rag::{ChunkConfig, DocumentLoader, RetrievalIndex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("VOICE_AGENT_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?settings.environment,
        persona = ?settings.agent.persona,
        "Starting voice agent console"
    );

    settings.validate().context("Invalid configuration")?;

    let client = ReasoningClient::new(ReasoningConfig::from_settings(&settings.llm))
        .context("Set llm.api_key or VOICE_AGENT__LLM__API_KEY")?;

    let index = Arc::new(RetrievalIndex::new(ChunkConfig::from_settings(
        &settings.retrieval,
    )));
    let mut agent = ConversationalAgent::from_settings(Arc::new(client), &settings);
    if settings.retrieval.enabled {
        agent = agent.with_retrieval(Arc::clone(&index), settings.retrieval.max_results);
    }

    let capture = Arc::new(ConsoleCapture::new(Duration::from_millis(
        settings.capture.silence_timeout_ms,
    )));
    let controller = CaptureController::new(
        capture.clone(),
        CaptureConfig::from_settings(&settings.capture),
    );
    let orchestrator = TurnOrchestrator::new(
        controller,
        Arc::new(ConsoleSynthesis::new()),
        Arc::new(agent),
        OrchestratorConfig::from_settings(&settings),
    );

    orchestrator.events().subscribe_all(|event| {
        if let Some(line) = describe_event(event) {
            println!("{}", line);
        }
        Ok(())
    });

    orchestrator.start_listening()?;
    println!("{}\n", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Say(text) => {
                if !capture.push_line(&text) {
                    println!("(not listening, try again in a moment or /resume)");
                }
            }
            Command::Ingest(path) => match DocumentLoader::load(&path) {
                Ok(doc) => match index.ingest(&doc.content, doc.metadata()) {
                    Ok(id) => println!("Ingested {} as {}. {}", doc.file_name, id, doc.summary()),
                    Err(e) => println!("Could not index {}: {}", doc.file_name, e),
                },
                Err(e) => println!("Could not load {}: {}", path.display(), e),
            },
            Command::History => println!("{}", format_history(&orchestrator.history())),
            Command::Stats => {
                let stats = index.stats();
                println!(
                    "Index: {} document(s), {} fragment(s). Capture restarts: {}. Turns: {}.",
                    stats.document_count,
                    stats.fragment_count,
                    orchestrator.capture().restarts_scheduled(),
                    orchestrator.history().len()
                );
            }
            Command::Latency => println!("{}", format_latency(orchestrator.average_latencies())),
            Command::Clear => orchestrator.clear_history(),
            Command::Reset => {
                if orchestrator.reset_turn().is_none() {
                    println!("(no turn in progress)");
                }
            }
            Command::Pause => {
                orchestrator.stop_listening();
                println!("(paused)");
            }
            Command::Resume => {
                orchestrator.start_listening()?;
                println!("(listening)");
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }

    orchestrator.shutdown();
    tracing::info!("Voice agent console stopped");
    Ok(())
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voice_agent={}", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}
