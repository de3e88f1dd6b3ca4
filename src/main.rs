use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loqa_subtitles::nats::{spawn_event_publisher, NatsClient, NatsRecognitionSource, NatsSourceFactory};
use loqa_subtitles::{
    create_router, AppState, Config, PipelineContext, SubtitleSession, TranslationOrchestrator,
    TranslationRequest,
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loqa-subtitles", version, about = "Live subtitles with speaker labels and translation")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/loqa-subtitles")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP control API
    Serve,

    /// Run one session against the STT service and print events as JSON lines
    Listen {
        #[arg(long)]
        session_id: String,

        /// Recognition locale, e.g. "en-US"
        #[arg(long)]
        language: Option<String>,

        /// Target language (repeatable)
        #[arg(long = "to")]
        to: Vec<String>,
    },

    /// Translate a piece of text once
    Translate {
        text: String,

        /// Target language (repeatable)
        #[arg(long = "to")]
        to: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Loqa Subtitles v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let context = Arc::new(PipelineContext::from_config(cfg.translation.clone())?);
    let _sweeper = context
        .rate_limiter()
        .spawn_sweeper(cfg.translation.sweep_interval());

    match cli.command {
        Command::Serve => serve(cfg, context).await,
        Command::Listen {
            session_id,
            language,
            to,
        } => listen(cfg, context, session_id, language, to).await,
        Command::Translate { text, to } => translate(context, text, to).await,
    }
}

async fn serve(cfg: Config, context: Arc<PipelineContext>) -> Result<()> {
    let nats = Arc::new(NatsClient::connect(&cfg.nats.url).await?);
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let publish_events = cfg.nats.publish_events;

    let mut state = AppState::new(
        Arc::new(cfg),
        context,
        Arc::new(NatsSourceFactory::new(Arc::clone(&nats))),
    );
    if publish_events {
        state = state.with_publisher(nats);
    }
    let _maintenance = state.orchestrator.spawn_maintenance();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn listen(
    cfg: Config,
    context: Arc<PipelineContext>,
    session_id: String,
    language: Option<String>,
    to: Vec<String>,
) -> Result<()> {
    let nats = Arc::new(NatsClient::connect(&cfg.nats.url).await?);
    let language = language.unwrap_or_else(|| cfg.session.recognition_language.clone());

    let mut config = cfg.session_config(session_id.clone());
    if !to.is_empty() {
        config.target_languages = Some(to);
    }

    let source = NatsRecognitionSource::new(Arc::clone(&nats), session_id.clone(), language);
    let session = SubtitleSession::new(config, context, Box::new(source));
    let mut events = session.subscribe();

    if cfg.nats.publish_events {
        spawn_event_publisher(Arc::clone(&nats), session_id, session.subscribe());
    }

    session.start().await?;

    let printer = async {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("Failed to encode event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Output lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        _ = printer => {}
        _ = shutdown_signal() => {}
    }

    let stats = session.stop().await?;
    info!(
        "Session finished: {} utterances, {} speakers, {} translations succeeded",
        stats.utterances, stats.speakers, stats.translation.succeeded
    );
    Ok(())
}

async fn translate(context: Arc<PipelineContext>, text: String, to: Vec<String>) -> Result<()> {
    let targets = if to.is_empty() {
        context.config().target_languages.clone()
    } else {
        to
    };

    let orchestrator = TranslationOrchestrator::new(context);
    let result = orchestrator
        .translate(TranslationRequest::adhoc(text, targets))
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
