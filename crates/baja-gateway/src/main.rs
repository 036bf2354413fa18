use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use baja_core::config::BajaConfig;
use baja_discord::{BotContext, DiscordAdapter, SerenityPlatform};
use baja_parts::NotionClient;
use baja_scheduler::{ScheduleManager, ScheduleStore, SystemClock, TaskContext};
use baja_summarizer::openai::OpenAiProvider;
use baja_summarizer::router::{ProviderRouter, ProviderSlot};
use baja_summarizer::{LlmProvider, Summarizer, SummaryPipeline};
use clap::Parser;
use serenity::http::Http;
use tracing::{info, warn};

mod app;
mod http;

/// Discord summary bot: scheduled channel digests, thread titles, parts lookup.
#[derive(Parser, Debug)]
#[command(name = "baja-gateway", version)]
struct Args {
    /// Config file path (default ~/.baja/baja.toml).
    #[arg(short, long, env = "BAJA_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "baja_gateway=info,baja_scheduler=info,baja_discord=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();
    let config = BajaConfig::load(args.config.as_deref()).context("loading config")?;

    baja_scheduler::schedule::parse_timezone(&config.scheduler.default_timezone)
        .context("scheduler.default_timezone")?;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path)?;
    info!(path = %db_path, "opening SQLite database");
    let store = Arc::new(
        ScheduleStore::open(db_path, config.scheduler.default_timezone.clone())
            .context("opening schedule store")?,
    );

    // REST client only; the gateway connection is owned by the adapter.
    let http = Arc::new(Http::new(&config.discord.bot_token));
    let platform = Arc::new(SerenityPlatform::new(http));

    let summarizer: Arc<dyn SummaryPipeline> = Arc::new(Summarizer::new(
        build_provider(&config)?,
        config.provider.max_tokens,
    ));

    let manager = Arc::new(ScheduleManager::new(TaskContext {
        store: Arc::clone(&store),
        platform: platform.clone(),
        pipeline: Arc::clone(&summarizer),
        clock: Arc::new(SystemClock),
        history_limit: config.scheduler.history_limit,
    }));
    let started = manager.load_all().context("starting schedules")?;
    info!(schedules = started, "schedule tasks started");

    let parts = build_parts_client(&config);

    let bot = Arc::new(BotContext {
        config: config.discord.clone(),
        platform,
        manager: Arc::clone(&manager),
        summarizer,
        parts,
        history_limit: config.scheduler.history_limit,
    });
    let adapter = DiscordAdapter::new(bot)?;
    tokio::spawn(adapter.run());
    info!("Discord bot started");

    let addr: SocketAddr = format!("{}:{}", config.http.bind, config.http.port).parse()?;
    let state = Arc::new(app::AppState::new(Arc::clone(&manager)));
    let router = app::build_router(state);

    info!("Baja gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.stop_all();
    info!("schedule tasks stopped");
    Ok(())
}

/// One OpenAI-compatible slot per configured model, tried in order.
fn build_provider(config: &BajaConfig) -> anyhow::Result<Box<dyn LlmProvider>> {
    let provider = &config.provider;
    if provider.api_key.trim().is_empty() {
        warn!("provider.api_key is empty; summaries will fail until it is set");
    }

    let mut slots: Vec<ProviderSlot> = provider
        .models
        .iter()
        .enumerate()
        .map(|(i, model)| {
            info!("LLM provider slot[{}]: {} ({})", i, model, provider.base_url);
            ProviderSlot::new(
                Box::new(
                    OpenAiProvider::new(
                        provider.api_key.clone(),
                        provider.base_url.clone(),
                        model.clone(),
                    )
                    .with_attribution(provider.referer.clone(), provider.title.clone()),
                ),
                1,
            )
        })
        .collect();

    if slots.len() == 1 {
        return Ok(slots.remove(0).provider);
    }
    let router = ProviderRouter::new(slots).context("provider.models is empty")?;
    Ok(Box::new(router))
}

fn build_parts_client(config: &BajaConfig) -> Option<Arc<NotionClient>> {
    let notion = &config.notion;
    match (&notion.token, &notion.parts_data_source_id) {
        (Some(token), Some(source)) if !token.is_empty() && !source.is_empty() => {
            info!(data_source = %source, "parts lookup enabled");
            Some(Arc::new(NotionClient::new(
                token.clone(),
                source.clone(),
                notion.base_url.clone(),
                notion.max_results,
            )))
        }
        _ => {
            info!("parts lookup disabled (notion.token / notion.parts_data_source_id unset)");
            None
        }
    }
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_is_created() {
        let root = std::env::temp_dir().join(format!("baja-gw-{}", std::process::id()));
        let db = root.join("nested").join("baja.db");
        ensure_parent_dir(db.to_str().unwrap()).unwrap();
        assert!(root.join("nested").is_dir());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn parent_dir_failure_names_the_directory() {
        let file = std::env::temp_dir().join(format!("baja-gw-file-{}", std::process::id()));
        std::fs::write(&file, b"not a directory").unwrap();
        let db = file.join("baja.db");

        let err = ensure_parent_dir(db.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().starts_with("creating database directory"));
        std::fs::remove_file(&file).unwrap();
    }
}
