use anyhow::Context;
use pv_bot::logging::init_logging;
use pv_bot::{Bot, Maintenance, OpenRouterClient, RoleManager, TelegramClient};
use pv_core::PalaverConfig;
use pv_server::state::AppState;
use pv_session::{LanguageModel, Orchestrator, SessionStore, StaticPrompt, SystemPrompt};
use pv_storage::{Database, SqliteTranscript};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() {
    let config = match PalaverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config.logging.level, &config.logging.format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %format!("{e:#}"), "fatal error");
        std::process::exit(1);
    }
}

async fn run(config: PalaverConfig) -> anyhow::Result<()> {
    let database = Database::open(&config.storage.database_path)
        .with_context(|| format!("opening database {}", config.storage.database_path.display()))?;
    let store = Arc::new(SessionStore::new(&config.session));

    let roles = match &config.bot.system_prompt_file {
        Some(path) => Some(Arc::new(RoleManager::load(path)?)),
        None => None,
    };
    let prompt: Arc<dyn SystemPrompt> = match &roles {
        Some(roles) => roles.clone(),
        None => Arc::new(StaticPrompt(config.session.default_system_prompt.clone())),
    };
    let model: Arc<dyn LanguageModel> = Arc::new(OpenRouterClient::new(&config.llm)?);
    let orchestrator = Orchestrator::new(store.clone(), model, prompt, &config.session)
        .with_timeout(Duration::from_secs(config.llm.timeout_secs))
        .with_transcript(Arc::new(SqliteTranscript::new(database.clone())));
    tracing::info!(
        model = %config.llm.model,
        prompt_mode = ?config.session.prompt_mode,
        "orchestrator ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = if config.server.enabled {
        let state = AppState::new(store.clone(), database.clone());
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let mut rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.changed().await;
            };
            if let Err(e) = pv_server::serve(state, &addr, shutdown).await {
                tracing::error!(error = %e, "dashboard API stopped");
            }
        }))
    } else {
        None
    };

    let bot = Arc::new(Bot::new(orchestrator, database, &config));

    let maintenance = tokio::spawn(Maintenance::new(bot.clone(), roles).run(MAINTENANCE_INTERVAL, shutdown_rx.clone()));

    let telegram = TelegramClient::new(config.telegram.bot_token.clone())?;
    let poller = tokio::spawn(bot.run(telegram, shutdown_rx));

    shutdown_signal().await;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    if let Err(e) = poller.await {
        tracing::error!(error = %e, "poller task failed");
    }
    if let Err(e) = maintenance.await {
        tracing::error!(error = %e, "maintenance task failed");
    }
    if let Some(server) = server {
        if let Err(e) = server.await {
            tracing::error!(error = %e, "dashboard task failed");
        }
    }
    tracing::info!("bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
