use std::process::ExitCode;
use std::sync::Arc;

use rapport::adapters::ai::{MockAIProvider, OpenAIConfig, OpenAIProvider};
use rapport::adapters::humanizer::{HttpHumanizer, HttpHumanizerConfig, PassthroughHumanizer};
use rapport::adapters::platform::{InMemoryConnector, UnsupportedConnector};
use rapport::adapters::postgres::{
    self, PostgresCategoryScoreRepository, PostgresConversationRepository,
    PostgresConversationStateRepository,
};
use rapport::adapters::storage::InMemoryStore;
use rapport::application::{AiConversationSummarizer, AutomatedConversationManager, ManagerPorts};
use rapport::config::{AiProvider, AppConfig, HumanizerConfig};
use rapport::domain::conversation::PlatformKind;
use rapport::ports::{
    AIProvider, CategoryScoreRepository, ConnectorRegistry, ConversationRepository,
    ConversationStateRepository, Humanizer,
};
use rapport::telemetry;
use secrecy::{ExposeSecret, Secret};
use tokio::sync::watch;

struct Stores {
    conversations: Arc<dyn ConversationRepository>,
    scores: Arc<dyn CategoryScoreRepository>,
    states: Arc<dyn ConversationStateRepository>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    telemetry::init_tracing(&config.logging);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "rapport stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting rapport");

    let categories = Arc::new(config.categories.load_registry()?);
    let ai = build_ai(&config);
    let humanizer = build_humanizer(&config.humanizer);
    let stores = build_stores(&config).await?;

    // Live platform clients are external; unsupported kinds fail loudly per call.
    let connectors = ConnectorRegistry::new()
        .with(Arc::new(InMemoryConnector::new(PlatformKind::Telegram)))
        .with(Arc::new(UnsupportedConnector::new(PlatformKind::Instagram)))
        .with(Arc::new(UnsupportedConnector::new(PlatformKind::Whatsapp)));

    let manager = AutomatedConversationManager::new(
        ManagerPorts {
            summarizer: Arc::new(AiConversationSummarizer::new(ai.clone())),
            ai,
            humanizer,
            connectors,
            conversations: stores.conversations,
            scores: stores.scores,
            states: stores.states,
            categories,
        },
        config.automation.manager_config(),
    );

    let restored = manager.restore_active_goals().await?;
    tracing::info!(restored, "conversation manager running");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    runner.await?;

    tracing::info!("rapport stopped");
    Ok(())
}

fn build_ai(config: &AppConfig) -> Arc<dyn AIProvider> {
    let ai = &config.ai;
    match (ai.provider, &ai.openai_api_key) {
        (AiProvider::OpenAI, Some(key)) => {
            let openai = OpenAIConfig::from_secret(Secret::new(key.expose_secret().clone()))
                .with_model(ai.model.clone())
                .with_base_url(ai.base_url.clone())
                .with_timeout(ai.timeout())
                .with_max_retries(ai.max_retries);
            tracing::info!(model = %ai.model, "using OpenAI completion provider");
            Arc::new(OpenAIProvider::new(openai))
        }
        (AiProvider::OpenAI, None) | (AiProvider::Mock, _) => {
            tracing::warn!("using mock completion provider");
            Arc::new(MockAIProvider::new())
        }
    }
}

fn build_humanizer(config: &HumanizerConfig) -> Arc<dyn Humanizer> {
    let endpoint = config.endpoint.as_deref().filter(|e| !e.trim().is_empty());
    match endpoint {
        Some(endpoint) if config.enabled => {
            let mut http = HttpHumanizerConfig::new(endpoint)
                .with_poll_interval(config.poll_interval())
                .with_max_polls(config.max_polls)
                .with_request_timeout(config.timeout());
            if let Some(key) = &config.api_key {
                http = http.with_api_key(Secret::new(key.expose_secret().clone()));
            }
            tracing::info!(endpoint, "using HTTP humanizer");
            Arc::new(HttpHumanizer::new(http))
        }
        _ => Arc::new(PassthroughHumanizer::new()),
    }
}

async fn build_stores(config: &AppConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    let db = &config.database;
    let Some(url) = db.url() else {
        tracing::warn!("no database configured, state is kept in memory only");
        let store = InMemoryStore::new();
        return Ok(Stores {
            conversations: Arc::new(store.clone()),
            scores: Arc::new(store.clone()),
            states: Arc::new(store),
        });
    };

    let pool = postgres::connect(
        url,
        db.min_connections,
        db.max_connections,
        db.acquire_timeout(),
    )
    .await?;
    if db.run_migrations {
        postgres::run_migrations(&pool).await?;
        tracing::info!("database migrations applied");
    }
    Ok(Stores {
        conversations: Arc::new(PostgresConversationRepository::new(pool.clone())),
        scores: Arc::new(PostgresCategoryScoreRepository::new(pool.clone())),
        states: Arc::new(PostgresConversationStateRepository::new(pool)),
    })
}
