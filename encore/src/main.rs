use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use encore::config::{Configuration, StorageBackend, StorageConfiguration};
use encore::providers::{CatalogFavorites, ConcertListings};
use encore::telegram::{poll_updates, BotApi, TelegramClient};
use encore::Bot;
use encore_auth::server::services::SpotifyOAuthClient;
use encore_auth::server::{self, AppState};
use encore_auth::store::MemorySessionStore;
use encore_auth::{notification_channel, Coordinator, SessionStore};

/// Inbound updates buffered between the feed and the dispatch loop.
const UPDATE_BUFFER: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let configuration = Configuration::new().context("Failed to load configuration")?;
    let _log_guard = encore::logging::init_logging(&configuration.logging)?;
    configuration
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    tracing::info!("Configuration loaded successfully");

    let store = open_store(
        &configuration.storage,
        configuration.server.state_ttl_seconds,
    )
    .await?;
    let oauth = Arc::new(SpotifyOAuthClient::new(&configuration.oauth)?);
    let (notifier, completions) = notification_channel(configuration.notifications.capacity);
    let coordinator = Arc::new(Coordinator::new(
        store,
        oauth,
        notifier,
        configuration.oauth.success_redirect.clone(),
    ));

    // The only fatal runtime condition: no callback listener, no authorization
    let addr = configuration.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind callback listener on {}", addr))?;

    let cancel = CancellationToken::new();
    let server = tokio::spawn(server::serve(
        listener,
        AppState {
            coordinator: coordinator.clone(),
        },
        cancel.clone(),
    ));

    let telegram = TelegramClient::new(&configuration.telegram)?;
    let me = telegram.get_me().await.context("Failed to reach the Bot API")?;
    tracing::info!(
        "Authorized bot on account {}",
        me.username.as_deref().unwrap_or("<unnamed>")
    );
    let api: Arc<dyn BotApi> = Arc::new(telegram);

    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_BUFFER);
    let feed = tokio::spawn(poll_updates(
        api.clone(),
        updates_tx,
        configuration.telegram.poll_timeout_seconds,
        cancel.clone(),
    ));

    let bot = Arc::new(Bot::new(
        api,
        coordinator,
        Arc::new(CatalogFavorites::new(Duration::from_secs(
            configuration.events.timeout_seconds,
        ))),
        Arc::new(ConcertListings::new(&configuration.events)),
        configuration.messages.clone(),
    ));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Received Ctrl+C, shutting down");
        shutdown.cancel();
    });

    bot.run(updates_rx, completions, cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = feed.await {
        tracing::warn!(error = %e, "Update feed task failed");
    }
    match server.await {
        Ok(Err(e)) => tracing::error!(error = %e, "Callback listener failed"),
        Err(e) => tracing::warn!(error = %e, "Callback listener task failed"),
        Ok(Ok(())) => {}
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn open_store(
    config: &StorageConfiguration,
    state_ttl_seconds: u64,
) -> Result<Arc<dyn SessionStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory session store");
            Ok(Arc::new(MemorySessionStore::new(state_ttl_seconds)))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("storage.database_url is required for the postgres backend")?;
            let store = encore_auth::store::PostgresSessionStore::connect(
                url,
                config.max_connections,
                state_ttl_seconds,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("Built without postgres support, use the memory backend")
        }
    }
}
