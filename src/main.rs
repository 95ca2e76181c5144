use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_digest::cache::NewsCache;
use news_digest::config::{Config, MailConfig};
use news_digest::dispatch::DigestDispatcher;
use news_digest::fetcher::Fetcher;
use news_digest::routes::{self, AppState};
use news_digest::scheduler::{run_daily, run_digest_job};
use news_digest::subscribers::SubscriberStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_digest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("config.toml")?;
    info!("Loaded {} feeds from configuration", config.feeds.len());
    let digest_time = config.digest_time()?;

    let fetcher = Fetcher::new(config.feeds.clone());
    let cache = Arc::new(NewsCache::new(
        fetcher,
        chrono::Duration::minutes(config.cache_ttl_minutes),
        chrono::Duration::hours(config.lookback_hours),
    ));
    let dispatcher = Arc::new(DigestDispatcher::from_mail_config(&MailConfig::from_env())?);
    let subscribers = Arc::new(SubscriberStore::new(config.subscribers_file.clone()));

    // Warm up the cache in the background on startup
    cache.force_refresh_async();

    // Daily digest schedule
    {
        let cache = cache.clone();
        let dispatcher = dispatcher.clone();
        let subscribers = subscribers.clone();
        tokio::spawn(async move {
            run_daily(digest_time, move || {
                run_digest_job(cache.clone(), dispatcher.clone(), subscribers.clone())
            })
            .await;
        });
    }

    // Build router
    let state = Arc::new(AppState {
        cache,
        dispatcher,
        subscribers,
    });
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server starting on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
