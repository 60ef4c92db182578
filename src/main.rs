use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use geoip_gateway::app_router;
use geoip_gateway::cache::{CountryCache, MemoryCache, RedisCache};
use geoip_gateway::config::{Args, CacheBackend, Configuration};
use geoip_gateway::logging::init_logging;
use geoip_gateway::provider::ProviderClient;
use geoip_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = Configuration::load(&args.config).context("Configuration read error")?;

    let cache: Arc<dyn CountryCache> = match args.cache {
        CacheBackend::Redis => Arc::new(
            RedisCache::connect(&args.redis_url, Duration::from_secs(args.cache_timeout))
                .await
                .with_context(|| format!("cannot connect to Redis at {}", args.redis_url))?,
        ),
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
    };

    let client = ProviderClient::new(Duration::from_secs(args.provider_timeout))
        .context("cannot build HTTP client")?;

    // creating shared state
    let state = Arc::new(AppState::new(&config, Arc::clone(&cache), client));
    let app = app_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;

    info!("Gateway running on http://localhost:{}", args.port);
    info!("Cache: {} (TTL {} seconds)", cache.name(), config.expire_time);
    info!("Providers: {}", config.providers.len());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
