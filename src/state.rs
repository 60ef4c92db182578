use std::sync::Arc;
use std::time::Duration;

use crate::cache::CountryCache;
use crate::config::Configuration;
use crate::load_balancer::ProviderPool;
use crate::lookup::RetryPolicy;
use crate::provider::ProviderClient;

// app's shared state, built once at startup
pub struct AppState {
    pub cache: Arc<dyn CountryCache>,
    pub ttl: Duration, // how long a resolved country stays cached
    pub providers: ProviderPool,
    pub client: ProviderClient,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(config: &Configuration, cache: Arc<dyn CountryCache>, client: ProviderClient) -> Self {
        let providers = ProviderPool::new(&config.providers);
        let retry = RetryPolicy::from_config(config.max_attempts, providers.len());

        Self {
            cache,
            ttl: Duration::from_secs(config.expire_time),
            providers,
            client,
            retry,
        }
    }
}
