use tracing::{debug, info, warn};

use crate::error::LookupError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, QUOTA_EXHAUSTED};
use crate::state::AppState;

// How many provider calls one lookup may make before giving up.
// Quota exhaustion ends the loop either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Bounded(usize),
    Unbounded,
}

impl RetryPolicy {
    // `MaxAttempts` from the configuration file: absent means one pass over
    // the providers, 0 means no limit
    pub fn from_config(max_attempts: Option<usize>, providers: usize) -> Self {
        match max_attempts {
            None => RetryPolicy::Bounded(providers.max(1)),
            Some(0) => RetryPolicy::Unbounded,
            Some(n) => RetryPolicy::Bounded(n),
        }
    }

    fn allows(&self, attempts: usize) -> bool {
        match self {
            RetryPolicy::Bounded(max) => attempts < *max,
            RetryPolicy::Unbounded => true,
        }
    }
}

/// Cache-aside lookup of `ip`.
///
/// On a miss, the first provider under quota is called. A failed call sends
/// the loop back to provider selection with nothing excluded, so the same
/// provider may be picked again. The country is written to the cache before
/// it is returned.
pub async fn lookup_country(state: &AppState, ip: &str) -> Result<String, LookupError> {
    match state.cache.get(ip).await.map_err(LookupError::Cache)? {
        Some(country) => {
            CACHE_HITS.inc();
            debug!("Cache HIT for {}", ip);
            return Ok(country);
        }
        None => {
            CACHE_MISSES.inc();
            debug!("Cache MISS for {}", ip);
        }
    }

    let country = fetch_from_providers(state, ip).await?;

    state
        .cache
        .set(ip, &country, state.ttl)
        .await
        .map_err(LookupError::CacheWrite)?;

    Ok(country)
}

async fn fetch_from_providers(state: &AppState, ip: &str) -> Result<String, LookupError> {
    let mut attempts = 0;

    loop {
        let Some(admission) = state.providers.select() else {
            QUOTA_EXHAUSTED.inc();
            warn!("Quota exceeded on all providers while looking up {}", ip);
            return Err(LookupError::QuotaExhausted);
        };

        let index = admission.index;
        debug!("Provider #{} selected for {}", index, ip);
        attempts += 1;

        match state.client.fetch(ip, admission).await {
            Ok(country) => {
                info!("Resolved {} to {} via provider #{}", ip, country, index);
                return Ok(country);
            }
            Err(e) => {
                warn!("Provider #{} failed for {}: {}", index, ip, e);
                if !state.retry.allows(attempts) {
                    return Err(LookupError::AttemptsExhausted { attempts });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CountryCache, MemoryCache};
    use crate::config::{Configuration, ProviderConfig};
    use crate::error::CacheError;
    use crate::provider::ProviderClient;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct BrokenCache {
        reads: bool,
    }

    #[async_trait]
    impl CountryCache for BrokenCache {
        async fn get(&self, _ip: &str) -> Result<Option<String>, CacheError> {
            if self.reads {
                Ok(None)
            } else {
                Err(CacheError::Timeout(Duration::from_secs(2)))
            }
        }

        async fn set(&self, _ip: &str, _country: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Timeout(Duration::from_secs(2)))
        }

        async fn flush(&self) -> Result<(), CacheError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn provider(server: &MockServer, route: &str, max: usize) -> ProviderConfig {
        ProviderConfig {
            prefix: format!("{}/{}/", server.uri(), route),
            suffix: String::new(),
            keys: vec!["country".to_string()],
            max_per_minute: max,
        }
    }

    fn state(
        providers: Vec<ProviderConfig>,
        max_attempts: Option<usize>,
        cache: Arc<dyn CountryCache>,
    ) -> AppState {
        let config = Configuration {
            expire_time: 60,
            max_attempts,
            providers,
        };
        let client = ProviderClient::new(Duration::from_secs(5)).unwrap();
        AppState::new(&config, cache, client)
    }

    async fn mount(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/8.8.8.8", route)))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[test]
    fn retry_policy_from_config() {
        assert_eq!(RetryPolicy::from_config(None, 3), RetryPolicy::Bounded(3));
        assert_eq!(RetryPolicy::from_config(Some(0), 3), RetryPolicy::Unbounded);
        assert_eq!(RetryPolicy::from_config(Some(5), 3), RetryPolicy::Bounded(5));
        assert!(RetryPolicy::Bounded(2).allows(1));
        assert!(!RetryPolicy::Bounded(2).allows(2));
        assert!(RetryPolicy::Unbounded.allows(usize::MAX));
    }

    #[tokio::test]
    async fn miss_fetches_and_populates_cache() {
        let server = MockServer::start().await;
        mount(&server, "a", r#"{"country":"United States"}"#).await;
        let cache = Arc::new(MemoryCache::new());
        let state = state(vec![provider(&server, "a", 2)], None, cache.clone());

        let country = lookup_country(&state, "8.8.8.8").await.unwrap();

        assert_eq!(country, "United States");
        assert_eq!(
            cache.get("8.8.8.8").await.unwrap().as_deref(),
            Some("United States")
        );
    }

    #[tokio::test]
    async fn hit_skips_providers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"country":"Nowhere"}"#))
            .expect(0)
            .mount(&server)
            .await;
        let cache = Arc::new(MemoryCache::new());
        cache
            .set("8.8.8.8", "United States", Duration::from_secs(60))
            .await
            .unwrap();
        let state = state(vec![provider(&server, "a", 2)], None, cache);

        assert_eq!(lookup_country(&state, "8.8.8.8").await.unwrap(), "United States");
    }

    #[tokio::test]
    async fn transient_failure_retries_same_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/8.8.8.8"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        mount(&server, "a", r#"{"country":"United States"}"#).await;
        let cache = Arc::new(MemoryCache::new());
        let state = state(
            vec![provider(&server, "a", 2), provider(&server, "b", 2)],
            None,
            cache,
        );

        assert_eq!(lookup_country(&state, "8.8.8.8").await.unwrap(), "United States");
    }

    #[tokio::test]
    async fn failed_provider_is_reselected_before_later_ones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/8.8.8.8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"fail"}"#))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b/8.8.8.8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"country":"Canada"}"#))
            .expect(0)
            .mount(&server)
            .await;
        let cache = Arc::new(MemoryCache::new());
        let state = state(
            vec![provider(&server, "a", 2), provider(&server, "b", 2)],
            None,
            cache,
        );

        let err = lookup_country(&state, "8.8.8.8").await.unwrap_err();
        assert!(matches!(err, LookupError::AttemptsExhausted { attempts: 2 }));
    }

    #[tokio::test]
    async fn over_quota_provider_is_skipped() {
        let server = MockServer::start().await;
        mount(&server, "a", r#"{"country":"United States"}"#).await;
        mount(&server, "b", r#"{"country":"Canada"}"#).await;
        let cache = Arc::new(MemoryCache::new());
        let state = state(
            vec![provider(&server, "a", 1), provider(&server, "b", 1)],
            None,
            cache.clone(),
        );

        assert_eq!(lookup_country(&state, "8.8.8.8").await.unwrap(), "United States");
        cache.flush().await.unwrap();
        assert_eq!(lookup_country(&state, "8.8.8.8").await.unwrap(), "Canada");
        cache.flush().await.unwrap();
        assert!(matches!(
            lookup_country(&state, "8.8.8.8").await,
            Err(LookupError::QuotaExhausted)
        ));
    }

    #[tokio::test]
    async fn bounded_retry_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"fail"}"#))
            .expect(3)
            .mount(&server)
            .await;
        let cache = Arc::new(MemoryCache::new());
        let state = state(vec![provider(&server, "a", 10)], Some(3), cache.clone());

        let err = lookup_country(&state, "8.8.8.8").await.unwrap_err();

        assert!(matches!(err, LookupError::AttemptsExhausted { attempts: 3 }));
        assert_eq!(err.to_string(), "provider lookups failed after 3 attempts");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn cache_read_error_is_surfaced() {
        let server = MockServer::start().await;
        let state = state(
            vec![provider(&server, "a", 2)],
            None,
            Arc::new(BrokenCache { reads: false }),
        );

        let err = lookup_country(&state, "8.8.8.8").await.unwrap_err();
        assert!(matches!(err, LookupError::Cache(_)));
    }

    #[tokio::test]
    async fn cache_write_error_fails_the_lookup() {
        let server = MockServer::start().await;
        mount(&server, "a", r#"{"country":"United States"}"#).await;
        let state = state(
            vec![provider(&server, "a", 2)],
            None,
            Arc::new(BrokenCache { reads: true }),
        );

        let err = lookup_country(&state, "8.8.8.8").await.unwrap_err();
        assert!(matches!(err, LookupError::CacheWrite(_)));
    }
}
