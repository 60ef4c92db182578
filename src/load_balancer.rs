use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::rate_limit::{QuotaSlot, QuotaTracker};

// Single upstream geolocation provider
pub struct Provider {
    pub prefix: String,
    pub suffix: String,
    pub keys: Vec<String>,
    pub quota: QuotaTracker,
}

impl Provider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            suffix: config.suffix.clone(),
            keys: config.keys.clone(),
            quota: QuotaTracker::new(config.max_per_minute),
        }
    }

    pub fn url_for(&self, ip: &str) -> String {
        format!("{}{}{}", self.prefix, ip, self.suffix)
    }
}

// A provider picked for one request, with its quota slot held
pub struct Admission<'a> {
    pub index: usize,
    pub provider: &'a Provider,
    pub slot: QuotaSlot<'a>,
}

// Providers in fallback priority order
pub struct ProviderPool {
    providers: Vec<Provider>,
}

impl ProviderPool {
    pub fn new(configs: &[ProviderConfig]) -> Self {
        let providers: Vec<Provider> = configs.iter().map(Provider::new).collect();

        info!("Provider pool initialized with {} providers", providers.len());
        for (i, p) in providers.iter().enumerate() {
            info!("  [{}] {}<ip>{} ({}/min)", i, p.prefix, p.suffix, p.quota.max_per_window());
        }

        Self { providers }
    }

    // First provider, in configured order, that is still under quota
    pub fn select(&self) -> Option<Admission<'_>> {
        for (index, provider) in self.providers.iter().enumerate() {
            if let Some(slot) = provider.quota.admit() {
                debug!("Provider #{} admitted", index);
                return Some(Admission {
                    index,
                    provider,
                    slot,
                });
            }
            debug!("Provider #{} is over quota", index);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
