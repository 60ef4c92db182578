use std::time::Duration;
use tracing::{debug, trace};

use crate::error::ProviderError;
use crate::load_balancer::Admission;
use crate::metrics::{PROVIDER_CALLS, PROVIDER_FAILURES};
use crate::parser::extract_country;

// Outbound HTTP to geolocation providers
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Looks `ip` up at the admitted provider.
    ///
    /// The quota slot is committed only when a country was extracted; on any
    /// error it is released and the call does not count against the quota.
    pub async fn fetch(&self, ip: &str, admission: Admission<'_>) -> Result<String, ProviderError> {
        let Admission {
            index,
            provider,
            slot,
        } = admission;
        let label = index.to_string();
        PROVIDER_CALLS.with_label_values(&[label.as_str()]).inc();

        let url = provider.url_for(ip);
        let result = self.call(&url, &provider.prefix, &provider.keys).await;

        match result {
            Ok(country) => {
                slot.commit();
                Ok(country)
            }
            Err(e) => {
                PROVIDER_FAILURES.with_label_values(&[label.as_str()]).inc();
                Err(e)
            }
        }
    }

    async fn call(&self, url: &str, name: &str, keys: &[String]) -> Result<String, ProviderError> {
        let transport = |source| ProviderError::Transport {
            url: url.to_string(),
            source,
        };

        let res = self.http.get(url).send().await.map_err(transport)?;
        debug!("Provider {} answered {}", url, res.status());

        let body = res.bytes().await.map_err(transport)?;
        trace!("Provider body: {}", String::from_utf8_lossy(&body));

        let doc: serde_json::Value =
            serde_json::from_slice(&body).map_err(|source| ProviderError::Decode {
                url: url.to_string(),
                source,
            })?;

        Ok(extract_country(&doc, keys, name)?)
    }
}
