use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "geoip-gateway")]
#[command(about = "Caching IP to country lookup service over rate limited providers")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8081)]
    pub port: u16,

    // Provider list and cache TTL (JSON)
    #[arg(short, long, default_value = "./configuration.json")]
    pub config: String,

    // Where resolved countries are cached
    #[arg(long, value_enum, default_value_t = CacheBackend::Redis)]
    pub cache: CacheBackend,

    #[arg(long, default_value = "redis://localhost:6379")]
    pub redis_url: String,

    // Upstream provider request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub provider_timeout: u64,

    // Cache operation timeout in seconds
    #[arg(long, default_value_t = 2)]
    pub cache_timeout: u64,

    // Log filter, e.g. "info" or "geoip_gateway=debug"
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

// One upstream provider as written in configuration.json.
// The request URL is PreReqURL + ip + PostReqURL.
#[derive(Deserialize, Debug, Clone)]
pub struct ProviderConfig {
    #[serde(rename = "PreReqURL")]
    pub prefix: String,
    #[serde(rename = "PostReqURL", default)]
    pub suffix: String,
    #[serde(rename = "KeysInResponce")]
    pub keys: Vec<String>,
    #[serde(rename = "MaxReqPerMinute")]
    pub max_per_minute: usize,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Configuration {
    // Cache TTL in seconds
    #[serde(rename = "ExpireTime")]
    pub expire_time: u64,
    // Absent: one attempt per provider. 0: retry until quota runs out.
    #[serde(rename = "MaxAttempts", default)]
    pub max_attempts: Option<usize>,
    #[serde(rename = "Providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Configuration =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        for (index, provider) in self.providers.iter().enumerate() {
            if provider.prefix.is_empty() {
                return Err(ConfigError::InvalidProvider {
                    index,
                    reason: "PreReqURL is empty".to_string(),
                });
            }
            if provider.max_per_minute == 0 {
                return Err(ConfigError::InvalidProvider {
                    index,
                    reason: "MaxReqPerMinute must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}
