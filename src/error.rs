use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// Client IP could not be determined from the request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("could not find client IP address")]
    NoIpFound,
}

// Walking a provider response along its key path
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no such key: {key} at {provider}")]
    MissingKey { key: String, provider: String },

    #[error("value at end of key path is not a string ({provider})")]
    NotAString { provider: String },
}

// One upstream call failing. These are retried, never shown to the client.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no ip info providers configured")]
    NoProviders,

    #[error("provider #{index}: {reason}")]
    InvalidProvider { index: usize, reason: String },
}

/// Everything that turns a lookup into a `500`.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    IpResolution(#[from] ResolveError),

    #[error("{0}")]
    Cache(CacheError),

    #[error("quota exceeded on all providers")]
    QuotaExhausted,

    #[error("provider lookups failed after {attempts} attempts")]
    AttemptsExhausted { attempts: usize },

    #[error("{0}")]
    CacheWrite(CacheError),

    #[error("lookup task failed: {0}")]
    Task(String),
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
