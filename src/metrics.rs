use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, register_counter, register_counter_vec, register_histogram,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("geoip_requests_total", "Total number of lookup requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("geoip_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("geoip_cache_misses_total", "Total cache misses").unwrap();
    pub static ref QUOTA_EXHAUSTED: Counter = register_counter!(
        "geoip_quota_exhausted_total",
        "Lookups rejected because every provider was over quota"
    )
    .unwrap();
    pub static ref PROVIDER_CALLS: CounterVec = register_counter_vec!(
        "geoip_provider_calls_total",
        "Outbound provider calls",
        &["provider"]
    )
    .unwrap();
    pub static ref PROVIDER_FAILURES: CounterVec = register_counter_vec!(
        "geoip_provider_failures_total",
        "Outbound provider calls that did not yield a country",
        &["provider"]
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "geoip_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}
