mod health;
mod lookup;
mod metrics;

pub use health::health_handler;
pub use lookup::lookup_handler;
pub use metrics::metrics_handler;
