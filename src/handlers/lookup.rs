use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::client_ip::resolve_client_ip;
use crate::error::LookupError;
use crate::lookup::lookup_country;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::LookupResponse;
use crate::state::AppState;

// Any method, any path: the country of whoever is asking
pub async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<LookupResponse>, LookupError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());

    let ip = resolve_client_ip(request.headers(), peer.as_deref()).inspect_err(|e| {
        warn!("{} (peer: {:?})", e, peer);
    })?;

    // Detached so that a client hanging up does not cut provider fallback short
    let task_state = Arc::clone(&state);
    let country = tokio::spawn(async move { lookup_country(&task_state, &ip).await })
        .await
        .map_err(|e| LookupError::Task(e.to_string()))??;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok(Json(LookupResponse {
        country_name: country,
    }))
}
