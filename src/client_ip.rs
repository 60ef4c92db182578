//! Client IP extraction.
//!
//! Strategies are tried in order and the first hit wins:
//!
//! 1. `Origin` header carrying an explicit `host:port` authority
//! 2. the peer address reported by the transport, if its host is a valid IP
//! 3. `X-Forwarded-For`, taken verbatim
//!
//! The `Origin` and `X-Forwarded-For` candidates are not validated.

use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, Uri};
use std::net::IpAddr;
use tracing::debug;

use crate::error::ResolveError;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<&str>) -> Result<String, ResolveError> {
    if let Some(ip) = from_origin(headers) {
        debug!("Found IP using Header (Origin) sniffing. ip: {}", ip);
        return Ok(ip);
    }

    if let Some(ip) = peer.and_then(from_peer_addr) {
        debug!("Found IP using peer address. ip: {}", ip);
        return Ok(ip);
    }

    if let Some(ip) = from_forwarded_for(headers) {
        debug!("Found IP using X-Forwarded-For. ip: {}", ip);
        return Ok(ip);
    }

    Err(ResolveError::NoIpFound)
}

fn from_origin(headers: &HeaderMap) -> Option<String> {
    let origin = headers.get(ORIGIN)?.to_str().ok()?;
    let uri: Uri = origin.parse().ok()?;
    let authority = uri.authority()?.as_str();
    // userinfo is not part of the host
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);

    let (host, _port) = split_host_port(host_port)?;
    Some(host.to_string())
}

fn from_peer_addr(peer: &str) -> Option<String> {
    let (host, port) = match split_host_port(peer) {
        Some(parts) => parts,
        None => {
            debug!("Peer address {:?} is not host:port", peer);
            return None;
        }
    };
    debug!("Peer address host: {}; port: {}", host, port);

    match host.parse::<IpAddr>() {
        Ok(ip) => Some(ip.to_string()),
        Err(_) => {
            debug!("Peer address host {:?} is not an IP", host);
            None
        }
    }
}

// Header lookups are case-insensitive, so every spelling of the
// header name lands here
fn from_forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Splits `host:port` or `[host]:port`. Fails when the port is missing or a
/// bare host has more than one colon.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        if port.contains([':', '[', ']']) {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains(['[', ']']) || port.contains([']', '[']) {
        return None;
    }
    Some((host, port))
}
