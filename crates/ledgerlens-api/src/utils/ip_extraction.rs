//! Client IP resolution
//!
//! `X-Forwarded-For` is honored only up to the configured number of trusted
//! proxies, then `X-Real-IP`, then the socket address.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::state::AppState;

const UNKNOWN: &str = "unknown";

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse::<IpAddr>().ok()
}

/// Pick the client out of an `X-Forwarded-For` chain (`client, proxy1, proxy2`).
///
/// Each trusted proxy appends the peer it saw, so with N trusted proxies the
/// client is the Nth hop from the end. Anything before it was written by the
/// client. A chain shorter than N, or no trusted proxies at all, is not trusted.
fn client_from_forwarded_for(value: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    if trusted_proxy_count == 0 || hops.len() < trusted_proxy_count {
        return None;
    }
    parse_ip(hops[hops.len() - trusted_proxy_count])
}

pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|value| client_from_forwarded_for(value, trusted_proxy_count))
        // X-Real-IP is only meaningful when a proxy of ours set it
        .or_else(|| {
            (trusted_proxy_count > 0)
                .then(|| header("x-real-ip").and_then(parse_ip))
                .flatten()
        })
        .or_else(|| socket_addr.map(SocketAddr::ip))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// The resolved client address, used as the per-IP rate limit key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            socket.as_ref(),
            state.config.server.trusted_proxy_count,
        )))
    }
}
