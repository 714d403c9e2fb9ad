use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

use crate::util::network::{forwarded_client, NetworkGate};
use crate::web::state::AppState;
use crate::web::templates::render_blocked;

/// Caller address: the socket peer, or the first forwarded hop when the
/// gate trusts a proxy in front of it.
pub fn client_ip(gate: &NetworkGate, peer: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
    if gate.trusts_forwarded_for() {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(forwarded_client);
        if forwarded.is_some() {
            return forwarded;
        }
    }
    peer
}

pub async fn require_internal_network(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.gate.is_enforced() {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match client_ip(&state.gate, peer, request.headers()) {
        Some(ip) if state.gate.allows(ip) => next.run(request).await,
        ip => {
            warn!("Blocked request from {:?} to {}", ip, request.uri().path());
            (
                StatusCode::FORBIDDEN,
                Html(render_blocked(&state.template_env)),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use axum::http::HeaderValue;

    fn gate(trust_forwarded_for: bool) -> NetworkGate {
        NetworkGate::from_config(&NetworkConfig {
            require_vpn: true,
            local_development: false,
            trust_forwarded_for,
            ..NetworkConfig::default()
        })
    }

    #[test]
    fn peer_address_is_used_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.1.2.3"));
        let peer: IpAddr = "203.0.113.9".parse().unwrap();

        let gate = gate(false);
        let ip = client_ip(&gate, Some(peer), &headers).unwrap();
        assert_eq!(ip, peer);
        assert!(!gate.allows(ip));
    }

    #[test]
    fn forwarded_for_wins_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.1.2.3, 198.51.100.1"));
        let peer: IpAddr = "203.0.113.9".parse().unwrap();

        let gate = gate(true);
        let ip = client_ip(&gate, Some(peer), &headers).unwrap();
        assert!(gate.allows(ip));

        let empty = HeaderMap::new();
        assert_eq!(client_ip(&gate, Some(peer), &empty), Some(peer));
        assert_eq!(client_ip(&gate, None, &empty), None);
    }
}
