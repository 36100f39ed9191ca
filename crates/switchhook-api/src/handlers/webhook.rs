//! Webhook entry point.
//!
//! Translates an axum request into a [`WebhookRequest`] and hands it to the
//! pipeline. Every method is routed here so the pipeline can answer
//! non-POST requests with its own JSON 405.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        ConnectInfo, FromRequest, Path, Request, State,
    },
    http::HeaderMap,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::{
    pipeline::{RequestBody, WebhookRequest},
    server::AppState,
};

/// Receives a webhook for `provider`.
#[instrument(
    name = "receive_webhook",
    skip(state, request),
    fields(
        provider = %provider,
        content_length = request
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown"),
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    request: Request,
) -> Response {
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
    let source_ip = client_ip(request.headers(), peer, &state.trusted_proxies);
    debug!(source_ip = ?source_ip, peer = ?peer, "Resolved caller address");

    let method = request.method().clone();
    let headers = request.headers().clone();

    let body = match Bytes::from_request(request, &state).await {
        Ok(bytes) => RequestBody::from(bytes),
        Err(BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_))) => {
            RequestBody::TooLarge { limit: state.max_payload_bytes }
        },
        Err(rejection) => RequestBody::Unreadable { reason: rejection.body_text() },
    };

    let request = WebhookRequest { method, headers, source_ip, body };

    state.processor.handle(request).await
}

/// Resolves the caller address.
///
/// `X-Forwarded-For` is only consulted when the socket peer is a trusted
/// proxy. The chain is then walked from the right, skipping trusted hops;
/// the first untrusted hop is the caller. A chain that does not parse, or
/// holds nothing but trusted hops, resolves to the peer itself.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer?;
    let is_trusted = |ip: IpAddr| trusted_proxies.iter().any(|p| p.to_canonical() == ip.to_canonical());

    if !is_trusted(peer) {
        if headers.contains_key("x-forwarded-for") {
            warn!(peer = %peer, "Ignoring X-Forwarded-For from untrusted peer");
        }
        return Some(peer);
    }

    let mut hops = Vec::new();
    for value in headers.get_all("x-forwarded-for") {
        let Ok(value) = value.to_str() else {
            return Some(peer);
        };
        for hop in value.split(',') {
            match hop.trim().parse::<IpAddr>() {
                Ok(ip) => hops.push(ip),
                Err(_) => return Some(peer),
            }
        }
    }

    Some(hops.into_iter().rev().find(|ip| !is_trusted(*ip)).unwrap_or(peer))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn forwarded_header_from_untrusted_peer_is_ignored() {
        let headers = forwarded("54.64.81.21, 203.0.113.66");
        let peer = Some(ip("203.0.113.66"));

        assert_eq!(client_ip(&headers, peer, &[]), peer);
        assert_eq!(client_ip(&headers, peer, &[ip("10.0.0.5")]), peer);
        assert_eq!(client_ip(&headers, None, &[ip("10.0.0.5")]), None);
    }

    #[test]
    fn trusted_proxy_yields_rightmost_untrusted_hop() {
        let proxies = [ip("10.0.0.5"), ip("10.0.0.6")];
        let peer = Some(ip("10.0.0.5"));

        let spoofed = forwarded("54.64.81.21, 198.51.100.4, 10.0.0.6");
        assert_eq!(client_ip(&spoofed, peer, &proxies), Some(ip("198.51.100.4")));

        let genuine = forwarded("54.64.81.21");
        assert_eq!(client_ip(&genuine, peer, &proxies), Some(ip("54.64.81.21")));
    }

    #[test]
    fn unusable_chain_resolves_to_the_proxy() {
        let proxies = [ip("10.0.0.5")];
        let peer = Some(ip("10.0.0.5"));

        assert_eq!(client_ip(&forwarded("not-an-ip, 54.64.81.21"), peer, &proxies), peer);
        assert_eq!(client_ip(&forwarded("10.0.0.5"), peer, &proxies), peer);
        assert_eq!(client_ip(&HeaderMap::new(), peer, &proxies), peer);
    }
}
