use std::net::SocketAddr;

use axum::http::HeaderMap;
use clap::ValueEnum;

const FORWARDED_FOR: &str = "x-forwarded-for";
const API_KEY: &str = "x-api-key";
const UNKNOWN: &str = "unknown";

// How a caller identity is derived from an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeySource {
    // Socket address of the connecting peer.
    PeerIp,
    // First hop in `X-Forwarded-For`, for deployments behind a proxy.
    ForwardedFor,
    // The `X-Api-Key` header.
    ApiKey,
    // One bucket shared by every caller.
    Global,
}

impl KeySource {
    // Falls back to the peer address, then "unknown"; never empty
    pub fn derive(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let peer_ip = || peer.map(|addr| addr.ip().to_string());

        let key = match self {
            KeySource::PeerIp => peer_ip(),
            KeySource::ForwardedFor => header_str(headers, FORWARDED_FOR)
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
                .map(str::to_string)
                .or_else(peer_ip),
            KeySource::ApiKey => header_str(headers, API_KEY)
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(|k| format!("key:{k}"))
                .or_else(peer_ip),
            KeySource::Global => Some("global".to_string()),
        };

        key.unwrap_or_else(|| UNKNOWN.to_string())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:5123".parse().unwrap())
    }

    #[test]
    fn peer_ip_drops_the_port() {
        assert_eq!(KeySource::PeerIp.derive(&HeaderMap::new(), peer()), "10.0.0.7");
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"),
        );
        assert_eq!(KeySource::ForwardedFor.derive(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn forwarded_for_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(""));
        assert_eq!(KeySource::ForwardedFor.derive(&headers, peer()), "10.0.0.7");
    }

    #[test]
    fn api_key_is_namespaced() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY, HeaderValue::from_static("abc123"));
        assert_eq!(KeySource::ApiKey.derive(&headers, peer()), "key:abc123");
        assert_eq!(KeySource::ApiKey.derive(&HeaderMap::new(), peer()), "10.0.0.7");
    }

    #[test]
    fn never_returns_an_empty_key() {
        for source in KeySource::value_variants() {
            assert!(!source.derive(&HeaderMap::new(), None).is_empty());
        }
        assert_eq!(KeySource::PeerIp.derive(&HeaderMap::new(), None), "unknown");
        assert_eq!(KeySource::Global.derive(&HeaderMap::new(), None), "global");
    }
}
