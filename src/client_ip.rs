use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

/// Resolve the client address for a request.
///
/// `X-Forwarded-For` is only honored when the direct peer is a trusted proxy.
/// The header is walked from the right and the first address that is not a
/// trusted proxy wins; anything left of it is client-supplied.
pub fn resolve(headers: &HeaderMap, peer: IpAddr, trusted_proxies: &[IpNet]) -> IpAddr {
    if !trusted_proxies.iter().any(|net| net.contains(&peer)) {
        return peer;
    }

    let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) else {
        return peer;
    };

    for hop in xff.rsplit(',') {
        let Ok(ip) = hop.trim().parse::<IpAddr>() else {
            return peer;
        };
        if !trusted_proxies.iter().any(|net| net.contains(&ip)) {
            return ip;
        }
    }
    peer
}
