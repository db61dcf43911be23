use axum::{extract::connect_info::ConnectInfo, extract::Request, http::HeaderMap};
use std::net::{IpAddr, SocketAddr};

/// First parseable address announced by a reverse proxy, if any.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }
    None
}

/// Transport peer address of the connection, port stripped.
pub fn peer_ip(req: &Request) -> Option<IpAddr> {
    req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip())
}

/// Identity a client is rate limited under.
///
/// Proxy headers are only honoured when `trust_proxy_headers` is set; otherwise
/// a spoofed `X-Forwarded-For` would hand every request a fresh bucket.
/// `None` means the server could not tell who is calling.
pub fn client_ip(req: &Request, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return Some(ip);
        }
    }
    peer_ip(req)
}
