//! Client IP extraction and normalization.
//!
//! The forwarded-for header wins over the connection address since the
//! service is expected to sit behind a reverse proxy in production.

use std::net::IpAddr;

use axum::http::HeaderMap;

/// Derive the client IP: first entry of `X-Forwarded-For` when present,
/// else the connection address. Loopback forms collapse to `127.0.0.1`.
pub fn client_ip(headers: &HeaderMap, remote: IpAddr) -> String {
    let raw = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| remote.to_string());

    normalize(&raw)
}

/// Collapse IPv6 loopback and IPv4-mapped forms to plain IPv4 notation.
fn normalize(ip: &str) -> String {
    if ip == "::1" {
        return "127.0.0.1".to_string();
    }
    ip.strip_prefix("::ffff:")
        .map_or_else(|| ip.to_string(), str::to_string)
}

/// True for addresses the geolocation service cannot resolve: loopback,
/// RFC1918 private ranges, link-local, unspecified, and anything that isn't
/// a parseable address (no point sending garbage to the lookup service).
pub fn is_local_or_private(ip: &str) -> bool {
    if ip.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        Ok(IpAddr::V6(v6)) => v6.is_loopback() || v6.is_unspecified(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn remote_v4() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "198.51.100.4, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, remote_v4()), "198.51.100.4");
    }

    #[test]
    fn test_falls_back_to_connection_address() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, remote_v4()), "203.0.113.7");
    }

    #[test]
    fn test_empty_forwarded_for_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "".parse().unwrap());
        assert_eq!(client_ip(&headers, remote_v4()), "203.0.113.7");
    }

    #[test]
    fn test_ipv6_loopback_normalized() {
        let headers = HeaderMap::new();
        let remote = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(client_ip(&headers, remote), "127.0.0.1");
    }

    #[test]
    fn test_ipv4_mapped_prefix_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "::ffff:127.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, remote_v4()), "127.0.0.1");
    }

    #[test]
    fn test_local_and_private_detection() {
        assert!(is_local_or_private("127.0.0.1"));
        assert!(is_local_or_private("localhost"));
        assert!(is_local_or_private("10.1.2.3"));
        assert!(is_local_or_private("192.168.1.50"));
        assert!(is_local_or_private("172.20.0.1"));
        assert!(is_local_or_private("::1"));
        assert!(is_local_or_private("not-an-ip"));

        assert!(!is_local_or_private("203.0.113.7"));
        assert!(!is_local_or_private("8.8.8.8"));
    }
}
