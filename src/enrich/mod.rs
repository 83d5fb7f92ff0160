//! Message enrichment pipeline.
//!
//! Derives best-effort sender metadata from an inbound request: client IP,
//! geolocation, device classification, traffic source, language, and an
//! optional carrier-supplied phone number. Each sub-step returns a typed
//! result or option; this module composes them and degrades every failure
//! to a placeholder. Only two things ever reach the caller as errors, and
//! neither originates here: empty message content and store failure.

pub mod agent;
pub mod geo;
pub mod ip;
pub mod phone;
pub mod source;

use std::net::IpAddr;

use axum::http::{header, HeaderMap};

use crate::message::types::{Coordinates, DeviceInfo};
use geo::GeoLocator;

/// Location label for loopback and private addresses, which the external
/// lookup cannot resolve.
pub const LOCAL_LOCATION: &str = "Local/Localhost";

/// Location label when the lookup is disabled or fails.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// The full set of derived metadata for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub ip: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub user_agent: DeviceInfo,
    pub referrer: String,
    pub source: String,
    pub language: String,
    pub phone: Option<String>,
}

impl Default for Enrichment {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            location: LOCAL_LOCATION.to_string(),
            coordinates: None,
            user_agent: DeviceInfo::default(),
            referrer: String::new(),
            source: "Direct/Unknown".to_string(),
            language: "Unknown".to_string(),
            phone: None,
        }
    }
}

/// Enrichment pipeline, shared across requests.
#[derive(Clone)]
pub struct EnrichmentPipeline {
    /// None when geolocation is disabled; every lookup then degrades to
    /// `Unknown`.
    geo: Option<GeoLocator>,
}

impl EnrichmentPipeline {
    pub fn new(geo: Option<GeoLocator>) -> Self {
        Self { geo }
    }

    /// Run every derivation against the request. The steps are independent
    /// except that the IP must be known before geolocation; none of them
    /// can fail the request.
    pub async fn enrich(
        &self,
        headers: &HeaderMap,
        remote: IpAddr,
        client_coordinates: Option<Coordinates>,
    ) -> Enrichment {
        let ip = ip::client_ip(headers, remote);

        let (location, ip_coordinates) = self.locate(&ip).await;

        // Client-supplied coordinates (browser geolocation prompt) take
        // precedence over the IP-derived estimate.
        let coordinates = client_coordinates.or(ip_coordinates);

        let ua_string = header_str(headers, header::USER_AGENT);
        let referrer = header_str(headers, header::REFERER);

        Enrichment {
            location,
            coordinates,
            user_agent: agent::parse_user_agent(&ua_string),
            source: source::classify_source(&referrer, &ua_string),
            language: accept_language(headers),
            phone: phone::sniff_phone(headers),
            referrer,
            ip,
        }
    }

    /// Geolocate an IP, degrading silently: local/private addresses are
    /// labeled without a lookup, and any lookup failure becomes `Unknown`.
    async fn locate(&self, ip: &str) -> (String, Option<Coordinates>) {
        if ip::is_local_or_private(ip) {
            return (LOCAL_LOCATION.to_string(), None);
        }

        let Some(ref locator) = self.geo else {
            return (UNKNOWN_LOCATION.to_string(), None);
        };

        match locator.lookup(ip).await {
            Ok(info) => {
                let coordinates = match (info.latitude, info.longitude) {
                    (Some(latitude), Some(longitude)) => Some(Coordinates {
                        latitude,
                        longitude,
                        accuracy: None,
                    }),
                    _ => None,
                };
                (info.location_label(), coordinates)
            }
            Err(e) => {
                tracing::warn!(ip = ip, error = %e, "Geolocation lookup failed");
                (UNKNOWN_LOCATION.to_string(), None)
            }
        }
    }
}

/// Read a header as a string, empty when absent or non-UTF-8.
fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// First Accept-Language token, e.g. "en-US,en;q=0.9" → "en-US".
fn accept_language(headers: &HeaderMap) -> String {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split([',', ';']).next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| "Unknown".to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    fn pipeline() -> EnrichmentPipeline {
        // No locator: public IPs degrade to Unknown without any network.
        EnrichmentPipeline::new(None)
    }

    #[tokio::test]
    async fn test_loopback_skips_geolocation() {
        let enrichment = pipeline().enrich(&HeaderMap::new(), loopback(), None).await;
        assert_eq!(enrichment.ip, "127.0.0.1");
        assert_eq!(enrichment.location, LOCAL_LOCATION);
        assert!(enrichment.coordinates.is_none());
    }

    #[tokio::test]
    async fn test_public_ip_without_locator_is_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        let enrichment = pipeline().enrich(&headers, loopback(), None).await;
        assert_eq!(enrichment.ip, "203.0.113.7");
        assert_eq!(enrichment.location, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn test_client_coordinates_take_precedence() {
        let supplied = Coordinates {
            latitude: 12.97,
            longitude: 77.59,
            accuracy: Some(20.0),
        };
        let enrichment = pipeline()
            .enrich(&HeaderMap::new(), loopback(), Some(supplied))
            .await;
        assert_eq!(enrichment.coordinates, Some(supplied));
    }

    #[tokio::test]
    async fn test_headers_flow_through() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) Instagram 312.0"
                .parse()
                .unwrap(),
        );
        headers.insert(header::ACCEPT_LANGUAGE, "hi-IN,hi;q=0.9".parse().unwrap());
        headers.insert("x-msisdn", "+919876543210".parse().unwrap());

        let enrichment = pipeline().enrich(&headers, loopback(), None).await;
        assert_eq!(enrichment.source, "Instagram");
        assert_eq!(enrichment.language, "hi-IN");
        assert_eq!(enrichment.phone, Some("+919876543210".to_string()));
        assert_eq!(enrichment.user_agent.os, "iOS");
        assert_eq!(enrichment.user_agent.device_type, "Mobile");
    }

    #[tokio::test]
    async fn test_missing_headers_default() {
        let enrichment = pipeline().enrich(&HeaderMap::new(), loopback(), None).await;
        assert_eq!(enrichment.referrer, "");
        assert_eq!(enrichment.source, "Direct/Unknown");
        assert_eq!(enrichment.language, "Unknown");
        assert!(enrichment.phone.is_none());
        assert_eq!(enrichment.user_agent, DeviceInfo::default());
    }
}
