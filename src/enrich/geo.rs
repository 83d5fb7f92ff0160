//! IP geolocation lookup.
//!
//! A single GET against an ip-api.com-compatible endpoint. Failures are
//! typed so the pipeline (and tests) can distinguish a network problem from
//! a malformed body or an unsuccessful lookup — but every variant degrades
//! to the same `Unknown` placeholder at the composition layer.

use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default lookup endpoint (free tier, no key required).
const DEFAULT_GEO_API_BASE: &str = "http://ip-api.com";

/// Connect timeout for the lookup call, independent of the inbound
/// request's lifecycle.
const CONNECT_TIMEOUT_SECS: u64 = 3;

/// Total request timeout for the lookup call.
const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Geolocation configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Lookup endpoint base URL. None disables geolocation entirely.
    pub base_url: Option<String>,
}

impl GeoConfig {
    /// Load from the environment. Setting `GEO_API_BASE` to an empty string
    /// disables the lookup; unset falls back to the public default.
    pub fn from_env() -> Self {
        let base_url = match env::var("GEO_API_BASE") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some(DEFAULT_GEO_API_BASE.to_string()),
        };
        Self { base_url }
    }
}

/// Geolocation lookup failure.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geolocation response was not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("geolocation lookup unsuccessful (status {status:?})")]
    Unsuccessful { status: String },
}

/// Successful lookup result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoInfo {
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoInfo {
    /// The `"city, country"` display form stored on records.
    pub fn location_label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// ip-api.com response body. Fields other than `status` are absent on
/// failed lookups.
#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    city: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Client for the external geolocation service.
#[derive(Clone)]
pub struct GeoLocator {
    client: reqwest::Client,
    base_url: String,
}

impl GeoLocator {
    /// Build a locator from config. Returns None when the lookup is
    /// disabled.
    pub fn from_config(config: &GeoConfig) -> Option<Self> {
        let base_url = config.base_url.clone()?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Some(Self { client, base_url })
    }

    /// Look up a public IP. Callers must skip loopback/private addresses
    /// before getting here.
    pub async fn lookup(&self, ip: &str) -> Result<GeoInfo, GeoError> {
        let url = format!("{}/json/{}", self.base_url.trim_end_matches('/'), ip);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .text()
            .await?;
        parse_geo_body(&body)
    }
}

/// Parse a lookup response body into a `GeoInfo`.
fn parse_geo_body(body: &str) -> Result<GeoInfo, GeoError> {
    let response: GeoResponse = serde_json::from_str(body)?;
    if response.status != "success" {
        return Err(GeoError::Unsuccessful {
            status: response.status,
        });
    }
    Ok(GeoInfo {
        city: response.city.unwrap_or_else(|| "Unknown".to_string()),
        country: response.country.unwrap_or_else(|| "Unknown".to_string()),
        latitude: response.lat,
        longitude: response.lon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_body() {
        let body = r#"{
            "status": "success",
            "city": "Mumbai",
            "country": "India",
            "lat": 19.076,
            "lon": 72.8777
        }"#;
        let info = parse_geo_body(body).unwrap();
        assert_eq!(info.city, "Mumbai");
        assert_eq!(info.country, "India");
        assert_eq!(info.location_label(), "Mumbai, India");
        assert_eq!(info.latitude, Some(19.076));
    }

    #[test]
    fn test_parse_failed_status() {
        let body = r#"{"status": "fail", "message": "private range"}"#;
        let err = parse_geo_body(body).unwrap_err();
        assert!(matches!(err, GeoError::Unsuccessful { .. }));
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_geo_body("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, GeoError::Malformed(_)));
    }

    #[test]
    fn test_success_with_missing_fields_defaults() {
        let body = r#"{"status": "success"}"#;
        let info = parse_geo_body(body).unwrap();
        assert_eq!(info.location_label(), "Unknown, Unknown");
        assert!(info.latitude.is_none());
    }

    #[test]
    fn test_disabled_config_yields_no_locator() {
        let config = GeoConfig { base_url: None };
        assert!(GeoLocator::from_config(&config).is_none());
    }
}
