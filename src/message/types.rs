//! Message record types.
//!
//! A `Message` is one successful submission, fully enriched. An
//! `AbandonedMessage` is a partial draft captured when the visitor left the
//! page without submitting. Both serialize camelCase on the wire and in the
//! persistence file.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enrich::Enrichment;

/// Geographic coordinates, either client-supplied (from the browser
/// geolocation prompt, with accuracy) or IP-derived (no accuracy).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Parsed user-agent classification. Every field degrades to a default
/// (`Unknown`, device type `Desktop`) when the string is unrecognizable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device_type: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            browser: "Unknown".to_string(),
            browser_version: "Unknown".to_string(),
            os: "Unknown".to_string(),
            os_version: "Unknown".to_string(),
            device_type: "Desktop".to_string(),
        }
    }
}

/// Why a draft was abandoned, as reported by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    #[default]
    PageExit,
    TabSwitched,
    #[serde(rename = "inactivity_2min")]
    Inactivity2Min,
}

/// One stored submission.
///
/// `id` is the millisecond timestamp at creation — assigned exactly once,
/// never mutated, and not guaranteed unique under high concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub message: String,
    /// ISO-8601 creation time, UTC.
    pub timestamp: String,
    pub ip: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub user_agent: DeviceInfo,
    pub referrer: String,
    pub source: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    // Behavioral telemetry — passthrough from the client, unvalidated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_on_page: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_patterns: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_history: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_tag: Option<String>,
}

/// A captured draft: same enrichment as `Message`, keyed by
/// `partialMessage` plus the abandonment reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedMessage {
    pub id: i64,
    pub partial_message: String,
    pub reason: AbandonReason,
    pub timestamp: String,
    pub ip: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub user_agent: DeviceInfo,
    pub referrer: String,
    pub source: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_on_page: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_patterns: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_history: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_tag: Option<String>,
}

impl Message {
    /// Compose a record from trimmed content and a finished enrichment pass.
    pub fn compose(
        id: i64,
        timestamp: String,
        content: &str,
        enrichment: Enrichment,
    ) -> Self {
        Self {
            id,
            message: content.to_string(),
            timestamp,
            ip: enrichment.ip,
            location: enrichment.location,
            coordinates: enrichment.coordinates,
            user_agent: enrichment.user_agent,
            referrer: enrichment.referrer,
            source: enrichment.source,
            language: enrichment.language,
            phone: enrichment.phone,
            time_on_page: None,
            click_patterns: None,
            text_history: None,
            share_tag: None,
        }
    }
}

impl AbandonedMessage {
    /// Compose a draft record from trimmed partial content, the reported
    /// reason, and a finished enrichment pass.
    pub fn compose(
        id: i64,
        timestamp: String,
        partial: &str,
        reason: AbandonReason,
        enrichment: Enrichment,
    ) -> Self {
        Self {
            id,
            partial_message: partial.to_string(),
            reason,
            timestamp,
            ip: enrichment.ip,
            location: enrichment.location,
            coordinates: enrichment.coordinates,
            user_agent: enrichment.user_agent,
            referrer: enrichment.referrer,
            source: enrichment.source,
            language: enrichment.language,
            phone: enrichment.phone,
            time_on_page: None,
            click_patterns: None,
            text_history: None,
            share_tag: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_defaults() {
        let info = DeviceInfo::default();
        assert_eq!(info.browser, "Unknown");
        assert_eq!(info.device_type, "Desktop");
    }

    #[test]
    fn test_abandon_reason_wire_format() {
        assert_eq!(
            serde_json::to_string(&AbandonReason::PageExit).unwrap(),
            "\"page_exit\""
        );
        assert_eq!(
            serde_json::to_string(&AbandonReason::TabSwitched).unwrap(),
            "\"tab_switched\""
        );
        assert_eq!(
            serde_json::to_string(&AbandonReason::Inactivity2Min).unwrap(),
            "\"inactivity_2min\""
        );

        let parsed: AbandonReason = serde_json::from_str("\"inactivity_2min\"").unwrap();
        assert_eq!(parsed, AbandonReason::Inactivity2Min);
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let message = Message::compose(
            1700000000000,
            "2023-11-14T22:13:20Z".to_string(),
            "hello",
            Enrichment::default(),
        );
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["message"], "hello");
        assert!(json.get("userAgent").is_some());
        assert!(json.get("user_agent").is_none());
        // Absent optionals are omitted, not null
        assert!(json.get("phone").is_none());
        assert!(json.get("coordinates").is_none());
    }
}
