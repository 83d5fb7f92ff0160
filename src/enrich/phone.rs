//! Carrier-header phone sniffing.
//!
//! Some mobile carriers inject the subscriber's MSISDN into proxied
//! requests under non-standard headers. Unreliable and carrier-specific —
//! absence is the normal case and stays silent.

use axum::http::HeaderMap;

/// Headers scanned in order; the first usable value wins.
const PHONE_HEADERS: &[&str] = &[
    "x-msisdn",
    "x-up-calling-line-id",
    "x-nokia-msisdn",
    "x-wap-msisdn",
    "x-forwarded-msisdn",
];

/// Minimum digit count for a header value to be accepted as a number.
const MIN_PHONE_DIGITS: usize = 7;

/// Scan the carrier headers for a phone number. The value is returned
/// trimmed but otherwise verbatim (a leading `+` survives).
pub fn sniff_phone(headers: &HeaderMap) -> Option<String> {
    for name in PHONE_HEADERS {
        let Some(value) = headers.get(*name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let digits = value.chars().filter(char::is_ascii_digit).count();
        if digits >= MIN_PHONE_DIGITS {
            return Some(value.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_headers_is_silent() {
        assert_eq!(sniff_phone(&HeaderMap::new()), None);
    }

    #[test]
    fn test_msisdn_header_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-msisdn", "919876543210".parse().unwrap());
        assert_eq!(sniff_phone(&headers), Some("919876543210".to_string()));
    }

    #[test]
    fn test_plus_and_separators_preserved() {
        let mut headers = HeaderMap::new();
        headers.insert("x-msisdn", "+91 98765 43210".parse().unwrap());
        assert_eq!(sniff_phone(&headers), Some("+91 98765 43210".to_string()));
    }

    #[test]
    fn test_too_few_digits_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-msisdn", "12345".parse().unwrap());
        assert_eq!(sniff_phone(&headers), None);
    }

    #[test]
    fn test_short_value_does_not_block_later_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-msisdn", "12345".parse().unwrap());
        headers.insert("x-nokia-msisdn", "9876543210".parse().unwrap());
        assert_eq!(sniff_phone(&headers), Some("9876543210".to_string()));
    }

    #[test]
    fn test_header_order_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-msisdn", "1111111111".parse().unwrap());
        headers.insert("x-msisdn", "2222222222".parse().unwrap());
        assert_eq!(sniff_phone(&headers), Some("2222222222".to_string()));
    }
}
