//! User-agent classification.
//!
//! Ordered token matching — precise enough to label the common browsers,
//! platforms, and device classes. Unrecognized fields keep their defaults
//! (`Unknown`, device type `Desktop`) rather than failing.

use crate::message::types::DeviceInfo;

/// Parse a raw user-agent string into a device classification.
pub fn parse_user_agent(ua: &str) -> DeviceInfo {
    let mut info = DeviceInfo::default();
    if ua.trim().is_empty() {
        return info;
    }
    let lower = ua.to_lowercase();

    detect_browser(&lower, &mut info);
    detect_os(&lower, &mut info);
    info.device_type = detect_device_type(&lower).to_string();
    info
}

/// Browser detection. Order matters: Edge and Opera embed "chrome/",
/// Chrome embeds "safari/".
fn detect_browser(lower: &str, info: &mut DeviceInfo) {
    let candidates: &[(&str, &str, &str)] = &[
        // (token, label, version prefix)
        ("edg/", "Edge", "edg/"),
        ("opr/", "Opera", "opr/"),
        ("opera", "Opera", "version/"),
        ("samsungbrowser/", "Samsung Internet", "samsungbrowser/"),
        ("firefox/", "Firefox", "firefox/"),
        ("chrome/", "Chrome", "chrome/"),
        ("crios/", "Chrome", "crios/"),
        ("fxios/", "Firefox", "fxios/"),
        ("safari/", "Safari", "version/"),
        ("msie ", "Internet Explorer", "msie "),
        ("trident/", "Internet Explorer", "rv:"),
    ];

    for (token, label, version_prefix) in candidates {
        if lower.contains(token) {
            info.browser = (*label).to_string();
            if let Some(version) = version_after(lower, version_prefix) {
                info.browser_version = version;
            }
            return;
        }
    }
}

/// OS detection, with Windows NT version mapping to marketing names.
fn detect_os(lower: &str, info: &mut DeviceInfo) {
    if let Some(nt) = version_after(lower, "windows nt ") {
        info.os = "Windows".to_string();
        info.os_version = match nt.as_str() {
            "10.0" => "10".to_string(),
            "6.3" => "8.1".to_string(),
            "6.2" => "8".to_string(),
            "6.1" => "7".to_string(),
            other => other.to_string(),
        };
    } else if lower.contains("android") {
        info.os = "Android".to_string();
        if let Some(version) = version_after(lower, "android ") {
            info.os_version = version;
        }
    } else if lower.contains("iphone os") || lower.contains("ipad; cpu os") {
        info.os = "iOS".to_string();
        let prefix = if lower.contains("iphone os") {
            "iphone os "
        } else {
            "ipad; cpu os "
        };
        if let Some(version) = underscore_version_after(lower, prefix) {
            info.os_version = version;
        }
    } else if lower.contains("mac os x") {
        info.os = "macOS".to_string();
        if let Some(version) = underscore_version_after(lower, "mac os x ") {
            info.os_version = version;
        }
    } else if lower.contains("linux") {
        info.os = "Linux".to_string();
    }
}

/// Device class: tablets before phones, since tablet strings often carry
/// mobile tokens too.
fn detect_device_type(lower: &str) -> &'static str {
    if lower.contains("ipad") || lower.contains("tablet") {
        return "Tablet";
    }
    if lower.contains("android") && !lower.contains("mobile") {
        return "Tablet";
    }
    if lower.contains("mobi") || lower.contains("iphone") || lower.contains("ipod") {
        return "Mobile";
    }
    "Desktop"
}

/// Extract the dotted version number following `prefix`.
fn version_after(lower: &str, prefix: &str) -> Option<String> {
    let start = lower.find(prefix)? + prefix.len();
    let version: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

/// Like `version_after`, for Apple's underscore-separated versions
/// ("10_15_7" → "10.15.7").
fn underscore_version_after(lower: &str, prefix: &str) -> Option<String> {
    let start = lower.find(prefix)? + prefix.len();
    let version: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '_' || *c == '.')
        .map(|c| if c == '_' { '.' } else { c })
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}
