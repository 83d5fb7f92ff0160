//! Referrer-based traffic-source classification.

/// Ordered substring keys and their platform labels. First match wins, so
/// specific keys must precede shorter ones that could shadow them.
const SOURCE_KEYS: &[(&str, &str)] = &[
    ("instagram", "Instagram"),
    ("whatsapp", "WhatsApp"),
    ("wa.me", "WhatsApp"),
    ("facebook", "Facebook"),
    ("fb", "Facebook"),
    ("messenger", "Messenger"),
    ("t.me", "Telegram"),
    ("telegram", "Telegram"),
    ("snapchat", "Snapchat"),
    ("twitter", "Twitter/X"),
    ("x.com", "Twitter/X"),
    ("tiktok", "TikTok"),
];

/// Classify the referring platform from the referrer URL and user-agent
/// string (in-app browsers tag themselves in the UA). Non-direct referrers
/// with no platform match are `Other Referrer`; empty referrers are
/// `Direct/Unknown`.
pub fn classify_source(referrer: &str, user_agent: &str) -> String {
    let referrer_lower = referrer.to_lowercase();
    let ua_lower = user_agent.to_lowercase();

    for (key, label) in SOURCE_KEYS {
        if referrer_lower.contains(key) || ua_lower.contains(key) {
            return (*label).to_string();
        }
    }

    if referrer_lower.trim().is_empty() {
        "Direct/Unknown".to_string()
    } else {
        "Other Referrer".to_string()
    }
}
