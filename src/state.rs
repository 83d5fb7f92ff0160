//! Shared server state and configuration.

use crate::enrich::EnrichmentPipeline;
use crate::message::store::MessageStore;
use crate::notify::Notifier;

/// Default minimum trimmed length for an abandoned draft to be recorded.
const DEFAULT_MIN_ABANDONED_CHARS: usize = 3;

/// Default abandoned-draft retention in days.
const DEFAULT_ABANDONED_TTL_DAYS: i64 = 30;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Trimmed drafts shorter than this are skipped, not stored.
    pub min_abandoned_chars: usize,
    /// Abandoned drafts older than this are swept by the cleanup task.
    pub abandoned_ttl_secs: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            min_abandoned_chars: DEFAULT_MIN_ABANDONED_CHARS,
            abandoned_ttl_secs: DEFAULT_ABANDONED_TTL_DAYS * 24 * 3600,
        }
    }
}

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: MessageStore,
    pub pipeline: EnrichmentPipeline,
    pub notifier: Notifier,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        store: MessageStore,
        pipeline: EnrichmentPipeline,
        notifier: Notifier,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            notifier,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.min_abandoned_chars, 3);
        assert_eq!(config.abandoned_ttl_secs, 30 * 24 * 3600);
    }
}
