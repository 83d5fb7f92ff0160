//! Whisperwall Server
//!
//! An anonymous-message collection service:
//!
//! 1. **Submission**: a public form posts short text messages; each one is
//!    enriched with best-effort sender metadata (IP-derived location,
//!    device classification, traffic source, language, optional carrier
//!    phone header) and persisted.
//!
//! 2. **Feed**: stored messages are listed and can be deleted.
//!
//! 3. **Draft capture**: partial input abandoned before submission is
//!    recorded on a separate endpoint and swept after a retention window.
//!
//! Every enrichment step degrades silently to a placeholder — the only
//! errors a client ever sees are an empty message and a malformed request.

mod enrich;
mod message;
mod notify;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::Method, response::IntoResponse, routing::get, Json, Router};
use clap::Parser;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use enrich::{
    geo::{GeoConfig, GeoLocator},
    EnrichmentPipeline,
};
use message::store::MessageStore;
use notify::{HttpEmailSink, Notifier, NotifyConfig};
use state::{AppConfig, AppState};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "whisperwall", version, about = "Anonymous message collection server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "PORT")]
    port: u16,

    /// Directory for the persisted message file. Unset = in-memory only.
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory holding the static frontend bundle
    #[arg(long, default_value = "public", env = "STATIC_DIR")]
    static_dir: PathBuf,

    /// Minimum trimmed length for an abandoned draft to be recorded
    #[arg(long, default_value_t = 3, env = "MIN_ABANDONED_CHARS")]
    min_abandoned_chars: usize,

    /// Abandoned-draft retention in days
    #[arg(long, default_value_t = 30, env = "ABANDONED_TTL_DAYS")]
    abandoned_ttl_days: i64,

    /// Cleanup interval in seconds
    #[arg(long, default_value_t = 3600, env = "CLEANUP_INTERVAL_SECS")]
    cleanup_interval_secs: u64,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whisperwall=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = AppConfig {
        port: args.port,
        min_abandoned_chars: args.min_abandoned_chars,
        abandoned_ttl_secs: args.abandoned_ttl_days * 24 * 3600,
    };

    // ── Store ─────────────────────────────────────────────────────────────

    let store = MessageStore::new(args.data_dir);
    store.load_from_disk();

    // ── Enrichment ────────────────────────────────────────────────────────

    let geo_config = GeoConfig::from_env();
    let locator = GeoLocator::from_config(&geo_config);
    if locator.is_none() {
        tracing::info!("Geolocation disabled (GEO_API_BASE is empty)");
    }
    let pipeline = EnrichmentPipeline::new(locator);

    // ── Notifications ─────────────────────────────────────────────────────

    let notify_config = NotifyConfig::from_env();
    let notifier = match HttpEmailSink::from_config(&notify_config) {
        Some(sink) => {
            tracing::info!(
                api_url = notify_config.api_url.as_str(),
                "Email notifications enabled"
            );
            Notifier::spawn(Arc::new(sink))
        }
        None => {
            tracing::info!("Email notifications disabled (provider not configured)");
            Notifier::disabled()
        }
    };

    let state = AppState::new(store, pipeline, notifier, config);

    // Spawn periodic cleanup task for expired abandoned drafts
    let cleanup_state = state.clone();
    let cleanup_interval = args.cleanup_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval));
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now().timestamp_millis()
                - cleanup_state.config.abandoned_ttl_secs * 1000;
            cleanup_state.store.sweep_abandoned_before(cutoff);
        }
    });

    // Build router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .merge(message::api::routes())
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .fallback_service(ServeDir::new(&args.static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Whisperwall server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

// ── Route Handlers ────────────────────────────────────────────────────────────

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "whisperwall",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Statistics endpoint.
async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "messages": state.store.message_count(),
        "abandoned_drafts": state.store.abandoned_count(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
