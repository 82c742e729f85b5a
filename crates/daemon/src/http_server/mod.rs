use axum::extract::DefaultBodyLimit;
use axum::{Extension, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod api;
mod config;
mod handlers;
mod health;

pub use config::Config;

use crate::upload::UploadLimits;
use crate::ServiceState;

const API_PREFIX: &str = "/api";
const STATUS_PREFIX: &str = "/_status";

/// Room for the JSON envelope and signatures around the base64 payload
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Largest request body accepted, sized so an upload at the configured
/// limits still fits after base64 expansion.
pub fn body_limit(limits: UploadLimits) -> usize {
    let encoded = |n: usize| n.div_ceil(3) * 4;
    encoded(limits.max_file_size) + encoded(limits.max_metadata_size) + BODY_OVERHEAD_BYTES
}

/// The full application: `/_status`, `/api` and the not-found fallback.
pub fn router(config: &Config, state: ServiceState) -> Router {
    let log_level = config.log_level;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    Router::new()
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .nest(API_PREFIX, api::router(state.clone()))
        .fallback(handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(body_limit(state.limits())))
        .layer(Extension(config.clone()))
        .with_state(state)
        .layer(trace_layer)
}

/// Serve on an already bound listener until `stop` turns true, then drain.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    state: ServiceState,
    mut stop: watch::Receiver<bool>,
) -> Result<(), HttpServerError> {
    let router = router(&config, state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = stop.wait_for(|stop| *stop).await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_fits_max_upload() {
        let limits = UploadLimits {
            max_file_size: 3,
            max_metadata_size: 4,
        };
        assert_eq!(body_limit(limits), 4 + 8 + BODY_OVERHEAD_BYTES);
        assert!(body_limit(UploadLimits::default()) > UploadLimits::default().max_file_size);
    }
}
