use axum::routing::post;
use axum::Router;

pub mod download;
pub mod list;
pub mod revoke;
pub mod share;
pub mod upload;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/upload", post(upload::handler))
        .route("/list", post(list::handler))
        .route("/download", post(download::handler))
        .route("/share", post(share::handler))
        .route("/revoke", post(revoke::handler))
        .with_state(state)
}
