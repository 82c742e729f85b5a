use axum::Router;

pub mod files;
pub mod identity;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/identity", identity::router(state.clone()))
        .nest("/files", files::router(state.clone()))
        .with_state(state)
}
