use axum::routing::post;
use axum::Router;

pub mod bundle;
pub mod register;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/register", post(register::handler))
        .route("/bundle", post(bundle::handler))
        .with_state(state)
}
