use axum::Router;
use http::header::{ACCEPT, CONTENT_TYPE, ORIGIN};
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use common::protocol::{
    COMBINED_SIGNATURE_HEADER, POST_QUANTUM_SIGNATURE_HEADER, PRE_QUANTUM_SIGNATURE_HEADER,
    TIMESTAMP_HEADER, USERNAME_HEADER,
};

pub mod client;
pub mod v0;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    let cors_layer = CorsLayer::new()
        .allow_methods(vec![Method::POST])
        .allow_headers(vec![
            ACCEPT,
            CONTENT_TYPE,
            ORIGIN,
            HeaderName::from_static(USERNAME_HEADER),
            HeaderName::from_static(TIMESTAMP_HEADER),
            HeaderName::from_static(PRE_QUANTUM_SIGNATURE_HEADER),
            HeaderName::from_static(POST_QUANTUM_SIGNATURE_HEADER),
            HeaderName::from_static(COMBINED_SIGNATURE_HEADER),
        ])
        .allow_origin(Any)
        .allow_credentials(false);

    Router::new()
        .nest("/v0", v0::router(state.clone()))
        .with_state(state)
        .layer(cors_layer)
}
