pub mod api;
mod middleware;
pub mod trusted;

pub use api::{ApiState, build_api_router};
pub use middleware::{RequestContext, log_responses, set_request_context};
pub use trusted::{TrustedState, build_trusted_router};

use axum::Router;
use axum::extract::FromRef;
use axum::middleware as axum_middleware;

#[derive(Clone)]
pub struct RouterState {
    pub api: ApiState,
    pub trusted: TrustedState,
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

impl FromRef<RouterState> for TrustedState {
    fn from_ref(state: &RouterState) -> Self {
        state.trusted.clone()
    }
}

/// Read and trusted write routes behind the shared logging layers.
pub fn build_router(state: RouterState) -> Router {
    build_api_router()
        .merge(build_trusted_router())
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
