pub mod handlers;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::application::trusted::TrustedWriteService;
use crate::infra::http::RouterState;

#[derive(Clone)]
pub struct TrustedState {
    pub service: Arc<TrustedWriteService>,
}

pub fn build_trusted_router() -> Router<RouterState> {
    Router::new().route(
        "/api/trusted/v1/event/{event_key}/matches/update",
        post(handlers::update_event_matches),
    )
}
