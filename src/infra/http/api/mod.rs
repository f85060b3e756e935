pub mod controller;
pub mod error;
pub mod handlers;
pub mod request;
pub mod state;

pub use controller::{PublicApiController, RouteHandler};
pub use state::ApiState;

use axum::{Router, routing::get};

use crate::infra::http::RouterState;

pub fn build_api_router() -> Router<RouterState> {
    Router::new()
        .route(
            "/api/v2/event/{event_key}/matches",
            get(handlers::event_matches),
        )
        .route(
            "/api/v2/team/{team_key}/event/{event_key}/matches",
            get(handlers::team_event_matches),
        )
}
