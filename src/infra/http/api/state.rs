use std::sync::Arc;

use super::controller::PublicApiController;
use super::handlers::{EventMatchesHandler, TeamEventMatchesHandler};

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<PublicApiController>,
    pub event_matches: Arc<EventMatchesHandler>,
    pub team_event_matches: Arc<TeamEventMatchesHandler>,
}
