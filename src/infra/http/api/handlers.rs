//! Match read endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::repos::{MatchesRepo, with_deadline};
use crate::application::validation::{KeyFormat, KeyParam, Validator};
use crate::cache::{ApiRoute, EVENT_KEY_PARAM, TEAM_KEY_PARAM};
use crate::domain::matches::{Alliances, CompLevel, MatchRecord, MatchVideo};

use super::controller::RouteHandler;
use super::error::ApiError;
use super::request::ApiRequest;
use super::state::ApiState;

/// Match schedules change often during an event.
const MATCHES_MAX_AGE_SECS: u32 = 61;

#[derive(Debug, Serialize)]
pub struct MatchView {
    pub key: String,
    pub event_key: String,
    pub comp_level: CompLevel,
    pub set_number: u32,
    pub match_number: u32,
    pub alliances: Alliances,
    pub videos: Vec<MatchVideo>,
}

impl MatchView {
    fn from_record(event_key: &str, record: MatchRecord) -> Self {
        Self {
            key: record.key_name(event_key),
            event_key: event_key.to_string(),
            comp_level: record.comp_level,
            set_number: record.set_number,
            match_number: record.match_number,
            alliances: record.alliances,
            videos: record.videos,
        }
    }
}

async fn load_matches(
    repo: &dyn MatchesRepo,
    deadline: Duration,
    event_key: &str,
    source: &'static str,
) -> Result<Vec<MatchRecord>, ApiError> {
    with_deadline(deadline, repo.list_event_matches(event_key))
        .await
        .map_err(|err| ApiError::internal(source, &err))
}

fn required(request: &ApiRequest, name: &str) -> Result<String, ApiError> {
    request
        .path_param(name)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::bad_request("infra::http::api::handlers", format!("{name} is required"))
        })
}

pub struct EventMatchesHandler {
    matches: Arc<dyn MatchesRepo>,
    query_timeout: Duration,
    validators: Vec<Box<dyn Validator<ApiRequest>>>,
}

impl EventMatchesHandler {
    pub fn new(matches: Arc<dyn MatchesRepo>, query_timeout: Duration) -> Self {
        Self {
            matches,
            query_timeout,
            validators: vec![KeyParam::boxed::<ApiRequest>(EVENT_KEY_PARAM, KeyFormat::Event)],
        }
    }
}

#[async_trait]
impl RouteHandler for EventMatchesHandler {
    fn route(&self) -> ApiRoute {
        ApiRoute::EventMatches
    }

    fn cache_max_age(&self) -> u32 {
        MATCHES_MAX_AGE_SECS
    }

    fn validators(&self) -> &[Box<dyn Validator<ApiRequest>>] {
        &self.validators
    }

    fn track(&self, request: &ApiRequest) -> (&'static str, String) {
        (
            "event/matches",
            request.path_param(EVENT_KEY_PARAM).unwrap_or_default().to_string(),
        )
    }

    async fn handle(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let event_key = required(request, EVENT_KEY_PARAM)?;
        let matches = load_matches(
            self.matches.as_ref(),
            self.query_timeout,
            &event_key,
            "infra::http::api::event_matches",
        )
        .await?;

        let views: Vec<MatchView> = matches
            .into_iter()
            .map(|record| MatchView::from_record(&event_key, record))
            .collect();
        Ok(Json(views).into_response())
    }
}

pub struct TeamEventMatchesHandler {
    matches: Arc<dyn MatchesRepo>,
    query_timeout: Duration,
    validators: Vec<Box<dyn Validator<ApiRequest>>>,
}

impl TeamEventMatchesHandler {
    pub fn new(matches: Arc<dyn MatchesRepo>, query_timeout: Duration) -> Self {
        Self {
            matches,
            query_timeout,
            validators: vec![
                KeyParam::boxed::<ApiRequest>(TEAM_KEY_PARAM, KeyFormat::Team),
                KeyParam::boxed::<ApiRequest>(EVENT_KEY_PARAM, KeyFormat::Event),
            ],
        }
    }
}

#[async_trait]
impl RouteHandler for TeamEventMatchesHandler {
    fn route(&self) -> ApiRoute {
        ApiRoute::TeamEventMatches
    }

    fn cache_max_age(&self) -> u32 {
        MATCHES_MAX_AGE_SECS
    }

    fn validators(&self) -> &[Box<dyn Validator<ApiRequest>>] {
        &self.validators
    }

    fn track(&self, request: &ApiRequest) -> (&'static str, String) {
        let team_key = request.path_param(TEAM_KEY_PARAM).unwrap_or_default();
        let event_key = request.path_param(EVENT_KEY_PARAM).unwrap_or_default();
        ("team/event/matches", format!("{team_key}/{event_key}"))
    }

    async fn handle(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let team_key = required(request, TEAM_KEY_PARAM)?;
        let event_key = required(request, EVENT_KEY_PARAM)?;
        let matches = load_matches(
            self.matches.as_ref(),
            self.query_timeout,
            &event_key,
            "infra::http::api::team_event_matches",
        )
        .await?;

        let views: Vec<MatchView> = matches
            .into_iter()
            .filter(|record| record.involves(&team_key))
            .map(|record| MatchView::from_record(&event_key, record))
            .collect();
        Ok(Json(views).into_response())
    }
}

pub async fn event_matches(
    State(state): State<ApiState>,
    Path(event_key): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::new(vec![(EVENT_KEY_PARAM, event_key)], query, headers);
    state
        .controller
        .serve(state.event_matches.as_ref(), request)
        .await
}

pub async fn team_event_matches(
    State(state): State<ApiState>,
    Path((team_key, event_key)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::new(
        vec![(TEAM_KEY_PARAM, team_key), (EVENT_KEY_PARAM, event_key)],
        query,
        headers,
    );
    state
        .controller
        .serve(state.team_event_matches.as_ref(), request)
        .await
}
