//! Public read API pipeline: identify, validate, track, serve, finalize.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::HttpBody;
use axum::http::{HeaderName, HeaderValue, header};
use axum::response::{IntoResponse, Response};

use crate::application::tracking::UsageTracker;
use crate::application::validation::{Validator, validate};
use crate::cache::{ApiRoute, CacheKey, CacheRequest, CachedResponseHandler, freshness};
use crate::domain::consumer::ApiConsumerId;

use super::error::ApiError;
use super::request::ApiRequest;

const SOURCE: &str = "infra::http::api::controller";
const API_VERSION_HEADER: &str = "x-tba-version";
const JSON_CONTENT_TYPE: &str = "application/json; charset=\"utf-8\"";
const MISSING_CONSUMER_ID: &str = "X-TBA-App-Id is a required header or URL param. Please see http://www.thebluealliance.com/apidocs for more info.";
const MALFORMED_CONSUMER_ID: &str = "X-TBA-App-Id must follow a specific format. Please see http://www.thebluealliance.com/apidocs for more info.";

/// One read endpoint behind the shared caching pipeline.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    fn route(&self) -> ApiRoute;

    /// Requested client cache lifetime in seconds, before clamping.
    fn cache_max_age(&self) -> u32;

    fn validators(&self) -> &[Box<dyn Validator<ApiRequest>>];

    /// Usage tracking action and label.
    fn track(&self, request: &ApiRequest) -> (&'static str, String);

    async fn handle(&self, request: &ApiRequest) -> Result<Response, ApiError>;
}

pub struct PublicApiController {
    cache: Arc<CachedResponseHandler>,
    tracker: UsageTracker,
    api_version: u32,
}

impl PublicApiController {
    pub fn new(cache: Arc<CachedResponseHandler>, tracker: UsageTracker, api_version: u32) -> Self {
        Self {
            cache,
            tracker,
            api_version,
        }
    }

    pub async fn serve<H>(&self, handler: &H, request: ApiRequest) -> Response
    where
        H: RouteHandler + ?Sized,
    {
        let mut response = match self.process(handler, &request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
        self.finalize(&mut response, handler.cache_max_age());
        response
    }

    async fn process<H>(&self, handler: &H, request: &ApiRequest) -> Result<Response, ApiError>
    where
        H: RouteHandler + ?Sized,
    {
        let consumer_id = identify(request)?;

        let result = validate(request, handler.validators());
        if !result.is_valid() {
            return Err(ApiError::validation(SOURCE, result));
        }

        let (action, label) = handler.track(request);
        self.tracker.track(action, label, &consumer_id);

        let cache_request = CacheRequest {
            key: CacheKey::compute(handler.route(), request.cache_params(), self.api_version),
            if_modified_since: request.if_modified_since(),
            max_age: handler.cache_max_age(),
        };
        self.cache
            .handle(&cache_request, || handler.handle(request))
            .await
    }

    fn finalize(&self, response: &mut Response, max_age: u32) {
        let succeeded = !response.status().is_client_error() && !response.status().is_server_error();
        set_json_content_type(response);
        let headers = response.headers_mut();

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );

        if succeeded {
            headers.insert(
                HeaderName::from_static(API_VERSION_HEADER),
                HeaderValue::from(self.api_version),
            );
            if let Ok(value) = HeaderValue::from_str(&freshness::cache_control_value(max_age)) {
                headers.insert(header::CACHE_CONTROL, value);
            }
            headers.insert(header::PRAGMA, HeaderValue::from_static("Public"));
        }
    }
}

/// Labels a response carrying a body as JSON. Bodiless responses such as a
/// 304 or a bare 500 get no `Content-Type` at all.
pub(crate) fn set_json_content_type(response: &mut Response) {
    if response.body().size_hint().exact() == Some(0) {
        response.headers_mut().remove(header::CONTENT_TYPE);
    } else {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
    }
}

fn identify(request: &ApiRequest) -> Result<ApiConsumerId, ApiError> {
    let raw = request
        .consumer_id()
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ApiError::bad_request(SOURCE, MISSING_CONSUMER_ID))?;

    ApiConsumerId::parse(raw).map_err(|_| ApiError::bad_request(SOURCE, MALFORMED_CONSUMER_ID))
}
