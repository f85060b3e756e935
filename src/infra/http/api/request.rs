use axum::http::{HeaderMap, header};
use time::OffsetDateTime;

use crate::application::validation::ParamSource;
use crate::cache::{CONSUMER_ID_PARAM, freshness::parse_http_date};

/// Everything the read controller needs from one HTTP request.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    path_params: Vec<(&'static str, String)>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(
        path_params: Vec<(&'static str, String)>,
        query: Vec<(String, String)>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            path_params,
            query,
            headers,
        }
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Raw consumer id. A header, even an empty one, wins over the query
    /// parameter; a header that is not valid text counts as empty.
    pub fn consumer_id(&self) -> Option<&str> {
        match self.headers.get(CONSUMER_ID_PARAM) {
            Some(value) => Some(value.to_str().unwrap_or_default()),
            None => self.query_param(CONSUMER_ID_PARAM),
        }
    }

    /// Unparseable dates are ignored, as if the header were absent.
    pub fn if_modified_since(&self) -> Option<OffsetDateTime> {
        self.headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date)
    }

    /// Parameters that select the response; these alone form the cache key.
    pub fn cache_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.path_params
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
    }
}

impl ParamSource for ApiRequest {
    fn param(&self, name: &str) -> Option<&str> {
        self.path_param(name).or_else(|| self.query_param(name))
    }
}
