//! Cache key definitions.
//!
//! A key encodes the route, its cache version, the API version and the
//! normalized request parameters. Computing a key is a pure function.

use std::fmt::{Display, Formatter};

use url::form_urlencoded;

/// Query parameter carrying the consumer id; never part of a cache key.
pub const CONSUMER_ID_PARAM: &str = "X-TBA-App-Id";

pub const EVENT_KEY_PARAM: &str = "event_key";
pub const TEAM_KEY_PARAM: &str = "team_key";

/// Cacheable read routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiRoute {
    EventMatches,
    TeamEventMatches,
}

impl ApiRoute {
    pub fn name(self) -> &'static str {
        match self {
            Self::EventMatches => "event_matches",
            Self::TeamEventMatches => "team_event_matches",
        }
    }

    /// Bumped whenever the response shape of the route changes, so stale
    /// entries stop matching.
    pub fn cache_version(self) -> u32 {
        match self {
            Self::EventMatches => 2,
            Self::TeamEventMatches => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute<'a, I>(route: ApiRoute, params: I, api_version: u32) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut pairs: Vec<(&str, &str)> = params
            .into_iter()
            .filter(|(name, _)| !name.is_empty() && !name.eq_ignore_ascii_case(CONSUMER_ID_PARAM))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in pairs {
            serializer.append_pair(name, value);
        }

        Self(format!(
            "api_v{api_version}_{}_{}:{}",
            route.name(),
            route.cache_version(),
            serializer.finish()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
