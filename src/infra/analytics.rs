//! Measurement-protocol delivery for usage events.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::application::tracking::{TrackingError, UsageEvent, UsageSink};
use crate::config::AnalyticsSettings;

use super::error::InfraError;

const EVENT_CATEGORY: &str = "api-v02";

/// Sends each usage event as a non-interaction analytics hit.
#[derive(Clone, Debug)]
pub struct HttpTrackingSink {
    client: Client,
    endpoint: Url,
    tracking_id: Option<String>,
    timeout: Duration,
}

impl HttpTrackingSink {
    pub fn new(settings: &AnalyticsSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("tba-api/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            tracking_id: settings.tracking_id.clone(),
            timeout: settings.timeout,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.tracking_id.is_some()
    }

    fn hit_url(&self, tracking_id: &str, event: &UsageEvent) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("v", "1")
            .append_pair("tid", tracking_id)
            .append_pair("cid", &event.client_id().to_string())
            .append_pair("t", "event")
            .append_pair("ec", EVENT_CATEGORY)
            .append_pair("ea", &event.action)
            .append_pair("el", &event.label)
            .append_pair("cd1", event.consumer_id.as_str())
            .append_pair("ni", "1")
            .append_pair("sc", "end");
        url
    }
}

#[async_trait]
impl UsageSink for HttpTrackingSink {
    async fn deliver(&self, event: &UsageEvent) -> Result<(), TrackingError> {
        let Some(tracking_id) = self.tracking_id.as_deref() else {
            return Err(TrackingError::NotConfigured);
        };

        let response = self
            .client
            .get(self.hit_url(tracking_id, event))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    TrackingError::Timeout(self.timeout)
                } else {
                    TrackingError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackingError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::consumer::ApiConsumerId;

    fn settings(endpoint: &str, tracking_id: Option<&str>) -> AnalyticsSettings {
        AnalyticsSettings {
            tracking_id: tracking_id.map(str::to_string),
            endpoint: Url::parse(endpoint).expect("endpoint"),
            timeout: Duration::from_secs(2),
            queue_capacity: NonZeroUsize::new(4).expect("capacity"),
        }
    }

    fn event() -> UsageEvent {
        UsageEvent {
            action: "event/matches".to_string(),
            label: "2020ab".to_string(),
            consumer_id: ApiConsumerId::parse("frc254:scouting:v1").expect("consumer id"),
        }
    }

    #[tokio::test]
    async fn sends_event_hit_with_consumer_dimension() {
        let server = MockServer::start().await;
        let event = event();
        Mock::given(method("GET"))
            .and(path("/collect"))
            .and(query_param("v", "1"))
            .and(query_param("tid", "UA-1"))
            .and(query_param("cid", event.client_id().to_string()))
            .and(query_param("t", "event"))
            .and(query_param("ec", "api-v02"))
            .and(query_param("ea", "event/matches"))
            .and(query_param("el", "2020ab"))
            .and(query_param("cd1", "frc254:scouting:v1"))
            .and(query_param("ni", "1"))
            .and(query_param("sc", "end"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpTrackingSink::new(&settings(&format!("{}/collect", server.uri()), Some("UA-1")))
            .expect("sink");
        sink.deliver(&event).await.expect("delivered");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = HttpTrackingSink::new(&settings(&format!("{}/collect", server.uri()), Some("UA-1")))
            .expect("sink");
        let err = sink.deliver(&event()).await.expect_err("status error");
        assert!(matches!(err, TrackingError::Status(503)));
    }

    #[tokio::test]
    async fn missing_tracking_id_skips_delivery() {
        let sink = HttpTrackingSink::new(&settings("http://127.0.0.1:9/collect", None)).expect("sink");
        assert!(!sink.is_configured());

        let err = sink.deliver(&event()).await.expect_err("not configured");
        assert!(matches!(err, TrackingError::NotConfigured));
    }
}
