//! Best-effort usage tracking.
//!
//! The request path only enqueues; a single background worker delivers events
//! to the configured sink with a fixed deadline. Delivery is at-most-once:
//! a full queue drops the event and failures are logged, never retried.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::consumer::ApiConsumerId;

const METRIC_TRACKING_ENQUEUED: &str = "tba_api_tracking_enqueued_total";
const METRIC_TRACKING_DROPPED: &str = "tba_api_tracking_dropped_total";
const METRIC_TRACKING_FAILED: &str = "tba_api_tracking_failed_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub action: String,
    pub label: String,
    pub consumer_id: ApiConsumerId,
}

impl UsageEvent {
    /// Pseudonymous client id, stable for a given consumer id.
    pub fn client_id(&self) -> Uuid {
        Uuid::new_v3(&Uuid::NAMESPACE_X500, self.consumer_id.as_str().as_bytes())
    }
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("analytics tracking id is not configured")]
    NotConfigured,
    #[error("analytics request failed: {0}")]
    Transport(String),
    #[error("analytics endpoint answered with status {0}")]
    Status(u16),
    #[error("analytics delivery exceeded {0:?}")]
    Timeout(Duration),
}

/// Destination for usage events.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn deliver(&self, event: &UsageEvent) -> Result<(), TrackingError>;
}

/// Handle used by the request path; cloning shares the same worker queue.
#[derive(Clone)]
pub struct UsageTracker {
    sender: mpsc::Sender<UsageEvent>,
}

impl UsageTracker {
    /// Starts the delivery worker. The worker stops once every tracker handle
    /// has been dropped and the queue is drained.
    pub fn spawn(
        sink: Arc<dyn UsageSink>,
        capacity: NonZeroUsize,
        deadline: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.get());
        let handle = tokio::spawn(run_worker(receiver, sink, deadline));
        (Self { sender }, handle)
    }

    /// Queues an event without waiting. Returns `false` when it was dropped.
    pub fn track(
        &self,
        action: impl Into<String>,
        label: impl Into<String>,
        consumer_id: &ApiConsumerId,
    ) -> bool {
        let event = UsageEvent {
            action: action.into(),
            label: label.into(),
            consumer_id: consumer_id.clone(),
        };

        match self.sender.try_send(event) {
            Ok(()) => {
                counter!(METRIC_TRACKING_ENQUEUED).increment(1);
                true
            }
            Err(TrySendError::Full(event)) => {
                counter!(METRIC_TRACKING_DROPPED, "reason" => "full").increment(1);
                warn!(
                    target = "tba_api::tracking",
                    action = %event.action,
                    "usage queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                counter!(METRIC_TRACKING_DROPPED, "reason" => "closed").increment(1);
                warn!(
                    target = "tba_api::tracking",
                    action = %event.action,
                    "usage worker stopped, dropping event"
                );
                false
            }
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<UsageEvent>,
    sink: Arc<dyn UsageSink>,
    deadline: Duration,
) {
    let mut reported_unconfigured = false;
    while let Some(event) = receiver.recv().await {
        let outcome = match tokio::time::timeout(deadline, sink.deliver(&event)).await {
            Ok(result) => result,
            Err(_) => Err(TrackingError::Timeout(deadline)),
        };

        match outcome {
            Ok(()) => debug!(
                target = "tba_api::tracking",
                action = %event.action,
                label = %event.label,
                "usage event delivered"
            ),
            Err(TrackingError::NotConfigured) if !reported_unconfigured => {
                reported_unconfigured = true;
                warn!(
                    target = "tba_api::tracking",
                    action = %event.action,
                    "usage tracking not configured, usage events are discarded"
                );
            }
            Err(TrackingError::NotConfigured) => debug!(
                target = "tba_api::tracking",
                action = %event.action,
                "usage tracking not configured, skipping event"
            ),
            Err(error) => {
                counter!(METRIC_TRACKING_FAILED).increment(1);
                warn!(
                    target = "tba_api::tracking",
                    action = %event.action,
                    label = %event.label,
                    error = %error,
                    "usage event not delivered"
                );
            }
        }
    }
}
