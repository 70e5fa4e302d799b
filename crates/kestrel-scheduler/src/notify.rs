use crate::error::Result;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kestrel_client::ClusterClient;
use kestrel_core::PodIdentity;
use std::sync::Arc;
use tracing::debug;

/// Reason recorded on every placement event
pub const SCHEDULED_REASON: &str = "Scheduled";

/// Severity of placement events
pub const NORMAL_EVENT_TYPE: &str = "Normal";

/// Message describing a completed placement
pub fn placement_message(pod: &PodIdentity, node: &str) -> String {
    format!("Placed pod [{}/{}] on {}", pod.namespace, pod.name, node)
}

/// Build the audit Event for a placement.
///
/// The name is left to the server (`generateName`), so repeated events for
/// the same pod never collide.
pub fn scheduled_event(
    pod: &PodIdentity,
    message: &str,
    component: &str,
    now: DateTime<Utc>,
) -> Event {
    Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", pod.name)),
            namespace: Some(pod.namespace.clone()),
            ..Default::default()
        },
        involved_object: ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Pod".to_string()),
            name: Some(pod.name.clone()),
            namespace: Some(pod.namespace.clone()),
            uid: pod.uid.clone(),
            ..Default::default()
        },
        type_: Some(NORMAL_EVENT_TYPE.to_string()),
        reason: Some(SCHEDULED_REASON.to_string()),
        message: Some(message.to_string()),
        count: Some(1),
        first_timestamp: Some(Time(now)),
        last_timestamp: Some(Time(now)),
        source: Some(EventSource {
            component: Some(component.to_string()),
            ..Default::default()
        }),
        reporting_component: Some(component.to_string()),
        ..Default::default()
    }
}

/// Notification Emitter: appends placement events to the store
pub struct Emitter {
    client: Arc<dyn ClusterClient>,
    component: String,
    retry: RetryPolicy,
}

impl Emitter {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        component: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            component: component.into(),
            retry,
        }
    }

    /// Record `message` as a `Scheduled` event for `pod`
    pub async fn emit(&self, pod: &PodIdentity, message: &str) -> Result<()> {
        let event = scheduled_event(pod, message, &self.component, Utc::now());
        let operation = format!("record event for {}", pod);

        let created = self
            .retry
            .call(&operation, || self.client.create_event(&event))
            .await?;

        debug!(
            "Recorded event {} for pod {}",
            created.metadata.name.as_deref().unwrap_or("<unnamed>"),
            pod
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use chrono::TimeZone;
    use kestrel_client::{MockClusterClient, MockOperation};
    use kestrel_core::ClusterError;

    fn web_pod() -> PodIdentity {
        PodIdentity {
            namespace: "default".to_string(),
            name: "web-1".to_string(),
            uid: Some("8f1c-uid".to_string()),
        }
    }

    #[test]
    fn test_placement_message() {
        assert_eq!(
            placement_message(&web_pod(), "node-a"),
            "Placed pod [default/web-1] on node-a"
        );
    }

    #[test]
    fn test_scheduled_event() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let event = scheduled_event(
            &web_pod(),
            "Placed pod [default/web-1] on node-a",
            "custom-scheduler",
            now,
        );

        assert_eq!(event.metadata.generate_name.as_deref(), Some("web-1-"));
        assert!(event.metadata.name.is_none());
        assert_eq!(event.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(event.type_.as_deref(), Some("Normal"));
        assert_eq!(event.reason.as_deref(), Some("Scheduled"));
        assert_eq!(event.count, Some(1));
        assert_eq!(event.first_timestamp, Some(Time(now)));
        assert_eq!(event.last_timestamp, Some(Time(now)));
        assert_eq!(
            event.source.and_then(|s| s.component).as_deref(),
            Some("custom-scheduler")
        );
        assert_eq!(event.involved_object.kind.as_deref(), Some("Pod"));
        assert_eq!(event.involved_object.name.as_deref(), Some("web-1"));
        assert_eq!(event.involved_object.namespace.as_deref(), Some("default"));
        assert_eq!(event.involved_object.uid.as_deref(), Some("8f1c-uid"));
    }

    #[tokio::test]
    async fn test_emit_creates_event() {
        let client = MockClusterClient::new();
        let emitter = Emitter::new(
            Arc::new(client.clone()),
            "custom-scheduler",
            RetryPolicy::none(),
        );

        emitter
            .emit(&web_pod(), "Placed pod [default/web-1] on node-a")
            .await
            .unwrap();

        let events = client.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].message.as_deref(),
            Some("Placed pod [default/web-1] on node-a")
        );
        assert!(events[0]
            .metadata
            .name
            .as_deref()
            .is_some_and(|n| n.starts_with("web-1-")));
    }

    #[tokio::test]
    async fn test_repeated_emits_are_not_deduplicated() {
        let client = MockClusterClient::new();
        let emitter = Emitter::new(
            Arc::new(client.clone()),
            "custom-scheduler",
            RetryPolicy::none(),
        );

        emitter.emit(&web_pod(), "first").await.unwrap();
        emitter.emit(&web_pod(), "second").await.unwrap();

        let events = client.events().await;
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].metadata.name, events[1].metadata.name);
    }

    #[tokio::test]
    async fn test_emit_failure() {
        let client = MockClusterClient::new();
        client
            .fail_next(MockOperation::CreateEvent, ClusterError::transport("timeout"))
            .await;
        let emitter = Emitter::new(
            Arc::new(client.clone()),
            "custom-scheduler",
            RetryPolicy::none(),
        );

        let result = emitter.emit(&web_pod(), "message").await;
        assert!(matches!(result, Err(SchedulerError::Transport { .. })));
        assert!(client.events().await.is_empty());
    }
}
