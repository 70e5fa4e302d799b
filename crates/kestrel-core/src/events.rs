use crate::error::{ClusterError, Result};
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Watch event type as sent on the wire (ADDED, MODIFIED, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
    /// Anything the server sends that we do not know about
    Unknown(String),
}

impl WatchEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Bookmark => "BOOKMARK",
            Self::Error => "ERROR",
            Self::Unknown(other) => other,
        }
    }
}

impl From<&str> for WatchEventType {
    fn from(value: &str) -> Self {
        match value {
            "ADDED" => Self::Added,
            "MODIFIED" => Self::Modified,
            "DELETED" => Self::Deleted,
            "BOOKMARK" => Self::Bookmark,
            "ERROR" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for WatchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    object: serde_json::Value,
}

impl From<RawWatchEvent> for WatchEvent {
    fn from(raw: RawWatchEvent) -> Self {
        Self {
            event_type: WatchEventType::from(raw.event_type.as_str()),
            object: raw.object,
        }
    }
}

impl From<WatchEvent> for RawWatchEvent {
    fn from(event: WatchEvent) -> Self {
        Self {
            event_type: event.event_type.as_str().to_string(),
            object: event.object,
        }
    }
}

/// A single notification from a watch stream.
///
/// The object is kept as raw JSON so that a payload which is not a valid
/// resource is reported for that one notification instead of breaking the
/// whole stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWatchEvent", into = "RawWatchEvent")]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    pub object: serde_json::Value,
}

impl WatchEvent {
    pub fn new(event_type: WatchEventType, object: serde_json::Value) -> Self {
        Self { event_type, object }
    }

    /// Wrap a pod in a watch event of the given type
    pub fn from_pod(event_type: WatchEventType, pod: &Pod) -> Result<Self> {
        let object = serde_json::to_value(pod)
            .map_err(|e| ClusterError::decode(format!("Failed to encode pod: {}", e)))?;
        Ok(Self::new(event_type, object))
    }

    /// Parse one line of a newline-delimited watch response
    pub fn from_line(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| ClusterError::decode(format!("Invalid watch event: {}", e)))
    }

    /// Decode the object as a Pod
    pub fn decode_pod(&self) -> Result<Pod> {
        Pod::deserialize(&self.object)
            .map_err(|e| ClusterError::decode(format!("Watch object is not a pod: {}", e)))
    }

    /// Human-readable message of an ERROR event's Status object
    pub fn status_message(&self) -> String {
        let message = self.object["message"].as_str().unwrap_or("unknown error");
        match self.object["code"].as_u64() {
            Some(code) => format!("{} (code {})", message, code),
            None => message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(WatchEventType::from("ADDED"), WatchEventType::Added);
        assert_eq!(WatchEventType::from("BOOKMARK"), WatchEventType::Bookmark);
        assert_eq!(
            WatchEventType::from("SOMETHING"),
            WatchEventType::Unknown("SOMETHING".to_string())
        );
        assert_eq!(WatchEventType::Deleted.to_string(), "DELETED");
    }

    #[test]
    fn test_from_line() {
        let line =
            r#"{"type":"ADDED","object":{"metadata":{"name":"web-1","namespace":"default"}}}"#;
        let event = WatchEvent::from_line(line).unwrap();
        assert_eq!(event.event_type, WatchEventType::Added);

        let pod = event.decode_pod().unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("web-1"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_from_line_rejects_garbage() {
        assert!(WatchEvent::from_line("not json").is_err());
        assert!(WatchEvent::from_line(r#"{"object":{}}"#).is_err());
    }

    #[test]
    fn test_decode_pod_rejects_non_pod_object() {
        let event = WatchEvent::new(WatchEventType::Added, json!("just a string"));
        assert!(matches!(
            event.decode_pod(),
            Err(ClusterError::Decode { .. })
        ));

        let event = WatchEvent::new(
            WatchEventType::Added,
            json!({"metadata": {"name": 42}}),
        );
        assert!(event.decode_pod().is_err());
    }

    #[test]
    fn test_unknown_type_survives_serialization() {
        let event = WatchEvent::new(WatchEventType::Unknown("CUSTOM".to_string()), json!({}));
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains(r#""type":"CUSTOM""#));
        assert_eq!(WatchEvent::from_line(&line).unwrap(), event);
    }

    #[test]
    fn test_status_message() {
        let event = WatchEvent::new(
            WatchEventType::Error,
            json!({"kind": "Status", "message": "too old resource version", "code": 410}),
        );
        assert_eq!(event.status_message(), "too old resource version (code 410)");
    }
}
