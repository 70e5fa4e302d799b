use crate::error::{ClusterError, Result};
use k8s_openapi::api::core::v1::{Binding, Node, ObjectReference, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;

/// Name this scheduler answers to unless configured otherwise
pub const DEFAULT_SCHEDULER_NAME: &str = "custom-scheduler";

/// Namespace assumed for pods that do not carry one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity of a pod, extracted once from a decoded object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodIdentity {
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
}

impl PodIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: None,
        }
    }

    /// Extract the identity of a pod. A pod without a name is malformed.
    pub fn from_pod(pod: &Pod) -> Result<Self> {
        let name = pod
            .metadata
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ClusterError::decode("Pod has no name"))?;
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE);

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            uid: pod.metadata.uid.clone(),
        })
    }
}

impl fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Selects the pods a scheduler is responsible for: those that ask for it by
/// name and have not been placed yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodFilter {
    pub scheduler_name: String,
}

impl PodFilter {
    pub fn new(scheduler_name: impl Into<String>) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
        }
    }

    /// Server-side field selector for the watch request
    pub fn field_selector(&self) -> String {
        format!("spec.schedulerName={},spec.nodeName=", self.scheduler_name)
    }

    /// Same predicate as the field selector, evaluated on a decoded pod
    pub fn matches(&self, pod: &Pod) -> bool {
        pod_scheduler_name(pod) == Some(self.scheduler_name.as_str())
            && pod_node_name(pod).is_none()
    }
}

/// The scheduler a pod asks for
pub fn pod_scheduler_name(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|s| s.scheduler_name.as_deref())
        .filter(|n| !n.is_empty())
}

/// The node a pod is placed on. An empty string counts as unplaced.
pub fn pod_node_name(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())
}

/// Name of a node, if it has a usable one
pub fn node_name(node: &Node) -> Option<&str> {
    node.metadata.name.as_deref().filter(|n| !n.is_empty())
}

/// Build the Binding that places `pod_name` in `namespace` onto `node_name`
pub fn binding_for(namespace: &str, pod_name: &str, node_name: &str) -> Binding {
    Binding {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        target: ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Node".to_string()),
            name: Some(node_name.to_string()),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;

    fn pod(name: Option<&str>, scheduler: Option<&str>, node: Option<&str>) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = name.map(str::to_string);
        pod.metadata.namespace = Some("apps".to_string());
        pod.metadata.uid = Some("uid-1".to_string());
        pod.spec = Some(PodSpec {
            scheduler_name: scheduler.map(str::to_string),
            node_name: node.map(str::to_string),
            ..Default::default()
        });
        pod
    }

    #[test]
    fn test_pod_identity() {
        let id = PodIdentity::from_pod(&pod(Some("web-1"), None, None)).unwrap();
        assert_eq!(id.namespace, "apps");
        assert_eq!(id.name, "web-1");
        assert_eq!(id.uid.as_deref(), Some("uid-1"));
        assert_eq!(id.to_string(), "apps/web-1");
    }

    #[test]
    fn test_pod_identity_defaults_namespace() {
        let mut p = pod(Some("web-1"), None, None);
        p.metadata.namespace = None;
        let id = PodIdentity::from_pod(&p).unwrap();
        assert_eq!(id.namespace, "default");
    }

    #[test]
    fn test_pod_identity_requires_name() {
        assert!(PodIdentity::from_pod(&pod(None, None, None)).is_err());
        assert!(PodIdentity::from_pod(&pod(Some(""), None, None)).is_err());
    }

    #[test]
    fn test_field_selector() {
        let filter = PodFilter::new("custom-scheduler");
        assert_eq!(
            filter.field_selector(),
            "spec.schedulerName=custom-scheduler,spec.nodeName="
        );
    }

    #[test]
    fn test_filter_matches() {
        let filter = PodFilter::new("custom-scheduler");
        assert!(filter.matches(&pod(Some("a"), Some("custom-scheduler"), None)));
        assert!(filter.matches(&pod(Some("a"), Some("custom-scheduler"), Some(""))));
        assert!(!filter.matches(&pod(Some("a"), Some("custom-scheduler"), Some("node-a"))));
        assert!(!filter.matches(&pod(Some("a"), Some("default-scheduler"), None)));
        assert!(!filter.matches(&pod(Some("a"), None, None)));
    }

    #[test]
    fn test_binding_for() {
        let binding = binding_for("default", "web-1", "node-a");
        assert_eq!(binding.metadata.name.as_deref(), Some("web-1"));
        assert_eq!(binding.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(binding.target.kind.as_deref(), Some("Node"));
        assert_eq!(binding.target.name.as_deref(), Some("node-a"));

        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["kind"], "Binding");
        assert_eq!(json["apiVersion"], "v1");
    }
}
