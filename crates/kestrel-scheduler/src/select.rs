use crate::error::{Result, SchedulerError};
use crate::retry::RetryPolicy;
use k8s_openapi::api::core::v1::Node;
use kestrel_client::ClusterClient;
use kestrel_core::{node_name, PodIdentity};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Placement policy: picks one node out of the current inventory
pub trait NodeSelector: Send + Sync {
    /// Choose a node, or `None` if there is nothing to choose from.
    /// Nodes without a name are never chosen.
    fn select<'a>(&self, nodes: &'a [Node]) -> Option<&'a Node>;

    /// Name of the policy
    fn name(&self) -> &str;
}

/// First node in the order the store listed them.
///
/// No feasibility check and no balancing. The store does not promise a
/// stable list order, so the same node set may yield different choices
/// across cycles.
pub struct FirstListed;

impl NodeSelector for FirstListed {
    fn select<'a>(&self, nodes: &'a [Node]) -> Option<&'a Node> {
        nodes.iter().find(|n| node_name(n).is_some())
    }

    fn name(&self) -> &str {
        "FirstListed"
    }
}

/// Node with the lexicographically smallest name, independent of list order
pub struct LowestName;

impl NodeSelector for LowestName {
    fn select<'a>(&self, nodes: &'a [Node]) -> Option<&'a Node> {
        nodes
            .iter()
            .filter_map(|n| node_name(n).map(|name| (name, n)))
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, n)| n)
    }

    fn name(&self) -> &str {
        "LowestName"
    }
}

/// Selection policy as configured on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    FirstListed,
    #[default]
    LowestName,
}

impl SelectionPolicy {
    pub fn selector(self) -> Box<dyn NodeSelector> {
        match self {
            Self::FirstListed => Box::new(FirstListed),
            Self::LowestName => Box::new(LowestName),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "first-listed" => Ok(Self::FirstListed),
            "lowest-name" => Ok(Self::LowestName),
            other => Err(format!(
                "unknown selection policy '{}' (expected first-listed or lowest-name)",
                other
            )),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstListed => write!(f, "first-listed"),
            Self::LowestName => write!(f, "lowest-name"),
        }
    }
}

/// Node Selector component: lists the current inventory and applies the policy
pub struct NodeSelection {
    client: Arc<dyn ClusterClient>,
    selector: Box<dyn NodeSelector>,
    retry: RetryPolicy,
}

impl NodeSelection {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        selector: Box<dyn NodeSelector>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            selector,
            retry,
        }
    }

    /// Choose the node for `pod` from the nodes the store knows right now
    pub async fn select_node(&self, pod: &PodIdentity) -> Result<String> {
        let nodes = self
            .retry
            .call("list nodes", || self.client.list_nodes())
            .await?;

        debug!("{} node(s) available for pod {}", nodes.len(), pod);
        for node in &nodes {
            debug!("Available node: {}", node_name(node).unwrap_or("<unnamed>"));
        }

        let chosen = self
            .selector
            .select(&nodes)
            .and_then(node_name)
            .ok_or_else(|| SchedulerError::no_schedulable_node(pod.to_string()))?;

        debug!(
            "{} selected node {} for pod {}",
            self.selector.name(),
            chosen,
            pod
        );

        Ok(chosen.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_client::{mock_node, MockClusterClient, MockOperation};
    use kestrel_core::ClusterError;
    use std::time::Duration;

    fn nodes(names: &[&str]) -> Vec<Node> {
        names.iter().map(|n| mock_node(n)).collect()
    }

    fn selection(client: &MockClusterClient, policy: SelectionPolicy) -> NodeSelection {
        let retry = RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        NodeSelection::new(Arc::new(client.clone()), policy.selector(), retry)
    }

    #[test]
    fn test_first_listed() {
        let nodes = nodes(&["node-c", "node-a", "node-b"]);
        let chosen = FirstListed.select(&nodes).unwrap();
        assert_eq!(node_name(chosen), Some("node-c"));
    }

    #[test]
    fn test_lowest_name_ignores_order() {
        let forward = nodes(&["node-a", "node-b", "node-c"]);
        let shuffled = nodes(&["node-c", "node-a", "node-b"]);

        assert_eq!(node_name(LowestName.select(&forward).unwrap()), Some("node-a"));
        assert_eq!(node_name(LowestName.select(&shuffled).unwrap()), Some("node-a"));
    }

    #[test]
    fn test_unnamed_nodes_are_skipped() {
        let mut list = vec![Node::default()];
        list.extend(nodes(&["node-b"]));

        assert_eq!(node_name(FirstListed.select(&list).unwrap()), Some("node-b"));
        assert_eq!(node_name(LowestName.select(&list).unwrap()), Some("node-b"));
    }

    #[test]
    fn test_empty_inventory() {
        assert!(FirstListed.select(&[]).is_none());
        assert!(LowestName.select(&[]).is_none());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "first-listed".parse::<SelectionPolicy>().unwrap(),
            SelectionPolicy::FirstListed
        );
        assert_eq!(
            "lowest-name".parse::<SelectionPolicy>().unwrap(),
            SelectionPolicy::LowestName
        );
        assert!("round-robin".parse::<SelectionPolicy>().is_err());
        assert_eq!(SelectionPolicy::default().to_string(), "lowest-name");
        assert_eq!(SelectionPolicy::FirstListed.selector().name(), "FirstListed");
    }

    #[tokio::test]
    async fn test_select_node_from_store() {
        let client = MockClusterClient::with_nodes(&["node-b", "node-a"]);
        let pod = PodIdentity::new("default", "web-1");

        let first = selection(&client, SelectionPolicy::FirstListed);
        assert_eq!(first.select_node(&pod).await.unwrap(), "node-b");

        let lowest = selection(&client, SelectionPolicy::LowestName);
        assert_eq!(lowest.select_node(&pod).await.unwrap(), "node-a");
    }

    #[tokio::test]
    async fn test_select_node_empty_inventory() {
        let client = MockClusterClient::new();
        let pod = PodIdentity::new("default", "web-1");

        let result = selection(&client, SelectionPolicy::FirstListed)
            .select_node(&pod)
            .await;
        assert!(matches!(
            result,
            Err(SchedulerError::NoSchedulableNode { .. })
        ));
    }

    #[tokio::test]
    async fn test_select_node_sees_inventory_changes() {
        let client = MockClusterClient::with_nodes(&["node-a"]);
        let pod = PodIdentity::new("default", "web-1");
        let selection = selection(&client, SelectionPolicy::FirstListed);

        assert_eq!(selection.select_node(&pod).await.unwrap(), "node-a");
        client.set_nodes(&["node-z"]).await;
        assert_eq!(selection.select_node(&pod).await.unwrap(), "node-z");
    }

    #[tokio::test]
    async fn test_select_node_retries_listing() {
        let client = MockClusterClient::with_nodes(&["node-a"]);
        client
            .fail_next(MockOperation::ListNodes, ClusterError::transport("timeout"))
            .await;
        let pod = PodIdentity::new("default", "web-1");

        let node = selection(&client, SelectionPolicy::FirstListed)
            .select_node(&pod)
            .await
            .unwrap();
        assert_eq!(node, "node-a");
        assert_eq!(client.calls(MockOperation::ListNodes).await, 2);
    }
}
