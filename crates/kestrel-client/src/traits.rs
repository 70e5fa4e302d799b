use async_trait::async_trait;
use futures_util::stream::BoxStream;
use kestrel_core::{Event, Node, PodFilter, Result, WatchEvent};

/// Live stream of pod notifications.
///
/// Ends when the server closes the watch. An `Err(ClusterError::Decode)` item
/// is a single unreadable notification; any other error means the
/// subscription itself failed.
pub type PodWatch = BoxStream<'static, Result<WatchEvent>>;

/// Capability interface to the cluster state store
///
/// The store owns pods, nodes and events and arbitrates concurrent
/// mutations. Implementations: `ApiClient` for a real API server and
/// `MockClusterClient` for tests.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Open a watch on pods matching `filter`. Call again to resubscribe.
    async fn watch_pods(&self, filter: &PodFilter) -> Result<PodWatch>;

    /// List all nodes in the order the store returns them
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Atomically place a pod onto a node.
    ///
    /// Fails with `ClusterError::Conflict` if the pod is already placed and
    /// `ClusterError::NotFound` if it no longer exists.
    async fn bind_pod(&self, namespace: &str, pod_name: &str, node_name: &str) -> Result<()>;

    /// Append an event record
    async fn create_event(&self, event: &Event) -> Result<Event>;
}
