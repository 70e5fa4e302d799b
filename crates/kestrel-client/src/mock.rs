use crate::traits::{ClusterClient, PodWatch};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::{Event, Node};
use kestrel_core::{ClusterError, PodFilter, Result, WatchEvent};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Operations of `ClusterClient`, for error injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    WatchPods,
    ListNodes,
    BindPod,
    CreateEvent,
}

/// A binding accepted by the mock store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBinding {
    pub namespace: String,
    pub pod_name: String,
    pub node_name: String,
}

enum ScriptedWatch {
    /// Delivers the events, then ends
    Finite(Vec<Result<WatchEvent>>),
    /// Stays open while the sender is alive
    Channel(mpsc::Receiver<Result<WatchEvent>>),
}

#[derive(Default)]
struct MockState {
    nodes: Vec<Node>,
    /// (namespace, pod) -> node
    placements: HashMap<(String, String), String>,
    deleted: HashSet<(String, String)>,
    bindings: Vec<RecordedBinding>,
    events: Vec<Event>,
    watches: VecDeque<ScriptedWatch>,
    watch_filters: Vec<PodFilter>,
    failures: HashMap<MockOperation, VecDeque<ClusterError>>,
    calls: HashMap<MockOperation, usize>,
}

impl MockState {
    /// Count the call and pop an injected failure, if any
    fn enter(&mut self, op: MockOperation) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => {
                debug!("Mock: injected failure for {:?}: {}", op, err);
                Err(err)
            }
            None => Ok(()),
        }
    }
}

/// In-memory cluster store for tests
///
/// Nodes are listed in insertion order. Binding a pod that is already placed
/// fails with a conflict, binding a deleted pod with not-found. Watches are
/// scripted up front; once the script is exhausted `watch_pods` fails, which
/// lets a scheduling loop under test terminate deterministically.
#[derive(Clone, Default)]
pub struct MockClusterClient {
    state: Arc<Mutex<MockState>>,
}

/// A node with just a name
pub fn mock_node(name: &str) -> Node {
    let mut node = Node::default();
    node.metadata.name = Some(name.to_string());
    node
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock store holding the given nodes, in that order
    pub fn with_nodes(names: &[&str]) -> Self {
        let state = MockState {
            nodes: names.iter().map(|n| mock_node(n)).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Replace the node inventory
    pub async fn set_nodes(&self, names: &[&str]) {
        self.state.lock().await.nodes = names.iter().map(|n| mock_node(n)).collect();
    }

    /// Place a pod as some other actor would
    pub async fn place_pod(&self, namespace: &str, pod_name: &str, node_name: &str) {
        self.state.lock().await.placements.insert(
            (namespace.to_string(), pod_name.to_string()),
            node_name.to_string(),
        );
    }

    /// Delete a pod as some other actor would
    pub async fn delete_pod(&self, namespace: &str, pod_name: &str) {
        self.state
            .lock()
            .await
            .deleted
            .insert((namespace.to_string(), pod_name.to_string()));
    }

    /// Script the next watch to deliver `events` and then end
    pub async fn push_watch(&self, events: Vec<WatchEvent>) {
        self.push_watch_results(events.into_iter().map(Ok).collect())
            .await;
    }

    /// Script the next watch, including stream-level errors
    pub async fn push_watch_results(&self, items: Vec<Result<WatchEvent>>) {
        self.state
            .lock()
            .await
            .watches
            .push_back(ScriptedWatch::Finite(items));
    }

    /// Script the next watch as an open stream fed through the returned sender
    pub async fn open_watch(&self) -> mpsc::Sender<Result<WatchEvent>> {
        let (tx, rx) = mpsc::channel(16);
        self.state
            .lock()
            .await
            .watches
            .push_back(ScriptedWatch::Channel(rx));
        tx
    }

    /// Make the next call of `op` fail with `err`
    pub async fn fail_next(&self, op: MockOperation, err: ClusterError) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// How often `op` was called, including failed calls
    pub async fn calls(&self, op: MockOperation) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    pub async fn bindings(&self) -> Vec<RecordedBinding> {
        self.state.lock().await.bindings.clone()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.state.lock().await.events.clone()
    }

    pub async fn watch_filters(&self) -> Vec<PodFilter> {
        self.state.lock().await.watch_filters.clone()
    }

    /// The node a pod is placed on, by us or by another actor
    pub async fn placement(&self, namespace: &str, pod_name: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .placements
            .get(&(namespace.to_string(), pod_name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn watch_pods(&self, filter: &PodFilter) -> Result<PodWatch> {
        let mut state = self.state.lock().await;
        state.enter(MockOperation::WatchPods)?;
        state.watch_filters.push(filter.clone());

        match state.watches.pop_front() {
            Some(ScriptedWatch::Finite(items)) => Ok(stream::iter(items).boxed()),
            Some(ScriptedWatch::Channel(rx)) => Ok(ReceiverStream::new(rx).boxed()),
            None => Err(ClusterError::watch_error("No scripted watch left")),
        }
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let mut state = self.state.lock().await;
        state.enter(MockOperation::ListNodes)?;
        Ok(state.nodes.clone())
    }

    async fn bind_pod(&self, namespace: &str, pod_name: &str, node_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.enter(MockOperation::BindPod)?;

        let key = (namespace.to_string(), pod_name.to_string());
        let resource_key = format!("pods/{}/{}", namespace, pod_name);
        if state.deleted.contains(&key) {
            return Err(ClusterError::not_found(resource_key));
        }
        if state.placements.contains_key(&key) {
            return Err(ClusterError::conflict(resource_key));
        }

        state.placements.insert(key, node_name.to_string());
        state.bindings.push(RecordedBinding {
            namespace: namespace.to_string(),
            pod_name: pod_name.to_string(),
            node_name: node_name.to_string(),
        });
        debug!("Mock: bound {}/{} to {}", namespace, pod_name, node_name);
        Ok(())
    }

    async fn create_event(&self, event: &Event) -> Result<Event> {
        let mut state = self.state.lock().await;
        state.enter(MockOperation::CreateEvent)?;

        let mut created = event.clone();
        if created.metadata.name.is_none() {
            let prefix = created.metadata.generate_name.clone().unwrap_or_default();
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            created.metadata.name = Some(format!("{}{}", prefix, &suffix[..5]));
        }
        state.events.push(created.clone());
        Ok(created)
    }
}
