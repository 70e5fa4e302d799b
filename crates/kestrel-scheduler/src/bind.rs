use crate::error::{Result, SchedulerError};
use crate::retry::RetryPolicy;
use kestrel_client::ClusterClient;
use kestrel_core::PodIdentity;
use std::sync::Arc;
use tracing::info;

/// Placement Binder: commits a pod → node decision to the store
pub struct Binder {
    client: Arc<dyn ClusterClient>,
    retry: RetryPolicy,
}

impl Binder {
    pub fn new(client: Arc<dyn ClusterClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Submit the binding for `pod`.
    ///
    /// A conflict (pod already placed or gone) is returned as
    /// `SchedulerError::BindConflict` and never retried. Transport failures
    /// are retried per the retry policy.
    pub async fn bind(&self, pod: &PodIdentity, node: &str) -> Result<()> {
        info!("Binding pod {} to node {}", pod, node);

        let operation = format!("bind {}", pod);
        let result = self
            .retry
            .call(&operation, || {
                self.client.bind_pod(&pod.namespace, &pod.name, node)
            })
            .await;

        match result {
            Ok(()) => {
                info!("Successfully bound pod {} to node {}", pod, node);
                Ok(())
            }
            Err(SchedulerError::Cluster(e)) if e.is_conflict() => {
                Err(SchedulerError::bind_conflict(pod.to_string(), node))
            }
            Err(e) => Err(e),
        }
    }
}
