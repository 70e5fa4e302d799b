use crate::bind::Binder;
use crate::error::{Result, SchedulerError};
use crate::notify::{placement_message, Emitter};
use crate::retry::{exponential_backoff, RetryPolicy};
use crate::select::{NodeSelection, NodeSelector};
use futures_util::StreamExt;
use kestrel_client::{ClusterClient, PodWatch};
use kestrel_core::{
    pod_node_name, pod_scheduler_name, ClusterError, PodFilter, PodIdentity, WatchEvent,
    WatchEventType, DEFAULT_SCHEDULER_NAME,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pods asking for this name are ours; also the event source component
    pub scheduler_name: String,
    /// Retry policy for list/bind/event calls
    pub retry: RetryPolicy,
    /// Consecutive failed subscriptions tolerated before giving up.
    /// Zero makes the first loss of the watch fatal.
    pub max_watch_restarts: u32,
    /// Delay before the first resubscription, doubled per further failure
    pub watch_restart_backoff: Duration,
    /// Upper bound for the resubscription delay
    pub watch_restart_backoff_max: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_name: DEFAULT_SCHEDULER_NAME.to_string(),
            retry: RetryPolicy::default(),
            max_watch_restarts: 5,
            watch_restart_backoff: Duration::from_secs(1),
            watch_restart_backoff_max: Duration::from_secs(30),
        }
    }
}

/// What a single notification led to
#[derive(Debug)]
pub enum CycleOutcome {
    /// Not a creation event, or a pod that is not ours to place
    Ignored,
    /// The payload is not a usable pod
    Malformed(SchedulerError),
    /// No placement happened; the pod stays unplaced until delivered again
    Unplaced(SchedulerError),
    /// The store refused the binding because another actor placed or
    /// deleted the pod first
    Conflicted(SchedulerError),
    /// The pod was bound. `recorded` is false if the event could not be written.
    Scheduled {
        pod: PodIdentity,
        node: String,
        recorded: bool,
    },
}

/// Why consuming a watch stopped
enum WatchEnd {
    Cancelled,
    /// Server closed the watch after delivering events
    Closed,
    Failed(String),
}

/// Pod scheduler: watches for new pods that ask for it and places them one
/// at a time
pub struct Scheduler {
    client: Arc<dyn ClusterClient>,
    config: SchedulerConfig,
    filter: PodFilter,
    selection: NodeSelection,
    binder: Binder,
    emitter: Emitter,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        client: Arc<dyn ClusterClient>,
        selector: Box<dyn NodeSelector>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            filter: PodFilter::new(config.scheduler_name.clone()),
            selection: NodeSelection::new(client.clone(), selector, config.retry.clone()),
            binder: Binder::new(client.clone(), config.retry.clone()),
            emitter: Emitter::new(
                client.clone(),
                config.scheduler_name.clone(),
                config.retry.clone(),
            ),
            client,
            config,
        }
    }

    /// Run the scheduler loop until `token` is cancelled or the pod watch is
    /// lost for good
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!("Starting scheduler '{}'", self.config.scheduler_name);

        let mut failures: u32 = 0;

        loop {
            let subscribed = tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler shutting down");
                    return Ok(());
                }
                result = self.client.watch_pods(&self.filter) => result,
            };

            let end = match subscribed {
                Ok(watch) => {
                    info!(
                        "Watching pods with selector {}",
                        self.filter.field_selector()
                    );
                    self.consume(watch, &token, &mut failures).await
                }
                Err(e) => WatchEnd::Failed(e.to_string()),
            };

            match end {
                WatchEnd::Cancelled => {
                    info!("Scheduler shutting down");
                    return Ok(());
                }
                WatchEnd::Closed => {
                    debug!("Pod watch closed by the server, resubscribing");
                }
                WatchEnd::Failed(message) => {
                    failures += 1;
                    if failures > self.config.max_watch_restarts {
                        error!("Pod watch lost: {}", message);
                        return Err(SchedulerError::watch_lost(failures, message));
                    }

                    let delay = exponential_backoff(
                        self.config.watch_restart_backoff,
                        self.config.watch_restart_backoff_max,
                        failures,
                    );
                    warn!(
                        "Pod watch failed: {} - resubscribing in {:?} ({}/{})",
                        message, delay, failures, self.config.max_watch_restarts
                    );

                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("Scheduler shutting down");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Process notifications from one subscription, in delivery order
    async fn consume(
        &self,
        mut watch: PodWatch,
        token: &CancellationToken,
        failures: &mut u32,
    ) -> WatchEnd {
        let mut delivered = false;

        loop {
            let item = tokio::select! {
                _ = token.cancelled() => return WatchEnd::Cancelled,
                item = watch.next() => item,
            };

            match item {
                None if delivered => return WatchEnd::Closed,
                None => {
                    return WatchEnd::Failed("watch closed without delivering any event".to_string())
                }
                Some(Ok(event)) if event.event_type == WatchEventType::Error => {
                    return WatchEnd::Failed(event.status_message());
                }
                Some(Ok(event)) => {
                    delivered = true;
                    *failures = 0;
                    self.schedule_event(&event).await;
                }
                // Unreadable lines are skipped but do not prove the watch healthy
                Some(Err(e @ ClusterError::Decode { .. })) => {
                    warn!("Skipping unreadable pod notification: {}", e);
                }
                Some(Err(e)) => return WatchEnd::Failed(e.to_string()),
            }
        }
    }

    /// Handle one notification. Errors are logged here and never escape.
    pub async fn schedule_event(&self, event: &WatchEvent) -> CycleOutcome {
        if event.event_type != WatchEventType::Added {
            debug!("Ignoring {} pod event", event.event_type);
            return CycleOutcome::Ignored;
        }

        let pod = match event.decode_pod() {
            Ok(pod) => pod,
            Err(e) => {
                warn!("Skipping malformed pod notification: {}", e);
                return CycleOutcome::Malformed(SchedulerError::malformed_pod(e.to_string()));
            }
        };

        let identity = match PodIdentity::from_pod(&pod) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Skipping malformed pod notification: {}", e);
                return CycleOutcome::Malformed(SchedulerError::malformed_pod(e.to_string()));
            }
        };

        // The watch is filtered server-side, but the pod may have changed
        // hands between the filter and us. Never overwrite someone else's work.
        if !self.filter.matches(&pod) {
            info!(
                "Ignoring pod {}: scheduler {:?}, node {:?}",
                identity,
                pod_scheduler_name(&pod),
                pod_node_name(&pod)
            );
            return CycleOutcome::Ignored;
        }

        info!("Found a pod to schedule: {}", identity);
        self.schedule_pod(&identity).await
    }

    /// One select → bind → emit cycle for a pod that is ours and unplaced
    pub async fn schedule_pod(&self, pod: &PodIdentity) -> CycleOutcome {
        let node = match self.selection.select_node(pod).await {
            Ok(node) => node,
            Err(e) => {
                warn!("Cannot find a node for pod {}: {}", pod, e);
                return CycleOutcome::Unplaced(e);
            }
        };

        if let Err(e) = self.binder.bind(pod, &node).await {
            return match e {
                SchedulerError::BindConflict { .. } => {
                    info!("Skipping pod {}: {}", pod, e);
                    CycleOutcome::Conflicted(e)
                }
                _ => {
                    error!("Failed to bind pod {}: {}", pod, e);
                    CycleOutcome::Unplaced(e)
                }
            };
        }

        // The binding stands even if the event cannot be written
        let message = placement_message(pod, &node);
        let recorded = match self.emitter.emit(pod, &message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to record scheduled event for pod {}: {}", pod, e);
                false
            }
        };

        info!("{}", message);

        CycleOutcome::Scheduled {
            pod: pod.clone(),
            node,
            recorded,
        }
    }
}
