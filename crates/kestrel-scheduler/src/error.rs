// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use kestrel_core::ClusterError;
use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// The node inventory is empty
    #[error("No schedulable nodes available for pod {pod}")]
    #[diagnostic(
        code(kestrel::scheduler::no_schedulable_node),
        help("Register at least one node. The pod is retried when it is delivered again")
    )]
    NoSchedulableNode {
        #[allow(unused)]
        pod: String,
    },

    /// The store refused the binding because another actor placed or deleted the pod
    #[error("Binding pod {pod} to node {node} conflicted with a concurrent change")]
    #[diagnostic(
        code(kestrel::scheduler::bind_conflict),
        help("Another actor resolved this pod first. Nothing to do")
    )]
    BindConflict {
        #[allow(unused)]
        pod: String,
        #[allow(unused)]
        node: String,
    },

    /// A call kept failing after all retries
    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    #[diagnostic(
        code(kestrel::scheduler::transport),
        help("Check connectivity to the API server")
    )]
    Transport {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        attempts: u32,
        #[allow(unused)]
        message: String,
    },

    /// A notification that does not carry a usable pod
    #[error("Malformed pod notification: {message}")]
    #[diagnostic(
        code(kestrel::scheduler::malformed_pod),
        help("The payload is skipped. This is not retried")
    )]
    MalformedPod {
        #[allow(unused)]
        message: String,
    },

    /// The pod subscription could not be kept alive
    #[error("Lost pod watch after {attempts} attempt(s): {message}")]
    #[diagnostic(
        code(kestrel::scheduler::watch_lost),
        help("Check that the API server is reachable and that the scheduler may watch pods")
    )]
    WatchLost {
        #[allow(unused)]
        attempts: u32,
        #[allow(unused)]
        message: String,
    },

    /// Any other error from the cluster store
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cluster(#[from] ClusterError),
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    pub fn no_schedulable_node(pod: impl Into<String>) -> Self {
        Self::NoSchedulableNode { pod: pod.into() }
    }

    pub fn bind_conflict(pod: impl Into<String>, node: impl Into<String>) -> Self {
        Self::BindConflict {
            pod: pod.into(),
            node: node.into(),
        }
    }

    pub fn transport(
        operation: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            operation: operation.into(),
            attempts,
            message: message.into(),
        }
    }

    pub fn malformed_pod(message: impl Into<String>) -> Self {
        Self::MalformedPod {
            message: message.into(),
        }
    }

    pub fn watch_lost(attempts: u32, message: impl Into<String>) -> Self {
        Self::WatchLost {
            attempts,
            message: message.into(),
        }
    }

    /// Only a lost subscription ends the scheduling loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WatchLost { .. })
    }
}
