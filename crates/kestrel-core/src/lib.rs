//! Kestrel Core - Shared types for the Kestrel pod scheduler
//!
//! This crate provides:
//! - Cluster error types with miette diagnostics
//! - Watch event decoding
//! - Pod identity, the scheduler's pod filter and Binding construction

pub mod error;
pub mod events;
pub mod types;

// Re-export commonly used types
pub use error::{ClusterError, Result};
pub use events::{WatchEvent, WatchEventType};
pub use types::{
    binding_for, node_name, pod_node_name, pod_scheduler_name, PodFilter, PodIdentity,
    DEFAULT_NAMESPACE, DEFAULT_SCHEDULER_NAME,
};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Binding, Event, EventSource, Node, ObjectReference, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
