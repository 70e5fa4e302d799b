//! Kestrel Client - Access to the cluster state store
//!
//! This crate provides:
//! - The `ClusterClient` capability trait consumed by the scheduler
//! - `ApiClient`, an HTTP implementation for Kubernetes-compatible API servers
//! - Incremental decoding of newline-delimited watch responses
//! - `MockClusterClient`, an in-memory store for tests

pub mod api_client;
pub mod config;
pub mod mock;
pub mod traits;
pub mod watch;

// Re-export primary types
pub use api_client::ApiClient;
pub use config::ApiClientConfig;
pub use mock::{mock_node, MockClusterClient, MockOperation, RecordedBinding};
pub use traits::{ClusterClient, PodWatch};
pub use watch::decode_watch_stream;
