//! Kestrel Scheduler - Pod to Node placement
//!
//! This crate provides:
//! - The scheduling loop (watch → select → bind → notify)
//! - Node selection policies
//! - Pod binding with conflict handling
//! - Scheduled event emission
//! - Bounded retry for store calls

pub mod bind;
pub mod error;
pub mod notify;
pub mod retry;
pub mod scheduler;
pub mod select;

// Re-export commonly used types
pub use bind::Binder;
pub use error::{Result, SchedulerError};
pub use notify::{placement_message, scheduled_event, Emitter};
pub use retry::RetryPolicy;
pub use scheduler::{CycleOutcome, Scheduler, SchedulerConfig};
pub use select::{FirstListed, LowestName, NodeSelection, NodeSelector, SelectionPolicy};
