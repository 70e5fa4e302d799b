// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for calls against the cluster state store
#[derive(Error, Debug, Diagnostic)]
pub enum ClusterError {
    /// The request never reached the API server or the server failed transiently
    #[error("Transport error: {message}")]
    #[diagnostic(
        code(kestrel::transport),
        help("Check connectivity to the API server. The request may be retried")
    )]
    Transport {
        #[allow(unused)]
        message: String,
    },

    /// The store rejected the request because of a concurrent modification
    #[error("Conflict on resource {resource_key}")]
    #[diagnostic(
        code(kestrel::conflict),
        help("Another actor changed this resource first. This is an expected race, not a bug")
    )]
    Conflict {
        #[allow(unused)]
        resource_key: String,
    },

    /// The resource does not exist (anymore)
    #[error("Resource not found: {resource_key}")]
    #[diagnostic(
        code(kestrel::not_found),
        help("The resource may have been deleted concurrently")
    )]
    NotFound {
        #[allow(unused)]
        resource_key: String,
    },

    /// The API server refused the request for a non-transient reason
    #[error("Request rejected with status {status}: {message}")]
    #[diagnostic(
        code(kestrel::rejected),
        help("Check RBAC permissions for the scheduler service account and the request payload")
    )]
    Rejected {
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        message: String,
    },

    /// A response body could not be decoded
    #[error("Decode error: {message}")]
    #[diagnostic(
        code(kestrel::decode),
        help("The API server returned a payload that does not match the expected schema")
    )]
    Decode {
        #[allow(unused)]
        message: String,
    },

    /// The watch stream reported an error status
    #[error("Watch error: {message}")]
    #[diagnostic(
        code(kestrel::watch_error),
        help("The subscription must be re-established")
    )]
    WatchError {
        #[allow(unused)]
        message: String,
    },

    /// Client configuration could not be loaded
    #[error("Invalid client configuration: {message}")]
    #[diagnostic(code(kestrel::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },
}

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn conflict(resource_key: impl Into<String>) -> Self {
        Self::Conflict {
            resource_key: resource_key.into(),
        }
    }

    pub fn not_found(resource_key: impl Into<String>) -> Self {
        Self::NotFound {
            resource_key: resource_key.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn watch_error(message: impl Into<String>) -> Self {
        Self::WatchError {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the store refused the request because another actor got there first
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::NotFound { .. })
    }
}
