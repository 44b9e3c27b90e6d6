//! Domain errors for network provisioning.

use std::io;
use std::path::PathBuf;

use crate::netlink;

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while provisioning or tearing down networks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed address or CIDR.
    #[error("invalid address '{input}': {reason}")]
    Parse {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Interface absent on removal.
    #[error("interface {name} not found")]
    NotFound {
        /// Interface name.
        name: String,
    },

    /// A kernel call failed.
    #[error("{operation}: {source}")]
    KernelOp {
        /// What was being done, including the object name.
        operation: String,
        /// Transport error.
        #[source]
        source: netlink::Error,
    },

    /// Declaring the NAT table and chain failed.
    #[error("failed to ensure NAT table and chain: {0}")]
    ChainEnsure(#[source] netlink::Error),

    /// A compensating action failed after the original failure.
    #[error("{original} (rollback also failed: {rollback})")]
    RollbackFailed {
        /// The failure that triggered the rollback.
        original: Box<Error>,
        /// The failure of the rollback itself.
        rollback: Box<Error>,
    },

    /// One network of a run failed; the run was aborted.
    #[error("network {name}: {source}")]
    Network {
        /// Network name.
        name: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Configuration content is invalid.
    #[error("invalid config: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid YAML for the schema.
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration file is not valid JSON for the schema.
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a transport error with the operation that failed.
    pub fn kernel(operation: impl Into<String>, source: netlink::Error) -> Self {
        Self::KernelOp {
            operation: operation.into(),
            source,
        }
    }

    /// Attribute this error to a network.
    pub fn for_network(self, name: impl Into<String>) -> Self {
        Self::Network {
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is a "not found" condition, at any wrapping level.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::KernelOp { source, .. } => source.is_not_found(),
            Self::Network { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Check if the kernel refused for lack of privileges.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::KernelOp { source, .. } | Self::ChainEnsure(source) => {
                source.is_permission_denied()
            }
            Self::Network { source, .. } => source.is_permission_denied(),
            Self::RollbackFailed { original, .. } => original.is_permission_denied(),
            _ => false,
        }
    }
}
