//! cluster
//!
//! Local cluster lifecycle behind the [`ClusterProvisioner`] trait.
//!
//! # Design
//!
//! The orchestrator never shells out to kind or docker directly; it
//! drives this trait. The real implementation ([`kind::KindCluster`])
//! wraps the kind and docker CLIs; [`mock::MockCluster`] is an
//! in-memory double so the state machine can be tested without
//! containers.
//!
//! # Idempotency contract
//!
//! - `ensure_running` creates only when absent, starts only when
//!   stopped, and is a no-op when running: calling it twice in a row
//!   never creates twice.
//! - `stop` on a missing or already-stopped cluster is a no-op.
//! - `destroy` treats "not found" as success.
//! - `inspect` is read-only and bounded by a short timeout.
//!
//! Creation failures are terminal, not retried: a half-created cluster
//! must be destroyed before trying again, and retrying automatically
//! would risk duplicating containers and volumes.

pub mod kind;
pub mod mock;

pub use kind::KindCluster;
pub use mock::MockCluster;

use async_trait::async_trait;
use thiserror::Error;

use crate::tools::exec::ExecError;

/// Errors from cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Cluster creation failed; the environment may be half-created.
    #[error("cluster creation failed: {detail}")]
    CreateFailed { detail: String },

    /// Starting the cluster's containers failed.
    #[error("failed to start cluster containers: {detail}")]
    StartFailed { detail: String },

    /// Stopping the cluster's containers failed.
    #[error("failed to stop cluster containers: {detail}")]
    StopFailed { detail: String },

    /// Deleting the cluster failed.
    #[error("failed to delete cluster: {detail}")]
    DestroyFailed { detail: String },

    /// Exporting the kubeconfig failed.
    #[error("failed to export kubeconfig: {detail}")]
    KubeconfigFailed { detail: String },

    /// The underlying tool invocation failed outright.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Observed status of the local cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    /// No cluster with the managed name exists.
    Absent,
    /// The cluster exists but its containers are stopped.
    Stopped,
    /// The cluster's containers are running.
    Running,
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterStatus::Absent => write!(f, "absent"),
            ClusterStatus::Stopped => write!(f, "stopped"),
            ClusterStatus::Running => write!(f, "running"),
        }
    }
}

/// Handle to a running cluster, returned by `ensure_running`.
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    /// The cluster name.
    pub name: String,
    /// Whether this call actually created the cluster (false when it
    /// already existed). Lets callers and tests assert idempotence.
    pub created: bool,
}

/// Lifecycle driver for the local cluster.
#[async_trait]
pub trait ClusterProvisioner: Send + Sync {
    /// The managed cluster's name.
    fn name(&self) -> &str;

    /// Read-only status probe. Must not mutate anything and must not
    /// block beyond its configured timeout.
    async fn inspect(&self) -> Result<ClusterStatus, ClusterError>;

    /// Bring the cluster to running: create if absent, start if
    /// stopped, no-op if already running.
    async fn ensure_running(&self) -> Result<ClusterHandle, ClusterError>;

    /// Pause the cluster's containers, preserving all state. No-op when
    /// the cluster is missing or already stopped.
    async fn stop(&self) -> Result<(), ClusterError>;

    /// Irreversibly delete the cluster. "Not found" is success.
    async fn destroy(&self) -> Result<(), ClusterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(ClusterStatus::Absent.to_string(), "absent");
        assert_eq!(ClusterStatus::Stopped.to_string(), "stopped");
        assert_eq!(ClusterStatus::Running.to_string(), "running");
    }

    #[test]
    fn error_display_carries_detail() {
        let err = ClusterError::CreateFailed {
            detail: "kind exploded".into(),
        };
        assert!(err.to_string().contains("kind exploded"));

        let err = ClusterError::DestroyFailed {
            detail: "docker gone".into(),
        };
        assert!(err.to_string().contains("delete"));
    }
}
