//! engine
//!
//! The lifecycle orchestrator: composes the preflight checker, cluster
//! driver, chart installer and port-forward supervisor into the five
//! environment operations.
//!
//! # State machine
//!
//! The environment as a whole moves through
//! `Absent → Provisioning → Ready ⇄ Stopped`, with `Error` reachable
//! from any failed transition:
//!
//! | Operation | Allowed from            | Success    |
//! |-----------|-------------------------|------------|
//! | install   | Absent, Error, Provisioning (and a Ready no-op) | Ready |
//! | start     | Stopped, Error (and a Ready re-check)           | Ready |
//! | stop      | Ready (and a Stopped no-op)                     | Stopped |
//! | status    | any (read-only)                                 | unchanged |
//! | destroy   | any                                             | Absent |
//!
//! # Invariants
//!
//! - Every operation runs inside exactly one state-store transaction;
//!   the transactional lock is the sole concurrency primitive.
//! - Progress is checkpointed to disk after each sub-step, so a crashed
//!   operation re-derives its remaining work purely from persisted
//!   state on the next invocation.
//! - Every operation is safe to invoke when already in its target state
//!   (success with a "nothing to do" note).
//! - Failures record the operation and the step reached, then surface
//!   the driver's own error verbatim.

pub mod ops;
pub mod status;

pub use status::{ClusterReport, StatusReport};

use std::sync::Arc;

use thiserror::Error;

use crate::cluster::{ClusterError, ClusterProvisioner, KindCluster};
use crate::core::config::Config;
use crate::core::paths::EnvPaths;
use crate::core::state::Phase;
use crate::core::store::{StateStore, StoreError};
use crate::forward::{ForwardError, KubectlSpawner, PortForwards};
use crate::installer::{ChartInstaller, HelmInstaller, InstallError};
use crate::preflight::{PreflightChecker, PreflightReport, SystemPreflight};
use crate::ui::output::Verbosity;

/// Execution context for operations.
///
/// Global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Skip interactive confirmations.
    pub assume_yes: bool,
}

impl Context {
    /// Output verbosity implied by the flags.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

/// Errors from orchestrator operations.
///
/// Each class maps to a distinct exit code so calling scripts can
/// branch on what failed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Required tools or the docker daemon are missing.
    #[error("prerequisites not satisfied: {summary}")]
    Prerequisite {
        summary: String,
        report: Option<PreflightReport>,
    },

    /// A cluster operation failed.
    #[error("{operation} failed at step '{step}': {source}")]
    Cluster {
        operation: &'static str,
        step: &'static str,
        source: ClusterError,
    },

    /// A chart install/upgrade or readiness wait failed.
    #[error("{operation} failed at step '{step}': {source}")]
    Install {
        operation: &'static str,
        step: &'static str,
        source: InstallError,
    },

    /// A port-forward operation failed.
    #[error("{operation} failed at step '{step}': {source}")]
    Forward {
        operation: &'static str,
        step: &'static str,
        source: ForwardError,
    },

    /// Another invocation holds the environment lock.
    #[error("another airlocal operation is already running")]
    Concurrent,

    /// The state store failed (including a corrupt record).
    #[error(transparent)]
    State(StoreError),

    /// The operation is not allowed from the current phase.
    #[error("cannot {operation} while the environment is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: Phase,
        hint: String,
    },
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Locked => OrchestratorError::Concurrent,
            other => OrchestratorError::State(other),
        }
    }
}

impl OrchestratorError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchestratorError::Prerequisite { .. } => 2,
            OrchestratorError::Cluster { .. } => 3,
            OrchestratorError::Install { .. } => 4,
            OrchestratorError::Concurrent => 5,
            OrchestratorError::State(StoreError::Corrupt { .. }) => 6,
            OrchestratorError::Forward { .. } => 7,
            _ => 1,
        }
    }

    /// Suggested next command for the user, when there is one.
    pub fn remediation(&self) -> Option<String> {
        match self {
            OrchestratorError::Prerequisite { .. } => Some(
                "install the tools listed above, start Docker, then re-run the command".into(),
            ),
            OrchestratorError::Cluster {
                source: ClusterError::CreateFailed { .. },
                ..
            } => Some("run `airlocal destroy`, then retry `airlocal install`".into()),
            OrchestratorError::Cluster { .. } => {
                Some("check that Docker is healthy, then retry".into())
            }
            OrchestratorError::Install { .. } => Some(
                "inspect workloads with `airlocal status` and `airlocal logs`, then re-run `airlocal install`"
                    .into(),
            ),
            OrchestratorError::Forward {
                source: ForwardError::PortInUse { port, .. },
                ..
            } => Some(format!(
                "free local port {} (or stop the process holding it), then re-run the command",
                port
            )),
            OrchestratorError::Forward { .. } => {
                Some("re-run the command; tunnel startup is safe to retry".into())
            }
            OrchestratorError::Concurrent => {
                Some("wait for the other airlocal invocation to finish".into())
            }
            OrchestratorError::State(StoreError::Corrupt { .. }) => Some(
                "run `airlocal destroy` to reset the environment record (requires confirmation)"
                    .into(),
            ),
            OrchestratorError::InvalidState { hint, .. } => Some(hint.clone()),
            OrchestratorError::State(_) => None,
        }
    }
}

/// Result of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation did real work.
    Changed,
    /// The environment was already in the target state.
    NoOp { reason: String },
}

impl Outcome {
    /// Convenience constructor for the no-op case.
    pub fn noop(reason: impl Into<String>) -> Self {
        Outcome::NoOp {
            reason: reason.into(),
        }
    }
}

/// The lifecycle orchestrator.
///
/// Owns the state store and the driver seams. Construct with
/// [`Orchestrator::system`] for real tooling or [`Orchestrator::new`]
/// with mocks for tests.
pub struct Orchestrator {
    pub(crate) store: StateStore,
    pub(crate) preflight: Arc<dyn PreflightChecker>,
    pub(crate) cluster: Arc<dyn ClusterProvisioner>,
    pub(crate) installer: Arc<dyn ChartInstaller>,
    pub(crate) forwards: PortForwards,
    pub(crate) config: Config,
    pub(crate) ctx: Context,
}

impl Orchestrator {
    /// Wire up an orchestrator with explicit drivers (used by tests).
    pub fn new(
        store: StateStore,
        preflight: Arc<dyn PreflightChecker>,
        cluster: Arc<dyn ClusterProvisioner>,
        installer: Arc<dyn ChartInstaller>,
        forwards: PortForwards,
        config: Config,
        ctx: Context,
    ) -> Self {
        Self {
            store,
            preflight,
            cluster,
            installer,
            forwards,
            config,
            ctx,
        }
    }

    /// Wire up the real system drivers from configuration.
    pub fn system(config: Config, paths: EnvPaths, ctx: Context) -> Self {
        let store = StateStore::new(paths, &config.cluster.name);
        let preflight = Arc::new(SystemPreflight::new(config.probe_timeout()));
        let cluster = Arc::new(KindCluster::from_config(&config));
        let installer = Arc::new(HelmInstaller::from_config(&config));
        let spawner = Arc::new(KubectlSpawner::new(&config.forward));
        let forwards = PortForwards::new(spawner, config.forward.clone());
        Self {
            store,
            preflight,
            cluster,
            installer,
            forwards,
            config,
            ctx,
        }
    }

    /// The state store backing this orchestrator.
    pub fn store(&self) -> &StateStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let prereq = OrchestratorError::Prerequisite {
            summary: "kind is not installed".into(),
            report: None,
        };
        let cluster = OrchestratorError::Cluster {
            operation: "install",
            step: "cluster provisioning",
            source: ClusterError::CreateFailed {
                detail: "boom".into(),
            },
        };
        let install = OrchestratorError::Install {
            operation: "install",
            step: "chart deployment",
            source: InstallError::DeployFailed {
                detail: "boom".into(),
            },
        };
        let forward = OrchestratorError::Forward {
            operation: "start",
            step: "tunnel startup",
            source: ForwardError::PortInUse {
                service: "webserver".into(),
                port: 8080,
            },
        };

        let codes = [
            prereq.exit_code(),
            cluster.exit_code(),
            install.exit_code(),
            OrchestratorError::Concurrent.exit_code(),
            forward.exit_code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn locked_store_maps_to_concurrent() {
        let err: OrchestratorError = StoreError::Locked.into();
        assert!(matches!(err, OrchestratorError::Concurrent));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn corrupt_state_has_its_own_exit_code() {
        let err: OrchestratorError = StoreError::Corrupt {
            path: "/tmp/state.json".into(),
            message: "bad json".into(),
        }
        .into();
        assert_eq!(err.exit_code(), 6);
        assert!(err.remediation().expect("hint").contains("destroy"));
    }

    #[test]
    fn error_messages_name_operation_and_step() {
        let err = OrchestratorError::Cluster {
            operation: "install",
            step: "cluster provisioning",
            source: ClusterError::CreateFailed {
                detail: "kind said no".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("install"));
        assert!(msg.contains("cluster provisioning"));
        assert!(msg.contains("kind said no"));
    }

    #[test]
    fn port_in_use_remediation_names_the_port() {
        let err = OrchestratorError::Forward {
            operation: "start",
            step: "tunnel startup",
            source: ForwardError::PortInUse {
                service: "webserver".into(),
                port: 8080,
            },
        };
        assert!(err.remediation().expect("hint").contains("8080"));
    }

    #[test]
    fn context_verbosity_from_flags() {
        let ctx = Context {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(ctx.verbosity(), Verbosity::Quiet);

        let ctx = Context {
            debug: true,
            ..Default::default()
        };
        assert_eq!(ctx.verbosity(), Verbosity::Debug);
    }
}
