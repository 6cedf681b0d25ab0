//! core::state
//!
//! Persisted environment state schema.
//!
//! # Architecture
//!
//! The whole local environment (cluster, installed release, tunnels) is
//! tracked as one versioned JSON record. The record is owned by
//! [`crate::core::store::StateStore`]; the orchestrator reads it at the
//! start of every operation and writes it back after each sub-step
//! commits or fails. Decisions are always re-derived from this record,
//! never from in-memory assumptions, which is what makes operations safe
//! to re-run after a crash.
//!
//! # Validation
//!
//! Records are validated on read. The one cross-field invariant is that a
//! ready application implies a ready cluster; a record that violates it
//! was produced by a bug, not by a crash, and is rejected as corrupt.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current schema version for the state record.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from state validation.
#[derive(Debug, Error)]
pub enum StateError {
    /// The record's schema version is not supported.
    #[error("unsupported state schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// A cross-field invariant does not hold.
    #[error("invalid state record: {0}")]
    InvariantViolated(String),
}

/// Lifecycle status of the local cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    /// No cluster has been provisioned.
    Absent,
    /// Cluster creation is in flight (or was interrupted mid-flight).
    Creating,
    /// Cluster exists and its containers are running.
    Ready,
    /// Cluster exists but its containers are stopped.
    Stopped,
    /// The last cluster operation failed.
    Error,
}

/// Lifecycle status of the installed application release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// No release has been installed.
    Absent,
    /// Chart deployment is in flight (or was interrupted mid-flight).
    Installing,
    /// Release deployed and all workloads reported ready.
    Ready,
    /// The last install/upgrade failed.
    Error,
}

/// Composite phase of the whole environment.
///
/// Derived from the persisted cluster/app fields; this is the state the
/// orchestrator's transition table is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing provisioned.
    Absent,
    /// An install/start was interrupted before completing.
    Provisioning,
    /// Cluster running, app ready.
    Ready,
    /// Cluster paused, app retained.
    Stopped,
    /// A previous operation failed.
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Absent => write!(f, "absent"),
            Phase::Provisioning => write!(f, "provisioning"),
            Phase::Ready => write!(f, "ready"),
            Phase::Stopped => write!(f, "stopped"),
            Phase::Error => write!(f, "error"),
        }
    }
}

/// The persisted environment state record.
///
/// One record per user, stored at `~/.airlocal/state.json`. Created on
/// first `install`, mutated by every operation, reset to the default
/// absent record only by `destroy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Schema version, bumped on incompatible layout changes.
    pub schema_version: u32,

    /// Name of the managed Kind cluster.
    pub cluster_name: String,

    /// Cluster lifecycle status.
    pub cluster_status: ClusterState,

    /// Application release lifecycle status.
    pub app_status: AppState,

    /// Chart version recorded after the last successful deploy.
    ///
    /// `start` compares this against the configured chart to decide
    /// whether the deploy step can be skipped.
    pub installed_chart_version: Option<String>,

    /// Name of the last operation that ran (successfully or not).
    pub last_operation: Option<String>,

    /// Detail of the last failure, cleared on the next success.
    pub last_error: Option<String>,

    /// Tracked port-forward processes: service name → pid.
    ///
    /// An entry is recorded only after the tunnel process survived
    /// startup and passed one health check.
    #[serde(default)]
    pub port_forwards: BTreeMap<String, u32>,

    /// When this record was last written.
    pub updated_at: DateTime<Utc>,
}

impl EnvironmentState {
    /// The default record for an environment that has never been set up.
    pub fn absent(cluster_name: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            cluster_name: cluster_name.to_string(),
            cluster_status: ClusterState::Absent,
            app_status: AppState::Absent,
            installed_chart_version: None,
            last_operation: None,
            last_error: None,
            port_forwards: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Derive the composite environment phase.
    pub fn phase(&self) -> Phase {
        if self.cluster_status == ClusterState::Error || self.app_status == AppState::Error {
            return Phase::Error;
        }
        match (self.cluster_status, self.app_status) {
            (ClusterState::Absent, _) => Phase::Absent,
            (ClusterState::Creating, _) | (_, AppState::Installing) => Phase::Provisioning,
            (ClusterState::Ready, AppState::Ready) => Phase::Ready,
            // Cluster up but app never finished installing: a partial
            // install, treated as provisioning so install may resume.
            (ClusterState::Ready, AppState::Absent) => Phase::Provisioning,
            (ClusterState::Stopped, _) => Phase::Stopped,
            (ClusterState::Error, _) | (_, AppState::Error) => Phase::Error,
        }
    }

    /// Record a failure outcome for an operation.
    pub fn record_error(&mut self, operation: &str, detail: String) {
        self.last_operation = Some(operation.to_string());
        self.last_error = Some(detail);
        self.touch();
    }

    /// Record a successful operation, clearing any previous error.
    pub fn record_success(&mut self, operation: &str) {
        self.last_operation = Some(operation.to_string());
        self.last_error = None;
        self.touch();
    }

    /// Refresh the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Validate schema version and cross-field invariants.
    ///
    /// # Errors
    ///
    /// - [`StateError::UnsupportedVersion`] for records from a different
    ///   schema generation
    /// - [`StateError::InvariantViolated`] when `app_status = ready` but
    ///   the cluster is not ready
    pub fn validate(&self) -> Result<(), StateError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: self.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        if self.app_status == AppState::Ready && self.cluster_status != ClusterState::Ready {
            return Err(StateError::InvariantViolated(format!(
                "app_status is ready but cluster_status is {:?}",
                self.cluster_status
            )));
        }
        Ok(())
    }
}
