//! engine::status
//!
//! Read-only status reporting.
//!
//! The report is pure data; rendering belongs to the CLI layer. Every
//! probe failure degrades to an "unknown" field instead of an error:
//! `status` never fails the process, whatever state the machine is in.

use crate::cluster::ClusterStatus;
use crate::core::state::Phase;
use crate::forward::TunnelStatus;

/// What we could learn about the cluster without mutating anything.
#[derive(Debug, Clone)]
pub enum ClusterReport {
    /// The probe answered.
    Probed(ClusterStatus),
    /// The probe failed (tool missing, daemon down, timeout).
    Unknown { detail: String },
}

/// Full environment status snapshot.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Composite phase from the persisted record.
    pub phase: Phase,
    /// Managed cluster name.
    pub cluster_name: String,
    /// Live cluster probe result.
    pub cluster: ClusterReport,
    /// Chart version recorded after the last successful deploy.
    pub installed_chart_version: Option<String>,
    /// Last operation that ran.
    pub last_operation: Option<String>,
    /// Last recorded failure, if the record carries one.
    pub last_error: Option<String>,
    /// Problem reading the state record itself, if any.
    pub state_error: Option<String>,
    /// Per-service tunnel liveness.
    pub tunnels: Vec<TunnelStatus>,
}

impl StatusReport {
    /// Whether everything we could check looks healthy.
    pub fn healthy(&self) -> bool {
        self.state_error.is_none()
            && self.phase == Phase::Ready
            && matches!(self.cluster, ClusterReport::Probed(ClusterStatus::Running))
            && self.tunnels.iter().all(|t| t.alive)
    }
}
