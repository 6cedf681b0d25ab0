//! installer
//!
//! Chart deployment behind the [`ChartInstaller`] trait.
//!
//! # Design
//!
//! Install-vs-upgrade is not a decision this crate makes: the real
//! driver delegates to `helm upgrade --install`, whose reconcile
//! semantics make the deploy safe to re-run over a previous partial
//! failure. What the installer adds on top is:
//!
//! - release version discovery, so `start` can skip a deploy whose
//!   version is unchanged, and
//! - explicit workload readiness polling, so "helm returned" and "the
//!   scheduler actually came up" are not conflated. A workload that
//!   never becomes ready is a typed [`InstallError::NotReady`], not a
//!   silent success.

pub mod helm;
pub mod mock;

pub use helm::HelmInstaller;
pub use mock::MockInstaller;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::tools::exec::ExecError;

/// A deployed chart version, e.g. `1.13.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppVersion(pub String);

impl AppVersion {
    /// The version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from chart installation.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Registering or refreshing the chart repository failed.
    #[error("helm repository setup failed: {detail}")]
    RepoSetupFailed { detail: String },

    /// Creating the target namespace failed.
    #[error("namespace setup failed: {detail}")]
    NamespaceFailed { detail: String },

    /// The chart deployment itself failed.
    #[error("chart deployment failed: {detail}")]
    DeployFailed { detail: String },

    /// Querying the installed release failed.
    #[error("release query failed: {detail}")]
    ReleaseQueryFailed { detail: String },

    /// A workload never became ready within the polling budget.
    #[error("component {component} not ready after {}s", elapsed.as_secs())]
    NotReady {
        component: String,
        elapsed: Duration,
    },

    /// The underlying tool invocation failed outright.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Chart deployment driver.
#[async_trait]
pub trait ChartInstaller: Send + Sync {
    /// Version of the currently installed release, if any.
    async fn installed_version(&self) -> Result<Option<AppVersion>, InstallError>;

    /// Install or upgrade the release, returning the deployed version.
    ///
    /// Idempotent: safe to run when the release already exists and safe
    /// to re-run over a previous partial failure.
    async fn install_or_upgrade(&self) -> Result<AppVersion, InstallError>;

    /// Block until every expected workload reports ready, or fail with
    /// [`InstallError::NotReady`] naming the first component that
    /// exhausted the budget.
    async fn wait_ready(&self) -> Result<(), InstallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_version_display() {
        let v = AppVersion("1.13.1".into());
        assert_eq!(v.to_string(), "1.13.1");
        assert_eq!(v.as_str(), "1.13.1");
    }

    #[test]
    fn not_ready_names_component_and_elapsed() {
        let err = InstallError::NotReady {
            component: "scheduler".into(),
            elapsed: Duration::from_secs(600),
        };
        let msg = err.to_string();
        assert!(msg.contains("scheduler"));
        assert!(msg.contains("600"));
    }
}
