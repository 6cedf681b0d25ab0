//! installer::mock
//!
//! In-memory chart installer for deterministic testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{AppVersion, ChartInstaller, InstallError};

/// Which operation should fail, and how.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `install_or_upgrade` with the given deploy detail.
    Deploy(String),
    /// Fail `wait_ready` with `NotReady` for the named component.
    NotReady(String),
    /// Fail `installed_version` queries.
    VersionQuery(String),
}

#[derive(Debug)]
struct MockInstallerInner {
    installed: Option<AppVersion>,
    deploy_version: AppVersion,
    fail_on: Option<FailOn>,
    install_calls: usize,
    version_calls: usize,
    wait_calls: usize,
}

/// Mock chart installer.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockInstaller {
    inner: Arc<Mutex<MockInstallerInner>>,
}

impl MockInstaller {
    /// A mock with nothing installed; deploys will report `version`.
    pub fn empty(version: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInstallerInner {
                installed: None,
                deploy_version: AppVersion(version.to_string()),
                fail_on: None,
                install_calls: 0,
                version_calls: 0,
                wait_calls: 0,
            })),
        }
    }

    /// A mock that already has `version` installed.
    pub fn installed(version: &str) -> Self {
        let mock = Self::empty(version);
        mock.inner.lock().unwrap().installed = Some(AppVersion(version.to_string()));
        mock
    }

    /// Configure an operation to fail.
    pub fn fail_on(&self, fail: FailOn) {
        self.inner.lock().unwrap().fail_on = Some(fail);
    }

    /// Change what subsequent deploys report as their version.
    pub fn set_deploy_version(&self, version: &str) {
        self.inner.lock().unwrap().deploy_version = AppVersion(version.to_string());
    }

    /// Number of `install_or_upgrade` invocations.
    pub fn install_calls(&self) -> usize {
        self.inner.lock().unwrap().install_calls
    }

    /// Number of `installed_version` invocations.
    pub fn version_calls(&self) -> usize {
        self.inner.lock().unwrap().version_calls
    }

    /// Number of `wait_ready` invocations.
    pub fn wait_calls(&self) -> usize {
        self.inner.lock().unwrap().wait_calls
    }
}

#[async_trait]
impl ChartInstaller for MockInstaller {
    async fn installed_version(&self) -> Result<Option<AppVersion>, InstallError> {
        let mut inner = self.inner.lock().unwrap();
        inner.version_calls += 1;
        if let Some(FailOn::VersionQuery(detail)) = &inner.fail_on {
            return Err(InstallError::ReleaseQueryFailed {
                detail: detail.clone(),
            });
        }
        Ok(inner.installed.clone())
    }

    async fn install_or_upgrade(&self) -> Result<AppVersion, InstallError> {
        let mut inner = self.inner.lock().unwrap();
        inner.install_calls += 1;
        if let Some(FailOn::Deploy(detail)) = &inner.fail_on {
            return Err(InstallError::DeployFailed {
                detail: detail.clone(),
            });
        }
        let version = inner.deploy_version.clone();
        inner.installed = Some(version.clone());
        Ok(version)
    }

    async fn wait_ready(&self) -> Result<(), InstallError> {
        let mut inner = self.inner.lock().unwrap();
        inner.wait_calls += 1;
        if let Some(FailOn::NotReady(component)) = &inner.fail_on {
            return Err(InstallError::NotReady {
                component: component.clone(),
                elapsed: Duration::from_secs(600),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deploy_records_installed_version() {
        let installer = MockInstaller::empty("1.13.1");
        assert!(installer.installed_version().await.expect("query").is_none());

        let version = installer.install_or_upgrade().await.expect("deploy");
        assert_eq!(version.as_str(), "1.13.1");
        assert_eq!(
            installer.installed_version().await.expect("query"),
            Some(AppVersion("1.13.1".into()))
        );
        assert_eq!(installer.install_calls(), 1);
    }

    #[tokio::test]
    async fn deploy_failure_leaves_nothing_installed() {
        let installer = MockInstaller::empty("1.13.1");
        installer.fail_on(FailOn::Deploy("chart 404".into()));

        let err = installer.install_or_upgrade().await.expect_err("fails");
        assert!(matches!(err, InstallError::DeployFailed { .. }));
        // fail_on persists, so clear it before the query
        installer.inner.lock().unwrap().fail_on = None;
        assert!(installer.installed_version().await.expect("query").is_none());
    }

    #[tokio::test]
    async fn not_ready_failure_names_component() {
        let installer = MockInstaller::installed("1.13.1");
        installer.fail_on(FailOn::NotReady("worker".into()));

        let err = installer.wait_ready().await.expect_err("not ready");
        match err {
            InstallError::NotReady { component, .. } => assert_eq!(component, "worker"),
            other => panic!("expected NotReady, got {other:?}"),
        }
        assert_eq!(installer.wait_calls(), 1);
    }
}
