//! cluster::mock
//!
//! In-memory cluster driver for deterministic testing.
//!
//! # Design
//!
//! Holds the simulated cluster status behind an `Arc<Mutex<...>>` so
//! clones share state, records every call for idempotence assertions,
//! and supports configurable failures: including a transient destroy
//! failure for exercising the orchestrator's single bounded retry.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ClusterError, ClusterHandle, ClusterProvisioner, ClusterStatus};

/// Which operation should fail, and how.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `ensure_running` with the given creation detail.
    EnsureRunning(String),
    /// Fail `stop`.
    Stop(String),
    /// Fail `destroy` every time.
    Destroy(String),
    /// Fail `inspect`.
    Inspect(String),
}

#[derive(Debug)]
struct MockClusterInner {
    status: ClusterStatus,
    fail_on: Option<FailOn>,
    /// Number of times destroy should fail before succeeding.
    transient_destroy_failures: u32,
    create_calls: usize,
    ensure_calls: usize,
    stop_calls: usize,
    destroy_calls: usize,
    inspect_calls: usize,
}

/// Mock cluster driver.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
///
/// # Example
///
/// ```
/// use airlocal::cluster::{ClusterProvisioner, MockCluster};
///
/// # tokio_test::block_on(async {
/// let cluster = MockCluster::absent("demo");
///
/// let handle = cluster.ensure_running().await.unwrap();
/// assert!(handle.created);
///
/// // Calling again is a no-op: nothing gets created twice.
/// let handle = cluster.ensure_running().await.unwrap();
/// assert!(!handle.created);
/// assert_eq!(cluster.create_calls(), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockCluster {
    name: String,
    inner: Arc<Mutex<MockClusterInner>>,
}

impl MockCluster {
    /// A mock with no cluster provisioned.
    pub fn absent(name: &str) -> Self {
        Self::with_status(name, ClusterStatus::Absent)
    }

    /// A mock whose cluster exists and is running.
    pub fn running(name: &str) -> Self {
        Self::with_status(name, ClusterStatus::Running)
    }

    /// A mock whose cluster exists but is stopped.
    pub fn stopped(name: &str) -> Self {
        Self::with_status(name, ClusterStatus::Stopped)
    }

    fn with_status(name: &str, status: ClusterStatus) -> Self {
        Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(MockClusterInner {
                status,
                fail_on: None,
                transient_destroy_failures: 0,
                create_calls: 0,
                ensure_calls: 0,
                stop_calls: 0,
                destroy_calls: 0,
                inspect_calls: 0,
            })),
        }
    }

    /// Configure an operation to fail.
    pub fn fail_on(&self, fail: FailOn) {
        self.inner.lock().unwrap().fail_on = Some(fail);
    }

    /// Clear a configured failure.
    pub fn fail_on_clear(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Make the next `count` destroy calls fail, then succeed.
    pub fn fail_destroy_transiently(&self, count: u32) {
        self.inner.lock().unwrap().transient_destroy_failures = count;
    }

    /// Number of times a cluster was actually created.
    pub fn create_calls(&self) -> usize {
        self.inner.lock().unwrap().create_calls
    }

    /// Number of `ensure_running` invocations.
    pub fn ensure_calls(&self) -> usize {
        self.inner.lock().unwrap().ensure_calls
    }

    /// Number of `stop` invocations.
    pub fn stop_calls(&self) -> usize {
        self.inner.lock().unwrap().stop_calls
    }

    /// Number of `destroy` invocations.
    pub fn destroy_calls(&self) -> usize {
        self.inner.lock().unwrap().destroy_calls
    }

    /// Number of `inspect` invocations.
    pub fn inspect_calls(&self) -> usize {
        self.inner.lock().unwrap().inspect_calls
    }

    /// The simulated status right now.
    pub fn status(&self) -> ClusterStatus {
        self.inner.lock().unwrap().status
    }
}

#[async_trait]
impl ClusterProvisioner for MockCluster {
    fn name(&self) -> &str {
        &self.name
    }

    async fn inspect(&self) -> Result<ClusterStatus, ClusterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.inspect_calls += 1;
        if let Some(FailOn::Inspect(detail)) = &inner.fail_on {
            return Err(ClusterError::Exec(crate::tools::exec::ExecError::Io {
                command: "mock inspect".into(),
                source: std::io::Error::other(detail.clone()),
            }));
        }
        Ok(inner.status)
    }

    async fn ensure_running(&self) -> Result<ClusterHandle, ClusterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_calls += 1;
        if let Some(FailOn::EnsureRunning(detail)) = &inner.fail_on {
            let detail = detail.clone();
            inner.status = ClusterStatus::Absent;
            return Err(ClusterError::CreateFailed { detail });
        }
        let created = match inner.status {
            ClusterStatus::Absent => {
                inner.create_calls += 1;
                inner.status = ClusterStatus::Running;
                true
            }
            ClusterStatus::Stopped => {
                inner.status = ClusterStatus::Running;
                false
            }
            ClusterStatus::Running => false,
        };
        Ok(ClusterHandle {
            name: self.name.clone(),
            created,
        })
    }

    async fn stop(&self) -> Result<(), ClusterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.stop_calls += 1;
        if let Some(FailOn::Stop(detail)) = &inner.fail_on {
            return Err(ClusterError::StopFailed {
                detail: detail.clone(),
            });
        }
        if inner.status == ClusterStatus::Running {
            inner.status = ClusterStatus::Stopped;
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ClusterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.destroy_calls += 1;
        if let Some(FailOn::Destroy(detail)) = &inner.fail_on {
            return Err(ClusterError::DestroyFailed {
                detail: detail.clone(),
            });
        }
        if inner.transient_destroy_failures > 0 {
            inner.transient_destroy_failures -= 1;
            return Err(ClusterError::DestroyFailed {
                detail: "transient mock failure".into(),
            });
        }
        inner.status = ClusterStatus::Absent;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_running_creates_once() {
        let cluster = MockCluster::absent("test");

        let handle = cluster.ensure_running().await.expect("first ensure");
        assert!(handle.created);

        let handle = cluster.ensure_running().await.expect("second ensure");
        assert!(!handle.created);

        assert_eq!(cluster.create_calls(), 1);
        assert_eq!(cluster.ensure_calls(), 2);
    }

    #[tokio::test]
    async fn ensure_running_starts_stopped_cluster_without_creating() {
        let cluster = MockCluster::stopped("test");

        let handle = cluster.ensure_running().await.expect("ensure");
        assert!(!handle.created);
        assert_eq!(cluster.create_calls(), 0);
        assert_eq!(cluster.status(), ClusterStatus::Running);
    }

    #[tokio::test]
    async fn stop_is_noop_when_not_running() {
        let cluster = MockCluster::absent("test");
        cluster.stop().await.expect("stop absent");
        assert_eq!(cluster.status(), ClusterStatus::Absent);

        let cluster = MockCluster::stopped("test");
        cluster.stop().await.expect("stop stopped");
        assert_eq!(cluster.status(), ClusterStatus::Stopped);
    }

    #[tokio::test]
    async fn destroy_tolerates_absent() {
        let cluster = MockCluster::absent("test");
        cluster.destroy().await.expect("destroy absent");
        assert_eq!(cluster.destroy_calls(), 1);
    }

    #[tokio::test]
    async fn transient_destroy_failure_then_success() {
        let cluster = MockCluster::running("test");
        cluster.fail_destroy_transiently(1);

        cluster.destroy().await.expect_err("first destroy fails");
        cluster.destroy().await.expect("second destroy succeeds");
        assert_eq!(cluster.status(), ClusterStatus::Absent);
        assert_eq!(cluster.destroy_calls(), 2);
    }

    #[tokio::test]
    async fn configured_failure_surfaces() {
        let cluster = MockCluster::absent("test");
        cluster.fail_on(FailOn::EnsureRunning("no docker".into()));

        let err = cluster.ensure_running().await.expect_err("fails");
        assert!(matches!(err, ClusterError::CreateFailed { .. }));
        assert!(err.to_string().contains("no docker"));
    }

    #[tokio::test]
    async fn inspect_counts_calls() {
        let cluster = MockCluster::running("test");
        let status = cluster.inspect().await.expect("inspect");
        assert_eq!(status, ClusterStatus::Running);
        assert_eq!(cluster.inspect_calls(), 1);
    }
}
