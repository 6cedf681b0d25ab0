//! forward::mock
//!
//! In-memory tunnel spawner for deterministic testing.
//!
//! Simulated tunnels are just pids in a liveness set; tests kill them
//! with [`MockSpawner::kill_pid`] to trigger supervisor restarts.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ForwardError, TunnelHandle, TunnelSpawner};
use crate::core::services::ServiceDescriptor;

/// Which spawn failure to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Every spawn fails with `PortInUse` for the service's port.
    PortInUse,
    /// Every spawn fails with `SpawnFailed`.
    Spawn,
    /// Every spawn fails with `Unhealthy`.
    Unhealthy,
}

#[derive(Debug)]
struct MockSpawnerInner {
    next_pid: u32,
    alive: HashSet<u32>,
    fail_on: Option<FailOn>,
    /// Number of upcoming spawns that fail before behavior reverts.
    transient_failures: u32,
    spawn_calls: usize,
    terminate_calls: usize,
}

/// Mock tunnel spawner.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockSpawner {
    inner: Arc<Mutex<MockSpawnerInner>>,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// A spawner where every spawn succeeds.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockSpawnerInner {
                next_pid: 40_000,
                alive: HashSet::new(),
                fail_on: None,
                transient_failures: 0,
                spawn_calls: 0,
                terminate_calls: 0,
            })),
        }
    }

    /// Make every subsequent spawn fail the given way.
    pub fn fail_on(&self, fail: FailOn) {
        self.inner.lock().unwrap().fail_on = Some(fail);
    }

    /// Clear a configured failure.
    pub fn clear_failure(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Make the next `count` spawns fail with `SpawnFailed`, then
    /// succeed again. Used to exercise restart backoff.
    pub fn fail_spawns_transiently(&self, count: u32) {
        self.inner.lock().unwrap().transient_failures = count;
    }

    /// Simulate the tunnel process dying.
    pub fn kill_pid(&self, pid: u32) {
        self.inner.lock().unwrap().alive.remove(&pid);
    }

    /// Number of spawn attempts (including failed ones).
    pub fn spawn_calls(&self) -> usize {
        self.inner.lock().unwrap().spawn_calls
    }

    /// Number of terminate calls.
    pub fn terminate_calls(&self) -> usize {
        self.inner.lock().unwrap().terminate_calls
    }

    /// Pids currently alive.
    pub fn live_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.inner.lock().unwrap().alive.iter().copied().collect();
        pids.sort_unstable();
        pids
    }
}

#[async_trait]
impl TunnelSpawner for MockSpawner {
    async fn spawn(&self, service: &ServiceDescriptor) -> Result<TunnelHandle, ForwardError> {
        let mut inner = self.inner.lock().unwrap();
        inner.spawn_calls += 1;

        if inner.transient_failures > 0 {
            inner.transient_failures -= 1;
            return Err(ForwardError::SpawnFailed {
                service: service.name.to_string(),
                detail: "transient mock failure".into(),
            });
        }

        match inner.fail_on {
            Some(FailOn::PortInUse) => {
                return Err(ForwardError::PortInUse {
                    service: service.name.to_string(),
                    port: service.local_port,
                })
            }
            Some(FailOn::Spawn) => {
                return Err(ForwardError::SpawnFailed {
                    service: service.name.to_string(),
                    detail: "mock spawn failure".into(),
                })
            }
            Some(FailOn::Unhealthy) => {
                return Err(ForwardError::Unhealthy {
                    service: service.name.to_string(),
                    detail: "mock health failure".into(),
                })
            }
            None => {}
        }

        let pid = inner.next_pid;
        inner.next_pid += 1;
        inner.alive.insert(pid);
        Ok(TunnelHandle { pid })
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.inner.lock().unwrap().alive.contains(&pid)
    }

    fn terminate(&self, pid: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.terminate_calls += 1;
        inner.alive.remove(&pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::FORWARDED_SERVICES;

    fn webserver() -> &'static ServiceDescriptor {
        &FORWARDED_SERVICES[0]
    }

    #[tokio::test]
    async fn spawn_yields_distinct_live_pids() {
        let spawner = MockSpawner::new();
        let a = spawner.spawn(webserver()).await.expect("spawn a");
        let b = spawner.spawn(webserver()).await.expect("spawn b");
        assert_ne!(a.pid, b.pid);
        assert!(spawner.is_alive(a.pid));
        assert!(spawner.is_alive(b.pid));
    }

    #[tokio::test]
    async fn kill_and_terminate_remove_liveness() {
        let spawner = MockSpawner::new();
        let handle = spawner.spawn(webserver()).await.expect("spawn");

        spawner.kill_pid(handle.pid);
        assert!(!spawner.is_alive(handle.pid));

        let handle = spawner.spawn(webserver()).await.expect("spawn");
        spawner.terminate(handle.pid);
        assert!(!spawner.is_alive(handle.pid));
        assert_eq!(spawner.terminate_calls(), 1);
    }

    #[tokio::test]
    async fn transient_failures_then_recovery() {
        let spawner = MockSpawner::new();
        spawner.fail_spawns_transiently(2);

        spawner.spawn(webserver()).await.expect_err("first fails");
        spawner.spawn(webserver()).await.expect_err("second fails");
        spawner.spawn(webserver()).await.expect("third succeeds");
        assert_eq!(spawner.spawn_calls(), 3);
    }
}
