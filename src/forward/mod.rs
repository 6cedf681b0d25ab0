//! forward
//!
//! Local port-forward tunnels to in-cluster services.
//!
//! # Architecture
//!
//! Three layers:
//! - [`TunnelSpawner`]: spawning, liveness and teardown of a single
//!   tunnel process. Real implementation wraps `kubectl port-forward`
//!   ([`kubectl::KubectlSpawner`]); [`mock::MockSpawner`] simulates it.
//! - [`PortForwards`]: the foreground operations `start_all` /
//!   `stop_all` / `statuses`, which read and write the pid map in the
//!   persisted environment state.
//! - [`supervisor`]: the background watch loop that keeps tunnels
//!   alive for the lifetime of a `start --watch` session.
//!
//! # Tunnel state machine
//!
//! Per service: `Down → Starting → Up`, back to `Down` on unexpected
//! exit, then `Starting` again under capped exponential backoff. A
//! tunnel that cannot be revived degrades that one service, never the
//! whole environment.
//!
//! # Recording rule
//!
//! A pid is recorded in state only after the process survived startup
//! and one health check passed. `stop_all` clears entries even when the
//! process was already gone.

pub mod kubectl;
pub mod mock;
pub mod supervisor;

pub use kubectl::KubectlSpawner;
pub use mock::MockSpawner;
pub use supervisor::{SupervisorHandle, TunnelEvent};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::ForwardConfig;
use crate::core::services::{ServiceDescriptor, FORWARDED_SERVICES};
use crate::core::state::EnvironmentState;

/// Errors from tunnel operations.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The local port is held by an unrelated process. Not retried:
    /// the user has to free the port or change the mapping.
    #[error("local port {port} for {service} is already in use by another process")]
    PortInUse { service: String, port: u16 },

    /// The tunnel process could not be started or died during startup.
    #[error("failed to start tunnel for {service}: {detail}")]
    SpawnFailed { service: String, detail: String },

    /// The tunnel started but never answered a health check.
    #[error("tunnel for {service} failed its health check: {detail}")]
    Unhealthy { service: String, detail: String },
}

/// Handle to a spawned tunnel process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelHandle {
    /// OS process id of the tunnel.
    pub pid: u32,
}

/// Spawning and lifecycle of individual tunnel processes.
#[async_trait]
pub trait TunnelSpawner: Send + Sync {
    /// Start a tunnel for the service and verify it came up: the
    /// process must survive startup and pass one health check.
    ///
    /// # Errors
    ///
    /// - [`ForwardError::PortInUse`] when the local port is taken
    /// - [`ForwardError::SpawnFailed`] when the process dies at startup
    /// - [`ForwardError::Unhealthy`] when the health check fails
    async fn spawn(&self, service: &ServiceDescriptor) -> Result<TunnelHandle, ForwardError>;

    /// Whether the tunnel process is still alive.
    fn is_alive(&self, pid: u32) -> bool;

    /// Terminate a tunnel process. Best-effort; a pid that is already
    /// gone is fine.
    fn terminate(&self, pid: u32);
}

/// Outcome of starting one service's tunnel.
#[derive(Debug, Clone)]
pub struct StartedTunnel {
    /// Logical service name.
    pub service: String,
    /// Local URL the tunnel exposes.
    pub url: String,
    /// Tunnel process id.
    pub pid: u32,
    /// True when an already-live tunnel was kept instead of spawning.
    pub reused: bool,
}

/// Outcome of stopping one tracked tunnel.
#[derive(Debug, Clone)]
pub struct StoppedTunnel {
    /// Logical service name.
    pub service: String,
    /// Whether the process was still alive when terminated.
    pub was_alive: bool,
}

/// Liveness of one service's tunnel, for `status`.
#[derive(Debug, Clone)]
pub struct TunnelStatus {
    /// Logical service name.
    pub service: String,
    /// Local URL the tunnel would expose.
    pub url: String,
    /// Recorded pid, if any.
    pub pid: Option<u32>,
    /// Whether that pid is alive right now.
    pub alive: bool,
}

/// Foreground tunnel management over the persisted pid map.
#[derive(Clone)]
pub struct PortForwards {
    spawner: Arc<dyn TunnelSpawner>,
    services: Vec<ServiceDescriptor>,
    settings: ForwardConfig,
}

impl PortForwards {
    /// Manage the default forwarded services with the given spawner.
    pub fn new(spawner: Arc<dyn TunnelSpawner>, settings: ForwardConfig) -> Self {
        Self {
            spawner,
            services: FORWARDED_SERVICES.to_vec(),
            settings,
        }
    }

    /// The managed service descriptors.
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// Ensure a live tunnel per service, recording pids in `state`.
    ///
    /// Services whose recorded pid is still alive are left untouched.
    /// Fails on the first service that cannot come up; tunnels already
    /// started (and recorded) stay running.
    pub async fn start_all(
        &self,
        state: &mut EnvironmentState,
    ) -> Result<Vec<StartedTunnel>, ForwardError> {
        let mut started = Vec::with_capacity(self.services.len());

        for service in &self.services {
            if let Some(&pid) = state.port_forwards.get(service.name) {
                if self.spawner.is_alive(pid) {
                    started.push(StartedTunnel {
                        service: service.name.to_string(),
                        url: service.url(),
                        pid,
                        reused: true,
                    });
                    continue;
                }
                // Stale entry from a dead tunnel; replace it.
                state.port_forwards.remove(service.name);
            }

            let handle = self.spawner.spawn(service).await?;
            state
                .port_forwards
                .insert(service.name.to_string(), handle.pid);
            started.push(StartedTunnel {
                service: service.name.to_string(),
                url: service.url(),
                pid: handle.pid,
                reused: false,
            });
        }

        Ok(started)
    }

    /// Terminate every tracked tunnel and clear the pid map.
    ///
    /// Best-effort by design: a tunnel that is already gone is not an
    /// error, and one failed teardown never blocks the rest.
    pub fn stop_all(&self, state: &mut EnvironmentState) -> Vec<StoppedTunnel> {
        let entries: Vec<(String, u32)> = state
            .port_forwards
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        state.port_forwards.clear();

        entries
            .into_iter()
            .map(|(service, pid)| {
                let was_alive = self.spawner.is_alive(pid);
                if was_alive {
                    self.spawner.terminate(pid);
                }
                StoppedTunnel { service, was_alive }
            })
            .collect()
    }

    /// Report liveness of every service's tunnel. Read-only.
    pub fn statuses(&self, state: &EnvironmentState) -> Vec<TunnelStatus> {
        self.services
            .iter()
            .map(|service| {
                let pid = state.port_forwards.get(service.name).copied();
                TunnelStatus {
                    service: service.name.to_string(),
                    url: service.url(),
                    pid,
                    alive: pid.is_some_and(|p| self.spawner.is_alive(p)),
                }
            })
            .collect()
    }

    /// Start the background supervision loop over the current tunnels.
    ///
    /// See [`supervisor`] for the loop's contract.
    pub fn supervise(&self, state: &EnvironmentState) -> SupervisorHandle {
        supervisor::spawn(
            Arc::clone(&self.spawner),
            self.services.clone(),
            state.port_forwards.clone(),
            self.settings.clone(),
        )
    }
}
