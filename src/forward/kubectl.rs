//! forward::kubectl
//!
//! The real tunnel spawner: detached `kubectl port-forward` processes.
//!
//! Tunnels are deliberately detached from the CLI process (`start`
//! exits and the developer keeps browsing localhost:8080), so liveness
//! and teardown go through pids and signals rather than child handles.

use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;

use super::{ForwardError, TunnelHandle, TunnelSpawner};
use crate::core::config::ForwardConfig;
use crate::core::services::ServiceDescriptor;

/// Tunnel spawner backed by `kubectl port-forward`.
#[derive(Debug, Clone)]
pub struct KubectlSpawner {
    startup_grace: Duration,
    connect_timeout: Duration,
}

impl KubectlSpawner {
    /// Build the spawner from forward settings.
    pub fn new(settings: &ForwardConfig) -> Self {
        Self {
            startup_grace: Duration::from_millis(settings.startup_grace_ms),
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// One health check: the local port accepts a TCP connection, and
    /// when the service declares a health path, an HTTP round trip
    /// through the tunnel completes.
    ///
    /// Any HTTP response counts as healthy: the check verifies the
    /// relay, not the application behind it.
    async fn health_check(&self, service: &ServiceDescriptor) -> Result<(), ForwardError> {
        let addr = format!("127.0.0.1:{}", service.local_port);
        tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ForwardError::Unhealthy {
                service: service.name.to_string(),
                detail: format!("no TCP listener on {} after startup", addr),
            })?
            .map_err(|e| ForwardError::Unhealthy {
                service: service.name.to_string(),
                detail: format!("cannot connect to {}: {}", addr, e),
            })?;

        if let Some(path) = service.health_path {
            let url = format!("{}{}", service.url(), path);
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .map_err(|e| ForwardError::Unhealthy {
                    service: service.name.to_string(),
                    detail: e.to_string(),
                })?;
            client
                .get(&url)
                .send()
                .await
                .map_err(|e| ForwardError::Unhealthy {
                    service: service.name.to_string(),
                    detail: format!("no HTTP response from {}: {}", url, e),
                })?;
        }

        Ok(())
    }
}

#[async_trait]
impl TunnelSpawner for KubectlSpawner {
    async fn spawn(&self, service: &ServiceDescriptor) -> Result<TunnelHandle, ForwardError> {
        // A bound local port means an unrelated process is in the way;
        // kubectl would just exit with a less useful message.
        if !port_free(service.local_port) {
            return Err(ForwardError::PortInUse {
                service: service.name.to_string(),
                port: service.local_port,
            });
        }

        let mapping = format!("{}:{}", service.local_port, service.remote_port);
        let mut child = Command::new("kubectl")
            .args([
                "port-forward",
                service.target,
                mapping.as_str(),
                "--namespace",
                service.namespace,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ForwardError::SpawnFailed {
                service: service.name.to_string(),
                detail: e.to_string(),
            })?;

        let pid = child.id().ok_or_else(|| ForwardError::SpawnFailed {
            service: service.name.to_string(),
            detail: "process exited before a pid could be read".to_string(),
        })?;

        // Give kubectl a moment to bind before the first health check.
        tokio::time::sleep(self.startup_grace).await;

        if let Ok(Some(status)) = child.try_wait() {
            return Err(ForwardError::SpawnFailed {
                service: service.name.to_string(),
                detail: format!("kubectl port-forward exited during startup ({})", status),
            });
        }

        if let Err(err) = self.health_check(service).await {
            self.terminate(pid);
            return Err(err);
        }

        // Forget the child handle so the tunnel outlives this process;
        // from here on it is tracked by pid.
        std::mem::forget(child);

        Ok(TunnelHandle { pid })
    }

    fn is_alive(&self, pid: u32) -> bool {
        pid_alive(pid)
    }

    fn terminate(&self, pid: u32) {
        // SIGTERM; kubectl port-forward exits promptly on it. A pid
        // that is already gone makes kill a harmless no-op. Never let a
        // bogus pid wrap negative: that would signal a process group.
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return;
        };
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
    }
}

/// Whether the local port can still be bound.
fn port_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Signal-0 liveness probe.
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_free_detects_bound_port() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let port = listener.local_addr().expect("addr").port();

        assert!(!port_free(port));
        drop(listener);
        assert!(port_free(port));
    }

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn terminate_on_dead_pid_is_harmless() {
        let spawner = KubectlSpawner::new(&ForwardConfig::default());
        // pid beyond any real pid_max, but still a valid pid_t
        spawner.terminate(999_999_999);
        assert!(!pid_alive(999_999_999));
    }

    #[test]
    fn out_of_range_pid_is_never_alive() {
        assert!(!pid_alive(u32::MAX));
    }
}
