//! cluster::kind
//!
//! The real cluster driver: Kind (Kubernetes in Docker) plus the docker
//! CLI for container-level start/stop.
//!
//! Kind has no pause concept of its own, so stop/start operate on the
//! cluster's control-plane container directly: `docker stop` preserves
//! the container and its volumes, which is what lets `start` resume
//! yesterday's environment without reinstalling anything.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::{ClusterError, ClusterHandle, ClusterProvisioner, ClusterStatus};
use crate::core::config::Config;
use crate::tools::exec::{command_line, run_capture, run_streamed};

/// Cluster driver backed by the kind and docker CLIs.
#[derive(Debug, Clone)]
pub struct KindCluster {
    name: String,
    kind_config: Option<PathBuf>,
    create_timeout: Duration,
    inspect_timeout: Duration,
    probe_timeout: Duration,
}

impl KindCluster {
    /// Build the driver from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.cluster.name.clone(),
            kind_config: config.cluster.kind_config.clone(),
            create_timeout: config.create_timeout(),
            inspect_timeout: config.inspect_timeout(),
            probe_timeout: config.probe_timeout(),
        }
    }

    /// Name of the control-plane container kind creates.
    fn container_name(&self) -> String {
        format!("{}-control-plane", self.name)
    }

    /// Does a cluster with the managed name exist?
    async fn exists(&self) -> Result<bool, ClusterError> {
        let out = run_capture("kind", &["get", "clusters"], self.inspect_timeout).await?;
        // `kind get clusters` exits zero with "No kind clusters found."
        // on stderr when there are none.
        Ok(cluster_listed(&out.stdout, &self.name))
    }

    /// Is the control-plane container actually running?
    async fn running(&self) -> Result<bool, ClusterError> {
        let container = self.container_name();
        let out = run_capture(
            "docker",
            &["inspect", "--format", "{{.State.Running}}", &container],
            self.inspect_timeout,
        )
        .await?;
        // A missing container exits nonzero; that's "not running", not
        // an error.
        Ok(out.success() && out.stdout.trim() == "true")
    }

    /// Point kubectl and helm at the local cluster.
    async fn export_kubeconfig(&self) -> Result<(), ClusterError> {
        let out = run_capture(
            "kind",
            &["export", "kubeconfig", "--name", &self.name],
            self.probe_timeout,
        )
        .await?;
        if !out.success() {
            return Err(ClusterError::KubeconfigFailed {
                detail: out.diagnostic(),
            });
        }
        Ok(())
    }

    async fn create(&self) -> Result<(), ClusterError> {
        let config_arg = self
            .kind_config
            .as_ref()
            .map(|p| p.display().to_string());

        let mut args: Vec<&str> = vec!["create", "cluster", "--name", &self.name];
        if let Some(config) = config_arg.as_deref() {
            args.push("--config");
            args.push(config);
        }

        // Streamed: creation takes on the order of a minute and kind's
        // own progress output is the best feedback we can give.
        let out = run_streamed("kind", &args, self.create_timeout).await?;
        if !out.success() {
            return Err(ClusterError::CreateFailed {
                detail: format!(
                    "`{}` exited with code {} (diagnostics above); run `airlocal destroy` before retrying",
                    command_line("kind", &args),
                    out.exit_code.unwrap_or(-1)
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterProvisioner for KindCluster {
    fn name(&self) -> &str {
        &self.name
    }

    async fn inspect(&self) -> Result<ClusterStatus, ClusterError> {
        if !self.exists().await? {
            return Ok(ClusterStatus::Absent);
        }
        if self.running().await? {
            Ok(ClusterStatus::Running)
        } else {
            Ok(ClusterStatus::Stopped)
        }
    }

    async fn ensure_running(&self) -> Result<ClusterHandle, ClusterError> {
        let mut created = false;

        if !self.exists().await? {
            self.create().await?;
            created = true;
        } else if !self.running().await? {
            let container = self.container_name();
            let out = run_capture("docker", &["start", &container], self.create_timeout).await?;
            if !out.success() {
                return Err(ClusterError::StartFailed {
                    detail: out.diagnostic(),
                });
            }
        }

        self.export_kubeconfig().await?;

        Ok(ClusterHandle {
            name: self.name.clone(),
            created,
        })
    }

    async fn stop(&self) -> Result<(), ClusterError> {
        if !self.exists().await? {
            return Ok(());
        }
        let container = self.container_name();
        let out = run_capture("docker", &["stop", &container], self.create_timeout).await?;
        // Stopping an already-stopped container exits zero; anything
        // else is a real failure.
        if !out.success() {
            return Err(ClusterError::StopFailed {
                detail: out.diagnostic(),
            });
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ClusterError> {
        if !self.exists().await? {
            return Ok(());
        }
        let out = run_capture(
            "kind",
            &["delete", "cluster", "--name", &self.name],
            self.create_timeout,
        )
        .await?;
        if !out.success() && !not_found(&out.stderr) {
            return Err(ClusterError::DestroyFailed {
                detail: out.diagnostic(),
            });
        }
        Ok(())
    }
}

/// Whether `kind get clusters` output lists the given cluster.
fn cluster_listed(stdout: &str, name: &str) -> bool {
    stdout.lines().any(|line| line.trim() == name)
}

/// Whether a kind delete failure just means the cluster was gone.
fn not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("not found") || lower.contains("no kind clusters")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> KindCluster {
        KindCluster::from_config(&Config::default())
    }

    #[test]
    fn container_name_follows_kind_convention() {
        assert_eq!(driver().container_name(), "cdp-local-control-plane");
    }

    #[test]
    fn cluster_listed_matches_exact_lines() {
        let stdout = "other\ncdp-local\n";
        assert!(cluster_listed(stdout, "cdp-local"));
        assert!(!cluster_listed(stdout, "cdp"));
        assert!(!cluster_listed("cdp-local-two\n", "cdp-local"));
        assert!(!cluster_listed("", "cdp-local"));
    }

    #[test]
    fn not_found_detection() {
        assert!(not_found("ERROR: cluster \"cdp-local\" not found"));
        assert!(not_found("No kind clusters found."));
        assert!(!not_found("permission denied"));
    }

    #[test]
    fn from_config_picks_up_name_and_timeouts() {
        let mut config = Config::default();
        config.cluster.name = "scratch".into();
        config.timeouts.create_secs = 30;
        let driver = KindCluster::from_config(&config);
        assert_eq!(driver.name(), "scratch");
        assert_eq!(driver.create_timeout, Duration::from_secs(30));
    }
}
