//! installer::helm
//!
//! The real chart installer: helm for deployment, kubectl for namespace
//! setup and workload readiness probes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::{AppVersion, ChartInstaller, InstallError};
use crate::core::config::{ChartConfig, Config};
use crate::core::services::READINESS_COMPONENTS;
use crate::tools::exec::{command_line, run_capture, run_streamed};

/// Chart installer backed by the helm and kubectl CLIs.
#[derive(Debug, Clone)]
pub struct HelmInstaller {
    chart: ChartConfig,
    probe_timeout: Duration,
    deploy_timeout: Duration,
    readiness_timeout: Duration,
    poll_interval: Duration,
}

impl HelmInstaller {
    /// Build the installer from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chart: config.chart.clone(),
            probe_timeout: config.probe_timeout(),
            deploy_timeout: config.deploy_timeout(),
            readiness_timeout: config.readiness_timeout(),
            poll_interval: Duration::from_secs(config.forward.health_check_interval_secs),
        }
    }

    /// Register the chart repository and refresh the index. Idempotent:
    /// `--force-update` makes re-adding an existing repo a no-op.
    async fn add_repos(&self) -> Result<(), InstallError> {
        let out = run_capture(
            "helm",
            &[
                "repo",
                "add",
                &self.chart.repo_name,
                &self.chart.repo_url,
                "--force-update",
            ],
            self.probe_timeout,
        )
        .await?;
        if !out.success() {
            return Err(InstallError::RepoSetupFailed {
                detail: out.diagnostic(),
            });
        }

        let out = run_capture("helm", &["repo", "update"], self.deploy_timeout).await?;
        if !out.success() {
            return Err(InstallError::RepoSetupFailed {
                detail: out.diagnostic(),
            });
        }
        Ok(())
    }

    /// Create the target namespace if it does not already exist.
    async fn ensure_namespace(&self) -> Result<(), InstallError> {
        let ns = self.chart.namespace.as_str();
        let out = run_capture("kubectl", &["get", "namespace", ns], self.probe_timeout).await?;
        if out.success() {
            return Ok(());
        }

        let out = run_capture("kubectl", &["create", "namespace", ns], self.probe_timeout).await?;
        if !out.success() {
            return Err(InstallError::NamespaceFailed {
                detail: out.diagnostic(),
            });
        }
        Ok(())
    }

    /// Poll one component's pods until every container reports ready.
    async fn wait_component(&self, component: &str, deadline: Instant) -> Result<(), InstallError> {
        let selector = format!("component={}", component);
        let started = Instant::now();

        loop {
            let out = run_capture(
                "kubectl",
                &[
                    "get",
                    "pods",
                    "--namespace",
                    &self.chart.namespace,
                    "--selector",
                    &selector,
                    "--output",
                    "jsonpath={.items[*].status.containerStatuses[*].ready}",
                ],
                self.probe_timeout,
            )
            .await?;

            if out.success() && pods_ready(&out.stdout) {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(InstallError::NotReady {
                    component: component.to_string(),
                    elapsed: started.elapsed(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ChartInstaller for HelmInstaller {
    async fn installed_version(&self) -> Result<Option<AppVersion>, InstallError> {
        let filter = format!("^{}$", self.chart.release);
        let out = run_capture(
            "helm",
            &[
                "list",
                "--namespace",
                &self.chart.namespace,
                "--filter",
                &filter,
                "--output",
                "json",
            ],
            self.probe_timeout,
        )
        .await?;
        if !out.success() {
            return Err(InstallError::ReleaseQueryFailed {
                detail: out.diagnostic(),
            });
        }
        Ok(parse_release_version(&out.stdout, &self.chart.release).map(AppVersion))
    }

    async fn install_or_upgrade(&self) -> Result<AppVersion, InstallError> {
        self.add_repos().await?;
        self.ensure_namespace().await?;

        let helm_timeout = format!("{}s", self.deploy_timeout.as_secs());
        let values_arg = self
            .chart
            .values_file
            .as_ref()
            .map(|p| p.display().to_string());

        let mut args: Vec<&str> = vec![
            "upgrade",
            "--install",
            &self.chart.release,
            &self.chart.chart,
            "--namespace",
            &self.chart.namespace,
            "--timeout",
            &helm_timeout,
            "--wait",
        ];
        if let Some(version) = self.chart.version.as_deref() {
            args.push("--version");
            args.push(version);
        }
        if let Some(values) = values_arg.as_deref() {
            args.push("--values");
            args.push(values);
        }

        // Streamed: first deploys pull images for minutes and helm's
        // progress output is the only feedback. Our timeout sits above
        // helm's own --wait budget so helm fails first with a better
        // message.
        let out = run_streamed("helm", &args, self.deploy_timeout + Duration::from_secs(60)).await?;
        if !out.success() {
            return Err(InstallError::DeployFailed {
                detail: format!(
                    "`{}` exited with code {} (diagnostics above)",
                    command_line("helm", &args),
                    out.exit_code.unwrap_or(-1)
                ),
            });
        }

        self.installed_version()
            .await?
            .ok_or_else(|| InstallError::ReleaseQueryFailed {
                detail: format!(
                    "release {} not listed after a successful deploy",
                    self.chart.release
                ),
            })
    }

    async fn wait_ready(&self) -> Result<(), InstallError> {
        let deadline = Instant::now() + self.readiness_timeout;
        for component in READINESS_COMPONENTS {
            self.wait_component(component, deadline).await?;
        }
        Ok(())
    }
}

/// Whether a jsonpath readiness dump means "all containers ready".
///
/// The output is space-separated `true`/`false` tokens, one per
/// container; empty output means no pods are scheduled yet.
fn pods_ready(jsonpath_output: &str) -> bool {
    let mut tokens = jsonpath_output.split_whitespace().peekable();
    tokens.peek().is_some() && tokens.all(|t| t == "true")
}

/// Extract the chart version of `release` from `helm list -o json`.
///
/// The `chart` field is `<chartname>-<version>`; the version is what
/// follows the last `-`.
fn parse_release_version(json: &str, release: &str) -> Option<String> {
    let releases: Vec<Value> = serde_json::from_str(json).ok()?;
    let entry = releases
        .iter()
        .find(|r| r.get("name").and_then(Value::as_str) == Some(release))?;
    let chart = entry.get("chart")?.as_str()?;
    let (_, version) = chart.rsplit_once('-')?;
    Some(version.to_string())
}
