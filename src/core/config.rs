//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! airlocal works with zero configuration: every value has a default that
//! matches the stock local environment (cluster `cdp-local`, the Apache
//! Airflow chart, web UI on localhost:8080). An optional
//! `~/.airlocal/config.toml` overrides any of them.
//!
//! Timing knobs (helm/kind timeouts, readiness polling, tunnel restart
//! backoff) are deliberately configuration rather than constants: the
//! right values depend on the machine and the chart, not on this tool.
//!
//! # Example
//!
//! ```toml
//! [cluster]
//! name = "cdp-local"
//!
//! [chart]
//! version = "1.13.1"
//! values_file = "/home/dev/airflow-values.yaml"
//!
//! [forward]
//! backoff_ceiling_secs = 60
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::EnvPaths;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Cluster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// Name of the Kind cluster (also prefixes its docker container).
    pub name: String,

    /// Optional Kind config file passed to `kind create cluster`.
    pub kind_config: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "cdp-local".to_string(),
            kind_config: None,
        }
    }
}

/// Chart deployment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    /// Helm repository name to register.
    pub repo_name: String,

    /// Helm repository URL.
    pub repo_url: String,

    /// Chart reference (`repo/chart`).
    pub chart: String,

    /// Release name inside the cluster.
    pub release: String,

    /// Kubernetes namespace for the release.
    pub namespace: String,

    /// Optional chart version pin. Unpinned deploys follow the repo's
    /// latest; the deployed version is recorded in state either way.
    pub version: Option<String>,

    /// Optional values file passed to helm.
    pub values_file: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            repo_name: "apache-airflow".to_string(),
            repo_url: "https://airflow.apache.org".to_string(),
            chart: "apache-airflow/airflow".to_string(),
            release: "airflow".to_string(),
            namespace: "airflow".to_string(),
            version: None,
            values_file: None,
        }
    }
}

/// Timeout bounds for external tool invocations, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Cluster creation (`kind create cluster`).
    pub create_secs: u64,

    /// Chart deployment (`helm upgrade --install --wait`).
    pub deploy_secs: u64,

    /// Total budget for workload readiness polling, per component.
    pub readiness_secs: u64,

    /// Short probes: version queries, namespace checks, helm list.
    pub probe_secs: u64,

    /// Read-only cluster inspection probes.
    pub inspect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            create_secs: 600,
            deploy_secs: 600,
            readiness_secs: 600,
            probe_secs: 10,
            inspect_secs: 5,
        }
    }
}

/// Port-forward supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwardConfig {
    /// How often the supervisor polls tunnel liveness, in seconds.
    pub health_check_interval_secs: u64,

    /// First restart delay after a tunnel dies, in seconds.
    pub backoff_base_secs: u64,

    /// Restart delay ceiling, in seconds.
    pub backoff_ceiling_secs: u64,

    /// How long a freshly spawned tunnel gets to bind its port, in
    /// milliseconds, before the first health check.
    pub startup_grace_ms: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 5,
            backoff_base_secs: 1,
            backoff_ceiling_secs: 30,
            startup_grace_ms: 1000,
        }
    }
}

/// Merged airlocal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub chart: ChartConfig,
    pub timeouts: TimeoutConfig,
    pub forward: ForwardConfig,
}

impl Config {
    /// Load configuration from the standard location.
    ///
    /// A missing file is not an error: defaults are used. A file that
    /// exists but does not parse or validate is an error: silently
    /// ignoring a config the user wrote would be worse than failing.
    pub fn load(paths: &EnvPaths) -> Result<Self, ConfigError> {
        let path = paths.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "cluster.name must not be empty".into(),
            ));
        }
        if self.chart.release.trim().is_empty() || self.chart.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "chart.release and chart.namespace must not be empty".into(),
            ));
        }
        for (name, value) in [
            ("timeouts.create_secs", self.timeouts.create_secs),
            ("timeouts.deploy_secs", self.timeouts.deploy_secs),
            ("timeouts.readiness_secs", self.timeouts.readiness_secs),
            ("timeouts.probe_secs", self.timeouts.probe_secs),
            ("timeouts.inspect_secs", self.timeouts.inspect_secs),
            (
                "forward.health_check_interval_secs",
                self.forward.health_check_interval_secs,
            ),
            ("forward.backoff_base_secs", self.forward.backoff_base_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if self.forward.backoff_ceiling_secs < self.forward.backoff_base_secs {
            return Err(ConfigError::InvalidValue(
                "forward.backoff_ceiling_secs must be >= forward.backoff_base_secs".into(),
            ));
        }
        Ok(())
    }

    /// Cluster creation timeout as a [`Duration`].
    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.create_secs)
    }

    /// Chart deployment timeout as a [`Duration`].
    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.deploy_secs)
    }

    /// Readiness polling budget as a [`Duration`].
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.readiness_secs)
    }

    /// Short probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.probe_secs)
    }

    /// Inspection probe timeout as a [`Duration`].
    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.inspect_secs)
    }
}
