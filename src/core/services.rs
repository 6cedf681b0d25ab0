//! core::services
//!
//! Static service knowledge: which in-cluster services get local tunnels,
//! and which label selectors back the `logs` command.
//!
//! These tables are product knowledge about the Airflow chart, not user
//! data: they change when the chart layout changes, not at runtime.

/// A service that gets a local port-forward tunnel while the environment
/// is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Logical service name, used as the key in persisted state.
    pub name: &'static str,

    /// Human-facing label.
    pub display: &'static str,

    /// Kubernetes namespace the service lives in.
    pub namespace: &'static str,

    /// kubectl port-forward target (`svc/<service>`).
    pub target: &'static str,

    /// Local TCP port to listen on.
    pub local_port: u16,

    /// In-cluster service port to relay to.
    pub remote_port: u16,

    /// HTTP health-check path, probed through the tunnel when present.
    pub health_path: Option<&'static str>,
}

impl ServiceDescriptor {
    /// The local URL this tunnel exposes.
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.local_port)
    }
}

/// Services tunneled by `install` and `start`.
///
/// The web UI is the only default: the scheduler and workers have no
/// HTTP surface a developer browses to.
pub const FORWARDED_SERVICES: &[ServiceDescriptor] = &[ServiceDescriptor {
    name: "webserver",
    display: "Airflow UI",
    namespace: "airflow",
    target: "svc/airflow-webserver",
    local_port: 8080,
    remote_port: 8080,
    health_path: Some("/health"),
}];

/// Workload components whose readiness gates a successful install.
pub const READINESS_COMPONENTS: &[&str] = &["scheduler", "webserver", "worker"];

/// A log stream target for the `logs` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    /// Name accepted on the command line.
    pub name: &'static str,

    /// Namespace to read from.
    pub namespace: &'static str,

    /// Label selector passed to `kubectl logs --selector`.
    pub selector: &'static str,
}

/// Service choices for `airlocal logs`.
pub const LOG_TARGETS: &[LogTarget] = &[
    LogTarget {
        name: "airflow",
        namespace: "airflow",
        selector: "app.kubernetes.io/name=airflow",
    },
    LogTarget {
        name: "scheduler",
        namespace: "airflow",
        selector: "component=scheduler",
    },
    LogTarget {
        name: "webserver",
        namespace: "airflow",
        selector: "component=webserver",
    },
    LogTarget {
        name: "worker",
        namespace: "airflow",
        selector: "component=worker",
    },
    LogTarget {
        name: "triggerer",
        namespace: "airflow",
        selector: "component=triggerer",
    },
];

/// Look up a log target by its command-line name.
pub fn log_target(name: &str) -> Option<&'static LogTarget> {
    LOG_TARGETS.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}
