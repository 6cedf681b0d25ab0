//! preflight
//!
//! Prerequisite checks for the external tools airlocal drives.
//!
//! # Design
//!
//! Before mutating anything, `install` verifies that docker, kubectl,
//! helm and kind are present at workable versions and that the docker
//! daemon is actually running; `start` only needs the daemon check.
//! Probes are read-only, bounded by a short timeout, and recomputed on
//! every invocation: the report is never persisted.
//!
//! A tool that is present but whose version string cannot be parsed is
//! treated as satisfied: an exotic build is the developer's choice, and
//! refusing to proceed on a parse failure would be a false positive.
//!
//! # Testability
//!
//! The orchestrator depends on the [`PreflightChecker`] trait, not on
//! the real prober, so its gating logic is exercised offline with
//! [`StaticPreflight`].

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::tools::exec::run_capture;

/// Specification of one required external tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    /// Binary name looked up on PATH.
    pub name: &'static str,
    /// Minimum workable (major, minor) version.
    pub min_version: (u32, u32),
    /// Arguments of the version probe.
    pub version_args: &'static [&'static str],
    /// Install hints per platform: (macos, linux, windows).
    install_hints: (&'static str, &'static str, &'static str),
}

impl ToolSpec {
    /// The install hint for the current platform.
    pub fn install_hint(&self) -> &'static str {
        match std::env::consts::OS {
            "macos" => self.install_hints.0,
            "windows" => self.install_hints.2,
            _ => self.install_hints.1,
        }
    }
}

/// The tools every managed environment needs.
pub const REQUIRED_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "docker",
        min_version: (24, 0),
        version_args: &["version", "--format", "{{.Server.Version}}"],
        install_hints: (
            "https://docs.docker.com/desktop/install/mac-install/",
            "https://docs.docker.com/engine/install/",
            "https://docs.docker.com/desktop/install/windows-install/",
        ),
    },
    ToolSpec {
        name: "kubectl",
        min_version: (1, 28),
        version_args: &["version", "--client", "--output=yaml"],
        install_hints: (
            "brew install kubectl",
            "https://kubernetes.io/docs/tasks/tools/install-kubectl-linux/",
            "choco install kubernetes-cli",
        ),
    },
    ToolSpec {
        name: "helm",
        min_version: (3, 14),
        version_args: &["version", "--short"],
        install_hints: (
            "brew install helm",
            "https://helm.sh/docs/intro/install/",
            "choco install kubernetes-helm",
        ),
    },
    ToolSpec {
        name: "kind",
        min_version: (0, 23),
        version_args: &["version"],
        install_hints: (
            "brew install kind",
            "https://kind.sigs.k8s.io/docs/user/quick-start/#installation",
            "choco install kind",
        ),
    },
];

/// Outcome of probing one tool.
#[derive(Debug, Clone)]
pub struct ToolCheck {
    /// Tool name.
    pub tool: String,
    /// Minimum required (major, minor).
    pub required: (u32, u32),
    /// Version found, or None when the binary is absent. "unknown" when
    /// present but unparseable.
    pub found_version: Option<String>,
    /// Whether this tool passes the gate.
    pub satisfied: bool,
    /// Install hint shown when unsatisfied.
    pub hint: String,
}

impl ToolCheck {
    /// Render the required version as `major.minor`.
    pub fn required_display(&self) -> String {
        format!("{}.{}", self.required.0, self.required.1)
    }
}

/// The full prerequisite report.
#[derive(Debug, Clone)]
pub struct PreflightReport {
    /// Per-tool results, in [`REQUIRED_TOOLS`] order.
    pub checks: Vec<ToolCheck>,
    /// Whether the docker daemon answered `docker info`.
    pub docker_running: bool,
}

impl PreflightReport {
    /// Whether every tool and the daemon pass.
    pub fn satisfied(&self) -> bool {
        self.docker_running && self.checks.iter().all(|c| c.satisfied)
    }

    /// The checks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ToolCheck> {
        self.checks.iter().filter(|c| !c.satisfied)
    }

    /// One-line summary of what is missing, for error messages.
    pub fn failure_summary(&self) -> String {
        let mut parts: Vec<String> = self
            .failures()
            .map(|c| match &c.found_version {
                None => format!("{} is not installed", c.tool),
                Some(v) => format!(
                    "{} {} is below the required {}",
                    c.tool,
                    v,
                    c.required_display()
                ),
            })
            .collect();
        if !self.docker_running {
            parts.push("the docker daemon is not running".to_string());
        }
        parts.join("; ")
    }
}

/// Source of prerequisite reports.
#[async_trait]
pub trait PreflightChecker: Send + Sync {
    /// Probe every required tool plus the docker daemon.
    async fn check(&self) -> PreflightReport;

    /// Probe only the docker daemon (the `start` gate).
    async fn docker_running(&self) -> bool;
}

/// Extract `(major, minor)` from a raw version string.
///
/// Returns None when no `digits.digits` pair appears anywhere in the
/// output.
pub fn parse_major_minor(raw: &str) -> Option<(u32, u32)> {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    let re = VERSION_RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)").expect("static regex"));
    let caps = re.captures(raw)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// The real prober: PATH lookup plus version subprocesses.
#[derive(Debug, Clone)]
pub struct SystemPreflight {
    probe_timeout: Duration,
}

impl SystemPreflight {
    /// Create a prober with the given per-probe timeout.
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    async fn check_tool(&self, spec: &ToolSpec) -> ToolCheck {
        let hint = spec.install_hint().to_string();

        if which::which(spec.name).is_err() {
            return ToolCheck {
                tool: spec.name.to_string(),
                required: spec.min_version,
                found_version: None,
                satisfied: false,
                hint,
            };
        }

        match run_capture(spec.name, spec.version_args, self.probe_timeout).await {
            Ok(out) if out.success() => {
                let combined = format!("{}\n{}", out.stdout, out.stderr);
                match parse_major_minor(&combined) {
                    Some(found) => ToolCheck {
                        tool: spec.name.to_string(),
                        required: spec.min_version,
                        found_version: Some(format!("{}.{}", found.0, found.1)),
                        satisfied: found >= spec.min_version,
                        hint,
                    },
                    // Present but unparseable: lenient pass.
                    None => ToolCheck {
                        tool: spec.name.to_string(),
                        required: spec.min_version,
                        found_version: Some("unknown".to_string()),
                        satisfied: true,
                        hint,
                    },
                }
            }
            // The binary exists but the probe failed (daemon down, odd
            // build): presence is what we can vouch for.
            _ => ToolCheck {
                tool: spec.name.to_string(),
                required: spec.min_version,
                found_version: Some("unknown".to_string()),
                satisfied: true,
                hint,
            },
        }
    }
}

#[async_trait]
impl PreflightChecker for SystemPreflight {
    async fn check(&self) -> PreflightReport {
        let mut checks = Vec::with_capacity(REQUIRED_TOOLS.len());
        for spec in REQUIRED_TOOLS {
            checks.push(self.check_tool(spec).await);
        }
        let docker_running = self.docker_running().await;
        PreflightReport {
            checks,
            docker_running,
        }
    }

    async fn docker_running(&self) -> bool {
        matches!(
            run_capture("docker", &["info"], self.probe_timeout).await,
            Ok(out) if out.success()
        )
    }
}

/// Fixed-answer checker for tests.
#[derive(Debug, Clone)]
pub struct StaticPreflight {
    report: PreflightReport,
}

impl StaticPreflight {
    /// A checker where everything passes.
    pub fn satisfied() -> Self {
        let checks = REQUIRED_TOOLS
            .iter()
            .map(|spec| ToolCheck {
                tool: spec.name.to_string(),
                required: spec.min_version,
                found_version: Some(format!(
                    "{}.{}",
                    spec.min_version.0, spec.min_version.1
                )),
                satisfied: true,
                hint: spec.install_hint().to_string(),
            })
            .collect();
        Self {
            report: PreflightReport {
                checks,
                docker_running: true,
            },
        }
    }

    /// A checker where the named tool is missing entirely.
    pub fn missing_tool(tool: &str) -> Self {
        let mut this = Self::satisfied();
        if let Some(check) = this.report.checks.iter_mut().find(|c| c.tool == tool) {
            check.found_version = None;
            check.satisfied = false;
        }
        this
    }

    /// A checker where the docker daemon is down.
    pub fn docker_down() -> Self {
        let mut this = Self::satisfied();
        this.report.docker_running = false;
        this
    }
}

#[async_trait]
impl PreflightChecker for StaticPreflight {
    async fn check(&self) -> PreflightReport {
        self.report.clone()
    }

    async fn docker_running(&self) -> bool {
        self.report.docker_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod version_parsing {
        use super::*;

        #[test]
        fn plain_semver() {
            assert_eq!(parse_major_minor("27.3.1"), Some((27, 3)));
        }

        #[test]
        fn helm_short_output() {
            assert_eq!(parse_major_minor("v3.16.2+g13654a5"), Some((3, 16)));
        }

        #[test]
        fn kind_verbose_output() {
            assert_eq!(
                parse_major_minor("kind version 0.24.0 go1.22.6 linux/amd64"),
                Some((0, 24))
            );
        }

        #[test]
        fn kubectl_yaml_output() {
            let raw = "clientVersion:\n  gitVersion: v1.31.0\n  major: \"1\"\n";
            assert_eq!(parse_major_minor(raw), Some((1, 31)));
        }

        #[test]
        fn no_version_anywhere() {
            assert_eq!(parse_major_minor("no digits here"), None);
        }
    }

    mod report {
        use super::*;

        #[test]
        fn satisfied_requires_daemon() {
            let checker = StaticPreflight::docker_down();
            assert!(!checker.report.satisfied());
            assert!(checker
                .report
                .failure_summary()
                .contains("daemon is not running"));
        }

        #[test]
        fn all_green_is_satisfied() {
            let checker = StaticPreflight::satisfied();
            assert!(checker.report.satisfied());
            assert_eq!(checker.report.failures().count(), 0);
        }

        #[test]
        fn missing_tool_named_in_summary() {
            let checker = StaticPreflight::missing_tool("kind");
            assert!(!checker.report.satisfied());
            assert!(checker
                .report
                .failure_summary()
                .contains("kind is not installed"));
        }
    }

    #[test]
    fn tool_table_covers_the_stack() {
        let names: Vec<&str> = REQUIRED_TOOLS.iter().map(|t| t.name).collect();
        assert_eq!(names, ["docker", "kubectl", "helm", "kind"]);
    }

    #[test]
    fn every_tool_has_a_hint() {
        for spec in REQUIRED_TOOLS {
            assert!(!spec.install_hint().is_empty());
        }
    }

    #[tokio::test]
    async fn static_checker_reports_fixed_answer() {
        let checker = StaticPreflight::satisfied();
        assert!(checker.check().await.satisfied());
        assert!(checker.docker_running().await);

        let down = StaticPreflight::docker_down();
        assert!(!down.docker_running().await);
    }
}
