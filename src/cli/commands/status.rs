//! cli::commands::status
//!
//! Read-only environment health report. Always exits zero: a broken
//! probe is something to report, not a reason to fail.

use anyhow::Result;

use crate::cluster::ClusterStatus;
use crate::core::state::Phase;
use crate::engine::{ClusterReport, Context, StatusReport};
use crate::ui::output;

/// Run the status command.
pub fn status(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(status_async(ctx))
}

async fn status_async(ctx: &Context) -> Result<()> {
    let orch = super::build_orchestrator(ctx)?;
    let report = orch.status().await;
    render(ctx, &report);
    Ok(())
}

fn render(ctx: &Context, report: &StatusReport) {
    let v = ctx.verbosity();

    if let Some(problem) = &report.state_error {
        output::warn(format!("state record problem: {}", problem), v);
        output::warn(
            "run `airlocal destroy` to reset the environment record",
            v,
        );
    }

    match &report.cluster {
        ClusterReport::Probed(ClusterStatus::Absent) => {
            output::print(
                format!("Cluster '{}' does not exist.", report.cluster_name),
                v,
            );
            output::print("Run `airlocal install` to set it up.", v);
            return;
        }
        ClusterReport::Probed(status) => {
            output::print(
                format!("Cluster '{}': {}", report.cluster_name, status),
                v,
            );
        }
        ClusterReport::Unknown { detail } => {
            output::print(
                format!("Cluster '{}': unknown ({})", report.cluster_name, detail),
                v,
            );
        }
    }

    output::print(format!("Environment: {}", report.phase), v);
    if let Some(version) = &report.installed_chart_version {
        output::print(format!("Chart version: {}", version), v);
    }
    if let Some(op) = &report.last_operation {
        output::print(format!("Last operation: {}", op), v);
    }
    if let Some(err) = &report.last_error {
        output::warn(format!("last failure: {}", err), v);
    }

    output::print("", v);
    output::print("Port forwards:", v);
    for tunnel in &report.tunnels {
        let state = match (tunnel.pid, tunnel.alive) {
            (Some(pid), true) => format!("up (pid {})", pid),
            (Some(pid), false) => format!("down (stale pid {})", pid),
            (None, _) => "down".to_string(),
        };
        output::print(
            format!("  {:<12} {:<24} {}", tunnel.service, tunnel.url, state),
            v,
        );
    }

    if report.phase == Phase::Stopped {
        output::print("", v);
        output::print("Run `airlocal start` to resume the cluster.", v);
    }
    output::print("", v);
    output::print("  airlocal logs   tail Airflow logs", v);
    output::print("  airlocal stop   pause the cluster", v);
}
