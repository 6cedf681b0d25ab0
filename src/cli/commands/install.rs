//! cli::commands::install
//!
//! First-time setup: preflight, cluster, chart, tunnels.

use anyhow::Result;

use crate::core::services::FORWARDED_SERVICES;
use crate::engine::{Context, OrchestratorError, Outcome};
use crate::preflight::PreflightReport;
use crate::ui::output;

/// Run the install command.
pub fn install(ctx: &Context, skip_preflight: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(install_async(ctx, skip_preflight))
}

async fn install_async(ctx: &Context, skip_preflight: bool) -> Result<()> {
    let v = ctx.verbosity();
    let orch = super::build_orchestrator(ctx)?;

    output::print("airlocal install — Kind + Apache Airflow", v);

    match orch.install(skip_preflight).await {
        Ok(Outcome::Changed) => {
            print_summary(ctx);
            Ok(())
        }
        Ok(Outcome::NoOp { reason }) => {
            output::success(format!("Nothing to do: {}.", reason), v);
            Ok(())
        }
        Err(err) => {
            if let OrchestratorError::Prerequisite {
                report: Some(report),
                ..
            } = &err
            {
                print_preflight_failures(report);
            }
            Err(err.into())
        }
    }
}

/// Post-install summary: where to click, what to run next.
fn print_summary(ctx: &Context) {
    let v = ctx.verbosity();
    output::success("", v);
    output::success("Installation complete!", v);
    for service in FORWARDED_SERVICES {
        output::success(format!("  {}  ->  {}", service.display, service.url()), v);
    }
    output::success("  Username: admin   Password: admin", v);
    output::success("", v);
    output::success("Useful commands:", v);
    output::success("  airlocal status    check environment health", v);
    output::success("  airlocal logs      tail Airflow logs", v);
    output::success("  airlocal stop      pause the cluster at end of day", v);
    output::success("  airlocal start     resume next morning", v);
    output::success("  airlocal destroy   delete everything", v);
}

/// Per-tool failure table for a failed preflight gate.
fn print_preflight_failures(report: &PreflightReport) {
    eprintln!();
    eprintln!("Preflight check results:");
    for check in &report.checks {
        let found = check.found_version.as_deref().unwrap_or("absent");
        let status = if check.satisfied { "ok" } else { "FAIL" };
        eprintln!(
            "  {:<10} found: {:<10} required: >= {:<8} {}",
            check.tool,
            found,
            check.required_display(),
            status
        );
    }
    let daemon = if report.docker_running {
        "running"
    } else {
        "NOT RUNNING"
    };
    eprintln!("  {:<10} {}", "daemon", daemon);
    eprintln!();
    for check in report.failures() {
        eprintln!("  -> {}: {}", check.tool, check.hint);
    }
    if !report.docker_running {
        eprintln!("  -> docker daemon: start Docker and try again");
    }
    eprintln!();
}
