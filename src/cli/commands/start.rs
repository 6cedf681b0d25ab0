//! cli::commands::start
//!
//! Resume a paused environment; optionally stay up supervising tunnels.

use anyhow::Result;

use crate::core::services::FORWARDED_SERVICES;
use crate::engine::{Context, Outcome};
use crate::ui::output;

/// Run the start command.
pub fn start(ctx: &Context, watch: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(start_async(ctx, watch))
}

async fn start_async(ctx: &Context, watch: bool) -> Result<()> {
    let v = ctx.verbosity();
    let orch = super::build_orchestrator(ctx)?;

    match orch.start().await? {
        Outcome::Changed => {
            output::success("", v);
            output::success("Environment is running.", v);
        }
        Outcome::NoOp { reason } => {
            output::success(format!("Nothing to do: {}.", reason), v);
        }
    }
    for service in FORWARDED_SERVICES {
        output::success(
            format!("  {}  ->  {}  (admin / admin)", service.display, service.url()),
            v,
        );
    }

    if watch {
        orch.watch().await?;
    }
    Ok(())
}
