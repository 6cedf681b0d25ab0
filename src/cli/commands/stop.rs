//! cli::commands::stop
//!
//! Pause the environment, preserving all data.

use anyhow::Result;

use crate::engine::{Context, Outcome};
use crate::ui::output;

/// Run the stop command.
pub fn stop(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(stop_async(ctx))
}

async fn stop_async(ctx: &Context) -> Result<()> {
    let v = ctx.verbosity();
    let orch = super::build_orchestrator(ctx)?;

    match orch.stop().await? {
        Outcome::Changed => {
            output::success("Environment paused. Run `airlocal start` to resume.", v);
        }
        Outcome::NoOp { reason } => {
            output::success(format!("Nothing to do: {}.", reason), v);
        }
    }
    Ok(())
}
