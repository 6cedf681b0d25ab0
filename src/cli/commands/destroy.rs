//! cli::commands::destroy
//!
//! Delete the cluster and reset all state, after confirmation.

use anyhow::Result;

use crate::engine::{Context, Outcome};
use crate::ui::{output, prompts};

/// Run the destroy command.
pub fn destroy(ctx: &Context) -> Result<()> {
    let v = ctx.verbosity();

    if !ctx.assume_yes {
        let confirmed = prompts::confirm(
            "This will delete the Kind cluster and ALL local data. Continue?",
            false,
            true,
        )?;
        if !confirmed {
            output::print("Aborted.", v);
            return Ok(());
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(destroy_async(ctx))
}

async fn destroy_async(ctx: &Context) -> Result<()> {
    let v = ctx.verbosity();
    let orch = super::build_orchestrator(ctx)?;

    match orch.destroy().await? {
        Outcome::Changed => {
            output::success("Run `airlocal install` to start fresh.", v);
        }
        Outcome::NoOp { reason } => {
            output::success(format!("Nothing to do: {}.", reason), v);
        }
    }
    Ok(())
}
