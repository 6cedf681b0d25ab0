//! cli::commands::logs
//!
//! Pass-through log streaming from in-cluster services.
//!
//! No state-machine semantics: this shells straight out to kubectl with
//! inherited stdio. Ctrl-C reaches kubectl through the shared terminal
//! process group, so a followed stream ends cleanly.

use std::process::Stdio;

use anyhow::{bail, Result};

use crate::core::services::{log_target, LOG_TARGETS};
use crate::engine::Context;
use crate::ui::output;

/// Run the logs command.
pub fn logs(ctx: &Context, service: &str, lines: u32, follow: bool) -> Result<()> {
    let Some(target) = log_target(service) else {
        let choices: Vec<&str> = LOG_TARGETS.iter().map(|t| t.name).collect();
        bail!(
            "unknown service '{}'; choose one of: {}",
            service,
            choices.join(", ")
        );
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let v = ctx.verbosity();
        output::print(
            format!(
                "Tailing {} logs (namespace: {}) — Ctrl-C to stop",
                target.name, target.namespace
            ),
            v,
        );

        let lines = lines.to_string();
        let mut args: Vec<&str> = vec![
            "logs",
            "--selector",
            target.selector,
            "--namespace",
            target.namespace,
            "--tail",
            &lines,
            "--max-log-requests",
            "10",
            "--prefix",
        ];
        if follow {
            args.push("--follow");
        }

        let status = tokio::process::Command::new("kubectl")
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            // A followed stream interrupted by Ctrl-C exits nonzero;
            // that is the normal way out, not a failure.
            Ok(_) if follow => Ok(()),
            Ok(status) => bail!("kubectl logs exited with {}", status),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("kubectl not found on PATH; run `airlocal install` to check prerequisites")
            }
            Err(e) => Err(e.into()),
        }
    })
}
