//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the operation
//! 3. Formats and displays output
//!
//! Handlers do NOT drive external tools directly; every mutation flows
//! through the [`crate::engine::Orchestrator`].
//!
//! # Async Commands
//!
//! Lifecycle operations are async because they drive subprocesses and
//! timers through tokio. Handlers are synchronous wrappers that build a
//! runtime and `block_on` the async implementation.

mod completion;
mod destroy;
mod install;
mod logs;
mod start;
mod status;
mod stop;

pub use completion::completion;
pub use destroy::destroy;
pub use install::install;
pub use logs::logs;
pub use start::start;
pub use status::status;
pub use stop::stop;

use anyhow::Result;

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::core::paths::EnvPaths;
use crate::engine::{Context, Orchestrator};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Install { skip_preflight } => install(ctx, skip_preflight),
        Command::Start { watch } => start(ctx, watch),
        Command::Stop => stop(ctx),
        Command::Status => status(ctx),
        Command::Logs {
            service,
            lines,
            no_follow,
        } => logs(ctx, &service, lines, !no_follow),
        Command::Destroy => destroy(ctx),
        Command::Completion { shell } => completion(shell),
    }
}

/// Build an orchestrator wired to the real system drivers.
pub(crate) fn build_orchestrator(ctx: &Context) -> Result<Orchestrator> {
    let paths = EnvPaths::resolve()?;
    let config = Config::load(&paths)?;
    Ok(Orchestrator::system(config, paths, ctx.clone()))
}
