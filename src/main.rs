//! airlocal binary entry point.
//!
//! Maps failure classes to distinct exit codes so calling scripts can
//! branch on what went wrong: 2 prerequisites, 3 cluster, 4 install,
//! 5 concurrent operation, 6 corrupt state, 7 port-forward, 1 other.

use airlocal::engine::OrchestratorError;
use airlocal::ui::output;

fn main() {
    if let Err(err) = airlocal::cli::run() {
        output::error(format!("{:#}", err));

        if let Some(orch_err) = err.downcast_ref::<OrchestratorError>() {
            if let Some(hint) = orch_err.remediation() {
                eprintln!("hint: {}", hint);
            }
            std::process::exit(orch_err.exit_code());
        }
        std::process::exit(1);
    }
}
