//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--yes` / `-y`: Skip confirmation prompts

use clap::{Parser, Subcommand, ValueEnum};

/// airlocal - a local Kind + Apache Airflow developer environment
#[derive(Parser, Debug)]
#[command(name = "airlocal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Assume "yes" for confirmation prompts
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Shells supported by the completion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// First-time setup: create the Kind cluster and install Airflow
    #[command(
        name = "install",
        long_about = "First-time setup: create the Kind cluster and install Airflow.\n\n\
            Verifies that docker, kubectl, helm and kind are installed and that the \
            docker daemon is running, creates the local cluster, deploys the Airflow \
            chart, waits for the scheduler, webserver and worker to become ready, and \
            starts the local port-forwards. Takes 5-10 minutes on first run.\n\n\
            Safe to re-run: a finished environment reports 'nothing to do', and an \
            interrupted install resumes where it left off.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Normal first-time setup
    airlocal install

    # After a failed install, once the cause is fixed
    airlocal install

    # Recover from a broken environment
    airlocal destroy
    airlocal install"
    )]
    Install {
        /// Skip tool version checks (not recommended)
        #[arg(long)]
        skip_preflight: bool,
    },

    /// Resume the cluster and port-forwards after a stop or reboot
    #[command(
        name = "start",
        long_about = "Resume the Kind cluster and port-forwards after `airlocal stop` \
            or a reboot.\n\n\
            Restarts the cluster's containers, waits for the workloads to come back, \
            and re-establishes the local tunnels. The chart is not re-deployed unless \
            the configured version changed."
    )]
    Start {
        /// Stay in the foreground and restart tunnels that die
        #[arg(long)]
        watch: bool,
    },

    /// Pause the cluster (data is preserved)
    #[command(
        name = "stop",
        long_about = "Pause the Kind cluster by stopping its containers. All Airflow \
            data, DAGs and logs are preserved. Resume with `airlocal start`."
    )]
    Stop,

    /// Show environment, cluster and tunnel health
    #[command(name = "status")]
    Status,

    /// Tail logs from a local service
    #[command(
        name = "logs",
        long_about = "Tail logs from the local Airflow services.\n\n\
            SERVICE options:\n\
                airflow    - all Airflow pods (default)\n\
                scheduler  - Airflow scheduler only\n\
                webserver  - Airflow webserver only\n\
                worker     - Airflow worker pods\n\
                triggerer  - Airflow triggerer"
    )]
    Logs {
        /// Service to tail
        #[arg(default_value = "airflow")]
        service: String,

        /// Number of previous log lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: u32,

        /// Print the current lines and exit instead of following
        #[arg(long)]
        no_follow: bool,
    },

    /// Delete the cluster and all local state
    #[command(
        name = "destroy",
        long_about = "Delete the Kind cluster and all local state.\n\n\
            WARNING: this is irreversible. All Airflow data, DAGs and logs stored in \
            the local cluster are permanently deleted. Run `airlocal install` to start \
            fresh."
    )]
    Destroy,

    /// Generate shell completion scripts
    #[command(name = "completion")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn logs_defaults() {
        let cli = Cli::try_parse_from(["airlocal", "logs"]).expect("parse");
        match cli.command {
            Command::Logs {
                service,
                lines,
                no_follow,
            } => {
                assert_eq!(service, "airflow");
                assert_eq!(lines, 50);
                assert!(!no_follow);
            }
            other => panic!("expected logs, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_anywhere() {
        let cli = Cli::try_parse_from(["airlocal", "destroy", "--yes", "--quiet"]).expect("parse");
        assert!(cli.assume_yes);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Destroy));
    }

    #[test]
    fn start_watch_flag() {
        let cli = Cli::try_parse_from(["airlocal", "start", "--watch"]).expect("parse");
        assert!(matches!(cli.command, Command::Start { watch: true }));
    }
}
