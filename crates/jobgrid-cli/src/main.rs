use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;
use commands::cluster::ClusterAction;
use commands::command::CommandAction;
use commands::job::JobAction;

#[derive(Parser)]
#[command(
    name = "jobgrid",
    about = "JobGrid: tag-based job routing across clusters",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Directory holding the state database.
    #[arg(long, global = true, env = "JOBGRID_DATA_DIR", default_value = "./jobgrid-data")]
    data_dir: PathBuf,

    /// Path to jobgrid.toml. Defaults apply when omitted.
    #[arg(long, global = true, env = "JOBGRID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage clusters and their tags, configs, and command lists
    Cluster {
        #[command(subcommand)]
        action: ClusterAction,
    },
    /// Manage commands and their tags and configs
    Command {
        #[command(subcommand)]
        action: CommandAction,
    },
    /// Submit, query, and transition jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Resolve criteria to a cluster and command without touching any job.
    ///
    /// Each --tier is a comma-separated tag list, most preferred first.
    Resolve {
        /// Cluster criteria tier, e.g. `sched:sla,type:yarn`. Repeatable.
        #[arg(long = "tier", required = true)]
        tiers: Vec<String>,
        /// Command criteria, comma-separated.
        #[arg(long = "command", required = true)]
        command_criteria: String,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Run the admission loop until Ctrl-C
    Serve {
        /// Seconds between admission passes. Overrides [admission].interval_secs.
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,jobgrid=debug"))?,
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        return commands::print_config(cli.config.as_deref());
    }

    let ctx = Context::open(&cli.data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Cluster { action } => commands::cluster::run(&ctx, action),
        Commands::Command { action } => commands::command::run(&ctx, action),
        Commands::Job { action } => commands::job::run(&ctx, action),
        Commands::Resolve {
            tiers,
            command_criteria,
        } => commands::resolve::run(&ctx, &tiers, &command_criteria),
        Commands::Serve { interval } => commands::serve::run(ctx, interval),
        Commands::Config => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use jobgrid_state::{ClusterStatus, JobStatus};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "jobgrid",
            "cluster",
            "get",
            "cluster1",
            "--data-dir",
            "/tmp/jg",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/jg"));
        assert!(matches!(
            cli.command,
            Commands::Cluster { action: ClusterAction::Get { ref id } } if id == "cluster1"
        ));
    }

    #[test]
    fn parses_status_filters() {
        let cli = Cli::try_parse_from([
            "jobgrid", "cluster", "list", "--status", "up", "--status", "OUT_OF_SERVICE",
        ])
        .unwrap();
        let Commands::Cluster { action: ClusterAction::List { statuses, .. } } = cli.command else {
            panic!("expected cluster list");
        };
        assert_eq!(statuses, vec![ClusterStatus::Up, ClusterStatus::OutOfService]);

        let cli = Cli::try_parse_from([
            "jobgrid", "job", "status", "job1", "--set", "killed", "--message", "bye",
        ])
        .unwrap();
        let Commands::Job { action: JobAction::Status { set, message, .. } } = cli.command else {
            panic!("expected job status");
        };
        assert_eq!(set, Some(JobStatus::Killed));
        assert_eq!(message.as_deref(), Some("bye"));
    }

    #[test]
    fn resolve_requires_criteria() {
        assert!(Cli::try_parse_from(["jobgrid", "resolve", "--tier", "a"]).is_err());
        let cli = Cli::try_parse_from([
            "jobgrid", "resolve", "--tier", "a,b", "--tier", "c", "--command", "x",
        ])
        .unwrap();
        let Commands::Resolve { tiers, .. } = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(tiers, vec!["a,b".to_string(), "c".to_string()]);
    }
}
