use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::LazyLock;

use poolsync::zfs_types::Side;

// Global variable for easier access throughout the CLI.
pub static ARGS: LazyLock<Args> = LazyLock::new(Args::parse);

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    #[command(subcommand)]
    pub action: Action,

    /// Print verbose tracelogs.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Action {
    /// Show the datasets and snapshots of one side.
    Tree {
        /// Path to the TOML configuration.
        config: PathBuf,
        #[arg(long, value_enum, default_value_t = SideArg::Source)]
        side: SideArg,
    },
    /// Show which datasets and snapshots exist on which side.
    Compare {
        /// Path to the TOML configuration.
        config: PathBuf,
    },
    /// Snapshot every changed source dataset.
    Snap(RunArgs),
    /// Send source snapshots missing on the target.
    Backup(RunArgs),
    /// Destroy snapshots that retention no longer requires.
    Cleanup {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, value_enum, default_value_t = SideArg::Source)]
        side: SideArg,
    },
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Path to the TOML configuration.
    pub config: PathBuf,
    /// Don't ask before running the planned transactions.
    #[arg(long, default_value_t = false)]
    pub yes: bool,
    /// Only print the planned transactions.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideArg {
    Source,
    Target,
}
impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Source => Side::Source,
            SideArg::Target => Side::Target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cleanup_with_side_and_flags() {
        let args = Args::parse_from([
            "poolsync", "-v", "cleanup", "pools.toml", "--side", "target", "--dry-run",
        ]);

        assert!(args.verbose);
        match args.action {
            Action::Cleanup { run, side } => {
                assert_eq!(side, SideArg::Target);
                assert!(run.dry_run);
                assert!(!run.yes);
                assert_eq!(run.config, PathBuf::from("pools.toml"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
