#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used))]

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use poolsync::config::Config;
use poolsync::executor::{Executor, ProcessExecutor};
use poolsync::transaction::TransactionList;
use poolsync::zfs_types::Side;
use poolsync::zpool::Zpool;

mod args;
use args::*;

fn init_logging() {
    let default = if ARGS.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<Arc<Config>> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load configuration from `{}`", path.display()))?;
    Ok(Arc::new(config))
}

fn load_zpool(side: Side, config: &Arc<Config>, executor: &dyn Executor) -> anyhow::Result<Zpool> {
    Zpool::load(side, Arc::clone(config), executor)
        .with_context(|| format!("failed to fetch datasets from {side} `{}`", config.root(side)))
}

fn confirm() -> anyhow::Result<bool> {
    print!("Do you want to continue? [y/N] ");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read answer")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Print, confirm and run `transactions`. `true` only if they actually ran.
fn run_transactions(
    mut transactions: TransactionList,
    run: &RunArgs,
    executor: &dyn Executor,
    confirm: impl FnOnce() -> anyhow::Result<bool>,
) -> anyhow::Result<bool> {
    if transactions.is_empty() {
        println!("Nothing to do.");
        return Ok(false);
    }
    print!("{transactions}");
    if run.dry_run {
        return Ok(false);
    }
    if !run.yes && !confirm()? {
        println!("Aborted.");
        return Ok(false);
    }
    transactions
        .run(executor)
        .context("transaction failed, remaining transactions were not run")?;
    info!("{} transaction(s) done", transactions.len());
    Ok(true)
}

fn print_tree(zpool: &Zpool) {
    if zpool.datasets().is_empty() {
        println!("(empty)");
        return;
    }
    let value = |property: poolsync::property::Property| {
        property.value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_owned())
    };
    println!("{:<50} {:>16} {:>16} {:>8}", "NAME", "USED", "REFER", "RATIO");
    for dataset in zpool.datasets() {
        println!(
            "{:<50} {:>16} {:>16} {:>8}",
            dataset.name(),
            value(dataset.property("used")),
            value(dataset.property("referenced")),
            value(dataset.property("compressratio")),
        );
        for snapshot in dataset.snapshots() {
            println!(
                "{:<50} {:>16} {:>16} {:>8}",
                format!("- {}", snapshot.name()),
                value(snapshot.property("used")),
                value(snapshot.property("referenced")),
                value(snapshot.property("compressratio")),
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Make sure command line args are parsed first.
    std::sync::LazyLock::force(&ARGS);
    init_logging();

    let executor = ProcessExecutor;

    match &ARGS.action {
        Action::Tree { config, side } => {
            let config = load_config(config)?;
            let side = Side::from(*side);
            print_tree(&load_zpool(side, &config, &executor)?);
        }
        Action::Compare { config } => {
            let config = load_config(config)?;
            let source = load_zpool(Side::Source, &config, &executor)?;
            let target = load_zpool(Side::Target, &config, &executor)?;
            let rows = source
                .comparison_rows(Some(&target))
                .context("failed to compare source and target")?;
            println!("{:<50} {:^6} {:^6}", "NAME", "source", "target");
            for row in rows {
                let mark = |present: bool| if present { "X" } else { "" };
                let name = if row.is_snapshot {
                    format!("- {}", row.name)
                } else {
                    row.name
                };
                println!("{:<50} {:^6} {:^6}", name, mark(row.a), mark(row.b));
            }
        }
        Action::Snap(run) => {
            let config = load_config(&run.config)?;
            let source = load_zpool(Side::Source, &config, &executor)?;
            let transactions = source
                .get_snapshot_transactions(&executor)
                .context("failed to plan snapshots")?;
            run_transactions(transactions, run, &executor, confirm)?;
        }
        Action::Backup(run) => {
            let config = load_config(&run.config)?;
            let source = load_zpool(Side::Source, &config, &executor)?;
            let target = load_zpool(Side::Target, &config, &executor)?;
            let transactions = source
                .get_backup_transactions(&target)
                .context("failed to plan backup")?;
            run_transactions(transactions, run, &executor, confirm)?;
        }
        Action::Cleanup { run, side } => {
            let config = load_config(&run.config)?;
            let side = Side::from(*side);
            let cleanup = load_zpool(side, &config, &executor)?;
            let control = load_zpool(side.other(), &config, &executor)?;
            let transactions = cleanup
                .get_cleanup_transactions(&control)
                .context("failed to plan cleanup")?;
            if run_transactions(transactions, run, &executor, confirm)? {
                let available = Zpool::available(side, &config, &executor)
                    .context("failed to fetch available space")?;
                info!("{} bytes available on {}", available, side);
            }
        }
    }

    Ok(())
}
