//! Fixtures shared by the unit tests.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::command::Command;
use crate::commands::{MARKER_PROPERTY, MARKER_VALUE};
use crate::config::{join, Compatibility, Config, KeepBacklog, SideConfig, SshConfig};
use crate::error::ExecutionError;
use crate::executor::{CommandOutput, Executor};
use crate::zfs_types::{PropertyRow, Side};
use crate::zpool::Zpool;

pub fn side_config(zpool: &str) -> SideConfig {
    SideConfig {
        zpool: zpool.to_owned(),
        prefix: String::new(),
        host: "localhost".to_owned(),
        user: String::new(),
        port: 0,
        processing: String::new(),
    }
}

/// Local `tank` to local `backup`, everything else at its default.
pub fn config() -> Config {
    Config {
        keep_snapshots: 1,
        keep_backlog: KeepBacklog::All,
        suffix: String::new(),
        digits: 2,
        always_changed: false,
        written_threshold: 1024 * 1024,
        check_diff: true,
        ignore: BTreeSet::new(),
        include_root: true,
        source: side_config("tank"),
        target: side_config("backup"),
        compatibility: Compatibility::default(),
        ssh: SshConfig::default(),
    }
}

/// Filesystem rows for `root` and each of `subnames` below it (`""` is the root itself).
pub fn dataset_rows(root: &str, subnames: &[&str]) -> Vec<PropertyRow> {
    subnames
        .iter()
        .flat_map(|subname| {
            let name = join(root, subname);
            vec![
                PropertyRow::new(&name, "type", "filesystem", "-"),
                PropertyRow::new(&name, "mountpoint", &format!("/{name}"), "default"),
                PropertyRow::new(&name, "written", "0", "-"),
            ]
        })
        .collect()
}

/// Marked snapshot rows of `dataset`, created in the given order.
pub fn snapshot_rows(dataset: &str, names: &[&str]) -> Vec<PropertyRow> {
    names
        .iter()
        .enumerate()
        .flat_map(|(index, name)| {
            let full_name = format!("{dataset}@{name}");
            vec![
                PropertyRow::new(&full_name, "type", "snapshot", "-"),
                PropertyRow::new(&full_name, "createtxg", &(100 + index).to_string(), "-"),
                PropertyRow::new(&full_name, MARKER_PROPERTY, MARKER_VALUE, "local"),
            ]
        })
        .collect()
}

/// A pool on `side` with the given `(subname, snapshots)` datasets.
pub fn zpool(side: Side, config: &Arc<Config>, datasets: &[(&str, &[&str])]) -> Zpool {
    let root = config.root(side);
    let rows = datasets.iter().flat_map(|(subname, snapshots)| {
        let mut rows = dataset_rows(&root, &[*subname]);
        rows.extend(snapshot_rows(&join(&root, subname), snapshots));
        rows
    });
    Zpool::from_rows(rows, side, Arc::clone(config))
}

/// Records every command and answers from a script instead of running anything.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    commands: RefCell<Vec<Command>>,
    fail_at: Option<usize>,
    stdout: String,
    stderr: String,
}
impl RecordingExecutor {
    /// Fails the command with the given zero-based index.
    pub fn failing_at(index: usize) -> Self {
        Self::failing_with(index, "boom")
    }

    pub fn failing_with(index: usize, stderr: &str) -> Self {
        Self {
            fail_at: Some(index),
            stderr: stderr.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_stdout(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_owned(),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.borrow().clone()
    }
}
impl Executor for RecordingExecutor {
    fn execute(&self, command: &Command) -> Result<CommandOutput, ExecutionError> {
        let mut commands = self.commands.borrow_mut();
        let failed = self.fail_at == Some(commands.len());
        commands.push(command.clone());

        let stages = command.stages().len();
        Ok(CommandOutput {
            stdout: self.stdout.clone(),
            stderr: vec![if failed { self.stderr.clone() } else { String::new() }; stages],
            status: vec![Some(if failed { 1 } else { 0 }); stages],
        })
    }
}
