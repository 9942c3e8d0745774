//! One side's dataset tree, and the planners turning two trees into transactions.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::commands::*;
use crate::comparison::{ComparisonDataset, ComparisonItem, ComparisonZpool};
use crate::config::{Config, KeepBacklog};
use crate::dataset::Dataset;
use crate::error::{ExecutionError, PlanError, PlanResult};
use crate::executor::Executor;
use crate::snapshot::Snapshot;
use crate::transaction::{MetaField, Transaction, TransactionKind, TransactionList, TransactionMeta};
use crate::zfs_types::{PropertyRow, Side, ZfsGetOutput};

/// Progress of a planner driven step by step: the number of steps first, then one item
/// per step with whatever that step planned.
#[derive(Debug)]
pub enum PlanProgress {
    Total(usize),
    Item {
        index: usize,
        transactions: Option<Vec<Transaction>>,
    },
}

/// Presence of one dataset or snapshot on either side, for listing two trees side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRow {
    /// Relative name for datasets, plain name for snapshots.
    pub name: String,
    pub is_snapshot: bool,
    pub a: bool,
    pub b: bool,
}

#[derive(Debug, Clone)]
pub struct Zpool {
    datasets: Vec<Dataset>,
    side: Side,
    root: String,
    config: Arc<Config>,
}

impl Zpool {
    pub fn empty(side: Side, config: Arc<Config>) -> Self {
        Self {
            datasets: Vec::new(),
            side,
            root: config.root(side),
            config,
        }
    }

    /// Build the tree from flat discovery rows. Entities outside the root are skipped,
    /// datasets end up sorted by name and snapshots by creation.
    pub fn from_rows(rows: impl IntoIterator<Item = PropertyRow>, side: Side, config: Arc<Config>) -> Self {
        let root = config.root(side);

        // Entity name -> (first seen position, rows).
        let mut entities: BTreeMap<String, (usize, Vec<PropertyRow>)> = BTreeMap::new();
        for row in rows {
            let next = entities.len();
            entities
                .entry(row.entity.clone())
                .or_insert_with(|| (next, Vec::new()))
                .1
                .push(row);
        }

        let mut snapshots: BTreeMap<&str, Vec<(SnapshotOrder, Snapshot)>> = BTreeMap::new();
        for (name, (position, rows)) in &entities {
            let Some((parent, _)) = name.split_once('@') else {
                continue;
            };
            let Some(snapshot) = Snapshot::from_rows(name, rows, side, &root) else {
                warn!("ignoring snapshot `{}` outside of `{}`", name, root);
                continue;
            };
            let order = SnapshotOrder {
                createtxg: snapshot.property("createtxg").integer(),
                creation: snapshot.property("creation").integer(),
                position: *position,
            };
            snapshots.entry(parent).or_default().push((order, snapshot));
        }

        let mut datasets = Vec::new();
        for (name, (_, rows)) in &entities {
            if name.contains('@') {
                continue;
            }
            let mut own = snapshots.remove(name.as_str()).unwrap_or_default();
            if !config.include_root && *name == root {
                continue;
            }
            own.sort_by(|(a, _), (b, _)| a.cmp(b));
            let own = own.into_iter().map(|(_, snapshot)| snapshot).collect();
            match Dataset::from_rows(name, rows, own, side, &root) {
                Some(dataset) => datasets.push(dataset),
                None => warn!("ignoring dataset `{}` outside of `{}`", name, root),
            }
        }
        for parent in snapshots.keys() {
            warn!("ignoring snapshots of unknown dataset `{}`", parent);
        }

        Self {
            datasets,
            side,
            root,
            config,
        }
    }

    /// Discover the tree below the configured root. A root that does not exist yet is an
    /// empty pool.
    pub fn load(side: Side, config: Arc<Config>, executor: &dyn Executor) -> Result<Self, ExecutionError> {
        let command = make_zfs_get_all_command(&config.root(side)).for_side(side, &config);
        let output = executor.execute(&command)?;
        if !output.success() {
            let stderr = output.stderr_text();
            if stderr.contains("dataset does not exist") {
                debug!("root of {} side does not exist yet", side);
                return Ok(Self::empty(side, config));
            }
            return Err(ExecutionError::Failed {
                command: command.to_string(),
                status: output.status,
                stderr,
            });
        }

        let parsed: ZfsGetOutput =
            serde_json::from_str(&output.stdout).map_err(|e| ExecutionError::Parse {
                command: command.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_rows(parsed.into_rows(), side, config))
    }

    /// Free bytes below the root of `side`.
    pub fn available(side: Side, config: &Config, executor: &dyn Executor) -> Result<u64, ExecutionError> {
        let command = make_zfs_get_available_command(&config.root(side)).for_side(side, config);
        let output = executor.run(&command)?;
        output
            .stdout
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| ExecutionError::Parse {
                command: command.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }
    pub fn side(&self) -> Side {
        self.side
    }
    pub fn root(&self) -> &str {
        &self.root
    }
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn require_side(&self, expected: Side) -> PlanResult<()> {
        if self.side != expected {
            return Err(PlanError::WrongSide {
                expected,
                found: self.side,
            });
        }
        Ok(())
    }

    fn ignored(&self, subname: &str) -> bool {
        self.config.ignore.contains(subname)
    }

    pub fn get_snapshot_transactions(&self, executor: &dyn Executor) -> PlanResult<TransactionList> {
        collect(self.generate_snapshot_transactions(executor)?)
    }

    pub fn generate_snapshot_transactions<'a>(
        &'a self,
        executor: &'a dyn Executor,
    ) -> PlanResult<impl Iterator<Item = PlanResult<PlanProgress>> + 'a> {
        self.require_side(Side::Source)?;
        let datasets: Vec<&Dataset> = self.datasets.iter().collect();
        Ok(progress(datasets, move |dataset| {
            self.snapshot_from_dataset(dataset, executor)
        }))
    }

    fn snapshot_from_dataset(
        &self,
        dataset: &Dataset,
        executor: &dyn Executor,
    ) -> PlanResult<Option<Vec<Transaction>>> {
        if self.ignored(dataset.subname()) {
            debug!("`{}` is ignored", dataset.name());
            return Ok(None);
        }
        if dataset.is_unmounted_filesystem() {
            debug!("`{}` has no mountpoint", dataset.name());
            return Ok(None);
        }
        if !dataset.changed(&self.config, executor)? {
            debug!("`{}` is unchanged", dataset.name());
            return Ok(None);
        }
        Ok(Some(vec![dataset.snapshot_transaction(&self.config)?]))
    }

    /// Transfers of every source snapshot missing on the target, followed by the target
    /// property transactions.
    pub fn get_backup_transactions(&self, other: &Zpool) -> PlanResult<TransactionList> {
        let mut transactions = collect(self.generate_backup_transactions(other)?)?;
        transactions.extend(self.get_target_property_transactions());
        Ok(transactions)
    }

    pub fn generate_backup_transactions<'a>(
        &'a self,
        other: &'a Zpool,
    ) -> PlanResult<impl Iterator<Item = PlanResult<PlanProgress>> + 'a> {
        self.require_side(Side::Source)?;
        other.require_side(Side::Target)?;
        let merged = ComparisonZpool::from_zpools(Some(self), Some(other)).into_merged();
        Ok(progress(merged, move |item| self.backup_from_item(item)))
    }

    fn backup_from_item(&self, item: ComparisonItem<'_, Dataset>) -> PlanResult<Option<Vec<Transaction>>> {
        let subname = item.item().subname();
        if self.ignored(subname) {
            return Ok(None);
        }
        let Some(dataset) = item.a() else {
            return Ok(None);
        };

        let tagging = self.config.compatibility.tagging;
        let comparison =
            ComparisonDataset::from_item(item, tagging).map_err(|e| e.in_dataset(dataset.name()))?;
        let head = comparison
            .a_disjoint_head()
            .map_err(|e| e.in_dataset(dataset.name()))?;
        if head.is_empty() {
            return Ok(None);
        }
        debug!("{} snapshot(s) of `{}` to transfer", head.len(), dataset.name());

        let mut transactions = Vec::with_capacity(head.len());
        for snapshot in head {
            let ancestor = dataset.ancestor_of(snapshot, tagging);
            let intermediates = comparison.a_intermediates(snapshot.name()).len();
            transactions.push(snapshot.backup_transaction(ancestor, intermediates, &self.config)?);
            if tagging {
                transactions.push(snapshot.tag_transaction(&self.config)?);
            }
        }
        Ok(Some(transactions))
    }

    /// One-time settings on the target root requested by the compatibility options.
    pub fn get_target_property_transactions(&self) -> Vec<Transaction> {
        let compatibility = &self.config.compatibility;
        let root = self.config.root(Side::Target);
        [
            (compatibility.target_samba_noshare, "sharesmb", "off"),
            (compatibility.target_autosnapshot_ignore, "com.sun:auto-snapshot", "false"),
        ]
        .into_iter()
        .filter(|(enabled, _, _)| *enabled)
        .map(|(_, property, value)| {
            Transaction::new(
                TransactionMeta::new(TransactionKind::SetProperty)
                    .with(MetaField::DatasetSubname, "")
                    .with(MetaField::Property, property)
                    .with(MetaField::Value, value),
                make_zfs_set_command(property, value, &root).for_side(Side::Target, &self.config),
            )
        })
        .collect()
    }

    /// Destroy what retention allows on this side, with `other` as the control side.
    pub fn get_cleanup_transactions(&self, other: &Zpool) -> PlanResult<TransactionList> {
        collect(self.generate_cleanup_transactions(other)?)
    }

    pub fn generate_cleanup_transactions<'a>(
        &'a self,
        other: &'a Zpool,
    ) -> PlanResult<impl Iterator<Item = PlanResult<PlanProgress>> + 'a> {
        other.require_side(self.side.other())?;
        let merged = if self.side == Side::Target && self.config.keep_backlog == KeepBacklog::All {
            debug!("keeping the whole backlog, nothing to clean up");
            Vec::new()
        } else {
            ComparisonZpool::from_zpools(Some(self), Some(other)).into_merged()
        };
        Ok(progress(merged, move |item| self.cleanup_from_item(item)))
    }

    fn cleanup_from_item(&self, item: ComparisonItem<'_, Dataset>) -> PlanResult<Option<Vec<Transaction>>> {
        if self.ignored(item.item().subname()) || !item.complete() {
            return Ok(None);
        }
        let Some(dataset) = item.a() else {
            return Ok(None);
        };

        let comparison = ComparisonDataset::from_item(item, self.config.compatibility.tagging)
            .map_err(|e| e.in_dataset(dataset.name()))?;
        let (candidates, keep) = match self.side {
            Side::Source => (comparison.a_overlap_tail(), self.config.keep_snapshots),
            Side::Target => {
                let KeepBacklog::Count(keep) = self.config.keep_backlog else {
                    return Ok(None);
                };
                // Without a common snapshot the whole target chain is backlog of nothing.
                if !comparison.overlaps() {
                    return Ok(None);
                }
                (comparison.a_disjoint_tail(), keep)
            }
        };
        let mut candidates = candidates.map_err(|e| e.in_dataset(dataset.name()))?;
        candidates.truncate(candidates.len().saturating_sub(keep));
        if candidates.is_empty() {
            return Ok(None);
        }
        debug!("{} snapshot(s) of `{}` to destroy", candidates.len(), dataset.name());

        Ok(Some(
            candidates
                .into_iter()
                .map(|snapshot| snapshot.cleanup_transaction(&self.config))
                .collect(),
        ))
    }

    /// Every dataset followed by its snapshots, with presence on this side (`a`) and `other` (`b`).
    pub fn comparison_rows(&self, other: Option<&Zpool>) -> PlanResult<Vec<ComparisonRow>> {
        let mut rows = Vec::new();
        for item in ComparisonZpool::from_zpools(Some(self), other).merged() {
            let dataset = item.item();
            rows.push(ComparisonRow {
                name: dataset.subname().to_owned(),
                is_snapshot: false,
                a: item.a().is_some(),
                b: item.b().is_some(),
            });
            let comparison = ComparisonDataset::from_item(item, self.config.compatibility.tagging)
                .map_err(|e| e.in_dataset(dataset.name()))?;
            rows.extend(comparison.merged().map(|snapshot| ComparisonRow {
                name: snapshot.item().name().to_owned(),
                is_snapshot: true,
                a: snapshot.a().is_some(),
                b: snapshot.b().is_some(),
            }));
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SnapshotOrder {
    createtxg: Option<i64>,
    creation: Option<i64>,
    position: usize,
}

fn progress<'a, T: 'a>(
    items: Vec<T>,
    plan: impl Fn(T) -> PlanResult<Option<Vec<Transaction>>> + 'a,
) -> impl Iterator<Item = PlanResult<PlanProgress>> + 'a {
    std::iter::once(Ok(PlanProgress::Total(items.len()))).chain(
        items
            .into_iter()
            .enumerate()
            .map(move |(index, item)| {
                plan(item).map(|transactions| PlanProgress::Item { index, transactions })
            }),
    )
}

fn collect(progress: impl Iterator<Item = PlanResult<PlanProgress>>) -> PlanResult<TransactionList> {
    let mut list = TransactionList::new();
    for step in progress {
        if let PlanProgress::Item {
            transactions: Some(transactions),
            ..
        } = step?
        {
            list.extend(transactions);
        }
    }
    Ok(list)
}
