use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::commands::*;
use crate::config::{strip_root, Config};
use crate::error::{CapacityError, ExecutionError, PlanResult};
use crate::executor::Executor;
use crate::property::Property;
use crate::snapshot::Snapshot;
use crate::transaction::{MetaField, Transaction, TransactionKind, TransactionMeta};
use crate::zfs_types::{DatasetName, PropertyRow, Side};

/// A filesystem or volume on one side, owning its snapshots in creation order.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: DatasetName,
    // Name relative to the side's root, `""` for the root itself.
    subname: String,
    properties: BTreeMap<String, Property>,
    snapshots: Vec<Snapshot>,
    side: Side,
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.subname == other.subname
    }
}

impl Dataset {
    /// `snapshots` must already be in creation order.
    pub fn from_rows<'r>(
        name: &str,
        rows: impl IntoIterator<Item = &'r PropertyRow>,
        snapshots: Vec<Snapshot>,
        side: Side,
        root: &str,
    ) -> Option<Self> {
        let subname = strip_root(root, name)?;
        let properties = rows
            .into_iter()
            .map(|row| {
                let property = Property::from_params(&row.property, &row.value, &row.source);
                (property.name.clone(), property)
            })
            .collect();
        Some(Self {
            name: name.to_owned(),
            subname: subname.to_owned(),
            properties,
            snapshots,
            side,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn subname(&self) -> &str {
        &self.subname
    }
    pub fn side(&self) -> Side {
        self.side
    }
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }
    pub fn property(&self, name: &str) -> Property {
        self.get(name).cloned().unwrap_or_else(|| Property::absent(name))
    }

    pub fn is_volume(&self) -> bool {
        self.property("type").text() == Some("volume")
    }

    /// Filesystems without a mountpoint hold no data of their own worth snapshotting.
    pub fn is_unmounted_filesystem(&self) -> bool {
        self.property("type").text() == Some("filesystem")
            && self.property("mountpoint").value.is_none()
    }

    /// The snapshot `snapshot` would be sent incrementally from. Under tagging only marked
    /// snapshots count.
    pub fn ancestor_of(&self, snapshot: &Snapshot, tagging: bool) -> Option<&Snapshot> {
        if !tagging {
            return snapshot.ancestor(&self.snapshots);
        }
        let mut previous = None;
        for candidate in self.snapshots.iter().filter(|s| s.is_marked()) {
            if candidate == snapshot {
                return previous;
            }
            previous = Some(candidate);
        }
        None
    }

    /// Whether anything was written since the latest snapshot. Cheap checks go first, the
    /// `zfs diff` fallback runs on the dataset's side.
    pub fn changed(&self, config: &Config, executor: &dyn Executor) -> Result<bool, ExecutionError> {
        let Some(latest) = self.snapshots.last() else {
            return Ok(true);
        };
        if config.always_changed {
            return Ok(true);
        }
        if config.compatibility.tagging && !latest.is_marked() {
            return Ok(true);
        }

        let written = self.property("written").integer();
        if written == Some(0) {
            return Ok(false);
        }
        if self.is_volume() {
            return Ok(true);
        }
        if written.is_some_and(|w| u64::try_from(w).is_ok_and(|w| w > config.written_threshold)) {
            return Ok(true);
        }
        if !config.check_diff {
            return Ok(true);
        }

        debug!("diffing `{}` against `{}`", self.name, latest.name());
        let output = executor.run(
            &make_zfs_diff_command(&latest.full_name()).for_side(self.side, config),
        )?;
        Ok(!output.stdout.trim().is_empty())
    }

    /// `YYYYMMDD`, then the day's next sequence number padded to `digits`, then the suffix.
    pub fn new_snapshot_name(&self, today: NaiveDate, config: &Config) -> Result<String, CapacityError> {
        let day = today.format("%Y%m%d").to_string();
        let digits = usize::try_from(config.digits).unwrap_or(usize::MAX);
        let max = 10u64.saturating_pow(config.digits).saturating_sub(1);

        let latest = self
            .snapshots
            .iter()
            .filter_map(|snapshot| {
                let number = snapshot
                    .name()
                    .strip_prefix(day.as_str())?
                    .strip_suffix(config.suffix.as_str())?;
                if number.len() != digits || !number.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                number.parse::<u64>().ok()
            })
            .max();

        let number = match latest {
            None => 1,
            Some(n) if n < max => n + 1,
            Some(_) => {
                return Err(CapacityError {
                    dataset: self.name.clone(),
                    date: day,
                    max,
                })
            }
        };
        Ok(format!("{day}{number:0digits$}{}", config.suffix))
    }

    /// Snapshot this dataset under today's next free name.
    pub fn snapshot_transaction(&self, config: &Config) -> PlanResult<Transaction> {
        self.snapshot_transaction_on(chrono::Local::now().date_naive(), config)
    }

    pub fn snapshot_transaction_on(&self, today: NaiveDate, config: &Config) -> PlanResult<Transaction> {
        let name = self.new_snapshot_name(today, config)?;
        let mut meta = TransactionMeta::new(TransactionKind::Snapshot)
            .with(MetaField::DatasetSubname, self.subname.as_str())
            .with(MetaField::SnapshotName, name.as_str());
        if let Some(written) = self.property("written").integer() {
            meta = meta.with(MetaField::Written, written);
        }
        let command = make_zfs_snapshot_command(
            &format!("{}@{}", self.name, name),
            config.compatibility.tagging,
        )
        .for_side(self.side, config);
        Ok(Transaction::new(meta, command))
    }
}
