use std::collections::BTreeMap;

use crate::commands::*;
use crate::config::{join, strip_root, Config};
use crate::error::{PlanError, PlanResult};
use crate::property::Property;
use crate::transaction::{MetaField, Transaction, TransactionKind, TransactionMeta};
use crate::zfs_types::{DatasetName, PropertyRow, Side, SnapshotFullName, SnapshotName};

/// A snapshot as discovered on one side. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Snapshot {
    name: SnapshotName,
    parent: DatasetName,
    // Parent relative to the side's root.
    subparent: String,
    properties: BTreeMap<String, Property>,
    side: Side,
}

// Snapshots on different sides are the same snapshot if they sit at the same place in
// the tree under the same name.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.subparent == other.subparent && self.name == other.name
    }
}
impl Eq for Snapshot {}

impl Snapshot {
    /// Build from the discovery rows of `full_name`. `None` if it is not a snapshot below `root`.
    pub fn from_rows<'r>(
        full_name: &str,
        rows: impl IntoIterator<Item = &'r PropertyRow>,
        side: Side,
        root: &str,
    ) -> Option<Self> {
        let (parent, name) = full_name.split_once('@')?;
        let subparent = strip_root(root, parent)?;
        let properties = rows
            .into_iter()
            .map(|row| {
                let property = Property::from_params(&row.property, &row.value, &row.source);
                (property.name.clone(), property)
            })
            .collect();
        Some(Self {
            name: name.to_owned(),
            parent: parent.to_owned(),
            subparent: subparent.to_owned(),
            properties,
            side,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> &str {
        &self.parent
    }
    pub fn subparent(&self) -> &str {
        &self.subparent
    }
    pub fn side(&self) -> Side {
        self.side
    }
    pub fn full_name(&self) -> SnapshotFullName {
        format!("{}@{}", self.parent, self.name)
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Like [`Self::get`], with an absent property standing in for a missing one.
    pub fn property(&self, name: &str) -> Property {
        self.get(name).cloned().unwrap_or_else(|| Property::absent(name))
    }

    /// Whether this tool created the snapshot, as far as tagging compatibility is concerned.
    pub fn is_marked(&self) -> bool {
        self.get(MARKER_PROPERTY)
            .and_then(Property::text)
            .is_some_and(|value| value == MARKER_VALUE)
    }

    /// The snapshot right before this one in `context`, which must contain it.
    pub fn ancestor<'a>(&self, context: &'a [Snapshot]) -> Option<&'a Snapshot> {
        let index = context.iter().position(|snapshot| snapshot == self)?;
        context.get(index.checked_sub(1)?)
    }

    /// Destroy this snapshot on its own side.
    pub fn cleanup_transaction(&self, config: &Config) -> Transaction {
        Transaction::new(
            TransactionMeta::new(TransactionKind::CleanupSnapshot)
                .with(MetaField::SnapshotSubparent, self.subparent.as_str())
                .with(MetaField::SnapshotName, self.name.as_str()),
            make_zfs_destroy_command(&self.full_name()).for_side(self.side, config),
        )
    }

    /// Send this source snapshot into the matching target dataset, incrementally from
    /// `ancestor` if given. `intermediates` is the number of foreign snapshots folded into
    /// this one, and only reported under tagging compatibility.
    pub fn backup_transaction(
        &self,
        ancestor: Option<&Snapshot>,
        intermediates: usize,
        config: &Config,
    ) -> PlanResult<Transaction> {
        self.require_source()?;

        let target_dataset = join(&config.root(Side::Target), &self.subparent);
        let ancestor_name = ancestor.map(Snapshot::full_name);

        let mut send = make_zfs_send_command(&self.full_name(), ancestor_name.as_deref());
        if !config.source.processing.is_empty() {
            send = send | make_processing_command(&config.source.processing);
        }
        let mut receive = make_zfs_receive_command(&target_dataset);
        if !config.target.processing.is_empty() {
            receive = make_processing_command(&config.target.processing) | receive;
        }
        let command = send.for_side(Side::Source, config) | receive.for_side(Side::Target, config);

        let kind = match ancestor {
            None => TransactionKind::TransferSnapshot,
            Some(_) => TransactionKind::TransferSnapshotIncremental,
        };
        let mut meta = TransactionMeta::new(kind)
            .with(MetaField::SnapshotSubparent, self.subparent.as_str())
            .with(MetaField::AncestorName, ancestor.map_or("", Snapshot::name))
            .with(MetaField::SnapshotName, self.name.as_str());
        if config.compatibility.tagging {
            meta = meta.with(
                MetaField::Intermediates,
                i64::try_from(intermediates).unwrap_or(i64::MAX),
            );
        }
        if let Some(written) = self.property("written").integer() {
            meta = meta.with(MetaField::Written, written);
        }
        Ok(Transaction::new(meta, command))
    }

    /// Set the marker on the received copy of this source snapshot.
    pub fn tag_transaction(&self, config: &Config) -> PlanResult<Transaction> {
        self.require_source()?;

        let target = format!(
            "{}@{}",
            join(&config.root(Side::Target), &self.subparent),
            self.name
        );
        Ok(Transaction::new(
            TransactionMeta::new(TransactionKind::TagSnapshot)
                .with(MetaField::SnapshotSubparent, self.subparent.as_str())
                .with(MetaField::SnapshotName, self.name.as_str()),
            make_zfs_set_command(MARKER_PROPERTY, MARKER_VALUE, &target).for_side(Side::Target, config),
        ))
    }

    fn require_source(&self) -> PlanResult<()> {
        if self.side != Side::Source {
            return Err(PlanError::WrongSide {
                expected: Side::Source,
                found: self.side,
            });
        }
        Ok(())
    }
}
