//! Planned side effects and their execution.
//!
//! A [`Transaction`] wraps one [`Command`] plus descriptive metadata and moves once from
//! pending through running to complete. A [`TransactionList`] runs its transactions in
//! order and stops at the first failure; nothing already applied is rolled back.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

use tracing::{error, info};

use crate::command::Command;
use crate::error::ExecutionError;
use crate::executor::Executor;
use crate::property::PropertyValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Snapshot,
    TransferSnapshot,
    TransferSnapshotIncremental,
    TagSnapshot,
    CleanupSnapshot,
    SetProperty,
}
impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Snapshot => "snapshot",
            TransactionKind::TransferSnapshot => "transfer_snapshot",
            TransactionKind::TransferSnapshotIncremental => "transfer_snapshot_incremental",
            TransactionKind::TagSnapshot => "tag_snapshot",
            TransactionKind::CleanupSnapshot => "cleanup_snapshot",
            TransactionKind::SetProperty => "set_property",
        }
    }
}
impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata keys. Declaration order is column order when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaField {
    Type,
    DatasetSubname,
    SnapshotSubparent,
    AncestorName,
    SnapshotName,
    Intermediates,
    Written,
    Property,
    Value,
}
impl MetaField {
    pub fn as_str(self) -> &'static str {
        match self {
            MetaField::Type => "type",
            MetaField::DatasetSubname => "dataset_subname",
            MetaField::SnapshotSubparent => "snapshot_subparent",
            MetaField::AncestorName => "ancestor_name",
            MetaField::SnapshotName => "snapshot_name",
            MetaField::Intermediates => "intermediates",
            MetaField::Written => "written",
            MetaField::Property => "property",
            MetaField::Value => "value",
        }
    }
}

/// Human readable description of a transaction. Always has a type.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMeta {
    kind: TransactionKind,
    fields: BTreeMap<MetaField, PropertyValue>,
}
impl TransactionMeta {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: MetaField, value: impl Into<PropertyValue>) -> Self {
        if field != MetaField::Type {
            self.fields.insert(field, value.into());
        }
        self
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn get(&self, field: MetaField) -> Option<PropertyValue> {
        match field {
            MetaField::Type => Some(PropertyValue::Text(self.kind.as_str().to_owned())),
            field => self.fields.get(&field).cloned(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = MetaField> + '_ {
        std::iter::once(MetaField::Type).chain(self.fields.keys().copied())
    }

    pub fn len(&self) -> usize {
        self.fields.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Running,
    Complete,
}

/// Notifications for whoever subscribed to a [`TransactionList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    /// A transaction became part of an observed list.
    Linked { index: usize },
    Started { index: usize },
    Finished { index: usize, failed: bool },
    Cleared,
}

#[derive(Debug, Clone)]
struct Observer {
    index: usize,
    sender: Sender<TransactionEvent>,
}
impl Observer {
    fn notify(&self, event: TransactionEvent) {
        // A subscriber that went away is not our problem.
        let _ = self.sender.send(event);
    }
}

#[derive(Debug)]
pub struct Transaction {
    meta: TransactionMeta,
    command: Command,
    state: TransactionState,
    error: Option<ExecutionError>,
    observer: Option<Observer>,
}
impl Transaction {
    pub fn new(meta: TransactionMeta, command: Command) -> Self {
        Self {
            meta,
            command,
            state: TransactionState::Pending,
            error: None,
            observer: None,
        }
    }

    pub fn meta(&self) -> &TransactionMeta {
        &self.meta
    }
    pub fn command(&self) -> &Command {
        &self.command
    }
    pub fn state(&self) -> TransactionState {
        self.state
    }
    pub fn running(&self) -> bool {
        self.state == TransactionState::Running
    }
    pub fn complete(&self) -> bool {
        self.state == TransactionState::Complete
    }
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    /// Run the command once. Repeated calls after completion do nothing.
    pub fn run(&mut self, executor: &dyn Executor) {
        if self.state != TransactionState::Pending {
            return;
        }

        self.state = TransactionState::Running;
        if let Some(observer) = &self.observer {
            observer.notify(TransactionEvent::Started {
                index: observer.index,
            });
        }

        self.error = executor.run(&self.command).err();

        self.state = TransactionState::Complete;
        if let Some(observer) = &self.observer {
            observer.notify(TransactionEvent::Finished {
                index: observer.index,
                failed: self.error.is_some(),
            });
        }
    }

    fn link(&mut self, index: usize, sender: Sender<TransactionEvent>) {
        let observer = Observer { index, sender };
        observer.notify(TransactionEvent::Linked { index });
        self.observer = Some(observer);
    }
}

#[derive(Debug, Default)]
pub struct TransactionList {
    transactions: Vec<Transaction>,
    sender: Option<Sender<TransactionEvent>>,
}
impl TransactionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<&Transaction> {
        self.transactions.get(index)
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    /// Receive events for every current and future transaction of this list. Replaces any
    /// earlier subscription.
    pub fn subscribe(&mut self) -> Receiver<TransactionEvent> {
        let (sender, receiver) = channel();
        for (index, transaction) in self.transactions.iter_mut().enumerate() {
            transaction.link(index, sender.clone());
        }
        self.sender = Some(sender);
        receiver
    }

    pub fn push(&mut self, mut transaction: Transaction) {
        if let Some(sender) = &self.sender {
            transaction.link(self.transactions.len(), sender.clone());
        }
        self.transactions.push(transaction);
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
        if let Some(sender) = &self.sender {
            let _ = sender.send(TransactionEvent::Cleared);
        }
    }

    /// Union of metadata keys over all transactions, type first.
    pub fn table_columns(&self) -> Vec<MetaField> {
        let columns: BTreeSet<MetaField> = self
            .transactions
            .iter()
            .flat_map(|transaction| transaction.meta.keys())
            .collect();
        columns.into_iter().collect()
    }

    /// Run all transactions in order, stopping at the first failure.
    pub fn run(&mut self, executor: &dyn Executor) -> Result<(), ExecutionError> {
        for transaction in &mut self.transactions {
            if transaction.complete() {
                match transaction.error() {
                    Some(e) => return Err(e.clone()),
                    None => continue,
                }
            }

            info!("({}) {}", transaction.meta.kind(), transaction.command);
            transaction.run(executor);

            if let Some(e) = transaction.error() {
                error!("FAILED: {}", e);
                return Err(e.clone());
            }
            info!("OK");
        }
        Ok(())
    }
}
impl Extend<Transaction> for TransactionList {
    fn extend<I: IntoIterator<Item = Transaction>>(&mut self, iter: I) {
        for transaction in iter {
            self.push(transaction);
        }
    }
}
impl FromIterator<Transaction> for TransactionList {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}
impl<'a> IntoIterator for &'a TransactionList {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Plain text table, one row per transaction.
impl fmt::Display for TransactionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.table_columns();
        let mut rows: Vec<Vec<String>> = vec![columns.iter().map(|c| c.as_str().to_owned()).collect()];
        for transaction in &self.transactions {
            rows.push(
                columns
                    .iter()
                    .map(|c| {
                        transaction
                            .meta
                            .get(*c)
                            .map(|v| v.to_string())
                            .unwrap_or_default()
                    })
                    .collect(),
            );
        }

        let mut widths = vec![0; columns.len()];
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        for row in rows {
            let line: Vec<String> = row
                .iter()
                .zip(widths.iter().copied())
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingExecutor;

    fn transaction(name: &str) -> Transaction {
        Transaction::new(
            TransactionMeta::new(TransactionKind::CleanupSnapshot)
                .with(MetaField::SnapshotName, name),
            Command::new(["zfs", "destroy", name]),
        )
    }

    #[test]
    fn meta_always_has_type_first() {
        let meta = TransactionMeta::new(TransactionKind::Snapshot)
            .with(MetaField::Written, 10_i64)
            .with(MetaField::DatasetSubname, "a")
            .with(MetaField::Type, "ignored");

        assert_eq!(
            meta.keys().collect::<Vec<_>>(),
            vec![MetaField::Type, MetaField::DatasetSubname, MetaField::Written]
        );
        assert_eq!(meta.get(MetaField::Type), Some("snapshot".into()));
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn run_moves_through_states_once() {
        let executor = RecordingExecutor::default();
        let mut t = transaction("tank@1");
        assert_eq!(t.state(), TransactionState::Pending);

        t.run(&executor);
        assert!(t.complete());
        assert!(t.error().is_none());

        t.run(&executor);
        assert_eq!(executor.commands().len(), 1);
    }

    #[test]
    fn failure_is_captured_not_raised() {
        let executor = RecordingExecutor::failing_at(0);
        let mut t = transaction("tank@1");

        t.run(&executor);
        assert!(t.complete());
        assert!(matches!(t.error(), Some(ExecutionError::Failed { .. })));
    }

    #[test]
    fn list_stops_after_first_failure() {
        let executor = RecordingExecutor::failing_at(1);
        let mut list: TransactionList = ["tank@1", "tank@2", "tank@3"]
            .into_iter()
            .map(transaction)
            .collect();

        assert!(list.run(&executor).is_err());
        assert_eq!(executor.commands().len(), 2);
        assert!(list.get(0).and_then(Transaction::error).is_none());
        assert!(list.get(1).and_then(Transaction::error).is_some());
        assert_eq!(list.get(2).map(Transaction::state), Some(TransactionState::Pending));
    }

    #[test]
    fn subscribers_see_existing_and_new_transactions() {
        let executor = RecordingExecutor::default();
        let mut list = TransactionList::new();
        list.push(transaction("tank@1"));
        let events = list.subscribe();
        list.push(transaction("tank@2"));

        list.run(&executor).unwrap();
        list.clear();

        let events: Vec<_> = events.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TransactionEvent::Linked { index: 0 },
                TransactionEvent::Linked { index: 1 },
                TransactionEvent::Started { index: 0 },
                TransactionEvent::Finished { index: 0, failed: false },
                TransactionEvent::Started { index: 1 },
                TransactionEvent::Finished { index: 1, failed: false },
                TransactionEvent::Cleared,
            ]
        );
    }

    #[test]
    fn renders_table_with_type_column_first() {
        let mut list = TransactionList::new();
        list.push(transaction("tank@1"));
        list.push(Transaction::new(
            TransactionMeta::new(TransactionKind::Snapshot).with(MetaField::Written, 2048_i64),
            Command::new(["zfs", "snapshot", "tank@2"]),
        ));

        let table = list.to_string();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("type"));
        assert!(lines[0].contains("snapshot_name"));
        assert!(lines[0].contains("written"));
        assert!(lines[1].starts_with("cleanup_snapshot"));
        assert!(lines[2].contains("2048"));
    }
}
