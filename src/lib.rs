#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
#![cfg_attr(
    test,
    allow(clippy::panic, clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)
)]

//! Snapshot, backup and cleanup planning for ZFS dataset trees replicated from a source
//! pool to a target pool.
//!
//! Two [`zpool::Zpool`]s are aligned dataset by dataset and snapshot by snapshot, and the
//! planners turn the alignment into a [`transaction::TransactionList`] of `zfs` commands.
//! Running them goes through an [`executor::Executor`].

pub mod alignment;
pub mod command;
pub mod commands;
pub mod comparison;
pub mod config;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod property;
pub mod snapshot;
pub mod transaction;
pub mod zfs_types;
pub mod zpool;

#[cfg(test)]
mod testing;
