//! Error types for alignment, planning, execution and configuration.

use thiserror::Error;

use crate::zfs_types::Side;

/// The two snapshot chains (or a chain and its counterpart) cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("no common snapshot, chains start at `{a}` and `{b}`: history has diverged")]
    NoOverlap { a: String, b: String },
    #[error("gap in snapshot series after `{after}`")]
    Gap { after: String },
    #[error("inconsistent snapshot names: `{a}` aligned with `{b}`")]
    NameMismatch { a: String, b: String },
    #[error("last element `{name}` of the other side is not part of this side")]
    MissingAnchor { name: String },
    #[error("no clean match between the other side and the head of this side at `{name}`")]
    HeadMismatch { name: String },
    #[error("no clean match in overlap area starting at `{name}`")]
    OverlapMismatch { name: String },
    #[error("duplicate name `{name}`")]
    DuplicateName { name: String },
    #[error("sequence is not consecutive")]
    NotConsecutive,
}
impl AlignmentError {
    pub fn in_dataset(self, dataset: &str) -> PlanError {
        PlanError::Alignment {
            dataset: dataset.to_owned(),
            source: self,
        }
    }
}

/// Too many snapshots for one day with the configured number of digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("more than {max} snapshots per day on `{dataset}` for {date}")]
pub struct CapacityError {
    pub dataset: String,
    pub date: String,
    pub max: u64,
}

/// A command could not be run, or finished unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },
    #[error("running command failed with {status:?}: `{command}`\nStderr:\n{stderr}")]
    Failed {
        command: String,
        status: Vec<Option<i32>>,
        stderr: String,
    },
    #[error("failed to interpret output of `{command}`: {reason}")]
    Parse { command: String, reason: String },
}

/// Anything that can go wrong while turning two pools into transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("cannot align snapshots of `{dataset}`: {source}")]
    Alignment {
        dataset: String,
        #[source]
        source: AlignmentError,
    },
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("operation requires the {expected} side, got {found}")]
    WrongSide { expected: Side, found: Side },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value in field `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

pub type PlanResult<T> = Result<T, PlanError>;
