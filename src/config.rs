//! Typed configuration, loaded from TOML and validated once before any planning happens.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::zfs_types::Side;

/// How many target-only snapshots beyond the overlap with the source to retain.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "i64", into = "i64")]
pub enum KeepBacklog {
    #[default]
    All,
    Count(usize),
}
impl TryFrom<i64> for KeepBacklog {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(KeepBacklog::All),
            n if n >= 0 => usize::try_from(n)
                .map(KeepBacklog::Count)
                .map_err(|e| e.to_string()),
            n => Err(format!("keep_backlog must be -1 or at least 0, got {n}")),
        }
    }
}
impl From<KeepBacklog> for i64 {
    fn from(value: KeepBacklog) -> Self {
        match value {
            KeepBacklog::All => -1,
            KeepBacklog::Count(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SideConfig {
    pub zpool: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub port: u16,
    /// Shell command piped after `zfs send` (source) or before `zfs receive` (target).
    #[serde(default)]
    pub processing: String,
}
impl SideConfig {
    pub fn is_local(&self) -> bool {
        self.host == "localhost"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Compatibility {
    /// Work around snapshots created by other tools on the source side.
    #[serde(default)]
    pub tagging: bool,
    #[serde(default)]
    pub target_samba_noshare: bool,
    #[serde(default)]
    pub target_autosnapshot_ignore: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    #[serde(default)]
    pub compression: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Snapshots always kept on the source side. At least one.
    #[serde(default = "default_keep_snapshots")]
    pub keep_snapshots: usize,
    #[serde(default)]
    pub keep_backlog: KeepBacklog,
    #[serde(default)]
    pub suffix: String,
    #[serde(default = "default_digits")]
    pub digits: u32,
    #[serde(default)]
    pub always_changed: bool,
    /// Bytes written after which a dataset counts as changed without diffing it.
    #[serde(default = "default_written_threshold")]
    pub written_threshold: u64,
    #[serde(default = "default_true")]
    pub check_diff: bool,
    #[serde(default)]
    pub ignore: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub include_root: bool,

    pub source: SideConfig,
    pub target: SideConfig,
    #[serde(default)]
    pub compatibility: Compatibility,
    #[serde(default)]
    pub ssh: SshConfig,
}

fn default_host() -> String {
    "localhost".to_owned()
}
fn default_keep_snapshots() -> usize {
    1
}
fn default_digits() -> u32 {
    2
}
fn default_written_threshold() -> u64 {
    1024 * 1024
}
fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn side(&self, side: Side) -> &SideConfig {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    /// The zpool joined with the optional prefix, e.g. `tank/backup`.
    pub fn root(&self, side: Side) -> String {
        let side = self.side(side);
        join(&side.zpool, &side.prefix)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for side in [Side::Source, Side::Target] {
            let c = self.side(side);
            if c.zpool.trim().is_empty() {
                return Err(invalid(format!("{side}.zpool"), "must not be empty"));
            }
            if c.host.trim().is_empty() {
                return Err(invalid(format!("{side}.host"), "must not be empty"));
            }
        }
        if self.keep_snapshots < 1 {
            return Err(invalid("keep_snapshots".to_owned(), "must be at least 1"));
        }
        if self.digits < 1 || self.digits > 9 {
            return Err(invalid("digits".to_owned(), "must be between 1 and 9"));
        }
        if !self
            .suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid(
                "suffix".to_owned(),
                "may only contain letters, digits and underscores",
            ));
        }
        if self.written_threshold == 0 {
            return Err(invalid("written_threshold".to_owned(), "must be positive"));
        }
        if self.ignore.iter().any(|name| name.is_empty()) {
            return Err(invalid("ignore".to_owned(), "entries must not be empty"));
        }
        if self.ssh.cipher.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("ssh.cipher".to_owned(), "must not be empty if set"));
        }
        Ok(())
    }
}

fn invalid(field: String, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

/// Join dataset path elements, ignoring empty ones and stray slashes.
pub fn join(root: &str, rest: &str) -> String {
    [root, rest]
        .iter()
        .map(|s| s.trim_matches(|c: char| c == '/' || c.is_whitespace()))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `name` relative to `root`: `""` for the root itself, `None` if outside of it.
pub fn strip_root<'a>(root: &str, name: &'a str) -> Option<&'a str> {
    match name.strip_prefix(root)? {
        "" => Some(""),
        rest => rest.strip_prefix('/'),
    }
}
