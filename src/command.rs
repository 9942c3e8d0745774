use std::ffi::OsString;

use shell_quote::QuoteInto;

use crate::config::{Config, SideConfig, SshConfig};
use crate::zfs_types::Side;

/// A description of a command pipeline: one argument vector per stage, stdout of each
/// stage feeding stdin of the next. Nothing here runs anything; see [`crate::executor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    stages: Vec<Vec<String>>,
}
impl Command {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: vec![args.into_iter().map(Into::into).collect()],
        }
    }

    pub fn stages(&self) -> &[Vec<String>] {
        &self.stages
    }

    /// Append `other`'s stages, as `self | other`.
    pub fn pipe(mut self, other: Command) -> Self {
        self.stages.extend(other.stages);
        self
    }

    /// Wrap into `ssh` unless the side is local. The whole pipeline runs remotely.
    pub fn on_side(self, side: &SideConfig, ssh: &SshConfig) -> Self {
        if side.is_local() {
            return self;
        }

        let mut c = vec!["ssh".to_owned(), "-T".to_owned()];
        if side.port != 0 {
            c.extend(["-p".to_owned(), side.port.to_string()]);
        }
        c.extend([
            "-o".to_owned(),
            if ssh.compression {
                "Compression=yes".to_owned()
            } else {
                "Compression=no".to_owned()
            },
        ]);
        if let Some(cipher) = &ssh.cipher {
            c.extend(["-c".to_owned(), cipher.clone()]);
        }
        if side.user.is_empty() {
            c.push(side.host.clone());
        } else {
            c.push(format!("{}@{}", side.user, side.host));
        }
        c.push(self.to_string());
        Self { stages: vec![c] }
    }

    pub fn for_side(self, side: Side, config: &Config) -> Self {
        self.on_side(config.side(side), &config.ssh)
    }
}
impl std::ops::BitOr for Command {
    type Output = Command;

    fn bitor(self, rhs: Command) -> Command {
        self.pipe(rhs)
    }
}
impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = OsString::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if index > 0 {
                s.push(" | ");
            }
            for (position, arg) in stage.iter().enumerate() {
                if position > 0 {
                    s.push(" ");
                }
                shell_quote::Sh::quote_into(arg.as_str(), &mut s);
            }
        }
        f.write_str(&String::from_utf8_lossy(s.as_encoded_bytes()))
    }
}
