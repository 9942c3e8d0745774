use std::collections::BTreeSet;
use std::io::Write;

use poolsync::config::{Compatibility, Config, KeepBacklog, SideConfig, SshConfig};
use poolsync::error::ConfigError;
use poolsync::zfs_types::Side;

fn populated() -> Config {
    Config {
        keep_snapshots: 3,
        keep_backlog: KeepBacklog::Count(7),
        suffix: "_daily".to_owned(),
        digits: 3,
        always_changed: true,
        written_threshold: 4096,
        check_diff: false,
        ignore: BTreeSet::from(["scratch".to_owned(), "vm/swap".to_owned()]),
        include_root: false,
        source: SideConfig {
            zpool: "tank".to_owned(),
            prefix: "data".to_owned(),
            host: "localhost".to_owned(),
            user: String::new(),
            port: 0,
            processing: "lz4 -c".to_owned(),
        },
        target: SideConfig {
            zpool: "backup".to_owned(),
            prefix: "laptop/data".to_owned(),
            host: "nas.local".to_owned(),
            user: "root".to_owned(),
            port: 2222,
            processing: "lz4 -dc".to_owned(),
        },
        compatibility: Compatibility {
            tagging: true,
            target_samba_noshare: true,
            target_autosnapshot_ignore: true,
        },
        ssh: SshConfig {
            compression: true,
            cipher: Some("aes256-gcm@openssh.com".to_owned()),
        },
    }
}

#[test]
fn populated_config_survives_round_trip() {
    let config = populated();

    let text = config.to_toml().unwrap();
    let parsed = Config::from_toml(&text).unwrap();

    assert_eq!(parsed, config);
}

#[test]
fn keep_all_backlog_survives_round_trip() {
    let mut config = populated();
    config.keep_backlog = KeepBacklog::All;
    config.ssh.cipher = None;

    let text = config.to_toml().unwrap();
    assert!(text.contains("keep_backlog = -1"));
    assert_eq!(Config::from_toml(&text).unwrap(), config);
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(populated().to_toml().unwrap().as_bytes())
        .unwrap();

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.root(Side::Source), "tank/data");
    assert_eq!(config.root(Side::Target), "backup/laptop/data");
}

#[test]
fn reports_missing_file_and_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::load(&dir.path().join("missing.toml")),
        Err(ConfigError::Io(_))
    ));

    let mut config = populated();
    config.digits = 0;
    let text = config.to_toml().unwrap();
    assert!(matches!(
        Config::from_toml(&text),
        Err(ConfigError::Invalid { field, .. }) if field == "digits"
    ));

    assert!(matches!(
        Config::from_toml("keep_backlog = -5\n[source]\nzpool = \"a\"\n[target]\nzpool = \"b\"\n"),
        Err(ConfigError::Parse(_))
    ));
}
