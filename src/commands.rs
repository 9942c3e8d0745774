use crate::command::Command;

/// The property marking snapshots this tool created, under tagging compatibility.
pub const MARKER_PROPERTY: &str = "poolsync:type";
pub const MARKER_VALUE: &str = "backup";

pub fn make_zfs_get_all_command(root: &str) -> Command {
    // Recursive from the root down, properties in parsable form.
    Command::new(["zfs", "get", "all", "-r", "-p", "--json", "--json-int", root])
}
pub fn make_zfs_get_available_command(root: &str) -> Command {
    Command::new(["zfs", "get", "available", "-H", "-p", "-o", "value", root])
}
pub fn make_zfs_diff_command(snapshot: &str) -> Command {
    Command::new(["zfs", "diff", snapshot])
}
pub fn make_zfs_snapshot_command(snapshot: &str, tag: bool) -> Command {
    let mut args = vec!["zfs".to_owned(), "snapshot".to_owned()];
    if tag {
        args.extend(["-o".to_owned(), format!("{MARKER_PROPERTY}={MARKER_VALUE}")]);
    }
    args.push(snapshot.to_owned());
    Command::new(args)
}
pub fn make_zfs_destroy_command(snapshot: &str) -> Command {
    Command::new(["zfs", "destroy", snapshot])
}
pub fn make_zfs_send_command(snapshot: &str, ancestor: Option<&str>) -> Command {
    match ancestor {
        None => Command::new(["zfs", "send", "-c", snapshot]),
        Some(ancestor) => Command::new(["zfs", "send", "-c", "-i", ancestor, snapshot]),
    }
}
pub fn make_zfs_receive_command(dataset: &str) -> Command {
    Command::new(["zfs", "receive", dataset])
}
pub fn make_zfs_set_command(property: &str, value: &str, entity: &str) -> Command {
    Command::new(["zfs".to_owned(), "set".to_owned(), format!("{property}={value}"), entity.to_owned()])
}
pub fn make_processing_command(script: &str) -> Command {
    Command::new(["sh", "-c", script])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_is_incremental_with_ancestor() {
        assert_eq!(
            make_zfs_send_command("tank/a@2", Some("tank/a@1")).stages()[0],
            vec!["zfs", "send", "-c", "-i", "tank/a@1", "tank/a@2"]
        );
        assert_eq!(
            make_zfs_send_command("tank/a@1", None).stages()[0],
            vec!["zfs", "send", "-c", "tank/a@1"]
        );
    }

    #[test]
    fn snapshot_carries_marker_when_tagging() {
        assert_eq!(
            make_zfs_snapshot_command("tank/a@1", true).stages()[0],
            vec!["zfs", "snapshot", "-o", "poolsync:type=backup", "tank/a@1"]
        );
        assert_eq!(
            make_zfs_snapshot_command("tank/a@1", false).stages()[0],
            vec!["zfs", "snapshot", "tank/a@1"]
        );
    }
}
