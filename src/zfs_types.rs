use std::collections::BTreeMap;

use serde::Deserialize;

// E.g. `tank/backup/home@2026101901_daily`
pub type SnapshotFullName = String;
// E.g. `2026101901_daily`
pub type SnapshotName = String;
// E.g. `tank/backup/home`
pub type DatasetName = String;

/// Which of the two pools an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}
impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}
impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Side::Source => "source",
            Side::Target => "target",
        })
    }
}

/// One `(entity, property, value, source)` line of tree discovery, in the raw text form
/// `zfs get -H -p` would print it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRow {
    pub entity: String,
    pub property: String,
    pub value: String,
    pub source: String,
}
impl PropertyRow {
    pub fn new(entity: &str, property: &str, value: &str, source: &str) -> Self {
        Self {
            entity: entity.to_owned(),
            property: property.to_owned(),
            value: value.to_owned(),
            source: source.to_owned(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatasetType {
    #[serde(rename = "FILESYSTEM")]
    Filesystem,
    #[serde(rename = "VOLUME")]
    Volume,
    #[serde(rename = "SNAPSHOT")]
    Snapshot,
    #[serde(rename = "BOOKMARK")]
    Bookmark,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    None,
    Default,
    Local,
    Inherited,
    Received,
    Temporary,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PropertySource {
    #[serde(rename = "type")]
    pub sourcetype: SourceType,
    #[serde(default)]
    pub data: String,
}
impl PropertySource {
    /// The source column as the tab separated `zfs get` output spells it.
    fn to_text(&self) -> String {
        match self.sourcetype {
            SourceType::None => "-".to_owned(),
            SourceType::Default => "default".to_owned(),
            SourceType::Local => "local".to_owned(),
            SourceType::Received => "received".to_owned(),
            SourceType::Temporary => "temporary".to_owned(),
            SourceType::Inherited => format!("inherited from {}", self.data),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ZfsProperty {
    pub value: serde_json::Value,
    pub source: PropertySource,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ZfsEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub datasettype: DatasetType,
    #[serde(default)]
    pub createtxg: Option<serde_json::Value>,
    #[serde(default)]
    pub properties: BTreeMap<String, ZfsProperty>,
}

/// Output of `zfs get all -r -p --json --json-int <root>`.
#[derive(Deserialize, Debug, Clone)]
pub struct ZfsGetOutput {
    #[serde(default)]
    pub datasets: BTreeMap<String, ZfsEntity>,
}
impl ZfsGetOutput {
    /// Flatten into discovery rows. Bookmarks are not part of the tree.
    pub fn into_rows(self) -> Vec<PropertyRow> {
        let mut rows = Vec::new();
        for (name, entity) in self.datasets {
            if entity.datasettype == DatasetType::Bookmark {
                continue;
            }
            if !entity.properties.contains_key("createtxg") {
                if let Some(createtxg) = &entity.createtxg {
                    rows.push(PropertyRow {
                        entity: name.clone(),
                        property: "createtxg".to_owned(),
                        value: json_scalar_to_text(createtxg),
                        source: "-".to_owned(),
                    });
                }
            }
            for (property, value) in entity.properties {
                rows.push(PropertyRow {
                    entity: name.clone(),
                    property,
                    value: json_scalar_to_text(&value.value),
                    source: value.source.to_text(),
                });
            }
        }
        rows
    }
}

fn json_scalar_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_owned(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"{
        "output_version": {"command": "zfs get", "vers_major": 0, "vers_minor": 1},
        "datasets": {
            "tank/data": {
                "name": "tank/data", "type": "FILESYSTEM", "pool": "tank", "createtxg": 12,
                "properties": {
                    "written": {"value": 4096, "source": {"type": "NONE", "data": "-"}},
                    "mountpoint": {"value": "/data", "source": {"type": "INHERITED", "data": "tank"}}
                }
            },
            "tank/data@2026101901": {
                "name": "tank/data@2026101901", "type": "SNAPSHOT", "pool": "tank", "createtxg": 40,
                "dataset": "tank/data", "snapshot_name": "2026101901",
                "properties": {
                    "poolsync:type": {"value": "backup", "source": {"type": "LOCAL", "data": "-"}}
                }
            },
            "tank/data#mark": {
                "name": "tank/data#mark", "type": "BOOKMARK", "createtxg": 40, "properties": {}
            }
        }
    }"#;

    #[test]
    fn flattens_json_into_rows() {
        let output: ZfsGetOutput = serde_json::from_str(OUTPUT).unwrap();
        let rows = output.into_rows();

        assert!(rows.contains(&PropertyRow::new("tank/data", "createtxg", "12", "-")));
        assert!(rows.contains(&PropertyRow::new("tank/data", "written", "4096", "-")));
        assert!(rows.contains(&PropertyRow::new(
            "tank/data",
            "mountpoint",
            "/data",
            "inherited from tank"
        )));
        assert!(rows.contains(&PropertyRow::new(
            "tank/data@2026101901",
            "poolsync:type",
            "backup",
            "local"
        )));
        assert!(rows.iter().all(|row| !row.entity.contains('#')));
    }

    #[test]
    fn side_display_and_other() {
        assert_eq!(Side::Source.to_string(), "source");
        assert_eq!(Side::Source.other(), Side::Target);
        assert_eq!(Side::Target.other(), Side::Source);
    }
}
