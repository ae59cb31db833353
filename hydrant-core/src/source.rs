//! YAML-backed source of truth.
//!
//! The document is a flat mapping of entity name to attributes. `group` is
//! required and selects the overlay layer; `tags` is optional and feeds tag
//! selection; everything else is passed to templates untouched.
//!
//! ```yaml
//! version: 1
//! entities:
//!   edge-us-east:
//!     group: prod
//!     tags: [critical, east]
//!     region: us-east1
//!     replicas: 3
//!   edge-eu-west:
//!     group: Staging
//!     tags: "west, canary"
//!     region: eu-west4
//! ```
//!
//! Tags may be a YAML sequence or a comma-separated string; both forms parse
//! to the same set.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{source_io_err, SourceError};
use crate::types::{EntityName, EntityRecord, GroupName, SourceOfTruth};
use crate::hash;

const GROUP_KEY: &str = "group";
const TAGS_KEY: &str = "tags";

#[derive(Debug, Deserialize)]
struct SotDocument {
    #[serde(default = "default_version")]
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    entities: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

fn default_version() -> u32 {
    1
}

/// Read and parse the source of truth at `path`.
pub fn load(path: &Path) -> Result<SourceOfTruth, SourceError> {
    let raw = fs::read(path).map_err(|e| source_io_err(path, e))?;
    parse(&raw, path)
}

/// Parse raw document bytes. `origin` only labels errors.
pub fn parse(raw: &[u8], origin: &Path) -> Result<SourceOfTruth, SourceError> {
    let doc: SotDocument = serde_yaml::from_slice(raw).map_err(|e| SourceError::Parse {
        path: origin.to_path_buf(),
        source: e,
    })?;

    let mut entities = BTreeMap::new();
    for (name, mut attrs) in doc.entities {
        let name = EntityName::from(name);
        let group = take_group(&name, &mut attrs)?;
        let tags = take_tags(&name, &mut attrs)?;
        let mut attributes = BTreeMap::new();
        for (key, value) in attrs {
            let value = serde_json::to_value(&value).map_err(|e| SourceError::MalformedEntity {
                entity: name.clone(),
                detail: format!("attribute '{key}' is not plain data: {e}"),
            })?;
            attributes.insert(key, value);
        }
        entities.insert(
            name.clone(),
            EntityRecord {
                name,
                group,
                tags,
                attributes,
            },
        );
    }

    Ok(SourceOfTruth::new(entities, hash::sha256_hex(raw)))
}

fn take_group(
    name: &EntityName,
    attrs: &mut BTreeMap<String, serde_yaml::Value>,
) -> Result<GroupName, SourceError> {
    match attrs.remove(GROUP_KEY) {
        Some(serde_yaml::Value::String(s)) if !s.trim().is_empty() => {
            Ok(GroupName::from(s.trim().to_string()))
        }
        Some(serde_yaml::Value::String(_)) | Some(serde_yaml::Value::Null) | None => {
            Err(SourceError::MissingGroup {
                entity: name.clone(),
            })
        }
        Some(other) => Err(SourceError::MalformedEntity {
            entity: name.clone(),
            detail: format!("'group' must be a string, got: {other:?}"),
        }),
    }
}

fn take_tags(
    name: &EntityName,
    attrs: &mut BTreeMap<String, serde_yaml::Value>,
) -> Result<BTreeSet<String>, SourceError> {
    let mut tags = BTreeSet::new();
    match attrs.remove(TAGS_KEY) {
        None | Some(serde_yaml::Value::Null) => {}
        Some(serde_yaml::Value::String(s)) => {
            for tag in s.split(',') {
                let tag = tag.trim();
                if !tag.is_empty() {
                    tags.insert(tag.to_string());
                }
            }
        }
        Some(serde_yaml::Value::Sequence(items)) => {
            for item in items {
                match item {
                    serde_yaml::Value::String(s) if !s.trim().is_empty() => {
                        tags.insert(s.trim().to_string());
                    }
                    other => {
                        return Err(SourceError::MalformedEntity {
                            entity: name.clone(),
                            detail: format!("'tags' entries must be strings, got: {other:?}"),
                        })
                    }
                }
            }
        }
        Some(other) => {
            return Err(SourceError::MalformedEntity {
                entity: name.clone(),
                detail: format!("'tags' must be a list or comma-separated string, got: {other:?}"),
            })
        }
    }
    Ok(tags)
}
