//! Render context construction.
//!
//! Templates see the entity's attributes at the top level, plus three
//! reserved variables describing the entity itself:
//!
//! | Variable | Contents |
//! |----------|----------|
//! | `name`   | entity name |
//! | `group`  | entity group |
//! | `tags`   | entity tags, sorted |
//!
//! An attribute named `name`, `group` or `tags` in the source of truth is
//! shadowed by the reserved variable.

use std::collections::BTreeMap;

use serde::Serialize;

use hydrant_core::{EntityName, EntityRecord};

use crate::error::EngineError;

/// Flat view of one entity record, ready to serialize into a Tera context.
#[derive(Debug, Clone, Serialize)]
pub struct EntityContext {
    #[serde(flatten)]
    attributes: BTreeMap<String, serde_json::Value>,
    name: String,
    group: String,
    tags: Vec<String>,
}

impl EntityContext {
    pub fn from_record(record: &EntityRecord) -> Self {
        EntityContext {
            attributes: record.attributes.clone(),
            name: record.name.0.clone(),
            group: record.group.0.clone(),
            tags: record.tags.iter().cloned().collect(),
        }
    }

    pub fn entity(&self) -> EntityName {
        EntityName::from(self.name.clone())
    }

    pub fn to_context(&self) -> Result<tera::Context, EngineError> {
        tera::Context::from_serialize(self).map_err(|e| EngineError::Context {
            entity: self.entity(),
            source: e,
        })
    }
}
