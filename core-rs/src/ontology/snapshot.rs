/**
 * snapshot.rs
 * Persisted ontology snapshot
 *
 * A compact JSON rendition of the registry used to materialize entities
 * lazily after a restart, before the ontology files are parsed again. Only
 * the fields needed to answer lookups are persisted; everything else is
 * filled when the full ontology is (re)loaded.
 */

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNamespace {
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotClass {
    pub name: String,
    #[serde(default)]
    pub super_classes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotProperty {
    pub name: String,
    pub domain: String,
    pub range: String,
    #[serde(default)]
    pub max_cardinality: Option<i32>,
    #[serde(default)]
    pub inverse_functional: bool,
    #[serde(default)]
    pub fulltext_indexed: bool,
    #[serde(default)]
    pub domain_indexes: Vec<String>,
}

/// Snapshot tables keyed by entity URI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologySnapshot {
    #[serde(default)]
    pub namespaces: HashMap<String, SnapshotNamespace>,
    #[serde(default)]
    pub classes: HashMap<String, SnapshotClass>,
    #[serde(default)]
    pub properties: HashMap<String, SnapshotProperty>,
}

impl OntologySnapshot {
    pub fn load(path: &Path) -> Result<OntologySnapshot> {
        let content = fs::read_to_string(path)?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
