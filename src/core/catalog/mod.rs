//! Subject Catalog Module
//!
//! Boundary to the botanical catalog that turns a subject id into
//! display metadata. The sync engine never requires a lookup to succeed;
//! an unknown id simply renders as an unidentified entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{CoreResult, SubjectId};

// =============================================================================
// Subject Info
// =============================================================================

/// Display metadata for one botanical subject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInfo {
    /// Catalog id
    pub id: SubjectId,
    /// Common name (e.g. "Neem")
    pub common_name: String,
    /// Scientific name (e.g. "Azadirachta indica")
    pub scientific_name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Traditional/medicinal uses
    #[serde(default)]
    pub uses: String,
}

// =============================================================================
// Catalog Trait
// =============================================================================

/// External catalog collaborator.
pub trait SubjectCatalog: Send + Sync {
    /// Resolves a subject id to its metadata, if the catalog knows it.
    fn get(&self, id: &str) -> Option<SubjectInfo>;
}

// =============================================================================
// In-Memory Catalog
// =============================================================================

/// Catalog backed by a bundled subject list.
pub struct InMemoryCatalog {
    subjects: HashMap<SubjectId, SubjectInfo>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            subjects: HashMap::new(),
        }
    }

    /// Loads a catalog from a JSON array of subjects.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let subjects: Vec<SubjectInfo> = serde_json::from_str(json)?;
        Ok(Self {
            subjects: subjects.into_iter().map(|s| (s.id.clone(), s)).collect(),
        })
    }

    /// Adds a subject.
    pub fn with_subject(mut self, subject: SubjectInfo) -> Self {
        self.subjects.insert(subject.id.clone(), subject);
        self
    }

    /// Number of known subjects.
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SubjectCatalog for InMemoryCatalog {
    fn get(&self, id: &str) -> Option<SubjectInfo> {
        self.subjects.get(id).cloned()
    }
}

// =============================================================================
// Tests
// =============================================================================
