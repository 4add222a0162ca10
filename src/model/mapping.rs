use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::SyncError;

/// Status label derived from local task state, keyed into the column mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VirtualTag {
    Waiting,
    Active,
    Week,
    Tomorrow,
    Completed,
}

impl VirtualTag {
    pub const ALL: [VirtualTag; 5] = [
        VirtualTag::Waiting,
        VirtualTag::Active,
        VirtualTag::Week,
        VirtualTag::Tomorrow,
        VirtualTag::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VirtualTag::Waiting => "WAITING",
            VirtualTag::Active => "ACTIVE",
            VirtualTag::Week => "WEEK",
            VirtualTag::Tomorrow => "TOMORROW",
            VirtualTag::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for VirtualTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A board-side object referenced by a mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub id: i64,
    pub name: String,
}

impl RemoteRef {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One-to-one dictionary between local aliases and board ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasMap<K: Ord> {
    entries: BTreeMap<K, RemoteRef>,
}

impl<K: Ord> Default for AliasMap<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone + fmt::Display> AliasMap<K> {
    /// Adds an entry, rejecting an alias or a board id that is already taken.
    pub fn insert(
        &mut self,
        dictionary: &'static str,
        alias: K,
        remote: RemoteRef,
    ) -> Result<(), SyncError> {
        if let Some(existing) = self.entries.get(&alias) {
            return Err(SyncError::DuplicateMapping {
                dictionary,
                detail: format!("alias {alias} already maps to {}", existing.name),
            });
        }
        if let Some(owner) = self.alias_for(remote.id) {
            return Err(SyncError::DuplicateMapping {
                dictionary,
                detail: format!("{} ({}) is already mapped to {owner}", remote.name, remote.id),
            });
        }
        self.entries.insert(alias, remote);
        Ok(())
    }

    /// Re-checks id uniqueness, e.g. after deserializing a stored table.
    pub fn validate(&self, dictionary: &'static str) -> Result<(), SyncError> {
        let mut seen: BTreeMap<i64, &K> = BTreeMap::new();
        for (alias, remote) in &self.entries {
            if let Some(other) = seen.insert(remote.id, alias) {
                return Err(SyncError::DuplicateMapping {
                    dictionary,
                    detail: format!("{} ({}) is mapped to both {other} and {alias}", remote.name, remote.id),
                });
            }
        }
        Ok(())
    }
}

impl<K: Ord> AliasMap<K> {
    pub fn remote_for<Q>(&self, alias: &Q) -> Option<&RemoteRef>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(alias)
    }

    pub fn alias_for(&self, id: i64) -> Option<&K> {
        self.entries
            .iter()
            .find(|(_, remote)| remote.id == id)
            .map(|(alias, _)| alias)
    }

    pub fn contains<Q>(&self, alias: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.contains_key(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &RemoteRef)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Translation between board dimensions and local attributes for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingTable {
    #[serde(default)]
    pub columns: AliasMap<VirtualTag>,
    #[serde(default)]
    pub swimlanes: AliasMap<String>,
    #[serde(default)]
    pub categories: AliasMap<String>,
}

impl MappingTable {
    pub fn validate(&self) -> Result<(), SyncError> {
        self.columns.validate("column")?;
        self.swimlanes.validate("swimlane")?;
        self.categories.validate("category")?;
        Ok(())
    }

    pub fn column_id(&self, tag: VirtualTag) -> Option<i64> {
        self.columns.remote_for(&tag).map(|r| r.id)
    }

    pub fn tag_for_column(&self, column_id: i64) -> Option<VirtualTag> {
        self.columns.alias_for(column_id).copied()
    }
}
