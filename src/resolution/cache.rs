use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::feed::ItemId;
use crate::util::atomic_write;

/// Name the metadata service writes while it is still working on an id.
/// Such entries are not real resolutions and are never cached.
pub const IN_PROGRESS_SENTINEL: &str = "获取中...";

const MAX_SNAPSHOT_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read or write snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid snapshot JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Snapshot is not a JSON object keyed by item id")]
    NotAnObject,
    #[error("Snapshot too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}

/// Resolved secondary metadata for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInfo {
    pub name: String,
    pub category_id: Option<u64>,
}

impl CategoryInfo {
    pub fn new(name: impl Into<String>, category_id: Option<u64>) -> Self {
        Self {
            name: name.into(),
            category_id,
        }
    }
}

#[derive(Serialize)]
struct SnapshotEntry<'a> {
    name: &'a str,
    id: Option<u64>,
}

/// Process-wide item id → category map.
///
/// Seeded from a snapshot at startup and grown by the poller. An entry is
/// written once and never replaced.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<ItemId, CategoryInfo>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the snapshot format `{"<id>": {"name": ..., "id": ...}}`.
    ///
    /// Entries with a non-numeric key, without a `name`/`id` pair (status
    /// records), or carrying the in-progress sentinel are skipped.
    pub fn from_snapshot_str(json: &str) -> Result<Self, SnapshotError> {
        let root: Value = serde_json::from_str(json)?;
        let Value::Object(map) = root else {
            return Err(SnapshotError::NotAnObject);
        };

        let mut entries = HashMap::with_capacity(map.len());
        let mut skipped = 0usize;
        for (key, entry) in map {
            match parse_snapshot_entry(&key, &entry) {
                Some((id, info)) => {
                    entries.insert(id, info);
                }
                None => skipped += 1,
            }
        }

        tracing::debug!(loaded = entries.len(), skipped, "Parsed resolution snapshot");
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    /// Loads a snapshot file. A missing file yields an empty cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, over the size limit, or
    /// not a JSON object.
    pub fn load_snapshot(path: &Path) -> Result<Self, SnapshotError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No resolution snapshot, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.len() > MAX_SNAPSHOT_SIZE {
            return Err(SnapshotError::TooLarge {
                size: metadata.len(),
                max: MAX_SNAPSHOT_SIZE,
            });
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        Self::from_snapshot_str(&content)
    }

    pub fn get(&self, id: ItemId) -> Option<CategoryInfo> {
        self.entries.read().get(&id).cloned()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Records a resolution. Returns false if the id was already cached, in
    /// which case the existing entry is kept.
    pub fn insert(&self, id: ItemId, info: CategoryInfo) -> bool {
        if info.name == IN_PROGRESS_SENTINEL {
            return false;
        }
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, info);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Serializes the cache in snapshot format with ids in ascending order.
    pub fn to_snapshot_string(&self) -> Result<String, SnapshotError> {
        let entries = self.entries.read();
        let ordered: BTreeMap<u64, SnapshotEntry<'_>> = entries
            .iter()
            .map(|(id, info)| {
                (
                    id.0,
                    SnapshotEntry {
                        name: &info.name,
                        id: info.category_id,
                    },
                )
            })
            .collect();
        Ok(serde_json::to_string_pretty(&ordered)?)
    }

    /// Writes the snapshot atomically so a crash never leaves a torn file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails. The previous
    /// snapshot is left intact either way.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = self.to_snapshot_string()?;
        atomic_write(path, json.as_bytes())?;
        tracing::info!(path = %path.display(), entries = self.len(), "Saved resolution snapshot");
        Ok(())
    }
}

fn parse_snapshot_entry(key: &str, entry: &Value) -> Option<(ItemId, CategoryInfo)> {
    let id: ItemId = key.parse().ok()?;
    let obj = entry.as_object()?;
    let name = obj.get("name")?.as_str()?.trim();
    if name.is_empty() || name == IN_PROGRESS_SENTINEL {
        return None;
    }
    let category_id = match obj.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Some((id, CategoryInfo::new(name, category_id)))
}
