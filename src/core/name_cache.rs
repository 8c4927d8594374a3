use crate::models::catalog::{Metadata, ResultCode};
use crate::models::error::SError;
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NameEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ResultCode,
    /// Seconds since the unix epoch when the entry was last fetched.
    pub timestamp: u64,
    /// The name this entry carried before a refresh replaced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl NameEntry {
    fn from_metadata(meta: &Metadata) -> Self {
        Self {
            name: meta.title.clone(),
            description: meta.description.clone(),
            status: meta.result,
            timestamp: now_secs(),
            original_name: None,
        }
    }
}

/// id -> display name, persisted as JSON between sessions.
#[derive(Default, Clone, Debug)]
pub struct NameCache {
    path: Option<Utf8PathBuf>,
    entries: BTreeMap<String, NameEntry>,
}

impl NameCache {
    /// Loads the cache at `path`. A missing or corrupt file yields an empty
    /// cache bound to the same path, so the next save replaces it.
    pub fn load(path: &Utf8Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("discarding unreadable name cache {path}: {e}");
                BTreeMap::new()
            }),
            Err(_) => {
                debug!("no name cache at {path}");
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    pub fn save(&self) -> Result<(), SError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        FileUtils::write_atomic(path, &text)
    }

    pub fn get(&self, id: &str) -> Option<&NameEntry> {
        self.entries.get(id)
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.get(id).map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids whose last lookup did not return a real title.
    pub fn stale_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.status != ResultCode::Found)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn missing<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        ids.into_iter()
            .filter(|id| !self.entries.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Ids worth asking the catalog about: never looked up, or looked up
    /// without getting a real title back.
    pub fn refresh_targets<'a>(&self, scanned: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        let mut ids = self.missing(scanned);
        ids.extend(self.stale_ids());
        ids.sort();
        ids.dedup();
        ids
    }

    /// Stores fetched metadata. A placeholder never overwrites a real name.
    /// When a name changes, the previous one is kept as `original_name`.
    pub fn merge<'a>(&mut self, fetched: impl IntoIterator<Item = &'a Metadata>) -> usize {
        let mut updated = 0;
        for meta in fetched {
            let mut next = NameEntry::from_metadata(meta);
            match self.entries.get(&meta.id) {
                Some(prev) if prev.status == ResultCode::Found && meta.is_placeholder() => continue,
                Some(prev) if prev.name != next.name => {
                    next.original_name = Some(
                        prev.original_name
                            .clone()
                            .unwrap_or_else(|| prev.name.clone()),
                    );
                }
                Some(prev) => next.original_name = prev.original_name.clone(),
                None => {}
            }
            self.entries.insert(meta.id.clone(), next);
            updated += 1;
        }
        updated
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
