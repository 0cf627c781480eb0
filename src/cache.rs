//! Advisory campaign snapshots used only for the first paint.
//!
//! Nothing read from here is ever treated as authoritative: the synchronizer
//! replaces it with the first successful server read. Failures are logged and
//! reported as misses.

use crate::campaign::{Campaign, CampaignId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Called inline from every applied cycle, so implementations must be cheap
/// and must not block for long.
pub trait SnapshotCache: Send + Sync {
    fn read(&self, id: &CampaignId) -> Option<Campaign>;

    fn store(&self, campaign: &Campaign);

    fn invalidate(&self, id: &CampaignId);
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CampaignId, Campaign>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for MemoryCache {
    fn read(&self, id: &CampaignId) -> Option<Campaign> {
        self.entries.lock().ok()?.get(id).cloned()
    }

    fn store(&self, campaign: &Campaign) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(campaign.id.clone(), campaign.clone());
        }
    }

    fn invalidate(&self, id: &CampaignId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(id);
        }
    }
}

/// One JSON file per campaign under a directory.
///
/// Writes only happen when the campaign differs from the last copy this
/// instance wrote or read, so a steady poll does no file I/O.
pub struct FileCache {
    dir: PathBuf,
    written: Mutex<HashMap<CampaignId, Campaign>>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Mutex::new(HashMap::new()),
        }
    }

    fn is_current(&self, campaign: &Campaign) -> bool {
        self.written
            .lock()
            .map(|written| written.get(&campaign.id) == Some(campaign))
            .unwrap_or(false)
    }

    fn remember(&self, campaign: &Campaign) {
        if let Ok(mut written) = self.written.lock() {
            written.insert(campaign.id.clone(), campaign.clone());
        }
    }

    fn forget(&self, id: &CampaignId) {
        if let Ok(mut written) = self.written.lock() {
            written.remove(id);
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &CampaignId) -> PathBuf {
        let safe: String = id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("campaign-{}.json", safe))
    }
}

impl SnapshotCache for FileCache {
    fn read(&self, id: &CampaignId) -> Option<Campaign> {
        let path = self.entry_path(id);
        let raw = fs::read_to_string(&path).ok()?;

        match serde_json::from_str::<Campaign>(&raw) {
            Ok(campaign) if &campaign.id == id => {
                self.remember(&campaign);
                Some(campaign)
            }
            Ok(_) => {
                tracing::debug!("Cache entry {} belongs to another campaign", path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry {}: {}", path.display(), e);
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    fn store(&self, campaign: &Campaign) {
        if self.is_current(campaign) {
            return;
        }

        let path = self.entry_path(&campaign.id);
        let result = fs::create_dir_all(&self.dir)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string(campaign).map_err(|e| e.to_string()))
            .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));

        match result {
            Ok(()) => self.remember(campaign),
            Err(e) => tracing::warn!("Failed to write cache entry {}: {}", path.display(), e),
        }
    }

    fn invalidate(&self, id: &CampaignId) {
        self.forget(id);
        let path = self.entry_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove cache entry {}: {}", path.display(), e),
        }
    }
}
