//! Byte cache for preview images, keyed by URL.
//!
//! Two tiers: a byte-bounded in-memory LRU in front of a best-effort disk
//! tier. Memory hits are free, disk hits are promoted back into memory, and
//! writes go through to both tiers. Both budgets default to 1 GB.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use lru::LruCache;
use parking_lot::Mutex;

const DEFAULT_MEMORY_BYTES: usize = 1024 * 1024 * 1024;
const DEFAULT_DISK_BYTES: u64 = 1024 * 1024 * 1024;

/// Shared preview byte cache.
pub struct ImagePreviewCache {
    memory: Mutex<MemoryTier>,
    disk: Option<DiskTier>,
}

struct MemoryTier {
    entries: LruCache<String, Arc<Vec<u8>>>,
    current_bytes: usize,
    max_bytes: usize,
}

struct DiskTier {
    dir: PathBuf,
    max_bytes: u64,
}

impl ImagePreviewCache {
    /// Cache with default budgets, backed by
    /// `<cache_dir>/loopview/previews` when the platform has a cache
    /// directory (memory-only otherwise).
    pub fn shared() -> Arc<Self> {
        let disk_dir = dirs::cache_dir().map(|dir| dir.join("loopview").join("previews"));
        Arc::new(Self::with_limits(
            DEFAULT_MEMORY_BYTES,
            disk_dir,
            DEFAULT_DISK_BYTES,
        ))
    }

    /// Cache with explicit budgets. `disk_dir = None` disables the disk tier.
    pub fn with_limits(memory_bytes: usize, disk_dir: Option<PathBuf>, disk_bytes: u64) -> Self {
        let disk = disk_dir.and_then(|dir| {
            if let Err(err) = fs::create_dir_all(&dir) {
                tracing::warn!("Preview disk cache disabled: {err}");
                return None;
            }
            Some(DiskTier {
                dir,
                max_bytes: disk_bytes,
            })
        });
        Self {
            memory: Mutex::new(MemoryTier {
                entries: LruCache::unbounded(),
                current_bytes: 0,
                max_bytes: memory_bytes.max(1),
            }),
            disk,
        }
    }

    /// Cached bytes for `url`, if present in either tier. A disk hit is
    /// promoted into the memory tier.
    pub fn get(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(bytes) = self.memory.lock().entries.get(url).cloned() {
            return Some(bytes);
        }
        let disk = self.disk.as_ref()?;
        let bytes = fs::read(disk.path_for(url)).ok()?;
        let bytes = Arc::new(bytes);
        self.insert_memory(url, bytes.clone());
        Some(bytes)
    }

    /// Store `bytes` under `url` in both tiers.
    pub fn put(&self, url: &str, bytes: Arc<Vec<u8>>) {
        if let Some(disk) = &self.disk {
            disk.write(url, &bytes);
        }
        self.insert_memory(url, bytes);
    }

    /// Bytes currently held in memory.
    pub fn memory_bytes(&self) -> usize {
        self.memory.lock().current_bytes
    }

    fn insert_memory(&self, url: &str, bytes: Arc<Vec<u8>>) {
        let mut tier = self.memory.lock();
        let size = bytes.len();
        if size > tier.max_bytes {
            return;
        }
        if let Some(old) = tier.entries.pop(url) {
            tier.current_bytes -= old.len();
        }
        while tier.current_bytes + size > tier.max_bytes {
            match tier.entries.pop_lru() {
                Some((_, evicted)) => tier.current_bytes -= evicted.len(),
                None => break,
            }
        }
        tier.entries.put(url.to_string(), bytes);
        tier.current_bytes += size;
    }
}

impl DiskTier {
    fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(blake3::hash(url.as_bytes()).to_hex().as_str())
    }

    fn write(&self, url: &str, bytes: &[u8]) {
        let path = self.path_for(url);
        if let Err(err) = fs::write(&path, bytes) {
            tracing::warn!("Failed to write preview to disk cache: {err}");
            return;
        }
        self.enforce_budget();
    }

    /// Drop oldest files until under budget. Best effort: unreadable
    /// metadata is skipped rather than treated as fatal.
    fn enforce_budget(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        let mut files: Vec<(PathBuf, u64, SystemTime)> = entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                let modified = meta.modified().ok()?;
                Some((entry.path(), meta.len(), modified))
            })
            .collect();

        let mut total: u64 = files.iter().map(|(_, len, _)| len).sum();
        if total <= self.max_bytes {
            return;
        }
        files.sort_by_key(|(_, _, modified)| *modified);
        for (path, len, _) in files {
            if total <= self.max_bytes {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                total = total.saturating_sub(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(n: usize, fill: u8) -> Arc<Vec<u8>> {
        Arc::new(vec![fill; n])
    }

    #[test]
    fn memory_tier_round_trip() {
        let cache = ImagePreviewCache::with_limits(1024, None, 0);
        assert!(cache.get("a").is_none());
        cache.put("a", bytes(100, 1));
        assert_eq!(cache.get("a").unwrap().len(), 100);
        assert_eq!(cache.memory_bytes(), 100);
    }

    #[test]
    fn memory_tier_evicts_least_recently_used() {
        let cache = ImagePreviewCache::with_limits(250, None, 0);
        cache.put("a", bytes(100, 1));
        cache.put("b", bytes(100, 2));
        // Touch "a" so "b" is the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.put("c", bytes(100, 3));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.memory_bytes() <= 250);
    }

    #[test]
    fn oversized_entry_is_not_cached_in_memory() {
        let cache = ImagePreviewCache::with_limits(10, None, 0);
        cache.put("big", bytes(100, 1));
        assert!(cache.get("big").is_none());
        assert_eq!(cache.memory_bytes(), 0);
    }

    #[test]
    fn replacing_an_entry_updates_byte_accounting() {
        let cache = ImagePreviewCache::with_limits(1024, None, 0);
        cache.put("a", bytes(100, 1));
        cache.put("a", bytes(50, 2));
        assert_eq!(cache.memory_bytes(), 50);
        assert_eq!(cache.get("a").unwrap().len(), 50);
    }

    #[test]
    fn disk_tier_serves_after_memory_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache =
            ImagePreviewCache::with_limits(100, Some(dir.path().to_path_buf()), 1024 * 1024);
        cache.put("a", bytes(80, 1));
        // Evict "a" from memory.
        cache.put("b", bytes(80, 2));
        assert_eq!(cache.get("a").unwrap().len(), 80);
    }

    #[test]
    fn disk_budget_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImagePreviewCache::with_limits(10, Some(dir.path().to_path_buf()), 200);
        for i in 0..10u8 {
            cache.put(&format!("url-{i}"), bytes(50, i));
        }
        let total: u64 = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok()?.metadata().ok().map(|m| m.len()))
            .sum();
        assert!(total <= 200);
    }
}
