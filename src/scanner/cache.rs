use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::timeline::Timeline;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct FileFingerprint {
    mtime_nanos: i128,
    size: u64,
}

struct CachedFile {
    fingerprint: FileFingerprint,
    timeline: Timeline,
}

/// Keyed by absolute file path with `(mtime, size)` as the invalidation key —
/// a stat is cheap, a reparse only happens when either changes.
#[derive(Default)]
pub struct FileCache {
    entries: Mutex<HashMap<PathBuf, CachedFile>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint_of(path: &std::path::Path) -> Option<FileFingerprint> {
        let meta = std::fs::metadata(path).ok()?;
        let mtime = meta.modified().ok()?;
        let mtime_nanos = mtime
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_nanos() as i128;
        Some(FileFingerprint {
            mtime_nanos,
            size: meta.len(),
        })
    }

    /// Returns the cached timeline if the file's `(mtime, size)` hasn't
    /// changed since it was last parsed.
    pub async fn get_if_fresh(&self, path: &std::path::Path) -> Option<Timeline> {
        let fingerprint = Self::fingerprint_of(path)?;
        let entries = self.entries.lock().await;
        let cached = entries.get(path)?;
        (cached.fingerprint == fingerprint).then(|| cached.timeline.clone())
    }

    pub async fn put(&self, path: PathBuf, timeline: Timeline) {
        if let Some(fingerprint) = Self::fingerprint_of(&path) {
            self.entries
                .lock()
                .await
                .insert(path, CachedFile { fingerprint, timeline });
        }
    }
}

/// Caches aggregate per-project/per-day totals for a short TTL to absorb
/// repeated HTTP polling without re-walking the whole archive each time.
pub struct AggregateCache<T: Clone> {
    ttl: Duration,
    entry: Mutex<Option<(Instant, String, T)>>,
}

impl<T: Clone> AggregateCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        let guard = self.entry.lock().await;
        let (at, cached_key, value) = guard.as_ref()?;
        if cached_key == key && at.elapsed() < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub async fn put(&self, key: String, value: T) {
        *self.entry.lock().await = Some((Instant::now(), key, value));
    }
}

pub fn default_aggregate_ttl() -> Duration {
    Duration::from_secs(120)
}
