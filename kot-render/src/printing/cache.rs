//! Content cache for rasterized artifacts
//!
//! Keyed by a content-addressed fingerprint:
//! - memory tier: `DashMap`, checked first
//! - durable tier: `{dir}/{fingerprint}.json`, promoted into memory on hit
//!
//! Entries expire `max_age` after creation. Durable-tier failures are
//! logged and treated as a miss; they never fail a render.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use kot_printer::row_stride;

use super::error::CacheError;
use super::profile::{PaperProfile, PaperWidth};
use super::raster::RenderedArtifact;
use super::types::ContentType;

const RECORD_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

/// Temp files older than this were left behind by a writer that died
const STALE_TMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Cache key over canonical content, content type, paper profile, layout
/// settings and scale
///
/// Object keys are sorted recursively, so field order in the producer's
/// JSON does not change the digest.
pub fn fingerprint(
    kind: ContentType,
    width: PaperWidth,
    profile: &PaperProfile,
    layout: &Value,
    scale: f32,
    content: &Value,
) -> String {
    let profile_value = serde_json::to_value(profile).unwrap_or(Value::Null);
    let document = serde_json::json!({
        "type": kind.as_str(),
        "profile": {
            "id": width.as_str(),
            "settings": profile_value,
        },
        "layout": layout,
        "scale": scale,
        "content": content,
    });
    let canonical = canonicalize(&document).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Rebuild a JSON value with every object's keys in sorted order
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// A cached artifact and when it was produced (epoch milliseconds)
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub artifact: Arc<RenderedArtifact>,
    pub created_at: i64,
}

/// On-disk record, one per fingerprint
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheRecord {
    created_at: i64,
    width: u32,
    height: u32,
    bitmap: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheCleanupResult {
    pub removed_count: u32,
    pub freed_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub memory_entries: usize,
}

pub struct ContentCache {
    memory: DashMap<String, CacheEntry>,
    dir: Option<PathBuf>,
    max_age: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    /// Two-tier cache; `dir` is created on first write
    pub fn new(dir: Option<PathBuf>, max_age: Duration) -> Self {
        Self {
            memory: DashMap::new(),
            dir,
            max_age,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn memory_only(max_age: Duration) -> Self {
        Self::new(None, max_age)
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub async fn get(&self, fingerprint: &str) -> Option<Arc<RenderedArtifact>> {
        self.get_at(fingerprint, now_millis()).await
    }

    /// Lookup as of `now` (epoch milliseconds)
    pub async fn get_at(&self, fingerprint: &str, now: i64) -> Option<Arc<RenderedArtifact>> {
        let found = self.lookup(fingerprint, now).await;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(fingerprint = %fingerprint, "Content cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(fingerprint = %fingerprint, "Content cache miss");
        }
        found
    }

    async fn lookup(&self, fingerprint: &str, now: i64) -> Option<Arc<RenderedArtifact>> {
        if let Some(entry) = self.memory.get(fingerprint) {
            if !self.is_expired(entry.created_at, now) {
                return Some(entry.artifact.clone());
            }
        }
        // Expired in memory: drop it, the durable copy is at least as old
        if self
            .memory
            .remove_if(fingerprint, |_, e| self.is_expired(e.created_at, now))
            .is_some()
        {
            tracing::debug!(fingerprint = %fingerprint, "Evicted expired memory entry");
        }

        let dir = self.dir.as_deref()?;
        let path = record_path(dir, fingerprint);
        match read_record(&path, fingerprint).await {
            Ok(Some(entry)) => {
                if self.is_expired(entry.created_at, now) {
                    tracing::debug!(fingerprint = %fingerprint, "Durable entry expired, deleting");
                    remove_quietly(&path).await;
                    return None;
                }
                let artifact = entry.artifact.clone();
                self.memory.insert(fingerprint.to_string(), entry);
                Some(artifact)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "Unreadable cache record, treating as miss"
                );
                if !matches!(e, CacheError::Io(_)) {
                    remove_quietly(&path).await;
                }
                None
            }
        }
    }

    /// Store an artifact in both tiers; last write wins
    pub async fn put(&self, fingerprint: &str, artifact: RenderedArtifact) -> Arc<RenderedArtifact> {
        self.put_at(fingerprint, artifact, now_millis()).await
    }

    /// Store as if created at `created_at` (epoch milliseconds)
    pub async fn put_at(
        &self,
        fingerprint: &str,
        artifact: RenderedArtifact,
        created_at: i64,
    ) -> Arc<RenderedArtifact> {
        let artifact = Arc::new(artifact);
        self.memory.insert(
            fingerprint.to_string(),
            CacheEntry {
                fingerprint: fingerprint.to_string(),
                artifact: artifact.clone(),
                created_at,
            },
        );

        if let Some(dir) = self.dir.as_deref()
            && let Err(e) = write_record(dir, fingerprint, &artifact, created_at).await
        {
            tracing::warn!(
                fingerprint = %fingerprint,
                error = %e,
                "Failed to persist cache record, keeping memory entry only"
            );
        }
        artifact
    }

    /// Wipe both tiers
    pub async fn clear(&self) -> CacheCleanupResult {
        self.memory.clear();
        let result = self.sweep_dir().await;
        tracing::info!(
            removed = result.removed_count,
            freed_bytes = result.freed_bytes,
            "Content cache cleared"
        );
        result
    }

    /// Remove expired entries from both tiers
    pub async fn purge_expired(&self) -> CacheCleanupResult {
        self.purge_expired_at(now_millis()).await
    }

    pub async fn purge_expired_at(&self, now: i64) -> CacheCleanupResult {
        let before = self.memory.len();
        self.memory.retain(|_, e| !self.is_expired(e.created_at, now));
        let memory_removed = before.saturating_sub(self.memory.len());

        let mut result = CacheCleanupResult::default();
        if let Some(dir) = self.dir.as_deref() {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == ErrorKind::NotFound => return result,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read cache directory");
                    return result;
                }
            };
            while let Some(entry) = next_entry(&mut entries).await {
                let path = entry.path();
                let stale = if has_ext(&path, TMP_EXT) {
                    entry
                        .metadata()
                        .await
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .map(|modified| {
                            let modified = chrono::DateTime::<chrono::Utc>::from(modified).timestamp_millis();
                            now.saturating_sub(modified) > STALE_TMP_AGE.as_millis() as i64
                        })
                        .unwrap_or(false)
                } else if let Some(fingerprint) = record_fingerprint(&path) {
                    match read_record(&path, &fingerprint).await {
                        Ok(Some(record)) => self.is_expired(record.created_at, now),
                        Ok(None) => false,
                        Err(_) => true,
                    }
                } else {
                    continue;
                };
                if stale {
                    let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        result.removed_count += 1;
                        result.freed_bytes += size;
                    }
                }
            }
        }

        tracing::info!(
            memory_removed = memory_removed,
            removed = result.removed_count,
            freed_bytes = result.freed_bytes,
            "Content cache purge completed"
        );
        result
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            memory_entries: self.memory.len(),
        }
    }

    fn is_expired(&self, created_at: i64, now: i64) -> bool {
        let age = now.saturating_sub(created_at);
        age > self.max_age.as_millis() as i64
    }

    /// Remove every record and temp file in the durable tier
    async fn sweep_dir(&self) -> CacheCleanupResult {
        let mut result = CacheCleanupResult::default();
        let Some(dir) = self.dir.as_deref() else {
            return result;
        };
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return result,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cache directory");
                return result;
            }
        };
        while let Some(entry) = next_entry(&mut entries).await {
            let path = entry.path();
            if !has_ext(&path, RECORD_EXT) && !has_ext(&path, TMP_EXT) {
                continue;
            }
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    result.removed_count += 1;
                    result.freed_bytes += size;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache file");
                }
            }
        }
        result
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Next directory entry; a listing error ends the sweep with a warning
async fn next_entry(entries: &mut tokio::fs::ReadDir) -> Option<tokio::fs::DirEntry> {
    match entries.next_entry().await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list cache directory, sweep stopped early");
            None
        }
    }
}

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

fn record_path(dir: &Path, fingerprint: &str) -> PathBuf {
    dir.join(format!("{}.{}", fingerprint, RECORD_EXT))
}

/// Fingerprint of a `{fingerprint}.json` path
fn record_fingerprint(path: &Path) -> Option<String> {
    if !has_ext(path, RECORD_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.chars()
        .all(|c| c.is_ascii_hexdigit())
        .then(|| stem.to_string())
}

/// `Ok(None)` when no record exists
async fn read_record(path: &Path, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let record: CacheRecord = serde_json::from_slice(&raw)?;
    let bitmap = BASE64.decode(record.bitmap.as_bytes())?;

    let expected = row_stride(record.width) as usize * record.height as usize;
    if record.width == 0 || record.height == 0 || bitmap.len() != expected {
        return Err(CacheError::Corrupt(format!(
            "{}x{} record carries {} bitmap bytes, expected {}",
            record.width,
            record.height,
            bitmap.len(),
            expected
        )));
    }

    Ok(Some(CacheEntry {
        fingerprint: fingerprint.to_string(),
        artifact: Arc::new(RenderedArtifact {
            raw: None,
            width: record.width,
            height: record.height,
            bitmap,
        }),
        created_at: record.created_at,
    }))
}

/// Write to a unique temp file, then rename over the record
async fn write_record(
    dir: &Path,
    fingerprint: &str,
    artifact: &RenderedArtifact,
    created_at: i64,
) -> Result<(), CacheError> {
    tokio::fs::create_dir_all(dir).await?;

    let record = CacheRecord {
        created_at,
        width: artifact.width,
        height: artifact.height,
        bitmap: BASE64.encode(&artifact.bitmap),
    };
    let json = serde_json::to_vec(&record)?;

    let tmp_path = dir.join(format!("{}.{}.{}", fingerprint, uuid::Uuid::new_v4(), TMP_EXT));
    tokio::fs::write(&tmp_path, &json).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, record_path(dir, fingerprint)).await {
        remove_quietly(&tmp_path).await;
        return Err(e.into());
    }
    tracing::debug!(fingerprint = %fingerprint, bytes = json.len(), "Cache record written");
    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache file");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn artifact() -> RenderedArtifact {
        RenderedArtifact {
            raw: None,
            width: 10,
            height: 2,
            bitmap: vec![0xFF, 0xC0, 0x80, 0x00],
        }
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let profile = PaperProfile::new(576, 48);
        let layout = json!({ "footer": "Thanks" });
        let a = json!({ "header": { "a": 1, "b": [ { "y": 2, "x": 1 } ] }, "items": [] });
        let b = json!({ "items": [], "header": { "b": [ { "x": 1, "y": 2 } ], "a": 1 } });
        assert_eq!(
            fingerprint(ContentType::Ticket, PaperWidth::Mm80, &profile, &layout, 1.0, &a),
            fingerprint(ContentType::Ticket, PaperWidth::Mm80, &profile, &layout, 1.0, &b)
        );
    }

    #[test]
    fn test_fingerprint_depends_on_every_input() {
        let content = json!({ "items": [] });
        let layout = json!({ "footer": "Thanks" });
        let p80 = PaperProfile::new(576, 48);
        let p58 = PaperProfile::new(384, 32);
        let key = |kind, width, profile: &PaperProfile, layout: &Value, scale| {
            fingerprint(kind, width, profile, layout, scale, &content)
        };
        let base = key(ContentType::Ticket, PaperWidth::Mm80, &p80, &layout, 1.0);

        assert_eq!(base.len(), 64);
        assert_ne!(base, key(ContentType::Bill, PaperWidth::Mm80, &p80, &layout, 1.0));
        assert_ne!(base, key(ContentType::Ticket, PaperWidth::Mm58, &p58, &layout, 1.0));
        assert_ne!(base, key(ContentType::Ticket, PaperWidth::Mm80, &p80, &layout, 2.0));
        assert_ne!(
            base,
            key(ContentType::Ticket, PaperWidth::Mm80, &p80, &json!({ "footer": null }), 1.0)
        );
    }

    #[tokio::test]
    async fn test_memory_hit_and_stats() {
        let cache = ContentCache::memory_only(DAY);
        assert!(cache.get("abc").await.is_none());
        cache.put("abc", artifact()).await;
        assert_eq!(*cache.get("abc").await.unwrap(), artifact());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.memory_entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_durable_tier_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let first = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        first.put("deadbeef", artifact()).await;
        assert!(dir.path().join("deadbeef.json").exists());

        let second = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        let loaded = second.get("deadbeef").await.unwrap();
        assert_eq!(loaded.bitmap, artifact().bitmap);
        assert!(loaded.raw.is_none());
        assert_eq!(second.stats().memory_entries, 1);
    }

    #[tokio::test]
    async fn test_record_format() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        cache.put_at("cafe", artifact(), 1_700_000_000_000).await;

        let raw = std::fs::read(dir.path().join("cafe.json")).unwrap();
        let value: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
        assert_eq!(value["width"], 10);
        assert_eq!(value["height"], 2);
        assert_eq!(value["bitmap"], "/8CAAA==");
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().unwrap() == "tmp")
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_expired_durable_entry_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let created = 1_000_000;
        let writer = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        writer.put_at("beef", artifact(), created).await;

        let reader = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        let later = created + DAY.as_millis() as i64 + 1;
        assert!(reader.get_at("beef", later).await.is_none());
        assert!(!dir.path().join("beef.json").exists());
    }

    #[tokio::test]
    async fn test_entry_at_max_age_is_still_valid() {
        let cache = ContentCache::memory_only(DAY);
        cache.put_at("f00d", artifact(), 0).await;
        assert!(cache.get_at("f00d", DAY.as_millis() as i64).await.is_some());
        assert!(cache.get_at("f00d", DAY.as_millis() as i64 + 1).await.is_none());
        assert_eq!(cache.stats().memory_entries, 0);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_miss_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abcd.json"), b"{ not json").unwrap();
        std::fs::write(
            dir.path().join("abce.json"),
            br#"{"createdAt":0,"width":16,"height":4,"bitmap":"AAAA"}"#,
        )
        .unwrap();

        let cache = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        assert!(cache.get_at("abcd", 0).await.is_none());
        assert!(cache.get_at("abce", 0).await.is_none());
        assert!(!dir.path().join("abcd.json").exists());
        assert!(!dir.path().join("abce.json").exists());
    }

    #[tokio::test]
    async fn test_clear_wipes_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        cache.put("aa", artifact()).await;
        cache.put("bb", artifact()).await;
        std::fs::write(dir.path().join("unrelated.txt"), b"keep").unwrap();

        let result = cache.clear().await;
        assert_eq!(result.removed_count, 2);
        assert!(result.freed_bytes > 0);
        assert!(cache.get("aa").await.is_none());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        let day_ms = DAY.as_millis() as i64;
        cache.put_at("01", artifact(), 0).await;
        cache.put_at("02", artifact(), day_ms).await;

        let result = cache.purge_expired_at(day_ms + 10).await;
        assert_eq!(result.removed_count, 1);
        assert!(!dir.path().join("01.json").exists());
        assert!(dir.path().join("02.json").exists());
        assert_eq!(cache.stats().memory_entries, 1);
    }

    #[tokio::test]
    async fn test_purge_removes_orphaned_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(Some(dir.path().to_path_buf()), DAY);
        let now = now_millis();
        cache.put_at("03", artifact(), now).await;
        let orphan = dir.path().join("04.5f0c3a9e.tmp");
        std::fs::write(&orphan, b"{\"createdAt\":").unwrap();

        // A fresh temp file may still be in flight
        let result = cache.purge_expired_at(now).await;
        assert_eq!(result.removed_count, 0);
        assert!(orphan.exists());

        let later = now + STALE_TMP_AGE.as_millis() as i64 + 60_000;
        let result = cache.purge_expired_at(later).await;
        assert_eq!(result.removed_count, 1);
        assert!(!orphan.exists());
        assert!(dir.path().join("03.json").exists());
    }

    #[tokio::test]
    async fn test_unwritable_dir_keeps_memory_entry() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let cache = ContentCache::new(Some(blocker), DAY);
        cache.put("aa", artifact()).await;
        assert!(cache.get("aa").await.is_some());
    }
}
