//! Storage tier collaborators: object store and distributed cache.
//!
//! Both are trait seams so the resolver can run against a disk-backed
//! store and an in-memory cache in one process, or real services in a
//! deployment. Either tier can be absent (missing credentials disable it
//! for the process lifetime) or down (calls fail, resolution falls
//! through).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::quota::{Clock, SystemClock};

/// Namespaced cache key for a track's resolved audio payload.
pub fn audio_cache_key(external_id: &str) -> String {
    format!("radio:audio:{external_id}")
}

/// Durable archive of audio copies, keyed by (track, format).
/// Issues signed, time-limited URLs for archived objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, external_id: &str, format: &str, data: &[u8]) -> Result<()>;
    async fn get(&self, external_id: &str, format: &str) -> Result<Option<Vec<u8>>>;
    /// Existence check without fetching the payload.
    async fn head(&self, external_id: &str, format: &str) -> Result<bool>;
    async fn delete(&self, external_id: &str, format: &str) -> Result<()>;
    /// Signed URL for an archived object, valid until `expires_at`.
    fn signed_url(&self, external_id: &str, format: &str, expires_at: DateTime<Utc>) -> String;
}

/// Shared low-latency cache with TTL semantics and namespaced keys.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

// ============================================================================
// Disk-backed object store
// ============================================================================

/// Object store backed by a local directory. One file per
/// (external id, format); signed URLs are file URLs carrying an expiry
/// and a digest over (secret, path, expiry).
pub struct DiskObjectStore {
    root: PathBuf,
    secret: String,
}

impl DiskObjectStore {
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::configuration("object store secret is not set"));
        }
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, secret })
    }

    fn object_path(&self, external_id: &str, format: &str) -> PathBuf {
        // External ids are validated upstream, but never trust them as
        // path components.
        let safe: String = external_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        self.root.join(format!("{safe}.{format}"))
    }

    fn digest(&self, path: &str, expires_ts: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(expires_ts.to_be_bytes());
        let out = hasher.finalize();
        out.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Check a signed URL produced by [`ObjectStore::signed_url`].
    pub fn verify_signed_url(&self, url: &str, now: DateTime<Utc>) -> bool {
        let Some((base, query)) = url.split_once('?') else {
            return false;
        };
        let Some(path) = base.strip_prefix("file://") else {
            return false;
        };
        let mut expires = None;
        let mut sig = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse::<i64>().ok(),
                Some(("sig", v)) => sig = Some(v.to_string()),
                _ => {}
            }
        }
        let (Some(expires), Some(sig)) = (expires, sig) else {
            return false;
        };
        expires > now.timestamp() && sig == self.digest(path, expires)
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn put(&self, external_id: &str, format: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(external_id, format);
        std::fs::write(&path, data)?;
        Ok(())
    }

    async fn get(&self, external_id: &str, format: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(external_id, format);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&path)?;
        Ok(Some(data))
    }

    async fn head(&self, external_id: &str, format: &str) -> Result<bool> {
        Ok(self.object_path(external_id, format).exists())
    }

    async fn delete(&self, external_id: &str, format: &str) -> Result<()> {
        let path = self.object_path(external_id, format);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn signed_url(&self, external_id: &str, format: &str, expires_at: DateTime<Utc>) -> String {
        let path = self.object_path(external_id, format);
        let path_str = path.to_string_lossy();
        let ts = expires_at.timestamp();
        let sig = self.digest(&path_str, ts);
        format!("file://{path_str}?expires={ts}&sig={sig}")
    }
}

// ============================================================================
// In-memory distributed cache
// ============================================================================

/// In-process [`DistributedCache`] with real TTL semantics.
///
/// Stands in for an external cache in single-process deployments and
/// tests. Expiry is evaluated against the injected clock, so expired
/// reads are testable without sleeping.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|(_, exp)| *exp > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[async_trait]
impl DistributedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, expires)) if *expires <= now => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires = self.clock.now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FixedClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disk_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = DiskObjectStore::new(dir.path(), "secret").unwrap();

        assert!(!store.head("vid1", "m4a").await.unwrap());
        store.put("vid1", "m4a", b"audio bytes").await.unwrap();
        assert!(store.head("vid1", "m4a").await.unwrap());
        assert_eq!(
            store.get("vid1", "m4a").await.unwrap().unwrap(),
            b"audio bytes"
        );

        store.delete("vid1", "m4a").await.unwrap();
        assert!(!store.head("vid1", "m4a").await.unwrap());
    }

    #[test]
    fn test_disk_store_requires_secret() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            DiskObjectStore::new(dir.path(), ""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_signed_url_verification() {
        let dir = TempDir::new().unwrap();
        let store = DiskObjectStore::new(dir.path(), "secret").unwrap();
        let now = Utc::now();
        let url = store.signed_url("vid1", "m4a", now + chrono::Duration::hours(1));

        assert!(store.verify_signed_url(&url, now));
        // Expired signature fails
        assert!(!store.verify_signed_url(&url, now + chrono::Duration::hours(2)));
        // Tampered signature fails
        let tampered = url.replace("sig=", "sig=00");
        assert!(!store.verify_signed_url(&tampered, now));
        // Different secret fails
        let other = DiskObjectStore::new(dir.path(), "other").unwrap();
        assert!(!other.verify_signed_url(&url, now));
    }

    #[test]
    fn test_object_path_sanitizes_id() {
        let dir = TempDir::new().unwrap();
        let store = DiskObjectStore::new(dir.path(), "secret").unwrap();
        let path = store.object_path("../../etc/passwd", "m4a");
        assert!(path.starts_with(dir.path()));
        assert!(!path.to_string_lossy().contains(".."));
    }

    #[tokio::test]
    async fn test_memory_cache_ttl() {
        let clock = FixedClock::at(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let cache = MemoryCache::new(clock.clone());

        cache
            .set("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        // At exactly the expiry instant the entry is a miss and is purged
        clock.set(Utc.with_ymd_and_hms(2024, 3, 1, 0, 1, 0).unwrap());
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.entries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_delete_and_clear() {
        let cache = MemoryCache::with_system_clock();
        cache
            .set("a", "1", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("b", "2", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.len(), 2);

        cache.delete("a").await.unwrap();
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_namespaced_key() {
        assert_eq!(audio_cache_key("abc"), "radio:audio:abc");
    }
}
