//! Content-addressed artifact cache for pipeline steps.
//!
//! Each artifact lives at `<root>/<step>/<sha256>.txt`, where the digest covers the
//! step name and every input the step depends on. Different inputs can never hit
//! each other's entries, so no invalidation is needed beyond `clear`.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::fs_ops::{read_optional, write_atomic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Accomplishments,
    PersonalDetails,
    CompanyData,
    CompanySummary,
    JobDescription,
    Industry,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Accomplishments,
        ArtifactKind::PersonalDetails,
        ArtifactKind::CompanyData,
        ArtifactKind::CompanySummary,
        ArtifactKind::JobDescription,
        ArtifactKind::Industry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Accomplishments => "accomplishments",
            ArtifactKind::PersonalDetails => "personal_details",
            ArtifactKind::CompanyData => "company_data",
            ArtifactKind::CompanySummary => "company_summary",
            ArtifactKind::JobDescription => "job_description",
            ArtifactKind::Industry => "industry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    kind: ArtifactKind,
    digest: String,
}

impl CacheKey {
    /// Inputs are length-prefixed before hashing so `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn new(kind: ArtifactKind, inputs: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        for input in inputs {
            hasher.update((input.len() as u64).to_le_bytes());
            hasher.update(input.as_bytes());
        }
        Self {
            kind,
            digest: format!("{:x}", hasher.finalize()),
        }
    }
}

/// A step result and whether it came from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub content: String,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub steps: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(key.kind.as_str())
            .join(format!("{}.txt", key.digest))
    }

    /// Cached content for `key`. Empty files count as misses.
    pub async fn get(&self, key: &CacheKey) -> io::Result<Option<String>> {
        let Some(bytes) = read_optional(&self.path(key)).await? else {
            return Ok(None);
        };
        let content = String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(content).filter(|c| !c.trim().is_empty()))
    }

    pub async fn put(&self, key: &CacheKey, content: &str) -> io::Result<()> {
        write_atomic(self.path(key), content.as_bytes().to_vec()).await
    }

    /// Returns the cached artifact unless `force` is set; otherwise runs `compute`
    /// and writes its result back. Cache read/write failures only degrade to a miss.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        force: bool,
        compute: F,
    ) -> Result<Artifact, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, AppError>>,
    {
        if !force {
            match self.get(key).await {
                Ok(Some(content)) => {
                    debug!("Cache hit for {} ({})", key.kind.as_str(), key.digest);
                    return Ok(Artifact {
                        content,
                        from_cache: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable cache entry for {}: {e}", key.kind.as_str()),
            }
        }

        let content = compute().await?;
        if let Err(e) = self.put(key, &content).await {
            warn!("Failed to cache {} artifact: {e}", key.kind.as_str());
        }
        Ok(Artifact {
            content,
            from_cache: false,
        })
    }

    pub async fn stats(&self) -> io::Result<CacheStats> {
        let mut stats = CacheStats::default();
        for kind in ArtifactKind::ALL {
            let count = count_entries(self.root.join(kind.as_str())).await?;
            stats.total += count;
            stats.steps.insert(kind.as_str(), count);
        }
        Ok(stats)
    }

    /// Deletes every cached artifact. Returns how many were removed.
    pub async fn clear(&self) -> io::Result<usize> {
        let removed = self.stats().await?.total;
        for kind in ArtifactKind::ALL {
            match tokio::fs::remove_dir_all(self.root.join(kind.as_str())).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        info!("Cleared {removed} cached artifacts");
        Ok(removed)
    }
}

async fn count_entries(dir: PathBuf) -> io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.path().extension().is_some_and(|ext| ext == "txt") {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_key_depends_on_kind_and_inputs() {
        let a = CacheKey::new(ArtifactKind::Industry, &["jd", "summary"]);
        let b = CacheKey::new(ArtifactKind::Industry, &["jd", "summary"]);
        let c = CacheKey::new(ArtifactKind::Industry, &["jd", "other summary"]);
        let d = CacheKey::new(ArtifactKind::CompanySummary, &["jd", "summary"]);
        assert_eq!(a, b);
        assert_ne!(a.digest, c.digest);
        assert_ne!(a.digest, d.digest);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn test_key_inputs_are_length_prefixed() {
        let a = CacheKey::new(ArtifactKind::Accomplishments, &["ab", "c"]);
        let b = CacheKey::new(ArtifactKind::Accomplishments, &["a", "bc"]);
        assert_ne!(a.digest, b.digest);
    }

    #[tokio::test]
    async fn test_get_or_compute_reuses_until_forced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        let key = CacheKey::new(ArtifactKind::JobDescription, &["https://jobs.example.com/1"]);
        let counter = AtomicUsize::new(0);
        let runs = &counter;

        let compute = move || async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>("Rust engineer".to_string())
        };

        let first = cache.get_or_compute(&key, false, compute).await.unwrap();
        assert!(!first.from_cache);
        let second = cache.get_or_compute(&key, false, compute).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.content, "Rust engineer");
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let forced = cache.get_or_compute(&key, true, compute).await.unwrap();
        assert!(!forced.from_cache);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_compute_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        let key = CacheKey::new(ArtifactKind::Industry, &["x"]);

        let result = cache
            .get_or_compute(&key, false, || async {
                Err::<String, _>(AppError::Llm("down".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        let key = CacheKey::new(ArtifactKind::Industry, &["x"]);
        cache.put(&key, "  ").await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        cache
            .put(&CacheKey::new(ArtifactKind::Industry, &["a"]), "Fintech")
            .await
            .unwrap();
        cache
            .put(&CacheKey::new(ArtifactKind::Industry, &["b"]), "Retail")
            .await
            .unwrap();
        cache
            .put(&CacheKey::new(ArtifactKind::CompanySummary, &["acme"]), "Acme")
            .await
            .unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.steps["industry"], 2);
        assert_eq!(stats.steps["company_summary"], 1);
        assert_eq!(stats.steps["accomplishments"], 0);

        assert_eq!(cache.clear().await.unwrap(), 3);
        assert_eq!(cache.stats().await.unwrap().total, 0);
    }
}
