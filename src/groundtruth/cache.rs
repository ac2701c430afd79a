//! On-disk ground-truth cache.
//!
//! One pretty-printed JSON record per key at
//! `<root>/gt_cache_<key>.json`. Reads fail open: anything unexpected is
//! logged and reported as a miss, never as an error.

use super::GroundTruthEntry;
use crate::constants::cache::{FILE_PREFIX, FILE_SUFFIX, KEY_HEX_LEN, SCHEMA_VERSION};
use crate::distance::Metric;
use crate::error::{RecallError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Floats hashed per buffered update.
const HASH_CHUNK: usize = 4096;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fingerprint of a ground-truth computation's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    data_hash: String,
}

impl CacheKey {
    /// The short key used in file names.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Full hex digest stored in records for collision checking.
    pub fn data_hash(&self) -> &str {
        &self.data_hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// Persisted form of one ground-truth computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub version: u32,
    pub n: usize,
    pub nq: usize,
    pub d: usize,
    pub k: usize,
    pub metric: Metric,
    pub data_hash: String,
    pub results: Vec<GroundTruthEntry>,
}

/// Content-addressed store of exact nearest neighbor results.
///
/// The root directory is an explicit argument; two caches with different
/// roots never see each other's records. Concurrent writers of the same key
/// are tolerated (last rename wins, and the content is identical anyway).
#[derive(Debug, Clone)]
pub struct GroundTruthCache {
    root: PathBuf,
}

impl GroundTruthCache {
    /// Create a cache rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fingerprint `(vectors, queries, d, k, metric)`.
    ///
    /// SHA-256 over the little-endian bytes of `vectors`, then of `queries`,
    /// then the ASCII string `_d{d}_k{k}_m{metric}`. The key is the first 16
    /// hex characters of the digest.
    pub fn compute_key(vectors: &[f32], queries: &[f32], d: usize, k: usize, metric: Metric) -> CacheKey {
        let mut hasher = Sha256::new();
        let mut buf = Vec::with_capacity(HASH_CHUNK * 4);
        for matrix in [vectors, queries] {
            for chunk in matrix.chunks(HASH_CHUNK) {
                buf.clear();
                for x in chunk {
                    buf.extend_from_slice(&x.to_le_bytes());
                }
                hasher.update(&buf);
            }
        }
        hasher.update(format!("_d{d}_k{k}_m{metric}").as_bytes());

        let data_hash = hex::encode(hasher.finalize());
        CacheKey {
            key: data_hash[..KEY_HEX_LEN].to_string(),
            data_hash,
        }
    }

    /// Deterministic file path for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", key.as_str()))
    }

    /// Look up ground truth for `key`, requiring every scalar to match.
    ///
    /// Returns `None` for a missing, unreadable, unparsable, or mismatched
    /// record.
    pub fn load(
        &self,
        key: &CacheKey,
        n: usize,
        nq: usize,
        d: usize,
        k: usize,
        metric: Metric,
    ) -> Option<Vec<GroundTruthEntry>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(key = %key, "ground truth cache miss");
            return None;
        }

        let record = match Self::read_record(&path) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable ground truth cache record");
                return None;
            }
        };

        if let Err(e) = Self::validate(&record, n, nq, d, k, metric) {
            warn!(path = %path.display(), error = %e, "ignoring stale ground truth cache record");
            return None;
        }

        if !record.data_hash.starts_with(key.as_str()) {
            warn!(
                key = %key,
                stored = %record.data_hash,
                "cache record data hash does not match its key"
            );
        }

        debug!(key = %key, queries = nq, "ground truth cache hit");
        Some(record.results)
    }

    fn read_record(path: &Path) -> Result<CacheRecord> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| RecallError::CacheCorruption(e.to_string()))
    }

    fn validate(record: &CacheRecord, n: usize, nq: usize, d: usize, k: usize, metric: Metric) -> Result<()> {
        if record.version != SCHEMA_VERSION {
            return Err(RecallError::CacheCorruption(format!(
                "schema version {} (current {})",
                record.version, SCHEMA_VERSION
            )));
        }
        let stored = (record.n, record.nq, record.d, record.k, record.metric);
        if stored != (n, nq, d, k, metric) {
            return Err(RecallError::CacheCorruption(format!(
                "record is for n={} nq={} d={} k={} metric={}, requested n={} nq={} d={} k={} metric={}",
                record.n, record.nq, record.d, record.k, record.metric, n, nq, d, k, metric
            )));
        }
        if record.results.len() != nq {
            return Err(RecallError::CacheCorruption(format!(
                "{} result rows for {} queries",
                record.results.len(),
                nq
            )));
        }
        if let Some(row) = record.results.iter().position(|e| e.ids.len() > k) {
            return Err(RecallError::CacheCorruption(format!("row {row} holds more than {k} ids")));
        }
        Ok(())
    }

    /// Persist ground truth for `key`.
    ///
    /// The record is written to a temporary file in the cache root and
    /// renamed into place, so a torn write never sits at the final path.
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key: &CacheKey,
        results: &[GroundTruthEntry],
        n: usize,
        nq: usize,
        d: usize,
        k: usize,
        metric: Metric,
    ) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let record = CacheRecord {
            version: SCHEMA_VERSION,
            n,
            nq,
            d,
            k,
            metric,
            data_hash: key.data_hash().to_string(),
            results: results.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&record)?;

        let path = self.path_for(key);
        let tmp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            key.as_str(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written = (|| -> Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)?;
            Ok(())
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        } else {
            debug!(key = %key, path = %path.display(), "saved ground truth");
        }
        written
    }

    /// Remove every cache record under the root, returning how many were removed.
    ///
    /// Other files in the directory are left alone.
    pub fn clear(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        debug!(root = %self.root.display(), removed, "cleared ground truth cache");
        Ok(removed)
    }
}
