use super::{catalog, synthetic, Dataset, DatasetSource};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Resolves dataset sources and hands out shared, immutable datasets.
///
/// Prepared datasets are memoized per source, so every configuration of a
/// sweep that names the same source measures against the same instance.
pub struct DatasetProvider {
    testdata_root: PathBuf,
    prepared: Mutex<HashMap<String, Arc<Dataset>>>,
}

impl DatasetProvider {
    /// Create a provider resolving named datasets under `testdata_root`.
    pub fn new(testdata_root: impl Into<PathBuf>) -> Self {
        Self {
            testdata_root: testdata_root.into(),
            prepared: Mutex::new(HashMap::new()),
        }
    }

    pub fn testdata_root(&self) -> &Path {
        &self.testdata_root
    }

    /// Load or generate the dataset for `source`.
    ///
    /// # Errors
    /// `DatasetUnavailable` when a named dataset is not installed; whether
    /// that skips or fails the test is the caller's policy.
    pub fn provide(&self, source: &DatasetSource) -> Result<Arc<Dataset>> {
        let key = source.memo_key();
        // Held across preparation so concurrent callers never build twice.
        let mut prepared = self.prepared.lock();
        if let Some(ds) = prepared.get(&key) {
            debug!(source = %source.label(), "reusing prepared dataset");
            return Ok(Arc::clone(ds));
        }

        let start = Instant::now();
        let dataset = match source {
            DatasetSource::Named { name, subset } => {
                let full = catalog::load(name, &self.testdata_root)?;
                match subset {
                    Some((n, nq)) => full.subset(*n, *nq),
                    None => full,
                }
            }
            DatasetSource::Synthetic(spec) => synthetic::generate(spec)?,
        };
        info!(
            source = %source.label(),
            n = dataset.n(),
            nq = dataset.nq(),
            d = dataset.d(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "prepared dataset"
        );

        let dataset = Arc::new(dataset);
        prepared.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Number of datasets currently memoized.
    pub fn prepared_count(&self) -> usize {
        self.prepared.lock().len()
    }

    /// Drop all memoized datasets.
    pub fn clear(&self) {
        self.prepared.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SyntheticSpec;

    #[test]
    fn test_memoizes_per_source() {
        let provider = DatasetProvider::new("testdata");
        let source = DatasetSource::synthetic(50, 4, 5);

        let a = provider.provide(&source).unwrap();
        let b = provider.provide(&source).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = DatasetSource::Synthetic(SyntheticSpec::new(50, 4, 5).seed(9));
        let c = provider.provide(&other).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(provider.prepared_count(), 2);

        provider.clear();
        assert_eq!(provider.prepared_count(), 0);
    }

    #[test]
    fn test_missing_named_dataset() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = DatasetProvider::new(dir.path());
        let err = provider.provide(&DatasetSource::named("SIFT10K")).unwrap_err();
        assert!(err.is_dataset_unavailable());
        assert_eq!(provider.prepared_count(), 0);
    }
}
