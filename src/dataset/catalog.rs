//! Catalog of named benchmark datasets.
//!
//! Files are expected under `<testdata_root>/embeddings/`. Nothing here
//! downloads anything; a missing file surfaces as `DatasetUnavailable`.

use super::{vecs, Dataset};
use crate::constants::dataset::EMBEDDINGS_DIR;
use crate::error::{RecallError, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Metadata for one named dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedDataset {
    pub name: &'static str,
    pub description: &'static str,
    pub base_file: &'static str,
    pub query_file: &'static str,
    pub ground_truth_file: &'static str,
    /// Nominal corpus size.
    pub n: usize,
    /// Nominal query count.
    pub nq: usize,
    pub d: usize,
}

const CATALOG: [NamedDataset; 3] = [
    NamedDataset {
        name: "SIFT10K",
        description: "10K SIFT descriptors (subset of SIFT1M)",
        base_file: "sift10k_base.fvecs",
        query_file: "sift10k_query.fvecs",
        ground_truth_file: "sift10k_groundtruth.ivecs",
        n: 10_000,
        nq: 100,
        d: 128,
    },
    NamedDataset {
        name: "SIFT1M",
        description: "1M SIFT descriptors (128-dim)",
        base_file: "sift1m_base.fvecs",
        query_file: "sift1m_query.fvecs",
        ground_truth_file: "sift1m_groundtruth.ivecs",
        n: 1_000_000,
        nq: 10_000,
        d: 128,
    },
    NamedDataset {
        name: "GIST1M",
        description: "1M GIST descriptors (960-dim)",
        base_file: "gist1m_base.fvecs",
        query_file: "gist1m_query.fvecs",
        ground_truth_file: "gist1m_groundtruth.ivecs",
        n: 1_000_000,
        nq: 1_000,
        d: 960,
    },
];

/// All known named datasets.
pub fn available() -> &'static [NamedDataset] {
    &CATALOG
}

/// Look up a dataset by name.
pub fn lookup(name: &str) -> Option<&'static NamedDataset> {
    CATALOG.iter().find(|ds| ds.name == name)
}

impl NamedDataset {
    fn file(&self, root: &Path, file: &str) -> PathBuf {
        root.join(EMBEDDINGS_DIR).join(file)
    }

    /// Path of the base vectors under `root`.
    pub fn base_path(&self, root: &Path) -> PathBuf {
        self.file(root, self.base_file)
    }

    /// True if the base vector file exists under `root`.
    pub fn is_available(&self, root: &Path) -> bool {
        self.base_path(root).is_file()
    }

    /// Load base vectors, queries, and bundled ground truth.
    ///
    /// # Errors
    /// - `DatasetUnavailable` if any of the three files is missing
    /// - `InvalidFormat` if the files disagree on shape
    pub fn load(&self, root: &Path) -> Result<Dataset> {
        let missing = |e: RecallError| match e {
            RecallError::Io(ref io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                RecallError::dataset_unavailable(self.name, io_err.to_string())
            }
            other => other,
        };

        let (vectors, n, d) = vecs::read_fvecs(self.base_path(root)).map_err(missing)?;
        let (queries, nq, dq) =
            vecs::read_fvecs(self.file(root, self.query_file)).map_err(missing)?;
        if d != dq {
            return Err(RecallError::invalid_format(format!(
                "{}: base dimension {} but query dimension {}",
                self.name, d, dq
            )));
        }

        let mut ground_truth =
            vecs::read_ivecs(self.file(root, self.ground_truth_file)).map_err(missing)?;
        if ground_truth.len() < nq {
            return Err(RecallError::invalid_format(format!(
                "{}: ground truth covers {} of {} queries",
                self.name,
                ground_truth.len(),
                nq
            )));
        }
        ground_truth.truncate(nq);

        debug!(dataset = self.name, n, nq, d, "loaded named dataset");
        Dataset::new(self.name, vectors, queries, d)?.with_ground_truth(ground_truth)
    }
}

/// Load a named dataset from `root`.
pub fn load(name: &str, root: &Path) -> Result<Dataset> {
    lookup(name)
        .ok_or_else(|| RecallError::dataset_unavailable(name, "unknown dataset"))?
        .load(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install_sift10k(root: &Path) {
        let dir = root.join(EMBEDDINGS_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let base: Vec<f32> = (0..40).map(|i| i as f32).collect();
        vecs::write_fvecs(dir.join("sift10k_base.fvecs"), &base, 4).unwrap();
        vecs::write_fvecs(dir.join("sift10k_query.fvecs"), &base[..8], 4).unwrap();
        vecs::write_ivecs(dir.join("sift10k_groundtruth.ivecs"), &[vec![0, 1], vec![1, 0], vec![2, 3]])
            .unwrap();
    }

    #[test]
    fn test_catalog_names() {
        let names: Vec<_> = available().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["SIFT10K", "SIFT1M", "GIST1M"]);
        assert_eq!(lookup("GIST1M").unwrap().d, 960);
        assert!(lookup("MNIST").is_none());
    }

    #[test]
    fn test_unknown_and_missing_are_unavailable() {
        let dir = TempDir::new().unwrap();
        assert!(load("MNIST", dir.path()).unwrap_err().is_dataset_unavailable());
        assert!(load("SIFT1M", dir.path()).unwrap_err().is_dataset_unavailable());
        assert!(!lookup("SIFT1M").unwrap().is_available(dir.path()));
    }

    #[test]
    fn test_load_installed_dataset() {
        let dir = TempDir::new().unwrap();
        install_sift10k(dir.path());

        let ds = load("SIFT10K", dir.path()).unwrap();
        assert_eq!((ds.n(), ds.nq(), ds.d()), (10, 2, 4));
        // The extra ground-truth row is dropped.
        assert_eq!(ds.ground_truth().unwrap().len(), 2);
        assert!(lookup("SIFT10K").unwrap().is_available(dir.path()));
    }
}
