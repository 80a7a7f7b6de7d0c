//! On-disk topology cache files of a dataset.
//!
//! Every cache file of a dataset lives in the topology directory and is
//! named `<safe>.<ext>` where `<safe>` is the dataset name reduced to
//! alphanumerics, so clearing the cache is a single glob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use wms_common::{safe_filename, BoundingBox, Bounds, WmsError, WmsResult};

/// Result of [`update_cache`](crate::Dataset::update_cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOutcome {
    /// A cache existed and no rebuild was forced
    Fresh,
    Rebuilt,
}

/// Cache file locations for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyPaths {
    dir: PathBuf,
    safe: String,
}

impl TopologyPaths {
    pub fn new(topology_path: impl Into<PathBuf>, dataset_name: &str) -> Self {
        Self {
            dir: topology_path.into(),
            safe: safe_filename(dataset_name),
        }
    }

    pub fn safe_filename(&self) -> &str {
        &self.safe
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.safe, ext))
    }

    /// Topology dataset (`<safe>.nc`).
    pub fn topology_file(&self) -> PathBuf {
        self.file("nc")
    }

    /// Domain summary (`<safe>.domain`).
    pub fn domain_file(&self) -> PathBuf {
        self.file("domain")
    }

    pub fn node_tree_root(&self) -> PathBuf {
        self.file("tree")
    }

    pub fn node_tree_data_file(&self) -> PathBuf {
        self.file("tree.dat")
    }

    pub fn node_tree_index_file(&self) -> PathBuf {
        self.file("tree.idx")
    }

    pub fn cell_tree_root(&self) -> PathBuf {
        self.file("cells")
    }

    pub fn cell_tree_data_file(&self) -> PathBuf {
        self.file("cells.dat")
    }

    pub fn cell_tree_index_file(&self) -> PathBuf {
        self.file("cells.idx")
    }

    /// Glob matching every cache file of this dataset and nothing else.
    ///
    /// `<dir>/<safe>.*` with the directory escaped. The dot is required: a
    /// bare `<safe>*` prefix for `bight` would also match `bight2.nc`, the
    /// cache of a dataset named `bight_2`.
    pub fn cache_pattern(&self) -> String {
        let dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        let dir = dir.trim_end_matches('/');
        format!("{}/{}.*", dir, glob::Pattern::escape(&self.safe))
    }

    pub fn has_cache(&self) -> bool {
        self.topology_file().exists()
    }

    /// Delete every cache file; returns how many were removed.
    pub fn clear(&self) -> WmsResult<usize> {
        if self.safe.is_empty() {
            return Err(WmsError::CacheError(
                "dataset name has no alphanumeric characters".to_string(),
            ));
        }

        let pattern = self.cache_pattern();
        let entries = glob::glob(&pattern)
            .map_err(|e| WmsError::CacheError(format!("Bad cache pattern {}: {}", pattern, e)))?;

        let mut removed = 0;
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "Unreadable cache entry");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            std::fs::remove_file(&path).map_err(|e| {
                WmsError::CacheError(format!("Failed to remove {}: {}", path.display(), e))
            })?;
            debug!(path = %path.display(), "Removed cache file");
            removed += 1;
        }
        Ok(removed)
    }
}

/// Summary written next to the topology dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub kind: String,
    pub wgs84_bounds: Option<BoundingBox>,
    pub time: Bounds<DateTime<Utc>>,
    pub depth_count: usize,
    pub generated: DateTime<Utc>,
}

impl DomainSummary {
    pub fn write(&self, path: &Path) -> WmsResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| WmsError::CacheError(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn read(path: &Path) -> WmsResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| WmsError::CacheError(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&json)?)
    }
}
