//! Opening datasets through a pluggable store.

use std::path::Path;
use tracing::{debug, warn};

use crate::aggregate::AggregatedDataset;
use crate::dataset::NcDataset;
use crate::error::{NetCdfError, NetCdfResult};
use crate::memory::MemoryDataset;

/// Dimension multi-file datasets are joined along.
pub const AGGREGATION_DIMENSION: &str = "time";

/// A backend able to open and write datasets.
pub trait NcStore: Send + Sync {
    /// Open a single dataset (local path or URL).
    fn open(&self, path: &str) -> NetCdfResult<Box<dyn NcDataset>>;

    /// Persist a dataset at `path`, replacing any existing file.
    fn write(&self, path: &Path, dataset: &MemoryDataset) -> NetCdfResult<()>;

    /// Members of a multi-file dataset, sorted.
    fn expand(&self, pattern: &str) -> NetCdfResult<Vec<String>> {
        glob_files(pattern)
    }
}

/// Files on disk matching a glob pattern, sorted.
pub fn glob_files(pattern: &str) -> NetCdfResult<Vec<String>> {
    let mut files: Vec<String> = glob::glob(pattern)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter_map(|p| p.to_str().map(str::to_string))
        .collect();
    files.sort();
    Ok(files)
}

/// Open `uri` as a single dataset, falling back to a multi-file
/// aggregation along `time` when `uri` names several files.
pub fn open_dataset(store: &dyn NcStore, uri: &str) -> NetCdfResult<Box<dyn NcDataset>> {
    let single_err = match store.open(uri) {
        Ok(dataset) => return Ok(dataset),
        Err(e) => e,
    };
    debug!(uri = %uri, error = %single_err, "Single-file open failed, trying aggregation");

    let members = store.expand(uri)?;
    if members.is_empty() {
        return Err(single_err);
    }

    let opened = members
        .iter()
        .map(|m| store.open(m))
        .collect::<NetCdfResult<Vec<_>>>()?;

    AggregatedDataset::new(uri, opened, AGGREGATION_DIMENSION)
        .map(|agg| Box::new(agg) as Box<dyn NcDataset>)
}

/// Like [`open_dataset`] but logs and swallows failures.
pub fn try_open_dataset(store: &dyn NcStore, uri: &str) -> Option<Box<dyn NcDataset>> {
    match open_dataset(store, uri) {
        Ok(dataset) => Some(dataset),
        Err(e) => {
            warn!(uri = %uri, error = %e, "Could not open dataset");
            None
        }
    }
}

/// Write through a temporary sibling file and rename into place, so readers
/// never observe a partially written file.
pub fn write_atomic(store: &dyn NcStore, path: &Path, dataset: &MemoryDataset) -> NetCdfResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("bad path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    if let Err(e) = store.write(&tmp, dataset) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn member(times: &[f64]) -> MemoryDataset {
        let mut ds = MemoryDataset::new("");
        ds.add_dimension("time", times.len());
        ds.add_variable("time", &["time"], times.to_vec(), &[("standard_name", "time".into())])
            .unwrap();
        ds
    }

    #[test]
    fn test_open_falls_back_to_aggregation() {
        let store = MemoryStore::new();
        store.insert("mem://agg/001.nc", member(&[0.0, 1.0]));
        store.insert("mem://agg/002.nc", member(&[2.0, 3.0]));

        let ds = open_dataset(&store, "mem://agg/*.nc").unwrap();
        assert_eq!(ds.read_values("time").unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(ds.dimension_len("time"), Some(4));
    }

    #[test]
    fn test_open_missing_returns_original_error() {
        let store = MemoryStore::new();
        let err = open_dataset(&store, "mem://nothing/here.nc").unwrap_err();
        assert!(matches!(err, NetCdfError::OpenFailed { .. }));
        assert!(try_open_dataset(&store, "mem://nothing/here.nc").is_none());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topo.nc");
        let store = MemoryStore::new();
        write_atomic(&store, &path, &member(&[5.0])).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["topo.nc"]);
    }
}
