//! In-memory datasets and the snapshot-backed store.
//!
//! `MemoryDataset` is what the topology builders produce and what tests use
//! as fixtures. `MemoryStore` serves registered datasets by URI and persists
//! written datasets as JSON snapshots, so a workspace built without the
//! `netcdf` feature still has working on-disk caches.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

use crate::dataset::{AttrValue, NcDataset, VariableInfo};
use crate::error::{NetCdfError, NetCdfResult};
use crate::store::NcStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MemoryVariable {
    info: VariableInfo,
    #[serde(with = "nan_as_null")]
    data: Vec<f64>,
}

/// JSON has no NaN; missing values travel as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        data.iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect::<Vec<Option<f64>>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// A fully materialised dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDataset {
    source: String,
    dimensions: Vec<Dimension>,
    variables: Vec<MemoryVariable>,
    #[serde(default)]
    attributes: BTreeMap<String, AttrValue>,
}

impl MemoryDataset {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Add or resize a dimension.
    pub fn add_dimension(&mut self, name: &str, len: usize) {
        match self.dimensions.iter_mut().find(|d| d.name == name) {
            Some(dim) => dim.len = len,
            None => self.dimensions.push(Dimension {
                name: name.to_string(),
                len,
            }),
        }
    }

    /// Add a variable over existing dimensions.
    ///
    /// `data` must hold exactly as many values as the dimensions describe.
    pub fn add_variable(
        &mut self,
        name: &str,
        dimensions: &[&str],
        data: Vec<f64>,
        attributes: &[(&str, AttrValue)],
    ) -> NetCdfResult<()> {
        let shape = dimensions
            .iter()
            .map(|d| {
                self.dimension_len(d)
                    .ok_or_else(|| NetCdfError::MissingData(format!("dimension {}", d)))
            })
            .collect::<NetCdfResult<Vec<usize>>>()?;

        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(NetCdfError::InvalidFormat(format!(
                "variable {} has {} values, dimensions require {}",
                name,
                data.len(),
                expected
            )));
        }

        let info = VariableInfo {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            shape,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        };

        self.variables.retain(|v| v.info.name != name);
        self.variables.push(MemoryVariable { info, data });
        Ok(())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Set an attribute on an existing variable.
    pub fn set_variable_attribute(
        &mut self,
        variable: &str,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> NetCdfResult<()> {
        let var = self
            .variables
            .iter_mut()
            .find(|v| v.info.name == variable)
            .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", variable)))?;
        var.info.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Copy the named variables, their dimensions and all global
    /// attributes out of another dataset.
    pub fn extract(source: &dyn NcDataset, names: &[&str]) -> NetCdfResult<Self> {
        let mut out = MemoryDataset::new(source.source());
        out.attributes = source.global_attributes();

        for name in names {
            let info = source
                .variable(name)
                .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", name)))?;
            for (dim, len) in info.dimensions.iter().zip(&info.shape) {
                out.add_dimension(dim, *len);
            }
            let data = source.read_values(name)?;
            let dims: Vec<&str> = info.dimensions.iter().map(String::as_str).collect();
            let attrs: Vec<(&str, AttrValue)> = info
                .attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect();
            out.add_variable(name, &dims, data, &attrs)?;
        }

        Ok(out)
    }

    pub fn to_json(&self) -> NetCdfResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> NetCdfResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl NcDataset for MemoryDataset {
    fn source(&self) -> &str {
        &self.source
    }

    fn variables(&self) -> Vec<VariableInfo> {
        self.variables.iter().map(|v| v.info.clone()).collect()
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().find(|d| d.name == name).map(|d| d.len)
    }

    fn global_attributes(&self) -> BTreeMap<String, AttrValue> {
        self.attributes.clone()
    }

    fn read_values(&self, name: &str) -> NetCdfResult<Vec<f64>> {
        self.variables
            .iter()
            .find(|v| v.info.name == name)
            .map(|v| v.data.clone())
            .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", name)))
    }
}

/// Store serving registered in-memory datasets and JSON snapshots on disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: RwLock<HashMap<String, MemoryDataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset under `uri`.
    pub fn insert(&self, uri: impl Into<String>, mut dataset: MemoryDataset) {
        let uri = uri.into();
        dataset.set_source(uri.clone());
        if let Ok(mut datasets) = self.datasets.write() {
            datasets.insert(uri, dataset);
        }
    }

    pub fn remove(&self, uri: &str) -> Option<MemoryDataset> {
        self.datasets.write().ok()?.remove(uri)
    }

    fn registered(&self, uri: &str) -> Option<MemoryDataset> {
        self.datasets.read().ok()?.get(uri).cloned()
    }
}

impl NcStore for MemoryStore {
    fn open(&self, path: &str) -> NetCdfResult<Box<dyn NcDataset>> {
        if let Some(dataset) = self.registered(path) {
            return Ok(Box::new(dataset));
        }

        let file = Path::new(path);
        if file.is_file() {
            let json = std::fs::read_to_string(file)?;
            let mut dataset = MemoryDataset::from_json(&json)?;
            dataset.set_source(path);
            debug!(path = %path, "Loaded dataset snapshot");
            return Ok(Box::new(dataset));
        }

        Err(NetCdfError::OpenFailed {
            path: path.to_string(),
            message: "no such dataset".to_string(),
        })
    }

    fn write(&self, path: &Path, dataset: &MemoryDataset) -> NetCdfResult<()> {
        std::fs::write(path, dataset.to_json()?)?;
        Ok(())
    }

    fn expand(&self, pattern: &str) -> NetCdfResult<Vec<String>> {
        let matcher = glob::Pattern::new(pattern)?;
        let mut matches: Vec<String> = self
            .datasets
            .read()
            .map(|d| d.keys().filter(|k| matcher.matches(k)).cloned().collect())
            .unwrap_or_default();

        if matches.is_empty() {
            matches = crate::store::glob_files(pattern)?;
        }
        matches.sort();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryDataset {
        let mut ds = MemoryDataset::new("sample");
        ds.add_dimension("time", 3);
        ds.add_variable(
            "time",
            &["time"],
            vec![0.0, 1.0, 2.0],
            &[("standard_name", "time".into()), ("units", "hours since 2015-01-01".into())],
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_add_variable_checks_length() {
        let mut ds = sample();
        let err = ds.add_variable("bad", &["time"], vec![1.0], &[]);
        assert!(matches!(err, Err(NetCdfError::InvalidFormat(_))));
        let err = ds.add_variable("bad", &["node"], vec![1.0], &[]);
        assert!(matches!(err, Err(NetCdfError::MissingData(_))));
    }

    #[test]
    fn test_snapshot_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.nc");
        let store = MemoryStore::new();
        store.write(&path, &sample()).unwrap();

        let opened = store.open(path.to_str().unwrap()).unwrap();
        assert_eq!(opened.read_values("time").unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(opened.source(), path.to_str().unwrap());
    }

    #[test]
    fn test_snapshot_keeps_missing_values() {
        let mut ds = sample();
        ds.add_variable("zeta", &["time"], vec![1.0, f64::NAN, 3.0], &[])
            .unwrap();
        let back = MemoryDataset::from_json(&ds.to_json().unwrap()).unwrap();
        let zeta = back.read_values("zeta").unwrap();
        assert_eq!(zeta[0], 1.0);
        assert!(zeta[1].is_nan());
    }

    #[test]
    fn test_open_unknown_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.open("/nonexistent/data.nc"),
            Err(NetCdfError::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_expand_registered_uris() {
        let store = MemoryStore::new();
        store.insert("mem://run/b.nc", sample());
        store.insert("mem://run/a.nc", sample());
        store.insert("mem://other/c.nc", sample());
        let members = store.expand("mem://run/*.nc").unwrap();
        assert_eq!(members, vec!["mem://run/a.nc", "mem://run/b.nc"]);
    }
}
