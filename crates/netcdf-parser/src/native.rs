//! Native NetCDF access using the netcdf library.
//!
//! Opens local files and OPeNDAP URLs through libnetcdf, and writes
//! topology caches as real netCDF-4 files. Only built with the `netcdf`
//! feature since it needs libnetcdf and libhdf5 at link time.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing::debug;

use crate::dataset::{AttrValue, NcDataset, VariableInfo};
use crate::error::{NetCdfError, NetCdfResult};
use crate::memory::MemoryDataset;
use crate::store::NcStore;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics even when a missing
/// attribute is handled on the Rust side. Safe to call repeatedly; only the
/// first call has an effect.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 with null handlers is a documented way to
        // disable the default error stack printer.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// A dataset backed by an open libnetcdf handle.
///
/// libnetcdf is not thread safe, so every access goes through the mutex.
pub struct NativeDataset {
    source: String,
    file: Mutex<netcdf::File>,
    variables: Vec<VariableInfo>,
    dimensions: BTreeMap<String, usize>,
    attributes: BTreeMap<String, AttrValue>,
}

impl fmt::Debug for NativeDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeDataset")
            .field("source", &self.source)
            .field("variables", &self.variables.len())
            .finish()
    }
}

impl NativeDataset {
    pub fn open(path: &str) -> NetCdfResult<Self> {
        silence_hdf5_errors();

        let file = netcdf::open(path).map_err(|e| NetCdfError::OpenFailed {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        let dimensions = file
            .dimensions()
            .map(|d| (d.name(), d.len()))
            .collect::<BTreeMap<_, _>>();

        let variables = file.variables().map(|v| variable_info(&v)).collect::<Vec<_>>();

        let attributes = file
            .attributes()
            .filter_map(|a| {
                let value = a.value().ok().and_then(convert_attribute)?;
                Some((a.name().to_string(), value))
            })
            .collect();

        debug!(path = %path, variables = variables.len(), "Opened netCDF dataset");

        Ok(Self {
            source: path.to_string(),
            file: Mutex::new(file),
            variables,
            dimensions,
            attributes,
        })
    }
}

fn variable_info(var: &netcdf::Variable) -> VariableInfo {
    let dims = var.dimensions();
    VariableInfo {
        name: var.name(),
        dimensions: dims.iter().map(|d| d.name()).collect(),
        shape: dims.iter().map(|d| d.len()).collect(),
        attributes: var
            .attributes()
            .filter_map(|a| {
                let value = a.value().ok().and_then(convert_attribute)?;
                Some((a.name().to_string(), value))
            })
            .collect(),
    }
}

fn convert_attribute(value: netcdf::AttributeValue) -> Option<AttrValue> {
    use netcdf::AttributeValue as A;

    let attr = match value {
        A::Str(s) => AttrValue::Text(s),
        A::Strs(s) => AttrValue::Texts(s),
        A::Double(v) => AttrValue::Number(v),
        A::Doubles(v) => AttrValue::Numbers(v),
        A::Float(v) => AttrValue::Number(v as f64),
        A::Floats(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        A::Int(v) => AttrValue::Number(v as f64),
        A::Ints(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        A::Short(v) => AttrValue::Number(v as f64),
        A::Shorts(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        A::Schar(v) => AttrValue::Number(v as f64),
        A::Schars(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        A::Uchar(v) => AttrValue::Number(v as f64),
        A::Uchars(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        A::Ushort(v) => AttrValue::Number(v as f64),
        A::Ushorts(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        A::Uint(v) => AttrValue::Number(v as f64),
        A::Uints(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        A::Longlong(v) => AttrValue::Number(v as f64),
        A::Longlongs(v) => AttrValue::Numbers(v.into_iter().map(|x| x as f64).collect()),
        A::Ulonglong(v) => AttrValue::Number(v as f64),
        A::Ulonglongs(v) => AttrValue::Numbers(v.into_iter().map(|x| x as f64).collect()),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(attr)
}

impl NcDataset for NativeDataset {
    fn source(&self) -> &str {
        &self.source
    }

    fn variables(&self) -> Vec<VariableInfo> {
        self.variables.clone()
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions.get(name).copied()
    }

    fn global_attributes(&self) -> BTreeMap<String, AttrValue> {
        self.attributes.clone()
    }

    fn read_values(&self, name: &str) -> NetCdfResult<Vec<f64>> {
        let file = self
            .file
            .lock()
            .map_err(|_| NetCdfError::InvalidFormat("netCDF handle poisoned".to_string()))?;
        let var = file
            .variable(name)
            .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", name)))?;
        Ok(var.get_values::<f64, _>(..)?)
    }
}

/// Store backed by libnetcdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeStore;

impl NcStore for NativeStore {
    fn open(&self, path: &str) -> NetCdfResult<Box<dyn NcDataset>> {
        Ok(Box::new(NativeDataset::open(path)?))
    }

    fn write(&self, path: &Path, dataset: &MemoryDataset) -> NetCdfResult<()> {
        silence_hdf5_errors();

        let mut file = netcdf::create(path)?;
        for dim in dataset.dimensions() {
            file.add_dimension(&dim.name, dim.len)?;
        }
        for (name, value) in dataset.global_attributes() {
            put_global_attribute(&mut file, &name, value)?;
        }

        for info in dataset.variables() {
            let dims: Vec<&str> = info.dimensions.iter().map(String::as_str).collect();
            let data = dataset.read_values(&info.name)?;
            let mut var = file.add_variable::<f64>(&info.name, &dims)?;
            for (attr, value) in info.attributes {
                match value {
                    AttrValue::Text(s) => var.put_attribute(&attr, s)?,
                    AttrValue::Texts(s) => var.put_attribute(&attr, s)?,
                    AttrValue::Number(v) => var.put_attribute(&attr, v)?,
                    AttrValue::Numbers(v) => var.put_attribute(&attr, v)?,
                };
            }
            var.put_values(&data, ..)?;
        }

        debug!(path = %path.display(), "Wrote netCDF dataset");
        Ok(())
    }
}

fn put_global_attribute(file: &mut netcdf::FileMut, name: &str, value: AttrValue) -> NetCdfResult<()> {
    match value {
        AttrValue::Text(s) => file.add_attribute(name, s)?,
        AttrValue::Texts(s) => file.add_attribute(name, s)?,
        AttrValue::Number(v) => file.add_attribute(name, v)?,
        AttrValue::Numbers(v) => file.add_attribute(name, v)?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("native.nc");

        let mut ds = MemoryDataset::new("");
        ds.add_dimension("time", 2);
        ds.add_variable(
            "time",
            &["time"],
            vec![0.0, 6.0],
            &[("units", "hours since 2015-01-01".into())],
        )
        .unwrap();
        ds.set_attribute("title", "fixture");

        NativeStore.write(&path, &ds).unwrap();
        let opened = NativeStore.open(path.to_str().unwrap()).unwrap();
        assert_eq!(opened.read_values("time").unwrap(), vec![0.0, 6.0]);
        assert_eq!(
            opened.variable("time").unwrap().attr_str("units"),
            Some("hours since 2015-01-01")
        );
        assert_eq!(
            opened.global_attributes().get("title"),
            Some(&AttrValue::Text("fixture".to_string()))
        );
    }
}
