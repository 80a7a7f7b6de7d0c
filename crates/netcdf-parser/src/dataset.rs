//! Backend-independent view of a netCDF dataset.
//!
//! Everything above this crate talks to datasets through [`NcDataset`], so
//! the model layer works the same against a native netCDF file, an OPeNDAP
//! endpoint, a multi-file aggregation or an in-memory fixture.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NetCdfError, NetCdfResult};

/// A netCDF attribute value, reduced to the shapes the model layer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
    Texts(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Texts(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// Scalar value, or the first element of a numeric array.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Numbers(v) => v.first().copied(),
            AttrValue::Text(s) => s.trim().parse().ok(),
            AttrValue::Texts(_) => None,
        }
    }

    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttrValue::Number(v) => Some(vec![*v]),
            AttrValue::Numbers(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::Numbers(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "{}", s),
            AttrValue::Number(v) => write!(f, "{}", v),
            AttrValue::Numbers(v) => write!(f, "{:?}", v),
            AttrValue::Texts(v) => write!(f, "{}", v.join(", ")),
        }
    }
}

/// Metadata of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl VariableInfo {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(AttrValue::as_str)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(AttrValue::as_f64)
    }

    pub fn standard_name(&self) -> Option<&str> {
        self.attr_str("standard_name")
    }

    pub fn ndim(&self) -> usize {
        self.dimensions.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `valid_range`, overridden by `valid_min`/`valid_max` when present.
    pub fn valid_bounds(&self) -> (Option<f64>, Option<f64>) {
        let (mut min, mut max) = match self.attr("valid_range").and_then(AttrValue::as_f64_vec) {
            Some(range) if !range.is_empty() => (range.first().copied(), range.last().copied()),
            _ => (None, None),
        };
        if let Some(v) = self.attr_f64("valid_min") {
            min = Some(v);
        }
        if let Some(v) = self.attr_f64("valid_max") {
            max = Some(v);
        }
        (min, max)
    }
}

/// Read access to a netCDF dataset.
pub trait NcDataset: Send + Sync + fmt::Debug {
    /// Path or URL the dataset was opened from.
    fn source(&self) -> &str;

    /// All variables, in file order.
    fn variables(&self) -> Vec<VariableInfo>;

    fn dimension_len(&self, name: &str) -> Option<usize>;

    fn global_attributes(&self) -> BTreeMap<String, AttrValue>;

    /// Raw values of a variable, flattened in row-major order.
    fn read_values(&self, name: &str) -> NetCdfResult<Vec<f64>>;

    fn variable(&self, name: &str) -> Option<VariableInfo> {
        self.variables().into_iter().find(|v| v.name == name)
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables().into_iter().map(|v| v.name).collect()
    }

    /// Variables carrying attribute `attr` whose value satisfies `predicate`.
    fn variables_by_attribute(
        &self,
        attr: &str,
        predicate: &dyn Fn(&AttrValue) -> bool,
    ) -> Vec<VariableInfo> {
        self.variables()
            .into_iter()
            .filter(|v| v.attr(attr).map(predicate).unwrap_or(false))
            .collect()
    }

    /// Variables whose `standard_name` is one of `names`.
    fn variables_by_standard_name(&self, names: &[&str]) -> Vec<VariableInfo> {
        self.variables_by_attribute("standard_name", &|value| {
            value.as_str().map(|s| names.contains(&s)).unwrap_or(false)
        })
    }

    /// Values with `_FillValue`/`missing_value` mapped to NaN and
    /// `scale_factor`/`add_offset` applied.
    fn read_unpacked(&self, name: &str) -> NetCdfResult<Vec<f64>> {
        let info = self
            .variable(name)
            .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", name)))?;
        let raw = self.read_values(name)?;
        Ok(unpack(&raw, &info))
    }
}

/// Apply CF packing attributes to raw values.
pub fn unpack(raw: &[f64], info: &VariableInfo) -> Vec<f64> {
    let scale = info.attr_f64("scale_factor").unwrap_or(1.0);
    let offset = info.attr_f64("add_offset").unwrap_or(0.0);
    let fill = info.attr_f64("_FillValue");
    let missing = info.attr_f64("missing_value");

    raw.iter()
        .map(|&v| {
            let is_missing = [fill, missing]
                .iter()
                .flatten()
                .any(|m| v == *m || (v.is_nan() && m.is_nan()));
            if is_missing {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(attrs: &[(&str, AttrValue)]) -> VariableInfo {
        VariableInfo {
            name: "temp".to_string(),
            dimensions: vec!["time".to_string(), "node".to_string()],
            shape: vec![2, 3],
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_valid_bounds_precedence() {
        let v = info(&[
            ("valid_range", AttrValue::Numbers(vec![-5.0, 40.0])),
            ("valid_max", AttrValue::Number(35.0)),
        ]);
        assert_eq!(v.valid_bounds(), (Some(-5.0), Some(35.0)));

        let v = info(&[]);
        assert_eq!(v.valid_bounds(), (None, None));
    }

    #[test]
    fn test_unpack_fill_and_scale() {
        let v = info(&[
            ("_FillValue", AttrValue::Number(-999.0)),
            ("scale_factor", AttrValue::Number(0.5)),
            ("add_offset", AttrValue::Number(10.0)),
        ]);
        let out = unpack(&[2.0, -999.0, 4.0], &v);
        assert_eq!(out[0], 11.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 12.0);
    }

    #[test]
    fn test_attr_value_untagged_json() {
        let v: AttrValue = serde_json::from_str("\"time\"").unwrap();
        assert_eq!(v.as_str(), Some("time"));
        let v: AttrValue = serde_json::from_str("[0.0, 1.5]").unwrap();
        assert_eq!(v.as_f64_vec(), Some(vec![0.0, 1.5]));
        assert_eq!(v.as_f64(), Some(0.0));
    }
}
