//! Multi-file datasets joined along a record dimension.

use std::collections::BTreeMap;
use tracing::debug;

use crate::dataset::{AttrValue, NcDataset, VariableInfo};
use crate::error::{NetCdfError, NetCdfResult};

/// Several datasets with identical structure presented as one, concatenated
/// along `dimension`. Variables that do not lead with `dimension` are read
/// from the first member.
#[derive(Debug)]
pub struct AggregatedDataset {
    source: String,
    dimension: String,
    members: Vec<Box<dyn NcDataset>>,
}

impl AggregatedDataset {
    pub fn new(
        source: impl Into<String>,
        members: Vec<Box<dyn NcDataset>>,
        dimension: &str,
    ) -> NetCdfResult<Self> {
        if members.is_empty() {
            return Err(NetCdfError::MissingData(
                "aggregation needs at least one member".to_string(),
            ));
        }
        if members.iter().any(|m| m.dimension_len(dimension).is_none()) {
            return Err(NetCdfError::InvalidFormat(format!(
                "every member must define the '{}' dimension",
                dimension
            )));
        }

        let source = source.into();
        debug!(source = %source, members = members.len(), dimension = %dimension, "Aggregated dataset");

        Ok(Self {
            source,
            dimension: dimension.to_string(),
            members,
        })
    }

    pub fn members(&self) -> usize {
        self.members.len()
    }

    fn is_aggregated(&self, info: &VariableInfo) -> bool {
        info.dimensions.first().map(|d| d == &self.dimension).unwrap_or(false)
    }

    fn first(&self) -> &dyn NcDataset {
        self.members[0].as_ref()
    }
}

impl NcDataset for AggregatedDataset {
    fn source(&self) -> &str {
        &self.source
    }

    fn variables(&self) -> Vec<VariableInfo> {
        let total = self.dimension_len(&self.dimension);
        self.first()
            .variables()
            .into_iter()
            .map(|mut info| {
                if let (true, Some(total)) = (self.is_aggregated(&info), total) {
                    info.shape[0] = total;
                }
                info
            })
            .collect()
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        if name == self.dimension {
            self.members.iter().map(|m| m.dimension_len(name)).sum()
        } else {
            self.first().dimension_len(name)
        }
    }

    fn global_attributes(&self) -> BTreeMap<String, AttrValue> {
        self.first().global_attributes()
    }

    fn read_values(&self, name: &str) -> NetCdfResult<Vec<f64>> {
        let info = self
            .first()
            .variable(name)
            .ok_or_else(|| NetCdfError::MissingData(format!("variable {}", name)))?;

        if !self.is_aggregated(&info) {
            return self.first().read_values(name);
        }

        let mut values = Vec::new();
        for member in &self.members {
            values.extend(member.read_values(name)?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDataset;

    fn member(start: f64, nodes: usize) -> Box<dyn NcDataset> {
        let mut ds = MemoryDataset::new("");
        ds.add_dimension("time", 2);
        ds.add_dimension("node", nodes);
        ds.add_variable("time", &["time"], vec![start, start + 1.0], &[]).unwrap();
        ds.add_variable("lon", &["node"], (0..nodes).map(|i| i as f64).collect(), &[])
            .unwrap();
        ds.add_variable("zeta", &["time", "node"], vec![start; 2 * nodes], &[])
            .unwrap();
        Box::new(ds)
    }

    #[test]
    fn test_record_variables_are_concatenated() {
        let agg = AggregatedDataset::new("multi", vec![member(0.0, 3), member(10.0, 3)], "time")
            .unwrap();
        assert_eq!(agg.read_values("time").unwrap(), vec![0.0, 1.0, 10.0, 11.0]);
        assert_eq!(agg.read_values("zeta").unwrap().len(), 12);
        assert_eq!(agg.variable("zeta").unwrap().shape, vec![4, 3]);
    }

    #[test]
    fn test_static_variables_come_from_first_member() {
        let agg = AggregatedDataset::new("multi", vec![member(0.0, 3), member(10.0, 3)], "time")
            .unwrap();
        assert_eq!(agg.read_values("lon").unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(agg.dimension_len("node"), Some(3));
        assert_eq!(agg.members(), 2);
    }

    #[test]
    fn test_members_must_share_dimension() {
        let mut no_time = MemoryDataset::new("");
        no_time.add_dimension("node", 1);
        let result = AggregatedDataset::new("multi", vec![member(0.0, 1), Box::new(no_time)], "time");
        assert!(matches!(result, Err(NetCdfError::InvalidFormat(_))));
    }
}
