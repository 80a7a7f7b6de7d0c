//! UGRID (unstructured mesh) datasets.

use netcdf_parser::{MemoryDataset, NcDataset, VariableInfo};
use wms_common::{BoundingBox, WmsError, WmsResult};

use super::coords;
use super::DatasetKind;

/// Connectivity and coordinate attributes copied into the topology.
const MESH_ATTRIBUTES: &[&str] = &[
    "node_coordinates",
    "face_coordinates",
    "face_node_connectivity",
    "face_face_connectivity",
    "edge_node_connectivity",
    "boundary_node_connectivity",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct UGridKind;

impl UGridKind {
    fn mesh(nc: &dyn NcDataset) -> Option<VariableInfo> {
        nc.variables_by_attribute("cf_role", &|v| v.as_str() == Some("mesh_topology"))
            .into_iter()
            .next()
    }

    fn node_lon_lat(nc: &dyn NcDataset) -> WmsResult<(String, String)> {
        let mesh = Self::mesh(nc)
            .ok_or_else(|| WmsError::NetCdfError("no mesh_topology variable".to_string()))?;
        mesh.attr_str("node_coordinates")
            .and_then(|attr| coords::lon_lat_from_attr(nc, attr))
            .ok_or_else(|| {
                WmsError::NetCdfError(format!("mesh {} has no usable node_coordinates", mesh.name))
            })
    }
}

impl DatasetKind for UGridKind {
    fn name(&self) -> &'static str {
        "ugrid"
    }

    fn humanize(&self) -> &'static str {
        "UGRID Dataset"
    }

    fn is_valid(&self, nc: &dyn NcDataset) -> WmsResult<bool> {
        Ok(Self::mesh(nc).is_some())
    }

    fn wgs84_bounds(&self, nc: &dyn NcDataset, _var_name: &str) -> WmsResult<BoundingBox> {
        let (lon, lat) = Self::node_lon_lat(nc)?;
        coords::bounds_from(nc, &lon, &lat)
    }

    fn depths(&self, nc: &dyn NcDataset, var_name: &str) -> WmsResult<Vec<f64>> {
        coords::depths_for(nc, var_name)
    }

    fn build_topology(&self, nc: &dyn NcDataset) -> WmsResult<MemoryDataset> {
        let mesh = Self::mesh(nc)
            .ok_or_else(|| WmsError::NetCdfError("no mesh_topology variable".to_string()))?;

        let mut names = vec![mesh.name.clone()];
        for attr in MESH_ATTRIBUTES {
            if let Some(value) = mesh.attr_str(attr) {
                names.extend(value.split_whitespace().map(str::to_string));
            }
        }
        coords::topology_from(nc, &names)
    }
}
