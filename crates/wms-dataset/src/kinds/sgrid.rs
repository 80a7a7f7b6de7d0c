//! SGRID (staggered structured grid) datasets.

use netcdf_parser::{MemoryDataset, NcDataset, SgridError, SgridTopology};
use wms_common::{BoundingBox, WmsError, WmsResult};

use super::coords;
use super::DatasetKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct SGridKind;

impl SGridKind {
    fn topology(nc: &dyn NcDataset) -> WmsResult<SgridTopology> {
        SgridTopology::from_dataset(nc).map_err(|e| WmsError::NetCdfError(e.to_string()))
    }

    /// Node coordinates, then face coordinates, then any lon/lat pair.
    fn lon_lat(nc: &dyn NcDataset, topo: &SgridTopology) -> WmsResult<(String, String)> {
        [&topo.node_coordinates, &topo.face_coordinates]
            .iter()
            .filter(|names| !names.is_empty())
            .find_map(|names| coords::lon_lat_from_attr(nc, &names.join(" ")))
            .or_else(|| {
                let (lons, lats) = coords::lon_lat_variables(nc);
                Some((lons.first()?.name.clone(), lats.first()?.name.clone()))
            })
            .ok_or_else(|| WmsError::NetCdfError(format!("grid {} has no coordinates", topo.variable)))
    }
}

impl DatasetKind for SGridKind {
    fn name(&self) -> &'static str {
        "sgrid"
    }

    fn humanize(&self) -> &'static str {
        "SGRID Dataset"
    }

    /// Non-compliant datasets are simply not SGRID; a grid topology with
    /// unreadable padding is an error.
    fn is_valid(&self, nc: &dyn NcDataset) -> WmsResult<bool> {
        match SgridTopology::from_dataset(nc) {
            Ok(_) => Ok(true),
            Err(SgridError::NonCompliant(_)) => Ok(false),
            Err(e) => Err(WmsError::NetCdfError(e.to_string())),
        }
    }

    fn wgs84_bounds(&self, nc: &dyn NcDataset, _var_name: &str) -> WmsResult<BoundingBox> {
        let topo = Self::topology(nc)?;
        let (lon, lat) = Self::lon_lat(nc, &topo)?;
        coords::bounds_from(nc, &lon, &lat)
    }

    fn depths(&self, nc: &dyn NcDataset, var_name: &str) -> WmsResult<Vec<f64>> {
        coords::depths_for(nc, var_name)
    }

    fn build_topology(&self, nc: &dyn NcDataset) -> WmsResult<MemoryDataset> {
        let topo = Self::topology(nc)?;
        let mut names = vec![topo.variable.clone()];
        names.extend(topo.node_coordinates.iter().cloned());
        names.extend(topo.face_coordinates.iter().cloned());
        if let Ok((lon, lat)) = Self::lon_lat(nc, &topo) {
            names.push(lon);
            names.push(lat);
        }
        coords::topology_from(nc, &names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcdf_parser::AttrValue;

    fn roms(face_dimensions: &str) -> MemoryDataset {
        let mut ds = MemoryDataset::new("roms");
        ds.add_dimension("xi_psi", 2);
        ds.add_dimension("eta_psi", 2);
        ds.add_variable(
            "grid",
            &[],
            vec![0.0],
            &[
                ("cf_role", "grid_topology".into()),
                ("topology_dimension", AttrValue::Number(2.0)),
                ("node_dimensions", "xi_psi eta_psi".into()),
                ("face_dimensions", face_dimensions.into()),
                ("node_coordinates", "lon_psi lat_psi".into()),
            ],
        )
        .unwrap();
        ds.add_variable(
            "lon_psi",
            &["eta_psi", "xi_psi"],
            vec![-71.0, -70.0, -71.0, -70.0],
            &[("units", "degree_east".into())],
        )
        .unwrap();
        ds.add_variable(
            "lat_psi",
            &["eta_psi", "xi_psi"],
            vec![40.0, 40.0, 41.0, 41.0],
            &[("units", "degree_north".into())],
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_sgrid_valid_and_bounds() {
        let ds = roms("xi_rho: xi_psi (padding: both) eta_rho: eta_psi (padding: both)");
        assert!(SGridKind.is_valid(&ds).unwrap());
        let bbox = SGridKind.wgs84_bounds(&ds, "zeta").unwrap();
        assert_eq!(bbox, BoundingBox::new(-71.0, 40.0, -70.0, 41.0));

        let topo = SGridKind.build_topology(&ds).unwrap();
        assert!(topo.variable("lon_psi").is_some());
        assert!(topo.variable("grid").is_some());
    }

    #[test]
    fn test_sgrid_bad_padding_is_error() {
        let ds = roms("xi_rho: xi_psi eta_rho: eta_psi");
        assert!(SGridKind.is_valid(&ds).is_err());
        assert!(!SGridKind.is_valid(&MemoryDataset::new("plain")).unwrap());
    }
}
