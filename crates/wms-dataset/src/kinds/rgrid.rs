//! Regular (rectilinear) grids with 1-D latitude and longitude axes.

use netcdf_parser::{MemoryDataset, NcDataset};
use wms_common::{BoundingBox, WmsError, WmsResult};

use super::coords;
use super::DatasetKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct RGridKind;

impl RGridKind {
    fn axes(nc: &dyn NcDataset) -> Option<(String, String)> {
        let (lons, lats) = coords::lon_lat_variables(nc);
        let lon = lons.into_iter().find(|v| v.ndim() == 1)?;
        let lat = lats.into_iter().find(|v| v.ndim() == 1)?;
        Some((lon.name, lat.name))
    }
}

impl DatasetKind for RGridKind {
    fn name(&self) -> &'static str {
        "rgrid"
    }

    fn humanize(&self) -> &'static str {
        "RGRID Dataset"
    }

    fn is_valid(&self, nc: &dyn NcDataset) -> WmsResult<bool> {
        Ok(Self::axes(nc).is_some())
    }

    fn wgs84_bounds(&self, nc: &dyn NcDataset, _var_name: &str) -> WmsResult<BoundingBox> {
        let (lon, lat) = Self::axes(nc)
            .ok_or_else(|| WmsError::NetCdfError("no 1-D latitude/longitude axes".to_string()))?;
        coords::bounds_from(nc, &lon, &lat)
    }

    fn depths(&self, nc: &dyn NcDataset, var_name: &str) -> WmsResult<Vec<f64>> {
        coords::depths_for(nc, var_name)
    }

    fn build_topology(&self, nc: &dyn NcDataset) -> WmsResult<MemoryDataset> {
        let (lon, lat) = Self::axes(nc)
            .ok_or_else(|| WmsError::NetCdfError("no 1-D latitude/longitude axes".to_string()))?;
        coords::topology_from(nc, &[lon, lat])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgrid_axes() {
        let mut ds = MemoryDataset::new("gfs");
        ds.add_dimension("lat", 2);
        ds.add_dimension("lon", 3);
        ds.add_dimension("depth", 2);
        ds.add_variable("lat", &["lat"], vec![10.0, 20.0], &[("units", "degrees_north".into())])
            .unwrap();
        ds.add_variable("lon", &["lon"], vec![0.0, 90.0, 180.0], &[("units", "degrees_east".into())])
            .unwrap();
        ds.add_variable("depth", &["depth"], vec![0.0, 10.0], &[("axis", "Z".into())])
            .unwrap();
        ds.add_variable("temp", &["depth", "lat", "lon"], vec![1.0; 12], &[]).unwrap();

        assert!(RGridKind.is_valid(&ds).unwrap());
        assert_eq!(
            RGridKind.wgs84_bounds(&ds, "temp").unwrap(),
            BoundingBox::new(0.0, 10.0, 180.0, 20.0)
        );
        assert_eq!(RGridKind.depths(&ds, "temp").unwrap(), vec![0.0, 10.0]);
        assert_eq!(RGridKind.build_topology(&ds).unwrap().variables().len(), 3);
    }
}
