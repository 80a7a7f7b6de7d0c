//! Coordinate discovery shared by the gridded kinds.

use netcdf_parser::{MemoryDataset, NcDataset, VariableInfo};
use wms_common::{BoundingBox, WmsError, WmsResult};

const VERTICAL_STANDARD_NAMES: &[&str] = &[
    "depth",
    "height",
    "altitude",
    "ocean_sigma_coordinate",
    "ocean_s_coordinate",
    "ocean_s_coordinate_g1",
    "ocean_s_coordinate_g2",
    "ocean_sigma_z_coordinate",
];

fn is_longitude(var: &VariableInfo) -> bool {
    var.standard_name() == Some("longitude")
        || matches!(
            var.attr_str("units"),
            Some("degrees_east" | "degree_east" | "degree_E" | "degrees_E")
        )
}

fn is_latitude(var: &VariableInfo) -> bool {
    var.standard_name() == Some("latitude")
        || matches!(
            var.attr_str("units"),
            Some("degrees_north" | "degree_north" | "degree_N" | "degrees_N")
        )
}

/// Longitude and latitude variables named in a `*_coordinates` attribute.
///
/// Names are matched by CF role; when the variables carry none, the
/// attribute order (x first) is used.
pub(crate) fn lon_lat_from_attr(nc: &dyn NcDataset, attr: &str) -> Option<(String, String)> {
    let vars: Vec<VariableInfo> = attr
        .split_whitespace()
        .filter_map(|name| nc.variable(name))
        .collect();

    let lon = vars.iter().find(|v| is_longitude(v));
    let lat = vars.iter().find(|v| is_latitude(v));
    match (lon, lat) {
        (Some(lon), Some(lat)) => Some((lon.name.clone(), lat.name.clone())),
        _ if vars.len() == 2 => Some((vars[0].name.clone(), vars[1].name.clone())),
        _ => None,
    }
}

/// All longitude and latitude variables of `nc`.
pub(crate) fn lon_lat_variables(nc: &dyn NcDataset) -> (Vec<VariableInfo>, Vec<VariableInfo>) {
    let vars = nc.variables();
    let lons = vars.iter().filter(|v| is_longitude(v)).cloned().collect();
    let lats = vars.iter().filter(|v| is_latitude(v)).cloned().collect();
    (lons, lats)
}

/// Extent of the named coordinate variables.
pub(crate) fn bounds_from(nc: &dyn NcDataset, lon: &str, lat: &str) -> WmsResult<BoundingBox> {
    let lons = nc.read_unpacked(lon)?;
    let lats = nc.read_unpacked(lat)?;
    BoundingBox::from_coordinates(&lons, &lats).ok_or_else(|| {
        WmsError::DataNotAvailable(format!("no valid coordinates in {} / {}", lon, lat))
    })
}

fn is_vertical(var: &VariableInfo) -> bool {
    var.attr_str("axis").map(|a| a.eq_ignore_ascii_case("z")).unwrap_or(false)
        || var.has_attr("positive")
        || var
            .standard_name()
            .map(|s| VERTICAL_STANDARD_NAMES.contains(&s))
            .unwrap_or(false)
}

/// One-dimensional vertical coordinate variables of `nc`.
pub(crate) fn vertical_variables(nc: &dyn NcDataset) -> Vec<VariableInfo> {
    nc.variables()
        .into_iter()
        .filter(|v| v.ndim() == 1 && is_vertical(v))
        .collect()
}

/// Vertical levels of `var_name`: the values of the vertical coordinate it
/// is dimensioned by, or nothing for 2-D variables.
pub(crate) fn depths_for(nc: &dyn NcDataset, var_name: &str) -> WmsResult<Vec<f64>> {
    let var = nc
        .variable(var_name)
        .ok_or_else(|| WmsError::LayerNotFound(var_name.to_string()))?;

    let vertical = vertical_variables(nc)
        .into_iter()
        .find(|z| var.dimensions.contains(&z.dimensions[0]));

    match vertical {
        Some(z) => Ok(nc
            .read_unpacked(&z.name)?
            .into_iter()
            .filter(|v| v.is_finite())
            .collect()),
        None => Ok(Vec::new()),
    }
}

/// Copy `names` plus every time and vertical coordinate into a new
/// dataset. Names that do not exist are skipped.
pub(crate) fn topology_from(nc: &dyn NcDataset, names: &[String]) -> WmsResult<MemoryDataset> {
    let mut wanted: Vec<String> = Vec::new();
    let extra = nc
        .variables_by_standard_name(&["time"])
        .into_iter()
        .chain(vertical_variables(nc))
        .map(|v| v.name);

    for name in names.iter().cloned().chain(extra) {
        if !wanted.contains(&name) && nc.variable(&name).is_some() {
            wanted.push(name);
        }
    }

    let refs: Vec<&str> = wanted.iter().map(String::as_str).collect();
    Ok(MemoryDataset::extract(nc, &refs)?)
}
