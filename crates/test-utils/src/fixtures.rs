//! Synthetic ocean datasets following the conventions the model
//! recognises, plus a temporary project directory to put them in.

use std::path::{Path, PathBuf};

use netcdf_parser::{AttrValue, MemoryDataset};
use tempfile::TempDir;

use crate::generators::{create_temperature_grid, linear_axis};

/// Common time values for testing.
pub mod time {
    /// Units of every fixture time axis
    pub const UNITS: &str = "hours since 2024-01-01 00:00:00";

    /// Six-hourly steps for the first day
    pub const SIX_HOURLY: [f64; 4] = [0.0, 6.0, 12.0, 18.0];
}

/// Common bounding boxes as `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    pub const GULF_OF_MAINE: (f64, f64, f64, f64) = (-70.5, 42.0, -69.5, 43.0);

    pub const NEW_YORK_BIGHT: (f64, f64, f64, f64) = (-74.0, 39.0, -72.0, 40.5);

    pub const NORTH_ATLANTIC: (f64, f64, f64, f64) = (-80.0, 30.0, -40.0, 50.0);
}

fn add(ds: &mut MemoryDataset, name: &str, dims: &[&str], data: Vec<f64>, attrs: &[(&str, AttrValue)]) {
    ds.add_variable(name, dims, data, attrs)
        .unwrap_or_else(|e| panic!("fixture variable {}: {}", name, e));
}

fn add_time(ds: &mut MemoryDataset, name: &str, times: &[f64]) {
    ds.add_dimension(name, times.len());
    add(
        ds,
        name,
        &[name],
        times.to_vec(),
        &[
            ("standard_name", "time".into()),
            ("units", time::UNITS.into()),
            ("calendar", "gregorian".into()),
        ],
    );
}

/// FVCOM-like unstructured mesh: three nodes, one face, two sigma layers.
///
/// Variables: `mesh`, `lon`/`lat` (nodes), `nv`, `siglay`, `time`,
/// `temp(time, siglay, node)`, `u`/`v(time, siglay, nele)` sea water
/// velocity, `zeta(time, node)` and the 1-D bathymetry `h(node)`.
pub fn ugrid_dataset(times: &[f64]) -> MemoryDataset {
    let (min_lon, min_lat, max_lon, max_lat) = bbox::GULF_OF_MAINE;
    let nt = times.len();

    let mut ds = MemoryDataset::new("fvcom");
    ds.add_dimension("node", 3);
    ds.add_dimension("nele", 1);
    ds.add_dimension("three", 3);
    ds.add_dimension("siglay", 2);
    add_time(&mut ds, "time", times);

    add(
        &mut ds,
        "mesh",
        &[],
        vec![0.0],
        &[
            ("cf_role", "mesh_topology".into()),
            ("topology_dimension", AttrValue::Number(2.0)),
            ("node_coordinates", "lon lat".into()),
            ("face_node_connectivity", "nv".into()),
        ],
    );
    add(
        &mut ds,
        "lon",
        &["node"],
        vec![min_lon, max_lon, (min_lon + max_lon) / 2.0],
        &[("standard_name", "longitude".into()), ("units", "degrees_east".into())],
    );
    add(
        &mut ds,
        "lat",
        &["node"],
        vec![min_lat, min_lat, max_lat],
        &[("standard_name", "latitude".into()), ("units", "degrees_north".into())],
    );
    add(&mut ds, "nv", &["three", "nele"], vec![1.0, 2.0, 3.0], &[]);
    add(
        &mut ds,
        "siglay",
        &["siglay"],
        vec![-0.25, -0.75],
        &[("standard_name", "ocean_sigma_coordinate".into()), ("positive", "up".into())],
    );
    add(
        &mut ds,
        "temp",
        &["time", "siglay", "node"],
        create_temperature_grid(3, 2 * nt),
        &[
            ("standard_name", "sea_water_temperature".into()),
            ("long_name", "temperature".into()),
            ("valid_range", AttrValue::Numbers(vec![-2.0, 40.0])),
        ],
    );
    add(
        &mut ds,
        "u",
        &["time", "siglay", "nele"],
        vec![0.5; 2 * nt],
        &[("standard_name", "eastward_sea_water_velocity".into())],
    );
    add(
        &mut ds,
        "v",
        &["time", "siglay", "nele"],
        vec![-0.5; 2 * nt],
        &[("standard_name", "northward_sea_water_velocity".into())],
    );
    add(
        &mut ds,
        "zeta",
        &["time", "node"],
        vec![0.1; 3 * nt],
        &[("standard_name", "sea_surface_height_above_geoid".into())],
    );
    add(
        &mut ds,
        "h",
        &["node"],
        vec![20.0, 35.0, 50.0],
        &[("standard_name", "sea_floor_depth_below_geoid".into())],
    );
    ds
}

/// ROMS-like staggered grid on psi points with an `ocean_time` axis.
pub fn sgrid_dataset(times: &[f64]) -> MemoryDataset {
    let (min_lon, min_lat, max_lon, max_lat) = bbox::NEW_YORK_BIGHT;
    let nt = times.len();

    let mut ds = MemoryDataset::new("roms");
    ds.add_dimension("xi_psi", 2);
    ds.add_dimension("eta_psi", 2);
    add_time(&mut ds, "ocean_time", times);

    add(
        &mut ds,
        "grid",
        &[],
        vec![0.0],
        &[
            ("cf_role", "grid_topology".into()),
            ("topology_dimension", AttrValue::Number(2.0)),
            ("node_dimensions", "xi_psi eta_psi".into()),
            (
                "face_dimensions",
                "xi_rho: xi_psi (padding: both) eta_rho: eta_psi (padding: both)".into(),
            ),
            ("node_coordinates", "lon_psi lat_psi".into()),
        ],
    );
    add(
        &mut ds,
        "lon_psi",
        &["eta_psi", "xi_psi"],
        vec![min_lon, max_lon, min_lon, max_lon],
        &[("units", "degree_east".into())],
    );
    add(
        &mut ds,
        "lat_psi",
        &["eta_psi", "xi_psi"],
        vec![min_lat, min_lat, max_lat, max_lat],
        &[("units", "degree_north".into())],
    );
    add(
        &mut ds,
        "zeta",
        &["ocean_time", "eta_psi", "xi_psi"],
        vec![0.2; 4 * nt],
        &[("standard_name", "sea_surface_height".into()), ("long_name", "free-surface".into())],
    );
    add(
        &mut ds,
        "u",
        &["ocean_time", "eta_psi", "xi_psi"],
        vec![0.1; 4 * nt],
        &[("standard_name", "x_sea_water_velocity".into())],
    );
    add(
        &mut ds,
        "v",
        &["ocean_time", "eta_psi", "xi_psi"],
        vec![0.1; 4 * nt],
        &[("standard_name", "y_sea_water_velocity".into())],
    );
    ds
}

/// Regular lat/lon grid with depth levels and earth-projected winds.
pub fn rgrid_dataset(times: &[f64]) -> MemoryDataset {
    let (min_lon, min_lat, max_lon, max_lat) = bbox::NORTH_ATLANTIC;
    let (nx, ny, nz, nt) = (3, 2, 2, times.len());

    let mut ds = MemoryDataset::new("hycom");
    ds.add_dimension("lon", nx);
    ds.add_dimension("lat", ny);
    ds.add_dimension("depth", nz);
    add_time(&mut ds, "time", times);

    add(
        &mut ds,
        "lon",
        &["lon"],
        linear_axis(min_lon, (max_lon - min_lon) / (nx - 1) as f64, nx),
        &[("standard_name", "longitude".into()), ("units", "degrees_east".into())],
    );
    add(
        &mut ds,
        "lat",
        &["lat"],
        linear_axis(min_lat, (max_lat - min_lat) / (ny - 1) as f64, ny),
        &[("standard_name", "latitude".into()), ("units", "degrees_north".into())],
    );
    add(
        &mut ds,
        "depth",
        &["depth"],
        vec![0.0, 100.0],
        &[("axis", "Z".into()), ("positive", "down".into())],
    );
    add(
        &mut ds,
        "water_temp",
        &["time", "depth", "lat", "lon"],
        create_temperature_grid(nx, ny * nz * nt),
        &[
            ("standard_name", "sea_water_temperature".into()),
            ("valid_min", AttrValue::Number(-5.0)),
            ("valid_max", AttrValue::Number(45.0)),
        ],
    );
    add(
        &mut ds,
        "uwnd",
        &["time", "lat", "lon"],
        vec![5.0; nx * ny * nt],
        &[("standard_name", "eastward_wind".into())],
    );
    add(
        &mut ds,
        "vwnd",
        &["time", "lat", "lon"],
        vec![2.0; nx * ny * nt],
        &[("standard_name", "northward_wind".into())],
    );
    ds
}

/// Data no kind recognises.
pub fn generic_dataset() -> MemoryDataset {
    let mut ds = MemoryDataset::new("generic");
    ds.add_dimension("n", 3);
    add(&mut ds, "x", &["n"], vec![1.0, 2.0, 3.0], &[("long_name", "samples".into())]);
    ds
}

/// A temporary project root; removed on drop.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap_or_else(|e| panic!("temp dir: {}", e)),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `dataset` as a snapshot at `relative` under the root and
    /// return its absolute path.
    pub fn write_snapshot(&self, relative: &str, dataset: &MemoryDataset) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("{}: {}", parent.display(), e));
        }
        let json = dataset
            .to_json()
            .unwrap_or_else(|e| panic!("snapshot {}: {}", relative, e));
        std::fs::write(&path, json).unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
