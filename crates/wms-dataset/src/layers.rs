//! Layer discovery: one layer per variable, plus virtual vector layers for
//! matching u/v component pairs.

use serde::Serialize;
use tracing::{debug, info};

use netcdf_parser::{NcDataset, VariableInfo};
use storage::Catalog;
use wms_common::{Style, WmsResult};

/// A family of vector quantities assembled from u/v components.
#[derive(Debug, Clone, Copy)]
pub struct VectorFamily {
    pub u_names: &'static [&'static str],
    pub v_names: &'static [&'static str],
    pub std_name: &'static str,
    pub image_type: &'static str,
}

/// Vector families recognised by standard name. A u and a v variable pair
/// up when their standard names sit at the same position in the tables.
pub const VECTOR_FAMILIES: &[VectorFamily] = &[
    // Earth projected sea water velocity
    VectorFamily {
        u_names: &[
            "eastward_sea_water_velocity",
            "eastward_sea_water_velocity_assuming_no_tide",
        ],
        v_names: &[
            "northward_sea_water_velocity",
            "northward_sea_water_velocity_assuming_no_tide",
        ],
        std_name: "sea_water_velocity",
        image_type: "vectors",
    },
    // Grid projected sea water velocity
    VectorFamily {
        u_names: &["x_sea_water_velocity", "grid_eastward_sea_water_velocity"],
        v_names: &["y_sea_water_velocity", "grid_northward_sea_water_velocity"],
        std_name: "grid_sea_water_velocity",
        image_type: "vectors",
    },
    // Earth projected winds
    VectorFamily {
        u_names: &["eastward_wind"],
        v_names: &["northward_wind"],
        std_name: "winds",
        image_type: "barbs",
    },
    // Grid projected winds
    VectorFamily {
        u_names: &["x_wind", "grid_eastward_wind"],
        v_names: &["y_wind", "grid_northward_wind"],
        std_name: "grid_winds",
        image_type: "barbs",
    },
    // Earth projected ice velocity
    VectorFamily {
        u_names: &["eastward_sea_ice_velocity"],
        v_names: &["northward_sea_ice_velocity"],
        std_name: "sea_ice_velocity",
        image_type: "vectors",
    },
];

impl VectorFamily {
    fn position(names: &[&str], var: &VariableInfo) -> Option<usize> {
        let std_name = var.standard_name()?;
        names.iter().position(|n| *n == std_name)
    }

    /// `(u, v)` variable name pairs of this family found in `nc`.
    pub fn pairs(&self, nc: &dyn NcDataset) -> Vec<(String, String)> {
        let us = nc.variables_by_standard_name(self.u_names);
        let vs = nc.variables_by_standard_name(self.v_names);

        let mut pairs = Vec::new();
        for u in &us {
            for v in &vs {
                let same_slot = Self::position(self.u_names, u) == Self::position(self.v_names, v);
                if same_slot && u.dimensions == v.dimensions {
                    pairs.push((u.name.clone(), v.name.clone()));
                }
            }
        }
        pairs
    }
}

/// What a layer pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayerSummary {
    pub layers: usize,
    pub virtual_layers: usize,
}

/// Create or refresh the layer of every variable in `nc`, then the virtual
/// layers.
pub async fn process_layers(
    catalog: &Catalog,
    dataset_id: i64,
    nc: &dyn NcDataset,
) -> WmsResult<LayerSummary> {
    let variables = nc.variables();

    for var in &variables {
        let mut layer = catalog.get_or_create_layer(dataset_id, &var.name).await?;

        let (min, max) = var.valid_bounds();
        if min.is_some() {
            layer.default_min = min;
        }
        if max.is_some() {
            layer.default_max = max;
        }

        if let Some(std_name) = var.standard_name() {
            layer.std_name = Some(std_name.to_string());
            if var.ndim() > 1 {
                layer.active = true;
            }
        }

        if let Some(long_name) = var.attr_str("long_name") {
            layer.description = Some(long_name.to_string());
        }

        layer.styles = Style::defaults();
        catalog.save_layer(&layer).await?;
        debug!(dataset_id, variable = %var.name, active = layer.active, "Processed layer");
    }

    let virtual_layers = analyze_virtual_layers(catalog, dataset_id, nc).await?;

    info!(
        dataset_id,
        layers = variables.len(),
        virtual_layers,
        "Processed dataset layers"
    );

    Ok(LayerSummary {
        layers: variables.len(),
        virtual_layers,
    })
}

/// Create the virtual layers of every vector family in `nc`. Returns how
/// many pairs were found.
pub async fn analyze_virtual_layers(
    catalog: &Catalog,
    dataset_id: i64,
    nc: &dyn NcDataset,
) -> WmsResult<usize> {
    let mut count = 0;

    for family in VECTOR_FAMILIES {
        for (u, v) in family.pairs(nc) {
            let var_name = format!("{},{}", u, v);
            let mut layer = catalog.get_or_create_virtual_layer(dataset_id, &var_name).await?;
            layer.std_name = Some(family.std_name.to_string());
            layer.active = true;
            layer.styles = Style::vector_defaults(family.image_type);
            catalog.save_virtual_layer(&layer).await?;

            debug!(dataset_id, layer = %var_name, family = family.std_name, "Virtual layer");
            count += 1;
        }
    }

    Ok(count)
}
