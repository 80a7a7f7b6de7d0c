//! SGRID (staggered grid) convention checks.
//!
//! An SGRID dataset has a dummy variable with `cf_role = "grid_topology"`
//! whose attributes name the node and face dimensions, e.g.
//!
//! ```text
//! grid:cf_role = "grid_topology" ;
//! grid:topology_dimension = 2 ;
//! grid:node_dimensions = "xi_psi eta_psi" ;
//! grid:face_dimensions = "xi_rho: xi_psi (padding: both) eta_rho: eta_psi (padding: both)" ;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::dataset::NcDataset;

static PADDING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+)\s*:\s*(\w+)\s*\(\s*padding\s*:\s*(\w+)\s*\)").unwrap()
});

#[derive(Debug, Error, PartialEq)]
pub enum SgridError {
    #[error("The netCDF file appears to have conform to SGRID conventions, but padding values cannot be found: {0}")]
    CannotFindPadding(String),

    #[error("This netCDF object does not appear to be SGRID compliant: {0}.")]
    NonCompliant(String),
}

/// Padding of a face dimension relative to its node dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    None,
    Low,
    High,
    Both,
}

impl FromStr for Padding {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Padding::None),
            "low" => Ok(Padding::Low),
            "high" => Ok(Padding::High),
            "both" => Ok(Padding::Both),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPadding {
    pub face_dim: String,
    pub node_dim: String,
    pub padding: Padding,
}

/// Parse a `face_dimensions`-style attribute.
pub fn parse_padding(attr: &str) -> Result<Vec<GridPadding>, SgridError> {
    let paddings = PADDING_RE
        .captures_iter(attr)
        .map(|caps| {
            caps[3]
                .parse::<Padding>()
                .map(|padding| GridPadding {
                    face_dim: caps[1].to_string(),
                    node_dim: caps[2].to_string(),
                    padding,
                })
                .map_err(|_| SgridError::CannotFindPadding(attr.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if paddings.is_empty() {
        return Err(SgridError::CannotFindPadding(attr.to_string()));
    }
    Ok(paddings)
}

/// The grid topology of an SGRID dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgridTopology {
    /// Name of the `grid_topology` variable
    pub variable: String,
    pub node_dimensions: Vec<String>,
    pub face_padding: Vec<GridPadding>,
    /// Longitude/latitude variables of the nodes, if declared
    pub node_coordinates: Vec<String>,
    pub face_coordinates: Vec<String>,
}

impl SgridTopology {
    pub fn from_dataset(nc: &dyn NcDataset) -> Result<Self, SgridError> {
        let non_compliant = || SgridError::NonCompliant(nc.source().to_string());

        let topology = nc
            .variables_by_attribute("cf_role", &|v| v.as_str() == Some("grid_topology"))
            .into_iter()
            .next()
            .ok_or_else(non_compliant)?;

        match topology.attr_f64("topology_dimension") {
            Some(d) if d == 2.0 => {}
            _ => return Err(non_compliant()),
        }

        let node_dimensions = split_names(topology.attr_str("node_dimensions"));
        if node_dimensions.len() != 2 {
            return Err(non_compliant());
        }

        let face_dimensions = topology.attr_str("face_dimensions").ok_or_else(non_compliant)?;
        let face_padding = parse_padding(face_dimensions)?;

        Ok(Self {
            variable: topology.name.clone(),
            node_dimensions,
            face_padding,
            node_coordinates: split_names(topology.attr_str("node_coordinates")),
            face_coordinates: split_names(topology.attr_str("face_coordinates")),
        })
    }
}

fn split_names(attr: Option<&str>) -> Vec<String> {
    attr.map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
