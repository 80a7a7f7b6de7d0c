//! Dataset kinds.
//!
//! A kind knows how to recognise a dataset by its conventions and how to
//! derive bounds, depths and the cached topology from it. The base
//! `generic` kind implements none of that.

pub(crate) mod coords;
mod rgrid;
mod sgrid;
mod ugrid;

use std::fmt;
use tracing::debug;

use netcdf_parser::{MemoryDataset, NcDataset};
use wms_common::{BoundingBox, WmsError, WmsResult};

use crate::response::{WmsRequest, WmsResponse};

pub use rgrid::RGridKind;
pub use sgrid::SGridKind;
pub use ugrid::UGridKind;

/// Behaviour that differs between dataset conventions.
///
/// `var_name` arguments are the variable a layer reads (for virtual layers,
/// the first component).
pub trait DatasetKind: Send + Sync + fmt::Debug {
    /// Discriminator stored in the catalog.
    fn name(&self) -> &'static str;

    fn humanize(&self) -> &'static str;

    /// Whether `nc` follows this kind's conventions.
    fn is_valid(&self, nc: &dyn NcDataset) -> WmsResult<bool>;

    fn wgs84_bounds(&self, _nc: &dyn NcDataset, _var_name: &str) -> WmsResult<BoundingBox> {
        Err(WmsError::NotImplemented("wgs84_bounds"))
    }

    fn depths(&self, _nc: &dyn NcDataset, _var_name: &str) -> WmsResult<Vec<f64>> {
        Err(WmsError::NotImplemented("depths"))
    }

    /// The subset of `nc` worth caching for fast access.
    fn build_topology(&self, _nc: &dyn NcDataset) -> WmsResult<MemoryDataset> {
        Err(WmsError::NotImplemented("update_cache"))
    }

    fn getmap(
        &self,
        _nc: &dyn NcDataset,
        _var_name: &str,
        _request: &WmsRequest,
    ) -> WmsResult<WmsResponse> {
        Err(WmsError::NotImplemented("getmap"))
    }

    fn getlegendgraphic(
        &self,
        _nc: &dyn NcDataset,
        _var_name: &str,
        _request: &WmsRequest,
    ) -> WmsResult<WmsResponse> {
        Err(WmsError::NotImplemented("getlegendgraphic"))
    }

    fn getfeatureinfo(
        &self,
        _nc: &dyn NcDataset,
        _var_name: &str,
        _request: &WmsRequest,
    ) -> WmsResult<WmsResponse> {
        Err(WmsError::NotImplemented("getfeatureinfo"))
    }
}

/// The base kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericKind;

impl DatasetKind for GenericKind {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn humanize(&self) -> &'static str {
        "Generic Dataset"
    }

    fn is_valid(&self, _nc: &dyn NcDataset) -> WmsResult<bool> {
        Ok(false)
    }
}

/// Kinds `identify` considers, in order.
pub fn registered_kinds() -> Vec<Box<dyn DatasetKind>> {
    vec![Box::new(UGridKind), Box::new(SGridKind), Box::new(RGridKind)]
}

/// Look a kind up by its catalog discriminator.
pub fn kind_by_name(name: &str) -> Option<Box<dyn DatasetKind>> {
    if name == GenericKind.name() {
        return Some(Box::new(GenericKind));
    }
    registered_kinds().into_iter().find(|k| k.name() == name)
}

/// The first registered kind whose conventions `nc` follows.
///
/// A kind whose check fails with an error is skipped.
pub fn identify(nc: &dyn NcDataset) -> Option<Box<dyn DatasetKind>> {
    registered_kinds().into_iter().find(|kind| match kind.is_valid(nc) {
        Ok(valid) => valid,
        Err(e) => {
            debug!(kind = kind.name(), source = %nc.source(), error = %e, "Kind check failed");
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup() {
        assert_eq!(kind_by_name("generic").unwrap().humanize(), "Generic Dataset");
        assert_eq!(kind_by_name("ugrid").unwrap().name(), "ugrid");
        assert_eq!(kind_by_name("sgrid").unwrap().name(), "sgrid");
        assert_eq!(kind_by_name("rgrid").unwrap().name(), "rgrid");
        assert!(kind_by_name("zgrid").is_none());
    }

    #[test]
    fn test_generic_is_abstract() {
        let nc = MemoryDataset::new("empty");
        let request = WmsRequest::new();
        assert!(matches!(
            GenericKind.wgs84_bounds(&nc, "x"),
            Err(WmsError::NotImplemented("wgs84_bounds"))
        ));
        assert!(matches!(
            GenericKind.build_topology(&nc),
            Err(WmsError::NotImplemented("update_cache"))
        ));
        assert!(matches!(
            GenericKind.getmap(&nc, "x", &request),
            Err(WmsError::NotImplemented("getmap"))
        ));
        assert!(identify(&nc).is_none());
    }
}
