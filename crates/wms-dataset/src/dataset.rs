//! The dataset model.
//!
//! A [`Dataset`] wraps a catalog row with everything needed to work with
//! it: the kind that understands its conventions, the store that opens
//! it, and the location of its topology cache. The canonical netCDF
//! handle is opened once on load and closed on drop.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use netcdf_parser::{open_dataset, try_open_dataset, write_atomic, NcDataset, NcStore};
use storage::{Catalog, DatasetRecord, NewDataset};
use wms_common::{AnyLayer, BoundingBox, Bounds, WmsError, WmsResult};

use crate::config::Settings;
use crate::kinds::{coords, identify, kind_by_name, DatasetKind, GenericKind};
use crate::layers::{self, LayerSummary};
use crate::nearest;
use crate::response::{self, WmsRequest, WmsResponse};
use crate::topology::{CacheOutcome, DomainSummary, TopologyPaths};

/// Shared handles every dataset model needs.
#[derive(Clone)]
pub struct DatasetContext {
    pub catalog: Arc<Catalog>,
    pub store: Arc<dyn NcStore>,
    pub settings: Settings,
}

impl DatasetContext {
    pub fn new(catalog: Catalog, store: Arc<dyn NcStore>, settings: Settings) -> Self {
        Self {
            catalog: Arc::new(catalog),
            store,
            settings,
        }
    }

    /// Open the catalog named by `settings` with the default store.
    pub async fn open(settings: Settings) -> WmsResult<Self> {
        let catalog = Catalog::open(&settings.database_path).await?;
        Ok(Self::new(catalog, default_store(), settings))
    }
}

/// libnetcdf with the default `netcdf` feature, JSON snapshots without it.
pub fn default_store() -> Arc<dyn NcStore> {
    #[cfg(feature = "netcdf")]
    {
        netcdf_parser::silence_hdf5_errors();
        Arc::new(netcdf_parser::NativeStore)
    }
    #[cfg(not(feature = "netcdf"))]
    {
        Arc::new(netcdf_parser::MemoryStore::new())
    }
}

/// Scheme of `uri`, if it has one.
fn uri_scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Remove `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve a dataset URI against `project_root`.
///
/// URIs with a scheme and absolute paths are returned unchanged. Relative
/// paths are joined to the project root and made absolute; symlinks are
/// resolved when the target exists.
pub fn resolve_path(project_root: &Path, uri: &str) -> String {
    if uri_scheme(uri).is_some() || uri.starts_with('/') {
        return uri.to_string();
    }

    let mut joined = project_root.join(uri);
    if joined.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            joined = cwd.join(joined);
        }
    }
    let resolved = joined.canonicalize().unwrap_or_else(|_| normalize(&joined));
    resolved.to_string_lossy().into_owned()
}

/// A registered dataset.
pub struct Dataset {
    record: DatasetRecord,
    kind: Box<dyn DatasetKind>,
    ctx: DatasetContext,
    paths: TopologyPaths,
    canon: Option<Box<dyn NcDataset>>,
}

impl Dataset {
    /// Build the model for a catalog row and open its canonical dataset.
    pub fn load(ctx: DatasetContext, record: DatasetRecord) -> Self {
        let kind = kind_by_name(&record.kind).unwrap_or_else(|| {
            warn!(dataset = %record.name, kind = %record.kind, "Unknown dataset kind, using generic");
            Box::new(GenericKind)
        });
        let paths = TopologyPaths::new(&ctx.settings.topology_path, &record.name);

        let mut dataset = Self {
            record,
            kind,
            ctx,
            paths,
            canon: None,
        };
        dataset.canon = dataset.netcdf4_dataset();
        dataset
    }

    pub async fn by_name(ctx: &DatasetContext, name: &str) -> WmsResult<Self> {
        let record = ctx
            .catalog
            .dataset_by_name(name)
            .await?
            .ok_or_else(|| WmsError::DatasetNotFound(name.to_string()))?;
        Ok(Self::load(ctx.clone(), record))
    }

    pub async fn by_slug(ctx: &DatasetContext, slug: &str) -> WmsResult<Self> {
        let record = ctx
            .catalog
            .dataset_by_slug(slug)
            .await?
            .ok_or_else(|| WmsError::DatasetNotFound(slug.to_string()))?;
        Ok(Self::load(ctx.clone(), record))
    }

    /// Register a new dataset. An empty `kind` is identified from the data;
    /// data no kind recognises is registered as generic.
    pub async fn register(ctx: &DatasetContext, mut new: NewDataset) -> WmsResult<Self> {
        if new.kind.is_empty() {
            let path = resolve_path(&ctx.settings.project_root, &new.uri);
            let nc = open_dataset(ctx.store.as_ref(), &path)?;
            new.kind = identify(nc.as_ref())
                .map(|k| k.name())
                .unwrap_or_else(|| GenericKind.name())
                .to_string();
        } else if kind_by_name(&new.kind).is_none() {
            return Err(WmsError::InvalidParameter {
                param: "kind".to_string(),
                message: format!("unknown dataset kind '{}'", new.kind),
            });
        }

        let record = ctx.catalog.insert_dataset(&new).await?;
        info!(dataset = %record.name, kind = %record.kind, uri = %record.uri, "Registered dataset");
        Ok(Self::load(ctx.clone(), record))
    }

    pub fn record(&self) -> &DatasetRecord {
        &self.record
    }

    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn kind(&self) -> &dyn DatasetKind {
        self.kind.as_ref()
    }

    pub fn humanize(&self) -> &'static str {
        self.kind.humanize()
    }

    pub fn topology_paths(&self) -> &TopologyPaths {
        &self.paths
    }

    /// Location handed to the store.
    pub fn path(&self) -> String {
        resolve_path(&self.ctx.settings.project_root, &self.record.uri)
    }

    pub fn online(&self) -> bool {
        uri_scheme(&self.record.uri).is_some()
    }

    /// Open the dataset, falling back to a multi-file aggregation along
    /// `time`. `None` when neither works.
    pub fn netcdf4_dataset(&self) -> Option<Box<dyn NcDataset>> {
        try_open_dataset(self.ctx.store.as_ref(), &self.path())
    }

    /// Reopen the canonical dataset, e.g. after the source changed.
    pub fn reopen(&mut self) {
        self.canon = self.netcdf4_dataset();
    }

    /// The dataset opened at load time.
    pub fn canon(&self) -> WmsResult<&dyn NcDataset> {
        self.canon.as_deref().ok_or_else(|| {
            WmsError::DataReadError(format!(
                "dataset {} could not be opened from {}",
                self.record.name,
                self.path()
            ))
        })
    }

    pub fn topology_dataset(&self) -> Option<Box<dyn NcDataset>> {
        let path = self.paths.topology_file();
        if !path.is_file() {
            return None;
        }
        match self.ctx.store.open(&path.to_string_lossy()) {
            Ok(nc) => Some(nc),
            Err(e) => {
                warn!(dataset = %self.record.name, path = %path.display(), error = %e, "Unreadable topology");
                None
            }
        }
    }

    pub fn getmap(&self, layer: &AnyLayer, request: &WmsRequest) -> WmsResult<WmsResponse> {
        self.kind.getmap(self.canon()?, layer.access_name(), request)
    }

    pub fn getlegendgraphic(&self, layer: &AnyLayer, request: &WmsRequest) -> WmsResult<WmsResponse> {
        self.kind
            .getlegendgraphic(self.canon()?, layer.access_name(), request)
    }

    pub fn getfeatureinfo(&self, layer: &AnyLayer, request: &WmsRequest) -> WmsResult<WmsResponse> {
        self.kind
            .getfeatureinfo(self.canon()?, layer.access_name(), request)
    }

    /// A transparent image of the requested size.
    pub fn empty_response(
        &self,
        request: &WmsRequest,
        content_type: Option<&str>,
    ) -> WmsResult<WmsResponse> {
        response::empty_response(request, content_type)
    }

    pub fn wgs84_bounds(&self, layer: &AnyLayer) -> WmsResult<BoundingBox> {
        self.kind.wgs84_bounds(self.canon()?, layer.access_name())
    }

    pub fn depths(&self, layer: &AnyLayer) -> WmsResult<Vec<f64>> {
        self.kind.depths(self.canon()?, layer.access_name())
    }

    pub fn depth_bounds(&self, layer: &AnyLayer) -> WmsResult<Bounds<f64>> {
        Ok(Bounds::from_ordered(&self.depths(layer)?))
    }

    /// Time steps of the layer; empty when it has no time variable.
    /// Valid time steps of the layer, fill values dropped; see
    /// [`nearest::decode_times`]. Empty when the dataset has no time.
    pub fn times(&self, layer: &AnyLayer) -> WmsResult<Vec<DateTime<Utc>>> {
        let nc = self.canon()?;
        let time_var = match nearest::time_variable(nc, layer.access_name()) {
            Ok(var) => var,
            Err(WmsError::NoTimeVariable(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let values = nc.read_values(&time_var.name)?;
        nearest::decode_times(&time_var, &values)
    }

    pub fn time_bounds(&self, layer: &AnyLayer) -> WmsResult<Bounds<DateTime<Utc>>> {
        Ok(Bounds::from_ordered(&self.times(layer)?))
    }

    /// Nearest time step of the layer as `(index, raw value)`.
    pub fn nearest_time(&self, layer: &AnyLayer, time: &DateTime<Utc>) -> WmsResult<(usize, f64)> {
        nearest::nearest_time(self.canon()?, layer.access_name(), time)
    }

    pub fn has_cache(&self) -> bool {
        self.paths.has_cache()
    }

    /// Build the topology cache unless one exists and `force` is false.
    pub async fn update_cache(&mut self, force: bool) -> WmsResult<CacheOutcome> {
        if self.has_cache() && !force {
            debug!(dataset = %self.record.name, "Topology cache is present");
            return Ok(CacheOutcome::Fresh);
        }

        let nc = self.canon()?;
        let topology = self.kind.build_topology(nc)?;

        self.ctx.settings.ensure_dirs()?;
        let topology_file = self.paths.topology_file();
        write_atomic(self.ctx.store.as_ref(), &topology_file, &topology)?;

        let now = Utc::now();
        if let Err(e) = self.domain_summary(nc, now).write(&self.paths.domain_file()) {
            self.discard_topology(&e);
            return Err(e);
        }

        if let Err(e) = self
            .ctx
            .catalog
            .set_cache_last_updated(self.record.id, now)
            .await
        {
            self.discard_topology(&e);
            return Err(e);
        }
        self.record.cache_last_updated = Some(now);

        info!(
            dataset = %self.record.name,
            path = %topology_file.display(),
            variables = topology.variables().len(),
            "Rebuilt topology cache"
        );
        Ok(CacheOutcome::Rebuilt)
    }

    /// Remove a topology file whose cache could not be completed, so
    /// `has_cache` does not report it.
    fn discard_topology(&self, cause: &WmsError) {
        let topology_file = self.paths.topology_file();
        warn!(
            dataset = %self.record.name,
            error = %cause,
            "Cache update failed, removing partial topology"
        );
        if let Err(e) = std::fs::remove_file(&topology_file) {
            warn!(path = %topology_file.display(), error = %e, "Failed to remove topology file");
        }
    }

    fn domain_summary(&self, nc: &dyn NcDataset, generated: DateTime<Utc>) -> DomainSummary {
        let time = nc
            .variables_by_standard_name(&["time"])
            .into_iter()
            .next()
            .and_then(|var| {
                let values = nc.read_values(&var.name).ok()?;
                nearest::decode_times(&var, &values).ok()
            })
            .map(|times| Bounds::from_ordered(&times))
            .unwrap_or_else(Bounds::empty);

        let depth_count = coords::vertical_variables(nc)
            .iter()
            .map(|v| v.len())
            .max()
            .unwrap_or(0);

        DomainSummary {
            kind: self.kind.name().to_string(),
            wgs84_bounds: self.kind.wgs84_bounds(nc, "").ok(),
            time,
            depth_count,
            generated,
        }
    }

    /// Summary written by the last cache rebuild.
    pub fn domain(&self) -> WmsResult<DomainSummary> {
        DomainSummary::read(&self.paths.domain_file())
    }

    /// Delete every cache file of this dataset; returns how many.
    pub fn clear_cache(&self) -> WmsResult<usize> {
        let removed = self.paths.clear()?;
        info!(dataset = %self.record.name, removed, "Cleared topology cache");
        Ok(removed)
    }

    /// Refresh layers from the variables. A dataset that cannot be opened
    /// gets none.
    pub async fn process_layers(&self) -> WmsResult<LayerSummary> {
        match self.canon.as_deref() {
            Some(nc) => layers::process_layers(&self.ctx.catalog, self.record.id, nc).await,
            None => {
                warn!(dataset = %self.record.name, "Dataset not readable, no layers processed");
                Ok(LayerSummary::default())
            }
        }
    }

    pub async fn analyze_virtual_layers(&self) -> WmsResult<usize> {
        match self.canon.as_deref() {
            Some(nc) => layers::analyze_virtual_layers(&self.ctx.catalog, self.record.id, nc).await,
            None => Ok(0),
        }
    }

    /// Active layers followed by active virtual layers.
    pub async fn active_layers(&self) -> WmsResult<Vec<AnyLayer>> {
        Ok(self
            .all_layers_unsorted()
            .await?
            .into_iter()
            .filter(AnyLayer::active)
            .collect())
    }

    /// Every layer and virtual layer, active ones first.
    pub async fn all_layers(&self) -> WmsResult<Vec<AnyLayer>> {
        let mut all = self.all_layers_unsorted().await?;
        all.sort_by_key(|l| !l.active());
        Ok(all)
    }

    async fn all_layers_unsorted(&self) -> WmsResult<Vec<AnyLayer>> {
        let catalog = &self.ctx.catalog;
        let mut all: Vec<AnyLayer> = catalog
            .layers_for_dataset(self.record.id)
            .await?
            .into_iter()
            .map(AnyLayer::Layer)
            .collect();
        all.extend(
            catalog
                .virtual_layers_for_dataset(self.record.id)
                .await?
                .into_iter()
                .map(AnyLayer::Virtual),
        );
        Ok(all)
    }

    /// Find a layer (or virtual layer) by variable name.
    pub async fn layer(&self, var_name: &str) -> WmsResult<AnyLayer> {
        self.all_layers_unsorted()
            .await?
            .into_iter()
            .find(|l| l.var_name() == var_name)
            .ok_or_else(|| WmsError::LayerNotFound(var_name.to_string()))
    }

    /// Clear the cache and delete the catalog row with its layers.
    pub async fn remove(self) -> WmsResult<()> {
        self.clear_cache()?;
        self.ctx.catalog.delete_dataset(self.record.id).await?;
        info!(dataset = %self.record.name, "Removed dataset");
        Ok(())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.record.name)
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.record.name)
            .field("kind", &self.kind.name())
            .field("uri", &self.record.uri)
            .field("open", &self.canon.is_some())
            .finish()
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if self.canon.take().is_some() {
            debug!(dataset = %self.record.name, "Closed dataset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_scheme() {
        assert_eq!(uri_scheme("http://example.com/thredds/dodsC/x"), Some("http"));
        assert_eq!(uri_scheme("mem://fixtures/a.nc"), Some("mem"));
        assert_eq!(uri_scheme("data/ocean.nc"), None);
        assert_eq!(uri_scheme("/abs/ocean.nc"), None);
        assert_eq!(uri_scheme("2020:ocean.nc"), None);
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/srv/sciwms");
        assert_eq!(resolve_path(root, "/data/a.nc"), "/data/a.nc");
        assert_eq!(resolve_path(root, "https://x/y.nc"), "https://x/y.nc");
        assert_eq!(resolve_path(root, "data/../ocean/a.nc"), "/srv/sciwms/ocean/a.nc");
        assert_eq!(resolve_path(root, "./ocean/*.nc"), "/srv/sciwms/ocean/*.nc");
    }

    #[test]
    fn test_resolve_path_follows_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.nc"), b"{}").unwrap();
        let resolved = resolve_path(dir.path(), "a.nc");
        assert_eq!(
            PathBuf::from(resolved),
            dir.path().join("a.nc").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[cfg(feature = "netcdf")]
    #[test]
    fn test_default_store_opens_netcdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hycom.nc");
        let store = default_store();
        store
            .write(&path, &test_utils::rgrid_dataset(&[0.0, 6.0]))
            .unwrap();

        let nc = try_open_dataset(store.as_ref(), path.to_str().unwrap()).unwrap();
        assert_eq!(nc.read_values("time").unwrap(), vec![0.0, 6.0]);
        assert_eq!(crate::identify(nc.as_ref()).unwrap().name(), "rgrid");
    }
}
