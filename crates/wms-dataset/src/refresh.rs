//! Keeping datasets up to date.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use netcdf_parser::glob_files;
use wms_common::WmsResult;

use crate::dataset::{Dataset, DatasetContext};
use crate::layers::LayerSummary;
use crate::topology::CacheOutcome;

/// What a refresh did to one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub dataset: String,
    /// `None` when the dataset is not kept up to date
    pub layers: Option<LayerSummary>,
    pub cache: Option<CacheOutcome>,
}

/// Latest modification time of a local source, which may be a glob.
fn source_modified(path: &str) -> Option<DateTime<Utc>> {
    let modified = |p: &Path| -> Option<SystemTime> { std::fs::metadata(p).ok()?.modified().ok() };

    let latest = if Path::new(path).exists() {
        modified(Path::new(path))
    } else {
        glob_files(path)
            .ok()?
            .iter()
            .filter_map(|p| modified(Path::new(p)))
            .max()
    };
    latest.map(DateTime::<Utc>::from)
}

/// Whether the cache of `dataset` predates its source.
pub fn is_stale(dataset: &Dataset) -> bool {
    if !dataset.has_cache() {
        return true;
    }
    if dataset.online() {
        return true;
    }
    match (source_modified(&dataset.path()), dataset.record().cache_last_updated) {
        (Some(modified), Some(updated)) => modified > updated,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Refresh layers and the topology cache of one dataset.
///
/// Datasets not kept up to date are left alone unless `force` is set.
/// Online datasets are always rebuilt; local ones only when the source
/// changed after the last rebuild.
pub async fn refresh_dataset(dataset: &mut Dataset, force: bool) -> WmsResult<RefreshReport> {
    let name = dataset.name().to_string();

    if !force && !dataset.record().keep_up_to_date {
        debug!(dataset = %name, "Dataset not kept up to date, skipping");
        return Ok(RefreshReport {
            dataset: name,
            layers: None,
            cache: None,
        });
    }

    let rebuild = force || is_stale(dataset);
    if rebuild {
        dataset.reopen();
    }

    let layers = dataset.process_layers().await?;
    let cache = dataset.update_cache(rebuild).await?;

    info!(
        dataset = %name,
        layers = layers.layers,
        virtual_layers = layers.virtual_layers,
        cache = ?cache,
        "Refreshed dataset"
    );
    Ok(RefreshReport {
        dataset: name,
        layers: Some(layers),
        cache: Some(cache),
    })
}

/// Refresh every dataset in the catalog. One dataset failing does not
/// stop the others; failures are logged and left out of the reports.
pub async fn refresh_all(ctx: &DatasetContext, force: bool) -> WmsResult<Vec<RefreshReport>> {
    let mut reports = Vec::new();
    for record in ctx.catalog.list_datasets().await? {
        let mut dataset = Dataset::load(ctx.clone(), record);
        match refresh_dataset(&mut dataset, force).await {
            Ok(report) => reports.push(report),
            Err(e) => warn!(dataset = %dataset, error = %e, "Refresh failed"),
        }
    }
    Ok(reports)
}
