//! Dataset model against synthetic snapshots and an in-memory catalog.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use netcdf_parser::{MemoryDataset, MemoryStore};
use storage::{Catalog, NewDataset};
use test_utils::{generic_dataset, rgrid_dataset, sgrid_dataset, time, ugrid_dataset, TestProject};
use wms_common::{AnyLayer, WmsError};
use wms_dataset::{Dataset, DatasetContext, Settings, WmsRequest};

async fn context(project: &TestProject) -> DatasetContext {
    let catalog = Catalog::open_memory().await.unwrap();
    DatasetContext::new(
        catalog,
        Arc::new(MemoryStore::new()),
        Settings::with_root(project.root()),
    )
}

async fn register(project: &TestProject, file: &str, name: &str, data: &MemoryDataset) -> Dataset {
    project.write_snapshot(file, data);
    let ctx = context(project).await;
    Dataset::register(&ctx, NewDataset::new(file, name, ""))
        .await
        .unwrap()
}

fn var_names(layers: &[AnyLayer]) -> Vec<&str> {
    layers.iter().map(AnyLayer::var_name).collect()
}

#[tokio::test]
async fn test_register_identifies_kind() {
    let project = TestProject::new();

    let ugrid = register(&project, "data/fvcom.nc", "gulf_of_maine", &ugrid_dataset(&time::SIX_HOURLY)).await;
    assert_eq!(ugrid.kind().name(), "ugrid");
    assert_eq!(ugrid.humanize(), "UGRID Dataset");
    assert_eq!(ugrid.to_string(), "gulf_of_maine");
    assert_eq!(ugrid.record().slug, "gulf_of_maine");
    assert!(!ugrid.online());
    assert!(ugrid.path().ends_with("data/fvcom.nc"));
    assert!(ugrid.canon().is_ok());

    let sgrid = register(&project, "data/roms.nc", "bight", &sgrid_dataset(&[0.0])).await;
    assert_eq!(sgrid.humanize(), "SGRID Dataset");

    let rgrid = register(&project, "data/hycom.nc", "atlantic", &rgrid_dataset(&[0.0])).await;
    assert_eq!(rgrid.humanize(), "RGRID Dataset");

    let generic = register(&project, "data/x.nc", "samples", &generic_dataset()).await;
    assert_eq!(generic.humanize(), "Generic Dataset");
}

#[tokio::test]
async fn test_register_rejects_unknown_kind() {
    let project = TestProject::new();
    let ctx = context(&project).await;
    let err = Dataset::register(&ctx, NewDataset::new("data/a.nc", "a", "zgrid"))
        .await
        .unwrap_err();
    assert!(matches!(err, WmsError::InvalidParameter { .. }));
}

#[tokio::test]
async fn test_by_name_and_slug() {
    let project = TestProject::new();
    project.write_snapshot("fvcom.nc", &ugrid_dataset(&[0.0]));
    let ctx = context(&project).await;
    Dataset::register(&ctx, NewDataset::new("fvcom.nc", "gulf_of_maine", ""))
        .await
        .unwrap();

    let by_name = Dataset::by_name(&ctx, "gulf_of_maine").await.unwrap();
    let by_slug = Dataset::by_slug(&ctx, "gulf_of_maine").await.unwrap();
    assert_eq!(by_name.id(), by_slug.id());

    let missing = Dataset::by_name(&ctx, "nope").await.unwrap_err();
    assert!(matches!(missing, WmsError::DatasetNotFound(_)));
}

#[tokio::test]
async fn test_online_uri_is_left_alone() {
    let project = TestProject::new();
    let ctx = context(&project).await;
    let uri = "http://example.com/thredds/dodsC/fvcom.nc";
    let ds = Dataset::register(&ctx, NewDataset::new(uri, "remote", "ugrid"))
        .await
        .unwrap();
    assert!(ds.online());
    assert_eq!(ds.path(), uri);
}

#[tokio::test]
async fn test_process_layers() {
    let project = TestProject::new();
    let ds = register(&project, "fvcom.nc", "gom", &ugrid_dataset(&time::SIX_HOURLY)).await;

    let summary = ds.process_layers().await.unwrap();
    assert_eq!(summary.layers, 11);
    assert_eq!(summary.virtual_layers, 1);

    let active = ds.active_layers().await.unwrap();
    assert_eq!(var_names(&active), vec!["temp", "u", "v", "zeta", "u,v"]);

    match &active[0] {
        AnyLayer::Layer(temp) => {
            assert_eq!(temp.default_min, Some(-2.0));
            assert_eq!(temp.default_max, Some(40.0));
            assert_eq!(temp.std_name.as_deref(), Some("sea_water_temperature"));
            assert_eq!(temp.description.as_deref(), Some("temperature"));
        }
        other => panic!("expected a layer, got {:?}", other),
    }
    match &active[4] {
        AnyLayer::Virtual(uv) => {
            assert_eq!(uv.std_name.as_deref(), Some("sea_water_velocity"));
            assert_eq!(uv.styles[0].image_type, "vectors");
        }
        other => panic!("expected a virtual layer, got {:?}", other),
    }

    // running again updates in place
    ds.process_layers().await.unwrap();
    let all = ds.all_layers().await.unwrap();
    assert_eq!(all.len(), 12);
    assert!(all[..5].iter().all(AnyLayer::active));
    assert!(all[5..].iter().all(|l| !l.active()));
}

#[tokio::test]
async fn test_unreadable_dataset_has_no_layers() {
    let project = TestProject::new();
    let ctx = context(&project).await;
    let ds = Dataset::register(&ctx, NewDataset::new("missing.nc", "ghost", "ugrid"))
        .await
        .unwrap();

    assert!(ds.netcdf4_dataset().is_none());
    assert_eq!(ds.process_layers().await.unwrap().layers, 0);
    assert!(ds.all_layers().await.unwrap().is_empty());
    assert!(ds.topology_dataset().is_none());
}

#[tokio::test]
async fn test_nearest_time_and_bounds() {
    let project = TestProject::new();
    let ds = register(&project, "fvcom.nc", "gom", &ugrid_dataset(&time::SIX_HOURLY)).await;
    ds.process_layers().await.unwrap();
    let temp = ds.layer("temp").await.unwrap();
    let at = |h: u32| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();

    assert_eq!(ds.nearest_time(&temp, &at(7)).unwrap(), (2, 12.0));
    // an exact match resolves to the following step
    assert_eq!(ds.nearest_time(&temp, &at(6)).unwrap(), (2, 12.0));
    assert_eq!(ds.nearest_time(&temp, &at(23)).unwrap(), (3, 18.0));

    let before = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
    assert_eq!(ds.nearest_time(&temp, &before).unwrap(), (0, 0.0));

    // virtual layers resolve through their first component
    let uv = ds.layer("u,v").await.unwrap();
    assert_eq!(ds.nearest_time(&uv, &at(13)).unwrap(), (3, 18.0));

    let times = ds.time_bounds(&temp).unwrap();
    assert_eq!(times.min, Some(at(0)));
    assert_eq!(times.max, Some(at(18)));

    let depths = ds.depth_bounds(&temp).unwrap();
    assert_eq!(depths.min, Some(-0.25));
    assert_eq!(depths.max, Some(-0.75));

    // a single time variable serves every layer; 2-D fields have no depths
    let h = ds.layer("h").await.unwrap();
    assert_eq!(ds.times(&h).unwrap().len(), 4);
    assert!(ds.depth_bounds(&h).unwrap().is_empty());

    let bbox = ds.wgs84_bounds(&temp).unwrap();
    assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), test_utils::bbox::GULF_OF_MAINE);
}

#[tokio::test]
async fn test_aggregated_time_axis() {
    let project = TestProject::new();
    project.write_snapshot("data/agg/fvcom_001.nc", &ugrid_dataset(&[0.0, 6.0]));
    project.write_snapshot("data/agg/fvcom_002.nc", &ugrid_dataset(&[12.0, 18.0]));
    let ctx = context(&project).await;

    let ds = Dataset::register(&ctx, NewDataset::new("data/agg/*.nc", "gom_agg", ""))
        .await
        .unwrap();
    assert_eq!(ds.kind().name(), "ugrid");

    ds.process_layers().await.unwrap();
    let temp = ds.layer("temp").await.unwrap();
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap();
    assert_eq!(ds.nearest_time(&temp, &at).unwrap(), (3, 18.0));
    assert_eq!(ds.times(&temp).unwrap().len(), 4);
}

#[tokio::test]
async fn test_generic_operations_not_implemented() {
    let project = TestProject::new();
    let mut ds = register(&project, "x.nc", "samples", &generic_dataset()).await;
    ds.process_layers().await.unwrap();
    let x = ds.layer("x").await.unwrap();
    let request = WmsRequest::new();

    assert!(matches!(ds.wgs84_bounds(&x), Err(WmsError::NotImplemented("wgs84_bounds"))));
    assert!(matches!(ds.depths(&x), Err(WmsError::NotImplemented("depths"))));
    assert!(matches!(ds.getmap(&x, &request), Err(WmsError::NotImplemented("getmap"))));
    assert!(matches!(
        ds.getlegendgraphic(&x, &request),
        Err(WmsError::NotImplemented("getlegendgraphic"))
    ));
    assert!(matches!(
        ds.getfeatureinfo(&x, &request),
        Err(WmsError::NotImplemented("getfeatureinfo"))
    ));
    assert!(matches!(
        ds.update_cache(false).await,
        Err(WmsError::NotImplemented("update_cache"))
    ));
    assert!(!ds.has_cache());
}

#[tokio::test]
async fn test_rendering_is_not_implemented_for_any_kind() {
    let project = TestProject::new();
    let ds = register(&project, "hycom.nc", "atlantic", &rgrid_dataset(&[0.0])).await;
    ds.process_layers().await.unwrap();
    let layer = ds.layer("water_temp").await.unwrap();
    let request = WmsRequest::new().with("width", "4").with("height", "4");
    assert!(matches!(ds.getmap(&layer, &request), Err(WmsError::NotImplemented(_))));
}

#[tokio::test]
async fn test_empty_response() {
    let project = TestProject::new();
    let ds = register(&project, "x.nc", "samples", &generic_dataset()).await;

    let request = WmsRequest::new().with("WIDTH", "3").with("HEIGHT", "2");
    let response = ds.empty_response(&request, None).unwrap();
    assert_eq!(response.content_type, "image/png");
    assert_eq!(&response.body[1..4], b"PNG");

    assert!(matches!(
        ds.empty_response(&request, Some("image/jpeg")),
        Err(WmsError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        ds.empty_response(&WmsRequest::new().with("width", "3"), None),
        Err(WmsError::MissingParameter(_))
    ));
    assert!(ds
        .empty_response(&WmsRequest::new().with("width", "0").with("height", "2"), None)
        .is_err());
}
