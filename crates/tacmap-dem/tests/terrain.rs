//! Index resolution and sampling against an in-memory storage backend.

use approx::assert_relative_eq;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tacmap_dem::{
    DatasetPaths, DatasetType, IndexStatus, TerrainError, TerrainSampler, TileIndexResolver,
    VegetationClass,
};
use tacmap_fetch::{CacheConfig, FetchError, HttpFetch, Source, SourceKind, StorageClient};
use tiff::encoder::{colortype, TiffEncoder};

const BASE: &str = "https://cdn.test";

#[derive(Default)]
struct Store {
    files: Mutex<HashMap<String, Bytes>>,
    calls: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
struct MemoryHttp(Arc<Store>);

impl MemoryHttp {
    fn put(&self, path: &str, body: impl Into<Bytes>) {
        self.0
            .files
            .lock()
            .insert(format!("{BASE}/{path}"), body.into());
    }

    fn put_json(&self, path: &str, doc: serde_json::Value) {
        self.put(path, serde_json::to_vec(&doc).unwrap());
    }

    fn calls_to(&self, path: &str) -> usize {
        let url = format!("{BASE}/{path}");
        self.0.calls.lock().iter().filter(|u| **u == url).count()
    }
}

impl HttpFetch for MemoryHttp {
    async fn get(&self, url: &str) -> tacmap_fetch::Result<Bytes> {
        self.0.calls.lock().push(url.to_string());
        let body = self.0.files.lock().get(url).cloned();
        body.ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

fn client(http: &MemoryHttp) -> Arc<StorageClient<MemoryHttp>> {
    Arc::new(StorageClient::new(
        http.clone(),
        vec![Source::url(SourceKind::Cdn, BASE)],
    ))
}

fn sampler(http: &MemoryHttp) -> TerrainSampler<MemoryHttp> {
    TerrainSampler::new(
        client(http),
        DatasetPaths::default(),
        CacheConfig::new(8),
        CacheConfig::new(4),
    )
}

fn tiff_f32(width: u32, height: u32, data: &[f32]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(width, height, data)
            .unwrap();
    }
    buf.into_inner()
}

fn tiff_i16(width: u32, height: u32, data: &[i16]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();
        encoder
            .write_image::<colortype::GrayI16>(width, height, data)
            .unwrap();
    }
    buf.into_inner()
}

fn tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in entries {
        let mut header = [0u8; 512];
        header[..name.len()].copy_from_slice(name.as_bytes());
        header[124..136].copy_from_slice(format!("{:011o}\0", data.len()).as_bytes());
        header[156] = b'0';
        out.extend_from_slice(&header);
        out.extend_from_slice(data);
        out.resize(out.len().div_ceil(512) * 512, 0);
    }
    out.resize(out.len() + 1024, 0);
    out
}

fn bounds(north: f64, south: f64, east: f64, west: f64) -> serde_json::Value {
    json!({"north": north, "south": south, "east": east, "west": west})
}

#[tokio::test]
async fn test_scenario_index() {
    let http = MemoryHttp::default();
    http.put_json(
        "elevation/master_index.json",
        json!({"tiles": {"T1": [{"filename": "a.tif", "bounds": bounds(-30.0, -31.0, -58.0, -59.0)}]}}),
    );
    let resolver = TileIndexResolver::new(client(&http), DatasetPaths::default());

    let tile = resolver
        .resolve_tile(DatasetType::Elevation, -30.5, -58.5)
        .await
        .unwrap();
    assert_eq!(tile.key, "T1");
    assert!(tile.bounds.contains(-30.5, -58.5));

    assert!(resolver
        .resolve_tile(DatasetType::Elevation, 10.0, 10.0)
        .await
        .is_none());
    assert_eq!(resolver.index_status(DatasetType::Elevation), IndexStatus::Loaded);
}

#[tokio::test]
async fn test_tile_edges_are_inclusive() {
    let http = MemoryHttp::default();
    http.put_json(
        "elevation/master_index.json",
        json!({"tiles": {"T1": [{"filename": "a.tif", "bounds": bounds(-30.0, -31.0, -58.0, -59.0)}]}}),
    );
    let resolver = TileIndexResolver::new(client(&http), DatasetPaths::default());

    for (lat, lon) in [(-30.0, -58.5), (-31.0, -58.5), (-30.5, -58.0), (-30.5, -59.0), (-31.0, -59.0)] {
        let tile = resolver.resolve_tile(DatasetType::Elevation, lat, lon).await;
        assert_eq!(tile.map(|t| t.key), Some("T1".to_string()), "({lat}, {lon})");
    }
}

#[tokio::test]
async fn test_partitioned_master_and_region_cache() {
    let http = MemoryHttp::default();
    http.put_json(
        "vegetation/master_index.json",
        json!({"partitions": {
            "norte": {"bounds": bounds(-22.0, -28.0, -53.0, -66.0), "index": "regions/norte.json"},
            "sur": {"bounds": bounds(-38.0, -55.0, -63.0, -73.0), "index": "regions/sur.json"}
        }}),
    );
    http.put_json(
        "vegetation/regions/norte.json",
        json!({"provincias": {"Misiones": [{
            "provincia": "Misiones",
            "filename": "misiones.tif",
            "filepath": "tiles/misiones.tif",
            "bounds": bounds(-25.5, -28.0, -53.6, -56.1)
        }]}}),
    );

    let resolver = TileIndexResolver::new(client(&http), DatasetPaths::default());

    // Between the partitions but nearer the northern centroid.
    let region = resolver
        .resolve_region(DatasetType::Vegetation, -30.0, -60.0)
        .await
        .unwrap();
    assert_eq!(region.as_deref(), Some("norte"));

    for _ in 0..3 {
        let tile = resolver
            .resolve_tile(DatasetType::Vegetation, -27.0, -55.0)
            .await
            .unwrap();
        assert_eq!(tile.key, "Misiones");
    }
    assert_eq!(http.calls_to("vegetation/master_index.json"), 1);
    assert_eq!(http.calls_to("vegetation/regions/norte.json"), 1);
    assert_eq!(resolver.loaded_region_count(), 1);

    let err = resolver
        .load_region_index(DatasetType::Vegetation, "centro")
        .await
        .unwrap_err();
    assert!(matches!(err, TerrainError::UnknownRegion { .. }));
}

#[tokio::test]
async fn test_index_failure_falls_back_and_is_retried() {
    let http = MemoryHttp::default();
    let resolver = TileIndexResolver::new(client(&http), DatasetPaths::default());

    let err = resolver
        .load_master_index(DatasetType::Elevation)
        .await
        .unwrap_err();
    assert!(err.is_network());

    assert!(resolver
        .resolve_tile(DatasetType::Elevation, -30.5, -58.5)
        .await
        .is_none());
    assert_eq!(resolver.index_status(DatasetType::Elevation), IndexStatus::Fallback);

    http.put_json(
        "elevation/master_index.json",
        json!({"tiles": {"T1": [{"filename": "a.tif", "bounds": bounds(-30.0, -31.0, -58.0, -59.0)}]}}),
    );
    assert!(resolver
        .resolve_tile(DatasetType::Elevation, -30.5, -58.5)
        .await
        .is_some());
    assert_eq!(resolver.index_status(DatasetType::Elevation), IndexStatus::Loaded);

    resolver.clear_cache();
    assert_eq!(resolver.index_status(DatasetType::Elevation), IndexStatus::NotLoaded);
}

fn serve_elevation_archive(http: &MemoryHttp) {
    // Two 2x2 tiles side by side in one archive.
    let west = tiff_f32(2, 2, &[100.0, 110.0, 120.0, 130.0]);
    let east = tiff_f32(2, 2, &[200.0, 210.0, 220.0, 230.0]);
    http.put(
        "elevation/fajas/faja_30.tar",
        tar(&[("faja_30/w.tif", &west), ("faja_30/e.tif", &east)]),
    );
    http.put_json(
        "elevation/master_index.json",
        json!({
            "archive": "fajas/faja_30.tar",
            "tiles": {
                "W": [{"filename": "w.tif", "bounds": bounds(-30.0, -31.0, -58.0, -59.0)}],
                "E": [{"filename": "e.tif", "bounds": bounds(-30.0, -31.0, -57.0, -58.0)}]
            }
        }),
    );
}

#[tokio::test]
async fn test_sample_batch_preserves_order_and_skips_failures() {
    let http = MemoryHttp::default();
    serve_elevation_archive(&http);
    let sampler = sampler(&http);

    let points = [
        (-30.75, -57.25), // east tile, second row
        (10.0, 10.0),     // no data
        (-30.25, -58.75), // west tile, first row
        (-30.25, -57.75), // east tile, first row
    ];
    let values = sampler.sample_batch(DatasetType::Elevation, &points).await;

    assert_eq!(values, vec![Some(230.0), None, Some(100.0), Some(200.0)]);
    // Both tiles come from a single archive download.
    assert_eq!(http.calls_to("elevation/fajas/faja_30.tar"), 1);

    let stats = sampler.stats();
    assert_eq!(stats.tiles.len, 2);
    assert_eq!(stats.tiles.hits, 1);
    assert_eq!(stats.elevation_index, IndexStatus::Loaded);
}

#[tokio::test]
async fn test_missing_tile_file_does_not_abort_batch() {
    let http = MemoryHttp::default();
    http.put_json(
        "elevation/master_index.json",
        json!({"tiles": {
            "GONE": [{"filename": "gone.tif", "bounds": bounds(1.0, 0.0, 1.0, 0.0)}],
            "HERE": [{"filename": "here.tif", "bounds": bounds(1.0, 0.0, 2.0, 1.5)}]
        }}),
    );
    http.put("elevation/here.tif", tiff_f32(1, 1, &[42.0]));
    let sampler = sampler(&http);

    let values = sampler
        .sample_batch(DatasetType::Elevation, &[(0.5, 0.5), (0.5, 1.75)])
        .await;
    assert_eq!(values, vec![None, Some(42.0)]);

    let err = sampler
        .sample_value(DatasetType::Elevation, 0.5, 0.5)
        .await
        .unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn test_elevation_profile() {
    let http = MemoryHttp::default();
    serve_elevation_archive(&http);
    let sampler = sampler(&http);

    let profile = sampler.sample_line((-30.0, -59.0), (-30.0, -57.0), 3).await;
    assert_eq!(profile.len(), 3);
    assert_eq!(profile[0].distance_m, 0.0);
    assert!(profile[2].distance_m > 190_000.0);
    assert_relative_eq!(profile[0].elevation.unwrap(), 100.0);
    // The midpoint sits on the shared edge; the west tile is listed first.
    assert_relative_eq!(profile[1].elevation.unwrap(), 110.0);
    assert_relative_eq!(profile[2].elevation.unwrap(), 210.0);

    assert!(sampler.sample_line((0.0, 0.0), (1.0, 1.0), 0).await.is_empty());
    let single = sampler.sample_line((-30.0, -59.0), (-30.0, -57.0), 1).await;
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].distance_m, 0.0);
}

#[tokio::test]
async fn test_mobility_from_both_datasets() {
    let http = MemoryHttp::default();
    http.put_json(
        "elevation/master_index.json",
        json!({"tiles": {"E": [{"filename": "flat.tif", "bounds": bounds(1.0, 0.0, 1.0, 0.0)}]}}),
    );
    http.put("elevation/flat.tif", tiff_f32(4, 4, &[50.0; 16]));
    http.put_json(
        "vegetation/master_index.json",
        json!({"provincias": {"P": [{
            "provincia": "P",
            "filename": "ndvi.tif",
            "filepath": "ndvi/ndvi.tif",
            "bounds": bounds(1.0, 0.0, 1.0, 0.0)
        }]}}),
    );
    http.put("vegetation/ndvi/ndvi.tif", tiff_i16(2, 2, &[9000, 9000, 9000, -500]));
    let sampler = sampler(&http);

    let mobility = sampler.mobility_at(0.25, 0.25).await.unwrap().unwrap();
    assert_eq!(mobility.vegetation, VegetationClass::DenseForest);
    assert_relative_eq!(mobility.slope_percent, 0.0);
    assert_relative_eq!(mobility.factor, 0.4);

    let water = sampler.mobility_at(0.25, 0.75).await.unwrap().unwrap();
    assert!(water.is_impassable());

    assert!(sampler.mobility_at(5.0, 5.0).await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_cache_refetches() {
    let http = MemoryHttp::default();
    serve_elevation_archive(&http);
    let sampler = sampler(&http);

    sampler.elevation(-30.5, -58.5).await.unwrap();
    sampler.clear_cache();
    sampler.elevation(-30.5, -58.5).await.unwrap();

    assert_eq!(http.calls_to("elevation/master_index.json"), 2);
    assert_eq!(http.calls_to("elevation/fajas/faja_30.tar"), 2);
}

#[tokio::test]
async fn test_tile_inside_another_groups_extent() {
    let http = MemoryHttp::default();
    http.put_json(
        "elevation/master_index.json",
        json!({
            "tiles": {
                "T1": [
                    {"filename": "a.tif", "bounds": bounds(1.0, 0.0, 1.0, 0.0)},
                    {"filename": "b.tif", "bounds": bounds(2.0, 1.0, 2.0, 1.0)}
                ],
                "T2": [{"filename": "c.tif", "bounds": bounds(2.0, 1.0, 1.0, 0.0)}]
            }
        }),
    );
    let resolver = TileIndexResolver::new(client(&http), DatasetPaths::default());

    // Inside T1's combined extent but covered only by T2's tile.
    let tile = resolver
        .resolve_tile(DatasetType::Elevation, 1.5, 0.5)
        .await
        .unwrap();
    assert_eq!(tile.key, "T2");
    assert_eq!(tile.entry_name, "c.tif");

    let tile = resolver
        .resolve_tile(DatasetType::Elevation, 0.5, 0.5)
        .await
        .unwrap();
    assert_eq!(tile.entry_name, "a.tif");
    assert!(resolver
        .resolve_tile(DatasetType::Elevation, 0.5, 1.5)
        .await
        .is_none());
}

mod inline_resolution {
    use super::*;
    use proptest::prelude::*;

    type Rect = (i32, i32, i32, i32);

    fn rect() -> impl Strategy<Value = Rect> {
        (0..6i32, 1..4i32, 0..6i32, 1..4i32)
    }

    fn document(groups: &[Vec<Rect>]) -> serde_json::Value {
        let mut tiles = serde_json::Map::new();
        for (g, group) in groups.iter().enumerate() {
            let entries: Vec<_> = group
                .iter()
                .enumerate()
                .map(|(t, &(south, height, west, width))| {
                    json!({
                        "filename": format!("g{g}_t{t}.tif"),
                        "bounds": bounds(
                            f64::from(south + height),
                            f64::from(south),
                            f64::from(west + width),
                            f64::from(west),
                        ),
                    })
                })
                .collect();
            tiles.insert(format!("G{g}"), serde_json::Value::Array(entries));
        }
        json!({ "tiles": tiles })
    }

    fn first_containing(groups: &[Vec<Rect>], lat: f64, lon: f64) -> Option<String> {
        groups.iter().enumerate().find_map(|(g, group)| {
            group
                .iter()
                .position(|&(south, height, west, width)| {
                    lat >= f64::from(south)
                        && lat <= f64::from(south + height)
                        && lon >= f64::from(west)
                        && lon <= f64::from(west + width)
                })
                .map(|t| format!("g{g}_t{t}.tif"))
        })
    }

    proptest! {
        #[test]
        fn prop_resolve_matches_first_tile_in_document_order(
            groups in prop::collection::vec(prop::collection::vec(rect(), 1..4), 1..5),
            points in prop::collection::vec((-2..20i32, -2..20i32), 1..12),
        ) {
            let http = MemoryHttp::default();
            http.put_json("elevation/master_index.json", document(&groups));
            let resolver = TileIndexResolver::new(client(&http), DatasetPaths::default());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            for (lat2, lon2) in points {
                // Half-degree steps land on shared edges as well as interiors.
                let (lat, lon) = (f64::from(lat2) / 2.0, f64::from(lon2) / 2.0);
                let resolved = runtime
                    .block_on(resolver.resolve_tile(DatasetType::Elevation, lat, lon))
                    .map(|t| t.entry_name);
                prop_assert_eq!(resolved, first_containing(&groups, lat, lon), "({}, {})", lat, lon);
            }
        }
    }
}
