use std::collections::HashMap;

use approx::assert_relative_eq;
use hazard_exposure::{
    raster::write_geotiff,
    Config, Crs, GeoTransform, HazardStatus, LocalStore, ObjectStore, Pipeline, Raster, StorageConfig,
};
use serde_json::json;
use tempfile::TempDir;

/// 2x2 lon/lat grid covering (0..2, 0..2) with 1 degree cells.
fn grid(rows: &[Vec<f64>]) -> Raster {
    Raster::from_rows(rows, GeoTransform::new(0.0, 2.0, 1.0, -1.0), Some(Crs::WGS84))
}

fn square(x0: f64, y0: f64, size: f64) -> serde_json::Value {
    json!([[[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size], [x0, y0]]])
}

/// Store with admin boundaries, population, and every hazard input except
/// the earthquake and landslide rasters.
fn fixture() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());

    let admin = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "adm0_src": "ZAF", "adm1_src": "A" },
              "geometry": { "type": "Polygon", "coordinates": square(0.0, 0.0, 2.0) } },
            { "type": "Feature", "properties": { "adm0_src": "ZAF", "adm1_src": "B" },
              "geometry": { "type": "Polygon", "coordinates": square(10.0, 10.0, 1.0) } },
        ],
    });
    let coast = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "rate_time": 1.0 },
              "geometry": { "type": "LineString", "coordinates": [[-0.5, 1.0], [0.5, 1.0]] } },
            { "type": "Feature", "properties": { "rate_time": 3.0 },
              "geometry": { "type": "Point", "coordinates": [1.0, 1.0] } },
        ],
    });

    store.put("admin.geojson", admin.to_string().as_bytes()).unwrap();
    store.put("coast.geojson", coast.to_string().as_bytes()).unwrap();

    let rasters = [
        ("pop.tif", vec![vec![10.0, 20.0], vec![30.0, 40.0]]),
        ("flood.tif", vec![vec![0.0, 1.0], vec![0.0, 2.0]]),
        ("loss.tif", vec![vec![1.0, 0.0], vec![1.0, 0.0]]),
        ("cover.tif", vec![vec![1.0, 1.0], vec![1.0, 1.0]]),
        ("wind.tif", vec![vec![31.5, 44.0], vec![12.0, 28.0]]),
    ];
    for (key, rows) in rasters {
        store.put(key, &write_geotiff(&grid(&rows)).unwrap()).unwrap();
    }

    let mut config = Config::default();
    config.storage = StorageConfig::Local { root: dir.path().to_path_buf() };
    config.admin = "admin.geojson".into();
    config.population = "pop.tif".into();
    for hazard in &mut config.exposures {
        hazard.raster = format!("{}.tif", hazard.key);
    }
    config.deforestation.loss = "loss.tif".into();
    config.deforestation.cover = "cover.tif".into();
    config.cyclone.raster = "wind.tif".into();
    config.coastal_erosion.vector = "coast.geojson".into();

    (dir, config)
}

/// Result CSV as one map of column name to raw field per row.
fn read_csv(store: &dyn ObjectStore, key: &str) -> Vec<HashMap<String, String>> {
    let text = String::from_utf8(store.get(key).unwrap()).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap().split(',').map(str::to_string).collect::<Vec<_>>();
    lines
        .map(|line| header.iter().cloned().zip(line.split(',').map(str::to_string)).collect())
        .collect()
}

fn number(row: &HashMap<String, String>, column: &str) -> Option<f64> {
    row[column].parse().ok()
}

#[test]
fn batch_writes_every_available_hazard() {
    let (_dir, config) = fixture();
    let pipeline = Pipeline::open(config).unwrap();

    let report = pipeline.run_all();
    let failed = report.failures().map(|(key, _)| key).collect::<Vec<_>>();
    assert_eq!(failed, vec!["earthquake", "landslide"]);
    assert!(matches!(report.status("flood"), Some(HazardStatus::Done { rows: Some(2), .. })));

    let flood = read_csv(pipeline.store(), "output_data/flood/flood.csv");
    assert_eq!(flood.len(), 2);
    assert_eq!(flood[0]["adm1_src"], "A");
    assert_eq!(number(&flood[0], "pop_exp"), Some(60.0));
    assert_eq!(number(&flood[0], "pop_tot"), Some(100.0));
    assert_relative_eq!(number(&flood[0], "exp_ratio").unwrap(), 0.6);
    assert_eq!(flood[1]["adm1_src"], "B");
    assert_eq!(number(&flood[1], "exp_ratio"), None);

    let deforestation = read_csv(pipeline.store(), "output_data/deforestation/deforestation.csv");
    assert_eq!(number(&deforestation[0], "loss"), Some(2.0));
    assert_eq!(number(&deforestation[0], "cover"), Some(4.0));
    assert_relative_eq!(number(&deforestation[0], "deforestation").unwrap(), 0.5);

    let cyclone = read_csv(pipeline.store(), "output_data/cyclone/cyclone.csv");
    assert_eq!(number(&cyclone[0], "max_speed"), Some(44.0));
    assert_eq!(number(&cyclone[1], "max_speed"), None);

    let coastal = read_csv(pipeline.store(), "output_data/coastal_erosion/coastal_erosion.csv");
    assert_relative_eq!(number(&coastal[0], "mean_rate_time").unwrap(), 2.0);
    assert_eq!(number(&coastal[1], "mean_rate_time"), None);
}

#[test]
fn missing_input_only_fails_its_hazard() {
    let (_dir, config) = fixture();
    let pipeline = Pipeline::open(config).unwrap();

    let report = pipeline.run_all();
    match report.status("earthquake") {
        Some(HazardStatus::Failed(msg)) => assert!(msg.contains("earthquake.tif"), "{msg}"),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(!pipeline.store().has("output_data/earthquake/earthquake.csv"));
    assert!(pipeline.store().has("output_data/cyclone/cyclone.csv"));
}

#[test]
fn missing_admin_fails_every_hazard() {
    let (_dir, mut config) = fixture();
    config.admin = "nowhere.geojson".into();
    let pipeline = Pipeline::open(config).unwrap();

    let report = pipeline.run_all();
    assert_eq!(report.failures().count(), 6);
}

#[test]
fn single_hazard_run_returns_its_key() {
    let (_dir, config) = fixture();
    let pipeline = Pipeline::open(config).unwrap();

    assert_eq!(pipeline.run_one("cyclone").unwrap(), "output_data/cyclone/cyclone.csv");
    assert!(pipeline.run_one("tsunami").is_err());
}

#[test]
fn prepared_exposure_matches_direct_computation() {
    let (_dir, mut config) = fixture();
    let pipeline = Pipeline::open(config.clone()).unwrap();

    let report = pipeline.prepare_exposures();
    assert!(matches!(report.status("flood"), Some(HazardStatus::Done { rows: None, .. })));
    assert!(matches!(report.status("landslide"), Some(HazardStatus::Failed(_))));
    assert!(pipeline.store().has("prep_data/sadc_flood_prep.tif"));

    config.use_prepared = true;
    config.exposures.iter_mut().for_each(|h| h.raster = "gone.tif".into());
    let pipeline = Pipeline::open(config).unwrap();
    let key = pipeline.run_one("flood").unwrap();

    let flood = read_csv(pipeline.store(), &key);
    assert_eq!(number(&flood[0], "pop_exp"), Some(60.0));
    assert_relative_eq!(number(&flood[0], "exp_ratio").unwrap(), 0.6);
}
