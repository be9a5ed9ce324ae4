//! Shared fixtures: a small grid and raw Collection 2 scenes

#![allow(dead_code)]

use bapcomp_algorithms::masking::{prepare_image, AuxiliaryLayers, MaskSpec};
use bapcomp_core::{Band, GeoTransform, GridSpec, Raster, RasterImage, Sensor, CRS, QA_BAND};
use bapcomp_imagery::InMemoryImageryService;
use chrono::{NaiveDate, NaiveDateTime};

pub const ROWS: usize = 3;
pub const COLS: usize = 3;

/// QA_PIXEL value with the cloud bit set
pub const QA_CLOUD: f64 = 8.0;

pub fn grid() -> GridSpec {
    GridSpec::new(ROWS, COLS, GeoTransform::new(500_000.0, 4_500_000.0, 30.0, -30.0))
        .with_crs(CRS::from_epsg(32630))
}

pub fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(10, 45, 0)
        .unwrap()
}

pub fn scene_id(sensor: Sensor, when: NaiveDateTime) -> String {
    format!("{}_200031_{}", sensor.code(), when.format("%Y%m%d"))
}

/// Raw scene whose digital numbers grow with `base`, band index and pixel
pub fn raw_scene(sensor: Sensor, when: NaiveDateTime, base: f64) -> RasterImage {
    raw_scene_with_qa(sensor, when, base, &[0.0; ROWS * COLS])
}

pub fn raw_scene_with_qa(sensor: Sensor, when: NaiveDateTime, base: f64, qa: &[f64]) -> RasterImage {
    let mut bands: Vec<Band> = sensor
        .profile()
        .native_bands
        .iter()
        .enumerate()
        .map(|(b, name)| {
            let values = (0..ROWS * COLS)
                .map(|p| base + 400.0 * b as f64 + 40.0 * p as f64)
                .collect();
            Band::new(*name, Raster::from_vec(values, ROWS, COLS).unwrap())
        })
        .collect();
    bands.push(Band::new(QA_BAND, Raster::from_vec(qa.to_vec(), ROWS, COLS).unwrap()));

    RasterImage::new(bands, when)
        .unwrap()
        .with_sensor(sensor)
        .with_scene_id(scene_id(sensor, when))
        .with_property("SPACECRAFT_ID", sensor.spacecraft_id())
}

/// What the pipeline makes of `raw` under the default masks
pub fn prepared(raw: &RasterImage, sensor: Sensor) -> RasterImage {
    prepare_image(raw, sensor, &MaskSpec::default(), &AuxiliaryLayers::default()).unwrap()
}

pub fn service_with(scenes: &[(Sensor, RasterImage)]) -> InMemoryImageryService {
    scenes
        .iter()
        .fold(InMemoryImageryService::new(), |svc, (sensor, image)| {
            svc.with_scene(sensor.dataset_id(), image.clone())
        })
}

/// Band values of `image` at one pixel
pub fn pixel(image: &RasterImage, row: usize, col: usize) -> Vec<f64> {
    image
        .bands()
        .iter()
        .map(|b| b.data.get(row, col).unwrap())
        .collect()
}
