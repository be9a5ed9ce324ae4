//! Per-year collections: window queries, exclusions and preparation

use std::sync::Arc;
use tracing::debug;

use crate::config::{ExclusionSpec, SeriesRequest};
use crate::error::{PipelineError, Result};
use bapcomp_algorithms::masking::{prepare_image, AuxiliaryLayers, MaskSpec};
use bapcomp_core::{DayWindow, GridSpec, RasterCollection, RasterImage, Sensor};
use bapcomp_imagery::{AuxiliaryDataset, ImageQuery, ImageryService};

/// Raw scenes of `sensor` for the season of `year`, exclusions applied.
///
/// A wrapping window issues two queries (previous-year part first);
/// otherwise one. Query errors propagate without retry.
pub async fn build_year_window<S: ImageryService>(
    service: &S,
    year: i32,
    window: &DayWindow,
    sensor: Sensor,
    grid: &GridSpec,
    exclusions: &ExclusionSpec,
) -> Result<RasterCollection> {
    let dataset = sensor.dataset_id();
    let mut collection = RasterCollection::new();

    for range in window.ranges_for_year(year) {
        let query = ImageQuery::new(dataset.clone(), grid.clone(), range);
        let part = service
            .query_images(&query)
            .await
            .map_err(|source| PipelineError::Query {
                year,
                sensor: Some(sensor),
                source,
            })?;
        debug!(year, %sensor, %range, scenes = part.len(), "queried window");
        collection = collection.merge(part);
    }

    Ok(remove_images(collection, exclusions, sensor))
}

/// Drop every image matched by `exclusions`
pub fn remove_images(collection: RasterCollection, exclusions: &ExclusionSpec, sensor: Sensor) -> RasterCollection {
    if exclusions.is_empty() {
        return collection;
    }
    let before = collection.len();
    let kept = collection.filter(|img| !exclusions.excludes(img, sensor));
    if kept.len() != before {
        debug!(%sensor, removed = before - kept.len(), "excluded scenes");
    }
    kept
}

/// Fetch the auxiliary layers `masks` needs, and only those
pub async fn load_auxiliary<S: ImageryService>(
    service: &S,
    year: i32,
    masks: &MaskSpec,
    grid: &GridSpec,
) -> Result<AuxiliaryLayers> {
    let mut aux = AuxiliaryLayers::default();
    if masks.needs_water_recurrence() {
        aux.water_recurrence =
            Some(fetch_auxiliary(service, year, AuxiliaryDataset::SurfaceWaterRecurrence, grid).await?);
    }
    if masks.needs_forest_type() {
        aux.forest_type = Some(fetch_auxiliary(service, year, AuxiliaryDataset::ForestType, grid).await?);
    }
    Ok(aux)
}

async fn fetch_auxiliary<S: ImageryService>(
    service: &S,
    year: i32,
    dataset: AuxiliaryDataset,
    grid: &GridSpec,
) -> Result<RasterImage> {
    service
        .auxiliary_dataset(dataset, grid)
        .await
        .map_err(|source| PipelineError::Query {
            year,
            sensor: None,
            source,
        })
}

/// Harmonized, scaled and masked scenes of one sensor for one year
pub async fn sensor_collection<S: ImageryService>(
    service: &S,
    year: i32,
    sensor: Sensor,
    request: &SeriesRequest,
    aux: Arc<AuxiliaryLayers>,
) -> Result<RasterCollection> {
    let raw = build_year_window(
        service,
        year,
        request.window(),
        sensor,
        request.grid(),
        request.exclusions(),
    )
    .await?;
    if raw.is_empty() {
        return Ok(raw);
    }

    let masks = request.masks().clone();
    tokio::task::spawn_blocking(move || raw.try_map(|img| prepare_image(img, sensor, &masks, &aux)))
        .await
        .map_err(|e| PipelineError::TaskFailed {
            year,
            reason: e.to_string(),
        })?
        .map_err(|source| PipelineError::Composite { year, source })
}

/// Prepared scenes of every requested sensor, merged in sensor order
pub async fn combined_collection<S: ImageryService>(
    service: &S,
    year: i32,
    request: &SeriesRequest,
) -> Result<RasterCollection> {
    let aux = Arc::new(load_auxiliary(service, year, request.masks(), request.grid()).await?);
    let mut merged = RasterCollection::new();
    for &sensor in request.sensors() {
        let part = sensor_collection(service, year, sensor, request, Arc::clone(&aux)).await?;
        merged = merged.merge(part);
    }
    debug!(year, scenes = merged.len(), "combined collection");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeriesConfig;
    use bapcomp_core::{Band, GeoTransform, Raster, QA_BAND};
    use chrono::NaiveDate;

    fn grid() -> GridSpec {
        GridSpec::new(2, 2, GeoTransform::new(0.0, 60.0, 30.0, -30.0))
    }

    fn raw_scene(sensor: Sensor, y: i32, m: u32, d: u32) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut bands: Vec<Band> = sensor
            .profile()
            .native_bands
            .iter()
            .map(|b| Band::new(*b, Raster::filled(2, 2, 10_000.0)))
            .collect();
        bands.push(Band::new(QA_BAND, Raster::filled(2, 2, 21824.0)));
        RasterImage::new(bands, ts)
            .unwrap()
            .with_sensor(sensor)
            .with_scene_id(format!("{}_{}{:02}{:02}", sensor.code(), y, m, d))
    }

    #[tokio::test]
    async fn test_wrapping_window_queries_twice() {
        let service = bapcomp_imagery::InMemoryImageryService::new()
            .with_scene(Sensor::Lc08.dataset_id(), raw_scene(Sensor::Lc08, 2014, 12, 1))
            .with_scene(Sensor::Lc08.dataset_id(), raw_scene(Sensor::Lc08, 2015, 2, 1))
            .with_scene(Sensor::Lc08.dataset_id(), raw_scene(Sensor::Lc08, 2015, 6, 1));
        let window = DayWindow::parse("11-01", "03-31").unwrap();

        let coll = build_year_window(&service, 2015, &window, Sensor::Lc08, &grid(), &ExclusionSpec::default())
            .await
            .unwrap();
        assert_eq!(service.query_count(), 2);
        let ids: Vec<_> = coll.iter().map(|i| i.scene_id().to_string()).collect();
        assert_eq!(ids, ["LC08_20141201", "LC08_20150201"]);

        let queries = service.queries();
        assert_eq!(queries[0].range.start, NaiveDate::from_ymd_opt(2014, 11, 1).unwrap());
        assert_eq!(queries[0].range.end, NaiveDate::from_ymd_opt(2014, 12, 31).unwrap());
        assert_eq!(queries[1].range.start, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(queries[1].range.end, NaiveDate::from_ymd_opt(2015, 3, 31).unwrap());
    }

    #[tokio::test]
    async fn test_combined_collection_is_prepared() {
        let service = bapcomp_imagery::InMemoryImageryService::new()
            .with_scene(Sensor::Lc08.dataset_id(), raw_scene(Sensor::Lc08, 2015, 7, 1))
            .with_scene(Sensor::Lt05.dataset_id(), raw_scene(Sensor::Lt05, 2015, 7, 2));
        let mut cfg = SeriesConfig::new(2015, 2015, grid());
        cfg.sensors = vec!["LC08".into(), "LT05".into()];
        let req = cfg.validate().unwrap();

        let coll = combined_collection(&service, 2015, &req).await.unwrap();
        assert_eq!(coll.len(), 2);
        assert_eq!(coll.first().unwrap().sensor(), Some(Sensor::Lc08));
        let img = coll.first().unwrap();
        assert_eq!(img.band_names(), vec!["B1", "B2", "B3", "B4", "B5", "B7"]);
        assert_eq!(img.band("B4").unwrap().get(0, 0).unwrap(), 750.0);
        assert_eq!(img.valid_count(), 4);
    }

    #[tokio::test]
    async fn test_missing_auxiliary_layer_is_a_query_error() {
        let service = bapcomp_imagery::InMemoryImageryService::new();
        let mut cfg = SeriesConfig::new(2015, 2015, grid());
        cfg.masks = vec!["waterplus".into()];
        let req = cfg.validate().unwrap();
        let err = combined_collection(&service, 2015, &req).await.unwrap_err();
        assert!(matches!(err, PipelineError::Query { year: 2015, sensor: None, .. }));
        assert_eq!(service.query_count(), 0);
    }
}
