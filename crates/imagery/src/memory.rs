//! In-memory imagery service for fixtures and tests.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::error::{ImageryError, Result};
use crate::query::{AuxiliaryDataset, ImageQuery};
use crate::service::ImageryService;
use bapcomp_core::{GridSpec, RasterCollection, RasterImage};

/// Serves scenes registered per dataset and records every query.
///
/// Scenes are returned in registration order. Datasets marked with
/// [`InMemoryImageryService::fail_dataset`] error on every query.
#[derive(Debug, Default)]
pub struct InMemoryImageryService {
    scenes: BTreeMap<String, Vec<RasterImage>>,
    auxiliary: BTreeMap<AuxiliaryDataset, RasterImage>,
    failing: HashSet<String>,
    log: Mutex<Vec<ImageQuery>>,
    calls: AtomicUsize,
}

impl InMemoryImageryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scene under `dataset`
    pub fn with_scene(mut self, dataset: impl Into<String>, image: RasterImage) -> Self {
        self.scenes.entry(dataset.into()).or_default().push(image);
        self
    }

    pub fn with_auxiliary(mut self, dataset: AuxiliaryDataset, image: RasterImage) -> Self {
        self.auxiliary.insert(dataset, image);
        self
    }

    /// Make every query against `dataset` fail
    pub fn fail_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.failing.insert(dataset.into());
        self
    }

    /// Number of `query_images` calls so far
    pub fn query_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every query received, in arrival order
    pub fn queries(&self) -> Vec<ImageQuery> {
        self.log.lock().clone()
    }
}

impl ImageryService for InMemoryImageryService {
    async fn query_images(&self, query: &ImageQuery) -> Result<RasterCollection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(query.clone());

        if self.failing.contains(&query.dataset) {
            return Err(ImageryError::Query {
                dataset: query.dataset.clone(),
                reason: "service unavailable".into(),
            });
        }

        let mut out = RasterCollection::new();
        for image in self.scenes.get(&query.dataset).into_iter().flatten() {
            if !query.range.contains(&image.acquired()) {
                continue;
            }
            query.grid.check_shape(image.rows(), image.cols())?;
            out.push(image.clone());
        }
        debug!(query = %query, scenes = out.len(), "in-memory query");
        Ok(out)
    }

    async fn auxiliary_dataset(&self, dataset: AuxiliaryDataset, grid: &GridSpec) -> Result<RasterImage> {
        let image = self
            .auxiliary
            .get(&dataset)
            .ok_or_else(|| ImageryError::DatasetUnavailable(dataset.to_string()))?;
        grid.check_shape(image.rows(), image.cols())?;
        Ok(image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bapcomp_core::{Band, DateRange, GeoTransform, Raster};
    use chrono::NaiveDate;

    fn grid() -> GridSpec {
        GridSpec::new(2, 2, GeoTransform::new(0.0, 60.0, 30.0, -30.0))
    }

    fn scene(month: u32, day: u32) -> RasterImage {
        let ts = NaiveDate::from_ymd_opt(2015, month, day)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        RasterImage::new(vec![Band::new("SR_B4", Raster::filled(2, 2, 9000.0))], ts)
            .unwrap()
            .with_scene_id(format!("LC08_001002_2015{:02}{:02}", month, day))
    }

    fn range(start: (u32, u32), end: (u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2015, start.0, start.1).unwrap(),
            NaiveDate::from_ymd_opt(2015, end.0, end.1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_query_filters_by_date() {
        let service = InMemoryImageryService::new()
            .with_scene("L8", scene(6, 1))
            .with_scene("L8", scene(8, 31))
            .with_scene("L8", scene(9, 1))
            .with_scene("L7", scene(7, 1));

        let q = ImageQuery::new("L8", grid(), range((6, 1), (8, 31)));
        let coll = service.query_images(&q).await.unwrap();
        let ids: Vec<_> = coll.iter().map(|i| i.scene_id().to_string()).collect();
        // closed range: the end day is included
        assert_eq!(ids, ["LC08_001002_20150601", "LC08_001002_20150831"]);
        assert_eq!(service.query_count(), 1);
        assert_eq!(service.queries(), vec![q]);
    }

    #[tokio::test]
    async fn test_failing_dataset() {
        let service = InMemoryImageryService::new().fail_dataset("L5");
        let q = ImageQuery::new("L5", grid(), range((1, 1), (12, 31)));
        assert!(matches!(
            service.query_images(&q).await,
            Err(ImageryError::Query { .. })
        ));
        assert_eq!(service.query_count(), 1);
    }

    #[tokio::test]
    async fn test_auxiliary_and_reduce() {
        let service = InMemoryImageryService::new().with_auxiliary(AuxiliaryDataset::Elevation, scene(1, 1));
        assert!(service.auxiliary_dataset(AuxiliaryDataset::Elevation, &grid()).await.is_ok());
        assert!(matches!(
            service.auxiliary_dataset(AuxiliaryDataset::ForestType, &grid()).await,
            Err(ImageryError::DatasetUnavailable(_))
        ));

        let coll = RasterCollection::from_images(vec![scene(1, 1), scene(1, 2)]);
        let reduced = service
            .reduce_collection(&coll, bapcomp_algorithms::composite::Reducer::Sum)
            .await
            .unwrap();
        assert_eq!(reduced.band("SR_B4_sum").unwrap().get(0, 0).unwrap(), 18000.0);
    }
}
