//! Imagery served from a JSON catalog of per-band GeoTIFFs on disk.
//!
//! ```json
//! {
//!   "scenes": [
//!     {
//!       "dataset": "LANDSAT/LC08/C02/T1_L2",
//!       "scene_id": "LC08_203031_20150812",
//!       "acquired": "2015-08-12T11:02:00",
//!       "bands": { "SR_B2": "LC08_203031_20150812/SR_B2.tif", "QA_PIXEL": "..." }
//!     }
//!   ],
//!   "auxiliary": { "elevation": "srtm.tif" }
//! }
//! ```
//!
//! Relative paths resolve against the catalog file's directory. Rasters
//! must already sit on the query grid.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ImageryError, Result};
use crate::query::{AuxiliaryDataset, ImageQuery};
use crate::service::ImageryService;
use bapcomp_core::io::read_geotiff;
use bapcomp_core::{Band, GridSpec, Raster, RasterCollection, RasterImage, Sensor};

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntry {
    pub dataset: String,
    pub scene_id: String,
    pub acquired: NaiveDateTime,
    /// Band name to GeoTIFF path
    pub bands: BTreeMap<String, PathBuf>,
    /// Extra scene properties copied onto the image
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
    #[serde(default)]
    pub auxiliary: BTreeMap<AuxiliaryDataset, PathBuf>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Reads scenes listed in a [`CatalogManifest`]. GeoTIFF decoding runs on
/// the blocking thread pool.
#[derive(Debug, Clone)]
pub struct CatalogImageryService {
    root: PathBuf,
    manifest: Arc<CatalogManifest>,
}

impl CatalogImageryService {
    /// Load a catalog file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let manifest: CatalogManifest = serde_json::from_str(&text)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::from_manifest(root, manifest))
    }

    pub fn from_manifest(root: impl Into<PathBuf>, manifest: CatalogManifest) -> Self {
        Self {
            root: root.into(),
            manifest: Arc::new(manifest),
        }
    }

    pub fn manifest(&self) -> &CatalogManifest {
        &self.manifest
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn read_band(path: &Path, grid: &GridSpec) -> Result<Raster<f64>> {
    let raster: Raster<f64> = read_geotiff(path).map_err(|e| {
        ImageryError::Catalog(format!("cannot read {}: {}", path.display(), e))
    })?;
    grid.check_shape(raster.rows(), raster.cols())?;
    Ok(raster)
}

fn load_scene(entry: &SceneEntry, paths: &[(String, PathBuf)], grid: &GridSpec) -> Result<RasterImage> {
    let bands = paths
        .iter()
        .map(|(name, path)| Ok(Band::new(name.clone(), read_band(path, grid)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut image = RasterImage::new(bands, entry.acquired)?.with_scene_id(entry.scene_id.clone());
    if let Some(sensor) = Sensor::ALL.into_iter().find(|s| s.dataset_id() == entry.dataset) {
        image = image.with_sensor(sensor);
    }
    for (k, v) in &entry.properties {
        image = image.with_property(k.clone(), v.clone());
    }
    Ok(image)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ImageryError::Catalog(format!("reader task failed: {}", e)))?
}

impl ImageryService for CatalogImageryService {
    async fn query_images(&self, query: &ImageQuery) -> Result<RasterCollection> {
        let entries: Vec<(SceneEntry, Vec<(String, PathBuf)>)> = self
            .manifest
            .scenes
            .iter()
            .filter(|s| s.dataset == query.dataset && query.range.contains(&s.acquired))
            .map(|s| {
                let paths = s
                    .bands
                    .iter()
                    .map(|(name, p)| (name.clone(), self.resolve(p)))
                    .collect();
                (s.clone(), paths)
            })
            .collect();

        debug!(query = %query, scenes = entries.len(), "catalog query");

        let grid = query.grid.clone();
        blocking(move || {
            entries
                .iter()
                .map(|(entry, paths)| load_scene(entry, paths, &grid))
                .collect::<Result<RasterCollection>>()
        })
        .await
    }

    async fn auxiliary_dataset(&self, dataset: AuxiliaryDataset, grid: &GridSpec) -> Result<RasterImage> {
        let path = self
            .manifest
            .auxiliary
            .get(&dataset)
            .map(|p| self.resolve(p))
            .ok_or_else(|| ImageryError::DatasetUnavailable(dataset.to_string()))?;

        debug!(dataset = %dataset, path = %path.display(), "reading auxiliary layer");

        let grid = grid.clone();
        blocking(move || {
            let raster = read_band(&path, &grid)?;
            let mut mask = raster.data().mapv(|v| !v.is_nan());
            if let Some(nd) = raster.nodata().filter(|nd| !nd.is_nan()) {
                mask.zip_mut_with(raster.data(), |m, &v| *m = *m && v != nd);
            }
            let acquired = NaiveDateTime::default();
            Ok(RasterImage::new(vec![Band::new(dataset.band_name(), raster)], acquired)?.with_mask(mask)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bapcomp_core::io::{write_geotiff, GeoTiffOptions};
    use bapcomp_core::{DateRange, GeoTransform};
    use chrono::NaiveDate;

    fn grid() -> GridSpec {
        GridSpec::new(3, 4, GeoTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0))
    }

    fn write_band(dir: &Path, name: &str, value: f64) -> PathBuf {
        let mut r: Raster<f64> = Raster::filled(3, 4, value);
        r.set_transform(grid().transform);
        let path = dir.join(name);
        write_geotiff(&r, &path, Some(GeoTiffOptions::uint16(None))).unwrap();
        PathBuf::from(name)
    }

    fn manifest(dir: &Path) -> CatalogManifest {
        let mut bands = BTreeMap::new();
        bands.insert("SR_B4".to_string(), write_band(dir, "b4.tif", 12000.0));
        bands.insert("QA_PIXEL".to_string(), write_band(dir, "qa.tif", 21824.0));
        let acquired = NaiveDate::from_ymd_opt(2015, 8, 12)
            .unwrap()
            .and_hms_opt(11, 2, 0)
            .unwrap();

        let mut auxiliary = BTreeMap::new();
        auxiliary.insert(AuxiliaryDataset::Elevation, write_band(dir, "dem.tif", 850.0));

        CatalogManifest {
            scenes: vec![SceneEntry {
                dataset: Sensor::Lc08.dataset_id(),
                scene_id: "LC08_203031_20150812".into(),
                acquired,
                bands,
                properties: BTreeMap::new(),
            }],
            auxiliary,
        }
    }

    #[tokio::test]
    async fn test_catalog_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.json");
        std::fs::write(&catalog_path, serde_json::to_string_pretty(&manifest(dir.path())).unwrap()).unwrap();

        let service = CatalogImageryService::open(&catalog_path).unwrap();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2015, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2015, 8, 12).unwrap(),
        );
        let coll = service
            .query_images(&ImageQuery::new(Sensor::Lc08.dataset_id(), grid(), range))
            .await
            .unwrap();
        assert_eq!(coll.len(), 1);
        let scene = coll.first().unwrap();
        assert_eq!(scene.sensor(), Some(Sensor::Lc08));
        assert_eq!(scene.band_names(), vec!["QA_PIXEL", "SR_B4"]);
        assert_eq!(scene.band("SR_B4").unwrap().get(2, 3).unwrap(), 12000.0);

        let other = service
            .query_images(&ImageQuery::new(Sensor::Le07.dataset_id(), grid(), range))
            .await
            .unwrap();
        assert!(other.is_empty());

        let dem = service.auxiliary_dataset(AuxiliaryDataset::Elevation, &grid()).await.unwrap();
        assert_eq!(dem.band("elevation").unwrap().get(0, 0).unwrap(), 850.0);
        assert!(matches!(
            service.auxiliary_dataset(AuxiliaryDataset::ForestType, &grid()).await,
            Err(ImageryError::DatasetUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_grid_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let service = CatalogImageryService::from_manifest(dir.path(), manifest(dir.path()));
        let wrong = GridSpec::new(5, 5, grid().transform);
        assert!(service.auxiliary_dataset(AuxiliaryDataset::Elevation, &wrong).await.is_err());
    }

    #[test]
    fn test_bad_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{ \"scenes\": 3 }").unwrap();
        assert!(matches!(CatalogImageryService::open(&path), Err(ImageryError::Json(_))));
    }
}
