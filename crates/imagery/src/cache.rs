//! LRU cache of auxiliary layers in front of another service.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::error::Result;
use crate::query::{AuxiliaryDataset, ImageQuery};
use crate::service::ImageryService;
use bapcomp_core::{GridSpec, RasterCollection, RasterImage};

/// Key for cached layers: dataset plus the exact target grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuxKey {
    pub dataset: AuxiliaryDataset,
    pub rows: usize,
    pub cols: usize,
    /// Bit patterns of the six transform coefficients
    pub transform: [u64; 6],
    pub crs: Option<String>,
}

impl AuxKey {
    pub fn new(dataset: AuxiliaryDataset, grid: &GridSpec) -> Self {
        let t = &grid.transform;
        Self {
            dataset,
            rows: grid.rows,
            cols: grid.cols,
            transform: [
                t.origin_x.to_bits(),
                t.origin_y.to_bits(),
                t.pixel_width.to_bits(),
                t.pixel_height.to_bits(),
                t.row_rotation.to_bits(),
                t.col_rotation.to_bits(),
            ],
            crs: grid.crs.as_ref().map(|c| c.identifier()),
        }
    }
}

/// Wraps a service and memoizes `auxiliary_dataset` results.
///
/// Scene queries pass straight through; every year of a series asks for the
/// same static layers, so only those are cached.
pub struct CachedImageryService<S> {
    inner: S,
    cache: Mutex<LruCache<AuxKey, RasterImage>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<S> CachedImageryService<S> {
    /// Create a cache holding up to `capacity` layers.
    pub fn new(inner: S, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of layers currently cached.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// `(hits, misses)` so far
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    /// Drop all cached layers.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl<S: ImageryService> ImageryService for CachedImageryService<S> {
    async fn query_images(&self, query: &ImageQuery) -> Result<RasterCollection> {
        self.inner.query_images(query).await
    }

    async fn auxiliary_dataset(&self, dataset: AuxiliaryDataset, grid: &GridSpec) -> Result<RasterImage> {
        let key = AuxKey::new(dataset, grid);
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(image) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(image);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(dataset = %dataset, "auxiliary cache miss");
        let image = self.inner.auxiliary_dataset(dataset, grid).await?;
        self.cache.lock().put(key, image.clone());
        Ok(image)
    }
}
