//! The imagery capability consumed by the pipeline.

use std::future::Future;

use crate::error::Result;
use crate::query::{AuxiliaryDataset, ImageQuery};
use bapcomp_algorithms::composite::{self, Reducer};
use bapcomp_core::{GridSpec, RasterCollection, RasterImage};

/// Source of satellite scenes and static layers.
///
/// Implementations deliver images already on the query's grid. Scenes
/// carry their raw native bands plus `QA_PIXEL`, a scene id, the sensor
/// and the acquisition time; masking and scaling happen downstream.
pub trait ImageryService: Send + Sync {
    /// Every scene of `query.dataset` acquired within `query.range`
    fn query_images(&self, query: &ImageQuery) -> impl Future<Output = Result<RasterCollection>> + Send;

    /// A static single-band layer on `grid`
    fn auxiliary_dataset(
        &self,
        dataset: AuxiliaryDataset,
        grid: &GridSpec,
    ) -> impl Future<Output = Result<RasterImage>> + Send;

    /// Per-pixel reduction of a collection.
    ///
    /// Runs locally unless the service can reduce closer to the data.
    fn reduce_collection(
        &self,
        collection: &RasterCollection,
        reducer: Reducer,
    ) -> impl Future<Output = Result<RasterImage>> + Send {
        async move { Ok(composite::reduce_collection(collection, reducer)?) }
    }
}
