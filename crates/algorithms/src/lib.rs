//! # BAPcomp Algorithms
//!
//! Pixel algorithms for best-available-pixel compositing.
//!
//! ## Available Algorithm Categories
//!
//! - **masking**: Surface reflectance scaling, QA and auxiliary-layer masks
//! - **composite**: Medoid composite, per-band reducers, collection union
//! - **indices**: Ratio indices, tasseled cap, NDFI, standardization
//! - **landcover**: CORINE remapping, stratified sampling, class areas, terrain bands

pub mod composite;
pub mod indices;
pub mod landcover;
pub mod masking;
mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::composite::{
        clear_pixel_count, medoid, medoid_with_provenance, reduce_collection, union_collections,
        Medoid, MedoidComposite, MedoidParams, Reducer,
    };
    pub use crate::indices::{
        compute_index, standardize, transform_collection, IndexRequest, SpectralIndex,
    };
    pub use crate::landcover::{
        add_terrain_bands, class_area, corine_training_image, stratified_sample, CorineLevel,
        SamplePlan,
    };
    pub use crate::masking::{prepare_image, AuxiliaryLayers, MaskCategory, MaskSpec};
    pub use bapcomp_core::prelude::*;
}
