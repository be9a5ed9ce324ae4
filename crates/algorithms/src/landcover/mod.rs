//! Land cover training support
//!
//! CORINE class remapping, stratified sampling of training pixels, class
//! areas and terrain covariates.

mod area;
mod corine;
mod sampling;
mod terrain;

pub use area::class_area;
pub use corine::{corine_training_image, CorineLevel, CORINE_CODES, LANDCOVER_BAND};
pub use sampling::{stratified_sample, Allocation, Sample, SamplePlan, SampleSet};
pub use terrain::{add_terrain_bands, ELEVATION_BAND, SLOPE_BAND};
